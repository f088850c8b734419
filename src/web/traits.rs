use std::future::Future;

use super::types::Session;
use crate::types::SessionId;

/// Error type returned by [`SessionStore`] implementations.
pub type StoreError = Box<dyn std::error::Error + Send + Sync>;

/// Session persistence, injected into the router.
///
/// Sessions are identified by opaque [`SessionId`]s generated by the router;
/// the store only maps ids to [`Session`] values.
///
/// # Example
///
/// ```rust,ignore
/// impl SessionStore for RedisSessions {
///     async fn load(&self, id: &SessionId) -> Result<Option<Session>, StoreError> {
///         self.get(id.to_string()).await
///     }
///
///     async fn save(&self, id: &SessionId, session: Session) -> Result<(), StoreError> {
///         self.set(id.to_string(), session).await
///     }
///
///     async fn take_state(&self, id: &SessionId) -> Result<Option<String>, StoreError> {
///         self.getdel_field(id.to_string(), "oauth_state").await
///     }
///
///     async fn delete(&self, id: &SessionId) -> Result<(), StoreError> {
///         self.del(id.to_string()).await
///     }
/// }
/// ```
pub trait SessionStore: Send + Sync + 'static {
    /// Look up a session by ID.
    fn load(
        &self,
        id: &SessionId,
    ) -> impl Future<Output = Result<Option<Session>, StoreError>> + Send;

    /// Insert or replace a session.
    fn save(
        &self,
        id: &SessionId,
        session: Session,
    ) -> impl Future<Output = Result<(), StoreError>> + Send;

    /// Remove and return the pending login `state` of a session in one step.
    ///
    /// Two callbacks racing on the same session must not both receive the
    /// state. Missing or expired sessions yield `None`.
    fn take_state(
        &self,
        id: &SessionId,
    ) -> impl Future<Output = Result<Option<String>, StoreError>> + Send;

    /// Delete a session (logout). Deleting an unknown id is not an error.
    fn delete(&self, id: &SessionId) -> impl Future<Output = Result<(), StoreError>> + Send;
}

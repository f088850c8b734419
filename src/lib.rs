#![doc = include_str!("../README.md")]

pub mod basecamp;
pub mod error;
pub mod nonce;
pub mod oauth;
pub mod types;
pub mod web;

#[cfg(test)]
mod test_support;

// Re-exports for convenient access
pub use basecamp::{Attachment, BasecampClient, BasecampConfig, Project, Todo, TodoList};
pub use error::Error;
pub use oauth::{AuthClient, AuthorizationRequest, OAuthConfig, Token, TokenResponse};
pub use types::{ProjectId, SessionId, TodoId, TodoListId};
pub use web::{AppConfig, MemorySessionStore, SessionStore, app_router};

//! Axum front end: OAuth2 login routes, session handling and the Basecamp proxy endpoints.
//!
//! # Quick Start
//!
//! ```rust,ignore
//! use basecamp_bridge::web::{AppConfig, MemorySessionStore, app_router};
//!
//! let config = AppConfig::from_env()?;
//! let app = app_router(config, MemorySessionStore::new());
//! axum::serve(listener, app).await?;
//! ```

mod config;
mod cookies;
mod error;
mod extractor;
mod routes;
mod server;
mod state;
mod store;
mod traits;
mod types;

pub use config::AppConfig;
pub use extractor::Authenticated;
pub use routes::app_router;
pub use server::{launch, run};
pub use store::MemorySessionStore;
pub use traits::{SessionStore, StoreError};
pub use types::Session;

/// Re-export cookie key type for builder API.
pub use axum_extra::extract::cookie::Key as CookieKey;

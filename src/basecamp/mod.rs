//! Authenticated access to the Basecamp 3 REST API.

mod client;
mod link;
mod models;

pub use client::{BasecampClient, BasecampConfig};
pub use models::{Attachment, Project, Todo, TodoList};

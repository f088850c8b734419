use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::Error;
use crate::types::{ProjectId, TodoId, TodoListId};

// Reshaped entities: deserialized straight from Basecamp payloads, unknown
// fields dropped, then serialized back to the browser.

/// A Basecamp project.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Project {
    pub id: ProjectId,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A to-do list inside a project's todoset.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TodoList {
    pub id: TodoListId,
    pub name: String,
}

/// A to-do, reduced to its id and title.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Todo {
    pub id: TodoId,
    pub title: String,
}

/// Reference to an uploaded file, embeddable in rich-text bodies as
/// `<bc-attachment sgid="...">`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attachment {
    pub attachable_sgid: String,
}

/// Body of the create-to-do request.
#[derive(Debug, Serialize)]
pub(crate) struct NewTodo<'a> {
    pub(crate) content: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub(crate) description: Option<&'a str>,
}

// ── Todo list pipeline steps ───────────────────────────────────────

/// Step 1: project detail, only the dock is of interest.
#[derive(Debug, Deserialize)]
pub(crate) struct ProjectDetail {
    #[serde(default)]
    pub(crate) dock: Vec<DockEntry>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct DockEntry {
    pub(crate) name: String,
    #[serde(default)]
    pub(crate) url: Option<String>,
}

impl ProjectDetail {
    /// Step 2: locate the todoset in the dock.
    ///
    /// `base` resolves relative dock URLs.
    pub(crate) fn todoset_url(&self, base: &Url) -> Result<Url, Error> {
        let entry = self
            .dock
            .iter()
            .find(|entry| entry.name == "todoset")
            .ok_or_else(|| Error::NotFound("project has no todoset in its dock".into()))?;
        let url = entry
            .url
            .as_deref()
            .ok_or_else(|| Error::NotFound("todoset dock entry has no url".into()))?;
        base.join(url)
            .map_err(|e| Error::NotFound(format!("todoset url {url:?} is invalid: {e}")))
    }
}

/// Step 3: the todoset, pointing at its paginated list collection.
#[derive(Debug, Deserialize)]
pub(crate) struct Todoset {
    pub(crate) todolists_url: Url,
}

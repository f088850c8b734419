use std::collections::HashSet;

use bytes::Bytes;
use reqwest::{RequestBuilder, StatusCode};
use reqwest::header::{ACCEPT, CONTENT_TYPE, USER_AGENT};
use serde::de::DeserializeOwned;
use url::Url;

use super::link;
use super::models::{Attachment, NewTodo, Project, ProjectDetail, Todo, TodoList, Todoset};
use crate::error::Error;
use crate::types::{ProjectId, TodoListId};

const DEFAULT_API_URL: &str = "https://3.basecampapi.com/";

/// Basecamp API location and account.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct BasecampConfig {
    pub(crate) account_id: String,
    pub(crate) api_url: Url,
    pub(crate) user_agent: String,
}

impl BasecampConfig {
    #[must_use]
    pub fn new(account_id: impl Into<String>) -> Self {
        Self {
            account_id: account_id.into(),
            api_url: DEFAULT_API_URL.parse().expect("valid default URL"),
            user_agent: concat!(env!("CARGO_PKG_NAME"), " (", env!("CARGO_PKG_VERSION"), ")").into(),
        }
    }

    /// Override the API root (default: `https://3.basecampapi.com/`).
    #[must_use]
    pub fn with_api_url(mut self, mut url: Url) -> Self {
        if !url.path().ends_with('/') {
            let path = format!("{}/", url.path());
            url.set_path(&path);
        }
        self.api_url = url;
        self
    }

    /// Override the `User-Agent` sent with every call. Basecamp rejects requests without one.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    #[must_use]
    pub fn account_id(&self) -> &str {
        &self.account_id
    }

    #[must_use]
    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    #[must_use]
    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }
}

/// Issues bearer-authenticated calls against one Basecamp account.
///
/// Stateless apart from the connection pool: the access token is passed to
/// every operation.
pub struct BasecampClient {
    config: BasecampConfig,
    http: reqwest::Client,
}

impl BasecampClient {
    #[must_use]
    pub fn new(config: BasecampConfig) -> Self {
        Self {
            config,
            http: reqwest::Client::new(),
        }
    }

    /// Use a custom HTTP client (for connection pool reuse or testing).
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.http = client;
        self
    }

    #[must_use]
    pub fn config(&self) -> &BasecampConfig {
        &self.config
    }

    /// GET every page starting at `start_url`, following `rel="next"` links.
    ///
    /// Items are returned in the order the pages arrived. Only the absence
    /// of a next link ends the walk; an empty page does not. A link back to a
    /// page already fetched also ends it.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Upstream`] as soon as any page answers non-2xx or a
    /// link leaves the API host; pages already received are dropped.
    pub async fn fetch_paginated<T: DeserializeOwned>(
        &self,
        token: &str,
        start_url: Url,
    ) -> Result<Vec<T>, Error> {
        let mut items = Vec::new();
        let mut next = Some(start_url);
        let mut visited = HashSet::new();

        while let Some(url) = next.take() {
            self.ensure_api_origin(&url)?;
            if !visited.insert(url.clone()) {
                tracing::warn!(url = %url, "Pagination links back to a fetched page");
                break;
            }

            let response = self.get(token, url.clone()).send().await?;
            let response = Self::ensure_success(response, "paginated fetch").await?;
            next = link::next_page(response.headers(), &url);

            let page: Vec<T> = response.json().await?;
            tracing::debug!(url = %url, items = page.len(), has_next = next.is_some(), "Fetched page");
            items.extend(page);
        }

        tracing::debug!(pages = visited.len(), items = items.len(), "Pagination complete");
        Ok(items)
    }

    /// All projects visible to the token's user.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Upstream`] if any page fails.
    pub async fn fetch_projects(&self, token: &str) -> Result<Vec<Project>, Error> {
        let url = self.account_url("projects.json")?;
        self.fetch_paginated(token, url).await
    }

    /// To-do lists of a project: project detail → dock todoset → todoset → lists.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotFound`] if the project's dock has no todoset, or
    /// [`Error::Upstream`] if any step fails.
    pub async fn fetch_todo_lists(
        &self,
        token: &str,
        project_id: ProjectId,
    ) -> Result<Vec<TodoList>, Error> {
        let detail_url = self.account_url(&format!("projects/{project_id}.json"))?;
        let detail: ProjectDetail = self.get_json(token, detail_url.clone(), "project detail").await?;

        let todoset_url = detail.todoset_url(&detail_url)?;
        let todoset: Todoset = self.get_json(token, todoset_url, "todoset").await?;

        self.fetch_paginated(token, todoset.todolists_url).await
    }

    /// To-dos of one list, reduced to `{id, title}`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Upstream`] on a non-2xx response.
    pub async fn fetch_todos(
        &self,
        token: &str,
        project_id: ProjectId,
        todolist_id: TodoListId,
    ) -> Result<Vec<Todo>, Error> {
        let url = self.todos_url(project_id, todolist_id)?;
        self.get_json(token, url, "todos").await
    }

    /// Create a to-do in a list.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] without touching the network if `title`
    /// is blank, or [`Error::Upstream`] if Basecamp rejects the request.
    pub async fn create_todo(
        &self,
        token: &str,
        project_id: ProjectId,
        todolist_id: TodoListId,
        title: &str,
        notes: Option<&str>,
    ) -> Result<Todo, Error> {
        if title.trim().is_empty() {
            return Err(Error::Validation("Title is required".into()));
        }

        let url = self.todos_url(project_id, todolist_id)?;
        let body = NewTodo {
            content: title,
            description: notes.filter(|n| !n.is_empty()),
        };

        let response = self
            .request(self.http.post(url), token)
            .json(&body)
            .send()
            .await?;
        let response = Self::ensure_success(response, "create todo").await?;
        let todo: Todo = response.json().await?;

        tracing::info!(%project_id, %todolist_id, todo_id = %todo.id, "Created todo");
        Ok(todo)
    }

    /// Upload raw file bytes, returning the reference used to embed them.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Validation`] if the filename or body is empty, or
    /// [`Error::Upstream`] if Basecamp rejects the upload.
    pub async fn upload_attachment(
        &self,
        token: &str,
        project_id: ProjectId,
        file_bytes: Bytes,
        filename: &str,
        content_type: &str,
    ) -> Result<Attachment, Error> {
        if filename.is_empty() {
            return Err(Error::Validation("No selected file".into()));
        }
        if file_bytes.is_empty() {
            return Err(Error::Validation("File is empty".into()));
        }

        let mut url = self.account_url(&format!("buckets/{project_id}/attachments.json"))?;
        url.query_pairs_mut().append_pair("name", filename);
        let size = file_bytes.len();

        let response = self
            .request(self.http.post(url), token)
            .header(CONTENT_TYPE, content_type)
            .body(file_bytes)
            .send()
            .await?;
        let response = Self::ensure_success(response, "upload attachment").await?;
        let attachment: Attachment = response.json().await?;

        tracing::info!(%project_id, filename, size, "Uploaded attachment");
        Ok(attachment)
    }

    // ── Helpers ────────────────────────────────────────────────────

    fn account_url(&self, path: &str) -> Result<Url, Error> {
        self.config
            .api_url
            .join(&format!("{}/{path}", self.config.account_id))
            .map_err(|e| Error::Config(format!("invalid Basecamp URL for {path}: {e}")))
    }

    fn todos_url(&self, project_id: ProjectId, todolist_id: TodoListId) -> Result<Url, Error> {
        self.account_url(&format!(
            "buckets/{project_id}/todolists/{todolist_id}/todos.json"
        ))
    }

    fn request(&self, builder: RequestBuilder, token: &str) -> RequestBuilder {
        builder
            .bearer_auth(token)
            .header(USER_AGENT, &self.config.user_agent)
            .header(ACCEPT, "application/json")
    }

    fn get(&self, token: &str, url: Url) -> RequestBuilder {
        self.request(self.http.get(url), token)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        token: &str,
        url: Url,
        operation: &'static str,
    ) -> Result<T, Error> {
        self.ensure_api_origin(&url)?;
        let response = self.get(token, url).send().await?;
        let response = Self::ensure_success(response, operation).await?;
        response.json::<T>().await.map_err(Into::into)
    }

    /// URLs taken from responses must stay on the API host, which is the only
    /// place the token may be sent.
    fn ensure_api_origin(&self, url: &Url) -> Result<(), Error> {
        if url.origin() == self.config.api_url.origin() {
            return Ok(());
        }
        tracing::warn!(url = %url, "Refusing to follow a link off the Basecamp API host");
        Err(Error::Upstream {
            status: StatusCode::BAD_GATEWAY.as_u16(),
            body: format!("response linked to a foreign host: {}", url.origin().ascii_serialization()),
        })
    }

    /// Checks HTTP response status; returns the response on success or an error with details.
    async fn ensure_success(
        response: reqwest::Response,
        operation: &'static str,
    ) -> Result<reqwest::Response, Error> {
        if response.status().is_success() {
            return Ok(response);
        }
        let status = response.status().as_u16();
        let url = response.url().clone();
        let body = response.text().await.unwrap_or_default();
        tracing::warn!(operation, status, url = %url, "Basecamp request failed");
        Err(Error::Upstream { status, body })
    }
}

use std::sync::Arc;

use axum::extract::rejection::{JsonRejection, PathRejection};
use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::{StatusCode, Uri};
use axum::response::Redirect;
use axum::routing::{get, post};
use axum::{Json, Router};
use axum_extra::extract::PrivateCookieJar;
use serde::Deserialize;
use serde_json::{Value, json};

use super::config::AppConfig;
use super::cookies;
use super::error::store_error;
use super::extractor::Authenticated;
use super::state::AppState;
use super::traits::SessionStore;
use super::types::Session;
use crate::basecamp::{Attachment, BasecampClient, Project, Todo, TodoList};
use crate::error::Error;
use crate::nonce;
use crate::oauth::AuthClient;
use crate::types::{ProjectId, SessionId, TodoListId};

/// Create the application router.
///
/// `sessions` holds every browser session; it is shared by all handlers.
pub fn app_router<S: SessionStore>(config: AppConfig, sessions: S) -> Router {
    let http = reqwest::Client::new();
    let upload_limit = config.settings.max_upload_bytes;

    let state = AppState {
        auth: Arc::new(AuthClient::new(config.oauth).with_http_client(http.clone())),
        basecamp: Arc::new(BasecampClient::new(config.basecamp).with_http_client(http)),
        sessions: Arc::new(sessions),
        settings: config.settings,
    };

    Router::new()
        .route("/", get(index))
        .route("/login", get(login::<S>))
        .route("/oauth/callback", get(callback::<S>))
        .route("/logout", get(logout::<S>).post(logout::<S>))
        .route("/projects", get(projects::<S>))
        .route("/todo_lists/{project_id}", get(todo_lists::<S>))
        .route("/todos/{project_id}/{todolist_id}", get(todos::<S>))
        .route("/create_todo", post(create_todo::<S>))
        .route(
            "/create_todo/{project_id}/{todolist_id}",
            post(create_todo_in_list::<S>),
        )
        .route(
            "/upload_attachment/{project_id}",
            post(upload_attachment::<S>).layer(DefaultBodyLimit::max(upload_limit)),
        )
        .route("/test", get(liveness))
        .fallback(not_found)
        .with_state(state)
}

// ── Login ──────────────────────────────────────────────────────────

async fn index() -> Redirect {
    Redirect::to("/login")
}

async fn login<S: SessionStore>(
    State(state): State<AppState<S>>,
    jar: PrivateCookieJar,
) -> Result<(PrivateCookieJar, Redirect), Error> {
    // Every login starts from a fresh session id.
    if let Some(previous) = cookies::get_session_id(&jar, &state.settings.session_cookie_name) {
        state.sessions.delete(&previous).await.map_err(store_error)?;
    }

    let auth_req = state.auth.begin_login();
    let session_id = SessionId(nonce::generate_session_id());
    state
        .sessions
        .save(&session_id, Session::pending(auth_req.state))
        .await
        .map_err(store_error)?;

    let session_cookie = cookies::session_cookie(
        &state.settings.session_cookie_name,
        &session_id,
        state.settings.session_ttl_days,
        state.settings.secure_cookies,
    );

    tracing::debug!("Redirecting to Launchpad authorization");
    Ok((jar.add(session_cookie), Redirect::to(&auth_req.url)))
}

// ── Callback ───────────────────────────────────────────────────────

async fn callback<S: SessionStore>(
    State(state): State<AppState<S>>,
    jar: PrivateCookieJar,
    uri: Uri,
) -> Result<Redirect, Error> {
    let no_login = || Error::Auth("No login in progress".into());

    let session_id =
        cookies::get_session_id(&jar, &state.settings.session_cookie_name).ok_or_else(no_login)?;

    // Single use: the state is gone whether or not the exchange succeeds.
    let stored_state = state
        .sessions
        .take_state(&session_id)
        .await
        .map_err(store_error)?
        .ok_or_else(no_login)?;

    let mut callback_url = state.auth.config().redirect_uri().clone();
    callback_url.set_query(uri.query());

    let token = state
        .auth
        .complete_login(&callback_url, &stored_state)
        .await?;

    let mut session = state
        .sessions
        .load(&session_id)
        .await
        .map_err(store_error)?
        .unwrap_or_default();
    session.oauth_token = Some(token);
    state
        .sessions
        .save(&session_id, session)
        .await
        .map_err(store_error)?;

    tracing::info!("Basecamp OAuth2 login successful");
    Ok(Redirect::to(&state.settings.login_redirect))
}

// ── Logout ─────────────────────────────────────────────────────────

async fn logout<S: SessionStore>(
    State(state): State<AppState<S>>,
    jar: PrivateCookieJar,
) -> (PrivateCookieJar, StatusCode) {
    if let Some(session_id) = cookies::get_session_id(&jar, &state.settings.session_cookie_name) {
        if let Err(e) = state.sessions.delete(&session_id).await {
            tracing::warn!(error = %e, "Session deletion failed during logout");
        }
    }

    let clear_cookie = cookies::clear_session_cookie(&state.settings.session_cookie_name);
    (jar.remove(clear_cookie), StatusCode::NO_CONTENT)
}

// ── Basecamp proxy ─────────────────────────────────────────────────

async fn projects<S: SessionStore>(
    State(state): State<AppState<S>>,
    auth: Authenticated,
) -> Result<Json<Vec<Project>>, Error> {
    let projects = state.basecamp.fetch_projects(auth.access_token()).await?;
    Ok(Json(projects))
}

async fn todo_lists<S: SessionStore>(
    State(state): State<AppState<S>>,
    auth: Authenticated,
    path: Result<Path<ProjectId>, PathRejection>,
) -> Result<Json<Vec<TodoList>>, Error> {
    let project_id = path_param(path)?;
    let lists = state
        .basecamp
        .fetch_todo_lists(auth.access_token(), project_id)
        .await?;
    Ok(Json(lists))
}

async fn todos<S: SessionStore>(
    State(state): State<AppState<S>>,
    auth: Authenticated,
    path: Result<Path<(ProjectId, TodoListId)>, PathRejection>,
) -> Result<Json<Vec<Todo>>, Error> {
    let (project_id, todolist_id) = path_param(path)?;
    let todos = state
        .basecamp
        .fetch_todos(auth.access_token(), project_id, todolist_id)
        .await?;
    Ok(Json(todos))
}

#[derive(Deserialize)]
struct CreateTodoRequest {
    project_id: ProjectId,
    todolist_id: TodoListId,
    #[serde(flatten)]
    fields: TodoFields,
}

#[derive(Deserialize)]
struct TodoFields {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    notes: Option<String>,
}

async fn create_todo<S: SessionStore>(
    State(state): State<AppState<S>>,
    auth: Authenticated,
    body: Result<Json<CreateTodoRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Todo>), Error> {
    let Json(request) = body.map_err(|e| Error::Validation(e.body_text()))?;
    create(&state, &auth, request.project_id, request.todolist_id, request.fields).await
}

async fn create_todo_in_list<S: SessionStore>(
    State(state): State<AppState<S>>,
    auth: Authenticated,
    path: Result<Path<(ProjectId, TodoListId)>, PathRejection>,
    body: Result<Json<TodoFields>, JsonRejection>,
) -> Result<(StatusCode, Json<Todo>), Error> {
    let (project_id, todolist_id) = path_param(path)?;
    let Json(fields) = body.map_err(|e| Error::Validation(e.body_text()))?;
    create(&state, &auth, project_id, todolist_id, fields).await
}

async fn create<S: SessionStore>(
    state: &AppState<S>,
    auth: &Authenticated,
    project_id: ProjectId,
    todolist_id: TodoListId,
    fields: TodoFields,
) -> Result<(StatusCode, Json<Todo>), Error> {
    let todo = state
        .basecamp
        .create_todo(
            auth.access_token(),
            project_id,
            todolist_id,
            fields.title.as_deref().unwrap_or_default(),
            fields.notes.as_deref(),
        )
        .await?;
    Ok((StatusCode::CREATED, Json(todo)))
}

async fn upload_attachment<S: SessionStore>(
    State(state): State<AppState<S>>,
    auth: Authenticated,
    path: Result<Path<ProjectId>, PathRejection>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<Attachment>, Error> {
    let project_id = path_param(path)?;
    let mut multipart = multipart.map_err(|e| multipart_error(e.status(), e.body_text()))?;

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error(e.status(), e.body_text()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let filename = sanitize_filename(field.file_name().unwrap_or_default());
        let content_type = field
            .content_type()
            .unwrap_or("application/octet-stream")
            .to_string();
        let bytes = field
            .bytes()
            .await
            .map_err(|e| multipart_error(e.status(), e.body_text()))?;

        let attachment = state
            .basecamp
            .upload_attachment(auth.access_token(), project_id, bytes, &filename, &content_type)
            .await?;
        return Ok(Json(attachment));
    }

    Err(Error::Validation("No file part".into()))
}

// ── Misc ───────────────────────────────────────────────────────────

async fn liveness() -> Json<Value> {
    Json(json!({"message": "Test route working"}))
}

async fn not_found(uri: Uri) -> Error {
    Error::NotFound(format!("Path not found: {}", uri.path()))
}

// ── Helpers ────────────────────────────────────────────────────────

fn path_param<T>(path: Result<Path<T>, PathRejection>) -> Result<T, Error> {
    path.map(|Path(value)| value)
        .map_err(|e| Error::Validation(e.body_text()))
}

fn multipart_error(status: StatusCode, message: String) -> Error {
    if status == StatusCode::PAYLOAD_TOO_LARGE {
        Error::PayloadTooLarge(message)
    } else {
        Error::Validation(message)
    }
}

/// Reduce a client-supplied filename to a safe ASCII basename.
fn sanitize_filename(raw: &str) -> String {
    let basename = raw.rsplit(['/', '\\']).next().unwrap_or_default();
    let cleaned: String = basename
        .trim()
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect();
    cleaned.trim_start_matches(['.', '_']).to_string()
}

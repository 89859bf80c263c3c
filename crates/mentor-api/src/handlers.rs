//! Route handler functions for all API endpoints.
//!
//! Handlers validate input, check session ownership and hand the actual work
//! to the task runner. Nothing here talks to the model directly.

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::{Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use mentor_core::types::{ChatMessage, Owner, Session};
use mentor_tasks::{TaskOutcome, TaskStatusView};

use crate::auth::{generate_token, hash_password, verify_password, AuthenticatedOwner};
use crate::error::ApiError;
use crate::state::AppState;

/// Longest accepted session title, in characters.
pub const MAX_TITLE_LENGTH: usize = 255;

// =============================================================================
// Request types
// =============================================================================

#[derive(Debug, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    #[serde(default)]
    pub email: Option<String>,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisRequest {
    pub text: String,
    #[serde(default)]
    pub title: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct QuestionRequest {
    pub session_id: Uuid,
    pub question: String,
}

// =============================================================================
// Response types
// =============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct RegisterResponse {
    pub user_id: i64,
    pub username: String,
    pub email: Option<String>,
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub token: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct TaskCreatedResponse {
    pub session_id: Uuid,
    pub task_id: Uuid,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub session_id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
}

impl From<Session> for SessionResponse {
    fn from(s: Session) -> Self {
        Self {
            session_id: s.id,
            title: s.title,
            created_at: s.created_at,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message_id: i64,
    pub created_at: DateTime<Utc>,
    pub message: ChatMessage,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionDetailsResponse {
    pub session_id: Uuid,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub messages: Vec<MessageResponse>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
}

// =============================================================================
// Helpers
// =============================================================================

fn invalid_session(owner: &Owner) -> ApiError {
    ApiError::BadRequest(format!(
        "Invalid session for user {} (user id: {}).",
        owner.username, owner.id
    ))
}

fn parse_json<T>(payload: Result<Json<T>, JsonRejection>) -> Result<T, ApiError> {
    payload
        .map(|Json(body)| body)
        .map_err(|e| ApiError::BadRequest(e.body_text()))
}

/// Resolve a path segment to a session owned by `owner`.
fn owned_session(state: &AppState, owner: &Owner, raw_id: &str) -> Result<Session, ApiError> {
    let id = Uuid::parse_str(raw_id).map_err(|_| invalid_session(owner))?;
    state
        .sessions
        .get(owner.id, id)?
        .ok_or_else(|| invalid_session(owner))
}

// =============================================================================
// Account handlers
// =============================================================================

/// POST /register - create a user and return their API token.
pub async fn register(
    State(state): State<AppState>,
    payload: Result<Json<RegisterRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let req = parse_json(payload)?;
    let username = req.username.trim();
    if username.is_empty() {
        return Err(ApiError::BadRequest("username must not be blank".to_string()));
    }
    if req.password.is_empty() {
        return Err(ApiError::BadRequest("password must not be blank".to_string()));
    }
    let email = req
        .email
        .as_deref()
        .map(str::trim)
        .filter(|e| !e.is_empty());

    let password_hash = hash_password(&req.password)?;
    let token = generate_token();
    let owner = state
        .owners
        .create(username, email, &password_hash, &token)?;
    tracing::info!(user_id = owner.id, username = %owner.username, "User registered");

    Ok((
        StatusCode::CREATED,
        Json(RegisterResponse {
            user_id: owner.id,
            username: owner.username,
            email: owner.email,
            token,
        }),
    ))
}

/// POST /token - exchange username and password for the API token.
pub async fn token(
    State(state): State<AppState>,
    payload: Result<Json<TokenRequest>, JsonRejection>,
) -> Result<Json<TokenResponse>, ApiError> {
    let req = parse_json(payload)?;
    let credentials = state.owners.find_credentials(req.username.trim())?;
    match credentials {
        Some(c) if verify_password(&req.password, &c.password_hash) => {
            Ok(Json(TokenResponse { token: c.api_token }))
        }
        _ => Err(ApiError::Unauthorized("Invalid username or password".to_string())),
    }
}

// =============================================================================
// Analysis session handlers
// =============================================================================

/// GET /analysis - list the caller's sessions, newest first.
pub async fn list_analyses(
    State(state): State<AppState>,
    Extension(AuthenticatedOwner(owner)): Extension<AuthenticatedOwner>,
) -> Result<Json<Vec<SessionResponse>>, ApiError> {
    let sessions = state.sessions.list(owner.id)?;
    Ok(Json(sessions.into_iter().map(SessionResponse::from).collect()))
}

/// POST /analysis - start a new session by analyzing a text.
///
/// The session only exists once the task has produced a title.
pub async fn create_analysis(
    State(state): State<AppState>,
    Extension(AuthenticatedOwner(owner)): Extension<AuthenticatedOwner>,
    payload: Result<Json<AnalysisRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let req = parse_json(payload)?;
    if req.text.trim().is_empty() {
        return Err(ApiError::BadRequest("text must not be blank".to_string()));
    }
    let title = req.title.as_deref().filter(|t| !t.is_empty());
    if let Some(title) = title {
        if title.chars().count() > MAX_TITLE_LENGTH {
            return Err(ApiError::BadRequest(format!(
                "title must be at most {} characters",
                MAX_TITLE_LENGTH
            )));
        }
    }

    let receipt = state
        .runner
        .dispatch_analysis(owner.id, &req.text, title)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(TaskCreatedResponse {
            session_id: receipt.session_id,
            task_id: receipt.task_id,
        }),
    ))
}

/// GET /analysis/{session_id} - a session with its messages in order.
pub async fn get_analysis(
    State(state): State<AppState>,
    Extension(AuthenticatedOwner(owner)): Extension<AuthenticatedOwner>,
    Path(session_id): Path<String>,
) -> Result<Json<SessionDetailsResponse>, ApiError> {
    let session = owned_session(&state, &owner, &session_id)?;
    let details = state
        .sessions
        .details(owner.id, session.id)?
        .ok_or_else(|| invalid_session(&owner))?;

    Ok(Json(SessionDetailsResponse {
        session_id: details.session.id,
        title: details.session.title,
        created_at: details.session.created_at,
        messages: details
            .turns
            .into_iter()
            .map(|t| MessageResponse {
                message_id: t.id,
                created_at: t.created_at,
                message: t.message,
            })
            .collect(),
    }))
}

/// DELETE /analysis/{session_id} - delete a session and all its messages.
pub async fn delete_analysis(
    State(state): State<AppState>,
    Extension(AuthenticatedOwner(owner)): Extension<AuthenticatedOwner>,
    Path(session_id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let session = owned_session(&state, &owner, &session_id)?;
    if !state.sessions.delete(owner.id, session.id)? {
        return Err(invalid_session(&owner));
    }
    tracing::info!(session_id = %session.id, user_id = owner.id, "Session deleted");
    Ok(StatusCode::NO_CONTENT)
}

/// POST /question - ask a follow-up question in one of the caller's sessions.
pub async fn ask_question(
    State(state): State<AppState>,
    Extension(AuthenticatedOwner(owner)): Extension<AuthenticatedOwner>,
    payload: Result<Json<QuestionRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError> {
    let req = parse_json(payload)?;
    if req.question.trim().is_empty() {
        return Err(ApiError::BadRequest("question must not be blank".to_string()));
    }
    if state.sessions.get(owner.id, req.session_id)?.is_none() {
        return Err(invalid_session(&owner));
    }

    let receipt = state
        .runner
        .dispatch_follow_up(req.session_id, &req.question)
        .await?;
    Ok((
        StatusCode::CREATED,
        Json(TaskCreatedResponse {
            session_id: receipt.session_id,
            task_id: receipt.task_id,
        }),
    ))
}

// =============================================================================
// Task and health handlers
// =============================================================================

/// GET /task/{task_id} - poll a task.
///
/// 202 while pending or running, 200 once succeeded, 500 once failed.
pub async fn task_status(
    State(state): State<AppState>,
    Path(task_id): Path<String>,
) -> Result<(StatusCode, Json<TaskStatusView>), ApiError> {
    let id = Uuid::parse_str(&task_id)
        .map_err(|_| ApiError::NotFound(format!("Task not found: {}", task_id)))?;
    let view = state.runner.get_status(id)?;
    let status = match view.outcome() {
        TaskOutcome::Accepted => StatusCode::ACCEPTED,
        TaskOutcome::Complete => StatusCode::OK,
        TaskOutcome::Errored => StatusCode::INTERNAL_SERVER_ERROR,
    };
    Ok((status, Json(view)))
}

/// GET /health - liveness probe.
pub async fn health(State(state): State<AppState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.start_time.elapsed().as_secs(),
    })
}

//! Integration tests for the HTTP API.
//!
//! Each test builds its own router over an in-memory database and a scripted
//! model, then drives it with `oneshot` requests.

use std::sync::Arc;
use std::time::Duration;

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;
use uuid::Uuid;

use mentor_api::auth::hash_password;
use mentor_api::handlers::{HealthResponse, RegisterResponse, TokenResponse};
use mentor_api::{create_router, AppState};
use mentor_assistant::{Assistant, MockChatModel, PromptCatalog, PromptRole, Purpose};
use mentor_core::config::MentorConfig;
use mentor_storage::{
    Database, OwnerRepository, SessionRepository, SqliteHistoryStore, TaskRepository,
};
use mentor_tasks::{TaskLedger, TaskRunner};

// =============================================================================
// Helpers
// =============================================================================

const TEST_TOKEN: &str = "test-token-12345";
const OTHER_TOKEN: &str = "other-token-67890";

struct TestApp {
    router: Router,
    model: Arc<MockChatModel>,
    owner_id: i64,
}

fn catalog() -> Arc<PromptCatalog> {
    Arc::new(PromptCatalog::with_templates([
        ((Purpose::TextAnalysis, PromptRole::System), "Analyze."),
        ((Purpose::TextAnalysis, PromptRole::Human), "Explain: "),
        ((Purpose::FollowUp, PromptRole::System), "Follow up."),
        ((Purpose::TitleGeneration, PromptRole::System), "Title."),
        ((Purpose::TitleGeneration, PromptRole::Human), "Title for: "),
    ]))
}

/// Fresh state with two users, "learner" (TEST_TOKEN) and "other" (OTHER_TOKEN).
fn make_app(model: MockChatModel) -> TestApp {
    let config = MentorConfig::default();
    let db = Database::in_memory().unwrap();
    let owners = OwnerRepository::new(db.clone());
    let sessions = SessionRepository::new(db.clone());
    let history = Arc::new(SqliteHistoryStore::new(db.clone()));

    let hash = hash_password("secret").unwrap();
    let owner = owners.create("learner", None, &hash, TEST_TOKEN).unwrap();
    owners.create("other", None, &hash, OTHER_TOKEN).unwrap();

    let model = Arc::new(model);
    let assistant = Arc::new(Assistant::new(catalog(), model.clone(), history));
    let runner = TaskRunner::start(
        &config.worker,
        assistant,
        owners.clone(),
        sessions.clone(),
        TaskLedger::new(TaskRepository::new(db)),
    );
    let state = AppState::new(config, owners, sessions, Arc::new(runner));

    TestApp {
        router: create_router(state),
        model,
        owner_id: owner.id,
    }
}

fn get_as(token: &str, uri: &str) -> Request<Body> {
    Request::get(uri)
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

fn authed_get(uri: &str) -> Request<Body> {
    get_as(TEST_TOKEN, uri)
}

fn authed_post_json(uri: &str, json: &Value) -> Request<Body> {
    Request::post(uri)
        .header("authorization", format!("Bearer {}", TEST_TOKEN))
        .header("content-type", "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

fn authed_delete(token: &str, uri: &str) -> Request<Body> {
    Request::delete(uri)
        .header("authorization", format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap()
}

fn post_json(uri: &str, json: &Value) -> Request<Body> {
    Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(json.to_string()))
        .unwrap()
}

async fn body_bytes(resp: axum::response::Response) -> Vec<u8> {
    axum::body::to_bytes(resp.into_body(), 1024 * 1024)
        .await
        .unwrap()
        .to_vec()
}

async fn body_json(resp: axum::response::Response) -> Value {
    serde_json::from_slice(&body_bytes(resp).await).unwrap()
}

/// Poll `/task/{id}` until it leaves the accepted state.
async fn wait_task(router: &Router, task_id: &str) -> (StatusCode, Value) {
    for _ in 0..200 {
        let resp = router
            .clone()
            .oneshot(authed_get(&format!("/task/{}", task_id)))
            .await
            .unwrap();
        let status = resp.status();
        if status != StatusCode::ACCEPTED {
            return (status, body_json(resp).await);
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("task {} did not finish", task_id);
}

/// Start an analysis with a title and wait for it; returns the session id.
async fn finished_analysis(app: &TestApp, text: &str, title: &str) -> String {
    let resp = app
        .router
        .clone()
        .oneshot(authed_post_json(
            "/analysis",
            &json!({ "text": text, "title": title }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = body_json(resp).await;
    let (status, _) = wait_task(&app.router, body["task_id"].as_str().unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    body["session_id"].as_str().unwrap().to_string()
}

// =============================================================================
// Health and accounts
// =============================================================================

#[tokio::test]
async fn health_is_public() {
    let app = make_app(MockChatModel::new());
    let resp = app
        .router
        .oneshot(Request::get("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body: HealthResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(body.status, "healthy");
}

#[tokio::test]
async fn register_then_exchange_password_for_token() {
    let app = make_app(MockChatModel::new());

    let resp = app
        .router
        .clone()
        .oneshot(post_json(
            "/register",
            &json!({ "username": "reader", "email": "r@example.com", "password": "pw" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let registered: RegisterResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(registered.username, "reader");
    assert_eq!(registered.email.as_deref(), Some("r@example.com"));
    assert_eq!(registered.token.len(), 64);

    let resp = app
        .router
        .clone()
        .oneshot(post_json(
            "/token",
            &json!({ "username": "reader", "password": "pw" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let token: TokenResponse = serde_json::from_slice(&body_bytes(resp).await).unwrap();
    assert_eq!(token.token, registered.token);

    // The new token authenticates.
    let resp = app
        .router
        .oneshot(get_as(&token.token, "/analysis"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn register_duplicate_username_conflicts() {
    let app = make_app(MockChatModel::new());
    let resp = app
        .router
        .oneshot(post_json(
            "/register",
            &json!({ "username": "learner", "password": "pw" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CONFLICT);
}

#[tokio::test]
async fn register_blank_password_rejected() {
    let app = make_app(MockChatModel::new());
    let resp = app
        .router
        .oneshot(post_json(
            "/register",
            &json!({ "username": "reader", "password": "" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn token_with_wrong_password_unauthorized() {
    let app = make_app(MockChatModel::new());
    let resp = app
        .router
        .oneshot(post_json(
            "/token",
            &json!({ "username": "learner", "password": "wrong" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn protected_routes_require_bearer_token() {
    let app = make_app(MockChatModel::new());

    let resp = app
        .router
        .clone()
        .oneshot(Request::get("/analysis").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = app
        .router
        .oneshot(get_as("not-a-real-token", "/analysis"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
    let body = body_json(resp).await;
    assert_eq!(body["error"], "unauthorized");
    assert_eq!(body["code"], 401);
}

// =============================================================================
// Analysis
// =============================================================================

#[tokio::test]
async fn analysis_creates_session_with_two_messages() {
    let app = make_app(MockChatModel::with_reply("Biomes are large ecological areas."));
    let session_id = finished_analysis(&app, "Biomes are regions.", "Biomes").await;

    let resp = app
        .router
        .clone()
        .oneshot(authed_get(&format!("/analysis/{}", session_id)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
    let body = body_json(resp).await;
    assert_eq!(body["title"], "Biomes");
    let messages = body["messages"].as_array().unwrap();
    assert_eq!(messages.len(), 2);
    assert_eq!(messages[0]["message"]["type"], "human");
    assert_eq!(
        messages[0]["message"]["content"],
        "Explain: Biomes are regions."
    );
    assert_eq!(messages[1]["message"]["type"], "ai");
    assert_eq!(
        messages[1]["message"]["content"],
        "Biomes are large ecological areas."
    );

    let resp = app.router.oneshot(authed_get("/analysis")).await.unwrap();
    let list = body_json(resp).await;
    assert_eq!(list.as_array().unwrap().len(), 1);
    assert_eq!(list[0]["session_id"], session_id.as_str());
}

#[tokio::test]
async fn analysis_task_result_is_the_answer() {
    let app = make_app(MockChatModel::with_responses(["Generated Title", "The answer"]));

    let resp = app
        .router
        .clone()
        .oneshot(authed_post_json("/analysis", &json!({ "text": "Some text" })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = body_json(resp).await;
    let (status, view) = wait_task(&app.router, body["task_id"].as_str().unwrap()).await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["status"], "succeeded");
    assert_eq!(view["result"], "The answer");
    assert_eq!(app.model.call_count(), 2);

    let resp = app
        .router
        .oneshot(authed_get(&format!(
            "/analysis/{}",
            body["session_id"].as_str().unwrap()
        )))
        .await
        .unwrap();
    assert_eq!(body_json(resp).await["title"], "Generated Title");
}

#[tokio::test]
async fn analysis_rejects_blank_text_and_long_title() {
    let app = make_app(MockChatModel::new());

    let resp = app
        .router
        .clone()
        .oneshot(authed_post_json("/analysis", &json!({ "text": "   " })))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = app
        .router
        .oneshot(authed_post_json(
            "/analysis",
            &json!({ "text": "text", "title": "x".repeat(256) }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    assert_eq!(app.model.call_count(), 0);
}

#[tokio::test]
async fn malformed_json_is_bad_request() {
    let app = make_app(MockChatModel::new());
    let req = Request::post("/analysis")
        .header("authorization", format!("Bearer {}", TEST_TOKEN))
        .header("content-type", "application/json")
        .body(Body::from("{not json"))
        .unwrap();
    let resp = app.router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn foreign_or_unknown_session_is_invalid() {
    let app = make_app(MockChatModel::new());
    let session_id = finished_analysis(&app, "text", "Mine").await;

    let resp = app
        .router
        .clone()
        .oneshot(get_as(OTHER_TOKEN, &format!("/analysis/{}", session_id)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    let message = body["message"].as_str().unwrap();
    assert!(message.starts_with("Invalid session for user other"));

    let resp = app
        .router
        .clone()
        .oneshot(authed_get(&format!("/analysis/{}", Uuid::new_v4())))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = body_json(resp).await;
    assert_eq!(
        body["message"],
        format!("Invalid session for user learner (user id: {}).", app.owner_id)
    );

    let resp = app
        .router
        .oneshot(authed_get("/analysis/not-a-uuid"))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn delete_session_removes_it() {
    let app = make_app(MockChatModel::new());
    let session_id = finished_analysis(&app, "text", "Doomed").await;

    // Someone else cannot delete it.
    let resp = app
        .router
        .clone()
        .oneshot(authed_delete(OTHER_TOKEN, &format!("/analysis/{}", session_id)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = app
        .router
        .clone()
        .oneshot(authed_delete(TEST_TOKEN, &format!("/analysis/{}", session_id)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);

    let resp = app
        .router
        .clone()
        .oneshot(authed_get(&format!("/analysis/{}", session_id)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);

    let resp = app.router.oneshot(authed_get("/analysis")).await.unwrap();
    assert!(body_json(resp).await.as_array().unwrap().is_empty());
}

// =============================================================================
// Follow-up questions
// =============================================================================

#[tokio::test]
async fn question_appends_to_session() {
    let app = make_app(MockChatModel::with_responses(["analysis", "A biome is..."]));
    let session_id = finished_analysis(&app, "Biomes are regions.", "Biomes").await;

    let resp = app
        .router
        .clone()
        .oneshot(authed_post_json(
            "/question",
            &json!({ "session_id": session_id, "question": "What is a biome?" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::CREATED);
    let body = body_json(resp).await;
    assert_eq!(body["session_id"], session_id.as_str());

    let (status, view) = wait_task(&app.router, body["task_id"].as_str().unwrap()).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(view["result"], "A biome is...");

    let resp = app
        .router
        .oneshot(authed_get(&format!("/analysis/{}", session_id)))
        .await
        .unwrap();
    let messages = body_json(resp).await["messages"].as_array().unwrap().clone();
    assert_eq!(messages.len(), 4);
    assert_eq!(messages[2]["message"]["content"], "What is a biome?");
    assert_eq!(messages[3]["message"]["content"], "A biome is...");
}

#[tokio::test]
async fn question_on_foreign_session_is_invalid() {
    let app = make_app(MockChatModel::new());
    let session_id = finished_analysis(&app, "text", "Mine").await;

    let req = Request::post("/question")
        .header("authorization", format!("Bearer {}", OTHER_TOKEN))
        .header("content-type", "application/json")
        .body(Body::from(
            json!({ "session_id": session_id, "question": "Mine now?" }).to_string(),
        ))
        .unwrap();
    let resp = app.router.oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    // Only the analysis reached the model.
    assert_eq!(app.model.call_count(), 1);
}

#[tokio::test]
async fn blank_question_rejected() {
    let app = make_app(MockChatModel::new());
    let session_id = finished_analysis(&app, "text", "Mine").await;

    let resp = app
        .router
        .oneshot(authed_post_json(
            "/question",
            &json!({ "session_id": session_id, "question": "" }),
        ))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

// =============================================================================
// Task status
// =============================================================================

#[tokio::test]
async fn failed_task_reports_500_with_error() {
    let app = make_app(MockChatModel::failing("upstream timeout"));

    let resp = app
        .router
        .clone()
        .oneshot(authed_post_json(
            "/analysis",
            &json!({ "text": "text", "title": "Title" }),
        ))
        .await
        .unwrap();
    let body = body_json(resp).await;
    let (status, view) = wait_task(&app.router, body["task_id"].as_str().unwrap()).await;

    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(view["status"], "failed");
    assert!(view["error"].as_str().unwrap().contains("upstream timeout"));
    assert!(view.get("result").map_or(true, Value::is_null));
}

#[tokio::test]
async fn pending_task_reports_202() {
    let app = make_app(MockChatModel::new().with_delay(Duration::from_millis(200)));

    let resp = app
        .router
        .clone()
        .oneshot(authed_post_json(
            "/analysis",
            &json!({ "text": "text", "title": "Slow" }),
        ))
        .await
        .unwrap();
    let body = body_json(resp).await;
    let task_id = body["task_id"].as_str().unwrap();

    let resp = app
        .router
        .clone()
        .oneshot(authed_get(&format!("/task/{}", task_id)))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::ACCEPTED);

    let (status, _) = wait_task(&app.router, task_id).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn unknown_task_is_not_found() {
    let app = make_app(MockChatModel::new());

    let resp = app
        .router
        .clone()
        .oneshot(authed_get(&format!("/task/{}", Uuid::new_v4())))
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);

    let resp = app.router.oneshot(authed_get("/task/garbage")).await.unwrap();
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
}

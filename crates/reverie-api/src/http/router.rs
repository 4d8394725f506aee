//! Axum router configuration with middleware.
//!
//! REST routes are under `/api/v1/`, the push socket is at `/ws`.
//! Middleware: CORS, tracing.

use axum::Router;
use axum::extract::State;
use axum::routing::{get, post};
use serde::Serialize;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::http::handlers;
use crate::state::{AppState, RelayStatus};

/// Build the complete API router with all routes and middleware.
pub fn build_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let api_routes = Router::new()
        // Chat sessions
        .route(
            "/chat",
            post(handlers::chat::create_session).get(handlers::chat::list_sessions),
        )
        .route(
            "/chat/{id}",
            get(handlers::chat::get_session).delete(handlers::chat::delete_session),
        )
        .route("/chat/{id}/messages", post(handlers::chat::append_message))
        // Account
        .route("/me", get(handlers::account::me))
        // Relay
        .route("/relay/auth-success", post(handlers::relay::auth_success))
        .route("/relay/users/{external_id}", get(handlers::relay::get_user))
        .route("/relay/interpret", post(handlers::relay::interpret))
        .route(
            "/relay/sessions/{id}/messages",
            post(handlers::relay::append_message),
        );

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/ws", get(handlers::ws::ws_handler))
        .route("/health", get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

#[derive(Debug, Serialize)]
struct HealthBody {
    status: &'static str,
    version: &'static str,
    database: &'static str,
    connections: usize,
    relay_enabled: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    relay: Option<RelayStatus>,
}

/// GET /health - Liveness, database reachability and relay status (no auth required).
async fn health_check(State(state): State<AppState>) -> axum::Json<HealthBody> {
    let database = match sqlx::query("SELECT 1").execute(&state.db_pool.reader).await {
        Ok(_) => "ok",
        Err(e) => {
            tracing::warn!(error = %e, "health check database probe failed");
            "unavailable"
        }
    };

    axum::Json(HealthBody {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        database,
        connections: state.push.connection_count(),
        relay_enabled: state.relay_secret.is_some(),
        relay: state.relay_status.read().await.clone(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    use axum::Json;
    use reverie_types::config::ReverieConfig;
    use reverie_types::user::{NewUser, SubscriptionTier};
    use serde_json::{Value, json};

    const RELAY_SECRET: &str = "relay-test-secret";

    /// Fake oracle: everything mentioning "dream" is in-domain; interpretations echo the prompt.
    async fn spawn_oracle() -> String {
        let router = Router::new()
            .route(
                "/classify-intent",
                post(|Json(body): Json<Value>| async move {
                    let text = body["text"].as_str().unwrap_or_default().to_lowercase();
                    Json(json!({ "is_dream_related": text.contains("dream") }))
                }),
            )
            .route(
                "/interpret",
                post(|Json(body): Json<Value>| async move {
                    let text = body["new_message_text"].as_str().unwrap_or_default().to_string();
                    Json(json!({ "interpretation": format!("Meaning of: {text}") }))
                }),
            );
        serve(router).await
    }

    async fn serve(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    struct TestApp {
        base: String,
        state: AppState,
        client: reqwest::Client,
    }

    impl TestApp {
        async fn start() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let data_dir = dir.path().to_path_buf();
            // Leak tempdir so it lives for the test
            std::mem::forget(dir);

            let mut config = ReverieConfig::default();
            config.oracle.base_url = spawn_oracle().await;
            config.oracle.timeout_secs = 5;
            config.relay.secret = Some(RELAY_SECRET.to_string());

            let state = AppState::build(data_dir, config).await.unwrap();
            let base = serve(build_router(state.clone())).await;
            Self {
                base,
                state,
                client: reqwest::Client::builder()
                    .timeout(Duration::from_secs(10))
                    .build()
                    .unwrap(),
            }
        }

        async fn user(&self, tier: SubscriptionTier, external_id: Option<&str>) -> String {
            let user = self
                .state
                .accounts
                .register_user(NewUser {
                    name: Some("Mira".to_string()),
                    birth_date: None,
                    external_id: external_id.map(str::to_string),
                    tier,
                })
                .await
                .unwrap();
            self.state.tokens.issue(&user.id).await.unwrap()
        }

        async fn post(&self, path: &str, token: &str, body: Value) -> (u16, Value) {
            let resp = self
                .client
                .post(format!("{}{path}", self.base))
                .bearer_auth(token)
                .json(&body)
                .send()
                .await
                .unwrap();
            let status = resp.status().as_u16();
            (status, resp.json().await.unwrap_or(Value::Null))
        }

        async fn get(&self, path: &str, token: &str) -> (u16, Value) {
            let resp = self
                .client
                .get(format!("{}{path}", self.base))
                .bearer_auth(token)
                .send()
                .await
                .unwrap();
            let status = resp.status().as_u16();
            (status, resp.json().await.unwrap_or(Value::Null))
        }
    }

    #[tokio::test]
    async fn test_health_reports_database_and_relay() {
        let app = TestApp::start().await;
        let body: Value = app
            .client
            .get(format!("{}/health", app.base))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body["status"], "ok");
        assert_eq!(body["database"], "ok");
        assert_eq!(body["relay_enabled"], true);
    }

    #[tokio::test]
    async fn test_missing_token_is_unauthorized() {
        let app = TestApp::start().await;
        let resp = app
            .client
            .get(format!("{}/api/v1/chat", app.base))
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 401);
        let body: Value = resp.json().await.unwrap();
        assert_eq!(body["errors"][0]["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_session_lifecycle_over_http() {
        let app = TestApp::start().await;
        let token = app.user(SubscriptionTier::Free, None).await;

        let (status, body) = app
            .post("/api/v1/chat", &token, json!({ "text": "I had a dream about the sea" }))
            .await;
        assert_eq!(status, 201);
        assert_eq!(
            body["data"]["assistantText"],
            "Meaning of: I had a dream about the sea"
        );
        let session_id = body["data"]["sessionId"].as_str().unwrap().to_string();

        let (status, body) = app
            .post(
                &format!("/api/v1/chat/{session_id}/messages"),
                &token,
                json!({ "text": "The water was warm" }),
            )
            .await;
        assert_eq!(status, 200);
        assert_eq!(body["data"]["assistantText"], "Meaning of: The water was warm");

        let (status, body) = app.get("/api/v1/chat", &token).await;
        assert_eq!(status, 200);
        assert_eq!(body["data"]["items"].as_array().unwrap().len(), 1);
        assert_eq!(body["data"]["pagination"]["totalItems"], 1);

        let (status, body) = app.get(&format!("/api/v1/chat/{session_id}"), &token).await;
        assert_eq!(status, 200);
        assert_eq!(body["data"]["messages"].as_array().unwrap().len(), 4);

        let (status, body) = app.get("/api/v1/me", &token).await;
        assert_eq!(status, 200);
        assert_eq!(body["data"]["quota"]["remainingInterpretations"], 1);

        let resp = app
            .client
            .delete(format!("{}/api/v1/chat/{session_id}", app.base))
            .bearer_auth(&token)
            .send()
            .await
            .unwrap();
        assert_eq!(resp.status().as_u16(), 204);

        let (status, body) = app.get(&format!("/api/v1/chat/{session_id}"), &token).await;
        assert_eq!(status, 404);
        assert_eq!(body["errors"][0]["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_foreign_session_is_forbidden() {
        let app = TestApp::start().await;
        let owner = app.user(SubscriptionTier::Free, None).await;
        let intruder = app.user(SubscriptionTier::Free, None).await;

        let (_, body) = app
            .post("/api/v1/chat", &owner, json!({ "text": "A dream of falling" }))
            .await;
        let session_id = body["data"]["sessionId"].as_str().unwrap().to_string();

        let (status, body) = app.get(&format!("/api/v1/chat/{session_id}"), &intruder).await;
        assert_eq!(status, 403);
        assert_eq!(body["errors"][0]["code"], "FORBIDDEN");
    }

    #[tokio::test]
    async fn test_exhausted_quota_is_denied() {
        let app = TestApp::start().await;
        let token = app.user(SubscriptionTier::Free, None).await;

        for i in 0..3 {
            let (status, _) = app
                .post("/api/v1/chat", &token, json!({ "text": format!("dream number {i}") }))
                .await;
            assert_eq!(status, 201);
        }

        let (status, body) = app
            .post("/api/v1/chat", &token, json!({ "text": "one more dream" }))
            .await;
        assert_eq!(status, 403);
        assert_eq!(body["errors"][0]["code"], "NO_INTERPRETATIONS");
        assert!(body["data"].is_null());
    }

    #[tokio::test]
    async fn test_empty_prompt_is_validation_error() {
        let app = TestApp::start().await;
        let token = app.user(SubscriptionTier::Free, None).await;

        let (status, body) = app.post("/api/v1/chat", &token, json!({ "text": "   " })).await;
        assert_eq!(status, 400);
        assert_eq!(body["errors"][0]["code"], "VALIDATION_ERROR");

        let (status, _) = app.post("/api/v1/chat", &token, json!({ "wrong": 1 })).await;
        assert_eq!(status, 400);
    }

    #[tokio::test]
    async fn test_relay_interpret_and_lookup() {
        let app = TestApp::start().await;
        app.user(SubscriptionTier::Premium, Some("tg-42")).await;

        let (status, body) = app
            .post(
                "/api/v1/relay/interpret",
                RELAY_SECRET,
                json!({ "externalUserId": "tg-42", "text": "dream of a lighthouse" }),
            )
            .await;
        assert_eq!(status, 201);
        assert_eq!(body["data"]["assistantText"], "Meaning of: dream of a lighthouse");

        let (status, body) = app.get("/api/v1/relay/users/tg-42", RELAY_SECRET).await;
        assert_eq!(status, 200);
        assert_eq!(body["data"]["tier"], "PREMIUM");
        assert_eq!(body["data"]["quota"]["remainingInterpretations"], 19);

        let (status, _) = app.get("/api/v1/relay/users/unknown", RELAY_SECRET).await;
        assert_eq!(status, 404);
    }

    #[tokio::test]
    async fn test_relay_endpoints_reject_user_tokens() {
        let app = TestApp::start().await;
        let token = app.user(SubscriptionTier::Free, Some("tg-7")).await;

        let (status, _) = app.get("/api/v1/relay/users/tg-7", &token).await;
        assert_eq!(status, 401);

        // And the relay secret is not a user credential.
        let (status, _) = app.get("/api/v1/me", RELAY_SECRET).await;
        assert_eq!(status, 401);
    }
}

//! HTTP client for the external interpretation oracle.
//!
//! Two JSON endpoints under a configurable base URL:
//! - `POST {base}/classify-intent` with `{text}` returns `{is_dream_related}`
//! - `POST {base}/interpret` with an [`InterpretRequest`] returns `{interpretation}`
//!
//! A 422 response carries `{detail: [{field, msg}]}` and maps to
//! [`OracleError::Validation`].

use std::time::Duration;

use reqwest::StatusCode;
use reverie_core::oracle::provider::InterpretationOracle;
use reverie_types::config::OracleConfig;
use reverie_types::error::OracleError;
use reverie_types::oracle::{
    ClassifyRequest, ClassifyResponse, InterpretRequest, InterpretResponse, ValidationBody,
};
use serde::Serialize;
use serde::de::DeserializeOwned;

pub struct HttpOracle {
    client: reqwest::Client,
    base_url: String,
}

impl HttpOracle {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, OracleError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| OracleError::Transport(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    pub fn from_config(config: &OracleConfig) -> Result<Self, OracleError> {
        Self::new(&config.base_url, Duration::from_secs(config.timeout_secs))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    async fn post_json<B, R>(&self, path: &str, body: &B) -> Result<R, OracleError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let response = self
            .client
            .post(self.url(path))
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    OracleError::Timeout
                } else {
                    OracleError::Transport(format!("HTTP request failed: {e}"))
                }
            })?;

        let status = response.status();
        if status == StatusCode::UNPROCESSABLE_ENTITY {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<ValidationBody>(&body)
                .map(|b| b.detail)
                .unwrap_or_default();
            return Err(OracleError::Validation(detail));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OracleError::Status {
                status: status.as_u16(),
                body,
            });
        }

        response.json().await.map_err(|e| {
            if e.is_timeout() {
                OracleError::Timeout
            } else {
                OracleError::Deserialization(format!("failed to parse response: {e}"))
            }
        })
    }
}

impl InterpretationOracle for HttpOracle {
    async fn classify(&self, text: &str) -> Result<bool, OracleError> {
        let body = ClassifyRequest {
            text: text.to_string(),
        };
        let response: ClassifyResponse = self.post_json("/classify-intent", &body).await?;
        Ok(response.is_dream_related)
    }

    async fn interpret(&self, request: &InterpretRequest) -> Result<String, OracleError> {
        let response: InterpretResponse = self.post_json("/interpret", request).await?;
        Ok(response.interpretation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode as AxumStatus;
    use axum::routing::post;
    use axum::{Json, Router};
    use reverie_types::oracle::UserInfo;
    use serde_json::{Value, json};

    async fn spawn_fake(router: Router) -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}")
    }

    fn request(text: &str) -> InterpretRequest {
        InterpretRequest {
            user_info: UserInfo {
                name: "Mira".to_string(),
                birth_date: None,
            },
            new_message_text: text.to_string(),
            history: vec![],
            previous_dreams: vec![],
        }
    }

    #[tokio::test]
    async fn test_classify_and_interpret() {
        let router = Router::new()
            .route(
                "/classify-intent",
                post(|Json(body): Json<Value>| async move {
                    let dreamy = body["text"].as_str().unwrap_or_default().contains("dream");
                    Json(json!({ "is_dream_related": dreamy }))
                }),
            )
            .route(
                "/interpret",
                post(|Json(body): Json<Value>| async move {
                    let text = body["new_message_text"].as_str().unwrap_or_default().to_string();
                    Json(json!({ "interpretation": format!("About: {text}") }))
                }),
            );
        let base = spawn_fake(router).await;
        let oracle = HttpOracle::new(format!("{base}/"), Duration::from_secs(5)).unwrap();

        assert!(oracle.classify("I had a dream about whales").await.unwrap());
        assert!(!oracle.classify("what is the weather").await.unwrap());
        assert_eq!(
            oracle.interpret(&request("whales")).await.unwrap(),
            "About: whales"
        );
    }

    #[tokio::test]
    async fn test_validation_error_is_parsed() {
        let router = Router::new().route(
            "/interpret",
            post(|| async {
                (
                    AxumStatus::UNPROCESSABLE_ENTITY,
                    Json(json!({
                        "detail": [{ "field": "body.new_message_text", "msg": "too short" }]
                    })),
                )
            }),
        );
        let base = spawn_fake(router).await;
        let oracle = HttpOracle::new(base, Duration::from_secs(5)).unwrap();

        match oracle.interpret(&request("x")).await.unwrap_err() {
            OracleError::Validation(detail) => {
                assert_eq!(detail.len(), 1);
                assert_eq!(detail[0].field.as_deref(), Some("body.new_message_text"));
                assert_eq!(detail[0].message.as_deref(), Some("too short"));
            }
            other => panic!("expected validation error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_server_error_maps_to_status() {
        let router = Router::new().route(
            "/interpret",
            post(|| async { (AxumStatus::SERVICE_UNAVAILABLE, "overloaded") }),
        );
        let base = spawn_fake(router).await;
        let oracle = HttpOracle::new(base, Duration::from_secs(5)).unwrap();

        match oracle.interpret(&request("x")).await.unwrap_err() {
            OracleError::Status { status, body } => {
                assert_eq!(status, 503);
                assert_eq!(body, "overloaded");
            }
            other => panic!("expected status error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_slow_oracle_times_out() {
        let router = Router::new().route(
            "/interpret",
            post(|| async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                Json(json!({ "interpretation": "late" }))
            }),
        );
        let base = spawn_fake(router).await;
        let oracle = HttpOracle::new(base, Duration::from_millis(100)).unwrap();

        assert!(matches!(
            oracle.interpret(&request("x")).await.unwrap_err(),
            OracleError::Timeout
        ));
    }

    #[tokio::test]
    async fn test_unreachable_oracle_is_transport_error() {
        // Port 9 (discard) is not listening on loopback in test environments.
        let oracle = HttpOracle::new("http://127.0.0.1:9", Duration::from_secs(2)).unwrap();
        let err = oracle.classify("dream").await.unwrap_err();
        assert!(matches!(err, OracleError::Transport(_) | OracleError::Timeout));
    }
}

//! HTTP relay between chat front-ends and the model backend.
//!
//! `POST /api/chat` validates the request, forwards it upstream and pipes the
//! streamed reply back without buffering. Upstream failures are normalized
//! into `{"error": …}` bodies by [`error::RelayError`].

pub mod error;
pub mod handler;
pub mod openai;
pub mod upstream;

use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use std::future::Future;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::info;

use crate::core::config::Config;
use upstream::Upstream;

#[derive(Clone)]
pub struct RelayState {
    pub client: reqwest::Client,
    pub upstream: Arc<Upstream>,
}

impl RelayState {
    pub fn new(client: reqwest::Client, upstream: Upstream) -> Self {
        Self {
            client,
            upstream: Arc::new(upstream),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(reqwest::Client::new(), Upstream::from_config(config))
    }
}

#[derive(Serialize)]
struct Health {
    status: &'static str,
}

async fn health() -> Json<Health> {
    Json(Health { status: "ok" })
}

pub fn build_router(state: RelayState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/chat", post(handler::handle_chat))
        .with_state(state)
}

/// Serves the relay on `bind` until `shutdown` resolves.
pub async fn serve<F>(bind: &str, state: RelayState, shutdown: F) -> std::io::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let listener = TcpListener::bind(bind).await?;
    info!(
        address = %listener.local_addr()?,
        upstream = %state.upstream.describe(),
        "Relay listening"
    );

    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(shutdown)
        .await?;

    info!("Relay stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ErrorBody;
    use crate::utils::test_utils::{chunked_body, spawn_router, test_client, unreachable_url};
    use axum::body::{to_bytes, Body};
    use axum::http::{header, Request, StatusCode};
    use axum::response::Response;
    use serde_json::Value;
    use std::sync::Mutex;
    use tower::ServiceExt;

    fn router_for(backend_url: &str) -> Router {
        build_router(RelayState::new(
            test_client(),
            Upstream::Backend {
                base_url: backend_url.to_string(),
            },
        ))
    }

    fn chat_request(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/chat")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_text(response: Response) -> String {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    async fn error_of(response: Response) -> String {
        let text = body_text(response).await;
        serde_json::from_str::<ErrorBody>(&text).unwrap().error
    }

    async fn backend_with_status(status: StatusCode, body: &'static str) -> String {
        let router = Router::new().route("/chat/stream", post(move || async move { (status, body) }));
        spawn_router(router).await
    }

    #[tokio::test]
    async fn health_reports_ok() {
        let response = router_for("http://backend.test")
            .oneshot(Request::get("/health").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_text(response).await, r#"{"status":"ok"}"#);
    }

    #[tokio::test]
    async fn missing_or_empty_message_is_rejected() {
        for body in [r#"{}"#, r#"{"message":null}"#, r#"{"message":"","history":[]}"#] {
            let response = router_for("http://backend.test")
                .oneshot(chat_request(body))
                .await
                .unwrap();

            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {body}");
            assert_eq!(body_text(response).await, "Message is required");
        }
    }

    #[tokio::test]
    async fn unparseable_body_is_internal_error() {
        let response = router_for("http://backend.test")
            .oneshot(chat_request("{not json"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(error_of(response).await, "Internal server error");
    }

    #[tokio::test]
    async fn success_streams_backend_body_unchanged() {
        let received = std::sync::Arc::new(Mutex::new(None::<Value>));
        let backend = {
            let received = std::sync::Arc::clone(&received);
            Router::new().route(
                "/chat/stream",
                post(move |Json(body): Json<Value>| {
                    let received = std::sync::Arc::clone(&received);
                    async move {
                        *received.lock().unwrap() = Some(body);
                        chunked_body(vec![
                            b"data: {\"token\":\"Hel\"}\n\ndata: {\"tok".to_vec(),
                            b"en\":\"lo\"}\n\n: ping\n\n".to_vec(),
                            b"data: [DONE]\n\n".to_vec(),
                        ])
                    }
                }),
            )
        };
        let backend_url = spawn_router(backend).await;

        let response = router_for(&backend_url)
            .oneshot(chat_request(
                r#"{"message":"hi","history":[{"role":"user","content":"earlier"},{"role":"assistant","content":"reply"}]}"#,
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::CONTENT_TYPE], "text/event-stream");
        assert_eq!(headers[header::CACHE_CONTROL], "no-cache");
        assert_eq!(headers[header::CONNECTION], "keep-alive");
        assert_eq!(
            body_text(response).await,
            "data: {\"token\":\"Hel\"}\n\ndata: {\"token\":\"lo\"}\n\n: ping\n\ndata: [DONE]\n\n"
        );

        let forwarded = received.lock().unwrap().clone().unwrap();
        assert_eq!(forwarded["message"], "hi");
        assert_eq!(forwarded["history"].as_array().map(Vec::len), Some(2));
        assert_eq!(forwarded["history"][1]["role"], "assistant");
    }

    #[tokio::test]
    async fn whitespace_message_is_forwarded() {
        let backend = Router::new().route(
            "/chat/stream",
            post(|| async { chunked_body(vec![b"data: [DONE]\n\n".to_vec()]) }),
        );
        let backend_url = spawn_router(backend).await;

        let response = router_for(&backend_url)
            .oneshot(chat_request(r#"{"message":"   "}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn backend_error_detail_is_normalized() {
        let backend_url =
            backend_with_status(StatusCode::TOO_MANY_REQUESTS, r#"{"detail":"rate limited"}"#).await;

        let response = router_for(&backend_url)
            .oneshot(chat_request(r#"{"message":"hi"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(error_of(response).await, "rate limited");
    }

    #[tokio::test]
    async fn backend_plain_text_error_is_passed_through() {
        let backend_url =
            backend_with_status(StatusCode::BAD_GATEWAY, "  upstream\n exploded  ").await;

        let response = router_for(&backend_url)
            .oneshot(chat_request(r#"{"message":"hi"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        assert_eq!(error_of(response).await, "upstream exploded");
    }

    #[tokio::test]
    async fn backend_empty_error_uses_status_message() {
        let backend_url = backend_with_status(StatusCode::INTERNAL_SERVER_ERROR, "").await;

        let response = router_for(&backend_url)
            .oneshot(chat_request(r#"{"message":"hi"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(
            error_of(response).await,
            "Backend request failed with status 500"
        );
    }

    #[tokio::test]
    async fn unreachable_backend_is_service_unavailable() {
        let backend_url = unreachable_url().await;

        let response = router_for(&backend_url)
            .oneshot(chat_request(r#"{"message":"hi"}"#))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        let error = error_of(response).await;
        assert!(error.contains(&backend_url), "error: {error}");
        assert!(error.contains("Verify that the backend is running"));
    }
}

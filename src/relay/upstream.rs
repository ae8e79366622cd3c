use axum::body::Body;
use axum::http::header;
use axum::response::{IntoResponse, Response};
use tracing::{debug, warn};

use crate::api::ChatRequest;
use crate::core::config::{Config, UpstreamKind};
use crate::core::constants::BACKEND_STREAM_ENDPOINT;
use crate::relay::error::{extract_backend_error, RelayError};
use crate::relay::openai::OpenAiUpstream;
use crate::utils::url::{construct_api_url, normalize_base_url};

/// The service chat requests are forwarded to.
#[derive(Debug, Clone)]
pub enum Upstream {
    /// A backend that already speaks the `{token}` frame contract.
    Backend { base_url: String },
    OpenAi(OpenAiUpstream),
}

impl Upstream {
    pub fn from_config(config: &Config) -> Self {
        match config.upstream() {
            UpstreamKind::Backend => Upstream::Backend {
                base_url: normalize_base_url(config.backend_url()),
            },
            UpstreamKind::OpenAi => Upstream::OpenAi(OpenAiUpstream::from_config(&config.openai)),
        }
    }

    pub fn describe(&self) -> String {
        match self {
            Upstream::Backend { base_url } => format!("backend at {base_url}"),
            Upstream::OpenAi(openai) => format!("OpenAI-compatible API at {}", openai.base_url()),
        }
    }

    pub async fn forward(
        &self,
        client: &reqwest::Client,
        request: ChatRequest,
    ) -> Result<Response, RelayError> {
        match self {
            Upstream::Backend { base_url } => forward_to_backend(client, base_url, &request).await,
            Upstream::OpenAi(openai) => openai.forward(client, &request).await,
        }
    }
}

async fn forward_to_backend(
    client: &reqwest::Client,
    base_url: &str,
    request: &ChatRequest,
) -> Result<Response, RelayError> {
    let url = construct_api_url(base_url, BACKEND_STREAM_ENDPOINT);
    debug!(url = %url, history = request.history.len(), "Forwarding chat request");

    let response = client
        .post(&url)
        .json(request)
        .send()
        .await
        .map_err(|err| RelayError::from_send_error(err, base_url))?;

    let response = check_status(response).await?;
    Ok(event_stream_response(Body::from_stream(
        response.bytes_stream(),
    )))
}

/// Reads a failed upstream response into a [`RelayError::Backend`].
pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, RelayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let message = extract_backend_error(status, &body);
    warn!(status = status.as_u16(), %message, "Upstream returned an error");
    Err(RelayError::Backend { status, message })
}

pub(crate) fn event_stream_response(body: Body) -> Response {
    (
        [
            (header::CONTENT_TYPE, "text/event-stream"),
            (header::CACHE_CONTROL, "no-cache"),
            (header::CONNECTION, "keep-alive"),
        ],
        body,
    )
        .into_response()
}

//! Direct upstream to an OpenAI-compatible `chat/completions` endpoint.
//!
//! Upstream deltas are re-framed into the same `{token}` / `[DONE]` frames a
//! backend would send, so front-ends cannot tell the two apart.

use axum::body::Body;
use axum::response::Response;
use futures_util::StreamExt;
use std::convert::Infallible;
use tokio::sync::mpsc;
use tracing::{debug, trace, warn};

use crate::api::{ChatCompletionRequest, ChatMessage, ChatRequest, ChatResponse};
use crate::core::config::OpenAiConfig;
use crate::core::sse::{
    done_frame, error_frame, extract_data_payload, token_frame, LineBuffer, DONE_MARKER,
};
use crate::relay::error::RelayError;
use crate::relay::upstream::{check_status, event_stream_response};
use crate::utils::url::{construct_api_url, normalize_base_url};

const COMPLETIONS_ENDPOINT: &str = "chat/completions";
const FRAME_BUFFER: usize = 32;

#[derive(Debug, Clone)]
pub struct OpenAiUpstream {
    base_url: String,
    api_key: Option<String>,
    model: Option<String>,
    system_prompt: String,
    max_tokens: u32,
    temperature: f32,
    top_p: f32,
}

impl OpenAiUpstream {
    pub fn from_config(config: &OpenAiConfig) -> Self {
        Self {
            base_url: normalize_base_url(config.base_url()),
            api_key: config.api_key.clone(),
            model: config.model.clone(),
            system_prompt: config.system_prompt().to_string(),
            max_tokens: config.max_tokens(),
            temperature: config.temperature(),
            top_p: config.top_p(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn completion_request(&self, model: &str, request: &ChatRequest) -> ChatCompletionRequest {
        let mut messages = Vec::with_capacity(request.history.len() + 2);
        messages.push(ChatMessage {
            role: "system".to_string(),
            content: self.system_prompt.clone(),
        });
        messages.extend(request.history.iter().map(ChatMessage::from));
        messages.push(ChatMessage {
            role: "user".to_string(),
            content: request.message.clone(),
        });

        ChatCompletionRequest {
            model: model.to_string(),
            messages,
            stream: true,
            max_tokens: Some(self.max_tokens),
            temperature: Some(self.temperature),
            top_p: Some(self.top_p),
        }
    }

    pub async fn forward(
        &self,
        client: &reqwest::Client,
        request: &ChatRequest,
    ) -> Result<Response, RelayError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| RelayError::Internal("OpenAI API key is not configured".to_string()))?;
        let model = self
            .model
            .as_deref()
            .ok_or_else(|| RelayError::Internal("OpenAI model is not configured".to_string()))?;

        let url = construct_api_url(&self.base_url, COMPLETIONS_ENDPOINT);
        let body = self.completion_request(model, request);
        debug!(url = %url, model, messages = body.messages.len(), "Sending completion request");

        let response = client
            .post(&url)
            .bearer_auth(api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| RelayError::from_send_error(err, &self.base_url))?;
        let response = check_status(response).await?;

        let (tx, rx) = mpsc::channel::<String>(FRAME_BUFFER);
        tokio::spawn(pump_frames(response, tx));

        let frames = futures_util::stream::unfold(rx, |mut rx| async move {
            rx.recv()
                .await
                .map(|frame| (Ok::<_, Infallible>(frame), rx))
        });
        Ok(event_stream_response(Body::from_stream(frames)))
    }
}

/// Reads upstream chunks and sends re-framed output until the upstream
/// closes or the client goes away.
async fn pump_frames(response: reqwest::Response, tx: mpsc::Sender<String>) {
    let mut stream = response.bytes_stream();
    let mut lines = LineBuffer::new();

    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(bytes) => {
                for frame in lines.push(&bytes).iter().filter_map(|line| reframe_line(line)) {
                    if tx.send(frame).await.is_err() {
                        debug!("Client disconnected, dropping upstream stream");
                        return;
                    }
                }
            }
            Err(err) => {
                warn!(error = %err, "Upstream stream interrupted");
                let _ = tx.send(error_frame("Stream interrupted")).await;
                return;
            }
        }
    }

    if let Some(frame) = lines.finish().as_deref().and_then(reframe_line) {
        let _ = tx.send(frame).await;
    }
}

/// Converts one upstream line into an outbound frame, if it carries text or
/// the terminator.
pub fn reframe_line(line: &str) -> Option<String> {
    let payload = extract_data_payload(line)?;
    if payload.is_empty() {
        return None;
    }
    if payload == DONE_MARKER {
        return Some(done_frame());
    }

    let chunk = match serde_json::from_str::<ChatResponse>(payload) {
        Ok(chunk) => chunk,
        Err(err) => {
            trace!(payload, error = %err, "Skipping undecodable upstream chunk");
            return None;
        }
    };
    let content = chunk.choices.into_iter().next()?.delta.content?;
    if content.is_empty() {
        return None;
    }
    Some(token_frame(&content))
}

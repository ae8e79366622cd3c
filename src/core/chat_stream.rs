use futures_util::StreamExt;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::api::{ChatRequest, ErrorBody};
use crate::core::constants::CHAT_ENDPOINT;
use crate::core::sse::{SseDecoder, StreamEvent};
use crate::utils::url::construct_api_url;

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum StreamMessage {
    /// The relay accepted the request and the body is about to stream.
    Opened,
    Chunk(String),
    Error(String),
    End,
}

pub struct StreamParams {
    pub client: reqwest::Client,
    pub relay_url: String,
    pub request: ChatRequest,
    pub cancel_token: tokio_util::sync::CancellationToken,
    pub stream_id: u64,
}

type StreamSender = mpsc::UnboundedSender<(StreamMessage, u64)>;

/// Extracts the message from a relay `{error}` body, tolerating bodies that
/// are not JSON at all.
fn relay_error_message(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(value) => serde_json::from_value::<ErrorBody>(value)
            .ok()
            .map(|body| body.error)
            .filter(|error| !error.trim().is_empty())
            .unwrap_or_else(|| "Failed to fetch".to_string()),
        Err(_) => "Unknown error".to_string(),
    }
}

/// Forwards one decoded event. Returns `true` once the stream must stop.
fn forward_event(event: StreamEvent, tx: &StreamSender, stream_id: u64) -> bool {
    match event {
        StreamEvent::Token(text) => {
            let _ = tx.send((StreamMessage::Chunk(text), stream_id));
            false
        }
        // The terminator is informational; the body closing ends the stream.
        StreamEvent::Done => false,
        StreamEvent::Error(message) => {
            let _ = tx.send((StreamMessage::Error(message), stream_id));
            true
        }
    }
}

async fn run_stream(
    client: reqwest::Client,
    relay_url: String,
    request: ChatRequest,
    tx: &StreamSender,
    stream_id: u64,
) {
    let chat_url = construct_api_url(&relay_url, CHAT_ENDPOINT);
    debug!(
        stream_id,
        url = %chat_url,
        history = request.history.len(),
        "Sending chat request"
    );

    let response = match client.post(&chat_url).json(&request).send().await {
        Ok(response) => response,
        Err(err) => {
            warn!(stream_id, error = %err, "Chat relay request failed");
            let _ = tx.send((
                StreamMessage::Error("Failed to reach the chat relay".to_string()),
                stream_id,
            ));
            return;
        }
    };

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let message = relay_error_message(&body);
        debug!(stream_id, status = status.as_u16(), %message, "Chat relay returned an error");
        let _ = tx.send((StreamMessage::Error(message), stream_id));
        return;
    }

    let _ = tx.send((StreamMessage::Opened, stream_id));

    let mut stream = response.bytes_stream();
    let mut decoder = SseDecoder::new();

    while let Some(chunk) = stream.next().await {
        match chunk {
            Ok(bytes) => {
                for event in decoder.push(&bytes) {
                    if forward_event(event, tx, stream_id) {
                        return;
                    }
                }
            }
            Err(err) => {
                warn!(stream_id, error = %err, "Chat stream interrupted");
                let _ = tx.send((
                    StreamMessage::Error("Stream interrupted".to_string()),
                    stream_id,
                ));
                return;
            }
        }
    }

    for event in decoder.finish() {
        if forward_event(event, tx, stream_id) {
            return;
        }
    }
}

#[derive(Clone)]
pub struct ChatStreamService {
    tx: StreamSender,
}

impl ChatStreamService {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(StreamMessage, u64)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    /// Runs one request on a background task. Every stream that is not
    /// cancelled ends with exactly one [`StreamMessage::End`].
    pub fn spawn_stream(&self, params: StreamParams) {
        let tx_clone = self.tx.clone();
        tokio::spawn(async move {
            let StreamParams {
                client,
                relay_url,
                request,
                cancel_token,
                stream_id,
            } = params;

            tokio::select! {
                biased;
                _ = cancel_token.cancelled() => {
                    debug!(stream_id, "Chat stream cancelled");
                }
                _ = run_stream(client, relay_url, request, &tx_clone, stream_id) => {
                    let _ = tx_clone.send((StreamMessage::End, stream_id));
                }
            }
        });
    }
}

use axum::body::Bytes;
use axum::extract::State;
use axum::response::Response;
use serde::Deserialize;
use tracing::info;

use crate::api::ChatRequest;
use crate::core::message::Message;
use crate::relay::error::RelayError;
use crate::relay::RelayState;

/// Inbound body before validation. `message` stays optional so a missing or
/// null value is reported as a validation failure rather than a parse error.
#[derive(Debug, Deserialize)]
struct IncomingChat {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    history: Vec<Message>,
}

impl IncomingChat {
    fn validate(self) -> Result<ChatRequest, RelayError> {
        match self.message {
            Some(message) if !message.is_empty() => Ok(ChatRequest {
                message,
                history: self.history,
            }),
            _ => Err(RelayError::Validation),
        }
    }
}

/// `POST /api/chat`: validate, forward upstream, and stream the reply back.
pub async fn handle_chat(
    State(state): State<RelayState>,
    body: Bytes,
) -> Result<Response, RelayError> {
    let incoming: IncomingChat = serde_json::from_slice(&body)
        .map_err(|err| RelayError::Internal(format!("Unreadable chat request: {err}")))?;
    let request = incoming.validate()?;

    info!(
        history = request.history.len(),
        upstream = %state.upstream.describe(),
        "Relaying chat request"
    );
    state.upstream.forward(&state.client, request).await
}

//! Chat state shared between the front-end and the stream that is
//! currently filling in a reply.
//!
//! Only one stream may write to the transcript at a time. That is enforced
//! by the loading flag: [`App::submit`] refuses new work while a reply is
//! still streaming, and stream messages tagged with an older stream id are
//! ignored.

use tracing::debug;

use crate::api::ChatRequest;
use crate::core::chat_stream::StreamParams;
use crate::core::constants::HISTORY_LIMIT;
use crate::core::message::Message;
use crate::core::transcript::Transcript;

pub mod session;
pub mod streaming;

pub use session::SessionContext;

pub struct App {
    pub session: SessionContext,
    transcript: Transcript,
    is_loading: bool,
    placeholder_open: bool,
    current_response: String,
    last_error: Option<String>,
}

/// Text shown in place of a reply that failed.
pub fn format_error_reply(message: &str) -> String {
    format!("Sorry, I encountered an error: {message}. Please try again.")
}

impl App {
    pub fn new(client: reqwest::Client, relay_url: impl Into<String>) -> Self {
        Self {
            session: SessionContext::new(client, relay_url.into()),
            transcript: Transcript::new(),
            is_loading: false,
            placeholder_open: false,
            current_response: String::new(),
            last_error: None,
        }
    }

    pub fn transcript(&self) -> &Transcript {
        &self.transcript
    }

    pub fn is_loading(&self) -> bool {
        self.is_loading
    }

    /// Message of the most recent failed reply, cleared by the next submit.
    pub fn last_error(&self) -> Option<&str> {
        self.last_error.as_deref()
    }

    /// Records the user's message and returns the parameters for the stream
    /// that will answer it. Blank input and submissions made while another
    /// reply is in flight are ignored.
    pub fn submit(&mut self, user_text: &str) -> Option<StreamParams> {
        let message = user_text.trim();
        if message.is_empty() {
            return None;
        }
        if self.is_loading {
            debug!("Ignoring submit while a reply is streaming");
            return None;
        }

        let history = self.transcript.tail(HISTORY_LIMIT);
        self.transcript.push(Message::user(message));
        self.current_response.clear();
        self.last_error = None;

        let (cancel_token, stream_id) = self.session.start_new_stream();
        self.is_loading = true;

        Some(StreamParams {
            client: self.session.client.clone(),
            relay_url: self.session.relay_url.clone(),
            request: ChatRequest {
                message: message.to_string(),
                history,
            },
            cancel_token,
            stream_id,
        })
    }

    /// Empties the transcript. Refused while a reply is streaming.
    pub fn clear_transcript(&mut self) -> bool {
        if self.is_loading {
            return false;
        }
        self.transcript.clear();
        true
    }
}

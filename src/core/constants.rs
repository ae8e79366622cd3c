//! Shared constants used across the application

/// Number of trailing transcript messages sent along with each new message.
pub const HISTORY_LIMIT: usize = 10;

/// Relay route the front-end posts chat requests to.
pub const CHAT_ENDPOINT: &str = "api/chat";

/// Backend route the relay forwards chat requests to.
pub const BACKEND_STREAM_ENDPOINT: &str = "chat/stream";

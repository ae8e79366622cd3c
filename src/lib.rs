//! relaychat relays chat messages to a language-model backend and streams the
//! reply back to terminal front-ends.
//!
//! The crate is organized around a small set of collaborating layers:
//! - [`relay`] is the HTTP server: it validates chat requests, forwards them
//!   upstream and pipes the streamed reply back, normalizing upstream errors.
//! - [`core`] owns the transcript, the event-stream decoder and the stream
//!   tasks that fold tokens into the reply being written.
//! - [`ui`] runs the line-oriented interactive front-end.
//! - [`api`] defines the request and error payloads shared by both sides.
//!
//! Runtime entrypoints live in the binary crate (`src/main.rs`) and route
//! through [`crate::cli::main`].

pub mod api;
pub mod cli;
pub mod core;
pub mod logging;
pub mod relay;
pub mod ui;
pub mod utils;

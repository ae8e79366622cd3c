//! Non-interactive "say" command

use std::error::Error;
use std::io::{self, Write};

use tokio::sync::mpsc;

use crate::core::app::App;
use crate::core::chat_stream::{ChatStreamService, StreamMessage};
use crate::core::config::Config;

pub async fn run_say(prompt: Vec<String>, config: &Config) -> Result<(), Box<dyn Error>> {
    let prompt = prompt.join(" ");
    let mut app = App::new(reqwest::Client::new(), config.relay_url());
    let Some(params) = app.submit(&prompt) else {
        eprintln!("Usage: relaychat say <prompt>");
        std::process::exit(1);
    };

    let (stream_service, mut rx) = ChatStreamService::new();
    stream_service.spawn_stream(params);

    if let Err(err) = print_reply(&mut app, &mut rx, &mut io::stdout()).await? {
        eprintln!("\nError: {err}");
        std::process::exit(1);
    }
    Ok(())
}

/// Prints chunks of the active reply as they arrive. Returns the failure
/// message if the reply ended in an error.
async fn print_reply<W: Write>(
    app: &mut App,
    rx: &mut mpsc::UnboundedReceiver<(StreamMessage, u64)>,
    out: &mut W,
) -> io::Result<Result<(), String>> {
    while let Some((message, stream_id)) = rx.recv().await {
        if let StreamMessage::Chunk(content) = &message {
            write!(out, "{content}")?;
            out.flush()?;
        }
        app.apply_stream_message(message, stream_id);
        if app.is_loading() {
            continue;
        }

        if let Some(err) = app.last_error() {
            return Ok(Err(err.to_string()));
        }
        writeln!(out)?;
        break;
    }
    Ok(Ok(()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::utils::test_utils::{chunked_body, spawn_router, test_client};
    use axum::routing::post;
    use axum::Router;

    async fn say_against(frames: Vec<&'static str>) -> (Result<(), String>, String) {
        let relay = Router::new().route(
            "/api/chat",
            post(move || {
                let frames = frames.clone();
                async move {
                    chunked_body(frames.iter().map(|frame| frame.as_bytes().to_vec()).collect())
                }
            }),
        );
        let url = spawn_router(relay).await;
        let mut app = App::new(test_client(), url);
        let params = app.submit("hello").expect("submit");
        let (service, mut rx) = ChatStreamService::new();
        service.spawn_stream(params);

        let mut out = Vec::new();
        let outcome = print_reply(&mut app, &mut rx, &mut out).await.unwrap();
        (outcome, String::from_utf8(out).unwrap())
    }

    #[tokio::test]
    async fn prints_reply_and_newline() {
        let (outcome, out) = say_against(vec![
            "data: {\"token\":\"Hi\"}\n\n",
            "data: {\"token\":\" there\"}\n\n",
            "data: [DONE]\n\n",
        ])
        .await;

        assert_eq!(outcome, Ok(()));
        assert_eq!(out, "Hi there\n");
    }

    #[tokio::test]
    async fn error_frame_is_reported_as_failure() {
        let (outcome, out) = say_against(vec![
            "data: {\"token\":\"Hi\"}\n\n",
            "data: {\"error\":\"model overloaded\"}\n\n",
        ])
        .await;

        assert_eq!(outcome, Err("model overloaded".to_string()));
        assert_eq!(out, "Hi");
    }
}

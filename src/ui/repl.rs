//! Line-oriented chat front-end.
//!
//! Reads one message per line from stdin and prints the reply as it
//! streams in. Stdin is read continuously; a message entered while a reply
//! is still streaming is dropped with a notice, never queued.

use std::error::Error;
use std::io::{self, Write};

use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::debug;

use crate::core::app::App;
use crate::core::chat_stream::{ChatStreamService, StreamParams};
use crate::core::transcript::Transcript;

const PROMPT: &str = "> ";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplInput<'a> {
    Empty,
    Quit,
    Clear,
    Message(&'a str),
}

pub fn parse_input(line: &str) -> ReplInput<'_> {
    match line.trim() {
        "" => ReplInput::Empty,
        "/quit" | "/exit" => ReplInput::Quit,
        "/clear" => ReplInput::Clear,
        _ => ReplInput::Message(line),
    }
}

/// What the loop should do after one line of input.
pub enum LineOutcome {
    /// Nothing happened; show the prompt again when idle.
    Ignored,
    Quit,
    Cleared,
    Submitted(StreamParams),
    /// A reply is streaming, so the line was dropped.
    Busy,
}

/// Applies one line of input to the chat state.
pub fn handle_line(app: &mut App, line: &str) -> LineOutcome {
    match parse_input(line) {
        ReplInput::Empty => LineOutcome::Ignored,
        ReplInput::Quit => LineOutcome::Quit,
        ReplInput::Clear => {
            if app.clear_transcript() {
                LineOutcome::Cleared
            } else {
                LineOutcome::Busy
            }
        }
        ReplInput::Message(_) if app.is_loading() => LineOutcome::Busy,
        ReplInput::Message(text) => match app.submit(text) {
            Some(params) => LineOutcome::Submitted(params),
            None => LineOutcome::Ignored,
        },
    }
}

/// Writes transcript changes to a terminal incrementally.
///
/// User messages are never echoed. The assistant message being streamed is
/// printed as deltas; if its content is replaced rather than extended (a
/// failed reply), the replacement is printed on a fresh line.
#[derive(Debug, Default)]
pub struct TranscriptPrinter {
    next_index: usize,
    open: Option<(usize, String)>,
}

impl TranscriptPrinter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.next_index = 0;
        self.open = None;
    }

    pub fn render<W: Write>(&mut self, transcript: &Transcript, out: &mut W) -> io::Result<()> {
        if let Some((index, printed)) = self.open.as_mut() {
            match transcript.get(*index) {
                Some(message) => {
                    if let Some(delta) = message.content.strip_prefix(printed.as_str()) {
                        write!(out, "{delta}")?;
                    } else {
                        if !printed.is_empty() {
                            writeln!(out)?;
                        }
                        write!(out, "{}", message.content)?;
                    }
                    printed.clone_from(&message.content);
                }
                // Removed by a cancel.
                None => self.close(out)?,
            }
        }

        self.next_index = self.next_index.min(transcript.len());
        while let Some(message) = transcript.get(self.next_index) {
            if message.is_assistant() {
                self.close(out)?;
                write!(out, "{}", message.content)?;
                self.open = Some((self.next_index, message.content.clone()));
            }
            self.next_index += 1;
        }

        out.flush()
    }

    /// Renders pending output and terminates the open reply's line.
    pub fn finish<W: Write>(&mut self, transcript: &Transcript, out: &mut W) -> io::Result<()> {
        self.render(transcript, out)?;
        self.close(out)?;
        out.flush()
    }

    fn close<W: Write>(&mut self, out: &mut W) -> io::Result<()> {
        if let Some((_, printed)) = self.open.take() {
            if !printed.is_empty() {
                writeln!(out)?;
            }
        }
        Ok(())
    }
}

fn print_prompt() -> io::Result<()> {
    let mut stdout = io::stdout();
    write!(stdout, "{PROMPT}")?;
    stdout.flush()
}

pub async fn run_chat(client: reqwest::Client, relay_url: String) -> Result<(), Box<dyn Error>> {
    let mut app = App::new(client, relay_url);
    let (stream_service, mut rx) = ChatStreamService::new();
    let mut printer = TranscriptPrinter::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    println!("Connected to {}. Type /clear to start over, /quit to exit.", app.session.relay_url);
    print_prompt()?;

    loop {
        tokio::select! {
            line = lines.next_line() => {
                let Some(line) = line? else {
                    println!();
                    break;
                };
                match handle_line(&mut app, &line) {
                    LineOutcome::Ignored => {
                        if !app.is_loading() {
                            print_prompt()?;
                        }
                    }
                    LineOutcome::Quit => break,
                    LineOutcome::Cleared => {
                        printer.reset();
                        println!("Transcript cleared.");
                        print_prompt()?;
                    }
                    LineOutcome::Submitted(params) => stream_service.spawn_stream(params),
                    LineOutcome::Busy => {
                        debug!("Dropping input while a reply is streaming");
                        eprintln!("(still replying; input dropped)");
                    }
                }
            }
            Some((message, stream_id)) = rx.recv() => {
                app.apply_stream_message(message, stream_id);
                let mut stdout = io::stdout();
                if app.is_loading() {
                    printer.render(app.transcript(), &mut stdout)?;
                } else {
                    printer.finish(app.transcript(), &mut stdout)?;
                    print_prompt()?;
                }
            }
            result = tokio::signal::ctrl_c() => {
                result?;
                if !app.is_loading() {
                    println!();
                    break;
                }
                debug!("Cancelling reply on interrupt");
                app.cancel_current_stream();
                printer.finish(app.transcript(), &mut io::stdout())?;
                eprintln!("(reply cancelled)");
                print_prompt()?;
            }
        }
    }

    Ok(())
}

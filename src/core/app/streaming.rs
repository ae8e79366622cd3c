use tracing::debug;

use super::{format_error_reply, App};
use crate::core::chat_stream::StreamMessage;
use crate::core::message::Message;

impl App {
    /// Folds one message from the active stream into the transcript.
    pub fn apply_stream_message(&mut self, message: StreamMessage, stream_id: u64) {
        if !self.is_loading || !self.session.is_current_stream(stream_id) {
            debug!(stream_id, "Ignoring message from a stale stream");
            return;
        }

        match message {
            StreamMessage::Opened => {
                self.transcript.push(Message::assistant(""));
                self.placeholder_open = true;
            }
            StreamMessage::Chunk(text) => {
                self.current_response.push_str(&text);
                if self.placeholder_open {
                    self.transcript
                        .set_last_assistant_content(&self.current_response);
                }
            }
            StreamMessage::Error(message) => {
                let reply = format_error_reply(message.trim());
                if !(self.placeholder_open && self.transcript.set_last_assistant_content(&reply)) {
                    self.transcript.push(Message::assistant(reply));
                }
                self.last_error = Some(message);
                self.end_streaming();
            }
            StreamMessage::End => self.end_streaming(),
        }
    }

    /// Stops the active reply. An empty placeholder is removed; partial
    /// text stays in the transcript.
    pub fn cancel_current_stream(&mut self) {
        if !self.is_loading {
            return;
        }
        self.session.cancel_stream();
        if self.placeholder_open {
            self.transcript.remove_trailing_empty_assistant_messages();
        }
        self.end_streaming();
    }

    fn end_streaming(&mut self) {
        self.is_loading = false;
        self.placeholder_open = false;
        self.session.stream_cancel_token = None;
    }
}

#[cfg(test)]
mod tests {
    use crate::core::chat_stream::StreamMessage;
    use crate::core::message::{Message, TranscriptRole};
    use crate::utils::test_utils::create_test_app;

    #[test]
    fn tokens_grow_the_placeholder_in_place() {
        let mut app = create_test_app();
        let id = app.submit("hi").expect("submit").stream_id;

        app.apply_stream_message(StreamMessage::Opened, id);
        assert_eq!(app.transcript().last(), Some(&Message::assistant("")));

        app.apply_stream_message(StreamMessage::Chunk("a".into()), id);
        app.apply_stream_message(StreamMessage::Chunk("b".into()), id);
        assert_eq!(app.transcript().len(), 2);
        assert_eq!(app.transcript().last(), Some(&Message::assistant("ab")));
        assert!(app.is_loading());

        app.apply_stream_message(StreamMessage::End, id);
        assert!(!app.is_loading());
        assert_eq!(app.transcript().last(), Some(&Message::assistant("ab")));
        assert!(app.last_error().is_none());
    }

    #[test]
    fn mid_stream_error_overwrites_partial_reply() {
        let mut app = create_test_app();
        let id = app.submit("hi").expect("submit").stream_id;

        app.apply_stream_message(StreamMessage::Opened, id);
        app.apply_stream_message(StreamMessage::Chunk("partial".into()), id);
        app.apply_stream_message(StreamMessage::Error("boom".into()), id);
        app.apply_stream_message(StreamMessage::End, id);

        assert_eq!(app.transcript().len(), 2);
        assert_eq!(
            app.transcript().last(),
            Some(&Message::assistant(
                "Sorry, I encountered an error: boom. Please try again."
            ))
        );
        assert_eq!(app.last_error(), Some("boom"));
        assert!(!app.is_loading());
    }

    #[test]
    fn error_before_opening_appends_one_reply() {
        let mut app = create_test_app();
        let id = app.submit("hi").expect("submit").stream_id;

        app.apply_stream_message(StreamMessage::Error(" rate limited ".into()), id);
        app.apply_stream_message(StreamMessage::End, id);

        let roles: Vec<_> = app.transcript().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![TranscriptRole::User, TranscriptRole::Assistant]);
        assert_eq!(
            app.transcript().last().unwrap().content,
            "Sorry, I encountered an error: rate limited. Please try again."
        );
    }

    #[test]
    fn stale_stream_messages_are_ignored() {
        let mut app = create_test_app();
        let first = app.submit("one").expect("submit").stream_id;
        app.apply_stream_message(StreamMessage::End, first);

        let second = app.submit("two").expect("submit").stream_id;
        app.apply_stream_message(StreamMessage::Opened, first);
        app.apply_stream_message(StreamMessage::Chunk("late".into()), first);
        app.apply_stream_message(StreamMessage::End, first);

        assert!(app.is_loading());
        assert_eq!(app.transcript().len(), 2);
        assert!(app.transcript().iter().all(|m| m.is_user()));

        app.apply_stream_message(StreamMessage::Opened, second);
        app.apply_stream_message(StreamMessage::Chunk("fresh".into()), second);
        assert_eq!(app.transcript().last(), Some(&Message::assistant("fresh")));
    }

    #[test]
    fn cancel_clears_loading_and_drops_empty_placeholder() {
        let mut app = create_test_app();
        let params = app.submit("hi").expect("submit");
        app.apply_stream_message(StreamMessage::Opened, params.stream_id);

        app.cancel_current_stream();
        assert!(params.cancel_token.is_cancelled());
        assert!(!app.is_loading());
        assert_eq!(app.transcript().len(), 1);

        app.apply_stream_message(StreamMessage::Chunk("late".into()), params.stream_id);
        assert_eq!(app.transcript().len(), 1);
        assert!(app.submit("again").is_some());
    }

    #[test]
    fn cancel_keeps_partial_text() {
        let mut app = create_test_app();
        let id = app.submit("hi").expect("submit").stream_id;
        app.apply_stream_message(StreamMessage::Opened, id);
        app.apply_stream_message(StreamMessage::Chunk("half".into()), id);

        app.cancel_current_stream();
        assert_eq!(app.transcript().last(), Some(&Message::assistant("half")));
    }
}

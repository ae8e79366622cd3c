//! The in-memory conversation shown to the user.
//!
//! Messages are only ever appended, with one exception: the most recent
//! assistant message may be rewritten while its reply is streaming in.

use std::collections::VecDeque;

use crate::core::message::Message;

#[derive(Debug, Default, Clone)]
pub struct Transcript {
    messages: VecDeque<Message>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, message: Message) -> usize {
        self.messages.push_back(message);
        self.messages.len() - 1
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    pub fn last(&self) -> Option<&Message> {
        self.messages.back()
    }

    pub fn get(&self, index: usize) -> Option<&Message> {
        self.messages.get(index)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Message> {
        self.messages.iter()
    }

    /// Clones the trailing `limit` messages, oldest first.
    pub fn tail(&self, limit: usize) -> Vec<Message> {
        let skip = self.messages.len().saturating_sub(limit);
        self.messages.iter().skip(skip).cloned().collect()
    }

    /// Replaces the content of the last message if it belongs to the
    /// assistant. Returns `false` when there is nothing to update.
    pub fn set_last_assistant_content(&mut self, content: &str) -> bool {
        match self.messages.back_mut() {
            Some(last) if last.is_assistant() => {
                last.content.clear();
                last.content.push_str(content);
                true
            }
            _ => false,
        }
    }

    pub fn remove_trailing_empty_assistant_messages(&mut self) {
        while self
            .messages
            .back()
            .is_some_and(|m| m.is_assistant() && m.content.trim().is_empty())
        {
            self.messages.pop_back();
        }
    }

    pub fn clear(&mut self) {
        self.messages.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::message::TranscriptRole;

    fn sample(count: usize) -> Transcript {
        let mut transcript = Transcript::new();
        for i in 0..count {
            if i % 2 == 0 {
                transcript.push(Message::user(format!("q{i}")));
            } else {
                transcript.push(Message::assistant(format!("a{i}")));
            }
        }
        transcript
    }

    #[test]
    fn tail_keeps_most_recent_messages_in_order() {
        let transcript = sample(14);
        let tail = transcript.tail(10);
        assert_eq!(tail.len(), 10);
        assert_eq!(tail.first().unwrap().content, "q4");
        assert_eq!(tail.last().unwrap().content, "a13");

        assert_eq!(sample(3).tail(10).len(), 3);
        assert!(Transcript::new().tail(10).is_empty());
    }

    #[test]
    fn last_assistant_content_is_replaced_in_place() {
        let mut transcript = sample(1);
        assert!(!transcript.set_last_assistant_content("nope"));

        transcript.push(Message::assistant(""));
        assert!(transcript.set_last_assistant_content("partial"));
        assert!(transcript.set_last_assistant_content("partial reply"));
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript.last().unwrap().content, "partial reply");
    }

    #[test]
    fn trailing_empty_assistant_messages_are_dropped() {
        let mut transcript = sample(1);
        transcript.push(Message::assistant(""));
        transcript.push(Message::assistant("  "));
        transcript.remove_trailing_empty_assistant_messages();
        assert_eq!(transcript.len(), 1);
        assert_eq!(transcript.last().unwrap().role, TranscriptRole::User);
    }
}

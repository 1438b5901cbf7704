//! Context selection strategies
//!
//! The history log is append-only and grows for the life of the process. A
//! `ContextPolicy` decides which part of it is sent upstream with each turn.
//! Every policy keeps the leading system message.

use crate::protocol::{Message, MessageRole};
use std::fmt;

/// Selects the messages that form the prompt context for the next turn
pub trait ContextPolicy: Send + Sync + fmt::Debug {
    /// Return the context to send, oldest first
    fn select(&self, log: &[Message]) -> Vec<Message>;

    /// Name used in logs
    fn name(&self) -> &str;
}

/// Send the whole log every turn
#[derive(Debug, Clone, Copy, Default)]
pub struct Unbounded;

impl ContextPolicy for Unbounded {
    fn select(&self, log: &[Message]) -> Vec<Message> {
        log.to_vec()
    }

    fn name(&self) -> &str {
        "unbounded"
    }
}

/// Keep the system message plus the last `max_turns` turns.
///
/// A turn starts at a user message, so the cut is made at the
/// `max_turns`-th user message counting from the end.
#[derive(Debug, Clone, Copy)]
pub struct LastTurns {
    max_turns: usize,
}

impl LastTurns {
    pub fn new(max_turns: usize) -> Self {
        Self { max_turns }
    }

    pub fn max_turns(&self) -> usize {
        self.max_turns
    }
}

impl ContextPolicy for LastTurns {
    fn select(&self, log: &[Message]) -> Vec<Message> {
        let (system, rest) = match log.first() {
            Some(first) if first.is_system() => (Some(first), &log[1..]),
            _ => (None, log),
        };

        let start = if self.max_turns == 0 {
            rest.len()
        } else {
            rest.iter()
                .enumerate()
                .rev()
                .filter(|(_, m)| m.role == MessageRole::User)
                .nth(self.max_turns - 1)
                .map(|(i, _)| i)
                .unwrap_or(0)
        };

        system
            .into_iter()
            .chain(rest[start..].iter())
            .cloned()
            .collect()
    }

    fn name(&self) -> &str {
        "last_turns"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log_with_turns(turns: usize) -> Vec<Message> {
        let mut log = vec![Message::system("S")];
        for i in 0..turns {
            log.push(Message::user(format!("Q{}", i)));
            log.push(Message::assistant(format!("A{}", i)));
        }
        log
    }

    #[test]
    fn test_unbounded_keeps_everything() {
        let log = log_with_turns(3);
        assert_eq!(Unbounded.select(&log), log);
    }

    #[test]
    fn test_last_turns_trims_oldest() {
        let log = log_with_turns(4);
        let selected = LastTurns::new(2).select(&log);
        assert_eq!(
            selected,
            vec![
                Message::system("S"),
                Message::user("Q2"),
                Message::assistant("A2"),
                Message::user("Q3"),
                Message::assistant("A3"),
            ]
        );
    }

    #[test]
    fn test_last_turns_with_short_log() {
        let log = log_with_turns(1);
        assert_eq!(LastTurns::new(5).select(&log), log);
    }

    #[test]
    fn test_last_turns_zero_keeps_only_system() {
        let log = log_with_turns(2);
        assert_eq!(LastTurns::new(0).select(&log), vec![Message::system("S")]);
    }

    #[test]
    fn test_last_turns_without_system_message() {
        let log = vec![
            Message::user("Q0"),
            Message::assistant("A0"),
            Message::user("Q1"),
        ];
        assert_eq!(
            LastTurns::new(1).select(&log),
            vec![Message::user("Q1")]
        );
    }
}

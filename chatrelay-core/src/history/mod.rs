//! Conversation history
//!
//! An ordered, append-only log of role-tagged messages. The first entry, when
//! present, is the only system message. All mutation goes through one mutex so
//! concurrent turns never interleave partial appends; snapshots are copies, so
//! no lock is held while a turn talks to the provider.

mod policy;

pub use policy::{ContextPolicy, LastTurns, Unbounded};

use crate::protocol::{Message, MessageRole};
use std::sync::{Arc, Mutex, MutexGuard};

/// Process-scoped conversation log
#[derive(Debug, Clone)]
pub struct ConversationHistory {
    messages: Arc<Mutex<Vec<Message>>>,
    policy: Arc<dyn ContextPolicy>,
}

impl ConversationHistory {
    /// Create an empty history that sends the whole log upstream
    pub fn new() -> Self {
        Self::with_policy(None, Arc::new(Unbounded))
    }

    /// Create a history seeded with a system message
    pub fn with_system_prompt(system_prompt: impl Into<String>) -> Self {
        Self::with_policy(Some(system_prompt.into()), Arc::new(Unbounded))
    }

    /// Create a history with an optional seed system message and a context policy
    pub fn with_policy(system_prompt: Option<String>, policy: Arc<dyn ContextPolicy>) -> Self {
        let messages = system_prompt
            .filter(|s| !s.is_empty())
            .map(|s| vec![Message::system(s)])
            .unwrap_or_default();

        Self {
            messages: Arc::new(Mutex::new(messages)),
            policy,
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Message>> {
        // Appends are single pushes, so a poisoned log is still consistent.
        self.messages.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Append a message to the end of the log.
    ///
    /// System messages are only accepted as the very first entry. A later one
    /// is dropped with a warning.
    pub fn append(&self, message: Message) {
        let mut messages = self.lock();
        if message.role == MessageRole::System && !messages.is_empty() {
            tracing::warn!("Ignoring system message appended after conversation start");
            return;
        }
        messages.push(message);
    }

    /// Copy of every message appended before this call
    pub fn snapshot(&self) -> Vec<Message> {
        self.lock().clone()
    }

    /// Context for a new turn and the user message recorded in the same critical section.
    ///
    /// The returned context does not contain `prompt`; the request builder adds it.
    pub fn begin_turn(&self, prompt: &str) -> Vec<Message> {
        let mut messages = self.lock();
        let context = self.policy.select(&messages);
        messages.push(Message::user(prompt));
        context
    }

    /// Number of recorded messages
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// The active context policy
    pub fn policy(&self) -> &dyn ContextPolicy {
        self.policy.as_ref()
    }
}

impl Default for ConversationHistory {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_seeded_history_starts_with_system() {
        let history = ConversationHistory::with_system_prompt("Be brief.");
        assert_eq!(history.snapshot(), vec![Message::system("Be brief.")]);
    }

    #[test]
    fn test_empty_system_prompt_is_not_recorded() {
        let history = ConversationHistory::with_policy(Some(String::new()), Arc::new(Unbounded));
        assert!(history.is_empty());
    }

    #[test]
    fn test_late_system_message_is_rejected() {
        let history = ConversationHistory::with_system_prompt("S");
        history.append(Message::user("Q"));
        history.append(Message::system("S2"));
        assert_eq!(
            history.snapshot(),
            vec![Message::system("S"), Message::user("Q")]
        );
    }

    #[test]
    fn test_snapshot_is_a_copy() {
        let history = ConversationHistory::new();
        history.append(Message::user("Q"));
        let snapshot = history.snapshot();
        history.append(Message::assistant("A"));
        assert_eq!(snapshot.len(), 1);
        assert_eq!(history.len(), 2);
    }

    #[test]
    fn test_begin_turn_returns_prior_context() {
        let history = ConversationHistory::with_system_prompt("S");
        history.append(Message::user("Q"));
        history.append(Message::assistant("A"));

        let context = history.begin_turn("Q2");
        assert_eq!(
            context,
            vec![Message::system("S"), Message::user("Q"), Message::assistant("A")]
        );
        assert_eq!(history.snapshot().last(), Some(&Message::user("Q2")));
    }

    #[test]
    fn test_begin_turn_applies_policy() {
        let history =
            ConversationHistory::with_policy(Some("S".into()), Arc::new(LastTurns::new(1)));
        for i in 0..3 {
            history.append(Message::user(format!("Q{}", i)));
            history.append(Message::assistant(format!("A{}", i)));
        }
        let context = history.begin_turn("Q3");
        assert_eq!(
            context,
            vec![Message::system("S"), Message::user("Q2"), Message::assistant("A2")]
        );
        // The log itself is never trimmed
        assert_eq!(history.len(), 8);
    }

    #[test]
    fn test_concurrent_appends_are_all_recorded() {
        let history = ConversationHistory::new();
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let history = history.clone();
                thread::spawn(move || {
                    for i in 0..50 {
                        history.append(Message::user(format!("{}-{}", t, i)));
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let snapshot = history.snapshot();
        assert_eq!(snapshot.len(), 400);
        for t in 0..8 {
            let own: Vec<_> = snapshot
                .iter()
                .filter(|m| m.content.starts_with(&format!("{}-", t)))
                .map(|m| m.content.clone())
                .collect();
            let expected: Vec<_> = (0..50).map(|i| format!("{}-{}", t, i)).collect();
            assert_eq!(own, expected);
        }
    }
}

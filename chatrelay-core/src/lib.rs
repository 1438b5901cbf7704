//! Chatrelay Core Library
//!
//! Conversation context and token streaming for OpenAI-compatible chat
//! completion providers. A [`Session`] keeps one shared conversation, turns
//! each prompt into a streaming completion request, decodes the provider's
//! incremental response and hands every text fragment to whichever listener
//! is waiting on the shared [`FragmentRelay`].

pub mod config;
pub mod error;
pub mod history;
pub mod http;
pub mod protocol;
pub mod providers;
pub mod relay;
pub mod session;

pub use error::{RelayError, RelayResult};
pub use history::ConversationHistory;
pub use protocol::{CompletionRequest, Message, MessageRole};
pub use relay::{Fragment, FragmentRelay};
pub use session::{Listener, MalformedLinePolicy, Session, TurnOptions, TurnSummary};

/// Returns the version of the chatrelay core library.
pub fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!version().is_empty());
    }
}

//! Conversation session
//!
//! A `Session` owns the three pieces of shared state a relay needs: the
//! conversation history, the fragment relay and the prompt handler that
//! connects them to a provider. It is built once at startup and shared
//! behind an `Arc` by whatever front end drives it.

mod handler;
mod listener;

pub use handler::PromptHandler;
pub use listener::Listener;

use crate::config::RelayConfig;
use crate::error::RelayResult;
use crate::history::{ContextPolicy, ConversationHistory, LastTurns, Unbounded};
use crate::http::client::HttpClient;
use crate::protocol::Message;
use crate::providers::{CompletionProvider, CompletionRequestBuilder, OpenAIProvider};
use crate::relay::FragmentRelay;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// How a turn treats stream lines that are not valid delta envelopes
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MalformedLinePolicy {
    /// Log and continue; fail only if nothing usable arrived
    #[default]
    Skip,
    /// Fail the turn on the first malformed line
    Abort,
}

impl std::str::FromStr for MalformedLinePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "skip" => Ok(MalformedLinePolicy::Skip),
            "abort" => Ok(MalformedLinePolicy::Abort),
            other => Err(format!("expected 'skip' or 'abort', got '{}'", other)),
        }
    }
}

/// Per-turn behaviour shared by every turn of a session
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TurnOptions {
    pub malformed_lines: MalformedLinePolicy,
    /// Deadline covering the upstream call and the whole stream
    pub turn_timeout: Option<Duration>,
}

/// Outcome of a completed turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TurnSummary {
    pub request_id: Uuid,
    /// Concatenation of every published text fragment
    pub reply: String,
    pub fragments: usize,
    pub skipped_lines: usize,
}

/// Shared conversation state and the operations front ends call into
#[derive(Debug)]
pub struct Session {
    history: ConversationHistory,
    relay: FragmentRelay,
    handler: PromptHandler,
}

impl Session {
    pub fn new(
        history: ConversationHistory,
        relay: FragmentRelay,
        provider: Arc<dyn CompletionProvider>,
        builder: CompletionRequestBuilder,
        options: TurnOptions,
    ) -> Self {
        let handler =
            PromptHandler::new(history.clone(), relay.clone(), provider, builder, options);
        Self {
            history,
            relay,
            handler,
        }
    }

    /// Wire up an OpenAI-compatible session from configuration
    pub fn from_config(config: &RelayConfig) -> RelayResult<Self> {
        let client = HttpClient::with_config(&config.connection)?;
        let provider = OpenAIProvider::new(
            &config.provider.name,
            &config.provider.base_url,
            config.provider.api_key.clone(),
            client,
        );

        let policy: Arc<dyn ContextPolicy> = match config.conversation.max_turns {
            Some(turns) => Arc::new(LastTurns::new(turns)),
            None => Arc::new(Unbounded),
        };
        let history =
            ConversationHistory::with_policy(config.conversation.system_prompt.clone(), policy);

        let builder =
            CompletionRequestBuilder::new(&config.provider.model, config.provider.max_tokens);
        let options = TurnOptions {
            malformed_lines: config.decoding.malformed_lines,
            turn_timeout: config.connection.turn_timeout(),
        };

        Ok(Self::new(
            history,
            FragmentRelay::new(config.relay.capacity),
            Arc::new(provider),
            builder,
            options,
        ))
    }

    /// Run one turn to completion. Fragments are published to listeners as they arrive.
    pub async fn submit_prompt(&self, prompt: &str) -> RelayResult<TurnSummary> {
        self.handler.handle(prompt).await
    }

    /// Attach a consumer to the shared relay
    pub fn attach_listener(&self) -> Listener {
        Listener::new(self.relay.clone())
    }

    pub fn history(&self) -> &ConversationHistory {
        &self.history
    }

    /// Copy of the conversation so far
    pub fn transcript(&self) -> Vec<Message> {
        self.history.snapshot()
    }

    pub fn relay(&self) -> &FragmentRelay {
        &self.relay
    }

    /// Close the relay. Listeners finish after the queued fragments.
    pub fn shutdown(&self) -> bool {
        self.relay.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_deserializes_lowercase() {
        let policy: MalformedLinePolicy = serde_json::from_str("\"abort\"").unwrap();
        assert_eq!(policy, MalformedLinePolicy::Abort);
        assert_eq!(MalformedLinePolicy::default(), MalformedLinePolicy::Skip);
    }

    #[test]
    fn test_from_config_wires_settings() {
        let mut config = RelayConfig::new("sk-test");
        config.conversation.system_prompt = Some("Be brief.".to_string());
        config.conversation.max_turns = Some(2);
        config.relay.capacity = 3;

        let session = Session::from_config(&config).unwrap();
        assert_eq!(session.transcript(), vec![Message::system("Be brief.")]);
        assert_eq!(session.history().policy().name(), "last_turns");
        assert_eq!(session.relay().capacity(), 3);
    }

    #[tokio::test]
    async fn test_shutdown_ends_listeners() {
        let session = Session::from_config(&RelayConfig::new("sk-test")).unwrap();
        let mut listener = session.attach_listener();
        assert!(session.shutdown());
        assert!(!session.shutdown());
        assert_eq!(listener.next_fragment().await, None);
    }
}

//! Per-turn orchestration
//!
//! A turn moves through `received -> building -> calling -> streaming` and ends
//! `completed` or `failed`. Only a completed turn records an assistant message
//! and publishes `EndOfTurn`.

use super::{MalformedLinePolicy, TurnOptions, TurnSummary};
use crate::error::{RelayError, RelayResult};
use crate::history::ConversationHistory;
use crate::http::{CallKind, RequestOptions};
use crate::protocol::{CompletionRequest, Message};
use crate::providers::{CompletionProvider, CompletionRequestBuilder, StreamDecoder, StreamEvent};
use crate::relay::{Fragment, FragmentRelay};
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

/// Longest raw line quoted in a decode error
const MAX_QUOTED_LINE: usize = 200;

/// Drives one prompt from validation to the final relay publish
pub struct PromptHandler {
    history: ConversationHistory,
    relay: FragmentRelay,
    provider: Arc<dyn CompletionProvider>,
    builder: CompletionRequestBuilder,
    options: TurnOptions,
}

#[derive(Debug, Default)]
struct TurnProgress {
    reply: String,
    fragments: usize,
    skipped_lines: usize,
}

impl PromptHandler {
    pub fn new(
        history: ConversationHistory,
        relay: FragmentRelay,
        provider: Arc<dyn CompletionProvider>,
        builder: CompletionRequestBuilder,
        options: TurnOptions,
    ) -> Self {
        Self {
            history,
            relay,
            provider,
            builder,
            options,
        }
    }

    pub fn options(&self) -> &TurnOptions {
        &self.options
    }

    /// Handle one prompt. Awaits the whole turn.
    pub async fn handle(&self, prompt: &str) -> RelayResult<TurnSummary> {
        let request_id = Uuid::new_v4();
        let span = info_span!("turn", %request_id, provider = self.provider.name());
        self.run(prompt, request_id).instrument(span).await
    }

    async fn run(&self, prompt: &str, request_id: Uuid) -> RelayResult<TurnSummary> {
        debug!("state: received");
        self.builder.check_prompt(prompt)?;
        if self.relay.is_closed() {
            return Err(RelayError::RelayClosed);
        }

        debug!("state: building");
        let context = self.history.begin_turn(prompt);
        let request = self.builder.build(&context, prompt)?;
        info!(
            "Turn started with {} context messages (model {})",
            request.messages.len(),
            request.model
        );

        let outcome = match self.options.turn_timeout {
            Some(deadline) => {
                match tokio::time::timeout(deadline, self.stream_turn(request, request_id)).await {
                    Ok(outcome) => outcome,
                    Err(_) => Err(RelayError::UpstreamTransport {
                        message: format!(
                            "turn exceeded deadline of {}ms [request_id: {}]",
                            deadline.as_millis(),
                            request_id
                        ),
                        timed_out: true,
                    }),
                }
            }
            None => self.stream_turn(request, request_id).await,
        };

        let progress = match outcome {
            Ok(progress) => progress,
            Err(e) => {
                warn!("state: failed ({}); skipping assistant append", e);
                return Err(e);
            }
        };

        self.history.append(Message::assistant(progress.reply.as_str()));
        self.relay.publish(Fragment::EndOfTurn).await?;
        debug!("state: completed");
        info!(
            "Turn completed: {} fragments, {} chars, {} skipped lines",
            progress.fragments,
            progress.reply.len(),
            progress.skipped_lines
        );

        Ok(TurnSummary {
            request_id,
            reply: progress.reply,
            fragments: progress.fragments,
            skipped_lines: progress.skipped_lines,
        })
    }

    async fn stream_turn(
        &self,
        request: CompletionRequest,
        request_id: Uuid,
    ) -> RelayResult<TurnProgress> {
        debug!("state: calling");
        let options = RequestOptions::new(CallKind::Chat).with_request_id(request_id);
        let body = self.provider.stream_completion(request, options).await?;

        debug!("state: streaming");
        let mut decoder = StreamDecoder::new(body);
        let mut progress = TurnProgress::default();

        while let Some(event) = decoder.next_event().await {
            match event? {
                StreamEvent::Fragment { text } => {
                    progress.reply.push_str(&text);
                    progress.fragments += 1;
                    self.relay.publish(Fragment::Text(text)).await?;
                }
                StreamEvent::Done => break,
                StreamEvent::Malformed { raw } => match self.options.malformed_lines {
                    MalformedLinePolicy::Abort => {
                        return Err(RelayError::Decode {
                            message: format!("malformed stream line: {}", quote(&raw)),
                        });
                    }
                    MalformedLinePolicy::Skip => {
                        warn!("Skipping malformed stream line: {}", quote(&raw));
                        progress.skipped_lines += 1;
                    }
                },
            }
        }

        let drained = decoder.drain().await;
        if drained > 0 {
            debug!("Discarded {} bytes after end of stream", drained);
        }

        if progress.fragments == 0 && progress.skipped_lines > 0 {
            return Err(RelayError::Decode {
                message: format!(
                    "no usable fragments; {} malformed lines skipped",
                    progress.skipped_lines
                ),
            });
        }

        Ok(progress)
    }
}

fn quote(raw: &str) -> String {
    if raw.chars().count() <= MAX_QUOTED_LINE {
        return raw.to_string();
    }
    let mut quoted: String = raw.chars().take(MAX_QUOTED_LINE).collect();
    quoted.push_str("...");
    quoted
}

impl std::fmt::Debug for PromptHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PromptHandler")
            .field("provider", &self.provider.name())
            .field("builder", &self.builder)
            .field("options", &self.options)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::ByteStream;
    use async_trait::async_trait;
    use bytes::Bytes;
    use futures::{stream, StreamExt};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    /// Replays a fixed body for every call
    struct ScriptedProvider {
        chunks: Vec<&'static str>,
        calls: AtomicUsize,
        stall: bool,
    }

    impl ScriptedProvider {
        fn new(chunks: Vec<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                chunks,
                calls: AtomicUsize::new(0),
                stall: false,
            })
        }

        fn stalling() -> Arc<Self> {
            Arc::new(Self {
                chunks: Vec::new(),
                calls: AtomicUsize::new(0),
                stall: true,
            })
        }
    }

    #[async_trait]
    impl CompletionProvider for ScriptedProvider {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn stream_completion(
            &self,
            _request: CompletionRequest,
            _options: RequestOptions,
        ) -> RelayResult<ByteStream> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.stall {
                return Ok(stream::pending().boxed());
            }
            let chunks: Vec<RelayResult<Bytes>> = self
                .chunks
                .iter()
                .map(|c| Ok(Bytes::from_static(c.as_bytes())))
                .collect();
            Ok(stream::iter(chunks).boxed())
        }
    }

    fn handler(provider: Arc<ScriptedProvider>, options: TurnOptions) -> PromptHandler {
        PromptHandler::new(
            ConversationHistory::with_system_prompt("S"),
            FragmentRelay::new(16),
            provider,
            CompletionRequestBuilder::new("gpt-3.5-turbo-16k", 150),
            options,
        )
    }

    const HELLO: &str = "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\n\
                         data: {\"choices\":[{\"delta\":{\"content\":\" there\"}}]}\n\n\
                         data: [DONE]\n\n";

    #[tokio::test]
    async fn test_completed_turn_publishes_and_records() {
        let provider = ScriptedProvider::new(vec![HELLO]);
        let handler = handler(provider.clone(), TurnOptions::default());

        let summary = handler.handle("Q").await.unwrap();
        assert_eq!(summary.reply, "Hi there");
        assert_eq!(summary.fragments, 2);

        assert_eq!(handler.relay.take_next().await, Some(Fragment::text("Hi")));
        assert_eq!(handler.relay.take_next().await, Some(Fragment::text(" there")));
        assert_eq!(handler.relay.take_next().await, Some(Fragment::EndOfTurn));
        assert_eq!(
            handler.history.snapshot(),
            vec![Message::system("S"), Message::user("Q"), Message::assistant("Hi there")]
        );
    }

    #[tokio::test]
    async fn test_empty_prompt_never_calls_provider() {
        let provider = ScriptedProvider::new(vec![HELLO]);
        let handler = handler(provider.clone(), TurnOptions::default());

        let err = handler.handle("   ").await.unwrap_err();
        assert!(matches!(err, RelayError::BadInput(_)));
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert_eq!(handler.history.len(), 1);
    }

    #[tokio::test]
    async fn test_abort_policy_fails_on_first_malformed_line() {
        let provider = ScriptedProvider::new(vec!["data: {oops\n", HELLO]);
        let handler = handler(
            provider,
            TurnOptions {
                malformed_lines: MalformedLinePolicy::Abort,
                turn_timeout: None,
            },
        );

        let err = handler.handle("Q").await.unwrap_err();
        assert!(matches!(err, RelayError::Decode { .. }));
        assert_eq!(handler.relay.pending(), 0);
        assert_eq!(
            handler.history.snapshot(),
            vec![Message::system("S"), Message::user("Q")]
        );
    }

    #[tokio::test]
    async fn test_skip_policy_continues_past_malformed_line() {
        let provider = ScriptedProvider::new(vec!["data: {oops\n", HELLO]);
        let handler = handler(provider, TurnOptions::default());

        let summary = handler.handle("Q").await.unwrap();
        assert_eq!(summary.reply, "Hi there");
        assert_eq!(summary.skipped_lines, 1);
    }

    #[tokio::test]
    async fn test_skip_policy_fails_when_nothing_usable_arrived() {
        let provider = ScriptedProvider::new(vec!["not json\n", "data: [DONE]\n"]);
        let handler = handler(provider, TurnOptions::default());

        let err = handler.handle("Q").await.unwrap_err();
        assert!(matches!(err, RelayError::Decode { .. }));
    }

    #[tokio::test]
    async fn test_empty_body_records_empty_reply() {
        let provider = ScriptedProvider::new(vec![]);
        let handler = handler(provider, TurnOptions::default());

        let summary = handler.handle("Q").await.unwrap();
        assert_eq!(summary.reply, "");
        assert_eq!(summary.fragments, 0);
        assert_eq!(handler.history.snapshot().last(), Some(&Message::assistant("")));
        assert_eq!(handler.relay.take_next().await, Some(Fragment::EndOfTurn));
    }

    #[tokio::test]
    async fn test_turn_deadline_times_out() {
        let handler = handler(
            ScriptedProvider::stalling(),
            TurnOptions {
                malformed_lines: MalformedLinePolicy::Skip,
                turn_timeout: Some(Duration::from_millis(50)),
            },
        );

        let err = handler.handle("Q").await.unwrap_err();
        assert!(err.is_timeout());
        assert_eq!(handler.history.len(), 2);
    }

    #[tokio::test]
    async fn test_closed_relay_rejects_before_recording() {
        let provider = ScriptedProvider::new(vec![HELLO]);
        let handler = handler(provider.clone(), TurnOptions::default());
        handler.relay.close();

        let err = handler.handle("Q").await.unwrap_err();
        assert_eq!(err, RelayError::RelayClosed);
        assert_eq!(provider.calls.load(Ordering::SeqCst), 0);
        assert_eq!(handler.history.len(), 1);
    }

    #[test]
    fn test_quote_truncates_long_lines() {
        let long = "x".repeat(500);
        let quoted = quote(&long);
        assert_eq!(quoted.len(), MAX_QUOTED_LINE + 3);
        assert_eq!(quote("short"), "short");
    }
}

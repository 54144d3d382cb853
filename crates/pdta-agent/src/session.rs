//! Agent session: transcript ownership and exchange execution
//!
//! One `AgentSession` per connected user. The transcript is append-only
//! and mutated only here; the UI layer renders a read-only projection.

use std::sync::Arc;
use std::time::Duration;

use async_stream::stream;
use futures::StreamExt;
use tokio_stream::Stream;
use tokio_util::sync::CancellationToken;

use pdta_runtime::{
    AgentDefinition, Error as RuntimeError, Message, ReplyEvent, stream::ReplyBuilder,
};

use crate::error::{Error, Result};
use crate::prompt;
use crate::runtime::{ProviderRuntime, Runtime};

/// Default model identifier
pub const DEFAULT_MODEL: &str = "gpt-4o-mini";

/// Substitute text used when the runtime returns an empty reply
pub const FALLBACK_NOTICE: &str = "I did not receive a valid response from the agent.";

/// Options controlling session construction
#[derive(Debug, Clone)]
pub struct SessionOptions {
    /// Agent name sent with every runtime call (and used in logging)
    pub agent_name: String,
    /// Model identifier
    pub model: String,
    /// Deadline applied to the blocking call and to each fragment await
    pub request_timeout: Duration,
}

impl Default for SessionOptions {
    fn default() -> Self {
        Self {
            agent_name: "pdta-assistant".to_string(),
            model: DEFAULT_MODEL.to_string(),
            request_timeout: Duration::from_secs(120),
        }
    }
}

/// A conversational agent session.
///
/// Owns the transcript exclusively. At most one exchange is in flight at a
/// time: `submit_streaming` returns a stream borrowing `&mut self`, so the
/// borrow checker rejects a second submission until it is dropped.
pub struct AgentSession {
    definition: AgentDefinition,
    transcript: Vec<Message>,
    runtime: Arc<dyn Runtime>,
    options: SessionOptions,
    cancel: CancellationToken,
}

impl AgentSession {
    /// Create a session over an arbitrary runtime implementation
    pub fn with_runtime(runtime: Arc<dyn Runtime>, options: SessionOptions) -> Self {
        let definition = AgentDefinition::new(
            options.agent_name.clone(),
            prompt::build_instructions(),
            options.model.clone(),
        );
        tracing::info!(agent = %definition.name, model = %definition.model, "agent session initialized");
        Self {
            definition,
            transcript: Vec::new(),
            runtime,
            options,
            cancel: CancellationToken::new(),
        }
    }

    /// Create a session backed by the real provider, taking the credential
    /// from the environment. Fails before serving any request if the key
    /// is absent.
    pub fn from_env(options: SessionOptions) -> Result<Self> {
        let runtime = ProviderRuntime::from_env().map_err(|_| {
            Error::Config(
                "OPENAI_API_KEY not found in environment; export it or add api_key to the config file"
                    .to_string(),
            )
        })?;
        Ok(Self::with_runtime(Arc::new(runtime), options))
    }

    /// The immutable agent configuration for this session
    pub fn definition(&self) -> &AgentDefinition {
        &self.definition
    }

    /// The conversation transcript, in chronological order
    pub fn transcript(&self) -> &[Message] {
        &self.transcript
    }

    /// Discard the entire transcript. The agent definition is unchanged.
    pub fn reset(&mut self) {
        self.transcript.clear();
        tracing::info!("conversation history cleared");
    }

    /// Get a token for cancelling the next in-flight exchange.
    ///
    /// A token spent by a previous cancellation is replaced, so the handle
    /// returned here always controls the upcoming exchange.
    pub fn cancel_handle(&mut self) -> CancellationToken {
        self.refresh_cancel();
        self.cancel.clone()
    }

    fn refresh_cancel(&mut self) {
        if self.cancel.is_cancelled() {
            self.cancel = CancellationToken::new();
        }
    }

    /// Submit a user turn and wait for the complete reply.
    ///
    /// The user turn is recorded before the call and never rolled back.
    /// Failures degrade to an apology string, recorded as the assistant
    /// turn; an empty reply is replaced by the fallback notice.
    pub async fn submit_blocking(&mut self, user_text: &str) -> String {
        self.refresh_cancel();
        self.transcript.push(Message::user(user_text));
        tracing::info!(turns = self.transcript.len(), "user message recorded");

        let deadline = self.options.request_timeout;
        let cancel = self.cancel.clone();
        let outcome = {
            let call = self.runtime.complete(&self.definition, &self.transcript);
            tokio::select! {
                _ = cancel.cancelled() => Err(RuntimeError::Aborted),
                res = tokio::time::timeout(deadline, call) => match res {
                    Ok(res) => res,
                    Err(_) => Err(RuntimeError::Timeout(deadline)),
                },
            }
        };

        let reply = match outcome {
            Ok(text) if text.is_empty() => {
                tracing::warn!("runtime returned an empty reply; substituting fallback notice");
                FALLBACK_NOTICE.to_string()
            }
            Ok(text) => text,
            Err(e) => {
                tracing::error!(error = %e, "runtime call failed");
                blocking_apology(&e)
            }
        };

        self.transcript.push(Message::assistant(reply.clone()));
        tracing::info!(turns = self.transcript.len(), "assistant reply recorded");
        reply
    }

    /// Submit a user turn and stream the reply fragment by fragment.
    ///
    /// The user turn is recorded immediately. The assistant turn is
    /// appended only once the underlying stream terminates normally, so
    /// the consumer must drain the stream for the transcript side effect
    /// to occur; abandoning it early leaves only the user turn and does
    /// not corrupt the next exchange. On failure the last yielded element
    /// is an apology string and no assistant turn is recorded.
    pub fn submit_streaming<'s>(
        &'s mut self,
        user_text: &str,
    ) -> impl Stream<Item = String> + use<'s> {
        self.refresh_cancel();
        self.transcript.push(Message::user(user_text));
        tracing::info!(turns = self.transcript.len(), "user message recorded, streaming reply");

        let deadline = self.options.request_timeout;
        let cancel = self.cancel.clone();

        stream! {
            let opened = {
                let call = self.runtime.stream(&self.definition, &self.transcript);
                tokio::select! {
                    _ = cancel.cancelled() => Err(RuntimeError::Aborted),
                    res = tokio::time::timeout(deadline, call) => match res {
                        Ok(res) => res,
                        Err(_) => Err(RuntimeError::Timeout(deadline)),
                    },
                }
            };

            let mut events = match opened {
                Ok(events) => events,
                Err(RuntimeError::Aborted) => {
                    tracing::info!("streaming exchange cancelled before opening");
                    return;
                }
                Err(e) => {
                    tracing::error!(error = %e, "failed to open reply stream");
                    yield streaming_apology(&e);
                    return;
                }
            };

            let mut builder = ReplyBuilder::new();
            loop {
                let next = tokio::select! {
                    _ = cancel.cancelled() => {
                        tracing::info!("streaming exchange cancelled");
                        return;
                    }
                    next = tokio::time::timeout(deadline, events.next()) => next,
                };

                let event = match next {
                    Ok(Some(event)) => event,
                    Ok(None) => break,
                    Err(_) => {
                        tracing::error!("reply stream stalled past the deadline");
                        yield streaming_apology(&RuntimeError::Timeout(deadline));
                        return;
                    }
                };

                builder.process_event(&event);
                match event {
                    ReplyEvent::Start => {}
                    ReplyEvent::Delta { delta } => yield delta,
                    ReplyEvent::Done { .. } => break,
                    ReplyEvent::Error { message } => {
                        tracing::error!(error = %message, "stream failed");
                        yield streaming_apology(&message);
                        return;
                    }
                }
            }

            let mut full = builder.into_text();
            if full.is_empty() {
                // Same policy as the blocking path: an empty reply becomes
                // the fallback notice, yielded and recorded.
                tracing::warn!("no fragments arrived; substituting fallback notice");
                full = FALLBACK_NOTICE.to_string();
                yield full.clone();
            }
            self.transcript.push(Message::assistant(full));
            tracing::info!(turns = self.transcript.len(), "assistant reply recorded");
        }
    }
}

fn blocking_apology(detail: &impl std::fmt::Display) -> String {
    format!(
        "Sorry, an error occurred while processing the message: {}",
        detail
    )
}

fn streaming_apology(detail: &impl std::fmt::Display) -> String {
    format!(
        "Sorry, an error occurred while streaming the response: {}",
        detail
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdta_runtime::{ReplyStream, Role};

    enum Behavior {
        Reply(String),
        Fragments(Vec<String>),
        Empty,
        Fail(String),
        FailMidStream(String),
        Stall,
    }

    struct StubRuntime {
        behavior: Behavior,
    }

    impl StubRuntime {
        fn new(behavior: Behavior) -> Arc<Self> {
            Arc::new(Self { behavior })
        }
    }

    #[async_trait::async_trait]
    impl Runtime for StubRuntime {
        async fn complete(
            &self,
            _agent: &AgentDefinition,
            _transcript: &[Message],
        ) -> pdta_runtime::Result<String> {
            match &self.behavior {
                Behavior::Reply(text) => Ok(text.clone()),
                Behavior::Fragments(parts) => Ok(parts.concat()),
                Behavior::Empty => Ok(String::new()),
                Behavior::Fail(msg) | Behavior::FailMidStream(msg) => {
                    Err(RuntimeError::api("server_error", msg.clone()))
                }
                Behavior::Stall => futures::future::pending().await,
            }
        }

        async fn stream(
            &self,
            _agent: &AgentDefinition,
            _transcript: &[Message],
        ) -> pdta_runtime::Result<ReplyStream> {
            match &self.behavior {
                Behavior::Reply(text) => {
                    let text = text.clone();
                    let events: ReplyStream = Box::pin(stream! {
                        yield ReplyEvent::Start;
                        yield ReplyEvent::Delta { delta: text.clone() };
                        yield ReplyEvent::Done { text };
                    });
                    Ok(events)
                }
                Behavior::Fragments(parts) => {
                    let parts = parts.clone();
                    let events: ReplyStream = Box::pin(stream! {
                        yield ReplyEvent::Start;
                        for part in &parts {
                            yield ReplyEvent::Delta { delta: part.clone() };
                        }
                        yield ReplyEvent::Done { text: parts.concat() };
                    });
                    Ok(events)
                }
                Behavior::Empty => {
                    let events: ReplyStream = Box::pin(stream! {
                        yield ReplyEvent::Start;
                        yield ReplyEvent::Done { text: String::new() };
                    });
                    Ok(events)
                }
                Behavior::Fail(msg) => Err(RuntimeError::api("server_error", msg.clone())),
                Behavior::FailMidStream(msg) => {
                    let msg = msg.clone();
                    let events: ReplyStream = Box::pin(stream! {
                        yield ReplyEvent::Start;
                        yield ReplyEvent::Delta { delta: "par".to_string() };
                        yield ReplyEvent::Error { message: msg };
                    });
                    Ok(events)
                }
                Behavior::Stall => {
                    let events: ReplyStream = Box::pin(stream! {
                        yield ReplyEvent::Start;
                        yield ReplyEvent::Delta { delta: "ri".to_string() };
                        futures::future::pending::<()>().await;
                    });
                    Ok(events)
                }
            }
        }
    }

    fn session(behavior: Behavior) -> AgentSession {
        AgentSession::with_runtime(StubRuntime::new(behavior), SessionOptions::default())
    }

    fn short_timeout_session(behavior: Behavior) -> AgentSession {
        let options = SessionOptions {
            request_timeout: Duration::from_millis(20),
            ..Default::default()
        };
        AgentSession::with_runtime(StubRuntime::new(behavior), options)
    }

    #[tokio::test]
    async fn test_blocking_success_records_both_turns() {
        let mut session = session(Behavior::Reply("risposta di test".to_string()));
        let reply = session.submit_blocking("Paziente con nodulo di 6mm").await;

        assert_eq!(reply, "risposta di test");
        let transcript = session.transcript();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0].role, Role::User);
        assert_eq!(transcript[0].content, "Paziente con nodulo di 6mm");
        assert_eq!(transcript[1].role, Role::Assistant);
        assert_eq!(transcript[1].content, "risposta di test");
    }

    #[tokio::test]
    async fn test_consecutive_blocking_exchanges_append_in_order() {
        let mut session = session(Behavior::Reply("ok".to_string()));
        session.submit_blocking("prima domanda").await;
        session.submit_blocking("seconda domanda").await;

        let transcript = session.transcript();
        assert_eq!(transcript.len(), 4);
        assert_eq!(transcript[0].content, "prima domanda");
        assert_eq!(transcript[1].role, Role::Assistant);
        assert_eq!(transcript[2].content, "seconda domanda");
        assert_eq!(transcript[3].role, Role::Assistant);
    }

    #[tokio::test]
    async fn test_transcript_grows_two_per_successful_exchange() {
        let mut session = session(Behavior::Reply("ok".to_string()));
        for n in 1..=3 {
            session.submit_blocking(&format!("domanda {}", n)).await;
            assert_eq!(session.transcript().len(), 2 * n);
        }
        for (i, msg) in session.transcript().iter().enumerate() {
            let expected = if i % 2 == 0 { Role::User } else { Role::Assistant };
            assert_eq!(msg.role, expected);
        }
    }

    #[tokio::test]
    async fn test_blocking_empty_reply_substitutes_fallback() {
        let mut session = session(Behavior::Empty);
        let reply = session.submit_blocking("domanda").await;

        assert_eq!(reply, FALLBACK_NOTICE);
        // Displayed text equals stored text
        assert_eq!(session.transcript()[1].content, FALLBACK_NOTICE);
    }

    #[tokio::test]
    async fn test_blocking_failure_keeps_user_turn_and_apologizes() {
        let mut session = session(Behavior::Fail("quota exceeded".to_string()));
        let reply = session.submit_blocking("domanda").await;

        assert!(reply.contains("Sorry"));
        assert!(reply.contains("quota exceeded"));
        let transcript = session.transcript();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[0].role, Role::User);
        assert_eq!(transcript[1].content, reply);
    }

    #[tokio::test]
    async fn test_blocking_timeout_degrades_to_apology() {
        let mut session = short_timeout_session(Behavior::Stall);
        let reply = session.submit_blocking("domanda").await;

        assert!(reply.contains("Sorry"));
        assert!(reply.contains("timed out"));
        assert_eq!(session.transcript().len(), 2);
    }

    #[tokio::test]
    async fn test_streaming_fragments_concatenate_into_transcript() {
        let fragments = vec!["ri".to_string(), "spo".to_string(), "sta".to_string()];
        let mut session = session(Behavior::Fragments(fragments));

        let chunks: Vec<String> = session.submit_streaming("domanda").collect().await;
        assert_eq!(chunks.concat(), "risposta");

        let transcript = session.transcript();
        assert_eq!(transcript.len(), 2);
        assert_eq!(transcript[1].role, Role::Assistant);
        assert_eq!(transcript[1].content, "risposta");
    }

    #[tokio::test]
    async fn test_streaming_failure_yields_apology_without_assistant_turn() {
        let mut session = session(Behavior::FailMidStream("connection reset".to_string()));

        let chunks: Vec<String> = session.submit_streaming("domanda").collect().await;
        let last = chunks.last().unwrap();
        assert!(last.contains("Sorry"));
        assert!(last.contains("connection reset"));

        // The failed exchange records the user turn only
        assert_eq!(session.transcript().len(), 1);
        assert_eq!(session.transcript()[0].role, Role::User);
    }

    #[tokio::test]
    async fn test_streaming_open_failure_yields_apology() {
        let mut session = session(Behavior::Fail("bad gateway".to_string()));
        let chunks: Vec<String> = session.submit_streaming("domanda").collect().await;

        assert_eq!(chunks.len(), 1);
        assert!(chunks[0].contains("bad gateway"));
        assert_eq!(session.transcript().len(), 1);
    }

    #[tokio::test]
    async fn test_streaming_empty_reply_substitutes_fallback() {
        let mut session = session(Behavior::Empty);
        let chunks: Vec<String> = session.submit_streaming("domanda").collect().await;

        assert_eq!(chunks, vec![FALLBACK_NOTICE.to_string()]);
        assert_eq!(session.transcript().len(), 2);
        assert_eq!(session.transcript()[1].content, FALLBACK_NOTICE);
    }

    #[tokio::test]
    async fn test_abandoned_stream_does_not_corrupt_next_exchange() {
        let fragments = vec!["ri".to_string(), "sposta".to_string()];
        let mut session = session(Behavior::Fragments(fragments));

        {
            let stream = session.submit_streaming("abbandonata");
            tokio::pin!(stream);
            let first = stream.next().await;
            assert_eq!(first.as_deref(), Some("ri"));
            // Dropped before draining: no assistant turn is recorded
        }
        assert_eq!(session.transcript().len(), 1);

        let reply = session.submit_blocking("seconda").await;
        assert_eq!(reply, "risposta");
        assert_eq!(session.transcript().len(), 3);
    }

    #[tokio::test]
    async fn test_cancellation_ends_stream_without_assistant_turn() {
        let mut session = session(Behavior::Stall);
        let cancel = session.cancel_handle();

        {
            let stream = session.submit_streaming("domanda");
            tokio::pin!(stream);
            assert_eq!(stream.next().await.as_deref(), Some("ri"));

            cancel.cancel();
            assert_eq!(stream.next().await, None);
        }

        assert_eq!(session.transcript().len(), 1);

        // A spent token does not poison the following exchange
        let next = session.cancel_handle();
        assert!(!next.is_cancelled());
    }

    #[tokio::test]
    async fn test_streaming_timeout_yields_apology() {
        let mut session = short_timeout_session(Behavior::Stall);
        let chunks: Vec<String> = session.submit_streaming("domanda").collect().await;

        let last = chunks.last().unwrap();
        assert!(last.contains("Sorry"));
        assert!(last.contains("timed out"));
        assert_eq!(session.transcript().len(), 1);
    }

    #[tokio::test]
    async fn test_reset_clears_transcript() {
        let mut session = session(Behavior::Reply("ok".to_string()));
        session.submit_blocking("prima").await;
        session.submit_blocking("seconda").await;
        assert_eq!(session.transcript().len(), 4);

        session.reset();
        assert!(session.transcript().is_empty());
        // The definition survives a reset
        assert!(!session.definition().instructions.is_empty());
    }

    #[tokio::test]
    async fn test_from_env_without_credential_is_config_error() {
        unsafe { std::env::remove_var("OPENAI_API_KEY") };
        let result = AgentSession::from_env(SessionOptions::default());
        assert!(matches!(result, Err(Error::Config(_))));
    }

    #[test]
    fn test_definition_embeds_guideline_instructions() {
        let session = session(Behavior::Empty);
        let definition = session.definition();
        assert_eq!(definition.model, DEFAULT_MODEL);
        assert!(definition.instructions.contains("PDTA"));
    }
}

//! Session registry: one memoized session per session id
//!
//! Repeated lookups with the same id return the same session, so the
//! expensive prompt assembly and transcript state survive across UI
//! reruns. Distinct ids get fully isolated sessions.

use std::collections::HashMap;
use std::sync::Arc;

use crate::runtime::Runtime;
use crate::session::{AgentSession, SessionOptions};

/// Opaque session identifier
pub type SessionId = uuid::Uuid;

/// Holds all live sessions for one runtime
pub struct SessionRegistry {
    runtime: Arc<dyn Runtime>,
    options: SessionOptions,
    sessions: HashMap<SessionId, AgentSession>,
}

impl SessionRegistry {
    /// Create a registry; every session it builds shares this runtime
    /// and these options
    pub fn new(runtime: Arc<dyn Runtime>, options: SessionOptions) -> Self {
        Self {
            runtime,
            options,
            sessions: HashMap::new(),
        }
    }

    /// Create a fresh session under a newly minted id
    pub fn create(&mut self) -> SessionId {
        let id = SessionId::new_v4();
        let session = AgentSession::with_runtime(self.runtime.clone(), self.options.clone());
        self.sessions.insert(id, session);
        tracing::debug!(session_id = %id, live = self.sessions.len(), "session created");
        id
    }

    /// Return the session for `id`, constructing it on first use
    pub fn get_or_create(&mut self, id: SessionId) -> &mut AgentSession {
        self.sessions.entry(id).or_insert_with(|| {
            tracing::debug!(session_id = %id, "session created on first lookup");
            AgentSession::with_runtime(self.runtime.clone(), self.options.clone())
        })
    }

    /// Look up an existing session
    pub fn get_mut(&mut self, id: &SessionId) -> Option<&mut AgentSession> {
        self.sessions.get_mut(id)
    }

    /// Drop a session and its transcript
    pub fn remove(&mut self, id: &SessionId) -> bool {
        let removed = self.sessions.remove(id).is_some();
        if removed {
            tracing::debug!(session_id = %id, live = self.sessions.len(), "session removed");
        }
        removed
    }

    /// Number of live sessions
    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    /// True when no sessions are live
    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use pdta_runtime::{AgentDefinition, Message, ReplyStream};

    struct EchoRuntime;

    #[async_trait]
    impl Runtime for EchoRuntime {
        async fn complete(
            &self,
            _agent: &AgentDefinition,
            transcript: &[Message],
        ) -> pdta_runtime::Result<String> {
            Ok(transcript.last().map(|m| m.content.clone()).unwrap_or_default())
        }

        async fn stream(
            &self,
            agent: &AgentDefinition,
            transcript: &[Message],
        ) -> pdta_runtime::Result<ReplyStream> {
            let text = self.complete(agent, transcript).await?;
            let events: ReplyStream = Box::pin(async_stream::stream! {
                yield pdta_runtime::ReplyEvent::Start;
                yield pdta_runtime::ReplyEvent::Done { text };
            });
            Ok(events)
        }
    }

    fn registry() -> SessionRegistry {
        SessionRegistry::new(Arc::new(EchoRuntime), SessionOptions::default())
    }

    #[tokio::test]
    async fn test_same_id_returns_same_session() {
        let mut registry = registry();
        let id = registry.create();

        registry.get_or_create(id).submit_blocking("eco").await;
        assert_eq!(registry.len(), 1);

        // Transcript state survives repeated lookups
        let session = registry.get_or_create(id);
        assert_eq!(session.transcript().len(), 2);
    }

    #[tokio::test]
    async fn test_distinct_ids_are_isolated() {
        let mut registry = registry();
        let a = registry.create();
        let b = registry.create();
        assert_ne!(a, b);

        registry.get_or_create(a).submit_blocking("solo per a").await;

        assert_eq!(registry.get_or_create(a).transcript().len(), 2);
        assert!(registry.get_or_create(b).transcript().is_empty());
    }

    #[test]
    fn test_get_or_create_builds_on_first_lookup() {
        let mut registry = registry();
        assert!(registry.is_empty());

        let id = SessionId::new_v4();
        assert!(registry.get_mut(&id).is_none());
        registry.get_or_create(id);
        assert_eq!(registry.len(), 1);
        assert!(registry.get_mut(&id).is_some());
    }

    #[test]
    fn test_remove_drops_session() {
        let mut registry = registry();
        let id = registry.create();
        assert!(registry.remove(&id));
        assert!(!registry.remove(&id));
        assert!(registry.is_empty());
    }
}

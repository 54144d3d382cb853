//! Runtime abstraction for executing agent calls
//!
//! The trait is the seam between the session wrapper and the network: the
//! production implementation delegates to the OpenAI client, tests plug in
//! stubs.

use async_trait::async_trait;
use pdta_runtime::{
    AgentDefinition, Message, Result, ReplyStream, providers::OpenAIProvider,
};

/// Executes one agent call against the remote runtime
#[async_trait]
pub trait Runtime: Send + Sync {
    /// Run a blocking call, returning the final output string
    async fn complete(&self, agent: &AgentDefinition, transcript: &[Message]) -> Result<String>;

    /// Open a streaming call, returning a stream of reply events
    async fn stream(&self, agent: &AgentDefinition, transcript: &[Message])
    -> Result<ReplyStream>;
}

/// Direct provider runtime, calling the chat-completions API
pub struct ProviderRuntime {
    provider: OpenAIProvider,
}

impl ProviderRuntime {
    /// Wrap an already-configured provider
    pub fn new(provider: OpenAIProvider) -> Self {
        Self { provider }
    }

    /// Create from the environment (`OPENAI_API_KEY`)
    pub fn from_env() -> Result<Self> {
        Ok(Self::new(OpenAIProvider::from_env()?))
    }
}

#[async_trait]
impl Runtime for ProviderRuntime {
    async fn complete(&self, agent: &AgentDefinition, transcript: &[Message]) -> Result<String> {
        self.provider.complete(agent, transcript).await
    }

    async fn stream(
        &self,
        agent: &AgentDefinition,
        transcript: &[Message],
    ) -> Result<ReplyStream> {
        self.provider.stream(agent, transcript).await
    }
}

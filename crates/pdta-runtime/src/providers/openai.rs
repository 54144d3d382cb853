//! OpenAI Chat Completions API provider

use async_stream::stream;
use futures::StreamExt;
use reqwest_eventsource::{Event, EventSource};
use serde::{Deserialize, Serialize};

use crate::{
    error::{Error, Result},
    stream::{ReplyEvent, ReplyStream},
    types::{AgentDefinition, Message, Role},
};

/// Default API endpoint
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI API client
pub struct OpenAIProvider {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl OpenAIProvider {
    /// Create a new provider with an API key
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_BASE_URL.to_string(),
        }
    }

    /// Create from the `OPENAI_API_KEY` environment variable
    pub fn from_env() -> Result<Self> {
        let api_key = std::env::var("OPENAI_API_KEY").map_err(|_| Error::InvalidApiKey)?;
        if api_key.trim().is_empty() {
            return Err(Error::InvalidApiKey);
        }
        Ok(Self::new(api_key))
    }

    /// Override the base URL (for OpenAI-compatible endpoints)
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Request a complete reply, returning the final output string.
    ///
    /// An empty output is returned as-is; the caller decides what to
    /// substitute for it.
    pub async fn complete(
        &self,
        agent: &AgentDefinition,
        transcript: &[Message],
    ) -> Result<String> {
        let request = build_request(agent, transcript, false);
        let url = format!("{}/chat/completions", self.base_url);

        tracing::debug!(agent = %agent.name, model = %agent.model, turns = transcript.len(), "requesting completion");

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request)
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(read_api_error(response).await);
        }

        let completion: ChatCompletion = response.json().await?;
        let text = completion
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| Error::UnexpectedResponse("no choices in completion".to_string()))?
            .message
            .content
            .unwrap_or_default();

        Ok(text)
    }

    /// Open a streaming reply, yielding events as fragments arrive
    pub async fn stream(
        &self,
        agent: &AgentDefinition,
        transcript: &[Message],
    ) -> Result<ReplyStream> {
        let request = build_request(agent, transcript, true);
        let url = format!("{}/chat/completions", self.base_url);

        tracing::debug!(agent = %agent.name, model = %agent.model, turns = transcript.len(), "opening reply stream");

        let request_builder = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&request);

        let event_source = EventSource::new(request_builder)
            .map_err(|e| Error::Sse(format!("Failed to create event source: {}", e)))?;

        Ok(Box::pin(create_stream(event_source)))
    }
}

/// Convert the agent definition plus transcript into the wire request.
/// The instructions always go first, as the system message.
fn build_request(agent: &AgentDefinition, transcript: &[Message], stream: bool) -> ChatRequest {
    let mut messages = Vec::with_capacity(transcript.len() + 1);
    messages.push(WireMessage {
        role: "system".to_string(),
        content: agent.instructions.clone(),
    });
    for msg in transcript {
        messages.push(WireMessage {
            role: msg.role.as_str().to_string(),
            content: msg.content.clone(),
        });
    }

    ChatRequest {
        model: agent.model.clone(),
        messages,
        stream,
    }
}

/// Turn a non-2xx response into a typed API error
async fn read_api_error(response: reqwest::Response) -> Error {
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    match serde_json::from_str::<ApiErrorBody>(&body) {
        Ok(parsed) => Error::api(parsed.error.error_type, parsed.error.message),
        Err(_) => Error::api(format!("http_{}", status.as_u16()), body),
    }
}

fn create_stream(mut event_source: EventSource) -> impl futures::Stream<Item = ReplyEvent> {
    stream! {
        let mut accumulated = String::new();
        let mut started = false;

        while let Some(event) = event_source.next().await {
            match event {
                Ok(Event::Open) => {
                    started = true;
                    yield ReplyEvent::Start;
                }
                Ok(Event::Message(msg)) => {
                    if msg.data == "[DONE]" {
                        break;
                    }

                    match serde_json::from_str::<StreamChunk>(&msg.data) {
                        Ok(chunk) => {
                            for choice in &chunk.choices {
                                if let Some(ref content) = choice.delta.content {
                                    if !content.is_empty() {
                                        accumulated.push_str(content);
                                        yield ReplyEvent::Delta {
                                            delta: content.clone(),
                                        };
                                    }
                                }
                            }
                        }
                        Err(e) => {
                            yield ReplyEvent::Error {
                                message: format!("Failed to parse chunk: {}", e),
                            };
                            return;
                        }
                    }
                }
                Err(reqwest_eventsource::Error::StreamEnded) => break,
                Err(e) => {
                    yield ReplyEvent::Error {
                        message: format!("SSE error: {}", e),
                    };
                    return;
                }
            }
        }

        if !started {
            yield ReplyEvent::Start;
        }
        yield ReplyEvent::Done { text: accumulated };
    }
}

// Request/Response types

#[derive(Debug, Serialize)]
struct ChatRequest {
    model: String,
    messages: Vec<WireMessage>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    message: CompletionMessage,
}

#[derive(Debug, Deserialize)]
struct CompletionMessage {
    content: Option<String>,
}

// Streaming response types

#[derive(Debug, Deserialize)]
struct StreamChunk {
    choices: Vec<StreamChoice>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    delta: StreamDelta,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    message: String,
    #[serde(rename = "type", default)]
    error_type: String,
}

//! OpenRouter-backed implementation of the model gateway.
//!
//! One conversation continuation is held at a time, scoped to an audience
//! mode. Requesting a different mode restarts the continuation, so a reply
//! never carries context from the other audience's exchange.

use anyhow::anyhow;
use async_trait::async_trait;
use chat_flow::{AudienceMode, ChatError, ModelGateway};
use rig::{
    agent::Agent,
    client::CompletionClient,
    completion::{Chat, Message as RigMessage},
    providers::openrouter,
};
use tokio::sync::Mutex;
use tracing::{debug, info};

use crate::prompts;

const DEFAULT_MODEL: &str = "openai/gpt-4o-mini";

struct Continuation {
    mode: AudienceMode,
    history: Vec<RigMessage>,
}

pub struct OpenRouterGateway {
    model: String,
    continuation: Mutex<Option<Continuation>>,
}

impl OpenRouterGateway {
    pub fn from_env() -> Self {
        let model =
            std::env::var("OPENROUTER_MODEL").unwrap_or_else(|_| DEFAULT_MODEL.to_string());
        info!(model = %model, "configured OpenRouter model gateway");
        Self {
            model,
            continuation: Mutex::new(None),
        }
    }

    fn agent(&self, mode: AudienceMode) -> anyhow::Result<Agent<openrouter::CompletionModel>> {
        let api_key = std::env::var("OPENROUTER_API_KEY")
            .map_err(|_| anyhow!("OPENROUTER_API_KEY not set"))?;
        let client = openrouter::Client::new(&api_key);
        Ok(client
            .agent(&self.model)
            .preamble(&prompts::system_prompt(mode))
            .temperature(prompts::temperature(mode))
            .build())
    }
}

#[async_trait]
impl ModelGateway for OpenRouterGateway {
    async fn generate(&self, mode: AudienceMode, prompt: &str) -> chat_flow::Result<String> {
        let mut guard = self.continuation.lock().await;
        let continuation = match &mut *guard {
            Some(continuation) if continuation.mode == mode => continuation,
            slot => {
                debug!(mode = mode.as_str(), "starting a fresh conversation continuation");
                slot.insert(Continuation {
                    mode,
                    history: Vec::new(),
                })
            }
        };

        let agent = self
            .agent(mode)
            .map_err(|err| ChatError::GatewayError(err.to_string()))?;

        let reply = agent
            .chat(prompt, continuation.history.clone())
            .await
            .map_err(|err| ChatError::GatewayError(err.to_string()))?;

        continuation.history.push(RigMessage::user(prompt.to_string()));
        continuation.history.push(RigMessage::assistant(reply.clone()));

        Ok(reply)
    }

    async fn reset(&self) {
        *self.continuation.lock().await = None;
    }
}

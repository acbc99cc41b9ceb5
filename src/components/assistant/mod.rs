pub mod extract;

pub use extract::parse_reply;

use async_trait::async_trait;
use chrono::Utc;
use rig::completion::{Chat, Message};
use rig::providers::gemini::Client as GeminiClient;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

use crate::components::calendar::EventCandidate;
use crate::config::Config;
use crate::error::{assistant_error, AppResult, Error};

/// What the assistant hands back for one chat message
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AssistantReply {
    /// Conversational answer to show the user
    #[serde(default)]
    pub message: String,
    /// Events the user asked for, if any
    #[serde(default)]
    pub events: Vec<EventCandidate>,
}

/// Text-understanding model behind `/api/process-message`
#[async_trait]
pub trait Assistant: Send + Sync + 'static {
    async fn run_conversation(&self, message: &str) -> AppResult<AssistantReply>;
}

/// Instructions for the model; `{SCHEMA}` and `{TODAY}` are filled in per call
const PREAMBLE: &str = "You are EventElf, a friendly assistant that turns requests into Google Calendar events.

Today is {TODAY}. All times are UTC.

Always answer with a single JSON object matching this JSON schema, and nothing else:
{SCHEMA}

Rules:
1. Put your reply to the user in \"message\".
2. For every event the user wants created, add one object to \"events\" with \"title\", \"date\" (YYYY-MM-DD), \"start_time\" and \"end_time\" (HH:MM, 24-hour).
3. Only set \"recurrence\" (an RRULE string such as \"RRULE:FREQ=WEEKLY;COUNT=4\") or \"reminder\" (minutes before start) when the user asks for them.
4. If details are missing, ask for them in \"message\" and leave \"events\" empty.";

/// Gemini-backed assistant
pub struct GeminiAssistant {
    client: GeminiClient,
    model: String,
    timeout: Duration,
}

impl GeminiAssistant {
    pub fn new(api_key: &str, model: &str, timeout: Duration) -> Self {
        Self {
            client: GeminiClient::new(api_key),
            model: model.to_string(),
            timeout,
        }
    }

    fn preamble() -> String {
        let schema = schemars::schema_for!(AssistantReply);
        let schema = serde_json::to_string(&schema).unwrap_or_default();
        PREAMBLE
            .replace("{TODAY}", &Utc::now().format("%Y-%m-%d").to_string())
            .replace("{SCHEMA}", &schema)
    }
}

#[async_trait]
impl Assistant for GeminiAssistant {
    async fn run_conversation(&self, message: &str) -> AppResult<AssistantReply> {
        if message.trim().is_empty() {
            return Err(Error::EmptyInput("No message provided".to_string()));
        }

        info!("Using Gemini model: {}", self.model);

        let agent = self
            .client
            .agent(&self.model)
            .preamble(&Self::preamble())
            .temperature(0.0)
            .build();

        let history: Vec<Message> = Vec::new();
        let response = tokio::time::timeout(self.timeout, agent.chat(message.to_string(), history))
            .await
            .map_err(|_| assistant_error("model did not answer in time"))?
            .map_err(|e| assistant_error(&format!("Failed to complete request: {}", e)))?;

        let reply = parse_reply(&response);
        info!("Assistant proposed {} events", reply.events.len());
        Ok(reply)
    }
}

/// Stand-in when no model API key is configured
pub struct DisabledAssistant;

#[async_trait]
impl Assistant for DisabledAssistant {
    async fn run_conversation(&self, message: &str) -> AppResult<AssistantReply> {
        if message.trim().is_empty() {
            return Err(Error::EmptyInput("No message provided".to_string()));
        }
        Err(assistant_error("assistant not configured"))
    }
}

/// Pick the assistant implementation for this configuration
pub fn from_config(config: &Config) -> Arc<dyn Assistant> {
    match &config.gemini_api_key {
        Some(api_key) => Arc::new(GeminiAssistant::new(
            api_key,
            &config.gemini_model,
            // Model calls run longer than calendar calls
            config.request_timeout * 4,
        )),
        None => {
            warn!("GEMINI_API_KEY not set, /api/process-message is disabled");
            Arc::new(DisabledAssistant)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preamble_embeds_schema() {
        let preamble = GeminiAssistant::preamble();
        assert!(preamble.contains("\"start_time\""));
        assert!(!preamble.contains("{SCHEMA}"));
        assert!(!preamble.contains("{TODAY}"));
    }

    #[tokio::test]
    async fn test_disabled_assistant() {
        let assistant = DisabledAssistant;
        assert!(matches!(
            assistant.run_conversation("lunch tomorrow").await,
            Err(Error::Assistant(_))
        ));
        assert!(matches!(
            assistant.run_conversation("   ").await,
            Err(Error::EmptyInput(_))
        ));
    }
}

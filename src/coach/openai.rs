//! OpenAI Chat Completions backed [`Summarizer`].

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use super::Summarizer;
use crate::config::{DEFAULT_OPENAI_BASE_URL, DEFAULT_OPENAI_MODEL};
use crate::error::{CoachError, Result};

const SYSTEM_PROMPT: &str = "You are a data-driven performance coach.";

pub struct OpenAiCoach {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
}

impl OpenAiCoach {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            http: reqwest::Client::new(),
            api_key: api_key.into(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            model: DEFAULT_OPENAI_MODEL.to_string(),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    fn build_request_body(&self, summary: &Value) -> Result<Value> {
        let prompt = plan_prompt(summary)?;
        Ok(serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": SYSTEM_PROMPT },
                { "role": "user", "content": prompt },
            ],
        }))
    }
}

#[async_trait]
impl Summarizer for OpenAiCoach {
    async fn summarize(&self, summary: &Value) -> Result<String> {
        let body = self.build_request_body(summary)?;
        let url = format!("{}/chat/completions", self.base_url);

        debug!(model = %self.model, "OpenAI plan request");

        let resp = self
            .http
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body_text = resp.text().await.unwrap_or_default();
            return Err(CoachError::summary(status.as_u16(), body_text));
        }

        let data: ChatResponse = resp.json().await?;
        data.choices
            .into_iter()
            .next()
            .and_then(|choice| choice.message.content)
            .ok_or_else(|| CoachError::summary(status.as_u16(), "No choices in OpenAI response"))
    }
}

fn plan_prompt(summary: &Value) -> Result<String> {
    let data = serde_json::to_string_pretty(summary)?;
    Ok(format!(
        "You are an elite hybrid athlete performance coach.

Athlete Data:
{data}

Based on recovery, strain, sleep and load:

Provide:
1. Tomorrow workout intensity (Low / Moderate / High)
2. Training recommendation
3. Calorie target
4. Protein target
5. Carb adjustment
6. Sleep target (hours)
7. Recovery protocol

Keep it structured and concise."
    ))
}

#[derive(Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Deserialize)]
struct ChatMessage {
    content: Option<String>,
}

//! Turns WHOOP data into a training plan.

pub mod openai;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;

use crate::error::Result;
use crate::whoop::WhoopApi;

pub use openai::OpenAiCoach;

/// Produces plan text from a performance summary.
#[async_trait]
pub trait Summarizer: Send + Sync {
    async fn summarize(&self, summary: &Value) -> Result<String>;
}

/// Body of the `/run-coach` response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CoachReport {
    pub performance_summary: Value,
    pub ai_plan: String,
}

/// The summary handed to the summarizer is the recovery payload itself.
pub fn build_performance_summary(recovery: Value) -> Value {
    info!(recovery = %recovery, "Performance summary built");
    recovery
}

/// Fetch recovery, summarize it and ask the summarizer for a plan.
pub async fn run_coach(api: &WhoopApi, summarizer: &dyn Summarizer) -> Result<CoachReport> {
    let recovery = api.recovery().await?;
    let performance_summary = build_performance_summary(recovery);
    let ai_plan = summarizer.summarize(&performance_summary).await?;
    Ok(CoachReport {
        performance_summary,
        ai_plan,
    })
}

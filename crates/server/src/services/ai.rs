//! Client for the external AI assistant. Two calls only: score a list of task
//! summaries, and react to a free-form description with an emoji. No scoring
//! logic lives on this side of the wire.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::error::{AppError, Result};

#[derive(Debug, Clone, Serialize)]
pub struct TaskSummary {
    pub id: String,
    pub title: String,
    pub deadline: Option<String>,
    pub importance: String,
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PriorityScore {
    pub id: String,
    pub priority_score: f64,
    pub reason: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reaction {
    pub emoji: String,
}

#[derive(Clone)]
pub struct AiService {
    base_url: String,
    client: reqwest::Client,
}

impl AiService {
    pub fn new(base_url: String) -> Self {
        Self {
            base_url,
            client: reqwest::Client::new(),
        }
    }

    /// Ask the assistant to score the given tasks. The response is merged by
    /// id: entries for unknown ids are ignored, and input ids missing from the
    /// response simply stay unscored (the caller keeps prior state). The
    /// request carries no mutation, so retrying it is always safe.
    pub async fn prioritize(&self, tasks: &[TaskSummary]) -> Result<Vec<PriorityScore>> {
        if tasks.is_empty() {
            return Ok(vec![]);
        }

        let url = format!("{}/prioritize", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&json!({ "tasks": tasks }))
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("AI service unreachable: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::Internal(format!(
                "AI service returned {}",
                response.status()
            )));
        }

        let scores: Vec<PriorityScore> = response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Malformed AI response: {e}")))?;

        let known: HashSet<&str> = tasks.iter().map(|t| t.id.as_str()).collect();
        Ok(scores
            .into_iter()
            .filter(|score| known.contains(score.id.as_str()))
            .collect())
    }

    pub async fn react_to(&self, description: &str) -> Result<Reaction> {
        let url = format!("{}/react", self.base_url);
        let response = self
            .client
            .post(&url)
            .json(&json!({ "description": description }))
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("AI service unreachable: {e}")))?;

        if !response.status().is_success() {
            return Err(AppError::Internal(format!(
                "AI service returned {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AppError::Internal(format!("Malformed AI response: {e}")))
    }
}

//! Normalized quota data handed to consumers.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// Prompt credit balance of the current plan
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PromptCredits {
    pub available: f64,
    pub monthly: f64,
    /// Share of the monthly allowance already spent (0-100)
    pub used_pct: f64,
    /// Share of the monthly allowance left (0-100)
    pub remaining_pct: f64,
}

/// Quota of one model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ModelQuota {
    /// Display label (e.g., "Claude Sonnet 4.5 (Thinking)")
    pub label: String,
    /// Internal model id, "unknown" when the server sent none
    pub model_id: String,
    /// 0..1, absent when the server sent none
    pub remaining_fraction: Option<f64>,
    /// `remaining_fraction * 100`
    pub remaining_pct: Option<f64>,
    pub is_exhausted: bool,
    pub reset_at: DateTime<Utc>,
    /// `reset_at - captured_at`; negative once the reset time has passed
    pub time_until_reset_ms: i64,
    /// Localized countdown (e.g., "2h 05m", "Ready")
    pub time_until_reset_display: String,
}

/// One successful poll. Superseded, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QuotaSnapshot {
    pub captured_at: DateTime<Utc>,
    pub user_name: Option<String>,
    pub email: Option<String>,
    pub plan_name: Option<String>,
    pub prompt_credits: Option<PromptCredits>,
    pub models: Vec<ModelQuota>,
}

impl QuotaSnapshot {
    /// Look up a model by label or model id
    pub fn model(&self, key: &str) -> Option<&ModelQuota> {
        self.models
            .iter()
            .find(|m| m.label == key || m.model_id == key)
    }
}

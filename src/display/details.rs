//! Multi-line quota report.

use agquota_core::i18n::{MessageKey, Translator};
use agquota_core::quota::{ModelQuota, PromptCredits, QuotaSnapshot};
use chrono::{DateTime, Local, Utc};

use super::status_line::percent_label;

/// Labels listed first, in this order; other models follow as received
const PREFERRED_ORDER: &[&str] = &[
    "Gemini 3 Pro (High)",
    "Gemini 3 Pro (Low)",
    "Gemini 3 Flash",
    "Claude Sonnet 4.5",
    "Claude Sonnet 4.5 (Thinking)",
    "Claude Opus 4.5 (Thinking)",
    "GPT-OSS 120B (Medium)",
];

const SEPARATOR_WIDTH: usize = 30;
const BAR_CELLS: usize = 10;

/// `▓▓▓░░░░░░░` for 30%
pub fn progress_bar(pct: f64) -> String {
    let filled = ((pct / 100.0) * BAR_CELLS as f64).round().clamp(0.0, BAR_CELLS as f64) as usize;
    format!("{}{}", "▓".repeat(filled), "░".repeat(BAR_CELLS - filled))
}

/// Models in display order
pub fn ordered_models(models: &[ModelQuota]) -> Vec<&ModelQuota> {
    let mut ordered: Vec<&ModelQuota> = PREFERRED_ORDER
        .iter()
        .filter_map(|label| models.iter().find(|m| m.label == *label))
        .collect();
    ordered.extend(
        models
            .iter()
            .filter(|m| !PREFERRED_ORDER.contains(&m.label.as_str())),
    );
    ordered
}

fn format_timestamp(at: DateTime<Utc>) -> String {
    at.with_timezone(&Local).format("%Y-%m-%d %H:%M:%S").to_string()
}

fn credits_lines(credits: &PromptCredits, translator: &Translator) -> [String; 2] {
    [
        format!(
            "{}: {:.0} / {:.0}",
            translator.t(MessageKey::PromptCredits),
            credits.available,
            credits.monthly
        ),
        format!(
            "{} {:.1}%",
            progress_bar(credits.remaining_pct),
            credits.remaining_pct
        ),
    ]
}

/// Full report: account, plan, per-model quota and (optionally) prompt credits
pub fn render(snapshot: &QuotaSnapshot, translator: &Translator, show_credits: bool) -> String {
    let mut lines = Vec::new();

    if let Some(name) = &snapshot.user_name {
        lines.push(name.clone());
    }
    if let Some(email) = &snapshot.email {
        lines.push(email.clone());
    }
    if let Some(plan) = &snapshot.plan_name {
        lines.push(format!("{}: {}", translator.t(MessageKey::Plan), plan));
    }
    lines.push(format!(
        "{}: {}",
        translator.t(MessageKey::LastUpdated),
        format_timestamp(snapshot.captured_at)
    ));
    lines.push("─".repeat(SEPARATOR_WIDTH));

    if snapshot.models.is_empty() {
        lines.push(translator.t(MessageKey::NoModelData).to_string());
    }
    for model in ordered_models(&snapshot.models) {
        lines.push(format!(
            "{}: {} -- ⏳ {}",
            model.label,
            percent_label(model),
            model.time_until_reset_display
        ));
    }

    if show_credits {
        if let Some(credits) = &snapshot.prompt_credits {
            lines.push("─".repeat(SEPARATOR_WIDTH));
            lines.extend(credits_lines(credits, translator));
        }
    }

    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use agquota_core::i18n::Language;
    use pretty_assertions::assert_eq;

    fn model(label: &str, pct: f64, countdown: &str) -> ModelQuota {
        ModelQuota {
            label: label.to_string(),
            model_id: "unknown".to_string(),
            remaining_fraction: Some(pct / 100.0),
            remaining_pct: Some(pct),
            is_exhausted: pct == 0.0,
            reset_at: Utc::now(),
            time_until_reset_ms: 1,
            time_until_reset_display: countdown.to_string(),
        }
    }

    fn snapshot() -> QuotaSnapshot {
        QuotaSnapshot {
            captured_at: Utc::now(),
            user_name: Some("Ada".to_string()),
            email: Some("ada@example.com".to_string()),
            plan_name: Some("Pro".to_string()),
            prompt_credits: Some(PromptCredits {
                available: 12500.0,
                monthly: 50000.0,
                used_pct: 75.0,
                remaining_pct: 25.0,
            }),
            models: vec![
                model("Zeta 1", 50.0, "1h 00m"),
                model("Claude Sonnet 4.5 (Thinking)", 80.0, "2h 05m"),
                model("Gemini 3 Pro (High)", 0.0, "Ready"),
            ],
        }
    }

    #[test]
    fn test_progress_bar() {
        assert_eq!(progress_bar(0.0), "░░░░░░░░░░");
        assert_eq!(progress_bar(25.0), "▓▓▓░░░░░░░");
        assert_eq!(progress_bar(100.0), "▓▓▓▓▓▓▓▓▓▓");
        assert_eq!(progress_bar(150.0), "▓▓▓▓▓▓▓▓▓▓");
    }

    #[test]
    fn test_preferred_order_then_rest() {
        let snap = snapshot();
        let labels: Vec<&str> = ordered_models(&snap.models)
            .iter()
            .map(|m| m.label.as_str())
            .collect();
        assert_eq!(
            labels,
            vec!["Gemini 3 Pro (High)", "Claude Sonnet 4.5 (Thinking)", "Zeta 1"]
        );
    }

    #[test]
    fn test_render_details() {
        let text = render(&snapshot(), &Translator::new(Language::En), true);
        let lines: Vec<&str> = text.lines().collect();

        assert_eq!(lines[0], "Ada");
        assert_eq!(lines[1], "ada@example.com");
        assert_eq!(lines[2], "Plan: Pro");
        assert!(lines[3].starts_with("Last updated: "));
        assert_eq!(lines[4], "─".repeat(30));
        assert_eq!(lines[5], "Gemini 3 Pro (High): 0% -- ⏳ Ready");
        assert_eq!(lines[6], "Claude Sonnet 4.5 (Thinking): 80% -- ⏳ 2h 05m");
        assert_eq!(lines[7], "Zeta 1: 50% -- ⏳ 1h 00m");
        assert_eq!(lines[9], "Prompt credits: 12500 / 50000");
        assert_eq!(lines[10], "▓▓▓░░░░░░░ 25.0%");
    }

    #[test]
    fn test_render_without_credits_or_models() {
        let mut snap = snapshot();
        snap.models.clear();
        let text = render(&snap, &Translator::new(Language::En), false);
        assert!(text.ends_with("No model data"));
        assert!(!text.contains("Prompt credits"));
    }
}

//! One-line summary of pinned model quotas.

use agquota_core::quota::{ModelQuota, QuotaSnapshot};
use once_cell::sync::Lazy;
use regex::Regex;

/// Word separators for generated abbreviations
static WORD_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\s\-_()]+").expect("Invalid WORD_SEPARATOR regex"));

static DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").expect("Invalid DIGITS regex"));

/// Fixed short names for well-known model labels
const ABBREVIATIONS: &[(&str, &str)] = &[
    ("Gemini 3 Pro (High)", "Gemini 3 Pro (H)"),
    ("Gemini 3 Pro (Low)", "Gemini 3 Pro (L)"),
    ("Gemini 3 Flash", "Gemini 3 Flash"),
    ("Claude Sonnet 4.5", "Claude S4.5"),
    ("Claude Sonnet 4.5 (Thinking)", "Claude S4.5T"),
    ("Claude Opus 4.5 (Thinking)", "Claude O4.5T"),
    ("GPT-OSS 120B (Medium)", "GPT-OSS (M)"),
];

/// Below this remaining percentage a model gets the warning icon
const LOW_QUOTA_PCT: f64 = 20.0;

/// Short name of a model label.
///
/// Unknown labels become the initial letter plus first digit run of each
/// word, at most five characters ("Foo Bar 2" → "FB2").
pub fn abbreviate(label: &str) -> String {
    if let Some((_, short)) = ABBREVIATIONS.iter().find(|(full, _)| *full == label) {
        return (*short).to_string();
    }

    WORD_SEPARATOR
        .split(label)
        .filter(|word| !word.is_empty())
        .map(|word| {
            let initial = word
                .chars()
                .next()
                .filter(|c| c.is_ascii_alphabetic())
                .map(|c| c.to_ascii_uppercase().to_string())
                .unwrap_or_default();
            let digits = DIGITS.find(word).map(|m| m.as_str()).unwrap_or("");
            format!("{}{}", initial, digits)
        })
        .collect::<String>()
        .chars()
        .take(5)
        .collect()
}

/// `✗` exhausted, `⚠` low, `✓` otherwise
pub fn status_icon(model: &ModelQuota) -> &'static str {
    if model.is_exhausted {
        "✗"
    } else if model.remaining_pct.is_some_and(|pct| pct < LOW_QUOTA_PCT) {
        "⚠"
    } else {
        "✓"
    }
}

/// Rounded percentage or `N/A`
pub fn percent_label(model: &ModelQuota) -> String {
    match model.remaining_pct {
        Some(pct) => format!("{}%", pct.round() as i64),
        None => "N/A".to_string(),
    }
}

/// Models shown on the status line: pinned ones (by id or label), or all
pub fn visible_models<'a>(snapshot: &'a QuotaSnapshot, pinned: &[String]) -> Vec<&'a ModelQuota> {
    snapshot
        .models
        .iter()
        .filter(|m| {
            pinned.is_empty() || pinned.iter().any(|p| *p == m.model_id || *p == m.label)
        })
        .collect()
}

/// `✓ Claude S4.5T: 80%  ⚠ Gemini 3 Flash: 12%`; `None` when no model is visible
pub fn render(snapshot: &QuotaSnapshot, pinned: &[String]) -> Option<String> {
    let parts: Vec<String> = visible_models(snapshot, pinned)
        .into_iter()
        .map(|m| format!("{} {}: {}", status_icon(m), abbreviate(&m.label), percent_label(m)))
        .collect();

    (!parts.is_empty()).then(|| parts.join("  "))
}

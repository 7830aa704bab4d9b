//! Turn a `GetUserStatus` response into a [`QuotaSnapshot`].

use chrono::{DateTime, Utc};
use tracing::debug;

use super::types::{ModelQuota, PromptCredits, QuotaSnapshot};
use crate::client::wire::{ClientModelConfig, PlanStatus, UserStatusResponse};
use crate::i18n::{MessageKey, Translator};

/// Normalize a user status response captured at `now`.
///
/// Models without quota information are left out. A missing or unparseable
/// reset time counts as "already reset".
pub fn parse_user_status(
    response: &UserStatusResponse,
    now: DateTime<Utc>,
    translator: &Translator,
) -> QuotaSnapshot {
    let status = &response.user_status;

    let models = status
        .cascade_model_config_data
        .as_ref()
        .map(|data| {
            data.client_model_configs
                .iter()
                .filter_map(|config| parse_model(config, now, translator))
                .collect()
        })
        .unwrap_or_default();

    QuotaSnapshot {
        captured_at: now,
        user_name: status.name.clone(),
        email: status.email.clone(),
        plan_name: status
            .plan_status
            .as_ref()
            .and_then(|p| p.plan_info.as_ref())
            .and_then(|info| info.plan_name.clone()),
        prompt_credits: status.plan_status.as_ref().and_then(parse_prompt_credits),
        models,
    }
}

fn parse_model(
    config: &ClientModelConfig,
    now: DateTime<Utc>,
    translator: &Translator,
) -> Option<ModelQuota> {
    let quota = config.quota_info.as_ref()?;

    let reset_at = match quota.reset_time.as_deref() {
        Some(raw) => match DateTime::parse_from_rfc3339(raw) {
            Ok(parsed) => parsed.with_timezone(&Utc),
            Err(e) => {
                debug!(label = %config.label, raw, "Unparseable reset time: {}", e);
                now
            }
        },
        None => now,
    };
    let time_until_reset_ms = (reset_at - now).num_milliseconds();

    Some(ModelQuota {
        label: config.label.clone(),
        model_id: config
            .model_or_alias
            .as_ref()
            .and_then(|m| m.model.clone())
            .unwrap_or_else(|| "unknown".to_string()),
        remaining_fraction: quota.remaining_fraction,
        remaining_pct: quota.remaining_fraction.map(|f| f * 100.0),
        is_exhausted: quota.remaining_fraction == Some(0.0),
        reset_at,
        time_until_reset_ms,
        time_until_reset_display: format_time(time_until_reset_ms, translator),
    })
}

fn parse_prompt_credits(plan: &PlanStatus) -> Option<PromptCredits> {
    let monthly = plan.plan_info.as_ref()?.monthly_prompt_credits?;
    let available = plan.available_prompt_credits?;
    if monthly <= 0.0 {
        return None;
    }

    Some(PromptCredits {
        available,
        monthly,
        used_pct: (monthly - available) / monthly * 100.0,
        remaining_pct: available / monthly * 100.0,
    })
}

/// Format a countdown: "Ready", "45m" or "2h 05m". Partial minutes round up.
pub fn format_time(ms: i64, translator: &Translator) -> String {
    if ms <= 0 {
        return translator.t(MessageKey::Ready).to_string();
    }

    let total_minutes = (ms + 59_999) / 60_000;
    let hours = total_minutes / 60;
    let minutes = total_minutes % 60;

    if hours > 0 {
        format!("{}h {:02}m", hours, minutes)
    } else {
        format!("{}m", minutes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::i18n::Language;
    use chrono::TimeZone;
    use pretty_assertions::assert_eq;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 3, 1, 12, 0, 0).unwrap()
    }

    fn en() -> Translator {
        Translator::new(Language::En)
    }

    fn response(json: &str) -> UserStatusResponse {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_parse_full_status() {
        let json = r#"{
            "userStatus": {
                "name": "Ada",
                "email": "ada@example.com",
                "planStatus": {
                    "planInfo": {"planName": "Pro", "monthlyPromptCredits": 50000},
                    "availablePromptCredits": "12500"
                },
                "cascadeModelConfigData": {
                    "clientModelConfigs": [
                        {
                            "label": "Claude Sonnet 4.5 (Thinking)",
                            "modelOrAlias": {"model": "MODEL_CLAUDE_4_5_SONNET_THINKING"},
                            "quotaInfo": {"remainingFraction": 0.5, "resetTime": "2026-03-01T14:05:00Z"}
                        },
                        {
                            "label": "Gemini 3 Pro (High)",
                            "quotaInfo": {"remainingFraction": 0, "resetTime": "2026-03-01T12:30:00Z"}
                        },
                        {
                            "label": "No quota model",
                            "modelOrAlias": {"model": "MODEL_X"}
                        }
                    ]
                }
            }
        }"#;

        let snapshot = parse_user_status(&response(json), now(), &en());

        assert_eq!(snapshot.captured_at, now());
        assert_eq!(snapshot.user_name.as_deref(), Some("Ada"));
        assert_eq!(snapshot.email.as_deref(), Some("ada@example.com"));
        assert_eq!(snapshot.plan_name.as_deref(), Some("Pro"));

        let credits = snapshot.prompt_credits.as_ref().unwrap();
        assert_eq!(credits.available, 12500.0);
        assert_eq!(credits.used_pct, 75.0);
        assert_eq!(credits.remaining_pct, 25.0);

        assert_eq!(snapshot.models.len(), 2);

        let claude = &snapshot.models[0];
        assert_eq!(claude.model_id, "MODEL_CLAUDE_4_5_SONNET_THINKING");
        assert_eq!(claude.remaining_pct, Some(50.0));
        assert!(!claude.is_exhausted);
        assert_eq!(claude.time_until_reset_ms, 125 * 60_000);
        assert_eq!(claude.time_until_reset_display, "2h 05m");

        let gemini = snapshot.model("Gemini 3 Pro (High)").unwrap();
        assert_eq!(gemini.model_id, "unknown");
        assert!(gemini.is_exhausted);
        assert_eq!(gemini.remaining_pct, Some(0.0));
        assert_eq!(gemini.time_until_reset_display, "30m");
    }

    #[test]
    fn test_zero_monthly_credits_omits_prompt_credits() {
        let json = r#"{
            "userStatus": {
                "planStatus": {
                    "planInfo": {"planName": "Free", "monthlyPromptCredits": 0},
                    "availablePromptCredits": 0
                }
            }
        }"#;
        let snapshot = parse_user_status(&response(json), now(), &en());
        assert_eq!(snapshot.plan_name.as_deref(), Some("Free"));
        assert!(snapshot.prompt_credits.is_none());
        assert!(snapshot.models.is_empty());
    }

    #[test]
    fn test_missing_available_credits_omits_prompt_credits() {
        let json = r#"{"userStatus": {"planStatus": {"planInfo": {"monthlyPromptCredits": 100}}}}"#;
        let snapshot = parse_user_status(&response(json), now(), &en());
        assert!(snapshot.prompt_credits.is_none());
    }

    #[test]
    fn test_missing_fraction_and_past_reset() {
        let json = r#"{
            "userStatus": {
                "cascadeModelConfigData": {
                    "clientModelConfigs": [
                        {"label": "A", "quotaInfo": {"resetTime": "2026-03-01T11:00:00Z"}},
                        {"label": "B", "quotaInfo": {"remainingFraction": 1, "resetTime": "garbage"}}
                    ]
                }
            }
        }"#;
        let snapshot = parse_user_status(&response(json), now(), &en());

        let a = &snapshot.models[0];
        assert!(a.remaining_fraction.is_none());
        assert!(a.remaining_pct.is_none());
        assert!(!a.is_exhausted);
        assert_eq!(a.time_until_reset_ms, -60 * 60_000);
        assert_eq!(a.time_until_reset_display, "Ready");

        let b = &snapshot.models[1];
        assert_eq!(b.reset_at, now());
        assert_eq!(b.time_until_reset_ms, 0);
        assert_eq!(b.remaining_pct, Some(100.0));
    }

    #[test]
    fn test_exhausted_iff_fraction_is_zero() {
        for (fraction, exhausted) in [(Some(0.0), true), (Some(0.001), false), (None, false)] {
            let config = ClientModelConfig {
                label: "M".to_string(),
                model_or_alias: None,
                quota_info: Some(crate::client::wire::QuotaInfo {
                    remaining_fraction: fraction,
                    reset_time: None,
                }),
            };
            let model = parse_model(&config, now(), &en()).unwrap();
            assert_eq!(model.is_exhausted, exhausted);
            assert_eq!(model.remaining_pct.is_some(), fraction.is_some());
        }
    }

    #[test]
    fn test_format_time() {
        let t = en();
        assert_eq!(format_time(0, &t), "Ready");
        assert_eq!(format_time(-5_000, &t), "Ready");
        assert_eq!(format_time(1, &t), "1m");
        assert_eq!(format_time(60_000, &t), "1m");
        assert_eq!(format_time(60_001, &t), "2m");
        assert_eq!(format_time(59 * 60_000, &t), "59m");
        assert_eq!(format_time(60 * 60_000, &t), "1h 00m");
        assert_eq!(format_time((3 * 60 + 7) * 60_000, &t), "3h 07m");
        assert_eq!(format_time(0, &Translator::new(Language::Ja)), "準備完了");
    }
}

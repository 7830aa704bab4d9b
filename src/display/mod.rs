//! Terminal output for quota updates.
//!
//! Text mode prints the status line followed by the detailed report; JSON
//! mode prints one object per line. Logs go to stderr, so stdout carries
//! nothing else.

pub mod details;
pub mod status_line;

use agquota_core::config::Settings;
use agquota_core::discovery::ConnectionParameters;
use agquota_core::error::QuotaError;
use agquota_core::i18n::{MessageKey, Translator};
use agquota_core::platform::ErrorMessages;
use agquota_core::quota::QuotaSnapshot;
use serde_json::json;

/// Output format
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Text,
    Json,
}

/// Renders poller events for the terminal
#[derive(Debug, Clone)]
pub struct Display {
    mode: OutputMode,
    translator: Translator,
    show_extra_credits: bool,
    pinned_models: Vec<String>,
}

impl Display {
    pub fn new(settings: &Settings, mode: OutputMode) -> Self {
        Self {
            mode,
            translator: Translator::new(settings.language),
            show_extra_credits: settings.show_extra_credits,
            pinned_models: settings.pinned_models.clone(),
        }
    }

    /// Pick up display-related settings after a reload
    pub fn apply_settings(&mut self, settings: &Settings) {
        self.translator = Translator::new(settings.language);
        self.show_extra_credits = settings.show_extra_credits;
        self.pinned_models = settings.pinned_models.clone();
    }

    pub fn translator(&self) -> &Translator {
        &self.translator
    }

    pub fn render_snapshot(&self, snapshot: &QuotaSnapshot) -> String {
        match self.mode {
            OutputMode::Json => serde_json::to_string(snapshot)
                .unwrap_or_else(|e| json!({ "error": e.to_string() }).to_string()),
            OutputMode::Text => {
                let status = status_line::render(snapshot, &self.pinned_models)
                    .unwrap_or_else(|| self.translator.t(MessageKey::WaitingQuota).to_string());
                let report = details::render(snapshot, &self.translator, self.show_extra_credits);
                format!("{}\n\n{}\n", status, report)
            }
        }
    }

    pub fn render_error(&self, error: &QuotaError) -> String {
        let message = match error {
            QuotaError::Timeout => self.translator.t(MessageKey::RequestTimeout).to_string(),
            QuotaError::InvalidResponse(_) => self.translator.t(MessageKey::JsonParseFailed).to_string(),
            other => format!("{} {}", self.translator.t(MessageKey::QuotaFetchError), other),
        };
        match self.mode {
            OutputMode::Json => json!({ "error": message }).to_string(),
            OutputMode::Text => format!("✗ {}", message),
        }
    }

    /// Not-found message plus platform-specific troubleshooting.
    ///
    /// `command_failed` adds the strategy's hint about the listing tools.
    pub fn render_not_found(&self, messages: &ErrorMessages, command_failed: bool) -> String {
        let t = &self.translator;
        let command_hint = command_failed.then_some(messages.command_not_available);
        if self.mode == OutputMode::Json {
            return json!({
                "error": t.t(MessageKey::ProcessNotFound),
                "detail": messages.process_not_found,
                "command": command_hint,
                "requirements": messages.requirements,
            })
            .to_string();
        }

        let mut lines = vec![format!("✗ {}", t.t(MessageKey::ProcessNotFound))];
        if let Some(hint) = command_hint {
            lines.push(format!("  {}", hint));
        }
        lines.push(String::new());
        lines.push(t.t(MessageKey::TroubleshootingTitle).to_string());
        for (i, key) in [
            MessageKey::TroubleshootingStep1,
            MessageKey::TroubleshootingStep2,
            MessageKey::TroubleshootingStep3,
        ]
        .into_iter()
        .enumerate()
        {
            lines.push(format!("  {}. {}", i + 1, t.t(key)));
        }
        for requirement in &messages.requirements {
            lines.push(format!("  - {}", requirement));
        }
        lines.join("\n")
    }

    pub fn render_connection(&self, params: &ConnectionParameters) -> String {
        match self.mode {
            OutputMode::Json => json!({
                "declared_port": params.declared_port,
                "verified_port": params.verified_port,
                "auth_token": params.masked_token(),
            })
            .to_string(),
            OutputMode::Text => format!(
                "declared port: {}\nverified port: {}\ntoken: {}",
                params.declared_port,
                params.verified_port,
                params.masked_token()
            ),
        }
    }

    /// Write to stdout
    pub fn emit(&self, text: &str) {
        println!("{}", text);
    }
}

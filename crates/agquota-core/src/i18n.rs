//! Message tables for the two supported display languages.

use serde::{Deserialize, Serialize};

/// Display language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    /// Pick from the process locale (`LC_ALL`, `LC_MESSAGES`, `LANG`)
    #[default]
    Auto,
    /// English
    En,
    /// Japanese
    Ja,
}

impl Language {
    /// Resolve `Auto` against the environment. Never returns `Auto`.
    pub fn resolve(self) -> Language {
        match self {
            Language::Auto => {
                let locale = ["LC_ALL", "LC_MESSAGES", "LANG"]
                    .iter()
                    .filter_map(|var| std::env::var(var).ok())
                    .find(|value| !value.is_empty())
                    .unwrap_or_default();
                if locale.to_ascii_lowercase().starts_with("ja") {
                    Language::Ja
                } else {
                    Language::En
                }
            }
            other => other,
        }
    }

    /// Locale code sent to the language server
    pub fn code(self) -> &'static str {
        match self.resolve() {
            Language::Ja => "ja",
            _ => "en",
        }
    }
}

impl std::str::FromStr for Language {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "auto" => Ok(Language::Auto),
            "en" | "english" => Ok(Language::En),
            "ja" | "japanese" => Ok(Language::Ja),
            other => Err(format!("unsupported language: {}", other)),
        }
    }
}

/// Keys of every translatable message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKey {
    JsonParseFailed,
    RequestTimeout,
    QuotaFetchError,
    Ready,
    Plan,
    LastUpdated,
    NoModelData,
    WaitingQuota,
    PromptCredits,
    RefreshingQuota,
    ReconnectTriggered,
    Reconnecting,
    InitializationSuccessful,
    ProcessNotFound,
    TroubleshootingTitle,
    TroubleshootingStep1,
    TroubleshootingStep2,
    TroubleshootingStep3,
}

/// Looks up messages for a fixed language
#[derive(Debug, Clone, Copy)]
pub struct Translator {
    language: Language,
}

impl Translator {
    /// Create a translator; `Auto` is resolved once here
    pub fn new(language: Language) -> Self {
        Self {
            language: language.resolve(),
        }
    }

    /// The resolved language
    pub fn language(&self) -> Language {
        self.language
    }

    /// Translate a message key
    pub fn t(&self, key: MessageKey) -> &'static str {
        match self.language {
            Language::Ja => ja(key),
            _ => en(key),
        }
    }
}

impl Default for Translator {
    fn default() -> Self {
        Self::new(Language::Auto)
    }
}

fn en(key: MessageKey) -> &'static str {
    use MessageKey::*;
    match key {
        JsonParseFailed => "Invalid JSON response",
        RequestTimeout => "Request timeout",
        QuotaFetchError => "Quota fetch error:",
        Ready => "Ready",
        Plan => "Plan",
        LastUpdated => "Last updated",
        NoModelData => "No model data",
        WaitingQuota => "Waiting for quota info...",
        PromptCredits => "Prompt credits",
        RefreshingQuota => "Refreshing Quota...",
        ReconnectTriggered => "Reconnect triggered",
        Reconnecting => "Reconnecting to Antigravity process...",
        InitializationSuccessful => "Initialization successful",
        ProcessNotFound => "Antigravity process not found",
        TroubleshootingTitle => "Troubleshooting tips:",
        TroubleshootingStep1 => "Make sure Antigravity is running",
        TroubleshootingStep2 => "Check if the language_server process is running",
        TroubleshootingStep3 => "Run with --debug for detailed logs",
    }
}

fn ja(key: MessageKey) -> &'static str {
    use MessageKey::*;
    match key {
        JsonParseFailed => "レスポンスの JSON 解析に失敗しました",
        RequestTimeout => "リクエストがタイムアウトしました",
        QuotaFetchError => "クォータ取得エラー:",
        Ready => "準備完了",
        Plan => "プラン",
        LastUpdated => "最終更新",
        NoModelData => "モデルデータがありません",
        WaitingQuota => "クォータ情報の取得を待機中...",
        PromptCredits => "プロンプトクレジット",
        RefreshingQuota => "クォータ情報を更新中...",
        ReconnectTriggered => "再接続がトリガーされました",
        Reconnecting => "Antigravity プロセスに再接続しています...",
        InitializationSuccessful => "初期化に成功しました",
        ProcessNotFound => "Antigravity プロセスが見つかりませんでした",
        TroubleshootingTitle => "トラブルシューティング:",
        TroubleshootingStep1 => "Antigravity が起動していることを確認してください",
        TroubleshootingStep2 => "language_server プロセスが実行中か確認してください",
        TroubleshootingStep3 => "--debug を付けて詳細なログを確認してください",
    }
}

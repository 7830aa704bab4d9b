//! JSON shapes exchanged with the language server.
//!
//! The server speaks Connect-over-JSON with camelCase field names. Every
//! field except `userStatus` is optional; proto3 JSON drops defaults.

use serde::{Deserialize, Deserializer, Serialize};

/// Body of `GetUserStatus`
#[derive(Debug, Clone, Serialize)]
pub struct UserStatusRequest {
    pub metadata: ClientMetadata,
}

/// Client identification sent with every status request
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientMetadata {
    pub ide_name: String,
    pub extension_name: String,
    pub locale: String,
}

impl UserStatusRequest {
    pub fn new(locale: &str) -> Self {
        Self {
            metadata: ClientMetadata {
                ide_name: "antigravity".to_string(),
                extension_name: "antigravity".to_string(),
                locale: locale.to_string(),
            },
        }
    }
}

/// Body of the `GetUnleashData` liveness probe
#[derive(Debug, Clone, Default, Serialize)]
pub struct ProbeRequest {
    pub wrapper_data: serde_json::Map<String, serde_json::Value>,
}

/// Response of `GetUserStatus`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStatusResponse {
    pub user_status: UserStatus,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserStatus {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub plan_status: Option<PlanStatus>,
    #[serde(default)]
    pub cascade_model_config_data: Option<CascadeModelConfigData>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanStatus {
    #[serde(default)]
    pub plan_info: Option<PlanInfo>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub available_prompt_credits: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanInfo {
    #[serde(default)]
    pub plan_name: Option<String>,
    #[serde(default, deserialize_with = "lenient_f64")]
    pub monthly_prompt_credits: Option<f64>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CascadeModelConfigData {
    #[serde(default)]
    pub client_model_configs: Vec<ClientModelConfig>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClientModelConfig {
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub model_or_alias: Option<ModelOrAlias>,
    #[serde(default)]
    pub quota_info: Option<QuotaInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ModelOrAlias {
    #[serde(default)]
    pub model: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuotaInfo {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub remaining_fraction: Option<f64>,
    #[serde(default)]
    pub reset_time: Option<String>,
}

/// Accept a JSON number or a numeric string (int64 fields arrive as strings)
fn lenient_f64<'de, D>(deserializer: D) -> Result<Option<f64>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(serde_json::Value::Number(n)) => n.as_f64(),
        Some(serde_json::Value::String(s)) => s.trim().parse::<f64>().ok(),
        _ => None,
    })
}

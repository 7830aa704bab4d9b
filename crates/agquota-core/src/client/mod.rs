//! HTTPS client for the language server's loopback API.

pub mod wire;

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::time::Duration;
use tracing::debug;

use crate::discovery::ConnectionParameters;
use crate::error::QuotaError;
use crate::i18n::Language;
use crate::quota::QuotaSource;

pub use wire::{UserStatusRequest, UserStatusResponse};

/// Path of the lightweight endpoint used to verify a port
pub const PROBE_PATH: &str = "/exa.language_server_pb.LanguageServerService/GetUnleashData";

/// Path of the user status endpoint carrying quota data
pub const USER_STATUS_PATH: &str = "/exa.language_server_pb.LanguageServerService/GetUserStatus";

/// Header carrying the token taken from `--csrf_token`
pub const CSRF_HEADER: &str = "X-Codeium-Csrf-Token";

/// Deadline for a single quota request
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

/// Deadline for a port verification probe
pub const PROBE_TIMEOUT: Duration = Duration::from_millis(500);

/// Build a reqwest client for the loopback API.
///
/// The server presents a self-signed certificate for 127.0.0.1, so
/// certificate validation is off. Never point this client at another host.
pub fn loopback_http_client(timeout: Duration) -> Result<reqwest::Client, QuotaError> {
    reqwest::Client::builder()
        .danger_accept_invalid_certs(true)
        .timeout(timeout)
        .no_proxy()
        .build()
        .map_err(|e| QuotaError::Transport(format!("failed to build HTTP client: {}", e)))
}

/// URL of `path` on the loopback server at `port`
pub fn loopback_url(port: u16, path: &str) -> String {
    format!("https://127.0.0.1:{}{}", port, path)
}

/// Add the Connect protocol and CSRF headers
pub fn with_connect_headers(
    request: reqwest::RequestBuilder,
    auth_token: &str,
) -> reqwest::RequestBuilder {
    request
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .header("Connect-Protocol-Version", "1")
        .header(CSRF_HEADER, auth_token)
}

/// Authenticated client bound to one discovered language server
pub struct LanguageServerClient {
    http: reqwest::Client,
    params: ConnectionParameters,
    locale: &'static str,
}

impl LanguageServerClient {
    /// Create a client for verified connection parameters
    pub fn new(params: ConnectionParameters, language: Language) -> Result<Self, QuotaError> {
        Ok(Self {
            http: loopback_http_client(FETCH_TIMEOUT)?,
            params,
            locale: language.code(),
        })
    }

    /// Connection parameters this client talks to
    pub fn params(&self) -> &ConnectionParameters {
        &self.params
    }

    /// POST a JSON body and decode a JSON response
    pub async fn post_json<B, T>(&self, path: &str, body: &B) -> Result<T, QuotaError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        let url = loopback_url(self.params.verified_port, path);
        let response = with_connect_headers(self.http.post(&url), &self.params.auth_token)
            .json(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(QuotaError::Status(status.as_u16()));
        }

        let text = response.text().await?;
        debug!(path, bytes = text.len(), "Language server responded");
        serde_json::from_str(&text).map_err(|e| QuotaError::InvalidResponse(e.to_string()))
    }

    /// Fetch the current user status
    pub async fn get_user_status(&self) -> Result<UserStatusResponse, QuotaError> {
        self.post_json(USER_STATUS_PATH, &UserStatusRequest::new(self.locale))
            .await
    }
}

impl QuotaSource for LanguageServerClient {
    async fn fetch_user_status(&self) -> Result<UserStatusResponse, QuotaError> {
        self.get_user_status().await
    }
}

use std::future::Future;
use tracing::debug;

use crate::client::wire::ProbeRequest;
use crate::client::{loopback_http_client, loopback_url, with_connect_headers, PROBE_PATH, PROBE_TIMEOUT};
use crate::error::QuotaError;

/// Checks whether a port hosts the language server API
pub trait PortProbe: Send + Sync {
    /// `true` only for an HTTP 200 answer to the probe request
    fn probe(&self, port: u16, auth_token: &str) -> impl Future<Output = bool> + Send;
}

/// [`PortProbe`] that POSTs `GetUnleashData` over loopback HTTPS
#[derive(Clone)]
pub struct HttpsProbe {
    http: reqwest::Client,
}

impl HttpsProbe {
    pub fn new() -> Result<Self, QuotaError> {
        Ok(Self {
            http: loopback_http_client(PROBE_TIMEOUT)?,
        })
    }
}

impl PortProbe for HttpsProbe {
    async fn probe(&self, port: u16, auth_token: &str) -> bool {
        let request = with_connect_headers(self.http.post(loopback_url(port, PROBE_PATH)), auth_token)
            .json(&ProbeRequest::default());

        match request.send().await {
            Ok(response) => {
                let status = response.status();
                debug!(port, status = status.as_u16(), "Probe answered");
                status == reqwest::StatusCode::OK
            }
            Err(e) => {
                debug!(port, "Probe failed: {}", QuotaError::from(e));
                false
            }
        }
    }
}

//! Language server discovery: process → listening ports → verified port.

mod probe;
mod resolver;
mod runner;

#[cfg(test)]
mod tests;

pub use probe::{HttpsProbe, PortProbe};
pub use resolver::{DiscoveryPhase, ProcessResolver, ResolverOptions};
pub use runner::{CommandRunner, ShellRunner};

/// Everything needed to talk to a running language server.
///
/// Produced once per successful discovery and never mutated; a reconnect
/// builds a fresh value.
#[derive(Clone, PartialEq, Eq)]
pub struct ConnectionParameters {
    /// Port from `--extension_server_port`, 0 when absent
    pub declared_port: u16,
    /// Port that answered the liveness probe
    pub verified_port: u16,
    /// Value of `--csrf_token`
    pub auth_token: String,
}

impl ConnectionParameters {
    /// Token shortened for logs and display
    pub fn masked_token(&self) -> String {
        mask_token(&self.auth_token)
    }
}

impl std::fmt::Debug for ConnectionParameters {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionParameters")
            .field("declared_port", &self.declared_port)
            .field("verified_port", &self.verified_port)
            .field("auth_token", &self.masked_token())
            .finish()
    }
}

/// Keep the first four characters of a secret
pub fn mask_token(token: &str) -> String {
    let visible: String = token.chars().take(4).collect();
    format!("{}…", visible)
}

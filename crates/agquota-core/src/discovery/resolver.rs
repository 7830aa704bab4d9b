use std::fmt;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::probe::{HttpsProbe, PortProbe};
use super::runner::{CommandRunner, ShellRunner};
use super::ConnectionParameters;
use crate::error::{DiscoveryError, QuotaError};
use crate::platform::{strategy_for, DiscoveredProcess, Platform, PlatformStrategy, TargetApp};

/// Phase of a single discovery attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiscoveryPhase {
    ProcessLookup,
    PortLookup,
    PortVerification,
}

impl fmt::Display for DiscoveryPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DiscoveryPhase::ProcessLookup => write!(f, "process lookup"),
            DiscoveryPhase::PortLookup => write!(f, "port lookup"),
            DiscoveryPhase::PortVerification => write!(f, "port verification"),
        }
    }
}

/// Timeouts and backoff for [`ProcessResolver`]
#[derive(Debug, Clone)]
pub struct ResolverOptions {
    pub process_list_timeout: Duration,
    pub port_list_timeout: Duration,
    /// Fixed pause between whole attempts
    pub retry_delay: Duration,
}

impl Default for ResolverOptions {
    fn default() -> Self {
        Self {
            process_list_timeout: Duration::from_secs(2),
            port_list_timeout: Duration::from_secs(3),
            retry_delay: Duration::from_millis(100),
        }
    }
}

/// Finds the running language server and the port it actually serves on
pub struct ProcessResolver<R = ShellRunner, P = HttpsProbe> {
    strategy: Box<dyn PlatformStrategy>,
    process_name: String,
    runner: R,
    probe: P,
    options: ResolverOptions,
}

impl ProcessResolver<ShellRunner, HttpsProbe> {
    /// Resolver for the OS this binary runs on
    pub fn for_current_platform(app_name: &str) -> Result<Self, QuotaError> {
        let platform = Platform::current();
        debug!(?platform, app_name, "Selecting platform strategy");
        Ok(Self::new(
            strategy_for(platform, TargetApp::new(app_name)),
            platform.process_name(),
            ShellRunner,
            HttpsProbe::new()?,
        ))
    }
}

impl<R: CommandRunner, P: PortProbe> ProcessResolver<R, P> {
    pub fn new(
        strategy: Box<dyn PlatformStrategy>,
        process_name: impl Into<String>,
        runner: R,
        probe: P,
    ) -> Self {
        Self {
            strategy,
            process_name: process_name.into(),
            runner,
            probe,
            options: ResolverOptions::default(),
        }
    }

    pub fn with_options(mut self, options: ResolverOptions) -> Self {
        self.options = options;
        self
    }

    /// Strategy in use, e.g. for its troubleshooting messages
    pub fn strategy(&self) -> &dyn PlatformStrategy {
        self.strategy.as_ref()
    }

    pub fn process_name(&self) -> &str {
        &self.process_name
    }

    /// Run up to `max_attempts` discovery attempts.
    ///
    /// Returns `None` when every attempt failed; failures are logged, never
    /// returned.
    pub async fn resolve(&self, max_attempts: u32) -> Option<ConnectionParameters> {
        self.resolve_with_error(max_attempts).await.ok()
    }

    /// Same as [`resolve`](Self::resolve), keeping the last attempt's error
    pub async fn resolve_with_error(
        &self,
        max_attempts: u32,
    ) -> Result<ConnectionParameters, DiscoveryError> {
        let max_attempts = max_attempts.max(1);
        let mut last_error = DiscoveryError::ProcessNotFound;

        for attempt in 1..=max_attempts {
            match self.attempt().await {
                Ok(params) => {
                    info!(
                        attempt,
                        declared_port = params.declared_port,
                        verified_port = params.verified_port,
                        token = %params.masked_token(),
                        "Language server found"
                    );
                    return Ok(params);
                }
                Err((phase, e)) => {
                    warn!(attempt, max_attempts, %phase, "Discovery attempt failed: {}", e);
                    last_error = e;
                }
            }

            if attempt < max_attempts {
                tokio::time::sleep(self.options.retry_delay).await;
            }
        }

        Err(last_error)
    }

    /// One pass through process lookup, port lookup and port verification
    pub async fn attempt(&self) -> Result<ConnectionParameters, (DiscoveryPhase, DiscoveryError)> {
        let process = self
            .lookup_process()
            .await
            .map_err(|e| (DiscoveryPhase::ProcessLookup, e))?;

        let ports = self
            .lookup_ports(process.pid)
            .await
            .map_err(|e| (DiscoveryPhase::PortLookup, e))?;

        let verified_port = self
            .verify_ports(process.pid, &ports, &process.hint.auth_token)
            .await
            .map_err(|e| (DiscoveryPhase::PortVerification, e))?;

        Ok(ConnectionParameters {
            declared_port: process.hint.declared_port,
            verified_port,
            auth_token: process.hint.auth_token,
        })
    }

    async fn lookup_process(&self) -> Result<DiscoveredProcess, DiscoveryError> {
        let output = self
            .run_with_fallback(
                self.strategy.process_list_command(&self.process_name),
                self.strategy.fallback_process_list_command(&self.process_name),
                self.options.process_list_timeout,
            )
            .await?;

        let candidates = self.strategy.parse_process_candidates(&output);
        debug!(candidates = candidates.len(), "Parsed process list");

        self.strategy
            .select_process(candidates)
            .ok_or(DiscoveryError::ProcessNotFound)
    }

    async fn lookup_ports(&self, pid: u32) -> Result<Vec<u16>, DiscoveryError> {
        let output = self
            .run_with_fallback(
                self.strategy.port_list_command(pid),
                self.strategy.fallback_port_list_command(pid),
                self.options.port_list_timeout,
            )
            .await?;

        let ports = self.strategy.parse_listening_ports(&output, pid);
        debug!(pid, ?ports, "Parsed listening ports");

        if ports.is_empty() {
            return Err(DiscoveryError::NoListeningPorts { pid });
        }
        Ok(ports)
    }

    /// First port, in ascending order, that answers the probe
    async fn verify_ports(
        &self,
        pid: u32,
        ports: &[u16],
        auth_token: &str,
    ) -> Result<u16, DiscoveryError> {
        let mut sorted = ports.to_vec();
        sorted.sort_unstable();

        for &port in &sorted {
            if self.probe.probe(port, auth_token).await {
                return Ok(port);
            }
            debug!(pid, port, "Port rejected the probe");
        }

        Err(DiscoveryError::NoVerifiedPort { pid, tried: sorted })
    }

    async fn run_with_fallback(
        &self,
        primary: String,
        fallback: Option<String>,
        timeout: Duration,
    ) -> Result<String, DiscoveryError> {
        let err = match self.runner.run(&primary, timeout).await {
            Ok(output) => return Ok(output),
            Err(e) => e,
        };

        let Some(fallback) = fallback else {
            return Err(err);
        };

        warn!("Primary listing command failed ({}), trying fallback", err);
        let output = self.runner.run(&fallback, timeout).await?;
        self.strategy.prefer_fallback();
        Ok(output)
    }
}

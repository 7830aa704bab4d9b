//! Per-OS process and port listing.
//!
//! Each [`PlatformStrategy`] knows which shell commands list the language
//! server processes and their listening sockets on one OS family, and how to
//! parse what those commands print. Parsers never fail: malformed output
//! yields an empty result.

mod linux;
mod macos;
mod unix;
mod windows;

pub use linux::LinuxStrategy;
pub use macos::MacOsStrategy;
pub use windows::WindowsStrategy;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;
use tracing::{debug, info};

/// Matches `--extension_server_port=1234` or `--extension_server_port 1234`
static PORT_FLAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"--extension_server_port[=\s]+(\d+)").expect("Invalid PORT_FLAG regex")
});

/// Matches `--csrf_token=<token>` or `--csrf_token <token>`
static TOKEN_FLAG: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"--csrf_token[=\s]+([A-Za-z0-9-]+)").expect("Invalid TOKEN_FLAG regex")
});

/// OS family the strategy targets
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Platform {
    Windows,
    MacOs { arm: bool },
    Linux,
}

impl Platform {
    /// Platform this binary was compiled for
    pub fn current() -> Self {
        if cfg!(target_os = "windows") {
            Platform::Windows
        } else if cfg!(target_os = "macos") {
            Platform::MacOs {
                arm: cfg!(target_arch = "aarch64"),
            }
        } else {
            Platform::Linux
        }
    }

    /// Executable name of the language server on this platform
    pub fn process_name(&self) -> &'static str {
        match self {
            Platform::Windows => "language_server_windows_x64.exe",
            Platform::MacOs { arm: true } => "language_server_macos_arm",
            Platform::MacOs { arm: false } => "language_server_macos",
            Platform::Linux => "language_server_linux",
        }
    }
}

/// A listed process whose image name matched, before ownership filtering
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessCandidate {
    /// Process id
    pub pid: u32,
    /// Full command line
    pub command_line: String,
}

/// Connection details recovered from a command line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionHint {
    /// `--extension_server_port` value, 0 when absent
    pub declared_port: u16,
    /// `--csrf_token` value
    pub auth_token: String,
}

/// The process picked by [`PlatformStrategy::select_process`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiscoveredProcess {
    pub pid: u32,
    pub hint: ConnectionHint,
}

/// User-facing text explaining what discovery needs on this platform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ErrorMessages {
    pub process_not_found: &'static str,
    pub command_not_available: &'static str,
    pub requirements: Vec<&'static str>,
}

/// The application a language server process must belong to.
///
/// Several IDEs ship the same language server binary; only processes started
/// with `--app_data_dir <name>` or living under a `<name>` directory count.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TargetApp {
    name: String,
}

impl TargetApp {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into().to_lowercase(),
        }
    }

    /// Lowercased application name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// True when the command line carries `--app_data_dir <name>`
    /// (case-insensitive, `=` or whitespace separated, word boundary after the name)
    pub fn has_app_data_dir(&self, command_line: &str) -> bool {
        const FLAG: &str = "--app_data_dir";
        let lower = command_line.to_lowercase();

        lower.match_indices(FLAG).any(|(idx, _)| {
            let rest = &lower[idx + FLAG.len()..];
            let value = rest.trim_start_matches(|c: char| c == '=' || c.is_whitespace());
            if value.len() == rest.len() {
                return false;
            }
            match value.strip_prefix(self.name.as_str()) {
                Some(after) => after
                    .chars()
                    .next()
                    .is_none_or(|c| !(c.is_alphanumeric() || c == '_')),
                None => false,
            }
        })
    }

    /// True when the command line contains `<sep><name><sep>` for any separator
    pub fn has_path_segment(&self, command_line: &str, separators: &[char]) -> bool {
        let lower = command_line.to_lowercase();
        separators.iter().any(|sep| {
            let segment = format!("{sep}{}{sep}", self.name);
            lower.contains(&segment)
        })
    }
}

/// Extract port and token from a command line.
///
/// Returns `None` when the token is missing; the port defaults to 0
/// ("unknown, find it by port scan").
pub fn extract_connection_hint(command_line: &str) -> Option<ConnectionHint> {
    let auth_token = TOKEN_FLAG
        .captures(command_line)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().to_string())?;

    let declared_port = PORT_FLAG
        .captures(command_line)
        .and_then(|c| c.get(1))
        .and_then(|m| m.as_str().parse::<u16>().ok())
        .unwrap_or(0);

    Some(ConnectionHint {
        declared_port,
        auth_token,
    })
}

/// Process and port discovery for one OS family
pub trait PlatformStrategy: Send + Sync {
    /// Application the processes must belong to
    fn target(&self) -> &TargetApp;

    /// Path separators used by the ownership check
    fn path_separators(&self) -> &'static [char];

    /// Command listing processes whose image name is `process_name`
    fn process_list_command(&self, process_name: &str) -> String;

    /// Command to try when [`process_list_command`](Self::process_list_command) cannot run
    fn fallback_process_list_command(&self, _process_name: &str) -> Option<String> {
        None
    }

    /// Parse process listing output. Never fails; bad input yields no candidates.
    fn parse_process_candidates(&self, raw_output: &str) -> Vec<ProcessCandidate>;

    /// Command listing TCP sockets in LISTEN state owned by `pid`
    fn port_list_command(&self, pid: u32) -> String;

    /// Command to try when [`port_list_command`](Self::port_list_command) cannot run
    fn fallback_port_list_command(&self, _pid: u32) -> Option<String> {
        None
    }

    /// Parse port listing output into ascending, deduplicated ports
    fn parse_listening_ports(&self, raw_output: &str, pid: u32) -> Vec<u16>;

    /// Troubleshooting text for this platform
    fn error_messages(&self) -> ErrorMessages;

    /// Called after a fallback command succeeded, so later lookups start with it
    fn prefer_fallback(&self) {}

    /// Whether a command line belongs to the target application
    fn is_target_process(&self, command_line: &str) -> bool {
        let target = self.target();
        target.has_app_data_dir(command_line)
            || target.has_path_segment(command_line, self.path_separators())
    }

    /// Apply the ownership filter and token requirement, keep the first survivor
    fn select_process(&self, candidates: Vec<ProcessCandidate>) -> Option<DiscoveredProcess> {
        let total = candidates.len();
        let owned: Vec<DiscoveredProcess> = candidates
            .into_iter()
            .filter(|c| {
                let owned = self.is_target_process(&c.command_line);
                if !owned {
                    debug!(pid = c.pid, "Skipping process not owned by {}", self.target().name());
                }
                owned
            })
            .filter_map(|c| match extract_connection_hint(&c.command_line) {
                Some(hint) => Some(DiscoveredProcess { pid: c.pid, hint }),
                None => {
                    debug!(pid = c.pid, "Skipping process without --csrf_token");
                    None
                }
            })
            .collect();

        debug!(
            total,
            owned = owned.len(),
            "Filtered language server processes for {}",
            self.target().name()
        );

        if owned.len() > 1 {
            info!(
                count = owned.len(),
                pid = owned[0].pid,
                "Multiple matching processes, using the first"
            );
        }

        owned.into_iter().next()
    }
}

/// Build the strategy for a platform. Called once at startup.
pub fn strategy_for(platform: Platform, target: TargetApp) -> Box<dyn PlatformStrategy> {
    match platform {
        Platform::Windows => Box::new(WindowsStrategy::new(target)),
        Platform::MacOs { .. } => Box::new(MacOsStrategy::new(target)),
        Platform::Linux => Box::new(LinuxStrategy::new(target)),
    }
}

/// Sort and deduplicate parsed ports
pub(crate) fn normalize_ports(ports: impl IntoIterator<Item = u16>) -> Vec<u16> {
    let mut ports: Vec<u16> = ports.into_iter().filter(|p| *p != 0).collect();
    ports.sort_unstable();
    ports.dedup();
    ports
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_extract_hint_equals_syntax() {
        let hint = extract_connection_hint(
            "/opt/antigravity/bin/language_server_linux --extension_server_port=42100 --csrf_token=ab12-cd34",
        )
        .unwrap();
        assert_eq!(
            hint,
            ConnectionHint {
                declared_port: 42100,
                auth_token: "ab12-cd34".to_string(),
            }
        );
    }

    #[test]
    fn test_extract_hint_space_syntax() {
        let hint =
            extract_connection_hint("ls --csrf_token 0f9e8d7c --extension_server_port 51000")
                .unwrap();
        assert_eq!(hint.declared_port, 51000);
        assert_eq!(hint.auth_token, "0f9e8d7c");
    }

    #[test]
    fn test_extract_hint_missing_port_defaults_to_zero() {
        let hint = extract_connection_hint("ls --csrf_token=deadbeef").unwrap();
        assert_eq!(hint.declared_port, 0);
    }

    #[test]
    fn test_extract_hint_requires_token() {
        assert!(extract_connection_hint("ls --extension_server_port=51000").is_none());
        assert!(extract_connection_hint("").is_none());
    }

    #[test]
    fn test_extract_hint_out_of_range_port() {
        let hint =
            extract_connection_hint("ls --extension_server_port=99999 --csrf_token=abc").unwrap();
        assert_eq!(hint.declared_port, 0);
    }

    #[test]
    fn test_app_data_dir_matching() {
        let target = TargetApp::new("antigravity");
        assert!(target.has_app_data_dir("x --app_data_dir antigravity --other"));
        assert!(target.has_app_data_dir("x --app_data_dir=antigravity"));
        assert!(target.has_app_data_dir("x --APP_DATA_DIR   AntiGravity"));
        assert!(target.has_app_data_dir("x --app_data_dir antigravity/data"));
        assert!(!target.has_app_data_dir("x --app_data_dir antigravity_beta"));
        assert!(!target.has_app_data_dir("x --app_data_dir windsurf"));
        assert!(!target.has_app_data_dir("x --app_data_dirantigravity"));
        assert!(!target.has_app_data_dir("x antigravity"));
    }

    #[test]
    fn test_path_segment_matching() {
        let target = TargetApp::new("Antigravity");
        assert!(target.has_path_segment("/Applications/Antigravity/bin/ls", &['/']));
        assert!(target.has_path_segment(r"C:\Program Files\Antigravity\ls.exe", &['\\', '/']));
        assert!(!target.has_path_segment("/opt/antigravity-tools/ls", &['/']));
        assert!(!target.has_path_segment(r"C:\Antigravity\ls.exe", &['/']));
    }

    #[test]
    fn test_process_name_per_platform() {
        assert_eq!(
            Platform::Windows.process_name(),
            "language_server_windows_x64.exe"
        );
        assert_eq!(
            Platform::MacOs { arm: true }.process_name(),
            "language_server_macos_arm"
        );
        assert_eq!(
            Platform::MacOs { arm: false }.process_name(),
            "language_server_macos"
        );
        assert_eq!(Platform::Linux.process_name(), "language_server_linux");
    }

    #[test]
    fn test_select_process_filters_foreign_processes() {
        let strategy = LinuxStrategy::new(TargetApp::new("antigravity"));
        let candidates = vec![
            ProcessCandidate {
                pid: 10,
                command_line: "/opt/windsurf/ls --app_data_dir windsurf --csrf_token=aaaa"
                    .to_string(),
            },
            ProcessCandidate {
                pid: 20,
                command_line: "/usr/bin/ls --app_data_dir antigravity".to_string(),
            },
            ProcessCandidate {
                pid: 30,
                command_line:
                    "/usr/bin/ls --app_data_dir antigravity --extension_server_port=4000 --csrf_token=bbbb"
                        .to_string(),
            },
            ProcessCandidate {
                pid: 40,
                command_line: "/usr/share/antigravity/ls --csrf_token=cccc".to_string(),
            },
        ];

        let selected = strategy.select_process(candidates).unwrap();
        assert_eq!(selected.pid, 30);
        assert_eq!(selected.hint.declared_port, 4000);
        assert_eq!(selected.hint.auth_token, "bbbb");
    }

    #[test]
    fn test_select_process_none_owned() {
        let strategy = LinuxStrategy::new(TargetApp::new("antigravity"));
        let candidates = vec![ProcessCandidate {
            pid: 10,
            command_line: "/opt/other/language_server_linux --csrf_token=aaaa".to_string(),
        }];
        assert!(strategy.select_process(candidates).is_none());
        assert!(strategy.select_process(Vec::new()).is_none());
    }

    #[test]
    fn test_normalize_ports() {
        assert_eq!(normalize_ports([51001, 0, 51000, 51001]), vec![51000, 51001]);
    }

    #[test]
    fn test_strategy_for_platform() {
        let strategy = strategy_for(Platform::Windows, TargetApp::new("antigravity"));
        assert!(strategy.process_list_command("x.exe").starts_with("powershell"));
        let strategy = strategy_for(Platform::MacOs { arm: true }, TargetApp::new("antigravity"));
        assert!(strategy.port_list_command(1).starts_with("lsof"));
        let strategy = strategy_for(Platform::Linux, TargetApp::new("antigravity"));
        assert!(strategy.port_list_command(1).starts_with("ss"));
    }
}

use once_cell::sync::Lazy;
use regex::Regex;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{debug, info};

use super::{normalize_ports, ErrorMessages, PlatformStrategy, ProcessCandidate, TargetApp};

/// Blank line between `wmic /format:list` records
static BLOCK_SEPARATOR: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\n\s*\n").expect("Invalid BLOCK_SEPARATOR regex"));

/// netstat row: `TCP 127.0.0.1:51000 0.0.0.0:0 LISTENING 1234`
static NETSTAT_LISTEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)TCP\s+(?:127\.0\.0\.1|0\.0\.0\.0|\[::1?\]):(\d+)\s+\S+\s+LISTENING\s+(\d+)")
        .expect("Invalid NETSTAT_LISTEN regex")
});

/// Addresses a local-only listener may bind
const LOCAL_ADDRESSES: [&str; 4] = ["127.0.0.1", "0.0.0.0", "::", "::1"];

/// One `Win32_Process` row from `ConvertTo-Json`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct CimProcess {
    process_id: Option<u32>,
    command_line: Option<String>,
}

/// One `Get-NetTCPConnection` row from `ConvertTo-Json`
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NetTcpConnection {
    local_address: Option<String>,
    local_port: Option<u16>,
}

/// Rows of `ConvertTo-Json` output, which is a bare object for one row and
/// an array otherwise.
///
/// `None` when the text is not JSON at all. Rows that do not fit `T` are
/// skipped one by one.
fn json_rows<T: DeserializeOwned>(trimmed: &str) -> Option<Vec<T>> {
    let rows = match serde_json::from_str::<Value>(trimmed) {
        Ok(Value::Array(rows)) => rows,
        Ok(row @ Value::Object(_)) => vec![row],
        Ok(_) => return Some(Vec::new()),
        Err(e) => {
            debug!("Output is not valid JSON ({})", e);
            return None;
        }
    };

    Some(
        rows.into_iter()
            .filter_map(|row| match serde_json::from_value::<T>(row) {
                Ok(parsed) => Some(parsed),
                Err(e) => {
                    debug!("Skipping malformed row: {}", e);
                    None
                }
            })
            .collect(),
    )
}

/// Windows: PowerShell CIM queries, falling back to wmic and netstat
#[derive(Debug)]
pub struct WindowsStrategy {
    target: TargetApp,
    /// Use PowerShell (JSON) commands; cleared once the legacy tools were needed
    use_structured: AtomicBool,
}

impl WindowsStrategy {
    pub fn new(target: TargetApp) -> Self {
        Self {
            target,
            use_structured: AtomicBool::new(true),
        }
    }

    /// Whether PowerShell commands are issued first
    pub fn is_using_structured(&self) -> bool {
        self.use_structured.load(Ordering::Relaxed)
    }

    fn wmic_command(process_name: &str) -> String {
        format!(
            "wmic process where \"name='{}'\" get ProcessId,CommandLine /format:list",
            process_name
        )
    }

    fn netstat_command(pid: u32) -> String {
        format!("netstat -ano | findstr \"{}\" | findstr \"LISTENING\"", pid)
    }

    /// Parse `wmic /format:list` records separated by blank lines
    fn parse_wmic_blocks(raw_output: &str) -> Vec<ProcessCandidate> {
        // Piped wmic ends lines with `\r\r\n`
        let normalized = raw_output.replace('\r', "");
        BLOCK_SEPARATOR
            .split(&normalized)
            .filter(|block| !block.trim().is_empty())
            .filter_map(|block| {
                let mut pid = None;
                let mut command_line = None;
                for line in block.lines().map(str::trim) {
                    if let Some(value) = line.strip_prefix("ProcessId=") {
                        pid = value.trim().parse::<u32>().ok();
                    } else if let Some(value) = line.strip_prefix("CommandLine=") {
                        command_line = Some(value.trim().to_string());
                    }
                }
                Some(ProcessCandidate {
                    pid: pid?,
                    command_line: command_line?,
                })
            })
            .collect()
    }
}

fn strip_bom(raw_output: &str) -> &str {
    raw_output.trim().trim_start_matches('\u{feff}')
}

fn looks_like_json(trimmed: &str) -> bool {
    trimmed.starts_with('{') || trimmed.starts_with('[')
}

impl PlatformStrategy for WindowsStrategy {
    fn target(&self) -> &TargetApp {
        &self.target
    }

    fn path_separators(&self) -> &'static [char] {
        &['\\', '/']
    }

    fn process_list_command(&self, process_name: &str) -> String {
        if self.is_using_structured() {
            format!(
                "powershell -NoProfile -Command \"Get-CimInstance Win32_Process -Filter \\\"name='{}'\\\" | Select-Object ProcessId,CommandLine | ConvertTo-Json\"",
                process_name
            )
        } else {
            Self::wmic_command(process_name)
        }
    }

    fn fallback_process_list_command(&self, process_name: &str) -> Option<String> {
        self.is_using_structured()
            .then(|| Self::wmic_command(process_name))
    }

    fn parse_process_candidates(&self, raw_output: &str) -> Vec<ProcessCandidate> {
        let trimmed = strip_bom(raw_output);
        if trimmed.is_empty() {
            return Vec::new();
        }

        if looks_like_json(trimmed) {
            if let Some(rows) = json_rows::<CimProcess>(trimmed) {
                return rows
                    .into_iter()
                    .filter_map(|row| {
                        Some(ProcessCandidate {
                            pid: row.process_id.filter(|pid| *pid != 0)?,
                            command_line: row.command_line?,
                        })
                    })
                    .collect();
            }
            debug!("Trying wmic format for the process list");
        }

        Self::parse_wmic_blocks(trimmed)
    }

    fn port_list_command(&self, pid: u32) -> String {
        if self.is_using_structured() {
            format!(
                "powershell -NoProfile -Command \"Get-NetTCPConnection -State Listen -OwningProcess {} | Select-Object LocalAddress,LocalPort | ConvertTo-Json\"",
                pid
            )
        } else {
            Self::netstat_command(pid)
        }
    }

    fn fallback_port_list_command(&self, pid: u32) -> Option<String> {
        self.is_using_structured()
            .then(|| Self::netstat_command(pid))
    }

    fn parse_listening_ports(&self, raw_output: &str, pid: u32) -> Vec<u16> {
        let trimmed = strip_bom(raw_output);

        if looks_like_json(trimmed) {
            if let Some(rows) = json_rows::<NetTcpConnection>(trimmed) {
                return normalize_ports(rows.into_iter().filter_map(|row| {
                    let address = row.local_address.unwrap_or_default();
                    LOCAL_ADDRESSES
                        .contains(&address.as_str())
                        .then_some(row.local_port)
                        .flatten()
                }));
            }
        }

        normalize_ports(trimmed.lines().filter_map(|line| {
            let caps = NETSTAT_LISTEN.captures(line)?;
            let owner = caps.get(2)?.as_str().parse::<u32>().ok()?;
            if owner != pid {
                return None;
            }
            caps.get(1)?.as_str().parse::<u16>().ok()
        }))
    }

    fn error_messages(&self) -> ErrorMessages {
        let structured = self.is_using_structured();
        ErrorMessages {
            process_not_found: "language_server process not found",
            command_not_available: if structured {
                "PowerShell command failed; please check system permissions"
            } else {
                "wmic/PowerShell command unavailable; please check the system environment"
            },
            requirements: vec![
                "Antigravity is running",
                "language_server_windows_x64.exe process is running",
                if structured {
                    "The system has permission to run PowerShell commands"
                } else {
                    "The system has permission to run wmic/PowerShell and netstat commands"
                },
            ],
        }
    }

    fn prefer_fallback(&self) {
        if self.use_structured.swap(false, Ordering::Relaxed) {
            info!("PowerShell unavailable, switching to wmic/netstat");
        }
    }
}

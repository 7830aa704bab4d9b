use tracing::debug;

use super::unix::{parse_lsof_ports, parse_pgrep_output, parse_ss_ports};
use super::{ErrorMessages, PlatformStrategy, ProcessCandidate, TargetApp};

/// Linux and other generic Unix systems: `pgrep -af`, then `ss` with an `lsof` fallback
#[derive(Debug, Clone)]
pub struct LinuxStrategy {
    target: TargetApp,
}

impl LinuxStrategy {
    pub fn new(target: TargetApp) -> Self {
        Self { target }
    }
}

impl PlatformStrategy for LinuxStrategy {
    fn target(&self) -> &TargetApp {
        &self.target
    }

    fn path_separators(&self) -> &'static [char] {
        &['/']
    }

    fn process_list_command(&self, process_name: &str) -> String {
        // procps pgrep needs -a to print the full command line
        format!("pgrep -af {}", process_name)
    }

    fn parse_process_candidates(&self, raw_output: &str) -> Vec<ProcessCandidate> {
        parse_pgrep_output(raw_output)
    }

    fn port_list_command(&self, pid: u32) -> String {
        format!(
            "ss -tlnp 2>/dev/null | grep \"pid={pid},\" || lsof -iTCP -sTCP:LISTEN -n -P -p {pid} 2>/dev/null"
        )
    }

    fn parse_listening_ports(&self, raw_output: &str, pid: u32) -> Vec<u16> {
        let ports = parse_ss_ports(raw_output, pid);
        if !ports.is_empty() {
            return ports;
        }
        debug!(pid, "No ss rows parsed, trying lsof format");
        parse_lsof_ports(raw_output, pid)
    }

    fn error_messages(&self) -> ErrorMessages {
        ErrorMessages {
            process_not_found: "language_server_linux process not found",
            command_not_available: "pgrep/ss/lsof command failed",
            requirements: vec![
                "Antigravity is running",
                "language_server_linux process is running",
                "pgrep and ss (iproute2) or lsof are installed",
            ],
        }
    }
}

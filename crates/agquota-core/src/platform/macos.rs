use super::unix::{parse_lsof_ports, parse_pgrep_output};
use super::{ErrorMessages, PlatformStrategy, ProcessCandidate, TargetApp};

/// macOS: BSD `pgrep -fl` and `lsof`
#[derive(Debug, Clone)]
pub struct MacOsStrategy {
    target: TargetApp,
}

impl MacOsStrategy {
    pub fn new(target: TargetApp) -> Self {
        Self { target }
    }
}

impl PlatformStrategy for MacOsStrategy {
    fn target(&self) -> &TargetApp {
        &self.target
    }

    fn path_separators(&self) -> &'static [char] {
        &['/']
    }

    fn process_list_command(&self, process_name: &str) -> String {
        format!("pgrep -fl {}", process_name)
    }

    fn parse_process_candidates(&self, raw_output: &str) -> Vec<ProcessCandidate> {
        parse_pgrep_output(raw_output)
    }

    fn port_list_command(&self, pid: u32) -> String {
        format!("lsof -iTCP -sTCP:LISTEN -n -P -p {}", pid)
    }

    fn parse_listening_ports(&self, raw_output: &str, pid: u32) -> Vec<u16> {
        parse_lsof_ports(raw_output, pid)
    }

    fn error_messages(&self) -> ErrorMessages {
        ErrorMessages {
            process_not_found: "language_server_macos process not found",
            command_not_available: "pgrep/lsof command failed",
            requirements: vec![
                "Antigravity is running",
                "language_server_macos process is running",
                "lsof is available",
            ],
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_end_to_end_macos() {
        let s = MacOsStrategy::new(TargetApp::new("antigravity"));
        assert_eq!(
            s.process_list_command("language_server_macos_arm"),
            "pgrep -fl language_server_macos_arm"
        );

        let processes = "\
812 /Applications/Antigravity.app/Contents/Resources/app/extensions/antigravity/bin/language_server_macos_arm --app_data_dir antigravity --csrf_token=0a1b2c3d --extension_server_port=61234
";
        let selected = s.select_process(s.parse_process_candidates(processes)).unwrap();
        assert_eq!(selected.pid, 812);
        assert_eq!(selected.hint.auth_token, "0a1b2c3d");

        let ports = "\
COMMAND   PID USER   FD   TYPE             DEVICE SIZE/OFF NODE NAME
language_ 812 dev   25u  IPv4 0x6f4e3b2a1c0d9e8f      0t0  TCP 127.0.0.1:61240 (LISTEN)
language_ 812 dev   26u  IPv4 0x6f4e3b2a1c0d9e8e      0t0  TCP 127.0.0.1:61234 (LISTEN)
";
        assert_eq!(s.parse_listening_ports(ports, 812), vec![61234, 61240]);
    }
}

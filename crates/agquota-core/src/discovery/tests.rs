use std::collections::HashSet;
use std::time::Duration;

use parking_lot::Mutex;
use pretty_assertions::assert_eq;

use super::*;
use crate::error::DiscoveryError;
use crate::platform::{LinuxStrategy, TargetApp, WindowsStrategy};

/// Answers commands by prefix and records every command it was given
#[derive(Default)]
struct FakeRunner {
    rules: Vec<(&'static str, Option<&'static str>)>,
    calls: Mutex<Vec<String>>,
}

impl FakeRunner {
    /// `output: None` makes the command fail
    fn on(mut self, prefix: &'static str, output: Option<&'static str>) -> Self {
        self.rules.push((prefix, output));
        self
    }

    fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }

    fn count(&self, prefix: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.starts_with(prefix))
            .count()
    }
}

impl CommandRunner for &FakeRunner {
    async fn run(&self, command: &str, _timeout: Duration) -> Result<String, DiscoveryError> {
        self.calls.lock().push(command.to_string());
        let rule = self.rules.iter().find(|(prefix, _)| command.starts_with(prefix));
        match rule {
            Some((_, Some(output))) => Ok(output.to_string()),
            _ => Err(DiscoveryError::CommandFailed {
                command: command.to_string(),
                message: "not recognized".to_string(),
            }),
        }
    }
}

/// Accepts a fixed set of ports and records probe order
#[derive(Default)]
struct FakeProbe {
    live: HashSet<u16>,
    probed: Mutex<Vec<(u16, String)>>,
}

impl FakeProbe {
    fn live(ports: &[u16]) -> Self {
        Self {
            live: ports.iter().copied().collect(),
            probed: Mutex::new(Vec::new()),
        }
    }

    fn ports(&self) -> Vec<u16> {
        self.probed.lock().iter().map(|(p, _)| *p).collect()
    }
}

impl PortProbe for &FakeProbe {
    async fn probe(&self, port: u16, auth_token: &str) -> bool {
        self.probed.lock().push((port, auth_token.to_string()));
        self.live.contains(&port)
    }
}

const PGREP: &str = "\
1111 /opt/windsurf/language_server_linux --app_data_dir windsurf --csrf_token=other
1234 /usr/share/antigravity/language_server_linux --extension_server_port=51000 --csrf_token=abcd-1234
";

const SS: &str = "\
LISTEN 0 4096 127.0.0.1:51001 0.0.0.0:* users:((\"language_server\",pid=1234,fd=12))
LISTEN 0 4096 127.0.0.1:51000 0.0.0.0:* users:((\"language_server\",pid=1234,fd=9))
";

fn no_delay() -> ResolverOptions {
    ResolverOptions {
        retry_delay: Duration::ZERO,
        ..ResolverOptions::default()
    }
}

fn linux_resolver<'a>(
    runner: &'a FakeRunner,
    probe: &'a FakeProbe,
) -> ProcessResolver<&'a FakeRunner, &'a FakeProbe> {
    ProcessResolver::new(
        Box::new(LinuxStrategy::new(TargetApp::new("antigravity"))),
        "language_server_linux",
        runner,
        probe,
    )
    .with_options(no_delay())
}

#[tokio::test]
async fn test_first_live_port_in_ascending_order_wins() {
    let runner = FakeRunner::default()
        .on("pgrep", Some(PGREP))
        .on("ss", Some(SS));
    let probe = FakeProbe::live(&[51001]);
    let resolver = linux_resolver(&runner, &probe);

    let params = resolver.resolve(3).await.unwrap();

    assert_eq!(
        params,
        ConnectionParameters {
            declared_port: 51000,
            verified_port: 51001,
            auth_token: "abcd-1234".to_string(),
        }
    );
    assert_eq!(probe.ports(), vec![51000, 51001]);
    assert!(probe
        .probed
        .lock()
        .iter()
        .all(|(_, token)| token == "abcd-1234"));
    assert_eq!(runner.calls()[1], resolver.strategy().port_list_command(1234));
}

#[tokio::test]
async fn test_remaining_ports_not_probed_after_success() {
    let runner = FakeRunner::default()
        .on("pgrep", Some(PGREP))
        .on("ss", Some(SS));
    let probe = FakeProbe::live(&[51000, 51001]);
    let resolver = linux_resolver(&runner, &probe);

    let params = resolver.resolve(1).await.unwrap();
    assert_eq!(params.verified_port, 51000);
    assert_eq!(probe.ports(), vec![51000]);
}

#[tokio::test]
async fn test_missing_process_retries_then_gives_up() {
    let runner = FakeRunner::default().on("pgrep", Some(""));
    let probe = FakeProbe::default();
    let resolver = linux_resolver(&runner, &probe);

    assert!(resolver.resolve(3).await.is_none());
    assert_eq!(runner.count("pgrep"), 3);
    assert_eq!(runner.count("ss"), 0);
    assert!(probe.ports().is_empty());
}

#[tokio::test]
async fn test_zero_attempts_still_tries_once() {
    let runner = FakeRunner::default();
    let probe = FakeProbe::default();
    let resolver = linux_resolver(&runner, &probe);

    assert!(resolver.resolve(0).await.is_none());
    assert_eq!(runner.count("pgrep"), 1);
}

#[tokio::test]
async fn test_empty_port_set_fails_port_lookup() {
    let runner = FakeRunner::default()
        .on("pgrep", Some(PGREP))
        .on("ss", Some("State Recv-Q Send-Q Local Address:Port\n"));
    let probe = FakeProbe::default();
    let resolver = linux_resolver(&runner, &probe);

    let (phase, err) = resolver.attempt().await.unwrap_err();
    assert_eq!(phase, DiscoveryPhase::PortLookup);
    assert!(matches!(err, DiscoveryError::NoListeningPorts { pid: 1234 }));
    assert!(probe.ports().is_empty());
}

#[tokio::test]
async fn test_no_live_port_fails_verification() {
    let runner = FakeRunner::default()
        .on("pgrep", Some(PGREP))
        .on("ss", Some(SS));
    let probe = FakeProbe::default();
    let resolver = linux_resolver(&runner, &probe);

    let (phase, err) = resolver.attempt().await.unwrap_err();
    assert_eq!(phase, DiscoveryPhase::PortVerification);
    match err {
        DiscoveryError::NoVerifiedPort { pid, tried } => {
            assert_eq!(pid, 1234);
            assert_eq!(tried, vec![51000, 51001]);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_foreign_process_only_is_not_found() {
    let runner = FakeRunner::default().on(
        "pgrep",
        Some("1111 /opt/windsurf/language_server_linux --app_data_dir windsurf --csrf_token=x\n"),
    );
    let probe = FakeProbe::default();
    let resolver = linux_resolver(&runner, &probe);

    let (phase, err) = resolver.attempt().await.unwrap_err();
    assert_eq!(phase, DiscoveryPhase::ProcessLookup);
    assert!(matches!(err, DiscoveryError::ProcessNotFound));
}

#[tokio::test]
async fn test_windows_switches_to_legacy_tools_after_powershell_fails() {
    let wmic = "\r\n\r\nCommandLine=C:\\ag\\language_server_windows_x64.exe --app_data_dir antigravity --csrf_token=beef\r\nProcessId=4321\r\n\r\n";
    let netstat = "  TCP    127.0.0.1:52000        0.0.0.0:0              LISTENING       4321\r\n";
    let runner = FakeRunner::default()
        .on("powershell", None)
        .on("wmic", Some(wmic))
        .on("netstat", Some(netstat));
    let probe = FakeProbe::live(&[52000]);
    let resolver = ProcessResolver::new(
        Box::new(WindowsStrategy::new(TargetApp::new("antigravity"))),
        "language_server_windows_x64.exe",
        &runner,
        &probe,
    )
    .with_options(no_delay());

    let params = resolver.resolve(1).await.unwrap();
    assert_eq!(params.verified_port, 52000);
    assert_eq!(params.declared_port, 0);
    assert_eq!(params.auth_token, "beef");

    // The port lookup already used netstat directly; PowerShell was tried once
    assert_eq!(runner.count("powershell"), 1);
    assert_eq!(runner.count("wmic"), 1);
    assert_eq!(runner.count("netstat"), 1);

    let params = resolver.resolve(1).await.unwrap();
    assert_eq!(params.verified_port, 52000);
    assert_eq!(runner.count("powershell"), 1);
}

#[tokio::test]
async fn test_windows_json_process_list_selects_owned_pid() {
    let processes = r#"[
  {"ProcessId": 7100, "CommandLine": "C:\\Windsurf\\language_server_windows_x64.exe --app_data_dir windsurf --csrf_token=1111"},
  {"ProcessId": 7200, "CommandLine": "C:\\tools\\language_server_windows_x64.exe --app_data_dir antigravity --extension_server_port=51000 --csrf_token=abcd-ef01"}
]"#;
    let ports = r#"[{"LocalAddress": "127.0.0.1", "LocalPort": 51001}, {"LocalAddress": "127.0.0.1", "LocalPort": 51000}]"#;
    let runner = FakeRunner::default()
        .on("powershell -NoProfile -Command \"Get-CimInstance", Some(processes))
        .on("powershell -NoProfile -Command \"Get-NetTCPConnection", Some(ports));
    let probe = FakeProbe::live(&[51001]);
    let resolver = ProcessResolver::new(
        Box::new(WindowsStrategy::new(TargetApp::new("antigravity"))),
        "language_server_windows_x64.exe",
        &runner,
        &probe,
    )
    .with_options(no_delay());

    let params = resolver.resolve(1).await.unwrap();
    assert_eq!(
        params,
        ConnectionParameters {
            declared_port: 51000,
            verified_port: 51001,
            auth_token: "abcd-ef01".to_string(),
        }
    );
    assert!(runner.calls()[1].contains("-OwningProcess 7200"));
    assert_eq!(runner.count("wmic"), 0);
    assert_eq!(runner.count("netstat"), 0);
    assert_eq!(probe.ports(), vec![51000, 51001]);
}

#[tokio::test]
async fn test_last_error_reports_command_failure() {
    let runner = FakeRunner::default();
    let probe = FakeProbe::default();
    let resolver = linux_resolver(&runner, &probe);

    let err = resolver.resolve_with_error(2).await.unwrap_err();
    assert!(matches!(err, DiscoveryError::CommandFailed { .. }));
    assert!(err.is_command_failure());
    assert_eq!(runner.count("pgrep"), 2);

    let runner = FakeRunner::default().on("pgrep", Some(""));
    let resolver = linux_resolver(&runner, &probe);
    let err = resolver.resolve_with_error(1).await.unwrap_err();
    assert!(matches!(err, DiscoveryError::ProcessNotFound));
    assert!(!err.is_command_failure());
}

#[test]
fn test_debug_masks_token() {
    let params = ConnectionParameters {
        declared_port: 1,
        verified_port: 2,
        auth_token: "abcdef-123456".to_string(),
    };
    let debug = format!("{:?}", params);
    assert!(debug.contains("abcd…"));
    assert!(!debug.contains("abcdef-123456"));
    assert_eq!(mask_token("ab"), "ab…");
}

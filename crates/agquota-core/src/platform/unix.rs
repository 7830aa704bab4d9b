//! Parsers shared by the macOS and Linux strategies.

use once_cell::sync::Lazy;
use regex::Regex;

use super::{normalize_ports, ProcessCandidate};

/// lsof row: `... TCP 127.0.0.1:51000 (LISTEN)`
static LSOF_LISTEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)TCP\s+(?:\*|[\d.]+|\[[\da-f:.%\w]+\]):(\d+)\s+\(LISTEN\)")
        .expect("Invalid LSOF_LISTEN regex")
});

/// ss row: `LISTEN 0 4096 127.0.0.1:51000 0.0.0.0:* users:(("x",pid=1,fd=3))`
static SS_LISTEN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)LISTEN\s+\d+\s+\d+\s+(?:\*|[\d.]+(?:%\S+)?|\[[\da-f:.]*\](?:%\S+)?):(\d+)")
        .expect("Invalid SS_LISTEN regex")
});

/// Parse `pgrep -fl` / `pgrep -af` output: one `pid command line...` per row
pub(super) fn parse_pgrep_output(raw_output: &str) -> Vec<ProcessCandidate> {
    raw_output
        .lines()
        .filter_map(|line| {
            let line = line.trim();
            let (pid, rest) = match line.split_once(char::is_whitespace) {
                Some((pid, rest)) => (pid, rest.trim()),
                None => (line, ""),
            };
            let pid = pid.parse::<u32>().ok()?;
            Some(ProcessCandidate {
                pid,
                command_line: rest.to_string(),
            })
        })
        .collect()
}

/// Parse lsof LISTEN rows. Rows whose PID column names another process are skipped.
pub(super) fn parse_lsof_ports(raw_output: &str, pid: u32) -> Vec<u16> {
    normalize_ports(raw_output.lines().filter_map(|line| {
        let owner = line.split_whitespace().nth(1)?;
        if let Ok(owner) = owner.parse::<u32>() {
            if owner != pid {
                return None;
            }
        }
        let caps = LSOF_LISTEN.captures(line)?;
        caps.get(1)?.as_str().parse::<u16>().ok()
    }))
}

/// Parse `ss -tlnp` LISTEN rows owned by `pid`
pub(super) fn parse_ss_ports(raw_output: &str, pid: u32) -> Vec<u16> {
    let owner_marker = format!("pid={},", pid);
    normalize_ports(raw_output.lines().filter_map(|line| {
        if line.contains("users:") && !line.contains(&owner_marker) {
            return None;
        }
        let caps = SS_LISTEN.captures(line)?;
        caps.get(1)?.as_str().parse::<u16>().ok()
    }))
}

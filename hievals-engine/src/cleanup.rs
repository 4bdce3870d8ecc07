//! Stale agent session cleanup (Unix only).
//!
//! Interrupted runs can leave daemons listening in the engine's port range.
//! This module finds them through `lsof`, terminates them politely, and
//! verifies their ports actually closed. When a daemon refuses to die, its
//! parent is inspected: if the parent is one of our own stray invocations it
//! is terminated too.

use std::sync::LazyLock;
use std::time::Duration;

use regex::Regex;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::EngineConfig;
use crate::error::{Error, Result};

/// Ports scanned above the base port.
pub const CLEANUP_PORT_SPAN: u16 = 256;

/// Grace period after the polite kill.
const TERM_GRACE: Duration = Duration::from_millis(1200);

/// Poll interval while waiting for a process to exit.
const TERM_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Settle time after a hard kill.
const KILL_SETTLE: Duration = Duration::from_millis(150);

/// How long to wait for freed ports to stop listening.
const PORT_CLOSE_WAIT: Duration = Duration::from_secs(2);

static LSOF_LINE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^(\S+)\s+(\d+)\s+.*TCP .*:(\d+) \(LISTEN\)$").expect("valid lsof line pattern")
});

/// One listening socket owned by an agent daemon process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListeningSession {
    pub command: String,
    pub pid: i32,
    pub port: u16,
}

/// Find agent daemons listening in the engine's port range.
pub async fn scan_stale_sessions(config: &EngineConfig) -> Result<Vec<ListeningSession>> {
    let output = Command::new("lsof")
        .args(["-nP", "-iTCP", "-sTCP:LISTEN"])
        .output()
        .await
        .map_err(|e| Error::Tool {
            tool: "lsof",
            detail: e.to_string(),
        })?;

    // lsof exits non-zero when nothing matches; only a missing/broken tool
    // produces empty output AND a failure status.
    if !output.status.success() && output.stdout.is_empty() {
        return Ok(Vec::new());
    }

    let text = String::from_utf8_lossy(&output.stdout);
    let min_port = config.base_port;
    let max_port = config.base_port.saturating_add(CLEANUP_PORT_SPAN - 1);
    Ok(parse_lsof_listeners(
        &text,
        &config.agent_command,
        min_port,
        max_port,
    ))
}

/// Parse `lsof -nP -iTCP -sTCP:LISTEN` output, keeping processes whose
/// command contains `needle` and whose port falls in range.
#[must_use]
pub fn parse_lsof_listeners(
    output: &str,
    needle: &str,
    min_port: u16,
    max_port: u16,
) -> Vec<ListeningSession> {
    let needle = needle.to_lowercase();
    let mut sessions = Vec::new();

    for line in output.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("COMMAND ") {
            continue;
        }

        let Some(caps) = LSOF_LINE_RE.captures(line) else {
            continue;
        };

        let command = &caps[1];
        if !command.to_lowercase().contains(&needle) {
            continue;
        }

        let Ok(pid) = caps[2].parse::<i32>() else {
            continue;
        };
        if pid <= 0 {
            continue;
        }

        let Ok(port) = caps[3].parse::<u16>() else {
            continue;
        };
        if port < min_port || port > max_port {
            continue;
        }

        sessions.push(ListeningSession {
            command: command.to_string(),
            pid,
            port,
        });
    }

    sessions
}

/// Terminate a stale session process and confirm its ports closed.
pub async fn terminate_session(pid: i32, ports: &[u16]) -> Result<()> {
    terminate_single_pid(pid).await;
    if wait_for_ports_closed(ports, PORT_CLOSE_WAIT).await {
        return Ok(());
    }

    // The daemon may be held alive by a stray invocation of this tool.
    if let Ok(parent) = parent_pid(pid).await
        && parent > 1
        && let Ok(parent_command) = process_command(parent).await
        && parent_command.to_lowercase().contains("hievals")
    {
        debug!(parent, "terminating stray parent process");
        terminate_single_pid(parent).await;
        if wait_for_ports_closed(ports, PORT_CLOSE_WAIT).await {
            return Ok(());
        }
    }

    Err(Error::PortsStillListening)
}

/// TERM, wait out the grace period, then KILL.
async fn terminate_single_pid(pid: i32) {
    // SAFETY: plain signal sends; stale PIDs at worst produce ESRCH.
    unsafe {
        libc::kill(pid as libc::pid_t, libc::SIGTERM);
    }

    let deadline = tokio::time::Instant::now() + TERM_GRACE;
    while tokio::time::Instant::now() < deadline {
        if !process_alive(pid) {
            return;
        }
        tokio::time::sleep(TERM_POLL_INTERVAL).await;
    }

    unsafe {
        libc::kill(pid as libc::pid_t, libc::SIGKILL);
    }
    tokio::time::sleep(KILL_SETTLE).await;
}

fn process_alive(pid: i32) -> bool {
    // kill -0 probes for existence without signalling.
    unsafe { libc::kill(pid as libc::pid_t, 0) == 0 }
}

async fn parent_pid(pid: i32) -> Result<i32> {
    let output = Command::new("ps")
        .args(["-p", &pid.to_string(), "-o", "ppid="])
        .output()
        .await
        .map_err(|e| Error::Tool {
            tool: "ps",
            detail: e.to_string(),
        })?;

    let text = String::from_utf8_lossy(&output.stdout);
    text.trim().parse::<i32>().map_err(|_| Error::Tool {
        tool: "ps",
        detail: format!("invalid parent PID {:?}", text.trim()),
    })
}

async fn process_command(pid: i32) -> Result<String> {
    let output = Command::new("ps")
        .args(["-p", &pid.to_string(), "-o", "command="])
        .output()
        .await
        .map_err(|e| Error::Tool {
            tool: "ps",
            detail: e.to_string(),
        })?;

    Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
}

async fn wait_for_ports_closed(ports: &[u16], timeout: Duration) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if !any_port_listening(ports).await {
            return true;
        }
        tokio::time::sleep(TERM_POLL_INTERVAL).await;
    }
    !any_port_listening(ports).await
}

async fn any_port_listening(ports: &[u16]) -> bool {
    for port in ports {
        if port_listening(*port).await {
            return true;
        }
    }
    false
}

async fn port_listening(port: u16) -> bool {
    match Command::new("lsof")
        .args(["-nP", &format!("-iTCP:{port}"), "-sTCP:LISTEN", "-t"])
        .output()
        .await
    {
        Ok(output) => !String::from_utf8_lossy(&output.stdout).trim().is_empty(),
        Err(e) => {
            warn!(port, error = %e, "probing port");
            false
        }
    }
}

//! `hievals cleanup` — reap stale agent daemons left behind by interrupted
//! runs.

use anyhow::Result;

#[cfg(unix)]
pub async fn run() -> Result<()> {
    use std::collections::BTreeMap;

    use anyhow::Context;
    use hievals_engine::EngineConfig;
    use hievals_engine::cleanup::{CLEANUP_PORT_SPAN, scan_stale_sessions, terminate_session};

    let config = EngineConfig::default();
    let min_port = config.base_port;
    let max_port = config.base_port + CLEANUP_PORT_SPAN - 1;

    let sessions = scan_stale_sessions(&config)
        .await
        .context("scanning for stale agent sessions")?;

    if sessions.is_empty() {
        println!("No stale agent sessions found on ports {min_port}-{max_port}.");
        return Ok(());
    }

    let mut ports_by_pid: BTreeMap<i32, Vec<u16>> = BTreeMap::new();
    let mut command_by_pid: BTreeMap<i32, String> = BTreeMap::new();
    for session in sessions {
        ports_by_pid.entry(session.pid).or_default().push(session.port);
        command_by_pid.insert(session.pid, session.command);
    }

    println!(
        "Found {} agent session process(es) to clean up.",
        ports_by_pid.len()
    );

    let mut cleaned = 0;
    let mut failed = 0;
    for (pid, mut ports) in ports_by_pid {
        ports.sort_unstable();
        let command = command_by_pid.get(&pid).map(String::as_str).unwrap_or("?");
        match terminate_session(pid, &ports).await {
            Ok(()) => {
                println!("✓ Stopped PID {pid} ({command}) on ports {}", format_ports(&ports));
                cleaned += 1;
            }
            Err(e) => {
                println!(
                    "✗ PID {pid} ({command}) on ports {}: {e}",
                    format_ports(&ports)
                );
                failed += 1;
            }
        }
    }

    println!("Cleanup complete: {cleaned} stopped, {failed} failed.");
    if failed > 0 {
        std::process::exit(1);
    }
    Ok(())
}

#[cfg(not(unix))]
pub async fn run() -> Result<()> {
    anyhow::bail!("cleanup relies on Unix process tools and is not supported on this platform")
}

#[cfg(unix)]
fn format_ports(ports: &[u16]) -> String {
    if ports.is_empty() {
        return "-".to_string();
    }
    ports
        .iter()
        .map(u16::to_string)
        .collect::<Vec<_>>()
        .join(",")
}

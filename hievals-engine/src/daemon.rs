//! Agent daemon subprocess lifecycle.
//!
//! Each eval owns exactly one daemon process, started in the eval folder and
//! bound to the task's port. Termination always runs before the driver
//! returns: a polite kill first, then a hard kill once the grace period runs
//! out. `kill_on_drop` backstops panic paths.

use std::path::Path;
use std::process::Stdio;
use std::time::Duration;

use tokio::process::{Child, Command};
use tracing::{debug, warn};

use crate::error::{Error, Result};

/// How long a daemon gets to exit after the polite kill.
const TERM_GRACE: Duration = Duration::from_millis(1200);

/// Poll interval while waiting out the grace period.
const TERM_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// A running agent daemon owned by one driver invocation.
pub struct AgentDaemon {
    child: Child,
    command: String,
}

impl AgentDaemon {
    /// Spawn `<command> --port <port>` with `dir` as its working directory.
    ///
    /// The daemon's stdio is discarded; everything we need arrives over HTTP.
    pub fn spawn(command: &str, dir: &Path, port: u16) -> Result<Self> {
        let child = Command::new(command)
            .arg("--port")
            .arg(port.to_string())
            .current_dir(dir)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true)
            .spawn()
            .map_err(|source| Error::Spawn {
                command: command.to_string(),
                source,
            })?;

        debug!(command, port, pid = child.id(), "agent daemon spawned");
        Ok(Self {
            child,
            command: command.to_string(),
        })
    }

    /// OS process ID, while the child has not been reaped.
    #[must_use]
    pub fn id(&self) -> Option<u32> {
        self.child.id()
    }

    /// Stop the daemon, politely first.
    ///
    /// On Unix this sends SIGTERM and polls for exit through the grace
    /// period before escalating to a hard kill. Elsewhere only the hard kill
    /// is available.
    pub async fn terminate(&mut self) {
        #[cfg(unix)]
        if let Some(pid) = self.child.id() {
            // SAFETY: signalling a PID we still own; worst case the signal
            // races process exit and is a no-op.
            unsafe {
                libc::kill(pid as libc::pid_t, libc::SIGTERM);
            }

            let deadline = tokio::time::Instant::now() + TERM_GRACE;
            while tokio::time::Instant::now() < deadline {
                match self.child.try_wait() {
                    Ok(Some(status)) => {
                        debug!(command = %self.command, ?status, "agent daemon exited");
                        return;
                    }
                    Ok(None) => tokio::time::sleep(TERM_POLL_INTERVAL).await,
                    Err(e) => {
                        warn!(command = %self.command, error = %e, "polling daemon exit");
                        break;
                    }
                }
            }
        }

        if let Err(e) = self.child.kill().await {
            warn!(command = %self.command, error = %e, "hard-killing agent daemon");
        }
        let _ = self.child.try_wait();
        debug!(command = %self.command, "agent daemon stopped");
    }
}

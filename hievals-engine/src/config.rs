//! Engine configuration.
//!
//! One immutable [`EngineConfig`] value is built from CLI flags and handed to
//! the scheduler; nothing here is process-global.

use std::time::Duration;

/// How long an eval may go without agent activity before it fails.
pub const DEFAULT_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(180);

/// Extra attempts granted to transient failures.
pub const DEFAULT_TRANSIENT_RETRIES: u32 = 1;

/// First port handed to an agent daemon; task `index` offsets from here.
pub const DEFAULT_BASE_PORT: u16 = 4096;

/// Binary launched as the agent daemon.
pub const DEFAULT_AGENT_COMMAND: &str = "opencode";

/// Largest single SSE line we accept; tool output events can be huge.
pub const EVENT_LINE_MAX_BYTES: usize = 8 * 1024 * 1024;

/// Tunables for one engine invocation.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Per-eval inactivity timeout. Floor: one second.
    pub inactivity_timeout: Duration,
    /// Retries granted when a failure classifies as transient.
    pub transient_retries: u32,
    /// Base port for daemon processes; task `index` is added to it.
    pub base_port: u16,
    /// Agent daemon binary name.
    pub agent_command: String,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            inactivity_timeout: DEFAULT_INACTIVITY_TIMEOUT,
            transient_retries: DEFAULT_TRANSIENT_RETRIES,
            base_port: DEFAULT_BASE_PORT,
            agent_command: DEFAULT_AGENT_COMMAND.to_string(),
        }
    }
}

impl EngineConfig {
    /// Create a configuration with the defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the inactivity timeout from a flag value, clamped to the floor.
    #[must_use]
    pub fn with_inactivity_timeout_secs(mut self, secs: u64) -> Self {
        self.inactivity_timeout = Duration::from_secs(secs.max(1));
        self
    }

    /// Set how many transient retries are granted.
    #[must_use]
    pub fn with_transient_retries(mut self, retries: u32) -> Self {
        self.transient_retries = retries;
        self
    }

    /// Set the base port.
    #[must_use]
    pub fn with_base_port(mut self, port: u16) -> Self {
        self.base_port = port;
        self
    }

    /// Set the agent daemon command.
    #[must_use]
    pub fn with_agent_command(mut self, command: impl Into<String>) -> Self {
        self.agent_command = command.into();
        self
    }

    /// The port a task at `index` runs its daemon on.
    #[must_use]
    pub fn port_for_index(&self, index: usize) -> u16 {
        self.base_port + index as u16
    }

    /// Daemon base URL for a task at `index`.
    #[must_use]
    pub fn base_url_for_index(&self, index: usize) -> String {
        format!("http://127.0.0.1:{}", self.port_for_index(index))
    }
}

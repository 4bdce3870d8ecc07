//! Command implementations.

pub mod cleanup;
pub mod models;
pub mod prompts;
pub mod resume;
pub mod run;

use clap::ValueEnum;

use hievals_engine::{EngineConfig, EvalResult, RunMode};

/// Model used when the user leaves the selection empty.
pub const DEFAULT_MODEL: &str = "opencode/kimi-k2.5-free";

/// Execution mode flag shared by `run` and `resume`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    Parallel,
    Sequential,
}

impl Mode {
    pub fn as_str(self) -> &'static str {
        match self {
            Mode::Parallel => "parallel",
            Mode::Sequential => "sequential",
        }
    }
}

impl From<Mode> for RunMode {
    fn from(mode: Mode) -> Self {
        match mode {
            Mode::Parallel => RunMode::Parallel,
            Mode::Sequential => RunMode::Sequential,
        }
    }
}

/// Banner printed before a batch starts.
pub fn print_batch_header(verb: &str, count: usize, model: &str, mode: Mode, config: &EngineConfig) {
    println!("\n{verb} {count} eval(s) with model: {model}");
    println!("Mode: {}", mode.as_str());
    println!(
        "Inactivity timeout: {}s · transient retries: {}",
        config.inactivity_timeout.as_secs(),
        config.transient_retries
    );
    println!("{}", "─".repeat(50));
}

/// Per-task status lines and the success tally.
pub fn print_summary(results: &[EvalResult]) {
    println!("\n{}", "═".repeat(50));
    println!("SUMMARY");
    println!("{}", "═".repeat(50));

    for result in results {
        let status = if result.success { "✓" } else { "✗" };
        println!("{status} [{}s] {}", result.duration.as_secs(), result.folder);
        if let Some(error) = &result.error {
            println!("  Error: {error}");
        }
    }

    let successful = results.iter().filter(|r| r.success).count();
    println!("\n{successful}/{} evals completed successfully", results.len());
}

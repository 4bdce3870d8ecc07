//! `hievals run` — execute evals for selected prompts.
//!
//! With both `-m` and `-p` the run is fully non-interactive; otherwise
//! prompts, mode and model are picked through the terminal forms.

use anyhow::{Context, Result, bail};
use clap::Args;

use hievals_engine::{EngineConfig, EvalTask, NoCorrection, RunMode, Scheduler};
use hievals_store::ArtifactStore;

use super::{DEFAULT_MODEL, Mode, print_batch_header, print_summary};
use crate::interactive::{self, DialoguerCorrector};

/// Run command arguments.
#[derive(Args, Debug)]
pub struct RunArgs {
    /// Model to use (e.g. openrouter/z-ai/glm-5)
    #[arg(short = 'm', long = "model")]
    pub model: Option<String>,

    /// Comma-separated 1-based prompt numbers (e.g. 1,3,5)
    #[arg(short = 'p', long = "prompts")]
    pub prompts: Option<String>,

    /// Execution mode
    #[arg(long, value_enum, default_value_t = Mode::Sequential)]
    pub mode: Mode,

    /// Inactivity timeout in seconds before failing a run
    #[arg(long = "inactivity-timeout", default_value_t = 180)]
    pub inactivity_timeout: u64,

    /// Retries for transient failures (timeouts, stream errors)
    #[arg(long, default_value_t = 1)]
    pub retries: u32,
}

pub async fn run(args: RunArgs) -> Result<()> {
    let store = ArtifactStore::new(".");
    let prompts = store.load_prompts().context("loading prompts")?;
    if prompts.is_empty() {
        bail!("no prompts found; add one with 'hievals add' first");
    }

    let config = EngineConfig::new()
        .with_inactivity_timeout_secs(args.inactivity_timeout)
        .with_transient_retries(args.retries);

    let (selected, model, mode) = match (&args.model, &args.prompts) {
        (Some(model), Some(selection)) => {
            let indices = parse_prompt_selection(selection, prompts.len())?;
            (indices, model.clone(), args.mode.into())
        }
        _ => {
            let labels: Vec<String> = prompts
                .iter()
                .enumerate()
                .map(|(i, p)| format!("{}. {}", i + 1, interactive::preview(p, 60)))
                .collect();
            let Some(indices) = interactive::multi_select("Select prompts to run", &labels)?
            else {
                return Ok(());
            };
            if indices.is_empty() {
                println!("No prompts selected.");
                return Ok(());
            }

            let Some(mode) = interactive::select_mode(args.mode)? else {
                return Ok(());
            };

            let Some(model) = interactive::select_model(&store, "select or type a model ID")?
            else {
                return Ok(());
            };
            let model = if model.is_empty() {
                DEFAULT_MODEL.to_string()
            } else {
                model
            };

            (indices, model, mode)
        }
    };

    let tasks: Vec<EvalTask> = selected
        .iter()
        .enumerate()
        .map(|(i, prompt_index)| EvalTask {
            prompt: prompts[*prompt_index].clone(),
            prompt_number: *prompt_index as u32 + 1,
            model: model.clone(),
            folder: None,
            index: i,
        })
        .collect();

    let mode_flag = match mode {
        RunMode::Parallel => Mode::Parallel,
        RunMode::Sequential => Mode::Sequential,
    };
    print_batch_header("Starting", tasks.len(), &model, mode_flag, &config);

    let scheduler = Scheduler::new(store.clone(), config);
    let results = match mode {
        RunMode::Sequential => {
            let corrector = DialoguerCorrector::new(&store);
            scheduler.run(tasks, mode, &corrector).await
        }
        RunMode::Parallel => scheduler.run(tasks, mode, &NoCorrection).await,
    };

    print_summary(&results);
    Ok(())
}

/// Parse a `1,3,5` selection into zero-based prompt indices.
fn parse_prompt_selection(selection: &str, prompt_count: usize) -> Result<Vec<usize>> {
    let mut indices = Vec::new();
    for part in selection.split(',') {
        let part = part.trim();
        let number: usize = part
            .parse()
            .ok()
            .filter(|n| (1..=prompt_count).contains(n))
            .with_context(|| {
                format!("invalid prompt number: {part:?} (must be 1-{prompt_count})")
            })?;
        indices.push(number - 1);
    }
    Ok(indices)
}

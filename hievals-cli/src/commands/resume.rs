//! `hievals resume` — re-run previous evals in their existing folders.

use anyhow::{Context, Result};
use clap::Args;

use hievals_engine::{EngineConfig, EvalTask, NoCorrection, RunMode, Scheduler};
use hievals_store::{ArtifactStore, EvalFolder};

use super::{DEFAULT_MODEL, Mode, print_batch_header, print_summary};
use crate::interactive::{self, DialoguerCorrector};

/// Resume command arguments.
#[derive(Args, Debug)]
pub struct ResumeArgs {
    /// Inactivity timeout in seconds before failing a run
    #[arg(long = "inactivity-timeout", default_value_t = 180)]
    pub inactivity_timeout: u64,

    /// Retries for transient failures (timeouts, stream errors)
    #[arg(long, default_value_t = 1)]
    pub retries: u32,
}

pub async fn run(args: ResumeArgs) -> Result<()> {
    let store = ArtifactStore::new(".");
    let folders = store
        .scan_eval_folders()
        .context("scanning eval folders")?;
    if folders.is_empty() {
        println!("No eval folders found in evals/. Run 'hievals run' first.");
        return Ok(());
    }

    let config = EngineConfig::new()
        .with_inactivity_timeout_secs(args.inactivity_timeout)
        .with_transient_retries(args.retries);

    let labels: Vec<String> = folders.iter().map(folder_label).collect();
    let Some(selected) =
        interactive::multi_select("Select evals to resume (✓ ok, ✗ failed, ? incomplete)", &labels)?
    else {
        return Ok(());
    };
    if selected.is_empty() {
        println!("No evals selected.");
        return Ok(());
    }

    let Some(mode) = interactive::select_mode(Mode::Sequential)? else {
        return Ok(());
    };

    let Some(mut model) =
        interactive::select_model(&store, "leave empty to re-use the recorded model")?
    else {
        return Ok(());
    };

    if model.is_empty() {
        // Fall back to the first selected folder's recorded model.
        model = selected
            .iter()
            .filter_map(|i| folders[*i].result.as_ref())
            .map(|r| r.model.clone())
            .find(|m| !m.is_empty())
            .unwrap_or_else(|| DEFAULT_MODEL.to_string());
    }

    let tasks: Vec<EvalTask> = selected
        .iter()
        .enumerate()
        .map(|(i, folder_index)| {
            let folder = &folders[*folder_index];
            EvalTask {
                prompt: folder.prompt.clone(),
                prompt_number: folder.prompt_number,
                model: model.clone(),
                folder: Some(folder.path.clone()),
                index: i,
            }
        })
        .collect();

    let mode_flag = match mode {
        RunMode::Parallel => Mode::Parallel,
        RunMode::Sequential => Mode::Sequential,
    };
    print_batch_header("Resuming", tasks.len(), &model, mode_flag, &config);

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

/// One menu line per folder: status, prompt tag, folder name, preview, and
/// the recorded model/duration when a result exists.
fn folder_label(folder: &EvalFolder) -> String {
    let (status, extra) = match &folder.result {
        Some(result) => {
            let status = if result.success { "✓" } else { "✗" };
            let extra = format!(" [{}, {}s]", result.model, result.duration_seconds);
            (status, extra)
        }
        None => ("?", String::new()),
    };

    let prompt_tag = if folder.prompt_number > 0 {
        format!("p{}", folder.prompt_number)
    } else {
        "p?".to_string()
    };

    format!(
        "{status} [{prompt_tag}] {} — {}{extra}",
        folder.name(),
        interactive::preview(&folder.prompt, 50)
    )
}

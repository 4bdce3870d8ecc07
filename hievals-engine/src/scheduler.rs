//! Batch scheduling: parallel or sequential execution with transient retry
//! and mid-run model correction.

use tokio::task::JoinSet;
use tracing::{error, info, warn};

use hievals_store::ArtifactStore;

use crate::classify::{ErrorClass, classify_error, is_transient};
use crate::config::EngineConfig;
use crate::driver::{EvalResult, EvalTask, run_eval};

/// How a batch of tasks is executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunMode {
    /// All tasks at once, one daemon and port per task.
    Parallel,
    /// One task at a time, in list order, with model correction available.
    Sequential,
}

/// Source of replacement model IDs when the daemon rejects one.
///
/// Sequential runs consult this after a model-not-found failure; the
/// corrected ID applies to the failed task's retry and every task after it.
/// Returning `None` abandons the rest of the batch.
pub trait ModelCorrector {
    fn correct(&self, current_model: &str, suggestions: &[String]) -> Option<String>;
}

/// Corrector that never substitutes; parallel and non-interactive runs use
/// it.
pub struct NoCorrection;

impl ModelCorrector for NoCorrection {
    fn correct(&self, _current_model: &str, _suggestions: &[String]) -> Option<String> {
        None
    }
}

/// Runs batches of eval tasks against one store with one configuration.
pub struct Scheduler {
    store: ArtifactStore,
    config: EngineConfig,
}

impl Scheduler {
    /// Create a scheduler.
    #[must_use]
    pub fn new(store: ArtifactStore, config: EngineConfig) -> Self {
        Self { store, config }
    }

    /// The configuration this scheduler runs with.
    #[must_use]
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run a batch. Task indices must be distinct; they address both the
    /// daemon port and the result slot.
    pub async fn run(
        &self,
        tasks: Vec<EvalTask>,
        mode: RunMode,
        corrector: &dyn ModelCorrector,
    ) -> Vec<EvalResult> {
        match mode {
            RunMode::Parallel => self.run_parallel(tasks).await,
            RunMode::Sequential => self.run_sequential(tasks, corrector).await,
        }
    }

    /// Launch every task concurrently. No mid-flight model correction.
    async fn run_parallel(&self, tasks: Vec<EvalTask>) -> Vec<EvalResult> {
        let count = tasks.len();
        let mut join = JoinSet::new();
        for task in tasks {
            let store = self.store.clone();
            let config = self.config.clone();
            join.spawn(async move {
                let result = run_with_retry(&store, &config, task.clone()).await;
                (task.index, result)
            });
        }

        let mut slots: Vec<Option<EvalResult>> = (0..count).map(|_| None).collect();
        while let Some(joined) = join.join_next().await {
            match joined {
                Ok((index, result)) => {
                    if let Some(slot) = slots.get_mut(index) {
                        *slot = Some(result);
                    }
                }
                Err(e) => error!(error = %e, "eval task aborted"),
            }
        }
        slots.into_iter().flatten().collect()
    }

    /// Run tasks in order; a corrected model propagates to later tasks.
    async fn run_sequential(
        &self,
        tasks: Vec<EvalTask>,
        corrector: &dyn ModelCorrector,
    ) -> Vec<EvalResult> {
        let mut results = Vec::with_capacity(tasks.len());
        let mut model_override: Option<String> = None;

        for mut task in tasks {
            if let Some(model) = &model_override {
                task.model = model.clone();
            }

            let mut result = run_with_retry(&self.store, &self.config, task.clone()).await;
            let mut abandoned = false;

            if !result.success
                && let Some(message) = &result.error
                && let ErrorClass::ModelNotFound(suggestions) = classify_error(message)
            {
                warn!(index = task.index, model = %task.model, "model not found");
                match corrector.correct(&task.model, &suggestions) {
                    Some(corrected) if !corrected.is_empty() => {
                        info!(index = task.index, model = %corrected, "retrying with corrected model");
                        model_override = Some(corrected.clone());
                        task.model = corrected;
                        result = run_with_retry(&self.store, &self.config, task).await;
                    }
                    _ => {
                        warn!("no replacement model selected, abandoning remaining evals");
                        abandoned = true;
                    }
                }
            }

            results.push(result);
            if abandoned {
                break;
            }
        }

        results
    }
}

/// Attempt a task up to `1 + transient_retries` times.
///
/// The folder from the first attempt is reused on retries, so artifacts are
/// not duplicated. Only errors the classifier deems transient retry.
async fn run_with_retry(
    store: &ArtifactStore,
    config: &EngineConfig,
    mut task: EvalTask,
) -> EvalResult {
    let max_attempts = config.transient_retries + 1;
    let mut attempt = 1;

    loop {
        let result = run_eval(store, config, &task).await;
        task.folder = Some(result.folder.clone());

        let retryable =
            !result.success && result.error.as_deref().is_some_and(is_transient);
        if !retryable || attempt >= max_attempts {
            return result;
        }

        attempt += 1;
        info!(
            index = task.index,
            attempt = attempt - 1,
            retries = config.transient_retries,
            "retrying after transient failure"
        );
    }
}

//! Session protocol driver: one eval from folder setup to terminal result.

use std::time::Duration;

use tracing::{debug, info, warn};

use hievals_models::split_model_id;
use hievals_store::{ArtifactStore, EvalRecord, parse_prompt_number, timestamp_folder_name};

use crate::config::EngineConfig;
use crate::daemon::AgentDaemon;
use crate::protocol::SessionClient;
use crate::tracker::{Verdict, track_completion};

/// Total window for the daemon to start answering session creates.
const READINESS_WINDOW: Duration = Duration::from_secs(15);

/// Pause between readiness probes.
const READINESS_POLL_INTERVAL: Duration = Duration::from_millis(500);

/// Inputs to a single eval run.
#[derive(Debug, Clone)]
pub struct EvalTask {
    pub prompt: String,
    /// 1-based prompt position, or 0 when unknown.
    pub prompt_number: u32,
    /// Fully-qualified `provider/model` ID.
    pub model: String,
    /// Existing folder to reuse; `None` creates a fresh one.
    pub folder: Option<String>,
    /// Determines the daemon port (`base_port + index`) and the result slot.
    pub index: usize,
}

/// Outcome of a single eval run.
#[derive(Debug, Clone)]
pub struct EvalResult {
    pub prompt: String,
    pub prompt_number: u32,
    /// Root-relative folder the eval ran in.
    pub folder: String,
    pub success: bool,
    pub error: Option<String>,
    pub duration: Duration,
}

/// Run one eval to completion.
///
/// Owns the full lifecycle: folder, daemon process, session protocol, event
/// tracking, and the terminal `result.json`. The daemon is stopped on every
/// exit path; `result.json` is written on every terminal outcome, including
/// setup failures.
pub async fn run_eval(
    store: &ArtifactStore,
    config: &EngineConfig,
    task: &EvalTask,
) -> EvalResult {
    let started = std::time::Instant::now();

    let mut prompt_number = task.prompt_number;
    let folder = match &task.folder {
        Some(folder) => {
            if prompt_number == 0 {
                prompt_number =
                    parse_prompt_number(folder.rsplit('/').next().unwrap_or(folder));
            }
            folder.clone()
        }
        None => timestamp_folder_name(
            chrono::Local::now(),
            task.index,
            task.prompt_number,
            &task.model,
        ),
    };

    info!(index = task.index, folder = %folder, model = %task.model, "starting eval");

    let ctx = FinishContext {
        store,
        task,
        folder: &folder,
        prompt_number,
        started,
    };

    if task.folder.is_none()
        && let Err(e) = store.setup_eval_folder(&folder, &task.prompt)
    {
        return ctx.finish(false, Some(format!("failed to set up eval folder: {e}")));
    }

    let port = config.port_for_index(task.index);
    let mut daemon = match AgentDaemon::spawn(&config.agent_command, &store.resolve(&folder), port)
    {
        Ok(daemon) => daemon,
        Err(e) => return ctx.finish(false, Some(e.to_string())),
    };

    let outcome = drive_session(config, task, port).await;
    daemon.terminate().await;

    match outcome {
        Ok(Verdict { completed, error }) => {
            let success = completed && error.is_none();
            let error = match error {
                Some(error) => Some(error),
                None if !completed => Some("agent did not reach idle state".to_string()),
                None => None,
            };
            ctx.finish(success, error)
        }
        Err(message) => ctx.finish(false, Some(message)),
    }
}

/// Run the session protocol against an already-spawned daemon.
///
/// The event subscription is opened strictly before the prompt is posted;
/// reversing that order can lose the terminal idle event.
async fn drive_session(
    config: &EngineConfig,
    task: &EvalTask,
    port: u16,
) -> std::result::Result<Verdict, String> {
    let client = SessionClient::new(format!("http://127.0.0.1:{port}"))
        .map_err(|e| format!("building HTTP client: {e}"))?;

    let deadline = tokio::time::Instant::now() + READINESS_WINDOW;
    let mut session = None;
    let mut last_error = String::new();
    while tokio::time::Instant::now() < deadline {
        match client.create_session(&format!("Eval {}", task.index)).await {
            Ok(created) => {
                session = Some(created);
                break;
            }
            Err(e) => {
                last_error = e.to_string();
                tokio::time::sleep(READINESS_POLL_INTERVAL).await;
            }
        }
    }
    let Some(session) = session else {
        return Err(format!(
            "server not ready after {}s: {last_error}",
            READINESS_WINDOW.as_secs()
        ));
    };
    info!(index = task.index, session = %session.id, "session created");

    let events = client
        .subscribe_events()
        .await
        .map_err(|e| format!("failed to subscribe to events: {e}"))?;

    debug!(index = task.index, "sending prompt");
    let (provider_id, model_id) = split_model_id(&task.model);
    client
        .post_prompt(&session.id, provider_id, model_id, &task.prompt)
        .await
        .map_err(|e| format!("failed to send prompt: {e}"))?;

    Ok(track_completion(events, &session.id, task.index, config.inactivity_timeout).await)
}

struct FinishContext<'a> {
    store: &'a ArtifactStore,
    task: &'a EvalTask,
    folder: &'a str,
    prompt_number: u32,
    started: std::time::Instant,
}

impl FinishContext<'_> {
    /// Compose the result and persist `result.json`, best effort.
    fn finish(self, success: bool, error: Option<String>) -> EvalResult {
        let duration = self.started.elapsed();
        let result = EvalResult {
            prompt: self.task.prompt.clone(),
            prompt_number: self.prompt_number,
            folder: self.folder.to_string(),
            success,
            error,
            duration,
        };

        let record = EvalRecord {
            prompt: result.prompt.clone(),
            prompt_number: result.prompt_number,
            model: self.task.model.clone(),
            success,
            error: result.error.clone().unwrap_or_default(),
            duration_seconds: duration.as_secs(),
            completed_at: chrono::Utc::now()
                .to_rfc3339_opts(chrono::SecondsFormat::Secs, true),
            cost_usd: None,
        };
        if let Err(e) = self.store.write_result(&result.folder, &record) {
            warn!(folder = %result.folder, error = %e, "writing result.json failed");
        }

        info!(
            index = self.task.index,
            success,
            secs = duration.as_secs(),
            "eval finished"
        );
        result
    }
}

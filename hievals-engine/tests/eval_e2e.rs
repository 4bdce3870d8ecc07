//! End-to-end engine tests against a mock agent daemon.
//!
//! The mock serves the real wire protocol (session create, SSE events,
//! async prompt) on a fixed port; the spawned "daemon" child is a stand-in
//! binary since the mock is already listening. Each test uses its own port
//! range so they can run concurrently.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::sse::{Event, Sse};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{Value, json};
use tokio::sync::broadcast;

use hievals_engine::{
    EngineConfig, EvalTask, ModelCorrector, NoCorrection, RunMode, Scheduler, run_eval,
};
use hievals_store::ArtifactStore;

const SESSION_ID: &str = "sess-1";

#[derive(Clone)]
enum Behavior {
    /// Busy, then idle.
    Idle,
    /// Emit a session error with this `error` payload.
    SessionError(Value),
    /// First prompt: heartbeats only. Later prompts: idle.
    StallThenIdle,
    /// Reject this model ID with a model-not-found error; accept others.
    ModelGate { bad: String },
}

struct MockDaemon {
    events_tx: broadcast::Sender<String>,
    prompts: AtomicUsize,
    behavior: Behavior,
}

impl MockDaemon {
    fn prompt_count(&self) -> usize {
        self.prompts.load(Ordering::SeqCst)
    }
}

async fn spawn_mock(port: u16, behavior: Behavior) -> Arc<MockDaemon> {
    let (events_tx, _) = broadcast::channel(256);
    let state = Arc::new(MockDaemon {
        events_tx,
        prompts: AtomicUsize::new(0),
        behavior,
    });

    let app = Router::new()
        .route("/session", post(create_session))
        .route("/event", get(events))
        .route("/session/{id}/prompt_async", post(prompt))
        .with_state(Arc::clone(&state));

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
        .await
        .unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    tokio::time::sleep(Duration::from_millis(10)).await;

    state
}

async fn create_session() -> Json<Value> {
    Json(json!({ "id": SESSION_ID, "title": "Eval 0", "slug": "eval-0" }))
}

async fn events(
    State(state): State<Arc<MockDaemon>>,
) -> Sse<impl futures_util::Stream<Item = Result<Event, std::convert::Infallible>>> {
    let rx = state.events_tx.subscribe();
    let stream = futures_util::stream::unfold(rx, |mut rx| async move {
        match rx.recv().await {
            Ok(payload) => Some((Ok(Event::default().data(payload)), rx)),
            Err(_) => None,
        }
    });
    Sse::new(stream)
}

async fn prompt(
    State(state): State<Arc<MockDaemon>>,
    Path(_id): Path<String>,
    Json(body): Json<Value>,
) -> StatusCode {
    let attempt = state.prompts.fetch_add(1, Ordering::SeqCst);
    let tx = state.events_tx.clone();

    match state.behavior.clone() {
        Behavior::Idle => {
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                let _ = tx.send(busy_event());
                tokio::time::sleep(Duration::from_millis(50)).await;
                let _ = tx.send(idle_event());
            });
        }
        Behavior::SessionError(error) => {
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                let _ = tx.send(error_event(error));
            });
        }
        Behavior::StallThenIdle => {
            if attempt == 0 {
                tokio::spawn(async move {
                    for _ in 0..25 {
                        tokio::time::sleep(Duration::from_millis(200)).await;
                        if tx.send(heartbeat_event()).is_err() {
                            return;
                        }
                    }
                });
            } else {
                tokio::spawn(async move {
                    tokio::time::sleep(Duration::from_millis(50)).await;
                    let _ = tx.send(idle_event());
                });
            }
        }
        Behavior::ModelGate { bad } => {
            let model = body["model"]["modelID"].as_str().unwrap_or("").to_string();
            tokio::spawn(async move {
                tokio::time::sleep(Duration::from_millis(50)).await;
                if model == bad {
                    let _ = tx.send(error_event(json!({
                        "data": {
                            "message": format!(
                                "Model not found: openrouter/{model}. Did you mean: good?"
                            )
                        }
                    })));
                } else {
                    let _ = tx.send(idle_event());
                }
            });
        }
    }

    StatusCode::NO_CONTENT
}

fn idle_event() -> String {
    json!({"type": "session.idle", "properties": {"sessionID": SESSION_ID}}).to_string()
}

fn busy_event() -> String {
    json!({
        "type": "session.status",
        "properties": {"sessionID": SESSION_ID, "status": {"type": "busy"}}
    })
    .to_string()
}

fn heartbeat_event() -> String {
    json!({"type": "server.heartbeat", "properties": {}}).to_string()
}

fn error_event(error: Value) -> String {
    json!({
        "type": "session.error",
        "properties": {"sessionID": SESSION_ID, "error": error}
    })
    .to_string()
}

fn test_config(base_port: u16) -> EngineConfig {
    // `true` exits immediately; the mock is already serving the port.
    EngineConfig::new()
        .with_base_port(base_port)
        .with_agent_command("true")
}

fn task(prompt: &str, prompt_number: u32, model: &str, index: usize) -> EvalTask {
    EvalTask {
        prompt: prompt.to_string(),
        prompt_number,
        model: model.to_string(),
        folder: None,
        index,
    }
}

struct ScriptedCorrector {
    replacement: String,
    calls: AtomicUsize,
}

impl ModelCorrector for ScriptedCorrector {
    fn correct(&self, _current_model: &str, suggestions: &[String]) -> Option<String> {
        assert_eq!(suggestions, ["good"]);
        self.calls.fetch_add(1, Ordering::SeqCst);
        Some(self.replacement.clone())
    }
}

struct PanickingCorrector;

impl ModelCorrector for PanickingCorrector {
    fn correct(&self, _current_model: &str, _suggestions: &[String]) -> Option<String> {
        panic!("corrector must not be consulted in parallel mode");
    }
}

fn eval_folder_count(store: &ArtifactStore) -> usize {
    store.scan_eval_folders().unwrap().len()
}

#[tokio::test]
async fn happy_single_run_persists_artifacts() {
    let mock = spawn_mock(46310, Behavior::Idle).await;
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());
    let config = test_config(46310);

    let result = run_eval(&store, &config, &task("P", 1, "openrouter/a", 0)).await;

    assert!(result.success, "error: {:?}", result.error);
    assert!(result.error.is_none());
    assert!(result.folder.starts_with("evals/"));
    assert!(result.folder.ends_with("_p1_0_openrouter-a"));
    assert_eq!(mock.prompt_count(), 1);

    let folder = store.resolve(&result.folder);
    assert_eq!(std::fs::read_to_string(folder.join("prompt.txt")).unwrap(), "P");
    assert!(folder.join("package.json").exists());

    let raw = std::fs::read_to_string(folder.join("result.json")).unwrap();
    let record: Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(record["success"], true);
    assert_eq!(record["prompt"], "P");
    assert_eq!(record["prompt_number"], 1);
    assert_eq!(record["model"], "openrouter/a");
    assert!(record.get("error").is_none());
}

#[tokio::test]
async fn fatal_session_error_is_not_retried() {
    let mock = spawn_mock(46320, Behavior::SessionError(json!({
        "data": {"message": "boom"}
    })))
    .await;
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());
    let config = test_config(46320).with_transient_retries(2);

    let scheduler = Scheduler::new(store.clone(), config);
    let results = scheduler
        .run(
            vec![task("P", 1, "openrouter/a", 0)],
            RunMode::Sequential,
            &NoCorrection,
        )
        .await;

    assert_eq!(results.len(), 1);
    assert!(!results[0].success);
    assert_eq!(results[0].error.as_deref(), Some("boom"));
    assert_eq!(mock.prompt_count(), 1, "fatal errors must not retry");

    let record = store.read_result(&results[0].folder).unwrap();
    assert!(!record.success);
    assert_eq!(record.error, "boom");
}

#[tokio::test]
async fn transient_timeout_retries_in_the_same_folder() {
    let mock = spawn_mock(46330, Behavior::StallThenIdle).await;
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());
    let config = test_config(46330)
        .with_inactivity_timeout_secs(1)
        .with_transient_retries(1);

    let scheduler = Scheduler::new(store.clone(), config);
    let results = scheduler
        .run(
            vec![task("P", 1, "openrouter/a", 0)],
            RunMode::Sequential,
            &NoCorrection,
        )
        .await;

    assert_eq!(results.len(), 1);
    assert!(results[0].success, "error: {:?}", results[0].error);
    assert_eq!(mock.prompt_count(), 2, "one stall, one successful attempt");
    assert_eq!(eval_folder_count(&store), 1, "retry must reuse the folder");
}

#[tokio::test]
async fn sequential_model_correction_applies_to_later_tasks() {
    spawn_mock(46340, Behavior::ModelGate { bad: "bad".to_string() }).await;
    spawn_mock(46341, Behavior::ModelGate { bad: "bad".to_string() }).await;
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());
    let config = test_config(46340);

    let corrector = ScriptedCorrector {
        replacement: "openrouter/good".to_string(),
        calls: AtomicUsize::new(0),
    };

    let scheduler = Scheduler::new(store.clone(), config);
    let results = scheduler
        .run(
            vec![
                task("first", 1, "openrouter/bad", 0),
                task("second", 2, "openrouter/bad", 1),
            ],
            RunMode::Sequential,
            &corrector,
        )
        .await;

    assert_eq!(results.len(), 2);
    assert!(results[0].success, "error: {:?}", results[0].error);
    assert!(results[1].success, "error: {:?}", results[1].error);
    assert_eq!(corrector.calls.load(Ordering::SeqCst), 1);

    // Both terminal records carry the corrected model.
    assert_eq!(store.read_result(&results[0].folder).unwrap().model, "openrouter/good");
    assert_eq!(store.read_result(&results[1].folder).unwrap().model, "openrouter/good");
}

#[tokio::test]
async fn parallel_model_not_found_fails_without_correction() {
    spawn_mock(46350, Behavior::ModelGate { bad: "bad".to_string() }).await;
    spawn_mock(46351, Behavior::ModelGate { bad: "bad".to_string() }).await;
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());
    let config = test_config(46350);

    let scheduler = Scheduler::new(store.clone(), config);
    let results = scheduler
        .run(
            vec![
                task("first", 1, "openrouter/bad", 0),
                task("second", 2, "openrouter/bad", 1),
            ],
            RunMode::Parallel,
            &PanickingCorrector,
        )
        .await;

    assert_eq!(results.len(), 2);
    for result in &results {
        assert!(!result.success);
        assert!(result.error.as_deref().unwrap().contains("Model not found"));
        let record = store.read_result(&result.folder).unwrap();
        assert!(!record.success);
    }
}

#[tokio::test]
async fn resume_reuses_folder_and_recovers_prompt_number() {
    spawn_mock(46360, Behavior::Idle).await;
    let dir = tempfile::tempdir().unwrap();
    let store = ArtifactStore::new(dir.path());
    let config = test_config(46360);

    let folder = "evals/2026-02-16_09-35-43_p7_0_openrouter-a";
    store.setup_eval_folder(folder, "resumed prompt").unwrap();

    let mut resumed = task("resumed prompt", 0, "openrouter/a", 0);
    resumed.folder = Some(folder.to_string());

    let result = run_eval(&store, &config, &resumed).await;

    assert!(result.success, "error: {:?}", result.error);
    assert_eq!(result.folder, folder);
    assert_eq!(result.prompt_number, 7, "recovered from the folder name");

    let record = store.read_result(folder).unwrap();
    assert!(record.success);
    assert_eq!(record.prompt_number, 7);
    assert_eq!(eval_folder_count(&store), 1);
}

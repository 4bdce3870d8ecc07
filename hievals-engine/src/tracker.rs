//! SSE completion tracking.
//!
//! Consumes a daemon's event stream until the session reaches a terminal
//! state: idle (success), a session error (failure), inactivity timeout, or
//! end of stream. A watcher task owns the timeout; the stream reader owns
//! parsing. They share one state cell and coordinate through a
//! [`CancellationToken`] so termination is signalled exactly once and both
//! sides unwind on every exit path.

use std::pin::pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::config::EVENT_LINE_MAX_BYTES;

/// Interval at which the watcher re-checks activity.
const WATCH_INTERVAL: Duration = Duration::from_secs(1);

/// Terminal verdict for one eval attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Verdict {
    /// The session reached idle.
    pub completed: bool,
    /// Error observed on the way, if any.
    pub error: Option<String>,
}

struct TrackerState {
    last_activity: Instant,
    completed: bool,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AgentEvent {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    properties: serde_json::Value,
}

/// Consume `events` until a terminal state for `session_id` is observed.
///
/// `index` only labels log lines. The stream ending without a terminal event
/// yields whatever state was accumulated; the driver turns a silent ending
/// into its own error.
pub async fn track_completion<S, E>(
    events: S,
    session_id: &str,
    index: usize,
    inactivity_timeout: Duration,
) -> Verdict
where
    S: Stream<Item = std::result::Result<Bytes, E>>,
    E: std::fmt::Display,
{
    let state = Arc::new(Mutex::new(TrackerState {
        last_activity: Instant::now(),
        completed: false,
        error: None,
    }));
    let cancel = CancellationToken::new();

    let watcher = tokio::spawn(inactivity_watcher(
        Arc::clone(&state),
        cancel.clone(),
        inactivity_timeout,
        index,
    ));

    let mut events = pin!(events);
    let mut buf: Vec<u8> = Vec::new();

    'read: loop {
        tokio::select! {
            biased;

            _ = cancel.cancelled() => break 'read,

            chunk = events.next() => match chunk {
                None => break 'read,
                Some(Err(e)) => {
                    warn!(index, error = %e, "event stream error");
                    let mut s = state.lock().unwrap();
                    if s.error.is_none() {
                        s.error = Some(format!("event stream error: {e}"));
                    }
                    break 'read;
                }
                Some(Ok(bytes)) => {
                    buf.extend_from_slice(&bytes);
                    while let Some(pos) = buf.iter().position(|b| *b == b'\n') {
                        let raw: Vec<u8> = buf.drain(..=pos).collect();
                        let line = String::from_utf8_lossy(&raw);
                        if handle_line(line.trim_end_matches(['\r', '\n']), session_id, index, &state) {
                            break 'read;
                        }
                    }
                    if buf.len() > EVENT_LINE_MAX_BYTES {
                        warn!(index, "event line exceeded {EVENT_LINE_MAX_BYTES} bytes");
                        let mut s = state.lock().unwrap();
                        if s.error.is_none() {
                            s.error = Some(format!(
                                "event stream error: event line exceeds {EVENT_LINE_MAX_BYTES} bytes"
                            ));
                        }
                        break 'read;
                    }
                }
            }
        }
    }

    cancel.cancel();
    let _ = watcher.await;

    let s = state.lock().unwrap();
    Verdict {
        completed: s.completed,
        error: s.error.clone(),
    }
}

/// Fails the eval once no activity has been seen for the full timeout.
async fn inactivity_watcher(
    state: Arc<Mutex<TrackerState>>,
    cancel: CancellationToken,
    inactivity_timeout: Duration,
    index: usize,
) {
    let mut ticker = tokio::time::interval(WATCH_INTERVAL);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => {
                let mut s = state.lock().unwrap();
                if !s.completed
                    && s.error.is_none()
                    && s.last_activity.elapsed() > inactivity_timeout
                {
                    let secs = inactivity_timeout.as_secs();
                    warn!(index, "timed out: no agent activity for {secs}s");
                    s.error = Some(format!("no agent activity for {secs}s"));
                    drop(s);
                    cancel.cancel();
                    return;
                }
            }
        }
    }
}

/// Apply one stream line to the tracker state.
///
/// Returns `true` on a terminal event. Every non-blank line counts as
/// activity except `server.*` heartbeats, which must not defer the timeout.
fn handle_line(
    line: &str,
    session_id: &str,
    index: usize,
    state: &Mutex<TrackerState>,
) -> bool {
    let trimmed = line.trim();
    if trimmed.is_empty() {
        return false;
    }

    let event = trimmed
        .strip_prefix("data: ")
        .and_then(|data| serde_json::from_str::<AgentEvent>(data).ok());

    if let Some(ref event) = event
        && event.kind.starts_with("server.")
    {
        return false;
    }

    state.lock().unwrap().last_activity = Instant::now();

    // Non-data and unparseable lines only count as activity.
    let Some(event) = event else {
        return false;
    };

    if let Some(event_session) = event.properties.get("sessionID").and_then(|v| v.as_str())
        && event_session != session_id
    {
        return false;
    }

    match event.kind.as_str() {
        "session.idle" => {
            info!(index, "session idle, agent completed");
            state.lock().unwrap().completed = true;
            true
        }

        "session.status" => {
            match event
                .properties
                .pointer("/status/type")
                .and_then(|v| v.as_str())
            {
                Some("idle") => {
                    info!(index, "session idle, agent completed");
                    state.lock().unwrap().completed = true;
                    return true;
                }
                Some("busy") => info!(index, "agent working"),
                Some("retry") => {
                    let message = event
                        .properties
                        .pointer("/status/message")
                        .and_then(|v| v.as_str())
                        .unwrap_or("");
                    info!(index, message, "agent retrying");
                }
                _ => {}
            }
            false
        }

        "session.error" => {
            let message = event
                .properties
                .get("error")
                .map(extract_error_message)
                .unwrap_or_else(|| "unknown session error".to_string());
            warn!(index, error = %message, "session error");
            state.lock().unwrap().error = Some(message);
            true
        }

        // Agent is actively generating; logging every delta would be noise.
        "message.updated" | "message.part.updated" => false,

        other => {
            debug!(index, event = other, "event");
            false
        }
    }
}

/// Best-effort extraction of a human-readable message from a session error
/// payload.
fn extract_error_message(error: &serde_json::Value) -> String {
    if let Some(message) = error.pointer("/data/message").and_then(|v| v.as_str()) {
        return message.to_string();
    }
    if let Some(message) = error.get("message").and_then(|v| v.as_str()) {
        return message.to_string();
    }
    if let Some(name) = error.get("name").and_then(|v| v.as_str()) {
        return name.to_string();
    }
    if let Some(s) = error.as_str() {
        return s.to_string();
    }
    error.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::stream;
    use std::convert::Infallible;

    const SESSION: &str = "sess-1";
    const TIMEOUT: Duration = Duration::from_secs(180);

    fn lines(items: &[&str]) -> Vec<Result<Bytes, Infallible>> {
        items
            .iter()
            .map(|line| Ok(Bytes::from(format!("{line}\n"))))
            .collect()
    }

    async fn track(items: &[&str]) -> Verdict {
        track_completion(stream::iter(lines(items)), SESSION, 0, TIMEOUT).await
    }

    #[tokio::test]
    async fn idle_event_completes() {
        let verdict = track(&[
            r#"data: {"type":"session.status","properties":{"sessionID":"sess-1","status":{"type":"busy"}}}"#,
            r#"data: {"type":"session.idle","properties":{"sessionID":"sess-1"}}"#,
        ])
        .await;
        assert_eq!(
            verdict,
            Verdict {
                completed: true,
                error: None
            }
        );
    }

    #[tokio::test]
    async fn status_idle_completes() {
        let verdict = track(&[
            r#"data: {"type":"session.status","properties":{"sessionID":"sess-1","status":{"type":"idle"}}}"#,
        ])
        .await;
        assert!(verdict.completed);
    }

    #[tokio::test]
    async fn other_sessions_are_ignored() {
        let verdict = track(&[
            r#"data: {"type":"session.idle","properties":{"sessionID":"someone-else"}}"#,
        ])
        .await;
        assert_eq!(verdict, Verdict::default());
    }

    #[tokio::test]
    async fn unparseable_lines_are_dropped() {
        let verdict = track(&[
            "data: {definitely not json",
            ": comment line",
            r#"data: {"type":"session.idle","properties":{"sessionID":"sess-1"}}"#,
        ])
        .await;
        assert!(verdict.completed);
    }

    #[tokio::test]
    async fn session_error_nested_data_message() {
        let verdict = track(&[
            r#"data: {"type":"session.error","properties":{"sessionID":"sess-1","error":{"data":{"message":"boom"}}}}"#,
        ])
        .await;
        assert_eq!(verdict.error.as_deref(), Some("boom"));
        assert!(!verdict.completed);
    }

    #[tokio::test]
    async fn session_error_flat_message_then_name_then_string() {
        let flat = track(&[
            r#"data: {"type":"session.error","properties":{"error":{"message":"flat"}}}"#,
        ])
        .await;
        assert_eq!(flat.error.as_deref(), Some("flat"));

        let name = track(&[
            r#"data: {"type":"session.error","properties":{"error":{"name":"ProviderAuthError"}}}"#,
        ])
        .await;
        assert_eq!(name.error.as_deref(), Some("ProviderAuthError"));

        let plain = track(&[
            r#"data: {"type":"session.error","properties":{"error":"just text"}}"#,
        ])
        .await;
        assert_eq!(plain.error.as_deref(), Some("just text"));
    }

    #[tokio::test]
    async fn session_error_without_payload_is_unknown() {
        let verdict = track(&[r#"data: {"type":"session.error","properties":{}}"#]).await;
        assert_eq!(verdict.error.as_deref(), Some("unknown session error"));
    }

    #[tokio::test]
    async fn stream_end_without_terminal_event_is_empty_verdict() {
        let verdict = track(&[
            r#"data: {"type":"message.updated","properties":{"sessionID":"sess-1"}}"#,
        ])
        .await;
        assert_eq!(verdict, Verdict::default());
    }

    #[tokio::test(start_paused = true)]
    async fn heartbeats_do_not_defer_the_timeout() {
        // Two heartbeats, then the stream hangs forever.
        let hanging = stream::iter(lines(&[
            r#"data: {"type":"server.connected","properties":{}}"#,
            r#"data: {"type":"server.heartbeat","properties":{}}"#,
        ]))
        .chain(stream::pending());

        let verdict =
            track_completion(hanging, SESSION, 0, Duration::from_secs(3)).await;
        assert_eq!(verdict.error.as_deref(), Some("no agent activity for 3s"));
        assert!(!verdict.completed);
    }

    #[tokio::test(start_paused = true)]
    async fn activity_defers_the_timeout() {
        // A real event refreshes activity; the stream then hangs and the
        // timeout fires from the refreshed point.
        let hanging = stream::iter(lines(&[
            r#"data: {"type":"message.part.updated","properties":{"sessionID":"sess-1"}}"#,
        ]))
        .chain(stream::pending());

        let started = Instant::now();
        let verdict = track_completion(hanging, SESSION, 0, Duration::from_secs(2)).await;
        assert_eq!(verdict.error.as_deref(), Some("no agent activity for 2s"));
        assert!(started.elapsed() >= Duration::from_secs(2));
    }

    #[tokio::test]
    async fn oversized_line_is_a_stream_error() {
        let big = vec![b'x'; EVENT_LINE_MAX_BYTES + 1];
        let chunks: Vec<Result<Bytes, Infallible>> = vec![Ok(Bytes::from(big))];
        let verdict =
            track_completion(stream::iter(chunks), SESSION, 0, TIMEOUT).await;
        let error = verdict.error.unwrap();
        assert!(error.starts_with("event stream error: "));
    }

    #[tokio::test]
    async fn lines_split_across_chunks_reassemble() {
        let event = r#"data: {"type":"session.idle","properties":{"sessionID":"sess-1"}}"#;
        let (a, b) = event.split_at(20);
        let chunks: Vec<Result<Bytes, Infallible>> = vec![
            Ok(Bytes::from(a.to_string())),
            Ok(Bytes::from(format!("{b}\n"))),
        ];
        let verdict = track_completion(stream::iter(chunks), SESSION, 0, TIMEOUT).await;
        assert!(verdict.completed);
    }

    #[tokio::test]
    async fn stream_error_is_reported_transiently() {
        let chunks: Vec<Result<Bytes, String>> = vec![
            Ok(Bytes::from("data: {\"type\":\"step.started\",\"properties\":{}}\n")),
            Err("connection reset".to_string()),
        ];
        let verdict = track_completion(stream::iter(chunks), SESSION, 0, TIMEOUT).await;
        assert_eq!(
            verdict.error.as_deref(),
            Some("event stream error: connection reset")
        );
    }
}

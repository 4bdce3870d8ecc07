//! Classification of raw eval error messages.
//!
//! The scheduler only ever sees error text (most of it originates on the
//! daemon side), so classification is substring-based: a small set of known
//! transient markers, plus the daemon's model-not-found phrasing with its
//! optional `Did you mean: ...` suggestion list.

/// Error fragments that indicate a retryable failure.
const TRANSIENT_MARKERS: [&str; 3] = [
    "no agent activity for ",
    "event stream error: ",
    "agent did not reach idle state",
];

const MODEL_NOT_FOUND_MARKER: &str = "Model not found";
const SUGGESTION_MARKER: &str = "Did you mean: ";

/// What the scheduler may do about a failed attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorClass {
    /// Retry in place, same folder.
    Transient,
    /// Give up on this task.
    Fatal,
    /// Fatal for the attempt, but correctable: the daemon rejected the model,
    /// possibly offering replacements.
    ModelNotFound(Vec<String>),
}

/// Classify an error message.
#[must_use]
pub fn classify_error(message: &str) -> ErrorClass {
    if message.contains(MODEL_NOT_FOUND_MARKER) {
        return ErrorClass::ModelNotFound(parse_suggestions(message));
    }
    if is_transient(message) {
        return ErrorClass::Transient;
    }
    ErrorClass::Fatal
}

/// Whether an error message is retry-eligible.
#[must_use]
pub fn is_transient(message: &str) -> bool {
    !message.is_empty() && TRANSIENT_MARKERS.iter().any(|marker| message.contains(marker))
}

/// Pull the `Did you mean: a, b, c?` list out of a model-not-found message.
fn parse_suggestions(message: &str) -> Vec<String> {
    let Some(pos) = message.find(SUGGESTION_MARKER) else {
        return Vec::new();
    };
    message[pos + SUGGESTION_MARKER.len()..]
        .trim_end_matches('?')
        .split(", ")
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn inactivity_timeout_is_transient() {
        assert!(is_transient("no agent activity for 180s"));
    }

    #[test]
    fn stream_error_is_transient() {
        assert!(is_transient("event stream error: connection reset"));
    }

    #[test]
    fn missing_idle_state_is_transient() {
        assert!(is_transient("agent did not reach idle state"));
    }

    #[test]
    fn http_and_empty_errors_are_fatal() {
        assert!(!is_transient("HTTP 401"));
        assert!(!is_transient(""));
        assert_eq!(classify_error("HTTP 401"), ErrorClass::Fatal);
        assert_eq!(classify_error(""), ErrorClass::Fatal);
    }

    #[test]
    fn model_not_found_without_suggestions() {
        assert_eq!(
            classify_error("Model not found: openrouter/nope"),
            ErrorClass::ModelNotFound(Vec::new())
        );
    }

    #[test]
    fn model_not_found_parses_suggestions() {
        let class = classify_error("Model not found: x. Did you mean: a, b, c?");
        assert_eq!(
            class,
            ErrorClass::ModelNotFound(vec![
                "a".to_string(),
                "b".to_string(),
                "c".to_string()
            ])
        );
    }

    #[test]
    fn suggestion_question_mark_is_stripped() {
        let ErrorClass::ModelNotFound(suggestions) =
            classify_error("Model not found: x. Did you mean: openrouter/glm-5?")
        else {
            panic!("expected model-not-found");
        };
        assert_eq!(suggestions, vec!["openrouter/glm-5".to_string()]);
    }
}

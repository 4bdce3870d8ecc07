//! Model identifier normalization and parsing.
//!
//! A fully-qualified model ID is `provider/model`. Bare model names are
//! assumed to live on OpenRouter, which proxies most of the catalog.

/// Provider assumed when a model ID carries no `provider/` prefix.
pub const DEFAULT_PROVIDER: &str = "openrouter";

/// Normalize a user-supplied model ID.
///
/// Empty input stays empty (callers reject it). IDs that already contain a
/// `/` pass through unchanged; bare names get the [`DEFAULT_PROVIDER`]
/// prefix.
#[must_use]
pub fn normalize_model_id(model: &str) -> String {
    if model.is_empty() {
        return String::new();
    }
    if model.contains('/') {
        return model.to_string();
    }
    format!("{DEFAULT_PROVIDER}/{model}")
}

/// Split a model ID into `(provider, model)`.
///
/// The provider is everything before the first `/`; the model keeps any
/// further slashes (e.g. `openrouter/z-ai/glm-5` → `z-ai/glm-5`). An ID
/// without a `/` belongs to the default provider.
#[must_use]
pub fn split_model_id(model: &str) -> (&str, &str) {
    match model.split_once('/') {
        Some((provider, rest)) => (provider, rest),
        None => (DEFAULT_PROVIDER, model),
    }
}

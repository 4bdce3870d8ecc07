//! Eval folder naming.
//!
//! Folder names are `<date>_<time>_p<prompt>_<index>_<sanitized-model>` under
//! `evals/`. The timestamp plus the task index keep names unique within an
//! invocation; the sanitized model makes folders scannable at a glance.

use std::sync::LazyLock;

use regex::Regex;

use hievals_models::normalize_model_id;

/// Fallback fragment when sanitization eats the whole model ID.
const UNKNOWN_MODEL: &str = "unknown-model";

/// Longest sanitized model fragment we embed in a folder name.
const MAX_MODEL_FRAGMENT: usize = 64;

static PROMPT_NUMBER_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|_)p(\d+)(?:_|$)").expect("valid prompt number pattern"));

/// Turn a model ID into a filesystem-safe folder fragment.
///
/// Lowercases, keeps `[a-z0-9._-]`, coalesces any other run of characters
/// into a single `-`, trims stray separators and caps the length.
#[must_use]
pub fn sanitize_model_for_folder(model: &str) -> String {
    let model = normalize_model_id(model.trim()).to_lowercase();
    if model.is_empty() {
        return UNKNOWN_MODEL.to_string();
    }

    let mut out = String::with_capacity(model.len());
    let mut prev_dash = false;
    for c in model.chars() {
        if c.is_ascii_lowercase() || c.is_ascii_digit() || matches!(c, '-' | '_' | '.') {
            out.push(c);
            prev_dash = false;
        } else if !prev_dash {
            out.push('-');
            prev_dash = true;
        }
    }

    let mut sanitized = out.trim_matches(['-', '_', '.']).to_string();
    if sanitized.is_empty() {
        return UNKNOWN_MODEL.to_string();
    }

    if sanitized.len() > MAX_MODEL_FRAGMENT {
        // Sanitized output is ASCII-only, so byte truncation is safe.
        sanitized.truncate(MAX_MODEL_FRAGMENT);
        sanitized = sanitized.trim_end_matches(['-', '_', '.']).to_string();
        if sanitized.is_empty() {
            return UNKNOWN_MODEL.to_string();
        }
    }

    sanitized
}

/// Build a fresh root-relative eval folder path for a task.
#[must_use]
pub fn timestamp_folder_name(
    now: chrono::DateTime<chrono::Local>,
    index: usize,
    prompt_number: u32,
    model: &str,
) -> String {
    format!(
        "evals/{}_p{}_{}_{}",
        now.format("%Y-%m-%d_%H-%M-%S"),
        prompt_number,
        index,
        sanitize_model_for_folder(model),
    )
}

/// Recover a 1-based prompt number from a folder name, or 0 if absent.
#[must_use]
pub fn parse_prompt_number(folder_name: &str) -> u32 {
    PROMPT_NUMBER_RE
        .captures(folder_name)
        .and_then(|caps| caps[1].parse::<u32>().ok())
        .filter(|n| *n >= 1)
        .unwrap_or(0)
}

//! Fuzzy model search and saved-model pinning.
//!
//! Ranking favours exact substring hits, then normalized (alphanumeric-only)
//! hits, then subsequence and per-token matches. Ties break on the model ID
//! so results stay stable across runs.

use std::collections::BTreeSet;

/// Query terms precomputed once per search.
#[derive(Debug)]
struct SearchQuery {
    lower: String,
    normalized: String,
    tokens: Vec<String>,
}

impl SearchQuery {
    fn new(raw: &str) -> Self {
        Self {
            lower: raw.to_lowercase(),
            normalized: normalize_for_search(raw),
            tokens: split_search_tokens(raw),
        }
    }
}

/// Filter `models` down to those matching `query`, best match first.
///
/// A blank query returns the input unchanged.
#[must_use]
pub fn filter_models(models: &[String], query: &str) -> Vec<String> {
    let trimmed = query.trim();
    if trimmed.is_empty() {
        return models.to_vec();
    }

    let query = SearchQuery::new(trimmed);
    let mut scored: Vec<(i32, &String)> = models
        .iter()
        .filter_map(|model| score_model_match(model, &query).map(|score| (score, model)))
        .collect();

    scored.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));
    scored.into_iter().map(|(_, model)| model.clone()).collect()
}

/// Score one candidate against the query; `None` means no match.
fn score_model_match(model: &str, query: &SearchQuery) -> Option<i32> {
    let lower_model = model.to_lowercase();
    let normalized_model = normalize_for_search(model);
    let mut score = 0;
    let mut matched = false;

    if !query.lower.is_empty() && lower_model.contains(&query.lower) {
        score += 140;
        matched = true;
    }

    if !query.normalized.is_empty() {
        if normalized_model.contains(&query.normalized) {
            score += 120;
            matched = true;
        }

        if normalized_model.starts_with(&query.normalized) {
            score += 30;
        }

        if is_subsequence(&query.normalized, &normalized_model) {
            score += 50;
            matched = true;
        }
    }

    let mut token_hits = 0;
    let mut token_score = 0;
    let mut search_pos = 0;
    let mut ordered = true;

    for token in &query.tokens {
        if lower_model.contains(token.as_str()) {
            token_hits += 1;
            token_score += 20;
        }

        if ordered {
            match lower_model[search_pos..].find(token.as_str()) {
                Some(next) => search_pos += next + token.len(),
                None => ordered = false,
            }
        }
    }

    if token_hits > 0 {
        score += token_score;
        matched = true;
        if token_hits == query.tokens.len() {
            score += 40;
            if ordered && query.tokens.len() > 1 {
                score += 20;
            }
        }
    }

    matched.then_some(score)
}

/// Lowercase and keep only letters and digits.
fn normalize_for_search(s: &str) -> String {
    s.to_lowercase()
        .chars()
        .filter(|c| c.is_alphanumeric())
        .collect()
}

/// Lowercased tokens split on any non-alphanumeric run.
fn split_search_tokens(s: &str) -> Vec<String> {
    s.to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Whether `query` appears in `target` as a (not necessarily contiguous)
/// subsequence.
fn is_subsequence(query: &str, target: &str) -> bool {
    let mut remaining = query.chars().peekable();
    for c in target.chars() {
        if remaining.peek() == Some(&c) {
            remaining.next();
        }
    }
    remaining.peek().is_none()
}

/// Reorder `models` so that saved entries come first.
///
/// Order within each partition is preserved.
#[must_use]
pub fn pin_saved_models(models: Vec<String>, saved: &BTreeSet<String>) -> Vec<String> {
    if models.is_empty() || saved.is_empty() {
        return models;
    }

    let (mut pinned, others): (Vec<_>, Vec<_>) =
        models.into_iter().partition(|m| saved.contains(m));
    pinned.extend(others);
    pinned
}

#[cfg(test)]
mod tests {
    use super::*;

    fn models(ids: &[&str]) -> Vec<String> {
        ids.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn blank_query_returns_everything() {
        let all = models(&["a/one", "b/two"]);
        assert_eq!(filter_models(&all, "   "), all);
    }

    #[test]
    fn substring_match_ranks_first() {
        let all = models(&[
            "openrouter/z-ai/glm-5",
            "openrouter/qwen/qwen3",
            "opencode/glm-lite",
        ]);
        let hits = filter_models(&all, "glm");
        assert_eq!(hits[0], "opencode/glm-lite");
        assert_eq!(hits[1], "openrouter/z-ai/glm-5");
        assert!(!hits.contains(&"openrouter/qwen/qwen3".to_string()));
    }

    #[test]
    fn punctuation_insensitive_match() {
        let all = models(&["openrouter/z-ai/glm-5"]);
        let hits = filter_models(&all, "zai glm5");
        assert_eq!(hits, all);
    }

    #[test]
    fn non_matching_models_are_dropped() {
        let all = models(&["anthropic/claude-sonnet-4", "openai/gpt-5"]);
        let hits = filter_models(&all, "mistral");
        assert!(hits.is_empty());
    }

    #[test]
    fn ties_break_on_model_id() {
        let all = models(&["b/glm", "a/glm"]);
        let hits = filter_models(&all, "glm");
        assert_eq!(hits, models(&["a/glm", "b/glm"]));
    }

    #[test]
    fn ordered_multi_token_beats_unordered() {
        let all = models(&["openrouter/glm-z-ai", "openrouter/z-ai/glm-5"]);
        let hits = filter_models(&all, "z-ai glm");
        assert_eq!(hits[0], "openrouter/z-ai/glm-5");
    }

    #[test]
    fn subsequence_counts_as_match() {
        let all = models(&["openrouter/qwen/qwen3-coder"]);
        let hits = filter_models(&all, "qw3cdr");
        assert_eq!(hits, all);
    }

    #[test]
    fn pin_moves_saved_to_front_keeping_order() {
        let saved: BTreeSet<String> = ["b/two".to_string(), "d/four".to_string()].into();
        let pinned = pin_saved_models(models(&["a/one", "b/two", "c/three", "d/four"]), &saved);
        assert_eq!(pinned, models(&["b/two", "d/four", "a/one", "c/three"]));
    }

    #[test]
    fn pin_with_no_saved_is_identity() {
        let saved = BTreeSet::new();
        let all = models(&["a/one", "b/two"]);
        assert_eq!(pin_saved_models(all.clone(), &saved), all);
    }

    #[test]
    fn is_subsequence_basics() {
        assert!(is_subsequence("", "anything"));
        assert!(is_subsequence("ace", "abcde"));
        assert!(!is_subsequence("aec", "abcde"));
    }
}

//! The `result.json` record written at every terminal eval outcome.

use serde::{Deserialize, Serialize};

fn is_zero(n: &u32) -> bool {
    *n == 0
}

/// Durable description of one eval outcome.
///
/// `prompt_number` 0 means "unknown" and is omitted on disk, as is an empty
/// `error`. `cost_usd` is only ever produced by external tooling; we accept
/// it on read and never write it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvalRecord {
    pub prompt: String,
    #[serde(default, skip_serializing_if = "is_zero")]
    pub prompt_number: u32,
    pub model: String,
    pub success: bool,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub error: String,
    pub duration_seconds: u64,
    pub completed_at: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
}

/// One scanned subdirectory of `evals/`.
///
/// `result` is `None` when `result.json` is missing or unparseable; the
/// folder is still listed so it can be resumed.
#[derive(Debug, Clone)]
pub struct EvalFolder {
    /// Root-relative path, e.g. `evals/2026-02-16_09-35-43_p7_0_model`.
    pub path: String,
    pub prompt: String,
    pub prompt_number: u32,
    pub result: Option<EvalRecord>,
}

impl EvalFolder {
    /// The folder name without the `evals/` prefix.
    #[must_use]
    pub fn name(&self) -> &str {
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn zero_prompt_number_and_empty_error_are_omitted() {
        let record = EvalRecord {
            prompt: "P".to_string(),
            prompt_number: 0,
            model: "openrouter/a".to_string(),
            success: true,
            error: String::new(),
            duration_seconds: 12,
            completed_at: "2026-02-16T09:35:43Z".to_string(),
            cost_usd: None,
        };
        let json = serde_json::to_string(&record).unwrap();
        assert!(!json.contains("prompt_number"));
        assert!(!json.contains("error"));
        assert!(!json.contains("cost_usd"));
    }

    #[test]
    fn cost_usd_is_accepted_on_read() {
        let json = r#"{
            "prompt": "P",
            "prompt_number": 2,
            "model": "openrouter/a",
            "success": false,
            "error": "boom",
            "duration_seconds": 3,
            "completed_at": "2026-02-16T09:35:43Z",
            "cost_usd": 0.42
        }"#;
        let record: EvalRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.cost_usd, Some(0.42));
        assert_eq!(record.prompt_number, 2);
        assert_eq!(record.error, "boom");
    }

    #[test]
    fn roundtrip_preserves_outcome_fields() {
        let record = EvalRecord {
            prompt: "write a parser".to_string(),
            prompt_number: 7,
            model: "openrouter/z-ai/glm-5".to_string(),
            success: false,
            error: "no agent activity for 180s".to_string(),
            duration_seconds: 181,
            completed_at: "2026-02-16T09:38:44Z".to_string(),
            cost_usd: None,
        };
        let json = serde_json::to_string_pretty(&record).unwrap();
        let back: EvalRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn folder_name_strips_prefix() {
        let folder = EvalFolder {
            path: "evals/x_p1_0_m".to_string(),
            prompt: String::new(),
            prompt_number: 1,
            result: None,
        };
        assert_eq!(folder.name(), "x_p1_0_m");
    }
}

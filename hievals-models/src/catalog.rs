//! Provider catalog fetched from a running agent daemon.
//!
//! The catalog is an ephemeral per-invocation snapshot of
//! `GET /config/providers`; it is never persisted.

use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;
use tracing::debug;

use crate::envelope::Envelope;
use crate::error::{Error, Result};
use crate::id::split_model_id;

/// How much of an error body to keep when reporting a failed fetch.
const ERROR_BODY_LIMIT: usize = 1024;

/// A single provider entry in the daemon catalog.
///
/// Model entries carry provider-specific metadata we never inspect; only the
/// IDs (the map keys) matter here.
#[derive(Debug, Clone, Deserialize)]
pub struct Provider {
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub models: BTreeMap<String, serde_json::Value>,
}

/// Snapshot of every provider the daemon knows about.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProviderCatalog {
    pub providers: Vec<Provider>,
    /// Default model per provider ID, when the provider declares one.
    #[serde(default)]
    pub default: HashMap<String, String>,
}

impl ProviderCatalog {
    /// All fully-qualified `provider/model` IDs, sorted.
    #[must_use]
    pub fn flatten_model_ids(&self) -> Vec<String> {
        let mut models: Vec<String> = self
            .providers
            .iter()
            .flat_map(|p| p.models.keys().map(|m| format!("{}/{m}", p.id)))
            .collect();
        models.sort();
        models
    }

    /// Whether a fully-qualified model ID exists in the catalog.
    #[must_use]
    pub fn contains(&self, full_model_id: &str) -> bool {
        if !full_model_id.contains('/') {
            return false;
        }
        let (provider_id, model_id) = split_model_id(full_model_id);
        if provider_id.is_empty() || model_id.is_empty() {
            return false;
        }
        self.providers
            .iter()
            .find(|p| p.id == provider_id)
            .is_some_and(|p| p.models.contains_key(model_id))
    }

    /// The declared default model for a provider, if any.
    #[must_use]
    pub fn default_model(&self, provider_id: &str) -> Option<&str> {
        self.default.get(provider_id).map(String::as_str)
    }
}

/// Fetch the provider catalog from a daemon at `base_url`.
///
/// Accepts both the direct and the `data`-wrapped response shape.
pub async fn fetch_providers(client: &reqwest::Client, base_url: &str) -> Result<ProviderCatalog> {
    let resp = client.get(format!("{base_url}/config/providers")).send().await?;

    let status = resp.status();
    let body = resp.bytes().await?;

    if !status.is_success() {
        let text = String::from_utf8_lossy(&body[..body.len().min(ERROR_BODY_LIMIT)])
            .trim()
            .to_string();
        return Err(Error::Status {
            status: status.as_u16(),
            body: text,
        });
    }

    let envelope: Envelope<ProviderCatalog> = serde_json::from_slice(&body)?;
    let catalog = envelope.into_inner();
    debug!(providers = catalog.providers.len(), "fetched provider catalog");
    Ok(catalog)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_catalog() -> ProviderCatalog {
        serde_json::from_str(
            r#"{
                "providers": [
                    {"id": "openrouter", "name": "OpenRouter",
                     "models": {"z-ai/glm-5": {}, "qwen/qwen3": {}}},
                    {"id": "opencode", "name": "OpenCode",
                     "models": {"kimi-k2.5-free": {}}}
                ],
                "default": {"opencode": "kimi-k2.5-free"}
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn wrapped_catalog_parses() {
        let body = r#"{"data": {"providers": [{"id": "p", "models": {"m": {}}}]}}"#;
        let envelope: Envelope<ProviderCatalog> = serde_json::from_str(body).unwrap();
        let catalog = envelope.into_inner();
        assert_eq!(catalog.providers.len(), 1);
        assert_eq!(catalog.providers[0].id, "p");
    }

    #[test]
    fn flatten_sorts_full_ids() {
        let ids = sample_catalog().flatten_model_ids();
        assert_eq!(
            ids,
            vec![
                "opencode/kimi-k2.5-free",
                "openrouter/qwen/qwen3",
                "openrouter/z-ai/glm-5",
            ]
        );
    }

    #[test]
    fn contains_requires_qualified_id() {
        let catalog = sample_catalog();
        assert!(catalog.contains("openrouter/z-ai/glm-5"));
        assert!(catalog.contains("opencode/kimi-k2.5-free"));
        assert!(!catalog.contains("z-ai/glm-5"));
        assert!(!catalog.contains("kimi-k2.5-free"));
        assert!(!catalog.contains("openrouter/missing"));
    }

    #[test]
    fn default_model_lookup() {
        let catalog = sample_catalog();
        assert_eq!(catalog.default_model("opencode"), Some("kimi-k2.5-free"));
        assert_eq!(catalog.default_model("openrouter"), None);
    }
}

//! `hievals models` — browse, check and save models.
//!
//! The catalog comes from a running agent daemon (one is started temporarily
//! when none answers). Saved favourites are pinned first everywhere they
//! appear.

use std::collections::BTreeSet;

use anyhow::{Context, Result, bail};
use clap::{Args, Subcommand};
use comfy_table::{ContentArrangement, Table, presets::UTF8_FULL_CONDENSED};
use tracing::debug;

use hievals_engine::{EngineConfig, fetch_catalog};
use hievals_models::{ProviderCatalog, filter_models, normalize_model_id, pin_saved_models};
use hievals_store::{ArtifactStore, SAVED_MODELS_FILE};

use crate::interactive;

/// Models command arguments.
#[derive(Args, Debug)]
pub struct ModelsArgs {
    #[command(subcommand)]
    pub command: Option<ModelsCommands>,
}

/// Models subcommands; none means the interactive search-and-save flow.
#[derive(Subcommand, Debug)]
pub enum ModelsCommands {
    /// List every provider and model the daemon knows about
    List,
    /// Show saved model favourites
    Saved,
    /// Save a model for reuse (interactive picker without an argument)
    Save {
        /// Fully-qualified model (e.g. openrouter/z-ai/glm-5)
        model: Option<String>,
    },
    /// Check whether a model is available, with suggestions when it is not
    Check {
        /// Model to look up; bare names are assumed to be on openrouter
        model: String,
    },
}

pub async fn run(args: ModelsArgs) -> Result<()> {
    let store = ArtifactStore::new(".");
    let config = EngineConfig::default();

    match args.command {
        None => interactive_save(&store, &config).await,
        Some(ModelsCommands::List) => list(&store, &config).await,
        Some(ModelsCommands::Saved) => saved(&store),
        Some(ModelsCommands::Save { model }) => save(&store, &config, model).await,
        Some(ModelsCommands::Check { model }) => check(&store, &config, &model).await,
    }
}

/// Search the catalog, multi-select models, merge them into the favourites.
async fn interactive_save(store: &ArtifactStore, config: &EngineConfig) -> Result<()> {
    let catalog = fetch_catalog(config)
        .await
        .context("fetching providers/models")?;
    let all_models = catalog.flatten_model_ids();
    debug!(models = all_models.len(), "catalog fetched");
    if all_models.is_empty() {
        bail!("no models available");
    }

    let saved_set = store.saved_model_set().unwrap_or_default();

    let selected = loop {
        let Some(query) =
            interactive::input("Search models (leave empty to show all)")?
        else {
            return Ok(());
        };

        let filtered = filter_models(&all_models, &query);
        if filtered.is_empty() {
            eprintln!("No models matched {query:?}. Try another search.");
            continue;
        }
        let pinned = pin_saved_models(filtered, &saved_set);

        let labels: Vec<String> = pinned
            .iter()
            .map(|model| saved_label(&saved_set, model))
            .collect();
        let title = format!(
            "Select model(s) to save ({}/{} shown, saved pinned first)",
            pinned.len(),
            all_models.len()
        );
        let Some(picked) = interactive::multi_select(&title, &labels)? else {
            return Ok(());
        };

        break picked.into_iter().map(|i| pinned[i].clone()).collect::<Vec<_>>();
    };

    if selected.is_empty() {
        println!("No models selected.");
        return Ok(());
    }

    merge_into_saved(store, &selected)
}

/// Print the full catalog grouped by provider.
async fn list(store: &ArtifactStore, config: &EngineConfig) -> Result<()> {
    let catalog = fetch_catalog(config)
        .await
        .context("fetching providers/models")?;
    if catalog.providers.is_empty() {
        println!("No providers returned by the agent daemon.");
        return Ok(());
    }

    let saved_set = store.saved_model_set().unwrap_or_default();

    let mut providers = catalog.providers.clone();
    providers.sort_by(|a, b| a.id.cmp(&b.id));

    println!("Available providers and model IDs:");
    for provider in &providers {
        let model_ids: Vec<String> = provider.models.keys().cloned().collect();
        let full_ids: Vec<String> = model_ids
            .iter()
            .map(|m| format!("{}/{m}", provider.id))
            .collect();
        let ordered = pin_saved_models(full_ids, &saved_set);

        match catalog.default_model(&provider.id) {
            Some(default) => println!(
                "\n- {} ({} model(s), default: {default})",
                provider.id,
                ordered.len()
            ),
            None => println!("\n- {} ({} model(s))", provider.id, ordered.len()),
        }

        for full_id in &ordered {
            println!("  {}", saved_label(&saved_set, full_id));
        }
    }

    Ok(())
}

/// Print the favourites with 1-based numbering.
fn saved(store: &ArtifactStore) -> Result<()> {
    let saved = store.load_saved_models().context("loading saved models")?;
    if saved.is_empty() {
        println!(
            "No saved models yet. Use 'hievals models save <provider/model>' to add one."
        );
        return Ok(());
    }

    let mut table = Table::new();
    table.load_preset(UTF8_FULL_CONDENSED);
    table.set_content_arrangement(ContentArrangement::Dynamic);
    table.set_header(vec!["#", "Model"]);
    for (i, model) in saved.iter().enumerate() {
        table.add_row(vec![(i + 1).to_string(), model.clone()]);
    }
    println!("{table}");
    Ok(())
}

/// Save one model after verifying it against the catalog.
async fn save(
    store: &ArtifactStore,
    config: &EngineConfig,
    model: Option<String>,
) -> Result<()> {
    let Some(model) = model else {
        return interactive_save(store, config).await;
    };

    let model = normalize_model_id(model.trim());
    if model.is_empty() {
        bail!("model ID cannot be empty");
    }

    let catalog = fetch_catalog(config)
        .await
        .context("fetching providers/models")?;
    if !catalog.contains(&model) {
        bail!("unknown model: {model}");
    }

    merge_into_saved(store, &[model])
}

/// Check availability; on a miss, print ranked suggestions and exit non-zero.
async fn check(store: &ArtifactStore, config: &EngineConfig, model: &str) -> Result<()> {
    let model = normalize_model_id(model.trim());
    if model.is_empty() {
        bail!("model ID cannot be empty");
    }

    let catalog = fetch_catalog(config)
        .await
        .context("fetching providers/models")?;
    let saved_set = store.saved_model_set().unwrap_or_default();

    if catalog.contains(&model) {
        println!("Available: {model}");
        if saved_set.contains(&model) {
            println!("Pinned: yes (saved in {SAVED_MODELS_FILE})");
        } else {
            println!("Pinned: no (run 'hievals models save {model}' to pin it)");
        }
        return Ok(());
    }

    println!("Not available: {model}");
    print_suggestions(&catalog, &saved_set, &model);
    std::process::exit(1);
}

fn print_suggestions(catalog: &ProviderCatalog, saved_set: &BTreeSet<String>, query: &str) {
    let suggestions = pin_saved_models(
        filter_models(&catalog.flatten_model_ids(), query),
        saved_set,
    );
    if suggestions.is_empty() {
        return;
    }

    println!("\nClosest matches:");
    for model in suggestions.iter().take(8) {
        println!("  {}", saved_label(saved_set, model));
    }
}

fn saved_label(saved_set: &BTreeSet<String>, model: &str) -> String {
    if saved_set.contains(model) {
        format!("[saved] {model}")
    } else {
        model.to_string()
    }
}

/// Merge models into the favourites file, reporting how many were new.
fn merge_into_saved(store: &ArtifactStore, models: &[String]) -> Result<()> {
    let mut existing = store.load_saved_models().context("loading saved models")?;
    let mut set: BTreeSet<String> = existing.iter().cloned().collect();

    let mut added = 0;
    for model in models {
        if set.insert(model.clone()) {
            existing.push(model.clone());
            added += 1;
        }
    }

    if added == 0 {
        println!("No new models added. Saved models are already up to date in {SAVED_MODELS_FILE}.");
        return Ok(());
    }

    store
        .save_saved_models(&existing)
        .context("saving models")?;
    println!("Saved {added} model(s) to {SAVED_MODELS_FILE}.");
    Ok(())
}

//! Interactive terminal forms.
//!
//! Thin dialoguer wrappers with one shared convention: every function
//! returns `Ok(None)` when the user backs out, so commands can unwind
//! without treating cancellation as an error.

use anyhow::Result;
use dialoguer::theme::ColorfulTheme;
use dialoguer::{Confirm, Editor, Input, MultiSelect, Select};

use hievals_engine::{ModelCorrector, RunMode};
use hievals_store::ArtifactStore;

use crate::commands::Mode;

/// Longest prompt text accepted by the add/edit forms.
pub const PROMPT_CHAR_LIMIT: usize = 2000;

const CUSTOM_MODEL_CHOICE: &str = "Type a different model...";

fn theme() -> ColorfulTheme {
    ColorfulTheme::default()
}

/// Truncate text for one-line menu labels.
pub fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.replace('\n', " ");
    if flat.chars().count() <= max_chars {
        return flat;
    }
    let cut: String = flat.chars().take(max_chars.saturating_sub(3)).collect();
    format!("{cut}...")
}

/// Multi-select over prepared labels.
pub fn multi_select(title: &str, items: &[String]) -> Result<Option<Vec<usize>>> {
    Ok(MultiSelect::with_theme(&theme())
        .with_prompt(title)
        .items(items)
        .interact_opt()?)
}

/// Single select over prepared labels.
pub fn select(title: &str, items: &[String]) -> Result<Option<usize>> {
    Ok(Select::with_theme(&theme())
        .with_prompt(title)
        .items(items)
        .default(0)
        .interact_opt()?)
}

/// Yes/no confirmation.
pub fn confirm(title: &str) -> Result<Option<bool>> {
    Ok(Confirm::with_theme(&theme())
        .with_prompt(title)
        .default(false)
        .interact_opt()?)
}

/// One-line free-text input; empty input is allowed.
pub fn input(title: &str) -> Result<Option<String>> {
    let text: String = Input::with_theme(&theme())
        .with_prompt(title)
        .allow_empty(true)
        .interact_text()?;
    Ok(Some(text.trim().to_string()))
}

/// Multi-line text via $EDITOR; `None` when the user quits without saving.
pub fn edit_text(initial: &str) -> Result<Option<String>> {
    let edited = Editor::new().edit(initial)?;
    Ok(edited.map(|text| text.trim().to_string()))
}

/// Pick the execution mode.
pub fn select_mode(default: Mode) -> Result<Option<RunMode>> {
    let items = vec![
        "Parallel (run all at once)".to_string(),
        "Sequential (run one at a time)".to_string(),
    ];
    let default_index = match default {
        Mode::Parallel => 0,
        Mode::Sequential => 1,
    };
    let picked = Select::with_theme(&theme())
        .with_prompt("Execution mode")
        .items(&items)
        .default(default_index)
        .interact_opt()?;
    Ok(picked.map(|i| {
        if i == 0 {
            RunMode::Parallel
        } else {
            RunMode::Sequential
        }
    }))
}

/// Pick a model: saved favourites as a menu with a free-text escape hatch,
/// or plain input when nothing is saved. The returned string may be empty;
/// callers substitute their default.
pub fn select_model(store: &ArtifactStore, description: &str) -> Result<Option<String>> {
    let saved = store.load_saved_models().unwrap_or_default();

    if saved.is_empty() {
        return input(&format!("Model to use ({description})"));
    }

    let mut items = saved.clone();
    items.push(CUSTOM_MODEL_CHOICE.to_string());

    let Some(picked) = select(&format!("Model to use ({description})"), &items)? else {
        return Ok(None);
    };

    if picked < saved.len() {
        return Ok(Some(saved[picked].clone()));
    }
    input("Enter model ID")
}

/// Interactive model correction offered after a model-not-found failure.
///
/// Options: daemon suggestions first, then saved favourites, then free text.
pub struct DialoguerCorrector<'a> {
    store: &'a ArtifactStore,
}

impl<'a> DialoguerCorrector<'a> {
    pub fn new(store: &'a ArtifactStore) -> Self {
        Self { store }
    }
}

impl ModelCorrector for DialoguerCorrector<'_> {
    fn correct(&self, current_model: &str, suggestions: &[String]) -> Option<String> {
        println!("\nModel not found: {current_model}");

        let saved = self.store.load_saved_models().unwrap_or_default();

        let mut seen = std::collections::HashSet::new();
        let mut options = Vec::new();
        let mut labels = Vec::new();
        for suggestion in suggestions {
            if !suggestion.is_empty() && seen.insert(suggestion.clone()) {
                labels.push(format!("{suggestion} (suggested)"));
                options.push(suggestion.clone());
            }
        }
        for model in &saved {
            if seen.insert(model.clone()) {
                labels.push(format!("{model} (saved)"));
                options.push(model.clone());
            }
        }
        labels.push(CUSTOM_MODEL_CHOICE.to_string());

        let picked = select("Pick the correct model", &labels).ok().flatten()?;
        if picked < options.len() {
            return Some(options[picked].clone());
        }

        input("Enter model ID").ok().flatten().filter(|m| !m.is_empty())
    }
}

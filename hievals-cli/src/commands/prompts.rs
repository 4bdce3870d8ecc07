//! Prompt library CRUD: `list`, `add`, `edit`, `remove`.

use anyhow::{Context, Result, bail};

use hievals_store::{ArtifactStore, PROMPTS_FILE};

use crate::interactive::{self, PROMPT_CHAR_LIMIT};

pub fn list() -> Result<()> {
    let store = ArtifactStore::new(".");
    let prompts = store.load_prompts().context("loading prompts")?;

    if prompts.is_empty() {
        println!("No prompts found. Use 'hievals add' to add one.");
        return Ok(());
    }

    println!("Prompts in {PROMPTS_FILE}:\n");
    for (i, prompt) in prompts.iter().enumerate() {
        println!("  {}. {}", i + 1, interactive::preview(prompt, 80));
    }
    println!("\nTotal: {} prompt(s)", prompts.len());
    Ok(())
}

pub fn add() -> Result<()> {
    let store = ArtifactStore::new(".");

    let Some(text) = interactive::edit_text("")? else {
        return Ok(());
    };
    let text = validate_prompt(text)?;

    let mut prompts = store.load_prompts().context("loading prompts")?;
    prompts.push(text);
    store.save_prompts(&prompts).context("saving prompts")?;

    println!("Added prompt #{}", prompts.len());
    Ok(())
}

pub fn edit() -> Result<()> {
    let store = ArtifactStore::new(".");
    let mut prompts = store.load_prompts().context("loading prompts")?;

    if prompts.is_empty() {
        println!("No prompts to edit. Use 'hievals add' to add one.");
        return Ok(());
    }

    let Some(index) = select_prompt("Select a prompt to edit", &prompts)? else {
        return Ok(());
    };

    let Some(text) = interactive::edit_text(&prompts[index])? else {
        return Ok(());
    };
    prompts[index] = validate_prompt(text)?;
    store.save_prompts(&prompts).context("saving prompts")?;

    println!("Updated prompt #{}", index + 1);
    Ok(())
}

pub fn remove() -> Result<()> {
    let store = ArtifactStore::new(".");
    let mut prompts = store.load_prompts().context("loading prompts")?;

    if prompts.is_empty() {
        println!("No prompts to remove.");
        return Ok(());
    }

    let Some(index) = select_prompt("Select a prompt to remove", &prompts)? else {
        return Ok(());
    };

    match interactive::confirm(&format!("Remove prompt #{}?", index + 1))? {
        Some(true) => {}
        _ => {
            println!("Cancelled.");
            return Ok(());
        }
    }

    prompts.remove(index);
    store.save_prompts(&prompts).context("saving prompts")?;

    println!("Removed prompt #{}", index + 1);
    Ok(())
}

fn select_prompt(title: &str, prompts: &[String]) -> Result<Option<usize>> {
    let labels: Vec<String> = prompts
        .iter()
        .enumerate()
        .map(|(i, p)| format!("{}. {}", i + 1, interactive::preview(p, 60)))
        .collect();
    interactive::select(title, &labels)
}

fn validate_prompt(text: String) -> Result<String> {
    if text.is_empty() {
        bail!("prompt cannot be empty");
    }
    if text.chars().count() > PROMPT_CHAR_LIMIT {
        bail!("prompt exceeds {PROMPT_CHAR_LIMIT} characters");
    }
    Ok(text)
}

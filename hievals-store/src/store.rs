//! Root-anchored access to every artifact hievals reads or writes.

use std::collections::{BTreeSet, HashMap};
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::folder::parse_prompt_number;
use crate::record::{EvalFolder, EvalRecord};

/// Prompt library file, a JSON array of strings.
pub const PROMPTS_FILE: &str = "prompts.json";

/// Saved model favourites, a sorted JSON array of `provider/model` IDs.
pub const SAVED_MODELS_FILE: &str = "saved-models.json";

/// Directory holding one subfolder per eval.
pub const EVALS_DIR: &str = "evals";

/// Reads and writes the prompt library, saved models and eval folders under
/// a fixed root directory (the working directory in normal use).
#[derive(Debug, Clone)]
pub struct ArtifactStore {
    root: PathBuf,
}

impl ArtifactStore {
    /// Create a store rooted at `root`.
    #[must_use]
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// The store's root directory.
    #[must_use]
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Absolute location of a root-relative artifact path.
    #[must_use]
    pub fn resolve(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    // === Prompt library ===

    /// Load the prompt list. A missing or empty file is an empty list; a
    /// malformed file is an error.
    pub fn load_prompts(&self) -> Result<Vec<String>> {
        self.read_json_list(PROMPTS_FILE)
    }

    /// Write the prompt list as pretty two-space-indented JSON.
    pub fn save_prompts(&self, prompts: &[String]) -> Result<()> {
        let data = serde_json::to_string_pretty(prompts).map_err(|source| Error::Encode {
            path: PROMPTS_FILE.to_string(),
            source,
        })?;
        fs::write(self.resolve(PROMPTS_FILE), data)?;
        Ok(())
    }

    // === Saved models ===

    /// Load the saved-model favourites.
    pub fn load_saved_models(&self) -> Result<Vec<String>> {
        self.read_json_list(SAVED_MODELS_FILE)
    }

    /// Write the favourites sorted, with a trailing newline.
    pub fn save_saved_models(&self, models: &[String]) -> Result<()> {
        let mut sorted = models.to_vec();
        sorted.sort();
        let mut data = serde_json::to_string_pretty(&sorted).map_err(|source| Error::Encode {
            path: SAVED_MODELS_FILE.to_string(),
            source,
        })?;
        data.push('\n');
        fs::write(self.resolve(SAVED_MODELS_FILE), data)?;
        Ok(())
    }

    /// The favourites as a set, for pinning and membership checks.
    pub fn saved_model_set(&self) -> Result<BTreeSet<String>> {
        Ok(self.load_saved_models()?.into_iter().collect())
    }

    // === Eval folders ===

    /// Create an eval folder with its `prompt.txt` and `package.json`
    /// scaffolding.
    pub fn setup_eval_folder(&self, rel: &str, prompt: &str) -> Result<()> {
        let dir = self.resolve(rel);
        fs::create_dir_all(&dir)?;

        let package = serde_json::json!({
            "name": rel.replace('/', "-"),
            "type": "module",
            "private": true,
        });
        let package_data =
            serde_json::to_string_pretty(&package).map_err(|source| Error::Encode {
                path: format!("{rel}/package.json"),
                source,
            })?;
        fs::write(dir.join("package.json"), package_data)?;
        fs::write(dir.join("prompt.txt"), prompt)?;
        Ok(())
    }

    /// Write (or overwrite) a folder's `result.json`.
    pub fn write_result(&self, rel: &str, record: &EvalRecord) -> Result<()> {
        let data = serde_json::to_string_pretty(record).map_err(|source| Error::Encode {
            path: format!("{rel}/result.json"),
            source,
        })?;
        fs::write(self.resolve(rel).join("result.json"), data)?;
        Ok(())
    }

    /// Read a folder's `result.json`.
    pub fn read_result(&self, rel: &str) -> Result<EvalRecord> {
        let path = self.resolve(rel).join("result.json");
        let data = fs::read(&path)?;
        serde_json::from_slice(&data).map_err(|source| Error::Parse {
            path: format!("{rel}/result.json"),
            source,
        })
    }

    /// Scan `evals/` for resumable folders.
    ///
    /// Every immediate subdirectory with a readable `prompt.txt` is listed.
    /// An unparseable `result.json` demotes the entry to "no result" rather
    /// than dropping it. Prompt numbers are recovered from the stored record,
    /// the folder name, or an exact prompt-text match, in that order.
    pub fn scan_eval_folders(&self) -> Result<Vec<EvalFolder>> {
        let evals = self.root.join(EVALS_DIR);
        let entries = match fs::read_dir(&evals) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let number_by_prompt = self.prompt_numbers_by_text();

        let mut names: Vec<String> = entries
            .filter_map(|entry| {
                let entry = entry.ok()?;
                entry
                    .file_type()
                    .ok()?
                    .is_dir()
                    .then(|| entry.file_name().to_string_lossy().into_owned())
            })
            .collect();
        names.sort();

        let mut folders = Vec::new();
        for name in names {
            let rel = format!("{EVALS_DIR}/{name}");
            let Ok(prompt) = fs::read_to_string(self.resolve(&rel).join("prompt.txt")) else {
                continue;
            };

            let result = match self.read_result(&rel) {
                Ok(record) => Some(record),
                Err(Error::Io(_)) => None,
                Err(e) => {
                    warn!(folder = %rel, error = %e, "ignoring unreadable result.json");
                    None
                }
            };

            let mut prompt_number = result.as_ref().map_or(0, |r| r.prompt_number);
            if prompt_number == 0 {
                prompt_number = parse_prompt_number(&name);
            }
            if prompt_number == 0
                && let Some(n) = number_by_prompt.get(prompt.as_str())
            {
                prompt_number = *n;
            }

            folders.push(EvalFolder {
                path: rel,
                prompt,
                prompt_number,
                result,
            });
        }

        debug!(count = folders.len(), "scanned eval folders");
        Ok(folders)
    }

    /// First 1-based position of each distinct prompt text.
    fn prompt_numbers_by_text(&self) -> HashMap<String, u32> {
        let Ok(prompts) = self.load_prompts() else {
            return HashMap::new();
        };

        let mut map = HashMap::with_capacity(prompts.len());
        for (i, prompt) in prompts.into_iter().enumerate() {
            map.entry(prompt).or_insert(i as u32 + 1);
        }
        map
    }

    fn read_json_list(&self, file: &str) -> Result<Vec<String>> {
        let data = match fs::read(self.resolve(file)) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        if data.is_empty() {
            return Ok(Vec::new());
        }

        serde_json::from_slice(&data).map_err(|source| Error::Parse {
            path: file.to_string(),
            source,
        })
    }
}

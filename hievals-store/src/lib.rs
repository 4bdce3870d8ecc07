//! On-disk artifacts for hievals.
//!
//! Three families of state live under the store root:
//!
//! - the **prompt library** (`prompts.json`)
//! - the **saved models** list (`saved-models.json`)
//! - per-eval **folders** (`evals/<timestamped-name>/`) holding the prompt,
//!   a `package.json` scaffold and the terminal `result.json`
//!
//! [`ArtifactStore`] anchors every path to one root so the engine and tests
//! can work against arbitrary directories.

mod error;
mod folder;
mod record;
mod store;

pub use error::{Error, Result};
pub use folder::{parse_prompt_number, sanitize_model_for_folder, timestamp_folder_name};
pub use record::{EvalFolder, EvalRecord};
pub use store::{ArtifactStore, EVALS_DIR, PROMPTS_FILE, SAVED_MODELS_FILE};

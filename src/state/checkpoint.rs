//! Checkpoint files
//!
//! State dicts persist as versioned JSON. The format carries only what the
//! state dict holds; a fine-tuned checkpoint is therefore just the filtered
//! state dict written through the same path.

use super::{StateDict, StateError};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

/// Current checkpoint format version
const VERSION: &str = "1.0";

#[derive(Serialize, Deserialize)]
struct Checkpoint {
    version: String,
    state: StateDict,
}

/// Save a state dict to a JSON checkpoint file.
pub fn save_checkpoint<P: AsRef<Path>>(state: &StateDict, path: P) -> Result<(), StateError> {
    let checkpoint = Checkpoint { version: VERSION.to_string(), state: state.clone() };
    let file = File::create(path)?;
    let writer = BufWriter::new(file);
    serde_json::to_writer_pretty(writer, &checkpoint)?;
    Ok(())
}

/// Load a state dict from a JSON checkpoint file.
pub fn load_checkpoint<P: AsRef<Path>>(path: P) -> Result<StateDict, StateError> {
    let file = File::open(path)?;
    let reader = BufReader::new(file);
    let checkpoint: Checkpoint = serde_json::from_reader(reader)?;

    if checkpoint.version != VERSION {
        return Err(StateError::Validation(format!(
            "Unsupported checkpoint version: {} (expected {})",
            checkpoint.version, VERSION
        )));
    }

    Ok(checkpoint.state)
}

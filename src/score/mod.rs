pub mod json;
pub mod ultrastar;

use anyhow::{Context, Result};
use std::path::Path;

use crate::notes::encode::NoteEvent;
use ultrastar::{EmitOptions, ScoreMetadata};

/// Write the score and, when asked, the JSON song data. Either both files
/// are left on disk or neither is.
pub fn write_outputs(
    score_path: &Path,
    song_data_path: Option<&Path>,
    events: &[NoteEvent],
    meta: &ScoreMetadata,
    opts: &EmitOptions,
) -> Result<()> {
    let song_data = match song_data_path {
        Some(path) => Some((path, json::render_song_data(meta.bpm, events)?)),
        None => None,
    };

    ultrastar::write_file(score_path, events, meta, opts)
        .with_context(|| format!("Failed to write score: {}", score_path.display()))?;

    if let Some((path, text)) = song_data {
        if let Err(err) = json::write_song_data(path, &text) {
            if let Err(rm) = std::fs::remove_file(score_path) {
                log::warn!("Failed to remove {}: {}", score_path.display(), rm);
            }
            return Err(err);
        }
    }
    Ok(())
}

use anyhow::{Context, Result};
use serde::Serialize;
use std::path::Path;

use crate::notes::encode::NoteEvent;

#[derive(Serialize)]
struct SongData<'a> {
    bpm: f64,
    total_beats: usize,
    events: &'a [NoteEvent],
}

/// Pretty-printed JSON of the event list.
pub fn render_song_data(bpm: f64, events: &[NoteEvent]) -> Result<String> {
    let data = SongData {
        bpm,
        total_beats: events.iter().map(|e| e.duration_beats).sum(),
        events,
    };
    serde_json::to_string_pretty(&data).context("Failed to serialize song data")
}

pub fn write_song_data(path: &Path, json: &str) -> Result<()> {
    std::fs::write(path, json)
        .with_context(|| format!("Failed to write song data: {}", path.display()))?;
    log::info!("Wrote song data to {}", path.display());
    Ok(())
}

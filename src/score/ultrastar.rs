use std::io::Write;
use std::path::Path;

use crate::error::ScoreResult;
use crate::notes::encode::{check_contiguous, NoteEvent};

/// Header fields of an UltraStar score.
#[derive(Clone, Debug)]
pub struct ScoreMetadata {
    pub title: String,
    pub artist: String,
    /// Audio file the score plays against, written as `#MP3`.
    pub source_ref: String,
    pub bpm: f64,
    pub gap_ms: u64,
}

/// Rendering switches for the note block.
#[derive(Clone, Debug)]
pub struct EmitOptions {
    /// Lyric token written on every note line.
    pub placeholder: String,
    /// Close the score with the `E` end marker.
    pub end_marker: bool,
}

impl Default for EmitOptions {
    fn default() -> Self {
        Self {
            placeholder: "ba".into(),
            end_marker: false,
        }
    }
}

/// Write the header and one `:` line per voiced event. Rests are implied by
/// the gaps between note lines.
pub fn emit<W: Write>(
    events: &[NoteEvent],
    meta: &ScoreMetadata,
    opts: &EmitOptions,
    out: &mut W,
) -> ScoreResult<()> {
    check_contiguous(events)?;

    writeln!(out, "#TITLE:{}", meta.title)?;
    writeln!(out, "#ARTIST:{}", meta.artist)?;
    writeln!(out, "#MP3:{}", meta.source_ref)?;
    writeln!(out, "#GAP:{}", meta.gap_ms)?;
    writeln!(out, "#BPM:{}", meta.bpm)?;

    for event in events {
        if let Some(note) = event.note_index {
            writeln!(
                out,
                ": {} {} {} {}",
                event.start_beat, event.duration_beats, note, opts.placeholder
            )?;
        }
    }

    if opts.end_marker {
        writeln!(out, "E")?;
    }
    Ok(())
}

/// Render the score to a string.
pub fn render(
    events: &[NoteEvent],
    meta: &ScoreMetadata,
    opts: &EmitOptions,
) -> ScoreResult<String> {
    let mut buf = Vec::new();
    emit(events, meta, opts, &mut buf)?;
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Write the score to `path`. The score is rendered in memory first, so a
/// malformed stream leaves nothing on disk.
pub fn write_file(
    path: &Path,
    events: &[NoteEvent],
    meta: &ScoreMetadata,
    opts: &EmitOptions,
) -> ScoreResult<()> {
    let text = render(events, meta, opts)?;
    std::fs::write(path, text)?;

    log::info!(
        "Wrote {} notes to {}",
        events.iter().filter(|e| e.voiced).count(),
        path.display()
    );
    Ok(())
}

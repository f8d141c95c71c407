use serde::Serialize;

use super::table::FrequencyTable;
use crate::error::{ScoreError, ScoreResult};

/// A run of beats sharing a voicing flag and, when voiced, a note index.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct NoteEvent {
    pub start_beat: usize,
    pub duration_beats: usize,
    /// `None` for rests.
    pub note_index: Option<usize>,
    pub voiced: bool,
}

impl NoteEvent {
    pub fn note(start_beat: usize, duration_beats: usize, note_index: usize) -> Self {
        Self {
            start_beat,
            duration_beats,
            note_index: Some(note_index),
            voiced: true,
        }
    }

    pub fn rest(start_beat: usize, duration_beats: usize) -> Self {
        Self {
            start_beat,
            duration_beats,
            note_index: None,
            voiced: false,
        }
    }

    pub fn end_beat(&self) -> usize {
        self.start_beat + self.duration_beats
    }
}

/// Run-length encode per-beat pitches into note events.
///
/// Consecutive voiced beats merge only while they quantize to exactly the same
/// note. Every unvoiced beat becomes its own one-beat rest.
pub fn encode(
    beat_frequencies: &[f64],
    voiced_mask: &[bool],
    table: &FrequencyTable,
) -> ScoreResult<Vec<NoteEvent>> {
    if beat_frequencies.len() != voiced_mask.len() {
        return Err(ScoreError::LengthMismatch {
            frequencies: beat_frequencies.len(),
            mask: voiced_mask.len(),
        });
    }

    let total_beats = voiced_mask.len();
    let mut events = Vec::new();
    let mut index = 0;

    while index < total_beats {
        if !voiced_mask[index] {
            events.push(NoteEvent::rest(index, 1));
            index += 1;
            continue;
        }

        let note = table.quantize(beat_frequencies[index]);
        let mut duration = 1;
        while index + duration < total_beats
            && voiced_mask[index + duration]
            && table.quantize(beat_frequencies[index + duration]) == note
        {
            duration += 1;
        }

        events.push(NoteEvent::note(index, duration, note));
        index += duration;
    }

    Ok(events)
}

/// Collapse adjacent rests into a single rest spanning the same beats.
pub fn merge_rests(events: Vec<NoteEvent>) -> Vec<NoteEvent> {
    let mut merged: Vec<NoteEvent> = Vec::with_capacity(events.len());
    for event in events {
        match merged.last_mut() {
            Some(prev) if !prev.voiced && !event.voiced => {
                prev.duration_beats += event.duration_beats;
            }
            _ => merged.push(event),
        }
    }
    merged
}

/// Check that `events` tile `[0, total)` with no gaps, overlaps or empty
/// events, returning the number of beats covered.
pub fn check_contiguous(events: &[NoteEvent]) -> ScoreResult<usize> {
    let mut expected = 0;
    for (position, event) in events.iter().enumerate() {
        if event.start_beat != expected {
            return Err(ScoreError::MalformedEventStream {
                position,
                reason: format!(
                    "starts at beat {}, expected beat {}",
                    event.start_beat, expected
                ),
            });
        }
        if event.duration_beats == 0 {
            return Err(ScoreError::MalformedEventStream {
                position,
                reason: "zero duration".into(),
            });
        }
        if event.voiced != event.note_index.is_some() {
            return Err(ScoreError::MalformedEventStream {
                position,
                reason: "voiced flag disagrees with note index".into(),
            });
        }
        expected = event.end_beat();
    }
    Ok(expected)
}

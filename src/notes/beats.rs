use crate::error::{ScoreError, ScoreResult};

/// Fixed-tempo beat grid covering a song.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BeatGrid {
    pub bpm: f64,
    pub song_length_seconds: f64,
}

impl BeatGrid {
    pub fn new(bpm: f64, song_length_seconds: f64) -> ScoreResult<Self> {
        if !(bpm.is_finite() && bpm > 0.0) {
            return Err(ScoreError::InvalidParameter { name: "bpm", value: bpm });
        }
        if !(song_length_seconds.is_finite() && song_length_seconds >= 0.0) {
            return Err(ScoreError::InvalidParameter {
                name: "song_length_seconds",
                value: song_length_seconds,
            });
        }
        Ok(Self {
            bpm,
            song_length_seconds,
        })
    }

    pub fn total_beats(&self) -> usize {
        (self.song_length_seconds * self.bpm / 60.0).floor() as usize
    }

    pub fn beats_per_second(&self) -> f64 {
        self.bpm / 60.0
    }

    /// Onset of beat `beat` in milliseconds.
    pub fn beat_time_ms(&self, beat: usize) -> f64 {
        (beat as f64 / self.beats_per_second()) * 1000.0
    }

    /// Beat containing `time_ms`.
    pub fn beat_at_ms(&self, time_ms: f64) -> usize {
        ((time_ms / 1000.0) * self.beats_per_second()).floor() as usize
    }
}

/// Point-sample `smoothed` at the onset of every beat.
///
/// With `clamp_tail` set, beats whose onset falls past the last raw sample
/// reuse the last sample; otherwise they fail with `OutOfRange`.
pub fn sample_beats(
    smoothed: &[f64],
    grid: &BeatGrid,
    raw_sample_period_ms: f64,
    clamp_tail: bool,
) -> ScoreResult<Vec<f64>> {
    if !(raw_sample_period_ms.is_finite() && raw_sample_period_ms > 0.0) {
        return Err(ScoreError::InvalidParameter {
            name: "raw_sample_period_ms",
            value: raw_sample_period_ms,
        });
    }
    if smoothed.is_empty() {
        return Err(ScoreError::EmptyInput { stage: "beat sampling" });
    }

    // Multiply before dividing so whole-sample onsets stay exact.
    let samples_per_minute = 60_000.0 / raw_sample_period_ms;
    let last = smoothed.len() - 1;
    let mut clamped = 0usize;

    let mut out = Vec::with_capacity(grid.total_beats());
    for beat in 0..grid.total_beats() {
        let idx = (beat as f64 * samples_per_minute / grid.bpm).floor() as usize;
        if idx > last {
            if !clamp_tail {
                return Err(ScoreError::OutOfRange {
                    beat,
                    index: idx,
                    len: smoothed.len(),
                });
            }
            clamped += 1;
        }
        out.push(smoothed[idx.min(last)]);
    }

    if clamped > 0 {
        log::warn!(
            "{} trailing beat(s) fell past the pitch series ({} samples), reused the last sample",
            clamped,
            smoothed.len()
        );
    }
    Ok(out)
}

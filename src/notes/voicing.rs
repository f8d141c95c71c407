use super::beats::BeatGrid;
use crate::error::{ScoreError, ScoreResult};

/// A non-silent stretch of the vocal track, in milliseconds.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Interval {
    pub start_ms: u64,
    pub end_ms: u64,
}

impl Interval {
    pub fn new(start_ms: u64, end_ms: u64) -> Self {
        Self { start_ms, end_ms }
    }
}

/// Mark every beat touched by a non-silent interval as voiced.
///
/// Intervals are taken in the order given and never merged. The beat holding
/// an interval's start is always marked; following beats are marked while
/// their onset is still before the interval's end. Beats past the end of the
/// grid are dropped.
pub fn segment(intervals: &[Interval], grid: &BeatGrid) -> ScoreResult<Vec<bool>> {
    let total_beats = grid.total_beats();
    let mut voiced = vec![false; total_beats];
    let mut overflow = 0usize;

    for (index, interval) in intervals.iter().enumerate() {
        if interval.end_ms < interval.start_ms {
            return Err(ScoreError::InvalidInterval {
                index,
                start_ms: interval.start_ms,
                end_ms: interval.end_ms,
            });
        }

        let start_beat = grid.beat_at_ms(interval.start_ms as f64);
        if start_beat >= total_beats {
            overflow += 1;
            continue;
        }
        voiced[start_beat] = true;

        let end = interval.end_ms as f64;
        let mut cursor = start_beat + 1;
        while cursor < total_beats && grid.beat_time_ms(cursor) < end {
            voiced[cursor] = true;
            cursor += 1;
        }
    }

    if overflow > 0 {
        log::warn!("{} non-silent interval(s) start after the last beat", overflow);
    }
    log::debug!(
        "Voiced beats: {}/{}",
        voiced.iter().filter(|&&v| v).count(),
        total_beats
    );
    Ok(voiced)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grid(bpm: f64, seconds: f64) -> BeatGrid {
        BeatGrid::new(bpm, seconds).unwrap()
    }

    #[test]
    fn no_intervals_means_all_rest() {
        let mask = segment(&[], &grid(120.0, 2.0)).unwrap();
        assert_eq!(mask, vec![false; 4]);
    }

    #[test]
    fn interval_covers_overlapping_beats() {
        // 120 BPM: beats at 0, 500, 1000, 1500ms
        let mask = segment(&[Interval::new(600, 1200)], &grid(120.0, 2.0)).unwrap();
        assert_eq!(mask, vec![false, true, true, false]);
    }

    #[test]
    fn end_on_beat_onset_is_exclusive() {
        let mask = segment(&[Interval::new(0, 1000)], &grid(120.0, 2.0)).unwrap();
        assert_eq!(mask, vec![true, true, false, false]);
    }

    #[test]
    fn start_beat_marked_even_for_empty_interval() {
        let mask = segment(&[Interval::new(1000, 1000)], &grid(120.0, 2.0)).unwrap();
        assert_eq!(mask, vec![false, false, true, false]);
    }

    #[test]
    fn intervals_past_the_song_are_clipped() {
        let mask = segment(
            &[Interval::new(1400, 9000), Interval::new(5000, 6000)],
            &grid(120.0, 2.0),
        )
        .unwrap();
        assert_eq!(mask, vec![false, false, true, true]);
    }

    #[test]
    fn reversed_interval_is_rejected() {
        let err = segment(
            &[Interval::new(0, 100), Interval::new(800, 700)],
            &grid(120.0, 2.0),
        )
        .unwrap_err();
        assert!(matches!(
            err,
            ScoreError::InvalidInterval { index: 1, start_ms: 800, end_ms: 700 }
        ));
    }
}

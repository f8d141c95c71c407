use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};

use super::decode::decode_audio;
use crate::notes::voicing::Interval;
use crate::pipeline::SilenceDetector;

/// Peak level after normalisation, in dBFS.
const NORMALIZE_HEADROOM_DB: f64 = -0.1;

#[derive(Clone, Debug)]
pub struct SilenceOptions {
    /// Shortest stretch that counts as silence.
    pub min_silence_ms: u64,
    /// RMS level (dBFS, after peak normalisation) at or below which a window is silent.
    pub threshold_db: f64,
    pub seek_step_ms: u64,
}

impl Default for SilenceOptions {
    fn default() -> Self {
        Self {
            min_silence_ms: 100,
            threshold_db: -25.0,
            seek_step_ms: 1,
        }
    }
}

/// Non-silent ranges of a peak-normalised vocal track, found by sliding an
/// RMS window over it.
pub struct EnergySilenceDetector {
    pub options: SilenceOptions,
}

impl SilenceDetector for EnergySilenceDetector {
    fn detect(&self, vocals: &Path) -> Result<Vec<Interval>> {
        let audio = decode_audio(vocals)?;
        detect_nonsilent(&audio.samples, audio.sample_rate, &self.options)
    }
}

/// Non-silent ranges listed one per line as `start_ms,end_ms`.
pub struct IntervalFile {
    pub path: PathBuf,
}

impl SilenceDetector for IntervalFile {
    fn detect(&self, _vocals: &Path) -> Result<Vec<Interval>> {
        let text = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read interval file: {}", self.path.display()))?;
        parse_intervals(&text)
            .with_context(|| format!("Invalid interval file: {}", self.path.display()))
    }
}

pub fn parse_intervals(text: &str) -> Result<Vec<Interval>> {
    let mut intervals = Vec::new();
    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        let Some((start, end)) = line.split_once(',') else {
            bail!("line {}: expected 'start_ms,end_ms'", line_no + 1);
        };
        let start_ms = start
            .trim()
            .parse::<u64>()
            .with_context(|| format!("line {}: bad start '{}'", line_no + 1, start.trim()))?;
        let end_ms = end
            .trim()
            .parse::<u64>()
            .with_context(|| format!("line {}: bad end '{}'", line_no + 1, end.trim()))?;
        intervals.push(Interval::new(start_ms, end_ms));
    }
    Ok(intervals)
}

/// Split `samples` into non-silent millisecond ranges.
///
/// A window of `min_silence_ms` starting at each `seek_step_ms` is silent when
/// its RMS is at or below the threshold. Overlapping silent windows join into
/// silent ranges, and whatever lies between them is non-silent.
pub fn detect_nonsilent(
    samples: &[f32],
    sample_rate: u32,
    opts: &SilenceOptions,
) -> Result<Vec<Interval>> {
    if sample_rate == 0 {
        bail!("sample rate is zero");
    }
    if opts.min_silence_ms == 0 || opts.seek_step_ms == 0 {
        bail!("silence window and seek step must be at least 1ms");
    }

    let energy = ms_energy(samples, sample_rate);
    let len_ms = energy.len() as u64;
    let silent = silent_ranges(&energy, sample_rate, opts);

    if silent.is_empty() {
        return Ok(if len_ms == 0 { Vec::new() } else { vec![Interval::new(0, len_ms)] });
    }
    if silent.len() == 1 && silent[0] == Interval::new(0, len_ms) {
        return Ok(Vec::new());
    }

    let mut nonsilent = Vec::new();
    let mut prev_end = 0;
    for range in &silent {
        nonsilent.push(Interval::new(prev_end, range.start_ms));
        prev_end = range.end_ms;
    }
    if prev_end != len_ms {
        nonsilent.push(Interval::new(prev_end, len_ms));
    }
    nonsilent.retain(|r| r.end_ms > r.start_ms);

    log::debug!(
        "Silence detection: {} silent ranges, {} non-silent over {}ms",
        silent.len(),
        nonsilent.len(),
        len_ms
    );
    Ok(nonsilent)
}

/// Energy of each whole millisecond of peak-normalised audio.
fn ms_energy(samples: &[f32], sample_rate: u32) -> Vec<f64> {
    let peak = samples.iter().fold(0.0f32, |m, s| m.max(s.abs())) as f64;
    let gain = if peak > 0.0 {
        10f64.powf(NORMALIZE_HEADROOM_DB / 20.0) / peak
    } else {
        1.0
    };

    let len_ms = samples.len() as u64 * 1000 / sample_rate as u64;
    (0..len_ms)
        .map(|ms| {
            let start = (ms * sample_rate as u64 / 1000) as usize;
            let end = ((ms + 1) * sample_rate as u64 / 1000) as usize;
            samples[start..end.min(samples.len())]
                .iter()
                .map(|&s| {
                    let v = s as f64 * gain;
                    v * v
                })
                .sum()
        })
        .collect()
}

fn silent_ranges(energy: &[f64], sample_rate: u32, opts: &SilenceOptions) -> Vec<Interval> {
    let len_ms = energy.len() as u64;
    if len_ms < opts.min_silence_ms {
        return Vec::new();
    }

    let mut prefix = Vec::with_capacity(energy.len() + 1);
    prefix.push(0.0f64);
    for &e in energy {
        prefix.push(prefix[prefix.len() - 1] + e);
    }

    let threshold = 10f64.powf(opts.threshold_db / 20.0);
    let window_samples = opts.min_silence_ms as f64 * sample_rate as f64 / 1000.0;
    let is_silent = |start: u64| {
        let end = start + opts.min_silence_ms;
        let sum = prefix[end as usize] - prefix[start as usize];
        (sum / window_samples).sqrt() <= threshold
    };

    let last_start = len_ms - opts.min_silence_ms;
    let mut starts: Vec<u64> = (0..=last_start).step_by(opts.seek_step_ms as usize).collect();
    if last_start % opts.seek_step_ms != 0 {
        starts.push(last_start);
    }

    let mut ranges: Vec<Interval> = Vec::new();
    let mut current: Option<(u64, u64)> = None;
    for start in starts.into_iter().filter(|&s| is_silent(s)) {
        current = match current {
            Some((range_start, prev)) if start - prev <= opts.seek_step_ms => {
                Some((range_start, start))
            }
            Some((range_start, prev)) => {
                ranges.push(Interval::new(range_start, prev + opts.min_silence_ms));
                Some((start, start))
            }
            None => Some((start, start)),
        };
    }
    if let Some((range_start, prev)) = current {
        ranges.push(Interval::new(range_start, prev + opts.min_silence_ms));
    }
    ranges
}

use anyhow::{bail, Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::path::{Path, PathBuf};

use super::decode::decode_audio;
use crate::pipeline::{PitchEstimator, PitchTrack, RawPitchSample};

/// YIN runs on audio resampled down to this rate.
const ANALYSIS_RATE: u32 = 16_000;
const DEFAULT_PERIOD_MS: f64 = 10.0;

/// Pitch trace precomputed by an external estimator, stored as
/// `time,frequency,confidence` rows with times in seconds (CREPE's `f0.csv`).
pub struct CsvPitchTrack {
    pub path: PathBuf,
}

impl PitchEstimator for CsvPitchTrack {
    fn estimate(&self, _vocals: &Path) -> Result<PitchTrack> {
        let text = std::fs::read_to_string(&self.path)
            .with_context(|| format!("Failed to read pitch CSV: {}", self.path.display()))?;
        parse_pitch_csv(&text)
            .with_context(|| format!("Invalid pitch CSV: {}", self.path.display()))
    }
}

pub fn parse_pitch_csv(text: &str) -> Result<PitchTrack> {
    let mut samples = Vec::new();

    for (line_no, line) in text.lines().enumerate() {
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        let fields: Vec<&str> = line.split(',').map(str::trim).collect();

        let Ok(time_s) = fields[0].parse::<f64>() else {
            if samples.is_empty() {
                // header row
                continue;
            }
            bail!("line {}: bad time value '{}'", line_no + 1, fields[0]);
        };
        let frequency_hz: f64 = fields
            .get(1)
            .with_context(|| format!("line {}: missing frequency column", line_no + 1))?
            .parse::<f64>()
            .with_context(|| format!("line {}: bad frequency value", line_no + 1))?;
        let confidence: f64 = match fields.get(2) {
            Some(v) => v
                .parse::<f64>()
                .with_context(|| format!("line {}: bad confidence value", line_no + 1))?,
            None => 1.0,
        };

        samples.push(RawPitchSample {
            time_ms: time_s * 1000.0,
            frequency_hz,
            confidence,
        });
    }

    let period_ms = match samples.as_slice() {
        [first, second, ..] => {
            let period = ((second.time_ms - first.time_ms) * 1000.0).round() / 1000.0;
            if period <= 0.0 {
                bail!("pitch samples are not in increasing time order");
            }
            period
        }
        _ => DEFAULT_PERIOD_MS,
    };

    Ok(PitchTrack { samples, period_ms })
}

/// YIN fundamental-frequency estimator over fixed hops.
pub struct YinPitchEstimator {
    pub period_ms: f64,
    pub min_freq: f64,
    pub max_freq: f64,
    /// Absolute threshold on the normalized difference (0.10-0.20 is typical).
    pub threshold: f64,
}

impl Default for YinPitchEstimator {
    fn default() -> Self {
        Self {
            period_ms: DEFAULT_PERIOD_MS,
            min_freq: 65.0,
            max_freq: 1100.0,
            threshold: 0.15,
        }
    }
}

impl PitchEstimator for YinPitchEstimator {
    fn estimate(&self, vocals: &Path) -> Result<PitchTrack> {
        let audio = decode_audio(vocals)?;
        if audio.sample_rate > ANALYSIS_RATE {
            let resampled = resample(&audio.samples, audio.sample_rate, ANALYSIS_RATE)?;
            self.track(&resampled, ANALYSIS_RATE)
        } else {
            self.track(&audio.samples, audio.sample_rate)
        }
    }
}

impl YinPitchEstimator {
    pub fn track(&self, samples: &[f32], sample_rate: u32) -> Result<PitchTrack> {
        if samples.is_empty() {
            bail!("no audio samples to estimate pitch from");
        }
        if !(self.min_freq > 0.0 && self.max_freq > self.min_freq) {
            bail!("invalid pitch search range {}-{} Hz", self.min_freq, self.max_freq);
        }

        let sr = sample_rate as f64;
        let hop = ((sr * self.period_ms / 1000.0).round() as usize).max(1);
        let frame_len = 2 * (sr / self.min_freq).ceil() as usize;
        let n_frames = samples.len().div_ceil(hop);
        let period_ms = hop as f64 * 1000.0 / sr;

        let pb = ProgressBar::new(n_frames as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] {bar:40.cyan/blue} {pos}/{len} frames ({eta})")?
                .progress_chars("=>-"),
        );

        let estimates: Vec<(f64, f64)> = (0..n_frames)
            .into_par_iter()
            .map(|i| {
                let start = i * hop;
                let end = (start + frame_len).min(samples.len());
                let mut frame = vec![0.0f32; frame_len];
                frame[..end - start].copy_from_slice(&samples[start..end]);
                let estimate = self.yin_frame(&frame, sr);
                pb.inc(1);
                estimate
            })
            .collect();
        pb.finish_and_clear();

        let samples: Vec<RawPitchSample> = estimates
            .into_iter()
            .enumerate()
            .map(|(i, (frequency_hz, confidence))| RawPitchSample {
                time_ms: i as f64 * period_ms,
                frequency_hz,
                confidence,
            })
            .collect();

        log::debug!(
            "YIN: {} frames, hop {} samples, window {} samples",
            samples.len(),
            hop,
            frame_len
        );
        Ok(PitchTrack { samples, period_ms })
    }

    /// (frequency, confidence) for one frame; (0, 0) for silence.
    fn yin_frame(&self, frame: &[f32], sr: f64) -> (f64, f64) {
        let energy: f64 = frame.iter().map(|&s| (s as f64) * (s as f64)).sum();
        if energy < 1e-6 {
            return (0.0, 0.0);
        }

        let n = frame.len();
        let tau_min = ((sr / self.max_freq).floor() as usize).max(2);
        let tau_max = ((sr / self.min_freq).ceil() as usize).min(n / 2);
        if tau_min >= tau_max {
            return (0.0, 0.0);
        }
        let window = n - tau_max;

        let mut diff = vec![0.0f64; tau_max + 1];
        for (tau, d) in diff.iter_mut().enumerate().skip(1) {
            *d = (0..window)
                .map(|j| {
                    let delta = frame[j] as f64 - frame[j + tau] as f64;
                    delta * delta
                })
                .sum();
        }

        let mut cmnd = vec![1.0f64; tau_max + 1];
        let mut running_sum = 0.0;
        for tau in 1..=tau_max {
            running_sum += diff[tau];
            if running_sum > 0.0 {
                cmnd[tau] = diff[tau] * tau as f64 / running_sum;
            }
        }

        // First dip under the threshold, followed down to its floor; the
        // global minimum when nothing dips that low.
        let best_tau = match (tau_min..tau_max).find(|&tau| cmnd[tau] < self.threshold) {
            Some(mut tau) => {
                while tau + 1 < tau_max && cmnd[tau + 1] < cmnd[tau] {
                    tau += 1;
                }
                tau
            }
            None => (tau_min..tau_max)
                .min_by(|&a, &b| cmnd[a].total_cmp(&cmnd[b]))
                .unwrap_or(tau_min),
        };

        let refined = {
            let (a, b, c) = (cmnd[best_tau - 1], cmnd[best_tau], cmnd[best_tau + 1]);
            let denom = 2.0 * (a - 2.0 * b + c);
            if denom.abs() > 1e-12 {
                best_tau as f64 + (a - c) / denom
            } else {
                best_tau as f64
            }
        };

        (sr / refined, (1.0 - cmnd[best_tau]).clamp(0.0, 1.0))
    }
}

fn resample(samples: &[f32], from_rate: u32, to_rate: u32) -> Result<Vec<f32>> {
    use rubato::{
        Resampler, SincFixedIn, SincInterpolationParameters, SincInterpolationType, WindowFunction,
    };

    let params = SincInterpolationParameters {
        sinc_len: 256,
        f_cutoff: 0.95,
        interpolation: SincInterpolationType::Linear,
        oversampling_factor: 256,
        window: WindowFunction::BlackmanHarris2,
    };

    let ratio = to_rate as f64 / from_rate as f64;
    let mut resampler = SincFixedIn::<f32>::new(ratio, 2.0, params, samples.len(), 1)
        .context("Failed to create resampler")?;

    let output = resampler
        .process(&[samples.to_vec()], None)
        .context("Resampling failed")?;

    Ok(output.into_iter().next().unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::decode::tests::{sine, write_wav};

    fn median(values: &mut [f64]) -> f64 {
        values.sort_by(|a, b| a.total_cmp(b));
        values[values.len() / 2]
    }

    #[test]
    fn parses_crepe_csv() {
        let text = "time,frequency,confidence\n0.00,220.5,0.91\n0.01,221.0,0.88\n0.02,0.0,0.10\n";
        let track = parse_pitch_csv(text).unwrap();
        assert_eq!(track.samples.len(), 3);
        assert_eq!(track.period_ms, 10.0);
        assert_eq!(track.samples[1].frequency_hz, 221.0);
        assert_eq!(track.samples[2].confidence, 0.10);
        assert!((track.samples[2].time_ms - 20.0).abs() < 1e-9);
    }

    #[test]
    fn single_row_uses_default_period() {
        let track = parse_pitch_csv("0.0,440.0,1.0").unwrap();
        assert_eq!(track.samples.len(), 1);
        assert_eq!(track.period_ms, DEFAULT_PERIOD_MS);
    }

    #[test]
    fn rejects_garbage_rows() {
        assert!(parse_pitch_csv("time,frequency\n0.0,220\n0.01,abc\n").is_err());
        assert!(parse_pitch_csv("0.0,220\nnope,1\n").is_err());
        assert!(parse_pitch_csv("0.02,220\n0.01,220\n").is_err());
    }

    #[test]
    fn yin_finds_sine_pitch() {
        let yin = YinPitchEstimator::default();
        let track = yin.track(&sine(220.0, 1.0, 16_000, 0.5), 16_000).unwrap();
        assert_eq!(track.period_ms, 10.0);
        assert_eq!(track.samples.len(), 100);
        assert!(track.samples[10].confidence > 0.8);

        for freq in [220.0f64, 330.0, 440.0, 523.25] {
            let track = yin.track(&sine(freq as f32, 0.5, 16_000, 0.5), 16_000).unwrap();
            // Frames near the end run into zero padding
            let mut freqs: Vec<f64> = track.samples[..40].iter().map(|s| s.frequency_hz).collect();
            let f0 = median(&mut freqs);
            assert!((f0 - freq).abs() / freq < 0.01, "{} Hz read as {}", freq, f0);
        }
    }

    #[test]
    fn yin_reports_silence_as_zero() {
        let yin = YinPitchEstimator::default();
        let track = yin.track(&vec![0.0; 8_000], 16_000).unwrap();
        assert!(track.samples.iter().all(|s| s.frequency_hz == 0.0 && s.confidence == 0.0));
    }

    #[test]
    fn yin_reads_wav() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocals.wav");
        write_wav(&path, &sine(330.0, 0.5, 16_000, 0.5), 16_000);

        let track = YinPitchEstimator::default().estimate(&path).unwrap();
        let mut freqs: Vec<f64> = track.samples[..30].iter().map(|s| s.frequency_hz).collect();
        let f0 = median(&mut freqs);
        assert!((f0 - 330.0).abs() / 330.0 < 0.01, "got {}", f0);
    }
}

use anyhow::Result;
use rustfft::{num_complex::Complex, FftPlanner};
use std::path::Path;

use super::decode::decode_audio;
use crate::pipeline::TempoEstimator;

const FFT_SIZE: usize = 2048;
const HOP_SIZE: usize = 1024;
const DEFAULT_BPM: f32 = 120.0;

/// Tempo supplied by the user.
pub struct FixedTempo(pub f64);

impl TempoEstimator for FixedTempo {
    fn estimate_bpm(&self, _song: &Path) -> Result<f64> {
        Ok(self.0)
    }
}

/// Median inter-onset interval of spectral-flux peaks.
pub struct OnsetTempoEstimator;

impl TempoEstimator for OnsetTempoEstimator {
    fn estimate_bpm(&self, song: &Path) -> Result<f64> {
        let audio = decode_audio(song)?;
        let flux = spectral_flux(&audio.samples, audio.sample_rate);
        let onsets = detect_onsets(&flux);
        let bpm = estimate_tempo(&onsets);
        log::debug!("Onsets: {}, tempo {:.1} BPM", onsets.len(), bpm);
        Ok(bpm as f64)
    }
}

/// (time, flux) per hop.
fn spectral_flux(samples: &[f32], sample_rate: u32) -> Vec<(f32, f32)> {
    let mut planner = FftPlanner::<f32>::new();
    let fft = planner.plan_fft_forward(FFT_SIZE);
    let hann = hann_window(FFT_SIZE);

    let mut prev_magnitudes = vec![0.0f32; FFT_SIZE / 2];
    let mut flux_values = Vec::new();

    let mut pos = 0;
    while pos + FFT_SIZE <= samples.len() {
        let mut buffer: Vec<Complex<f32>> = samples[pos..pos + FFT_SIZE]
            .iter()
            .zip(hann.iter())
            .map(|(&s, &w)| Complex::new(s * w, 0.0))
            .collect();
        fft.process(&mut buffer);

        let magnitudes: Vec<f32> = buffer[..FFT_SIZE / 2].iter().map(|c| c.norm()).collect();
        let flux: f32 = magnitudes
            .iter()
            .zip(prev_magnitudes.iter())
            .map(|(cur, prev)| (cur - prev).max(0.0))
            .sum();

        flux_values.push((pos as f32 / sample_rate as f32, flux));
        prev_magnitudes = magnitudes;
        pos += HOP_SIZE;
    }
    flux_values
}

/// Local flux peaks above an adaptive threshold, at least 100ms apart.
fn detect_onsets(flux_values: &[(f32, f32)]) -> Vec<f32> {
    let window = 20;
    let mut onsets: Vec<f32> = Vec::new();

    for i in 0..flux_values.len() {
        let start = i.saturating_sub(window);
        let end = (i + window + 1).min(flux_values.len());
        let local_mean: f32 =
            flux_values[start..end].iter().map(|(_, f)| f).sum::<f32>() / (end - start) as f32;

        let (time, flux) = flux_values[i];
        if flux <= local_mean * 1.5 + 0.01 {
            continue;
        }

        let is_peak = (i == 0 || flux >= flux_values[i - 1].1)
            && (i == flux_values.len() - 1 || flux >= flux_values[i + 1].1);
        let far_enough = onsets.last().map_or(true, |&last| time - last > 0.1);

        if is_peak && far_enough {
            onsets.push(time);
        }
    }
    onsets
}

fn estimate_tempo(onsets: &[f32]) -> f32 {
    // 60-200 BPM
    let mut intervals: Vec<f32> = onsets
        .windows(2)
        .map(|w| w[1] - w[0])
        .filter(|&i| (0.3..=1.0).contains(&i))
        .collect();

    if intervals.is_empty() {
        log::warn!("Too few regular onsets, assuming {} BPM", DEFAULT_BPM);
        return DEFAULT_BPM;
    }

    intervals.sort_by(|a, b| a.total_cmp(b));
    60.0 / intervals[intervals.len() / 2]
}

fn hann_window(size: usize) -> Vec<f32> {
    (0..size)
        .map(|i| 0.5 * (1.0 - (2.0 * std::f32::consts::PI * i as f32 / (size - 1) as f32).cos()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::decode::tests::write_wav;

    /// Decaying 1kHz clicks every `period` seconds.
    fn click_track(period: f32, seconds: f32, sample_rate: u32) -> Vec<f32> {
        let n = (seconds * sample_rate as f32) as usize;
        let step = (period * sample_rate as f32) as usize;
        let mut samples = vec![0.0f32; n];
        for onset in (0..n).step_by(step) {
            for k in 0..2000usize.min(n - onset) {
                let t = k as f32 / sample_rate as f32;
                let decay = (-t * 60.0).exp();
                samples[onset + k] += (2.0 * std::f32::consts::PI * 1000.0 * t).sin() * decay;
            }
        }
        samples
    }

    #[test]
    fn median_interval_sets_tempo() {
        let onsets = [0.0, 0.5, 1.0, 1.5, 2.0, 2.6];
        assert!((estimate_tempo(&onsets) - 120.0).abs() < 1e-3);
    }

    #[test]
    fn irregular_onsets_fall_back() {
        assert_eq!(estimate_tempo(&[]), DEFAULT_BPM);
        assert_eq!(estimate_tempo(&[0.0, 0.05, 3.0]), DEFAULT_BPM);
    }

    #[test]
    fn click_track_near_its_tempo() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clicks.wav");
        // 20480 Hz puts every click exactly ten hops apart
        write_wav(&path, &click_track(0.5, 8.0, 20_480), 20_480);

        let bpm = OnsetTempoEstimator.estimate_bpm(&path).unwrap();
        assert!((bpm - 120.0).abs() < 1.0, "got {}", bpm);
    }

    #[test]
    fn fixed_tempo_ignores_audio() {
        assert_eq!(FixedTempo(97.5).estimate_bpm(Path::new("missing.wav")).unwrap(), 97.5);
    }
}

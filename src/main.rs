mod audio;
mod cli;
mod config;
mod error;
mod notes;
mod pipeline;
mod score;

use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::process::ExitCode;

use audio::decode::SymphoniaMetadataReader;
use audio::isolate::{CommandIsolator, PassthroughIsolator};
use audio::pitch::{CsvPitchTrack, YinPitchEstimator};
use audio::silence::{EnergySilenceDetector, IntervalFile, SilenceOptions};
use audio::tempo::{FixedTempo, OnsetTempoEstimator};
use cli::Cli;
use config::Config;
use pipeline::{
    PitchEstimator, Pipeline, ScoreSettings, SilenceDetector, TempoEstimator, VocalIsolator,
};
use score::ultrastar::EmitOptions;

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .init();

    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("{:#}", err);
            ExitCode::FAILURE
        }
    }
}

fn run(mut cli: Cli) -> Result<()> {
    // Explicit --config path, or auto-detect vocalmap.toml / global config
    let config_path = cli.config.clone().or_else(config::find_config);
    let cfg = match config_path {
        Some(ref path) => match config::load_config(path) {
            Ok(cfg) => {
                log::info!("Loaded config from {}", path.display());
                cfg
            }
            Err(err) => {
                log::warn!("Failed to load config from {}: {:#}", path.display(), err);
                Config::default()
            }
        },
        None => Config::default(),
    };
    merge_config(&mut cli, &cfg);

    let input = cli.input.clone().context("Input audio file is required")?;
    if !input.exists() {
        anyhow::bail!("Input file not found: {}", input.display());
    }
    let output = cli
        .output
        .clone()
        .unwrap_or_else(|| input.with_extension("txt"));

    log::info!("vocalmap - UltraStar score generator");
    log::info!("Input: {}", input.display());
    log::info!("Output: {}", output.display());

    let alpha = match cli.halflife {
        Some(halflife) => {
            let alpha = notes::smooth::alpha_from_halflife(halflife)?;
            log::info!("Smoothing half-life {} samples (alpha={:.4})", halflife, alpha);
            alpha
        }
        None => cli.alpha,
    };

    let pipeline = Pipeline {
        isolator: build_isolator(&cli, &cfg),
        pitch: build_pitch_estimator(&cli, &cfg),
        tempo: build_tempo_estimator(&cli),
        silence: build_silence_detector(&cli, &cfg),
        metadata: Box::new(SymphoniaMetadataReader),
        settings: ScoreSettings {
            lowest_freq: cli.lowest_freq,
            max_freq: cli.max_freq,
            alpha,
            gap_ms: cli.gap,
            clamp_tail: !cli.no_clamp,
            merge_rests: cli.merge_rests,
        },
    };

    let result = pipeline
        .run(&input)
        .with_context(|| format!("Failed to build a score for {}", input.display()))?;

    let mut meta = result.context.score_metadata();
    if let Some(title) = cli.title.clone() {
        meta.title = title;
    }
    if let Some(artist) = cli.artist.clone() {
        meta.artist = artist;
    }
    let opts = EmitOptions {
        placeholder: cli.placeholder.clone(),
        end_marker: cli.end_marker,
    };

    score::write_outputs(&output, cli.json.as_deref(), &result.events, &meta, &opts)?;

    log::info!(
        "Done! {} notes over {} table pitches, output: {}",
        result.events.iter().filter(|e| e.voiced).count(),
        result.table.len(),
        output.display()
    );
    Ok(())
}

/// Config values apply only where the CLI is still at its default.
fn merge_config(cli: &mut Cli, cfg: &Config) {
    // A config half-life must not override an explicit --alpha
    if cli.alpha == 0.4 && cli.halflife.is_none() {
        cli.halflife = cfg.pitch.halflife;
    }
    if cli.alpha == 0.4 { cli.alpha = cfg.pitch.alpha; }
    if cli.lowest_freq == 261.6256 { cli.lowest_freq = cfg.score.lowest_freq; }
    if cli.max_freq == 1000.0 { cli.max_freq = cfg.score.max_freq; }
    if cli.silence_db == -25.0 { cli.silence_db = cfg.silence.threshold_db; }
    if cli.min_silence == 100 { cli.min_silence = cfg.silence.min_silence_ms; }
    if cli.gap == 0 { cli.gap = cfg.score.gap_ms; }
    if cli.placeholder == "ba" { cli.placeholder = cfg.score.placeholder.clone(); }
    if !cli.merge_rests { cli.merge_rests = cfg.score.merge_rests; }
    if !cli.end_marker { cli.end_marker = cfg.score.end_marker; }
    if !cli.no_clamp { cli.no_clamp = !cfg.score.clamp_tail; }
}

fn build_isolator(cli: &Cli, cfg: &Config) -> Box<dyn VocalIsolator> {
    if !cli.isolate {
        return Box::new(PassthroughIsolator);
    }
    let output_dir = cfg
        .isolation
        .output_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("output"));
    match cfg.isolation.program {
        Some(ref program) => Box::new(CommandIsolator {
            program: program.clone(),
            args: cfg.isolation.args.clone(),
            output_dir,
        }),
        None => Box::new(CommandIsolator::spleeter(output_dir)),
    }
}

fn build_pitch_estimator(cli: &Cli, cfg: &Config) -> Box<dyn PitchEstimator> {
    match cli.pitch_csv {
        Some(ref path) => {
            log::info!("Pitch trace: {}", path.display());
            Box::new(CsvPitchTrack { path: path.clone() })
        }
        None => Box::new(YinPitchEstimator {
            period_ms: cfg.pitch.sample_period_ms,
            min_freq: cfg.pitch.min_freq,
            max_freq: cfg.pitch.max_freq,
            threshold: cfg.pitch.threshold,
        }),
    }
}

fn build_tempo_estimator(cli: &Cli) -> Box<dyn TempoEstimator> {
    match cli.bpm {
        Some(bpm) => Box::new(FixedTempo(bpm)),
        None => Box::new(OnsetTempoEstimator),
    }
}

fn build_silence_detector(cli: &Cli, cfg: &Config) -> Box<dyn SilenceDetector> {
    match cli.intervals {
        Some(ref path) => Box::new(IntervalFile { path: path.clone() }),
        None => Box::new(EnergySilenceDetector {
            options: SilenceOptions {
                min_silence_ms: cli.min_silence,
                threshold_db: cli.silence_db,
                seek_step_ms: cfg.silence.seek_step_ms,
            },
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn config_fills_only_default_flags() {
        let mut cli = Cli::parse_from(["vocalmap", "song.wav", "--alpha", "0.7"]);
        let cfg: Config = toml::from_str(
            r#"
            [score]
            max_freq = 1500.0
            merge_rests = true
            clamp_tail = false

            [pitch]
            alpha = 0.2
            halflife = 30.0
            "#,
        )
        .unwrap();
        merge_config(&mut cli, &cfg);

        assert_eq!(cli.alpha, 0.7);
        assert!(cli.halflife.is_none());
        assert_eq!(cli.max_freq, 1500.0);
        assert!(cli.merge_rests);
        assert!(cli.no_clamp);
        assert_eq!(cli.placeholder, "ba");
    }

    #[test]
    fn config_halflife_applies_without_explicit_alpha() {
        let mut cli = Cli::parse_from(["vocalmap", "song.wav"]);
        let cfg: Config = toml::from_str("[pitch]\nhalflife = 30.0\n").unwrap();
        merge_config(&mut cli, &cfg);
        assert_eq!(cli.halflife, Some(30.0));
    }

    #[test]
    fn negative_silence_threshold_parses() {
        let cli = Cli::parse_from(["vocalmap", "song.wav", "--silence-db", "-40"]);
        assert_eq!(cli.silence_db, -40.0);
        assert_eq!(cli.input, Some(PathBuf::from("song.wav")));
    }
}

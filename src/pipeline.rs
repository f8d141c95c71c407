use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::error::{ScoreError, ScoreResult};
use crate::notes::beats::{sample_beats, BeatGrid};
use crate::notes::encode::{encode, merge_rests, NoteEvent};
use crate::notes::smooth::smooth;
use crate::notes::table::FrequencyTable;
use crate::notes::voicing::{segment, Interval};
use crate::score::ultrastar::ScoreMetadata;

/// One frame of pitch estimator output.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RawPitchSample {
    pub time_ms: f64,
    pub frequency_hz: f64,
    /// Reported by the estimator, not used for voicing.
    pub confidence: f64,
}

/// Uniformly spaced pitch estimates for a whole track.
#[derive(Clone, Debug, Default)]
pub struct PitchTrack {
    pub samples: Vec<RawPitchSample>,
    pub period_ms: f64,
}

impl PitchTrack {
    pub fn frequencies(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.frequency_hz).collect()
    }
}

#[derive(Clone, Debug, Default)]
pub struct SongMetadata {
    pub title: String,
    pub artist: String,
    pub duration_seconds: f64,
    pub sample_rate: u32,
}

pub trait VocalIsolator {
    /// Produce an audio file holding only the lead vocal.
    fn isolate(&self, song: &Path) -> Result<PathBuf>;
}

pub trait PitchEstimator {
    fn estimate(&self, vocals: &Path) -> Result<PitchTrack>;
}

pub trait TempoEstimator {
    fn estimate_bpm(&self, song: &Path) -> Result<f64>;
}

pub trait SilenceDetector {
    /// Ordered, non-overlapping non-silent ranges.
    fn detect(&self, vocals: &Path) -> Result<Vec<Interval>>;
}

pub trait MetadataReader {
    fn read(&self, song: &Path) -> Result<SongMetadata>;
}

/// Everything a run knows about the song, fixed once the collaborators have
/// reported.
#[derive(Clone, Debug)]
pub struct SongContext {
    pub title: String,
    pub artist: String,
    pub source_ref: String,
    pub bpm: f64,
    pub gap_ms: u64,
    pub song_length_seconds: f64,
    pub sample_period_ms: f64,
}

impl SongContext {
    pub fn grid(&self) -> ScoreResult<BeatGrid> {
        BeatGrid::new(self.bpm, self.song_length_seconds)
    }

    pub fn score_metadata(&self) -> ScoreMetadata {
        ScoreMetadata {
            title: self.title.clone(),
            artist: self.artist.clone(),
            source_ref: self.source_ref.clone(),
            bpm: self.bpm,
            gap_ms: self.gap_ms,
        }
    }
}

/// Tunables of the quantization stages.
#[derive(Clone, Debug)]
pub struct ScoreSettings {
    pub lowest_freq: f64,
    pub max_freq: f64,
    pub alpha: f64,
    pub gap_ms: u64,
    pub clamp_tail: bool,
    pub merge_rests: bool,
}

impl Default for ScoreSettings {
    fn default() -> Self {
        Self {
            lowest_freq: crate::notes::table::MIDDLE_C_HZ,
            max_freq: 1000.0,
            alpha: 0.4,
            gap_ms: 0,
            clamp_tail: true,
            merge_rests: false,
        }
    }
}

#[derive(Debug)]
pub struct ScoreOutput {
    pub context: SongContext,
    pub table: FrequencyTable,
    pub events: Vec<NoteEvent>,
}

/// Turn a pitch trace and voiced intervals into note events.
pub fn quantize_song(
    context: &SongContext,
    settings: &ScoreSettings,
    track: &PitchTrack,
    intervals: &[Interval],
) -> ScoreResult<(FrequencyTable, Vec<NoteEvent>)> {
    let table = FrequencyTable::build(settings.lowest_freq, settings.max_freq)?;
    let grid = context.grid()?;

    let smoothed = smooth(&track.frequencies(), settings.alpha)?;
    let beat_freqs = sample_beats(&smoothed, &grid, context.sample_period_ms, settings.clamp_tail)?;
    let voiced = segment(intervals, &grid)?;

    let mut events = encode(&beat_freqs, &voiced, &table)?;
    if settings.merge_rests {
        events = merge_rests(events);
    }

    log::info!(
        "Quantized {} beats into {} notes ({} events)",
        grid.total_beats(),
        events.iter().filter(|e| e.voiced).count(),
        events.len()
    );
    Ok((table, events))
}

/// Collaborators plus settings for a full song-to-score run.
pub struct Pipeline {
    pub isolator: Box<dyn VocalIsolator>,
    pub pitch: Box<dyn PitchEstimator>,
    pub tempo: Box<dyn TempoEstimator>,
    pub silence: Box<dyn SilenceDetector>,
    pub metadata: Box<dyn MetadataReader>,
    pub settings: ScoreSettings,
}

impl Pipeline {
    pub fn run(&self, song: &Path) -> ScoreResult<ScoreOutput> {
        log::info!("Reading metadata...");
        let meta = self
            .metadata
            .read(song)
            .map_err(|e| ScoreError::upstream("metadata reading", e))?;
        log::info!(
            "{} - {} ({:.1}s, {} Hz)",
            display_or(&meta.artist, "unknown artist"),
            display_or(&meta.title, "untitled"),
            meta.duration_seconds,
            meta.sample_rate
        );

        log::info!("Estimating tempo...");
        let bpm = self
            .tempo
            .estimate_bpm(song)
            .map_err(|e| ScoreError::upstream("tempo estimation", e))?;
        log::info!("Tempo: {:.1} BPM", bpm);

        log::info!("Isolating vocals...");
        let vocals = self
            .isolator
            .isolate(song)
            .map_err(|e| ScoreError::upstream("vocal isolation", e))?;

        log::info!("Estimating pitch...");
        let track = self
            .pitch
            .estimate(&vocals)
            .map_err(|e| ScoreError::upstream("pitch estimation", e))?;
        if track.samples.is_empty() {
            return Err(ScoreError::EmptyInput { stage: "pitch estimation" });
        }
        log::info!(
            "Pitch track: {} samples every {}ms, mean confidence {:.2}",
            track.samples.len(),
            track.period_ms,
            track.samples.iter().map(|s| s.confidence).sum::<f64>() / track.samples.len() as f64
        );

        log::info!("Detecting silence...");
        let intervals = self
            .silence
            .detect(&vocals)
            .map_err(|e| ScoreError::upstream("silence detection", e))?;
        log::info!("Non-silent intervals: {}", intervals.len());

        let context = SongContext {
            title: meta.title,
            artist: meta.artist,
            source_ref: source_ref(song),
            bpm,
            gap_ms: self.settings.gap_ms,
            song_length_seconds: meta.duration_seconds,
            sample_period_ms: track.period_ms,
        };

        let (table, events) = quantize_song(&context, &self.settings, &track, &intervals)?;
        Ok(ScoreOutput {
            context,
            table,
            events,
        })
    }
}

fn source_ref(song: &Path) -> String {
    song.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| song.display().to_string())
}

fn display_or<'a>(value: &'a str, fallback: &'a str) -> &'a str {
    if value.is_empty() {
        fallback
    } else {
        value
    }
}

use anyhow::{Context, Result};
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::{MetadataOptions, MetadataRevision, StandardTagKey};
use symphonia::core::probe::{Hint, ProbeResult};

use crate::pipeline::{MetadataReader, SongMetadata};

pub struct AudioData {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

impl AudioData {
    pub fn duration_seconds(&self) -> f64 {
        if self.sample_rate == 0 {
            return 0.0;
        }
        self.samples.len() as f64 / self.sample_rate as f64
    }
}

fn probe(path: &Path) -> Result<ProbeResult> {
    let file = std::fs::File::open(path)
        .with_context(|| format!("Failed to open audio file: {}", path.display()))?;

    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .with_context(|| format!("Failed to probe audio format: {}", path.display()))
}

/// Decode the first audio track of `path`, downmixed to mono.
pub fn decode_audio(path: &Path) -> Result<AudioData> {
    let mut format = probe(path)?.format;

    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .context("No audio tracks found")?;

    let track_id = track.id;
    let channels = track.codec_params.channels.map_or(1, |c| c.count());
    let sample_rate = track.codec_params.sample_rate.context("Unknown sample rate")?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .context("Failed to create audio decoder")?;

    let mut all_samples: Vec<f32> = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(symphonia::core::errors::Error::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break;
            }
            Err(e) => return Err(e.into()),
        };

        if packet.track_id() != track_id {
            continue;
        }

        let decoded = match decoder.decode(&packet) {
            Ok(d) => d,
            Err(symphonia::core::errors::Error::DecodeError(_)) => continue,
            Err(e) => return Err(e.into()),
        };

        let spec = *decoded.spec();
        let mut sample_buf = SampleBuffer::<f32>::new(decoded.frames() as u64, spec);
        sample_buf.copy_interleaved_ref(decoded);

        let samples = sample_buf.samples();
        if channels == 1 {
            all_samples.extend_from_slice(samples);
        } else {
            all_samples.extend(
                samples
                    .chunks(channels)
                    .map(|frame| frame.iter().sum::<f32>() / channels as f32),
            );
        }
    }

    let audio = AudioData {
        samples: all_samples,
        sample_rate,
    };
    log::debug!(
        "Decoded {}: {} samples, {}Hz, {:.1}s",
        path.display(),
        audio.samples.len(),
        sample_rate,
        audio.duration_seconds()
    );
    Ok(audio)
}

/// Title, artist, sample rate and duration from container tags and the
/// track header. Falls back to a full decode when the header has no frame
/// count (common for VBR MP3s).
pub fn read_metadata(path: &Path) -> Result<SongMetadata> {
    let mut probed = probe(path)?;
    let mut meta = SongMetadata::default();

    // Tags read ahead of the container (e.g. ID3v2) come first, container
    // tags override them.
    if let Some(rev) = probed.metadata.get().as_ref().and_then(|m| m.current()) {
        apply_tags(rev, &mut meta);
    }
    if let Some(rev) = probed.format.metadata().current() {
        apply_tags(rev, &mut meta);
    }

    let track = probed
        .format
        .tracks()
        .iter()
        .find(|t| t.codec_params.codec != CODEC_TYPE_NULL)
        .context("No audio tracks found")?;
    meta.sample_rate = track.codec_params.sample_rate.context("Unknown sample rate")?;

    meta.duration_seconds = match track.codec_params.n_frames {
        Some(frames) => frames as f64 / meta.sample_rate as f64,
        None => {
            log::debug!("No frame count in header, decoding to measure duration");
            decode_audio(path)?.duration_seconds()
        }
    };
    Ok(meta)
}

fn apply_tags(rev: &MetadataRevision, meta: &mut SongMetadata) {
    for tag in rev.tags() {
        match tag.std_key {
            Some(StandardTagKey::TrackTitle) => meta.title = tag.value.to_string(),
            Some(StandardTagKey::Artist) => meta.artist = tag.value.to_string(),
            _ => {}
        }
    }
}

pub struct SymphoniaMetadataReader;

impl MetadataReader for SymphoniaMetadataReader {
    fn read(&self, song: &Path) -> Result<SongMetadata> {
        read_metadata(song)
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::io::Write;

    /// Write a 16-bit mono PCM WAV file.
    pub(crate) fn write_wav(path: &Path, samples: &[f32], sample_rate: u32) {
        let data_len = (samples.len() * 2) as u32;
        let mut f = std::fs::File::create(path).unwrap();
        f.write_all(b"RIFF").unwrap();
        f.write_all(&(36 + data_len).to_le_bytes()).unwrap();
        f.write_all(b"WAVEfmt ").unwrap();
        f.write_all(&16u32.to_le_bytes()).unwrap();
        f.write_all(&1u16.to_le_bytes()).unwrap(); // PCM
        f.write_all(&1u16.to_le_bytes()).unwrap(); // mono
        f.write_all(&sample_rate.to_le_bytes()).unwrap();
        f.write_all(&(sample_rate * 2).to_le_bytes()).unwrap();
        f.write_all(&2u16.to_le_bytes()).unwrap();
        f.write_all(&16u16.to_le_bytes()).unwrap();
        f.write_all(b"data").unwrap();
        f.write_all(&data_len.to_le_bytes()).unwrap();
        for &s in samples {
            let v = (s.clamp(-1.0, 1.0) * i16::MAX as f32) as i16;
            f.write_all(&v.to_le_bytes()).unwrap();
        }
    }

    pub(crate) fn sine(freq: f32, seconds: f32, sample_rate: u32, amp: f32) -> Vec<f32> {
        let n = (seconds * sample_rate as f32) as usize;
        (0..n)
            .map(|i| {
                let t = i as f32 / sample_rate as f32;
                amp * (2.0 * std::f32::consts::PI * freq * t).sin()
            })
            .collect()
    }

    #[test]
    fn decodes_wav_and_reads_duration() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tone.wav");
        write_wav(&path, &sine(440.0, 1.5, 16_000, 0.5), 16_000);

        let audio = decode_audio(&path).unwrap();
        assert_eq!(audio.sample_rate, 16_000);
        assert_eq!(audio.samples.len(), 24_000);

        let meta = read_metadata(&path).unwrap();
        assert_eq!(meta.sample_rate, 16_000);
        assert!((meta.duration_seconds - 1.5).abs() < 1e-6);
        assert!(meta.title.is_empty());
    }

    #[test]
    fn missing_file_is_an_error() {
        assert!(decode_audio(Path::new("/nonexistent/song.wav")).is_err());
    }
}

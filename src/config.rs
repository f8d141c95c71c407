use serde::Deserialize;
use std::path::{Path, PathBuf};

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub score: ScoreConfig,
    #[serde(default)]
    pub pitch: PitchConfig,
    #[serde(default)]
    pub silence: SilenceConfig,
    #[serde(default)]
    pub isolation: IsolationConfig,
}

#[derive(Debug, Deserialize)]
pub struct ScoreConfig {
    #[serde(default = "default_lowest_freq")]
    pub lowest_freq: f64,
    #[serde(default = "default_max_freq")]
    pub max_freq: f64,
    #[serde(default)]
    pub gap_ms: u64,
    #[serde(default = "default_placeholder")]
    pub placeholder: String,
    #[serde(default)]
    pub merge_rests: bool,
    #[serde(default)]
    pub end_marker: bool,
    #[serde(default = "default_true")]
    pub clamp_tail: bool,
}

#[derive(Debug, Deserialize)]
pub struct PitchConfig {
    #[serde(default = "default_alpha")]
    pub alpha: f64,
    /// Overrides `alpha` when set.
    #[serde(default)]
    pub halflife: Option<f64>,
    #[serde(default = "default_sample_period_ms")]
    pub sample_period_ms: f64,
    #[serde(default = "default_min_freq")]
    pub min_freq: f64,
    #[serde(default = "default_yin_max_freq")]
    pub max_freq: f64,
    #[serde(default = "default_yin_threshold")]
    pub threshold: f64,
}

#[derive(Debug, Deserialize)]
pub struct SilenceConfig {
    #[serde(default = "default_min_silence_ms")]
    pub min_silence_ms: u64,
    #[serde(default = "default_threshold_db")]
    pub threshold_db: f64,
    #[serde(default = "default_seek_step_ms")]
    pub seek_step_ms: u64,
}

#[derive(Debug, Default, Deserialize)]
pub struct IsolationConfig {
    /// Separation program; Spleeter when unset.
    #[serde(default)]
    pub program: Option<String>,
    #[serde(default)]
    pub args: Vec<String>,
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
}

impl Default for ScoreConfig {
    fn default() -> Self {
        Self {
            lowest_freq: default_lowest_freq(),
            max_freq: default_max_freq(),
            gap_ms: 0,
            placeholder: default_placeholder(),
            merge_rests: false,
            end_marker: false,
            clamp_tail: true,
        }
    }
}

impl Default for PitchConfig {
    fn default() -> Self {
        Self {
            alpha: default_alpha(),
            halflife: None,
            sample_period_ms: default_sample_period_ms(),
            min_freq: default_min_freq(),
            max_freq: default_yin_max_freq(),
            threshold: default_yin_threshold(),
        }
    }
}

impl Default for SilenceConfig {
    fn default() -> Self {
        Self {
            min_silence_ms: default_min_silence_ms(),
            threshold_db: default_threshold_db(),
            seek_step_ms: default_seek_step_ms(),
        }
    }
}

fn default_lowest_freq() -> f64 { crate::notes::table::MIDDLE_C_HZ }
fn default_max_freq() -> f64 { 1000.0 }
fn default_placeholder() -> String { "ba".into() }
fn default_true() -> bool { true }
fn default_alpha() -> f64 { 0.4 }
fn default_sample_period_ms() -> f64 { 10.0 }
fn default_min_freq() -> f64 { 65.0 }
fn default_yin_max_freq() -> f64 { 1100.0 }
fn default_yin_threshold() -> f64 { 0.15 }
fn default_min_silence_ms() -> u64 { 100 }
fn default_threshold_db() -> f64 { -25.0 }
fn default_seek_step_ms() -> u64 { 1 }

pub fn load_config(path: &Path) -> anyhow::Result<Config> {
    let content = std::fs::read_to_string(path)?;
    Ok(toml::from_str(&content)?)
}

/// `./vocalmap.toml`, then `~/.config/vocalmap/config.toml`, then the
/// platform config directory.
pub fn find_config() -> Option<PathBuf> {
    let local = PathBuf::from("vocalmap.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("vocalmap").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("vocalmap").join("config.toml");
        if platform.exists() {
            return Some(platform);
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let cfg: Config = toml::from_str("").unwrap();
        assert_eq!(cfg.score.max_freq, 1000.0);
        assert_eq!(cfg.score.placeholder, "ba");
        assert!(cfg.score.clamp_tail);
        assert_eq!(cfg.pitch.alpha, 0.4);
        assert_eq!(cfg.silence.threshold_db, -25.0);
        assert!(cfg.isolation.program.is_none());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [score]
            max_freq = 2000.0
            merge_rests = true

            [pitch]
            halflife = 30.0

            [isolation]
            program = "demucs"
            args = ["--two-stems=vocals", "-o", "{output}", "{input}"]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.score.max_freq, 2000.0);
        assert!(cfg.score.merge_rests);
        assert_eq!(cfg.score.lowest_freq, crate::notes::table::MIDDLE_C_HZ);
        assert_eq!(cfg.pitch.halflife, Some(30.0));
        assert_eq!(cfg.pitch.sample_period_ms, 10.0);
        assert_eq!(cfg.isolation.program.as_deref(), Some("demucs"));
        assert_eq!(cfg.isolation.args.len(), 4);
    }

    #[test]
    fn load_reports_bad_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("vocalmap.toml");
        std::fs::write(&path, "[score]\nmax_freq = \"loud\"\n").unwrap();
        assert!(load_config(&path).is_err());
    }
}

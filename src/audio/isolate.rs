use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use crate::pipeline::VocalIsolator;

/// Use the input as-is; it already holds only the vocal.
pub struct PassthroughIsolator;

impl VocalIsolator for PassthroughIsolator {
    fn isolate(&self, song: &Path) -> Result<PathBuf> {
        Ok(song.to_path_buf())
    }
}

/// Run an external source separation tool that writes
/// `<output_dir>/<song stem>/vocals.wav`, Spleeter's 2-stem layout.
///
/// `{input}` and `{output}` in `args` are replaced by the song path and the
/// output directory.
pub struct CommandIsolator {
    pub program: String,
    pub args: Vec<String>,
    pub output_dir: PathBuf,
}

impl CommandIsolator {
    pub fn spleeter(output_dir: PathBuf) -> Self {
        Self {
            program: "spleeter".into(),
            args: ["separate", "-p", "spleeter:2stems", "-o", "{output}", "{input}"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            output_dir,
        }
    }

    pub fn vocals_path(&self, song: &Path) -> Result<PathBuf> {
        let stem = song
            .file_stem()
            .with_context(|| format!("Song path has no file name: {}", song.display()))?;
        Ok(self.output_dir.join(stem).join("vocals.wav"))
    }

    fn expand_args(&self, song: &Path) -> Vec<String> {
        let input = song.to_string_lossy();
        let output = self.output_dir.to_string_lossy();
        self.args
            .iter()
            .map(|arg| arg.replace("{input}", &input).replace("{output}", &output))
            .collect()
    }
}

impl VocalIsolator for CommandIsolator {
    fn isolate(&self, song: &Path) -> Result<PathBuf> {
        let vocals = self.vocals_path(song)?;
        if vocals.exists() {
            log::info!("Loading vocals from cache: {}", vocals.display());
            return Ok(vocals);
        }

        std::fs::create_dir_all(&self.output_dir).with_context(|| {
            format!("Failed to create output directory: {}", self.output_dir.display())
        })?;

        let args = self.expand_args(song);
        log::info!("Running {} {}", self.program, args.join(" "));
        let output = Command::new(&self.program)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .output()
            .with_context(|| format!("Failed to spawn {}. Is it installed?", self.program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            bail!("{} exited with {}:\n{}", self.program, output.status, stderr);
        }
        if !vocals.exists() {
            bail!(
                "{} finished but produced no vocal stem at {}",
                self.program,
                vocals.display()
            );
        }
        Ok(vocals)
    }
}

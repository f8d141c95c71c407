use thiserror::Error;

pub type ScoreResult<T> = Result<T, ScoreError>;

/// Errors raised by the note quantization pipeline.
#[derive(Debug, Error)]
pub enum ScoreError {
    #[error("invalid frequency range: lowest {lowest} Hz, max {max} Hz")]
    InvalidRange { lowest: f64, max: f64 },

    #[error("{stage}: input series is empty")]
    EmptyInput { stage: &'static str },

    #[error("silence interval #{index} is malformed: end {end_ms}ms before start {start_ms}ms")]
    InvalidInterval {
        index: usize,
        start_ms: u64,
        end_ms: u64,
    },

    #[error("beat {beat} samples index {index}, but the series has {len} samples")]
    OutOfRange { beat: usize, index: usize, len: usize },

    #[error("event #{position} breaks beat contiguity: {reason}")]
    MalformedEventStream { position: usize, reason: String },

    #[error("beat frequencies ({frequencies}) and voiced mask ({mask}) differ in length")]
    LengthMismatch { frequencies: usize, mask: usize },

    #[error("invalid value for '{name}': {value}")]
    InvalidParameter { name: &'static str, value: f64 },

    #[error("{stage} failed")]
    Upstream {
        stage: &'static str,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl ScoreError {
    pub fn upstream(stage: &'static str, err: anyhow::Error) -> Self {
        ScoreError::Upstream {
            stage,
            source: err.into(),
        }
    }
}

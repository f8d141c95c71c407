use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "vocalmap", about = "Generate UltraStar karaoke scores from sung audio")]
pub struct Cli {
    /// Input song or vocal track (WAV, MP3, FLAC, OGG)
    pub input: Option<PathBuf>,

    /// Output score file [default: <input stem>.txt]
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Config file (defaults to vocalmap.toml or the user config dir)
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Tempo in BPM. Estimated from the audio when omitted.
    #[arg(short, long)]
    pub bpm: Option<f64>,

    /// Precomputed pitch trace (time,frequency,confidence CSV) instead of YIN
    #[arg(long)]
    pub pitch_csv: Option<PathBuf>,

    /// Precomputed non-silent intervals (start_ms,end_ms per line)
    #[arg(long)]
    pub intervals: Option<PathBuf>,

    /// Separate vocals with an external tool before analysis
    #[arg(long)]
    pub isolate: bool,

    /// EMA smoothing factor for the pitch trace (0.0-1.0]
    #[arg(long, default_value_t = 0.4)]
    pub alpha: f64,

    /// EMA half-life in pitch samples; overrides --alpha
    #[arg(long)]
    pub halflife: Option<f64>,

    /// Frequency of note 0 in Hz
    #[arg(long, default_value_t = 261.6256)]
    pub lowest_freq: f64,

    /// Upper end of the note table in Hz
    #[arg(long, default_value_t = 1000.0)]
    pub max_freq: f64,

    /// Silence threshold in dBFS
    #[arg(long, default_value_t = -25.0, allow_negative_numbers = true)]
    pub silence_db: f64,

    /// Shortest silence in milliseconds
    #[arg(long, default_value_t = 100)]
    pub min_silence: u64,

    /// #GAP value in milliseconds
    #[arg(long, default_value_t = 0)]
    pub gap: u64,

    /// Override the title tag
    #[arg(long)]
    pub title: Option<String>,

    /// Override the artist tag
    #[arg(long)]
    pub artist: Option<String>,

    /// Lyric written on every note line
    #[arg(long, default_value = "ba")]
    pub placeholder: String,

    /// Collapse consecutive rest beats
    #[arg(long)]
    pub merge_rests: bool,

    /// Finish the score with an E line
    #[arg(long)]
    pub end_marker: bool,

    /// Fail instead of reusing the last pitch sample for beats past its end
    #[arg(long)]
    pub no_clamp: bool,

    /// Also dump the note events as JSON
    #[arg(long)]
    pub json: Option<PathBuf>,
}

use clap::Parser;
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(name = "crooner", about = "Sing along to a note chart and get scored on pitch")]
pub struct Cli {
    /// Known song name (see --list-songs) or path to a chart file
    pub song: Option<String>,

    /// Recorded vocal take streamed in place of the microphone
    #[arg(short, long)]
    pub vocals: Option<PathBuf>,

    /// Backing track whose playback cursor drives the song clock
    #[arg(short, long)]
    pub backing: Option<PathBuf>,

    /// Directory holding <song>_notes.txt and <song>.wav
    #[arg(long)]
    pub songs_dir: Option<PathBuf>,

    /// Semitones added to every chart pitch (0 or -12)
    #[arg(long, allow_hyphen_values = true)]
    pub octave_offset: Option<i32>,

    /// Score that corresponds to 100% for the record display
    #[arg(long)]
    pub max_points: Option<u64>,

    /// Samples between pitch readings
    #[arg(long, default_value_t = 1024)]
    pub hop_size: usize,

    /// Pitch estimator lookback in samples
    #[arg(long, default_value_t = 4096)]
    pub window_size: usize,

    /// YIN threshold (0.0-1.0)
    #[arg(long, default_value_t = 0.5)]
    pub tolerance: f32,

    /// Scoring updates per second
    #[arg(long, default_value_t = 60)]
    pub tick_rate: u32,

    /// Nominal capture block size in samples
    #[arg(long, default_value_t = 512)]
    pub chunk_size: usize,

    /// Sing the song this many times, restarting between attempts; the best
    /// attempt is reported
    #[arg(long, default_value_t = 1)]
    pub attempts: u32,

    /// Stream the take from a capture thread at wall-clock pace
    #[arg(long)]
    pub realtime: bool,

    /// Write the final summary as JSON
    #[arg(long)]
    pub json: Option<PathBuf>,

    /// Write one JSON line per scoring tick
    #[arg(long)]
    pub trace: Option<PathBuf>,

    /// Config file (defaults to crooner.toml or the user config dir)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// List known songs and exit
    #[arg(long)]
    pub list_songs: bool,
}

use std::path::PathBuf;

/// Failures while loading or validating a note chart. All of these are fatal
/// to song load.
#[derive(Debug, thiserror::Error)]
pub enum ChartError {
    #[error("Failed to read chart {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Malformed chart line {line}: {message}")]
    Parse { line: usize, message: String },

    #[error("Chart contains no notes")]
    Empty,

    /// Every note shares one pitch, so the display range would be zero wide.
    #[error("Chart pitch range is degenerate (all notes at MIDI {0:.2})")]
    FlatPitchRange(f32),

    #[error("Song max points must be greater than zero")]
    ZeroMaxPoints,
}

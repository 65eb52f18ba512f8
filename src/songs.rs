use anyhow::Result;
use std::path::{Path, PathBuf};

use crate::chart::ChartOptions;

/// A song the game ships charts for.
#[derive(Clone, Copy, Debug)]
pub struct KnownSong {
    pub name: &'static str,
    pub title: &'static str,
    pub max_points: u64,
    /// The chart for this song was transcribed an octave above the vocal line.
    pub octave_offset: i32,
}

pub const KNOWN_SONGS: &[KnownSong] = &[
    KnownSong {
        name: "allstar",
        title: "All Star - Smash Mouth",
        max_points: 1_074_506,
        octave_offset: -12,
    },
    KnownSong {
        name: "valerie",
        title: "Valerie - Amy Winehouse",
        max_points: 902_500,
        octave_offset: 0,
    },
    KnownSong {
        name: "bohemian",
        title: "Bohemian Rhapsody - Queen",
        max_points: 1_450_300,
        octave_offset: 0,
    },
];

/// Chart octave corrections a song can carry: none, or one octave down.
pub const OCTAVE_OFFSETS: [i32; 2] = [0, -12];

/// Where a song's files live and how its chart should be read.
#[derive(Clone, Debug)]
pub struct SongAssets {
    pub name: String,
    pub chart: PathBuf,
    pub backing: Option<PathBuf>,
    pub options: ChartOptions,
}

pub fn find_known(name: &str) -> Option<&'static KnownSong> {
    KNOWN_SONGS.iter().find(|s| s.name == name)
}

/// Locate the `songs` directory: next to the executable (or a couple of
/// levels up for the target/ layout), then the crate root.
pub fn find_songs_dir() -> PathBuf {
    let exe_dir = std::env::current_exe()
        .ok()
        .and_then(|p| p.parent().map(|p| p.to_path_buf()));

    if let Some(dir) = exe_dir {
        for candidate in dir.ancestors().take(3) {
            let songs_dir = candidate.join("songs");
            if songs_dir.exists() {
                return songs_dir;
            }
        }
    }

    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("songs")
}

/// Resolve `input` to song assets.
///
/// - An existing file is taken as a chart; options default unless overridden.
/// - A known song name maps to `<songs_dir>/<name>_notes.txt`, with
///   `<name>.wav` as the backing track when present.
pub fn resolve_song(
    input: &str,
    songs_dir: &Path,
    octave_offset: Option<i32>,
    max_points: Option<u64>,
) -> Result<SongAssets> {
    if let Some(offset) = octave_offset {
        if !OCTAVE_OFFSETS.contains(&offset) {
            anyhow::bail!(
                "Unsupported octave offset {}; expected one of {:?}",
                offset,
                OCTAVE_OFFSETS
            );
        }
    }

    let as_path = Path::new(input);
    if as_path.is_file() {
        let defaults = ChartOptions::default();
        let name = as_path
            .file_stem()
            .and_then(|s| s.to_str())
            .map(|s| s.trim_end_matches("_notes").to_string())
            .unwrap_or_else(|| input.to_string());
        log::info!("Using chart file: {}", as_path.display());
        return Ok(SongAssets {
            name,
            chart: as_path.to_path_buf(),
            backing: None,
            options: ChartOptions {
                octave_offset: octave_offset.unwrap_or(defaults.octave_offset),
                max_points: max_points.unwrap_or(defaults.max_points),
            },
        });
    }

    let song = find_known(input).ok_or_else(|| {
        anyhow::anyhow!(
            "Unknown song '{}'. Known songs: {}. Or provide a chart file path.",
            input,
            KNOWN_SONGS
                .iter()
                .map(|s| s.name)
                .collect::<Vec<_>>()
                .join(", ")
        )
    })?;

    let chart = songs_dir.join(format!("{}_notes.txt", song.name));
    if !chart.exists() {
        anyhow::bail!(
            "Chart for '{}' not found at {}",
            song.name,
            chart.display()
        );
    }
    let backing = songs_dir.join(format!("{}.wav", song.name));

    Ok(SongAssets {
        name: song.name.to_string(),
        chart,
        backing: backing.exists().then_some(backing),
        options: ChartOptions {
            octave_offset: octave_offset.unwrap_or(song.octave_offset),
            max_points: max_points.unwrap_or(song.max_points),
        },
    })
}

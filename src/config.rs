use anyhow::Result;
use serde::Deserialize;
use std::path::{Path, PathBuf};

use crate::audio::analyzer::VOLUME_SCALE;
use crate::audio::pitch::{
    DEFAULT_HOP_SIZE, DEFAULT_TOLERANCE, DEFAULT_WINDOW_SIZE, MIN_WINDOW_SIZE,
};
use crate::scoring::{SMOOTHING_WINDOW, VOLUME_GATE};

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub analysis: AnalysisConfig,
    #[serde(default)]
    pub scoring: ScoringConfig,
    #[serde(default)]
    pub session: SessionConfig,
}

#[derive(Debug, Deserialize)]
pub struct AnalysisConfig {
    #[serde(default = "default_hop_size")]
    pub hop_size: usize,
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    #[serde(default = "default_tolerance")]
    pub tolerance: f32,
    #[serde(default = "default_volume_scale")]
    pub volume_scale: f32,
}

#[derive(Debug, Deserialize)]
pub struct ScoringConfig {
    #[serde(default = "default_smoothing_window")]
    pub smoothing_window: usize,
    #[serde(default = "default_volume_gate")]
    pub volume_gate: f32,
}

#[derive(Debug, Deserialize)]
pub struct SessionConfig {
    #[serde(default = "default_tick_rate")]
    pub tick_rate: u32,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: usize,
    #[serde(default)]
    pub songs_dir: Option<PathBuf>,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            hop_size: default_hop_size(),
            window_size: default_window_size(),
            tolerance: default_tolerance(),
            volume_scale: default_volume_scale(),
        }
    }
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            smoothing_window: default_smoothing_window(),
            volume_gate: default_volume_gate(),
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            tick_rate: default_tick_rate(),
            chunk_size: default_chunk_size(),
            songs_dir: None,
        }
    }
}

fn default_hop_size() -> usize { DEFAULT_HOP_SIZE }
fn default_window_size() -> usize { DEFAULT_WINDOW_SIZE }
fn default_tolerance() -> f32 { DEFAULT_TOLERANCE }
fn default_volume_scale() -> f32 { VOLUME_SCALE }
fn default_smoothing_window() -> usize { SMOOTHING_WINDOW }
fn default_volume_gate() -> f32 { VOLUME_GATE }
fn default_tick_rate() -> u32 { 60 }
fn default_chunk_size() -> usize { 512 }

/// Reject merged settings the analyzer or scorer cannot run with.
pub fn validate(
    hop_size: usize,
    window_size: usize,
    tick_rate: u32,
    smoothing_window: usize,
) -> Result<()> {
    if tick_rate == 0 {
        anyhow::bail!("tick_rate must be at least 1");
    }
    if hop_size == 0 || window_size < hop_size {
        anyhow::bail!(
            "Invalid analysis sizes: hop {} must be non-zero and no larger than window {}",
            hop_size,
            window_size
        );
    }
    if window_size < MIN_WINDOW_SIZE {
        anyhow::bail!(
            "window_size {} is too small, need at least {} samples",
            window_size,
            MIN_WINDOW_SIZE
        );
    }
    if smoothing_window == 0 {
        anyhow::bail!("smoothing_window must hold at least one pitch");
    }
    Ok(())
}

pub fn load_config(path: &Path) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(cfg) => Some(cfg),
        Err(err) => {
            log::warn!("Invalid config {}: {}", path.display(), err);
            None
        }
    }
}

/// `--config` if given, else `crooner.toml` in the working directory, else
/// the per-user config file.
pub fn find_config(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from("crooner.toml");
    if local.exists() {
        return Some(local);
    }
    if let Some(home) = dirs::home_dir() {
        let xdg = home.join(".config").join("crooner").join("config.toml");
        if xdg.exists() {
            return Some(xdg);
        }
    }
    if let Some(config_dir) = dirs::config_dir() {
        let platform = config_dir.join("crooner").join("config.toml");
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
        assert_eq!(cfg.analysis.hop_size, 1024);
        assert_eq!(cfg.analysis.window_size, 4096);
        assert_eq!(cfg.analysis.volume_scale, 500.0);
        assert_eq!(cfg.scoring.smoothing_window, 30);
        assert_eq!(cfg.scoring.volume_gate, 5.0);
        assert_eq!(cfg.session.tick_rate, 60);
        assert!(cfg.session.songs_dir.is_none());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg: Config = toml::from_str(
            r#"
            [analysis]
            hop_size = 512

            [session]
            songs_dir = "/srv/songs"
            "#,
        )
        .unwrap();
        assert_eq!(cfg.analysis.hop_size, 512);
        assert_eq!(cfg.analysis.tolerance, 0.5);
        assert_eq!(cfg.session.chunk_size, 512);
        assert_eq!(cfg.session.songs_dir, Some(PathBuf::from("/srv/songs")));
    }

    #[test]
    fn defaults_validate() {
        let cfg = Config::default();
        assert!(validate(
            cfg.analysis.hop_size,
            cfg.analysis.window_size,
            cfg.session.tick_rate,
            cfg.scoring.smoothing_window
        )
        .is_ok());
    }

    #[test]
    fn zero_smoothing_window_is_rejected() {
        let cfg: Config = toml::from_str("[scoring]\nsmoothing_window = 0").unwrap();
        let err = validate(
            cfg.analysis.hop_size,
            cfg.analysis.window_size,
            cfg.session.tick_rate,
            cfg.scoring.smoothing_window,
        )
        .unwrap_err();
        assert!(err.to_string().contains("smoothing_window"));
    }

    #[test]
    fn tiny_window_is_rejected() {
        let err = validate(2, 4, 60, 30).unwrap_err();
        assert!(err.to_string().contains("too small"));
        assert!(validate(2, 8, 60, 30).is_ok());
    }

    #[test]
    fn bad_hop_and_tick_rate_are_rejected() {
        assert!(validate(0, 4096, 60, 30).is_err());
        assert!(validate(2048, 1024, 60, 30).is_err());
        assert!(validate(1024, 4096, 0, 30).is_err());
    }

    #[test]
    fn explicit_path_wins() {
        let path = Path::new("/tmp/elsewhere.toml");
        assert_eq!(find_config(Some(path)), Some(path.to_path_buf()));
    }
}

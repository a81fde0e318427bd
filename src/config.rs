use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::audio::envelope::ENVELOPE_IMAGE_HEIGHT;
use crate::audio::window::WindowFunction;
use crate::render::hud::HudOptions;
use crate::render::params::{RenderParameters, DEFAULT_FREQ_MAX};

#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub spectrogram: SpectrogramConfig,
    #[serde(default)]
    pub envelope: EnvelopeConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SpectrogramConfig {
    #[serde(default = "default_window_size")]
    pub window_size: usize,
    #[serde(default)]
    pub window_function: WindowFunction,
    #[serde(default = "default_true")]
    pub track_mouse: bool,
    #[serde(default = "default_true")]
    pub draw_grid: bool,
    #[serde(default = "default_db_max")]
    pub db_max: i32,
    #[serde(default = "default_db_min")]
    pub db_min: i32,
    /// Maximum displayed frequency in Hz, 0 to follow the sampling rate
    #[serde(default)]
    pub freq_max: u32,
}

#[derive(Debug, Deserialize)]
pub struct EnvelopeConfig {
    /// Timeline frames per second the envelope is computed for
    #[serde(default = "default_frame_rate")]
    pub frame_rate: f64,
    #[serde(default = "default_image_height")]
    pub image_height: u32,
}

#[derive(Debug, Deserialize)]
pub struct OutputConfig {
    #[serde(default = "default_width")]
    pub width: u32,
    #[serde(default = "default_height")]
    pub height: u32,
    #[serde(default = "default_fps")]
    pub fps: u32,
    #[serde(default = "default_crf")]
    pub crf: u32,
    #[serde(default = "default_codec")]
    pub codec: String,
    #[serde(default)]
    pub font: Option<PathBuf>,
}

impl Default for SpectrogramConfig {
    fn default() -> Self {
        Self {
            window_size: default_window_size(),
            window_function: WindowFunction::default(),
            track_mouse: true,
            draw_grid: true,
            db_max: default_db_max(),
            db_min: default_db_min(),
            freq_max: 0,
        }
    }
}

impl Default for EnvelopeConfig {
    fn default() -> Self {
        Self {
            frame_rate: default_frame_rate(),
            image_height: default_image_height(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            width: default_width(),
            height: default_height(),
            fps: default_fps(),
            crf: default_crf(),
            codec: default_codec(),
            font: None,
        }
    }
}

impl SpectrogramConfig {
    pub fn render_parameters(&self) -> RenderParameters {
        let mut params = RenderParameters {
            db_min: self.db_min,
            db_max: self.db_max,
            freq_max: DEFAULT_FREQ_MAX,
            custom_freq: false,
            window_size: self.window_size,
            window: self.window_function,
        };
        if self.freq_max > 0 {
            params.set_freq_max(self.freq_max);
        }
        params.sanitize();
        params
    }

    pub fn hud_options(&self) -> HudOptions {
        HudOptions {
            draw_grid: self.draw_grid,
            track_mouse: self.track_mouse,
        }
    }

    /// Snapshot of the current scope settings, ready to be saved.
    pub fn from_scope(params: &RenderParameters, options: HudOptions) -> Self {
        Self {
            window_size: params.window_size,
            window_function: params.window,
            track_mouse: options.track_mouse,
            draw_grid: options.draw_grid,
            db_max: params.db_max,
            db_min: params.db_min,
            freq_max: if params.custom_freq { params.freq_max } else { 0 },
        }
    }
}

fn default_window_size() -> usize { 256 }
fn default_true() -> bool { true }
fn default_db_max() -> i32 { 0 }
fn default_db_min() -> i32 { -70 }
fn default_frame_rate() -> f64 { 25.0 }
fn default_image_height() -> u32 { ENVELOPE_IMAGE_HEIGHT }
fn default_width() -> u32 { 960 }
fn default_height() -> u32 { 540 }
fn default_fps() -> u32 { 30 }
fn default_crf() -> u32 { 18 }
fn default_codec() -> String { "libx264".into() }

pub fn load_config(path: &Path) -> Option<Config> {
    let content = std::fs::read_to_string(path).ok()?;
    match toml::from_str(&content) {
        Ok(config) => Some(config),
        Err(err) => {
            log::warn!("Invalid config {}: {}", path.display(), err);
            None
        }
    }
}

/// Local `audioscope.toml`, then the per-user config locations.
pub fn discover_config() -> Option<PathBuf> {
    let local = PathBuf::from("audioscope.toml");
    if local.exists() {
        return Some(local);
    }
    user_config_path().filter(|p| p.exists()).or_else(|| {
        dirs::config_dir()
            .map(|dir| dir.join("audioscope").join("config.toml"))
            .filter(|p| p.exists())
    })
}

/// `~/.config/audioscope/config.toml`, whether it exists or not.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::home_dir().map(|home| home.join(".config").join("audioscope").join("config.toml"))
}

/// Write the `[spectrogram]` section into `path`, keeping every other
/// section of an existing file.
pub fn save_config(path: &Path, settings: &SpectrogramConfig) -> Result<()> {
    let mut document = match std::fs::read_to_string(path) {
        Ok(content) => content
            .parse::<toml::Table>()
            .with_context(|| format!("Failed to parse config: {}", path.display()))?,
        Err(_) => toml::Table::new(),
    };

    let section = toml::Value::try_from(settings).context("Failed to serialize settings")?;
    document.insert("spectrogram".into(), section);

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    let text = toml::to_string(&document).context("Failed to serialize config")?;
    std::fs::write(path, text).with_context(|| format!("Failed to write config: {}", path.display()))?;
    log::info!("Saved scope settings to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_path(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("audioscope-{}-{}.toml", name, std::process::id()))
    }

    #[test]
    fn empty_file_gives_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.spectrogram, SpectrogramConfig::default());
        assert_eq!(config.envelope.image_height, 400);
        assert_eq!(config.output.codec, "libx264");
        assert!(config.output.font.is_none());

        let params = config.spectrogram.render_parameters();
        assert_eq!(params, RenderParameters::default());
        assert_eq!(config.spectrogram.hud_options(), HudOptions::default());
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let config: Config = toml::from_str(
            r#"
            [spectrogram]
            window_size = 1024
            window_function = "hamming"
            draw_grid = false
            freq_max = 8000

            [output]
            fps = 25
            "#,
        )
        .unwrap();

        let params = config.spectrogram.render_parameters();
        assert_eq!(params.window_size, 1024);
        assert_eq!(params.window, WindowFunction::Hamming);
        assert_eq!(params.freq_max, 8000);
        assert!(params.custom_freq);
        assert!(!config.spectrogram.hud_options().draw_grid);
        assert!(config.spectrogram.hud_options().track_mouse);
        assert_eq!(config.output.fps, 25);
        assert_eq!(config.output.width, 960);
    }

    #[test]
    fn out_of_range_values_are_repaired() {
        let config: Config = toml::from_str(
            r#"
            [spectrogram]
            window_size = 300
            db_min = -500
            db_max = 10
            freq_max = 500
            "#,
        )
        .unwrap();
        let params = config.spectrogram.render_parameters();
        assert_eq!(params.window_size, 256);
        assert_eq!(params.db_min, -120);
        assert_eq!(params.db_max, 0);
        assert_eq!(params.freq_max, 1000);
    }

    #[test]
    fn automatic_frequency_is_saved_as_zero() {
        let mut params = RenderParameters::default();
        params.apply_sampling_rate(48000);
        let saved = SpectrogramConfig::from_scope(&params, HudOptions::default());
        assert_eq!(saved.freq_max, 0);

        params.set_freq_max(12000);
        let saved = SpectrogramConfig::from_scope(&params, HudOptions::default());
        assert_eq!(saved.freq_max, 12000);
    }

    #[test]
    fn save_replaces_only_the_spectrogram_section() {
        let path = temp_path("save");
        std::fs::write(&path, "[output]\nfps = 50\n\n[spectrogram]\nwindow_size = 512\n").unwrap();

        let mut params = RenderParameters::default();
        params.set_window_size(2048);
        params.db_min = -90;
        let settings = SpectrogramConfig::from_scope(
            &params,
            HudOptions {
                draw_grid: false,
                track_mouse: true,
            },
        );
        save_config(&path, &settings).unwrap();

        let config = load_config(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(config.output.fps, 50);
        assert_eq!(config.spectrogram, settings);
        assert_eq!(config.spectrogram.window_size, 2048);
    }

    #[test]
    fn unreadable_config_is_none() {
        let path = temp_path("broken");
        std::fs::write(&path, "[spectrogram\nwindow_size = ").unwrap();
        assert!(load_config(&path).is_none());
        std::fs::remove_file(&path).unwrap();
        assert!(load_config(&path).is_none());
    }
}

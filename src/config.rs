//! User configuration loaded from TOML.

use std::f64::consts::PI;
use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use color_eyre::Result;
use color_eyre::eyre::WrapErr;
use log::info;
use serde::Deserialize;

use crate::easing::{Ease, ease_in_out_cubic, linear};
use crate::surface::Rgb;

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub audio: AudioConfig,
    pub visual: VisualConfig,
    pub display: DisplayConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// FFT block length; the analysers expose half of it as bins.
    pub fft_size: usize,
    /// Weight of the previous frame when smoothing magnitudes (0 = none).
    pub smoothing: f32,
    pub min_db: f32,
    pub max_db: f32,
    /// Length of the play/pause volume fade.
    pub fade_ms: u64,
    pub fade_curve: FadeCurve,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FadeCurve {
    #[default]
    Cubic,
    Linear,
}

impl FadeCurve {
    pub fn ease(self) -> Ease {
        match self {
            FadeCurve::Cubic => ease_in_out_cubic,
            FadeCurve::Linear => linear,
        }
    }
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            fft_size: 512,
            smoothing: 0.8,
            min_db: -100.0,
            max_db: -30.0,
            fade_ms: 100,
            fade_curve: FadeCurve::Cubic,
        }
    }
}

impl AudioConfig {
    pub fn fade_duration(&self) -> Duration {
        Duration::from_millis(self.fade_ms)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VisualConfig {
    /// Radius of the reference ring in pixels.
    pub radius: f64,
    pub ring_width: f64,
    /// Bottom and top colours of the ring gradient.
    pub ring_colors: [Rgb; 2],
    pub bar_width: f64,
    /// Angle both channels fan out from, in radians. 1.5π is 12 o'clock.
    pub angle_offset: f64,
    pub background: Rgb,
}

impl Default for VisualConfig {
    fn default() -> Self {
        Self {
            radius: 150.0,
            ring_width: 3.0,
            ring_colors: [Rgb(0, 0, 255), Rgb(128, 0, 128)],
            bar_width: 3.0,
            angle_offset: 1.5 * PI,
            background: Rgb(0, 0, 0),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DisplayConfig {
    /// Pixel size of one terminal cell, used to map cells onto the viewport.
    pub cell_width_px: u16,
    pub cell_height_px: u16,
    pub frame_ms: u64,
}

impl Default for DisplayConfig {
    fn default() -> Self {
        Self {
            cell_width_px: 8,
            cell_height_px: 16,
            frame_ms: 16,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ConfigError {
    FftSize(usize),
    DecibelRange { min: f32, max: f32 },
    Smoothing(f32),
    CellSize { width: u16, height: u16 },
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ConfigError::FftSize(size) => write!(
                f,
                "fft_size must be a power of two between 32 and 32768, got {}",
                size
            ),
            ConfigError::DecibelRange { min, max } => {
                write!(f, "min_db ({}) must be below max_db ({})", min, max)
            }
            ConfigError::Smoothing(value) => {
                write!(f, "smoothing must be within [0, 1), got {}", value)
            }
            ConfigError::CellSize { width, height } => {
                write!(f, "cell size must be non-zero, got {}x{}", width, height)
            }
        }
    }
}

impl std::error::Error for ConfigError {}

impl Config {
    /// Load from `path`, or from the default location when `None`.
    ///
    /// A missing default file yields the defaults. An explicit path must exist.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(path) => (path.to_path_buf(), true),
            None => match Self::default_path() {
                Some(path) => (path, false),
                None => return Ok(Self::default()),
            },
        };

        if !explicit && !path.exists() {
            info!("no config at {}, using defaults", path.display());
            return Ok(Self::default());
        }

        let text = std::fs::read_to_string(&path)
            .wrap_err_with(|| format!("failed to read config {}", path.display()))?;
        let config = Self::from_toml(&text)
            .wrap_err_with(|| format!("invalid config {}", path.display()))?;
        info!("loaded config from {}", path.display());
        Ok(config)
    }

    pub fn from_toml(text: &str) -> Result<Self> {
        let config: Config = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join("polarscope").join("config.toml"))
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let audio = &self.audio;
        if !audio.fft_size.is_power_of_two() || !(32..=32768).contains(&audio.fft_size) {
            return Err(ConfigError::FftSize(audio.fft_size));
        }
        if !(audio.min_db < audio.max_db) {
            return Err(ConfigError::DecibelRange {
                min: audio.min_db,
                max: audio.max_db,
            });
        }
        if !(0.0..1.0).contains(&audio.smoothing) {
            return Err(ConfigError::Smoothing(audio.smoothing));
        }
        let display = &self.display;
        if display.cell_width_px == 0 || display.cell_height_px == 0 {
            return Err(ConfigError::CellSize {
                width: display.cell_width_px,
                height: display.cell_height_px,
            });
        }
        Ok(())
    }
}

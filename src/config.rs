//! Configuration using Figment
//!
//! Configuration is assembled from, lowest to highest precedence:
//! 1. built-in defaults,
//! 2. an optional TOML file,
//! 3. environment variables prefixed with `DAQ_VIDEO_`, using `__` to
//!    separate sections from keys.
//!
//! ```text
//! DAQ_VIDEO_ACQUISITION__FRAMERATE=200
//! DAQ_VIDEO_SOURCE__KIND=file
//! DAQ_VIDEO_SOURCE__PATH=/data/run_04.rawstack
//! DAQ_VIDEO_LOGGING__LEVEL=debug
//! ```
//!
//! # Example file
//!
//! ```toml
//! [source]
//! kind = "camera"
//! driver = "simulated"
//! downsampling = 2
//! roi = [0, 0, 320, 240]
//!
//! [acquisition]
//! framerate = 200.0
//! rotation = 1
//! n_consumers = 2
//! ring_buffer_length = 1000
//!
//! [logging]
//! level = "info"
//! ```

use crate::acquisition::control::{
    DEFAULT_CONTROL_POLL_TIMEOUT, DEFAULT_REPLAY_FPS, DEFAULT_RING_BUFFER_LENGTH,
    REPLAY_FPS_LIMITS, RING_BUFFER_LENGTH_LIMITS,
};
use crate::acquisition::framerate::DEFAULT_FRAMERATE_WINDOW;
use crate::acquisition::{LoopSettings, DEFAULT_KILL_POLL_TIMEOUT};
use crate::core::Roi;
use crate::error::AcquisitionError;
use crate::source::{
    CameraOptions, CameraRegistry, CameraSource, FilePlayback, FrameSource, VideoFileSource,
};
use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Prefix of environment variable overrides.
pub const ENV_PREFIX: &str = "DAQ_VIDEO_";

/// Configuration error types
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration load error: {0}")]
    LoadError(#[from] figment::Error),
    #[error("Configuration validation error: {0}")]
    ValidationError(String),
}

impl From<ConfigError> for AcquisitionError {
    fn from(err: ConfigError) -> Self {
        AcquisitionError::Configuration(err.to_string())
    }
}

/// Top-level configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AcquisitionConfig {
    /// Where frames come from
    #[serde(default)]
    pub source: SourceConfig,
    /// Loop behaviour
    #[serde(default)]
    pub acquisition: LoopConfig,
    /// Log output
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Frame source kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// A camera driver from the registry
    #[default]
    Camera,
    /// A video file
    File,
}

/// Frame source configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceConfig {
    /// camera or file
    #[serde(default)]
    pub kind: SourceKind,
    /// Camera driver name (camera sources)
    #[serde(default = "default_driver")]
    pub driver: String,
    /// Video file (file sources)
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Restart file and replay playback instead of stopping
    #[serde(default = "default_loop", rename = "loop")]
    pub loop_playback: bool,
    /// First file frame, and initial replay offset
    #[serde(default)]
    pub offset: usize,
    /// Camera binning factor
    #[serde(default = "default_downsampling")]
    pub downsampling: u32,
    /// Camera region `[x, y, width, height]`; negative values mean full sensor
    #[serde(default)]
    pub roi: Option<[i64; 4]>,
}

/// Acquisition loop configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoopConfig {
    /// Live pacing target in Hz; defaults to the source's own rate
    #[serde(default)]
    pub framerate: Option<f64>,
    /// Counter-clockwise quarter turns (0-3)
    #[serde(default)]
    pub rotation: u8,
    /// Consumers sharing the output queue
    #[serde(default = "default_n_consumers")]
    pub n_consumers: usize,
    /// Hard capacity of the output queue
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Frames kept for pause and replay
    #[serde(default = "default_ring_buffer_length")]
    pub ring_buffer_length: usize,
    /// Start in replay mode
    #[serde(default)]
    pub replay: bool,
    /// Replay rate in Hz
    #[serde(default = "default_replay_fps")]
    pub replay_fps: f64,
    /// Wait when polling for control updates (µs)
    #[serde(default = "default_control_poll_timeout_us")]
    pub control_poll_timeout_us: u64,
    /// Wait when polling the kill signal (µs)
    #[serde(default = "default_kill_poll_timeout_us")]
    pub kill_poll_timeout_us: u64,
    /// Emissions averaged by the framerate meter
    #[serde(default = "default_framerate_window")]
    pub framerate_window: usize,
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub level: String,
}

// ============================================================================
// Default value functions
// ============================================================================

fn default_driver() -> String {
    "simulated".to_string()
}

fn default_loop() -> bool {
    true
}

fn default_downsampling() -> u32 {
    1
}

fn default_n_consumers() -> usize {
    1
}

fn default_queue_capacity() -> usize {
    16
}

fn default_ring_buffer_length() -> usize {
    DEFAULT_RING_BUFFER_LENGTH
}

fn default_replay_fps() -> f64 {
    DEFAULT_REPLAY_FPS
}

fn default_control_poll_timeout_us() -> u64 {
    DEFAULT_CONTROL_POLL_TIMEOUT.as_micros() as u64
}

fn default_kill_poll_timeout_us() -> u64 {
    DEFAULT_KILL_POLL_TIMEOUT.as_micros() as u64
}

fn default_framerate_window() -> usize {
    DEFAULT_FRAMERATE_WINDOW
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::default(),
            driver: default_driver(),
            path: None,
            loop_playback: default_loop(),
            offset: 0,
            downsampling: default_downsampling(),
            roi: None,
        }
    }
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            framerate: None,
            rotation: 0,
            n_consumers: default_n_consumers(),
            queue_capacity: default_queue_capacity(),
            ring_buffer_length: default_ring_buffer_length(),
            replay: false,
            replay_fps: default_replay_fps(),
            control_poll_timeout_us: default_control_poll_timeout_us(),
            kill_poll_timeout_us: default_kill_poll_timeout_us(),
            framerate_window: default_framerate_window(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

// ============================================================================
// Configuration Loading and Validation
// ============================================================================

impl AcquisitionConfig {
    /// Defaults, then `path` (if given), then `DAQ_VIDEO_` environment variables.
    pub fn figment(path: Option<&Path>) -> Figment {
        let mut figment = Figment::from(Serialized::defaults(AcquisitionConfig::default()));
        if let Some(path) = path {
            figment = figment.merge(Toml::file(path));
        }
        figment.merge(Env::prefixed(ENV_PREFIX).split("__"))
    }

    /// Load and validate configuration.
    ///
    /// # Errors
    ///
    /// Returns a ConfigError if the file cannot be parsed or validation fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        Self::from_figment(Self::figment(path))
    }

    /// Load configuration without validating it.
    ///
    /// For callers that layer further overrides (command-line flags) on top
    /// and call [`AcquisitionConfig::validate`] afterwards.
    ///
    /// # Errors
    ///
    /// Returns a ConfigError if the file cannot be parsed.
    pub fn load_unvalidated(path: Option<&Path>) -> Result<Self, ConfigError> {
        Ok(Self::figment(path).extract()?)
    }

    /// Extract and validate configuration from an arbitrary figment.
    pub fn from_figment(figment: Figment) -> Result<Self, ConfigError> {
        let config: Self = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration after loading
    ///
    /// Checks:
    /// - Framerate, if set, is positive and finite
    /// - Rotation is 0-3
    /// - At least one consumer, and room for `n_consumers + 2` queued frames
    /// - Ring buffer length and replay rate are within control limits
    /// - File sources name a file
    /// - Downsampling is at least 1 and the ROI is well formed
    /// - Log level is valid
    pub fn validate(&self) -> Result<(), ConfigError> {
        let acq = &self.acquisition;
        if let Some(rate) = acq.framerate {
            if !rate.is_finite() || rate <= 0.0 {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid framerate {}. Must be positive",
                    rate
                )));
            }
        }

        if acq.rotation > 3 {
            return Err(ConfigError::ValidationError(format!(
                "Invalid rotation {}. Must be 0-3",
                acq.rotation
            )));
        }

        if acq.n_consumers == 0 {
            return Err(ConfigError::ValidationError(
                "n_consumers must be at least 1".to_string(),
            ));
        }

        if acq.queue_capacity < acq.n_consumers + 2 {
            return Err(ConfigError::ValidationError(format!(
                "queue_capacity {} cannot hold n_consumers + 2 = {} frames",
                acq.queue_capacity,
                acq.n_consumers + 2
            )));
        }

        let (min_len, max_len) = RING_BUFFER_LENGTH_LIMITS;
        if (acq.ring_buffer_length as f64) < min_len || (acq.ring_buffer_length as f64) > max_len {
            return Err(ConfigError::ValidationError(format!(
                "Invalid ring_buffer_length {}. Must be {}-{}",
                acq.ring_buffer_length, min_len, max_len
            )));
        }

        let (min_fps, max_fps) = REPLAY_FPS_LIMITS;
        if !(min_fps..=max_fps).contains(&acq.replay_fps) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid replay_fps {}. Must be {}-{}",
                acq.replay_fps, min_fps, max_fps
            )));
        }

        if self.source.kind == SourceKind::File && self.source.path.is_none() {
            return Err(ConfigError::ValidationError(
                "File source requires 'path'".to_string(),
            ));
        }

        if self.source.downsampling == 0 {
            return Err(ConfigError::ValidationError(
                "downsampling must be at least 1".to_string(),
            ));
        }

        if let Some(roi) = &self.source.roi {
            if Roi::from_values(roi).is_none() {
                return Err(ConfigError::ValidationError(format!(
                    "Invalid roi {:?}",
                    roi
                )));
            }
        }

        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.logging.level.as_str()) {
            return Err(ConfigError::ValidationError(format!(
                "Invalid log level '{}'. Must be one of: {}",
                self.logging.level,
                valid_levels.join(", ")
            )));
        }

        Ok(())
    }

    /// Loop settings described by this configuration.
    pub fn loop_settings(&self) -> LoopSettings {
        let acq = &self.acquisition;
        LoopSettings {
            framerate: acq.framerate,
            rotation: acq.rotation,
            n_consumers: acq.n_consumers,
            ring_buffer_length: acq.ring_buffer_length,
            replay: acq.replay,
            replay_fps: acq.replay_fps,
            offset: self.source.offset,
            loop_playback: self.source.loop_playback,
            control_poll_timeout: Duration::from_micros(acq.control_poll_timeout_us),
            kill_poll_timeout: Duration::from_micros(acq.kill_poll_timeout_us),
            framerate_window: acq.framerate_window,
        }
    }

    /// Build the configured (unopened) frame source.
    pub fn build_source(
        &self,
        registry: &CameraRegistry,
    ) -> Result<Box<dyn FrameSource>, AcquisitionError> {
        match self.source.kind {
            SourceKind::Camera => {
                let options = CameraOptions {
                    downsampling: self.source.downsampling,
                    roi: self.source.roi.as_ref().and_then(|r| Roi::from_values(r)).flatten(),
                };
                let driver = registry.create(&self.source.driver, options)?;
                Ok(Box::new(CameraSource::new(driver)))
            }
            SourceKind::File => {
                let path = self.source.path.as_deref().ok_or_else(|| {
                    AcquisitionError::Configuration("File source requires 'path'".to_string())
                })?;
                let playback = FilePlayback {
                    loop_playback: self.source.loop_playback,
                    offset: self.source.offset,
                };
                Ok(Box::new(VideoFileSource::open_path(path, playback)?))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn from_toml(toml: &str) -> Result<AcquisitionConfig, ConfigError> {
        AcquisitionConfig::from_figment(
            Figment::from(Serialized::defaults(AcquisitionConfig::default()))
                .merge(Toml::string(toml)),
        )
    }

    #[test]
    fn test_defaults_are_valid() {
        let config = AcquisitionConfig::default();
        config.validate().unwrap();
        let settings = config.loop_settings();
        assert_eq!(settings.ring_buffer_length, 600);
        assert_eq!(settings.replay_fps, 15.0);
        assert_eq!(settings.kill_poll_timeout, Duration::from_micros(100));
        assert!(!settings.replay);
    }

    #[test]
    fn test_toml_overrides() {
        let config = from_toml(
            r#"
            [source]
            kind = "file"
            path = "clip.rawstack"
            loop = false
            offset = 5

            [acquisition]
            framerate = 200.0
            rotation = 2
            "#,
        )
        .unwrap();
        assert_eq!(config.source.kind, SourceKind::File);
        assert!(!config.source.loop_playback);
        let settings = config.loop_settings();
        assert_eq!(settings.framerate, Some(200.0));
        assert_eq!(settings.offset, 5);
        assert!(!settings.loop_playback);
    }

    #[test]
    fn test_validation_errors() {
        let cases = [
            "[acquisition]\nrotation = 4",
            "[acquisition]\nn_consumers = 0",
            "[acquisition]\nring_buffer_length = 0",
            "[acquisition]\nreplay_fps = 900.0",
            "[acquisition]\nn_consumers = 20\nqueue_capacity = 4",
            "[source]\nkind = \"file\"",
            "[logging]\nlevel = \"loud\"",
        ];
        for case in cases {
            assert!(
                matches!(from_toml(case), Err(ConfigError::ValidationError(_))),
                "expected validation error for {case:?}"
            );
        }
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[acquisition]\nn_consumers = 3\nqueue_capacity = 8").unwrap();
        let figment = Figment::from(Serialized::defaults(AcquisitionConfig::default()))
            .merge(Toml::file(file.path()));
        let config = AcquisitionConfig::from_figment(figment).unwrap();
        assert_eq!(config.acquisition.n_consumers, 3);
    }

    #[test]
    fn test_unvalidated_load_accepts_later_overrides() {
        let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
        writeln!(file, "[source]\nkind = \"file\"").unwrap();
        assert!(matches!(
            AcquisitionConfig::load(Some(file.path())),
            Err(ConfigError::ValidationError(_))
        ));

        let mut config = AcquisitionConfig::load_unvalidated(Some(file.path())).unwrap();
        assert_eq!(config.source.kind, SourceKind::File);
        config.source.path = Some(PathBuf::from("clip.rawstack"));
        config.validate().unwrap();
    }

    #[test]
    fn test_build_sources() {
        let registry = CameraRegistry::with_defaults();
        let camera = AcquisitionConfig::default().build_source(&registry).unwrap();
        assert!(camera.describe().contains("simulated"));

        let mut config = AcquisitionConfig::default();
        config.source.driver = "avt".to_string();
        assert!(matches!(
            config.build_source(&registry).err().unwrap(),
            AcquisitionError::UnknownSource(_)
        ));

        config.source.kind = SourceKind::File;
        config.source.path = Some(PathBuf::from("clip.mp4"));
        assert!(matches!(
            config.build_source(&registry).err().unwrap(),
            AcquisitionError::UnsupportedFile(_)
        ));
    }
}

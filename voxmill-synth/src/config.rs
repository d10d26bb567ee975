//! Configuration for voxmill-synth
//!
//! Settings sources, highest priority first:
//!
//! 1. Command-line arguments (`--port`, `--root-folder`, `--config`)
//! 2. Environment variables (`VOXMILL_*`)
//! 3. TOML configuration file
//! 4. Built-in defaults (code constants)
//!
//! Relative directories are resolved against the root folder.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use tracing::info;
use voxmill_common::config::{env_override, load_toml_config, parse_env_override, LoggingConfig};
use voxmill_common::{Error, Result};

use crate::engine::{TtsEngineKind, VcEngineKind};

/// Default HTTP port
pub const DEFAULT_PORT: u16 = 8000;

/// Default output sample rate
pub const DEFAULT_SAMPLE_RATE: u32 = 22050;

/// Largest accepted batch
pub const DEFAULT_MAX_BATCH_ITEMS: usize = 50;

const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Raw TOML file contents; every key is optional
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TomlConfig {
    #[serde(default)]
    pub root_folder: Option<PathBuf>,
    #[serde(default)]
    pub port: Option<u16>,
    #[serde(default)]
    pub tts_engine: Option<String>,
    #[serde(default)]
    pub vc_engine: Option<String>,
    #[serde(default)]
    pub sample_rate: Option<u32>,
    #[serde(default)]
    pub target_lufs: Option<f64>,
    #[serde(default)]
    pub output_dir: Option<PathBuf>,
    #[serde(default)]
    pub speaker_dir: Option<PathBuf>,
    #[serde(default)]
    pub models_dir: Option<PathBuf>,
    #[serde(default)]
    pub require_model_assets: Option<bool>,
    #[serde(default)]
    pub allowed_origins: Option<Vec<String>>,
    #[serde(default)]
    pub max_batch_items: Option<usize>,
    #[serde(default)]
    pub event_capacity: Option<usize>,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Resolved service settings
#[derive(Debug, Clone)]
pub struct Settings {
    pub root_folder: PathBuf,
    pub port: u16,
    pub tts_engine: TtsEngineKind,
    pub vc_engine: VcEngineKind,
    pub sample_rate: u32,
    pub target_lufs: f64,
    pub output_dir: PathBuf,
    pub speaker_dir: PathBuf,
    pub models_dir: PathBuf,
    /// Refuse to load an engine whose model directory is missing
    pub require_model_assets: bool,
    /// CORS origins
    pub allowed_origins: Vec<String>,
    pub max_batch_items: usize,
    /// EventBus channel capacity
    pub event_capacity: usize,
    pub logging: LoggingConfig,
}

impl Settings {
    /// Built-in defaults rooted at `root_folder`
    pub fn defaults(root_folder: impl Into<PathBuf>) -> Self {
        let root_folder = root_folder.into();
        Self {
            port: DEFAULT_PORT,
            tts_engine: TtsEngineKind::Xtts,
            vc_engine: VcEngineKind::Rvc,
            sample_rate: DEFAULT_SAMPLE_RATE,
            target_lufs: crate::audio::loudness::DEFAULT_TARGET_LUFS,
            output_dir: root_folder.join("outputs"),
            speaker_dir: root_folder.join("speakers"),
            models_dir: root_folder.join("models"),
            require_model_assets: false,
            allowed_origins: vec![
                "http://localhost:3000".to_string(),
                "http://localhost:5173".to_string(),
            ],
            max_batch_items: DEFAULT_MAX_BATCH_ITEMS,
            event_capacity: DEFAULT_EVENT_CAPACITY,
            logging: LoggingConfig::default(),
            root_folder,
        }
    }

    /// Load settings: defaults, then the TOML file (if it exists), then environment
    pub fn load(root_folder: impl Into<PathBuf>, config_file: Option<&Path>) -> Result<Self> {
        let toml = match config_file {
            Some(path) if path.exists() => load_toml_config::<TomlConfig>(path)?,
            _ => TomlConfig::default(),
        };
        let mut settings = Self::defaults(root_folder);
        settings.apply_toml(toml)?;
        settings.apply_env()?;
        settings.validate()?;

        info!(
            tts_engine = %settings.tts_engine,
            vc_engine = %settings.vc_engine,
            sample_rate = settings.sample_rate,
            target_lufs = settings.target_lufs,
            output_dir = %settings.output_dir.display(),
            "Settings loaded"
        );
        Ok(settings)
    }

    fn apply_toml(&mut self, toml: TomlConfig) -> Result<()> {
        if let Some(port) = toml.port {
            self.port = port;
        }
        if let Some(tag) = toml.tts_engine {
            self.tts_engine = tag.parse().map_err(Error::Config)?;
        }
        if let Some(tag) = toml.vc_engine {
            self.vc_engine = tag.parse().map_err(Error::Config)?;
        }
        if let Some(rate) = toml.sample_rate {
            self.sample_rate = rate;
        }
        if let Some(target) = toml.target_lufs {
            self.target_lufs = target;
        }
        if let Some(dir) = toml.output_dir {
            self.output_dir = self.under_root(dir);
        }
        if let Some(dir) = toml.speaker_dir {
            self.speaker_dir = self.under_root(dir);
        }
        if let Some(dir) = toml.models_dir {
            self.models_dir = self.under_root(dir);
        }
        if let Some(required) = toml.require_model_assets {
            self.require_model_assets = required;
        }
        if let Some(origins) = toml.allowed_origins {
            self.allowed_origins = origins;
        }
        if let Some(max) = toml.max_batch_items {
            self.max_batch_items = max;
        }
        if let Some(capacity) = toml.event_capacity {
            self.event_capacity = capacity;
        }
        self.logging = toml.logging;
        Ok(())
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(kind) = parse_env_override::<TtsEngineKind>("VOXMILL_TTS_ENGINE")? {
            self.tts_engine = kind;
        }
        if let Some(kind) = parse_env_override::<VcEngineKind>("VOXMILL_VC_ENGINE")? {
            self.vc_engine = kind;
        }
        if let Some(rate) = parse_env_override("VOXMILL_SAMPLE_RATE")? {
            self.sample_rate = rate;
        }
        if let Some(target) = parse_env_override("VOXMILL_TARGET_LUFS")? {
            self.target_lufs = target;
        }
        if let Some(dir) = env_override("VOXMILL_OUTPUT_DIR") {
            self.output_dir = self.under_root(dir);
        }
        if let Some(dir) = env_override("VOXMILL_SPEAKER_DIR") {
            self.speaker_dir = self.under_root(dir);
        }
        if let Some(dir) = env_override("VOXMILL_MODELS_DIR") {
            self.models_dir = self.under_root(dir);
        }
        if let Some(required) = parse_env_override("VOXMILL_REQUIRE_MODEL_ASSETS")? {
            self.require_model_assets = required;
        }
        if let Some(origins) = env_override("VOXMILL_ALLOWED_ORIGINS") {
            self.allowed_origins = origins
                .split(',')
                .map(str::trim)
                .filter(|o| !o.is_empty())
                .map(String::from)
                .collect();
        }
        if let Some(max) = parse_env_override("VOXMILL_MAX_BATCH_ITEMS")? {
            self.max_batch_items = max;
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        if self.sample_rate == 0 {
            return Err(Error::Config("sample_rate must be positive".into()));
        }
        if !self.target_lufs.is_finite() {
            return Err(Error::Config("target_lufs must be finite".into()));
        }
        if self.max_batch_items == 0 {
            return Err(Error::Config("max_batch_items must be at least 1".into()));
        }
        if self.event_capacity == 0 {
            return Err(Error::Config("event_capacity must be at least 1".into()));
        }
        Ok(())
    }

    fn under_root(&self, dir: impl Into<PathBuf>) -> PathBuf {
        let dir = dir.into();
        if dir.is_absolute() {
            dir
        } else {
            self.root_folder.join(dir)
        }
    }

    /// Create the output and speaker directories if missing
    pub fn ensure_directories(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.output_dir)?;
        std::fs::create_dir_all(&self.speaker_dir)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;

    fn clear_env() {
        for name in [
            "VOXMILL_TTS_ENGINE",
            "VOXMILL_VC_ENGINE",
            "VOXMILL_SAMPLE_RATE",
            "VOXMILL_TARGET_LUFS",
            "VOXMILL_OUTPUT_DIR",
            "VOXMILL_SPEAKER_DIR",
            "VOXMILL_MODELS_DIR",
            "VOXMILL_REQUIRE_MODEL_ASSETS",
            "VOXMILL_ALLOWED_ORIGINS",
            "VOXMILL_MAX_BATCH_ITEMS",
        ] {
            std::env::remove_var(name);
        }
    }

    fn toml_file(body: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "{}", body).unwrap();
        file
    }

    #[test]
    #[serial]
    fn test_defaults_without_file() {
        clear_env();
        let settings = Settings::load("/srv/voxmill", None).unwrap();
        assert_eq!(settings.port, 8000);
        assert_eq!(settings.tts_engine, TtsEngineKind::Xtts);
        assert_eq!(settings.vc_engine, VcEngineKind::Rvc);
        assert_eq!(settings.sample_rate, 22050);
        assert_eq!(settings.target_lufs, -16.0);
        assert_eq!(settings.output_dir, PathBuf::from("/srv/voxmill/outputs"));
        assert_eq!(settings.max_batch_items, 50);
        assert!(!settings.require_model_assets);
    }

    #[test]
    #[serial]
    fn test_toml_values_applied() {
        clear_env();
        let file = toml_file(
            r#"
            tts_engine = "bark"
            vc_engine = "sovits"
            target_lufs = -20.0
            output_dir = "wav"
            speaker_dir = "/opt/speakers"

            [logging]
            level = "debug"
            "#,
        );
        let settings = Settings::load("/srv/voxmill", Some(file.path())).unwrap();
        assert_eq!(settings.tts_engine, TtsEngineKind::Bark);
        assert_eq!(settings.vc_engine, VcEngineKind::SoVits);
        assert_eq!(settings.target_lufs, -20.0);
        assert_eq!(settings.output_dir, PathBuf::from("/srv/voxmill/wav"));
        assert_eq!(settings.speaker_dir, PathBuf::from("/opt/speakers"));
        assert_eq!(settings.logging.level, "debug");
    }

    #[test]
    #[serial]
    fn test_env_beats_toml() {
        clear_env();
        let file = toml_file("tts_engine = \"bark\"\nmax_batch_items = 10\n");
        std::env::set_var("VOXMILL_TTS_ENGINE", "openvoice");
        std::env::set_var("VOXMILL_ALLOWED_ORIGINS", "https://a.example, https://b.example");

        let settings = Settings::load("/srv/voxmill", Some(file.path())).unwrap();
        assert_eq!(settings.tts_engine, TtsEngineKind::OpenVoice);
        assert_eq!(settings.max_batch_items, 10);
        assert_eq!(settings.allowed_origins, vec!["https://a.example", "https://b.example"]);
        clear_env();
    }

    #[test]
    #[serial]
    fn test_invalid_engine_tag_is_config_error() {
        clear_env();
        let file = toml_file("vc_engine = \"diffsinger\"\n");
        assert!(matches!(
            Settings::load("/srv/voxmill", Some(file.path())),
            Err(Error::Config(_))
        ));

        std::env::set_var("VOXMILL_TTS_ENGINE", "tacotron");
        assert!(matches!(Settings::load("/srv/voxmill", None), Err(Error::Config(_))));
        clear_env();
    }

    #[test]
    #[serial]
    fn test_zero_batch_limit_rejected() {
        clear_env();
        let file = toml_file("max_batch_items = 0\n");
        assert!(Settings::load("/srv/voxmill", Some(file.path())).is_err());
    }
}

//! Synthesis engine abstraction
//!
//! Engines are selected by closed enums ([`TtsEngineKind`], [`VcEngineKind`])
//! and reached through the [`TtsEngine`] / [`VcEngine`] traits, so a real
//! model can replace the placeholder implementations without touching the
//! pipeline or the batch orchestrator.

pub mod placeholder;

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::Mutex;
use tracing::info;

use crate::audio::spectral::ratio_to_semitones;
use crate::audio::{AudioBuffer, F0Method, TransformParameters};
use crate::speakers::SpeakerProfile;

pub use placeholder::{PlaceholderTtsEngine, PlaceholderVcEngine};

/// Engine failures
#[derive(Debug, Error)]
pub enum EngineError {
    /// Model weights or other assets are missing
    #[error("{0}")]
    ResourceNotFound(String),

    /// Inference failed
    #[error("{0}")]
    ProcessingFailure(String),
}

/// Text-to-speech engine variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TtsEngineKind {
    Xtts,
    OpenVoice,
    Bark,
}

impl TtsEngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            TtsEngineKind::Xtts => "xtts",
            TtsEngineKind::OpenVoice => "openvoice",
            TtsEngineKind::Bark => "bark",
        }
    }

    /// Language codes accepted by this engine
    pub fn supported_languages(&self) -> &'static [&'static str] {
        match self {
            TtsEngineKind::Xtts => &["zh", "en", "ja", "ko", "es", "fr", "de", "it"],
            TtsEngineKind::OpenVoice => &["zh", "en", "ja", "ko"],
            TtsEngineKind::Bark => &["zh", "en", "multilingual"],
        }
    }

    pub fn supports_language(&self, language: &str) -> bool {
        self.supported_languages().contains(&language)
    }
}

impl fmt::Display for TtsEngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TtsEngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "xtts" => Ok(TtsEngineKind::Xtts),
            "openvoice" => Ok(TtsEngineKind::OpenVoice),
            "bark" => Ok(TtsEngineKind::Bark),
            other => Err(format!(
                "unsupported TTS engine '{}' (expected xtts, openvoice or bark)",
                other
            )),
        }
    }
}

/// Voice-conversion engine variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VcEngineKind {
    Rvc,
    SoVits,
}

impl VcEngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            VcEngineKind::Rvc => "rvc",
            VcEngineKind::SoVits => "sovits",
        }
    }

    /// Voices bundled with the engine itself
    pub fn engine_voices(&self) -> &'static [&'static str] {
        match self {
            VcEngineKind::Rvc => &["speaker_001", "speaker_002", "speaker_003"],
            VcEngineKind::SoVits => &["voice_a", "voice_b", "voice_c", "voice_d"],
        }
    }

    /// Spectral transform settings this engine derives from a voice target
    ///
    /// RVC shifts by the profile's octave offset. SoVITS shifts by the
    /// profile's F0 ratio scaled by the F0 method factor and adds the formant
    /// ripple.
    pub fn transform_parameters(&self, target: &VoiceTarget) -> TransformParameters {
        let profile = &target.profile;
        let semitones = match self {
            VcEngineKind::Rvc => profile.pitch_offset * 12.0,
            VcEngineKind::SoVits => {
                ratio_to_semitones(profile.pitch_ratio * target.f0_method.factor())
            }
        };

        let mut params = TransformParameters::new(profile.id.clone())
            .with_coloring(profile.coloring)
            .with_preserve_pitch(target.preserve_pitch)
            .with_f0_method(target.f0_method)
            .with_formant_ripple(*self == VcEngineKind::SoVits);
        params.pitch_semitones = semitones;
        params
    }
}

impl fmt::Display for VcEngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for VcEngineKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "rvc" => Ok(VcEngineKind::Rvc),
            "sovits" => Ok(VcEngineKind::SoVits),
            other => Err(format!(
                "unsupported VC engine '{}' (expected rvc or sovits)",
                other
            )),
        }
    }
}

/// One synthesis call
#[derive(Debug, Clone, PartialEq)]
pub struct TtsRequest {
    pub text: String,
    pub speaker_id: String,
    pub language: String,
    pub speed: f32,
    pub emotion: String,
}

/// Conversion target resolved from a speaker id
#[derive(Debug, Clone)]
pub struct VoiceTarget {
    pub profile: SpeakerProfile,
    pub preserve_pitch: bool,
    pub f0_method: F0Method,
}

/// Text-to-speech capability
#[async_trait]
pub trait TtsEngine: Send + Sync {
    fn kind(&self) -> TtsEngineKind;

    async fn synthesize(&self, request: &TtsRequest) -> Result<AudioBuffer, EngineError>;
}

/// Voice-conversion capability
#[async_trait]
pub trait VcEngine: Send + Sync {
    fn kind(&self) -> VcEngineKind;

    /// Engine-level conversion before the spectral transform
    async fn convert(&self, source: &AudioBuffer, target: &VoiceTarget) -> Result<AudioBuffer, EngineError>;

    fn transform_parameters(&self, target: &VoiceTarget) -> TransformParameters {
        self.kind().transform_parameters(target)
    }
}

/// Engine handle; the mutex serializes calls into one engine instance
pub type SharedTtsEngine = Arc<Mutex<Box<dyn TtsEngine>>>;
pub type SharedVcEngine = Arc<Mutex<Box<dyn VcEngine>>>;

/// Lazily loads and caches one engine instance per kind
pub struct EngineRegistry {
    models_dir: PathBuf,
    require_model_assets: bool,
    sample_rate: u32,
    tts: Mutex<HashMap<TtsEngineKind, SharedTtsEngine>>,
    vc: Mutex<HashMap<VcEngineKind, SharedVcEngine>>,
}

impl EngineRegistry {
    pub fn new(models_dir: impl Into<PathBuf>, require_model_assets: bool, sample_rate: u32) -> Self {
        Self {
            models_dir: models_dir.into(),
            require_model_assets,
            sample_rate,
            tts: Mutex::new(HashMap::new()),
            vc: Mutex::new(HashMap::new()),
        }
    }

    /// Cached engine for `kind`, loading it on first use
    pub async fn acquire_tts(&self, kind: TtsEngineKind) -> Result<SharedTtsEngine, EngineError> {
        let mut engines = self.tts.lock().await;
        if let Some(engine) = engines.get(&kind) {
            return Ok(Arc::clone(engine));
        }

        let model_path = self.models_dir.join("tts").join(kind.as_str());
        self.check_assets(&model_path, kind.as_str())?;

        let engine: SharedTtsEngine = Arc::new(Mutex::new(Box::new(PlaceholderTtsEngine::new(
            kind,
            self.sample_rate,
        ))));
        engines.insert(kind, Arc::clone(&engine));
        info!(engine = %kind, model_path = %model_path.display(), "Loaded TTS engine");
        Ok(engine)
    }

    pub async fn acquire_vc(&self, kind: VcEngineKind) -> Result<SharedVcEngine, EngineError> {
        let mut engines = self.vc.lock().await;
        if let Some(engine) = engines.get(&kind) {
            return Ok(Arc::clone(engine));
        }

        let model_path = self.models_dir.join("vc").join(kind.as_str());
        self.check_assets(&model_path, kind.as_str())?;

        let engine: SharedVcEngine = Arc::new(Mutex::new(Box::new(PlaceholderVcEngine::new(kind))));
        engines.insert(kind, Arc::clone(&engine));
        info!(engine = %kind, model_path = %model_path.display(), "Loaded VC engine");
        Ok(engine)
    }

    /// Install an engine instance, replacing any cached one of the same kind
    pub async fn install_tts_engine(&self, engine: Box<dyn TtsEngine>) {
        let kind = engine.kind();
        self.tts.lock().await.insert(kind, Arc::new(Mutex::new(engine)));
    }

    pub async fn install_vc_engine(&self, engine: Box<dyn VcEngine>) {
        let kind = engine.kind();
        self.vc.lock().await.insert(kind, Arc::new(Mutex::new(engine)));
    }

    /// Keys of loaded engines (`tts_xtts`, `vc_rvc`, ...), sorted
    pub async fn loaded_engines(&self) -> Vec<String> {
        let mut loaded: Vec<String> = self
            .tts
            .lock()
            .await
            .keys()
            .map(|k| format!("tts_{}", k))
            .collect();
        loaded.extend(self.vc.lock().await.keys().map(|k| format!("vc_{}", k)));
        loaded.sort();
        loaded
    }

    pub async fn is_tts_loaded(&self, kind: TtsEngineKind) -> bool {
        self.tts.lock().await.contains_key(&kind)
    }

    pub async fn is_vc_loaded(&self, kind: VcEngineKind) -> bool {
        self.vc.lock().await.contains_key(&kind)
    }

    fn check_assets(&self, model_path: &Path, engine: &str) -> Result<(), EngineError> {
        if self.require_model_assets && !model_path.exists() {
            return Err(EngineError::ResourceNotFound(format!(
                "model assets for '{}' not found at {}",
                engine,
                model_path.display()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::BandColoring;
    use crate::speakers::SpeakerRegistry;

    fn target(id: &str, preserve_pitch: bool, f0_method: F0Method) -> VoiceTarget {
        let registry = SpeakerRegistry::new("/nonexistent");
        VoiceTarget {
            profile: registry.get(id).unwrap(),
            preserve_pitch,
            f0_method,
        }
    }

    #[test]
    fn test_engine_tags_parse() {
        assert_eq!("xtts".parse::<TtsEngineKind>().unwrap(), TtsEngineKind::Xtts);
        assert_eq!("OpenVoice".parse::<TtsEngineKind>().unwrap(), TtsEngineKind::OpenVoice);
        assert_eq!("sovits".parse::<VcEngineKind>().unwrap(), VcEngineKind::SoVits);
        assert!("tacotron".parse::<TtsEngineKind>().is_err());
        assert!("rvc2".parse::<VcEngineKind>().is_err());
        assert_eq!(serde_json::to_value(TtsEngineKind::OpenVoice).unwrap(), "openvoice");
    }

    #[test]
    fn test_supported_languages() {
        assert!(TtsEngineKind::Xtts.supports_language("fr"));
        assert!(!TtsEngineKind::OpenVoice.supports_language("fr"));
        assert!(TtsEngineKind::Bark.supports_language("multilingual"));
    }

    #[test]
    fn test_sovits_applies_f0_factor() {
        let params = VcEngineKind::SoVits.transform_parameters(&target("speaker_001", false, F0Method::Dio));
        let expected = 12.0 * (1.15f32 * 1.1).log2();
        assert!((params.pitch_semitones - expected).abs() < 1e-4);
        assert_eq!(params.coloring, BandColoring::new(1.1, 0.9, 1.2));
        assert_eq!(params.f0_method, F0Method::Dio);
        assert!(params.formant_ripple);
    }

    #[test]
    fn test_rvc_uses_octave_offset() {
        let params = VcEngineKind::Rvc.transform_parameters(&target("speaker_003", false, F0Method::Dio));
        assert!((params.pitch_semitones - 1.2).abs() < 1e-5);
        assert!(!params.formant_ripple);

        let preserved = VcEngineKind::Rvc.transform_parameters(&target("speaker_003", true, F0Method::Harvest));
        assert_eq!(preserved.effective_semitones(), 0.0);
    }

    #[tokio::test]
    async fn test_registry_caches_engines() {
        let registry = EngineRegistry::new("/nonexistent", false, 22050);
        assert!(registry.loaded_engines().await.is_empty());

        let first = registry.acquire_tts(TtsEngineKind::Bark).await.unwrap();
        let second = registry.acquire_tts(TtsEngineKind::Bark).await.unwrap();
        assert!(Arc::ptr_eq(&first, &second));

        registry.acquire_vc(VcEngineKind::Rvc).await.unwrap();
        assert_eq!(registry.loaded_engines().await, vec!["tts_bark", "vc_rvc"]);
        assert!(registry.is_tts_loaded(TtsEngineKind::Bark).await);
        assert!(!registry.is_vc_loaded(VcEngineKind::SoVits).await);
    }

    #[tokio::test]
    async fn test_missing_assets_when_required() {
        let dir = tempfile::tempdir().unwrap();
        let registry = EngineRegistry::new(dir.path(), true, 22050);
        assert!(matches!(
            registry.acquire_tts(TtsEngineKind::Xtts).await,
            Err(EngineError::ResourceNotFound(_))
        ));

        std::fs::create_dir_all(dir.path().join("tts").join("xtts")).unwrap();
        assert!(registry.acquire_tts(TtsEngineKind::Xtts).await.is_ok());
    }
}

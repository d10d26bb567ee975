//! Speaker profiles: built-in voices plus JSON files in the speaker directory

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::audio::BandColoring;
use crate::engine::VcEngineKind;
use crate::error::{Result, SynthError};

/// Voice identity and the parameters the spectral transform derives from it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SpeakerProfile {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default = "default_language")]
    pub language: String,
    #[serde(default = "default_gender")]
    pub gender: String,
    #[serde(default = "default_sample_rate")]
    pub sample_rate: u32,
    #[serde(default)]
    pub model_path: String,
    /// Target/source F0 ratio (SoVITS path)
    #[serde(default = "default_pitch_ratio")]
    pub pitch_ratio: f32,
    /// Pitch offset in octaves (RVC path)
    #[serde(default)]
    pub pitch_offset: f32,
    #[serde(default)]
    pub coloring: BandColoring,
    /// Engine-specific settings, passed through untouched
    #[serde(default)]
    pub config: serde_json::Map<String, serde_json::Value>,
}

fn default_language() -> String {
    "zh".to_string()
}

fn default_gender() -> String {
    "unknown".to_string()
}

fn default_sample_rate() -> u32 {
    22050
}

fn default_pitch_ratio() -> f32 {
    1.0
}

impl SpeakerProfile {
    fn builtin(
        id: &str,
        name: &str,
        pitch_ratio: f32,
        pitch_offset: f32,
        coloring: BandColoring,
    ) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            description: String::new(),
            language: default_language(),
            gender: default_gender(),
            sample_rate: default_sample_rate(),
            model_path: String::new(),
            pitch_ratio,
            pitch_offset,
            coloring,
            config: serde_json::Map::new(),
        }
    }
}

/// Speaker entry as listed by the TTS speakers endpoint
#[derive(Debug, Clone, Serialize)]
pub struct SpeakerSummary {
    pub id: String,
    pub name: String,
    pub config_file: Option<String>,
}

fn default_profile() -> SpeakerProfile {
    SpeakerProfile {
        description: "System default voice".to_string(),
        ..SpeakerProfile::builtin("default", "Default", 1.0, 0.0, BandColoring::NEUTRAL)
    }
}

/// Voices every deployment knows without any profile files
pub fn builtin_profiles() -> Vec<SpeakerProfile> {
    let mut profiles = vec![
        default_profile(),
        SpeakerProfile::builtin(
            "speaker_001",
            "Speaker 001",
            1.15,
            0.05,
            BandColoring::new(1.1, 0.9, 1.2),
        ),
        SpeakerProfile::builtin(
            "speaker_002",
            "Speaker 002",
            0.85,
            -0.05,
            BandColoring::new(0.9, 1.1, 0.8),
        ),
        SpeakerProfile::builtin(
            "speaker_003",
            "Speaker 003",
            1.25,
            0.1,
            BandColoring::new(1.2, 1.0, 1.1),
        ),
    ];
    profiles.extend(
        VcEngineKind::SoVits
            .engine_voices()
            .iter()
            .map(|id| SpeakerProfile::builtin(id, &display_name(id), 1.0, 0.0, BandColoring::NEUTRAL)),
    );
    profiles
}

/// `speaker_001` → `Speaker 001`
fn display_name(id: &str) -> String {
    id.split('_')
        .filter(|part| !part.is_empty())
        .map(|part| {
            let mut chars = part.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Profile lookup over built-ins and `<speaker_dir>/<id>.json`
#[derive(Debug, Clone)]
pub struct SpeakerRegistry {
    speaker_dir: PathBuf,
}

impl SpeakerRegistry {
    pub fn new(speaker_dir: impl Into<PathBuf>) -> Self {
        Self {
            speaker_dir: speaker_dir.into(),
        }
    }

    pub fn speaker_dir(&self) -> &Path {
        &self.speaker_dir
    }

    /// Resolve a speaker id; profile files override built-ins of the same id
    pub fn get(&self, id: &str) -> Result<SpeakerProfile> {
        validate_speaker_id(id)?;

        let path = self.speaker_dir.join(format!("{}.json", id));
        if path.is_file() {
            return load_profile(&path);
        }

        builtin_profiles()
            .into_iter()
            .find(|p| p.id == id)
            .ok_or_else(|| SynthError::ResourceNotFound(format!("speaker '{}' not found", id)))
    }

    /// Default voice first, then every readable profile file sorted by id
    pub fn list_profiles(&self) -> Vec<SpeakerProfile> {
        let mut profiles: Vec<SpeakerProfile> = self
            .profile_files()
            .into_iter()
            .filter_map(|path| match load_profile(&path) {
                Ok(profile) => Some(profile),
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping unreadable speaker profile");
                    None
                }
            })
            .filter(|p| p.id != "default")
            .collect();
        profiles.sort_by(|a, b| a.id.cmp(&b.id));

        profiles.insert(0, self.get("default").unwrap_or_else(|_| default_profile()));
        profiles
    }

    /// Speakers offered for synthesis: `default` plus one entry per profile file
    pub fn tts_speakers(&self) -> Vec<SpeakerSummary> {
        let mut speakers: Vec<SpeakerSummary> = self
            .profile_files()
            .into_iter()
            .filter_map(|path| {
                let id = path.file_stem()?.to_str()?.to_string();
                Some(SpeakerSummary {
                    name: display_name(&id),
                    config_file: Some(path.display().to_string()),
                    id,
                })
            })
            .collect();
        speakers.sort_by(|a, b| a.id.cmp(&b.id));

        if !speakers.iter().any(|s| s.id == "default") {
            speakers.insert(
                0,
                SpeakerSummary {
                    id: "default".to_string(),
                    name: "Default".to_string(),
                    config_file: None,
                },
            );
        }
        speakers
    }

    /// Conversion targets for `engine`: default, profile files and the engine's own voices
    pub fn vc_speaker_ids(&self, engine: VcEngineKind) -> Vec<String> {
        let mut ids = BTreeSet::new();
        ids.insert("default".to_string());
        for path in self.profile_files() {
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.insert(stem.to_string());
            }
        }
        ids.extend(engine.engine_voices().iter().map(|s| s.to_string()));
        ids.into_iter().collect()
    }

    fn profile_files(&self) -> Vec<PathBuf> {
        let entries = match std::fs::read_dir(&self.speaker_dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %self.speaker_dir.display(), error = %e, "Speaker directory not readable");
                return Vec::new();
            }
        };
        entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("json"))
            .collect()
    }
}

fn load_profile(path: &Path) -> Result<SpeakerProfile> {
    let content = std::fs::read_to_string(path)?;
    serde_json::from_str(&content).map_err(|e| {
        SynthError::ProcessingFailure(format!(
            "invalid speaker profile {}: {}",
            path.display(),
            e
        ))
    })
}

/// Speaker ids double as file names; keep them to a safe alphabet
fn validate_speaker_id(id: &str) -> Result<()> {
    let valid = !id.is_empty()
        && id.len() <= 100
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
    if valid {
        Ok(())
    } else {
        Err(SynthError::Validation(format!("invalid speaker id '{}'", id)))
    }
}

//! Persisted user preferences
//!
//! Stored in `~/.vprompt/preferences.json`: the UI language, the voice panel's
//! sample selection and emotion sliders, and whether the optional time field
//! is bypassed on the prompt form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::api::VoiceSample;
use crate::config::AppConfig;
use crate::messages::Language;

const PREFERENCES_FILENAME: &str = "preferences.json";

/// Emotion slider values sent with a voice job, each in `0.0..=1.0`
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EmotionLevels {
    #[serde(default)]
    pub angry: f32,
    #[serde(default)]
    pub sad: f32,
    #[serde(default)]
    pub happy: f32,
    #[serde(default)]
    pub afraid: f32,
    #[serde(default)]
    pub disgust: f32,
    #[serde(default)]
    pub melancholic: f32,
    #[serde(default)]
    pub surprised: f32,
    #[serde(default)]
    pub calm: f32,
}

impl EmotionLevels {
    /// Clamp every slider into range; NaN becomes 0
    pub fn clamped(self) -> Self {
        fn c(v: f32) -> f32 {
            if v.is_nan() {
                0.0
            } else {
                v.clamp(0.0, 1.0)
            }
        }
        Self {
            angry: c(self.angry),
            sad: c(self.sad),
            happy: c(self.happy),
            afraid: c(self.afraid),
            disgust: c(self.disgust),
            melancholic: c(self.melancholic),
            surprised: c(self.surprised),
            calm: c(self.calm),
        }
    }

    /// Set a slider by its wire name. Returns false for an unknown name.
    pub fn set(&mut self, name: &str, value: f32) -> bool {
        let slot = match name {
            "angry" => &mut self.angry,
            "sad" => &mut self.sad,
            "happy" => &mut self.happy,
            "afraid" => &mut self.afraid,
            "disgust" => &mut self.disgust,
            "melancholic" => &mut self.melancholic,
            "surprised" => &mut self.surprised,
            "calm" => &mut self.calm,
            _ => return false,
        };
        *slot = value;
        true
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct VoiceSettings {
    /// Filename of the selected voice sample
    #[serde(default)]
    pub sample: Option<String>,
    #[serde(default)]
    pub emotion_description: String,
    #[serde(default)]
    pub emotions: EmotionLevels,
}

impl VoiceSettings {
    /// Drop the selected sample if the server no longer lists it
    pub fn reconcile_samples(&mut self, available: &[VoiceSample]) {
        if let Some(sample) = &self.sample {
            if !available.iter().any(|s| &s.filename == sample) {
                log::info!("Voice sample {} is no longer available, clearing", sample);
                self.sample = None;
            }
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Preferences {
    #[serde(default)]
    pub language: Option<Language>,
    #[serde(default)]
    pub voice: VoiceSettings,
    /// `None` until the user has touched the "use time" checkbox
    #[serde(default)]
    pub bypass_time: Option<bool>,
    #[serde(default)]
    pub saved_at: Option<DateTime<Utc>>,

    #[serde(skip)]
    path: Option<PathBuf>,
}

impl Preferences {
    /// Load preferences from disk, or return defaults if not found
    pub fn load() -> Self {
        Self::load_from(&Self::preferences_path())
    }

    pub fn load_from(path: &Path) -> Self {
        let mut prefs = match std::fs::read_to_string(path) {
            Ok(contents) => match serde_json::from_str::<Preferences>(&contents) {
                Ok(prefs) => prefs,
                Err(e) => {
                    log::error!("Failed to parse preferences {:?}: {:?}", path, e);
                    Preferences::default()
                }
            },
            Err(_) => {
                log::debug!("No preferences at {:?}, using defaults", path);
                Preferences::default()
            }
        };
        prefs.path = Some(path.to_path_buf());
        prefs
    }

    /// Save to the file these preferences were loaded from
    pub fn save(&mut self) {
        let path = self.path.clone().unwrap_or_else(Self::preferences_path);
        if let Err(e) = self.save_to(&path) {
            log::error!("Failed to write preferences {:?}: {}", path, e);
        }
    }

    pub fn save_to(&mut self, path: &Path) -> std::io::Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.saved_at = Some(Utc::now());
        let json = serde_json::to_string_pretty(self)
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidData, e))?;
        std::fs::write(path, json)?;
        log::debug!("Saved preferences to {:?}", path);
        Ok(())
    }

    pub fn language(&self) -> Language {
        self.language.unwrap_or_default()
    }

    pub fn set_language(&mut self, language: Language) {
        self.language = Some(language);
        self.save();
    }

    /// Whether the prompt form should drop its `time` field
    pub fn bypass_time(&self) -> bool {
        self.bypass_time.unwrap_or(false)
    }

    pub fn set_bypass_time(&mut self, bypass: bool) {
        self.bypass_time = Some(bypass);
        self.save();
    }

    pub fn set_voice_settings(&mut self, voice: VoiceSettings) {
        self.voice = VoiceSettings {
            emotions: voice.emotions.clamped(),
            ..voice
        };
        self.save();
    }

    fn preferences_path() -> PathBuf {
        AppConfig::data_dir().join(PREFERENCES_FILENAME)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let prefs = Preferences::load_from(&dir.path().join("nope.json"));
        assert_eq!(prefs.language(), Language::En);
        assert!(!prefs.bypass_time());
        assert!(prefs.voice.sample.is_none());
    }

    #[test]
    fn test_language_survives_reload() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("prefs").join("preferences.json");

        let mut prefs = Preferences::load_from(&path);
        prefs.set_language(Language::Zh);

        let reloaded = Preferences::load_from(&path);
        assert_eq!(reloaded.language(), Language::Zh);
        assert!(reloaded.saved_at.is_some());
    }

    #[test]
    fn test_voice_settings_are_clamped_and_persisted() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.json");

        let mut prefs = Preferences::load_from(&path);
        let mut voice = VoiceSettings {
            sample: Some("narrator.wav".to_string()),
            ..Default::default()
        };
        assert!(voice.emotions.set("happy", 1.7));
        assert!(voice.emotions.set("sad", -0.2));
        assert!(!voice.emotions.set("bored", 0.5));
        prefs.set_voice_settings(voice);

        let reloaded = Preferences::load_from(&path);
        assert_eq!(reloaded.voice.sample.as_deref(), Some("narrator.wav"));
        assert_eq!(reloaded.voice.emotions.happy, 1.0);
        assert_eq!(reloaded.voice.emotions.sad, 0.0);
    }

    #[test]
    fn test_reconcile_clears_unlisted_sample() {
        let mut voice = VoiceSettings {
            sample: Some("gone.wav".to_string()),
            ..Default::default()
        };
        let listed = vec![VoiceSample {
            filename: "narrator.wav".to_string(),
            display_name: "Narrator".to_string(),
        }];
        voice.reconcile_samples(&listed);
        assert!(voice.sample.is_none());
    }

    #[test]
    fn test_malformed_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("preferences.json");
        std::fs::write(&path, "[1,2").unwrap();
        assert_eq!(Preferences::load_from(&path).language(), Language::En);
    }
}

use crate::distribution::DEFAULT_SONGS_PER_VARIANT;
use crate::error::{CoreError, Result};
use crate::transition::TransitionKind;
use crate::types::{DistributionPolicy, TimeUs};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Longest loop a batch accepts: one week.
pub const MAX_LOOP_DURATION_SECS: u64 = 7 * 24 * 3600;

/// Persisted user settings. Missing keys fall back to their defaults, so an
/// old or partial settings file still loads.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Settings {
    pub output_folder: Option<PathBuf>,
    pub music_folder: Option<PathBuf>,
    pub loop_duration_secs: u64,

    pub sheet_url: Option<String>,
    /// Key into `sheet_presets`; takes effect when `sheet_url` is unset.
    pub sheet_preset: Option<String>,
    pub sheet_presets: BTreeMap<String, String>,

    pub songs_per_variant: usize,
    pub variants: usize,
    pub distribution: DistributionPolicy,
    /// Minimum eligible songs before a batch may start. Defaults to
    /// `songs_per_variant` when unset.
    pub min_songs: Option<usize>,
    pub fade_audio: bool,
    pub export_timestamp: bool,

    pub auto_upload: bool,
    pub upload_folder: Option<PathBuf>,

    pub hardware_acceleration: bool,
    pub transition: TransitionKind,

    pub max_workers: usize,
    pub max_attempts: u32,
    pub retry_backoff_ms: u64,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            output_folder: None,
            music_folder: None,
            loop_duration_secs: 3600,
            sheet_url: None,
            sheet_preset: None,
            sheet_presets: BTreeMap::new(),
            songs_per_variant: DEFAULT_SONGS_PER_VARIANT,
            variants: 1,
            distribution: DistributionPolicy::Sequential,
            min_songs: None,
            fade_audio: true,
            export_timestamp: true,
            auto_upload: false,
            upload_folder: None,
            hardware_acceleration: true,
            transition: TransitionKind::None,
            max_workers: 1,
            max_attempts: 3,
            retry_backoff_ms: 2000,
        }
    }
}

impl Settings {
    /// Load settings from `path`, or defaults when the file does not exist.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            tracing::debug!(path = %path.display(), "no settings file; using defaults");
            return Ok(Self::default());
        }
        Self::load_from_file(path)
    }

    pub fn load_from_file(path: impl AsRef<Path>) -> Result<Self> {
        let data = std::fs::read_to_string(path.as_ref())?;
        let settings: Settings = serde_json::from_str(&data)?;
        Ok(settings)
    }

    /// Save as pretty-printed JSON, creating the parent folder if needed.
    pub fn save_to_file(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }

    pub fn target(&self) -> TimeUs {
        TimeUs::from_secs(self.loop_duration_secs)
    }

    pub fn min_songs(&self) -> usize {
        self.min_songs.unwrap_or(self.songs_per_variant)
    }

    /// The sheet to read: an explicit URL wins over a named preset.
    pub fn resolved_sheet_url(&self) -> Option<&str> {
        self.sheet_url.as_deref().or_else(|| {
            self.sheet_preset
                .as_ref()
                .and_then(|name| self.sheet_presets.get(name))
                .map(String::as_str)
        })
    }

    /// Transition to request: hardware acceleration switched off means no
    /// effect at all.
    pub fn requested_transition(&self) -> TransitionKind {
        if self.hardware_acceleration {
            self.transition
        } else {
            TransitionKind::None
        }
    }

    /// Reject values no batch can run with.
    pub fn validate(&self) -> Result<()> {
        if self.loop_duration_secs == 0 {
            return Err(CoreError::InvalidDuration(
                "loop_duration_secs must be greater than 0".into(),
            ));
        }
        if self.loop_duration_secs > MAX_LOOP_DURATION_SECS {
            return Err(CoreError::InvalidDuration(format!(
                "loop_duration_secs must be at most {MAX_LOOP_DURATION_SECS}, got {}",
                self.loop_duration_secs
            )));
        }
        for (name, value) in [
            ("songs_per_variant", self.songs_per_variant),
            ("variants", self.variants),
            ("max_workers", self.max_workers),
            ("max_attempts", self.max_attempts as usize),
        ] {
            if value == 0 {
                return Err(CoreError::InvalidInput(format!("{name} must be at least 1")));
            }
        }
        if self.auto_upload && self.upload_folder.is_none() {
            return Err(CoreError::InvalidInput(
                "auto_upload is enabled but upload_folder is not set".into(),
            ));
        }
        if let Some(name) = self.sheet_preset.as_ref() {
            if self.sheet_url.is_none() && !self.sheet_presets.contains_key(name) {
                return Err(CoreError::InvalidInput(format!(
                    "unknown sheet preset: {name}"
                )));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn defaults() {
        let s = Settings::default();
        assert_eq!(s.loop_duration_secs, 3600);
        assert_eq!(s.target(), TimeUs::from_secs(3600));
        assert_eq!(s.songs_per_variant, 5);
        assert_eq!(s.min_songs(), 5);
        assert_eq!(s.max_workers, 1);
        assert_eq!(s.max_attempts, 3);
        assert_eq!(s.transition, TransitionKind::None);
        assert!(s.fade_audio);
        assert!(s.validate().is_ok());
    }

    #[test]
    fn save_and_load_roundtrip() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("settings.json");

        let mut s = Settings::default();
        s.loop_duration_secs = 3650;
        s.transition = TransitionKind::SlideLeft;
        s.sheet_presets.insert("main".into(), "https://example.com/sheet".into());
        s.save_to_file(&path).unwrap();

        let loaded = Settings::load_or_default(&path).unwrap();
        assert_eq!(loaded, s);
    }

    #[test]
    fn partial_file_merges_over_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"variants": 3, "distribution": "random"}"#).unwrap();

        let s = Settings::load_or_default(&path).unwrap();
        assert_eq!(s.variants, 3);
        assert_eq!(s.distribution, DistributionPolicy::Random);
        assert_eq!(s.loop_duration_secs, 3600);
        assert!(s.export_timestamp);
    }

    #[test]
    fn missing_file_gives_defaults() {
        let dir = TempDir::new().unwrap();
        let s = Settings::load_or_default(dir.path().join("nope.json")).unwrap();
        assert_eq!(s, Settings::default());
    }

    #[test]
    fn corrupt_file_is_an_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(
            Settings::load_or_default(&path),
            Err(CoreError::Json(_))
        ));
    }

    #[test]
    fn unknown_transition_in_file_is_rejected() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("settings.json");
        std::fs::write(&path, r#"{"transition": "swirl"}"#).unwrap();
        assert!(Settings::load_from_file(&path).is_err());
    }

    #[test]
    fn sheet_url_beats_preset() {
        let mut s = Settings::default();
        s.sheet_presets.insert("main".into(), "https://a".into());
        s.sheet_preset = Some("main".into());
        assert_eq!(s.resolved_sheet_url(), Some("https://a"));
        s.sheet_url = Some("https://b".into());
        assert_eq!(s.resolved_sheet_url(), Some("https://b"));
    }

    #[test]
    fn disabling_hardware_disables_transition() {
        let mut s = Settings::default();
        s.transition = TransitionKind::Fade;
        assert_eq!(s.requested_transition(), TransitionKind::Fade);
        s.hardware_acceleration = false;
        assert_eq!(s.requested_transition(), TransitionKind::None);
    }

    #[test]
    fn validate_rejects_unusable_values() {
        let mut s = Settings::default();
        s.variants = 0;
        assert!(s.validate().is_err());

        let mut s = Settings::default();
        s.auto_upload = true;
        assert!(s.validate().is_err());
        s.upload_folder = Some(PathBuf::from("/sync"));
        assert!(s.validate().is_ok());

        let mut s = Settings::default();
        s.sheet_preset = Some("missing".into());
        assert!(s.validate().is_err());
    }

    #[test]
    fn validate_caps_loop_duration() {
        let mut s = Settings::default();
        s.loop_duration_secs = MAX_LOOP_DURATION_SECS;
        assert!(s.validate().is_ok());
        s.loop_duration_secs = u64::MAX;
        assert!(matches!(s.validate(), Err(CoreError::InvalidDuration(_))));
    }
}

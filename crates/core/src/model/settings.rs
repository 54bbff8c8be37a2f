use serde::Deserialize;
use thiserror::Error;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SettingsError {
    #[error("trials per page must be > 0")]
    InvalidTrialsPerPage,

    #[error("correct threshold {threshold} exceeds total trials {total}")]
    UnreachableThreshold { threshold: u32, total: u32 },

    #[error("storage key cannot be empty")]
    EmptyStorageKey,

    #[error("invalid settings document: {0}")]
    Parse(String),
}

//
// ─── SETTINGS ──────────────────────────────────────────────────────────────────
//

/// Configuration of one headphone check run.
#[derive(Debug, Clone, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)]
pub struct EngineSettings {
    total_trials: u32,
    trials_per_page: u32,
    correct_threshold: u32,
    use_sequential: bool,
    shuffle_trials: bool,
    sample_with_replacement: bool,
    do_calibration: bool,
    require_playback: bool,
    storage_key: String,
}

/// Unvalidated settings, deserializable from a config document.
///
/// Every field is optional; missing fields take the default run configuration.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
#[allow(clippy::struct_excessive_bools)]
pub struct EngineSettingsDraft {
    /// Number of trials to sample. `0` means "use the whole manifest".
    pub total_trials: u32,
    pub trials_per_page: u32,
    pub correct_threshold: u32,
    /// Refuse playback of a trial until the previous one is answered.
    pub use_sequential: bool,
    pub shuffle_trials: bool,
    pub sample_with_replacement: bool,
    pub do_calibration: bool,
    /// Refuse responses to a trial until its sound has finished playing.
    pub require_playback: bool,
    pub storage_key: String,
}

impl Default for EngineSettingsDraft {
    fn default() -> Self {
        Self {
            total_trials: 3,
            trials_per_page: 1,
            correct_threshold: 2,
            use_sequential: true,
            shuffle_trials: true,
            sample_with_replacement: true,
            do_calibration: true,
            require_playback: true,
            storage_key: "headphoneCheckCache".to_string(),
        }
    }
}

impl EngineSettingsDraft {
    /// Validate the draft into usable settings.
    ///
    /// # Errors
    ///
    /// Returns `SettingsError` if `trials_per_page` is zero, the storage key is blank,
    /// or the threshold can never be reached with `total_trials` trials.
    pub fn validate(self) -> Result<EngineSettings, SettingsError> {
        if self.trials_per_page == 0 {
            return Err(SettingsError::InvalidTrialsPerPage);
        }
        if self.total_trials > 0 && self.correct_threshold > self.total_trials {
            return Err(SettingsError::UnreachableThreshold {
                threshold: self.correct_threshold,
                total: self.total_trials,
            });
        }
        if self.storage_key.trim().is_empty() {
            return Err(SettingsError::EmptyStorageKey);
        }
        Ok(self.into_settings())
    }

    // Callers check the invariants first.
    fn into_settings(self) -> EngineSettings {
        EngineSettings {
            total_trials: self.total_trials,
            trials_per_page: self.trials_per_page,
            correct_threshold: self.correct_threshold,
            use_sequential: self.use_sequential,
            shuffle_trials: self.shuffle_trials,
            sample_with_replacement: self.sample_with_replacement,
            do_calibration: self.do_calibration,
            require_playback: self.require_playback,
            storage_key: self.storage_key.trim().to_string(),
        }
    }
}

impl EngineSettings {
    /// Parse settings from a TOML document such as:
    ///
    /// ```toml
    /// total_trials = 6
    /// trials_per_page = 3
    /// correct_threshold = 5
    /// ```
    ///
    /// # Errors
    ///
    /// Returns `SettingsError::Parse` for invalid TOML and the validation errors of
    /// [`EngineSettingsDraft::validate`].
    pub fn from_toml_str(doc: &str) -> Result<Self, SettingsError> {
        let draft: EngineSettingsDraft =
            toml::from_str(doc).map_err(|e| SettingsError::Parse(e.to_string()))?;
        draft.validate()
    }

    #[must_use]
    pub fn total_trials(&self) -> u32 {
        self.total_trials
    }

    #[must_use]
    pub fn trials_per_page(&self) -> u32 {
        self.trials_per_page
    }

    #[must_use]
    pub fn correct_threshold(&self) -> u32 {
        self.correct_threshold
    }

    #[must_use]
    pub fn use_sequential(&self) -> bool {
        self.use_sequential
    }

    #[must_use]
    pub fn shuffle_trials(&self) -> bool {
        self.shuffle_trials
    }

    #[must_use]
    pub fn sample_with_replacement(&self) -> bool {
        self.sample_with_replacement
    }

    #[must_use]
    pub fn do_calibration(&self) -> bool {
        self.do_calibration
    }

    #[must_use]
    pub fn require_playback(&self) -> bool {
        self.require_playback
    }

    #[must_use]
    pub fn storage_key(&self) -> &str {
        &self.storage_key
    }
}

impl Default for EngineSettings {
    fn default() -> Self {
        EngineSettingsDraft::default().into_settings()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_draft_matches_default_settings() {
        let settings = EngineSettingsDraft::default().validate().unwrap();
        assert_eq!(settings, EngineSettings::default());
        assert_eq!(settings.storage_key(), "headphoneCheckCache");
    }

    #[test]
    fn validation_rejects_bad_values() {
        let draft = EngineSettingsDraft {
            trials_per_page: 0,
            ..EngineSettingsDraft::default()
        };
        assert_eq!(draft.validate().unwrap_err(), SettingsError::InvalidTrialsPerPage);

        let draft = EngineSettingsDraft {
            correct_threshold: 4,
            ..EngineSettingsDraft::default()
        };
        assert_eq!(
            draft.validate().unwrap_err(),
            SettingsError::UnreachableThreshold {
                threshold: 4,
                total: 3
            }
        );

        let draft = EngineSettingsDraft {
            storage_key: "  ".into(),
            ..EngineSettingsDraft::default()
        };
        assert_eq!(draft.validate().unwrap_err(), SettingsError::EmptyStorageKey);
    }

    #[test]
    fn full_set_skips_threshold_check() {
        let draft = EngineSettingsDraft {
            total_trials: 0,
            correct_threshold: 10,
            ..EngineSettingsDraft::default()
        };
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn toml_overrides_defaults() {
        let settings = EngineSettings::from_toml_str(
            r#"
            total_trials = 6
            trials_per_page = 3
            correct_threshold = 5
            sample_with_replacement = false
            storage_key = "hc"
            "#,
        )
        .unwrap();

        assert_eq!(settings.total_trials(), 6);
        assert_eq!(settings.trials_per_page(), 3);
        assert_eq!(settings.correct_threshold(), 5);
        assert!(!settings.sample_with_replacement());
        assert!(settings.use_sequential());
        assert_eq!(settings.storage_key(), "hc");

        assert!(matches!(
            EngineSettings::from_toml_str("total_trials = \"many\""),
            Err(SettingsError::Parse(_))
        ));
    }
}

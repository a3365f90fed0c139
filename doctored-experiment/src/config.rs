use crate::error::ConfigError;
use doctored_core::KeyMap;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// File picked up from the working directory when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "doctored.toml";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SessionConfig {
    pub fixation_ms: u64,
    pub response_window_ms: u64,
    pub stimuli: StimulusConfig,
    pub questions_path: PathBuf,
    pub data_dir: PathBuf,
    /// Save the trials recorded so far when the participant aborts.
    pub keep_trials_on_abort: bool,
    /// TrueType font for all on-screen text. System fonts are tried when unset.
    pub font_path: Option<PathBuf>,
    pub keys: KeyMap,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct StimulusConfig {
    pub dir: PathBuf,
    pub signal_pattern: String,
    pub noise_pattern: String,
    /// Pair positionally and drop the surplus when the collections differ in size.
    pub truncate_unpaired: bool,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            fixation_ms: 1000,
            response_window_ms: 2000,
            stimuli: StimulusConfig::default(),
            questions_path: PathBuf::from("questions.csv"),
            data_dir: PathBuf::from("data"),
            keep_trials_on_abort: false,
            font_path: None,
            keys: KeyMap::default(),
        }
    }
}

impl Default for StimulusConfig {
    fn default() -> Self {
        Self {
            dir: PathBuf::from("stimuli"),
            signal_pattern: "signal*.jpg".to_string(),
            noise_pattern: "noise*.jpg".to_string(),
            truncate_unpaired: false,
        }
    }
}

impl SessionConfig {
    /// Loads `path`, or `doctored.toml` if present, or the defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => {
                let fallback = PathBuf::from(DEFAULT_CONFIG_FILE);
                if !fallback.exists() {
                    tracing::info!("no {DEFAULT_CONFIG_FILE} found, using built-in settings");
                    let config = Self::default();
                    config.validate()?;
                    return Ok(config);
                }
                fallback
            }
        };
        let raw = std::fs::read_to_string(&path).map_err(|source| ConfigError::Read {
            path: path.clone(),
            source,
        })?;
        let config = Self::from_toml(&raw).map_err(|source| ConfigError::Parse {
            path: path.clone(),
            source,
        })?;
        config.validate()?;
        tracing::info!(path = %path.display(), "loaded session config");
        Ok(config)
    }

    pub fn from_toml(raw: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(raw)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.fixation_ms == 0 {
            return Err(ConfigError::Invalid("fixation_ms must be above zero".into()));
        }
        if self.response_window_ms == 0 {
            return Err(ConfigError::Invalid(
                "response_window_ms must be above zero".into(),
            ));
        }
        if self.stimuli.signal_pattern == self.stimuli.noise_pattern {
            return Err(ConfigError::Invalid(
                "signal_pattern and noise_pattern must differ".into(),
            ));
        }
        if let Some((key, context)) = self.keys.find_collision() {
            return Err(ConfigError::Invalid(format!(
                "key `{key}` is bound to two outcomes in the {context:?} context"
            )));
        }
        Ok(())
    }

    pub fn fixation(&self) -> Duration {
        Duration::from_millis(self.fixation_ms)
    }

    pub fn response_window(&self) -> Duration {
        Duration::from_millis(self.response_window_ms)
    }

    pub fn trial_data_path(&self) -> PathBuf {
        self.data_dir.join(crate::storage::TRIAL_FILE)
    }

    pub fn participant_data_path(&self) -> PathBuf {
        self.data_dir.join(crate::storage::PARTICIPANT_FILE)
    }
}

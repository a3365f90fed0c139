//! Error types for session setup and result storage.

use std::path::PathBuf;
use thiserror::Error;

/// Problems with the session configuration file or its values.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Problems with the stimulus image collections.
#[derive(Debug, Error)]
pub enum StimulusError {
    #[error("stimulus directory {0} does not exist")]
    MissingDirectory(PathBuf),

    #[error("invalid stimulus pattern `{pattern}`: {message}")]
    Pattern { pattern: String, message: String },

    #[error("no {kind} images matching `{pattern}` under {dir}")]
    Empty {
        kind: &'static str,
        pattern: String,
        dir: PathBuf,
    },

    #[error(
        "found {signal} signal and {noise} noise images; set `truncate_unpaired = true` to pair positionally and drop the rest"
    )]
    MismatchedCounts { signal: usize, noise: usize },

    #[error("failed to walk stimulus directory: {0}")]
    Walk(String),
}

/// Problems with the survey question table.
#[derive(Debug, Error)]
pub enum SurveyError {
    #[error("failed to read questions from {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("questions file {path} is missing the `{column}` column")]
    MissingColumn { path: PathBuf, column: &'static str },

    #[error("questions file {0} has no questions")]
    Empty(PathBuf),
}

/// Failures while appending results to disk.
#[derive(Debug, Error)]
pub enum StorageError {
    #[error("failed to create data directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("failed to flush {path}: {source}")]
    Flush {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Any failure that stops a session from starting.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Stimulus(#[from] StimulusError),

    #[error(transparent)]
    Survey(#[from] SurveyError),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

use std::path::PathBuf;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum OdynError {
    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("TIFF error: {0}")]
    Tiff(#[from] tiff::TiffError),

    #[error("Invalid date: {0}")]
    Date(#[from] chrono::ParseError),

    #[error("Invalid file pattern: {0}")]
    Pattern(#[from] glob::PatternError),

    #[error("Missing or invalid config key in {}: {message}", path.display())]
    ConfigDocument { path: PathBuf, message: String },

    #[error("Invalid value for `{key}`: {message}")]
    InvalidConfig { key: String, message: String },

    #[error("File {} does not follow the acquisition naming pattern: {message}", file.display())]
    FilenamePattern { file: PathBuf, message: String },

    #[error("No {what} files found in {}", dir.display())]
    NoFiles { what: String, dir: PathBuf },

    #[error("Acquisition range {first}..={last} is outside the {available} available files")]
    AcquisitionRange {
        first: u32,
        last: u32,
        available: usize,
    },

    #[error("Movie error: {message}")]
    Movie { message: String },

    #[error("Motion correction engine error: {message}")]
    Engine { message: String },

    #[error("Component error in {component}: {message}")]
    Component { component: String, message: String },
}

impl OdynError {
    pub fn component<S: Into<String>>(component: S, message: S) -> Self {
        Self::Component {
            component: component.into(),
            message: message.into(),
        }
    }

    pub fn invalid<K: Into<String>, M: Into<String>>(key: K, message: M) -> Self {
        Self::InvalidConfig {
            key: key.into(),
            message: message.into(),
        }
    }

    pub fn movie<S: Into<String>>(message: S) -> Self {
        Self::Movie {
            message: message.into(),
        }
    }

    pub fn engine<S: Into<String>>(message: S) -> Self {
        Self::Engine {
            message: message.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, OdynError>;

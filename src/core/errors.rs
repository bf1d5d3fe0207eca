//! SNV-prefixed error types with structured error codes.

#![allow(missing_docs)]

use std::path::{Path, PathBuf};

use thiserror::Error;

/// Shared `Result` alias for the project.
pub type Result<T> = std::result::Result<T, SmartNavError>;

/// Top-level error type for smartnav.
#[derive(Debug, Error)]
pub enum SmartNavError {
    #[error("[SNV-1001] invalid configuration: {details}")]
    InvalidConfig { details: String },

    #[error("[SNV-1002] missing configuration file: {path}")]
    MissingConfig { path: PathBuf },

    #[error("[SNV-1003] configuration parse failure in {context}: {details}")]
    ConfigParse {
        context: &'static str,
        details: String,
    },

    #[error("[SNV-1101] invalid selector {selector:?}: {details}")]
    InvalidSelector { selector: String, details: String },

    #[error("[SNV-2001] DOM {operation} failed: {details}")]
    Dom {
        operation: &'static str,
        details: String,
    },

    #[error("[SNV-2002] stale element handle in {operation}")]
    StaleNode { operation: &'static str },

    #[error("[SNV-2101] serialization failure in {context}: {details}")]
    Serialization {
        context: &'static str,
        details: String,
    },

    #[error("[SNV-2102] storage failure for key {key}: {details}")]
    Storage { key: String, details: String },

    #[error("[SNV-2103] invalid page URL {url:?}: {details}")]
    InvalidUrl { url: String, details: String },

    #[error("[SNV-3002] IO failure at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("[SNV-3900] runtime failure: {details}")]
    Runtime { details: String },
}

impl SmartNavError {
    /// Stable machine-parseable error code.
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidConfig { .. } => "SNV-1001",
            Self::MissingConfig { .. } => "SNV-1002",
            Self::ConfigParse { .. } => "SNV-1003",
            Self::InvalidSelector { .. } => "SNV-1101",
            Self::Dom { .. } => "SNV-2001",
            Self::StaleNode { .. } => "SNV-2002",
            Self::Serialization { .. } => "SNV-2101",
            Self::Storage { .. } => "SNV-2102",
            Self::InvalidUrl { .. } => "SNV-2103",
            Self::Io { .. } => "SNV-3002",
            Self::Runtime { .. } => "SNV-3900",
        }
    }

    /// Whether retrying might resolve the failure.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Io { .. } | Self::Storage { .. } | Self::Dom { .. } | Self::Runtime { .. }
        )
    }

    /// Convenience constructor for IO errors with a known path.
    #[must_use]
    pub fn io(path: impl AsRef<Path>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.as_ref().to_path_buf(),
            source,
        }
    }

    /// Convenience constructor for DOM operation failures.
    #[must_use]
    pub fn dom(operation: &'static str, details: impl Into<String>) -> Self {
        Self::Dom {
            operation,
            details: details.into(),
        }
    }
}

impl From<serde_json::Error> for SmartNavError {
    fn from(value: serde_json::Error) -> Self {
        Self::Serialization {
            context: "serde_json",
            details: value.to_string(),
        }
    }
}

impl From<toml::de::Error> for SmartNavError {
    fn from(value: toml::de::Error) -> Self {
        Self::ConfigParse {
            context: "toml",
            details: value.to_string(),
        }
    }
}

impl From<toml::ser::Error> for SmartNavError {
    fn from(value: toml::ser::Error) -> Self {
        Self::Serialization {
            context: "toml",
            details: value.to_string(),
        }
    }
}

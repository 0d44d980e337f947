//! Configuration errors.

use std::io;

use thiserror::Error;

/// Why a configuration could not be loaded or saved.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A config file exists but could not be read.
    #[error("cannot read {path}: {source}")]
    Read {
        /// File path.
        path: String,
        /// I/O cause.
        #[source]
        source: io::Error,
    },

    /// The config file could not be written.
    #[error("cannot write {path}: {source}")]
    Write {
        /// File path.
        path: String,
        /// I/O cause.
        #[source]
        source: io::Error,
    },

    /// A config file is larger than any sane config.
    #[error("{path} is {size} bytes, over the {limit} byte limit")]
    TooLarge {
        /// File path.
        path: String,
        /// Actual size.
        size: u64,
        /// Allowed size.
        limit: u64,
    },

    /// TOML syntax or type mismatch. `path` names the layer for merged values.
    #[error("invalid TOML in {path}: {source}")]
    Parse {
        /// File path or layer name.
        path: String,
        /// TOML cause.
        #[source]
        source: toml::de::Error,
    },

    /// The updated config could not be rendered back to TOML.
    #[error("cannot render config: {0}")]
    Render(#[from] toml::ser::Error),

    /// A value parsed but is out of range.
    #[error("{field}: {message}")]
    Invalid {
        /// Dotted field path, e.g. `map.call_timeout_ms`.
        field: String,
        /// What is wrong with it.
        message: String,
    },
}

/// Result alias for configuration operations.
pub type ConfigResult<T> = Result<T, ConfigError>;

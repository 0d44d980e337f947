#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
//! Layered configuration for revmap.
//!
//! # Usage
//!
//! ```rust,no_run
//! use revmap_config::Config;
//!
//! // defaults → {workspace}/.revmap/config.toml → env fallbacks
//! let resolved = Config::load(Some(std::path::Path::new("."))).unwrap();
//! println!("master map: {:?}", resolved.config.map.master_map_id);
//! ```
//!
//! # Configuration Precedence
//!
//! From highest to lowest priority:
//!
//! 1. **Config file** (`{workspace}/.revmap/config.toml`, or an explicit path)
//! 2. **Environment variables** (`REVMAP_*`, legacy `CHANNEL_CONFIG_MAP_ID`), fallback only
//! 3. **Embedded defaults** (`defaults.toml` compiled into the binary)
//!
//! # Design
//!
//! This crate has no dependencies on other revmap crates. Conversion into
//! retry policies and logging setup happens where the config is consumed.

/// Environment variable fallback resolution.
pub mod env;
/// Configuration error types.
pub mod error;
/// Configuration file discovery and loading.
pub mod loader;
/// Layered configuration merging with provenance.
pub mod merge;
/// Configuration struct definitions.
pub mod types;
/// Configuration validation rules.
pub mod validate;

use std::collections::HashMap;
use std::path::Path;

pub use error::{ConfigError, ConfigResult};
pub use loader::{ResolvedConfig, WORKSPACE_DIR, workspace_config_path};
pub use merge::{ConfigLayer, FieldSources, Layered};
pub use types::*;

impl Config {
    /// Load defaults, the workspace config file and the process environment.
    ///
    /// With no `workspace_root` only defaults and env vars apply.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the config file is malformed or the final
    /// configuration fails validation.
    pub fn load(workspace_root: Option<&Path>) -> ConfigResult<ResolvedConfig> {
        let file = workspace_root.map(workspace_config_path);
        loader::load(file.as_deref(), &env::collect_env_vars())
    }

    /// Load defaults, an explicit config file and an explicit environment.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file is malformed or the final
    /// configuration fails validation.
    pub fn load_with_env<S: ::std::hash::BuildHasher>(
        config_file: Option<&Path>,
        env_vars: &HashMap<String, String, S>,
    ) -> ConfigResult<ResolvedConfig> {
        loader::load(config_file, env_vars)
    }

    /// Load configuration from a single file (no layering).
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
    /// validation.
    pub fn load_file(path: &Path) -> ConfigResult<Self> {
        loader::load_file(path)
    }
}

//! Config file discovery and layered loading.
//!
//! Implements the `Config::load()` algorithm:
//! 1. Parse `defaults.toml` → base
//! 2. Merge the config file (`{workspace}/.revmap/config.toml` or an explicit path)
//! 3. Apply env var fallbacks for fields the file did not set
//! 4. Deserialize merged tree → `Config`
//! 5. Validate

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::env::apply_env_fallbacks;
use crate::error::{ConfigError, ConfigResult};
use crate::merge::{ConfigLayer, FieldSources, Layered};
use crate::types::Config;
use crate::validate;

/// Embedded default configuration.
const DEFAULTS_TOML: &str = include_str!("defaults.toml");

/// Directory under the workspace root holding revmap state and config.
pub const WORKSPACE_DIR: &str = ".revmap";

/// Maximum allowed config file size (1 MB).
const MAX_CONFIG_FILE_SIZE: u64 = 1_048_576;

/// A loaded configuration together with where each value came from.
#[derive(Debug, Clone)]
pub struct ResolvedConfig {
    /// The final configuration.
    pub config: Config,
    /// Which layer set each dotted field path.
    pub field_sources: FieldSources,
    /// Config files that were found and merged.
    pub loaded_files: Vec<String>,
}

/// Path of the workspace config file under `workspace_root`.
#[must_use]
pub fn workspace_config_path(workspace_root: &Path) -> PathBuf {
    workspace_root.join(WORKSPACE_DIR).join("config.toml")
}

/// Load defaults, then `config_file` if it exists, then env fallbacks.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file is malformed or oversized, or if
/// the merged configuration fails validation.
pub fn load<S: ::std::hash::BuildHasher>(
    config_file: Option<&Path>,
    env_vars: &HashMap<String, String, S>,
) -> ConfigResult<ResolvedConfig> {
    let defaults = toml::from_str(DEFAULTS_TOML).map_err(|source| ConfigError::Parse {
        path: "<embedded defaults>".to_owned(),
        source,
    })?;
    let mut layered = Layered::new(defaults, ConfigLayer::Defaults);
    let mut loaded_files = Vec::new();

    if let Some(path) = config_file {
        if let Some(file) = read_toml(path)? {
            layered.overlay(&file, ConfigLayer::File);
            loaded_files.push(path.display().to_string());
            info!(path = %path.display(), "loaded config file");
        }
    }

    let from_env = apply_env_fallbacks(&mut layered, env_vars);
    if from_env > 0 {
        debug!(count = from_env, "applied environment variable fallbacks");
    }

    let (tree, field_sources) = layered.into_parts();
    let config = into_config(tree, "<merged config>")?;

    Ok(ResolvedConfig {
        config,
        field_sources,
        loaded_files,
    })
}

/// Load a config from a specific file path (no layering).
///
/// # Errors
///
/// Returns a [`ConfigError`] if the file cannot be read, parsed, or fails
/// validation.
pub fn load_file(path: &Path) -> ConfigResult<Config> {
    let tree = read_toml(path)?.ok_or_else(|| ConfigError::Read {
        path: path.display().to_string(),
        source: std::io::Error::from(std::io::ErrorKind::NotFound),
    })?;
    into_config(tree, &path.display().to_string())
}

/// Record `map_id` as `map.master_map_id` in the config file at `path`,
/// keeping every other key already in it.
///
/// # Errors
///
/// Returns a [`ConfigError`] if the existing file is malformed or the new
/// one cannot be written.
pub fn set_master_map_id(path: &Path, map_id: i64) -> ConfigResult<()> {
    let existing = read_toml(path)?.unwrap_or_else(|| toml::Value::Table(toml::Table::new()));
    let mut layered = Layered::new(existing, ConfigLayer::File);
    layered.set("map.master_map_id", toml::Value::Integer(map_id), ConfigLayer::File);
    let (tree, _) = layered.into_parts();

    let rendered = toml::to_string_pretty(&tree)?;
    let write_err = |source| ConfigError::Write {
        path: path.display().to_string(),
        source,
    };
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(write_err)?;
    }
    std::fs::write(path, rendered).map_err(write_err)?;

    info!(path = %path.display(), map_id, "recorded master map id");
    Ok(())
}

/// Deserialize and validate a merged tree. `origin` names it in errors.
fn into_config(tree: toml::Value, origin: &str) -> ConfigResult<Config> {
    let config: Config = tree.try_into().map_err(|source| ConfigError::Parse {
        path: origin.to_owned(),
        source,
    })?;
    validate::validate(&config)?;
    Ok(config)
}

/// Parse the TOML file at `path`. A missing file is `Ok(None)`.
fn read_toml(path: &Path) -> ConfigResult<Option<toml::Value>> {
    let content = match std::fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            debug!(path = %path.display(), "config file not found, skipping");
            return Ok(None);
        },
        Err(source) => {
            return Err(ConfigError::Read {
                path: path.display().to_string(),
                source,
            });
        },
    };

    let size = u64::try_from(content.len()).unwrap_or(u64::MAX);
    if size > MAX_CONFIG_FILE_SIZE {
        return Err(ConfigError::TooLarge {
            path: path.display().to_string(),
            size,
            limit: MAX_CONFIG_FILE_SIZE,
        });
    }

    toml::from_str(&content)
        .map(Some)
        .map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn no_env() -> HashMap<String, String> {
        HashMap::new()
    }

    #[test]
    fn test_defaults_deserialize_to_default_config() {
        let config: Config = toml::from_str(DEFAULTS_TOML).unwrap();
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_load_without_file() {
        let resolved = load(None, &no_env()).unwrap();
        assert_eq!(resolved.config, Config::default());
        assert!(resolved.loaded_files.is_empty());
        assert_eq!(
            resolved.field_sources.get("map.call_timeout_ms"),
            Some(&ConfigLayer::Defaults)
        );
    }

    #[test]
    fn test_missing_file_is_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let resolved = load(Some(workspace_config_path(dir.path()).as_path()), &no_env()).unwrap();
        assert!(resolved.loaded_files.is_empty());
    }

    #[test]
    fn test_file_overrides_defaults_and_env_fills_gaps() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[map]\nmaster_map_id = 11\n[logging]\nformat = \"json\"\n",
        )
        .unwrap();

        let env: HashMap<String, String> = [
            ("REVMAP_MASTER_MAP_ID", "99"),
            ("REVMAP_COMMIT_MAX_RETRIES", "0"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_owned(), v.to_owned()))
        .collect();

        let resolved = load(Some(path.as_path()), &env).unwrap();
        assert_eq!(resolved.config.map.master_map_id, Some(11));
        assert_eq!(resolved.config.logging.format, "json");
        assert_eq!(resolved.config.commit.max_retries, 0);
        assert_eq!(
            resolved.field_sources.get("commit.max_retries"),
            Some(&ConfigLayer::Environment)
        );
        assert_eq!(resolved.loaded_files.len(), 1);
    }

    #[test]
    fn test_invalid_file_value_fails_validation() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[map]\ncall_timeout_ms = 0\n").unwrap();

        let err = load(Some(path.as_path()), &no_env()).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid { ref field, .. } if field == "map.call_timeout_ms"
        ));
    }

    #[test]
    fn test_malformed_env_value_fails_parse() {
        let env: HashMap<String, String> =
            [("REVMAP_CALL_TIMEOUT_MS".to_owned(), "soon".to_owned())].into();
        let err = load(None, &env).unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_load_file_nonexistent() {
        let result = load_file(Path::new("/nonexistent/config.toml"));
        assert!(matches!(result, Err(ConfigError::Read { .. })));
    }

    #[test]
    fn test_set_master_map_id_preserves_other_keys() {
        let dir = tempfile::tempdir().unwrap();
        let path = workspace_config_path(dir.path());
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "[logging]\nlevel = \"debug\"\n").unwrap();

        set_master_map_id(&path, 1234).unwrap();

        let config = load_file(&path).unwrap();
        assert_eq!(config.map.master_map_id, Some(1234));
        assert_eq!(config.logging.level, "debug");
    }

    #[test]
    fn test_set_master_map_id_creates_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = workspace_config_path(dir.path());

        set_master_map_id(&path, 5).unwrap();
        assert_eq!(load_file(&path).unwrap().map.master_map_id, Some(5));
    }

    #[test]
    fn test_oversized_config_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let file_path = dir.path().join("huge.toml");
        let data = "x = \"".to_owned() + &"a".repeat(1_100_000) + "\"";
        std::fs::write(&file_path, data).unwrap();

        let result = read_toml(&file_path);
        assert!(matches!(result, Err(ConfigError::TooLarge { .. })));
    }
}

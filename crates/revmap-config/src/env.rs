//! Environment variable fallbacks.
//!
//! Env vars are a fallback, not an override: they only fill fields that no
//! config file set.

use std::collections::HashMap;

use tracing::debug;

use crate::merge::{ConfigLayer, Layered};

/// Environment variables read as fallbacks, paired with the field each one
/// fills. When two name the same field the earlier one wins.
const ENV_FALLBACKS: &[(&str, &str)] = &[
    ("REVMAP_MASTER_MAP_ID", "map.master_map_id"),
    // Legacy name.
    ("CHANNEL_CONFIG_MAP_ID", "map.master_map_id"),
    ("REVMAP_STATE_PATH", "map.state_path"),
    ("REVMAP_KEY_PATH", "map.signing_key_path"),
    ("REVMAP_CALL_TIMEOUT_MS", "map.call_timeout_ms"),
    ("REVMAP_COMMIT_MAX_RETRIES", "commit.max_retries"),
    ("REVMAP_LOG_LEVEL", "logging.level"),
    ("REVMAP_LOG_FORMAT", "logging.format"),
];

/// Fields whose env values are parsed as integers.
const INTEGER_FIELDS: &[&str] = &[
    "map.master_map_id",
    "map.call_timeout_ms",
    "commit.max_retries",
];

/// Fill fields still at their default from `env_vars`. Returns how many
/// variables were applied.
pub fn apply_env_fallbacks<S: ::std::hash::BuildHasher>(
    layered: &mut Layered,
    env_vars: &HashMap<String, String, S>,
) -> usize {
    let mut applied: usize = 0;

    for &(var, field) in ENV_FALLBACKS {
        let Some(raw) = env_vars.get(var) else {
            continue;
        };
        if layered
            .source_of(field)
            .is_some_and(|layer| layer != ConfigLayer::Defaults)
        {
            continue;
        }

        debug!(var, field, "applying env var fallback");
        layered.set(field, env_value(field, raw), ConfigLayer::Environment);
        applied = applied.saturating_add(1);
    }

    applied
}

/// Integer fields parse their value; anything unparseable stays a string so
/// deserialization reports it against the field.
fn env_value(field: &str, raw: &str) -> toml::Value {
    if INTEGER_FIELDS.contains(&field) {
        if let Ok(i) = raw.trim().parse::<i64>() {
            return toml::Value::Integer(i);
        }
    }
    toml::Value::String(raw.to_owned())
}

/// Snapshot of the process environment.
#[must_use]
pub fn collect_env_vars() -> HashMap<String, String> {
    std::env::vars().collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_env(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| ((*k).to_owned(), (*v).to_owned()))
            .collect()
    }

    fn defaults(toml_src: &str) -> Layered {
        Layered::new(toml::from_str(toml_src).unwrap(), ConfigLayer::Defaults)
    }

    #[test]
    fn test_env_fills_defaulted_and_missing_fields() {
        let mut layered = defaults("[logging]\nlevel = \"info\"");
        let env = make_env(&[
            ("REVMAP_LOG_LEVEL", "debug"),
            ("REVMAP_MASTER_MAP_ID", "42"),
        ]);

        assert_eq!(apply_env_fallbacks(&mut layered, &env), 2);
        assert_eq!(layered.tree()["logging"]["level"].as_str(), Some("debug"));
        assert_eq!(layered.tree()["map"]["master_map_id"].as_integer(), Some(42));
        assert_eq!(
            layered.source_of("map.master_map_id"),
            Some(ConfigLayer::Environment)
        );
    }

    #[test]
    fn test_env_does_not_override_file_values() {
        let mut layered = defaults("[logging]\nlevel = \"info\"");
        layered.overlay(
            &toml::from_str("[logging]\nlevel = \"warn\"").unwrap(),
            ConfigLayer::File,
        );

        let env = make_env(&[("REVMAP_LOG_LEVEL", "debug")]);
        assert_eq!(apply_env_fallbacks(&mut layered, &env), 0);
        assert_eq!(layered.tree()["logging"]["level"].as_str(), Some("warn"));
    }

    #[test]
    fn test_new_name_wins_over_legacy_master_map_id() {
        let mut layered = defaults("");
        let env = make_env(&[
            ("REVMAP_MASTER_MAP_ID", "7"),
            ("CHANNEL_CONFIG_MAP_ID", "9"),
        ]);

        assert_eq!(apply_env_fallbacks(&mut layered, &env), 1);
        assert_eq!(layered.tree()["map"]["master_map_id"].as_integer(), Some(7));
    }

    #[test]
    fn test_legacy_master_map_id_alone() {
        let mut layered = defaults("");
        let env = make_env(&[("CHANNEL_CONFIG_MAP_ID", "9")]);

        apply_env_fallbacks(&mut layered, &env);
        assert_eq!(layered.tree()["map"]["master_map_id"].as_integer(), Some(9));
    }

    #[test]
    fn test_unparseable_integer_stays_string() {
        assert_eq!(env_value("map.call_timeout_ms", "soon").as_str(), Some("soon"));
        assert_eq!(env_value("commit.max_retries", " 5 ").as_integer(), Some(5));
        assert_eq!(env_value("logging.level", "5").as_str(), Some("5"));
    }
}

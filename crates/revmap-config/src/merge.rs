//! A TOML tree built from layers, remembering which layer set each field.

use std::collections::HashMap;
use std::fmt;

/// Source of a configuration value, lowest precedence first.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigLayer {
    /// `defaults.toml`, compiled in.
    Defaults,
    /// The workspace or explicitly named config file.
    File,
    /// A `REVMAP_*` (or legacy) environment variable.
    Environment,
}

impl fmt::Display for ConfigLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Defaults => "defaults",
            Self::File => "config file",
            Self::Environment => "environment variable",
        })
    }
}

/// Dotted field path to the layer that last set it.
pub type FieldSources = HashMap<String, ConfigLayer>;

/// Merged configuration tree plus provenance of every leaf.
#[derive(Debug, Clone)]
pub struct Layered {
    tree: toml::Value,
    sources: FieldSources,
}

impl Layered {
    /// Start from `base`, attributing all of its leaves to `layer`.
    #[must_use]
    pub fn new(base: toml::Value, layer: ConfigLayer) -> Self {
        let mut sources = FieldSources::new();
        attribute(&base, "", layer, &mut sources);
        Self {
            tree: base,
            sources,
        }
    }

    /// Merge `overlay` on top. Tables merge key by key; any other value
    /// replaces what was there.
    pub fn overlay(&mut self, overlay: &toml::Value, layer: ConfigLayer) {
        merge_into(&mut self.tree, overlay, "", layer, &mut self.sources);
    }

    /// Set a `section.key` field, creating the section when missing.
    pub fn set(&mut self, path: &str, value: toml::Value, layer: ConfigLayer) {
        let Some((section, key)) = path.split_once('.') else {
            return;
        };
        let Some(root) = self.tree.as_table_mut() else {
            return;
        };
        let section = root
            .entry(section)
            .or_insert_with(|| toml::Value::Table(toml::Table::new()));
        if let Some(section) = section.as_table_mut() {
            section.insert(key.to_owned(), value);
            self.sources.insert(path.to_owned(), layer);
        }
    }

    /// Layer that last set `path`, if any did.
    #[must_use]
    pub fn source_of(&self, path: &str) -> Option<ConfigLayer> {
        self.sources.get(path).copied()
    }

    /// The merged tree.
    #[must_use]
    pub fn tree(&self) -> &toml::Value {
        &self.tree
    }

    /// Split into the merged tree and its provenance.
    #[must_use]
    pub fn into_parts(self) -> (toml::Value, FieldSources) {
        (self.tree, self.sources)
    }
}

fn merge_into(
    base: &mut toml::Value,
    overlay: &toml::Value,
    path: &str,
    layer: ConfigLayer,
    sources: &mut FieldSources,
) {
    match (base, overlay) {
        (toml::Value::Table(base_table), toml::Value::Table(overlay_table)) => {
            for (key, value) in overlay_table {
                let child = dotted(path, key);
                match base_table.get_mut(key) {
                    Some(existing) => merge_into(existing, value, &child, layer, sources),
                    None => {
                        base_table.insert(key.clone(), value.clone());
                        attribute(value, &child, layer, sources);
                    },
                }
            }
        },
        (base, overlay) => {
            *base = overlay.clone();
            attribute(overlay, path, layer, sources);
        },
    }
}

fn attribute(value: &toml::Value, path: &str, layer: ConfigLayer, sources: &mut FieldSources) {
    match value {
        toml::Value::Table(table) => {
            for (key, child) in table {
                attribute(child, &dotted(path, key), layer, sources);
            }
        },
        _ => {
            sources.insert(path.to_owned(), layer);
        },
    }
}

fn dotted(path: &str, key: &str) -> String {
    if path.is_empty() {
        key.to_owned()
    } else {
        format!("{path}.{key}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(s: &str) -> toml::Value {
        toml::from_str(s).unwrap()
    }

    #[test]
    fn test_overlay_replaces_leaves_and_tracks_layers() {
        let mut layered = Layered::new(
            parse("[map]\ncall_timeout_ms = 10\nstate_path = \"a\""),
            ConfigLayer::Defaults,
        );
        layered.overlay(
            &parse("[map]\ncall_timeout_ms = 50\n[commit]\nmax_retries = 1"),
            ConfigLayer::File,
        );

        let tree = layered.tree();
        assert_eq!(tree["map"]["call_timeout_ms"].as_integer(), Some(50));
        assert_eq!(tree["map"]["state_path"].as_str(), Some("a"));
        assert_eq!(tree["commit"]["max_retries"].as_integer(), Some(1));
        assert_eq!(layered.source_of("map.call_timeout_ms"), Some(ConfigLayer::File));
        assert_eq!(layered.source_of("map.state_path"), Some(ConfigLayer::Defaults));
        assert_eq!(layered.source_of("commit.max_retries"), Some(ConfigLayer::File));
    }

    #[test]
    fn test_set_creates_missing_section() {
        let empty = toml::Value::Table(toml::Table::new());
        let mut layered = Layered::new(empty, ConfigLayer::Defaults);
        layered.set("map.master_map_id", toml::Value::Integer(3), ConfigLayer::Environment);

        assert_eq!(layered.tree()["map"]["master_map_id"].as_integer(), Some(3));
        assert_eq!(
            layered.source_of("map.master_map_id"),
            Some(ConfigLayer::Environment)
        );
        assert_eq!(layered.source_of("map.state_path"), None);
    }

    #[test]
    fn test_array_is_replaced_not_appended() {
        let mut layered = Layered::new(
            parse("[logging]\ndirectives = [\"a=debug\"]"),
            ConfigLayer::Defaults,
        );
        layered.overlay(&parse("[logging]\ndirectives = [\"b=trace\"]"), ConfigLayer::File);

        let (tree, sources) = layered.into_parts();
        assert_eq!(tree["logging"]["directives"].as_array().map(Vec::len), Some(1));
        assert_eq!(sources.get("logging.directives"), Some(&ConfigLayer::File));
    }
}

//! Bridge from `revmap_config::Config` to the types the runtime crates take.

use std::path::{Path, PathBuf};

use revmap_config::Config;
use revmap_core::RetryConfig;
use revmap_telemetry::{LogConfig, LogFormat};

/// Convert the `[logging]` section to a [`LogConfig`]. Unknown formats were
/// already rejected by config validation and fall back to compact.
pub(crate) fn to_log_config(cfg: &Config) -> LogConfig {
    let format = cfg
        .logging
        .format
        .parse::<LogFormat>()
        .unwrap_or(LogFormat::Compact);

    cfg.logging
        .directives
        .iter()
        .fold(LogConfig::new(&cfg.logging.level), LogConfig::with_directive)
        .with_format(format)
}

/// Convert the `[commit]` section to the conflict retry policy.
pub(crate) fn to_retry_config(cfg: &Config) -> RetryConfig {
    RetryConfig::new(
        cfg.commit.max_retries,
        cfg.commit.initial_delay(),
        cfg.commit.max_delay(),
    )
}

/// Resolve a configured path against the workspace root. Absolute paths are
/// kept as they are.
pub(crate) fn resolve_path(workspace_root: &Path, path: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        workspace_root.join(path)
    }
}

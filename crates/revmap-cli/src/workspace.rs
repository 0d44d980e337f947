//! The local workspace: resolved config plus the file-backed map engine.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Context;
use revmap_config::env::collect_env_vars;
use revmap_config::{Config, ResolvedConfig, workspace_config_path};
use revmap_core::MapId;
use revmap_crypto::KeyPair;
use revmap_ledger::RecordService;
use revmap_map::{MapAdmin, MemoryMapEngine};
use revmap_telemetry::RequestContext;
use tracing::debug;

use crate::config_bridge::{resolve_path, to_retry_config};

/// Load the configuration for `root`, from `config_file` when given.
pub(crate) fn load_config(
    root: &Path,
    config_file: Option<&Path>,
) -> anyhow::Result<ResolvedConfig> {
    let resolved = match config_file {
        Some(path) => Config::load_with_env(Some(path), &collect_env_vars()),
        None => Config::load(Some(root)),
    };
    resolved.context("failed to load configuration")
}

/// An opened workspace.
pub(crate) struct Workspace {
    root: PathBuf,
    config_path: PathBuf,
    config: Config,
    engine: Arc<MemoryMapEngine>,
}

impl Workspace {
    /// Open the engine state and signing key named by `config`.
    pub(crate) fn open(
        root: PathBuf,
        config_file: Option<&Path>,
        config: Config,
    ) -> anyhow::Result<Self> {
        let config_path =
            config_file.map_or_else(|| workspace_config_path(&root), Path::to_path_buf);
        let key_path = resolve_path(&root, &config.map.signing_key_path);
        let state_path = resolve_path(&root, &config.map.state_path);

        let keypair = KeyPair::load_or_generate(&key_path)
            .with_context(|| format!("failed to load signing key {}", key_path.display()))?;
        let engine = MemoryMapEngine::open(&state_path, keypair)
            .with_context(|| format!("failed to open map state {}", state_path.display()))?;
        debug!(
            state = %state_path.display(),
            key_id = %engine.public_key().key_id_hex(),
            "Opened map engine"
        );

        Ok(Self {
            root,
            config_path,
            config,
            engine: Arc::new(engine),
        })
    }

    /// Workspace root directory.
    pub(crate) fn root(&self) -> &Path {
        &self.root
    }

    /// Config file `init` records the master map id in.
    pub(crate) fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// The resolved configuration.
    pub(crate) fn config(&self) -> &Config {
        &self.config
    }

    /// Admin handle over the local engine.
    pub(crate) fn admin(&self) -> MapAdmin {
        MapAdmin::new(self.engine.clone(), self.config.map.call_timeout())
    }

    /// The configured master map id.
    pub(crate) fn master_map_id(&self) -> anyhow::Result<MapId> {
        self.config
            .map
            .master_map_id
            .map(MapId)
            .context("no master map configured; run `revmap init` first")
    }

    /// A record service over the configured master map.
    pub(crate) async fn service(&self, ctx: &RequestContext) -> anyhow::Result<RecordService> {
        let service = RecordService::connect(self.admin(), ctx, self.master_map_id()?)
            .await?
            .with_retry(to_retry_config(&self.config));
        Ok(service)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_open_creates_key_and_resolves_paths() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::open(dir.path().to_path_buf(), None, Config::default()).unwrap();

        assert!(dir.path().join(".revmap/signing.key").exists());
        assert_eq!(ws.config_path(), workspace_config_path(dir.path()));
        assert_eq!(ws.root(), dir.path());
    }

    #[test]
    fn test_master_map_id_required() {
        let dir = tempfile::tempdir().unwrap();
        let ws = Workspace::open(dir.path().to_path_buf(), None, Config::default()).unwrap();
        assert!(ws.master_map_id().is_err());

        let mut config = Config::default();
        config.map.master_map_id = Some(3);
        let ws = Workspace::open(dir.path().to_path_buf(), None, config).unwrap();
        assert_eq!(ws.master_map_id().unwrap(), MapId(3));
    }

    #[test]
    fn test_load_config_from_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("custom.toml");
        std::fs::write(&path, "[map]\nmaster_map_id = 8\n").unwrap();

        let resolved = load_config(dir.path(), Some(path.as_path())).unwrap();
        assert_eq!(resolved.config.map.master_map_id, Some(8));
    }
}

//! Test harness: logging setup and a ready-to-use ledger.

use std::sync::Arc;

use revmap_core::{ChannelId, MapId, RetryConfig, Revision};
use revmap_ledger::{
    ChannelRegistry, LedgerResult, MapChannelRegistry, MapRecordStore, RecordService,
    provision_master_map,
};
use revmap_map::{MapAdmin, MapBackend, VerifiableMapClient};
use tracing_subscriber::EnvFilter;

use crate::fixtures::{test_admin, test_context};

/// Set up test logging with a specific filter.
///
/// Safe to call from many tests; only the first call installs a subscriber.
pub fn setup_test_logging(filter: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::new(filter))
        .with_test_writer()
        .try_init();
}

/// Set up test logging with default filter (warn level).
pub fn setup_test_logging_default() {
    setup_test_logging("warn");
}

/// A provisioned master map with a registry and service on top.
pub struct TestLedger {
    /// The backend everything runs on.
    pub backend: Arc<dyn MapBackend>,
    /// Admin handle over `backend`.
    pub admin: MapAdmin,
    /// The provisioned master map.
    pub master_map_id: MapId,
    /// Registry over the master map.
    pub registry: Arc<MapChannelRegistry>,
    /// Service sharing `registry`, with fast conflict retries.
    pub service: RecordService,
}

impl TestLedger {
    /// Provision a master map on `backend` and build a service over it.
    ///
    /// # Errors
    ///
    /// Any ledger error from provisioning or opening the master map.
    pub async fn new(backend: Arc<dyn MapBackend>) -> LedgerResult<Self> {
        Self::with_retry(backend, RetryConfig::fast()).await
    }

    /// Like [`TestLedger::new`] with an explicit conflict retry policy.
    ///
    /// # Errors
    ///
    /// Any ledger error from provisioning or opening the master map.
    pub async fn with_retry(
        backend: Arc<dyn MapBackend>,
        retry: RetryConfig,
    ) -> LedgerResult<Self> {
        let ctx = test_context();
        let admin = test_admin(Arc::clone(&backend));
        let master_map_id = provision_master_map(&admin, &ctx).await?;
        let registry =
            Arc::new(MapChannelRegistry::connect(admin.clone(), &ctx, master_map_id).await?);
        let service = RecordService::new(
            Arc::clone(&registry) as Arc<dyn ChannelRegistry>,
            Arc::new(MapRecordStore::new()),
        )
        .with_retry(retry);

        Ok(Self {
            backend,
            admin,
            master_map_id,
            registry,
            service,
        })
    }

    /// A client for a registered channel's map, or `None` if unregistered.
    ///
    /// # Errors
    ///
    /// Any ledger error from the lookup.
    pub async fn channel_map(
        &self,
        channel_id: &str,
    ) -> LedgerResult<Option<Arc<dyn VerifiableMapClient>>> {
        let ctx = test_context();
        match self.registry.get(&ctx, &ChannelId::new(channel_id)).await? {
            Some(channel) => Ok(Some(self.registry.map_handle(&ctx, channel.map_id).await?)),
            None => Ok(None),
        }
    }

    /// Current revision of a registered channel's map, `None` if unregistered.
    ///
    /// # Errors
    ///
    /// Any ledger error from the lookup or the read.
    pub async fn channel_revision(&self, channel_id: &str) -> LedgerResult<Option<Revision>> {
        let ctx = test_context();
        match self.channel_map(channel_id).await? {
            Some(map) => Ok(Some(map.get_current_revision(&ctx).await?)),
            None => Ok(None),
        }
    }

    /// Current revision of the master map.
    ///
    /// # Errors
    ///
    /// Any ledger error from opening or reading the master map.
    pub async fn master_revision(&self) -> LedgerResult<Revision> {
        let ctx = test_context();
        let master = self.admin.connect(&ctx, self.master_map_id).await?;
        Ok(master.get_current_revision(&ctx).await?)
    }
}

impl std::fmt::Debug for TestLedger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TestLedger")
            .field("master_map_id", &self.master_map_id)
            .finish_non_exhaustive()
    }
}

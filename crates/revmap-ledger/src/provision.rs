//! One-time setup of the shared master map.

use revmap_core::MapId;
use revmap_map::{MapAdmin, MapSpec};
use revmap_telemetry::RequestContext;
use tracing::info;

use crate::error::LedgerResult;

/// Display name given to master maps.
pub const MASTER_MAP_NAME: &str = "revmap-channels";

/// Allocate and initialise a master map for a [`crate::MapChannelRegistry`].
///
/// # Errors
///
/// [`crate::LedgerError::Internal`] if the engine cannot allocate or
/// initialise the map.
pub async fn provision_master_map(admin: &MapAdmin, ctx: &RequestContext) -> LedgerResult<MapId> {
    let spec = MapSpec::new(MASTER_MAP_NAME, "channel id to channel map id");
    let descriptor = admin.create_map(ctx, spec).await?;

    info!(
        map_id = %descriptor.map_id,
        request_id = %ctx.request_id,
        "Master map provisioned"
    );
    Ok(descriptor.map_id)
}

#[cfg(test)]
mod tests {
    use super::*;
    use revmap_map::{DEFAULT_CALL_TIMEOUT, MapBackend, MemoryMapEngine, VerifiableMapClient};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_master_map_is_initialised_and_empty() {
        let engine = Arc::new(MemoryMapEngine::new());
        let admin = MapAdmin::new(engine.clone(), DEFAULT_CALL_TIMEOUT);
        let ctx = RequestContext::new("test");

        let map_id = provision_master_map(&admin, &ctx).await.unwrap();
        let descriptor = engine.get_map_metadata(map_id).await.unwrap();
        assert!(descriptor.initialized);
        assert_eq!(descriptor.display_name, MASTER_MAP_NAME);

        let client = admin.connect(&ctx, map_id).await.unwrap();
        assert_eq!(client.get_current_revision(&ctx).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_expired_context_fails() {
        let engine = Arc::new(MemoryMapEngine::new());
        let admin = MapAdmin::new(engine.clone(), DEFAULT_CALL_TIMEOUT);
        let ctx = RequestContext::new("test").with_timeout(std::time::Duration::ZERO);

        let err = provision_master_map(&admin, &ctx).await.unwrap_err();
        assert_eq!(err.kind(), crate::ErrorKind::Internal);
        assert_eq!(engine.map_count().unwrap(), 0);
    }
}

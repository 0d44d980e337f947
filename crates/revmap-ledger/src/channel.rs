//! Channel registry: channel id to backing map id.
//!
//! Every channel owns one dedicated map. The binding is itself stored as a
//! single leaf in a shared master map, at index `SHA-256(channel_id)`.

use std::sync::Arc;

use async_trait::async_trait;
use revmap_core::{Channel, ChannelId, MapId, Revision};
use revmap_map::{MapAdmin, MapLeaf, MapSpec, VerifiableMapClient};
use revmap_telemetry::RequestContext;
use tracing::{debug, info, warn};

use crate::error::{InternalError, LedgerError, LedgerResult};

/// A channel returned by [`ChannelRegistry::ensure`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EnsuredChannel {
    /// The registered channel.
    pub channel: Channel,
    /// Whether this call registered it.
    pub created: bool,
}

/// Creates and resolves channels.
#[async_trait]
pub trait ChannelRegistry: Send + Sync {
    /// Allocate a map for `channel_id` and register it in the master map,
    /// writing master revision `expected_revision`.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Internal`] if allocation, initialisation or the write fails.
    async fn create(
        &self,
        ctx: &RequestContext,
        channel_id: &ChannelId,
        expected_revision: Revision,
    ) -> LedgerResult<MapId>;

    /// Look up a channel. `None` when it was never registered.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Internal`] on read or verification failure, or if the
    /// stored entry is malformed.
    async fn get(
        &self,
        ctx: &RequestContext,
        channel_id: &ChannelId,
    ) -> LedgerResult<Option<Channel>>;

    /// Return the channel, registering it at the next master revision if needed.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Internal`] on any map failure, including losing the
    /// master write to another registration.
    async fn ensure(
        &self,
        ctx: &RequestContext,
        channel_id: &ChannelId,
    ) -> LedgerResult<EnsuredChannel>;

    /// Open a verified client for a channel's map.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Internal`] if the map does not exist or cannot be reached.
    async fn map_handle(
        &self,
        ctx: &RequestContext,
        map_id: MapId,
    ) -> LedgerResult<Arc<dyn VerifiableMapClient>>;
}

/// [`ChannelRegistry`] backed by a master map.
pub struct MapChannelRegistry {
    admin: MapAdmin,
    master: Arc<dyn VerifiableMapClient>,
}

impl MapChannelRegistry {
    /// Create a registry writing to `master` and allocating maps through `admin`.
    #[must_use]
    pub fn new(admin: MapAdmin, master: Arc<dyn VerifiableMapClient>) -> Self {
        Self { admin, master }
    }

    /// Create a registry over the master map `master_map_id`.
    ///
    /// # Errors
    ///
    /// [`LedgerError::Internal`] if the master map cannot be opened.
    pub async fn connect(
        admin: MapAdmin,
        ctx: &RequestContext,
        master_map_id: MapId,
    ) -> LedgerResult<Self> {
        let master = admin.connect(ctx, master_map_id).await?;
        Ok(Self::new(admin, Arc::new(master)))
    }

    /// Id of the master map.
    #[must_use]
    pub fn master_map_id(&self) -> MapId {
        self.master.map_id()
    }
}

impl std::fmt::Debug for MapChannelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MapChannelRegistry")
            .field("master_map_id", &self.master.map_id())
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl ChannelRegistry for MapChannelRegistry {
    async fn create(
        &self,
        ctx: &RequestContext,
        channel_id: &ChannelId,
        expected_revision: Revision,
    ) -> LedgerResult<MapId> {
        let spec = MapSpec::new(
            channel_id.as_str(),
            format!("record versions for channel {channel_id}"),
        );
        let descriptor = self.admin.create_map(ctx, spec).await?;

        let channel = Channel::new(channel_id.clone(), descriptor.map_id);
        let value = channel.to_leaf_value().map_err(LedgerError::serialization)?;
        self.master
            .add(
                ctx,
                vec![MapLeaf::new(channel_id.leaf_index(), value)],
                expected_revision,
            )
            .await
            .inspect_err(|e| {
                warn!(
                    channel_id = %channel_id,
                    map_id = %descriptor.map_id,
                    revision = expected_revision,
                    error = %e,
                    "Channel registration failed; allocated map is unused"
                );
            })?;

        info!(
            channel_id = %channel_id,
            map_id = %descriptor.map_id,
            revision = expected_revision,
            "Channel created"
        );
        Ok(descriptor.map_id)
    }

    async fn get(
        &self,
        ctx: &RequestContext,
        channel_id: &ChannelId,
    ) -> LedgerResult<Option<Channel>> {
        let index = channel_id.leaf_index();
        let leaves = self.master.get(ctx, &[index]).await?;

        let Some(value) = leaves.value_of(&index) else {
            debug!(channel_id = %channel_id, "Channel not registered");
            return Ok(None);
        };

        let channel = Channel::from_leaf_value(value).map_err(LedgerError::serialization)?;
        if channel.channel_id != *channel_id {
            return Err(InternalError::Serialization(format!(
                "registry entry for {channel_id} names channel {}",
                channel.channel_id
            ))
            .into());
        }
        Ok(Some(channel))
    }

    async fn ensure(
        &self,
        ctx: &RequestContext,
        channel_id: &ChannelId,
    ) -> LedgerResult<EnsuredChannel> {
        if let Some(channel) = self.get(ctx, channel_id).await? {
            return Ok(EnsuredChannel {
                channel,
                created: false,
            });
        }

        let current = self.master.get_current_revision(ctx).await?;
        let next = current
            .checked_add(1)
            .ok_or(InternalError::RevisionOverflow(self.master.map_id()))?;

        match self.create(ctx, channel_id, next).await {
            Ok(map_id) => Ok(EnsuredChannel {
                channel: Channel::new(channel_id.clone(), map_id),
                created: true,
            }),
            Err(e) if e.is_revision_conflict() => {
                // Someone else wrote the master map first; it may have been this channel.
                match self.get(ctx, channel_id).await? {
                    Some(channel) => Ok(EnsuredChannel {
                        channel,
                        created: false,
                    }),
                    None => Err(e),
                }
            },
            Err(e) => Err(e),
        }
    }

    async fn map_handle(
        &self,
        ctx: &RequestContext,
        map_id: MapId,
    ) -> LedgerResult<Arc<dyn VerifiableMapClient>> {
        let client = self.admin.connect(ctx, map_id).await?;
        Ok(Arc::new(client))
    }
}

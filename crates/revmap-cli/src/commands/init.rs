//! Init command: provision the master map and record it in the config.

use revmap_config::loader::set_master_map_id;
use revmap_core::MapId;
use revmap_ledger::{LedgerError, provision_master_map};
use revmap_map::MapError;
use revmap_telemetry::RequestContext;
use serde_json::json;
use tracing::warn;

use crate::formatter::{OutputFormat, print_json};
use crate::theme::Theme;
use crate::workspace::Workspace;

/// Provision the master map unless the configured one already exists.
pub(crate) async fn run_init(
    ws: &Workspace,
    ctx: &RequestContext,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let admin = ws.admin();

    if let Some(id) = ws.config().map.master_map_id {
        match admin.connect(ctx, MapId(id)).await {
            Ok(_) => return report(ws, format, MapId(id), false),
            Err(MapError::MapNotFound(_)) => {
                warn!(map_id = id, "Configured master map missing, provisioning a new one");
            },
            Err(e) => return Err(LedgerError::from(e).into()),
        }
    }

    let map_id = provision_master_map(&admin, ctx).await?;
    set_master_map_id(ws.config_path(), map_id.get())?;
    report(ws, format, map_id, true)
}

fn report(
    ws: &Workspace,
    format: OutputFormat,
    map_id: MapId,
    created: bool,
) -> anyhow::Result<()> {
    match format {
        OutputFormat::Json => print_json(&json!({
            "master_map_id": map_id,
            "created": created,
            "config": ws.config_path().display().to_string(),
        })),
        OutputFormat::Pretty => {
            let message = if created {
                format!("Initialized revmap workspace at {}", ws.root().display())
            } else {
                format!("Workspace already initialized at {}", ws.root().display())
            };
            let line = if created {
                Theme::success(&message)
            } else {
                Theme::info(&message)
            };
            println!("{line}");
            println!("  Master map: {map_id}");
            println!("  Config:     {}", ws.config_path().display());
            println!();
            Ok(())
        },
    }
}

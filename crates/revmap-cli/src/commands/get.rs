//! Get command: show one version of a resource.

use revmap_core::{ChannelId, Record, ResourceId};
use revmap_telemetry::RequestContext;

use crate::formatter::{OutputFormat, print_json};
use crate::theme::Theme;
use crate::workspace::Workspace;

/// Show the latest version, or the one visible at `revision`.
pub(crate) async fn run_get(
    ws: &Workspace,
    ctx: &RequestContext,
    channel: &str,
    resource: &str,
    revision: Option<i64>,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let service = ws.service(ctx).await?;
    let channel_id = ChannelId::new(channel);
    let resource_id = ResourceId::new(resource);

    let record = match revision {
        Some(revision) => {
            service
                .retrieve_at(ctx, &channel_id, &resource_id, revision)
                .await?
        },
        None => service.retrieve(ctx, &channel_id, &resource_id).await?,
    };

    match format {
        OutputFormat::Json => print_json(&record),
        OutputFormat::Pretty => print_record(&record),
    }
}

fn print_record(record: &Record) -> anyhow::Result<()> {
    let audit = &record.audit;
    println!(
        "\n{} {}",
        Theme::header(&format!("{} / {}", audit.channel_id, audit.resource_id)),
        Theme::revision(record.revision)
    );
    println!("{}", Theme::separator());
    println!("  Type:       {}", Theme::commit_type(audit.event_type));
    println!("  Committed:  {}", Theme::timestamp(&audit.timestamp));
    if record.is_first_version() {
        println!("  Previous:   {}", Theme::dimmed("none"));
    } else {
        println!("  Previous:   {}", Theme::revision(record.previous_revision));
    }
    println!("  Payload:");
    for line in serde_json::to_string_pretty(&audit.payload)?.lines() {
        println!("    {line}");
    }
    println!();
    Ok(())
}

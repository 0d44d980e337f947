//! Commit command: write one version of a resource.

use anyhow::Context;
use revmap_ledger::{CommitReceipt, CommitRequest};
use revmap_telemetry::RequestContext;

use crate::formatter::{OutputFormat, print_json};
use crate::theme::Theme;
use crate::workspace::Workspace;

/// Arguments of `revmap commit`.
pub(crate) struct CommitArgs {
    pub(crate) channel: String,
    pub(crate) resource: String,
    pub(crate) commit_type: String,
    pub(crate) payload: String,
}

/// Commit a version and print the receipt.
pub(crate) async fn run_commit(
    ws: &Workspace,
    ctx: &RequestContext,
    args: CommitArgs,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let payload: serde_json::Value =
        serde_json::from_str(&args.payload).context("payload is not valid JSON")?;

    let service = ws.service(ctx).await?;
    let request = CommitRequest::new(args.channel, args.resource, args.commit_type, payload);
    let receipt = service.commit(ctx, request).await?;

    match format {
        OutputFormat::Json => print_json(&receipt),
        OutputFormat::Pretty => {
            print_receipt(&receipt);
            Ok(())
        },
    }
}

fn print_receipt(receipt: &CommitReceipt) {
    println!(
        "{}",
        Theme::success(&format!(
            "Committed {} to {} at {}",
            receipt.resource_id,
            receipt.channel_id,
            Theme::revision(receipt.revision)
        ))
    );
    if receipt.previous_revision > 0 {
        println!("  Supersedes: {}", Theme::revision(receipt.previous_revision));
    }
    println!("  Map:        {}", receipt.map_id);
    if receipt.channel_created {
        println!("  {}", Theme::dimmed("channel registered by this commit"));
    }
}

//! Audit command: list every version of a resource, newest first.

use colored::Colorize;
use revmap_core::{AuditEntry, ChannelId, ResourceId};
use revmap_telemetry::RequestContext;

use crate::formatter::{OutputFormat, print_json};
use crate::theme::Theme;
use crate::workspace::Workspace;

/// Widest payload shown in the pretty table before truncation.
const PAYLOAD_WIDTH: usize = 48;

/// Print the audit trail of a resource.
pub(crate) async fn run_audit(
    ws: &Workspace,
    ctx: &RequestContext,
    channel: &str,
    resource: &str,
    format: OutputFormat,
) -> anyhow::Result<()> {
    let service = ws.service(ctx).await?;
    let entries = service
        .audit(ctx, &ChannelId::new(channel), &ResourceId::new(resource))
        .await?;

    match format {
        OutputFormat::Json => print_json(&entries),
        OutputFormat::Pretty => {
            print_entries(channel, resource, &entries);
            Ok(())
        },
    }
}

fn print_entries(channel: &str, resource: &str, entries: &[AuditEntry]) {
    println!(
        "\n{}",
        Theme::header(&format!("Audit trail for {channel} / {resource}"))
    );
    println!(
        "{:>10} {:>14} {:>20}  {}",
        "REVISION".dimmed(),
        "TYPE".dimmed(),
        "TIMESTAMP".dimmed(),
        "PAYLOAD".dimmed()
    );
    println!("{}", Theme::separator());

    for entry in entries {
        let payload = truncate(&entry.audit.payload.to_string(), PAYLOAD_WIDTH);
        println!(
            "{:>10} {:>14} {:>20}  {}",
            Theme::revision(entry.revision),
            Theme::commit_type(entry.audit.event_type),
            Theme::timestamp(&entry.audit.timestamp),
            payload
        );
    }

    println!();
    println!("{} versions", entries.len());
}

/// Cut `s` to at most `width` characters, marking the cut with an ellipsis.
fn truncate(s: &str, width: usize) -> String {
    if s.chars().count() <= width {
        return s.to_owned();
    }
    let mut out: String = s.chars().take(width.saturating_sub(1)).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate() {
        assert_eq!(truncate("short", 10), "short");
        assert_eq!(truncate("exactly10!", 10), "exactly10!");
        assert_eq!(truncate("this is too long", 8), "this is…");
        assert_eq!(truncate("ünïcödé", 4), "ünï…");
    }
}

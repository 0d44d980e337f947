//! Terminal styling for `revmap` output.

use chrono::{DateTime, Utc};
use colored::Colorize;
use revmap_core::CommitType;

/// Width of the rule printed between a heading and a record body.
const RULE_WIDTH: usize = 50;

/// Styles shared by every command's pretty output.
pub(crate) struct Theme;

impl Theme {
    /// Heading above a record or a history.
    pub(crate) fn header(text: &str) -> String {
        text.bold().cyan().to_string()
    }

    /// Line reporting a completed commit or init.
    pub(crate) fn success(text: &str) -> String {
        format!("{} {text}", "✓".green())
    }

    /// Line reporting a failed command.
    pub(crate) fn error(text: &str) -> String {
        format!("{} {}", "✗".red(), text.red())
    }

    /// Neutral note, e.g. an already provisioned master map.
    pub(crate) fn info(text: &str) -> String {
        format!("{} {text}", "i".blue())
    }

    pub(crate) fn dimmed(text: &str) -> String {
        text.dimmed().to_string()
    }

    pub(crate) fn separator() -> String {
        "━".repeat(RULE_WIDTH).dimmed().to_string()
    }

    /// `r{n}`, the way revisions are shown everywhere in the CLI.
    pub(crate) fn revision(revision: i64) -> String {
        format!("r{revision}").yellow().to_string()
    }

    /// Creating types in green, the rest in cyan.
    pub(crate) fn commit_type(commit_type: CommitType) -> String {
        let name = commit_type.as_str();
        if commit_type.creates_resource() {
            name.green().to_string()
        } else {
            name.cyan().to_string()
        }
    }

    /// Commit time at second precision, UTC.
    pub(crate) fn timestamp(at: &DateTime<Utc>) -> String {
        at.format("%Y-%m-%d %H:%M:%S UTC")
            .to_string()
            .dimmed()
            .to_string()
    }
}

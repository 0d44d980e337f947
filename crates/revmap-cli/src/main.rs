//! Revmap CLI - versioned audit records over verifiable maps.
//!
//! Every command runs against a file-backed local map engine kept under the
//! workspace's `.revmap/` directory. `revmap init` provisions the master map
//! and records its id in the workspace config; the other commands read it
//! from there (or from `REVMAP_MASTER_MAP_ID`).

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};
use revmap_ledger::LedgerError;
use revmap_telemetry::RequestContext;
use serde_json::json;

mod commands;
mod config_bridge;
mod formatter;
mod theme;
mod workspace;

use commands::{audit, commit, get, init};
use formatter::OutputFormat;
use theme::Theme;
use workspace::{Workspace, load_config};

/// Revmap - versioned audit records over verifiable maps
#[derive(Parser)]
#[command(name = "revmap")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Output format: pretty (default) or json
    #[arg(long, global = true, default_value = "pretty")]
    format: String,

    /// Path to configuration file (default: {workspace}/.revmap/config.toml)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Workspace root (default: current directory)
    #[arg(short, long, global = true, env = "REVMAP_WORKSPACE")]
    workspace: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Provision the master map and record it in the workspace config
    Init,

    /// Commit a new version of a resource
    Commit {
        /// Channel to commit to
        #[arg(long)]
        channel: String,

        /// Resource to version
        #[arg(long)]
        resource: String,

        /// Commit type: CREATE, UPDATE, ATTACH, DETACH, TRANSFER-IN or TRANSFER-OUT
        #[arg(long = "type")]
        commit_type: String,

        /// JSON payload
        #[arg(long, default_value = "{}")]
        payload: String,
    },

    /// Show the latest version of a resource, or the one at a revision
    Get {
        /// Channel to read from
        #[arg(long)]
        channel: String,

        /// Resource to read
        #[arg(long)]
        resource: String,

        /// Map revision to read at (latest if omitted)
        #[arg(long)]
        revision: Option<i64>,
    },

    /// Show every version of a resource, newest first
    Audit {
        /// Channel to read from
        #[arg(long)]
        channel: String,

        /// Resource to reconstruct
        #[arg(long)]
        resource: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let format = OutputFormat::parse(&cli.format);

    match run(cli, format).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            report_error(&e, format);
            ExitCode::FAILURE
        },
    }
}

async fn run(cli: Cli, format: OutputFormat) -> Result<()> {
    let root = match cli.workspace {
        Some(root) => root,
        None => std::env::current_dir()?,
    };
    let resolved = load_config(&root, cli.config.as_deref())?;

    // Set up logging from config, with --verbose override.
    let mut log_config = config_bridge::to_log_config(&resolved.config);
    if cli.verbose {
        "debug".clone_into(&mut log_config.filter);
    }
    if let Err(e) = revmap_telemetry::setup_logging(&log_config) {
        eprintln!("Failed to initialize logging: {e}");
    }

    let ws = Workspace::open(root, cli.config.as_deref(), resolved.config)?;
    let ctx = RequestContext::new("cli");

    match cli.command {
        Commands::Init => init::run_init(&ws, &ctx.with_operation("init"), format).await,
        Commands::Commit {
            channel,
            resource,
            commit_type,
            payload,
        } => {
            let args = commit::CommitArgs {
                channel,
                resource,
                commit_type,
                payload,
            };
            commit::run_commit(&ws, &ctx.with_operation("commit"), args, format).await
        },
        Commands::Get {
            channel,
            resource,
            revision,
        } => {
            let ctx = ctx.with_operation("get");
            get::run_get(&ws, &ctx, &channel, &resource, revision, format).await
        },
        Commands::Audit { channel, resource } => {
            let ctx = ctx.with_operation("audit");
            audit::run_audit(&ws, &ctx, &channel, &resource, format).await
        },
    }
}

/// Stable name for the error's category: the ledger kind when there is one.
fn error_kind(e: &anyhow::Error) -> &'static str {
    e.downcast_ref::<LedgerError>()
        .map_or("error", |le| le.kind().as_str())
}

fn report_error(e: &anyhow::Error, format: OutputFormat) {
    let kind = error_kind(e);
    match format {
        OutputFormat::Json => {
            let body = json!({"error": {"kind": kind, "message": format!("{e:#}")}});
            println!("{body}");
        },
        OutputFormat::Pretty => {
            eprintln!("{}", Theme::error(&format!("[{kind}] {e:#}")));
        },
    }
}

//! sapflow - command-line inbox for SAP workflow approvals
//!
//! Lists workflow tasks and sends approve / reject decisions through the
//! SAP workflow API, authenticating with the OAuth2 client-credentials
//! grant.
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use log::LevelFilter;

use sapflow_client::WorkflowClient;
use sapflow_common::Decision;

mod commands;
mod config;
mod display;

use config::CliConfig;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Path to the configuration file (default: ~/.config/sapflow/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Base URL of the workflow endpoints, overriding the config file
    #[arg(long, global = true)]
    base_url: Option<String>,

    /// Base URL of the authorization server, overriding the config file
    #[arg(long, global = true)]
    auth_url: Option<String>,

    /// Increase log verbosity (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List workflow tasks
    List {
        /// Only show tasks with this status (e.g. READY, IN_PROGRESS)
        #[arg(long)]
        status: Option<String>,
    },
    /// Show task counts by status
    Stats,
    /// Show all fields of one task
    Show {
        /// Workflow instance id
        instance_id: String,
    },
    /// Approve a task
    Approve(DecisionArgs),
    /// Reject a task
    Reject(DecisionArgs),
}

#[derive(clap::Args, Debug)]
struct DecisionArgs {
    /// Workflow instance id
    instance_id: String,

    /// Comment sent with the decision (default: "Approved" / "Rejected")
    #[arg(long, short)]
    comment: Option<String>,

    /// Do not print the task list afterwards
    #[arg(long)]
    no_refresh: bool,
}

const fn log_level(verbose: u8) -> LevelFilter {
    match verbose {
        0 => LevelFilter::Warn,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // RUST_LOG wins over -v when set
    env_logger::Builder::new()
        .filter_level(log_level(args.verbose))
        .parse_default_env()
        .format_timestamp(None)
        .init();

    let mut cli_config =
        CliConfig::load(args.config.as_deref()).context("Failed to load configuration")?;
    cli_config.apply_overrides(args.base_url, args.auth_url);

    let client_config = cli_config.client_config().context("Invalid configuration")?;
    let client = WorkflowClient::new(client_config).context("Failed to create client")?;
    let settings = &cli_config.settings;

    match args.command {
        Command::List { status } => commands::list(&client, settings, status.as_deref()).await,
        Command::Stats => commands::stats(&client, settings).await,
        Command::Show { instance_id } => commands::show(&client, settings, &instance_id).await,
        Command::Approve(decision) => {
            run_decision(&client, settings, decision, Decision::Approve).await
        }
        Command::Reject(decision) => {
            run_decision(&client, settings, decision, Decision::Reject).await
        }
    }
}

async fn run_decision(
    client: &WorkflowClient,
    settings: &config::Settings,
    args: DecisionArgs,
    decision: Decision,
) -> Result<()> {
    commands::decide(
        client,
        settings,
        &args.instance_id,
        decision,
        args.comment.as_deref(),
        !args.no_refresh,
    )
    .await
}

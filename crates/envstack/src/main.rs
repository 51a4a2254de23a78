//! envstack CLI.
//!
//! Assembles an EKS demo environment from a handful of settings, deploys it
//! phase by phase, reports its live status, and tears it down again.

// Allow product names without backticks in doc comments
#![allow(clippy::doc_markdown)]

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

use commands::deploy::DeployCommand;
use commands::destroy::DestroyCommand;
use commands::plan::PlanCommand;
use commands::status::StatusCommand;

/// envstack - EKS demo environment lifecycle.
#[derive(Parser)]
#[command(
    name = "envstack",
    version,
    about = "Deploy, inspect and tear down an EKS demo environment",
    long_about = "Deploy, inspect and tear down an EKS demo environment.\n\n\
                  A VPC, container registries, an EKS cluster with a managed node group,\n\
                  Helm add-ons and optional DNS and monitoring are planned from flags or\n\
                  environment variables, then created in dependency order.\n\n\
                  All operations are idempotent - re-running the same command will\n\
                  skip resources that already exist."
)]
#[command(propagate_version = true)]
struct Cli {
    /// Enable verbose logging.
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
#[allow(clippy::large_enum_variant)]
enum Commands {
    /// Create every resource and verify the environment.
    Deploy(DeployCommand),

    /// Show the live status of every planned resource.
    Status(StatusCommand),

    /// Delete every resource in reverse order.
    ///
    /// Requires typing DELETE, or passing --confirm DELETE.
    Destroy(DestroyCommand),

    /// Print the resource plan without calling AWS.
    Plan(PlanCommand),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose {
        EnvFilter::new("info,envstack=debug,envstack_cloud=debug")
    } else {
        EnvFilter::new("warn,envstack=info,envstack_cloud=info")
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Deploy(cmd) => cmd.run().await,
        Commands::Status(cmd) => cmd.run().await,
        Commands::Destroy(cmd) => cmd.run().await,
        Commands::Plan(cmd) => cmd.run(),
    }
}

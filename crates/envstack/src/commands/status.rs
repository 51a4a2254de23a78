use anyhow::Result;
use clap::Args;
use envstack::{build_plan, ui, OutputFormat, PollConfig};

use super::EnvironmentArgs;

/// Show the live status of every planned resource
#[derive(Args)]
pub struct StatusCommand {
    #[command(flatten)]
    env: EnvironmentArgs,

    /// Output format (table, json)
    #[arg(short, long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,
}

impl StatusCommand {
    pub async fn run(&self) -> Result<()> {
        let config = self.env.resolve()?;
        let plan = build_plan(&config)?;
        let orchestrator = self.env.orchestrator(&config, PollConfig::default());

        let report = orchestrator.observe(&config, &plan).await?;

        match self.output {
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&report)?),
            OutputFormat::Table => {
                ui::print_section("📋 Environment status");
                ui::print_status_table(&report);
            }
        }
        Ok(())
    }
}

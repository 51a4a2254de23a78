use anyhow::Result;
use clap::Args;
use envstack::{build_plan, ui, OutputFormat};

use super::EnvironmentArgs;

/// Print the resource plan without touching the cloud
#[derive(Args)]
pub struct PlanCommand {
    #[command(flatten)]
    env: EnvironmentArgs,

    /// Output format (table, json)
    #[arg(short, long, value_name = "FORMAT", default_value = "table")]
    output: OutputFormat,
}

impl PlanCommand {
    pub fn run(&self) -> Result<()> {
        let config = self.env.resolve()?;
        let plan = build_plan(&config)?;

        match self.output {
            OutputFormat::Json => println!("{}", plan.to_json()?),
            OutputFormat::Table => {
                ui::print_section("🗺  Resource plan");
                ui::print_config_summary(&config);
                println!();
                ui::print_plan_table(&plan);
            }
        }
        Ok(())
    }
}

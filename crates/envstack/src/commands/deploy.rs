use anyhow::Result;
use clap::Args;
use colored::Colorize;
use dialoguer::{theme::ColorfulTheme, Confirm};
use envstack::{build_plan, ui};

use super::{EnvironmentArgs, PollArgs};

/// Create every resource in the plan and verify it
#[derive(Args)]
pub struct DeployCommand {
    #[command(flatten)]
    env: EnvironmentArgs,

    #[command(flatten)]
    poll: PollArgs,

    /// Skip the confirmation prompt
    #[arg(short, long)]
    yes: bool,
}

impl DeployCommand {
    pub async fn run(&self) -> Result<()> {
        ui::print_section("🚀 Deploying environment");

        let config = self.env.resolve()?;
        ui::print_config_summary(&config);
        println!();

        let plan = build_plan(&config)?;
        ui::print_info(&format!("{} resources planned", plan.len()));
        println!();

        if !self.yes {
            let proceed = Confirm::with_theme(&ColorfulTheme::default())
                .with_prompt("Proceed with deployment?")
                .default(true)
                .interact()?;

            if !proceed {
                println!("{}", "Deployment cancelled.".yellow());
                return Ok(());
            }
        }

        let orchestrator = self.env.orchestrator(&config, self.poll.poll_config());
        match orchestrator.bring_up(&plan).await {
            Ok(state) => {
                println!();
                if state.warnings.is_empty() {
                    ui::print_success("Environment deployed 🎉");
                } else {
                    ui::print_success("Environment deployed with warnings");
                }
                ui::print_info(&format!(
                    "kubectl: aws eks update-kubeconfig --region {} --name {}",
                    config.region, config.cluster_name
                ));
                Ok(())
            }
            Err(e) => {
                println!();
                ui::print_info("Re-run the same command to resume; active resources are skipped.");
                Err(e.into())
            }
        }
    }
}

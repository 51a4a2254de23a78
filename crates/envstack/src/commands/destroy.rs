use anyhow::Result;
use clap::Args;
use colored::Colorize;
use dialoguer::{theme::ColorfulTheme, Input};
use envstack::{build_plan, ui, LifecycleError, CONFIRMATION_TOKEN};

use super::{EnvironmentArgs, PollArgs};

/// Delete every resource in the plan, in reverse order
#[derive(Args)]
pub struct DestroyCommand {
    #[command(flatten)]
    env: EnvironmentArgs,

    #[command(flatten)]
    poll: PollArgs,

    /// Confirmation token; must be exactly DELETE. Prompts when omitted.
    #[arg(long, value_name = "TOKEN")]
    confirm: Option<String>,
}

impl DestroyCommand {
    pub async fn run(&self) -> Result<()> {
        ui::print_section("🧹 Destroying environment");

        let config = self.env.resolve()?;
        ui::print_config_summary(&config);
        println!();

        let plan = build_plan(&config)?;
        ui::print_warning(&format!(
            "This permanently deletes {} resources, including every image in the registries.",
            plan.len()
        ));
        println!();

        let input = match &self.confirm {
            Some(token) => token.clone(),
            None => Input::<String>::with_theme(&ColorfulTheme::default())
                .with_prompt(format!("Type {CONFIRMATION_TOKEN} to confirm"))
                .allow_empty(true)
                .interact_text()?,
        };

        let orchestrator = self.env.orchestrator(&config, self.poll.poll_config());
        match orchestrator.destroy(&plan, &input).await {
            Ok(_) => {
                println!();
                ui::print_success("Environment destroyed");
                Ok(())
            }
            Err(LifecycleError::ConfirmationDeclined) => {
                println!("{}", "Teardown cancelled.".yellow());
                Ok(())
            }
            Err(e) => {
                println!();
                ui::print_info("Re-run the same command to resume; absent resources are skipped.");
                Err(e.into())
            }
        }
    }
}

//! UI helpers for the envstack CLI.
//!
//! Provides consistent formatting for console output: every phase transition
//! and resource status change is printed with a severity tag (`ℹ` info,
//! `✓` success, `⚠` warning, `✗` error).

use std::time::Duration;

use colored::{ColoredString, Colorize};
use envstack_cloud::ResourceStatus;
use indicatif::{ProgressBar, ProgressStyle};

use crate::config::EnvironmentConfig;
use crate::plan::ResourcePlan;
use crate::report::StatusReport;

/// Print a section header.
pub fn print_section(title: &str) {
    println!();
    println!("{}", "═".repeat(70).bright_black());
    println!("{}", title.cyan().bold());
    println!("{}", "═".repeat(70).bright_black());
    println!();
}

/// Print a step indicator with message.
pub fn print_step(message: &str) {
    println!("{} {}", "▶".cyan(), message.bold());
}

/// Print a progress step with step number.
pub fn print_progress_step(current: u8, total: u8, message: &str) {
    println!(
        "{} {} {}",
        format!("[{current}/{total}]").bright_black(),
        "▶".cyan(),
        message.bold()
    );
}

/// Print a success message.
pub fn print_success(message: &str) {
    println!("{} {}", "✓".green().bold(), message.green());
}

/// Print a warning message.
pub fn print_warning(message: &str) {
    println!("{} {}", "⚠".yellow().bold(), message.yellow());
}

/// Print an error message.
pub fn print_error(message: &str) {
    println!("{} {}", "✗".red().bold(), message.red());
}

/// Print an info message.
pub fn print_info(message: &str) {
    println!("{} {}", "ℹ".blue().bold(), message);
}

/// Print prerequisite check result.
pub fn print_check_result(name: &str, passed: bool, message: Option<&str>) {
    let status = if passed { "✓".green() } else { "✗".red() };

    let text = if let Some(msg) = message {
        format!("{name} - {msg}")
    } else {
        name.to_string()
    };

    println!("  {status} {text}");
}

/// Print a key-value pair.
pub fn print_kv(key: &str, value: &str) {
    println!("  {} {}", format!("{key}:").bright_black(), value.green());
}

/// Print a list item.
pub fn print_list_item(item: &str) {
    println!("  {} {item}", "•".bright_black());
}

/// Colored label for a resource status.
#[must_use]
pub fn status_label(status: ResourceStatus) -> ColoredString {
    let label = status.to_string();
    match status {
        ResourceStatus::Active => label.green(),
        ResourceStatus::InProgress => label.cyan(),
        ResourceStatus::Pending => label.bright_black(),
        ResourceStatus::Failed => label.red().bold(),
        ResourceStatus::Absent => label.yellow(),
    }
}

/// Spinner shown while a resource is polled.
#[must_use]
pub fn spinner(message: String) -> ProgressBar {
    let bar = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("  {spinner:.cyan} {msg} {elapsed:.dim}") {
        bar.set_style(style);
    }
    bar.set_message(message);
    bar.enable_steady_tick(Duration::from_millis(120));
    bar
}

/// Print the environment being acted on.
pub fn print_config_summary(config: &EnvironmentConfig) {
    println!("{}", "Environment".cyan().bold());
    print_kv("Cluster", &config.cluster_name);
    print_kv("Region", &config.region);
    print_kv("Kubernetes", &config.kubernetes_version);
    print_kv(
        "Nodes",
        &format!(
            "{} x {} (min {}, max {}){}",
            config.node_desired_size,
            config.node_instance_type,
            config.node_min_size,
            config.node_max_size,
            if config.use_spot_capacity { ", spot" } else { "" }
        ),
    );
    print_kv("Registries", &config.repositories.join(", "));
    print_kv(
        "Monitoring",
        match (config.enable_monitoring, config.alarms_effective()) {
            (true, true) => "dashboard + alarms",
            (true, false) => "dashboard",
            (false, _) => "off",
        },
    );
    if let Some(domain) = &config.domain_name {
        print_kv("Domain", domain);
    }
}

/// Print a plan as a table.
pub fn print_plan_table(plan: &ResourcePlan) {
    println!(
        "  {:<3} {:<34} {:<12} {}",
        "#".bold(),
        "RESOURCE".bold(),
        "KIND".bold(),
        "DEPENDS ON".bold()
    );
    for (i, node) in plan.nodes().iter().enumerate() {
        let depends_on = if node.depends_on.is_empty() {
            "-".to_string()
        } else {
            node.depends_on
                .iter()
                .map(String::as_str)
                .collect::<Vec<_>>()
                .join(", ")
        };
        println!(
            "  {:<3} {:<34} {:<12} {}",
            i + 1,
            node.name,
            node.kind().label(),
            depends_on.bright_black()
        );
    }
}

/// Print a status report as a table with a summary line.
pub fn print_status_table(report: &StatusReport) {
    print_kv("Cluster", &report.cluster_name);
    print_kv("Region", &report.region);
    print_kv("Account", &report.account);
    print_kv(
        "Checked",
        &report.checked_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
    );
    println!();
    println!(
        "  {:<34} {:<12} {}",
        "RESOURCE".bold(),
        "KIND".bold(),
        "STATUS".bold()
    );
    for resource in &report.resources {
        println!(
            "  {:<34} {:<12} {}",
            resource.name,
            resource.kind.label(),
            status_label(resource.status)
        );
        if let Some(error) = &resource.error {
            println!("  {:<34} {}", "", error.bright_black());
        }
    }
    println!();

    let total = report.resources.len();
    let active = report.count(ResourceStatus::Active);
    if report.is_fully_deployed() {
        print_success(&format!("All {total} resources active"));
    } else if report.is_fully_absent() {
        print_info("Environment is not deployed");
    } else {
        print_warning(&format!(
            "{active}/{total} resources active, {} in progress, {} failed, {} absent",
            report.count(ResourceStatus::InProgress),
            report.count(ResourceStatus::Failed),
            report.count(ResourceStatus::Absent)
        ));
    }
}

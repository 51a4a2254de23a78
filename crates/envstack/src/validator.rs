use colored::Colorize;

use crate::error::LifecycleError;
use crate::ui;

/// Validates that the command line tools envstack drives are installed.
pub struct PrerequisitesValidator {
    requirements: Vec<Requirement>,
}

struct Requirement {
    name: String,
    check: Box<dyn Fn() -> bool + Send + Sync>,
    install_instructions: String,
    critical: bool,
}

impl PrerequisitesValidator {
    /// Require `aws`, `kubectl` and `helm` on `PATH`. A missing `docker` is
    /// only reported, since images are pushed to the registries afterwards.
    pub fn new() -> Self {
        Self::empty()
            .with_tool(
                "aws",
                "Install the AWS CLI from https://aws.amazon.com/cli/",
            )
            .with_tool(
                "kubectl",
                "Install kubectl from https://kubernetes.io/docs/tasks/tools/",
            )
            .with_tool(
                "helm",
                "Install Helm from https://helm.sh/docs/intro/install/",
            )
            .with_check(
                "docker",
                || which::which("docker").is_ok(),
                "Install Docker to build and push images: https://docs.docker.com/get-docker/",
                false,
            )
    }

    /// A validator with no requirements.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            requirements: Vec::new(),
        }
    }

    /// Require a program on `PATH`.
    #[must_use]
    pub fn with_tool(mut self, program: &str, install_instructions: &str) -> Self {
        let binary = program.to_string();
        self.requirements.push(Requirement {
            name: program.to_string(),
            check: Box::new(move || which::which(&binary).is_ok()),
            install_instructions: install_instructions.to_string(),
            critical: true,
        });
        self
    }

    /// Add an arbitrary check. Non-critical failures are only reported.
    #[must_use]
    pub fn with_check(
        mut self,
        name: &str,
        check: impl Fn() -> bool + Send + Sync + 'static,
        install_instructions: &str,
        critical: bool,
    ) -> Self {
        self.requirements.push(Requirement {
            name: name.to_string(),
            check: Box::new(check),
            install_instructions: install_instructions.to_string(),
            critical,
        });
        self
    }

    /// Run every check and print the results.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Prerequisite`] naming every missing critical
    /// requirement.
    pub fn validate(&self) -> Result<(), LifecycleError> {
        let mut failures = Vec::new();

        for requirement in &self.requirements {
            let passed = (requirement.check)();
            ui::print_check_result(&requirement.name, passed, None);
            if !passed {
                failures.push(requirement);
            }
        }

        if failures.is_empty() {
            return Ok(());
        }

        println!();
        ui::print_warning("Some prerequisites are not met:");
        for failure in &failures {
            if failure.critical {
                println!(
                    "  {} {} - {}",
                    "✗".red(),
                    failure.name.red(),
                    failure.install_instructions.bright_black()
                );
            } else {
                println!(
                    "  {} {} - {}",
                    "⚠".yellow(),
                    failure.name.yellow(),
                    failure.install_instructions.bright_black()
                );
            }
        }
        println!();

        let missing: Vec<&str> = failures
            .iter()
            .filter(|f| f.critical)
            .map(|f| f.name.as_str())
            .collect();
        if missing.is_empty() {
            Ok(())
        } else {
            Err(LifecycleError::Prerequisite(format!(
                "missing required tools: {}",
                missing.join(", ")
            )))
        }
    }
}

impl Default for PrerequisitesValidator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_validator_passes() {
        assert!(PrerequisitesValidator::empty().validate().is_ok());
    }

    #[test]
    fn test_missing_tool_is_reported_by_name() {
        let validator = PrerequisitesValidator::empty()
            .with_tool("envstack-missing-tool-3f9c", "Install it");

        match validator.validate() {
            Err(LifecycleError::Prerequisite(message)) => {
                assert!(message.contains("envstack-missing-tool-3f9c"));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_default_requirements() {
        let validator = PrerequisitesValidator::new();
        let names: Vec<&str> = validator
            .requirements
            .iter()
            .map(|r| r.name.as_str())
            .collect();
        assert_eq!(names, vec!["aws", "kubectl", "helm", "docker"]);
        assert!(validator
            .requirements
            .iter()
            .all(|r| r.critical == (r.name != "docker")));
    }

    #[test]
    fn test_non_critical_failure_passes() {
        let validator =
            PrerequisitesValidator::empty().with_check("docker", || false, "Optional", false);
        assert!(validator.validate().is_ok());
    }
}

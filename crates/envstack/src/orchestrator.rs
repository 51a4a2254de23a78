//! Lifecycle orchestration module.
//!
//! This module drives a [`ResourcePlan`] through bring-up or teardown against
//! a [`CloudProvider`], coordinating:
//! - Prerequisite and credential checks
//! - Chart repository registration and IAM bootstrap
//! - Per-resource creation and deletion with bounded polling
//! - Phase gates and the abort / warn-and-continue failure policy

use std::collections::BTreeSet;
use std::sync::Arc;

use envstack_cloud::{
    CloudProvider, CloudProviderError, FailurePolicy, ResourceNode, ResourceStatus,
};
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::config::EnvironmentConfig;
use crate::error::LifecycleError;
use crate::plan::ResourcePlan;
use crate::report::{ResourceReport, StatusReport};
use crate::state::{Confirmation, Direction, LifecycleState, Phase, PollConfig};
use crate::ui;
use crate::validator::PrerequisitesValidator;

/// Drives lifecycle runs against one cloud provider.
pub struct Orchestrator {
    /// The external collaborator every resource call goes through.
    provider: Arc<dyn CloudProvider>,
    /// Local tool checks run before any cloud call.
    prerequisites: PrerequisitesValidator,
    /// Polling intervals and ceilings.
    poll: PollConfig,
    /// Show a spinner while polling.
    show_progress: bool,
}

impl Orchestrator {
    /// Create an orchestrator with the default tool checks and polling.
    pub fn new(provider: Arc<dyn CloudProvider>) -> Self {
        Self {
            provider,
            prerequisites: PrerequisitesValidator::new(),
            poll: PollConfig::default(),
            show_progress: true,
        }
    }

    /// Replace the prerequisite checks.
    #[must_use]
    pub fn with_prerequisites(mut self, prerequisites: PrerequisitesValidator) -> Self {
        self.prerequisites = prerequisites;
        self
    }

    /// Replace the polling configuration.
    #[must_use]
    pub fn with_poll_config(mut self, poll: PollConfig) -> Self {
        self.poll = poll;
        self
    }

    /// Enable or disable the polling spinner.
    #[must_use]
    pub fn with_progress(mut self, show_progress: bool) -> Self {
        self.show_progress = show_progress;
        self
    }

    /// Run bring-up from `uninitialized` to `verified`.
    ///
    /// # Errors
    ///
    /// Returns the first hard failure. Resources already created are left in
    /// place; re-running skips them.
    pub async fn bring_up(&self, plan: &ResourcePlan) -> Result<LifecycleState, LifecycleError> {
        let mut state = LifecycleState::for_bring_up(plan);
        self.run_to_completion(&mut state, plan).await?;
        Ok(state)
    }

    /// Run teardown from `deployed` to `verified-absent`.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::PhaseBlocked`] if an abort-policy resource
    /// could not be deleted, or the first collaborator failure.
    pub async fn teardown(
        &self,
        plan: &ResourcePlan,
        confirmation: Confirmation,
    ) -> Result<LifecycleState, LifecycleError> {
        let mut state = LifecycleState::for_teardown(plan, confirmation);
        self.run_to_completion(&mut state, plan).await?;
        Ok(state)
    }

    /// Check the operator's confirmation input, then tear down.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::ConfirmationDeclined`] without calling the
    /// provider unless `input` is exactly `DELETE`.
    pub async fn destroy(
        &self,
        plan: &ResourcePlan,
        input: &str,
    ) -> Result<LifecycleState, LifecycleError> {
        let confirmation = Confirmation::parse(input)?;
        self.teardown(plan, confirmation).await
    }

    /// Advance `state` until its direction's terminal phase.
    ///
    /// # Errors
    ///
    /// Returns the error that stopped the run; `state` keeps the last phase
    /// reached and the status of every resource.
    pub async fn run_to_completion(
        &self,
        state: &mut LifecycleState,
        plan: &ResourcePlan,
    ) -> Result<(), LifecycleError> {
        let direction = state.direction;
        info!(direction = %direction, phase = %state.phase, resources = plan.len(), "Starting lifecycle run");

        while !state.is_complete() {
            let next = state.phase.next(direction);
            ui::print_progress_step(
                next.step_number(direction),
                direction.total_steps(),
                next.description(),
            );

            if let Err(e) = self.advance(state, plan).await {
                error!(phase = %state.phase, error = %e, "Lifecycle run failed");
                ui::print_error(&format!(
                    "{direction} stopped at phase '{}': {e}",
                    state.phase
                ));
                let failed = state.failed_resources();
                if !failed.is_empty() {
                    ui::print_info("Failed resources:");
                    for name in failed {
                        ui::print_list_item(name);
                    }
                }
                print_warnings(state);
                return Err(e);
            }

            ui::print_success(&format!("Phase: {}", state.phase));
        }

        print_warnings(state);
        Ok(())
    }

    /// Perform exactly one phase transition, mutating `state` in place.
    ///
    /// A terminal state is left unchanged.
    ///
    /// # Errors
    ///
    /// Returns an error if the transition's work hard-fails or its gate is
    /// not met; the phase is then left unchanged.
    pub async fn advance(
        &self,
        state: &mut LifecycleState,
        plan: &ResourcePlan,
    ) -> Result<(), LifecycleError> {
        if state.is_complete() {
            return Ok(());
        }

        let target = state.phase.next(state.direction);
        info!(from = %state.phase, to = %target, "Executing phase transition");

        match (state.direction, target) {
            (Direction::BringUp, Phase::PrerequisitesChecked) => {
                self.check_prerequisites().await?;
            }
            (Direction::BringUp, Phase::DependenciesInstalled) => {
                self.install_dependencies(state, plan).await?;
            }
            (Direction::BringUp, Phase::Bootstrapped) => {
                self.bootstrap().await?;
            }
            (Direction::BringUp, Phase::Deployed) => {
                self.deploy_resources(state, plan).await?;
            }
            (Direction::BringUp, Phase::Verified) => {
                self.verify_present(state, plan).await?;
            }
            (Direction::Teardown, Phase::VerifiedAbsent) => {
                self.verify_absent(state, plan).await?;
            }
            (Direction::Teardown, phase) => {
                self.delete_phase(state, plan, phase).await?;
            }
            (Direction::BringUp, phase) => {
                debug!(phase = %phase, "No work for phase");
            }
        }

        state.advance();
        Ok(())
    }

    /// Query live status of every plan node. Read-only.
    ///
    /// # Errors
    ///
    /// Returns an error if the provider is unreachable or credentials are
    /// invalid. Other describe failures are reported per resource.
    pub async fn observe(
        &self,
        config: &EnvironmentConfig,
        plan: &ResourcePlan,
    ) -> Result<StatusReport, LifecycleError> {
        let identity = self.provider.verify_credentials().await?;
        let mut resources = Vec::with_capacity(plan.len());

        for node in plan.nodes() {
            let (status, error) = match self.provider.describe(node).await {
                Ok(status) => (status, None),
                Err(e) if e.is_connectivity() => return Err(e.into()),
                Err(e) => {
                    warn!(resource = %node.name, error = %e, "Failed to describe resource");
                    (ResourceStatus::Failed, Some(e.to_string()))
                }
            };
            resources.push(ResourceReport {
                name: node.name.clone(),
                kind: node.kind(),
                status,
                depends_on: node.depends_on.iter().cloned().collect(),
                error,
            });
        }

        Ok(StatusReport {
            cluster_name: config.cluster_name.clone(),
            region: config.region.clone(),
            account: identity.account,
            checked_at: chrono::Utc::now(),
            resources,
        })
    }

    // --- Bring-up ---

    async fn check_prerequisites(&self) -> Result<(), LifecycleError> {
        self.prerequisites.validate()?;

        let identity = self
            .provider
            .verify_credentials()
            .await
            .map_err(|e| LifecycleError::Prerequisite(format!("cloud credentials: {e}")))?;
        ui::print_check_result("credentials", true, Some(&identity.arn));
        Ok(())
    }

    async fn install_dependencies(
        &self,
        state: &mut LifecycleState,
        plan: &ResourcePlan,
    ) -> Result<(), LifecycleError> {
        let mut registered = BTreeSet::new();

        for chart in plan.addon_charts() {
            if !registered.insert(chart.repo_name.as_str()) {
                continue;
            }
            match self.provider.add_chart_repository(chart).await {
                Ok(()) => ui::print_check_result(&chart.repo_name, true, Some(&chart.repo_url)),
                Err(e) => {
                    let message = format!("Chart repository {} not added: {e}", chart.repo_name);
                    warn!(repository = %chart.repo_name, error = %e, "Chart repository not added");
                    ui::print_warning(&message);
                    state.warn(message);
                }
            }
        }

        if !registered.is_empty() {
            self.provider.update_chart_repositories().await?;
        }
        Ok(())
    }

    async fn bootstrap(&self) -> Result<(), LifecycleError> {
        if self.provider.is_bootstrapped().await? {
            info!("Bootstrap resources present");
            ui::print_info("Already bootstrapped, skipping");
        } else {
            self.provider.bootstrap().await?;
            ui::print_success("Bootstrap resources created");
        }
        Ok(())
    }

    async fn deploy_resources(
        &self,
        state: &mut LifecycleState,
        plan: &ResourcePlan,
    ) -> Result<(), LifecycleError> {
        for node in plan.nodes() {
            if let Some(dependency) = node
                .depends_on
                .iter()
                .find(|d| state.status(d) != ResourceStatus::Active)
            {
                let message = format!(
                    "Skipping {}: dependency {dependency} is not active",
                    node.name
                );
                warn!(resource = %node.name, dependency = %dependency, "Skipping resource");
                ui::print_warning(&message);
                state.warn(message);
                continue;
            }

            if let Err(e) = self.ensure_active(state, node).await {
                match node.failure_policy() {
                    FailurePolicy::Abort => return Err(e),
                    FailurePolicy::WarnAndContinue => {
                        warn!(resource = %node.name, error = %e, "Continuing past failed resource");
                        ui::print_warning(&e.to_string());
                        state.warn(e.to_string());
                    }
                }
            }
        }

        state.check_gate(Phase::Deployed, plan.nodes(), ResourceStatus::Active)
    }

    /// Create `node` unless it already exists, then wait for it to be active.
    async fn ensure_active(
        &self,
        state: &mut LifecycleState,
        node: &ResourceNode,
    ) -> Result<(), LifecycleError> {
        let creation_error = |reason: String| LifecycleError::ResourceCreation {
            resource: node.name.clone(),
            reason,
        };

        let current = match self.provider.describe(node).await {
            Ok(status) => status,
            Err(e) => {
                state.set_status(&node.name, ResourceStatus::Failed);
                return Err(creation_error(e.to_string()));
            }
        };

        match current {
            ResourceStatus::Active => {
                info!(resource = %node.name, "Resource already active, skipping");
                ui::print_info(&format!("{} already active, skipping", node.name));
                state.set_status(&node.name, ResourceStatus::Active);
                return Ok(());
            }
            ResourceStatus::Failed => {
                state.set_status(&node.name, ResourceStatus::Failed);
                return Err(creation_error(
                    "provider reports the existing resource as failed".to_string(),
                ));
            }
            ResourceStatus::InProgress => {
                ui::print_info(&format!("{} already in progress, waiting", node.name));
            }
            ResourceStatus::Pending | ResourceStatus::Absent => {
                ui::print_step(&format!("Creating {} {}", node.kind(), node.name));
                match self.provider.create(node).await {
                    Ok(id) => info!(resource = %node.name, id = %id, "Resource submitted"),
                    Err(e) => {
                        state.set_status(&node.name, ResourceStatus::Failed);
                        return Err(creation_error(e.to_string()));
                    }
                }
            }
        }

        state.set_status(&node.name, ResourceStatus::InProgress);
        match self.wait_for(node, ResourceStatus::Active).await {
            Ok(ResourceStatus::Active) => {
                state.set_status(&node.name, ResourceStatus::Active);
                ui::print_success(&format!("{} active", node.name));
                Ok(())
            }
            Ok(other) => {
                state.set_status(&node.name, ResourceStatus::Failed);
                Err(creation_error(format!("provider reported {other}")))
            }
            Err(e) => {
                state.set_status(&node.name, ResourceStatus::Failed);
                Err(creation_error(e.to_string()))
            }
        }
    }

    async fn verify_present(
        &self,
        state: &mut LifecycleState,
        plan: &ResourcePlan,
    ) -> Result<(), LifecycleError> {
        self.refresh_statuses(state, plan, ResourceStatus::Active)
            .await;
        state.check_gate(Phase::Verified, plan.nodes(), ResourceStatus::Active)
    }

    // --- Teardown ---

    async fn delete_phase(
        &self,
        state: &mut LifecycleState,
        plan: &ResourcePlan,
        phase: Phase,
    ) -> Result<(), LifecycleError> {
        if phase == Phase::K8sCleaned {
            self.delete_workloads(state).await;
        }

        let kinds = phase.teardown_kinds();
        let nodes: Vec<&ResourceNode> = plan
            .nodes()
            .iter()
            .rev()
            .filter(|n| kinds.contains(&n.kind()))
            .collect();

        // Every node is attempted even if an earlier one fails.
        for node in &nodes {
            if let Err(e) = self.ensure_absent(state, node).await {
                warn!(resource = %node.name, error = %e, "Deletion failed");
                match node.failure_policy() {
                    FailurePolicy::Abort => ui::print_error(&e.to_string()),
                    FailurePolicy::WarnAndContinue => ui::print_warning(&e.to_string()),
                }
                state.warn(e.to_string());
            }
        }

        if phase == Phase::ClusterDeleted {
            self.delete_log_groups(state).await;
        }

        state.check_gate(phase, nodes.iter().copied(), ResourceStatus::Absent)
    }

    /// Delete `node` unless it is already gone, then wait for it to vanish.
    async fn ensure_absent(
        &self,
        state: &mut LifecycleState,
        node: &ResourceNode,
    ) -> Result<(), LifecycleError> {
        let deletion_error = |reason: String| LifecycleError::ResourceDeletion {
            resource: node.name.clone(),
            reason,
        };

        match self.provider.describe(node).await {
            Ok(ResourceStatus::Absent) => {
                info!(resource = %node.name, "Resource already absent, skipping");
                ui::print_info(&format!("{} already absent, skipping", node.name));
                state.set_status(&node.name, ResourceStatus::Absent);
                return Ok(());
            }
            Ok(status) => state.set_status(&node.name, status),
            Err(e) => {
                state.set_status(&node.name, ResourceStatus::Failed);
                return Err(deletion_error(e.to_string()));
            }
        }

        ui::print_step(&format!("Deleting {} {}", node.kind(), node.name));
        match self.provider.delete(node).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                ui::print_info(&format!("{} already absent", node.name));
                state.set_status(&node.name, ResourceStatus::Absent);
                return Ok(());
            }
            Err(e) => {
                state.set_status(&node.name, ResourceStatus::Failed);
                return Err(deletion_error(e.to_string()));
            }
        }

        state.set_status(&node.name, ResourceStatus::InProgress);
        match self.wait_for(node, ResourceStatus::Absent).await {
            Ok(ResourceStatus::Absent) => {
                state.set_status(&node.name, ResourceStatus::Absent);
                ui::print_success(&format!("{} deleted", node.name));
                Ok(())
            }
            Ok(other) => {
                state.set_status(&node.name, ResourceStatus::Failed);
                Err(deletion_error(format!("provider reported {other}")))
            }
            Err(e) => {
                state.set_status(&node.name, ResourceStatus::Failed);
                Err(deletion_error(e.to_string()))
            }
        }
    }

    async fn delete_workloads(&self, state: &mut LifecycleState) {
        ui::print_step("Deleting application workloads");
        match self.provider.delete_workloads().await {
            Ok(()) => ui::print_success("Application workloads deleted"),
            Err(e) if e.is_not_found() => {
                ui::print_info("Cluster not found, no workloads to delete");
            }
            Err(e) => {
                let message = format!("Failed to delete application workloads: {e}");
                warn!(error = %e, "Failed to delete application workloads");
                ui::print_warning(&message);
                state.warn(message);
            }
        }
    }

    async fn delete_log_groups(&self, state: &mut LifecycleState) {
        match self.provider.delete_log_groups().await {
            Ok(()) => ui::print_success("Cluster log group deleted"),
            Err(e) if e.is_not_found() => {
                ui::print_info("Cluster log group already absent");
            }
            Err(e) => {
                let message = format!("Failed to delete cluster log group: {e}");
                warn!(error = %e, "Failed to delete cluster log group");
                ui::print_warning(&message);
                state.warn(message);
            }
        }
    }

    async fn verify_absent(
        &self,
        state: &mut LifecycleState,
        plan: &ResourcePlan,
    ) -> Result<(), LifecycleError> {
        self.refresh_statuses(state, plan, ResourceStatus::Absent)
            .await;
        // Every node counts here, soft-policy ones included.
        state.check_all(Phase::VerifiedAbsent, plan.nodes(), ResourceStatus::Absent)
    }

    // --- Shared ---

    /// Re-describe every node. Soft-policy nodes not in `expected` are
    /// recorded as warnings; abort-policy nodes are left to the phase gate.
    async fn refresh_statuses(
        &self,
        state: &mut LifecycleState,
        plan: &ResourcePlan,
        expected: ResourceStatus,
    ) {
        for node in plan.nodes() {
            let status = match self.provider.describe(node).await {
                Ok(status) => status,
                Err(e) => {
                    warn!(resource = %node.name, error = %e, "Failed to describe resource");
                    ResourceStatus::Failed
                }
            };
            state.set_status(&node.name, status);

            if status == expected {
                continue;
            }
            let message = format!("{} is {status}, expected {expected}", node.name);
            match node.failure_policy() {
                FailurePolicy::Abort => ui::print_error(&message),
                FailurePolicy::WarnAndContinue => {
                    ui::print_warning(&message);
                    state.warn(message);
                }
            }
        }
    }

    /// Poll until `node` reaches `target`. While waiting for `active`, a
    /// `failed` status ends the wait early.
    async fn wait_for(
        &self,
        node: &ResourceNode,
        target: ResourceStatus,
    ) -> Result<ResourceStatus, CloudProviderError> {
        let timeout = self.poll.timeout_for(node.kind());
        let deadline = Instant::now() + timeout;
        let progress = self.show_progress.then(|| {
            ui::spinner(format!(
                "Waiting for {} {} to be {target}",
                node.kind(),
                node.name
            ))
        });

        let mut attempt = 0;
        let result = loop {
            let status = match self.provider.describe(node).await {
                Ok(status) => status,
                Err(e) => break Err(e),
            };
            debug!(resource = %node.name, status = %status, attempt, "Polled resource status");

            let failed_early =
                target == ResourceStatus::Active && status == ResourceStatus::Failed;
            if status == target || failed_early {
                break Ok(status);
            }

            attempt += 1;
            let now = Instant::now();
            if !self.poll.should_poll(attempt) || now >= deadline {
                warn!(
                    resource = %node.name,
                    attempts = attempt,
                    timeout_secs = timeout.as_secs(),
                    "Timed out waiting for resource"
                );
                break Err(CloudProviderError::Timeout(timeout.as_secs()));
            }

            let delay = self
                .poll
                .delay_for_attempt(attempt - 1)
                .min(deadline - now);
            tokio::time::sleep(delay).await;
        };

        if let Some(progress) = progress {
            progress.finish_and_clear();
        }
        result
    }
}

/// Print the degraded-but-continuing events of a run.
fn print_warnings(state: &LifecycleState) {
    if state.warnings.is_empty() {
        return;
    }
    println!();
    ui::print_warning(&format!(
        "Completed with {} warning(s):",
        state.warnings.len()
    ));
    for warning in &state.warnings {
        ui::print_list_item(warning);
    }
}

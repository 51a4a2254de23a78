//! Lifecycle state.
//!
//! This module provides the phase machine, the per-run resource status map,
//! the teardown confirmation token, and polling configuration. State lives for
//! one run only; what exists is always re-queried from the cloud provider.

use std::collections::BTreeMap;
use std::time::Duration;

use envstack_cloud::{FailurePolicy, ResourceKind, ResourceNode, ResourceStatus};
use serde::Serialize;

use crate::error::LifecycleError;
use crate::plan::ResourcePlan;

/// Literal the operator must type to start a teardown.
pub const CONFIRMATION_TOKEN: &str = "DELETE";

/// Direction a run drives the plan.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Direction {
    /// Create everything in plan order.
    BringUp,
    /// Delete everything in reverse plan order.
    Teardown,
}

impl Direction {
    /// Phases visited in this direction, first to terminal.
    #[must_use]
    pub fn phases(self) -> &'static [Phase] {
        match self {
            Self::BringUp => &[
                Phase::Uninitialized,
                Phase::PrerequisitesChecked,
                Phase::DependenciesInstalled,
                Phase::Bootstrapped,
                Phase::Deployed,
                Phase::Verified,
            ],
            Self::Teardown => &[
                Phase::Deployed,
                Phase::K8sCleaned,
                Phase::RegistryCleaned,
                Phase::ClusterDeleted,
                Phase::NetworkCleaned,
                Phase::VerifiedAbsent,
            ],
        }
    }

    /// Number of transitions in this direction.
    #[must_use]
    pub fn total_steps(self) -> u8 {
        u8::try_from(self.phases().len() - 1).unwrap_or(u8::MAX)
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::BringUp => write!(f, "bring-up"),
            Self::Teardown => write!(f, "teardown"),
        }
    }
}

/// Lifecycle phases for both directions. `Deployed` is shared: it is the
/// fourth bring-up transition and the starting point of teardown.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Phase {
    // Bring-up
    /// Nothing checked yet.
    Uninitialized,
    /// CLI tools found and credentials valid.
    PrerequisitesChecked,
    /// Chart repositories registered and refreshed.
    DependenciesInstalled,
    /// One-time IAM roles exist.
    Bootstrapped,
    /// Every plan node submitted and settled.
    Deployed,
    /// Live status re-checked against the plan.
    Verified,

    // Teardown
    /// Workloads, add-ons, monitoring and DNS removed.
    #[serde(rename = "k8s-cleaned")]
    K8sCleaned,
    /// Registries removed.
    RegistryCleaned,
    /// Node group, cluster and log group removed.
    ClusterDeleted,
    /// Network removed.
    NetworkCleaned,
    /// Absence of every node confirmed.
    VerifiedAbsent,
}

impl Phase {
    /// Get the next phase in the given direction. Terminal phases, and phases
    /// outside the direction, return themselves.
    #[must_use]
    pub fn next(self, direction: Direction) -> Self {
        let phases = direction.phases();
        phases
            .iter()
            .position(|p| *p == self)
            .and_then(|i| phases.get(i + 1))
            .copied()
            .unwrap_or(self)
    }

    /// Whether this is the last phase of the direction.
    #[must_use]
    pub fn is_terminal(self, direction: Direction) -> bool {
        direction.phases().last() == Some(&self)
    }

    /// Step number for progress display.
    #[must_use]
    pub fn step_number(self, direction: Direction) -> u8 {
        direction
            .phases()
            .iter()
            .position(|p| *p == self)
            .and_then(|i| u8::try_from(i).ok())
            .unwrap_or(0)
    }

    /// Stable machine name (`prerequisites-checked`, `k8s-cleaned`, ...).
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::PrerequisitesChecked => "prerequisites-checked",
            Self::DependenciesInstalled => "dependencies-installed",
            Self::Bootstrapped => "bootstrapped",
            Self::Deployed => "deployed",
            Self::Verified => "verified",
            Self::K8sCleaned => "k8s-cleaned",
            Self::RegistryCleaned => "registry-cleaned",
            Self::ClusterDeleted => "cluster-deleted",
            Self::NetworkCleaned => "network-cleaned",
            Self::VerifiedAbsent => "verified-absent",
        }
    }

    /// Description of the work that leads into this phase.
    #[must_use]
    pub fn description(self) -> &'static str {
        match self {
            Self::Uninitialized => "Not started",
            Self::PrerequisitesChecked => "Checking prerequisites",
            Self::DependenciesInstalled => "Installing chart repositories",
            Self::Bootstrapped => "Bootstrapping IAM roles",
            Self::Deployed => "Deploying resources",
            Self::Verified => "Verifying deployment",
            Self::K8sCleaned => "Removing workloads, add-ons and monitoring",
            Self::RegistryCleaned => "Deleting container registries",
            Self::ClusterDeleted => "Deleting node group and cluster",
            Self::NetworkCleaned => "Deleting network",
            Self::VerifiedAbsent => "Verifying removal",
        }
    }

    /// Resource kinds deleted by the teardown transition into this phase.
    #[must_use]
    pub fn teardown_kinds(self) -> &'static [ResourceKind] {
        match self {
            Self::K8sCleaned => &[
                ResourceKind::Addon,
                ResourceKind::AlarmTopic,
                ResourceKind::Dashboard,
                ResourceKind::Certificate,
                ResourceKind::DnsZone,
            ],
            Self::RegistryCleaned => &[ResourceKind::Registry],
            Self::ClusterDeleted => &[ResourceKind::NodeGroup, ResourceKind::Cluster],
            Self::NetworkCleaned => &[ResourceKind::Network],
            _ => &[],
        }
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Proof that the operator typed the teardown confirmation token.
///
/// The only way to start a teardown is [`LifecycleState::for_teardown`], which
/// requires one of these.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Confirmation(());

impl Confirmation {
    /// Accept exactly [`CONFIRMATION_TOKEN`].
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::ConfirmationDeclined`] for any other input.
    pub fn parse(input: &str) -> Result<Self, LifecycleError> {
        if input == CONFIRMATION_TOKEN {
            Ok(Self(()))
        } else {
            Err(LifecycleError::ConfirmationDeclined)
        }
    }
}

/// Mutable state of one orchestrator run.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LifecycleState {
    /// Direction of this run.
    pub direction: Direction,
    /// Current phase.
    pub phase: Phase,
    /// Last observed status per plan node.
    pub resource_status: BTreeMap<String, ResourceStatus>,
    /// Degraded-but-continuing events, in order.
    pub warnings: Vec<String>,
}

impl LifecycleState {
    /// Fresh bring-up state: `uninitialized`, every node pending.
    #[must_use]
    pub fn for_bring_up(plan: &ResourcePlan) -> Self {
        Self::new(Direction::BringUp, Phase::Uninitialized, plan)
    }

    /// Fresh teardown state: `deployed`, every node pending.
    #[must_use]
    pub fn for_teardown(plan: &ResourcePlan, _confirmation: Confirmation) -> Self {
        Self::new(Direction::Teardown, Phase::Deployed, plan)
    }

    fn new(direction: Direction, phase: Phase, plan: &ResourcePlan) -> Self {
        Self {
            direction,
            phase,
            resource_status: plan
                .nodes()
                .iter()
                .map(|n| (n.name.clone(), ResourceStatus::Pending))
                .collect(),
            warnings: Vec::new(),
        }
    }

    /// Whether the run has reached its terminal phase.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.phase.is_terminal(self.direction)
    }

    /// Move to the next phase.
    pub fn advance(&mut self) {
        self.phase = self.phase.next(self.direction);
    }

    /// Status of a node, `pending` if unknown.
    #[must_use]
    pub fn status(&self, name: &str) -> ResourceStatus {
        self.resource_status
            .get(name)
            .copied()
            .unwrap_or(ResourceStatus::Pending)
    }

    /// Record a node's status.
    pub fn set_status(&mut self, name: &str, status: ResourceStatus) {
        self.resource_status.insert(name.to_string(), status);
    }

    /// Record a warning.
    pub fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Names of nodes currently `failed`, in name order.
    #[must_use]
    pub fn failed_resources(&self) -> Vec<&str> {
        self.resource_status
            .iter()
            .filter(|(_, status)| **status == ResourceStatus::Failed)
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Check a phase gate: every abort-policy node among `nodes` must be in
    /// `required`. Soft-policy nodes never block.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::PhaseBlocked`] naming the offending nodes.
    pub fn check_gate<'a>(
        &self,
        phase: Phase,
        nodes: impl IntoIterator<Item = &'a ResourceNode>,
        required: ResourceStatus,
    ) -> Result<(), LifecycleError> {
        self.blocked(
            phase,
            nodes
                .into_iter()
                .filter(|n| n.failure_policy() == FailurePolicy::Abort),
            required,
        )
    }

    /// Check a phase gate that no node may miss, whatever its failure
    /// policy. Used where a leftover means the environment is still billing.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::PhaseBlocked`] naming the offending nodes.
    pub fn check_all<'a>(
        &self,
        phase: Phase,
        nodes: impl IntoIterator<Item = &'a ResourceNode>,
        required: ResourceStatus,
    ) -> Result<(), LifecycleError> {
        self.blocked(phase, nodes, required)
    }

    fn blocked<'a>(
        &self,
        phase: Phase,
        nodes: impl IntoIterator<Item = &'a ResourceNode>,
        required: ResourceStatus,
    ) -> Result<(), LifecycleError> {
        let blocked: Vec<String> = nodes
            .into_iter()
            .filter(|n| self.status(&n.name) != required)
            .map(|n| n.name.clone())
            .collect();

        if blocked.is_empty() {
            Ok(())
        } else {
            Err(LifecycleError::PhaseBlocked {
                phase,
                resources: blocked,
            })
        }
    }
}

/// Polling configuration for resource status checks.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Maximum number of status checks per resource.
    pub max_attempts: u32,
    /// Initial delay between checks.
    pub initial_delay: Duration,
    /// Maximum delay between checks.
    pub max_delay: Duration,
    /// Backoff multiplier.
    pub backoff_multiplier: f64,
    /// Wall-clock ceiling per resource.
    pub timeout: Duration,
    /// Wall-clock ceiling for clusters and node groups.
    pub long_timeout: Duration,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            max_attempts: 120,
            initial_delay: Duration::from_secs(5),
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 1.5,
            timeout: Duration::from_secs(300),
            long_timeout: Duration::from_secs(1200),
        }
    }
}

impl PollConfig {
    /// No delays and a handful of attempts, for tests and dry runs.
    #[must_use]
    pub fn immediate() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
            backoff_multiplier: 1.0,
            timeout: Duration::from_secs(5),
            long_timeout: Duration::from_secs(5),
        }
    }

    /// Calculate the delay for a given attempt number.
    #[must_use]
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exp = i32::try_from(attempt.min(10)).unwrap_or(10);
        let multiplier = self.backoff_multiplier.powi(exp);
        let delay_secs = self.initial_delay.as_secs_f64() * multiplier;
        let capped = delay_secs.min(self.max_delay.as_secs_f64());
        Duration::from_secs_f64(capped)
    }

    /// Check if another status check is allowed.
    #[must_use]
    pub fn should_poll(&self, attempt: u32) -> bool {
        attempt < self.max_attempts
    }

    /// Wall-clock ceiling for a resource kind.
    #[must_use]
    pub fn timeout_for(&self, kind: ResourceKind) -> Duration {
        match kind {
            ResourceKind::Cluster | ResourceKind::NodeGroup => self.long_timeout,
            _ => self.timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EnvironmentConfig;
    use crate::plan::build_plan;

    fn plan() -> ResourcePlan {
        build_plan(&EnvironmentConfig::with_defaults("demo".into())).unwrap()
    }

    #[test]
    fn test_bring_up_progression() {
        let mut phase = Phase::Uninitialized;
        let mut phases = vec![phase];
        while !phase.is_terminal(Direction::BringUp) {
            phase = phase.next(Direction::BringUp);
            phases.push(phase);
        }

        assert_eq!(phases, Direction::BringUp.phases());
        assert_eq!(Phase::Verified.next(Direction::BringUp), Phase::Verified);
    }

    #[test]
    fn test_teardown_progression() {
        assert_eq!(Phase::Deployed.next(Direction::Teardown), Phase::K8sCleaned);
        assert_eq!(
            Phase::NetworkCleaned.next(Direction::Teardown),
            Phase::VerifiedAbsent
        );
        assert_eq!(
            Phase::VerifiedAbsent.next(Direction::Teardown),
            Phase::VerifiedAbsent
        );
        // Bring-up phases are not part of teardown.
        assert_eq!(Phase::Bootstrapped.next(Direction::Teardown), Phase::Bootstrapped);
    }

    #[test]
    fn test_step_numbers() {
        assert_eq!(Phase::Uninitialized.step_number(Direction::BringUp), 0);
        assert_eq!(
            Phase::Verified.step_number(Direction::BringUp),
            Direction::BringUp.total_steps()
        );
        assert_eq!(Phase::Deployed.step_number(Direction::Teardown), 0);
        assert_eq!(Phase::Deployed.step_number(Direction::BringUp), 4);
        assert_eq!(
            Phase::VerifiedAbsent.step_number(Direction::Teardown),
            Direction::Teardown.total_steps()
        );
    }

    #[test]
    fn test_phase_serializes_kebab_case() {
        assert_eq!(
            serde_json::to_string(&Phase::PrerequisitesChecked).unwrap(),
            "\"prerequisites-checked\""
        );
        assert_eq!(
            serde_json::to_string(&Phase::K8sCleaned).unwrap(),
            "\"k8s-cleaned\""
        );
        assert_eq!(Phase::K8sCleaned.to_string(), "k8s-cleaned");
    }

    #[test]
    fn test_confirmation_requires_exact_token() {
        assert!(Confirmation::parse("DELETE").is_ok());
        for input in ["", "delete", "DELETE ", " DELETE", "yes", "DELET"] {
            assert!(matches!(
                Confirmation::parse(input),
                Err(LifecycleError::ConfirmationDeclined)
            ));
        }
    }

    #[test]
    fn test_initial_states() {
        let plan = plan();
        let state = LifecycleState::for_bring_up(&plan);
        assert_eq!(state.phase, Phase::Uninitialized);
        assert_eq!(state.resource_status.len(), plan.len());
        assert!(state
            .resource_status
            .values()
            .all(|s| *s == ResourceStatus::Pending));

        let confirmation = Confirmation::parse("DELETE").unwrap();
        let state = LifecycleState::for_teardown(&plan, confirmation);
        assert_eq!(state.phase, Phase::Deployed);
        assert_eq!(state.direction, Direction::Teardown);
    }

    #[test]
    fn test_gate_ignores_soft_policy_nodes() {
        let plan = plan();
        let mut state = LifecycleState::for_bring_up(&plan);
        for node in plan.nodes() {
            state.set_status(&node.name, ResourceStatus::Active);
        }
        state.set_status("demo-metrics-server", ResourceStatus::Failed);
        assert!(state
            .check_gate(Phase::Deployed, plan.nodes(), ResourceStatus::Active)
            .is_ok());

        state.set_status("demo", ResourceStatus::Failed);
        match state.check_gate(Phase::Deployed, plan.nodes(), ResourceStatus::Active) {
            Err(LifecycleError::PhaseBlocked { phase, resources }) => {
                assert_eq!(phase, Phase::Deployed);
                assert_eq!(resources, vec!["demo".to_string()]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
        assert_eq!(state.failed_resources(), vec!["demo", "demo-metrics-server"]);
    }

    #[test]
    fn test_final_gate_counts_soft_policy_nodes() {
        let plan = plan();
        let mut state = LifecycleState::for_bring_up(&plan);
        for node in plan.nodes() {
            state.set_status(&node.name, ResourceStatus::Absent);
        }
        assert!(state
            .check_all(Phase::VerifiedAbsent, plan.nodes(), ResourceStatus::Absent)
            .is_ok());

        state.set_status("demo-metrics-server", ResourceStatus::Active);
        state.set_status("demo-dashboard", ResourceStatus::Failed);
        assert!(state
            .check_gate(Phase::VerifiedAbsent, plan.nodes(), ResourceStatus::Absent)
            .is_ok());
        match state.check_all(Phase::VerifiedAbsent, plan.nodes(), ResourceStatus::Absent) {
            Err(LifecycleError::PhaseBlocked { phase, resources }) => {
                assert_eq!(phase, Phase::VerifiedAbsent);
                assert_eq!(resources, vec!["demo-metrics-server", "demo-dashboard"]);
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_teardown_kinds_cover_every_kind() {
        let covered: Vec<ResourceKind> = Direction::Teardown
            .phases()
            .iter()
            .flat_map(|p| p.teardown_kinds().iter().copied())
            .collect();
        for kind in [
            ResourceKind::Network,
            ResourceKind::Registry,
            ResourceKind::Cluster,
            ResourceKind::NodeGroup,
            ResourceKind::Addon,
            ResourceKind::DnsZone,
            ResourceKind::Certificate,
            ResourceKind::Dashboard,
            ResourceKind::AlarmTopic,
        ] {
            assert_eq!(covered.iter().filter(|k| **k == kind).count(), 1, "{kind}");
        }
    }

    #[test]
    fn test_poll_config() {
        let config = PollConfig::default();
        assert_eq!(config.delay_for_attempt(0), Duration::from_secs(5));
        assert_eq!(config.delay_for_attempt(1), Duration::from_secs_f64(7.5));
        assert!(config.delay_for_attempt(100) <= config.max_delay);

        assert!(config.should_poll(0));
        assert!(!config.should_poll(config.max_attempts));

        assert_eq!(
            config.timeout_for(ResourceKind::Cluster),
            Duration::from_secs(1200)
        );
        assert_eq!(
            config.timeout_for(ResourceKind::Addon),
            Duration::from_secs(300)
        );
    }
}

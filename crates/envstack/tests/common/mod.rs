//! Shared test fixtures: an in-memory cloud that records every call.

#![allow(dead_code)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use envstack::{
    build_plan, EnvironmentConfig, Orchestrator, PollConfig, PrerequisitesValidator, ResourcePlan,
};
use envstack_cloud::{
    AddonChart, CallerIdentity, CloudProvider, CloudProviderError, ResourceNode, ResourceStatus,
};

/// One call made against the fake cloud.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    VerifyCredentials,
    AddChartRepository(String),
    UpdateChartRepositories,
    IsBootstrapped,
    Bootstrap,
    Create(String),
    Describe(String),
    Delete(String),
    DeleteWorkloads,
    DeleteLogGroups,
}

#[derive(Default)]
struct Inner {
    resources: BTreeMap<String, ResourceStatus>,
    bootstrapped: bool,
    log_groups: bool,
    unreachable: bool,
    fail_create: BTreeSet<String>,
    fail_delete: BTreeSet<String>,
    calls: Vec<Call>,
}

/// Cloud provider that creates and deletes resources instantly in memory.
#[derive(Default)]
pub struct FakeCloud {
    inner: Mutex<Inner>,
}

impl FakeCloud {
    /// An empty account.
    pub fn new() -> Self {
        Self::default()
    }

    /// An account where every plan node is already active.
    pub fn with_deployed(plan: &ResourcePlan) -> Self {
        let cloud = Self::new();
        {
            let mut inner = cloud.inner.lock().unwrap();
            inner.bootstrapped = true;
            for node in plan.nodes() {
                inner
                    .resources
                    .insert(node.name.clone(), ResourceStatus::Active);
            }
        }
        cloud
    }

    /// Make `create` fail for the named node.
    pub fn failing_create(self, name: &str) -> Self {
        self.inner.lock().unwrap().fail_create.insert(name.into());
        self
    }

    /// Let `create` succeed again for the named node.
    pub fn allow_create(&self, name: &str) {
        self.inner.lock().unwrap().fail_create.remove(name);
    }

    /// Make `delete` fail for the named node.
    pub fn failing_delete(self, name: &str) -> Self {
        self.inner.lock().unwrap().fail_delete.insert(name.into());
        self
    }

    /// Leave the cluster log group in place so its deletion succeeds.
    pub fn with_log_groups(self) -> Self {
        self.inner.lock().unwrap().log_groups = true;
        self
    }

    /// Fail every call as if the endpoint could not be reached.
    pub fn unreachable(self) -> Self {
        self.inner.lock().unwrap().unreachable = true;
        self
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<Call> {
        self.inner.lock().unwrap().calls.clone()
    }

    /// Names passed to `create`, in order.
    pub fn created(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Create(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    /// Names passed to `delete`, in order.
    pub fn deleted(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Delete(name) => Some(name),
                _ => None,
            })
            .collect()
    }

    /// Position of the first matching call.
    pub fn position(&self, call: &Call) -> Option<usize> {
        self.calls().iter().position(|c| c == call)
    }

    /// Current in-memory status of a resource.
    pub fn status(&self, name: &str) -> ResourceStatus {
        self.inner
            .lock()
            .unwrap()
            .resources
            .get(name)
            .copied()
            .unwrap_or(ResourceStatus::Absent)
    }

    fn record(&self, call: Call) -> Result<(), CloudProviderError> {
        let mut inner = self.inner.lock().unwrap();
        inner.calls.push(call);
        if inner.unreachable {
            return Err(CloudProviderError::Unreachable(
                "Could not connect to the endpoint URL".into(),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl CloudProvider for FakeCloud {
    async fn verify_credentials(&self) -> Result<CallerIdentity, CloudProviderError> {
        self.record(Call::VerifyCredentials)?;
        Ok(CallerIdentity {
            account: "123456789012".into(),
            arn: "arn:aws:iam::123456789012:user/tester".into(),
        })
    }

    async fn add_chart_repository(&self, chart: &AddonChart) -> Result<(), CloudProviderError> {
        self.record(Call::AddChartRepository(chart.repo_name.clone()))
    }

    async fn update_chart_repositories(&self) -> Result<(), CloudProviderError> {
        self.record(Call::UpdateChartRepositories)
    }

    async fn is_bootstrapped(&self) -> Result<bool, CloudProviderError> {
        self.record(Call::IsBootstrapped)?;
        Ok(self.inner.lock().unwrap().bootstrapped)
    }

    async fn bootstrap(&self) -> Result<(), CloudProviderError> {
        self.record(Call::Bootstrap)?;
        self.inner.lock().unwrap().bootstrapped = true;
        Ok(())
    }

    async fn create(&self, node: &ResourceNode) -> Result<String, CloudProviderError> {
        self.record(Call::Create(node.name.clone()))?;
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_create.contains(&node.name) {
            return Err(CloudProviderError::Api {
                code: "LimitExceededException".into(),
                message: format!("cannot create {}", node.name),
            });
        }
        inner
            .resources
            .insert(node.name.clone(), ResourceStatus::Active);
        Ok(format!("fake-{}", node.name))
    }

    async fn describe(&self, node: &ResourceNode) -> Result<ResourceStatus, CloudProviderError> {
        self.record(Call::Describe(node.name.clone()))?;
        Ok(self.status(&node.name))
    }

    async fn delete(&self, node: &ResourceNode) -> Result<(), CloudProviderError> {
        self.record(Call::Delete(node.name.clone()))?;
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_delete.contains(&node.name) {
            return Err(CloudProviderError::Api {
                code: "DependencyViolation".into(),
                message: format!("{} has dependent objects", node.name),
            });
        }
        match inner.resources.remove(&node.name) {
            Some(_) => Ok(()),
            None => Err(CloudProviderError::NotFound(node.name.clone())),
        }
    }

    async fn delete_workloads(&self) -> Result<(), CloudProviderError> {
        self.record(Call::DeleteWorkloads)
    }

    async fn delete_log_groups(&self) -> Result<(), CloudProviderError> {
        self.record(Call::DeleteLogGroups)?;
        let mut inner = self.inner.lock().unwrap();
        if inner.log_groups {
            inner.log_groups = false;
            Ok(())
        } else {
            Err(CloudProviderError::NotFound(
                "/aws/eks/demo/cluster".into(),
            ))
        }
    }
}

/// Default config for a cluster named `demo`.
pub fn config() -> EnvironmentConfig {
    EnvironmentConfig::with_defaults("demo".into())
}

/// Plan for [`config`].
pub fn plan() -> ResourcePlan {
    build_plan(&config()).unwrap()
}

/// Orchestrator over `cloud` with no tool checks and no polling delay.
pub fn orchestrator(cloud: &Arc<FakeCloud>) -> Orchestrator {
    Orchestrator::new(cloud.clone())
        .with_prerequisites(PrerequisitesValidator::empty())
        .with_poll_config(PollConfig::immediate())
        .with_progress(false)
}

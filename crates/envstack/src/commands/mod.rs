pub mod deploy;
pub mod destroy;
pub mod plan;
pub mod status;

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::builder::BoolishValueParser;
use clap::{ArgAction, Args};
use envstack::{EnvironmentConfig, Orchestrator, PollConfig};
use envstack_cloud::AwsCli;

/// Environment settings shared by every command.
///
/// Precedence: flag, then environment variable, then `--config` file, then
/// built-in default.
#[derive(Args, Debug, Clone, Default)]
pub struct EnvironmentArgs {
    /// YAML file with environment settings
    #[arg(short, long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// AWS region
    #[arg(long, env = "AWS_REGION", value_name = "REGION")]
    pub region: Option<String>,

    /// EKS cluster name
    #[arg(long, env = "CLUSTER_NAME", value_name = "NAME")]
    pub cluster_name: Option<String>,

    /// Worker node instance type
    #[arg(long, env = "NODE_INSTANCE_TYPE", value_name = "TYPE")]
    pub node_instance_type: Option<String>,

    /// Minimum node count
    #[arg(long, env = "NODE_MIN_SIZE", value_name = "N")]
    pub node_min_size: Option<u32>,

    /// Maximum node count
    #[arg(long, env = "NODE_MAX_SIZE", value_name = "N")]
    pub node_max_size: Option<u32>,

    /// Desired node count
    #[arg(long, env = "NODE_DESIRED_SIZE", value_name = "N")]
    pub node_desired_size: Option<u32>,

    /// Use spot capacity for worker nodes
    #[arg(long, env = "USE_SPOT", value_name = "BOOL", action = ArgAction::Set, value_parser = BoolishValueParser::new())]
    pub use_spot: Option<bool>,

    /// Create the CloudWatch dashboard
    #[arg(long, env = "ENABLE_MONITORING", value_name = "BOOL", action = ArgAction::Set, value_parser = BoolishValueParser::new())]
    pub enable_monitoring: Option<bool>,

    /// Create the alarm topic and CPU alarm (requires monitoring)
    #[arg(long, env = "ENABLE_ALARMS", value_name = "BOOL", action = ArgAction::Set, value_parser = BoolishValueParser::new())]
    pub enable_alarms: Option<bool>,

    /// Email subscribed to the alarm topic
    #[arg(long, env = "ALERT_EMAIL", value_name = "EMAIL")]
    pub alert_email: Option<String>,

    /// Apex domain for the hosted zone and certificate
    #[arg(long, env = "DOMAIN_NAME", value_name = "DOMAIN")]
    pub domain_name: Option<String>,

    /// Comma-separated image repository names
    #[arg(long, env = "ECR_REPOSITORIES", value_name = "NAMES", value_delimiter = ',')]
    pub repositories: Option<Vec<String>>,

    /// EKS control plane version
    #[arg(long, env = "KUBERNETES_VERSION", value_name = "VERSION")]
    pub kubernetes_version: Option<String>,

    /// VPC CIDR block
    #[arg(long, env = "VPC_CIDR", value_name = "CIDR")]
    pub vpc_cidr: Option<String>,

    /// Namespace holding application workloads
    #[arg(long, env = "APP_NAMESPACE", value_name = "NAMESPACE")]
    pub app_namespace: Option<String>,

    /// Named AWS CLI profile
    #[arg(long, env = "AWS_PROFILE", value_name = "PROFILE")]
    pub profile: Option<String>,
}

impl EnvironmentArgs {
    /// Merge flags and environment over the config file or defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if `--config` cannot be read or parsed.
    pub fn resolve(&self) -> Result<EnvironmentConfig> {
        let mut config = match &self.config {
            Some(path) => EnvironmentConfig::from_file(path)?,
            None => EnvironmentConfig::default(),
        };

        if let Some(region) = &self.region {
            config.region.clone_from(region);
        }
        if let Some(name) = &self.cluster_name {
            config.cluster_name.clone_from(name);
        }
        if let Some(instance_type) = &self.node_instance_type {
            config.node_instance_type.clone_from(instance_type);
        }
        if let Some(min) = self.node_min_size {
            config.node_min_size = min;
        }
        if let Some(max) = self.node_max_size {
            config.node_max_size = max;
        }
        if let Some(desired) = self.node_desired_size {
            config.node_desired_size = desired;
        }
        if let Some(spot) = self.use_spot {
            config.use_spot_capacity = spot;
        }
        if let Some(monitoring) = self.enable_monitoring {
            config.enable_monitoring = monitoring;
        }
        if let Some(alarms) = self.enable_alarms {
            config.enable_alarms = alarms;
        }
        if self.alert_email.is_some() {
            config.alert_email.clone_from(&self.alert_email);
        }
        if self.domain_name.is_some() {
            config.domain_name.clone_from(&self.domain_name);
        }
        if let Some(repositories) = &self.repositories {
            config.repositories.clone_from(repositories);
        }
        if let Some(version) = &self.kubernetes_version {
            config.kubernetes_version.clone_from(version);
        }
        if let Some(cidr) = &self.vpc_cidr {
            config.vpc_cidr.clone_from(cidr);
        }
        if let Some(namespace) = &self.app_namespace {
            config.app_namespace.clone_from(namespace);
        }

        Ok(config.normalized())
    }

    /// Build an orchestrator backed by the AWS CLI for `config`.
    pub fn orchestrator(&self, config: &EnvironmentConfig, poll: PollConfig) -> Orchestrator {
        let mut provider = AwsCli::new(&config.region, &config.cluster_name)
            .with_app_namespace(&config.app_namespace);
        if let Some(profile) = &self.profile {
            provider = provider.with_profile(profile);
        }
        Orchestrator::new(Arc::new(provider)).with_poll_config(poll)
    }
}

/// Polling limits for commands that wait on resources.
#[derive(Args, Debug, Clone)]
pub struct PollArgs {
    /// Seconds to wait for each resource to settle
    #[arg(long, value_name = "SECONDS", default_value_t = 300)]
    pub wait_timeout: u64,

    /// Seconds to wait for the cluster and node group to settle
    #[arg(long, value_name = "SECONDS", default_value_t = 1200)]
    pub cluster_wait_timeout: u64,

    /// Initial seconds between status checks
    #[arg(long, value_name = "SECONDS", default_value_t = 5)]
    pub poll_interval: u64,
}

impl PollArgs {
    /// Convert to a [`PollConfig`]. The attempt cap is derived from the
    /// longest timeout so the wall-clock ceiling is what ends a wait.
    pub fn poll_config(&self) -> PollConfig {
        let defaults = PollConfig::default();
        let interval = self.poll_interval.max(1);
        let longest = self.wait_timeout.max(self.cluster_wait_timeout);

        PollConfig {
            max_attempts: u32::try_from(longest / interval)
                .unwrap_or(u32::MAX)
                .max(1),
            initial_delay: Duration::from_secs(interval),
            max_delay: defaults.max_delay.max(Duration::from_secs(interval)),
            backoff_multiplier: defaults.backoff_multiplier,
            timeout: Duration::from_secs(self.wait_timeout),
            long_timeout: Duration::from_secs(self.cluster_wait_timeout),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use serial_test::serial;
    use std::io::Write;

    #[derive(Parser)]
    struct TestCli {
        #[command(flatten)]
        env: EnvironmentArgs,

        #[command(flatten)]
        poll: PollArgs,
    }

    const ENV_VARS: &[&str] = &[
        "AWS_REGION",
        "CLUSTER_NAME",
        "NODE_INSTANCE_TYPE",
        "NODE_MIN_SIZE",
        "NODE_MAX_SIZE",
        "NODE_DESIRED_SIZE",
        "USE_SPOT",
        "ENABLE_MONITORING",
        "ENABLE_ALARMS",
        "ALERT_EMAIL",
        "DOMAIN_NAME",
        "ECR_REPOSITORIES",
        "KUBERNETES_VERSION",
        "VPC_CIDR",
        "APP_NAMESPACE",
        "AWS_PROFILE",
    ];

    fn clear_env() {
        for var in ENV_VARS {
            std::env::remove_var(var);
        }
    }

    #[test]
    #[serial]
    fn test_defaults_without_flags_or_env() {
        clear_env();
        let cli = TestCli::parse_from(["envstack"]);
        assert_eq!(cli.env.resolve().unwrap(), EnvironmentConfig::default());
    }

    #[test]
    #[serial]
    fn test_environment_variables() {
        clear_env();
        std::env::set_var("CLUSTER_NAME", "env-cluster");
        std::env::set_var("USE_SPOT", "true");
        std::env::set_var("ENABLE_MONITORING", "false");
        std::env::set_var("ECR_REPOSITORIES", "api,worker");
        std::env::set_var("DOMAIN_NAME", "example.com");

        let config = TestCli::parse_from(["envstack"]).env.resolve().unwrap();
        clear_env();

        assert_eq!(config.cluster_name, "env-cluster");
        assert!(config.use_spot_capacity);
        assert!(!config.enable_monitoring);
        assert_eq!(config.repositories, vec!["api", "worker"]);
        assert_eq!(config.domain_name.as_deref(), Some("example.com"));
    }

    #[test]
    #[serial]
    fn test_flag_overrides_environment() {
        clear_env();
        std::env::set_var("AWS_REGION", "eu-west-1");

        let config = TestCli::parse_from(["envstack", "--region", "ap-south-1"])
            .env
            .resolve()
            .unwrap();
        clear_env();

        assert_eq!(config.region, "ap-south-1");
    }

    #[test]
    #[serial]
    fn test_environment_overrides_config_file() {
        clear_env();
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "cluster_name: from-file\nnode_max_size: 6\nregion: us-west-2").unwrap();
        std::env::set_var("NODE_MAX_SIZE", "9");

        let path = file.path().to_string_lossy().into_owned();
        let config = TestCli::parse_from(["envstack", "--config", &path])
            .env
            .resolve()
            .unwrap();
        clear_env();

        assert_eq!(config.cluster_name, "from-file");
        assert_eq!(config.region, "us-west-2");
        assert_eq!(config.node_max_size, 9);
    }

    #[test]
    #[serial]
    fn test_poll_config_from_flags() {
        clear_env();
        let cli = TestCli::parse_from([
            "envstack",
            "--wait-timeout",
            "60",
            "--cluster-wait-timeout",
            "600",
            "--poll-interval",
            "10",
        ]);
        let poll = cli.poll.poll_config();

        assert_eq!(poll.timeout, Duration::from_secs(60));
        assert_eq!(poll.long_timeout, Duration::from_secs(600));
        assert_eq!(poll.initial_delay, Duration::from_secs(10));
        assert_eq!(poll.max_attempts, 60);
    }
}

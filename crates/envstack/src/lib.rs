//! envstack library.
//!
//! Plans an EKS demo environment from an [`EnvironmentConfig`] and drives it
//! through bring-up or teardown against any [`envstack_cloud::CloudProvider`].
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use envstack::{build_plan, EnvironmentConfig, Orchestrator};
//! use envstack_cloud::AwsCli;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = EnvironmentConfig::with_defaults("my-cluster".into());
//!     let plan = build_plan(&config)?;
//!     let provider = AwsCli::new(&config.region, &config.cluster_name);
//!     let state = Orchestrator::new(Arc::new(provider)).bring_up(&plan).await?;
//!     println!("reached {}", state.phase);
//!     Ok(())
//! }
//! ```

// Allow product names without backticks in doc comments
#![allow(clippy::doc_markdown)]

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod plan;
pub mod report;
pub mod state;
pub mod ui;
pub mod validator;

// Re-export commonly used types at the crate root
pub use config::{EnvironmentConfig, OutputFormat};
pub use error::LifecycleError;
pub use orchestrator::Orchestrator;
pub use plan::{build_plan, ResourcePlan, ValidationError};
pub use report::{ResourceReport, StatusReport};
pub use state::{
    Confirmation, Direction, LifecycleState, Phase, PollConfig, CONFIRMATION_TOKEN,
};
pub use validator::PrerequisitesValidator;

//! Cloud provider abstractions.
//!
//! This module defines the collaborator trait and the AWS implementation.

pub mod aws;
mod traits;

pub use traits::{CallerIdentity, CloudProvider, CloudProviderError};

// Re-export provider clients
pub use aws::AwsCli;

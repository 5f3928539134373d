//! Core types for the ossindex vector index lifecycle controller
//!
//! This crate provides the foundational abstractions used throughout the
//! controller:
//!
//! - **Provisioning model**: requests, results and continuation markers
//!   for the single-invocation-with-continuation protocol
//! - **Configuration**: backend connection and reconciler timing
//! - **Error handling**: unified error type with the transient /
//!   conflict / user-error / timeout taxonomy

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

pub mod config;
pub mod error;
pub mod provision;

// Re-export main types for convenience
pub use config::{BackendConfig, Config, ReconcilerConfig};
pub use error::{Error, Result, ResultExt};
pub use provision::{
    Continuation, IndexProperties, Operation, ProvisioningRequest, ProvisioningResult, SagaPhase,
};

/// Version of the core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

//! Index lifecycle reconciler
//!
//! Drives a vector index toward the desired state described by a
//! provisioning request, one bounded invocation at a time. The
//! reconciler never sleeps across a backend operation: whenever the
//! backend has not settled yet it returns an in-progress result with a
//! continuation marker and trusts the caller to re-invoke.

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

mod backoff;
mod poller;
mod reconciler;

pub use backoff::BackoffPolicy;
pub use poller::{CollectionReadiness, ReadinessPoller};
pub use reconciler::IndexReconciler;

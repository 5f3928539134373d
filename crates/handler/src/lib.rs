//! Invocation boundary for the index lifecycle controller
//!
//! Translates the deployment engine's provisioning event envelope into
//! a reconciler request and the reconciler's result back into a
//! response envelope. All policy lives in the reconciler; this crate is
//! parsing, field mapping, and nothing else.

#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::unwrap_used))]
#![cfg_attr(not(test), deny(clippy::expect_used))]

mod adapter;
mod envelope;

pub use adapter::InvocationAdapter;
pub use envelope::{
    ProvisioningEvent, ProvisioningResponse, RawProperties, ResponseStatus, Stringy,
};

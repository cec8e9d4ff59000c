//! Identity proxy ("intent") for acting as a bridged user.
//!
//! An [`Intent`] wraps the homeserver client of one user and borrows the
//! bridge bot's client to recover from permission failures: inviting the
//! user into rooms it was refused from, and raising its power level when a
//! state change needs it. Membership and power levels seen through
//! [`Intent::on_event`] are cached to skip redundant calls.

pub mod client;
pub mod error;
pub mod intent;
#[cfg(any(test, feature = "test-support"))]
pub mod mock;
mod power;

pub use {
    client::{ClientResult, MatrixClient},
    error::{Error, Result},
    intent::Intent,
};

//! Shared error plumbing used across the ghostbridge crates.

pub mod error;

pub use error::FromMessage;

//! Metric names recorded by the bridge core.
//!
//! This crate only defines names and re-exports the `metrics` facade macros.
//! Installing a recorder/exporter is left to the process hosting the bridge.
//!
//! ```rust,ignore
//! use ghostbridge_metrics::{counter, intent};
//!
//! counter!(intent::JOIN_RECOVERIES_TOTAL, "outcome" => "joined").increment(1);
//! ```

mod definitions;

pub use definitions::*;

// Re-export metrics macros for convenience
pub use metrics::{counter, gauge};

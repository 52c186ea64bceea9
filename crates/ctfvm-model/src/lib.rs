//! Shared domain types for the ctfvm workload provisioner.
//!
//! Everything here is plain data plus pure functions: naming rules for
//! challenge tags and container names, workload snapshots and catalog records.

mod error;
pub use error::ModelError;

mod domain;
pub use domain::*;

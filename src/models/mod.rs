//! Data Transfer Objects for the inspection CLI
//!
//! Contains the JSON report types printed by each command.

pub mod reports;

pub use reports::*;

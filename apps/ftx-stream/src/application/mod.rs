//! Application Layer - Port definitions.
//!
//! Defines the transport capability the supervisor depends on. Adapters in
//! the infrastructure layer implement it.

/// Port interfaces for external systems.
pub mod ports;

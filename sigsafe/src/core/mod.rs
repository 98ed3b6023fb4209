//! Core signal delivery state
//!
//! This module holds the two process-wide tables the signal handler reads:
//! the guarded-region registry and the per-signal callback table.

pub mod dispatcher;
pub mod registry;

// Re-export commonly used items
pub use dispatcher::{dispatch_table, DispatchTable, UserHandler};
pub use registry::{init, install_registry, registry, GuardedRegion, GuardedRegistry, RegistryBuilder};

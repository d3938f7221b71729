//! Workspace placeholder crate.
//!
//! Re-exports the `core-service` façade so hosts can depend on a single crate
//! and reach the sync engine, the index builder and the query path through it.

pub use core_service::*;

//! Adapters that live inside the domain crate for convenience.
//!
//! These are intended for unit testing and ephemeral runs. The persistent
//! store lives in a separate crate.

pub mod memory_store;

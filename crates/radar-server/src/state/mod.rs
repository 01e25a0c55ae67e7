//! Shared in-memory state.

mod store;

pub use store::World;

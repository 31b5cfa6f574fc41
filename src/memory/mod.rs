//! Namespaced long-term memory

pub mod store;
pub mod writer;

pub use store::{MemoryFragment, MemoryNamespace, MemoryStore};
pub use writer::MemoryWriter;

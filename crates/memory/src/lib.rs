//! Session store implementations for ChatPTK.

pub mod in_memory;

pub use in_memory::InMemorySessionStore;

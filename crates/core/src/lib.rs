//! # ChatPTK Core
//!
//! Domain types, traits, and error definitions for the ChatPTK tutor backend.
//! This crate has **no HTTP or storage dependencies**. It defines the domain
//! model that all other crates implement against.
//!
//! The two seams are traits:
//! - [`Provider`] — the hosted completion service
//! - [`SessionStore`] — per-client turn memory

pub mod error;
pub mod message;
pub mod provider;
pub mod session;

// Re-export key types at crate root for ergonomics
pub use error::{ProviderError, ValidationError};
pub use message::{Message, Role};
pub use provider::{Completion, Provider, ProviderRequest, ProviderResponse, StreamChunk};
pub use session::{SessionGuard, SessionId, SessionState, SessionStore};

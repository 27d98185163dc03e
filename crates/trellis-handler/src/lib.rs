//! Trellis Handlers
//!
//! A handler implements the actual behavior of one node type. The engine
//! resolves a node's type tag against a [`HandlerRegistry`] and invokes the
//! handler with the node spec, the merged input payload, and a small run
//! context. Handlers never read configuration from the process environment;
//! everything they need arrives through the node config or the context.
//!
//! This crate ships the pure in-memory built-ins (trigger, manual input,
//! output, condition, add-field, join, comment). Network-facing handlers
//! (HTTP, LLM, messaging, protocol polls) live outside the scheduling core
//! and register themselves against the same trait.

mod builtin;
mod error;
mod registry;

pub use builtin::builtin_registry;
pub use error::HandlerError;
pub use registry::{HandlerContext, HandlerOutput, HandlerRegistry, NodeHandler};

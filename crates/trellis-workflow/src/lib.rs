//! Trellis Workflow
//!
//! This crate provides the graph model for Trellis workflows: typed nodes
//! connected by directed data-flow edges, plus the pure analysis passes the
//! engine runs before any node executes:
//!
//! - validation (edge endpoints exist, node ids are unique)
//! - dependency analysis (node id -> parent node ids)
//! - layer planning (Kahn-style batching into parallelizable layers)
//! - starting-node selection (does the graph have an entry point at all)
//!
//! Nothing here performs I/O; a [`WorkflowGraph`] is read-only for the
//! duration of a run, except for seeding manual-input node config from run
//! inputs before the run starts.

mod connection;
mod error;
mod graph;
mod node;
mod planner;
mod workflow;

pub use connection::ConnectionSpec;
pub use error::WorkflowError;
pub use graph::DependencyGraph;
pub use node::{NodeSpec, node_types};
pub use workflow::WorkflowGraph;

//! Trellis Engine
//!
//! The workflow execution engine: it takes a validated [`trellis_workflow::WorkflowGraph`],
//! plans it into parallelizable layers, and drives every node to a terminal
//! result while persisting run state through [`trellis_store::Store`].
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      WorkflowRunner                         │
//! │  - owns mpsc channel (sender + receiver)                    │
//! │  - run(payload) triggers an execution                      │
//! │  - start(cancel) runs the trigger loop                      │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      RunCoordinator                         │
//! │  - run lifecycle: pending → running → terminal              │
//! │  - layer-by-layer fan-out, barrier between layers           │
//! │  - branch filtering + input merging between layers          │
//! │  - cooperative cancellation at layer boundaries             │
//! └─────────────────────────────────────────────────────────────┘
//!                               │
//!                               ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                      TaskDispatcher                         │
//! │  - handler registry lookup, retries, timeout, timing        │
//! │  - running + terminal node log entries                      │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! A failed node never unwinds a run: independent branches run to completion
//! and failures are aggregated into the terminal run status. Cancellation is
//! cooperative: nodes already dispatched in the current layer finish, and no
//! node of a later layer is ever dispatched.

mod branch;
mod config;
mod coordinator;
mod dispatch;
mod error;
mod events;
mod merge;
mod result;
mod runner;

pub use branch::{connection_fires, filter_outgoing};
pub use config::{EngineConfig, UnknownNodePolicy};
pub use coordinator::RunCoordinator;
pub use dispatch::{DispatchError, TaskDispatcher};
pub use error::EngineError;
pub use events::{ChannelNotifier, ExecutionEvent, ExecutionNotifier, NoopNotifier};
pub use merge::merge_inputs;
pub use result::{NodeResult, RunOutcome};
pub use runner::WorkflowRunner;

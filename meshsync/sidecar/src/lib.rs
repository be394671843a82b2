#![warn(clippy::indexing_slicing)]

//! `connect-sidecar`: keeps a workload's service and its connect proxy registered with the local
//! registry agent.
//!
//! - [`engine::SyncEngine`] registers the declared services as one unit, and deregisters them on
//!   shutdown;
//! - [`controller::LifecycleController`] runs the engine on a fixed period and turns an interrupt
//!   into a bounded, single teardown pass;
//! - [`command`] wires flags, files and process signals to both.
//!
//! The agent being down is not an error worth stopping for: every failed attempt is simply
//! retried on the next tick, using the same period as the steady-state resync.

pub mod command;
pub mod controller;
pub mod engine;
pub mod error;

#[cfg(test)]
mod testing;

pub use command::{connect_sidecar, ConnectSidecarArgs};
pub use controller::{InterruptHandle, LifecycleController, ShutdownReport};
pub use engine::{EngineState, SyncEngine, TeardownOutcome};
pub use error::{SidecarError, SidecarResult};

//! The priority-aware, no-drop-preserving message scheduler with network
//! backpressure. This is the hard part of the bridge client: see
//! `core::SchedulerCore` for the selection policy.

pub mod core;
mod topic;

pub use core::{Scheduled, SchedulerCore};

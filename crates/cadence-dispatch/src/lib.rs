//! `cadence-dispatch`: bounded-concurrency batch runner.
//!
//! A [`Dispatcher`] owns its queue and in-flight counter, so independent
//! dispatchers never interfere. Jobs are submitted up front, started FIFO as
//! slots free, and [`Dispatcher::drain`] waits for every one of them to reach a
//! terminal state. Rate-limit retry lives inside the jobs themselves.

pub mod dispatcher;
pub mod error;

pub use dispatcher::{DispatchStats, Dispatcher};
pub use error::{DispatchError, Result};

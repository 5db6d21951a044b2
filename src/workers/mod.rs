//! Cooperative-thread primitives.
//!
//! - [`Worker`]: one OS thread with suspend/wake, timed wait and acknowledged termination.
//! - [`ThreadRegistry`]: directory of live workers for diagnostics and ordered shutdown.
//!
//! Generators run their production loop on a [`Worker`]; any other background loop of a
//! device (serial readers, watchdogs) should do the same so that `Context::shutdown`
//! can stop it.

mod registry;
mod worker;

pub use registry::{ShutdownOrder, ThreadInfo, ThreadRegistry, ThreadState};
pub use worker::{Worker, WorkerId, WorkerOptions};

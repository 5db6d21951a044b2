//! Ready-made handlers.
//!
//! - [`AuditHandler`] appends the audit serialization of each command to a writer.
//! - [`LogHandler`] (feature `logging`) logs every notification through `tracing`.

mod audit;
#[cfg(feature = "logging")]
mod log;

pub use audit::AuditHandler;
#[cfg(feature = "logging")]
pub use log::LogHandler;

//! Error types used by the bus, the registries and the query protocol.
//!
//! This module defines three error enums:
//!
//! - [`BusError`]: errors raised while producing, routing or handling notifications.
//! - [`RegistryError`]: device directory collisions and missing entries.
//! - [`QueryError`]: attribute RPC failures (ownership, direction, parsing).
//!
//! All of them provide `as_label` for logging. None of them is meant to end the process:
//! callers decide whether to retry, log or escalate.

use thiserror::Error;

use crate::bus::{CommandRange, CommandType};
use crate::device::DeviceClass;

/// # Errors produced by the event/command bus.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum BusError {
    /// A generator was enabled without a bound dispatcher, or a default command
    /// was dispatched before one was configured.
    #[error("not configured")]
    NotConfigured,

    /// A handler received a command outside of its declared service range.
    #[error("illegal command {command_type}; handler accepts {accepted}")]
    IllegalCommand {
        /// Type tag of the rejected command.
        command_type: CommandType,
        /// Range the handler declared.
        accepted: CommandRange,
    },

    /// Allocation failed while building a command.
    #[error("out of memory")]
    OutOfMemory,

    /// The OS refused to spawn a generator thread.
    #[error("spawn failed: {reason}")]
    Spawn {
        /// Error reported by the OS.
        reason: String,
    },

    /// A handler failed for a reason of its own (I/O, downstream device).
    #[error("handler {handler} failed: {reason}")]
    Handler {
        /// Name of the failing handler.
        handler: &'static str,
        /// Error reported by the handler.
        reason: String,
    },
}

impl BusError {
    /// Returns a short stable label (snake_case) for use in logs.
    ///
    /// # Example
    /// ```
    /// use telebus::BusError;
    ///
    /// assert_eq!(BusError::NotConfigured.as_label(), "bus_not_configured");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            BusError::NotConfigured => "bus_not_configured",
            BusError::IllegalCommand { .. } => "bus_illegal_command",
            BusError::OutOfMemory => "bus_out_of_memory",
            BusError::Spawn { .. } => "bus_spawn_failed",
            BusError::Handler { .. } => "bus_handler_failed",
        }
    }
}

/// # Errors produced by the device registry.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistryError {
    /// An entry with the same `(class, id)` exists and override was not requested.
    #[error("device {class}:{id} already registered")]
    Duplicate {
        /// Device class of the collision.
        class: DeviceClass,
        /// Instance id of the collision.
        id: String,
    },

    /// No entry matches `(class, id, device)`.
    #[error("device {class}:{id} not registered")]
    NotFound {
        /// Device class that was looked up.
        class: DeviceClass,
        /// Instance id that was looked up.
        id: String,
    },
}

impl RegistryError {
    /// Returns a short stable label (snake_case) for use in logs.
    pub fn as_label(&self) -> &'static str {
        match self {
            RegistryError::Duplicate { .. } => "device_duplicate",
            RegistryError::NotFound { .. } => "device_not_found",
        }
    }
}

/// # Errors produced by the query registry and the attribute protocol.
#[non_exhaustive]
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum QueryError {
    /// Registration attempted without an owning capability.
    #[error("query {name} has no owner")]
    MissingOwner {
        /// Name of the rejected query.
        name: String,
    },

    /// The name is already claimed somewhere in the process.
    #[error("query {name} already registered")]
    Duplicate {
        /// Name of the rejected query.
        name: String,
    },

    /// The name is not claimed (or its owner is gone).
    #[error("query {name} not found")]
    NotFound {
        /// Name that was looked up.
        name: String,
    },

    /// Read on a write-only attribute or write on a read-only one.
    #[error("query {name} does not support this access mode")]
    ModeNotSupported {
        /// Name of the attribute.
        name: String,
    },

    /// The capability refused the written value.
    #[error("invalid value for {name}: {reason}")]
    InvalidValue {
        /// Name of the attribute.
        name: String,
        /// Why the value was refused.
        reason: String,
    },

    /// The request line could not be parsed.
    #[error("malformed request: {line:?}")]
    Malformed {
        /// The offending request line.
        line: String,
    },

    /// Descriptor or registry storage could not be allocated.
    #[error("out of memory")]
    OutOfMemory,
}

impl QueryError {
    /// Returns a short stable label (snake_case) for use in logs and protocol replies.
    ///
    /// # Example
    /// ```
    /// use telebus::QueryError;
    ///
    /// let err = QueryError::ModeNotSupported { name: "CCON".into() };
    /// assert_eq!(err.as_label(), "mode_not_supported");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            QueryError::MissingOwner { .. } => "missing_owner",
            QueryError::Duplicate { .. } => "duplicate",
            QueryError::NotFound { .. } => "not_found",
            QueryError::ModeNotSupported { .. } => "mode_not_supported",
            QueryError::InvalidValue { .. } => "invalid_value",
            QueryError::Malformed { .. } => "malformed",
            QueryError::OutOfMemory => "out_of_memory",
        }
    }
}

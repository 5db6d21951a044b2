//! # Tracing handler for debugging and demos.
//!
//! [`LogHandler`] emits one `tracing` record per delivered event or command.
//!
//! ## Output format
//! ```text
//! INFO telebus::handlers::log: event seq=41 at_ms=1760870400000
//! INFO telebus::handlers::log: command command_type=12 device=fuel:T1 origin="console" priority=0 params=1
//! ```

use std::time::UNIX_EPOCH;

use tracing::info;

use crate::bus::{Command, CommandHandler, CommandRange, Event, EventHandler};
use crate::error::BusError;

/// Logs every notification it receives and accepts every command type.
///
/// Enabled via the `logging` feature. Not meant for production; write a
/// dedicated handler for real sinks.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogHandler;

impl EventHandler for LogHandler {
    fn notify_event(&self, event: &Event) {
        let at_ms = event
            .at
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or_default();
        info!(seq = event.seq, at_ms, "event");
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

impl CommandHandler for LogHandler {
    fn supported(&self) -> CommandRange {
        CommandRange::ALL
    }

    fn notify_command(&self, command: &Command) -> Result<(), BusError> {
        info!(
            command_type = command.command_type().0,
            device = %format_args!("{}:{}", command.class(), command.device_id()),
            origin = command.origin(),
            priority = command.priority(),
            params = command.len(),
            "command"
        );
        Ok(())
    }

    fn name(&self) -> &'static str {
        "log"
    }
}

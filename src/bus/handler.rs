//! # Notification consumers.
//!
//! Handlers are called synchronously on the dispatching thread (usually a generator's
//! worker) or, for queued items, on the thread that resumes the dispatcher.
//!
//! ## Rules
//! - Keep `notify_*` short; a slow handler delays its generator.
//! - A command handler validates the command type against its own declared range
//!   ([`CommandHandler::accept`]); dispatchers never filter.
//! - Handlers must not call `bind` on the dispatcher that is calling them.

use super::command::{Command, CommandRange};
use super::event::Event;
use crate::error::BusError;

/// Consumer of payload-less events.
pub trait EventHandler: Send + Sync + 'static {
    /// Called once per delivered event.
    fn notify_event(&self, event: &Event);

    /// Handler name used in logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

/// Consumer of commands.
///
/// # Example
/// ```
/// use telebus::{BusError, Command, CommandHandler, CommandRange, CommandType};
///
/// struct Pump;
///
/// impl CommandHandler for Pump {
///     fn supported(&self) -> CommandRange {
///         CommandRange::new(CommandType(10), CommandType(19))
///     }
///
///     fn notify_command(&self, command: &Command) -> Result<(), BusError> {
///         self.accept(command)?;
///         // drive the pump...
///         Ok(())
///     }
/// }
/// ```
pub trait CommandHandler: Send + Sync + 'static {
    /// Range of command types this handler serves.
    fn supported(&self) -> CommandRange;

    /// Called once per delivered command.
    ///
    /// Implementations start with [`accept`](Self::accept).
    fn notify_command(&self, command: &Command) -> Result<(), BusError>;

    /// Rejects commands outside [`supported`](Self::supported) with
    /// [`BusError::IllegalCommand`].
    fn accept(&self, command: &Command) -> Result<(), BusError> {
        let range = self.supported();
        if range.contains(command.command_type()) {
            Ok(())
        } else {
            Err(BusError::IllegalCommand {
                command_type: command.command_type(),
                accepted: range,
            })
        }
    }

    /// Handler name used in logs.
    fn name(&self) -> &'static str {
        std::any::type_name::<Self>()
    }
}

//! # Audit sink for commands.
//!
//! [`AuditHandler`] appends one line per delivered command to any `io::Write`
//! (a log file, a serial console, a `Vec<u8>` in tests):
//! ```text
//! <command type="12" class="fuel" id="T1" origin="console" priority="0"><param name="volume">40</param></command>
//! ```

use std::io::{self, Write};
use std::sync::Mutex;

use tracing::warn;

use crate::bus::{Command, CommandHandler, CommandRange};
use crate::error::BusError;
use crate::sync::lock;

/// Writes the audit serialization of every accepted command.
pub struct AuditHandler<W: Write + Send + 'static> {
    out: Mutex<W>,
    range: CommandRange,
}

impl<W: Write + Send + 'static> AuditHandler<W> {
    /// Audits every command type.
    pub fn new(out: W) -> Self {
        Self::with_range(out, CommandRange::ALL)
    }

    /// Audits only commands in `range`; others are rejected as illegal.
    pub fn with_range(out: W, range: CommandRange) -> Self {
        Self {
            out: Mutex::new(out),
            range,
        }
    }

    /// Consumes the handler and returns the writer.
    pub fn into_inner(self) -> W {
        match self.out.into_inner() {
            Ok(w) => w,
            Err(poisoned) => poisoned.into_inner(),
        }
    }

    fn write_line(&self, command: &Command) -> io::Result<()> {
        let line = command.to_audit();
        let mut out = lock(&self.out);
        out.write_all(line.as_bytes())?;
        out.write_all(b"\n")?;
        out.flush()
    }
}

impl<W: Write + Send + 'static> CommandHandler for AuditHandler<W> {
    fn supported(&self) -> CommandRange {
        self.range
    }

    fn notify_command(&self, command: &Command) -> Result<(), BusError> {
        self.accept(command)?;
        self.write_line(command).map_err(|e| {
            warn!(error = %e, "audit write failed");
            BusError::Handler {
                handler: "audit",
                reason: e.to_string(),
            }
        })
    }

    fn name(&self) -> &'static str {
        "audit"
    }
}

//! # Process-wide configuration.
//!
//! Provides [`Config`], the settings a [`Context`](crate::Context) is built from.
//!
//! ## Sentinel values
//! - `stack_size = 0` → platform default stack
//! - `poll_interval = 0s` → no default production period
//! - `thread_prefix = ""` → OS threads are named after the worker only

use std::time::Duration;

use crate::workers::ShutdownOrder;

/// Configuration for a [`Context`](crate::Context).
///
/// ## Field semantics
/// - `thread_prefix`: prefix of OS thread names (`"<prefix>-<worker>"`)
/// - `stack_size`: worker stack size in bytes (`0` = platform default)
/// - `query_radix`: marker written before each attribute name in listings; accepted
///   (optionally) in front of names in protocol requests
/// - `poll_interval`: default production period offered to generator bodies
/// - `shutdown_order`: order in which [`Context::shutdown`](crate::Context::shutdown)
///   terminates workers
///
/// ## Notes
/// All fields are public. Prefer the helper accessors over repeating sentinel checks.
#[derive(Clone, Debug)]
pub struct Config {
    /// Prefix for OS thread names.
    pub thread_prefix: String,

    /// Worker stack size in bytes.
    ///
    /// Embedded targets usually pin this down; `0` keeps the platform default.
    pub stack_size: usize,

    /// Radix marker of the attribute console (e.g. `"$"` gives `$CCON`).
    pub query_radix: String,

    /// Default period between two productions of a polling generator.
    pub poll_interval: Duration,

    /// Worker termination order at shutdown.
    pub shutdown_order: ShutdownOrder,
}

impl Config {
    /// Returns the stack size as an `Option`.
    ///
    /// - `None` → platform default
    /// - `Some(n)` → `n` bytes
    #[inline]
    pub fn stack_size(&self) -> Option<usize> {
        if self.stack_size == 0 {
            None
        } else {
            Some(self.stack_size)
        }
    }

    /// Returns the default production period as an `Option`.
    #[inline]
    pub fn poll_interval(&self) -> Option<Duration> {
        if self.poll_interval == Duration::ZERO {
            None
        } else {
            Some(self.poll_interval)
        }
    }

    /// Returns the thread prefix, `None` if empty.
    #[inline]
    pub fn thread_prefix(&self) -> Option<&str> {
        if self.thread_prefix.is_empty() {
            None
        } else {
            Some(&self.thread_prefix)
        }
    }
}

impl Default for Config {
    /// Default configuration:
    ///
    /// - `thread_prefix = "tb"`
    /// - `stack_size = 0` (platform default)
    /// - `query_radix = "$"`
    /// - `poll_interval = 1s`
    /// - `shutdown_order = Reverse` (last registered stops first)
    fn default() -> Self {
        Self {
            thread_prefix: "tb".to_string(),
            stack_size: 0,
            query_radix: "$".to_string(),
            poll_interval: Duration::from_secs(1),
            shutdown_order: ShutdownOrder::Reverse,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sentinels() {
        let mut cfg = Config::default();
        assert_eq!(cfg.stack_size(), None);
        assert_eq!(cfg.poll_interval(), Some(Duration::from_secs(1)));
        assert_eq!(cfg.thread_prefix(), Some("tb"));

        cfg.stack_size = 64 * 1024;
        cfg.poll_interval = Duration::ZERO;
        cfg.thread_prefix.clear();
        assert_eq!(cfg.stack_size(), Some(64 * 1024));
        assert_eq!(cfg.poll_interval(), None);
        assert_eq!(cfg.thread_prefix(), None);
    }
}

//! # Thread registry: directory of live workers.
//!
//! Every [`Worker`] created through a context announces itself here when it starts.
//! The registry serves two purposes:
//! - **Diagnostics**: [`ThreadRegistry::dump`] snapshots every worker with its state.
//! - **Ordered shutdown**: [`ThreadRegistry::workers`] hands out live workers in
//!   registration (or reverse) order so the context can terminate them one by one.
//!
//! ## Rules
//! - Registration is idempotent: registering the same worker twice keeps one entry
//!   and logs a warning.
//! - The registry never owns a worker (weak references only); running/terminated
//!   state is read from the worker itself, so it cannot go stale.
//! - Entries disappear when the last worker handle drops, on `unregister`, or on `prune`.

use std::fmt::Write as _;
use std::sync::Mutex;
use std::thread::ThreadId;

use tracing::{debug, warn};

use super::worker::{WeakWorker, Worker, WorkerId};
use crate::sync::lock;

/// Order in which [`ThreadRegistry::workers`] returns workers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShutdownOrder {
    /// Most recently registered first (LIFO).
    #[default]
    Reverse,
    /// Registration order (FIFO).
    Registration,
}

/// Observed state of a registered worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ThreadState {
    /// The run body is executing.
    Running,
    /// The run body returned (or the worker handle is gone).
    Terminated,
}

/// Diagnostic snapshot of one registry entry.
#[derive(Debug, Clone)]
pub struct ThreadInfo {
    /// Worker identity.
    pub id: WorkerId,
    /// Logical worker name.
    pub name: String,
    /// OS thread id the worker runs on.
    pub thread: ThreadId,
    /// State at snapshot time.
    pub state: ThreadState,
}

struct Entry {
    id: WorkerId,
    name: String,
    thread: ThreadId,
    worker: WeakWorker,
}

/// Process-wide directory of workers, passed around through the context.
#[derive(Default)]
pub struct ThreadRegistry {
    entries: Mutex<Vec<Entry>>,
}

impl ThreadRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Records `worker` running on `thread`.
    ///
    /// Returns `false` (and logs a warning) if the worker is already present.
    pub fn register(&self, worker: &Worker, thread: ThreadId) -> bool {
        let mut entries = lock(&self.entries);
        if entries.iter().any(|e| e.id == worker.id()) {
            drop(entries);
            warn!(worker = %worker.name(), id = %worker.id(), "worker already registered");
            return false;
        }
        entries.push(Entry {
            id: worker.id(),
            name: worker.name().to_string(),
            thread,
            worker: worker.downgrade(),
        });
        drop(entries);
        debug!(worker = %worker.name(), id = %worker.id(), "worker registered");
        true
    }

    /// Removes the entry for `id`. Returns `false` if there was none.
    pub fn unregister(&self, id: WorkerId) -> bool {
        let mut entries = lock(&self.entries);
        let before = entries.len();
        entries.retain(|e| e.id != id);
        before != entries.len()
    }

    /// Number of entries (running or terminated).
    pub fn len(&self) -> usize {
        lock(&self.entries).len()
    }

    /// Returns `true` if no worker is registered.
    pub fn is_empty(&self) -> bool {
        lock(&self.entries).is_empty()
    }

    /// Snapshot of all entries in registration order.
    pub fn dump(&self) -> Vec<ThreadInfo> {
        let snapshot: Vec<(WorkerId, String, ThreadId, Option<Worker>)> = lock(&self.entries)
            .iter()
            .map(|e| (e.id, e.name.clone(), e.thread, e.worker.upgrade()))
            .collect();

        // Upgraded handles are dropped outside the lock: dropping the last one
        // unregisters the worker, which takes the lock again.
        snapshot
            .into_iter()
            .map(|(id, name, thread, worker)| ThreadInfo {
                id,
                name,
                thread,
                state: match worker {
                    Some(w) if w.is_running() => ThreadState::Running,
                    _ => ThreadState::Terminated,
                },
            })
            .collect()
    }

    /// Renders [`dump`](Self::dump) as one line per worker.
    pub fn dump_text(&self) -> String {
        let mut out = String::new();
        for info in self.dump() {
            let state = match info.state {
                ThreadState::Running => "running",
                ThreadState::Terminated => "terminated",
            };
            let _ = writeln!(
                out,
                "{:<6} {:<24} {:<12} {:?}",
                info.id, info.name, state, info.thread
            );
        }
        out
    }

    /// Number of workers whose body is executing.
    pub fn running(&self) -> usize {
        self.dump()
            .iter()
            .filter(|i| i.state == ThreadState::Running)
            .count()
    }

    /// Live workers in the requested order.
    pub fn workers(&self, order: ShutdownOrder) -> Vec<Worker> {
        let mut workers: Vec<Worker> = {
            let entries = lock(&self.entries);
            entries.iter().filter_map(|e| e.worker.upgrade()).collect()
        };
        if order == ShutdownOrder::Reverse {
            workers.reverse();
        }
        workers
    }

    /// Drops entries whose worker has terminated or is gone. Returns how many.
    pub fn prune(&self) -> usize {
        let dead: Vec<WorkerId> = self
            .dump()
            .into_iter()
            .filter(|i| i.state == ThreadState::Terminated)
            .map(|i| i.id)
            .collect();
        let mut entries = lock(&self.entries);
        let before = entries.len();
        entries.retain(|e| !dead.contains(&e.id));
        before - entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    use crate::workers::WorkerOptions;

    fn parked(name: &str, registry: &Arc<ThreadRegistry>) -> Worker {
        Worker::with_options(
            name,
            WorkerOptions {
                registry: Some(registry.clone()),
                ..WorkerOptions::default()
            },
            |w: &Worker| {
                while !w.should_stop() {
                    w.suspend();
                }
            },
        )
    }

    #[test]
    fn test_register_twice_keeps_one_entry() {
        let registry = ThreadRegistry::new();
        let w = Worker::new("dup", |_: &Worker| {});
        let tid = thread::current().id();

        assert!(registry.register(&w, tid));
        assert!(!registry.register(&w, tid));
        assert_eq!(registry.len(), 1);

        assert!(registry.unregister(w.id()));
        assert!(!registry.unregister(w.id()));
        assert!(registry.is_empty());
    }

    #[test]
    fn test_start_registers_and_dump_reports_state() {
        let registry = Arc::new(ThreadRegistry::new());
        let w = parked("gps", &registry);
        w.start().unwrap();

        let dump = registry.dump();
        assert_eq!(dump.len(), 1);
        assert_eq!(dump[0].name, "gps");
        assert_eq!(dump[0].state, ThreadState::Running);
        assert_eq!(registry.running(), 1);

        w.terminate();
        assert_eq!(registry.dump()[0].state, ThreadState::Terminated);
        assert!(registry.dump_text().contains("terminated"));

        assert_eq!(registry.prune(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_dropping_last_handle_unregisters() {
        let registry = Arc::new(ThreadRegistry::new());
        let w = parked("odo", &registry);
        w.start().unwrap();
        assert_eq!(registry.len(), 1);

        w.terminate();
        drop(w);
        assert!(registry.is_empty());
    }

    #[test]
    fn test_workers_order() {
        let registry = Arc::new(ThreadRegistry::new());
        let a = parked("a", &registry);
        let b = parked("b", &registry);
        a.start().unwrap();
        b.start().unwrap();

        let names: Vec<String> = registry
            .workers(ShutdownOrder::Reverse)
            .iter()
            .map(|w| w.name().to_string())
            .collect();
        assert_eq!(names, vec!["b", "a"]);

        let names: Vec<String> = registry
            .workers(ShutdownOrder::Registration)
            .iter()
            .map(|w| w.name().to_string())
            .collect();
        assert_eq!(names, vec!["a", "b"]);

        a.terminate();
        b.terminate();
    }
}

//! # Worker: one OS thread with cooperative sleep and acknowledged termination.
//!
//! A [`Worker`] wraps a run body that executes on a dedicated OS thread. The body
//! receives the worker itself and uses it to sleep ([`Worker::suspend`],
//! [`Worker::poll_for`]) and to observe shutdown ([`Worker::should_stop`]).
//!
//! ## Lifecycle
//! ```text
//! Worker::new ──► Idle ──start()──► Running ──body returns──► Exited
//!                                      ▲                         │
//!                 terminate(): cancel ─┤                         │
//!                              signal ─┘  wait for Exited ◄──────┘, join
//! ```
//!
//! ## Rules
//! - `start()` is idempotent: a second call while running (or after exit) is a no-op.
//! - `signal()` is latched once: a signal sent before `suspend()` makes that suspend
//!   return immediately; several signals collapse into one.
//! - `terminate()` blocks until the body observed the stop flag and the thread exited.
//!   Called from the worker's own thread it only raises the flag.
//! - A panicking body is caught; the worker still reaches `Exited`.

use std::fmt;
use std::io;
use std::panic::{self, AssertUnwindSafe};
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, Condvar, Mutex, Weak};
use std::thread::{self, JoinHandle, ThreadId};
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use super::registry::ThreadRegistry;
use crate::sync::{lock, wait_timeout_while, wait_while};

static WORKER_SEQ: AtomicU64 = AtomicU64::new(1);

/// Process-unique identity of a worker, stable across clones of its handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct WorkerId(u64);

impl WorkerId {
    fn next() -> Self {
        Self(WORKER_SEQ.fetch_add(1, AtomicOrdering::Relaxed))
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "w{}", self.0)
    }
}

type Body = Box<dyn FnOnce(&Worker) + Send + 'static>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Lifecycle {
    Idle,
    Running,
    Exited,
}

/// Construction options for a [`Worker`].
///
/// `Context::worker` fills these from the context configuration; standalone
/// workers can use [`WorkerOptions::default`].
#[derive(Clone, Default)]
pub struct WorkerOptions {
    /// Prefix for the OS thread name (`"<prefix>-<name>"`).
    pub thread_prefix: Option<String>,
    /// Stack size in bytes (`0` = platform default).
    pub stack_size: usize,
    /// Parent token; the worker stops when it is cancelled.
    pub parent: Option<CancellationToken>,
    /// Registry the worker announces itself to when it starts.
    pub registry: Option<Arc<ThreadRegistry>>,
}

struct Inner {
    id: WorkerId,
    name: Arc<str>,
    thread_name: String,
    stack_size: usize,
    stop: CancellationToken,
    registry: Weak<ThreadRegistry>,

    signaled: Mutex<bool>,
    wake: Condvar,

    lifecycle: Mutex<Lifecycle>,
    exited: Condvar,

    body: Mutex<Option<Body>>,
    join: Mutex<Option<JoinHandle<()>>>,
    thread: Mutex<Option<ThreadId>>,
}

impl Drop for Inner {
    fn drop(&mut self) {
        if let Some(registry) = self.registry.upgrade() {
            registry.unregister(self.id);
        }
    }
}

/// Cloneable handle to a cooperative-sleep OS thread.
#[derive(Clone)]
pub struct Worker {
    inner: Arc<Inner>,
}

impl fmt::Debug for Worker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Worker")
            .field("id", &self.inner.id)
            .field("name", &self.inner.name)
            .field("running", &self.is_running())
            .finish()
    }
}

impl Worker {
    /// Creates a standalone worker (no registry, own cancellation token).
    pub fn new<F>(name: impl Into<String>, body: F) -> Self
    where
        F: FnOnce(&Worker) + Send + 'static,
    {
        Self::with_options(name, WorkerOptions::default(), body)
    }

    /// Creates a worker with explicit options. The thread is not started yet.
    pub fn with_options<F>(name: impl Into<String>, opts: WorkerOptions, body: F) -> Self
    where
        F: FnOnce(&Worker) + Send + 'static,
    {
        let name: String = name.into();
        let thread_name = match &opts.thread_prefix {
            Some(prefix) if !prefix.is_empty() => format!("{prefix}-{name}"),
            _ => name.clone(),
        };
        let stop = match &opts.parent {
            Some(parent) => parent.child_token(),
            None => CancellationToken::new(),
        };

        Self {
            inner: Arc::new(Inner {
                id: WorkerId::next(),
                name: name.into(),
                thread_name,
                stack_size: opts.stack_size,
                stop,
                registry: opts.registry.as_ref().map(Arc::downgrade).unwrap_or_default(),
                signaled: Mutex::new(false),
                wake: Condvar::new(),
                lifecycle: Mutex::new(Lifecycle::Idle),
                exited: Condvar::new(),
                body: Mutex::new(Some(Box::new(body))),
                join: Mutex::new(None),
                thread: Mutex::new(None),
            }),
        }
    }

    /// Returns the worker identity.
    pub fn id(&self) -> WorkerId {
        self.inner.id
    }

    /// Returns the logical worker name.
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns `true` between a successful `start()` and the body's return.
    pub fn is_running(&self) -> bool {
        *lock(&self.inner.lifecycle) == Lifecycle::Running
    }

    /// Returns `true` once the body has returned.
    pub fn has_exited(&self) -> bool {
        *lock(&self.inner.lifecycle) == Lifecycle::Exited
    }

    /// Returns `true` once termination was requested (directly or by a parent token).
    pub fn should_stop(&self) -> bool {
        self.inner.stop.is_cancelled()
    }

    /// Launches the body on a new OS thread.
    ///
    /// No-op if the worker is already running or has exited. On spawn failure the
    /// worker stays idle and the body is kept, so `start()` may be retried.
    pub fn start(&self) -> io::Result<()> {
        let mut state = lock(&self.inner.lifecycle);
        if *state != Lifecycle::Idle {
            debug!(worker = %self.inner.name, "start ignored; worker already started");
            return Ok(());
        }

        let mut builder = thread::Builder::new().name(self.inner.thread_name.clone());
        if self.inner.stack_size > 0 {
            builder = builder.stack_size(self.inner.stack_size);
        }

        let me = self.clone();
        let handle = builder.spawn(move || me.run())?;
        *state = Lifecycle::Running;
        drop(state);

        if let Some(registry) = self.inner.registry.upgrade() {
            registry.register(self, handle.thread().id());
        }
        *lock(&self.inner.join) = Some(handle);

        debug!(worker = %self.inner.name, id = %self.inner.id, "worker started");
        Ok(())
    }

    fn run(self) {
        *lock(&self.inner.thread) = Some(thread::current().id());
        let body = lock(&self.inner.body).take();
        if let Some(body) = body {
            if let Err(panic_err) = panic::catch_unwind(AssertUnwindSafe(|| body(&self))) {
                let info = if let Some(msg) = panic_err.downcast_ref::<&'static str>() {
                    (*msg).to_string()
                } else if let Some(msg) = panic_err.downcast_ref::<String>() {
                    msg.clone()
                } else {
                    "unknown panic".to_string()
                };
                warn!(worker = %self.inner.name, panic = %info, "worker body panicked");
            }
        }

        *lock(&self.inner.lifecycle) = Lifecycle::Exited;
        self.inner.exited.notify_all();
        debug!(worker = %self.inner.name, id = %self.inner.id, "worker exited");
    }

    /// Blocks the calling thread until [`signal`](Self::signal) is called or
    /// termination is requested.
    pub fn suspend(&self) {
        let stop = &self.inner.stop;
        let mut signaled = wait_while(&self.inner.wake, lock(&self.inner.signaled), |s| {
            !*s && !stop.is_cancelled()
        });
        *signaled = false;
    }

    /// Blocks until signaled or until `timeout` elapses, whichever comes first.
    ///
    /// Returns `true` if the wait ended because of a signal (or a stop request).
    pub fn poll_for(&self, timeout: Duration) -> bool {
        let stop = &self.inner.stop;
        let (mut signaled, timed_out) = wait_timeout_while(
            &self.inner.wake,
            lock(&self.inner.signaled),
            timeout,
            |s| !*s && !stop.is_cancelled(),
        );
        let woke = *signaled;
        *signaled = false;
        woke || (!timed_out && stop.is_cancelled())
    }

    /// Wakes one waiter. Without a waiter the signal is latched for the next wait.
    pub fn signal(&self) {
        *lock(&self.inner.signaled) = true;
        self.inner.wake.notify_one();
    }

    /// Requests termination and blocks until the thread has exited.
    ///
    /// Safe to call from any thread and more than once. From the worker's own
    /// thread it only raises the stop flag.
    pub fn terminate(&self) {
        self.inner.stop.cancel();
        // Take the signal lock so a waiter between its predicate check and its
        // wait cannot miss the cancellation.
        drop(lock(&self.inner.signaled));
        self.inner.wake.notify_all();

        if *lock(&self.inner.thread) == Some(thread::current().id()) {
            debug!(worker = %self.inner.name, "terminate from own thread; not joining");
            return;
        }

        let state = wait_while(&self.inner.exited, lock(&self.inner.lifecycle), |s| {
            *s == Lifecycle::Running
        });
        drop(state);

        let handle = lock(&self.inner.join).take();
        if let Some(handle) = handle {
            if handle.join().is_err() {
                warn!(worker = %self.inner.name, "worker thread ended abnormally");
            }
        }
    }

    pub(crate) fn downgrade(&self) -> WeakWorker {
        WeakWorker(Arc::downgrade(&self.inner))
    }
}

/// Non-owning reference used by the thread registry.
#[derive(Clone)]
pub(crate) struct WeakWorker(Weak<Inner>);

impl WeakWorker {
    pub(crate) fn upgrade(&self) -> Option<Worker> {
        self.0.upgrade().map(|inner| Worker { inner })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::time::Instant;

    #[test]
    fn test_start_is_idempotent() {
        let runs = Arc::new(AtomicUsize::new(0));
        let r = runs.clone();
        let w = Worker::new("idem", move |w: &Worker| {
            r.fetch_add(1, AtomicOrdering::SeqCst);
            while !w.should_stop() {
                w.suspend();
            }
        });

        w.start().unwrap();
        w.start().unwrap();
        assert!(w.is_running());

        w.terminate();
        assert!(w.has_exited());
        assert_eq!(runs.load(AtomicOrdering::SeqCst), 1);

        w.start().unwrap();
        assert_eq!(runs.load(AtomicOrdering::SeqCst), 1);
    }

    #[test]
    fn test_signal_wakes_suspended_worker() {
        let wakes = Arc::new(AtomicUsize::new(0));
        let c = wakes.clone();
        let w = Worker::new("sleeper", move |w: &Worker| {
            loop {
                w.suspend();
                if w.should_stop() {
                    break;
                }
                c.fetch_add(1, AtomicOrdering::SeqCst);
            }
        });
        w.start().unwrap();

        w.signal();
        let deadline = Instant::now() + Duration::from_secs(5);
        while wakes.load(AtomicOrdering::SeqCst) == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(wakes.load(AtomicOrdering::SeqCst), 1);

        w.terminate();
        assert!(!w.is_running());
    }

    #[test]
    fn test_latched_signal_collapses() {
        let w = Worker::new("latched", |_: &Worker| {});
        w.signal();
        w.signal();
        assert!(w.poll_for(Duration::from_millis(10)));
        assert!(!w.poll_for(Duration::from_millis(10)));
    }

    #[test]
    fn test_poll_for_times_out() {
        let w = Worker::new("poll", |_: &Worker| {});
        let started = Instant::now();
        assert!(!w.poll_for(Duration::from_millis(30)));
        assert!(started.elapsed() >= Duration::from_millis(30));
    }

    #[test]
    fn test_terminate_never_started() {
        let w = Worker::new("idle", |_: &Worker| {});
        w.terminate();
        assert!(w.should_stop());
        assert!(!w.is_running());
    }

    #[test]
    fn test_panicking_body_still_exits() {
        let w = Worker::new("boom", |_: &Worker| panic!("boom"));
        w.start().unwrap();
        w.terminate();
        assert!(w.has_exited());
    }

    #[test]
    fn test_parent_token_stops_worker() {
        let parent = CancellationToken::new();
        let seen = Arc::new(AtomicBool::new(false));
        let s = seen.clone();
        let w = Worker::with_options(
            "child",
            WorkerOptions {
                parent: Some(parent.clone()),
                ..WorkerOptions::default()
            },
            move |w: &Worker| {
                while !w.should_stop() {
                    w.poll_for(Duration::from_millis(5));
                }
                s.store(true, AtomicOrdering::SeqCst);
            },
        );
        w.start().unwrap();
        parent.cancel();
        w.terminate();
        assert!(seen.load(AtomicOrdering::SeqCst));
    }

    #[test]
    fn test_terminate_from_own_thread_does_not_deadlock() {
        let w = Worker::new("self-stop", |w: &Worker| {
            w.terminate();
            assert!(w.should_stop());
        });
        w.start().unwrap();
        w.terminate();
        assert!(w.has_exited());
    }
}

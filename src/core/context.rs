//! # Context: the process-wide registries and their shutdown.
//!
//! A [`Context`] replaces the global singletons an embedded controller would otherwise
//! reach for. It owns the device, query and thread registries, the configuration, and a
//! root [`CancellationToken`] every worker it creates is a child of.
//!
//! ## Architecture
//! ```text
//! ContextBuilder::new(cfg).build()
//!        │
//!        ▼
//! Context ─┬─ DeviceRegistry   (class, id) → Weak<dyn Device>
//!          ├─ QueryRegistry    name → (owner, descriptor)
//!          ├─ ThreadRegistry   live workers
//!          └─ root token ──► child token per worker / generator
//!
//! shutdown():
//!   root.cancel()            → every worker sees should_stop()
//!   threads.workers(order)   → terminate() each (blocking join)
//! ```
//!
//! ## Rules
//! - `shutdown()` is idempotent; the second call stops nothing and returns `0`.
//! - Workers created after shutdown start already cancelled: their body sees
//!   `should_stop()` immediately.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering as AtomicOrdering};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::builder::ContextBuilder;
use super::config::Config;
use crate::bus::{Generator, GeneratorContext};
use crate::device::DeviceRegistry;
use crate::query::{QueryRegistry, Querible, QueryResponse};
use crate::workers::{ThreadRegistry, Worker, WorkerOptions};

/// Shared state of one controller process.
pub struct Context {
    cfg: Config,
    devices: Arc<DeviceRegistry>,
    queries: Arc<QueryRegistry>,
    threads: Arc<ThreadRegistry>,
    root: CancellationToken,
    stopped: AtomicBool,
}

impl Context {
    /// Returns a builder for a context with configuration `cfg`.
    pub fn builder(cfg: Config) -> ContextBuilder {
        ContextBuilder::new(cfg)
    }

    pub(super) fn new_internal(
        cfg: Config,
        devices: Arc<DeviceRegistry>,
        queries: Arc<QueryRegistry>,
        threads: Arc<ThreadRegistry>,
    ) -> Self {
        Self {
            cfg,
            devices,
            queries,
            threads,
            root: CancellationToken::new(),
            stopped: AtomicBool::new(false),
        }
    }

    /// Configuration the context was built with.
    pub fn config(&self) -> &Config {
        &self.cfg
    }

    /// Device directory.
    pub fn devices(&self) -> &Arc<DeviceRegistry> {
        &self.devices
    }

    /// Attribute directory.
    pub fn queries(&self) -> &Arc<QueryRegistry> {
        &self.queries
    }

    /// Live workers.
    pub fn threads(&self) -> &Arc<ThreadRegistry> {
        &self.threads
    }

    /// A child of the root token, cancelled on [`shutdown`](Self::shutdown).
    pub fn token(&self) -> CancellationToken {
        self.root.child_token()
    }

    /// Returns `true` once [`shutdown`](Self::shutdown) was called.
    pub fn is_shutting_down(&self) -> bool {
        self.root.is_cancelled()
    }

    /// Options for workers owned by this context.
    pub fn worker_options(&self) -> WorkerOptions {
        WorkerOptions {
            thread_prefix: self.cfg.thread_prefix().map(str::to_string),
            stack_size: self.cfg.stack_size().unwrap_or(0),
            parent: Some(self.root.clone()),
            registry: Some(Arc::clone(&self.threads)),
        }
    }

    /// Creates a worker registered in this context. Call [`Worker::start`] to run it.
    pub fn worker<F>(&self, name: impl Into<String>, body: F) -> Worker
    where
        F: FnOnce(&Worker) + Send + 'static,
    {
        Worker::with_options(name, self.worker_options(), body)
    }

    /// Creates an unbound generator whose worker is registered in this context.
    ///
    /// Its production period is [`Config::poll_interval`].
    pub fn generator<D, F>(&self, name: impl Into<String>, body: F) -> Generator<D>
    where
        D: ?Sized + Send + Sync + 'static,
        F: FnOnce(&GeneratorContext<D>) + Send + 'static,
    {
        let period = self.cfg.poll_interval();
        Generator::with_period(name, self.worker_options(), period, body)
    }

    /// Runs one attribute protocol line using the configured radix.
    pub fn execute(&self, line: &str) -> QueryResponse {
        self.queries.execute(line, &self.cfg.query_radix)
    }

    /// Attribute listing (all owners or one) using the configured radix.
    pub fn list_queries(&self, owner: Option<&Arc<dyn Querible>>) -> String {
        self.queries.list(owner, &self.cfg.query_radix)
    }

    /// Cancels every worker and waits for each to exit, in the configured order.
    ///
    /// Returns the number of workers terminated by this call.
    pub fn shutdown(&self) -> usize {
        if self.stopped.swap(true, AtomicOrdering::AcqRel) {
            debug!("shutdown already done");
            return 0;
        }
        self.root.cancel();

        let workers = self.threads.workers(self.cfg.shutdown_order);
        let n = workers.len();
        for w in workers {
            debug!(worker = w.name(), id = %w.id(), "terminating worker");
            w.terminate();
        }
        info!(workers = n, "context shut down");
        n
    }
}

impl Drop for Context {
    fn drop(&mut self) {
        self.shutdown();
    }
}

use std::sync::Arc;

use super::config::Config;
use super::context::Context;
use crate::device::DeviceRegistry;
use crate::query::QueryRegistry;
use crate::workers::ThreadRegistry;

/// Builder for a [`Context`], optionally sharing registries with another component.
pub struct ContextBuilder {
    cfg: Config,
    devices: Option<Arc<DeviceRegistry>>,
    queries: Option<Arc<QueryRegistry>>,
    threads: Option<Arc<ThreadRegistry>>,
}

impl ContextBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: Config) -> Self {
        Self {
            cfg,
            devices: None,
            queries: None,
            threads: None,
        }
    }

    /// Uses an existing device registry instead of a fresh one.
    pub fn with_devices(mut self, devices: Arc<DeviceRegistry>) -> Self {
        self.devices = Some(devices);
        self
    }

    /// Uses an existing query registry instead of a fresh one.
    pub fn with_queries(mut self, queries: Arc<QueryRegistry>) -> Self {
        self.queries = Some(queries);
        self
    }

    /// Uses an existing thread registry instead of a fresh one.
    pub fn with_threads(mut self, threads: Arc<ThreadRegistry>) -> Self {
        self.threads = Some(threads);
        self
    }

    /// Builds the context. Registries not supplied are created empty.
    pub fn build(self) -> Arc<Context> {
        Arc::new(Context::new_internal(
            self.cfg,
            self.devices.unwrap_or_default(),
            self.queries.unwrap_or_default(),
            self.threads.unwrap_or_default(),
        ))
    }
}

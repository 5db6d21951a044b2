//! # Device registry: `(class, id)` → device directory.
//!
//! Devices register themselves when they are built so unrelated components can find
//! them (a command generator fetching the shared time source, a console resolving a
//! terminal by id).
//!
//! ## Architecture
//! ```text
//! DeviceRegistry
//!   └─ Mutex<BTreeMap<DeviceClass, Vec<Entry>>>
//!                      │             └─ (id, Weak<dyn Device>) in insertion order
//!                      └─ ordered by class (deterministic dumps)
//! ```
//!
//! ## Rules
//! - At most one entry per `(class, id)`; `override` replaces the prior entry in place,
//!   inside the same critical section as the collision check.
//! - The registry never owns a device. Entries whose device has been dropped are
//!   invisible to lookups and pruned on the next mutation of their bucket.
//! - [`Registration`] unregisters every name it holds when dropped, so a device that
//!   keeps its guard cannot outlive its entries nor leave them behind.

use std::any::Any;
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::sync::{Arc, Mutex, Weak};

use tracing::{debug, info};

use super::device::{Device, DeviceClass};
use crate::error::RegistryError;
use crate::sync::lock;

struct Entry {
    id: String,
    device: Weak<dyn Device>,
}

impl Entry {
    fn is_alive(&self) -> bool {
        self.device.strong_count() > 0
    }

    fn is(&self, device: &Arc<dyn Device>) -> bool {
        std::ptr::addr_eq(self.device.as_ptr(), Arc::as_ptr(device))
    }
}

/// Process-wide directory of devices, passed around through the context.
#[derive(Default)]
pub struct DeviceRegistry {
    buckets: Mutex<BTreeMap<DeviceClass, Vec<Entry>>>,
}

impl DeviceRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `device` under `(class, id)`.
    ///
    /// ### Errors
    /// [`RegistryError::Duplicate`] if a live entry with the same key exists and
    /// `override_existing` is `false`. With `override_existing` the prior entry is
    /// replaced and the bucket keeps one entry for that id.
    pub fn register(
        &self,
        device: &Arc<dyn Device>,
        class: DeviceClass,
        id: &str,
        override_existing: bool,
    ) -> Result<(), RegistryError> {
        let mut buckets = lock(&self.buckets);
        let bucket = buckets.entry(class).or_default();
        bucket.retain(Entry::is_alive);

        match bucket.iter_mut().find(|e| e.id == id) {
            Some(_) if !override_existing => {
                return Err(RegistryError::Duplicate {
                    class,
                    id: id.to_string(),
                });
            }
            Some(entry) => {
                entry.device = Arc::downgrade(device);
                drop(buckets);
                info!(%class, id, name = device.name(), "device entry overridden");
                return Ok(());
            }
            None => bucket.push(Entry {
                id: id.to_string(),
                device: Arc::downgrade(device),
            }),
        }
        drop(buckets);
        debug!(%class, id, name = device.name(), "device registered");
        Ok(())
    }

    /// Removes the entry matching `(class, id)` **and** pointing at `device`.
    ///
    /// ### Errors
    /// [`RegistryError::NotFound`] if no entry matches all three.
    pub fn unregister(
        &self,
        device: &Arc<dyn Device>,
        class: DeviceClass,
        id: &str,
    ) -> Result<(), RegistryError> {
        let mut buckets = lock(&self.buckets);
        let removed = match buckets.get_mut(&class) {
            Some(bucket) => {
                let before = bucket.len();
                bucket.retain(|e| !(e.id == id && e.is(device)));
                let removed = before != bucket.len();
                bucket.retain(Entry::is_alive);
                if bucket.is_empty() {
                    buckets.remove(&class);
                }
                removed
            }
            None => false,
        };
        drop(buckets);

        if removed {
            debug!(%class, id, "device unregistered");
            Ok(())
        } else {
            Err(RegistryError::NotFound {
                class,
                id: id.to_string(),
            })
        }
    }

    /// Removes a `(class, id)` entry whose device is already gone.
    fn forget(&self, class: DeviceClass, id: &str) {
        let mut buckets = lock(&self.buckets);
        if let Some(bucket) = buckets.get_mut(&class) {
            bucket.retain(|e| e.id != id || e.is_alive());
            if bucket.is_empty() {
                buckets.remove(&class);
            }
        }
    }

    /// Returns the device registered under `(class, id)`.
    pub fn lookup(&self, class: DeviceClass, id: &str) -> Option<Arc<dyn Device>> {
        let buckets = lock(&self.buckets);
        buckets
            .get(&class)?
            .iter()
            .filter(|e| e.id == id)
            .find_map(|e| e.device.upgrade())
    }

    /// Returns the first live device of `class`.
    ///
    /// Which one is unspecified when several are registered; callers that need a
    /// specific instance must use [`lookup`](Self::lookup).
    pub fn lookup_first(&self, class: DeviceClass) -> Option<Arc<dyn Device>> {
        let buckets = lock(&self.buckets);
        buckets.get(&class)?.iter().find_map(|e| e.device.upgrade())
    }

    /// Typed lookup: resolves `(class, id)` and downcasts to `T`.
    ///
    /// `None` if the entry is missing or the device is not a `T`.
    pub fn lookup_as<T: Device>(&self, class: DeviceClass, id: &str) -> Option<Arc<T>> {
        let device: Arc<dyn Any + Send + Sync> = self.lookup(class, id)?;
        device.downcast::<T>().ok()
    }

    /// Number of live entries registered under `class`.
    pub fn len(&self, class: DeviceClass) -> usize {
        lock(&self.buckets)
            .get(&class)
            .map(|b| b.iter().filter(|e| e.is_alive()).count())
            .unwrap_or(0)
    }

    /// Returns `true` if no live entry exists in any class.
    pub fn is_empty(&self) -> bool {
        lock(&self.buckets)
            .values()
            .all(|b| b.iter().all(|e| !e.is_alive()))
    }

    /// Deterministic listing: classes in [`DeviceClass`] order, entries in
    /// registration order, one `class:id name` line each.
    pub fn dump(&self, class: Option<DeviceClass>) -> String {
        let rows: Vec<(DeviceClass, String, Option<Arc<dyn Device>>)> = {
            let buckets = lock(&self.buckets);
            buckets
                .iter()
                .filter(|(c, _)| class.is_none_or(|wanted| wanted == **c))
                .flat_map(|(c, bucket)| {
                    bucket
                        .iter()
                        .map(move |e| (*c, e.id.clone(), e.device.upgrade()))
                })
                .collect()
        };

        let mut out = String::new();
        let mut total = 0usize;
        for (class, id, device) in rows {
            if let Some(device) = device {
                let _ = writeln!(out, "{class}:{id} {}", device.name());
                total += 1;
            }
        }
        let _ = writeln!(out, "Total: {total}");
        out
    }

    /// Registers `device` under its own `(class, id)` and returns a guard that
    /// unregisters it (and every interface added to the guard) on drop.
    pub fn attach(
        self: &Arc<Self>,
        device: &Arc<dyn Device>,
        override_existing: bool,
    ) -> Result<Registration, RegistryError> {
        let class = device.class();
        self.register(device, class, device.id(), override_existing)?;
        Ok(Registration {
            registry: Arc::downgrade(self),
            device: Arc::downgrade(device),
            keys: vec![(class, device.id().to_string())],
        })
    }
}

/// RAII guard for a device's registry entries.
///
/// Keep it inside (or next to) the device; dropping it removes the primary entry and
/// every interface alias.
pub struct Registration {
    registry: Weak<DeviceRegistry>,
    device: Weak<dyn Device>,
    keys: Vec<(DeviceClass, String)>,
}

impl Registration {
    /// Registers the device under an additional `(class, id)` alias.
    pub fn add_interface(
        &mut self,
        class: DeviceClass,
        id: &str,
        override_existing: bool,
    ) -> Result<(), RegistryError> {
        let (Some(registry), Some(device)) = (self.registry.upgrade(), self.device.upgrade())
        else {
            return Err(RegistryError::NotFound {
                class,
                id: id.to_string(),
            });
        };
        registry.register(&device, class, id, override_existing)?;
        self.keys.push((class, id.to_string()));
        Ok(())
    }

    /// Keys held by this guard, primary first.
    pub fn keys(&self) -> &[(DeviceClass, String)] {
        &self.keys
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        let Some(registry) = self.registry.upgrade() else {
            return;
        };
        match self.device.upgrade() {
            Some(device) => {
                for (class, id) in &self.keys {
                    // Fails for entries an override replaced.
                    let _ = registry.unregister(&device, *class, id);
                }
            }
            None => {
                for (class, id) in &self.keys {
                    registry.forget(*class, id);
                }
            }
        }
    }
}

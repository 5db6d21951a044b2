//! Device directory.
//!
//! - [`Device`], [`DeviceClass`]: identity of a unit of functionality.
//! - [`DeviceRegistry`]: `(class, id)` → device lookups, race-free under concurrent
//!   registration.
//! - [`Registration`]: RAII guard tying registry entries to a device's lifetime.

#[allow(clippy::module_inception)]
mod device;
mod registry;

pub use device::{Device, DeviceClass};
pub use registry::{DeviceRegistry, Registration};

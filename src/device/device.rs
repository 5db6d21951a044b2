//! # Device abstraction.
//!
//! A device is a named, typed unit of functionality: a [`DeviceClass`], a string
//! instance id and a display name. Concrete devices usually combine several roles
//! (event generator, command handler, attribute owner); they do so by holding one
//! instance of each capability and implementing the matching traits, not by layering
//! base types.

use std::any::Any;
use std::fmt;

/// Family a device belongs to. The ordering is stable and drives registry dumps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DeviceClass {
    /// Shared wall-clock / GPS-disciplined time source.
    TimeSource,
    /// Satellite positioning receiver.
    Gps,
    /// Cellular modem.
    Gprs,
    /// Distance / speed pulse counter.
    Odometer,
    /// Digital input/output lines.
    Signal,
    /// Fuel-dispenser terminal.
    FuelTerminal,
    /// Local persistent logger.
    Logger,
    /// Uplink proxy towards the back office.
    Proxy,
    /// In-cabin console.
    Console,
    /// Anything else; distinguished by instance id only.
    Generic,
}

impl DeviceClass {
    /// Every class in dump order.
    pub const ALL: [DeviceClass; 10] = [
        DeviceClass::TimeSource,
        DeviceClass::Gps,
        DeviceClass::Gprs,
        DeviceClass::Odometer,
        DeviceClass::Signal,
        DeviceClass::FuelTerminal,
        DeviceClass::Logger,
        DeviceClass::Proxy,
        DeviceClass::Console,
        DeviceClass::Generic,
    ];

    /// Short stable label used in dumps, logs and audit records.
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceClass::TimeSource => "time",
            DeviceClass::Gps => "gps",
            DeviceClass::Gprs => "gprs",
            DeviceClass::Odometer => "odometer",
            DeviceClass::Signal => "signal",
            DeviceClass::FuelTerminal => "fuel",
            DeviceClass::Logger => "logger",
            DeviceClass::Proxy => "proxy",
            DeviceClass::Console => "console",
            DeviceClass::Generic => "generic",
        }
    }
}

impl fmt::Display for DeviceClass {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A registered unit of functionality.
///
/// # Example
/// ```
/// use telebus::{Device, DeviceClass};
///
/// struct Clock;
///
/// impl Device for Clock {
///     fn class(&self) -> DeviceClass { DeviceClass::TimeSource }
///     fn id(&self) -> &str { "0" }
///     fn name(&self) -> &str { "rtc" }
/// }
/// ```
pub trait Device: Any + Send + Sync {
    /// Device family.
    fn class(&self) -> DeviceClass;

    /// Instance id, unique within the class.
    fn id(&self) -> &str;

    /// Human-readable display name.
    fn name(&self) -> &str;
}

//! # Commands: typed, named-parameter payloads.
//!
//! A [`Command`] is a mutable bag of string parameters plus routing metadata
//! (type tag, target device class and id, origin, priority). Parameters keep their
//! insertion order; replacing a value keeps the parameter's position.
//!
//! ## Audit serialization
//! [`Command::to_audit`] renders the structure consumed verbatim by the file-based audit
//! sink. Tag and attribute names and their order are stable:
//! ```text
//! <command type="12" class="fuel" id="T1" origin="console" priority="0"><param name="volume">40</param></command>
//! ```
//! Values are XML-escaped (`& < > " '`); there is no whitespace between tags.
//!
//! ## Example
//! ```
//! use telebus::{Command, CommandType, DeviceClass};
//!
//! let mut cmd = Command::new(CommandType(12), DeviceClass::FuelTerminal, "T1");
//! cmd.set("volume", "40")?;
//! cmd.set("volume", "45")?;
//! assert_eq!(cmd.get("volume"), Some("45"));
//! assert!(cmd.has("volume"));
//! # Ok::<(), telebus::BusError>(())
//! ```

use std::fmt::{self, Write as _};

use crate::device::DeviceClass;
use crate::error::BusError;

/// Numeric command type tag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CommandType(pub u16);

impl fmt::Display for CommandType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Inclusive range of command types a handler serves.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandRange {
    /// First accepted type.
    pub first: CommandType,
    /// Last accepted type (inclusive).
    pub last: CommandType,
}

impl CommandRange {
    /// Every command type.
    pub const ALL: CommandRange = CommandRange {
        first: CommandType(0),
        last: CommandType(u16::MAX),
    };

    /// Creates `first..=last`.
    pub const fn new(first: CommandType, last: CommandType) -> Self {
        Self { first, last }
    }

    /// Returns `true` if `t` lies in the range.
    #[inline]
    pub fn contains(&self, t: CommandType) -> bool {
        self.first <= t && t <= self.last
    }
}

impl fmt::Display for CommandRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..={}", self.first, self.last)
    }
}

fn try_string(s: &str) -> Result<String, BusError> {
    let mut out = String::new();
    out.try_reserve_exact(s.len())
        .map_err(|_| BusError::OutOfMemory)?;
    out.push_str(s);
    Ok(out)
}

/// Routed command with ordered string parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    command_type: CommandType,
    class: DeviceClass,
    device_id: String,
    origin: String,
    priority: i32,
    params: Vec<(String, String)>,
}

impl Command {
    /// Creates a command for device `(class, device_id)` with no parameters,
    /// empty origin and priority `0`.
    pub fn new(
        command_type: CommandType,
        class: DeviceClass,
        device_id: impl Into<String>,
    ) -> Self {
        Self {
            command_type,
            class,
            device_id: device_id.into(),
            origin: String::new(),
            priority: 0,
            params: Vec::new(),
        }
    }

    /// Sets the originating component name.
    #[inline]
    pub fn with_origin(mut self, origin: impl Into<String>) -> Self {
        self.origin = origin.into();
        self
    }

    /// Sets the priority.
    #[inline]
    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// Appends (or replaces) every `(name, value)` pair in order.
    pub fn with_params<'a, I>(mut self, params: I) -> Result<Self, BusError>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (name, value) in params {
            self.set(name, value)?;
        }
        Ok(self)
    }

    /// Command type tag.
    pub fn command_type(&self) -> CommandType {
        self.command_type
    }

    /// Target device class.
    pub fn class(&self) -> DeviceClass {
        self.class
    }

    /// Target device id.
    pub fn device_id(&self) -> &str {
        &self.device_id
    }

    /// Originating component.
    pub fn origin(&self) -> &str {
        &self.origin
    }

    /// Priority (higher is more urgent).
    pub fn priority(&self) -> i32 {
        self.priority
    }

    /// Value of parameter `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// Sets parameter `name`. An existing parameter keeps its position.
    ///
    /// ### Errors
    /// [`BusError::OutOfMemory`] if the parameter storage cannot grow; the command is
    /// left unchanged.
    pub fn set(&mut self, name: &str, value: &str) -> Result<(), BusError> {
        let value = try_string(value)?;
        if let Some((_, v)) = self.params.iter_mut().find(|(n, _)| n == name) {
            *v = value;
            return Ok(());
        }
        let name = try_string(name)?;
        self.params
            .try_reserve(1)
            .map_err(|_| BusError::OutOfMemory)?;
        self.params.push((name, value));
        Ok(())
    }

    /// Returns `true` if parameter `name` is present.
    pub fn has(&self, name: &str) -> bool {
        self.params.iter().any(|(n, _)| n == name)
    }

    /// Removes parameter `name`, returning its value.
    pub fn remove(&mut self, name: &str) -> Option<String> {
        let pos = self.params.iter().position(|(n, _)| n == name)?;
        Some(self.params.remove(pos).1)
    }

    /// Parameters in insertion order.
    pub fn params(&self) -> impl Iterator<Item = (&str, &str)> {
        self.params.iter().map(|(n, v)| (n.as_str(), v.as_str()))
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    /// Returns `true` if the command has no parameter.
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Writes the audit serialization into `out`.
    pub fn write_audit<W: fmt::Write>(&self, out: &mut W) -> fmt::Result {
        write!(
            out,
            "<command type=\"{}\" class=\"{}\" id=\"{}\" origin=\"{}\" priority=\"{}\">",
            self.command_type,
            self.class,
            Escaped(&self.device_id),
            Escaped(&self.origin),
            self.priority
        )?;
        for (name, value) in &self.params {
            write!(
                out,
                "<param name=\"{}\">{}</param>",
                Escaped(name),
                Escaped(value)
            )?;
        }
        out.write_str("</command>")
    }

    /// Audit serialization as a string.
    pub fn to_audit(&self) -> String {
        let mut out = String::new();
        let _ = self.write_audit(&mut out);
        out
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "cmd#{} -> {}:{} from {:?} prio={} params={}",
            self.command_type,
            self.class,
            self.device_id,
            self.origin,
            self.priority,
            self.params.len()
        )
    }
}

struct Escaped<'a>(&'a str);

impl fmt::Display for Escaped<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for c in self.0.chars() {
            match c {
                '&' => f.write_str("&amp;")?,
                '<' => f.write_str("&lt;")?,
                '>' => f.write_str("&gt;")?,
                '"' => f.write_str("&quot;")?,
                '\'' => f.write_str("&apos;")?,
                c => f.write_char(c)?,
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_set_replaces_in_place() {
        let mut cmd = Command::new(CommandType(1), DeviceClass::Gprs, "0");
        cmd.set("apn", "internet").unwrap();
        cmd.set("user", "x").unwrap();
        cmd.set("apn", "m2m").unwrap();

        let names: Vec<&str> = cmd.params().map(|(n, _)| n).collect();
        assert_eq!(names, vec!["apn", "user"]);
        assert_eq!(cmd.get("apn"), Some("m2m"));
        assert_eq!(cmd.len(), 2);
    }

    #[test]
    fn test_remove_and_has() {
        let mut cmd = Command::new(CommandType(1), DeviceClass::Gprs, "0")
            .with_params([("a", "1"), ("b", "2")])
            .unwrap();
        assert_eq!(cmd.remove("a"), Some("1".to_string()));
        assert!(!cmd.has("a"));
        assert!(cmd.has("b"));
        assert_eq!(cmd.remove("a"), None);
    }

    #[test]
    fn test_audit_structure_is_stable() {
        let cmd = Command::new(CommandType(12), DeviceClass::FuelTerminal, "T1")
            .with_origin("console")
            .with_priority(3)
            .with_params([("volume", "40"), ("grade", "A<B & \"C\"")])
            .unwrap();

        assert_eq!(
            cmd.to_audit(),
            "<command type=\"12\" class=\"fuel\" id=\"T1\" origin=\"console\" priority=\"3\">\
             <param name=\"volume\">40</param>\
             <param name=\"grade\">A&lt;B &amp; &quot;C&quot;</param>\
             </command>"
        );
    }

    #[test]
    fn test_range_contains() {
        let r = CommandRange::new(CommandType(10), CommandType(19));
        assert!(r.contains(CommandType(10)));
        assert!(r.contains(CommandType(19)));
        assert!(!r.contains(CommandType(20)));
        assert!(CommandRange::ALL.contains(CommandType(u16::MAX)));
        assert_eq!(r.to_string(), "10..=19");
    }
}

//! # Attribute descriptors and the capability side of the attribute RPC.
//!
//! A capability ([`Querible`]) exports named attributes. Each attribute is described
//! by a [`QueryDescriptor`] and bound to a handler function. Capabilities build their
//! table once per type with [`QueryTable`] and register it in a loop; the table also
//! performs the access-direction checks, so a read on a write-only attribute is
//! rejected by the capability, never by the registry.
//!
//! ## Example
//! ```
//! use std::sync::{LazyLock, Mutex};
//! use telebus::{Access, QueryDescriptor, QueryError, QueryRequest, QueryTable, Querible};
//!
//! struct Modem {
//!     apn: Mutex<String>,
//! }
//!
//! static TABLE: LazyLock<QueryTable<Modem>> = LazyLock::new(|| {
//!     QueryTable::new().with(
//!         QueryDescriptor::new("APN", Access::ReadWrite)
//!             .label("apn")
//!             .description("GPRS access point name")
//!             .values("<string, max 32 chars>"),
//!         |m: &Modem, req| match req {
//!             QueryRequest::Write(v) => {
//!                 *m.apn.lock().unwrap() = v.to_string();
//!                 Ok(String::new())
//!             }
//!             _ => Ok(m.apn.lock().unwrap().clone()),
//!         },
//!     )
//! });
//!
//! impl Querible for Modem {
//!     fn owner(&self) -> &str { "modem" }
//!     fn query(&self, name: &str, req: QueryRequest<'_>) -> Result<String, QueryError> {
//!         TABLE.dispatch(self, name, req)
//!     }
//! }
//!
//! let m = Modem { apn: Mutex::new("internet".into()) };
//! assert_eq!(m.query("APN", QueryRequest::Read).unwrap(), "internet");
//! ```

use std::fmt;

use crate::error::QueryError;

/// Directions an attribute may be accessed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Readable only.
    ReadOnly,
    /// Writable only.
    WriteOnly,
    /// Readable and writable.
    ReadWrite,
}

impl Access {
    /// Returns `true` for `ReadOnly` and `ReadWrite`.
    #[inline]
    pub fn can_read(&self) -> bool {
        matches!(self, Access::ReadOnly | Access::ReadWrite)
    }

    /// Returns `true` for `WriteOnly` and `ReadWrite`.
    #[inline]
    pub fn can_write(&self) -> bool {
        matches!(self, Access::WriteOnly | Access::ReadWrite)
    }

    /// Two-character flag column used in listings (`R-`, `-W`, `RW`).
    pub fn flags(&self) -> &'static str {
        match self {
            Access::ReadOnly => "R-",
            Access::WriteOnly => "-W",
            Access::ReadWrite => "RW",
        }
    }
}

/// Kind of access a request performs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryMode {
    /// Read the current value.
    Read,
    /// Write a new value.
    Write,
    /// Return the supported-values help text.
    Describe,
}

/// One request against an attribute.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryRequest<'a> {
    /// Read the current value.
    Read,
    /// Write the given value.
    Write(&'a str),
    /// Return the supported-values help text.
    Describe,
}

impl<'a> QueryRequest<'a> {
    /// Builds a request from a mode and an optional value (missing write value = empty).
    pub fn from_mode(mode: QueryMode, value: Option<&'a str>) -> Self {
        match mode {
            QueryMode::Read => QueryRequest::Read,
            QueryMode::Write => QueryRequest::Write(value.unwrap_or("")),
            QueryMode::Describe => QueryRequest::Describe,
        }
    }

    /// Mode of this request.
    pub fn mode(&self) -> QueryMode {
        match self {
            QueryRequest::Read => QueryMode::Read,
            QueryRequest::Write(_) => QueryMode::Write,
            QueryRequest::Describe => QueryMode::Describe,
        }
    }
}

/// Metadata of one exported attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryDescriptor {
    /// Process-wide unique attribute name.
    pub name: String,
    /// Short label for consoles.
    pub label: String,
    /// One-line description.
    pub description: String,
    /// Help text describing accepted values.
    pub values_help: String,
    /// Allowed access directions.
    pub access: Access,
}

impl QueryDescriptor {
    /// Creates a descriptor with empty texts.
    pub fn new(name: impl Into<String>, access: Access) -> Self {
        Self {
            name: name.into(),
            label: String::new(),
            description: String::new(),
            values_help: String::new(),
            access,
        }
    }

    /// Fallible [`new`](Self::new) for callers that must survive allocation failure.
    ///
    /// ### Errors
    /// [`QueryError::OutOfMemory`] if the name cannot be copied.
    pub fn try_new(name: &str, access: Access) -> Result<Self, QueryError> {
        let mut owned = String::new();
        owned
            .try_reserve_exact(name.len())
            .map_err(|_| QueryError::OutOfMemory)?;
        owned.push_str(name);
        Ok(Self::new(owned, access))
    }

    /// Sets the short label.
    #[inline]
    pub fn label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    /// Sets the description.
    #[inline]
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Sets the supported-values help text.
    #[inline]
    pub fn values(mut self, help: impl Into<String>) -> Self {
        self.values_help = help.into();
        self
    }
}

impl fmt::Display for QueryDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} [{}] {}", self.name, self.access.flags(), self.description)
    }
}

/// A capability exposing named attributes.
pub trait Querible: Send + Sync + 'static {
    /// Name of the capability, used in logs.
    fn owner(&self) -> &str;

    /// Serves one request for attribute `name`.
    ///
    /// Implementations reject a read on a write-only attribute and a write on a
    /// read-only one with [`QueryError::ModeNotSupported`]; [`QueryTable::dispatch`]
    /// does this for them.
    fn query(&self, name: &str, request: QueryRequest<'_>) -> Result<String, QueryError>;
}

/// Handler bound to one attribute of a capability of type `T`.
pub type QueryFn<T> = fn(&T, QueryRequest<'_>) -> Result<String, QueryError>;

/// One row of a [`QueryTable`].
pub struct QueryEntry<T> {
    /// Attribute metadata.
    pub descriptor: QueryDescriptor,
    /// Bound handler.
    pub handler: QueryFn<T>,
}

/// Declarative attribute table of a capability type, built once per type.
pub struct QueryTable<T> {
    entries: Vec<QueryEntry<T>>,
}

impl<T> Default for QueryTable<T> {
    fn default() -> Self {
        Self {
            entries: Vec::new(),
        }
    }
}

impl<T> QueryTable<T> {
    /// Creates an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an attribute.
    pub fn with(mut self, descriptor: QueryDescriptor, handler: QueryFn<T>) -> Self {
        self.entries.push(QueryEntry {
            descriptor,
            handler,
        });
        self
    }

    /// Descriptors in table order.
    pub fn descriptors(&self) -> impl Iterator<Item = &QueryDescriptor> {
        self.entries.iter().map(|e| &e.descriptor)
    }

    /// Number of attributes.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if the table has no attribute.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Checks the access direction and runs the bound handler.
    ///
    /// `Describe` is answered from the descriptor's help text without calling the handler.
    pub fn dispatch(
        &self,
        target: &T,
        name: &str,
        request: QueryRequest<'_>,
    ) -> Result<String, QueryError> {
        let entry = self
            .entries
            .iter()
            .find(|e| e.descriptor.name == name)
            .ok_or_else(|| QueryError::NotFound {
                name: name.to_string(),
            })?;

        let access = entry.descriptor.access;
        match request {
            QueryRequest::Describe => Ok(entry.descriptor.values_help.clone()),
            QueryRequest::Read if !access.can_read() => Err(QueryError::ModeNotSupported {
                name: name.to_string(),
            }),
            QueryRequest::Write(_) if !access.can_write() => Err(QueryError::ModeNotSupported {
                name: name.to_string(),
            }),
            _ => (entry.handler)(target, request),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Counter {
        value: AtomicU32,
    }

    fn table() -> QueryTable<Counter> {
        QueryTable::new()
            .with(
                QueryDescriptor::new("CNT", Access::ReadOnly).description("pulse count"),
                |c: &Counter, _| Ok(c.value.load(Ordering::SeqCst).to_string()),
            )
            .with(
                QueryDescriptor::new("RST", Access::WriteOnly).values("1 = reset"),
                |c: &Counter, req| match req {
                    QueryRequest::Write("1") => {
                        c.value.store(0, Ordering::SeqCst);
                        Ok(String::new())
                    }
                    _ => Err(QueryError::InvalidValue {
                        name: "RST".into(),
                        reason: "expected 1".into(),
                    }),
                },
            )
    }

    #[test]
    fn test_write_on_read_only_is_rejected_without_side_effect() {
        let c = Counter {
            value: AtomicU32::new(7),
        };
        let t = table();
        let err = t.dispatch(&c, "CNT", QueryRequest::Write("1")).unwrap_err();
        assert_eq!(err.as_label(), "mode_not_supported");
        assert_eq!(c.value.load(Ordering::SeqCst), 7);
    }

    #[test]
    fn test_read_on_write_only_is_rejected() {
        let c = Counter {
            value: AtomicU32::new(7),
        };
        let err = table().dispatch(&c, "RST", QueryRequest::Read).unwrap_err();
        assert!(matches!(err, QueryError::ModeNotSupported { .. }));
    }

    #[test]
    fn test_describe_and_write() {
        let c = Counter {
            value: AtomicU32::new(7),
        };
        let t = table();
        assert_eq!(t.dispatch(&c, "RST", QueryRequest::Describe).unwrap(), "1 = reset");
        t.dispatch(&c, "RST", QueryRequest::Write("1")).unwrap();
        assert_eq!(t.dispatch(&c, "CNT", QueryRequest::Read).unwrap(), "0");
        assert!(t.dispatch(&c, "RST", QueryRequest::Write("2")).is_err());
        assert!(matches!(
            t.dispatch(&c, "NOPE", QueryRequest::Read),
            Err(QueryError::NotFound { .. })
        ));
    }

    #[test]
    fn test_access_flags() {
        assert_eq!(Access::ReadOnly.flags(), "R-");
        assert_eq!(Access::WriteOnly.flags(), "-W");
        assert_eq!(Access::ReadWrite.flags(), "RW");
        assert_eq!(
            QueryRequest::from_mode(QueryMode::Write, None),
            QueryRequest::Write("")
        );
    }

    #[test]
    fn test_try_new_matches_new() {
        let d = QueryDescriptor::try_new("CNT", Access::ReadOnly).unwrap();
        assert_eq!(d.name, "CNT");
        assert!(d.label.is_empty());
        assert_eq!(d.access, Access::ReadOnly);
    }
}

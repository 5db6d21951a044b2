//! # Attribute-RPC text protocol.
//!
//! Consoles and uplink proxies talk to the query registry with one line per request:
//!
//! ```text
//! NAME          read the current value        → NAME: <value>\r\n
//! NAME=VALUE    write a value                 → NAME: OK\r\n
//! NAME=?        describe accepted values      → NAME: <help>\r\n
//!               any failure                   → NAME: ERROR <label>\r\n
//! ```
//!
//! The listing radix (see `Config::query_radix`) may prefix the name; it is stripped.
//! Trailing CR/LF and surrounding blanks are ignored.

use std::fmt;

use super::descriptor::{QueryMode, QueryRequest};
use crate::error::QueryError;

/// A parsed request line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryLine {
    /// Attribute name.
    pub name: String,
    /// Requested access.
    pub mode: QueryMode,
    /// Value to write (`Write` only).
    pub value: Option<String>,
}

impl QueryLine {
    /// Parses `NAME`, `NAME=VALUE` or `NAME=?`.
    ///
    /// ### Errors
    /// [`QueryError::Malformed`] if the name is empty or contains blanks.
    pub fn parse(line: &str, radix: &str) -> Result<Self, QueryError> {
        let trimmed = line.trim();
        let body = if radix.is_empty() {
            trimmed
        } else {
            trimmed.strip_prefix(radix).unwrap_or(trimmed)
        };

        let (name, rest) = match body.split_once('=') {
            Some((name, rest)) => (name.trim(), Some(rest)),
            None => (body, None),
        };
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(QueryError::Malformed {
                line: trimmed.to_string(),
            });
        }

        let (mode, value) = match rest {
            None => (QueryMode::Read, None),
            Some("?") => (QueryMode::Describe, None),
            Some(v) => (QueryMode::Write, Some(v.to_string())),
        };
        Ok(Self {
            name: name.to_string(),
            mode,
            value,
        })
    }

    /// Borrowed request for dispatching.
    pub fn request(&self) -> QueryRequest<'_> {
        QueryRequest::from_mode(self.mode, self.value.as_deref())
    }
}

/// Reply to one request line. `Display` renders the wire form, CRLF included.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryResponse {
    /// Echoed attribute name (the raw line when it could not be parsed).
    pub name: String,
    /// Mode of the request, if it parsed.
    pub mode: Option<QueryMode>,
    /// Value, help text or acknowledgment; or the failure.
    pub outcome: Result<String, QueryError>,
}

impl QueryResponse {
    /// Returns `true` if the request succeeded.
    pub fn is_ok(&self) -> bool {
        self.outcome.is_ok()
    }
}

impl fmt::Display for QueryResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.outcome, self.mode) {
            (Ok(_), Some(QueryMode::Write)) => write!(f, "{}: OK\r\n", self.name),
            (Ok(body), _) => write!(f, "{}: {}\r\n", self.name, body),
            (Err(e), _) => write!(f, "{}: ERROR {}\r\n", self.name, e.as_label()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_forms() {
        let read = QueryLine::parse("CCON\r\n", "").unwrap();
        assert_eq!(read.mode, QueryMode::Read);
        assert_eq!(read.value, None);

        let write = QueryLine::parse("CCON=1", "").unwrap();
        assert_eq!(write.mode, QueryMode::Write);
        assert_eq!(write.request(), QueryRequest::Write("1"));

        let describe = QueryLine::parse("CCON=?", "").unwrap();
        assert_eq!(describe.mode, QueryMode::Describe);

        let empty_write = QueryLine::parse("APN=", "").unwrap();
        assert_eq!(empty_write.request(), QueryRequest::Write(""));
    }

    #[test]
    fn test_parse_strips_radix() {
        let line = QueryLine::parse("$CCON=1", "$").unwrap();
        assert_eq!(line.name, "CCON");
        let bare = QueryLine::parse("CCON", "$").unwrap();
        assert_eq!(bare.name, "CCON");
    }

    #[test]
    fn test_parse_rejects_empty_name() {
        assert!(matches!(
            QueryLine::parse("=1", ""),
            Err(QueryError::Malformed { .. })
        ));
        assert!(QueryLine::parse("  ", "").is_err());
        assert!(QueryLine::parse("A B", "").is_err());
    }

    #[test]
    fn test_response_wire_form() {
        let read = QueryResponse {
            name: "CCON".into(),
            mode: Some(QueryMode::Read),
            outcome: Ok("1".into()),
        };
        assert_eq!(read.to_string(), "CCON: 1\r\n");

        let write = QueryResponse {
            name: "CCON".into(),
            mode: Some(QueryMode::Write),
            outcome: Ok(String::new()),
        };
        assert_eq!(write.to_string(), "CCON: OK\r\n");

        let err = QueryResponse {
            name: "CCON".into(),
            mode: Some(QueryMode::Write),
            outcome: Err(QueryError::ModeNotSupported {
                name: "CCON".into(),
            }),
        };
        assert_eq!(err.to_string(), "CCON: ERROR mode_not_supported\r\n");
    }
}

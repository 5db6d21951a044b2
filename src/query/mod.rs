//! Attribute RPC: named, introspectable, readable/writable attributes.
//!
//! ## Contents
//! - [`QueryDescriptor`], [`Access`]: attribute metadata
//! - [`Querible`], [`QueryTable`]: the capability side (declarative table + direction checks)
//! - [`QueryRegistry`]: process-wide name → capability directory and listings
//! - [`QueryLine`], [`QueryResponse`]: the line-oriented text protocol used by consoles

mod descriptor;
mod protocol;
mod registry;

pub use descriptor::{
    Access, QueryDescriptor, QueryEntry, QueryFn, QueryMode, QueryRequest, QueryTable, Querible,
};
pub use protocol::{QueryLine, QueryResponse};
pub use registry::QueryRegistry;

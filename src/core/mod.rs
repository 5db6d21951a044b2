//! Process core: configuration and the shared context.
//!
//! - [`config`]: settings with sentinel-aware accessors;
//! - [`context`]: owner of the registries and the root cancellation token;
//! - [`builder`]: assembles a context, optionally around shared registries.

mod builder;
mod config;
mod context;

pub use builder::ContextBuilder;
pub use config::Config;
pub use context::Context;

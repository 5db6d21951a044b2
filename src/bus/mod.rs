//! Event/command bus: generators produce, dispatchers route, handlers consume.
//!
//! - [`Event`] / [`Command`]: payloads
//! - [`EventHandler`] / [`CommandHandler`]: consumers
//! - [`EventDispatcher`] / [`CommandDispatcher`] / [`MultipleDispatcher`]: routing
//! - [`Generator`]: producer running on a [`Worker`](crate::Worker) thread

mod command;
mod dispatcher;
mod event;
mod generator;
mod handler;

pub use command::{Command, CommandRange, CommandType};
pub use dispatcher::{
    CommandDispatch, CommandDispatcher, Dispatch, EventDispatch, EventDispatcher,
    MultipleCommandDispatcher, MultipleDispatcher, MultipleEventDispatcher, Resume,
};
pub use event::Event;
pub use generator::{CommandGenerator, EventGenerator, Generator, GeneratorContext};
pub use handler::{CommandHandler, EventHandler};

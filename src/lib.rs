//! # telebus
//!
//! **telebus** is the in-process coordination layer of a vehicle telemetry controller.
//!
//! It provides the event/command bus devices talk through, the directory they find each
//! other in, the named-attribute RPC an operator console reads and writes them with, and
//! the cooperative threads every producer runs on. Device protocols, serial transport and
//! configuration files live elsewhere and plug in through the traits exported here.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────┐
//!     │  Generator   │   │  Generator   │   │  Generator   │
//!     │  (gps poll)  │   │ (odo pulses) │   │  (console)   │
//!     └──────┬───────┘   └──────┬───────┘   └──────┬───────┘
//!            │ Worker thread    │ Worker thread    │ Worker thread
//!            ▼                  ▼                  ▼
//!     ┌──────────────┐   ┌──────────────┐   ┌──────────────────────┐
//!     │EventDispatch.│   │EventDispatch.│   │ MultipleDispatcher   │
//!     │ (count queue)│   │ (count queue)│   │  ├─ CommandDispatcher│──► AuditHandler
//!     └──────┬───────┘   └──────┬───────┘   │  └─ CommandDispatcher│──► device handler
//!            ▼                  ▼           └──────────────────────┘
//!      EventHandler        EventHandler
//!
//! ┌───────────────────────────────────────────────────────────────────┐
//! │  Context                                                          │
//! │  - DeviceRegistry  (class, id) → device        lookups, aliases   │
//! │  - QueryRegistry   name → owner + descriptor   "$NAME=VALUE"      │
//! │  - ThreadRegistry  live workers                 ordered shutdown   │
//! │  - Config, root CancellationToken                                 │
//! └───────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ### Notification cycle
//! ```text
//! Generator body ── ctx.notify(cmd) ──► enabled? ──no──► dropped (counted)
//!                                          │yes
//!                                          ▼
//!                                  Dispatcher::dispatch
//!                                    ├─ Active    ─► handler.notify_command(&cmd) ─► Delivered
//!                                    └─ Suspended ─► FIFO queue ─────────────────► Queued
//!                                                      │
//!                         resume(false): drain in order┘  resume(true): drop all
//! ```
//!
//! ## Features
//! | Area            | Description                                                   | Key types / traits                                 |
//! |-----------------|---------------------------------------------------------------|----------------------------------------------------|
//! | **Bus**         | Produce, route, queue and fan out events and commands.        | [`Generator`], [`CommandDispatcher`], [`Command`]  |
//! | **Handlers**    | Consume notifications; range-checked commands.                | [`EventHandler`], [`CommandHandler`]               |
//! | **Devices**     | Process-wide directory keyed by class and id.                 | [`DeviceRegistry`], [`Device`], [`Registration`]   |
//! | **Attributes**  | Named read/write attributes and the console text protocol.    | [`QueryRegistry`], [`Querible`], [`QueryTable`]    |
//! | **Threads**     | Cooperative sleep/wake and acknowledged termination.          | [`Worker`], [`ThreadRegistry`]                     |
//! | **Errors**      | Typed errors with stable log labels.                          | [`BusError`], [`RegistryError`], [`QueryError`]    |
//! | **Context**     | Owns the registries, the configuration and shutdown.          | [`Context`], [`Config`]                            |
//!
//! ## Optional features
//! - `logging`: exports a `tracing`-backed `LogHandler` _(demo/reference only)_.
//!
//! ## Example
//! ```rust
//! use std::sync::{Arc, Mutex};
//! use std::time::Duration;
//! use telebus::{
//!     AuditHandler, CommandDispatch, CommandDispatcher, CommandGenerator, CommandType,
//!     Command, Config, Context, DeviceClass, GeneratorContext,
//! };
//!
//! let ctx = Context::builder(Config::default()).build();
//!
//! let audit = Arc::new(AuditHandler::new(Vec::new()));
//! let dispatcher: Arc<dyn CommandDispatch> = CommandDispatcher::with_handler(audit, false);
//!
//! let sent = Arc::new(Mutex::new(0));
//! let counter = Arc::clone(&sent);
//! let producer: CommandGenerator = ctx.generator("fuel-poll", move |g: &GeneratorContext<dyn CommandDispatch>| {
//!     while !g.should_stop() {
//!         let cmd = Command::new(CommandType(12), DeviceClass::FuelTerminal, "T1");
//!         if let Ok(Some(_)) = g.notify(cmd) {
//!             *counter.lock().unwrap() += 1;
//!         }
//!         g.poll_for(Duration::from_millis(5));
//!     }
//! });
//! producer.bind(dispatcher);
//! producer.enable()?;
//!
//! while *sent.lock().unwrap() == 0 {
//!     std::thread::sleep(Duration::from_millis(1));
//! }
//! ctx.shutdown();
//! # Ok::<(), telebus::BusError>(())
//! ```

mod bus;
mod core;
mod device;
mod error;
mod handlers;
mod query;
mod sync;
mod workers;

// ---- Public re-exports ----

pub use bus::{
    Command, CommandDispatch, CommandDispatcher, CommandGenerator, CommandHandler, CommandRange,
    CommandType, Dispatch, Event, EventDispatch, EventDispatcher, EventGenerator, EventHandler,
    Generator, GeneratorContext, MultipleCommandDispatcher, MultipleDispatcher,
    MultipleEventDispatcher, Resume,
};
pub use core::{Config, Context, ContextBuilder};
pub use device::{Device, DeviceClass, DeviceRegistry, Registration};
pub use error::{BusError, QueryError, RegistryError};
pub use handlers::AuditHandler;
pub use query::{
    Access, QueryDescriptor, QueryEntry, QueryFn, QueryLine, QueryMode, QueryRegistry,
    QueryRequest, QueryResponse, QueryTable, Querible,
};
pub use workers::{
    ShutdownOrder, ThreadInfo, ThreadRegistry, ThreadState, Worker, WorkerId, WorkerOptions,
};

// Optional: expose a tracing-backed handler (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use handlers::LogHandler;

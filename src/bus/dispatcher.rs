//! # Dispatchers: route, queue or fan out produced notifications.
//!
//! A dispatcher is bound to exactly one handler. While **active** it calls the handler
//! synchronously on the caller's thread; while **suspended** it queues and reports
//! [`Dispatch::Queued`] (backpressure, not failure).
//!
//! ## Architecture
//! ```text
//! Generator thread ── dispatch(cmd) ──► CommandDispatcher ──(Active)──► handler.notify_command(&cmd)
//!                                              │
//!                                   (Suspended or draining)
//!                                              ▼
//!                                   VecDeque<Pending> (FIFO, owned)
//!                                              │
//!                          resume(false) ──────┴─► one drainer, in order ──► handler
//!                          resume(true)  ────────► drop all, notify nobody
//! ```
//!
//! ## Rules
//! - State and queue live behind one mutex: the state check and the enqueue are one
//!   critical section.
//! - At most one thread drains. While it does, `dispatch` queues behind the backlog and
//!   a concurrent `resume(false)` waits for that drainer instead of starting another.
//! - `suspend` during a drain stops the drainer before its next item.
//! - An active dispatcher with no drainer has an empty queue; `bind(_, false)` drains
//!   what was queued before it.
//! - The handler is always called with the lock released.
//! - Events queued while suspended are only counted; commands are kept whole.

use std::collections::VecDeque;
use std::mem;
use std::sync::{Arc, Condvar, Mutex, MutexGuard};
use std::thread::{self, ThreadId};

use tracing::{debug, warn};

use super::command::Command;
use super::event::Event;
use super::handler::{CommandHandler, EventHandler};
use crate::error::BusError;
use crate::sync::{lock, wait_while};

/// Outcome of a successful dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dispatch {
    /// The handler ran before `dispatch` returned.
    Delivered,
    /// The item was queued (dispatcher suspended or draining).
    Queued,
}

/// Report of one `resume` call.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Resume {
    /// Queued items handed to the handler.
    pub delivered: usize,
    /// Queued items dropped without notification.
    pub discarded: usize,
    /// Errors returned by the handler while draining, in queue order.
    pub failed: Vec<BusError>,
}

impl Resume {
    fn merge(&mut self, other: Resume) {
        self.delivered += other.delivered;
        self.discarded += other.discarded;
        self.failed.extend(other.failed);
    }
}

/// Admission state shared by both dispatcher kinds.
#[derive(Debug)]
struct Gate {
    suspended: bool,
    drainer: Option<ThreadId>,
}

impl Gate {
    fn new() -> Self {
        Self {
            suspended: false,
            drainer: None,
        }
    }

    /// New items go to the queue.
    fn queues(&self) -> bool {
        self.suspended || self.drainer.is_some()
    }

    /// The drainer may take the next item.
    fn open(&self) -> bool {
        !self.suspended
    }

    fn drained_here(&self) -> bool {
        self.drainer == Some(thread::current().id())
    }
}

/// Dispatcher state that carries a [`Gate`] and a backlog.
trait Backlog {
    fn gate(&mut self) -> &mut Gate;
    fn backlog(&self) -> usize;
}

/// What a `resume(false)` caller does after reopening the gate.
enum Claim {
    /// The caller became the drainer.
    Drain,
    /// Nothing left for this caller to do.
    Done,
}

/// Reopens the gate and decides who drains. Waits on `idle` while another thread drains.
fn claim<S: Backlog>(idle: &Condvar, mut st: MutexGuard<'_, S>) -> Claim {
    let gate = st.gate();
    gate.suspended = false;
    if gate.drainer.is_some() {
        if !gate.drained_here() {
            let _idle = wait_while(idle, st, |s| s.gate().drainer.is_some());
        }
        return Claim::Done;
    }
    if st.backlog() == 0 {
        return Claim::Done;
    }
    st.gate().drainer = Some(thread::current().id());
    Claim::Drain
}

/// Routing surface for events.
pub trait EventDispatch: Send + Sync {
    /// Delivers or counts one event.
    ///
    /// ### Errors
    /// [`BusError::NotConfigured`] if active and no handler is bound.
    fn dispatch(&self) -> Result<Dispatch, BusError>;
    /// Starts queueing.
    fn suspend(&self);
    /// Stops queueing and drains (`discard = false`) or drops the backlog.
    fn resume(&self, discard: bool) -> Resume;
    /// Returns `true` while suspended.
    fn is_suspended(&self) -> bool;
    /// Number of queued events.
    fn pending(&self) -> usize;
}

/// Routing surface for commands.
pub trait CommandDispatch: Send + Sync {
    /// Delivers or queues one command; the dispatcher takes ownership and drops it
    /// after delivery or discard.
    ///
    /// ### Errors
    /// - [`BusError::NotConfigured`] if active and no handler is bound.
    /// - Whatever the handler returns on immediate delivery.
    fn dispatch(&self, command: Command) -> Result<Dispatch, BusError>;
    /// Same as [`dispatch`](Self::dispatch), but the caller keeps a handle to the command.
    fn dispatch_retained(&self, command: Arc<Command>) -> Result<Dispatch, BusError>;
    /// Starts queueing.
    fn suspend(&self);
    /// Stops queueing and drains (`discard = false`) or drops the backlog.
    ///
    /// If another thread is draining, waits for it to finish; its deliveries are not
    /// counted in the returned report.
    fn resume(&self, discard: bool) -> Resume;
    /// Returns `true` while suspended.
    fn is_suspended(&self) -> bool;
    /// Number of queued commands.
    fn pending(&self) -> usize;
}

// ---------------------------
// Events
// ---------------------------

struct EventState {
    gate: Gate,
    pending: usize,
    handler: Option<Arc<dyn EventHandler>>,
}

impl Backlog for EventState {
    fn gate(&mut self) -> &mut Gate {
        &mut self.gate
    }

    fn backlog(&self) -> usize {
        self.pending
    }
}

/// Routes events to one bound [`EventHandler`].
pub struct EventDispatcher {
    state: Mutex<EventState>,
    idle: Condvar,
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self {
            state: Mutex::new(EventState {
                gate: Gate::new(),
                pending: 0,
                handler: None,
            }),
            idle: Condvar::new(),
        }
    }
}

impl EventDispatcher {
    /// Creates an unbound, active dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a dispatcher bound to `handler`.
    pub fn with_handler(handler: Arc<dyn EventHandler>, suspended: bool) -> Arc<Self> {
        let d = Self::new();
        d.bind(handler, suspended);
        Arc::new(d)
    }

    /// Sets the routing target and the state.
    ///
    /// Binding active delivers the events counted so far, as `resume(false)` does.
    pub fn bind(&self, handler: Arc<dyn EventHandler>, suspended: bool) -> Resume {
        {
            let mut st = lock(&self.state);
            st.handler = Some(handler);
            if suspended {
                st.gate.suspended = true;
                return Resume::default();
            }
        }
        self.resume(false)
    }

    fn drain(&self, report: &mut Resume) {
        loop {
            let handler = {
                let mut st = lock(&self.state);
                if !st.gate.open() || st.pending == 0 {
                    st.gate.drainer = None;
                    self.idle.notify_all();
                    break;
                }
                st.pending -= 1;
                st.handler.clone()
            };
            match handler {
                Some(h) => {
                    h.notify_event(&Event::new());
                    report.delivered += 1;
                }
                None => {
                    report.failed.push(BusError::NotConfigured);
                    report.discarded += 1;
                }
            }
        }
    }
}

impl EventDispatch for EventDispatcher {
    fn dispatch(&self) -> Result<Dispatch, BusError> {
        let handler = {
            let mut st = lock(&self.state);
            if st.gate.queues() {
                st.pending += 1;
                return Ok(Dispatch::Queued);
            }
            st.handler.clone().ok_or(BusError::NotConfigured)?
        };
        handler.notify_event(&Event::new());
        Ok(Dispatch::Delivered)
    }

    fn suspend(&self) {
        let mut st = lock(&self.state);
        if !st.gate.suspended {
            st.gate.suspended = true;
            debug!(pending = st.pending, "event dispatcher suspended");
        }
    }

    fn resume(&self, discard: bool) -> Resume {
        let mut report = Resume::default();
        let mut st = lock(&self.state);
        if discard {
            st.gate.suspended = false;
            report.discarded = mem::take(&mut st.pending);
            debug!(discarded = report.discarded, "event dispatcher resumed");
            return report;
        }
        match claim(&self.idle, st) {
            Claim::Done => return report,
            Claim::Drain => self.drain(&mut report),
        }
        debug!(delivered = report.delivered, "event dispatcher resumed");
        report
    }

    fn is_suspended(&self) -> bool {
        lock(&self.state).gate.suspended
    }

    fn pending(&self) -> usize {
        lock(&self.state).pending
    }
}

// ---------------------------
// Commands
// ---------------------------

/// A queued command and the release policy it was dispatched with.
enum Pending {
    /// The dispatcher owns the command and frees it after delivery.
    Owned(Command),
    /// The caller kept a handle; the dispatcher only drops its own.
    Retained(Arc<Command>),
}

impl Pending {
    fn command(&self) -> &Command {
        match self {
            Pending::Owned(c) => c,
            Pending::Retained(c) => c,
        }
    }
}

struct CommandState {
    gate: Gate,
    queue: VecDeque<Pending>,
    handler: Option<Arc<dyn CommandHandler>>,
    default: Option<Command>,
}

impl Backlog for CommandState {
    fn gate(&mut self) -> &mut Gate {
        &mut self.gate
    }

    fn backlog(&self) -> usize {
        self.queue.len()
    }
}

/// Routes commands to one bound [`CommandHandler`]; optionally holds a default command.
pub struct CommandDispatcher {
    state: Mutex<CommandState>,
    idle: Condvar,
}

impl Default for CommandDispatcher {
    fn default() -> Self {
        Self {
            state: Mutex::new(CommandState {
                gate: Gate::new(),
                queue: VecDeque::new(),
                handler: None,
                default: None,
            }),
            idle: Condvar::new(),
        }
    }
}

impl CommandDispatcher {
    /// Creates an unbound, active dispatcher.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a dispatcher bound to `handler`.
    pub fn with_handler(handler: Arc<dyn CommandHandler>, suspended: bool) -> Arc<Self> {
        let d = Self::new();
        d.bind(handler, suspended);
        Arc::new(d)
    }

    /// Sets the routing target and the state.
    ///
    /// Binding active drains the commands queued so far, in order, as `resume(false)`
    /// does; commands dispatched meanwhile queue behind them.
    pub fn bind(&self, handler: Arc<dyn CommandHandler>, suspended: bool) -> Resume {
        {
            let mut st = lock(&self.state);
            st.handler = Some(handler);
            if suspended {
                st.gate.suspended = true;
                return Resume::default();
            }
        }
        self.resume(false)
    }

    /// Configures the command sent by [`dispatch_default`](Self::dispatch_default).
    pub fn set_default(&self, command: Command) {
        lock(&self.state).default = Some(command);
    }

    /// Removes the default command, returning it.
    pub fn clear_default(&self) -> Option<Command> {
        lock(&self.state).default.take()
    }

    /// Dispatches a copy of the default command.
    ///
    /// ### Errors
    /// [`BusError::NotConfigured`] if no default command is set; otherwise as
    /// [`CommandDispatch::dispatch`].
    pub fn dispatch_default(&self) -> Result<Dispatch, BusError> {
        let command = lock(&self.state)
            .default
            .clone()
            .ok_or(BusError::NotConfigured)?;
        self.route(Pending::Owned(command))
    }

    fn route(&self, item: Pending) -> Result<Dispatch, BusError> {
        let handler = {
            let mut st = lock(&self.state);
            if st.gate.queues() {
                st.queue.push_back(item);
                return Ok(Dispatch::Queued);
            }
            st.handler.clone().ok_or(BusError::NotConfigured)?
        };
        handler.notify_command(item.command())?;
        Ok(Dispatch::Delivered)
    }

    fn drain(&self, report: &mut Resume) {
        loop {
            let (item, handler) = {
                let mut st = lock(&self.state);
                let next = if st.gate.open() {
                    st.queue.pop_front()
                } else {
                    None
                };
                let Some(item) = next else {
                    st.gate.drainer = None;
                    self.idle.notify_all();
                    break;
                };
                (item, st.handler.clone())
            };

            match handler {
                Some(h) => {
                    if let Err(e) = h.notify_command(item.command()) {
                        warn!(handler = h.name(), error = %e, "queued command rejected");
                        report.failed.push(e);
                    }
                    report.delivered += 1;
                }
                None => {
                    report.failed.push(BusError::NotConfigured);
                    report.discarded += 1;
                }
            }
        }
    }
}

impl CommandDispatch for CommandDispatcher {
    fn dispatch(&self, command: Command) -> Result<Dispatch, BusError> {
        self.route(Pending::Owned(command))
    }

    fn dispatch_retained(&self, command: Arc<Command>) -> Result<Dispatch, BusError> {
        self.route(Pending::Retained(command))
    }

    fn suspend(&self) {
        let mut st = lock(&self.state);
        if !st.gate.suspended {
            st.gate.suspended = true;
            debug!(pending = st.queue.len(), "command dispatcher suspended");
        }
    }

    fn resume(&self, discard: bool) -> Resume {
        let mut report = Resume::default();
        let mut st = lock(&self.state);
        if discard {
            st.gate.suspended = false;
            let dropped = mem::take(&mut st.queue);
            drop(st);
            report.discarded = dropped.len();
            drop(dropped);
            debug!(discarded = report.discarded, "command dispatcher resumed");
            return report;
        }
        match claim(&self.idle, st) {
            Claim::Done => return report,
            Claim::Drain => self.drain(&mut report),
        }
        debug!(
            delivered = report.delivered,
            failed = report.failed.len(),
            "command dispatcher resumed"
        );
        report
    }

    fn is_suspended(&self) -> bool {
        lock(&self.state).gate.suspended
    }

    fn pending(&self) -> usize {
        lock(&self.state).queue.len()
    }
}

// ---------------------------
// Fan-out
// ---------------------------

/// Forwards every notification to an ordered set of member dispatchers.
///
/// ### Rules
/// - Members are served in registration order.
/// - The result is `Delivered` only if every member delivered immediately, else `Queued`.
/// - A dispatch cycle works on the membership it started with; `add`/`remove` take
///   effect from the next cycle.
/// - Member errors do not stop the fan-out; the first one is returned after all
///   members were served.
/// - A command is shared between members (`Arc`), not copied, and freed once the last
///   member is done with it.
pub struct MultipleDispatcher<D: ?Sized> {
    members: Mutex<Vec<Arc<D>>>,
}

/// Fan-out of events.
pub type MultipleEventDispatcher = MultipleDispatcher<dyn EventDispatch>;
/// Fan-out of commands.
pub type MultipleCommandDispatcher = MultipleDispatcher<dyn CommandDispatch>;

impl<D: ?Sized> Default for MultipleDispatcher<D> {
    fn default() -> Self {
        Self {
            members: Mutex::new(Vec::new()),
        }
    }
}

impl<D: ?Sized> MultipleDispatcher<D> {
    /// Creates an empty fan-out.
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a member.
    pub fn add(&self, member: Arc<D>) {
        lock(&self.members).push(member);
    }

    /// Removes `member` (by identity). Returns `false` if it was not a member.
    pub fn remove(&self, member: &Arc<D>) -> bool {
        let mut members = lock(&self.members);
        let before = members.len();
        members.retain(|m| !Arc::ptr_eq(m, member));
        before != members.len()
    }

    /// Number of members.
    pub fn len(&self) -> usize {
        lock(&self.members).len()
    }

    /// Returns `true` if there is no member.
    pub fn is_empty(&self) -> bool {
        lock(&self.members).is_empty()
    }

    fn snapshot(&self) -> Vec<Arc<D>> {
        lock(&self.members).clone()
    }

    fn fan_out<F>(&self, mut each: F) -> Result<Dispatch, BusError>
    where
        F: FnMut(&D) -> Result<Dispatch, BusError>,
    {
        let mut all_delivered = true;
        let mut first_err = None;
        for member in self.snapshot() {
            match each(&*member) {
                Ok(Dispatch::Delivered) => {}
                Ok(Dispatch::Queued) => all_delivered = false,
                Err(e) => {
                    all_delivered = false;
                    first_err.get_or_insert(e);
                }
            }
        }
        match first_err {
            Some(e) => Err(e),
            None if all_delivered => Ok(Dispatch::Delivered),
            None => Ok(Dispatch::Queued),
        }
    }
}

impl EventDispatch for MultipleDispatcher<dyn EventDispatch> {
    fn dispatch(&self) -> Result<Dispatch, BusError> {
        self.fan_out(|m| m.dispatch())
    }

    fn suspend(&self) {
        for m in self.snapshot() {
            m.suspend();
        }
    }

    fn resume(&self, discard: bool) -> Resume {
        let mut report = Resume::default();
        for m in self.snapshot() {
            report.merge(m.resume(discard));
        }
        report
    }

    fn is_suspended(&self) -> bool {
        self.snapshot().iter().any(|m| m.is_suspended())
    }

    fn pending(&self) -> usize {
        self.snapshot().iter().map(|m| m.pending()).sum()
    }
}

impl CommandDispatch for MultipleDispatcher<dyn CommandDispatch> {
    fn dispatch(&self, command: Command) -> Result<Dispatch, BusError> {
        self.dispatch_retained(Arc::new(command))
    }

    fn dispatch_retained(&self, command: Arc<Command>) -> Result<Dispatch, BusError> {
        self.fan_out(|m| m.dispatch_retained(Arc::clone(&command)))
    }

    fn suspend(&self) {
        for m in self.snapshot() {
            m.suspend();
        }
    }

    fn resume(&self, discard: bool) -> Resume {
        let mut report = Resume::default();
        for m in self.snapshot() {
            report.merge(m.resume(discard));
        }
        report
    }

    fn is_suspended(&self) -> bool {
        self.snapshot().iter().any(|m| m.is_suspended())
    }

    fn pending(&self) -> usize {
        self.snapshot().iter().map(|m| m.pending()).sum()
    }
}

//! # Generator: a producer running on its own worker thread.
//!
//! A [`Generator`] owns a [`Worker`] and a production body. The body receives a
//! [`GeneratorContext`] through which it notifies the bound dispatcher and sleeps.
//!
//! ## Architecture
//! ```text
//! Generator::new(name, opts, body)
//!     │  bind(dispatcher)            enable()
//!     ▼         │                       │ (NotConfigured if unbound)
//!  Shared { enabled, dispatcher, dropped }   └─► worker.start() (once)
//!                 ▲                                   │
//!                 │                                   ▼
//!                 └──────── GeneratorContext ◄── body(&ctx) on the worker thread
//!                              notify() ──► enabled? ──yes──► dispatcher.dispatch()
//!                                               └──no───► dropped += 1
//! ```
//!
//! ## Rules
//! - `enable()` without a bound dispatcher fails; the flag stays down and no thread starts.
//! - The first successful `enable()` starts the thread; later calls only raise the flag.
//! - `disable()` never blocks. Production in flight finishes; later notifications are
//!   dropped (counted in [`Generator::dropped`]) and never reach the dispatcher's queue.
//! - Dropping the last [`Generator`] handle terminates its worker.

use std::sync::atomic::{AtomicBool, AtomicU64, Ordering as AtomicOrdering};
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tracing::{debug, trace};

use super::command::Command;
use super::dispatcher::{CommandDispatch, Dispatch, EventDispatch};
use crate::error::BusError;
use crate::sync::{read, write};
use crate::workers::{Worker, WorkerOptions};

struct Shared<D: ?Sized> {
    name: String,
    enabled: AtomicBool,
    dispatcher: RwLock<Option<Arc<D>>>,
    dropped: AtomicU64,
    period: Option<Duration>,
}

impl<D: ?Sized> Shared<D> {
    /// Current dispatcher if the generator is enabled; counts a drop otherwise.
    fn target(&self) -> Option<Arc<D>> {
        if !self.enabled.load(AtomicOrdering::Acquire) {
            self.dropped.fetch_add(1, AtomicOrdering::Relaxed);
            trace!(generator = %self.name, "notification dropped; generator disabled");
            return None;
        }
        read(&self.dispatcher).clone()
    }
}

/// Producer of events or commands, bound to one dispatcher.
///
/// # Example
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use telebus::{
///     Event, EventDispatch, EventDispatcher, EventGenerator, EventHandler, WorkerOptions,
/// };
///
/// struct Tick;
/// impl EventHandler for Tick {
///     fn notify_event(&self, _: &Event) {}
/// }
///
/// let producer = EventGenerator::new("ticker", WorkerOptions::default(), |ctx| {
///     while !ctx.should_stop() {
///         let _ = ctx.notify();
///         ctx.poll_for(Duration::from_millis(10));
///     }
/// });
/// assert!(producer.enable().is_err());
///
/// let dispatcher: Arc<dyn EventDispatch> = EventDispatcher::with_handler(Arc::new(Tick), false);
/// producer.bind(dispatcher);
/// producer.enable()?;
/// producer.terminate();
/// # Ok::<(), telebus::BusError>(())
/// ```
pub struct Generator<D: ?Sized + 'static> {
    shared: Arc<Shared<D>>,
    worker: Worker,
}

/// Generator of events.
pub type EventGenerator = Generator<dyn EventDispatch>;
/// Generator of commands.
pub type CommandGenerator = Generator<dyn CommandDispatch>;

impl<D: ?Sized + Send + Sync + 'static> Generator<D> {
    /// Creates an unbound, disabled generator. The thread starts on the first `enable()`.
    pub fn new<F>(name: impl Into<String>, opts: WorkerOptions, body: F) -> Self
    where
        F: FnOnce(&GeneratorContext<D>) + Send + 'static,
    {
        Self::with_period(name, opts, None, body)
    }

    /// Like [`new`](Self::new), with the production period returned by
    /// [`GeneratorContext::period`] and slept by [`GeneratorContext::poll`].
    pub fn with_period<F>(
        name: impl Into<String>,
        opts: WorkerOptions,
        period: Option<Duration>,
        body: F,
    ) -> Self
    where
        F: FnOnce(&GeneratorContext<D>) + Send + 'static,
    {
        let name: String = name.into();
        let shared = Arc::new(Shared {
            name: name.clone(),
            enabled: AtomicBool::new(false),
            dispatcher: RwLock::new(None),
            dropped: AtomicU64::new(0),
            period,
        });

        let for_body = Arc::clone(&shared);
        let worker = Worker::with_options(name, opts, move |w: &Worker| {
            let ctx = GeneratorContext {
                shared: for_body,
                worker: w.clone(),
            };
            body(&ctx);
        });

        Self { shared, worker }
    }

    /// Sets the dispatcher notifications go to. May be called again to rebind.
    pub fn bind(&self, dispatcher: Arc<D>) {
        *write(&self.shared.dispatcher) = Some(dispatcher);
    }

    /// Returns `true` if a dispatcher is bound.
    pub fn is_bound(&self) -> bool {
        read(&self.shared.dispatcher).is_some()
    }

    /// Enables production, starting the worker thread on first use.
    ///
    /// ### Errors
    /// - [`BusError::NotConfigured`] if no dispatcher is bound.
    /// - [`BusError::Spawn`] if the thread could not be created; the generator stays disabled.
    pub fn enable(&self) -> Result<(), BusError> {
        if !self.is_bound() {
            debug!(generator = %self.shared.name, "enable refused; no dispatcher bound");
            return Err(BusError::NotConfigured);
        }
        self.shared.enabled.store(true, AtomicOrdering::Release);
        if let Err(e) = self.worker.start() {
            self.shared.enabled.store(false, AtomicOrdering::Release);
            return Err(BusError::Spawn {
                reason: e.to_string(),
            });
        }
        Ok(())
    }

    /// Suppresses future notifications. Does not stop the thread.
    pub fn disable(&self) {
        self.shared.enabled.store(false, AtomicOrdering::Release);
    }

    /// Returns the enabled flag.
    pub fn is_enabled(&self) -> bool {
        self.shared.enabled.load(AtomicOrdering::Acquire)
    }

    /// Number of notifications dropped because the generator was disabled.
    pub fn dropped(&self) -> u64 {
        self.shared.dropped.load(AtomicOrdering::Relaxed)
    }

    /// Underlying worker (for signaling or inspection).
    pub fn worker(&self) -> &Worker {
        &self.worker
    }

    /// Generator name.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Disables the generator, stops its thread and waits for it.
    pub fn terminate(&self) {
        self.disable();
        self.worker.terminate();
    }
}

impl<D: ?Sized + 'static> Drop for Generator<D> {
    fn drop(&mut self) {
        self.shared.enabled.store(false, AtomicOrdering::Release);
        self.worker.terminate();
    }
}

/// Handle given to a generator body.
pub struct GeneratorContext<D: ?Sized> {
    shared: Arc<Shared<D>>,
    worker: Worker,
}

impl<D: ?Sized> GeneratorContext<D> {
    /// Generator name.
    pub fn name(&self) -> &str {
        &self.shared.name
    }

    /// Returns `true` while the generator is enabled.
    pub fn is_enabled(&self) -> bool {
        self.shared.enabled.load(AtomicOrdering::Acquire)
    }

    /// Returns `true` once the worker was asked to stop.
    pub fn should_stop(&self) -> bool {
        self.worker.should_stop()
    }

    /// Sleeps until signaled or stopped.
    pub fn suspend(&self) {
        self.worker.suspend();
    }

    /// Sleeps until signaled, stopped, or `timeout` elapsed. `true` if woken early.
    pub fn poll_for(&self, timeout: Duration) -> bool {
        self.worker.poll_for(timeout)
    }

    /// Default production period, if the generator was given one.
    pub fn period(&self) -> Option<Duration> {
        self.shared.period
    }

    /// Sleeps one production period, or until signaled when there is none.
    /// `true` if woken early.
    pub fn poll(&self) -> bool {
        match self.shared.period {
            Some(period) => self.worker.poll_for(period),
            None => {
                self.worker.suspend();
                true
            }
        }
    }

    /// The worker running this body.
    pub fn worker(&self) -> &Worker {
        &self.worker
    }
}

impl GeneratorContext<dyn EventDispatch> {
    /// Notifies the bound dispatcher. `Ok(None)` if the notification was dropped.
    pub fn notify(&self) -> Result<Option<Dispatch>, BusError> {
        match self.shared.target() {
            Some(d) => d.dispatch().map(Some),
            None => Ok(None),
        }
    }
}

impl GeneratorContext<dyn CommandDispatch> {
    /// Hands `command` to the bound dispatcher. `Ok(None)` if it was dropped.
    pub fn notify(&self, command: Command) -> Result<Option<Dispatch>, BusError> {
        match self.shared.target() {
            Some(d) => d.dispatch(command).map(Some),
            None => Ok(None),
        }
    }

    /// Like [`notify`](Self::notify), but the caller keeps its handle on the command.
    pub fn notify_retained(&self, command: Arc<Command>) -> Result<Option<Dispatch>, BusError> {
        match self.shared.target() {
            Some(d) => d.dispatch_retained(command).map(Some),
            None => Ok(None),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::sync::atomic::AtomicUsize;
    use std::thread;
    use std::time::Instant;

    use crate::bus::{
        CommandDispatcher, CommandHandler, CommandRange, CommandType, Event, EventDispatcher,
        EventHandler,
    };
    use crate::device::DeviceClass;
    use crate::sync::lock;

    #[derive(Default)]
    struct Count(AtomicUsize);

    impl EventHandler for Count {
        fn notify_event(&self, _: &Event) {
            self.0.fetch_add(1, AtomicOrdering::SeqCst);
        }
    }

    fn wait_until(cond: impl Fn() -> bool) -> bool {
        let deadline = Instant::now() + Duration::from_secs(5);
        while !cond() {
            if Instant::now() > deadline {
                return false;
            }
            thread::sleep(Duration::from_millis(2));
        }
        true
    }

    #[test]
    fn test_enable_unbound_fails_without_thread() {
        let started = Arc::new(AtomicBool::new(false));
        let s = started.clone();
        let producer = EventGenerator::new("unbound", WorkerOptions::default(), move |_| {
            s.store(true, AtomicOrdering::SeqCst);
        });

        assert_eq!(producer.enable(), Err(BusError::NotConfigured));
        assert!(!producer.is_enabled());
        assert!(!producer.worker().is_running());
        assert!(!producer.worker().has_exited());
        thread::sleep(Duration::from_millis(20));
        assert!(!started.load(AtomicOrdering::SeqCst));
    }

    #[test]
    fn test_enabled_generator_delivers() {
        let count = Arc::new(Count::default());
        let producer = EventGenerator::new("tick", WorkerOptions::default(), |ctx| {
            while !ctx.should_stop() {
                let _ = ctx.notify();
                ctx.poll_for(Duration::from_millis(1));
            }
        });
        producer.bind(EventDispatcher::with_handler(count.clone(), false));
        producer.enable().unwrap();
        producer.enable().unwrap();

        assert!(wait_until(|| count.0.load(AtomicOrdering::SeqCst) >= 3));
        producer.terminate();
        assert!(producer.worker().has_exited());
    }

    #[test]
    fn test_disabled_notifications_are_dropped_not_queued() {
        let count = Arc::new(Count::default());
        let dispatcher = EventDispatcher::with_handler(count.clone(), true);
        let produced = Arc::new(AtomicUsize::new(0));
        let p = produced.clone();

        let producer = EventGenerator::new("burst", WorkerOptions::default(), move |ctx| {
            ctx.suspend();
            for _ in 0..5 {
                let _ = ctx.notify();
            }
            p.store(1, AtomicOrdering::SeqCst);
            ctx.suspend();
        });
        producer.bind(dispatcher.clone());
        producer.enable().unwrap();
        producer.disable();
        producer.worker().signal();

        assert!(wait_until(|| produced.load(AtomicOrdering::SeqCst) == 1));
        assert_eq!(producer.dropped(), 5);
        assert_eq!(dispatcher.pending(), 0);
        assert_eq!(count.0.load(AtomicOrdering::SeqCst), 0);
        producer.terminate();
    }

    #[test]
    fn test_command_generator_with_suspended_dispatcher() {
        #[derive(Default)]
        struct Sink(Mutex<Vec<u16>>);
        impl CommandHandler for Sink {
            fn supported(&self) -> CommandRange {
                CommandRange::ALL
            }
            fn notify_command(&self, command: &Command) -> Result<(), BusError> {
                lock(&self.0).push(command.command_type().0);
                Ok(())
            }
        }

        let sink = Arc::new(Sink::default());
        let dispatcher = CommandDispatcher::with_handler(sink.clone(), true);
        let statuses = Arc::new(Mutex::new(Vec::new()));
        let st = statuses.clone();

        let producer = CommandGenerator::new("cmds", WorkerOptions::default(), move |ctx| {
            for t in 1..=3 {
                let cmd = Command::new(CommandType(t), DeviceClass::Proxy, "0");
                lock(&st).push(ctx.notify(cmd));
            }
        });
        producer.bind(dispatcher.clone());
        producer.enable().unwrap();

        assert!(wait_until(|| producer.worker().has_exited()));
        assert!(
            lock(&statuses)
                .iter()
                .all(|s| *s == Ok(Some(Dispatch::Queued)))
        );
        assert_eq!(dispatcher.pending(), 3);

        assert_eq!(dispatcher.resume(false).delivered, 3);
        assert_eq!(*lock(&sink.0), vec![1, 2, 3]);
    }

    #[test]
    fn test_drop_terminates_worker() {
        let exited = Arc::new(AtomicBool::new(false));
        let e = exited.clone();
        let producer = EventGenerator::new("dropme", WorkerOptions::default(), move |ctx| {
            while !ctx.should_stop() {
                ctx.suspend();
            }
            e.store(true, AtomicOrdering::SeqCst);
        });
        producer.bind(EventDispatcher::with_handler(Arc::new(Count::default()), false));
        producer.enable().unwrap();
        drop(producer);
        assert!(exited.load(AtomicOrdering::SeqCst));
    }

    #[test]
    fn test_poll_sleeps_one_period() {
        let periods = Arc::new(Mutex::new(Vec::new()));
        let p = periods.clone();
        let producer = EventGenerator::with_period(
            "periodic",
            WorkerOptions::default(),
            Some(Duration::from_millis(5)),
            move |ctx| {
                let started = Instant::now();
                let woken = ctx.poll();
                lock(&p).push((ctx.period(), woken, started.elapsed()));
            },
        );
        producer.bind(EventDispatcher::with_handler(Arc::new(Count::default()), false));
        producer.enable().unwrap();

        assert!(wait_until(|| producer.worker().has_exited()));
        let seen = lock(&periods);
        assert_eq!(seen.len(), 1);
        let (period, woken, slept) = seen[0];
        assert_eq!(period, Some(Duration::from_millis(5)));
        assert!(!woken);
        assert!(slept >= Duration::from_millis(5));
    }
}

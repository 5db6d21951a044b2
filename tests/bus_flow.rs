use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, LazyLock, Mutex, Once};
use std::thread;
use std::time::{Duration, Instant};

use telebus::{
    Access, AuditHandler, BusError, Command, CommandDispatch, CommandDispatcher, CommandGenerator,
    CommandHandler, CommandRange, CommandType, Config, Context, Device, DeviceClass, Dispatch,
    GeneratorContext, MultipleCommandDispatcher, QueryDescriptor, QueryError, QueryRequest,
    QueryTable, Querible, ThreadState,
};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

static INIT: Once = Once::new();

fn init_tracing() {
    INIT.call_once(|| {
        let subscriber = FmtSubscriber::builder()
            .with_env_filter(EnvFilter::from_default_env())
            .with_test_writer()
            .finish();
        let _ = tracing::subscriber::set_global_default(subscriber);
    });
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

const DISPENSE: CommandType = CommandType(12);

/// A fuel terminal: a device, a command handler and an attribute owner at once.
struct Terminal {
    id: String,
    dispensed: AtomicU32,
    limit: AtomicU32,
    log: Mutex<Vec<u32>>,
}

impl Terminal {
    fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            dispensed: AtomicU32::new(0),
            limit: AtomicU32::new(100),
            log: Mutex::new(Vec::new()),
        }
    }
}

impl Device for Terminal {
    fn class(&self) -> DeviceClass {
        DeviceClass::FuelTerminal
    }
    fn id(&self) -> &str {
        &self.id
    }
    fn name(&self) -> &str {
        "fuel terminal"
    }
}

impl CommandHandler for Terminal {
    fn supported(&self) -> CommandRange {
        CommandRange::new(CommandType(10), CommandType(19))
    }

    fn notify_command(&self, command: &Command) -> Result<(), BusError> {
        self.accept(command)?;
        let volume: u32 = command
            .get("volume")
            .and_then(|v| v.parse().ok())
            .unwrap_or(0);
        self.dispensed.fetch_add(volume, Ordering::SeqCst);
        self.log.lock().unwrap().push(volume);
        Ok(())
    }
}

static TERMINAL_TABLE: LazyLock<QueryTable<Terminal>> = LazyLock::new(|| {
    QueryTable::new()
        .with(
            QueryDescriptor::new("FTOT", Access::ReadOnly)
                .label("total")
                .description("Litres dispensed since boot"),
            |t: &Terminal, _| Ok(t.dispensed.load(Ordering::SeqCst).to_string()),
        )
        .with(
            QueryDescriptor::new("FLIM", Access::ReadWrite)
                .label("limit")
                .description("Per-transaction limit")
                .values("1..999"),
            |t: &Terminal, req| match req {
                QueryRequest::Write(v) => {
                    let n: u32 = v.parse().map_err(|_| QueryError::InvalidValue {
                        name: "FLIM".into(),
                        reason: format!("{v:?} is not a number"),
                    })?;
                    t.limit.store(n, Ordering::SeqCst);
                    Ok(String::new())
                }
                _ => Ok(t.limit.load(Ordering::SeqCst).to_string()),
            },
        )
});

impl Querible for Terminal {
    fn owner(&self) -> &str {
        &self.id
    }

    fn query(&self, name: &str, request: QueryRequest<'_>) -> Result<String, QueryError> {
        TERMINAL_TABLE.dispatch(self, name, request)
    }
}

fn dispense(volume: u32) -> Command {
    Command::new(DISPENSE, DeviceClass::FuelTerminal, "T1")
        .with_origin("scheduler")
        .with_params([("volume", volume.to_string().as_str())])
        .unwrap()
}

#[test]
fn test_generator_to_fan_out_with_suspension() {
    init_tracing();
    let ctx = Context::builder(Config::default()).build();

    let terminal = Arc::new(Terminal::new("T1"));
    let as_device: Arc<dyn Device> = terminal.clone();
    let _registration = ctx.devices().attach(&as_device, false).unwrap();
    ctx.queries().register_table(&terminal, &TERMINAL_TABLE).unwrap();

    let found = ctx
        .devices()
        .lookup_as::<Terminal>(DeviceClass::FuelTerminal, "T1")
        .unwrap();
    assert!(Arc::ptr_eq(&found, &terminal));
    drop(found);

    let audit = Arc::new(AuditHandler::new(Vec::new()));
    let to_terminal: Arc<dyn CommandDispatch> =
        CommandDispatcher::with_handler(terminal.clone(), false);
    let to_audit: Arc<dyn CommandDispatch> = CommandDispatcher::with_handler(audit.clone(), false);
    let fan_out = Arc::new(MultipleCommandDispatcher::new());
    fan_out.add(Arc::clone(&to_terminal));
    fan_out.add(Arc::clone(&to_audit));

    to_terminal.suspend();

    let statuses = Arc::new(Mutex::new(Vec::new()));
    let st = Arc::clone(&statuses);
    let producer: CommandGenerator = ctx.generator(
        "dispense",
        move |g: &GeneratorContext<dyn CommandDispatch>| {
            for volume in [10, 20, 30] {
                st.lock().unwrap().push(g.notify(dispense(volume)));
            }
            while !g.should_stop() {
                g.suspend();
            }
        },
    );
    producer.bind(fan_out.clone());
    producer.enable().unwrap();

    assert!(wait_until(|| statuses.lock().unwrap().len() == 3));
    assert!(
        statuses
            .lock()
            .unwrap()
            .iter()
            .all(|s| *s == Ok(Some(Dispatch::Queued)))
    );
    assert_eq!(to_terminal.pending(), 3);
    assert_eq!(terminal.dispensed.load(Ordering::SeqCst), 0);

    let report = fan_out.resume(false);
    assert_eq!(report.delivered, 3);
    assert!(report.failed.is_empty());
    assert_eq!(*terminal.log.lock().unwrap(), vec![10, 20, 30]);

    assert_eq!(ctx.execute("$FTOT").to_string(), "FTOT: 60\r\n");
    assert_eq!(ctx.execute("FLIM=250").to_string(), "FLIM: OK\r\n");
    assert_eq!(terminal.limit.load(Ordering::SeqCst), 250);
    assert_eq!(
        ctx.execute("FLIM=lots").to_string(),
        "FLIM: ERROR invalid_value\r\n"
    );
    assert_eq!(
        ctx.execute("FTOT=1").to_string(),
        "FTOT: ERROR mode_not_supported\r\n"
    );

    let running = ctx.threads().dump();
    assert_eq!(running.len(), 1);
    assert_eq!(running[0].state, ThreadState::Running);

    assert_eq!(ctx.shutdown(), 1);
    assert!(producer.worker().has_exited());
    assert_eq!(ctx.threads().running(), 0);
    drop(producer);
    assert!(ctx.threads().is_empty());
}

#[test]
fn test_audit_trail_and_illegal_commands() {
    init_tracing();
    let terminal = Arc::new(Terminal::new("T2"));
    let audit = Arc::new(AuditHandler::new(Vec::new()));

    let fan_out = MultipleCommandDispatcher::new();
    fan_out.add(CommandDispatcher::with_handler(terminal.clone(), false));
    fan_out.add(CommandDispatcher::with_handler(audit.clone(), false));

    assert_eq!(fan_out.dispatch(dispense(5)).unwrap(), Dispatch::Delivered);

    let stray = Command::new(CommandType(99), DeviceClass::FuelTerminal, "T2");
    let err = fan_out.dispatch(stray.clone()).unwrap_err();
    assert_eq!(err.as_label(), "bus_illegal_command");

    drop(fan_out);
    let audit = Arc::try_unwrap(audit).ok().unwrap();
    let text = String::from_utf8(audit.into_inner()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines, vec![dispense(5).to_audit(), stray.to_audit()]);
    assert_eq!(terminal.dispensed.load(Ordering::SeqCst), 5);
}

#[test]
fn test_dropped_capability_releases_names() {
    init_tracing();
    let ctx = Context::builder(Config::default()).build();
    let terminal = Arc::new(Terminal::new("T3"));
    ctx.queries().register_table(&terminal, &TERMINAL_TABLE).unwrap();
    assert_eq!(ctx.queries().len(), 2);
    assert!(ctx.list_queries(None).ends_with("Total: 2\r\n"));

    drop(terminal);
    assert_eq!(
        ctx.execute("FTOT").to_string(),
        "FTOT: ERROR not_found\r\n"
    );

    let other = Arc::new(Terminal::new("T4"));
    ctx.queries().register_table(&other, &TERMINAL_TABLE).unwrap();
    assert_eq!(ctx.execute("FLIM").to_string(), "FLIM: 100\r\n");
}

//! Test helper utilities and common functionality.

use core::cell::RefCell;

use alloc::boxed::Box;
use alloc::format;
use alloc::rc::Rc;
use alloc::string::String;
use alloc::vec::Vec;

use crate::addrspace::AddressSpace;
use crate::arch::CooperativeArch;
use crate::config::SchedulerConfig;
use crate::kernel::Kernel;
use crate::sched::SchedPolicy;
use crate::thread::{Priority, ThreadEntry, ThreadId};

pub(crate) type TestKernel = Kernel<CooperativeArch>;

std::thread_local! {
    static TRACE: RefCell<Vec<String>> = RefCell::new(Vec::new());
    static LOG_LINES: RefCell<Vec<String>> = RefCell::new(Vec::new());
}

/// Logger keeping each test thread's messages apart.
struct CaptureLogger;

impl log::Log for CaptureLogger {
    fn enabled(&self, _metadata: &log::Metadata<'_>) -> bool {
        true
    }

    fn log(&self, record: &log::Record<'_>) {
        let line = format!("{}", record.args());
        LOG_LINES.with(|l| l.borrow_mut().push(line));
    }

    fn flush(&self) {}
}

static LOGGER: CaptureLogger = CaptureLogger;
static LOGGER_INIT: std::sync::Once = std::sync::Once::new();

/// Install the capturing logger and clear this thread's captured lines.
pub(crate) fn capture_logs() {
    LOGGER_INIT.call_once(|| {
        if log::set_logger(&LOGGER).is_ok() {
            log::set_max_level(log::LevelFilter::Trace);
        }
    });
    take_logs();
}

/// Drain the messages logged on this thread.
pub(crate) fn take_logs() -> Vec<String> {
    LOG_LINES.with(|l| core::mem::take(&mut *l.borrow_mut()))
}

/// Append an event to this test's trace.
pub(crate) fn trace(event: impl Into<String>) {
    let event = event.into();
    TRACE.with(|t| t.borrow_mut().push(event));
}

/// Drain and return this test's trace.
pub(crate) fn take_trace() -> Vec<String> {
    TRACE.with(|t| core::mem::take(&mut *t.borrow_mut()))
}

/// Kernel under `config` with the caller bootstrapped as thread "main".
pub(crate) fn boot(config: SchedulerConfig) -> (TestKernel, ThreadId) {
    boot_on(CooperativeArch::new(), config)
}

pub(crate) fn boot_on(arch: CooperativeArch, config: SchedulerConfig) -> (TestKernel, ThreadId) {
    take_trace();
    let mut kernel = Kernel::new(arch, config).unwrap();
    let main = kernel.bootstrap("main");
    (kernel, main)
}

pub(crate) fn boot_with(policy: SchedPolicy) -> (TestKernel, ThreadId) {
    boot(SchedulerConfig::new().with_policy(policy))
}

/// Create and fork a thread.
pub(crate) fn spawn(
    kernel: &mut TestKernel,
    name: &str,
    priority: Priority,
    entry: ThreadEntry<CooperativeArch>,
    arg: usize,
) -> ThreadId {
    let id = kernel.create_thread(name, priority).unwrap();
    kernel.fork(id, entry, arg).unwrap();
    id
}

/// Start routine that records the name of the thread running it.
pub(crate) fn record_name(kernel: &mut TestKernel, _arg: usize) {
    let name = String::from(kernel.current_thread().unwrap().name());
    trace(name);
}

/// Address space that logs every switch hook into a shared list.
pub(crate) struct RecordingSpace {
    log: Rc<RefCell<Vec<&'static str>>>,
}

impl RecordingSpace {
    pub(crate) fn new() -> (Box<dyn AddressSpace>, Rc<RefCell<Vec<&'static str>>>) {
        let log = Rc::new(RefCell::new(Vec::new()));
        let space = RecordingSpace { log: log.clone() };
        (Box::new(space), log)
    }
}

impl AddressSpace for RecordingSpace {
    fn save_state_on_switch(&mut self) {
        self.log.borrow_mut().push("save");
    }

    fn restore_state_on_switch(&mut self) {
        self.log.borrow_mut().push("restore");
    }
}

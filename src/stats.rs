//! Process-wide statistics registry.
//!
//! Every counter is monotonic and updated through `&self`, so interrupt
//! and device handlers can record events while the scheduler holds the
//! registry. The report is printed once at shutdown.

use core::fmt;
use portable_atomic::{AtomicU64, Ordering};

use crate::time::{TickCounter, TickMode, Ticks};

/// Sentinel for "no burst recorded yet" in the minimum-burst counter.
const NO_BURST: Ticks = Ticks::MAX;

/// Machine-wide performance counters.
#[derive(Debug)]
pub struct Statistics {
    ticks: TickCounter,

    disk_reads: AtomicU64,
    disk_writes: AtomicU64,
    console_chars_read: AtomicU64,
    console_chars_written: AtomicU64,
    page_faults: AtomicU64,
    packets_sent: AtomicU64,
    packets_received: AtomicU64,

    wait_time_total: AtomicU64,
    thread_count: AtomicU64,

    cpu_burst_count: AtomicU64,
    cpu_burst_total: AtomicU64,
    cpu_burst_min: AtomicU64,
    cpu_burst_max: AtomicU64,
}

impl Default for Statistics {
    fn default() -> Self {
        Self::new()
    }
}

impl Statistics {
    /// Create a registry with every counter at zero.
    pub const fn new() -> Self {
        Self {
            ticks: TickCounter::new(),
            disk_reads: AtomicU64::new(0),
            disk_writes: AtomicU64::new(0),
            console_chars_read: AtomicU64::new(0),
            console_chars_written: AtomicU64::new(0),
            page_faults: AtomicU64::new(0),
            packets_sent: AtomicU64::new(0),
            packets_received: AtomicU64::new(0),
            wait_time_total: AtomicU64::new(0),
            thread_count: AtomicU64::new(0),
            cpu_burst_count: AtomicU64::new(0),
            cpu_burst_total: AtomicU64::new(0),
            cpu_burst_min: AtomicU64::new(NO_BURST),
            cpu_burst_max: AtomicU64::new(0),
        }
    }

    /// Simulated machine clock.
    pub fn ticks(&self) -> &TickCounter {
        &self.ticks
    }

    /// Current time in ticks.
    pub fn now(&self) -> Ticks {
        self.ticks.now()
    }

    /// Advance the machine clock, charging `mode`.
    pub fn advance_ticks(&self, ticks: Ticks, mode: TickMode) -> Ticks {
        self.ticks.advance(ticks, mode)
    }

    pub fn record_disk_read(&self) {
        self.disk_reads.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_disk_write(&self) {
        self.disk_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_console_read(&self) {
        self.console_chars_read.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_console_write(&self) {
        self.console_chars_written.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_page_fault(&self) {
        self.page_faults.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_packet_sent(&self) {
        self.packets_sent.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_packet_received(&self) {
        self.packets_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Fold a destroyed thread's accumulated ready-queue wait into the
    /// totals.
    pub fn record_thread_exit(&self, wait_time_sum: Ticks) {
        self.wait_time_total.fetch_add(wait_time_sum, Ordering::AcqRel);
        self.thread_count.fetch_add(1, Ordering::AcqRel);
    }

    /// Record one completed CPU burst.
    ///
    /// Zero-length bursts are not bursts and are ignored.
    pub fn record_cpu_burst(&self, burst: Ticks) {
        if burst == 0 {
            return;
        }
        self.cpu_burst_count.fetch_add(1, Ordering::AcqRel);
        self.cpu_burst_total.fetch_add(burst, Ordering::AcqRel);
        self.cpu_burst_min.fetch_min(burst, Ordering::AcqRel);
        self.cpu_burst_max.fetch_max(burst, Ordering::AcqRel);
    }

    pub fn disk_reads(&self) -> u64 {
        self.disk_reads.load(Ordering::Relaxed)
    }

    pub fn disk_writes(&self) -> u64 {
        self.disk_writes.load(Ordering::Relaxed)
    }

    pub fn console_chars_read(&self) -> u64 {
        self.console_chars_read.load(Ordering::Relaxed)
    }

    pub fn console_chars_written(&self) -> u64 {
        self.console_chars_written.load(Ordering::Relaxed)
    }

    pub fn page_faults(&self) -> u64 {
        self.page_faults.load(Ordering::Relaxed)
    }

    pub fn packets_sent(&self) -> u64 {
        self.packets_sent.load(Ordering::Relaxed)
    }

    pub fn packets_received(&self) -> u64 {
        self.packets_received.load(Ordering::Relaxed)
    }

    pub fn wait_time_total(&self) -> Ticks {
        self.wait_time_total.load(Ordering::Acquire)
    }

    /// Number of threads destroyed so far.
    pub fn thread_count(&self) -> u64 {
        self.thread_count.load(Ordering::Acquire)
    }

    /// Mean ready-queue wait per completed thread, 0 when none completed.
    pub fn average_wait_time(&self) -> f64 {
        match self.thread_count() {
            0 => 0.0,
            n => self.wait_time_total() as f64 / n as f64,
        }
    }

    pub fn cpu_burst_count(&self) -> u64 {
        self.cpu_burst_count.load(Ordering::Acquire)
    }

    pub fn cpu_burst_total(&self) -> Ticks {
        self.cpu_burst_total.load(Ordering::Acquire)
    }

    /// Shortest burst seen, `None` before the first burst.
    pub fn cpu_burst_min(&self) -> Option<Ticks> {
        match self.cpu_burst_min.load(Ordering::Acquire) {
            NO_BURST => None,
            min => Some(min),
        }
    }

    /// Longest burst seen, `None` before the first burst.
    pub fn cpu_burst_max(&self) -> Option<Ticks> {
        match self.cpu_burst_count() {
            0 => None,
            _ => Some(self.cpu_burst_max.load(Ordering::Acquire)),
        }
    }

    /// Share of elapsed ticks spent doing work (system plus user).
    pub fn cpu_utilization(&self) -> f64 {
        match self.ticks.now() {
            0 => 0.0,
            total => (self.ticks.system() + self.ticks.user()) as f64 / total as f64,
        }
    }
}

impl fmt::Display for Statistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Thread wait statistics")?;
        writeln!(f, "  total wait time: {}", self.wait_time_total())?;
        writeln!(f, "  threads completed: {}", self.thread_count())?;
        writeln!(f, "  average wait time: {:.2}", self.average_wait_time())?;
        writeln!(f, "CPU usage statistics")?;
        writeln!(f, "  max CPU burst: {}", self.cpu_burst_max().unwrap_or(0))?;
        writeln!(f, "  min CPU burst: {}", self.cpu_burst_min().unwrap_or(0))?;
        writeln!(f, "  CPU burst count: {}", self.cpu_burst_count())?;
        writeln!(f, "  total CPU burst time: {}", self.cpu_burst_total())?;
        writeln!(f, "  CPU utilization: {:.2}%", self.cpu_utilization() * 100.0)?;
        writeln!(
            f,
            "Ticks: total {}, idle {}, system {}, user {}",
            self.ticks.now(),
            self.ticks.idle(),
            self.ticks.system(),
            self.ticks.user()
        )?;
        writeln!(f, "Disk I/O: reads {}, writes {}", self.disk_reads(), self.disk_writes())?;
        writeln!(
            f,
            "Console I/O: reads {}, writes {}",
            self.console_chars_read(),
            self.console_chars_written()
        )?;
        writeln!(f, "Paging: faults {}", self.page_faults())?;
        write!(
            f,
            "Network I/O: packets received {}, sent {}",
            self.packets_received(),
            self.packets_sent()
        )
    }
}

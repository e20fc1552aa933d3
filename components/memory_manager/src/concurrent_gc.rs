//! Background collector thread.
//!
//! [`ConcurrentCollector`] moves a [`Collector`] onto a dedicated thread that
//! runs cycles back to back, advancing each one in small steps so mutator
//! threads keep making progress on the shared graph. Between cycles the
//! thread sleeps for the configured pause unless a mutator asks for a cycle.
//!
//! Mutators talk to the thread through a cloneable [`CollectorHandle`]:
//!
//! - [`request_cycle`](CollectorHandle::request_cycle) wakes the thread early.
//! - [`request_and_wait`](CollectorHandle::request_and_wait) additionally
//!   blocks until a cycle that started after the call has completed. This is
//!   the out-of-memory fallback: every node that was garbage at the time of
//!   the call has been reclaimed once it returns `true`.

use crate::gc::Collector;
use crate::graph::Graph;
use core_types::{GcError, GcPhase, GcResult};
use crossbeam::channel::{self, Receiver, RecvTimeoutError, Sender};
use parking_lot::{Condvar, Mutex};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

/// Configuration for the background collector.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CollectorConfig {
    /// Idle time between two cycles (milliseconds)
    pub cycle_pause_ms: u64,
    /// Node visits per step before the thread yields
    pub step_budget: usize,
    /// Name of the collector thread
    pub thread_name: String,
    /// How long a mutator waits for an out-of-band cycle (milliseconds)
    pub oom_wait_ms: u64,
}

impl Default for CollectorConfig {
    fn default() -> Self {
        CollectorConfig {
            cycle_pause_ms: 1,
            step_budget: 5,
            thread_name: "gc-collector".to_string(),
            oom_wait_ms: 100,
        }
    }
}

impl CollectorConfig {
    /// Idle time between two cycles.
    pub fn cycle_pause(&self) -> Duration {
        Duration::from_millis(self.cycle_pause_ms)
    }

    /// Out-of-memory wait bound.
    pub fn oom_wait(&self) -> Duration {
        Duration::from_millis(self.oom_wait_ms)
    }
}

/// Message types for the collector thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum CollectorMessage {
    /// Start the next cycle without waiting out the pause
    Collect,
    /// Stop the collector thread
    Stop,
}

/// State shared between the collector thread and its handles.
struct Shared {
    graph: Arc<Graph>,
    completed: Mutex<u64>,
    cycle_done: Condvar,
    stop: AtomicBool,
}

impl Shared {
    fn complete(&self, cycle: u64) {
        *self.completed.lock() = cycle;
        self.cycle_done.notify_all();
    }
}

/// Cloneable mutator-side handle to a running [`ConcurrentCollector`].
#[derive(Clone)]
pub struct CollectorHandle {
    shared: Arc<Shared>,
    sender: Sender<CollectorMessage>,
}

impl CollectorHandle {
    /// Asks the collector to start its next cycle right away.
    pub fn request_cycle(&self) {
        // a closed channel means the thread is gone; nothing to wake
        let _ = self.sender.send(CollectorMessage::Collect);
    }

    /// Requests a cycle and blocks until one that started after this call has
    /// completed, or until `timeout` elapses.
    ///
    /// Returns false on timeout or if the collector thread has stopped.
    pub fn request_and_wait(&self, timeout: Duration) -> bool {
        let deadline = Instant::now() + timeout;
        let mut completed = self.shared.completed.lock();
        // the cycle in progress may have marked its roots before the garbage
        // was dropped, so wait for the one after it
        let target = self.shared.graph.cycles_started() + 1;
        self.request_cycle();

        while *completed < target {
            if self.shared.stop.load(Ordering::Acquire) {
                return false;
            }
            if self
                .shared
                .cycle_done
                .wait_until(&mut completed, deadline)
                .timed_out()
            {
                return *completed >= target;
            }
        }
        true
    }

    /// Number of cycles the background thread has completed.
    pub fn cycles_completed(&self) -> u64 {
        *self.shared.completed.lock()
    }

    /// The graph the collector works on.
    pub fn graph(&self) -> &Arc<Graph> {
        &self.shared.graph
    }
}

/// A [`Collector`] running on its own thread.
///
/// # Examples
///
/// ```
/// use std::sync::Arc;
/// use std::time::Duration;
/// use memory_manager::{Collector, CollectorConfig, ConcurrentCollector, Graph};
///
/// let graph = Arc::new(Graph::new(16).unwrap());
/// let garbage = graph.allocate().unwrap();
///
/// let collector = Collector::new(graph.clone()).unwrap();
/// let background = ConcurrentCollector::spawn(collector, CollectorConfig::default()).unwrap();
/// assert!(background.handle().request_and_wait(Duration::from_secs(5)));
/// assert!(graph.is_on_free_list(garbage));
///
/// let collector = background.stop();
/// assert!(collector.stats().cycles >= 1);
/// ```
pub struct ConcurrentCollector {
    shared: Arc<Shared>,
    sender: Sender<CollectorMessage>,
    thread: Option<JoinHandle<Collector>>,
}

impl ConcurrentCollector {
    /// Moves `collector` onto a new thread and starts collecting.
    ///
    /// Fails with `Spawn` if the thread cannot be created.
    pub fn spawn(collector: Collector, config: CollectorConfig) -> GcResult<Self> {
        let graph = collector.graph().clone();
        let completed = match graph.phase() {
            GcPhase::Idle => graph.cycles_started(),
            _ => graph.cycles_started() - 1,
        };
        let shared = Arc::new(Shared {
            graph,
            completed: Mutex::new(completed),
            cycle_done: Condvar::new(),
            stop: AtomicBool::new(false),
        });
        let (sender, receiver) = channel::unbounded::<CollectorMessage>();

        let thread_shared = Arc::clone(&shared);
        let thread_name = config.thread_name.clone();
        let thread = thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || collector_loop(collector, &thread_shared, &receiver, &config))
            .map_err(|err| GcError::Spawn(err.to_string()))?;

        tracing::debug!(thread = %thread_name, "collector thread started");
        Ok(ConcurrentCollector {
            shared,
            sender,
            thread: Some(thread),
        })
    }

    /// Returns a handle for mutator threads.
    pub fn handle(&self) -> CollectorHandle {
        CollectorHandle {
            shared: Arc::clone(&self.shared),
            sender: self.sender.clone(),
        }
    }

    /// Number of cycles completed so far.
    pub fn cycles_completed(&self) -> u64 {
        *self.shared.completed.lock()
    }

    /// Stops the thread and hands the collector back.
    ///
    /// The thread finishes the cycle in progress first, so the graph is idle
    /// when this returns. Re-raises a panic from the collector thread.
    pub fn stop(mut self) -> Collector {
        match self.shutdown() {
            Some(Ok(collector)) => collector,
            Some(Err(panic)) => std::panic::resume_unwind(panic),
            None => unreachable!("collector thread is joined only once"),
        }
    }

    fn shutdown(&mut self) -> Option<thread::Result<Collector>> {
        let thread = self.thread.take()?;
        self.shared.stop.store(true, Ordering::Release);
        let _ = self.sender.send(CollectorMessage::Stop);
        {
            // wake any mutator blocked in request_and_wait
            let _completed = self.shared.completed.lock();
            self.shared.cycle_done.notify_all();
        }
        let result = thread.join();
        tracing::debug!(
            cycles = self.cycles_completed(),
            "collector thread stopped"
        );
        Some(result)
    }
}

impl Drop for ConcurrentCollector {
    fn drop(&mut self) {
        if let Some(Err(_)) = self.shutdown() {
            tracing::warn!("collector thread panicked");
        }
    }
}

fn collector_loop(
    mut collector: Collector,
    shared: &Shared,
    receiver: &Receiver<CollectorMessage>,
    config: &CollectorConfig,
) -> Collector {
    let budget = config.step_budget.max(1);
    let pause = config.cycle_pause();

    // the stop flag is only honoured between cycles
    while !shared.stop.load(Ordering::Acquire) {
        loop {
            if let Some(report) = collector.step(budget) {
                shared.complete(report.cycle);
                break;
            }
            thread::yield_now();
        }
        if shared.stop.load(Ordering::Acquire) || !wait_for_work(receiver, pause) {
            break;
        }
    }
    collector
}

/// Sleeps for up to `pause`. Returns false when the thread should stop.
fn wait_for_work(receiver: &Receiver<CollectorMessage>, pause: Duration) -> bool {
    let first = match receiver.recv_timeout(pause) {
        Ok(message) => message,
        Err(RecvTimeoutError::Timeout) => return true,
        Err(RecvTimeoutError::Disconnected) => return false,
    };
    // collapse a burst of requests into one cycle
    std::iter::once(first)
        .chain(receiver.try_iter())
        .all(|message| message == CollectorMessage::Collect)
}

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, trace};

/// Periodic trigger that drives timed ticks
///
/// The playback controller starts it on play, stops it on pause/stop and
/// restarts it with a new period when the tick rate changes.
pub trait TickTrigger: Send {
    /// Start firing every `period`, cancelling any previous schedule
    fn start(&mut self, period: Duration);

    /// Stop firing. Takes effect immediately
    fn stop(&mut self);

    fn is_running(&self) -> bool;
}

/// One tick request emitted by [`IntervalTrigger`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TickSignal {
    generation: u64,
}

/// Tokio interval trigger
///
/// Every `start`/`stop` bumps a generation counter and aborts the running
/// task. [`TickStream`] drops signals from older generations, so a tick
/// already in flight from a cancelled schedule is never delivered.
pub struct IntervalTrigger {
    handle: Handle,
    tx: mpsc::Sender<TickSignal>,
    generation: Arc<AtomicU64>,
    task: Option<JoinHandle<()>>,
}

impl IntervalTrigger {
    /// Create a trigger and the stream its ticks arrive on
    pub fn channel(handle: Handle) -> (Self, TickStream) {
        // Capacity 1: a tick is never queued behind another
        let (tx, rx) = mpsc::channel(1);
        let generation = Arc::new(AtomicU64::new(0));
        let trigger = Self {
            handle,
            tx,
            generation: generation.clone(),
            task: None,
        };
        (trigger, TickStream { rx, generation })
    }

    fn cancel(&mut self) -> u64 {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }
}

impl TickTrigger for IntervalTrigger {
    fn start(&mut self, period: Duration) {
        let generation = self.cancel();
        let period = period.max(Duration::from_millis(1));
        let tx = self.tx.clone();
        debug!("Starting tick trigger: period={:?} generation={}", period, generation);

        self.task = Some(self.handle.spawn(async move {
            let mut interval = tokio::time::interval(period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            loop {
                interval.tick().await;
                match tx.try_send(TickSignal { generation }) {
                    Ok(()) => {}
                    Err(mpsc::error::TrySendError::Full(_)) => {
                        trace!("Previous tick still pending, skipping");
                    }
                    Err(mpsc::error::TrySendError::Closed(_)) => break,
                }
            }
        }));
    }

    fn stop(&mut self) {
        if self.task.is_some() {
            debug!("Stopping tick trigger");
        }
        self.cancel();
    }

    fn is_running(&self) -> bool {
        self.task.is_some()
    }
}

impl Drop for IntervalTrigger {
    fn drop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
    }
}

/// Receiving end of an [`IntervalTrigger`]
#[derive(Debug)]
pub struct TickStream {
    rx: mpsc::Receiver<TickSignal>,
    generation: Arc<AtomicU64>,
}

impl TickStream {
    /// Wait for the next current-generation tick
    ///
    /// Returns None once the trigger has been dropped. Cancel-safe.
    pub async fn recv(&mut self) -> Option<()> {
        loop {
            let signal = self.rx.recv().await?;
            if signal.generation == self.generation.load(Ordering::SeqCst) {
                return Some(());
            }
            trace!("Dropping stale tick from generation {}", signal.generation);
        }
    }
}

/// Trigger state shared between a [`ManualTrigger`] and its clones
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ManualTriggerState {
    pub running: bool,
    pub period: Option<Duration>,
    pub starts: usize,
    pub stops: usize,
}

/// Trigger that never fires on its own
///
/// Used when the caller drives ticks directly via `Timeline::tick`. Clones
/// share state, so tests can inspect how the controller drove it.
#[derive(Debug, Clone, Default)]
pub struct ManualTrigger {
    state: Arc<Mutex<ManualTriggerState>>,
}

impl ManualTrigger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> ManualTriggerState {
        self.state.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl TickTrigger for ManualTrigger {
    fn start(&mut self, period: Duration) {
        if let Ok(mut state) = self.state.lock() {
            state.running = true;
            state.period = Some(period);
            state.starts += 1;
        }
    }

    fn stop(&mut self) {
        if let Ok(mut state) = self.state.lock() {
            state.running = false;
            state.stops += 1;
        }
    }

    fn is_running(&self) -> bool {
        self.state.lock().map(|s| s.running).unwrap_or(false)
    }
}

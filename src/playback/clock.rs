//! Playback clock
//!
//! Tracks the position of the current tick in the timeline's unit: a frame
//! index in [`ClockMode::Frame`], elapsed milliseconds in [`ClockMode::Time`].
//! A separate integer frame counter is kept in both modes.

use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// Unit of the timeline clock
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClockMode {
    /// Position is an integer tick counter
    #[default]
    Frame,
    /// Position is elapsed milliseconds of playback
    Time,
}

/// Monotonic millisecond source
pub trait TimeSource: Send {
    fn now_ms(&self) -> f64;
}

/// Wall clock, measured from construction
///
/// Uses the tokio clock so paused test runtimes stay deterministic.
#[derive(Debug, Clone, Copy)]
pub struct SystemTime {
    origin: Instant,
}

impl SystemTime {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemTime {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeSource for SystemTime {
    fn now_ms(&self) -> f64 {
        self.origin.elapsed().as_secs_f64() * 1000.0
    }
}

/// Time source advanced by hand; clones share the same reading
#[derive(Debug, Clone, Default)]
pub struct ManualTime {
    now_us: Arc<AtomicU64>,
}

impl ManualTime {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now_us.fetch_add(by.as_micros() as u64, Ordering::SeqCst);
    }

    pub fn advance_ms(&self, ms: u64) {
        self.advance(Duration::from_millis(ms));
    }
}

impl TimeSource for ManualTime {
    fn now_ms(&self) -> f64 {
        self.now_us.load(Ordering::SeqCst) as f64 / 1000.0
    }
}

/// Timeline clock with pause accounting
///
/// Elapsed time is `now - origin`. While frozen the reading stops at the
/// freeze timestamp, and thawing moves the origin forward by the frozen
/// duration, so paused intervals never show up as elapsed time.
pub struct Clock {
    mode: ClockMode,
    tick_rate: f64,
    /// Index of the next tick
    frame: u64,
    /// Value evaluated by the current (or last) tick
    position: f64,
    origin_ms: f64,
    frozen_at: Option<f64>,
    source: Box<dyn TimeSource>,
}

impl Clock {
    /// Create a clock at the origin, frozen until the first `thaw`
    pub fn new(mode: ClockMode, tick_rate: f64, source: Box<dyn TimeSource>) -> Self {
        let now = source.now_ms();
        Self {
            mode,
            tick_rate,
            frame: 0,
            position: 0.0,
            origin_ms: now,
            frozen_at: Some(now),
            source,
        }
    }

    pub fn mode(&self) -> ClockMode {
        self.mode
    }

    pub fn tick_rate(&self) -> f64 {
        self.tick_rate
    }

    /// Period between timed ticks
    pub fn period(&self) -> Duration {
        Duration::from_secs_f64(1.0 / self.tick_rate)
    }

    /// Change the tick rate. Already-elapsed time is not touched
    ///
    /// In Time mode the frame counter is moved onto the new grid, so the
    /// next simulated tick follows the current position.
    pub fn set_tick_rate(&mut self, tick_rate: f64) {
        self.tick_rate = tick_rate;
        if self.mode == ClockMode::Time && self.frame > 0 {
            self.frame = self.frame_at(self.position) + 1;
        }
    }

    /// Convert a tick count into the clock's unit
    pub fn ticks_to_units(&self, ticks: f64) -> f64 {
        match self.mode {
            ClockMode::Frame => ticks,
            ClockMode::Time => ticks * 1000.0 / self.tick_rate,
        }
    }

    /// Index of the next tick
    pub fn frame(&self) -> u64 {
        self.frame
    }

    /// Value evaluated by the current (or last) tick
    pub fn position(&self) -> f64 {
        self.position
    }

    pub fn is_frozen(&self) -> bool {
        self.frozen_at.is_some()
    }

    /// Frame index containing `elapsed_ms` at the current tick rate
    pub fn frame_at(&self, elapsed_ms: f64) -> u64 {
        (elapsed_ms.max(0.0) * self.tick_rate / 1000.0).floor() as u64
    }

    /// Synthetic elapsed time of tick `frame`, independent of wall-clock speed
    pub fn simulated_ms(&self, frame: u64) -> f64 {
        frame as f64 * 1000.0 / self.tick_rate
    }

    /// Elapsed playback time, excluding frozen intervals
    pub fn elapsed_ms(&self) -> f64 {
        let now = self.frozen_at.unwrap_or_else(|| self.source.now_ms());
        (now - self.origin_ms).max(0.0)
    }

    /// Position the next tick will evaluate
    pub fn next_position(&self, simulate: bool) -> f64 {
        match self.mode {
            ClockMode::Frame => self.frame as f64,
            ClockMode::Time if simulate => self.simulated_ms(self.frame),
            ClockMode::Time => self.elapsed_ms(),
        }
    }

    /// Fix the position for the tick about to run
    ///
    /// A real-time tick in Time mode also derives the frame counter from
    /// the elapsed time.
    pub fn begin_tick(&mut self, simulate: bool) -> f64 {
        self.position = self.next_position(simulate);
        if self.mode == ClockMode::Time && !simulate {
            self.frame = self.frame_at(self.position);
        }
        self.position
    }

    /// Move the frame counter to the next tick
    pub fn end_tick(&mut self) {
        self.frame += 1;
    }

    /// Stop elapsed time from advancing
    pub fn freeze(&mut self) {
        if self.frozen_at.is_none() {
            self.frozen_at = Some(self.source.now_ms());
        }
    }

    /// Resume elapsed time, folding the frozen duration into the origin
    pub fn thaw(&mut self) {
        if let Some(frozen_at) = self.frozen_at.take() {
            self.origin_ms += self.source.now_ms() - frozen_at;
        }
    }

    /// Re-anchor the time origin so elapsed time reads `position` right now
    pub fn anchor_to(&mut self, position: f64) {
        let now = self.frozen_at.unwrap_or_else(|| self.source.now_ms());
        self.origin_ms = now - position;
    }

    /// Jump the clock to `position`; the next tick evaluates it
    pub fn seek(&mut self, position: f64) {
        let position = position.max(0.0);
        self.position = position;
        match self.mode {
            ClockMode::Frame => {
                self.frame = position.floor() as u64;
            }
            ClockMode::Time => {
                self.frame = self.frame_at(position);
                self.anchor_to(position);
            }
        }
    }

    /// Back to the origin
    pub fn reset(&mut self) {
        self.seek(0.0);
    }

    /// Back to the origin for a loop wrap
    ///
    /// In Time mode the origin is pushed one period ahead, so the next
    /// timed tick evaluates 0 rather than one period in.
    pub fn wrap(&mut self) {
        self.reset();
        if self.mode == ClockMode::Time {
            self.anchor_to(-self.ticks_to_units(1.0));
        }
    }
}

impl std::fmt::Debug for Clock {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Clock")
            .field("mode", &self.mode)
            .field("tick_rate", &self.tick_rate)
            .field("frame", &self.frame)
            .field("position", &self.position)
            .field("frozen", &self.is_frozen())
            .finish()
    }
}

pub mod clock;
pub mod engine;
pub mod hooks;
pub mod registry;

pub use clock::{Clock, ClockMode, ManualTime, SystemTime, TimeSource};
pub use engine::{SyncOutcome, Timeline, TimelineBuilder};
pub use hooks::{EventHub, Hook, HookEvent};
pub use registry::{Activation, BlockRegistry};

/// Playback state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Stopped,
    Playing,
    Paused,
}

impl PlaybackState {
    pub fn is_playing(&self) -> bool {
        *self == PlaybackState::Playing
    }
}

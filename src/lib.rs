//! Block-based playback scheduler for creative-coding sketches.
//!
//! A [`Timeline`] holds named blocks with `[start, end]` intervals on a
//! frame- or millisecond-based clock. Every tick it runs the callbacks of
//! the blocks containing the current position, fires lifecycle hooks and
//! reports progress to a host over a message channel.

pub mod config;
pub mod core;
pub mod error;
pub mod host;
pub mod input;
pub mod playback;

pub use config::TimelineConfig;
pub use error::{ReferenceError, TimelineError};
pub use playback::{ClockMode, Hook, HookEvent, PlaybackState, SyncOutcome, Timeline, TimelineBuilder};

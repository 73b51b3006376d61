//! Host-side plumbing: outbound notifications, inbound commands and the
//! tick trigger, plus the [`Player`] task tying them to a timeline.

pub mod command;
pub mod notify;
pub mod player;
pub mod trigger;

pub use command::{ChannelCommands, Command, CommandSource, JsonLinesCommands};
pub use notify::{ChannelHost, HostLink, Notification, NullHost, RecordedNotification, RecordingHost};
pub use player::Player;
pub use trigger::{IntervalTrigger, ManualTrigger, ManualTriggerState, TickSignal, TickStream, TickTrigger};

use crate::core::BlockSummary;
use crate::error::TimelineError;
use std::fmt;
use std::str::FromStr;

/// Lifecycle hooks fired by the timeline
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Hook {
    /// First tick of a run (frame counter 0)
    Start,
    FrameStart,
    /// A block became active; fired before its callback runs
    BlockStart,
    /// A block stopped being active
    BlockEnd,
    FrameEnd,
    /// The run passed the timeline end
    End,
    /// Fired after the clock wrapped back to the origin
    BeforeLoop,
}

impl Hook {
    pub const ALL: [Hook; 7] = [
        Hook::Start,
        Hook::FrameStart,
        Hook::BlockStart,
        Hook::BlockEnd,
        Hook::FrameEnd,
        Hook::End,
        Hook::BeforeLoop,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            Hook::Start => "start",
            Hook::FrameStart => "frameStart",
            Hook::BlockStart => "blockStart",
            Hook::BlockEnd => "blockEnd",
            Hook::FrameEnd => "frameEnd",
            Hook::End => "end",
            Hook::BeforeLoop => "beforeLoop",
        }
    }

    fn index(&self) -> usize {
        *self as usize
    }
}

impl fmt::Display for Hook {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Hook {
    type Err = TimelineError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Hook::ALL
            .iter()
            .copied()
            .find(|hook| hook.name() == s)
            .ok_or_else(|| TimelineError::UnknownHook(s.to_string()))
    }
}

/// What a listener receives when a hook fires
#[derive(Debug, Clone, PartialEq)]
pub struct HookEvent {
    pub hook: Hook,
    /// Frame counter of the tick
    pub frame: u64,
    /// Clock position of the tick
    pub position: f64,
    /// The transitioning block, for `BlockStart`/`BlockEnd`
    pub block: Option<BlockSummary>,
}

pub type Listener = Box<dyn FnMut(&HookEvent) + Send>;

/// Fixed set of hooks with at most one listener each
#[derive(Default)]
pub struct EventHub {
    listeners: [Option<Listener>; 7],
}

impl EventHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `listener` for `hook`, replacing any previous one
    pub fn on<F>(&mut self, hook: Hook, listener: F)
    where
        F: FnMut(&HookEvent) + Send + 'static,
    {
        self.listeners[hook.index()] = Some(Box::new(listener));
    }

    /// Remove the listener for `hook`, if any
    pub fn off(&mut self, hook: Hook) {
        self.listeners[hook.index()] = None;
    }

    pub fn has_listener(&self, hook: Hook) -> bool {
        self.listeners[hook.index()].is_some()
    }

    /// Fire `event`; a hook without a listener is a no-op
    pub fn fire(&mut self, event: &HookEvent) {
        if let Some(listener) = self.listeners[event.hook.index()].as_mut() {
            listener(event);
        }
    }
}

impl fmt::Debug for EventHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let registered: Vec<&str> = Hook::ALL
            .iter()
            .filter(|hook| self.has_listener(**hook))
            .map(|hook| hook.name())
            .collect();
        f.debug_struct("EventHub")
            .field("listeners", &registered)
            .finish()
    }
}

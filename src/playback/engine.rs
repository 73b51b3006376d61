use crate::config::TimelineConfig;
use crate::core::{
    Binding, Block, BlockDef, BlockFn, BlockSpec, BlockSummary, FunctionRegistry, Value, DEFAULT_SPAN,
};
use crate::error::TimelineError;
use crate::host::{Command, HostLink, ManualTrigger, Notification, NullHost, TickTrigger};
use crate::playback::clock::{Clock, ClockMode, SystemTime, TimeSource};
use crate::playback::hooks::{EventHub, Hook, HookEvent};
use crate::playback::registry::BlockRegistry;
use crate::playback::PlaybackState;
use std::sync::Arc;
use tracing::{debug, info, trace, warn};

/// Result of a registry replace request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncOutcome {
    Replaced { blocks: usize },
    /// The timeline was built with initial blocks, which are authoritative
    Ignored,
}

/// Block-based playback scheduler
///
/// Each tick evaluates the clock position, runs the callbacks of every
/// block whose interval contains it and fires lifecycle hooks. Ticks come
/// from the periodic trigger (`tick`) or, synchronously, from `jump_to`.
pub struct Timeline {
    clock: Clock,
    registry: BlockRegistry,
    functions: FunctionRegistry,
    hooks: EventHub,
    host: Box<dyn HostLink>,
    trigger: Box<dyn TickTrigger>,
    state: PlaybackState,
    /// Set while a jump forces playback on from a non-playing state
    quiet_transitions: bool,
    looping: bool,
    max_jump_ticks: u64,
}

/// Builder for [`Timeline`]
pub struct TimelineBuilder {
    config: TimelineConfig,
    blocks: Option<Vec<BlockSpec>>,
    functions: FunctionRegistry,
    draw: Option<BlockFn>,
    host: Box<dyn HostLink>,
    trigger: Box<dyn TickTrigger>,
    time_source: Box<dyn TimeSource>,
}

impl TimelineBuilder {
    pub fn new(config: TimelineConfig) -> Self {
        Self {
            config,
            blocks: None,
            functions: FunctionRegistry::new(),
            draw: None,
            host: Box::new(NullHost),
            trigger: Box::new(ManualTrigger::new()),
            time_source: Box::new(SystemTime::new()),
        }
    }

    /// Initial blocks. A non-empty set locks the registry against syncs
    pub fn blocks(mut self, blocks: Vec<BlockSpec>) -> Self {
        self.blocks = Some(blocks);
        self
    }

    /// Functions available to textual block references
    pub fn functions(mut self, functions: FunctionRegistry) -> Self {
        self.functions = functions;
        self
    }

    /// Callback for the default block installed when no blocks are given
    pub fn draw<F>(mut self, func: F) -> Self
    where
        F: Fn(&[Value]) + Send + Sync + 'static,
    {
        self.draw = Some(Arc::new(func));
        self
    }

    pub fn host(mut self, host: impl HostLink + 'static) -> Self {
        self.host = Box::new(host);
        self
    }

    pub fn trigger(mut self, trigger: impl TickTrigger + 'static) -> Self {
        self.trigger = Box::new(trigger);
        self
    }

    pub fn time_source(mut self, source: impl TimeSource + 'static) -> Self {
        self.time_source = Box::new(source);
        self
    }

    pub fn build(self) -> Timeline {
        let config = self.config;
        let tick_rate = if config.tick_rate.is_finite() && config.tick_rate > 0.0 {
            config.tick_rate
        } else {
            warn!("Invalid tick rate {}, using 60", config.tick_rate);
            60.0
        };

        let clock = Clock::new(config.mode, tick_rate, self.time_source);
        let span = clock.ticks_to_units(DEFAULT_SPAN);

        let registry = match self.blocks {
            Some(specs) if !specs.is_empty() => {
                BlockRegistry::load_locked(specs, span, &self.functions, self.host.as_ref())
            }
            _ => {
                let draw: BlockFn = match self.draw {
                    Some(draw) => draw,
                    None => Arc::new(|_: &[Value]| {}),
                };
                let default_block = BlockSpec {
                    title: "default".to_string(),
                    start: 0.0,
                    end: Some(clock.ticks_to_units(config.default_length)),
                    args: None,
                    binding: Binding::Direct(draw),
                };
                BlockRegistry::load(vec![default_block], span, &self.functions, self.host.as_ref())
            }
        };

        let mut timeline = Timeline {
            clock,
            registry,
            functions: self.functions,
            hooks: EventHub::new(),
            host: self.host,
            trigger: self.trigger,
            state: PlaybackState::Stopped,
            quiet_transitions: false,
            looping: config.looping,
            max_jump_ticks: config.max_jump_ticks,
        };

        info!(
            "Timeline ready: mode={:?} tick_rate={} blocks={} end={} locked={}",
            config.mode,
            tick_rate,
            timeline.registry.len(),
            timeline.registry.end(),
            timeline.registry.is_locked()
        );

        timeline.host.notify(Notification::TimelineReady(true));
        timeline
            .host
            .notify(Notification::InitTimeline(timeline.registry.summaries()));
        if config.autoplay {
            timeline.play();
        } else {
            timeline.host.notify(Notification::TimelinePlaying(false));
        }
        timeline
    }
}

impl Timeline {
    pub fn builder(config: TimelineConfig) -> TimelineBuilder {
        TimelineBuilder::new(config)
    }

    // === Accessors ===

    pub fn state(&self) -> PlaybackState {
        self.state
    }

    pub fn is_playing(&self) -> bool {
        self.state.is_playing()
    }

    pub fn is_looping(&self) -> bool {
        self.looping
    }

    pub fn mode(&self) -> ClockMode {
        self.clock.mode()
    }

    pub fn tick_rate(&self) -> f64 {
        self.clock.tick_rate()
    }

    /// Clock value of the most recent tick (0 at the origin)
    pub fn position(&self) -> f64 {
        self.clock.position()
    }

    /// Index of the next tick
    pub fn frame(&self) -> u64 {
        self.clock.frame()
    }

    /// Largest block end
    pub fn end(&self) -> f64 {
        self.registry.end()
    }

    pub fn blocks(&self) -> &[Block] {
        self.registry.blocks()
    }

    /// True when built with initial blocks (syncs are then ignored)
    pub fn has_initial_blocks(&self) -> bool {
        self.registry.is_locked()
    }

    pub fn functions_mut(&mut self) -> &mut FunctionRegistry {
        &mut self.functions
    }

    // === Event hub ===

    /// Register the listener for `hook`, replacing any previous one
    pub fn on<F>(&mut self, hook: Hook, listener: F)
    where
        F: FnMut(&HookEvent) + Send + 'static,
    {
        self.hooks.on(hook, listener);
    }

    /// Register a listener by hook name, e.g. `"blockStart"`
    pub fn on_named<F>(&mut self, name: &str, listener: F) -> Result<(), TimelineError>
    where
        F: FnMut(&HookEvent) + Send + 'static,
    {
        let hook = name.parse::<Hook>()?;
        self.hooks.on(hook, listener);
        Ok(())
    }

    pub fn off(&mut self, hook: Hook) {
        self.hooks.off(hook);
    }

    // === Ticking ===

    /// Timed tick. Ignored unless playing
    pub fn tick(&mut self) {
        if self.state != PlaybackState::Playing {
            trace!("Ignoring tick while {:?}", self.state);
            return;
        }
        if self.registry.is_empty() {
            trace!("Ignoring tick on empty timeline");
            return;
        }
        self.process_tick(false);
    }

    fn process_tick(&mut self, simulate: bool) {
        let first = self.clock.frame() == 0;
        let position = self.clock.begin_tick(simulate);

        if first {
            self.fire(Hook::Start, None);
        }
        self.host.notify(Notification::SetTimelineFrame(position));
        self.fire(Hook::FrameStart, None);

        let final_tick = position >= self.registry.end();
        let activation = self.registry.plan(position, final_tick);

        for &i in &activation.entering {
            let block = self.summary(i);
            self.fire(Hook::BlockStart, block);
            self.registry.set_active(i, true);
        }
        for &i in &activation.active {
            self.registry.invoke(i);
        }
        for &i in &activation.leaving {
            let block = self.summary(i);
            self.fire(Hook::BlockEnd, block);
            self.registry.set_active(i, false);
        }

        self.fire(Hook::FrameEnd, None);

        if final_tick {
            self.fire(Hook::End, None);
            if self.looping {
                self.clock.wrap();
                self.registry.deactivate_all();
                self.host.notify(Notification::SetTimelineFrame(0.0));
                self.fire(Hook::BeforeLoop, None);
                // The counter already sits at the origin for the next tick
                return;
            }
            self.halt();
        }

        self.clock.end_tick();
    }

    fn summary(&self, index: usize) -> Option<BlockSummary> {
        self.registry.blocks().get(index).map(Block::summary)
    }

    fn fire(&mut self, hook: Hook, block: Option<BlockSummary>) {
        let event = HookEvent {
            hook,
            frame: self.clock.frame(),
            position: self.clock.position(),
            block,
        };
        self.hooks.fire(&event);
    }

    // === Playback control ===

    /// Stopped/Paused -> Playing
    pub fn play(&mut self) {
        if self.state == PlaybackState::Playing {
            return;
        }
        self.clock.thaw();
        self.trigger.start(self.clock.period());
        self.set_state(PlaybackState::Playing);
    }

    /// Playing -> Paused, freezing the clock
    pub fn pause(&mut self) {
        if self.state != PlaybackState::Playing {
            return;
        }
        self.trigger.stop();
        self.clock.freeze();
        self.set_state(PlaybackState::Paused);
    }

    /// Any state -> Stopped, back at the origin
    pub fn stop(&mut self) {
        self.trigger.stop();
        self.clock.freeze();
        self.reset_to_origin();
        self.set_state(PlaybackState::Stopped);
    }

    /// Back to the origin, then play
    pub fn restart(&mut self) {
        self.reset_to_origin();
        self.play();
    }

    pub fn set_looping(&mut self, looping: bool) {
        self.looping = looping;
    }

    pub fn toggle_looping(&mut self) -> bool {
        self.looping = !self.looping;
        self.looping
    }

    /// Change ticks per second, rescheduling the trigger if it is running
    pub fn set_tick_rate(&mut self, tick_rate: f64) -> Result<(), TimelineError> {
        if !tick_rate.is_finite() || tick_rate <= 0.0 {
            return Err(TimelineError::InvalidTickRate(tick_rate));
        }
        self.clock.set_tick_rate(tick_rate);
        if self.trigger.is_running() {
            self.trigger.start(self.clock.period());
        }
        debug!("Tick rate set to {}", tick_rate);
        Ok(())
    }

    /// Fast-forward to `target` by ticking synchronously
    ///
    /// A target behind the current position restarts from the origin first, since
    /// block edge state depends on the path taken. Looping is off and
    /// playback forced on for the duration; both are restored afterwards.
    /// A jump that reaches the final tick ends the run.
    pub fn jump_to(&mut self, target: f64) -> Result<(), TimelineError> {
        let end = self.registry.end();
        if !target.is_finite() || target < 0.0 || target > end {
            debug!("Rejecting jump to {} (end {})", target, end);
            return Err(TimelineError::JumpOutOfRange { target, end });
        }
        if self.registry.is_empty() {
            return Err(TimelineError::EmptyTimeline);
        }

        if target < self.clock.position() {
            self.reset_to_origin();
        }

        let was_state = self.state;
        let was_looping = self.looping;
        self.quiet_transitions = !was_state.is_playing();
        self.state = PlaybackState::Playing;
        self.looping = false;

        let mut ticks = 0u64;
        let mut result = Ok(());
        while self.state == PlaybackState::Playing && self.clock.next_position(true) <= target {
            if ticks >= self.max_jump_ticks {
                warn!("Jump to {} exceeded {} ticks, aborting", target, self.max_jump_ticks);
                result = Err(TimelineError::JumpAborted { target, ticks });
                break;
            }
            self.process_tick(true);
            ticks += 1;
        }

        self.looping = was_looping;
        self.quiet_transitions = false;
        if self.state == PlaybackState::Playing {
            self.state = was_state;
        }
        if self.clock.mode() == ClockMode::Time {
            self.clock.anchor_to(self.clock.position());
        }

        debug!("Jumped to {} in {} ticks", self.clock.position(), ticks);
        result
    }

    // === Registry ===

    /// Replace blocks from a serialized definition list
    pub fn sync_timeline(&mut self, payload: &str) -> Result<SyncOutcome, TimelineError> {
        if self.registry.is_locked() {
            debug!("Ignoring sync: timeline has initial blocks");
            return Ok(SyncOutcome::Ignored);
        }
        let defs: Vec<BlockDef> = serde_json::from_str(payload)?;
        Ok(self.replace_blocks(defs.into_iter().map(BlockSpec::from).collect()))
    }

    /// Swap the block set and clamp the position into the new range
    pub fn replace_blocks(&mut self, specs: Vec<BlockSpec>) -> SyncOutcome {
        let span = self.clock.ticks_to_units(DEFAULT_SPAN);
        if !self
            .registry
            .replace(specs, span, &self.functions, self.host.as_ref())
        {
            return SyncOutcome::Ignored;
        }

        let end = self.registry.end();
        if self.clock.position() > end {
            self.clock.seek(end);
        }
        info!("Synced {} blocks, timeline end {}", self.registry.len(), end);
        SyncOutcome::Replaced {
            blocks: self.registry.len(),
        }
    }

    // === Commands ===

    /// Apply an inbound control command. Failures are logged, never raised
    pub fn apply(&mut self, command: Command) {
        match command {
            Command::JumpTo(target) => {
                if let Err(e) = self.jump_to(target) {
                    warn!("Jump ignored: {}", e);
                }
            }
            Command::SyncTimeline(payload) => match self.sync_timeline(&payload) {
                Ok(outcome) => debug!("Sync: {:?}", outcome),
                Err(e) => warn!("Sync ignored: {}", e),
            },
            Command::Play => {
                if self.clock.position() >= self.registry.end() {
                    self.reset_to_origin();
                }
                self.play();
            }
            Command::Stop => self.stop(),
            Command::Pause => self.pause(),
            Command::SetTickRate(rate) => {
                if let Err(e) = self.set_tick_rate(rate) {
                    warn!("Tick rate ignored: {}", e);
                }
            }
        }
    }

    // === Internal ===

    fn set_state(&mut self, state: PlaybackState) {
        if self.state != state {
            debug!("Playback {:?} -> {:?}", self.state, state);
            self.state = state;
            if !self.quiet_transitions {
                self.host
                    .notify(Notification::TimelinePlaying(state.is_playing()));
            }
        }
    }

    /// End of run without looping: stop in place
    fn halt(&mut self) {
        self.trigger.stop();
        self.clock.freeze();
        self.set_state(PlaybackState::Stopped);
    }

    fn reset_to_origin(&mut self) {
        self.clock.reset();
        self.registry.deactivate_all();
        self.host.notify(Notification::SetTimelineFrame(0.0));
    }
}

impl std::fmt::Debug for Timeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Timeline")
            .field("state", &self.state)
            .field("looping", &self.looping)
            .field("clock", &self.clock)
            .field("registry", &self.registry)
            .field("hooks", &self.hooks)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::RecordingHost;
    use crate::playback::clock::ManualTime;
    use std::sync::Mutex;
    use std::time::Duration;

    type Log = Arc<Mutex<Vec<String>>>;

    fn frame_config() -> TimelineConfig {
        TimelineConfig {
            looping: false,
            ..Default::default()
        }
    }

    fn logged_block(log: &Log, label: &str, start: f64, end: f64) -> BlockSpec {
        let log = log.clone();
        let name = label.to_string();
        BlockSpec::direct(label, start, move |_| log.lock().unwrap().push(format!("call:{}", name)))
            .with_end(end)
    }

    fn record_hooks(timeline: &mut Timeline, log: &Log) {
        for hook in Hook::ALL {
            let log = log.clone();
            timeline.on(hook, move |event| {
                let entry = match &event.block {
                    Some(block) => format!("{}:{}", event.hook, block.title),
                    None => event.hook.to_string(),
                };
                log.lock().unwrap().push(entry);
            });
        }
    }

    fn frames(host: &RecordingHost) -> Vec<f64> {
        host.notifications()
            .into_iter()
            .filter_map(|n| match n {
                Notification::SetTimelineFrame(p) => Some(p),
                _ => None,
            })
            .collect()
    }

    fn two_block_timeline(config: TimelineConfig) -> (Timeline, Log, RecordingHost, ManualTrigger) {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let host = RecordingHost::new();
        let trigger = ManualTrigger::new();
        let mut timeline = Timeline::builder(config)
            .blocks(vec![
                logged_block(&log, "a", 0.0, 1.0),
                logged_block(&log, "b", 1.0, 2.0),
            ])
            .host(host.clone())
            .trigger(trigger.clone())
            .time_source(ManualTime::new())
            .build();
        record_hooks(&mut timeline, &log);
        (timeline, log, host, trigger)
    }

    #[test]
    fn test_construction_notifications() {
        let (timeline, _log, host, trigger) = two_block_timeline(frame_config());

        let notifications = host.notifications();
        assert_eq!(notifications[0], Notification::TimelineReady(true));
        assert_eq!(
            notifications[1],
            Notification::InitTimeline(vec![
                BlockSummary { title: "a".to_string(), start: 0.0, end: 1.0 },
                BlockSummary { title: "b".to_string(), start: 1.0, end: 2.0 },
            ])
        );
        assert_eq!(notifications[2], Notification::TimelinePlaying(true));
        assert!(timeline.is_playing());
        assert!(trigger.state().running);
        assert!(timeline.has_initial_blocks());
    }

    #[test]
    fn test_default_block_installed() {
        let calls = Arc::new(Mutex::new(0));
        let counter = calls.clone();
        let mut timeline = Timeline::builder(TimelineConfig::default())
            .draw(move |_| *counter.lock().unwrap() += 1)
            .build();

        assert_eq!(timeline.blocks().len(), 1);
        assert_eq!(timeline.end(), 100.0);
        assert!(!timeline.has_initial_blocks());

        timeline.tick();
        timeline.tick();
        assert_eq!(*calls.lock().unwrap(), 2);
    }

    #[test]
    fn test_default_end_filling() {
        let functions = FunctionRegistry::new().with("scene", |_| {});
        let timeline = Timeline::builder(frame_config())
            .functions(functions)
            .blocks(vec![
                BlockSpec::reference("scene", 0.0),
                BlockSpec::reference("scene", 10.0),
                BlockSpec::reference("scene", 30.0),
            ])
            .build();

        let ends: Vec<f64> = timeline.blocks().iter().map(|b| b.end).collect();
        assert_eq!(ends, vec![9.0, 29.0, 130.0]);
        assert_eq!(timeline.end(), 130.0);
    }

    #[test]
    fn test_tick_event_order() {
        let (mut timeline, log, host, _trigger) = two_block_timeline(frame_config());

        for _ in 0..3 {
            timeline.tick();
        }

        assert_eq!(
            *log.lock().unwrap(),
            vec![
                "start", "frameStart", "blockStart:a", "call:a", "frameEnd",
                "frameStart", "blockStart:b", "call:a", "call:b", "frameEnd",
                "frameStart", "call:b", "blockEnd:a", "blockEnd:b", "frameEnd", "end",
            ]
        );
        assert_eq!(frames(&host), vec![0.0, 1.0, 2.0]);
        assert_eq!(timeline.state(), PlaybackState::Stopped);
        assert_eq!(timeline.position(), 2.0);
        assert_eq!(
            host.notifications().last(),
            Some(&Notification::TimelinePlaying(false))
        );
    }

    #[test]
    fn test_activation_idempotent() {
        let run = || {
            let (mut timeline, log, _host, _trigger) = two_block_timeline(frame_config());
            for _ in 0..5 {
                timeline.tick();
            }
            let entries = log.lock().unwrap().clone();
            entries
        };
        assert_eq!(run(), run());
    }

    #[test]
    fn test_loop_wraps_once() {
        let config = TimelineConfig {
            looping: true,
            ..Default::default()
        };
        let (mut timeline, log, host, _trigger) = two_block_timeline(config);

        for _ in 0..3 {
            timeline.tick();
        }
        {
            let log = log.lock().unwrap();
            assert_eq!(&log[log.len() - 3..], &["frameEnd", "end", "beforeLoop"]);
        }
        assert_eq!(timeline.frame(), 0);
        assert_eq!(timeline.position(), 0.0);
        assert!(timeline.is_playing());

        log.lock().unwrap().clear();
        timeline.tick();
        assert_eq!(
            *log.lock().unwrap(),
            vec!["start", "frameStart", "blockStart:a", "call:a", "frameEnd"]
        );
        // 0, 1, 2, reset to 0, then 0 again: no tick boundary skipped
        assert_eq!(frames(&host), vec![0.0, 1.0, 2.0, 0.0, 0.0]);
    }

    #[test]
    fn test_pause_ignores_ticks() {
        let (mut timeline, log, _host, trigger) = two_block_timeline(frame_config());
        timeline.tick();
        timeline.pause();
        assert_eq!(timeline.state(), PlaybackState::Paused);
        assert!(!trigger.state().running);

        let before = log.lock().unwrap().len();
        timeline.tick();
        timeline.tick();
        assert_eq!(log.lock().unwrap().len(), before);
        assert_eq!(timeline.frame(), 1);

        timeline.play();
        timeline.tick();
        assert_eq!(timeline.position(), 1.0);
    }

    #[test]
    fn test_state_transitions_notify() {
        let (mut timeline, _log, host, trigger) = two_block_timeline(frame_config());
        host.clear();

        timeline.play();
        assert!(host.notifications().is_empty());

        timeline.pause();
        timeline.pause();
        timeline.play();
        timeline.tick();
        timeline.stop();

        assert_eq!(
            host.notifications(),
            vec![
                Notification::TimelinePlaying(false),
                Notification::TimelinePlaying(true),
                Notification::SetTimelineFrame(0.0),
                Notification::SetTimelineFrame(0.0),
                Notification::TimelinePlaying(false),
            ]
        );
        assert_eq!(timeline.frame(), 0);
        assert_eq!(timeline.position(), 0.0);
        assert!(!trigger.state().running);
    }

    #[test]
    fn test_restart_resets_then_plays() {
        let (mut timeline, log, _host, _trigger) = two_block_timeline(frame_config());
        timeline.tick();
        timeline.tick();
        timeline.pause();

        timeline.restart();
        assert!(timeline.is_playing());
        assert_eq!(timeline.frame(), 0);

        log.lock().unwrap().clear();
        timeline.tick();
        assert_eq!(log.lock().unwrap()[0], "start");
        assert!(log.lock().unwrap().contains(&"blockStart:a".to_string()));
    }

    #[test]
    fn test_jump_forward() {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let host = RecordingHost::new();
        let mut timeline = Timeline::builder(TimelineConfig::default())
            .blocks(vec![logged_block(&log, "a", 0.0, 10.0)])
            .host(host.clone())
            .build();
        host.clear();

        timeline.jump_to(5.0).unwrap();

        assert_eq!(frames(&host), vec![0.0, 1.0, 2.0, 3.0, 4.0, 5.0]);
        assert_eq!(timeline.position(), 5.0);
        assert_eq!(log.lock().unwrap().len(), 6);
        assert!(timeline.is_playing());
        assert!(timeline.is_looping());
    }

    #[test]
    fn test_jump_backward_replays_from_origin() {
        let (mut timeline, log, host, _trigger) = two_block_timeline(frame_config());
        timeline.pause();
        timeline.jump_to(1.0).unwrap();
        host.clear();
        log.lock().unwrap().clear();

        timeline.jump_to(0.0).unwrap();

        assert_eq!(frames(&host), vec![0.0, 0.0]);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["start", "frameStart", "blockStart:a", "call:a", "frameEnd"]
        );
        assert_eq!(timeline.position(), 0.0);
        assert_eq!(timeline.state(), PlaybackState::Paused);
    }

    #[test]
    fn test_jump_out_of_range_changes_nothing() {
        let (mut timeline, log, host, _trigger) = two_block_timeline(frame_config());
        timeline.tick();
        let notifications = host.notifications().len();
        let entries = log.lock().unwrap().len();

        let end = timeline.end();
        assert!(matches!(
            timeline.jump_to(end + 1.0),
            Err(TimelineError::JumpOutOfRange { .. })
        ));
        assert!(timeline.jump_to(-1.0).is_err());
        assert!(timeline.jump_to(f64::NAN).is_err());

        assert_eq!(host.notifications().len(), notifications);
        assert_eq!(log.lock().unwrap().len(), entries);
        assert_eq!(timeline.frame(), 1);
        assert_eq!(timeline.position(), 0.0);
        assert!(timeline.is_playing());
    }

    #[test]
    fn test_runaway_jump_aborts() {
        let config = TimelineConfig {
            max_jump_ticks: 10,
            ..Default::default()
        };
        let mut timeline = Timeline::builder(config)
            .blocks(vec![BlockSpec::direct("long", 0.0, |_| {}).with_end(1e12)])
            .build();

        let result = timeline.jump_to(1e9);
        assert!(matches!(result, Err(TimelineError::JumpAborted { ticks: 10, .. })));
        assert_eq!(timeline.frame(), 10);
        assert!(timeline.is_playing());
        assert!(timeline.is_looping());
    }

    #[test]
    fn test_jump_to_end_finishes_run() {
        let (mut timeline, log, _host, trigger) = two_block_timeline(frame_config());
        timeline.jump_to(2.0).unwrap();

        assert_eq!(timeline.state(), PlaybackState::Stopped);
        assert!(!trigger.state().running);
        assert_eq!(log.lock().unwrap().last().map(String::as_str), Some("end"));

        // Playing from the end starts over
        timeline.apply(Command::Play);
        assert!(timeline.is_playing());
        assert_eq!(timeline.frame(), 0);
    }

    #[test]
    fn test_sync_ignored_with_initial_blocks() {
        let (mut timeline, _log, _host, _trigger) = two_block_timeline(frame_config());
        let outcome = timeline
            .sync_timeline(r#"[{"title": "other", "start": 0}]"#)
            .unwrap();

        assert_eq!(outcome, SyncOutcome::Ignored);
        let titles: Vec<&str> = timeline.blocks().iter().map(|b| b.title.as_str()).collect();
        assert_eq!(titles, vec!["a", "b"]);
    }

    #[test]
    fn test_sync_replaces_and_clamps() {
        let host = RecordingHost::new();
        let functions = FunctionRegistry::new().with("scene", |_| {});
        let mut timeline = Timeline::builder(frame_config())
            .functions(functions)
            .host(host.clone())
            .build();
        timeline.jump_to(50.0).unwrap();

        let outcome = timeline
            .sync_timeline(r#"[{"title": "scene(1)", "start": 0}, {"title": "scene(2)", "start": 10, "end": 20}]"#)
            .unwrap();

        assert_eq!(outcome, SyncOutcome::Replaced { blocks: 2 });
        assert_eq!(timeline.end(), 20.0);
        assert_eq!(timeline.position(), 20.0);
        assert_eq!(timeline.blocks()[0].end, 9.0);
        assert!(timeline.blocks().iter().all(|b| !b.is_active()));
        assert!(timeline.is_playing());
    }

    #[test]
    fn test_sync_malformed_payload() {
        let mut timeline = Timeline::builder(frame_config()).build();
        assert!(matches!(
            timeline.sync_timeline("not json"),
            Err(TimelineError::MalformedPayload(_))
        ));
        assert_eq!(timeline.blocks()[0].title, "default");
    }

    #[test]
    fn test_missing_function_runs_as_noop() {
        let host = RecordingHost::new();
        let mut timeline = Timeline::builder(frame_config())
            .host(host.clone())
            .build();

        timeline.apply(Command::SyncTimeline(
            r#"[{"title": "doesNotExist()", "start": 0, "end": 3}]"#.to_string(),
        ));

        let missing: Vec<Notification> = host
            .notifications()
            .into_iter()
            .filter(|n| matches!(n, Notification::TimelineFunctionMissing(_)))
            .collect();
        assert_eq!(
            missing,
            vec![Notification::TimelineFunctionMissing("doesNotExist()".to_string())]
        );

        let log: Log = Arc::new(Mutex::new(Vec::new()));
        record_hooks(&mut timeline, &log);
        timeline.tick();
        assert!(timeline.blocks()[0].is_active());
        assert!(log.lock().unwrap().contains(&"blockStart:doesNotExist()".to_string()));
    }

    #[test]
    fn test_tick_rate_reschedules_trigger() {
        let (mut timeline, _log, _host, trigger) = two_block_timeline(frame_config());
        let starts = trigger.state().starts;

        timeline.set_tick_rate(30.0).unwrap();
        let state = trigger.state();
        assert_eq!(state.starts, starts + 1);
        assert!((state.period.unwrap().as_secs_f64() - 1.0 / 30.0).abs() < 1e-9);

        timeline.pause();
        timeline.set_tick_rate(10.0).unwrap();
        assert_eq!(trigger.state().starts, starts + 1);
        assert_eq!(timeline.tick_rate(), 10.0);

        assert!(timeline.set_tick_rate(0.0).is_err());
        assert!(timeline.set_tick_rate(f64::INFINITY).is_err());
        assert_eq!(timeline.tick_rate(), 10.0);
    }

    #[test]
    fn test_on_named() {
        let (mut timeline, _log, _host, _trigger) = two_block_timeline(frame_config());
        assert!(timeline.on_named("beforeLoop", |_| {}).is_ok());
        assert!(matches!(
            timeline.on_named("afterLoop", |_| {}),
            Err(TimelineError::UnknownHook(_))
        ));
    }

    #[test]
    fn test_toggle_looping() {
        let mut timeline = Timeline::builder(frame_config()).build();
        assert!(!timeline.is_looping());
        assert!(timeline.toggle_looping());
        timeline.set_looping(false);
        assert!(!timeline.is_looping());
    }

    fn time_timeline(time: &ManualTime) -> Timeline {
        let config = TimelineConfig {
            mode: ClockMode::Time,
            tick_rate: 10.0,
            ..Default::default()
        };
        Timeline::builder(config)
            .blocks(vec![BlockSpec::direct("all", 0.0, |_| {}).with_end(10_000.0)])
            .time_source(time.clone())
            .build()
    }

    #[test]
    fn test_pause_transparency_time_mode() {
        let time = ManualTime::new();
        let mut straight = time_timeline(&time);
        let mut positions = Vec::new();
        for _ in 0..3 {
            straight.tick();
            positions.push(straight.position());
            time.advance_ms(100);
        }

        let time = ManualTime::new();
        let mut paused = time_timeline(&time);
        let mut paused_positions = Vec::new();
        for i in 0..3 {
            paused.tick();
            paused_positions.push(paused.position());
            if i == 1 {
                paused.pause();
                time.advance_ms(3_600_000);
                paused.play();
            }
            time.advance_ms(100);
        }

        assert_eq!(positions, vec![0.0, 100.0, 200.0]);
        assert_eq!(paused_positions, positions);
    }

    #[test]
    fn test_time_mode_jump_is_simulated() {
        let time = ManualTime::new();
        let mut timeline = time_timeline(&time);

        timeline.jump_to(450.0).unwrap();
        // Ticks at 0, 100, 200, 300, 400 ms
        assert_eq!(timeline.position(), 400.0);
        assert_eq!(timeline.frame(), 5);

        // Real-time ticks continue from the reached position
        time.advance_ms(100);
        timeline.tick();
        assert_eq!(timeline.position(), 500.0);
    }

    #[test]
    fn test_stopped_clock_does_not_run() {
        let time = ManualTime::new();
        let mut timeline = time_timeline(&time);
        timeline.stop();
        time.advance(Duration::from_secs(5));

        timeline.apply(Command::Play);
        timeline.tick();
        assert_eq!(timeline.position(), 0.0);
    }

    fn recorded_time_timeline(
        time: &ManualTime,
        tick_rate: f64,
        blocks: impl FnOnce(&Log) -> Vec<BlockSpec>,
    ) -> (Timeline, Log, RecordingHost) {
        let log: Log = Arc::new(Mutex::new(Vec::new()));
        let host = RecordingHost::new();
        let config = TimelineConfig {
            mode: ClockMode::Time,
            tick_rate,
            ..Default::default()
        };
        let mut timeline = Timeline::builder(config)
            .blocks(blocks(&log))
            .host(host.clone())
            .time_source(time.clone())
            .build();
        record_hooks(&mut timeline, &log);
        (timeline, log, host)
    }

    #[test]
    fn test_time_mode_backward_jump_restarts() {
        let time = ManualTime::new();
        let (mut timeline, log, host) =
            recorded_time_timeline(&time, 10.0, |log| vec![logged_block(log, "all", 0.0, 10_000.0)]);

        timeline.tick();
        time.advance_ms(2_000);
        timeline.tick();
        assert_eq!(timeline.position(), 2_000.0);

        host.clear();
        log.lock().unwrap().clear();
        timeline.jump_to(500.0).unwrap();

        assert_eq!(
            frames(&host),
            vec![0.0, 0.0, 100.0, 200.0, 300.0, 400.0, 500.0]
        );
        {
            let log = log.lock().unwrap();
            assert_eq!(&log[..3], &["start", "frameStart", "blockStart:all"]);
            assert_eq!(log.iter().filter(|e| *e == "start").count(), 1);
        }
        assert_eq!(timeline.position(), 500.0);
        assert!(timeline.is_playing());

        time.advance_ms(100);
        timeline.tick();
        assert_eq!(timeline.position(), 600.0);
    }

    #[test]
    fn test_time_mode_jump_after_rate_change() {
        let time = ManualTime::new();
        let (mut timeline, log, host) =
            recorded_time_timeline(&time, 10.0, |log| vec![logged_block(log, "all", 0.0, 10_000.0)]);

        for _ in 0..3 {
            timeline.tick();
            time.advance_ms(100);
        }
        assert_eq!(timeline.position(), 200.0);

        timeline.set_tick_rate(100.0).unwrap();
        host.clear();
        log.lock().unwrap().clear();
        timeline.jump_to(250.0).unwrap();

        // Continues forward on the new 10 ms grid, no restart
        assert_eq!(frames(&host), vec![210.0, 220.0, 230.0, 240.0, 250.0]);
        assert!(!log.lock().unwrap().contains(&"start".to_string()));
        assert_eq!(timeline.position(), 250.0);
    }

    #[test]
    fn test_time_mode_loop_wraps() {
        let time = ManualTime::new();
        let (mut timeline, log, host) =
            recorded_time_timeline(&time, 10.0, |log| vec![logged_block(log, "scene", 0.0, 250.0)]);

        for _ in 0..4 {
            timeline.tick();
            time.advance_ms(100);
        }
        {
            let log = log.lock().unwrap();
            assert_eq!(
                &log[log.len() - 4..],
                &["blockEnd:scene", "frameEnd", "end", "beforeLoop"]
            );
        }
        assert_eq!(timeline.position(), 0.0);
        assert_eq!(timeline.frame(), 0);

        log.lock().unwrap().clear();
        timeline.tick();
        assert_eq!(timeline.position(), 0.0);
        assert_eq!(
            *log.lock().unwrap(),
            vec!["start", "frameStart", "blockStart:scene", "call:scene", "frameEnd"]
        );

        time.advance_ms(100);
        timeline.tick();
        assert_eq!(timeline.position(), 100.0);
        assert_eq!(frames(&host), vec![0.0, 100.0, 200.0, 300.0, 0.0, 0.0, 100.0]);
    }

    #[test]
    fn test_time_mode_sync_clamps() {
        let time = ManualTime::new();
        let config = TimelineConfig {
            mode: ClockMode::Time,
            tick_rate: 10.0,
            ..Default::default()
        };
        let mut timeline = Timeline::builder(config)
            .functions(FunctionRegistry::new().with("scene", |_| {}))
            .time_source(time.clone())
            .build();
        // Default block length is counted in ticks
        assert_eq!(timeline.end(), 10_000.0);

        timeline.tick();
        time.advance_ms(3_000);
        timeline.tick();
        assert_eq!(timeline.position(), 3_000.0);

        let outcome = timeline
            .sync_timeline(r#"[{"title": "scene", "start": 0, "end": 1000}]"#)
            .unwrap();

        assert_eq!(outcome, SyncOutcome::Replaced { blocks: 1 });
        assert_eq!(timeline.end(), 1_000.0);
        assert_eq!(timeline.position(), 1_000.0);
        assert!(timeline.is_playing());
    }

    #[test]
    fn test_time_mode_trailing_span_in_ticks() {
        let config = TimelineConfig {
            mode: ClockMode::Time,
            tick_rate: 50.0,
            ..Default::default()
        };
        let mut timeline = Timeline::builder(config)
            .functions(FunctionRegistry::new().with("noop", |_| {}))
            .time_source(ManualTime::new())
            .build();
        assert_eq!(timeline.end(), 2_000.0);

        timeline
            .sync_timeline(r#"[{"title": "noop", "start": 0}, {"title": "noop", "start": 500}]"#)
            .unwrap();
        let ends: Vec<f64> = timeline.blocks().iter().map(|b| b.end).collect();
        assert_eq!(ends, vec![499.0, 2_500.0]);
    }

    #[test]
    fn test_paused_jump_to_end_stays_quiet() {
        let (mut timeline, _log, host, _trigger) = two_block_timeline(frame_config());
        timeline.pause();
        host.clear();

        timeline.jump_to(2.0).unwrap();

        assert!(!host
            .notifications()
            .iter()
            .any(|n| matches!(n, Notification::TimelinePlaying(_))));
        assert_eq!(timeline.state(), PlaybackState::Stopped);
    }
}

use crate::host::command::CommandSource;
use crate::host::trigger::TickStream;
use crate::playback::Timeline;
use tracing::{debug, info};

/// Drives a [`Timeline`] from a tick stream and a command source
///
/// Everything runs on one task, so a tick and a command never interleave.
/// Commands are polled first: a pause that arrives together with a tick
/// wins.
pub struct Player {
    timeline: Timeline,
    ticks: TickStream,
    commands: Box<dyn CommandSource>,
}

impl Player {
    pub fn new(timeline: Timeline, ticks: TickStream, commands: impl CommandSource + 'static) -> Self {
        Self {
            timeline,
            ticks,
            commands: Box::new(commands),
        }
    }

    pub fn timeline(&self) -> &Timeline {
        &self.timeline
    }

    /// Run until the command source closes, then hand the timeline back
    pub async fn run(mut self) -> Timeline {
        info!("Player started");
        let mut ticks_open = true;

        loop {
            tokio::select! {
                biased;

                command = self.commands.next_command() => match command {
                    Some(command) => {
                        debug!("Command: {:?}", command);
                        self.timeline.apply(command);
                    }
                    None => {
                        debug!("Command source closed");
                        break;
                    }
                },

                tick = self.ticks.recv(), if ticks_open => match tick {
                    Some(()) => self.timeline.tick(),
                    None => {
                        debug!("Tick stream closed");
                        ticks_open = false;
                    }
                },
            }
        }

        self.timeline.stop();
        info!("Player stopped at position {}", self.timeline.position());
        self.timeline
    }
}

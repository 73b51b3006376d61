use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, Lines};
use tokio::sync::mpsc;
use tracing::warn;

/// Inbound control command, one per playback controller operation
///
/// Wire format is `{"messageType": "...", "message": ...}`. The older
/// `jumpToFrame`, `playTimeline` and `stopTimeline` names are accepted too.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "messageType", content = "message", rename_all = "camelCase")]
pub enum Command {
    #[serde(alias = "jumpToFrame")]
    JumpTo(f64),
    /// JSON-encoded list of block definitions
    SyncTimeline(String),
    #[serde(alias = "playTimeline")]
    Play,
    #[serde(alias = "stopTimeline")]
    Stop,
    #[serde(alias = "pauseTimeline")]
    Pause,
    SetTickRate(f64),
}

/// Source of inbound commands
///
/// `next_command` must be cancel-safe: the player polls it inside
/// `tokio::select!` alongside the tick stream.
#[async_trait]
pub trait CommandSource: Send {
    /// Next command, or None once the source is closed
    async fn next_command(&mut self) -> Option<Command>;
}

/// Commands delivered over a tokio channel
#[derive(Debug)]
pub struct ChannelCommands {
    rx: mpsc::Receiver<Command>,
}

impl ChannelCommands {
    pub fn new(rx: mpsc::Receiver<Command>) -> Self {
        Self { rx }
    }

    /// Create a command source together with its sending end
    pub fn channel(capacity: usize) -> (mpsc::Sender<Command>, Self) {
        let (tx, rx) = mpsc::channel(capacity);
        (tx, Self { rx })
    }
}

#[async_trait]
impl CommandSource for ChannelCommands {
    async fn next_command(&mut self) -> Option<Command> {
        self.rx.recv().await
    }
}

/// Commands read as one JSON object per line
///
/// Blank lines are skipped; unparseable lines are logged and skipped.
pub struct JsonLinesCommands<R> {
    lines: Lines<R>,
}

impl<R: AsyncBufRead + Unpin + Send> JsonLinesCommands<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
        }
    }
}

#[async_trait]
impl<R: AsyncBufRead + Unpin + Send> CommandSource for JsonLinesCommands<R> {
    async fn next_command(&mut self) -> Option<Command> {
        loop {
            let line = match self.lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) => return None,
                Err(e) => {
                    warn!("Failed to read command line: {}", e);
                    return None;
                }
            };

            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            match serde_json::from_str::<Command>(line) {
                Ok(command) => return Some(command),
                Err(e) => warn!("Ignoring malformed command {:?}: {}", line, e),
            }
        }
    }
}

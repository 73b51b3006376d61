//! Timeline error types.

/// Errors returned by timeline operations.
///
/// None of these are fatal: the timeline stays in its current state and
/// keeps running.
#[derive(Debug, thiserror::Error)]
pub enum TimelineError {
    #[error("Jump target {target} is outside the timeline [0, {end}]")]
    JumpOutOfRange { target: f64, end: f64 },

    #[error("Jump to {target} aborted after {ticks} ticks")]
    JumpAborted { target: f64, ticks: u64 },

    #[error("Timeline has no blocks")]
    EmptyTimeline,

    #[error("Invalid tick rate: {0}")]
    InvalidTickRate(f64),

    #[error("Unknown hook: {0}")]
    UnknownHook(String),

    #[error("Malformed block payload: {0}")]
    MalformedPayload(#[from] serde_json::Error),
}

/// Errors from parsing a textual block reference such as `circle(10, "red")`.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ReferenceError {
    #[error("Empty block reference")]
    Empty,

    #[error("Invalid function name at position {pos}")]
    InvalidName { pos: usize },

    #[error("Unexpected character '{ch}' at position {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("Unexpected end of input")]
    UnexpectedEnd,

    #[error("Unterminated string starting at position {pos}")]
    UnterminatedString { pos: usize },

    #[error("Invalid number literal '{text}'")]
    InvalidNumber { text: String },
}

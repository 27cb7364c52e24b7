use crate::context::{offline::DriverState, ContextMode};
use crate::graph::GraphError;

/// Crate-wide result type
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by contexts, clocks and the device wrapper
#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// Operation is only valid in the other clock mode
    InvalidMode {
        operation: &'static str,
        mode: ContextMode,
    },
    /// The host lacks the capability (e.g. no audio input support)
    UnsupportedOperation(String),
    /// A requested named resource does not exist
    NotFound(String),
    /// The delegated native render step failed; cause is passed through unchanged
    NativeRenderFailure(GraphError),
    /// The offline driver already reached a terminal state
    TerminalState(DriverState),
    /// The context has been closed
    Closed,
    /// Construction parameter out of range
    InvalidConfig {
        field: &'static str,
        reason: String,
    },
    /// Time value that is negative or not finite
    InvalidTime(f64),
    /// Device backend failure while opening or running a stream
    Device(String),
    /// Graph wiring failed (unknown node, cycle, consumed stream)
    Graph(GraphError),
}

impl std::fmt::Display for Error {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Error::InvalidMode { operation, mode } => {
                write!(f, "`{}` is not available on a {} context", operation, mode)
            }
            Error::UnsupportedOperation(what) => write!(f, "unsupported: {}", what),
            Error::NotFound(what) => write!(f, "not found: {}", what),
            Error::NativeRenderFailure(cause) => write!(f, "native render failed: {}", cause),
            Error::TerminalState(state) => {
                write!(f, "offline render already finished (state: {:?})", state)
            }
            Error::Closed => write!(f, "context is closed"),
            Error::InvalidConfig { field, reason } => {
                write!(f, "invalid `{}`: {}", field, reason)
            }
            Error::InvalidTime(value) => write!(f, "invalid time value: {}", value),
            Error::Device(message) => write!(f, "device error: {}", message),
            Error::Graph(cause) => write!(f, "graph error: {}", cause),
        }
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Error::NativeRenderFailure(cause) | Error::Graph(cause) => Some(cause),
            _ => None,
        }
    }
}

impl From<GraphError> for Error {
    fn from(err: GraphError) -> Self {
        Error::Graph(err)
    }
}

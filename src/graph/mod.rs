//! Boundary to the native graph engine.
//!
//! The timing core never processes samples itself. It asks a
//! [`GraphPrimitiveProvider`] to create and wire nodes and, for offline
//! contexts, to render the finished graph once. [`software::SoftwareGraph`]
//! is a small in-process provider used by the CLI, tests and benches.

/// Reference in-process provider.
pub mod software;

use crate::{context::offline::RenderJob, dsp::ShaperCurve, io::stream::MediaStream, Seconds};

pub use software::SoftwareGraph;

/// Opaque handle to a node owned by a provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NodeHandle(pub(crate) u32);

impl NodeHandle {
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Errors reported by a graph provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// Handle does not belong to this graph
    UnknownNode(NodeHandle),
    /// Source has no output or destination has no input
    InvalidConnection {
        source: NodeHandle,
        destination: NodeHandle,
    },
    /// Connection would feed a node back into itself
    Cycle {
        source: NodeHandle,
        destination: NodeHandle,
    },
    /// The stream's reader was already handed to a node
    StreamConsumed,
    /// The destination lives as long as the graph
    PermanentNode(NodeHandle),
    /// The provider renders once and already has
    AlreadyRendered,
    /// The provider was closed
    Closed,
    /// Failure inside the engine itself
    Backend(String),
}

impl std::fmt::Display for GraphError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            GraphError::UnknownNode(node) => write!(f, "unknown node {}", node.0),
            GraphError::InvalidConnection {
                source,
                destination,
            } => write!(f, "cannot connect node {} to node {}", source.0, destination.0),
            GraphError::Cycle {
                source,
                destination,
            } => write!(
                f,
                "connecting node {} to node {} would create a cycle",
                source.0, destination.0
            ),
            GraphError::StreamConsumed => write!(f, "stream is already connected to a source node"),
            GraphError::PermanentNode(node) => write!(f, "node {} cannot be released", node.0),
            GraphError::AlreadyRendered => write!(f, "graph has already been rendered"),
            GraphError::Closed => write!(f, "graph is closed"),
            GraphError::Backend(message) => write!(f, "{}", message),
        }
    }
}

impl std::error::Error for GraphError {}

/// Output of a delegated render; the timing core never inspects samples
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedBuffer {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl RenderedBuffer {
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Self {
        Self {
            sample_rate,
            channels,
        }
    }

    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Frames per channel
    pub fn len(&self) -> usize {
        self.channels.first().map_or(0, Vec::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn duration(&self) -> Seconds {
        self.len() as Seconds / self.sample_rate as Seconds
    }

    pub fn channel(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    pub fn into_channels(self) -> Vec<Vec<f32>> {
        self.channels
    }
}

/// Node construction and wiring, plus the one-shot offline render
pub trait GraphPrimitiveProvider {
    fn sample_rate(&self) -> u32;

    /// The node that feeds the device (realtime) or the render buffer (offline)
    fn destination(&self) -> NodeHandle;

    fn connect(&mut self, source: NodeHandle, destination: NodeHandle) -> Result<(), GraphError>;

    /// Remove every outgoing connection of `node`
    fn disconnect(&mut self, node: NodeHandle) -> Result<(), GraphError>;

    /// Disconnect `node` and drop it; its handle is invalid afterwards
    fn release(&mut self, node: NodeHandle) -> Result<(), GraphError> {
        self.disconnect(node)
    }

    fn create_shaper(&mut self, curve: ShaperCurve) -> Result<NodeHandle, GraphError>;

    /// Wrap a live input stream; takes the stream's sample reader
    fn create_stream_source(&mut self, stream: &mut MediaStream) -> Result<NodeHandle, GraphError>;

    /// Render the whole graph for `job`; valid once per provider
    fn start_rendering(&mut self, job: &RenderJob) -> Result<RenderedBuffer, GraphError>;

    /// Release engine resources
    fn close(&mut self) -> Result<(), GraphError> {
        Ok(())
    }
}

use rtrb::Consumer;

use super::{GraphError, GraphPrimitiveProvider, NodeHandle, RenderedBuffer};
use crate::{context::offline::RenderJob, dsp::ShaperCurve, io::stream::MediaStream, RENDER_QUANTUM};

/*
Software Graph
==============

A minimal pull-based graph used where no native engine is available. It only
knows the primitives the timing core asks for; there is no DSP beyond
summing and shaping.

Node Kinds
----------

  Destination    Sums its inputs. Index 0, always present.
  Shaper         Sums its inputs, then maps each sample through a curve.
  StreamSource   Reads captured samples; missing samples render as silence.
  Constant       Emits one value forever (handy as a test signal).

Released nodes leave a vacant slot that the next created node reuses, so
opening and closing inputs on a long-lived graph does not grow it.

Rendering
---------

Connections are stored on the receiving node. Before rendering, nodes
reachable from the destination are ordered so every node comes after its
inputs:

    Constant ──→ Shaper ──→ Destination
                   ↑
    Stream ────────┘

Each block of RENDER_QUANTUM frames then evaluates that order once. The mono
result is copied to every output channel. Cycles are rejected at connect
time, so the order always exists.
*/

enum NodeKind {
    Destination,
    Shaper(ShaperCurve),
    StreamSource(Consumer<f32>),
    Constant(f32),
    Vacant,
}

impl NodeKind {
    fn has_output(&self) -> bool {
        !matches!(self, NodeKind::Destination | NodeKind::Vacant)
    }

    fn has_input(&self) -> bool {
        matches!(self, NodeKind::Destination | NodeKind::Shaper(_))
    }
}

struct Node {
    kind: NodeKind,
    /// Nodes connected into this one, in connection order
    inputs: Vec<NodeHandle>,
}

/// In-process [`GraphPrimitiveProvider`]
pub struct SoftwareGraph {
    sample_rate: u32,
    nodes: Vec<Node>,
    rendered: bool,
    closed: bool,
    fail_next_render: Option<String>,
    /// Released slots, reused by `push`
    vacant: Vec<NodeHandle>,
}

impl SoftwareGraph {
    pub fn new(sample_rate: u32) -> Self {
        Self {
            sample_rate,
            nodes: vec![Node {
                kind: NodeKind::Destination,
                inputs: Vec::new(),
            }],
            rendered: false,
            closed: false,
            fail_next_render: None,
            vacant: Vec::new(),
        }
    }

    /// Add a node that outputs `value` on every frame
    pub fn create_constant(&mut self, value: f32) -> NodeHandle {
        self.push(NodeKind::Constant(value))
    }

    /// Make the next `start_rendering` fail with a backend error
    pub fn fail_next_render(&mut self, message: impl Into<String>) {
        self.fail_next_render = Some(message.into());
    }

    /// Live nodes, destination included
    pub fn node_count(&self) -> usize {
        self.nodes.len() - self.vacant.len()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Render one block of the destination signal
    pub fn pull_block(&mut self, out: &mut [f32]) {
        let order = self.render_order();
        let mut scratch = vec![Vec::new(); self.nodes.len()];
        self.render_block(&order, &mut scratch, out);
    }

    fn push(&mut self, kind: NodeKind) -> NodeHandle {
        let node = Node {
            kind,
            inputs: Vec::new(),
        };
        match self.vacant.pop() {
            Some(handle) => {
                self.nodes[handle.index()] = node;
                handle
            }
            None => {
                self.nodes.push(node);
                NodeHandle(self.nodes.len() as u32 - 1)
            }
        }
    }

    fn node(&self, handle: NodeHandle) -> Result<&Node, GraphError> {
        self.nodes
            .get(handle.index())
            .filter(|node| !matches!(node.kind, NodeKind::Vacant))
            .ok_or(GraphError::UnknownNode(handle))
    }

    fn ensure_open(&self) -> Result<(), GraphError> {
        if self.closed {
            return Err(GraphError::Closed);
        }
        Ok(())
    }

    /// True if `target` feeds `from`, directly or through other nodes
    fn feeds(&self, target: NodeHandle, from: NodeHandle) -> bool {
        let mut stack = vec![from];
        let mut seen = vec![false; self.nodes.len()];
        while let Some(node) = stack.pop() {
            if node == target {
                return true;
            }
            if std::mem::replace(&mut seen[node.index()], true) {
                continue;
            }
            stack.extend(self.nodes[node.index()].inputs.iter().copied());
        }
        false
    }

    /// Nodes reachable from the destination, inputs first
    fn render_order(&self) -> Vec<usize> {
        let mut order = Vec::new();
        let mut visited = vec![false; self.nodes.len()];
        // (node, inputs pushed)
        let mut stack = vec![(0usize, false)];

        while let Some((index, expanded)) = stack.pop() {
            if expanded {
                order.push(index);
                continue;
            }
            if std::mem::replace(&mut visited[index], true) {
                continue;
            }
            stack.push((index, true));
            for input in self.nodes[index].inputs.iter().rev() {
                if !visited[input.index()] {
                    stack.push((input.index(), false));
                }
            }
        }

        order
    }

    fn render_block(&mut self, order: &[usize], scratch: &mut [Vec<f32>], out: &mut [f32]) {
        let frames = out.len();

        for &index in order {
            let mut block = vec![0.0f32; frames];

            for input in &self.nodes[index].inputs {
                for (acc, sample) in block.iter_mut().zip(&scratch[input.index()]) {
                    *acc += sample;
                }
            }

            match &mut self.nodes[index].kind {
                NodeKind::Destination => {}
                NodeKind::Shaper(curve) => curve.process(&mut block),
                NodeKind::StreamSource(reader) => {
                    for sample in block.iter_mut() {
                        match reader.pop() {
                            Ok(value) => *sample = value,
                            Err(_) => break,
                        }
                    }
                }
                NodeKind::Constant(value) => block.fill(*value),
                NodeKind::Vacant => {}
            }

            scratch[index] = block;
        }

        out.copy_from_slice(&scratch[0][..frames]);
    }
}

impl GraphPrimitiveProvider for SoftwareGraph {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn destination(&self) -> NodeHandle {
        NodeHandle(0)
    }

    fn connect(&mut self, source: NodeHandle, destination: NodeHandle) -> Result<(), GraphError> {
        self.ensure_open()?;
        let invalid = GraphError::InvalidConnection {
            source,
            destination,
        };
        if !self.node(source)?.kind.has_output() || !self.node(destination)?.kind.has_input() {
            return Err(invalid);
        }
        if self.feeds(destination, source) {
            return Err(GraphError::Cycle {
                source,
                destination,
            });
        }

        let inputs = &mut self.nodes[destination.index()].inputs;
        if !inputs.contains(&source) {
            inputs.push(source);
        }
        Ok(())
    }

    fn disconnect(&mut self, node: NodeHandle) -> Result<(), GraphError> {
        self.node(node)?;
        for other in &mut self.nodes {
            other.inputs.retain(|input| *input != node);
        }
        Ok(())
    }

    fn release(&mut self, node: NodeHandle) -> Result<(), GraphError> {
        if node == self.destination() {
            return Err(GraphError::PermanentNode(node));
        }
        self.disconnect(node)?;
        let slot = &mut self.nodes[node.index()];
        // drops the node's curve or stream reader now
        slot.kind = NodeKind::Vacant;
        slot.inputs.clear();
        self.vacant.push(node);
        Ok(())
    }

    fn create_shaper(&mut self, curve: ShaperCurve) -> Result<NodeHandle, GraphError> {
        self.ensure_open()?;
        Ok(self.push(NodeKind::Shaper(curve)))
    }

    fn create_stream_source(&mut self, stream: &mut MediaStream) -> Result<NodeHandle, GraphError> {
        self.ensure_open()?;
        let reader = stream.take_reader().ok_or(GraphError::StreamConsumed)?;
        Ok(self.push(NodeKind::StreamSource(reader)))
    }

    fn start_rendering(&mut self, job: &RenderJob) -> Result<RenderedBuffer, GraphError> {
        self.ensure_open()?;
        if std::mem::replace(&mut self.rendered, true) {
            return Err(GraphError::AlreadyRendered);
        }
        if let Some(message) = self.fail_next_render.take() {
            return Err(GraphError::Backend(message));
        }
        if job.sample_rate() != self.sample_rate {
            return Err(GraphError::Backend(format!(
                "render job at {} Hz on a {} Hz graph",
                job.sample_rate(),
                self.sample_rate
            )));
        }

        let total = job.frame_count();
        let order = self.render_order();
        let mut scratch = vec![Vec::new(); self.nodes.len()];
        let mut mono = vec![0.0f32; total];

        for block in mono.chunks_mut(RENDER_QUANTUM) {
            self.render_block(&order, &mut scratch, block);
        }

        let channels = vec![mono; job.channel_count() as usize];
        Ok(RenderedBuffer::new(self.sample_rate, channels))
    }

    fn close(&mut self) -> Result<(), GraphError> {
        self.closed = true;
        // Drop stream readers so capture callbacks see a full ring, not a leak
        for node in &mut self.nodes {
            if let NodeKind::StreamSource(_) = node.kind {
                node.kind = NodeKind::Constant(0.0);
            }
            node.inputs.clear();
        }
        Ok(())
    }
}

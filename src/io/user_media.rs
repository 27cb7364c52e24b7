//! Microphone / line input
//!
//! `UserMedia` opens an input device, wraps it in a stream source node and
//! exposes that node as its output. It is a resource lifecycle only:
//!
//!   stopped ──open()──→ started ──close() / track ends──→ stopped
//!
//! It behaves the same on realtime and offline contexts.

use crate::{graph::NodeHandle, Context, Error, Result};

use super::stream::MediaStream;

/// An input device as reported by the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaDeviceInfo {
    /// Stable identifier for the device
    pub device_id: String,
    /// Shared by inputs that belong to the same physical device
    pub group_id: String,
    /// Human readable name, e.g. "Built-in Microphone"
    pub label: String,
}

/// What to ask the backend for when opening a stream
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamConstraints {
    pub device_id: Option<String>,
    pub sample_rate: u32,
    pub echo_cancellation: bool,
    pub noise_suppression: bool,
}

/// Platform input backend
pub trait MediaDevices {
    /// Whether the platform can capture audio at all
    fn supported(&self) -> bool;

    fn enumerate_inputs(&self) -> Result<Vec<MediaDeviceInfo>>;

    fn open_stream(&self, constraints: &StreamConstraints) -> Result<MediaStream>;
}

/// Which input to open
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum DeviceSelector {
    /// First available input
    #[default]
    Default,
    /// Position in the enumerated input list
    Index(usize),
    /// Matches either the label or the device id
    LabelOrId(String),
}

impl From<usize> for DeviceSelector {
    fn from(index: usize) -> Self {
        DeviceSelector::Index(index)
    }
}

impl From<&str> for DeviceSelector {
    fn from(label_or_id: &str) -> Self {
        DeviceSelector::LabelOrId(label_or_id.to_string())
    }
}

impl From<String> for DeviceSelector {
    fn from(label_or_id: String) -> Self {
        DeviceSelector::LabelOrId(label_or_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlaybackState {
    Started,
    Stopped,
}

/// Input device wrapped as a graph source
pub struct UserMedia<D: MediaDevices> {
    devices: D,
    stream: Option<MediaStream>,
    source: Option<NodeHandle>,
    device: Option<MediaDeviceInfo>,
}

impl<D: MediaDevices> UserMedia<D> {
    pub fn new(devices: D) -> Self {
        Self {
            devices,
            stream: None,
            source: None,
            device: None,
        }
    }

    pub fn is_supported(&self) -> bool {
        self.devices.supported()
    }

    /// List the audio inputs of `devices`, no context needed
    pub async fn enumerate_devices(devices: &D) -> Result<Vec<MediaDeviceInfo>> {
        devices.enumerate_inputs()
    }

    /// Open an input and create its source node on `ctx`
    ///
    /// An index past the end, or a label/id nobody matches, falls back to the
    /// first input. Fails with `NotFound` only when there are no inputs.
    pub async fn open(
        &mut self,
        ctx: &mut Context,
        selector: impl Into<DeviceSelector>,
    ) -> Result<()> {
        if !self.devices.supported() {
            return Err(Error::UnsupportedOperation(
                "audio input is not available on this platform".into(),
            ));
        }

        // never keep two streams open
        if self.stream.is_some() {
            self.close(ctx);
        }

        let selector = selector.into();
        let inputs = self.devices.enumerate_inputs()?;
        let device = resolve_device(&inputs, &selector)?;

        let constraints = StreamConstraints {
            device_id: Some(device.device_id.clone()),
            sample_rate: ctx.sample_rate(),
            echo_cancellation: false,
            noise_suppression: false,
        };
        let mut stream = self.devices.open_stream(&constraints)?;
        let source = match ctx.create_stream_source(&mut stream) {
            Ok(source) => source,
            Err(err) => {
                stream.stop();
                return Err(err);
            }
        };

        tracing::info!(device = %device.label, id = %device.device_id, "input opened");
        self.stream = Some(stream);
        self.source = Some(source);
        self.device = Some(device);
        Ok(())
    }

    /// Stop capture and release the source node
    pub fn close(&mut self, ctx: &mut Context) -> &mut Self {
        if let Some(mut stream) = self.stream.take() {
            stream.stop();
        }
        if let Some(source) = self.source.take() {
            if let Err(err) = ctx.release(source) {
                tracing::warn!(error = %err, "failed to release input source");
            }
        }
        if let Some(device) = self.device.take() {
            tracing::info!(device = %device.label, "input closed");
        }
        self
    }

    /// `Started` while a stream is open and its tracks are live
    pub fn state(&self) -> PlaybackState {
        match &self.stream {
            Some(stream) if stream.is_active() => PlaybackState::Started,
            _ => PlaybackState::Stopped,
        }
    }

    /// Source node to connect into the graph
    pub fn output(&self) -> Option<NodeHandle> {
        self.source
    }

    pub fn device_id(&self) -> Option<&str> {
        self.device.as_ref().map(|d| d.device_id.as_str())
    }

    pub fn group_id(&self) -> Option<&str> {
        self.device.as_ref().map(|d| d.group_id.as_str())
    }

    pub fn label(&self) -> Option<&str> {
        self.device.as_ref().map(|d| d.label.as_str())
    }
}

fn resolve_device(inputs: &[MediaDeviceInfo], selector: &DeviceSelector) -> Result<MediaDeviceInfo> {
    let matched = match selector {
        DeviceSelector::Default => None,
        DeviceSelector::Index(index) => inputs.get(*index),
        DeviceSelector::LabelOrId(key) => inputs
            .iter()
            .find(|d| d.label == *key || d.device_id == *key),
    };

    if matched.is_none() && *selector != DeviceSelector::Default && !inputs.is_empty() {
        tracing::warn!(?selector, "no matching input, falling back to the first one");
    }

    matched
        .or_else(|| inputs.first())
        .cloned()
        .ok_or_else(|| Error::NotFound(format!("no audio input matches {:?}", selector)))
}

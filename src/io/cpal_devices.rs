//! cpal input backend
//!
//! Captures from a cpal input device, down-mixes each frame to mono and
//! pushes it into an SPSC ring buffer. The graph side reads the other end.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::{FromSample, Sample, SizedSample};
use rtrb::{Producer, RingBuffer};

use super::stream::{MediaStream, StreamTrack};
use super::user_media::{MediaDeviceInfo, MediaDevices, StreamConstraints};
use crate::{Error, Result};

/// One second of mono audio at 48 kHz
const DEFAULT_RING_CAPACITY: usize = 48_000;

/// Input devices of the default cpal host
pub struct CpalDevices {
    host: cpal::Host,
    ring_capacity: usize,
}

impl CpalDevices {
    pub fn new() -> Self {
        Self {
            host: cpal::default_host(),
            ring_capacity: DEFAULT_RING_CAPACITY,
        }
    }

    /// Samples buffered between the device callback and the graph
    pub fn with_ring_capacity(mut self, capacity: usize) -> Self {
        self.ring_capacity = capacity.max(1);
        self
    }

    fn find_device(&self, device_id: Option<&str>) -> Result<cpal::Device> {
        if let Some(id) = device_id {
            let mut inputs = self.host.input_devices().map_err(device_error)?;
            if let Some(device) = inputs.find(|d| d.name().map(|n| n == id).unwrap_or(false)) {
                return Ok(device);
            }
            tracing::warn!(id, "input disappeared, using the default input");
        }
        self.host
            .default_input_device()
            .ok_or_else(|| Error::NotFound("no default input device".into()))
    }
}

impl Default for CpalDevices {
    fn default() -> Self {
        Self::new()
    }
}

impl MediaDevices for CpalDevices {
    fn supported(&self) -> bool {
        self.host.input_devices().is_ok()
    }

    fn enumerate_inputs(&self) -> Result<Vec<MediaDeviceInfo>> {
        let group_id = self.host.id().name().to_string();
        let inputs = self.host.input_devices().map_err(device_error)?;

        Ok(inputs
            .enumerate()
            .map(|(index, device)| {
                let label = device.name().unwrap_or_else(|_| format!("Input {}", index));
                MediaDeviceInfo {
                    device_id: label.clone(),
                    group_id: group_id.clone(),
                    label,
                }
            })
            .collect())
    }

    fn open_stream(&self, constraints: &StreamConstraints) -> Result<MediaStream> {
        let device = self.find_device(constraints.device_id.as_deref())?;
        let supported = input_config(&device, constraints.sample_rate)?;
        let sample_format = supported.sample_format();
        let config: cpal::StreamConfig = supported.into();

        if config.sample_rate.0 != constraints.sample_rate {
            tracing::warn!(
                device_rate = config.sample_rate.0,
                context_rate = constraints.sample_rate,
                "input captures at a different rate than the context"
            );
        }

        let (producer, consumer) = RingBuffer::<f32>::new(self.ring_capacity);
        let active = Arc::new(AtomicBool::new(true));

        let stream = match sample_format {
            cpal::SampleFormat::F32 => build_stream::<f32>(&device, &config, producer, active.clone()),
            cpal::SampleFormat::I16 => build_stream::<i16>(&device, &config, producer, active.clone()),
            cpal::SampleFormat::U16 => build_stream::<u16>(&device, &config, producer, active.clone()),
            other => Err(Error::Device(format!("unsupported input sample format {:?}", other))),
        }?;
        stream.play().map_err(device_error)?;

        tracing::debug!(
            channels = config.channels,
            sample_rate = config.sample_rate.0,
            "cpal input stream started"
        );
        Ok(MediaStream::with_active_flag(
            consumer,
            Box::new(CpalTrack(Some(stream))),
            active,
        ))
    }
}

/// Prefer a config at the context rate, otherwise the device default
fn input_config(device: &cpal::Device, sample_rate: u32) -> Result<cpal::SupportedStreamConfig> {
    let wanted = cpal::SampleRate(sample_rate);
    if let Ok(mut ranges) = device.supported_input_configs() {
        if let Some(range) =
            ranges.find(|r| r.min_sample_rate() <= wanted && wanted <= r.max_sample_rate())
        {
            return Ok(range.with_sample_rate(wanted));
        }
    }
    device.default_input_config().map_err(device_error)
}

fn build_stream<T>(
    device: &cpal::Device,
    config: &cpal::StreamConfig,
    mut producer: Producer<f32>,
    active: Arc<AtomicBool>,
) -> Result<cpal::Stream>
where
    T: SizedSample,
    f32: FromSample<T>,
{
    let channels = config.channels.max(1) as usize;
    let scale = 1.0 / channels as f32;

    device
        .build_input_stream(
            config,
            move |data: &[T], _: &cpal::InputCallbackInfo| {
                for frame in data.chunks(channels) {
                    let sum: f32 = frame.iter().map(|s| f32::from_sample(*s)).sum();
                    // ring full: the graph is behind, drop the frame
                    let _ = producer.push(sum * scale);
                }
            },
            move |err| {
                tracing::error!(error = %err, "input stream error");
                active.store(false, Ordering::Release);
            },
            None,
        )
        .map_err(device_error)
}

fn device_error(err: impl std::fmt::Display) -> Error {
    Error::Device(err.to_string())
}

/// Keeps the cpal stream alive; dropping it ends capture
struct CpalTrack(Option<cpal::Stream>);

impl StreamTrack for CpalTrack {
    fn stop(&mut self) {
        if let Some(stream) = self.0.take() {
            if let Err(err) = stream.pause() {
                tracing::debug!(error = %err, "failed to pause input stream");
            }
        }
    }
}

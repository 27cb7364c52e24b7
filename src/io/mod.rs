// Purpose - device input at the edge of the graph; no scheduling happens here

pub mod cpal_devices;
pub mod stream;
pub mod user_media;

pub use cpal_devices::CpalDevices;
pub use stream::{MediaStream, StreamTrack};
pub use user_media::{DeviceSelector, MediaDeviceInfo, MediaDevices, PlaybackState, StreamConstraints, UserMedia};

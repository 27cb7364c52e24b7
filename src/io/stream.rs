//! Captured input streams
//!
//! A `MediaStream` ties together three things that have different owners
//! once the stream is wired into a graph:
//!
//! - the sample reader (SPSC ring buffer consumer), moved into the graph's
//!   stream source node exactly once
//! - the track handle that keeps the device capturing, kept by the stream
//! - the `active` flag, shared with the device callback so track termination
//!   is visible without polling the device

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};

use rtrb::Consumer;

/// Something that keeps a device capturing until stopped
pub trait StreamTrack {
    fn stop(&mut self);
}

/// A live input stream
pub struct MediaStream {
    active: Arc<AtomicBool>,
    reader: Option<Consumer<f32>>,
    track: Option<Box<dyn StreamTrack>>,
}

impl MediaStream {
    /// Wrap an already running capture
    pub fn new(reader: Consumer<f32>, track: Box<dyn StreamTrack>) -> Self {
        Self::with_active_flag(reader, track, Arc::new(AtomicBool::new(true)))
    }

    /// Wrap a capture whose backend flips `active` when the track ends
    pub fn with_active_flag(
        reader: Consumer<f32>,
        track: Box<dyn StreamTrack>,
        active: Arc<AtomicBool>,
    ) -> Self {
        Self {
            active,
            reader: Some(reader),
            track: Some(track),
        }
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Shared flag, cleared when the stream stops or the device drops out
    pub fn active_flag(&self) -> Arc<AtomicBool> {
        self.active.clone()
    }

    /// Hand the sample reader to a graph node; only the first call succeeds
    pub fn take_reader(&mut self) -> Option<Consumer<f32>> {
        self.reader.take()
    }

    /// Stop every track of this stream
    pub fn stop(&mut self) {
        if let Some(mut track) = self.track.take() {
            track.stop();
        }
        self.active.store(false, Ordering::Release);
    }
}

impl Drop for MediaStream {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for MediaStream {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MediaStream")
            .field("active", &self.is_active())
            .field("reader_taken", &self.reader.is_none())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rtrb::RingBuffer;
    use std::cell::Cell;
    use std::rc::Rc;

    struct CountingTrack(Rc<Cell<u32>>);

    impl StreamTrack for CountingTrack {
        fn stop(&mut self) {
            self.0.set(self.0.get() + 1);
        }
    }

    #[test]
    fn test_reader_is_taken_once() {
        let (_tx, rx) = RingBuffer::<f32>::new(8);
        let mut stream = MediaStream::new(rx, Box::new(CountingTrack(Default::default())));
        assert!(stream.take_reader().is_some());
        assert!(stream.take_reader().is_none());
    }

    #[test]
    fn test_stop_is_idempotent_and_clears_active() {
        let stops = Rc::new(Cell::new(0));
        let (_tx, rx) = RingBuffer::<f32>::new(8);
        let mut stream = MediaStream::new(rx, Box::new(CountingTrack(stops.clone())));

        assert!(stream.is_active());
        stream.stop();
        stream.stop();
        drop(stream);

        assert_eq!(stops.get(), 1);
    }

    #[test]
    fn test_backend_can_end_track() {
        let (_tx, rx) = RingBuffer::<f32>::new(8);
        let stream = MediaStream::new(rx, Box::new(CountingTrack(Default::default())));
        stream.active_flag().store(false, Ordering::Release);
        assert!(!stream.is_active());
    }
}

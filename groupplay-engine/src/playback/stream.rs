//! Stream handle: exclusive owner of one resolved audio source

use crate::traits::AudioStream;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::debug;

/// Default volume multiplier for newly resolved streams
pub const DEFAULT_VOLUME: f32 = 0.5;

/// Upper bound for the volume multiplier
pub const MAX_VOLUME: f32 = 2.0;

/// Wraps one decoded audio source plus its volume multiplier.
///
/// The handle owns teardown: sinks only receive a clone of the source for
/// reading. `close()` is idempotent and forwards to the source exactly once,
/// however many paths (stop, skip, replacement, drop) reach it.
pub struct StreamHandle {
    source: Arc<dyn AudioStream>,
    volume: f32,
    closed: AtomicBool,
}

impl StreamHandle {
    pub fn new(source: Arc<dyn AudioStream>, volume: f32) -> Self {
        Self {
            source,
            volume: volume.clamp(0.0, MAX_VOLUME),
            closed: AtomicBool::new(false),
        }
    }

    /// True until the source is exhausted or the handle is closed
    pub fn is_live(&self) -> bool {
        !self.is_closed() && self.source.is_live()
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    /// Shared read access for the sink
    pub fn source(&self) -> Arc<dyn AudioStream> {
        Arc::clone(&self.source)
    }

    pub fn volume(&self) -> f32 {
        self.volume
    }

    pub fn set_volume(&mut self, volume: f32) {
        self.volume = volume.clamp(0.0, MAX_VOLUME);
    }

    /// Close the underlying source. Returns false if already closed.
    pub fn close(&self) -> bool {
        if self.closed.swap(true, Ordering::AcqRel) {
            return false;
        }
        self.source.close();
        debug!("Stream handle closed");
        true
    }
}

impl Drop for StreamHandle {
    fn drop(&mut self) {
        self.close();
    }
}

impl fmt::Debug for StreamHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StreamHandle")
            .field("volume", &self.volume)
            .field("closed", &self.is_closed())
            .field("live", &self.is_live())
            .finish()
    }
}


#[cfg(test)]
mod tests {
    use super::test_support::MemoryStream;
    use super::*;

    #[test]
    fn test_close_is_idempotent() {
        let stream = MemoryStream::with_bytes(64);
        let handle = StreamHandle::new(stream.clone(), DEFAULT_VOLUME);

        assert!(handle.is_live());
        assert!(handle.close());
        assert!(!handle.close());
        drop(handle);

        assert_eq!(stream.closes.load(Ordering::Acquire), 1);
    }

    #[test]
    fn test_drop_closes_unclosed_handle() {
        let stream = MemoryStream::with_bytes(64);
        drop(StreamHandle::new(stream.clone(), DEFAULT_VOLUME));
        assert_eq!(stream.closes.load(Ordering::Acquire), 1);
    }

    #[test]
    fn test_liveness_is_non_consuming() {
        let stream = MemoryStream::with_bytes(10);
        let handle = StreamHandle::new(stream.clone(), DEFAULT_VOLUME);

        for _ in 0..5 {
            assert!(handle.is_live());
        }
        assert_eq!(stream.remaining.load(Ordering::Acquire), 10);

        let mut buf = [0u8; 16];
        assert_eq!(handle.source().read(&mut buf).unwrap(), 10);
        assert!(!handle.is_live());
    }

    #[test]
    fn test_volume_is_clamped() {
        let mut handle = StreamHandle::new(MemoryStream::with_bytes(1), 5.0);
        assert_eq!(handle.volume(), MAX_VOLUME);
        handle.set_volume(-1.0);
        assert_eq!(handle.volume(), 0.0);
    }
}

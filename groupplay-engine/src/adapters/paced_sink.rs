//! Real-time PCM consumer
//!
//! Stands in for an audio device: drains the stream on its own thread at the
//! configured byte rate, so songs take as long as they would to play.
//! Samples are s16le and are scaled by the song's volume as they are drained.
//! Pause, resume and stop are shared flags polled by the worker.

use crate::error::{Error, Result};
use crate::playback::CompletionHandle;
use crate::traits::{AudioSink, AudioStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

const TICK: Duration = Duration::from_millis(20);

/// Flags shared between the sink and one worker thread
#[derive(Debug, Default)]
struct Playout {
    stop: AtomicBool,
    paused: AtomicBool,
    finished: AtomicBool,
}

impl Playout {
    fn is_active(&self) -> bool {
        !self.finished.load(Ordering::Acquire)
    }
}

pub struct PacedSink {
    name: String,
    byte_rate: u64,
    current: Mutex<Option<Arc<Playout>>>,
}

impl PacedSink {
    /// `byte_rate` is PCM bytes per second (rate × channels × 2)
    pub fn new(name: impl Into<String>, byte_rate: u64) -> Self {
        Self {
            name: name.into(),
            byte_rate: byte_rate.max(1),
            current: Mutex::new(None),
        }
    }

    fn current(&self) -> MutexGuard<'_, Option<Arc<Playout>>> {
        self.current.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn active(&self) -> Option<Arc<Playout>> {
        self.current().as_ref().filter(|p| p.is_active()).cloned()
    }

    fn chunk_size(&self) -> usize {
        let bytes = self.byte_rate * TICK.as_millis() as u64 / 1000;
        // Whole 16-bit frames only
        (bytes.max(2) & !1) as usize
    }
}

/// Scale little-endian 16-bit samples in place, saturating at full scale.
/// Returns the peak absolute sample after scaling.
fn apply_gain(samples: &mut [u8], gain: f32) -> u16 {
    let mut peak = 0u16;
    for frame in samples.chunks_exact_mut(2) {
        let sample = i16::from_le_bytes([frame[0], frame[1]]);
        let scaled = (f32::from(sample) * gain)
            .round()
            .clamp(f32::from(i16::MIN), f32::from(i16::MAX)) as i16;
        frame.copy_from_slice(&scaled.to_le_bytes());
        peak = peak.max(scaled.unsigned_abs());
    }
    peak
}

fn run_playout(
    playout: Arc<Playout>,
    source: Arc<dyn AudioStream>,
    volume: f32,
    chunk_size: usize,
    on_complete: CompletionHandle,
) {
    let mut buf = vec![0u8; chunk_size];
    // Odd byte left over from the previous read, kept at buf[0]
    let mut carry = 0usize;
    let mut peak = 0u16;
    let mut failure = None;

    while !playout.stop.load(Ordering::Acquire) {
        let started = Instant::now();

        if playout.paused.load(Ordering::Acquire) {
            thread::sleep(TICK);
            continue;
        }

        match source.read(&mut buf[carry..]) {
            Ok(0) => break,
            Ok(n) => {
                let filled = carry + n;
                let whole = filled & !1;
                peak = peak.max(apply_gain(&mut buf[..whole], volume));
                carry = filled - whole;
                if carry == 1 {
                    buf[0] = buf[whole];
                }
            }
            Err(e) => {
                failure = Some(e.to_string());
                break;
            }
        }

        if let Some(rest) = TICK.checked_sub(started.elapsed()) {
            thread::sleep(rest);
        }
    }

    // Mark finished before reporting so the queue sees an idle sink
    playout.finished.store(true, Ordering::Release);
    debug!("Playout finished at volume {:.2}, peak sample {}", volume, peak);
    match failure {
        Some(reason) => {
            warn!("Playout failed: {}", reason);
            on_complete.fail(reason);
        }
        None => on_complete.complete(),
    }
}

impl AudioSink for PacedSink {
    fn play(
        &self,
        source: Arc<dyn AudioStream>,
        volume: f32,
        on_complete: CompletionHandle,
    ) -> Result<()> {
        let mut current = self.current();
        if let Some(previous) = current.as_ref().filter(|p| p.is_active()) {
            previous.stop.store(true, Ordering::Release);
        }

        let playout = Arc::new(Playout::default());
        let worker = Arc::clone(&playout);
        let chunk_size = self.chunk_size();
        let generation = on_complete.generation();

        thread::Builder::new()
            .name(format!("sink-{}", self.name))
            .spawn(move || run_playout(worker, source, volume, chunk_size, on_complete))
            .map_err(|e| Error::Sink(format!("failed to start playout thread: {}", e)))?;

        debug!(
            "Sink {}: playing generation {} at volume {:.2}",
            self.name, generation, volume
        );
        *current = Some(playout);
        Ok(())
    }

    fn stop(&self) -> Result<()> {
        if let Some(playout) = self.active() {
            playout.stop.store(true, Ordering::Release);
            debug!("Sink {}: stop requested", self.name);
        }
        Ok(())
    }

    fn pause(&self) -> Result<()> {
        match self.active() {
            Some(playout) => {
                playout.paused.store(true, Ordering::Release);
                Ok(())
            }
            None => Err(Error::Sink("nothing is playing".to_string())),
        }
    }

    fn resume(&self) -> Result<()> {
        match self.active() {
            Some(playout) => {
                playout.paused.store(false, Ordering::Release);
                Ok(())
            }
            None => Err(Error::Sink("nothing is playing".to_string())),
        }
    }

    fn is_playing(&self) -> bool {
        self.active()
            .map(|p| !p.stop.load(Ordering::Acquire) && !p.paused.load(Ordering::Acquire))
            .unwrap_or(false)
    }

    fn is_paused(&self) -> bool {
        self.active()
            .map(|p| !p.stop.load(Ordering::Acquire) && p.paused.load(Ordering::Acquire))
            .unwrap_or(false)
    }
}

impl Drop for PacedSink {
    fn drop(&mut self) {
        if let Some(playout) = self.current().as_ref() {
            playout.stop.store(true, Ordering::Release);
        }
    }
}

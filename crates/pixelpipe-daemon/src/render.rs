//! Test-pattern render loop

use std::thread;
use std::time::{Duration, Instant};

use pixelpipe_core::{FrameBuffer, RgbColor, BLACK};
use tracing::{debug, warn};

/// A lit pixel walking along the strip with a fading tail
#[derive(Debug, Clone)]
pub struct Chase {
    pub color: RgbColor,
    pub tail: usize,
}

impl Chase {
    pub fn new(color: RgbColor) -> Self {
        Self { color, tail: 4 }
    }

    pub fn paint(&self, buffer: &mut dyn FrameBuffer, frame: u64) {
        buffer.clear();
        let count = buffer.count();
        if count == 0 {
            return;
        }
        let head = (frame % count as u64) as usize;
        for k in 0..=self.tail.min(count - 1) {
            let index = (head + count - k) % count;
            let level = 1.0 - k as f32 / (self.tail + 1) as f32;
            buffer.set(index, BLACK.lerp(self.color, level));
        }
    }
}

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct RunStats {
    pub frames: u64,
    pub failed: u64,
}

/// Paint and flush at `fps` until `frames` have been sent, forever if `None`
///
/// Flush failures are counted and the loop keeps going; devices reopen
/// their sockets on the next frame.
pub fn run(
    buffer: &mut dyn FrameBuffer,
    pattern: &Chase,
    fps: u32,
    frames: Option<u64>,
) -> RunStats {
    let interval = Duration::from_secs_f64(1.0 / fps.max(1) as f64);
    let mut stats = RunStats::default();
    let mut next = Instant::now();

    while frames.map_or(true, |limit| stats.frames < limit) {
        pattern.paint(buffer, stats.frames);
        if let Err(e) = buffer.flush() {
            if stats.failed == 0 {
                warn!(error = %e, "Frame not delivered, continuing");
            }
            stats.failed += 1;
        }
        stats.frames += 1;

        next += interval;
        let now = Instant::now();
        if next > now {
            thread::sleep(next - now);
        } else {
            // Fell behind; don't try to catch up
            next = now;
        }
    }

    debug!(frames = stats.frames, failed = stats.failed, "Render loop finished");
    stats
}

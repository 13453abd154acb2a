//! Concatenation of sibling buffers into one index space

use std::thread;
use std::time::Duration;

use tracing::warn;

use crate::buffer::FrameBuffer;
use crate::color::{RgbColor, BLACK};
use crate::error::Result;

/// Pause between consecutive child flushes
///
/// Several logical ports often share one physical supply, and back-to-back
/// datagrams have been seen to corrupt its output. This is an empirical
/// setting, not a protocol requirement.
pub const DEFAULT_WRITE_SPACING: Duration = Duration::from_millis(1);

#[derive(Debug)]
pub struct Combo {
    children: Vec<Box<dyn FrameBuffer>>,
    counts: Vec<usize>,
    write_spacing: Duration,
}

impl Combo {
    pub fn new(children: Vec<Box<dyn FrameBuffer>>) -> Self {
        let counts = children.iter().map(|c| c.count()).collect();
        Self {
            children,
            counts,
            write_spacing: DEFAULT_WRITE_SPACING,
        }
    }

    /// Set the pause between child flushes, zero disables it
    pub fn with_write_spacing(mut self, spacing: Duration) -> Self {
        self.write_spacing = spacing;
        self
    }

    pub fn children(&self) -> &[Box<dyn FrameBuffer>] {
        &self.children
    }

    /// Child index and local index for a combo index
    fn locate(&self, mut index: usize) -> Option<(usize, usize)> {
        for (child, &count) in self.counts.iter().enumerate() {
            if index < count {
                return Some((child, index));
            }
            index -= count;
        }
        None
    }
}

impl FrameBuffer for Combo {
    fn count(&self) -> usize {
        self.counts.iter().sum()
    }

    fn get(&self, index: usize) -> RgbColor {
        match self.locate(index) {
            Some((child, local)) => self.children[child].get(local),
            None => BLACK,
        }
    }

    fn set(&mut self, index: usize, color: RgbColor) {
        if let Some((child, local)) = self.locate(index) {
            self.children[child].set(local, color);
        }
    }

    /// Flush every child even when some fail; the first failure is returned
    fn flush(&mut self) -> Result<()> {
        let mut first_error = None;

        for (i, child) in self.children.iter_mut().enumerate() {
            if i > 0 && !self.write_spacing.is_zero() {
                thread::sleep(self.write_spacing);
            }
            if let Err(e) = child.flush() {
                warn!(child = %child.describe(), error = %e, "Flush failed");
                if first_error.is_none() {
                    first_error = Some(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(()),
        }
    }

    fn describe(&self) -> String {
        let parts: Vec<String> = self.children.iter().map(|c| c.describe()).collect();
        format!("[{}]", parts.join(", "))
    }

    fn last_error(&self) -> Option<String> {
        self.children.iter().find_map(|c| c.last_error())
    }
}

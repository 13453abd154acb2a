//! The pixel buffer contract implemented by every node in a device tree
//!
//! Devices, combos and filters all implement [`FrameBuffer`]. A tree is built
//! once from a descriptor string and owned through a single
//! `Box<dyn FrameBuffer>` root. Indexing is forgiving: reads past the end
//! return [`BLACK`] and writes past the end are ignored, so slightly wrong
//! geometry never takes down a running display.

use std::fmt::Debug;

use crate::color::{RgbColor, BLACK};
use crate::error::{Error, Result};

pub trait FrameBuffer: Send + Debug {
    /// Number of addressable pixels
    fn count(&self) -> usize;

    /// Read a pixel, [`BLACK`] when out of range
    fn get(&self, index: usize) -> RgbColor;

    /// Write a pixel, ignored when out of range
    fn set(&mut self, index: usize, color: RgbColor);

    /// Push the current contents to hardware
    ///
    /// Failures are returned and also recorded for [`FrameBuffer::last_error`];
    /// callers are expected to keep rendering.
    fn flush(&mut self) -> Result<()>;

    /// Descriptor string that rebuilds an equivalent node
    fn describe(&self) -> String;

    /// Most recent flush failure in this node or below, if any
    fn last_error(&self) -> Option<String> {
        None
    }

    fn has_error(&self) -> bool {
        self.last_error().is_some()
    }

    fn set_all(&mut self, color: RgbColor) {
        for i in 0..self.count() {
            self.set(i, color);
        }
    }

    fn clear(&mut self) {
        self.set_all(BLACK);
    }

    /// Visit every pixel in index order with a mutable reference
    ///
    /// Changes made through the reference are written back before the next
    /// pixel is visited.
    fn for_each_pixel_mut(&mut self, f: &mut dyn FnMut(usize, &mut RgbColor)) {
        for i in 0..self.count() {
            let mut color = self.get(i);
            f(i, &mut color);
            self.set(i, color);
        }
    }

    /// Copy of the visible pixels
    fn snapshot(&self) -> Vec<RgbColor> {
        (0..self.count()).map(|i| self.get(i)).collect()
    }
}

/// Bounds-checked pixel storage for leaf devices
#[derive(Debug, Clone)]
pub struct PixelStore {
    pixels: Vec<RgbColor>,
}

impl PixelStore {
    pub fn new(count: usize) -> Self {
        Self {
            pixels: vec![BLACK; count],
        }
    }

    pub fn len(&self) -> usize {
        self.pixels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pixels.is_empty()
    }

    pub fn get(&self, index: usize) -> RgbColor {
        self.pixels.get(index).copied().unwrap_or(BLACK)
    }

    pub fn set(&mut self, index: usize, color: RgbColor) {
        if let Some(pixel) = self.pixels.get_mut(index) {
            *pixel = color;
        }
    }

    pub fn as_slice(&self) -> &[RgbColor] {
        &self.pixels
    }

    /// Pack as 8-bit RGB triples
    pub fn to_rgb_bytes(&self) -> Vec<u8> {
        self.pixels.iter().flat_map(|c| c.to_u8()).collect()
    }
}

/// In-memory device that keeps the last flushed frame
///
/// Descriptor: `null:count`. Handy for dry runs and for tests of everything
/// that sits above a real device.
#[derive(Debug, Clone)]
pub struct NullDevice {
    pixels: PixelStore,
    frame: Vec<RgbColor>,
    flushes: u64,
}

impl NullDevice {
    pub fn new(count: usize) -> Self {
        Self {
            pixels: PixelStore::new(count),
            frame: vec![BLACK; count],
            flushes: 0,
        }
    }

    /// Contents as of the last flush
    pub fn flushed_frame(&self) -> &[RgbColor] {
        &self.frame
    }

    pub fn flush_count(&self) -> u64 {
        self.flushes
    }

    pub(crate) fn from_args(args: &[String]) -> Result<Box<dyn FrameBuffer>> {
        let count = match args {
            [count] => count
                .trim()
                .parse::<usize>()
                .map_err(|_| Error::bad_args("null", format!("bad count '{}'", count)))?,
            _ => return Err(Error::bad_args("null", "expected one argument: count")),
        };
        Ok(Box::new(Self::new(count)))
    }
}

impl FrameBuffer for NullDevice {
    fn count(&self) -> usize {
        self.pixels.len()
    }

    fn get(&self, index: usize) -> RgbColor {
        self.pixels.get(index)
    }

    fn set(&mut self, index: usize, color: RgbColor) {
        self.pixels.set(index, color);
    }

    fn flush(&mut self) -> Result<()> {
        self.frame.clear();
        self.frame.extend_from_slice(self.pixels.as_slice());
        self.flushes += 1;
        Ok(())
    }

    fn describe(&self) -> String {
        format!("null:{}", self.pixels.len())
    }
}

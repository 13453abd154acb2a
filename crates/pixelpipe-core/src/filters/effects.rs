//! Content-overwriting filters
//!
//! These leave indexing alone (except [`Navigation`], which hides its
//! margins) and paint into the inner node right before it is flushed.

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Normal};

use super::{check_arity, parse_arg, parse_color};
use crate::buffer::FrameBuffer;
use crate::color::{RgbColor, BLACK, GREEN, RED};
use crate::error::Result;

/// Paints every pixel one color
#[derive(Debug)]
pub struct Solid {
    inner: Box<dyn FrameBuffer>,
    color: RgbColor,
}

impl Solid {
    pub fn new(color: RgbColor, inner: Box<dyn FrameBuffer>) -> Self {
        Self { inner, color }
    }

    pub fn set_color(&mut self, color: RgbColor) {
        self.color = color;
    }

    pub(crate) fn from_args(
        args: &[String],
        inner: Box<dyn FrameBuffer>,
    ) -> Result<Box<dyn FrameBuffer>> {
        check_arity("solid", args, 1, 1)?;
        let color = parse_color("solid", &args[0])?;
        Ok(Box::new(Self::new(color, inner)))
    }
}

impl FrameBuffer for Solid {
    fn count(&self) -> usize {
        self.inner.count()
    }

    fn get(&self, index: usize) -> RgbColor {
        self.inner.get(index)
    }

    fn set(&mut self, index: usize, color: RgbColor) {
        self.inner.set(index, color);
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.set_all(self.color);
        self.inner.flush()
    }

    fn describe(&self) -> String {
        format!("solid:{}|{}", self.color, self.inner.describe())
    }

    fn last_error(&self) -> Option<String> {
        self.inner.last_error()
    }
}

/// Paints a wash interpolated through HSV from one end to the other
#[derive(Debug)]
pub struct Gradient {
    inner: Box<dyn FrameBuffer>,
    from: RgbColor,
    to: RgbColor,
}

impl Gradient {
    pub fn new(from: RgbColor, to: RgbColor, inner: Box<dyn FrameBuffer>) -> Self {
        Self { inner, from, to }
    }

    pub(crate) fn from_args(
        args: &[String],
        inner: Box<dyn FrameBuffer>,
    ) -> Result<Box<dyn FrameBuffer>> {
        check_arity("gradient", args, 2, 2)?;
        let from = parse_color("gradient", &args[0])?;
        let to = parse_color("gradient", &args[1])?;
        Ok(Box::new(Self::new(from, to, inner)))
    }

    fn paint(&mut self) {
        let count = self.inner.count();
        let last = count.saturating_sub(1).max(1) as f32;
        for i in 0..count {
            let color = self.from.hsv_lerp(self.to, i as f32 / last);
            self.inner.set(i, color);
        }
    }
}

impl FrameBuffer for Gradient {
    fn count(&self) -> usize {
        self.inner.count()
    }

    fn get(&self, index: usize) -> RgbColor {
        self.inner.get(index)
    }

    fn set(&mut self, index: usize, color: RgbColor) {
        self.inner.set(index, color);
    }

    fn flush(&mut self) -> Result<()> {
        self.paint();
        self.inner.flush()
    }

    fn describe(&self) -> String {
        format!(
            "gradient:{},{}|{}",
            self.from,
            self.to,
            self.inner.describe()
        )
    }

    fn last_error(&self) -> Option<String> {
        self.inner.last_error()
    }
}

pub const DEFAULT_SPARKLE_ON_MS: u64 = 100;
pub const DEFAULT_SPARKLE_OFF_MS: u64 = 2000;

#[derive(Debug, Clone, Copy)]
struct Twinkle {
    on: bool,
    next_change: Instant,
}

/// Flashes random pixels in a fixed color
///
/// Each pixel alternates between off and on. How long it stays in a state is
/// drawn from a normal distribution around that state's mean, with a
/// standard deviation of a quarter of the mean, bounded to `[0, 2 * mean]`.
#[derive(Debug)]
pub struct Sparkle {
    inner: Box<dyn FrameBuffer>,
    color: RgbColor,
    on_mean: Duration,
    off_mean: Duration,
    seed: u64,
    rng: StdRng,
    pixels: Vec<Twinkle>,
}

impl Sparkle {
    pub fn new(
        color: RgbColor,
        on_mean: Duration,
        off_mean: Duration,
        seed: u64,
        inner: Box<dyn FrameBuffer>,
    ) -> Self {
        let now = Instant::now();
        let mut sparkle = Self {
            pixels: Vec::with_capacity(inner.count()),
            inner,
            color,
            on_mean,
            off_mean,
            seed,
            rng: StdRng::seed_from_u64(seed),
        };
        for _ in 0..sparkle.inner.count() {
            let wait = sparkle.draw(off_mean);
            sparkle.pixels.push(Twinkle {
                on: false,
                next_change: now + wait,
            });
        }
        sparkle
    }

    /// Number of pixels currently lit
    pub fn lit(&self) -> usize {
        self.pixels.iter().filter(|p| p.on).count()
    }

    /// Flip every pixel whose time is up, then paint the lit ones
    pub fn advance(&mut self, now: Instant) {
        for i in 0..self.pixels.len() {
            if now < self.pixels[i].next_change {
                continue;
            }
            let on = !self.pixels[i].on;
            let wait = self.draw(if on { self.on_mean } else { self.off_mean });
            self.pixels[i] = Twinkle {
                on,
                next_change: now + wait,
            };
        }

        for (i, pixel) in self.pixels.iter().enumerate() {
            if pixel.on {
                self.inner.set(i, self.color);
            }
        }
    }

    fn draw(&mut self, mean: Duration) -> Duration {
        let mean = mean.as_secs_f64();
        let secs = match Normal::new(mean, mean / 4.0) {
            Ok(normal) => normal.sample(&mut self.rng),
            Err(_) => mean,
        };
        Duration::from_secs_f64(secs.clamp(0.0, 2.0 * mean))
    }

    pub(crate) fn from_args(
        args: &[String],
        inner: Box<dyn FrameBuffer>,
    ) -> Result<Box<dyn FrameBuffer>> {
        check_arity("sparkle", args, 1, 4)?;
        let color = parse_color("sparkle", &args[0])?;
        let on_ms = match args.get(1) {
            Some(ms) => parse_arg("sparkle", "on time", ms)?,
            None => DEFAULT_SPARKLE_ON_MS,
        };
        let off_ms = match args.get(2) {
            Some(ms) => parse_arg("sparkle", "off time", ms)?,
            None => DEFAULT_SPARKLE_OFF_MS,
        };
        let seed = match args.get(3) {
            Some(seed) => parse_arg("sparkle", "seed", seed)?,
            None => rand::rng().random(),
        };
        Ok(Box::new(Self::new(
            color,
            Duration::from_millis(on_ms),
            Duration::from_millis(off_ms),
            seed,
            inner,
        )))
    }
}

impl FrameBuffer for Sparkle {
    fn count(&self) -> usize {
        self.inner.count()
    }

    fn get(&self, index: usize) -> RgbColor {
        self.inner.get(index)
    }

    fn set(&mut self, index: usize, color: RgbColor) {
        self.inner.set(index, color);
    }

    fn flush(&mut self) -> Result<()> {
        self.advance(Instant::now());
        self.inner.flush()
    }

    fn describe(&self) -> String {
        format!(
            "sparkle:{},{},{},{}|{}",
            self.color,
            self.on_mean.as_millis(),
            self.off_mean.as_millis(),
            self.seed,
            self.inner.describe()
        )
    }

    fn last_error(&self) -> Option<String> {
        self.inner.last_error()
    }
}

/// Marks the ends of a strip with navigation lights
///
/// The first `margin` pixels are red (port) and the last `margin` green
/// (starboard). Those pixels are hidden: visible index `i` is inner index
/// `i + margin`.
#[derive(Debug)]
pub struct Navigation {
    inner: Box<dyn FrameBuffer>,
    margin: usize,
}

impl Navigation {
    pub fn new(margin: usize, inner: Box<dyn FrameBuffer>) -> Self {
        Self { inner, margin }
    }

    pub fn inner(&self) -> &dyn FrameBuffer {
        self.inner.as_ref()
    }

    pub(crate) fn from_args(
        args: &[String],
        inner: Box<dyn FrameBuffer>,
    ) -> Result<Box<dyn FrameBuffer>> {
        check_arity("nav", args, 1, 1)?;
        let margin = parse_arg("nav", "margin", &args[0])?;
        Ok(Box::new(Self::new(margin, inner)))
    }
}

impl FrameBuffer for Navigation {
    fn count(&self) -> usize {
        self.inner.count().saturating_sub(self.margin.saturating_mul(2))
    }

    fn get(&self, index: usize) -> RgbColor {
        if index < self.count() {
            self.inner.get(index + self.margin)
        } else {
            BLACK
        }
    }

    fn set(&mut self, index: usize, color: RgbColor) {
        if index < self.count() {
            self.inner.set(index + self.margin, color);
        }
    }

    fn flush(&mut self) -> Result<()> {
        let total = self.inner.count();
        // Overlapping margins split the strip, red taking the odd pixel
        let red = self.margin.min(total.div_ceil(2));
        let green = self.margin.min(total - red);
        for k in 0..red {
            self.inner.set(k, RED);
        }
        for k in 0..green {
            self.inner.set(total - 1 - k, GREEN);
        }
        self.inner.flush()
    }

    fn describe(&self) -> String {
        format!("nav:{}|{}", self.margin, self.inner.describe())
    }

    fn last_error(&self) -> Option<String> {
        self.inner.last_error()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::NullDevice;
    use crate::color::{BLUE, WHITE};

    fn null(count: usize) -> Box<dyn FrameBuffer> {
        Box::new(NullDevice::new(count))
    }

    #[test]
    fn test_solid_overwrites_at_flush() {
        let mut solid = Solid::new(BLUE, null(3));
        solid.set(1, RED);
        assert_eq!(solid.get(1), RED);
        solid.flush().unwrap();
        assert!(solid.snapshot().iter().all(|c| *c == BLUE));
        assert_eq!(solid.describe(), "solid:#0000ff|null:3");
    }

    #[test]
    fn test_gradient_endpoints() {
        let mut gradient = Gradient::new(RED, BLUE, null(5));
        gradient.flush().unwrap();
        assert_eq!(gradient.get(0).to_u8(), [255, 0, 0]);
        assert_eq!(gradient.get(4).to_u8(), [0, 0, 255]);
        assert_eq!(gradient.get(2).to_u8()[1], 0);
    }

    #[test]
    fn test_gradient_single_pixel() {
        let mut gradient = Gradient::new(GREEN, BLUE, null(1));
        gradient.flush().unwrap();
        assert_eq!(gradient.get(0).to_u8(), [0, 255, 0]);
    }

    #[test]
    fn test_sparkle_lights_when_off_time_is_zero() {
        let mut sparkle = Sparkle::new(
            WHITE,
            Duration::from_secs(3600),
            Duration::ZERO,
            7,
            null(6),
        );
        assert_eq!(sparkle.lit(), 0);
        sparkle.flush().unwrap();
        assert_eq!(sparkle.lit(), 6);
        assert!(sparkle.snapshot().iter().all(|c| *c == WHITE));

        // Long on time: nothing turns off on the next frame
        sparkle.advance(Instant::now());
        assert_eq!(sparkle.lit(), 6);
    }

    #[test]
    fn test_sparkle_leaves_dark_pixels_alone() {
        let mut sparkle = Sparkle::new(
            WHITE,
            Duration::from_millis(10),
            Duration::from_secs(3600),
            7,
            null(4),
        );
        sparkle.set(2, RED);
        sparkle.flush().unwrap();
        assert_eq!(sparkle.lit(), 0);
        assert_eq!(sparkle.get(2), RED);
    }

    #[test]
    fn test_sparkle_draw_is_bounded() {
        let mut sparkle = Sparkle::new(WHITE, Duration::ZERO, Duration::ZERO, 1, null(0));
        let mean = Duration::from_millis(100);
        let mut total = Duration::ZERO;
        for _ in 0..1000 {
            let wait = sparkle.draw(mean);
            assert!(wait <= Duration::from_millis(200));
            total += wait;
        }
        let average = total / 1000;
        assert!(average > Duration::from_millis(90) && average < Duration::from_millis(110));
        assert_eq!(sparkle.draw(Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn test_navigation_masks_margins() {
        let mut nav = Navigation::new(2, null(10));
        assert_eq!(nav.count(), 6);
        nav.set(0, BLUE);
        assert_eq!(nav.inner().get(2), BLUE);
        assert_eq!(nav.get(0), BLUE);
        nav.set(6, BLUE);
        assert_eq!(nav.inner().get(8), BLACK);

        nav.flush().unwrap();
        let inner = nav.inner().snapshot();
        assert_eq!(&inner[..2], &[RED, RED]);
        assert_eq!(&inner[8..], &[GREEN, GREEN]);
        assert_eq!(nav.describe(), "nav:2|null:10");
    }

    #[test]
    fn test_navigation_wider_than_strip() {
        let mut nav = Navigation::new(4, null(5));
        assert_eq!(nav.count(), 0);
        assert_eq!(nav.get(0), BLACK);
        nav.flush().unwrap();
        assert_eq!(nav.inner().snapshot(), vec![RED, RED, RED, GREEN, GREEN]);

        let mut nav = Navigation::new(usize::MAX / 2 + 1, null(10));
        assert_eq!(nav.count(), 0);
        nav.set(0, BLUE);
        nav.flush().unwrap();
        let inner = nav.inner().snapshot();
        assert_eq!(&inner[..5], &[RED; 5]);
        assert_eq!(&inner[5..], &[GREEN; 5]);
    }
}

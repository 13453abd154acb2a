//! Index-remapping filters

use std::time::{Duration, Instant};

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};

use super::{check_arity, parse_arg};
use crate::buffer::FrameBuffer;
use crate::color::{RgbColor, BLACK};
use crate::error::{Error, Result};

/// Reverses pixel order without a lookup table
#[derive(Debug)]
pub struct Reverse {
    inner: Box<dyn FrameBuffer>,
}

impl Reverse {
    pub fn new(inner: Box<dyn FrameBuffer>) -> Self {
        Self { inner }
    }

    pub fn inner(&self) -> &dyn FrameBuffer {
        self.inner.as_ref()
    }

    fn flip(&self, index: usize) -> Option<usize> {
        let count = self.inner.count();
        (index < count).then(|| count - 1 - index)
    }

    pub(crate) fn from_args(
        args: &[String],
        inner: Box<dyn FrameBuffer>,
    ) -> Result<Box<dyn FrameBuffer>> {
        check_arity("flip", args, 0, 0)?;
        Ok(Box::new(Self::new(inner)))
    }
}

impl FrameBuffer for Reverse {
    fn count(&self) -> usize {
        self.inner.count()
    }

    fn get(&self, index: usize) -> RgbColor {
        self.flip(index).map_or(BLACK, |i| self.inner.get(i))
    }

    fn set(&mut self, index: usize, color: RgbColor) {
        if let Some(i) = self.flip(index) {
            self.inner.set(i, color);
        }
    }

    fn flush(&mut self) -> Result<()> {
        self.inner.flush()
    }

    fn describe(&self) -> String {
        format!("flip|{}", self.inner.describe())
    }

    fn last_error(&self) -> Option<String> {
        self.inner.last_error()
    }
}

/// How a [`MapFilter`] fills its table
#[derive(Debug, Clone, PartialEq)]
pub enum MapRule {
    /// One seeded shuffle at construction
    Random { seed: u64 },
    /// Interleave with the given stride
    Skip { stride: usize },
    /// Fixed wrap-around offset
    Shift { offset: usize },
    /// Offset advancing with time, `speed` strip lengths per second
    Rotate { speed: f64 },
    /// Offset moving back and forth, turning after `after` strip lengths
    Bounce { speed: f64, after: usize },
}

/// Remaps visible index `i` to inner index `map[i]`
#[derive(Debug)]
pub struct MapFilter {
    inner: Box<dyn FrameBuffer>,
    rule: MapRule,
    map: Vec<usize>,
    started: Instant,
}

impl MapFilter {
    pub fn new(rule: MapRule, inner: Box<dyn FrameBuffer>) -> Result<Self> {
        match &rule {
            MapRule::Skip { stride: 0 } => {
                return Err(Error::bad_args("skip", "stride must be at least 1"))
            }
            MapRule::Rotate { speed } if !speed.is_finite() => {
                return Err(Error::bad_args("rotate", "speed must be finite"))
            }
            MapRule::Bounce { speed, .. } if !speed.is_finite() => {
                return Err(Error::bad_args("bounce", "speed must be finite"))
            }
            MapRule::Bounce { after: 0, .. } => {
                return Err(Error::bad_args("bounce", "after must be at least 1"))
            }
            MapRule::Bounce { after, .. } if bounce_span(inner.count(), *after).is_none() => {
                return Err(Error::bad_args(
                    "bounce",
                    format!("after {} is too large for {} pixels", after, inner.count()),
                ))
            }
            _ => {}
        }

        let mut filter = Self {
            map: Vec::with_capacity(inner.count()),
            inner,
            rule,
            started: Instant::now(),
        };
        filter.init_map();
        Ok(filter)
    }

    pub fn rule(&self) -> &MapRule {
        &self.rule
    }

    /// Current visible to inner index table
    pub fn map(&self) -> &[usize] {
        &self.map
    }

    pub fn inner(&self) -> &dyn FrameBuffer {
        self.inner.as_ref()
    }

    /// Change the offset of a shift filter; other rules are left alone
    pub fn set_offset(&mut self, offset: usize) {
        if let MapRule::Shift { offset: current } = &mut self.rule {
            *current = offset;
            self.fill_shifted(offset);
        }
    }

    /// Recompute a time-driven table for the given time since construction
    pub fn update_at(&mut self, elapsed: Duration) {
        let count = self.map.len();
        if count == 0 {
            return;
        }
        let steps = |speed: f64| (elapsed.as_secs_f64() * speed * count as f64).round() as i64;

        let offset = match self.rule {
            MapRule::Rotate { speed } => steps(speed).rem_euclid(count as i64) as usize,
            MapRule::Bounce { speed, after } => {
                let Some(span) = bounce_span(count, after) else {
                    return;
                };
                let period = (2 * span - 1).max(1);
                let p = steps(speed).rem_euclid(period);
                let pos = if p < span { p } else { period - p };
                pos as usize % count
            }
            _ => return,
        };
        self.fill_shifted(offset);
    }

    fn init_map(&mut self) {
        let count = self.inner.count();
        self.map.clear();

        match self.rule {
            MapRule::Random { seed } => {
                self.map.extend(0..count);
                let mut rng = StdRng::seed_from_u64(seed);
                self.map.shuffle(&mut rng);
            }
            MapRule::Skip { stride } => {
                for start in 0..stride.min(count) {
                    self.map.extend((start..count).step_by(stride));
                }
            }
            MapRule::Shift { offset } => {
                self.map.resize(count, 0);
                self.fill_shifted(offset);
            }
            MapRule::Rotate { .. } | MapRule::Bounce { .. } => {
                self.map.resize(count, 0);
                self.update_at(Duration::ZERO);
            }
        }
    }

    fn fill_shifted(&mut self, offset: usize) {
        let count = self.map.len();
        for (i, slot) in self.map.iter_mut().enumerate() {
            *slot = (i + offset) % count;
        }
    }
}

impl FrameBuffer for MapFilter {
    fn count(&self) -> usize {
        self.map.len()
    }

    fn get(&self, index: usize) -> RgbColor {
        self.map.get(index).map_or(BLACK, |&i| self.inner.get(i))
    }

    fn set(&mut self, index: usize, color: RgbColor) {
        if let Some(&i) = self.map.get(index) {
            self.inner.set(i, color);
        }
    }

    fn flush(&mut self) -> Result<()> {
        if matches!(self.rule, MapRule::Rotate { .. } | MapRule::Bounce { .. }) {
            // Pixels were written through the previous table; carry them over
            let frame = self.snapshot();
            self.update_at(self.started.elapsed());
            for (i, color) in frame.into_iter().enumerate() {
                self.set(i, color);
            }
        }
        self.inner.flush()
    }

    fn describe(&self) -> String {
        let stage = match &self.rule {
            MapRule::Random { seed } => format!("random:{}", seed),
            MapRule::Skip { stride } => format!("skip:{}", stride),
            MapRule::Shift { offset } => format!("shift:{}", offset),
            MapRule::Rotate { speed } => format!("rotate:{}", speed),
            MapRule::Bounce { speed, after } => format!("bounce:{},{}", speed, after),
        };
        format!("{}|{}", stage, self.inner.describe())
    }

    fn last_error(&self) -> Option<String> {
        self.inner.last_error()
    }
}

/// `count * after` as a span whose doubled period still fits in `i64`
fn bounce_span(count: usize, after: usize) -> Option<i64> {
    count
        .checked_mul(after)
        .and_then(|span| i64::try_from(span).ok())
        .filter(|span| span.checked_mul(2).is_some())
}

fn boxed(rule: MapRule, inner: Box<dyn FrameBuffer>) -> Result<Box<dyn FrameBuffer>> {
    Ok(Box::new(MapFilter::new(rule, inner)?))
}

pub(crate) fn random_from_args(
    args: &[String],
    inner: Box<dyn FrameBuffer>,
) -> Result<Box<dyn FrameBuffer>> {
    check_arity("random", args, 0, 1)?;
    let seed = match args.first() {
        Some(seed) => parse_arg("random", "seed", seed)?,
        None => rand::rng().random(),
    };
    boxed(MapRule::Random { seed }, inner)
}

pub(crate) fn skip_from_args(
    args: &[String],
    inner: Box<dyn FrameBuffer>,
) -> Result<Box<dyn FrameBuffer>> {
    check_arity("skip", args, 1, 1)?;
    let stride = parse_arg("skip", "stride", &args[0])?;
    boxed(MapRule::Skip { stride }, inner)
}

pub(crate) fn shift_from_args(
    args: &[String],
    inner: Box<dyn FrameBuffer>,
) -> Result<Box<dyn FrameBuffer>> {
    check_arity("shift", args, 1, 1)?;
    let offset: i64 = parse_arg("shift", "offset", &args[0])?;
    let count = inner.count().max(1) as i64;
    let offset = offset.rem_euclid(count) as usize;
    boxed(MapRule::Shift { offset }, inner)
}

pub(crate) fn rotate_from_args(
    args: &[String],
    inner: Box<dyn FrameBuffer>,
) -> Result<Box<dyn FrameBuffer>> {
    check_arity("rotate", args, 1, 1)?;
    let speed = parse_arg("rotate", "speed", &args[0])?;
    boxed(MapRule::Rotate { speed }, inner)
}

pub(crate) fn bounce_from_args(
    args: &[String],
    inner: Box<dyn FrameBuffer>,
) -> Result<Box<dyn FrameBuffer>> {
    check_arity("bounce", args, 1, 2)?;
    let speed = parse_arg("bounce", "speed", &args[0])?;
    let after = match args.get(1) {
        Some(after) => parse_arg("bounce", "after", after)?,
        None => 1,
    };
    boxed(MapRule::Bounce { speed, after }, inner)
}

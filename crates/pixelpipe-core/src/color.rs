//! Floating-point RGB color and conversions

use std::fmt;
use std::str::FromStr;

/// An RGB color with channels nominally in `[0, 1]`
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct RgbColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
}

pub const BLACK: RgbColor = RgbColor::new(0.0, 0.0, 0.0);
pub const WHITE: RgbColor = RgbColor::new(1.0, 1.0, 1.0);
pub const RED: RgbColor = RgbColor::new(1.0, 0.0, 0.0);
pub const GREEN: RgbColor = RgbColor::new(0.0, 1.0, 0.0);
pub const BLUE: RgbColor = RgbColor::new(0.0, 0.0, 1.0);

const NAMED: &[(&str, RgbColor)] = &[
    ("black", BLACK),
    ("white", WHITE),
    ("red", RED),
    ("green", GREEN),
    ("blue", BLUE),
    ("yellow", RgbColor::new(1.0, 1.0, 0.0)),
    ("cyan", RgbColor::new(0.0, 1.0, 1.0)),
    ("magenta", RgbColor::new(1.0, 0.0, 1.0)),
    ("orange", RgbColor::new(1.0, 0.5, 0.0)),
    ("purple", RgbColor::new(0.5, 0.0, 1.0)),
];

/// Convert one channel to 8 bits, saturating outside `[0, 1]`
pub fn channel_u8(v: f32) -> u8 {
    (v.clamp(0.0, 1.0) * 255.0 + 0.5) as u8
}

impl RgbColor {
    pub const fn new(r: f32, g: f32, b: f32) -> Self {
        Self { r, g, b }
    }

    pub fn from_u8(r: u8, g: u8, b: u8) -> Self {
        Self::new(
            f32::from(r) / 255.0,
            f32::from(g) / 255.0,
            f32::from(b) / 255.0,
        )
    }

    pub fn to_u8(self) -> [u8; 3] {
        [channel_u8(self.r), channel_u8(self.g), channel_u8(self.b)]
    }

    /// Linear blend, `t = 0` is `self` and `t = 1` is `other`
    pub fn lerp(self, other: RgbColor, t: f32) -> Self {
        Self::new(
            self.r + (other.r - self.r) * t,
            self.g + (other.g - self.g) * t,
            self.b + (other.b - self.b) * t,
        )
    }

    /// Hue, saturation and value, each in `[0, 1]`
    pub fn to_hsv(self) -> (f32, f32, f32) {
        let max = self.r.max(self.g).max(self.b);
        let min = self.r.min(self.g).min(self.b);
        let delta = max - min;

        let s = if max > 0.0 { delta / max } else { 0.0 };
        let h = if delta <= f32::EPSILON {
            0.0
        } else if max == self.r {
            ((self.g - self.b) / delta).rem_euclid(6.0) / 6.0
        } else if max == self.g {
            ((self.b - self.r) / delta + 2.0) / 6.0
        } else {
            ((self.r - self.g) / delta + 4.0) / 6.0
        };
        (h, s, max)
    }

    pub fn from_hsv(h: f32, s: f32, v: f32) -> Self {
        let h6 = h.rem_euclid(1.0) * 6.0;
        let sector = h6.floor();
        let f = h6 - sector;
        let p = v * (1.0 - s);
        let q = v * (1.0 - s * f);
        let t = v * (1.0 - s * (1.0 - f));
        match sector as u8 {
            0 => Self::new(v, t, p),
            1 => Self::new(q, v, p),
            2 => Self::new(p, v, t),
            3 => Self::new(p, q, v),
            4 => Self::new(t, p, v),
            _ => Self::new(v, p, q),
        }
    }

    /// Interpolate through HSV space, taking the short way around the hue circle
    pub fn hsv_lerp(self, other: RgbColor, t: f32) -> Self {
        let (h0, s0, v0) = self.to_hsv();
        let (h1, s1, v1) = other.to_hsv();

        // Achromatic endpoints have no meaningful hue; borrow the other one
        let h0 = if s0 <= f32::EPSILON { h1 } else { h0 };
        let h1 = if s1 <= f32::EPSILON { h0 } else { h1 };

        let mut dh = h1 - h0;
        if dh > 0.5 {
            dh -= 1.0;
        } else if dh < -0.5 {
            dh += 1.0;
        }
        Self::from_hsv(h0 + dh * t, s0 + (s1 - s0) * t, v0 + (v1 - v0) * t)
    }
}

impl fmt::Display for RgbColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let [r, g, b] = self.to_u8();
        write!(f, "#{:02x}{:02x}{:02x}", r, g, b)
    }
}

impl FromStr for RgbColor {
    type Err = String;

    /// Accepts a color name or `#rrggbb`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if let Some(hex) = s.strip_prefix('#') {
            if hex.len() != 6 || !hex.is_ascii() {
                return Err(format!("bad color '{}': expected #rrggbb", s));
            }
            let channel = |i: usize| {
                u8::from_str_radix(&hex[i..i + 2], 16)
                    .map_err(|_| format!("bad color '{}': invalid hex digit", s))
            };
            return Ok(Self::from_u8(channel(0)?, channel(2)?, channel(4)?));
        }

        NAMED
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(s))
            .map(|(_, color)| *color)
            .ok_or_else(|| format!("unknown color '{}'", s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_conversion() {
        assert_eq!(channel_u8(-0.5), 0);
        assert_eq!(channel_u8(0.0), 0);
        assert_eq!(channel_u8(0.5), 128);
        assert_eq!(channel_u8(1.0), 255);
        assert_eq!(channel_u8(7.0), 255);
        assert_eq!(RgbColor::new(1.0, 0.0, 0.25).to_u8(), [255, 0, 64]);
    }

    #[test]
    fn test_parse_and_display() {
        assert_eq!("red".parse::<RgbColor>().unwrap(), RED);
        assert_eq!("Blue".parse::<RgbColor>().unwrap(), BLUE);
        let c: RgbColor = "#ff8000".parse().unwrap();
        assert_eq!(c.to_u8(), [255, 128, 0]);
        assert_eq!(c.to_string(), "#ff8000");
        assert!("#ff80".parse::<RgbColor>().is_err());
        assert!("chartreuse".parse::<RgbColor>().is_err());
    }

    #[test]
    fn test_hsv_round_trip() {
        for color in [RED, GREEN, BLUE, WHITE, RgbColor::new(0.2, 0.4, 0.6)] {
            let (h, s, v) = color.to_hsv();
            assert_eq!(RgbColor::from_hsv(h, s, v).to_u8(), color.to_u8());
        }
    }

    #[test]
    fn test_hsv_lerp_endpoints() {
        assert_eq!(RED.hsv_lerp(BLUE, 0.0).to_u8(), RED.to_u8());
        assert_eq!(RED.hsv_lerp(BLUE, 1.0).to_u8(), BLUE.to_u8());
        // Red to blue goes through magenta, not green
        let mid = RED.hsv_lerp(BLUE, 0.5).to_u8();
        assert_eq!(mid[1], 0);
    }
}

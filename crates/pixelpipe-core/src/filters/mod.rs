//! Filters that wrap exactly one inner node
//!
//! Map filters remap the visible index before delegating; effect filters
//! overwrite pixel content at flush time. Either way a filter does its own
//! work first and then flushes the inner node.

pub mod effects;
pub mod map;

use std::str::FromStr;

use crate::color::RgbColor;
use crate::error::{Error, Result};
use crate::parser::unquote;
use crate::registry::{register, Factory};

pub use effects::{Gradient, Navigation, Solid, Sparkle};
pub use map::{MapFilter, MapRule, Reverse};

fn check_arity(name: &str, args: &[String], min: usize, max: usize) -> Result<()> {
    if args.len() < min || args.len() > max {
        let expected = if min == max {
            format!("{}", min)
        } else {
            format!("{} to {}", min, max)
        };
        return Err(Error::bad_args(
            name,
            format!("expected {} argument(s), got {}", expected, args.len()),
        ));
    }
    Ok(())
}

fn parse_arg<T: FromStr>(name: &str, what: &str, arg: &str) -> Result<T> {
    unquote(arg)
        .trim()
        .parse()
        .map_err(|_| Error::bad_args(name, format!("bad {} '{}'", what, arg)))
}

fn parse_color(name: &str, arg: &str) -> Result<RgbColor> {
    unquote(arg)
        .parse()
        .map_err(|e: String| Error::bad_args(name, e))
}

pub(crate) fn register_all() {
    register(
        "flip",
        Factory::Filter(Reverse::from_args),
        "",
        "Reverse pixel order",
    );
    register(
        "random",
        Factory::Filter(map::random_from_args),
        "[seed]",
        "Shuffle pixel order once, with an optional fixed seed",
    );
    register(
        "skip",
        Factory::Filter(map::skip_from_args),
        "stride",
        "Interleave pixels: every stride-th pixel, then the next offset",
    );
    register(
        "shift",
        Factory::Filter(map::shift_from_args),
        "offset",
        "Shift pixel order by a fixed offset, wrapping at the end",
    );
    register(
        "rotate",
        Factory::Filter(map::rotate_from_args),
        "speed",
        "Rotate continuously, speed in strip lengths per second",
    );
    register(
        "bounce",
        Factory::Filter(map::bounce_from_args),
        "speed[,after]",
        "Slide back and forth, reversing after `after` strip lengths",
    );
    register(
        "solid",
        Factory::Filter(Solid::from_args),
        "color",
        "Paint every pixel one color at flush",
    );
    register(
        "gradient",
        Factory::Filter(Gradient::from_args),
        "from,to",
        "Paint an HSV gradient across the strip at flush",
    );
    register(
        "sparkle",
        Factory::Filter(Sparkle::from_args),
        "color[,on_ms[,off_ms[,seed]]]",
        "Randomly flash pixels in a color over whatever is below",
    );
    register(
        "nav",
        Factory::Filter(Navigation::from_args),
        "margin",
        "Red and green navigation lights on the end pixels, hidden from the visible range",
    );
}

//! pixelpipe core - Pixel buffer trees built from descriptor strings
//!
//! This crate provides the device-independent half of pixelpipe:
//! - The [`FrameBuffer`] contract shared by devices, combos and filters
//! - The descriptor mini-language parser
//! - The global type registry mapping names to constructors
//! - Combo (concatenation), map (index remapping) and effect filters

pub mod buffer;
pub mod builder;
pub mod color;
pub mod combo;
pub mod error;
pub mod filters;
pub mod parser;
pub mod registry;

use std::sync::Once;

pub use buffer::{FrameBuffer, NullDevice, PixelStore};
pub use builder::{build, build_with, BuildOptions};
pub use color::{RgbColor, BLACK, BLUE, GREEN, RED, WHITE};
pub use combo::{Combo, DEFAULT_WRITE_SPACING};
pub use error::{Error, Result};
pub use parser::{parse_param_list, parse_pipeline, unquote};
pub use registry::{Entry, EntryKind, Factory};

/// Register the built-in filters and the `null` device
///
/// Safe to call more than once; only the first call registers.
pub fn register_builtins() {
    static ONCE: Once = Once::new();
    ONCE.call_once(|| {
        registry::register(
            "null",
            Factory::Device(NullDevice::from_args),
            "count",
            "In-memory device that keeps the last flushed frame",
        );
        filters::register_all();
    });
}

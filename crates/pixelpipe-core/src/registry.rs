//! Name to constructor table for devices and filters
//!
//! Backends register their types with one explicit call at startup
//! (`pixelpipe_core::register_builtins`, `pixelpipe_kinet::register`, ...).
//! The table is append-only and built lazily on first use, so it does not
//! depend on the order in which crates are initialized. Lookups are
//! case-insensitive and return the first entry registered under a name.

use std::fmt;
use std::sync::{OnceLock, RwLock};

use crate::buffer::FrameBuffer;
use crate::error::Result;

/// Builds a leaf device from its argument list
pub type DeviceFactory = fn(&[String]) -> Result<Box<dyn FrameBuffer>>;

/// Wraps an inner node given the filter's argument list
pub type FilterFactory = fn(&[String], Box<dyn FrameBuffer>) -> Result<Box<dyn FrameBuffer>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EntryKind {
    Device,
    Filter,
}

impl fmt::Display for EntryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EntryKind::Device => write!(f, "device"),
            EntryKind::Filter => write!(f, "filter"),
        }
    }
}

#[derive(Clone, Copy)]
pub enum Factory {
    Device(DeviceFactory),
    Filter(FilterFactory),
}

impl fmt::Debug for Factory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Factory::Device(_) => write!(f, "Factory::Device"),
            Factory::Filter(_) => write!(f, "Factory::Filter"),
        }
    }
}

/// A registered device or filter type
#[derive(Debug, Clone)]
pub struct Entry {
    pub name: &'static str,
    pub factory: Factory,
    /// Argument synopsis, e.g. `ip[/port][(count)], ...`
    pub args: &'static str,
    pub doc: &'static str,
}

impl Entry {
    pub fn kind(&self) -> EntryKind {
        match self.factory {
            Factory::Device(_) => EntryKind::Device,
            Factory::Filter(_) => EntryKind::Filter,
        }
    }
}

static REGISTRY: OnceLock<RwLock<Vec<Entry>>> = OnceLock::new();

fn table() -> &'static RwLock<Vec<Entry>> {
    REGISTRY.get_or_init(|| RwLock::new(Vec::new()))
}

/// Append a type to the global table
pub fn register(name: &'static str, factory: Factory, args: &'static str, doc: &'static str) {
    let entry = Entry {
        name,
        factory,
        args,
        doc,
    };
    tracing::trace!(name, kind = %entry.kind(), "Registering type");
    table()
        .write()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .push(entry);
}

/// Look up a type by name, ignoring case
pub fn find(name: &str) -> Option<Entry> {
    table()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .iter()
        .find(|e| e.name.eq_ignore_ascii_case(name))
        .cloned()
}

/// Snapshot of every registered type, in registration order
pub fn entries() -> Vec<Entry> {
    table()
        .read()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .clone()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::NullDevice;

    fn make_sample(_args: &[String]) -> Result<Box<dyn FrameBuffer>> {
        Ok(Box::new(NullDevice::new(7)))
    }

    #[test]
    fn test_find_is_case_insensitive() {
        register("RegistrySample", Factory::Device(make_sample), "", "test device");
        let entry = find("registrysample").expect("registered");
        assert_eq!(entry.name, "RegistrySample");
        assert_eq!(entry.kind(), EntryKind::Device);
        assert!(find("REGISTRYSAMPLE").is_some());
        assert!(find("registry-sample").is_none());
    }

    #[test]
    fn test_entries_include_builtins() {
        crate::register_builtins();
        let names: Vec<_> = entries().iter().map(|e| e.name).collect();
        for expected in ["null", "flip", "random", "skip", "shift", "rotate", "bounce"] {
            assert!(names.contains(&expected), "missing {}", expected);
        }
        assert_eq!(find("flip").map(|e| e.kind()), Some(EntryKind::Filter));
    }
}

//! Turns a descriptor string into a tree of frame buffers

use std::time::Duration;

use tracing::debug;

use crate::buffer::FrameBuffer;
use crate::combo::{Combo, DEFAULT_WRITE_SPACING};
use crate::error::{Error, Result};
use crate::parser::{parse_pipeline, Leaf, Stage};
use crate::registry::{find, EntryKind, Factory};

/// Knobs that apply to the whole tree rather than to one node
#[derive(Debug, Clone)]
pub struct BuildOptions {
    /// Pause between sibling flushes in every combo
    pub write_spacing: Duration,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            write_spacing: DEFAULT_WRITE_SPACING,
        }
    }
}

/// Build a tree with default options
pub fn build(descriptor: &str) -> Result<Box<dyn FrameBuffer>> {
    build_with(descriptor, &BuildOptions::default())
}

pub fn build_with(descriptor: &str, options: &BuildOptions) -> Result<Box<dyn FrameBuffer>> {
    let pipeline = parse_pipeline(descriptor)?;

    let mut node = match pipeline.leaf {
        Leaf::Device(stage) => build_device(&stage)?,
        Leaf::List(items) => {
            let mut children = items
                .iter()
                .map(|item| build_with(item, options))
                .collect::<Result<Vec<_>>>()?;
            if children.len() == 1 {
                children.remove(0)
            } else {
                Box::new(Combo::new(children).with_write_spacing(options.write_spacing))
            }
        }
    };

    // Innermost filter wraps first
    for stage in pipeline.filters.iter().rev() {
        node = apply_filter(stage, node)?;
    }

    debug!(
        descriptor = %descriptor,
        count = node.count(),
        "Built pixel tree"
    );
    Ok(node)
}

fn build_device(stage: &Stage) -> Result<Box<dyn FrameBuffer>> {
    let entry = find(&stage.name).ok_or_else(|| Error::UnknownType {
        kind: EntryKind::Device,
        name: stage.name.clone(),
    })?;
    match entry.factory {
        Factory::Device(make) => make(&stage.args),
        Factory::Filter(_) => Err(Error::bad_args(
            &stage.name,
            "is a filter and needs a device after it",
        )),
    }
}

fn apply_filter(stage: &Stage, inner: Box<dyn FrameBuffer>) -> Result<Box<dyn FrameBuffer>> {
    let entry = find(&stage.name).ok_or_else(|| Error::UnknownType {
        kind: EntryKind::Filter,
        name: stage.name.clone(),
    })?;
    match entry.factory {
        Factory::Filter(make) => make(&stage.args, inner),
        Factory::Device(_) => Err(Error::bad_args(
            &stage.name,
            "is a device and cannot be used as a filter",
        )),
    }
}

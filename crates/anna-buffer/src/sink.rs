//! Producer surface handed to tools and external adapters

use crate::buffer::ThoughtBuffer;
use anna_core::{Metadata, Priority, Result, ThoughtId, ThoughtSource};
use std::sync::Arc;

/// Cloneable producer handle. Tools and adapters get this, never the
/// buffer itself — `add` is the only mutation they can perform.
#[derive(Clone)]
pub struct ThoughtSink {
    buffer: Arc<ThoughtBuffer>,
}

impl ThoughtSink {
    pub(crate) fn new(buffer: Arc<ThoughtBuffer>) -> Self {
        Self { buffer }
    }

    pub fn add(
        &self,
        content: &str,
        source: ThoughtSource,
        origin_tag: Option<&str>,
        metadata: Option<Metadata>,
        priority_override: Option<Priority>,
    ) -> Result<ThoughtId> {
        self.buffer
            .add(content, source, origin_tag, metadata, priority_override)
    }

    /// Shorthand for scheduler-level diagnostics.
    pub fn system_notice(&self, content: &str) -> Result<ThoughtId> {
        self.add(content, ThoughtSource::SystemNotice, None, None, None)
    }
}

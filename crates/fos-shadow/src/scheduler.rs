//! Update Batching Scheduler
//!
//! Mutations open an update scope naming the shadows they affect. Nested
//! scopes whose shadows are already pending join the innermost frame; any
//! other nested scope gets a frame of its own. Projection for a frame runs
//! when its depth returns to zero.

use std::collections::BTreeSet;

use fos_dom::NodeId;

use crate::{ShadowError, ShadowResult};

/// Pending shadows for one batch
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpdateFrame {
    /// Hosts of the shadows to project, ordered for determinism
    pub shadows: BTreeSet<NodeId>,
    /// Open scopes sharing this frame
    pub depth: usize,
    /// Nodes that opened the scopes, for tracing
    pub triggers: Vec<NodeId>,
}

/// How `begin` placed a scope
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeEntry {
    /// Joined the innermost frame
    Merged,
    /// Pushed a new frame
    Opened,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SchedulerStats {
    pub opened: u64,
    pub merged: u64,
}

#[derive(Debug, Default)]
pub struct UpdateScheduler {
    stack: Vec<UpdateFrame>,
    stats: SchedulerStats,
}

impl UpdateScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Open a scope for `shadows`
    pub fn begin(&mut self, shadows: BTreeSet<NodeId>, triggers: &[NodeId]) -> ScopeEntry {
        if let Some(top) = self.stack.last_mut() {
            if shadows.is_subset(&top.shadows) {
                top.depth += 1;
                top.triggers.extend_from_slice(triggers);
                self.stats.merged += 1;
                return ScopeEntry::Merged;
            }
        }
        self.stack.push(UpdateFrame {
            shadows,
            depth: 1,
            triggers: triggers.to_vec(),
        });
        self.stats.opened += 1;
        ScopeEntry::Opened
    }

    /// Close the innermost scope. Returns the frame once its last scope
    /// closes; the caller projects its shadows.
    pub fn end(&mut self) -> ShadowResult<Option<UpdateFrame>> {
        let top = self
            .stack
            .last_mut()
            .ok_or_else(|| ShadowError::InvalidState("end of update without a matching begin".into()))?;
        top.depth -= 1;
        if top.depth > 0 {
            return Ok(None);
        }
        Ok(self.stack.pop())
    }

    /// Is `host`'s shadow pending in any open frame
    pub fn is_covered(&self, host: NodeId) -> bool {
        self.stack.iter().any(|f| f.shadows.contains(&host))
    }

    /// Number of open frames
    pub fn depth(&self) -> usize {
        self.stack.len()
    }

    pub fn is_idle(&self) -> bool {
        self.stack.is_empty()
    }

    pub fn stats(&self) -> SchedulerStats {
        self.stats
    }
}

//! fOS Shadow DOM
//!
//! Encapsulated shadow trees and slot-based content projection on top of the
//! native `fos-dom` tree.
//!
//! The native tree only knows one flat child list per node. Shadow hosts and
//! slots are *virtualized*: their logical children live in a side overlay,
//! while the native tree always reflects the current slot assignment (what a
//! renderer walks). Structural mutations are bracketed in update scopes so
//! that nested edits on the same shadow project only once.
//!
//! # Example
//! ```rust,ignore
//! use fos_dom::Document;
//! use fos_shadow::{ShadowDom, ShadowRootInit};
//!
//! let mut dom = ShadowDom::new(Document::default());
//! let host = dom.create_element("div");
//! let root = dom.attach_shadow(host, ShadowRootInit::default())?;
//! let slot = dom.create_element("slot");
//! dom.append_child(root, slot)?;
//! ```

mod config;
mod dom;
mod access;
mod mutation;
pub mod overlay;
pub mod navigation;
pub mod projection;
pub mod scheduler;
pub mod shadow;
pub mod registry;
pub mod style_scope;

pub use config::ShadowConfig;
pub use dom::{ShadowDom, ProjectionStats};
pub use access::AdjacentPosition;
pub use mutation::{MutationRecord, MutationKind, MutationHook};
pub use overlay::TreeOverlay;
pub use navigation::{Navigator, Direction};
pub use projection::{SlotTarget, SlotAssignment, Projection, ApplyStats, SlotTable, distribute};
pub use scheduler::{UpdateScheduler, UpdateFrame, ScopeEntry, SchedulerStats};
pub use shadow::{ShadowRoot, ShadowRootInit, ShadowRootMode, ShadowRoots};
pub use registry::{ElementRegistry, ElementDefinition, DEFAULT_ATTACHABLE};
pub use style_scope::{StyleParser, StyleRule, LightningStyleParser, scope_stylesheet};

pub use fos_dom::{Document, DomTree, NodeId, NodeKind};

/// Result type for shadow-aware operations
pub type ShadowResult<T> = Result<T, ShadowError>;

/// Shadow DOM errors
///
/// None of these are transient: they signal misuse or a structural mismatch
/// and are surfaced to the caller without partial mutation.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ShadowError {
    /// Structural invariant violated (double virtualization, missing
    /// overlay entry, unresolvable reference)
    #[error("Hierarchy request error: {0}")]
    Hierarchy(String),

    /// Referenced child or reference absent from the expected collection
    #[error("Node was not found: {0}")]
    NotFound(String),

    /// Re-attach on a shadow host, unbalanced update scopes
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// Ineligible host kind or operation invalid on this emulation
    #[error("Not supported: {0}")]
    NotSupported(String),
}

impl From<fos_dom::DomError> for ShadowError {
    fn from(err: fos_dom::DomError) -> Self {
        use fos_dom::DomError;
        match err {
            DomError::NotFound(_) => Self::NotFound(err.to_string()),
            DomError::HierarchyRequest(_) => Self::Hierarchy(err.to_string()),
            DomError::InvalidNodeType(_) => Self::NotSupported(err.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fos_dom::DomError;

    #[test]
    fn test_dom_error_mapping() {
        let id = NodeId::ROOT;
        assert!(matches!(ShadowError::from(DomError::NotFound(id)), ShadowError::NotFound(_)));
        assert!(matches!(
            ShadowError::from(DomError::HierarchyRequest("x")),
            ShadowError::Hierarchy(_)
        ));
        assert!(matches!(
            ShadowError::from(DomError::InvalidNodeType(id)),
            ShadowError::NotSupported(_)
        ));
    }
}

//! Mutation notification
//!
//! A single hook observes every mutation made through [`crate::ShadowDom`].
//! It runs while the mutation's update scope is still open, and may mutate
//! the DOM itself; such nested mutations batch into the open scope when
//! they touch the same shadows.

use fos_dom::NodeId;

use crate::{ShadowDom, ShadowResult};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MutationKind {
    ChildList,
    Attributes { name: String },
    CharacterData,
}

/// Description of one completed mutation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MutationRecord {
    pub kind: MutationKind,
    pub target: NodeId,
    pub added: Vec<NodeId>,
    pub removed: Vec<NodeId>,
}

impl MutationRecord {
    pub fn child_list(target: NodeId, added: Vec<NodeId>, removed: Vec<NodeId>) -> Self {
        Self {
            kind: MutationKind::ChildList,
            target,
            added,
            removed,
        }
    }

    pub fn attribute(target: NodeId, name: &str) -> Self {
        Self {
            kind: MutationKind::Attributes { name: name.to_string() },
            target,
            added: Vec::new(),
            removed: Vec::new(),
        }
    }

    pub fn character_data(target: NodeId) -> Self {
        Self {
            kind: MutationKind::CharacterData,
            target,
            added: Vec::new(),
            removed: Vec::new(),
        }
    }
}

/// Mutation observer callback
pub type MutationHook = Box<dyn FnMut(&mut ShadowDom, &MutationRecord) -> ShadowResult<()>>;

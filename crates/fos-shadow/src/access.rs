//! Convenience node API
//!
//! Multi-node insertion, element-only traversal and cloning, all expressed
//! through the shadow-aware primitives of [`ShadowDom`].

use fos_dom::{NodeId, NodeKind};

use crate::{ShadowDom, ShadowError, ShadowResult};

/// Position for [`ShadowDom::insert_adjacent`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdjacentPosition {
    /// Before the node itself
    BeforeBegin,
    /// Just inside the node, before its first child
    AfterBegin,
    /// Just inside the node, after its last child
    BeforeEnd,
    /// After the node itself
    AfterEnd,
}

impl ShadowDom {
    /// Append `nodes` to `parent` in one update scope
    pub fn append(&mut self, parent: NodeId, nodes: &[NodeId]) -> ShadowResult<()> {
        self.update(&[parent], |dom| {
            for &node in nodes {
                dom.insert_before(parent, node, None)?;
            }
            Ok(())
        })
    }

    /// Insert `nodes` before the first child of `parent`
    pub fn prepend(&mut self, parent: NodeId, nodes: &[NodeId]) -> ShadowResult<()> {
        let reference = self.first_child(parent);
        let reference = self.viable_sibling(reference, nodes)?;
        self.insert_all(parent, nodes, reference)
    }

    /// Insert `nodes` before `node`
    pub fn before(&mut self, node: NodeId, nodes: &[NodeId]) -> ShadowResult<()> {
        let parent = self.require_parent(node)?;
        let reference = self.viable_sibling(Some(node), nodes)?;
        self.insert_all(parent, nodes, reference)
    }

    /// Insert `nodes` after `node`
    pub fn after(&mut self, node: NodeId, nodes: &[NodeId]) -> ShadowResult<()> {
        let parent = self.require_parent(node)?;
        let next = self.next_sibling(node)?;
        let reference = self.viable_sibling(next, nodes)?;
        self.insert_all(parent, nodes, reference)
    }

    /// Remove `node` from its logical parent; a no-op without one
    pub fn remove(&mut self, node: NodeId) -> ShadowResult<()> {
        match self.parent_node(node) {
            Some(parent) => self.remove_child(parent, node).map(|_| ()),
            None => Ok(()),
        }
    }

    pub fn insert_adjacent(&mut self, node: NodeId, position: AdjacentPosition, new: NodeId) -> ShadowResult<()> {
        match position {
            AdjacentPosition::BeforeBegin => self.before(node, &[new]),
            AdjacentPosition::AfterBegin => self.prepend(node, &[new]),
            AdjacentPosition::BeforeEnd => self.append(node, &[new]),
            AdjacentPosition::AfterEnd => self.after(node, &[new]),
        }
    }

    fn require_parent(&self, node: NodeId) -> ShadowResult<NodeId> {
        self.parent_node(node)
            .ok_or_else(|| ShadowError::Hierarchy(format!("{} has no parent", node)))
    }

    /// First of `start` and its following siblings not being moved
    fn viable_sibling(&self, start: Option<NodeId>, moving: &[NodeId]) -> ShadowResult<Option<NodeId>> {
        let mut current = start;
        while let Some(node) = current {
            if !moving.contains(&node) {
                break;
            }
            current = self.next_sibling(node)?;
        }
        Ok(current)
    }

    fn insert_all(&mut self, parent: NodeId, nodes: &[NodeId], reference: Option<NodeId>) -> ShadowResult<()> {
        self.update(&[parent], |dom| {
            for &node in nodes {
                dom.insert_before(parent, node, reference)?;
            }
            Ok(())
        })
    }

    // --- Element traversal ---

    fn is_element(&self, node: NodeId) -> bool {
        self.tree().kind(node) == Some(NodeKind::Element)
    }

    pub fn element_children(&self, node: NodeId) -> Vec<NodeId> {
        self.child_nodes(node)
            .into_iter()
            .filter(|&c| self.is_element(c))
            .collect()
    }

    pub fn first_element_child(&self, node: NodeId) -> Option<NodeId> {
        self.child_nodes(node).into_iter().find(|&c| self.is_element(c))
    }

    pub fn last_element_child(&self, node: NodeId) -> Option<NodeId> {
        self.child_nodes(node).into_iter().rev().find(|&c| self.is_element(c))
    }

    pub fn child_element_count(&self, node: NodeId) -> usize {
        self.element_children(node).len()
    }

    pub fn next_element_sibling(&self, node: NodeId) -> ShadowResult<Option<NodeId>> {
        let mut current = self.next_sibling(node)?;
        while let Some(sibling) = current {
            if self.is_element(sibling) {
                return Ok(Some(sibling));
            }
            current = self.next_sibling(sibling)?;
        }
        Ok(None)
    }

    pub fn previous_element_sibling(&self, node: NodeId) -> ShadowResult<Option<NodeId>> {
        let mut current = self.previous_sibling(node)?;
        while let Some(sibling) = current {
            if self.is_element(sibling) {
                return Ok(Some(sibling));
            }
            current = self.previous_sibling(sibling)?;
        }
        Ok(None)
    }

    // --- Cloning ---

    /// Copy `node`, and with `deep` its logical children. The copy is
    /// detached and never carries a shadow.
    pub fn clone_node(&mut self, node: NodeId, deep: bool) -> ShadowResult<NodeId> {
        if self.is_shadow_root(node) {
            return Err(ShadowError::NotSupported("shadow roots cannot be cloned".into()));
        }
        let copy = self.tree_mut().clone_shallow(node)?;
        if self.shadow(node).is_some() {
            let id_attr = self.config().host_id_attribute.clone();
            self.tree_mut().remove_attribute(copy, &id_attr)?;
        }
        if deep {
            if let Some(source) = self.style_source(node).map(str::to_owned) {
                let text = self.create_text(&source);
                self.tree_mut().append_child(copy, text)?;
                return Ok(copy);
            }
            for child in self.child_nodes(node) {
                let child_copy = self.clone_node(child, true)?;
                self.tree_mut().append_child(copy, child_copy)?;
            }
        }
        Ok(copy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ShadowRootInit;
    use fos_dom::Document;

    fn setup() -> (ShadowDom, NodeId) {
        let mut dom = ShadowDom::new(Document::new("about:blank"));
        let parent = dom.create_element("div");
        let body = dom.document().body().unwrap();
        dom.append_child(body, parent).unwrap();
        (dom, parent)
    }

    #[test]
    fn test_append_prepend() {
        let (mut dom, parent) = setup();
        let (a, b, c) = (dom.create_text("a"), dom.create_text("b"), dom.create_text("c"));
        dom.append(parent, &[b, c]).unwrap();
        dom.prepend(parent, &[a]).unwrap();
        assert_eq!(dom.child_nodes(parent), vec![a, b, c]);
    }

    #[test]
    fn test_before_after() {
        let (mut dom, parent) = setup();
        let (a, b, c) = (dom.create_text("a"), dom.create_text("b"), dom.create_text("c"));
        dom.append(parent, &[b]).unwrap();
        dom.before(b, &[a]).unwrap();
        dom.after(b, &[c]).unwrap();
        assert_eq!(dom.child_nodes(parent), vec![a, b, c]);

        // Moving a node next to itself keeps the order stable
        dom.after(b, &[b]).unwrap();
        assert_eq!(dom.child_nodes(parent), vec![a, b, c]);
    }

    #[test]
    fn test_parentless_adjacent_is_hierarchy_error() {
        let (mut dom, _) = setup();
        let lonely = dom.create_element("p");
        let new = dom.create_text("x");
        for position in [AdjacentPosition::BeforeBegin, AdjacentPosition::AfterEnd] {
            assert!(matches!(
                dom.insert_adjacent(lonely, position, new),
                Err(ShadowError::Hierarchy(_))
            ));
        }
        dom.insert_adjacent(lonely, AdjacentPosition::AfterBegin, new).unwrap();
        assert_eq!(dom.child_nodes(lonely), vec![new]);
    }

    #[test]
    fn test_remove() {
        let (mut dom, parent) = setup();
        let a = dom.create_text("a");
        dom.append(parent, &[a]).unwrap();
        dom.remove(a).unwrap();
        assert!(dom.child_nodes(parent).is_empty());
        // Already detached
        dom.remove(a).unwrap();
    }

    #[test]
    fn test_element_traversal() {
        let (mut dom, parent) = setup();
        let t = dom.create_text("t");
        let p = dom.create_element("p");
        let c = dom.create_comment("c");
        let span = dom.create_element("span");
        dom.append(parent, &[t, p, c, span]).unwrap();

        assert_eq!(dom.element_children(parent), vec![p, span]);
        assert_eq!(dom.first_element_child(parent), Some(p));
        assert_eq!(dom.last_element_child(parent), Some(span));
        assert_eq!(dom.child_element_count(parent), 2);
        assert_eq!(dom.next_element_sibling(p).unwrap(), Some(span));
        assert_eq!(dom.previous_element_sibling(span).unwrap(), Some(p));
        assert_eq!(dom.previous_element_sibling(p).unwrap(), None);
    }

    #[test]
    fn test_clone_host_copies_light_children() {
        let (mut dom, host) = setup();
        let a = dom.create_text("a");
        dom.append(host, &[a]).unwrap();
        let root = dom.attach_shadow(host, ShadowRootInit::default()).unwrap();
        let inner = dom.create_element("p");
        dom.append_child(root, inner).unwrap();

        let copy = dom.clone_node(host, true).unwrap();
        assert!(dom.shadow(copy).is_none());
        assert!(!dom.has_attribute(copy, "shadow-host-id"));
        let kids = dom.child_nodes(copy);
        assert_eq!(kids.len(), 1);
        assert_eq!(dom.text_content(kids[0]), "a");

        assert!(matches!(dom.clone_node(root, false), Err(ShadowError::NotSupported(_))));
    }
}

//! Navigation Resolver
//!
//! Logical parent / sibling / child / root computation. The overlay is
//! consulted first; the native tree otherwise. Nothing here mutates.

use fos_dom::{DomTree, NodeId, NodeKind};

use crate::{ShadowError, ShadowResult, ShadowRoots, TreeOverlay};

/// Sibling direction
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Next,
    Previous,
}

/// Read-only view combining the native tree, the overlay and the shadow table
#[derive(Debug, Clone, Copy)]
pub struct Navigator<'a> {
    tree: &'a DomTree,
    overlay: &'a TreeOverlay,
    shadows: &'a ShadowRoots,
}

impl<'a> Navigator<'a> {
    pub fn new(tree: &'a DomTree, overlay: &'a TreeOverlay, shadows: &'a ShadowRoots) -> Self {
        Self { tree, overlay, shadows }
    }

    /// Logical parent.
    ///
    /// The recorded virtual parent wins. Otherwise the native parent, except
    /// that content under a shadow host belongs to the shadow root, and
    /// native children of any other virtualized node are logically detached.
    pub fn parent_of(&self, node: NodeId) -> Option<NodeId> {
        if let Some(parent) = self.overlay.virtual_parent(node) {
            return Some(parent);
        }
        if self.shadows.is_root(node) {
            return None;
        }
        let parent = self.tree.parent(node)?;
        if self.overlay.is_virtualized(parent) {
            return self.shadows.get(parent).map(|s| s.root());
        }
        Some(parent)
    }

    /// Logical sibling in `direction`.
    ///
    /// Fails with a hierarchy error if `node` is missing from its parent's
    /// recorded virtual children.
    pub fn sibling_of(&self, node: NodeId, direction: Direction) -> ShadowResult<Option<NodeId>> {
        let Some(parent) = self.parent_of(node) else {
            return Ok(None);
        };

        if let Some(list) = self.overlay.virtual_children(parent) {
            let idx = list.iter().position(|&c| c == node).ok_or_else(|| {
                ShadowError::Hierarchy(format!("{} not found in virtual children of {}", node, parent))
            })?;
            let neighbor = match direction {
                Direction::Next => list.get(idx + 1),
                Direction::Previous => idx.checked_sub(1).and_then(|i| list.get(i)),
            };
            return Ok(neighbor.copied());
        }

        let step = |id: NodeId| match direction {
            Direction::Next => self.tree.next_sibling(id),
            Direction::Previous => self.tree.prev_sibling(id),
        };
        let mut sibling = step(node);
        if let Some(host) = self.shadows.host_of_root(parent) {
            // Light children parked under the host are not the shadow's
            while let Some(s) = sibling {
                if self.overlay.virtual_parent(s) != Some(host) {
                    break;
                }
                sibling = step(s);
            }
        }
        Ok(sibling)
    }

    /// Logical children
    pub fn child_nodes(&self, node: NodeId) -> Vec<NodeId> {
        if let Some(list) = self.overlay.virtual_children(node) {
            return list.to_vec();
        }
        if let Some(host) = self.shadows.host_of_root(node) {
            return self
                .tree
                .child_ids(host)
                .into_iter()
                .filter(|&c| self.overlay.virtual_parent(c) != Some(host))
                .collect();
        }
        self.tree.child_ids(node)
    }

    pub fn first_child(&self, node: NodeId) -> Option<NodeId> {
        self.child_nodes(node).first().copied()
    }

    pub fn last_child(&self, node: NodeId) -> Option<NodeId> {
        self.child_nodes(node).last().copied()
    }

    pub fn has_child_nodes(&self, node: NodeId) -> bool {
        match self.overlay.virtual_children(node) {
            Some(list) => !list.is_empty(),
            None => self.first_child(node).is_some(),
        }
    }

    /// Root reached by following logical parents. With `composed`, shadow
    /// boundaries are crossed via their hosts up to the outermost root.
    pub fn root_of(&self, node: NodeId, composed: bool) -> NodeId {
        let mut current = node;
        loop {
            while let Some(parent) = self.parent_of(current) {
                current = parent;
            }
            match self.shadows.host_of_root(current) {
                Some(host) if composed => current = host,
                _ => return current,
            }
        }
    }

    /// Host of the nearest shadow enclosing `node` (not counting a shadow
    /// `node` itself hosts)
    pub fn enclosing_shadow(&self, node: NodeId) -> Option<NodeId> {
        self.shadows.host_of_root(self.root_of(node, false))
    }

    /// Is `ancestor` a logical inclusive ancestor of `node`, crossing shadow
    /// boundaries through hosts
    pub fn is_inclusive_ancestor(&self, ancestor: NodeId, node: NodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self
                .parent_of(id)
                .or_else(|| self.shadows.host_of_root(id));
        }
        false
    }

    /// Logical text content. Text and comment nodes give their data; other
    /// nodes concatenate the text of their logical descendants.
    pub fn text_content(&self, node: NodeId) -> String {
        let mut out = String::new();
        self.collect_text(node, &mut out);
        out
    }

    fn collect_text(&self, node: NodeId, out: &mut String) {
        match self.tree.kind(node) {
            Some(NodeKind::Text) | Some(NodeKind::Comment) => {
                if let Some(text) = self.tree.get(node).and_then(|n| n.as_text()) {
                    out.push_str(text);
                }
            }
            Some(_) => {
                for child in self.child_nodes(node) {
                    if self.tree.kind(child) != Some(NodeKind::Comment) {
                        self.collect_text(child, out);
                    }
                }
            }
            None => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ShadowRootInit;

    struct Fixture {
        tree: DomTree,
        overlay: TreeOverlay,
        shadows: ShadowRoots,
        host: NodeId,
        root: NodeId,
        light: Vec<NodeId>,
        inner: Vec<NodeId>,
    }

    // host(div) with light [a, b], shadow content [x, y] natively under the host
    fn fixture() -> Fixture {
        let mut tree = DomTree::new();
        let host = tree.create_element("div");
        tree.append_child(tree.root(), host).unwrap();
        let a = tree.create_text("a");
        let b = tree.create_element("b");
        tree.append_child(host, a).unwrap();
        tree.append_child(host, b).unwrap();

        let mut overlay = TreeOverlay::new();
        overlay.virtualize(&tree, host).unwrap();
        tree.remove_all_children(host);

        let root = tree.create_fragment();
        let mut shadows = ShadowRoots::new();
        shadows.insert(host, root, &ShadowRootInit::default());

        let x = tree.create_element("span");
        let y = tree.create_text("y");
        tree.append_child(host, x).unwrap();
        tree.append_child(host, y).unwrap();

        Fixture { tree, overlay, shadows, host, root, light: vec![a, b], inner: vec![x, y] }
    }

    #[test]
    fn test_parent_of() {
        let f = fixture();
        let nav = Navigator::new(&f.tree, &f.overlay, &f.shadows);
        assert_eq!(nav.parent_of(f.light[0]), Some(f.host));
        assert_eq!(nav.parent_of(f.inner[0]), Some(f.root));
        assert_eq!(nav.parent_of(f.root), None);
        assert_eq!(nav.parent_of(f.host), Some(f.tree.root()));
    }

    #[test]
    fn test_children_views() {
        let f = fixture();
        let nav = Navigator::new(&f.tree, &f.overlay, &f.shadows);
        assert_eq!(nav.child_nodes(f.host), f.light);
        assert_eq!(nav.child_nodes(f.root), f.inner);
        assert_eq!(nav.first_child(f.root), Some(f.inner[0]));
        assert_eq!(nav.last_child(f.host), Some(f.light[1]));
        assert!(nav.has_child_nodes(f.host));
    }

    #[test]
    fn test_siblings() {
        let f = fixture();
        let nav = Navigator::new(&f.tree, &f.overlay, &f.shadows);
        assert_eq!(nav.sibling_of(f.light[0], Direction::Next).unwrap(), Some(f.light[1]));
        assert_eq!(nav.sibling_of(f.light[0], Direction::Previous).unwrap(), None);
        assert_eq!(nav.sibling_of(f.inner[1], Direction::Previous).unwrap(), Some(f.inner[0]));
        assert_eq!(nav.sibling_of(f.inner[1], Direction::Next).unwrap(), None);
    }

    #[test]
    fn test_sibling_skips_parked_light_children() {
        let mut f = fixture();
        // Park a light child natively between the shadow's children
        let parked = f.light[1];
        f.tree.insert_before(f.host, parked, Some(f.inner[1])).unwrap();
        let nav = Navigator::new(&f.tree, &f.overlay, &f.shadows);
        assert_eq!(nav.sibling_of(f.inner[0], Direction::Next).unwrap(), Some(f.inner[1]));
        assert_eq!(nav.child_nodes(f.root), f.inner);
        // Still logically the host's
        assert_eq!(nav.parent_of(parked), Some(f.host));
    }

    #[test]
    fn test_sibling_inconsistency_is_hierarchy_error() {
        let mut f = fixture();
        f.overlay.forget_child(f.host, f.light[0]);
        let nav = Navigator::new(&f.tree, &f.overlay, &f.shadows);
        assert_eq!(nav.parent_of(f.light[0]), Some(f.host));
        assert!(matches!(
            nav.sibling_of(f.light[0], Direction::Next),
            Err(ShadowError::Hierarchy(_))
        ));
    }

    #[test]
    fn test_native_child_of_virtual_non_host_is_detached() {
        let mut f = fixture();
        let other = f.tree.create_element("slot");
        f.overlay.virtualize(&f.tree, other).unwrap();
        let lonely = f.tree.create_text("lonely");
        f.tree.append_child(other, lonely).unwrap();
        let nav = Navigator::new(&f.tree, &f.overlay, &f.shadows);
        assert_eq!(nav.parent_of(lonely), None);
        assert_eq!(nav.sibling_of(lonely, Direction::Next).unwrap(), None);
    }

    #[test]
    fn test_root_of() {
        let f = fixture();
        let nav = Navigator::new(&f.tree, &f.overlay, &f.shadows);
        assert_eq!(nav.root_of(f.inner[0], false), f.root);
        assert_eq!(nav.root_of(f.inner[0], true), f.tree.root());
        assert_eq!(nav.root_of(f.light[0], false), f.tree.root());
        assert_eq!(nav.enclosing_shadow(f.inner[0]), Some(f.host));
        assert_eq!(nav.enclosing_shadow(f.host), None);
    }

    #[test]
    fn test_text_content() {
        let f = fixture();
        let nav = Navigator::new(&f.tree, &f.overlay, &f.shadows);
        assert_eq!(nav.text_content(f.host), "a");
        assert_eq!(nav.text_content(f.root), "y");
    }
}

//! Shadow roots
//!
//! Shadow root records and the host ↔ root side table.
//!
//! A shadow root is represented in the arena by a detached fragment node, so
//! it has a `NodeId` like any other node and can be returned from
//! navigation. Its content lives natively under the host element.

use std::collections::HashMap;

use fos_dom::NodeId;

/// Shadow root mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ShadowRootMode {
    #[default]
    Open,
    Closed,
}

/// Shadow root initialization options
#[derive(Debug, Clone, Default)]
pub struct ShadowRootInit {
    pub mode: ShadowRootMode,
    pub delegates_focus: bool,
}

impl ShadowRootInit {
    pub fn closed() -> Self {
        Self {
            mode: ShadowRootMode::Closed,
            ..Self::default()
        }
    }
}

/// Shadow root
#[derive(Debug, Clone)]
pub struct ShadowRoot {
    /// Host element
    host: NodeId,
    /// Fragment node standing in for the root
    root: NodeId,
    /// Mode (open/closed)
    mode: ShadowRootMode,
    /// Whether focus is delegated to the first focusable element
    delegates_focus: bool,
    /// Per-instance identity, unique for the owning `ShadowRoots`
    unique: u32,
    /// Completed projection passes
    render_count: u64,
}

impl ShadowRoot {
    pub fn host(&self) -> NodeId {
        self.host
    }

    pub fn root(&self) -> NodeId {
        self.root
    }

    pub fn mode(&self) -> ShadowRootMode {
        self.mode
    }

    pub fn delegates_focus(&self) -> bool {
        self.delegates_focus
    }

    pub fn unique(&self) -> u32 {
        self.unique
    }

    pub fn render_count(&self) -> u64 {
        self.render_count
    }

    pub(crate) fn record_render(&mut self) {
        self.render_count += 1;
    }

    /// Selector matching exactly this shadow's host, e.g. `div[shadow-host-id="3"]`
    pub fn host_selector(&self, local_name: &str, id_attribute: &str) -> String {
        format!("{}[{}=\"{}\"]", local_name, id_attribute, self.unique)
    }
}

/// Side table of all shadow roots, keyed by host and by root node
#[derive(Debug)]
pub struct ShadowRoots {
    by_host: HashMap<NodeId, ShadowRoot>,
    by_root: HashMap<NodeId, NodeId>,
    next_unique: u32,
}

impl ShadowRoots {
    pub fn new() -> Self {
        Self {
            by_host: HashMap::new(),
            by_root: HashMap::new(),
            next_unique: 1,
        }
    }

    /// Record a new shadow root; the caller checks the host is not one yet
    pub(crate) fn insert(&mut self, host: NodeId, root: NodeId, init: &ShadowRootInit) -> &ShadowRoot {
        let unique = self.next_unique;
        self.next_unique += 1;
        self.by_root.insert(root, host);
        self.by_host.entry(host).or_insert(ShadowRoot {
            host,
            root,
            mode: init.mode,
            delegates_focus: init.delegates_focus,
            unique,
            render_count: 0,
        })
    }

    /// Shadow attached to `host`, regardless of mode
    pub fn get(&self, host: NodeId) -> Option<&ShadowRoot> {
        self.by_host.get(&host)
    }

    pub(crate) fn get_mut(&mut self, host: NodeId) -> Option<&mut ShadowRoot> {
        self.by_host.get_mut(&host)
    }

    pub fn is_host(&self, node: NodeId) -> bool {
        self.by_host.contains_key(&node)
    }

    pub fn is_root(&self, node: NodeId) -> bool {
        self.by_root.contains_key(&node)
    }

    /// Host owning the shadow root node `root`
    pub fn host_of_root(&self, root: NodeId) -> Option<NodeId> {
        self.by_root.get(&root).copied()
    }

    pub fn len(&self) -> usize {
        self.by_host.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_host.is_empty()
    }
}

impl Default for ShadowRoots {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fos_dom::DomTree;

    #[test]
    fn test_unique_ids_increase() {
        let mut tree = DomTree::new();
        let (h1, r1) = (tree.create_element("div"), tree.create_fragment());
        let (h2, r2) = (tree.create_element("div"), tree.create_fragment());
        let mut roots = ShadowRoots::new();

        let first = roots.insert(h1, r1, &ShadowRootInit::default()).unique();
        let second = roots.insert(h2, r2, &ShadowRootInit::closed()).unique();
        assert!(second > first);

        assert_eq!(roots.host_of_root(r2), Some(h2));
        assert!(roots.is_host(h1));
        assert!(roots.is_root(r1));
        assert!(!roots.is_root(h1));
        assert_eq!(roots.get(h2).unwrap().mode(), ShadowRootMode::Closed);
    }

    #[test]
    fn test_host_selector() {
        let mut tree = DomTree::new();
        let (host, root) = (tree.create_element("div"), tree.create_fragment());
        let mut roots = ShadowRoots::new();
        let shadow = roots.insert(host, root, &ShadowRootInit::default());
        assert_eq!(
            shadow.host_selector("div", "shadow-host-id"),
            format!("div[shadow-host-id=\"{}\"]", shadow.unique())
        );
    }
}

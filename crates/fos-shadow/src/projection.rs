//! Slot Projection Engine
//!
//! One pass per affected shadow:
//! 1. walk the shadow tree in document order, upgrading first-seen `<slot>`
//!    elements (their current children become fallback content);
//! 2. distribute the host's logical children over the slots, first slot wins;
//! 3. explicitly empty any slot that held an assignment last time but was
//!    not visited now;
//! 4. apply: rewrite the native children of every slot whose content
//!    changed, falling back to the captured fallback nodes when empty.
//!
//! Assignment is computed for every slot before anything is applied.

use std::collections::{HashMap, HashSet};

use fos_dom::{DomTree, NodeId, NodeKind};

use crate::{Navigator, ShadowConfig, ShadowError, ShadowResult, ShadowRoots, TreeOverlay};

/// Slot attribute holding a slot's own name
pub const SLOT_NAME_ATTRIBUTE: &str = "name";

/// Where a light child wants to go
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlotTarget {
    /// Element with a `slot` attribute
    Named(String),
    /// Text, comment, or element without a `slot` attribute
    Default,
    /// Never slotted
    Unslottable,
}

impl SlotTarget {
    /// Does a slot called `slot_name` accept this candidate
    pub fn matches(&self, slot_name: &str) -> bool {
        match self {
            Self::Named(name) => !slot_name.is_empty() && name == slot_name,
            Self::Default => slot_name.is_empty(),
            Self::Unslottable => false,
        }
    }

    /// Classify a node of `tree`
    pub fn of(tree: &DomTree, node: NodeId, slot_attribute: &str) -> Self {
        match tree.kind(node) {
            Some(NodeKind::Element) => match tree.get_attribute(node, slot_attribute) {
                Some(name) => Self::Named(name.to_string()),
                None => Self::Default,
            },
            Some(NodeKind::Text) | Some(NodeKind::Comment) => Self::Default,
            _ => Self::Unslottable,
        }
    }
}

/// Nodes assigned to one slot in one pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotAssignment {
    pub slot: NodeId,
    pub nodes: Vec<NodeId>,
}

/// Result of the compute phase for one shadow
#[derive(Debug, Clone)]
pub struct Projection {
    /// Host of the projected shadow
    pub host: NodeId,
    /// Visited slots in document order, then stale slots being emptied
    pub assignments: Vec<SlotAssignment>,
    /// Logical children of the host that no slot took
    pub unassigned: Vec<NodeId>,
    /// `<style>` elements met during the walk
    pub styles: Vec<NodeId>,
}

impl Projection {
    pub fn assignment(&self, slot: NodeId) -> Option<&[NodeId]> {
        self.assignments
            .iter()
            .find(|a| a.slot == slot)
            .map(|a| a.nodes.as_slice())
    }
}

/// Counts from the apply phase
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyStats {
    /// Slots whose native children were replaced
    pub rewritten: usize,
    /// Slots already showing their assignment
    pub skipped: usize,
}

impl ApplyStats {
    pub fn merge(&mut self, other: ApplyStats) {
        self.rewritten += other.rewritten;
        self.skipped += other.skipped;
    }
}

#[derive(Debug, Clone, Default)]
struct SlotState {
    /// Host of the shadow that last visited this slot
    owner: Option<NodeId>,
    assigned: Vec<NodeId>,
}

/// Side table marking which elements have been upgraded to slots
#[derive(Debug, Default)]
pub struct SlotTable {
    slots: HashMap<NodeId, SlotState>,
}

impl SlotTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_slot(&self, node: NodeId) -> bool {
        self.slots.contains_key(&node)
    }

    /// Mark `node` as a slot. Returns false if it already was one.
    pub fn upgrade(&mut self, node: NodeId) -> bool {
        if self.is_slot(node) {
            return false;
        }
        self.slots.insert(node, SlotState::default());
        true
    }

    /// Current assignment (empty for non-slots)
    pub fn assigned(&self, slot: NodeId) -> &[NodeId] {
        self.slots.get(&slot).map(|s| s.assigned.as_slice()).unwrap_or(&[])
    }

    fn claim(&mut self, slot: NodeId, host: NodeId) {
        if let Some(state) = self.slots.get_mut(&slot) {
            state.owner = Some(host);
        }
    }

    /// Slots owned by `host` that still hold nodes but were not visited
    fn stale(&self, host: NodeId, visited: &HashSet<NodeId>) -> Vec<NodeId> {
        let mut stale: Vec<NodeId> = self
            .slots
            .iter()
            .filter(|(id, s)| s.owner == Some(host) && !s.assigned.is_empty() && !visited.contains(id))
            .map(|(&id, _)| id)
            .collect();
        stale.sort();
        stale
    }

    fn set_assigned(&mut self, slot: NodeId, nodes: Vec<NodeId>) {
        self.slots.entry(slot).or_default().assigned = nodes;
    }
}

/// Assign `pool` to `slots` in order; each candidate goes to the first slot
/// that accepts it. Pure and deterministic.
pub fn distribute<F>(pool: &[NodeId], slots: &[(NodeId, String)], target: F) -> (Vec<SlotAssignment>, Vec<NodeId>)
where
    F: Fn(NodeId) -> SlotTarget,
{
    let mut remaining: Vec<(NodeId, SlotTarget)> = pool.iter().map(|&n| (n, target(n))).collect();
    let mut assignments = Vec::with_capacity(slots.len());

    for (slot, name) in slots {
        let (matched, rest): (Vec<_>, Vec<_>) = remaining
            .into_iter()
            .partition(|(_, t)| t.matches(name));
        remaining = rest;
        assignments.push(SlotAssignment {
            slot: *slot,
            nodes: matched.into_iter().map(|(n, _)| n).collect(),
        });
    }

    let unassigned = remaining.into_iter().map(|(n, _)| n).collect();
    (assignments, unassigned)
}

/// Slots and styles found in one shadow tree
#[derive(Debug, Default)]
struct Walk {
    slots: Vec<NodeId>,
    styles: Vec<NodeId>,
}

/// Borrowed state the engine runs against
pub struct ProjectionEngine<'a> {
    pub tree: &'a mut DomTree,
    pub overlay: &'a mut TreeOverlay,
    pub shadows: &'a ShadowRoots,
    pub slots: &'a mut SlotTable,
    pub config: &'a ShadowConfig,
}

impl ProjectionEngine<'_> {
    /// Compute the assignment for the shadow attached to `host`
    pub fn compute(&mut self, host: NodeId) -> ShadowResult<Projection> {
        let shadow = self
            .shadows
            .get(host)
            .ok_or_else(|| ShadowError::NotFound(format!("{} is not a shadow host", host)))?;
        let root = shadow.root();

        let mut walk = Walk::default();
        self.walk(root, &mut walk)?;

        let pool = self
            .overlay
            .virtual_children(host)
            .ok_or_else(|| ShadowError::Hierarchy(format!("shadow host {} is not virtual", host)))?
            .to_vec();

        let named: Vec<(NodeId, String)> = walk
            .slots
            .iter()
            .map(|&slot| {
                let name = self.tree.get_attribute(slot, SLOT_NAME_ATTRIBUTE).unwrap_or("");
                (slot, name.to_string())
            })
            .collect();

        let tree: &DomTree = self.tree;
        let attr = self.config.slot_attribute.as_str();
        let (mut assignments, unassigned) = distribute(&pool, &named, |n| SlotTarget::of(tree, n, attr));

        let visited: HashSet<NodeId> = walk.slots.iter().copied().collect();
        for slot in self.slots.stale(host, &visited) {
            assignments.push(SlotAssignment { slot, nodes: Vec::new() });
        }
        for &slot in &walk.slots {
            self.slots.claim(slot, host);
        }

        tracing::trace!(
            "computed projection for {}: {} slots, {} unassigned",
            host,
            assignments.len(),
            unassigned.len()
        );

        Ok(Projection {
            host,
            assignments,
            unassigned,
            styles: walk.styles,
        })
    }

    fn walk(&mut self, node: NodeId, out: &mut Walk) -> ShadowResult<()> {
        let children = Navigator::new(self.tree, self.overlay, self.shadows).child_nodes(node);
        for child in children {
            if self.tree.is_element_named(child, &self.config.slot_tag) && self.slots.upgrade(child) {
                // Whatever the slot holds on first sight is its fallback content
                self.overlay.virtualize(self.tree, child)?;
            }
            if self.slots.is_slot(child) {
                out.slots.push(child);
            } else if self.tree.is_element_named(child, "style") {
                out.styles.push(child);
            } else {
                self.walk(child, out)?;
            }
        }
        Ok(())
    }

    /// Reflect a computed projection in the native tree
    pub fn apply(&mut self, projection: &Projection) -> ShadowResult<ApplyStats> {
        let mut stats = ApplyStats::default();

        for assignment in &projection.assignments {
            let slot = assignment.slot;
            let desired: Vec<NodeId> = if assignment.nodes.is_empty() {
                self.overlay.virtual_children(slot).map(<[NodeId]>::to_vec).unwrap_or_default()
            } else {
                assignment.nodes.clone()
            };

            if self.config.skip_unchanged_slots && self.tree.child_ids(slot) == desired {
                stats.skipped += 1;
            } else {
                self.tree.remove_all_children(slot);
                for node in desired {
                    self.tree.append_child(slot, node)?;
                }
                stats.rewritten += 1;
            }
            self.slots.set_assigned(slot, assignment.nodes.clone());
        }

        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ids(tree: &mut DomTree, n: usize) -> Vec<NodeId> {
        (0..n).map(|_| tree.create_element("div")).collect()
    }

    #[test]
    fn test_target_matching() {
        assert!(SlotTarget::Named("a".into()).matches("a"));
        assert!(!SlotTarget::Named("a".into()).matches(""));
        assert!(!SlotTarget::Named("".into()).matches(""));
        assert!(SlotTarget::Default.matches(""));
        assert!(!SlotTarget::Default.matches("a"));
        assert!(!SlotTarget::Unslottable.matches(""));
    }

    #[test]
    fn test_target_classification() {
        let mut tree = DomTree::new();
        let text = tree.create_text("t");
        let comment = tree.create_comment("c");
        let plain = tree.create_element("p");
        let named = tree.create_element("p");
        tree.set_attribute(named, "slot", "title").unwrap();
        let frag = tree.create_fragment();

        assert_eq!(SlotTarget::of(&tree, text, "slot"), SlotTarget::Default);
        assert_eq!(SlotTarget::of(&tree, comment, "slot"), SlotTarget::Default);
        assert_eq!(SlotTarget::of(&tree, plain, "slot"), SlotTarget::Default);
        assert_eq!(SlotTarget::of(&tree, named, "slot"), SlotTarget::Named("title".into()));
        assert_eq!(SlotTarget::of(&tree, frag, "slot"), SlotTarget::Unslottable);
    }

    #[test]
    fn test_first_slot_wins() {
        let mut tree = DomTree::new();
        let pool = ids(&mut tree, 3);
        let slots = ids(&mut tree, 2);
        let named = vec![(slots[0], "x".to_string()), (slots[1], "x".to_string())];

        let (assignments, unassigned) =
            distribute(&pool, &named, |_| SlotTarget::Named("x".into()));
        assert_eq!(assignments[0].nodes, pool);
        assert!(assignments[1].nodes.is_empty());
        assert!(unassigned.is_empty());
    }

    #[test]
    fn test_distribute_keeps_pool_order() {
        let mut tree = DomTree::new();
        let pool = ids(&mut tree, 4);
        let slots = ids(&mut tree, 2);
        let named = vec![(slots[0], "odd".to_string()), (slots[1], String::new())];

        let (assignments, unassigned) = distribute(&pool, &named, |n| {
            if n == pool[1] || n == pool[3] {
                SlotTarget::Named("odd".into())
            } else if n == pool[2] {
                SlotTarget::Named("missing".into())
            } else {
                SlotTarget::Default
            }
        });
        assert_eq!(assignments[0].nodes, vec![pool[1], pool[3]]);
        assert_eq!(assignments[1].nodes, vec![pool[0]]);
        assert_eq!(unassigned, vec![pool[2]]);
    }

    #[test]
    fn test_slot_table_upgrade_is_monotonic() {
        let mut tree = DomTree::new();
        let slot = tree.create_element("slot");
        let mut table = SlotTable::new();
        assert!(table.upgrade(slot));
        assert!(!table.upgrade(slot));
        assert!(table.is_slot(slot));
        assert!(table.assigned(slot).is_empty());
    }

    #[test]
    fn test_stale_slots() {
        let mut tree = DomTree::new();
        let host = tree.create_element("div");
        let slot = tree.create_element("slot");
        let node = tree.create_text("t");
        let mut table = SlotTable::new();
        table.upgrade(slot);
        table.claim(slot, host);
        table.set_assigned(slot, vec![node]);

        assert_eq!(table.assigned(slot), &[node]);
        assert_eq!(table.stale(host, &HashSet::new()), vec![slot]);
        assert!(table.stale(host, &HashSet::from([slot])).is_empty());
    }
}

//! Shadow-aware DOM
//!
//! [`ShadowDom`] owns a [`Document`] plus all shadow state and exposes the
//! standard node accessors with shadow semantics. Every structural mutation
//! runs inside an update scope; closing the outermost scope for a set of
//! shadows projects each of them once.

use std::collections::{BTreeSet, HashMap};

use fos_dom::{Document, DomTree, NodeId, NodeKind};

use crate::mutation::{MutationHook, MutationRecord};
use crate::projection::{ProjectionEngine, SLOT_NAME_ATTRIBUTE};
use crate::{
    scope_stylesheet, ApplyStats, Direction, ElementRegistry, LightningStyleParser, Navigator, SchedulerStats,
    ScopeEntry, ShadowConfig, ShadowError, ShadowResult, ShadowRoot, ShadowRootInit, ShadowRootMode, ShadowRoots,
    SlotTable, StyleParser, TreeOverlay, UpdateScheduler,
};

/// Rule making slots transparent to layout
const SLOT_STYLE: &str = "slot { display: contents; }";

/// Cumulative projection counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProjectionStats {
    pub passes: u64,
    pub slots_rewritten: u64,
    pub slots_skipped: u64,
}

/// Document with shadow roots, slots and batched projection
pub struct ShadowDom {
    document: Document,
    overlay: TreeOverlay,
    shadows: ShadowRoots,
    slots: SlotTable,
    scheduler: UpdateScheduler,
    registry: ElementRegistry,
    config: ShadowConfig,
    style_parser: Box<dyn StyleParser>,
    /// Style node -> (host it was scoped for, unscoped source)
    style_sources: HashMap<NodeId, (NodeId, String)>,
    hook: Option<MutationHook>,
    stats: ProjectionStats,
    slot_style_installed: bool,
}

impl std::fmt::Debug for ShadowDom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShadowDom")
            .field("nodes", &self.document.tree().len())
            .field("shadows", &self.shadows.len())
            .field("scopes", &self.scheduler.depth())
            .field("stats", &self.stats)
            .finish_non_exhaustive()
    }
}

impl ShadowDom {
    pub fn new(document: Document) -> Self {
        Self::with_config(document, ShadowConfig::default())
    }

    pub fn with_config(document: Document, config: ShadowConfig) -> Self {
        Self {
            document,
            overlay: TreeOverlay::new(),
            shadows: ShadowRoots::new(),
            slots: SlotTable::new(),
            scheduler: UpdateScheduler::new(),
            registry: ElementRegistry::new(),
            config,
            style_parser: Box::new(LightningStyleParser),
            style_sources: HashMap::new(),
            hook: None,
            stats: ProjectionStats::default(),
            slot_style_installed: false,
        }
    }

    /// Replace the parser used for style scoping
    pub fn with_style_parser(mut self, parser: Box<dyn StyleParser>) -> Self {
        self.style_parser = parser;
        self
    }

    // --- Access ---

    pub fn document(&self) -> &Document {
        &self.document
    }

    pub fn tree(&self) -> &DomTree {
        self.document.tree()
    }

    pub(crate) fn tree_mut(&mut self) -> &mut DomTree {
        self.document.tree_mut()
    }

    pub fn overlay(&self) -> &TreeOverlay {
        &self.overlay
    }

    pub fn config(&self) -> &ShadowConfig {
        &self.config
    }

    pub fn registry(&self) -> &ElementRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut ElementRegistry {
        &mut self.registry
    }

    pub fn navigator(&self) -> Navigator<'_> {
        Navigator::new(self.document.tree(), &self.overlay, &self.shadows)
    }

    pub fn stats(&self) -> ProjectionStats {
        self.stats
    }

    pub fn scheduler_stats(&self) -> SchedulerStats {
        self.scheduler.stats()
    }

    /// Open update scopes
    pub fn scope_depth(&self) -> usize {
        self.scheduler.depth()
    }

    pub fn create_element(&mut self, tag: &str) -> NodeId {
        self.tree_mut().create_element(tag)
    }

    pub fn create_text(&mut self, text: &str) -> NodeId {
        self.tree_mut().create_text(text)
    }

    pub fn create_comment(&mut self, text: &str) -> NodeId {
        self.tree_mut().create_comment(text)
    }

    pub fn create_fragment(&mut self) -> NodeId {
        self.tree_mut().create_fragment()
    }

    // --- Shadow roots ---

    /// Attach a shadow to `host`, returning the shadow root's node.
    ///
    /// The host's current children become its light children.
    pub fn attach_shadow(&mut self, host: NodeId, init: ShadowRootInit) -> ShadowResult<NodeId> {
        if self.shadows.is_host(host) {
            return Err(ShadowError::InvalidState(format!("{} already hosts a shadow", host)));
        }
        let name = self
            .tree()
            .local_name(host)
            .ok_or_else(|| ShadowError::NotSupported(format!("{} is not an element", host)))?
            .to_string();
        if !self.registry.can_attach(&name) {
            return Err(ShadowError::NotSupported(format!("<{}> cannot host a shadow", name)));
        }

        self.overlay.virtualize(self.document.tree(), host)?;
        self.install_slot_style()?;

        let tree = self.document.tree_mut();
        let root = tree.create_fragment();
        tree.remove_all_children(host);
        let unique = self.shadows.insert(host, root, &init).unique();
        let id_attr = self.config.host_id_attribute.clone();
        self.tree_mut().set_attribute(host, &id_attr, &unique.to_string())?;

        tracing::debug!("attached {:?} shadow {} to <{}> {}", init.mode, root, name, host);
        self.render(host)?;
        Ok(root)
    }

    fn install_slot_style(&mut self) -> ShadowResult<()> {
        if !self.config.install_slot_style || self.slot_style_installed {
            return Ok(());
        }
        self.slot_style_installed = true;
        let Some(head) = self.document.head() else {
            return Ok(());
        };
        let tree = self.document.tree_mut();
        let style = tree.create_element("style");
        tree.set_text_content(style, SLOT_STYLE)?;
        tree.append_child(head, style)?;
        Ok(())
    }

    /// Shadow root of `host`, hidden for closed shadows
    pub fn shadow_root(&self, host: NodeId) -> Option<NodeId> {
        self.shadows
            .get(host)
            .filter(|s| s.mode() == ShadowRootMode::Open)
            .map(ShadowRoot::root)
    }

    /// Shadow record of `host`, regardless of mode
    pub fn shadow(&self, host: NodeId) -> Option<&ShadowRoot> {
        self.shadows.get(host)
    }

    pub fn host_of(&self, root: NodeId) -> Option<NodeId> {
        self.shadows.host_of_root(root)
    }

    pub fn is_shadow_root(&self, node: NodeId) -> bool {
        self.shadows.is_root(node)
    }

    // --- Update scopes ---

    /// Shadows a mutation of `nodes` affects: a host's own shadow, the
    /// shadow a root stands for, otherwise the nearest enclosing shadow
    fn affected_shadows(&self, nodes: &[NodeId]) -> BTreeSet<NodeId> {
        let nav = self.navigator();
        nodes
            .iter()
            .filter_map(|&node| {
                if self.shadows.is_host(node) {
                    Some(node)
                } else if let Some(host) = self.shadows.host_of_root(node) {
                    Some(host)
                } else {
                    nav.enclosing_shadow(node)
                }
            })
            .collect()
    }

    /// Open an update scope covering the shadows `nodes` affect.
    ///
    /// Every call must be paired with [`ShadowDom::end_update`]; prefer
    /// [`ShadowDom::update`].
    pub fn begin_update(&mut self, nodes: &[NodeId]) -> ScopeEntry {
        let shadows = self.affected_shadows(nodes);
        let entry = self.scheduler.begin(shadows, nodes);
        tracing::trace!("update scope {:?} at depth {}", entry, self.scheduler.depth());
        entry
    }

    /// Close the innermost scope, projecting its shadows if it was the last
    /// scope of its frame
    pub fn end_update(&mut self) -> ShadowResult<()> {
        let Some(frame) = self.scheduler.end()? else {
            return Ok(());
        };
        tracing::trace!(
            "closing update frame: {} shadows, {} triggers",
            frame.shadows.len(),
            frame.triggers.len()
        );
        // Every shadow of a popped frame is projected; the first failure wins
        let mut first_err = None;
        for host in frame.shadows {
            if let Err(err) = self.render(host) {
                tracing::warn!("projection of {} failed: {}", host, err);
                first_err.get_or_insert(err);
            }
        }
        first_err.map_or(Ok(()), Err)
    }

    /// Run `f` inside an update scope for `nodes`. The scope is closed even
    /// when `f` fails; an error from `f` takes precedence.
    pub fn update<T, F>(&mut self, nodes: &[NodeId], f: F) -> ShadowResult<T>
    where
        F: FnOnce(&mut Self) -> ShadowResult<T>,
    {
        self.begin_update(nodes);
        let result = f(self);
        let closed = self.end_update();
        let value = result?;
        closed?;
        Ok(value)
    }

    /// Project the shadows `node` affects right away, unless an open scope
    /// already covers them. Returns `None` when nothing was projected.
    pub fn request_immediate(&mut self, node: NodeId) -> ShadowResult<Option<ApplyStats>> {
        let mut total: Option<ApplyStats> = None;
        for host in self.affected_shadows(&[node]) {
            if self.scheduler.is_covered(host) {
                continue;
            }
            let applied = self.render(host)?;
            total.get_or_insert_with(ApplyStats::default).merge(applied);
        }
        Ok(total)
    }

    /// Run one projection pass for the shadow of `host`
    pub fn render(&mut self, host: NodeId) -> ShadowResult<ApplyStats> {
        let (projection, applied) = {
            let mut engine = ProjectionEngine {
                tree: self.document.tree_mut(),
                overlay: &mut self.overlay,
                shadows: &self.shadows,
                slots: &mut self.slots,
                config: &self.config,
            };
            let projection = engine.compute(host)?;
            let applied = engine.apply(&projection)?;
            (projection, applied)
        };

        if self.config.scope_styles {
            self.scope_styles(host, &projection.styles)?;
        }
        if let Some(shadow) = self.shadows.get_mut(host) {
            shadow.record_render();
        }

        self.stats.passes += 1;
        self.stats.slots_rewritten += applied.rewritten as u64;
        self.stats.slots_skipped += applied.skipped as u64;
        tracing::debug!(
            "projected shadow of {}: {} slots, {} rewritten, {} skipped",
            host,
            projection.assignments.len(),
            applied.rewritten,
            applied.skipped
        );
        Ok(applied)
    }

    fn scope_styles(&mut self, host: NodeId, styles: &[NodeId]) -> ShadowResult<()> {
        let Some(shadow) = self.shadows.get(host) else {
            return Ok(());
        };
        let local_name = self.tree().local_name(host).unwrap_or("*");
        let selector = shadow.host_selector(local_name, &self.config.host_id_attribute);

        for &style in styles {
            let source = match self.style_sources.get(&style) {
                Some((scoped_for, _)) if *scoped_for == host => continue,
                Some((_, source)) => source.clone(),
                None => self.tree().text_content(style),
            };
            match scope_stylesheet(
                &source,
                &selector,
                &self.config.host_id_attribute,
                self.style_parser.as_ref(),
            ) {
                Ok(scoped) => {
                    self.tree_mut().set_text_content(style, &scoped)?;
                    self.style_sources.insert(style, (host, source));
                }
                Err(err) => tracing::warn!("leaving style {} unscoped: {}", style, err),
            }
        }
        Ok(())
    }

    // --- Mutation hook ---

    /// Observe mutations. The hook runs while the mutation's scope is open
    /// and is not re-entered by the mutations it makes itself.
    pub fn set_mutation_hook<F>(&mut self, hook: F)
    where
        F: FnMut(&mut ShadowDom, &MutationRecord) -> ShadowResult<()> + 'static,
    {
        self.hook = Some(Box::new(hook));
    }

    pub fn clear_mutation_hook(&mut self) {
        self.hook = None;
    }

    fn notify(&mut self, record: MutationRecord) -> ShadowResult<()> {
        let Some(mut hook) = self.hook.take() else {
            return Ok(());
        };
        let result = hook(self, &record);
        // The hook may have installed a replacement
        if self.hook.is_none() {
            self.hook = Some(hook);
        }
        result
    }

    // --- Navigation ---

    pub fn parent_node(&self, node: NodeId) -> Option<NodeId> {
        self.navigator().parent_of(node)
    }

    pub fn child_nodes(&self, node: NodeId) -> Vec<NodeId> {
        self.navigator().child_nodes(node)
    }

    pub fn first_child(&self, node: NodeId) -> Option<NodeId> {
        self.navigator().first_child(node)
    }

    pub fn last_child(&self, node: NodeId) -> Option<NodeId> {
        self.navigator().last_child(node)
    }

    pub fn next_sibling(&self, node: NodeId) -> ShadowResult<Option<NodeId>> {
        self.navigator().sibling_of(node, Direction::Next)
    }

    pub fn previous_sibling(&self, node: NodeId) -> ShadowResult<Option<NodeId>> {
        self.navigator().sibling_of(node, Direction::Previous)
    }

    pub fn has_child_nodes(&self, node: NodeId) -> bool {
        self.navigator().has_child_nodes(node)
    }

    pub fn root_node(&self, node: NodeId, composed: bool) -> NodeId {
        self.navigator().root_of(node, composed)
    }

    // --- Structure ---

    /// Insert `child` under `parent` before `reference` (at the end for
    /// `None`), moving it out of its current logical parent first.
    pub fn insert_before(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) -> ShadowResult<NodeId> {
        let reference = self.validate_insert(parent, child, reference)?;

        let mut affected = vec![parent];
        affected.extend(self.parent_node(child));

        self.update(&affected, |dom| {
            dom.detach_logical(child)?;
            let added = dom.insert_raw(parent, child, reference)?;
            dom.notify(MutationRecord::child_list(parent, added, Vec::new()))?;
            Ok(child)
        })
    }

    pub fn append_child(&mut self, parent: NodeId, child: NodeId) -> ShadowResult<NodeId> {
        self.insert_before(parent, child, None)
    }

    /// Checks run before anything is touched. Returns the effective reference.
    fn validate_insert(&self, parent: NodeId, child: NodeId, reference: Option<NodeId>) -> ShadowResult<Option<NodeId>> {
        let tree = self.tree();
        let parent_kind = tree
            .kind(parent)
            .ok_or_else(|| ShadowError::NotFound(format!("parent {} does not exist", parent)))?;
        let child_kind = tree
            .kind(child)
            .ok_or_else(|| ShadowError::NotFound(format!("child {} does not exist", child)))?;

        if !matches!(parent_kind, NodeKind::Element | NodeKind::DocumentFragment | NodeKind::Document) {
            return Err(ShadowError::Hierarchy(format!("{} cannot have children", parent)));
        }
        if child_kind == NodeKind::Document || self.shadows.is_root(child) {
            return Err(ShadowError::Hierarchy(format!("{} cannot be inserted", child)));
        }
        let nav = self.navigator();
        if nav.is_inclusive_ancestor(child, parent) {
            return Err(ShadowError::Hierarchy(format!("{} is an ancestor of {}", child, parent)));
        }

        let Some(r) = reference else {
            return Ok(None);
        };
        if nav.parent_of(r) != Some(parent) {
            return Err(ShadowError::NotFound(format!("reference {} is not a child of {}", r, parent)));
        }
        if r == child {
            return nav.sibling_of(child, Direction::Next);
        }
        Ok(Some(r))
    }

    /// Remove `node` from its logical parent, wherever that lives
    fn detach_logical(&mut self, node: NodeId) -> ShadowResult<()> {
        match self.parent_node(node) {
            Some(parent) if self.overlay.is_virtualized(parent) => {
                self.overlay.remove(self.document.tree_mut(), parent, node)?;
            }
            _ => {
                self.tree_mut().detach(node);
            }
        }
        Ok(())
    }

    /// Insert without validation or scoping. Returns the inserted nodes.
    fn insert_raw(&mut self, parent: NodeId, child: NodeId, reference: Option<NodeId>) -> ShadowResult<Vec<NodeId>> {
        if self.overlay.is_virtualized(parent) {
            let added = self.overlay.insert(self.document.tree_mut(), parent, child, reference)?;
            self.show_unprojected_fallback(parent)?;
            return Ok(added);
        }

        let added = if self.tree().kind(child) == Some(NodeKind::DocumentFragment) {
            self.tree().child_ids(child)
        } else {
            vec![child]
        };
        // Shadow content lives natively under the host
        let target = self.shadows.host_of_root(parent).unwrap_or(parent);
        self.tree_mut().insert_before(target, child, reference)?;
        Ok(added)
    }

    /// A slot outside every shadow is never projected again, so its native
    /// children follow its fallback content directly
    fn show_unprojected_fallback(&mut self, slot: NodeId) -> ShadowResult<()> {
        if !self.slots.is_slot(slot) || self.navigator().enclosing_shadow(slot).is_some() {
            return Ok(());
        }
        let fallback = self.fallback_content(slot).to_vec();
        let tree = self.document.tree_mut();
        tree.remove_all_children(slot);
        for node in fallback {
            tree.append_child(slot, node)?;
        }
        Ok(())
    }

    /// Remove `child` from `parent`.
    ///
    /// Removing a host's light child through its shadow root is rejected
    /// without touching anything.
    pub fn remove_child(&mut self, parent: NodeId, child: NodeId) -> ShadowResult<NodeId> {
        if let Some(host) = self.shadows.host_of_root(parent) {
            if self.overlay.virtual_parent(child) == Some(host) {
                return Err(ShadowError::NotFound(format!("{} belongs to the host, not its shadow", child)));
            }
        }
        if self.parent_node(child) != Some(parent) {
            return Err(ShadowError::NotFound(format!("{} is not a child of {}", child, parent)));
        }

        self.update(&[parent], |dom| {
            dom.detach_logical(child)?;
            dom.notify(MutationRecord::child_list(parent, Vec::new(), vec![child]))?;
            Ok(child)
        })
    }

    /// Remove all logical children of `node`, returning them in order
    pub fn clear_children(&mut self, node: NodeId) -> ShadowResult<Vec<NodeId>> {
        self.update(&[node], |dom| {
            let removed = dom.clear_raw(node);
            if !removed.is_empty() {
                dom.notify(MutationRecord::child_list(node, Vec::new(), removed.clone()))?;
            }
            Ok(removed)
        })
    }

    fn clear_raw(&mut self, node: NodeId) -> Vec<NodeId> {
        if self.overlay.is_virtualized(node) {
            return self.overlay.clear(self.document.tree_mut(), node);
        }
        let children = self.child_nodes(node);
        for &child in &children {
            self.tree_mut().detach(child);
        }
        children
    }

    // --- Text ---

    /// Logical text content. A scoped `<style>` reports its original source.
    pub fn text_content(&self, node: NodeId) -> String {
        if let Some((_, source)) = self.style_sources.get(&node) {
            return source.clone();
        }
        self.navigator().text_content(node)
    }

    /// Unscoped source of a `<style>` rewritten for its shadow
    pub(crate) fn style_source(&self, node: NodeId) -> Option<&str> {
        self.style_sources.get(&node).map(|(_, source)| source.as_str())
    }

    /// Replace character data, or all logical children with one text node.
    /// Unchanged text is a no-op.
    pub fn set_text_content(&mut self, node: NodeId, text: &str) -> ShadowResult<()> {
        if self.text_content(node) == text {
            return Ok(());
        }
        self.style_sources.remove(&node);

        match self.tree().kind(node) {
            Some(NodeKind::Text) | Some(NodeKind::Comment) => {
                self.tree_mut().set_text_content(node, text)?;
                self.notify(MutationRecord::character_data(node))
            }
            Some(_) => self.update(&[node], |dom| {
                let removed = dom.clear_raw(node);
                let added = if text.is_empty() {
                    Vec::new()
                } else {
                    let t = dom.create_text(text);
                    dom.insert_raw(node, t, None)?
                };
                dom.notify(MutationRecord::child_list(node, added, removed))
            }),
            None => Err(ShadowError::NotFound(format!("{} does not exist", node))),
        }
    }

    // --- Attributes ---

    pub fn get_attribute(&self, node: NodeId, name: &str) -> Option<&str> {
        self.tree().get_attribute(node, name)
    }

    pub fn has_attribute(&self, node: NodeId, name: &str) -> bool {
        self.tree().has_attribute(node, name)
    }

    pub fn set_attribute(&mut self, node: NodeId, name: &str, value: &str) -> ShadowResult<()> {
        let old = self.tree_mut().set_attribute(node, name, value)?;
        if old.as_deref() == Some(value) {
            return Ok(());
        }
        self.attribute_changed(node, name)
    }

    pub fn remove_attribute(&mut self, node: NodeId, name: &str) -> ShadowResult<()> {
        if self.tree_mut().remove_attribute(node, name)?.is_none() {
            return Ok(());
        }
        self.attribute_changed(node, name)
    }

    /// Re-project when the change can move nodes between slots
    fn attribute_changed(&mut self, node: NodeId, name: &str) -> ShadowResult<()> {
        let host = self.overlay.virtual_parent(node).filter(|&p| self.shadows.is_host(p));
        if let Some(host) = host.filter(|_| name == self.config.slot_attribute) {
            self.request_immediate(host)?;
        } else if name == SLOT_NAME_ATTRIBUTE && self.slots.is_slot(node) {
            self.request_immediate(node)?;
        }
        self.notify(MutationRecord::attribute(node, name))
    }

    // --- Slots ---

    pub fn is_slot(&self, node: NodeId) -> bool {
        self.slots.is_slot(node)
    }

    /// Name of a slot element; empty for the default slot
    pub fn slot_name(&self, slot: NodeId) -> Option<&str> {
        if !self.slots.is_slot(slot) && !self.tree().is_element_named(slot, &self.config.slot_tag) {
            return None;
        }
        Some(self.get_attribute(slot, SLOT_NAME_ATTRIBUTE).unwrap_or(""))
    }

    pub fn set_slot_name(&mut self, slot: NodeId, name: &str) -> ShadowResult<()> {
        self.set_attribute(slot, SLOT_NAME_ATTRIBUTE, name)
    }

    /// Nodes currently projected into `slot`
    pub fn assigned_nodes(&self, slot: NodeId) -> &[NodeId] {
        self.slots.assigned(slot)
    }

    /// Slot `node` is projected into
    pub fn assigned_slot(&self, node: NodeId) -> Option<NodeId> {
        self.tree()
            .parent(node)
            .filter(|&p| self.slots.is_slot(p) && self.overlay.virtual_parent(node) != Some(p))
    }

    /// Children a slot shows when nothing is assigned
    pub fn fallback_content(&self, slot: NodeId) -> &[NodeId] {
        if !self.slots.is_slot(slot) {
            return &[];
        }
        self.overlay.virtual_children(slot).unwrap_or(&[])
    }
}

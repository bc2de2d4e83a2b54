//! The editor facade: one instance per mounted hierarchy editor.
//!
//! [`TemplateEditor`] turns user gestures into either a new forest, which is
//! committed through the [`ForestHost`] before it becomes visible, or an
//! updated viewport transform that only the rendering layer consumes. Every
//! failure degrades to an [`EditOutcome`] or a `false` return. Nothing here
//! panics or returns `Err` for ordinary use.

use fundtree_core::{DropPolicy, DsKey, EditorSettings, Forest, NodeAddress, PlacementMatrix};

use crate::drag::{CloneSuffixes, DragInfo, DropEngine, DropGesture, DropRejection};
use crate::expansion::ExpansionState;
use crate::host::{CommitError, ForestHost};
use crate::relationship::{annotate, DecoratedNode};
use crate::selection::{FocusTracker, SelectionMode};
use crate::viewport::{Fit, Pointer, Viewport};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EditOutcome {
    /// The host accepted the new forest and the editor now renders it.
    Committed,
    /// The edit was not attempted; the forest is unchanged.
    Ignored(DropRejection),
    /// The host refused the new forest; the previous forest is kept.
    CommitRejected(CommitError),
}

impl EditOutcome {
    pub fn is_committed(&self) -> bool {
        matches!(self, EditOutcome::Committed)
    }
}

pub struct TemplateEditor<H, P = PlacementMatrix> {
    host: H,
    engine: DropEngine<P>,
    forest: Forest,
    edit_mode: bool,
    settings: EditorSettings,
    viewport: Viewport,
    focus: FocusTracker,
    expansion: ExpansionState,
    suffixes: CloneSuffixes,
}

impl<H: ForestHost> TemplateEditor<H> {
    pub fn new(host: H, forest: Forest, settings: EditorSettings) -> Self {
        Self::with_policy(host, forest, settings, PlacementMatrix)
    }
}

impl<H: ForestHost, P: DropPolicy> TemplateEditor<H, P> {
    pub fn with_policy(host: H, forest: Forest, settings: EditorSettings, policy: P) -> Self {
        if let Err(e) = forest.check_invariants() {
            tracing::warn!(error = %e, "editor opened on a forest that breaks tree invariants");
        }
        let settings = settings.sanitized();
        Self {
            host,
            engine: DropEngine::new(policy),
            forest,
            edit_mode: true,
            viewport: Viewport::new(&settings),
            focus: FocusTracker::new(SelectionMode::from_multiple(settings.multiple_select)),
            expansion: ExpansionState::new(settings.collapse_clones),
            suffixes: CloneSuffixes::default(),
            settings,
        }
    }

    pub fn with_edit_mode(mut self, edit_mode: bool) -> Self {
        self.set_edit_mode(edit_mode);
        self
    }

    pub fn with_clone_suffixes(mut self, suffixes: CloneSuffixes) -> Self {
        self.suffixes = suffixes;
        self
    }

    pub fn edit_mode(&self) -> bool {
        self.edit_mode
    }

    /// Leaving edit mode abandons any drag or pan in progress.
    pub fn set_edit_mode(&mut self, edit_mode: bool) {
        self.edit_mode = edit_mode;
        if !edit_mode {
            self.focus.end_drag();
            if !self.settings.pan_when_read_only {
                self.viewport.pan_end();
            }
        }
    }

    pub fn settings(&self) -> &EditorSettings {
        &self.settings
    }

    pub fn forest(&self) -> &Forest {
        &self.forest
    }

    pub fn host(&self) -> &H {
        &self.host
    }

    /// Channels for node components to subscribe to.
    pub fn focus(&self) -> &FocusTracker {
        &self.focus
    }

    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn expansion(&self) -> &ExpansionState {
        &self.expansion
    }

    /// Accept a forest changed outside the editor, e.g. after a host-side add
    /// or delete. State that refers to vanished nodes is dropped.
    pub fn replace_forest(&mut self, forest: Forest) {
        self.forest = forest;
        self.prune_stale_state();
    }

    fn prune_stale_state(&mut self) {
        if let Some(drag) = self.focus.current_drag() {
            if self.forest.get(&drag.source).is_none() {
                self.focus.end_drag();
            }
        }
        let forest = &self.forest;
        self.focus.retain(|id| forest.contains_id(id));
        self.expansion.retain_present(forest);
    }

    // Drag and drop.

    /// Start dragging the node at `source`, broadcasting it to drop targets.
    pub fn begin_drag(&mut self, source: NodeAddress) -> bool {
        if !self.edit_mode {
            return false;
        }
        let Some(node) = self.forest.get(&source) else {
            tracing::debug!(key = source.key, id = %source.id, "drag source not in forest");
            return false;
        };
        let info = DragInfo {
            kind: node.kind(),
            source,
        };
        self.focus.begin_drag(info);
        true
    }

    pub fn cancel_drag(&mut self) {
        self.focus.end_drag();
    }

    pub fn current_drag(&self) -> Option<DragInfo> {
        self.focus.current_drag()
    }

    /// Whether `target` should render as an allowed drop for the current drag.
    pub fn is_allowed_drop_target(&self, target: &NodeAddress) -> bool {
        self.edit_mode
            && self
                .focus
                .current_drag()
                .is_some_and(|drag| self.engine.accepts(&self.forest, &drag, target))
    }

    /// Finish the current drag on `target`. The drag ends whatever the outcome.
    pub async fn drop_on(&mut self, target: &NodeAddress, gesture: DropGesture) -> EditOutcome {
        let drag = self.focus.current_drag();
        self.focus.end_drag();
        let Some(drag) = drag else {
            return self.ignore(DropRejection::NoDrag);
        };
        self.edit(gesture, &drag.source, target).await
    }

    /// Move `source` to be the last child of `target`.
    pub async fn reparent(&mut self, source: &NodeAddress, target: &NodeAddress) -> EditOutcome {
        self.edit(DropGesture::Move, source, target).await
    }

    /// Append a relabelled copy of `source` as the last child of `target`.
    pub async fn clone_subtree(
        &mut self,
        source: &NodeAddress,
        target: &NodeAddress,
    ) -> EditOutcome {
        self.edit(DropGesture::Clone, source, target).await
    }

    async fn edit(
        &mut self,
        gesture: DropGesture,
        source: &NodeAddress,
        target: &NodeAddress,
    ) -> EditOutcome {
        if !self.edit_mode {
            return self.ignore(DropRejection::ReadOnly);
        }
        let next = match self
            .engine
            .apply(&self.forest, gesture, source, target, &mut self.suffixes)
        {
            Ok(next) => next,
            Err(rejection) => return self.ignore(rejection),
        };
        match self.host.commit_forest(&next).await {
            Ok(()) => {
                tracing::info!(
                    ?gesture,
                    source = %source.id,
                    target = %target.id,
                    nodes = next.node_count(),
                    "forest committed"
                );
                self.forest = next;
                self.prune_stale_state();
                EditOutcome::Committed
            }
            Err(e) => {
                tracing::warn!(error = %e, "host rejected forest, keeping previous state");
                EditOutcome::CommitRejected(e)
            }
        }
    }

    fn ignore(&self, rejection: DropRejection) -> EditOutcome {
        tracing::debug!(reason = %rejection, "edit ignored");
        EditOutcome::Ignored(rejection)
    }

    // Selection.

    pub fn click(&mut self, id: &str, additive: bool) -> bool {
        if !self.edit_mode || !self.forest.contains_id(id) {
            return false;
        }
        self.focus.select(id, additive);
        true
    }

    pub fn clear_selection(&mut self) -> bool {
        if !self.edit_mode {
            return false;
        }
        self.focus.clear();
        true
    }

    // Viewport. Zoom is cosmetic and allowed in read-only mode.

    pub fn zoom(&mut self, factor: f64) -> bool {
        self.viewport.zoom(factor)
    }

    pub fn wheel(&mut self, delta_y: f64) -> bool {
        self.viewport.wheel(delta_y)
    }

    pub fn fit_to_screen(&mut self, content_width: f64, viewport_width: f64) -> Option<Fit> {
        self.viewport.fit_to_screen(content_width, viewport_width)
    }

    /// Pans never start on top of a node, where the press begins a drag instead.
    pub fn pan_start(&mut self, pointer: &Pointer, over_node: bool) -> bool {
        if over_node || !self.pan_enabled() {
            return false;
        }
        self.viewport.pan_start(pointer)
    }

    pub fn pan_move(&mut self, pointer: &Pointer) -> bool {
        self.pan_enabled() && self.viewport.pan_move(pointer)
    }

    pub fn pan_end(&mut self) {
        self.viewport.pan_end();
    }

    fn pan_enabled(&self) -> bool {
        self.settings.pan && (self.edit_mode || self.settings.pan_when_read_only)
    }

    pub fn restore_transform(&mut self, css: &str) {
        self.viewport.restore(css);
    }

    pub fn reset_transform(&mut self) {
        self.viewport.reset();
    }

    pub fn transform_css(&self) -> String {
        self.viewport.css()
    }

    // Rendering.

    pub fn toggle_expanded(&mut self, id: &str) {
        self.expansion.toggle(id);
    }

    pub fn is_collapsed(&self, id: &str) -> bool {
        self.expansion.is_collapsed(id)
    }

    /// Every root tree decorated for rendering, in key order.
    pub fn decorated_roots(&self) -> Vec<(DsKey, DecoratedNode<'_>)> {
        self.forest
            .roots()
            .map(|(key, root)| (key, annotate(root, &self.expansion)))
            .collect()
    }

    pub fn decorated_root(&self, key: DsKey) -> Option<DecoratedNode<'_>> {
        self.forest
            .root(key)
            .map(|root| annotate(root, &self.expansion))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::AcceptAll;
    use crate::viewport::Point;
    use fundtree_core::{FundingLineType, Node, NodeKind};

    fn forest() -> Forest {
        Forest::from_roots([(
            1,
            Node::funding_line("a", "A", 1, FundingLineType::Payment)
                .with_child(Node::calculation("b", "B", 1))
                .with_child(Node::funding_line("d", "D", 2, FundingLineType::Information)),
        )])
    }

    fn editor() -> TemplateEditor<AcceptAll> {
        TemplateEditor::new(AcceptAll, forest(), EditorSettings::default())
            .with_clone_suffixes(CloneSuffixes::starting_at(1))
    }

    fn at(id: &str) -> NodeAddress {
        NodeAddress::new(1, id)
    }

    #[tokio::test]
    async fn drop_without_drag_is_ignored() {
        let mut ed = editor();
        assert_eq!(
            ed.drop_on(&at("a"), DropGesture::Move).await,
            EditOutcome::Ignored(DropRejection::NoDrag)
        );
    }

    #[tokio::test]
    async fn drag_then_drop_moves() {
        let mut ed = editor();
        assert!(ed.begin_drag(at("b")));
        assert_eq!(
            ed.current_drag().map(|d| d.kind),
            Some(NodeKind::Calculation)
        );
        assert!(ed.is_allowed_drop_target(&at("d")));
        assert!(!ed.is_allowed_drop_target(&at("b")));
        assert!(ed.drop_on(&at("d"), DropGesture::Move).await.is_committed());
        assert!(ed.current_drag().is_none());
        assert_eq!(ed.forest().find(1, "d").unwrap().children[0].id, "b");
    }

    #[tokio::test]
    async fn drag_ends_even_when_drop_is_rejected() {
        let mut ed = editor();
        ed.begin_drag(at("d"));
        let outcome = ed.drop_on(&at("b"), DropGesture::Move).await;
        assert!(matches!(outcome, EditOutcome::Ignored(DropRejection::KindNotAllowed { .. })));
        assert!(ed.current_drag().is_none());
        assert_eq!(ed.forest(), &forest());
    }

    #[test]
    fn begin_drag_needs_existing_node_and_edit_mode() {
        let mut ed = editor();
        assert!(!ed.begin_drag(at("nope")));
        ed.set_edit_mode(false);
        assert!(!ed.begin_drag(at("b")));
        assert!(!ed.is_allowed_drop_target(&at("a")));
    }

    #[test]
    fn cancel_drag_changes_nothing() {
        let mut ed = editor();
        ed.begin_drag(at("b"));
        ed.cancel_drag();
        assert!(ed.current_drag().is_none());
        assert_eq!(ed.forest(), &forest());
    }

    #[test]
    fn click_selects_only_known_ids() {
        let mut ed = editor();
        assert!(ed.click("b", false));
        assert!(!ed.click("zzz", false));
        assert!(ed.focus().is_selected("b"));
        assert!(ed.clear_selection());
        assert!(ed.focus().selection().is_empty());
    }

    #[test]
    fn replace_forest_prunes_stale_state() {
        let mut ed = editor();
        ed.click("b", false);
        ed.begin_drag(at("b"));
        ed.toggle_expanded("b");
        ed.replace_forest(Forest::from_roots([(
            1,
            Node::funding_line("a", "A", 1, FundingLineType::Payment),
        )]));
        assert!(ed.focus().selection().is_empty());
        assert!(ed.current_drag().is_none());
        assert!(!ed.is_collapsed("b"));
    }

    #[test]
    fn pan_respects_settings_and_node_hits() {
        let mouse = Pointer::Mouse(Point::new(0.0, 0.0));
        let mut ed = editor();
        assert!(!ed.pan_start(&mouse, true));
        assert!(ed.pan_start(&mouse, false));
        ed.pan_end();

        let settings = EditorSettings {
            pan_when_read_only: false,
            ..EditorSettings::default()
        };
        let mut ro = TemplateEditor::new(AcceptAll, forest(), settings).with_edit_mode(false);
        assert!(!ro.pan_start(&mouse, false));
        assert_eq!(ro.transform_css(), "none");
    }

    #[test]
    fn zoom_works_read_only() {
        let mut ed = editor().with_edit_mode(false);
        assert!(ed.zoom(0.5));
        assert_eq!(ed.transform_css(), "matrix(0.5, 0, 0, 0.5, 0, 0)");
        ed.reset_transform();
        assert_eq!(ed.transform_css(), "none");
    }

    #[test]
    fn decorated_roots_follow_key_order() {
        let mut f = forest();
        f.insert_root(0, Node::calculation("z", "Z", 9));
        let ed = TemplateEditor::new(AcceptAll, f, EditorSettings::default());
        let keys: Vec<DsKey> = ed.decorated_roots().iter().map(|(k, _)| *k).collect();
        assert_eq!(keys, vec![0, 1]);
        assert_eq!(ed.decorated_root(1).unwrap().relationship.flags(), "001");
    }
}

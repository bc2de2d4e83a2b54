//! Validation and execution of drag-and-drop moves and duplicates.
//!
//! # Invariants
//!
//! 1. A drop is applied only when the policy allows the dragged kind under the
//!    target kind, and the target is neither the dragged node nor one of its
//!    descendants. The descendant check walks the in-memory tree.
//! 2. Operations never mutate the input forest. They return a new forest, or a
//!    [`DropRejection`] leaving the caller's forest as it was.
//! 3. A clone is appended under the target with every id rewritten to
//!    `id:suffix`, using one suffix per operation that collides with no id
//!    already in the forest. The original subtree is untouched.
//!
//! ## Failure Modes
//!
//! | Failure | Cause | Fallback |
//! |---------|-------|----------|
//! | Forbidden kind pair | Funding line onto calculation | Rejected, forest unchanged |
//! | Self or descendant target | Dropping a node into its own subtree | Rejected, forest unchanged |
//! | Stale address | Node removed since the drag started | Rejected, forest unchanged |

use std::time::{SystemTime, UNIX_EPOCH};

use fundtree_core::rules::placement_rule;
use fundtree_core::{clone_id, DropPolicy, DsKey, Forest, Node, NodeAddress, NodeKind, PlacementMatrix};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// What every potential drop target needs to know about the drag in progress.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DragInfo {
    pub source: NodeAddress,
    pub kind: NodeKind,
}

/// Plain drop moves the node; the modifier-key drop duplicates it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropGesture {
    Move,
    Clone,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DropRejection {
    #[error("editor is read-only")]
    ReadOnly,
    #[error("no drag in progress")]
    NoDrag,
    #[error("dragged node '{id}' not found in root tree {key}")]
    SourceNotFound { key: DsKey, id: String },
    #[error("drop target '{id}' not found in root tree {key}")]
    TargetNotFound { key: DsKey, id: String },
    #[error("a {} cannot be dropped under a {}", .dragged.label(), .target.label())]
    KindNotAllowed { dragged: NodeKind, target: NodeKind },
    #[error("cannot drop '{0}' onto itself or one of its descendants")]
    SelfOrDescendant(String),
}

/// Issues clone suffixes that are unique for the lifetime of the editor session.
///
/// Seeded from the wall clock in milliseconds and strictly increasing after that.
#[derive(Debug, Clone)]
pub struct CloneSuffixes {
    next: u64,
}

impl Default for CloneSuffixes {
    fn default() -> Self {
        let millis = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        Self::starting_at(millis)
    }
}

impl CloneSuffixes {
    pub fn starting_at(next: u64) -> Self {
        Self { next }
    }

    /// Next suffix under which no node of `subtree` collides with an id in `forest`.
    pub fn issue(&mut self, forest: &Forest, subtree: &Node) -> String {
        let ids = forest.all_ids();
        loop {
            let candidate = self.next.to_string();
            self.next = self.next.wrapping_add(1);
            if subtree
                .walk()
                .all(|n| !ids.contains(clone_id(&n.id, &candidate).as_str()))
            {
                return candidate;
            }
        }
    }
}

/// Deep copy of `node` with every id suffixed. Payloads are carried unchanged.
pub fn relabel_subtree(node: &Node, suffix: &str) -> Node {
    Node {
        id: clone_id(&node.id, suffix),
        name: node.name.clone(),
        data: node.data.clone(),
        children: node
            .children
            .iter()
            .map(|c| relabel_subtree(c, suffix))
            .collect(),
    }
}

#[derive(Debug, Clone, Default)]
pub struct DropEngine<P = PlacementMatrix> {
    policy: P,
}

impl<P: DropPolicy> DropEngine<P> {
    pub fn new(policy: P) -> Self {
        Self { policy }
    }

    pub fn policy(&self) -> &P {
        &self.policy
    }

    /// Full precondition check for dropping `source` under `target`.
    pub fn check(
        &self,
        forest: &Forest,
        source: &NodeAddress,
        target: &NodeAddress,
    ) -> Result<(), DropRejection> {
        let dragged = forest
            .get(source)
            .ok_or_else(|| DropRejection::SourceNotFound {
                key: source.key,
                id: source.id.clone(),
            })?;
        let target_node = forest
            .get(target)
            .ok_or_else(|| DropRejection::TargetNotFound {
                key: target.key,
                id: target.id.clone(),
            })?;
        self.check_kinds(dragged.kind(), target_node.kind())?;
        if source.key == target.key
            && (source.id == target.id || forest.is_descendant(source.key, &target.id, &source.id))
        {
            return Err(DropRejection::SelfOrDescendant(source.id.clone()));
        }
        Ok(())
    }

    fn check_kinds(&self, dragged: NodeKind, target: NodeKind) -> Result<(), DropRejection> {
        if self.policy.is_drop_allowed(dragged, target) {
            Ok(())
        } else {
            tracing::debug!(rule = placement_rule(dragged, target), "drop refused by policy");
            Err(DropRejection::KindNotAllowed { dragged, target })
        }
    }

    /// Whether `target` should render as an allowed drop target for `drag`.
    pub fn accepts(&self, forest: &Forest, drag: &DragInfo, target: &NodeAddress) -> bool {
        self.check(forest, &drag.source, target).is_ok()
    }

    /// Move `source` to be the last child of `target`.
    pub fn reparent(
        &self,
        forest: &Forest,
        source: &NodeAddress,
        target: &NodeAddress,
    ) -> Result<Forest, DropRejection> {
        self.check(forest, source, target)?;
        let mut next = forest.clone();
        let node = next
            .detach(source)
            .ok_or_else(|| DropRejection::SourceNotFound {
                key: source.key,
                id: source.id.clone(),
            })?;
        next.attach(target, node)
            .map_err(|_| DropRejection::TargetNotFound {
                key: target.key,
                id: target.id.clone(),
            })?;
        Ok(next)
    }

    /// Append a relabelled deep copy of `source` as the last child of `target`.
    pub fn clone_into(
        &self,
        forest: &Forest,
        source: &NodeAddress,
        target: &NodeAddress,
        suffixes: &mut CloneSuffixes,
    ) -> Result<Forest, DropRejection> {
        self.check(forest, source, target)?;
        let original = forest
            .get(source)
            .ok_or_else(|| DropRejection::SourceNotFound {
                key: source.key,
                id: source.id.clone(),
            })?;
        let suffix = suffixes.issue(forest, original);
        let copy = relabel_subtree(original, &suffix);
        let mut next = forest.clone();
        next.attach(target, copy)
            .map_err(|_| DropRejection::TargetNotFound {
                key: target.key,
                id: target.id.clone(),
            })?;
        Ok(next)
    }

    pub fn apply(
        &self,
        forest: &Forest,
        gesture: DropGesture,
        source: &NodeAddress,
        target: &NodeAddress,
        suffixes: &mut CloneSuffixes,
    ) -> Result<Forest, DropRejection> {
        match gesture {
            DropGesture::Move => self.reparent(forest, source, target),
            DropGesture::Clone => self.clone_into(forest, source, target, suffixes),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use fundtree_core::{base_id, FundingLineType};

    fn forest() -> Forest {
        let one = Node::funding_line("fl-a", "A", 1, FundingLineType::Payment)
            .with_child(
                Node::calculation("c-b", "B", 1).with_child(Node::calculation("c-c", "C", 2)),
            )
            .with_child(Node::funding_line("fl-d", "D", 2, FundingLineType::Information));
        let two = Node::funding_line("fl-e", "E", 3, FundingLineType::Payment);
        Forest::from_roots([(1, one), (2, two)])
    }

    fn engine() -> DropEngine {
        DropEngine::default()
    }

    fn at(key: u32, id: &str) -> NodeAddress {
        NodeAddress::new(key, id)
    }

    #[test]
    fn calculation_moves_under_calculation() {
        let engine = engine();
        let next = engine
            .reparent(&forest(), &at(1, "c-c"), &at(1, "fl-d"))
            .unwrap();
        assert!(next.find(1, "c-b").unwrap().children.is_empty());
        assert_eq!(next.find(1, "fl-d").unwrap().children[0].id, "c-c");
        next.check_invariants().unwrap();
    }

    #[test]
    fn funding_line_under_calculation_is_rejected() {
        let engine = engine();
        let err = engine
            .reparent(&forest(), &at(1, "fl-d"), &at(1, "c-b"))
            .unwrap_err();
        assert_eq!(
            err,
            DropRejection::KindNotAllowed {
                dragged: NodeKind::FundingLine,
                target: NodeKind::Calculation
            }
        );
        assert_eq!(err.to_string(), "a funding line cannot be dropped under a calculation");
    }

    #[test]
    fn self_and_descendant_drops_are_rejected() {
        let engine = engine();
        let f = forest();
        assert_eq!(
            engine.reparent(&f, &at(1, "c-b"), &at(1, "c-b")),
            Err(DropRejection::SelfOrDescendant("c-b".into()))
        );
        assert_eq!(
            engine.reparent(&f, &at(1, "c-b"), &at(1, "c-c")),
            Err(DropRejection::SelfOrDescendant("c-b".into()))
        );
        assert_eq!(
            engine.reparent(&f, &at(1, "fl-a"), &at(1, "fl-d")),
            Err(DropRejection::SelfOrDescendant("fl-a".into()))
        );
    }

    #[test]
    fn move_across_root_trees() {
        let engine = engine();
        let next = engine
            .reparent(&forest(), &at(1, "c-b"), &at(2, "fl-e"))
            .unwrap();
        assert!(next.find(1, "c-b").is_none());
        let e = next.root(2).unwrap();
        assert_eq!(e.children[0].id, "c-b");
        assert_eq!(e.children[0].children[0].id, "c-c");
    }

    #[test]
    fn moving_a_root_removes_its_entry() {
        let engine = engine();
        let next = engine
            .reparent(&forest(), &at(2, "fl-e"), &at(1, "fl-d"))
            .unwrap();
        assert!(next.root(2).is_none());
        assert_eq!(next.find(1, "fl-d").unwrap().children[0].id, "fl-e");
    }

    #[test]
    fn stale_addresses_are_rejected() {
        let engine = engine();
        assert!(matches!(
            engine.reparent(&forest(), &at(1, "gone"), &at(1, "fl-d")),
            Err(DropRejection::SourceNotFound { .. })
        ));
        assert!(matches!(
            engine.reparent(&forest(), &at(1, "c-c"), &at(2, "c-b")),
            Err(DropRejection::TargetNotFound { .. })
        ));
    }

    #[test]
    fn clone_leaves_original_and_suffixes_copy() {
        let engine = engine();
        let before = forest();
        let mut suffixes = CloneSuffixes::starting_at(40);
        let next = engine
            .clone_into(&before, &at(1, "c-b"), &at(1, "fl-d"), &mut suffixes)
            .unwrap();

        assert_eq!(next.find(1, "c-b"), before.find(1, "c-b"));
        let copy = &next.find(1, "fl-d").unwrap().children[0];
        assert_eq!(copy.id, "c-b:40");
        assert_eq!(copy.children[0].id, "c-c:40");
        assert_eq!(copy.data, before.find(1, "c-b").unwrap().data);
        assert_eq!(base_id(&copy.id), "c-b");
        next.check_invariants().unwrap();
    }

    #[test]
    fn suffixes_skip_ids_already_in_use() {
        let mut f = forest();
        f.attach(&at(2, "fl-e"), Node::calculation("c-c:7", "Taken", 90))
            .unwrap();
        let mut suffixes = CloneSuffixes::starting_at(7);
        let original = f.find(1, "c-b").unwrap().clone();
        assert_eq!(suffixes.issue(&f, &original), "8");
        assert_eq!(suffixes.issue(&f, &original), "9");
    }

    #[test]
    fn clone_of_clone_stays_unique() {
        let engine = engine();
        let mut suffixes = CloneSuffixes::starting_at(1);
        let once = engine
            .clone_into(&forest(), &at(1, "c-c"), &at(1, "c-b"), &mut suffixes)
            .unwrap();
        let twice = engine
            .clone_into(&once, &at(1, "c-b"), &at(2, "fl-e"), &mut suffixes)
            .unwrap();
        twice.check_invariants().unwrap();
        let copy = &twice.root(2).unwrap().children[0];
        assert_eq!(copy.id, "c-b:2");
        assert_eq!(copy.children[1].id, "c-c:1:2");
    }

    #[test]
    fn injected_policy_is_consulted() {
        let engine = DropEngine::new(|_: NodeKind, _: NodeKind| false);
        assert!(matches!(
            engine.reparent(&forest(), &at(1, "c-c"), &at(1, "fl-d")),
            Err(DropRejection::KindNotAllowed { .. })
        ));
    }

    #[test]
    fn accepts_mirrors_check() {
        let engine = engine();
        let f = forest();
        let drag = DragInfo {
            source: at(1, "fl-d"),
            kind: NodeKind::FundingLine,
        };
        assert!(engine.accepts(&f, &drag, &at(2, "fl-e")));
        assert!(!engine.accepts(&f, &drag, &at(1, "c-b")));
        assert!(!engine.accepts(&f, &drag, &at(1, "fl-d")));
    }
}

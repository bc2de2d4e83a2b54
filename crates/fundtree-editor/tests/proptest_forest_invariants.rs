//! Property-based invariant tests for drag/clone edits on random forests.
//!
//! 1. Every forest produced by reparent/clone keeps node ids unique.
//! 2. An edit succeeds only when the placement matrix allows the kind pair.
//! 3. Dropping a node onto itself or a descendant is always rejected.
//! 4. Cloning leaves the original subtree untouched and yields fresh ids.
//! 5. Annotating the same tree twice yields identical flags.

use fundtree_core::{base_id, is_drop_allowed, Forest, FundingLineType, Node, NodeAddress, NodeKind};
use fundtree_editor::{annotate, CloneSuffixes, DropEngine, DropGesture, ExpansionState};
use proptest::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────────

/// `(is_calculation, parent_pick)` per node; node 0 is always a root.
fn forest_strategy() -> impl Strategy<Value = Forest> {
    prop::collection::vec((any::<bool>(), any::<usize>()), 1..24).prop_map(build_forest)
}

fn build_forest(plan: Vec<(bool, usize)>) -> Forest {
    let mut forest = Forest::new();
    let mut placed: Vec<(NodeAddress, NodeKind)> = Vec::new();
    for (i, (is_calc, pick)) in plan.into_iter().enumerate() {
        let id = format!("n{i}");
        let slot = pick % (placed.len() + 2);
        let parent = placed.get(slot).cloned();
        // Calculations only ever hold calculations in authored trees.
        let kind = match &parent {
            Some((_, NodeKind::Calculation)) => NodeKind::Calculation,
            _ if is_calc => NodeKind::Calculation,
            _ => NodeKind::FundingLine,
        };
        let node = match kind {
            NodeKind::Calculation => Node::calculation(id.clone(), format!("Calc {i}"), i as i32),
            NodeKind::FundingLine => {
                Node::funding_line(id.clone(), format!("Line {i}"), i as i32, FundingLineType::Payment)
            }
        };
        let address = match parent {
            Some((parent, _)) => {
                forest.attach(&parent, node).unwrap();
                NodeAddress::new(parent.key, id)
            }
            None => {
                forest.insert_root(i as u32, node);
                NodeAddress::new(i as u32, id)
            }
        };
        placed.push((address, kind));
    }
    forest
}

fn edit_strategy() -> impl Strategy<Value = Vec<(usize, usize, bool)>> {
    prop::collection::vec((any::<usize>(), any::<usize>(), any::<bool>()), 1..12)
}

fn pick(forest: &Forest, n: usize) -> NodeAddress {
    let all: Vec<NodeAddress> = forest
        .nodes()
        .map(|(key, node)| NodeAddress::new(key, node.id.clone()))
        .collect();
    all[n % all.len()].clone()
}

fn gesture(clone: bool) -> DropGesture {
    if clone {
        DropGesture::Clone
    } else {
        DropGesture::Move
    }
}

fn strip_suffix(node: &Node) -> Node {
    Node {
        id: base_id(&node.id).to_string(),
        children: node.children.iter().map(strip_suffix).collect(),
        ..node.clone()
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 1. Ids stay unique across any sequence of edits
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn edits_preserve_tree_invariant(forest in forest_strategy(), edits in edit_strategy()) {
        let engine: DropEngine = DropEngine::default();
        let mut suffixes = CloneSuffixes::starting_at(1);
        let mut current = forest;
        let total_before = current.node_count();
        let mut expected = total_before;
        for (s, t, clone) in edits {
            let source = pick(&current, s);
            let target = pick(&current, t);
            let moved = current.get(&source).map(Node::count).unwrap_or(0);
            if let Ok(next) = engine.apply(&current, gesture(clone), &source, &target, &mut suffixes) {
                prop_assert!(next.check_invariants().is_ok(), "{:?}", next.check_invariants());
                if clone {
                    expected += moved;
                }
                current = next;
            }
            prop_assert_eq!(current.node_count(), expected);
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 2. Permission matrix decides every kind pair
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn disallowed_kind_pairs_are_rejected(
        forest in forest_strategy(),
        s in any::<usize>(),
        t in any::<usize>(),
        clone in any::<bool>(),
    ) {
        let engine: DropEngine = DropEngine::default();
        let source = pick(&forest, s);
        let target = pick(&forest, t);
        let dragged = forest.get(&source).unwrap().kind();
        let onto = forest.get(&target).unwrap().kind();
        let before = forest.clone();
        let result = engine.apply(&forest, gesture(clone), &source, &target, &mut CloneSuffixes::starting_at(1));
        if !is_drop_allowed(dragged, onto) {
            prop_assert!(result.is_err());
        }
        if result.is_ok() {
            prop_assert!(is_drop_allowed(dragged, onto));
        }
        prop_assert_eq!(forest, before);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 3. Self and descendant drops are rejected
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn drops_into_own_subtree_are_rejected(forest in forest_strategy(), s in any::<usize>(), d in any::<usize>()) {
        let engine: DropEngine = DropEngine::default();
        let source = pick(&forest, s);
        let subtree: Vec<String> = forest
            .get(&source)
            .unwrap()
            .walk()
            .map(|n| n.id.clone())
            .collect();
        let target = NodeAddress::new(source.key, subtree[d % subtree.len()].clone());
        for g in [DropGesture::Move, DropGesture::Clone] {
            prop_assert!(engine
                .apply(&forest, g, &source, &target, &mut CloneSuffixes::starting_at(1))
                .is_err());
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 4. Clones are isolated from their originals
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn clone_isolation(forest in forest_strategy(), s in any::<usize>(), t in any::<usize>()) {
        let engine: DropEngine = DropEngine::default();
        let source = pick(&forest, s);
        let target = pick(&forest, t);
        let mut suffixes = CloneSuffixes::starting_at(1);
        if let Ok(next) = engine.clone_into(&forest, &source, &target, &mut suffixes) {
            let original = forest.get(&source).unwrap();
            prop_assert_eq!(next.get(&source), Some(original));

            let copy = next.get(&target).unwrap().children.last().unwrap();
            prop_assert_eq!(&strip_suffix(copy), original);
            let before = forest.all_ids();
            for node in copy.walk() {
                prop_assert!(node.is_clone());
                prop_assert!(!before.contains(node.id.as_str()));
            }
        }
    }
}

// ═════════════════════════════════════════════════════════════════════════
// 5. Annotation is a pure function of shape
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn annotation_is_idempotent(forest in forest_strategy()) {
        let state = ExpansionState::default();
        for (_, root) in forest.roots() {
            let first = annotate(root, &state).flags_by_id();
            let second = annotate(root, &state).flags_by_id();
            prop_assert_eq!(&first, &second);
            prop_assert_eq!(first.len(), root.count());
        }
    }
}

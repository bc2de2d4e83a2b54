use crate::NodeKind;

/// Decides whether a node of one kind may be dropped under a node of another kind.
///
/// The editor consults this before offering a drop target and again before
/// applying a drop. Closures `Fn(NodeKind, NodeKind) -> bool` implement it, so
/// hosts can inject their own matrix.
pub trait DropPolicy {
    fn is_drop_allowed(&self, dragged: NodeKind, target: NodeKind) -> bool;
}

/// The built-in placement matrix.
///
/// | dragged \ target | funding line | calculation |
/// |------------------|--------------|-------------|
/// | funding line     | allowed      | forbidden   |
/// | calculation      | allowed      | allowed     |
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlacementMatrix;

impl DropPolicy for PlacementMatrix {
    fn is_drop_allowed(&self, dragged: NodeKind, target: NodeKind) -> bool {
        is_drop_allowed(dragged, target)
    }
}

impl<F> DropPolicy for F
where
    F: Fn(NodeKind, NodeKind) -> bool,
{
    fn is_drop_allowed(&self, dragged: NodeKind, target: NodeKind) -> bool {
        self(dragged, target)
    }
}

pub fn is_drop_allowed(dragged: NodeKind, target: NodeKind) -> bool {
    match (dragged, target) {
        (NodeKind::Calculation, _) => true,
        (NodeKind::FundingLine, NodeKind::FundingLine) => true,
        (NodeKind::FundingLine, NodeKind::Calculation) => false,
    }
}

/// Human-readable statement of the rule a (dragged, target) pair falls under.
pub fn placement_rule(dragged: NodeKind, target: NodeKind) -> &'static str {
    match (dragged, target) {
        (NodeKind::Calculation, NodeKind::FundingLine) => {
            "calculations may be placed under funding lines"
        }
        (NodeKind::Calculation, NodeKind::Calculation) => {
            "calculations may be placed under other calculations"
        }
        (NodeKind::FundingLine, NodeKind::FundingLine) => {
            "funding lines may be placed under other funding lines"
        }
        (NodeKind::FundingLine, NodeKind::Calculation) => {
            "funding lines cannot be placed under calculations"
        }
    }
}

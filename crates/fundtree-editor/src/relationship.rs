//! Render-only relationship flags.
//!
//! Each node gets three flags: whether it has a parent, whether it shares that
//! parent with siblings, and whether it has children of its own. Renderers use
//! them to decide which connector edges to draw and whether a collapse toggle
//! is offered. The flags are recomputed from scratch on every render into a
//! borrowed [`DecoratedNode`] view; the canonical [`Node`] is never written.

use std::fmt;

use fundtree_core::Node;

use crate::expansion::ExpansionState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct Relationship {
    pub has_parent: bool,
    pub has_siblings: bool,
    pub has_children: bool,
}

impl Relationship {
    /// Three-character flag string, `'1'` or `'0'` per flag, e.g. `"101"`.
    pub fn flags(&self) -> String {
        [self.has_parent, self.has_siblings, self.has_children]
            .iter()
            .map(|&b| if b { '1' } else { '0' })
            .collect()
    }

    pub fn from_flags(flags: &str) -> Option<Self> {
        let bits: Vec<bool> = flags
            .chars()
            .map(|c| match c {
                '1' => Some(true),
                '0' => Some(false),
                _ => None,
            })
            .collect::<Option<_>>()?;
        match bits.as_slice() {
            [has_parent, has_siblings, has_children] => Some(Self {
                has_parent: *has_parent,
                has_siblings: *has_siblings,
                has_children: *has_children,
            }),
            _ => None,
        }
    }

    pub fn shows_top_edge(&self) -> bool {
        self.has_parent
    }

    pub fn shows_side_edges(&self) -> bool {
        self.has_siblings
    }

    pub fn shows_bottom_edge(&self) -> bool {
        self.has_children
    }

    pub fn can_collapse(&self) -> bool {
        self.has_children
    }
}

impl fmt::Display for Relationship {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.flags())
    }
}

/// Borrowed view of a node decorated with render state.
#[derive(Debug, Clone, PartialEq)]
pub struct DecoratedNode<'a> {
    pub node: &'a Node,
    pub relationship: Relationship,
    pub collapsed: bool,
    pub children: Vec<DecoratedNode<'a>>,
}

impl<'a> DecoratedNode<'a> {
    /// Children a renderer should draw: none while collapsed.
    pub fn visible_children(&self) -> &[DecoratedNode<'a>] {
        if self.collapsed {
            &[]
        } else {
            &self.children
        }
    }

    /// Pre-order `(id, flags)` pairs for the whole decorated subtree.
    pub fn flags_by_id(&self) -> Vec<(&'a str, String)> {
        let mut out = Vec::new();
        self.collect_flags(&mut out);
        out
    }

    fn collect_flags(&self, out: &mut Vec<(&'a str, String)>) {
        out.push((self.node.id.as_str(), self.relationship.flags()));
        for child in &self.children {
            child.collect_flags(out);
        }
    }

    pub fn find(&self, id: &str) -> Option<&DecoratedNode<'a>> {
        if self.node.id == id {
            return Some(self);
        }
        self.children.iter().find_map(|c| c.find(id))
    }
}

/// Decorate a root tree in one pre-order pass.
pub fn annotate<'a>(root: &'a Node, expansion: &ExpansionState) -> DecoratedNode<'a> {
    decorate(root, false, false, expansion)
}

fn decorate<'a>(
    node: &'a Node,
    has_parent: bool,
    has_siblings: bool,
    expansion: &ExpansionState,
) -> DecoratedNode<'a> {
    let multi_child = node.children.len() > 1;
    DecoratedNode {
        node,
        relationship: Relationship {
            has_parent,
            has_siblings,
            has_children: !node.children.is_empty(),
        },
        collapsed: expansion.is_collapsed(&node.id),
        children: node
            .children
            .iter()
            .map(|child| decorate(child, true, multi_child, expansion))
            .collect(),
    }
}

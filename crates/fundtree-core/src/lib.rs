pub mod rules;
pub mod settings;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};
use thiserror::Error;

pub use rules::{is_drop_allowed, DropPolicy, PlacementMatrix};
pub use settings::{read_settings, settings_dir, write_settings, EditorSettings, SettingsError};

// --- Types ---

/// Funding-line dictionary key. Identifies one independently rendered root tree.
pub type DsKey = u32;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    FundingLine,
    Calculation,
}

impl NodeKind {
    pub fn label(self) -> &'static str {
        match self {
            NodeKind::FundingLine => "funding line",
            NodeKind::Calculation => "calculation",
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub enum FundingLineType {
    Payment,
    Information,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub enum CalculationType {
    Cash,
    Rate,
    PupilNumber,
    Weighting,
    Scope,
    Information,
    Drilldown,
    PerPupilFunding,
    LumpSum,
    ProviderLedFunding,
    Number,
    Enum,
    Boolean,
    Adjustment,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub enum ValueFormat {
    Number,
    Percentage,
    Currency,
    Boolean,
    String,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
pub enum AggregationType {
    None,
    Sum,
    Average,
    GroupRate,
    PercentageChangeBetweenAandB,
}

/// Numerator/denominator pair for group-rate aggregation, by template calculation id.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct GroupRate {
    pub numerator: i32,
    pub denominator: i32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct PercentageChangeBetweenAandB {
    pub calculation_a: i32,
    pub calculation_b: i32,
    pub calculation_aggregation_type: AggregationType,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct FundingLineData {
    pub template_line_id: i32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub funding_line_code: Option<String>,
    #[serde(rename = "type")]
    pub line_type: FundingLineType,
}

/// Calculation payload. Opaque to the editor: carried unchanged through move and clone.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CalculationData {
    pub template_calculation_id: i32,
    #[serde(rename = "type")]
    pub calculation_type: CalculationType,
    pub value_format: ValueFormat,
    #[serde(default)]
    pub formula_text: String,
    pub aggregation_type: AggregationType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub group_rate: Option<GroupRate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub percentage_change_between_a_and_b: Option<PercentageChangeBetweenAandB>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_enum_type_values: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum NodeData {
    FundingLine(FundingLineData),
    Calculation(CalculationData),
}

/// A node of a funding template tree. Owns its children exclusively.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Node {
    pub id: String,
    pub name: String,
    #[serde(flatten)]
    pub data: NodeData,
    #[serde(default)]
    pub children: Vec<Node>,
}

impl Node {
    pub fn funding_line(
        id: impl Into<String>,
        name: impl Into<String>,
        template_line_id: i32,
        line_type: FundingLineType,
    ) -> Self {
        Node {
            id: id.into(),
            name: name.into(),
            data: NodeData::FundingLine(FundingLineData {
                template_line_id,
                funding_line_code: None,
                line_type,
            }),
            children: Vec::new(),
        }
    }

    /// A cash calculation with no aggregation; callers adjust `data` for anything richer.
    pub fn calculation(
        id: impl Into<String>,
        name: impl Into<String>,
        template_calculation_id: i32,
    ) -> Self {
        Node {
            id: id.into(),
            name: name.into(),
            data: NodeData::Calculation(CalculationData {
                template_calculation_id,
                calculation_type: CalculationType::Cash,
                value_format: ValueFormat::Currency,
                formula_text: String::new(),
                aggregation_type: AggregationType::None,
                group_rate: None,
                percentage_change_between_a_and_b: None,
                allowed_enum_type_values: Vec::new(),
            }),
            children: Vec::new(),
        }
    }

    pub fn with_child(mut self, child: Node) -> Self {
        self.children.push(child);
        self
    }

    pub fn with_children(mut self, children: impl IntoIterator<Item = Node>) -> Self {
        self.children.extend(children);
        self
    }

    pub fn kind(&self) -> NodeKind {
        match self.data {
            NodeData::FundingLine(_) => NodeKind::FundingLine,
            NodeData::Calculation(_) => NodeKind::Calculation,
        }
    }

    /// `templateLineId` or `templateCalculationId`, depending on kind.
    pub fn template_id(&self) -> i32 {
        match &self.data {
            NodeData::FundingLine(fl) => fl.template_line_id,
            NodeData::Calculation(calc) => calc.template_calculation_id,
        }
    }

    pub fn is_clone(&self) -> bool {
        is_clone(&self.id)
    }

    pub fn base_id(&self) -> &str {
        base_id(&self.id)
    }

    /// Pre-order traversal starting at (and including) this node.
    pub fn walk(&self) -> Walk<'_> {
        Walk { stack: vec![self] }
    }

    pub fn find(&self, id: &str) -> Option<&Node> {
        self.walk().find(|n| n.id == id)
    }

    pub fn find_mut(&mut self, id: &str) -> Option<&mut Node> {
        if self.id == id {
            return Some(self);
        }
        self.children.iter_mut().find_map(|c| c.find_mut(id))
    }

    /// True if `id` names a strict descendant of this node.
    pub fn has_descendant(&self, id: &str) -> bool {
        self.children.iter().any(|c| c.find(id).is_some())
    }

    pub fn count(&self) -> usize {
        self.walk().count()
    }

    /// Remove the descendant `id` with its subtree. The node itself is never removed.
    fn remove_descendant(&mut self, id: &str) -> Option<Node> {
        if let Some(pos) = self.children.iter().position(|c| c.id == id) {
            return Some(self.children.remove(pos));
        }
        self.children.iter_mut().find_map(|c| c.remove_descendant(id))
    }
}

pub struct Walk<'a> {
    stack: Vec<&'a Node>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = &'a Node;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.stack.pop()?;
        self.stack.extend(node.children.iter().rev());
        Some(node)
    }
}

// --- Clone marker ---

/// Separates a node's base id from the suffix that marks it as a clone.
pub const CLONE_MARKER: char = ':';

/// The id with any clone suffix removed.
pub fn base_id(id: &str) -> &str {
    id.split_once(CLONE_MARKER).map_or(id, |(base, _)| base)
}

pub fn is_clone(id: &str) -> bool {
    id.contains(CLONE_MARKER)
}

/// Build the id of a clone as `id:suffix`.
///
/// Appending to the full id keeps the mapping injective: cloning a subtree that
/// already contains clones of the same base never yields two equal ids.
pub fn clone_id(id: &str, suffix: &str) -> String {
    format!("{}{}{}", id, CLONE_MARKER, suffix)
}

// --- Forest ---

/// Identifies a node within one root tree of a forest.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NodeAddress {
    pub key: DsKey,
    pub id: String,
}

impl NodeAddress {
    pub fn new(key: DsKey, id: impl Into<String>) -> Self {
        NodeAddress { key, id: id.into() }
    }
}

#[derive(Debug, Error)]
pub enum ForestError {
    #[error("node id '{0}' appears more than once in the forest")]
    DuplicateId(String),
    #[error("{} template id {template_id} is used by more than one node", .kind.label())]
    DuplicateTemplateId { kind: NodeKind, template_id: i32 },
    #[error("no root tree with key {0}")]
    RootNotFound(DsKey),
    #[error("node '{id}' not found in root tree {key}")]
    NodeNotFound { key: DsKey, id: String },
    #[error("invalid forest JSON: {0}")]
    Json(#[from] serde_json::Error),
}

/// The set of independently rendered root trees, keyed by dictionary key.
///
/// Cycles and shared nodes are unrepresentable: every node is owned by exactly
/// one `children` vector (or is a root).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Forest {
    #[serde(default)]
    roots: BTreeMap<DsKey, Node>,
}

impl Forest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_roots(roots: impl IntoIterator<Item = (DsKey, Node)>) -> Self {
        Forest {
            roots: roots.into_iter().collect(),
        }
    }

    pub fn from_json(raw: &str) -> Result<Self, ForestError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn to_json_pretty(&self) -> Result<String, ForestError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Returns the previous root at `key`, if any.
    pub fn insert_root(&mut self, key: DsKey, root: Node) -> Option<Node> {
        self.roots.insert(key, root)
    }

    pub fn remove_root(&mut self, key: DsKey) -> Option<Node> {
        self.roots.remove(&key)
    }

    pub fn root(&self, key: DsKey) -> Option<&Node> {
        self.roots.get(&key)
    }

    pub fn roots(&self) -> impl Iterator<Item = (DsKey, &Node)> {
        self.roots.iter().map(|(k, n)| (*k, n))
    }

    pub fn keys(&self) -> impl Iterator<Item = DsKey> + '_ {
        self.roots.keys().copied()
    }

    pub fn len(&self) -> usize {
        self.roots.len()
    }

    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    pub fn node_count(&self) -> usize {
        self.roots.values().map(Node::count).sum()
    }

    pub fn nodes(&self) -> impl Iterator<Item = (DsKey, &Node)> {
        self.roots
            .iter()
            .flat_map(|(k, root)| root.walk().map(move |n| (*k, n)))
    }

    pub fn find(&self, key: DsKey, id: &str) -> Option<&Node> {
        self.roots.get(&key)?.find(id)
    }

    pub fn get(&self, address: &NodeAddress) -> Option<&Node> {
        self.find(address.key, &address.id)
    }

    pub fn find_mut(&mut self, key: DsKey, id: &str) -> Option<&mut Node> {
        self.roots.get_mut(&key)?.find_mut(id)
    }

    pub fn contains_id(&self, id: &str) -> bool {
        self.nodes().any(|(_, n)| n.id == id)
    }

    /// First address holding `id`, scanning root trees in key order.
    pub fn locate(&self, id: &str) -> Option<NodeAddress> {
        self.nodes()
            .find(|(_, n)| n.id == id)
            .map(|(key, n)| NodeAddress::new(key, n.id.clone()))
    }

    pub fn all_ids(&self) -> HashSet<&str> {
        self.nodes().map(|(_, n)| n.id.as_str()).collect()
    }

    /// True if `candidate` is a strict descendant of `of` within root tree `key`.
    pub fn is_descendant(&self, key: DsKey, candidate: &str, of: &str) -> bool {
        self.find(key, of)
            .is_some_and(|ancestor| ancestor.has_descendant(candidate))
    }

    /// Remove a node with its subtree. Detaching a root removes its whole entry.
    pub fn detach(&mut self, address: &NodeAddress) -> Option<Node> {
        let root = self.roots.get_mut(&address.key)?;
        if root.id == address.id {
            return self.roots.remove(&address.key);
        }
        root.remove_descendant(&address.id)
    }

    /// Append `node` as the last child of `parent`.
    pub fn attach(&mut self, parent: &NodeAddress, node: Node) -> Result<(), ForestError> {
        if !self.roots.contains_key(&parent.key) {
            return Err(ForestError::RootNotFound(parent.key));
        }
        let target = self
            .find_mut(parent.key, &parent.id)
            .ok_or_else(|| ForestError::NodeNotFound {
                key: parent.key,
                id: parent.id.clone(),
            })?;
        target.children.push(node);
        Ok(())
    }

    /// Node ids are unique across the forest; canonical (non-clone) template ids are unique per kind.
    pub fn check_invariants(&self) -> Result<(), ForestError> {
        let mut seen_ids: HashSet<&str> = HashSet::new();
        let mut seen_template_ids: HashSet<(NodeKind, i32)> = HashSet::new();
        for (_, node) in self.nodes() {
            if !seen_ids.insert(node.id.as_str()) {
                return Err(ForestError::DuplicateId(node.id.clone()));
            }
            if !node.is_clone() && !seen_template_ids.insert((node.kind(), node.template_id())) {
                return Err(ForestError::DuplicateTemplateId {
                    kind: node.kind(),
                    template_id: node.template_id(),
                });
            }
        }
        Ok(())
    }

    /// Every clone (other than `id` itself) that shares `id`'s base id.
    pub fn clones_of(&self, id: &str) -> Vec<NodeAddress> {
        let base = base_id(id);
        self.nodes()
            .filter(|(_, n)| n.is_clone() && n.id != id && n.base_id() == base)
            .map(|(key, n)| NodeAddress::new(key, n.id.clone()))
            .collect()
    }

    /// Count of nodes per kind, used by hosts for summaries.
    pub fn kind_counts(&self) -> HashMap<NodeKind, usize> {
        let mut counts = HashMap::new();
        for (_, node) in self.nodes() {
            *counts.entry(node.kind()).or_insert(0) += 1;
        }
        counts
    }

    /// Generate the next template line id by scanning existing funding lines.
    pub fn next_template_line_id(&self) -> i32 {
        self.next_template_id(NodeKind::FundingLine)
    }

    /// Generate the next template calculation id by scanning existing calculations.
    pub fn next_template_calculation_id(&self) -> i32 {
        self.next_template_id(NodeKind::Calculation)
    }

    fn next_template_id(&self, kind: NodeKind) -> i32 {
        let max = self
            .nodes()
            .filter(|(_, n)| n.kind() == kind)
            .map(|(_, n)| n.template_id())
            .max()
            .unwrap_or(0);
        max.saturating_add(1)
    }
}

/// JSON Schema of the forest wire format, for hosts that validate input.
pub fn forest_schema() -> schemars::Schema {
    schemars::schema_for!(Forest)
}

//! The ordered attribute schema tree.
//!
//! Nodes are created lazily, keyed by their dot-joined attribute path, and
//! never removed. Display order is a discovery order: root attributes are
//! spaced by a stride of 1000 so nested attributes can interleave directly
//! after their parent without renumbering. Per-node value statistics live
//! in a bounded reservoir so memory stays fixed for arbitrarily large
//! inputs.

use std::collections::HashMap;
use std::fmt;

use itertools::Itertools;
use rand::{Rng, SeedableRng, rngs::StdRng};

use crate::record::{FieldValue, NormalizedRecord};

const ROOT_ORDER_STRIDE: u64 = 1000;

/// Distinct values tracked per node before replacement sampling begins.
pub const VALUE_CAP: usize = 100;
/// Replacement indices stay in this window, leaving the head of the
/// reservoir (where high-frequency values accumulate) untouched.
const REPLACE_WINDOW_START: usize = 25;

/// Lazily inferred attribute kind, decided by the first non-empty value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ValueKind {
    #[default]
    Unknown,
    String,
    Number,
    Boolean,
    List,
}

impl ValueKind {
    fn classify(text: &str) -> Self {
        let trimmed = text.trim();
        if trimmed.eq_ignore_ascii_case("true") || trimmed.eq_ignore_ascii_case("false") {
            ValueKind::Boolean
        } else if trimmed.parse::<f64>().is_ok() {
            ValueKind::Number
        } else {
            ValueKind::String
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ValueKind::Unknown => "unknown",
            ValueKind::String => "string",
            ValueKind::Number => "number",
            ValueKind::Boolean => "boolean",
            ValueKind::List => "list",
        };
        write!(f, "{name}")
    }
}

/// Bounded frequency table. Counts for tracked values are exact; once the
/// distinct cap is reached, a new value replaces a pseudo-random entry in
/// the high-index window, so rare values are sampled rather than
/// exhaustively retained.
#[derive(Debug, Clone, Default)]
pub struct ValueReservoir {
    entries: Vec<(String, u64)>,
    index: HashMap<String, usize>,
}

impl ValueReservoir {
    pub fn observe(&mut self, value: String, rng: &mut StdRng) {
        if let Some(&slot) = self.index.get(&value) {
            self.entries[slot].1 += 1;
            return;
        }
        if self.entries.len() < VALUE_CAP {
            self.index.insert(value.clone(), self.entries.len());
            self.entries.push((value, 1));
        } else {
            let slot = rng.random_range(REPLACE_WINDOW_START..VALUE_CAP);
            self.index.remove(&self.entries[slot].0);
            self.index.insert(value.clone(), slot);
            self.entries[slot] = (value, 1);
        }
    }

    pub fn distinct_count(&self) -> usize {
        self.entries.len()
    }

    pub fn count_of(&self, value: &str) -> Option<u64> {
        self.index.get(value).map(|&slot| self.entries[slot].1)
    }

    /// Highest-frequency values first; ties break on the value itself so
    /// output is stable across runs.
    pub fn top(&self, limit: usize) -> Vec<(&str, u64)> {
        self.entries
            .iter()
            .map(|(value, count)| (value.as_str(), *count))
            .sorted_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)))
            .take(limit)
            .collect()
    }
}

/// One discovered attribute path.
#[derive(Debug, Clone)]
pub struct SchemaNode {
    pub path: String,
    pub name: String,
    pub order: u64,
    pub declared: ValueKind,
    pub populated: u64,
    pub values: ValueReservoir,
    pub children: Vec<usize>,
}

impl SchemaNode {
    fn new(path: String, name: String, order: u64) -> Self {
        Self {
            path,
            name,
            order,
            declared: ValueKind::Unknown,
            populated: 0,
            values: ValueReservoir::default(),
            children: Vec::new(),
        }
    }
}

#[derive(Debug)]
pub struct SchemaTree {
    nodes: Vec<SchemaNode>,
    index: HashMap<String, usize>,
    roots: Vec<usize>,
    next_root_order: u64,
    next_child_order: HashMap<String, u64>,
    rng: StdRng,
}

impl SchemaTree {
    /// The seed drives reservoir replacement only; a fixed seed makes the
    /// sampled tail reproducible.
    pub fn new(seed: u64) -> Self {
        Self {
            nodes: Vec::new(),
            index: HashMap::new(),
            roots: Vec::new(),
            next_root_order: ROOT_ORDER_STRIDE,
            next_child_order: HashMap::new(),
            rng: StdRng::seed_from_u64(seed),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn node(&self, path: &str) -> Option<&SchemaNode> {
        self.index.get(path).map(|&slot| &self.nodes[slot])
    }

    /// Root-level nodes in discovery order.
    pub fn root_nodes(&self) -> impl Iterator<Item = &SchemaNode> {
        self.roots.iter().map(|&slot| &self.nodes[slot])
    }

    /// Child nodes of `node` in discovery order.
    pub fn child_nodes<'a>(&'a self, node: &SchemaNode) -> impl Iterator<Item = &'a SchemaNode> {
        node.children.iter().map(|&slot| &self.nodes[slot])
    }

    /// Nodes in display order (discovery order with children interleaved
    /// after their parent).
    pub fn ordered_nodes(&self) -> Vec<&SchemaNode> {
        self.nodes
            .iter()
            .sorted_by_key(|node| node.order)
            .collect()
    }

    /// Pre-registers every attribute of `record` (recursively) without
    /// touching any counts, so the first record's layout claims the
    /// canonical display order even for attributes it leaves empty.
    pub fn register(&mut self, record: &NormalizedRecord) {
        self.register_level(None, record);
    }

    fn register_level(&mut self, parent: Option<&str>, record: &NormalizedRecord) {
        for (name, value) in record.iter() {
            let slot = self.ensure(parent, name);
            if let FieldValue::Records(subs) = value {
                let path = self.nodes[slot].path.clone();
                for sub in subs {
                    self.register_level(Some(&path), sub);
                }
            }
        }
    }

    /// Folds one record into the tree: absent values are skipped, nested
    /// lists record their cardinality and recurse, scalars count toward
    /// population and the value reservoir.
    pub fn update(&mut self, record: &NormalizedRecord) {
        self.update_level(None, record);
    }

    fn update_level(&mut self, parent: Option<&str>, record: &NormalizedRecord) {
        for (name, value) in record.iter() {
            if value.is_absent() {
                continue;
            }
            let slot = self.ensure(parent, name);
            match value {
                FieldValue::Scalar(text) => {
                    let node = &mut self.nodes[slot];
                    if node.declared == ValueKind::Unknown {
                        node.declared = ValueKind::classify(text);
                    }
                    node.populated += 1;
                    node.values.observe(display_value(text), &mut self.rng);
                }
                FieldValue::Records(subs) => {
                    let path;
                    {
                        let node = &mut self.nodes[slot];
                        if node.declared == ValueKind::Unknown {
                            node.declared = ValueKind::List;
                        }
                        node.populated += 1;
                        node.values
                            .observe(format!("{} items", subs.len()), &mut self.rng);
                        path = node.path.clone();
                    }
                    for sub in subs {
                        self.update_level(Some(&path), sub);
                    }
                }
            }
        }
    }

    fn ensure(&mut self, parent: Option<&str>, name: &str) -> usize {
        let path = match parent {
            Some(parent_path) => format!("{parent_path}.{name}"),
            None => name.to_string(),
        };
        if let Some(&slot) = self.index.get(&path) {
            return slot;
        }
        let order = self.allocate_order(parent);
        let slot = self.nodes.len();
        self.nodes
            .push(SchemaNode::new(path.clone(), name.to_string(), order));
        self.index.insert(path, slot);
        match parent {
            None => self.roots.push(slot),
            Some(parent_path) => {
                if let Some(&parent_slot) = self.index.get(parent_path) {
                    self.nodes[parent_slot].children.push(slot);
                }
            }
        }
        slot
    }

    fn allocate_order(&mut self, parent: Option<&str>) -> u64 {
        match parent {
            None => {
                let order = self.next_root_order;
                self.next_root_order += ROOT_ORDER_STRIDE;
                order
            }
            Some(parent_path) => {
                let parent_order = self
                    .index
                    .get(parent_path)
                    .map(|&slot| self.nodes[slot].order)
                    .unwrap_or(0);
                let next = self
                    .next_child_order
                    .entry(parent_path.to_string())
                    .or_insert(parent_order + 1);
                let order = *next;
                *next += 1;
                order
            }
        }
    }
}

/// Canonical display form for a scalar: trimmed and capped at 50
/// characters so reservoir keys stay bounded.
fn display_value(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.chars().count() > 50 {
        trimmed.chars().take(50).collect()
    } else {
        trimmed.to_string()
    }
}

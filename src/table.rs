use std::collections::HashMap;

use crate::error::TrainerError;
use crate::node::InfoSetNode;

/// Mapping from information-set key to [`InfoSetNode`], with at-most-one
/// node per key, lazily created on first visit.
#[derive(Default)]
pub struct NodeTable {
    nodes: HashMap<Vec<u8>, InfoSetNode>,
}

impl NodeTable {
    pub fn new() -> Self {
        Self {
            nodes: HashMap::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Read-only lookup, used by fixed-strategy tables and the agent. Never
    /// creates a node.
    pub fn get(&self, key: &[u8]) -> Option<&InfoSetNode> {
        self.nodes.get(key)
    }

    pub fn get_mut(&mut self, key: &[u8]) -> Option<&mut InfoSetNode> {
        self.nodes.get_mut(key)
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (&Vec<u8>, &mut InfoSetNode)> {
        self.nodes.iter_mut()
    }

    /// Read-only iteration, used to build per-player strategy callables for
    /// evaluation without forcing a recompute of any node's average strategy.
    pub fn iter(&self) -> impl Iterator<Item = (&Vec<u8>, &InfoSetNode)> {
        self.nodes.iter()
    }

    pub fn insert(&mut self, key: Vec<u8>, node: InfoSetNode) {
        self.nodes.insert(key, node);
    }

    /// Return the existing node for `key`, or create one with `num_actions`
    /// and insert it. `num_actions` must equal the stored action count if the
    /// node already existed.
    pub fn get_or_create(
        &mut self,
        key: &[u8],
        num_actions: usize,
    ) -> Result<&mut InfoSetNode, TrainerError> {
        if !self.nodes.contains_key(key) {
            self.nodes
                .insert(key.to_vec(), InfoSetNode::new(num_actions));
        }
        let node = self.nodes.get_mut(key).expect("just inserted or present");
        if node.num_actions() != num_actions {
            return Err(TrainerError::InvariantViolation(format!(
                "info-set key reused with a different action count: expected {}, got {}",
                node.num_actions(),
                num_actions
            )));
        }
        Ok(node)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lazily_creates_single_node_per_key() {
        let mut table = NodeTable::new();
        let key = b"card=J,history=".to_vec();
        table.get_or_create(&key, 2).unwrap();
        table.get_or_create(&key, 2).unwrap();
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn mismatched_action_count_is_invariant_violation() {
        let mut table = NodeTable::new();
        let key = b"k".to_vec();
        table.get_or_create(&key, 2).unwrap();
        let err = table.get_or_create(&key, 3).unwrap_err();
        assert!(matches!(err, TrainerError::InvariantViolation(_)));
    }
}

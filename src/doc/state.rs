//! Materialized container state, folded from operations.
//!
//! Each container's state is a deterministic fold of its operations in
//! canonical order. The apply functions here are total: an operation
//! that no longer makes sense against the current state (a move of an
//! unknown node, a cycle-creating re-parent) is skipped, and the skip is
//! deterministic because every replica folds the same sequence.
//!
//! Sequences use the insert-after-origin rule with tombstoned deletion:
//! elements are never erased, only marked deleted, so origins stay
//! resolvable forever. Interleaving minimization is a non-goal for this
//! engine; canonical replay alone guarantees convergence.

use rustc_hash::FxHashMap;
use smallvec::SmallVec;

use super::id::ElemId;
use super::id::TreeNodeId;
use super::value::Value;

// =============================================================================
// Map state
// =============================================================================

/// A keyed map. Later operations in canonical order win.
#[derive(Clone, Debug, Default)]
pub(crate) struct MapState {
    entries: FxHashMap<String, Value>,
}

impl MapState {
    pub(crate) fn new() -> MapState {
        return MapState { entries: FxHashMap::default() };
    }

    pub(crate) fn apply_set(&mut self, key: &str, value: Value) {
        self.entries.insert(key.to_string(), value);
    }

    pub(crate) fn apply_delete(&mut self, key: &str) {
        self.entries.remove(key);
    }

    pub(crate) fn get(&self, key: &str) -> Option<&Value> {
        return self.entries.get(key);
    }

    pub(crate) fn contains_key(&self, key: &str) -> bool {
        return self.entries.contains_key(key);
    }

    pub(crate) fn len(&self) -> usize {
        return self.entries.len();
    }

    pub(crate) fn keys(&self) -> impl Iterator<Item = &String> {
        return self.entries.keys();
    }
}

// =============================================================================
// Sequence state (list, movable list, text)
// =============================================================================

/// One element of a sequence, tombstoned on deletion.
#[derive(Clone, Debug)]
pub(crate) struct SeqElem<T> {
    pub(crate) id: ElemId,
    pub(crate) value: T,
    pub(crate) deleted: bool,
}

/// An ordered sequence with stable element identities.
///
/// Shared by the list, movable-list, and text containers; only the
/// movable list uses the set/move operations.
#[derive(Clone, Debug)]
pub(crate) struct SeqState<T> {
    elems: Vec<SeqElem<T>>,
}

impl<T> Default for SeqState<T> {
    fn default() -> Self {
        return SeqState { elems: Vec::new() };
    }
}

impl<T: Clone> SeqState<T> {
    pub(crate) fn new() -> SeqState<T> {
        return SeqState::default();
    }

    /// Raw index of the element with the given id, tombstones included.
    fn position_of(&self, id: ElemId) -> Option<usize> {
        return self.elems.iter().position(|e| e.id == id);
    }

    /// Raw index of the nth visible element.
    fn raw_index_of_visible(&self, pos: usize) -> Option<usize> {
        let mut seen = 0;
        for (i, elem) in self.elems.iter().enumerate() {
            if elem.deleted {
                continue;
            }
            if seen == pos {
                return Some(i);
            }
            seen += 1;
        }
        return None;
    }

    /// Insert elements immediately after `origin` (`None` = at the front).
    pub(crate) fn apply_insert(&mut self, origin: Option<ElemId>, items: Vec<(ElemId, T)>) {
        let at = match origin {
            None => 0,
            Some(id) => match self.position_of(id) {
                Some(i) => i + 1,
                // Origins precede their inserts in canonical order, so a
                // missing origin only happens for malformed input.
                None => self.elems.len(),
            },
        };
        let new: Vec<SeqElem<T>> = items
            .into_iter()
            .map(|(id, value)| SeqElem { id, value, deleted: false })
            .collect();
        self.elems.splice(at..at, new);
    }

    /// Tombstone the given elements.
    pub(crate) fn apply_delete(&mut self, targets: &[ElemId]) {
        for target in targets {
            if let Some(i) = self.position_of(*target) {
                self.elems[i].deleted = true;
            }
        }
    }

    /// Replace an element's value in place.
    pub(crate) fn apply_set(&mut self, target: ElemId, value: T) {
        if let Some(i) = self.position_of(target) {
            self.elems[i].value = value;
        }
    }

    /// Relocate an element to immediately after `origin` (`None` = front).
    pub(crate) fn apply_move(&mut self, target: ElemId, origin: Option<ElemId>) {
        let from = match self.position_of(target) {
            Some(i) => i,
            None => return,
        };
        let elem = self.elems.remove(from);
        let at = match origin {
            None => 0,
            Some(id) => match self.position_of(id) {
                Some(i) => i + 1,
                None => 0,
            },
        };
        self.elems.insert(at, elem);
    }

    /// Number of visible elements.
    pub(crate) fn len(&self) -> usize {
        return self.elems.iter().filter(|e| !e.deleted).count();
    }

    /// The nth visible element's value.
    pub(crate) fn get(&self, pos: usize) -> Option<&T> {
        let i = self.raw_index_of_visible(pos)?;
        return Some(&self.elems[i].value);
    }

    /// The nth visible element's id.
    pub(crate) fn id_at(&self, pos: usize) -> Option<ElemId> {
        let i = self.raw_index_of_visible(pos)?;
        return Some(self.elems[i].id);
    }

    /// Ids of the `len` visible elements starting at `pos`.
    pub(crate) fn ids_in_range(&self, pos: usize, len: usize) -> Vec<ElemId> {
        return self
            .elems
            .iter()
            .filter(|e| !e.deleted)
            .skip(pos)
            .take(len)
            .map(|e| e.id)
            .collect();
    }

    /// Visible values in order.
    pub(crate) fn to_vec(&self) -> Vec<T> {
        return self
            .elems
            .iter()
            .filter(|e| !e.deleted)
            .map(|e| e.value.clone())
            .collect();
    }
}

// =============================================================================
// Tree state
// =============================================================================

/// One node of a tree.
#[derive(Clone, Debug)]
pub(crate) struct TreeNode {
    pub(crate) parent: Option<TreeNodeId>,
    pub(crate) children: SmallVec<[TreeNodeId; 4]>,
    pub(crate) deleted: bool,
}

/// A hierarchical tree with ordered children and movable nodes.
///
/// Deleted nodes stay in the node table (and in their parent's child
/// list) so they remain queryable; visibility filters hide them.
#[derive(Clone, Debug, Default)]
pub(crate) struct TreeState {
    nodes: FxHashMap<TreeNodeId, TreeNode>,
    roots: SmallVec<[TreeNodeId; 4]>,
}

impl TreeState {
    pub(crate) fn new() -> TreeState {
        return TreeState::default();
    }

    /// Whether `ancestor` is on the parent chain of `node` (or is `node`).
    pub(crate) fn is_ancestor_or_self(&self, ancestor: TreeNodeId, node: TreeNodeId) -> bool {
        let mut current = Some(node);
        while let Some(id) = current {
            if id == ancestor {
                return true;
            }
            current = self.nodes.get(&id).and_then(|n| n.parent);
        }
        return false;
    }

    fn sibling_list_mut(&mut self, parent: Option<TreeNodeId>) -> Option<&mut SmallVec<[TreeNodeId; 4]>> {
        match parent {
            None => Some(&mut self.roots),
            Some(p) => self.nodes.get_mut(&p).map(|n| &mut n.children),
        }
    }

    pub(crate) fn apply_create(&mut self, node: TreeNodeId, parent: Option<TreeNodeId>) {
        if self.nodes.contains_key(&node) {
            return;
        }
        if let Some(p) = parent {
            if !self.nodes.contains_key(&p) {
                return;
            }
        }
        self.nodes.insert(
            node,
            TreeNode { parent, children: SmallVec::new(), deleted: false },
        );
        if let Some(list) = self.sibling_list_mut(parent) {
            list.push(node);
        }
    }

    /// Re-parent `node` under `parent`, after sibling `after`
    /// (`None` = first child). Cycle-creating moves are skipped.
    pub(crate) fn apply_move(
        &mut self,
        node: TreeNodeId,
        parent: Option<TreeNodeId>,
        after: Option<TreeNodeId>,
    ) {
        if !self.nodes.contains_key(&node) {
            return;
        }
        if let Some(p) = parent {
            if !self.nodes.contains_key(&p) || self.is_ancestor_or_self(node, p) {
                return;
            }
        }

        // Detach from the current sibling list
        let old_parent = self.nodes[&node].parent;
        if let Some(list) = self.sibling_list_mut(old_parent) {
            list.retain(|id| *id != node);
        }

        // Attach at the requested position
        let at = {
            let list = match self.sibling_list_mut(parent) {
                Some(list) => list,
                None => return,
            };
            match after {
                None => 0,
                Some(s) => match list.iter().position(|id| *id == s) {
                    Some(i) => i + 1,
                    None => list.len(),
                },
            }
        };
        if let Some(list) = self.sibling_list_mut(parent) {
            list.insert(at, node);
        }
        if let Some(n) = self.nodes.get_mut(&node) {
            n.parent = parent;
        }
    }

    pub(crate) fn apply_delete(&mut self, node: TreeNodeId) {
        if let Some(n) = self.nodes.get_mut(&node) {
            n.deleted = true;
        }
    }

    pub(crate) fn contains(&self, node: TreeNodeId) -> bool {
        return self.nodes.contains_key(&node);
    }

    pub(crate) fn parent(&self, node: TreeNodeId) -> Option<Option<TreeNodeId>> {
        return self.nodes.get(&node).map(|n| n.parent);
    }

    /// Whether the node or any of its ancestors carries a delete mark.
    pub(crate) fn is_deleted(&self, node: TreeNodeId) -> Option<bool> {
        self.nodes.get(&node)?;
        let mut current = Some(node);
        while let Some(id) = current {
            let n = self.nodes.get(&id)?;
            if n.deleted {
                return Some(true);
            }
            current = n.parent;
        }
        return Some(false);
    }

    /// The full sibling list under `parent`, tombstones included.
    /// Used when computing stable move anchors.
    pub(crate) fn raw_siblings(&self, parent: Option<TreeNodeId>) -> &[TreeNodeId] {
        return self.sibling_list(parent);
    }

    fn sibling_list(&self, parent: Option<TreeNodeId>) -> &[TreeNodeId] {
        match parent {
            None => &self.roots,
            Some(p) => self.nodes.get(&p).map(|n| n.children.as_slice()).unwrap_or(&[]),
        }
    }

    /// Visible children of `parent` (`None` = visible roots), in order.
    pub(crate) fn children(&self, parent: Option<TreeNodeId>) -> Vec<TreeNodeId> {
        return self
            .sibling_list(parent)
            .iter()
            .filter(|id| !self.nodes[*id].deleted)
            .copied()
            .collect();
    }

    /// Position of `node` among its visible siblings.
    pub(crate) fn index(&self, node: TreeNodeId) -> Option<usize> {
        let parent = self.parent(node)?;
        let mut index = 0;
        for sibling in self.sibling_list(parent) {
            if *sibling == node {
                return Some(index);
            }
            if !self.nodes[sibling].deleted {
                index += 1;
            }
        }
        return None;
    }

    /// All node ids, deleted nodes included.
    pub(crate) fn node_ids(&self) -> impl Iterator<Item = TreeNodeId> + '_ {
        return self.nodes.keys().copied();
    }

    /// Number of visible nodes.
    pub(crate) fn len(&self) -> usize {
        return self
            .nodes
            .keys()
            .filter(|id| self.is_deleted(**id) == Some(false))
            .count();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc::id::OpId;
    use crate::doc::id::PeerId;

    fn eid(counter: u64) -> ElemId {
        return ElemId(OpId::new(PeerId(1), counter));
    }

    fn nid(counter: u64) -> TreeNodeId {
        return TreeNodeId(OpId::new(PeerId(1), counter));
    }

    #[test]
    fn map_set_and_delete() {
        let mut map = MapState::new();
        map.apply_set("a", Value::Int(1));
        map.apply_set("b", Value::Int(2));
        assert_eq!(map.len(), 2);
        assert_eq!(map.get("a"), Some(&Value::Int(1)));

        map.apply_set("a", Value::Int(3));
        assert_eq!(map.get("a"), Some(&Value::Int(3)));

        map.apply_delete("a");
        assert_eq!(map.get("a"), None);
        assert!(!map.contains_key("a"));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn seq_insert_after_origin() {
        let mut seq: SeqState<i64> = SeqState::new();
        seq.apply_insert(None, vec![(eid(0), 10), (eid(1), 20)]);
        assert_eq!(seq.to_vec(), vec![10, 20]);

        // Insert between the two
        seq.apply_insert(Some(eid(0)), vec![(eid(2), 15)]);
        assert_eq!(seq.to_vec(), vec![10, 15, 20]);

        // Insert at the front
        seq.apply_insert(None, vec![(eid(3), 5)]);
        assert_eq!(seq.to_vec(), vec![5, 10, 15, 20]);
    }

    #[test]
    fn seq_delete_keeps_tombstones_resolvable() {
        let mut seq: SeqState<i64> = SeqState::new();
        seq.apply_insert(None, vec![(eid(0), 1), (eid(1), 2), (eid(2), 3)]);
        seq.apply_delete(&[eid(1)]);

        assert_eq!(seq.len(), 2);
        assert_eq!(seq.to_vec(), vec![1, 3]);

        // Inserting after the tombstoned element still works
        seq.apply_insert(Some(eid(1)), vec![(eid(3), 9)]);
        assert_eq!(seq.to_vec(), vec![1, 9, 3]);
    }

    #[test]
    fn seq_set_and_move() {
        let mut seq: SeqState<i64> = SeqState::new();
        seq.apply_insert(None, vec![(eid(0), 1), (eid(1), 2), (eid(2), 3)]);

        seq.apply_set(eid(1), 20);
        assert_eq!(seq.to_vec(), vec![1, 20, 3]);

        // Move the last element to the front
        seq.apply_move(eid(2), None);
        assert_eq!(seq.to_vec(), vec![3, 1, 20]);

        // Move it back after eid(1)
        seq.apply_move(eid(2), Some(eid(1)));
        assert_eq!(seq.to_vec(), vec![1, 20, 3]);
    }

    #[test]
    fn seq_visible_indexing_skips_tombstones() {
        let mut seq: SeqState<i64> = SeqState::new();
        seq.apply_insert(None, vec![(eid(0), 1), (eid(1), 2), (eid(2), 3)]);
        seq.apply_delete(&[eid(0)]);

        assert_eq!(seq.get(0), Some(&2));
        assert_eq!(seq.id_at(0), Some(eid(1)));
        assert_eq!(seq.get(2), None);
        assert_eq!(seq.ids_in_range(0, 2), vec![eid(1), eid(2)]);
    }

    #[test]
    fn tree_create_and_children_order() {
        let mut tree = TreeState::new();
        tree.apply_create(nid(0), None);
        tree.apply_create(nid(1), Some(nid(0)));
        tree.apply_create(nid(2), Some(nid(0)));

        assert_eq!(tree.children(None), vec![nid(0)]);
        assert_eq!(tree.children(Some(nid(0))), vec![nid(1), nid(2)]);
        assert_eq!(tree.parent(nid(1)), Some(Some(nid(0))));
        assert_eq!(tree.index(nid(2)), Some(1));
    }

    #[test]
    fn tree_move_respects_anchor() {
        let mut tree = TreeState::new();
        tree.apply_create(nid(0), None);
        tree.apply_create(nid(1), Some(nid(0)));
        tree.apply_create(nid(2), Some(nid(0)));
        tree.apply_create(nid(3), Some(nid(0)));

        // Move 3 to the front
        tree.apply_move(nid(3), Some(nid(0)), None);
        assert_eq!(tree.children(Some(nid(0))), vec![nid(3), nid(1), nid(2)]);

        // Move 1 after 2
        tree.apply_move(nid(1), Some(nid(0)), Some(nid(2)));
        assert_eq!(tree.children(Some(nid(0))), vec![nid(3), nid(2), nid(1)]);
    }

    #[test]
    fn tree_move_skips_cycles() {
        let mut tree = TreeState::new();
        tree.apply_create(nid(0), None);
        tree.apply_create(nid(1), Some(nid(0)));

        // Moving the root under its own child must be a no-op
        tree.apply_move(nid(0), Some(nid(1)), None);
        assert_eq!(tree.parent(nid(0)), Some(None));
        assert_eq!(tree.children(Some(nid(1))), Vec::<TreeNodeId>::new());
    }

    #[test]
    fn tree_delete_hides_subtree_but_keeps_nodes() {
        let mut tree = TreeState::new();
        tree.apply_create(nid(0), None);
        tree.apply_create(nid(1), Some(nid(0)));
        tree.apply_create(nid(2), Some(nid(1)));

        tree.apply_delete(nid(1));

        // The subtree inherits deletion
        assert_eq!(tree.is_deleted(nid(1)), Some(true));
        assert_eq!(tree.is_deleted(nid(2)), Some(true));
        assert_eq!(tree.is_deleted(nid(0)), Some(false));

        // Deleted nodes remain queryable
        assert!(tree.contains(nid(1)));
        assert_eq!(tree.parent(nid(2)), Some(Some(nid(1))));
        assert_eq!(tree.children(Some(nid(0))), Vec::<TreeNodeId>::new());
        assert_eq!(tree.len(), 1);
    }
}

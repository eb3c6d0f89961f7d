//! Operations recorded in the document's update log.
//!
//! Each replica produces a sequence of operations that, when replayed in
//! canonical order, reconstruct the container state. Operations are
//! intention-preserving: positions are expressed as stable element and
//! node identities, never as raw indices, so they can be merged with
//! concurrent operations without shifting.
//!
//! # Canonical order
//!
//! Every operation carries a Lamport timestamp. The canonical order is
//! `(lamport, peer, counter)`, which is a total order consistent with
//! causality: an operation that depends on another (for example an
//! insert whose origin element was created by it) always sorts after it.
//! Replaying the full op set in canonical order is therefore a
//! deterministic fold, and two replicas holding the same op set converge
//! by construction.

use serde::Deserialize;
use serde::Serialize;

use super::id::ContainerId;
use super::id::ElemId;
use super::id::Lamport;
use super::id::OpId;
use super::id::PeerId;
use super::id::TreeNodeId;
use super::value::Value;

/// One operation in the update log.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Op {
    /// The operation id. Operations that create several elements
    /// consume one counter per element, starting at this id.
    pub id: OpId,
    /// The Lamport timestamp at which the operation was produced.
    pub lamport: Lamport,
    /// The container the operation applies to.
    pub container: ContainerId,
    /// What the operation does.
    pub payload: Payload,
}

impl Op {
    /// The canonical sort key: `(lamport, peer, counter)`.
    pub fn key(&self) -> (Lamport, PeerId, u64) {
        return (self.lamport, self.id.peer, self.id.counter);
    }

    /// How many counters this operation consumes (one per created element,
    /// at least one).
    pub fn span(&self) -> u64 {
        match &self.payload {
            Payload::SeqInsert { values, .. } => (values.len() as u64).max(1),
            Payload::TextInsert { content, .. } => (content.chars().count() as u64).max(1),
            _ => 1,
        }
    }
}

/// The kind-specific content of an operation.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub enum Payload {
    /// Set a map key to a value.
    MapSet {
        /// The key to set.
        key: String,
        /// The new value.
        value: Value,
    },

    /// Remove a map key.
    MapDelete {
        /// The key to remove.
        key: String,
    },

    /// Insert elements after an origin element.
    /// `None` means insert at the beginning of the sequence.
    SeqInsert {
        /// The element the new elements are inserted after.
        origin: Option<ElemId>,
        /// The inserted values, one element id per value.
        values: Vec<Value>,
    },

    /// Mark sequence elements as deleted (tombstoned, not erased).
    SeqDelete {
        /// The elements to delete.
        targets: Vec<ElemId>,
    },

    /// Replace a sequence element's value in place (movable list only).
    SeqSet {
        /// The element to replace.
        target: ElemId,
        /// The new value.
        value: Value,
    },

    /// Relocate a sequence element after an origin (movable list only).
    /// `None` means move to the beginning.
    SeqMove {
        /// The element to move.
        target: ElemId,
        /// The element it lands after.
        origin: Option<ElemId>,
    },

    /// Insert text after an origin element, one element per char.
    TextInsert {
        /// The element the text is inserted after.
        origin: Option<ElemId>,
        /// The inserted text.
        content: String,
    },

    /// Create a tree node under a parent (`None` = root).
    TreeCreate {
        /// The id of the new node.
        node: TreeNodeId,
        /// The parent, or `None` for a root node.
        parent: Option<TreeNodeId>,
    },

    /// Re-parent a tree node.
    TreeMove {
        /// The node to move.
        node: TreeNodeId,
        /// The new parent, or `None` for root level.
        parent: Option<TreeNodeId>,
        /// The sibling the node lands after; `None` means first child.
        after: Option<TreeNodeId>,
    },

    /// Mark a tree node (and thereby its subtree) as deleted.
    TreeDelete {
        /// The node to delete.
        node: TreeNodeId,
    },
}

/// Sort operations into canonical order.
pub fn sort_canonical(ops: &mut [Op]) {
    ops.sort_by_key(|op| op.key());
}

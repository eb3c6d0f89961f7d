//! Identifier types for peers, operations, containers, and tree nodes.
//!
//! # Identifier Hierarchy
//!
//! - `PeerId`: identifies a replica of the document
//! - `OpId`: identifies an operation (peer, counter)
//! - `ContainerId`: identifies a container, scoped by kind
//! - `ElemId`: identifies one element inside a sequence container
//! - `TreeNodeId`: identifies one node inside a tree container
//!
//! IDs are designed to be:
//! - Globally unique: (peer, counter) pairs are unique across replicas
//! - Totally ordered: can be compared deterministically
//! - Stable: identity survives content mutation and structural edits
//! - Hashable: usable as registry keys

use std::cmp::Ordering;
use std::fmt;

use rand_core::OsRng;
use rand_core::RngCore;
use serde::Deserialize;
use serde::Serialize;

/// A replica identifier.
///
/// Every document instance gets a random peer id at construction,
/// so operations produced by different replicas never collide.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PeerId(pub u64);

impl PeerId {
    /// Generate a random peer id.
    pub fn random() -> PeerId {
        return PeerId(OsRng.next_u64());
    }
}

impl fmt::Display for PeerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return write!(f, "{}", self.0);
    }
}

/// A Lamport timestamp.
pub type Lamport = u64;

/// An operation identifier.
///
/// The counter is monotonically increasing per peer. Operations that
/// create several elements at once consume one counter per element, so
/// element ids can be derived by offsetting the operation id.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OpId {
    /// The peer that produced this operation.
    pub peer: PeerId,
    /// The per-peer counter of this operation.
    pub counter: u64,
}

impl OpId {
    /// Create a new operation id.
    pub fn new(peer: PeerId, counter: u64) -> OpId {
        return OpId { peer, counter };
    }
}

impl PartialOrd for OpId {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        return Some(self.cmp(other));
    }
}

impl Ord for OpId {
    fn cmp(&self, other: &Self) -> Ordering {
        // Compare by peer first, then by counter
        match self.peer.cmp(&other.peer) {
            Ordering::Equal => self.counter.cmp(&other.counter),
            other => other,
        }
    }
}

/// The closed set of container kinds the document supports.
///
/// Kind dispatch across the system is an exhaustive match on this enum,
/// so an "unknown container kind" is unrepresentable by construction.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ContainerKind {
    /// Keyed map with last-writer-wins entries.
    Map,
    /// Ordered list.
    List,
    /// Ordered list whose elements can be reordered and replaced in place.
    MovableList,
    /// Collaborative text sequence.
    Text,
    /// Hierarchical tree with movable nodes.
    Tree,
}

impl ContainerKind {
    /// A short human-readable name for the kind.
    pub fn name(&self) -> &'static str {
        match self {
            ContainerKind::Map => "map",
            ContainerKind::List => "list",
            ContainerKind::MovableList => "movable-list",
            ContainerKind::Text => "text",
            ContainerKind::Tree => "tree",
        }
    }
}

/// A container identity, scoped by kind.
///
/// Two containers of different kinds may legally share the same name;
/// they are different containers. Every registry in the system is
/// therefore keyed by the full (kind, name) pair.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContainerId {
    /// The kind of the container.
    pub kind: ContainerKind,
    /// The name of the container, unique within its kind.
    pub name: String,
}

impl ContainerId {
    /// The identity of a root container with a user-chosen name.
    pub fn root(kind: ContainerKind, name: &str) -> ContainerId {
        return ContainerId {
            kind,
            name: name.to_string(),
        };
    }

    /// The identity of a nested container created by the given operation.
    ///
    /// Derived from the creating operation id, so the identity is the
    /// same on every replica that imports the creation.
    pub fn nested(kind: ContainerKind, op: OpId) -> ContainerId {
        return ContainerId {
            kind,
            name: format!("{}:{}", op.peer.0, op.counter),
        };
    }
}

impl fmt::Display for ContainerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return write!(f, "{}({})", self.kind.name(), self.name);
    }
}

/// An identifier for one element of a sequence container.
///
/// Stable for the element's lifetime: unlike a positional index, it
/// survives inserts, deletes, and moves around it.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ElemId(pub OpId);

/// An identifier for one node of a tree container.
///
/// Stable for the node's lifetime, including across re-parenting and
/// deletion (deleted nodes remain addressable).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TreeNodeId(pub OpId);

impl TreeNodeId {
    /// The peer that created this node.
    pub fn creator(&self) -> PeerId {
        return self.0.peer;
    }
}

impl fmt::Display for TreeNodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        return write!(f, "{}@{}", self.0.counter, self.0.peer);
    }
}

/// A Lamport clock for ordering operations across replicas.
///
/// The clock is a simple counter that:
/// - Increments on local operations (tick)
/// - Updates to max(local, remote) on import (observe)
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub struct LamportClock {
    time: Lamport,
}

impl LamportClock {
    /// Create a new clock starting at 0.
    pub fn new() -> LamportClock {
        return LamportClock { time: 0 };
    }

    /// Get the current time.
    #[inline]
    pub fn time(&self) -> Lamport {
        return self.time;
    }

    /// Increment the clock for a local operation.
    /// Returns the new time.
    #[inline]
    pub fn tick(&mut self) -> Lamport {
        self.time += 1;
        return self.time;
    }

    /// Observe a remote timestamp.
    /// Sets local time to max(local, remote).
    #[inline]
    pub fn observe(&mut self, remote: Lamport) {
        self.time = self.time.max(remote);
    }
}

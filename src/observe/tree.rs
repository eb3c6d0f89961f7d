//! Reactive wrappers for tree containers and their nodes.
//!
//! The tree wrapper carries a second cache layer: one wrapper per node,
//! keyed by node id, scoped to this tree rather than to the pool. Node
//! wrappers are never evicted while the tree wrapper lives, so a node's
//! wrapper identity survives re-parenting and even deletion (deleted
//! nodes stay queryable).
//!
//! # Invalidation policy
//!
//! A structural edit (create, move, delete) invalidates the tree cell
//! and every cached node cell, not just the nodes touched. Computing
//! the precise affected set (ancestors, shifted siblings, the moved
//! subtree) would need a structural diff; invalidating everything is
//! the safe coarse default.
//!
//! One subscription serves the tree cell and all node cells, driven by
//! a shared observer count across them.

use std::cell::Cell;
use std::cell::RefCell;
use std::rc::Rc;
use std::rc::Weak;

use rustc_hash::FxHashMap;

use crate::doc::ContainerId;
use crate::doc::DocError;
use crate::doc::EventOrigin;
use crate::doc::PeerId;
use crate::doc::Subscription;
use crate::doc::TreeNodeId;
use crate::doc::TreeRef;
use crate::reactive::Atom;
use crate::reactive::batch;

use super::pool::Pool;
use super::pool::PoolInner;

// =============================================================================
// Tree internals
// =============================================================================

pub(crate) struct TreeInner {
    handle: TreeRef,
    pool: Weak<PoolInner>,
    /// Cell for tree-shape reads (roots, len, membership).
    atom: Atom,
    sub: RefCell<Option<Subscription>>,
    /// Node wrappers, populated lazily and never evicted.
    nodes: RefCell<FxHashMap<TreeNodeId, ObservableTreeNode>>,
    /// Observers across the tree cell and every node cell. The single
    /// subscription attaches at 0->1 and detaches at 1->0.
    observed_cells: Cell<usize>,
}

impl TreeInner {
    fn cell_observed(self: &Rc<Self>) {
        let count = self.observed_cells.get();
        self.observed_cells.set(count + 1);
        if count > 0 {
            return;
        }
        let pool = match self.pool.upgrade() {
            Some(pool) => pool,
            None => return,
        };
        if pool.disposed.get() {
            return;
        }
        let weak = Rc::downgrade(self);
        let sub = self.handle.subscribe(move |event| {
            if event.origin == EventOrigin::Import {
                if let Some(inner) = weak.upgrade() {
                    inner.invalidate_all();
                }
            }
        });
        *self.sub.borrow_mut() = Some(sub);
    }

    fn cell_unobserved(&self) {
        let count = self.observed_cells.get().saturating_sub(1);
        self.observed_cells.set(count);
        if count == 0 {
            if let Some(sub) = self.sub.borrow_mut().take() {
                sub.unsubscribe();
            }
        }
    }

    /// Report the tree cell and every cached node cell changed, as one
    /// settled step.
    fn invalidate_all(&self) {
        let node_atoms: Vec<Atom> = self
            .nodes
            .borrow()
            .values()
            .map(|node| node.inner.atom.clone())
            .collect();
        batch(|| {
            self.atom.report_changed();
            for atom in node_atoms {
                atom.report_changed();
            }
        });
    }

    /// The cached wrapper for a node, created on first resolution.
    fn node(self: &Rc<Self>, id: TreeNodeId) -> ObservableTreeNode {
        if let Some(cached) = self.nodes.borrow().get(&id) {
            return cached.clone();
        }
        let node = ObservableTreeNode::new(self, id);
        self.nodes.borrow_mut().insert(id, node.clone());
        return node;
    }
}

/// Route a cell's lifecycle hooks into the tree's shared observer count.
fn wire_counted_cell(inner: &Rc<TreeInner>, atom: &Atom) {
    let on_observed = Rc::downgrade(inner);
    let on_unobserved = Rc::downgrade(inner);
    atom.set_hooks(
        move || {
            if let Some(inner) = on_observed.upgrade() {
                inner.cell_observed();
            }
        },
        move || {
            if let Some(inner) = on_unobserved.upgrade() {
                inner.cell_unobserved();
            }
        },
    );
}

// =============================================================================
// ObservableTree
// =============================================================================

/// A reactive tree.
///
/// Structural edits go through this wrapper or through a node wrapper;
/// either way the underlying tree alone validates them (cycles, missing
/// nodes), and on success the whole node cache is invalidated.
#[derive(Clone)]
pub struct ObservableTree {
    inner: Rc<TreeInner>,
}

impl ObservableTree {
    pub(crate) fn new(handle: TreeRef, pool: &Rc<PoolInner>) -> ObservableTree {
        let inner = Rc::new(TreeInner {
            handle,
            pool: Rc::downgrade(pool),
            atom: Atom::new(),
            sub: RefCell::new(None),
            nodes: RefCell::new(FxHashMap::default()),
            observed_cells: Cell::new(0),
        });
        wire_counted_cell(&inner, &inner.atom);
        return ObservableTree { inner };
    }

    /// The underlying container's identity.
    pub fn id(&self) -> &ContainerId {
        return self.inner.handle.id();
    }

    /// The raw container handle, bypassing observation.
    pub fn original(&self) -> &TreeRef {
        return &self.inner.handle;
    }

    /// The pool this wrapper belongs to.
    pub fn pool(&self) -> Pool {
        let inner = self.inner.pool.upgrade().expect("wrapper outlived its pool");
        return Pool::from_inner(inner);
    }

    /// Create a node under the given parent (`None` for a root),
    /// returning its wrapper.
    pub fn create(&self, parent: Option<TreeNodeId>) -> Result<ObservableTreeNode, DocError> {
        let id = self.inner.handle.create(parent)?;
        self.inner.invalidate_all();
        return Ok(self.inner.node(id));
    }

    /// Move a node under a new parent, appended after its new siblings.
    pub fn mov(&self, node: TreeNodeId, parent: Option<TreeNodeId>) -> Result<(), DocError> {
        self.inner.handle.mov(node, parent)?;
        self.inner.invalidate_all();
        return Ok(());
    }

    /// Move a node directly before a sibling anchor.
    pub fn mov_before(&self, node: TreeNodeId, anchor: TreeNodeId) -> Result<(), DocError> {
        self.inner.handle.mov_before(node, anchor)?;
        self.inner.invalidate_all();
        return Ok(());
    }

    /// Move a node directly after a sibling anchor.
    pub fn mov_after(&self, node: TreeNodeId, anchor: TreeNodeId) -> Result<(), DocError> {
        self.inner.handle.mov_after(node, anchor)?;
        self.inner.invalidate_all();
        return Ok(());
    }

    /// Delete a node (and, logically, its subtree). The node stays
    /// queryable through its wrapper afterward.
    pub fn delete(&self, node: TreeNodeId) -> Result<(), DocError> {
        self.inner.handle.delete(node)?;
        self.inner.invalidate_all();
        return Ok(());
    }

    /// The cached wrapper for a node id, if the tree knows the node
    /// (deleted nodes included).
    pub fn node(&self, id: TreeNodeId) -> Option<ObservableTreeNode> {
        self.inner.atom.report_observed();
        if !self.inner.handle.contains(id) {
            return None;
        }
        return Some(self.inner.node(id));
    }

    /// The root nodes, in order.
    pub fn roots(&self) -> Vec<ObservableTreeNode> {
        self.inner.atom.report_observed();
        return self
            .inner
            .handle
            .roots()
            .into_iter()
            .map(|id| self.inner.node(id))
            .collect();
    }

    /// Every known node, deleted nodes included, in unspecified order.
    pub fn nodes(&self) -> Vec<ObservableTreeNode> {
        self.inner.atom.report_observed();
        return self
            .inner
            .handle
            .nodes()
            .into_iter()
            .map(|id| self.inner.node(id))
            .collect();
    }

    /// Whether the tree knows this node (deleted nodes included).
    pub fn contains(&self, id: TreeNodeId) -> bool {
        self.inner.atom.report_observed();
        return self.inner.handle.contains(id);
    }

    /// Number of visible nodes.
    pub fn len(&self) -> usize {
        self.inner.atom.report_observed();
        return self.inner.handle.len();
    }

    /// Whether the tree has no visible nodes.
    pub fn is_empty(&self) -> bool {
        return self.len() == 0;
    }

    /// Whether any cell of this tree (tree-level or node-level) is
    /// observed by a live tracked computation.
    pub fn is_observed(&self) -> bool {
        return self.inner.observed_cells.get() > 0;
    }

    pub(crate) fn detach(&self) {
        if let Some(sub) = self.inner.sub.borrow_mut().take() {
            sub.unsubscribe();
        }
    }
}

impl PartialEq for ObservableTree {
    fn eq(&self, other: &Self) -> bool {
        return Rc::ptr_eq(&self.inner, &other.inner);
    }
}

impl std::fmt::Debug for ObservableTree {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        return write!(f, "ObservableTree({})", self.id());
    }
}

// =============================================================================
// ObservableTreeNode
// =============================================================================

pub(crate) struct NodeInner {
    tree: Weak<TreeInner>,
    id: TreeNodeId,
    atom: Atom,
}

/// A reactive tree node.
///
/// Scoped to its tree wrapper's node cache, not the pool: resolving the
/// same node id through the same tree always returns the same wrapper,
/// before and after moves and deletion.
///
/// A node wrapper must not outlive its tree wrapper; reads through a
/// node whose tree is gone panic.
#[derive(Clone)]
pub struct ObservableTreeNode {
    inner: Rc<NodeInner>,
}

impl ObservableTreeNode {
    fn new(tree: &Rc<TreeInner>, id: TreeNodeId) -> ObservableTreeNode {
        let atom = Atom::new();
        wire_counted_cell(tree, &atom);
        return ObservableTreeNode {
            inner: Rc::new(NodeInner {
                tree: Rc::downgrade(tree),
                id,
                atom,
            }),
        };
    }

    fn tree(&self) -> Rc<TreeInner> {
        return self
            .inner
            .tree
            .upgrade()
            .expect("node wrapper outlived its tree wrapper");
    }

    /// This node's id.
    pub fn id(&self) -> TreeNodeId {
        return self.inner.id;
    }

    /// The peer that created this node.
    pub fn creator(&self) -> PeerId {
        return self.inner.id.creator();
    }

    /// Create a child of this node, returning its wrapper.
    pub fn create_child(&self) -> Result<ObservableTreeNode, DocError> {
        let tree = self.tree();
        let id = tree.handle.create(Some(self.inner.id))?;
        tree.invalidate_all();
        return Ok(tree.node(id));
    }

    /// Move this node under a new parent (`None` for root level).
    pub fn mov(&self, parent: Option<TreeNodeId>) -> Result<(), DocError> {
        let tree = self.tree();
        tree.handle.mov(self.inner.id, parent)?;
        tree.invalidate_all();
        return Ok(());
    }

    /// Move this node directly before a sibling anchor.
    pub fn mov_before(&self, anchor: TreeNodeId) -> Result<(), DocError> {
        let tree = self.tree();
        tree.handle.mov_before(self.inner.id, anchor)?;
        tree.invalidate_all();
        return Ok(());
    }

    /// Move this node directly after a sibling anchor.
    pub fn mov_after(&self, anchor: TreeNodeId) -> Result<(), DocError> {
        let tree = self.tree();
        tree.handle.mov_after(self.inner.id, anchor)?;
        tree.invalidate_all();
        return Ok(());
    }

    /// Delete this node. It stays queryable afterward.
    pub fn delete(&self) -> Result<(), DocError> {
        let tree = self.tree();
        tree.handle.delete(self.inner.id)?;
        tree.invalidate_all();
        return Ok(());
    }

    /// This node's parent wrapper, or `None` if it is a root.
    pub fn parent(&self) -> Result<Option<ObservableTreeNode>, DocError> {
        self.inner.atom.report_observed();
        let tree = self.tree();
        let parent = tree.handle.parent(self.inner.id)?;
        return Ok(parent.map(|id| tree.node(id)));
    }

    /// This node's children, in order.
    pub fn children(&self) -> Vec<ObservableTreeNode> {
        self.inner.atom.report_observed();
        let tree = self.tree();
        return tree
            .handle
            .children(Some(self.inner.id))
            .into_iter()
            .map(|id| tree.node(id))
            .collect();
    }

    /// This node's position among its siblings.
    pub fn index(&self) -> Result<usize, DocError> {
        self.inner.atom.report_observed();
        return self.tree().handle.index(self.inner.id);
    }

    /// Whether this node (or an ancestor) has been deleted.
    pub fn is_deleted(&self) -> Result<bool, DocError> {
        self.inner.atom.report_observed();
        return self.tree().handle.is_deleted(self.inner.id);
    }
}

impl PartialEq for ObservableTreeNode {
    fn eq(&self, other: &Self) -> bool {
        return Rc::ptr_eq(&self.inner, &other.inner);
    }
}

impl std::fmt::Debug for ObservableTreeNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        return write!(f, "ObservableTreeNode({})", self.inner.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc::Doc;
    use crate::reactive::autorun;

    #[test]
    fn node_wrappers_keep_identity_across_moves() {
        let doc = Doc::new();
        let pool = Pool::new(&doc);
        let tree = pool.get(doc.tree("outline"));

        let root = tree.create(None).expect("create root");
        let child = tree.create(Some(root.id())).expect("create child");

        child.mov(None).expect("move to root level");
        let found = tree.node(child.id()).expect("node known");
        assert_eq!(found, child);
        assert_eq!(child.parent().expect("known"), None);
    }

    #[test]
    fn deleted_nodes_stay_queryable() {
        let doc = Doc::new();
        let pool = Pool::new(&doc);
        let tree = pool.get(doc.tree("outline"));

        let root = tree.create(None).expect("create root");
        let child = root.create_child().expect("create child");

        root.delete().expect("delete");
        assert!(root.is_deleted().expect("known"));
        // Deletion is inherited, not cascaded through the cache
        assert!(child.is_deleted().expect("known"));
        assert_eq!(tree.node(child.id()).expect("still known"), child);
    }

    #[test]
    fn structural_edit_invalidates_unrelated_nodes() {
        let doc = Doc::new();
        let pool = Pool::new(&doc);
        let tree = pool.get(doc.tree("outline"));

        let a = tree.create(None).expect("create");
        let b = tree.create(None).expect("create");
        let c = tree.create(None).expect("create");

        let runs = Rc::new(Cell::new(0));
        let reaction = {
            let a = a.clone();
            let runs = runs.clone();
            autorun(move || {
                a.index().expect("known");
                runs.set(runs.get() + 1);
            })
        };
        assert_eq!(runs.get(), 1);

        // Moving c before b does not touch a, but the coarse policy
        // still reruns a's observer.
        tree.mov_before(c.id(), b.id()).expect("move");
        assert_eq!(runs.get(), 2);
        reaction.dispose();
    }

    #[test]
    fn one_subscription_across_tree_and_nodes() {
        let doc = Doc::new();
        let pool = Pool::new(&doc);
        let tree = pool.get(doc.tree("outline"));
        let node = tree.create(None).expect("create");
        assert!(!tree.is_observed());

        let watch_tree = {
            let tree = tree.clone();
            autorun(move || {
                tree.len();
            })
        };
        let watch_node = {
            let node = node.clone();
            autorun(move || {
                node.is_deleted().expect("known");
            })
        };
        assert!(tree.is_observed());

        watch_tree.dispose();
        assert!(tree.is_observed());
        watch_node.dispose();
        assert!(!tree.is_observed());
    }

    #[test]
    fn cycle_creating_move_propagates() {
        let doc = Doc::new();
        let pool = Pool::new(&doc);
        let tree = pool.get(doc.tree("outline"));

        let root = tree.create(None).expect("create");
        let child = root.create_child().expect("create");

        assert_eq!(root.mov(Some(child.id())), Err(DocError::WouldCycle));
    }
}

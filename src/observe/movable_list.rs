//! Reactive wrapper for movable list containers.

use std::cell::RefCell;
use std::rc::Rc;
use std::rc::Weak;

use crate::doc::ContainerId;
use crate::doc::ContainerKind;
use crate::doc::DocError;
use crate::doc::EventOrigin;
use crate::doc::MovableListRef;
use crate::doc::Subscription;
use crate::doc::Value;
use crate::reactive::Atom;
use crate::reactive::batch;

use super::LiveContainer;
use super::pool::ObservableValue;
use super::pool::Pool;
use super::pool::PoolInner;
use super::wire_hooks;

pub(crate) struct MovableListInner {
    handle: MovableListRef,
    pool: Weak<PoolInner>,
    atom: Atom,
    sub: RefCell<Option<Subscription>>,
}

impl LiveContainer for MovableListInner {
    fn atom(&self) -> &Atom {
        return &self.atom;
    }

    fn sub_slot(&self) -> &RefCell<Option<Subscription>> {
        return &self.sub;
    }

    fn pool(&self) -> &Weak<PoolInner> {
        return &self.pool;
    }

    fn subscribe_origin(&self, atom: Atom) -> Subscription {
        return self.handle.subscribe(move |event| {
            if event.origin == EventOrigin::Import {
                batch(|| atom.report_changed());
            }
        });
    }
}

/// A reactive movable list.
///
/// Extends the ordered-list surface with in-place replacement and
/// reordering. Moves shift indices on both sides of the move, so the
/// whole-container cell policy applies with even more force here.
#[derive(Clone)]
pub struct ObservableMovableList {
    inner: Rc<MovableListInner>,
}

impl ObservableMovableList {
    pub(crate) fn new(handle: MovableListRef, pool: &Rc<PoolInner>) -> ObservableMovableList {
        let inner = Rc::new(MovableListInner {
            handle,
            pool: Rc::downgrade(pool),
            atom: Atom::new(),
            sub: RefCell::new(None),
        });
        wire_hooks(&inner);
        return ObservableMovableList { inner };
    }

    /// The underlying container's identity.
    pub fn id(&self) -> &ContainerId {
        return self.inner.handle.id();
    }

    /// The raw container handle, bypassing observation.
    pub fn original(&self) -> &MovableListRef {
        return &self.inner.handle;
    }

    /// The pool this wrapper belongs to.
    pub fn pool(&self) -> Pool {
        let inner = self.inner.pool.upgrade().expect("wrapper outlived its pool");
        return Pool::from_inner(inner);
    }

    /// Insert a value at a position.
    pub fn insert(&self, pos: usize, value: impl Into<Value>) -> Result<(), DocError> {
        self.inner.handle.insert(pos, value)?;
        self.inner.atom.report_changed();
        return Ok(());
    }

    /// Append a value.
    pub fn push(&self, value: impl Into<Value>) {
        self.inner.handle.push(value);
        self.inner.atom.report_changed();
    }

    /// Create a nested container at a position, returning its wrapper.
    pub fn insert_container(
        &self,
        pos: usize,
        kind: ContainerKind,
    ) -> Result<ObservableValue, DocError> {
        let id = self.inner.handle.insert_container(pos, kind)?;
        self.inner.atom.report_changed();
        return Ok(self.pool().resolve_id(id));
    }

    /// Append a nested container, returning its wrapper.
    pub fn push_container(&self, kind: ContainerKind) -> ObservableValue {
        let id = self.inner.handle.push_container(kind);
        self.inner.atom.report_changed();
        return self.pool().resolve_id(id);
    }

    /// Replace the value at a position in place.
    pub fn set(&self, pos: usize, value: impl Into<Value>) -> Result<(), DocError> {
        self.inner.handle.set(pos, value)?;
        self.inner.atom.report_changed();
        return Ok(());
    }

    /// Move the element at `from` so it ends up at `to`.
    pub fn mov(&self, from: usize, to: usize) -> Result<(), DocError> {
        self.inner.handle.mov(from, to)?;
        self.inner.atom.report_changed();
        return Ok(());
    }

    /// Remove `len` elements starting at `pos`.
    pub fn delete(&self, pos: usize, len: usize) -> Result<(), DocError> {
        self.inner.handle.delete(pos, len)?;
        self.inner.atom.report_changed();
        return Ok(());
    }

    /// Get the value at a position, resolving nested containers to
    /// their pooled wrappers.
    pub fn get(&self, pos: usize) -> Option<ObservableValue> {
        self.inner.atom.report_observed();
        let value = self.inner.handle.get(pos)?;
        return Some(self.pool().get(value));
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.inner.atom.report_observed();
        return self.inner.handle.len();
    }

    /// Whether the list has no elements.
    pub fn is_empty(&self) -> bool {
        return self.len() == 0;
    }

    /// All elements in order, nested containers resolved.
    pub fn to_vec(&self) -> Vec<ObservableValue> {
        self.inner.atom.report_observed();
        let pool = self.pool();
        return self
            .inner
            .handle
            .to_vec()
            .into_iter()
            .map(|value| pool.get(value))
            .collect();
    }

    /// Whether at least one live tracked computation observes this list.
    pub fn is_observed(&self) -> bool {
        return self.inner.atom.is_observed();
    }

    pub(crate) fn detach(&self) {
        if let Some(sub) = self.inner.sub.borrow_mut().take() {
            sub.unsubscribe();
        }
    }
}

impl PartialEq for ObservableMovableList {
    fn eq(&self, other: &Self) -> bool {
        return Rc::ptr_eq(&self.inner, &other.inner);
    }
}

impl std::fmt::Debug for ObservableMovableList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        return write!(f, "ObservableMovableList({})", self.id());
    }
}

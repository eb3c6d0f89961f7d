//! Reactive wrapper for ordered list containers.

use std::cell::RefCell;
use std::rc::Rc;
use std::rc::Weak;

use crate::doc::ContainerId;
use crate::doc::ContainerKind;
use crate::doc::DocError;
use crate::doc::EventOrigin;
use crate::doc::ListRef;
use crate::doc::Subscription;
use crate::doc::Value;
use crate::reactive::Atom;
use crate::reactive::batch;

use super::LiveContainer;
use super::pool::ObservableValue;
use super::pool::Pool;
use super::pool::PoolInner;
use super::wire_hooks;

pub(crate) struct ListInner {
    handle: ListRef,
    pool: Weak<PoolInner>,
    atom: Atom,
    sub: RefCell<Option<Subscription>>,
}

impl LiveContainer for ListInner {
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

/// A reactive ordered list.
///
/// One change-tracking cell covers the whole list: positional indices
/// shift under inserts and deletes, so per-index cells would go stale.
/// Any mutation invalidates every reader of this list.
#[derive(Clone)]
pub struct ObservableList {
    inner: Rc<ListInner>,
}

impl ObservableList {
    pub(crate) fn new(handle: ListRef, pool: &Rc<PoolInner>) -> ObservableList {
        let inner = Rc::new(ListInner {
            handle,
            pool: Rc::downgrade(pool),
            atom: Atom::new(),
            sub: RefCell::new(None),
        });
        wire_hooks(&inner);
        return ObservableList { inner };
    }

    /// The underlying container's identity.
    pub fn id(&self) -> &ContainerId {
        return self.inner.handle.id();
    }

    /// The raw container handle, bypassing observation.
    pub fn original(&self) -> &ListRef {
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

impl PartialEq for ObservableList {
    fn eq(&self, other: &Self) -> bool {
        return Rc::ptr_eq(&self.inner, &other.inner);
    }
}

impl std::fmt::Debug for ObservableList {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        return write!(f, "ObservableList({})", self.id());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc::Doc;
    use crate::reactive::autorun;
    use std::cell::Cell;

    #[test]
    fn pushes_visible_in_same_turn() {
        let doc = Doc::new();
        let pool = Pool::new(&doc);
        let list = pool.get(doc.list("items"));

        list.push("a");
        list.push("b");
        assert_eq!(list.len(), 2);
        assert_eq!(
            list.get(1),
            Some(ObservableValue::Plain(Value::Str("b".to_string())))
        );
    }

    #[test]
    fn nested_container_keeps_identity() {
        let doc = Doc::new();
        let pool = Pool::new(&doc);
        let list = pool.get(doc.list("items"));

        let pushed = list.push_container(ContainerKind::Map);
        let fetched = list.get(0).expect("element present");
        assert_eq!(pushed, fetched);

        let from_vec = list.to_vec().pop().expect("one element");
        assert_eq!(pushed, from_vec);
    }

    #[test]
    fn out_of_bounds_insert_propagates() {
        let doc = Doc::new();
        let pool = Pool::new(&doc);
        let list = pool.get(doc.list("items"));

        assert_eq!(
            list.insert(3, 1),
            Err(DocError::IndexOutOfBounds { index: 3, len: 0 })
        );
    }

    #[test]
    fn delete_reruns_observers() {
        let doc = Doc::new();
        let pool = Pool::new(&doc);
        let list = pool.get(doc.list("items"));
        list.push(1);
        list.push(2);

        let runs = Rc::new(Cell::new(0));
        let reaction = {
            let list = list.clone();
            let runs = runs.clone();
            autorun(move || {
                list.len();
                runs.set(runs.get() + 1);
            })
        };
        assert_eq!(runs.get(), 1);

        list.delete(0, 1).expect("in bounds");
        assert_eq!(runs.get(), 2);
        assert_eq!(list.len(), 1);
        reaction.dispose();
    }
}

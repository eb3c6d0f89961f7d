//! Reactive wrapper for keyed map containers.

use std::cell::RefCell;
use std::rc::Rc;
use std::rc::Weak;

use crate::doc::ContainerId;
use crate::doc::ContainerKind;
use crate::doc::DocError;
use crate::doc::EventOrigin;
use crate::doc::MapRef;
use crate::doc::Subscription;
use crate::doc::Value;
use crate::reactive::Atom;
use crate::reactive::batch;

use super::LiveContainer;
use super::pool::ObservableValue;
use super::pool::Pool;
use super::pool::PoolInner;
use super::wire_hooks;

pub(crate) struct MapInner {
    handle: MapRef,
    pool: Weak<PoolInner>,
    atom: Atom,
    sub: RefCell<Option<Subscription>>,
}

impl LiveContainer for MapInner {
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

/// A reactive keyed map.
///
/// One change-tracking cell covers the whole map: keys are not stable
/// identities under concurrent edits, so per-key cells would go stale.
/// Any mutation invalidates every reader of this map.
///
/// Obtained from a [`Pool`]; cloning yields another handle on the same
/// wrapper, and equality is wrapper identity.
#[derive(Clone)]
pub struct ObservableMap {
    inner: Rc<MapInner>,
}

impl ObservableMap {
    pub(crate) fn new(handle: MapRef, pool: &Rc<PoolInner>) -> ObservableMap {
        let inner = Rc::new(MapInner {
            handle,
            pool: Rc::downgrade(pool),
            atom: Atom::new(),
            sub: RefCell::new(None),
        });
        wire_hooks(&inner);
        return ObservableMap { inner };
    }

    /// The underlying container's identity.
    pub fn id(&self) -> &ContainerId {
        return self.inner.handle.id();
    }

    /// The raw container handle, bypassing observation.
    pub fn original(&self) -> &MapRef {
        return &self.inner.handle;
    }

    /// The pool this wrapper belongs to.
    pub fn pool(&self) -> Pool {
        let inner = self.inner.pool.upgrade().expect("wrapper outlived its pool");
        return Pool::from_inner(inner);
    }

    /// Set a key to a value.
    pub fn insert(&self, key: &str, value: impl Into<Value>) {
        self.inner.handle.insert(key, value);
        self.inner.atom.report_changed();
    }

    /// Create a nested container under a key, returning its wrapper.
    pub fn insert_container(&self, key: &str, kind: ContainerKind) -> ObservableValue {
        let id = self.inner.handle.insert_container(key, kind);
        self.inner.atom.report_changed();
        return self.pool().resolve_id(id);
    }

    /// Remove a key. Fails if the key is not present.
    pub fn delete(&self, key: &str) -> Result<(), DocError> {
        self.inner.handle.delete(key)?;
        self.inner.atom.report_changed();
        return Ok(());
    }

    /// Get the value for a key, resolving nested containers to their
    /// pooled wrappers.
    pub fn get(&self, key: &str) -> Option<ObservableValue> {
        self.inner.atom.report_observed();
        let value = self.inner.handle.get(key)?;
        return Some(self.pool().get(value));
    }

    /// Whether a key is present.
    pub fn contains_key(&self, key: &str) -> bool {
        self.inner.atom.report_observed();
        return self.inner.handle.contains_key(key);
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.inner.atom.report_observed();
        return self.inner.handle.len();
    }

    /// Whether the map has no entries.
    pub fn is_empty(&self) -> bool {
        return self.len() == 0;
    }

    /// All keys, in unspecified order.
    pub fn keys(&self) -> Vec<String> {
        self.inner.atom.report_observed();
        return self.inner.handle.keys();
    }

    /// Whether at least one live tracked computation observes this map.
    pub fn is_observed(&self) -> bool {
        return self.inner.atom.is_observed();
    }

    pub(crate) fn detach(&self) {
        if let Some(sub) = self.inner.sub.borrow_mut().take() {
            sub.unsubscribe();
        }
    }
}

impl PartialEq for ObservableMap {
    fn eq(&self, other: &Self) -> bool {
        return Rc::ptr_eq(&self.inner, &other.inner);
    }
}

impl std::fmt::Debug for ObservableMap {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        return write!(f, "ObservableMap({})", self.id());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::doc::Doc;
    use crate::reactive::autorun;
    use std::cell::Cell;

    #[test]
    fn local_writes_visible_in_same_turn() {
        let doc = Doc::new();
        let pool = Pool::new(&doc);
        let map = pool.get(doc.map("a"));

        map.insert("x", 1);
        assert_eq!(map.get("x"), Some(ObservableValue::Plain(Value::Int(1))));
        assert_eq!(map.len(), 1);
    }

    #[test]
    fn subscription_tracks_observation_window() {
        let doc = Doc::new();
        let pool = Pool::new(&doc);
        let map = pool.get(doc.map("a"));
        assert!(!map.is_observed());

        let reaction = {
            let map = map.clone();
            autorun(move || {
                map.len();
            })
        };
        assert!(map.is_observed());

        reaction.dispose();
        assert!(!map.is_observed());
    }

    #[test]
    fn local_mutation_reruns_observers() {
        let doc = Doc::new();
        let pool = Pool::new(&doc);
        let map = pool.get(doc.map("a"));

        let runs = Rc::new(Cell::new(0));
        let reaction = {
            let map = map.clone();
            let runs = runs.clone();
            autorun(move || {
                map.len();
                runs.set(runs.get() + 1);
            })
        };
        assert_eq!(runs.get(), 1);

        map.insert("x", 1);
        assert_eq!(runs.get(), 2);
        reaction.dispose();
    }

    #[test]
    fn delete_missing_key_propagates() {
        let doc = Doc::new();
        let pool = Pool::new(&doc);
        let map = pool.get(doc.map("a"));

        assert_eq!(map.delete("ghost"), Err(DocError::KeyNotFound("ghost".to_string())));
    }
}

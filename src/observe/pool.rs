//! The wrapper pool and the kind resolver.
//!
//! One pool per document. The pool owns five registries, one per
//! container kind, keyed by container identity; a map and a tree may
//! legally share a name, so registries are never conflated. Wrappers
//! are created on first resolution and reused for every later request,
//! which is what makes wrapper reference equality meaningful.

use std::cell::Cell;
use std::cell::RefCell;
use std::rc::Rc;

use rustc_hash::FxHashMap;

use crate::doc::ContainerId;
use crate::doc::ContainerKind;
use crate::doc::Doc;
use crate::doc::ListRef;
use crate::doc::MapRef;
use crate::doc::MovableListRef;
use crate::doc::Subscription;
use crate::doc::TextRef;
use crate::doc::TreeRef;
use crate::doc::Value;

use super::list::ObservableList;
use super::map::ObservableMap;
use super::movable_list::ObservableMovableList;
use super::text::ObservableText;
use super::tree::ObservableTree;

// =============================================================================
// Pool
// =============================================================================

pub(crate) struct PoolInner {
    pub(crate) doc: Doc,
    maps: RefCell<FxHashMap<ContainerId, ObservableMap>>,
    lists: RefCell<FxHashMap<ContainerId, ObservableList>>,
    movable_lists: RefCell<FxHashMap<ContainerId, ObservableMovableList>>,
    texts: RefCell<FxHashMap<ContainerId, ObservableText>>,
    trees: RefCell<FxHashMap<ContainerId, ObservableTree>>,
    /// Document-level subscription, held for the pool's lifetime.
    /// Currently a no-op listener; reserved for document-wide cleanup.
    root_sub: RefCell<Option<Subscription>>,
    pub(crate) disposed: Cell<bool>,
}

/// The registry of reactive wrappers for one document.
///
/// Cloning yields another handle on the same pool.
#[derive(Clone)]
pub struct Pool {
    inner: Rc<PoolInner>,
}

impl Pool {
    /// Create a pool for a document.
    pub fn new(doc: &Doc) -> Pool {
        let root_sub = doc.subscribe_root(|_event| {});
        return Pool {
            inner: Rc::new(PoolInner {
                doc: doc.clone(),
                maps: RefCell::new(FxHashMap::default()),
                lists: RefCell::new(FxHashMap::default()),
                movable_lists: RefCell::new(FxHashMap::default()),
                texts: RefCell::new(FxHashMap::default()),
                trees: RefCell::new(FxHashMap::default()),
                root_sub: RefCell::new(Some(root_sub)),
                disposed: Cell::new(false),
            }),
        };
    }

    pub(crate) fn from_inner(inner: Rc<PoolInner>) -> Pool {
        return Pool { inner };
    }

    /// The document this pool wraps.
    pub fn doc(&self) -> &Doc {
        return &self.inner.doc;
    }

    /// Whether two handles refer to the same pool.
    pub fn same_pool(&self, other: &Pool) -> bool {
        return Rc::ptr_eq(&self.inner, &other.inner);
    }

    /// Resolve a value or container handle to its wrapper.
    ///
    /// Container handles resolve to the cached wrapper for their
    /// identity, creating it on first access. Plain values pass through
    /// unchanged. Idempotent: resolving the same identity twice returns
    /// the identical wrapper.
    pub fn get<T: Resolve>(&self, value: T) -> T::Observed {
        return value.resolve(self);
    }

    /// Whether a wrapper is currently cached for this identity.
    pub fn has(&self, id: &ContainerId) -> bool {
        match id.kind {
            ContainerKind::Map => return self.inner.maps.borrow().contains_key(id),
            ContainerKind::List => return self.inner.lists.borrow().contains_key(id),
            ContainerKind::MovableList => {
                return self.inner.movable_lists.borrow().contains_key(id);
            }
            ContainerKind::Text => return self.inner.texts.borrow().contains_key(id),
            ContainerKind::Tree => return self.inner.trees.borrow().contains_key(id),
        }
    }

    /// Number of cached wrappers of one kind.
    pub fn size_of(&self, kind: ContainerKind) -> usize {
        match kind {
            ContainerKind::Map => return self.inner.maps.borrow().len(),
            ContainerKind::List => return self.inner.lists.borrow().len(),
            ContainerKind::MovableList => return self.inner.movable_lists.borrow().len(),
            ContainerKind::Text => return self.inner.texts.borrow().len(),
            ContainerKind::Tree => return self.inner.trees.borrow().len(),
        }
    }

    /// Total number of cached wrappers across every kind.
    pub fn size(&self) -> usize {
        return self.inner.maps.borrow().len()
            + self.inner.lists.borrow().len()
            + self.inner.movable_lists.borrow().len()
            + self.inner.texts.borrow().len()
            + self.inner.trees.borrow().len();
    }

    /// Drop one cached wrapper.
    ///
    /// A later `get` for the same identity creates a fresh wrapper,
    /// deliberately breaking identity stability for that container.
    pub fn clear_instance(&self, id: &ContainerId) {
        match id.kind {
            ContainerKind::Map => {
                self.inner.maps.borrow_mut().remove(id);
            }
            ContainerKind::List => {
                self.inner.lists.borrow_mut().remove(id);
            }
            ContainerKind::MovableList => {
                self.inner.movable_lists.borrow_mut().remove(id);
            }
            ContainerKind::Text => {
                self.inner.texts.borrow_mut().remove(id);
            }
            ContainerKind::Tree => {
                self.inner.trees.borrow_mut().remove(id);
            }
        }
    }

    /// Empty every registry.
    pub fn clear_all(&self) {
        self.inner.maps.borrow_mut().clear();
        self.inner.lists.borrow_mut().clear();
        self.inner.movable_lists.borrow_mut().clear();
        self.inner.texts.borrow_mut().clear();
        self.inner.trees.borrow_mut().clear();
    }

    /// Tear the pool down: detach every wrapper's subscription, drop
    /// the document-level subscription, and empty the registries.
    ///
    /// Idempotent. Wrappers that outlive disposal keep answering reads
    /// from the document but no longer attach subscriptions.
    pub fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        if let Some(sub) = self.inner.root_sub.borrow_mut().take() {
            sub.unsubscribe();
        }
        for wrapper in self.inner.maps.borrow().values() {
            wrapper.detach();
        }
        for wrapper in self.inner.lists.borrow().values() {
            wrapper.detach();
        }
        for wrapper in self.inner.movable_lists.borrow().values() {
            wrapper.detach();
        }
        for wrapper in self.inner.texts.borrow().values() {
            wrapper.detach();
        }
        for wrapper in self.inner.trees.borrow().values() {
            wrapper.detach();
        }
        self.clear_all();
    }

    /// Whether the pool has been disposed.
    pub fn is_disposed(&self) -> bool {
        return self.inner.disposed.get();
    }

    // =========================================================================
    // Kind-specific registries
    // =========================================================================

    pub(crate) fn map_wrapper(&self, handle: MapRef) -> ObservableMap {
        debug_assert!(handle.doc().same_doc(&self.inner.doc));
        if let Some(cached) = self.inner.maps.borrow().get(handle.id()) {
            return cached.clone();
        }
        let wrapper = ObservableMap::new(handle, &self.inner);
        self.inner
            .maps
            .borrow_mut()
            .insert(wrapper.id().clone(), wrapper.clone());
        return wrapper;
    }

    pub(crate) fn list_wrapper(&self, handle: ListRef) -> ObservableList {
        debug_assert!(handle.doc().same_doc(&self.inner.doc));
        if let Some(cached) = self.inner.lists.borrow().get(handle.id()) {
            return cached.clone();
        }
        let wrapper = ObservableList::new(handle, &self.inner);
        self.inner
            .lists
            .borrow_mut()
            .insert(wrapper.id().clone(), wrapper.clone());
        return wrapper;
    }

    pub(crate) fn movable_list_wrapper(&self, handle: MovableListRef) -> ObservableMovableList {
        debug_assert!(handle.doc().same_doc(&self.inner.doc));
        if let Some(cached) = self.inner.movable_lists.borrow().get(handle.id()) {
            return cached.clone();
        }
        let wrapper = ObservableMovableList::new(handle, &self.inner);
        self.inner
            .movable_lists
            .borrow_mut()
            .insert(wrapper.id().clone(), wrapper.clone());
        return wrapper;
    }

    pub(crate) fn text_wrapper(&self, handle: TextRef) -> ObservableText {
        debug_assert!(handle.doc().same_doc(&self.inner.doc));
        if let Some(cached) = self.inner.texts.borrow().get(handle.id()) {
            return cached.clone();
        }
        let wrapper = ObservableText::new(handle, &self.inner);
        self.inner
            .texts
            .borrow_mut()
            .insert(wrapper.id().clone(), wrapper.clone());
        return wrapper;
    }

    pub(crate) fn tree_wrapper(&self, handle: TreeRef) -> ObservableTree {
        debug_assert!(handle.doc().same_doc(&self.inner.doc));
        if let Some(cached) = self.inner.trees.borrow().get(handle.id()) {
            return cached.clone();
        }
        let wrapper = ObservableTree::new(handle, &self.inner);
        self.inner
            .trees
            .borrow_mut()
            .insert(wrapper.id().clone(), wrapper.clone());
        return wrapper;
    }

    /// Resolve a container identity to its wrapper.
    ///
    /// The kind match is exhaustive over the closed set of container
    /// kinds, so an unknown kind is unrepresentable here.
    pub(crate) fn resolve_id(&self, id: ContainerId) -> ObservableValue {
        match id.kind {
            ContainerKind::Map => {
                return ObservableValue::Map(self.map_wrapper(self.inner.doc.map_at(id)));
            }
            ContainerKind::List => {
                return ObservableValue::List(self.list_wrapper(self.inner.doc.list_at(id)));
            }
            ContainerKind::MovableList => {
                return ObservableValue::MovableList(
                    self.movable_list_wrapper(self.inner.doc.movable_list_at(id)),
                );
            }
            ContainerKind::Text => {
                return ObservableValue::Text(self.text_wrapper(self.inner.doc.text_at(id)));
            }
            ContainerKind::Tree => {
                return ObservableValue::Tree(self.tree_wrapper(self.inner.doc.tree_at(id)));
            }
        }
    }
}

// =============================================================================
// Resolver
// =============================================================================

/// Types the pool can resolve to a wrapper.
///
/// Container handles resolve to their kind's wrapper; a [`Value`]
/// resolves to an [`ObservableValue`], passing plain data through
/// unchanged.
pub trait Resolve {
    /// The wrapper (or pass-through) type this resolves to.
    type Observed;

    /// Resolve through the pool's registries.
    fn resolve(self, pool: &Pool) -> Self::Observed;
}

impl Resolve for MapRef {
    type Observed = ObservableMap;

    fn resolve(self, pool: &Pool) -> ObservableMap {
        return pool.map_wrapper(self);
    }
}

impl Resolve for ListRef {
    type Observed = ObservableList;

    fn resolve(self, pool: &Pool) -> ObservableList {
        return pool.list_wrapper(self);
    }
}

impl Resolve for MovableListRef {
    type Observed = ObservableMovableList;

    fn resolve(self, pool: &Pool) -> ObservableMovableList {
        return pool.movable_list_wrapper(self);
    }
}

impl Resolve for TextRef {
    type Observed = ObservableText;

    fn resolve(self, pool: &Pool) -> ObservableText {
        return pool.text_wrapper(self);
    }
}

impl Resolve for TreeRef {
    type Observed = ObservableTree;

    fn resolve(self, pool: &Pool) -> ObservableTree {
        return pool.tree_wrapper(self);
    }
}

impl Resolve for Value {
    type Observed = ObservableValue;

    fn resolve(self, pool: &Pool) -> ObservableValue {
        match self {
            Value::Container(id) => return pool.resolve_id(id),
            other => return ObservableValue::Plain(other),
        }
    }
}

// =============================================================================
// ObservableValue
// =============================================================================

/// A resolved value: either plain data passed through unchanged, or the
/// pooled wrapper for a nested container.
///
/// Wrapper variants compare by identity, so two resolutions of the same
/// container are equal.
#[derive(Clone, Debug, PartialEq)]
pub enum ObservableValue {
    /// A non-container value, passed through as-is.
    Plain(Value),
    /// A nested keyed map.
    Map(ObservableMap),
    /// A nested ordered list.
    List(ObservableList),
    /// A nested movable list.
    MovableList(ObservableMovableList),
    /// A nested text sequence.
    Text(ObservableText),
    /// A nested tree.
    Tree(ObservableTree),
}

impl ObservableValue {
    /// The plain value, if this is not a container.
    pub fn as_plain(&self) -> Option<&Value> {
        match self {
            ObservableValue::Plain(value) => return Some(value),
            _ => return None,
        }
    }

    /// The map wrapper, if this is a map.
    pub fn as_map(&self) -> Option<&ObservableMap> {
        match self {
            ObservableValue::Map(map) => return Some(map),
            _ => return None,
        }
    }

    /// The list wrapper, if this is a list.
    pub fn as_list(&self) -> Option<&ObservableList> {
        match self {
            ObservableValue::List(list) => return Some(list),
            _ => return None,
        }
    }

    /// The movable-list wrapper, if this is a movable list.
    pub fn as_movable_list(&self) -> Option<&ObservableMovableList> {
        match self {
            ObservableValue::MovableList(list) => return Some(list),
            _ => return None,
        }
    }

    /// The text wrapper, if this is a text sequence.
    pub fn as_text(&self) -> Option<&ObservableText> {
        match self {
            ObservableValue::Text(text) => return Some(text),
            _ => return None,
        }
    }

    /// The tree wrapper, if this is a tree.
    pub fn as_tree(&self) -> Option<&ObservableTree> {
        match self {
            ObservableValue::Tree(tree) => return Some(tree),
            _ => return None,
        }
    }

    /// Whether this resolved to a container wrapper.
    pub fn is_container(&self) -> bool {
        return !matches!(self, ObservableValue::Plain(_));
    }
}

//! The collaborative document: container handles, subscriptions, and
//! cross-replica sync.
//!
//! A `Doc` owns an update log plus the materialized state of every
//! container that has been written to. Container handles (`MapRef`,
//! `ListRef`, `MovableListRef`, `TextRef`, `TreeRef`) are cheap clones
//! that delegate to the shared document.
//!
//! # Sync model
//!
//! `export()` serializes the full update log; `import()` merges a peer's
//! update by deduplicating already-seen operations and rebuilding the
//! state of every affected container from its operations in canonical
//! `(lamport, peer, counter)` order. Local operations always carry a
//! Lamport timestamp greater than anything seen so far, so applying them
//! incrementally is equivalent to a full replay.
//!
//! # Events
//!
//! Every mutation produces one event per affected container, tagged with
//! an origin (`Local` for mutations made through this document's own
//! handles, `Import` for merged remote updates). Events are dispatched
//! after the document's internal borrow is released, so a callback may
//! freely read the document or manage subscriptions.

use std::cell::Cell;
use std::cell::RefCell;
use std::rc::Rc;
use std::rc::Weak;

use rustc_hash::FxHashMap;
use rustc_hash::FxHashSet;

use super::error::DocError;
use super::id::ContainerId;
use super::id::ContainerKind;
use super::id::ElemId;
use super::id::LamportClock;
use super::id::OpId;
use super::id::PeerId;
use super::id::TreeNodeId;
use super::op::Op;
use super::op::Payload;
use super::op::sort_canonical;
use super::state::MapState;
use super::state::SeqState;
use super::state::TreeState;
use super::value::Value;

// =============================================================================
// Events and subscriptions
// =============================================================================

/// Where a change came from.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EventOrigin {
    /// The change was made through this document's own handles.
    Local,
    /// The change arrived in an imported update.
    Import,
}

/// A change notification for one container.
#[derive(Clone, Debug)]
pub struct DocEvent {
    /// The container that changed.
    pub container: ContainerId,
    /// Where the change came from.
    pub origin: EventOrigin,
}

type Callback = Rc<dyn Fn(&DocEvent)>;

/// A handle on a registered change callback.
///
/// Unsubscribing is idempotent: calling it on an already-torn-down
/// subscription (or after the document is gone) is a no-op. Dropping the
/// handle unsubscribes.
pub struct Subscription {
    doc: Weak<RefCell<DocInner>>,
    target: Option<ContainerId>,
    id: u64,
    active: Cell<bool>,
}

impl Subscription {
    /// Remove the callback. Safe to call more than once.
    pub fn unsubscribe(&self) {
        if !self.active.replace(false) {
            return;
        }
        let inner = match self.doc.upgrade() {
            Some(inner) => inner,
            None => return,
        };
        let mut inner = inner.borrow_mut();
        match &self.target {
            Some(container) => {
                if let Some(subs) = inner.subs.get_mut(container) {
                    subs.retain(|(id, _)| *id != self.id);
                }
            }
            None => {
                inner.doc_subs.retain(|(id, _)| *id != self.id);
            }
        }
    }

    /// Whether the callback is still registered.
    pub fn is_active(&self) -> bool {
        return self.active.get();
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.unsubscribe();
    }
}

// =============================================================================
// Document internals
// =============================================================================

struct DocInner {
    peer: PeerId,
    clock: LamportClock,
    next_counter: u64,
    ops: Vec<Op>,
    seen: FxHashSet<OpId>,
    maps: FxHashMap<ContainerId, MapState>,
    seqs: FxHashMap<ContainerId, SeqState<Value>>,
    texts: FxHashMap<ContainerId, SeqState<char>>,
    trees: FxHashMap<ContainerId, TreeState>,
    subs: FxHashMap<ContainerId, Vec<(u64, Callback)>>,
    doc_subs: Vec<(u64, Callback)>,
    next_sub: u64,
}

impl DocInner {
    fn new(peer: PeerId) -> DocInner {
        return DocInner {
            peer,
            clock: LamportClock::new(),
            next_counter: 0,
            ops: Vec::new(),
            seen: FxHashSet::default(),
            maps: FxHashMap::default(),
            seqs: FxHashMap::default(),
            texts: FxHashMap::default(),
            trees: FxHashMap::default(),
            subs: FxHashMap::default(),
            doc_subs: Vec::new(),
            next_sub: 0,
        };
    }

    /// Derived element ids for a multi-element operation.
    fn elem_ids(op_id: OpId, count: usize) -> impl Iterator<Item = ElemId> {
        return (0..count as u64).map(move |k| ElemId(OpId::new(op_id.peer, op_id.counter + k)));
    }

    /// Fold one operation into the affected container's state.
    fn apply_op(&mut self, op: &Op) {
        let container = &op.container;
        match &op.payload {
            Payload::MapSet { key, value } => {
                self.maps
                    .entry(container.clone())
                    .or_insert_with(MapState::new)
                    .apply_set(key, value.clone());
            }
            Payload::MapDelete { key } => {
                self.maps
                    .entry(container.clone())
                    .or_insert_with(MapState::new)
                    .apply_delete(key);
            }
            Payload::SeqInsert { origin, values } => {
                let items: Vec<(ElemId, Value)> = Self::elem_ids(op.id, values.len())
                    .zip(values.iter().cloned())
                    .collect();
                self.seqs
                    .entry(container.clone())
                    .or_insert_with(SeqState::new)
                    .apply_insert(*origin, items);
            }
            Payload::SeqDelete { targets } => {
                self.seqs
                    .entry(container.clone())
                    .or_insert_with(SeqState::new)
                    .apply_delete(targets);
            }
            Payload::SeqSet { target, value } => {
                self.seqs
                    .entry(container.clone())
                    .or_insert_with(SeqState::new)
                    .apply_set(*target, value.clone());
            }
            Payload::SeqMove { target, origin } => {
                self.seqs
                    .entry(container.clone())
                    .or_insert_with(SeqState::new)
                    .apply_move(*target, *origin);
            }
            Payload::TextInsert { origin, content } => {
                let chars: Vec<char> = content.chars().collect();
                let items: Vec<(ElemId, char)> = Self::elem_ids(op.id, chars.len())
                    .zip(chars)
                    .collect();
                self.texts
                    .entry(container.clone())
                    .or_insert_with(SeqState::new)
                    .apply_insert(*origin, items);
            }
            Payload::TreeCreate { node, parent } => {
                self.trees
                    .entry(container.clone())
                    .or_insert_with(TreeState::new)
                    .apply_create(*node, *parent);
            }
            Payload::TreeMove { node, parent, after } => {
                self.trees
                    .entry(container.clone())
                    .or_insert_with(TreeState::new)
                    .apply_move(*node, *parent, *after);
            }
            Payload::TreeDelete { node } => {
                self.trees
                    .entry(container.clone())
                    .or_insert_with(TreeState::new)
                    .apply_delete(*node);
            }
        }
    }

    /// Rebuild one container's state from scratch by canonical replay.
    fn rebuild(&mut self, container: &ContainerId) {
        match container.kind {
            ContainerKind::Map => {
                self.maps.remove(container);
            }
            ContainerKind::List | ContainerKind::MovableList => {
                self.seqs.remove(container);
            }
            ContainerKind::Text => {
                self.texts.remove(container);
            }
            ContainerKind::Tree => {
                self.trees.remove(container);
            }
        }
        let mut ops: Vec<Op> = self
            .ops
            .iter()
            .filter(|op| op.container == *container)
            .cloned()
            .collect();
        sort_canonical(&mut ops);
        for op in &ops {
            self.apply_op(op);
        }
    }

    /// The callbacks interested in an event on `container`.
    fn listeners_for(&self, container: &ContainerId) -> Vec<Callback> {
        let mut listeners: Vec<Callback> = Vec::new();
        if let Some(subs) = self.subs.get(container) {
            listeners.extend(subs.iter().map(|(_, cb)| cb.clone()));
        }
        listeners.extend(self.doc_subs.iter().map(|(_, cb)| cb.clone()));
        return listeners;
    }
}

// =============================================================================
// Doc
// =============================================================================

/// A collaborative document.
///
/// Cloning a `Doc` produces another handle on the same document.
#[derive(Clone)]
pub struct Doc {
    inner: Rc<RefCell<DocInner>>,
}

impl Default for Doc {
    fn default() -> Self {
        return Self::new();
    }
}

impl Doc {
    /// Create a document with a random peer id.
    pub fn new() -> Doc {
        return Doc::with_peer(PeerId::random());
    }

    /// Create a document with an explicit peer id (useful in tests).
    pub fn with_peer(peer: PeerId) -> Doc {
        return Doc {
            inner: Rc::new(RefCell::new(DocInner::new(peer))),
        };
    }

    /// This replica's peer id.
    pub fn peer(&self) -> PeerId {
        return self.inner.borrow().peer;
    }

    /// Whether two handles refer to the same document.
    pub fn same_doc(&self, other: &Doc) -> bool {
        return Rc::ptr_eq(&self.inner, &other.inner);
    }

    /// The root map container with the given name.
    pub fn map(&self, name: &str) -> MapRef {
        return self.map_at(ContainerId::root(ContainerKind::Map, name));
    }

    /// The root list container with the given name.
    pub fn list(&self, name: &str) -> ListRef {
        return self.list_at(ContainerId::root(ContainerKind::List, name));
    }

    /// The root movable list container with the given name.
    pub fn movable_list(&self, name: &str) -> MovableListRef {
        return self.movable_list_at(ContainerId::root(ContainerKind::MovableList, name));
    }

    /// The root text container with the given name.
    pub fn text(&self, name: &str) -> TextRef {
        return self.text_at(ContainerId::root(ContainerKind::Text, name));
    }

    /// The root tree container with the given name.
    pub fn tree(&self, name: &str) -> TreeRef {
        return self.tree_at(ContainerId::root(ContainerKind::Tree, name));
    }

    pub(crate) fn map_at(&self, id: ContainerId) -> MapRef {
        debug_assert_eq!(id.kind, ContainerKind::Map);
        return MapRef { doc: self.clone(), id };
    }

    pub(crate) fn list_at(&self, id: ContainerId) -> ListRef {
        debug_assert_eq!(id.kind, ContainerKind::List);
        return ListRef { doc: self.clone(), id };
    }

    pub(crate) fn movable_list_at(&self, id: ContainerId) -> MovableListRef {
        debug_assert_eq!(id.kind, ContainerKind::MovableList);
        return MovableListRef { doc: self.clone(), id };
    }

    pub(crate) fn text_at(&self, id: ContainerId) -> TextRef {
        debug_assert_eq!(id.kind, ContainerKind::Text);
        return TextRef { doc: self.clone(), id };
    }

    pub(crate) fn tree_at(&self, id: ContainerId) -> TreeRef {
        debug_assert_eq!(id.kind, ContainerKind::Tree);
        return TreeRef { doc: self.clone(), id };
    }

    /// Subscribe to every change event in the document.
    pub fn subscribe_root(&self, callback: impl Fn(&DocEvent) + 'static) -> Subscription {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_sub;
        inner.next_sub += 1;
        inner.doc_subs.push((id, Rc::new(callback)));
        return Subscription {
            doc: Rc::downgrade(&self.inner),
            target: None,
            id,
            active: Cell::new(true),
        };
    }

    fn subscribe_container(
        &self,
        container: ContainerId,
        callback: impl Fn(&DocEvent) + 'static,
    ) -> Subscription {
        let mut inner = self.inner.borrow_mut();
        let id = inner.next_sub;
        inner.next_sub += 1;
        inner
            .subs
            .entry(container.clone())
            .or_default()
            .push((id, Rc::new(callback)));
        return Subscription {
            doc: Rc::downgrade(&self.inner),
            target: Some(container),
            id,
            active: Cell::new(true),
        };
    }

    /// Record a local operation, apply it, and notify subscribers.
    ///
    /// The payload is built from the assigned operation id so that
    /// operations which create identities (nested containers, tree
    /// nodes) can derive them from their own id.
    fn commit_with(&self, container: ContainerId, make: impl FnOnce(OpId) -> Payload) -> OpId {
        let (op_id, event, listeners) = {
            let mut inner = self.inner.borrow_mut();
            let lamport = inner.clock.tick();
            let op_id = OpId::new(inner.peer, inner.next_counter);
            let op = Op {
                id: op_id,
                lamport,
                container: container.clone(),
                payload: make(op_id),
            };
            inner.next_counter += op.span();
            inner.seen.insert(op_id);
            inner.apply_op(&op);
            inner.ops.push(op);
            let event = DocEvent { container, origin: EventOrigin::Local };
            let listeners = inner.listeners_for(&event.container);
            (op_id, event, listeners)
        };
        // The borrow is released: callbacks may read and resubscribe
        for listener in listeners {
            listener(&event);
        }
        return op_id;
    }

    fn commit(&self, container: ContainerId, payload: Payload) -> OpId {
        return self.commit_with(container, |_| payload);
    }

    /// Serialize the full update log.
    pub fn export(&self) -> Vec<u8> {
        let mut ops = self.inner.borrow().ops.clone();
        sort_canonical(&mut ops);
        return serde_json::to_vec(&ops).expect("op log serializes");
    }

    /// Merge an exported update from another replica.
    ///
    /// Already-seen operations are skipped, so importing the same update
    /// twice (or in any order) is idempotent. Every container touched by
    /// a fresh operation is rebuilt by canonical replay and produces one
    /// `Import`-tagged event.
    pub fn import(&self, bytes: &[u8]) -> Result<(), DocError> {
        let update: Vec<Op> =
            serde_json::from_slice(bytes).map_err(|e| DocError::DecodeFailed(e.to_string()))?;

        let batches = {
            let mut inner = self.inner.borrow_mut();
            let fresh: Vec<Op> = update
                .into_iter()
                .filter(|op| !inner.seen.contains(&op.id))
                .collect();
            if fresh.is_empty() {
                return Ok(());
            }

            let mut affected: Vec<ContainerId> = Vec::new();
            for op in &fresh {
                inner.seen.insert(op.id);
                inner.clock.observe(op.lamport);
                if op.id.peer == inner.peer {
                    // Re-import of our own history: keep the counter ahead
                    let end = op.id.counter + op.span();
                    inner.next_counter = inner.next_counter.max(end);
                }
                if !affected.contains(&op.container) {
                    affected.push(op.container.clone());
                }
            }
            inner.ops.extend(fresh);
            for container in &affected {
                inner.rebuild(container);
            }

            let mut batches = Vec::new();
            for container in affected {
                let event = DocEvent { container, origin: EventOrigin::Import };
                let listeners = inner.listeners_for(&event.container);
                batches.push((event, listeners));
            }
            batches
        };
        for (event, listeners) in batches {
            for listener in listeners {
                listener(&event);
            }
        }
        return Ok(());
    }
}

// =============================================================================
// Sequence helpers shared by list, movable list, and text
// =============================================================================

/// Origin element for an insert at visible position `pos`, plus a bounds
/// check against the current visible length.
fn seq_insert_origin<T: Clone>(
    state: Option<&SeqState<T>>,
    pos: usize,
) -> Result<Option<ElemId>, DocError> {
    let len = state.map(|s| s.len()).unwrap_or(0);
    if pos > len {
        return Err(DocError::IndexOutOfBounds { index: pos, len });
    }
    if pos == 0 {
        return Ok(None);
    }
    let state = state.expect("non-zero position implies existing state");
    return Ok(state.id_at(pos - 1));
}

/// Target ids for a delete of `len` visible elements starting at `pos`.
fn seq_delete_targets<T: Clone>(
    state: Option<&SeqState<T>>,
    pos: usize,
    len: usize,
) -> Result<Vec<ElemId>, DocError> {
    let visible = state.map(|s| s.len()).unwrap_or(0);
    let end = pos
        .checked_add(len)
        .ok_or(DocError::IndexOutOfBounds { index: pos, len: visible })?;
    if end > visible {
        return Err(DocError::IndexOutOfBounds { index: end, len: visible });
    }
    if len == 0 {
        return Ok(Vec::new());
    }
    let state = state.expect("non-empty delete implies existing state");
    return Ok(state.ids_in_range(pos, len));
}

// =============================================================================
// MapRef
// =============================================================================

/// A handle on a keyed map container.
#[derive(Clone)]
pub struct MapRef {
    doc: Doc,
    id: ContainerId,
}

impl MapRef {
    /// The container's identity.
    pub fn id(&self) -> &ContainerId {
        return &self.id;
    }

    /// The document this container belongs to.
    pub fn doc(&self) -> &Doc {
        return &self.doc;
    }

    /// Set a key to a value.
    pub fn insert(&self, key: &str, value: impl Into<Value>) {
        self.doc.commit(
            self.id.clone(),
            Payload::MapSet { key: key.to_string(), value: value.into() },
        );
    }

    /// Create a nested container under a key, returning its identity.
    pub fn insert_container(&self, key: &str, kind: ContainerKind) -> ContainerId {
        let key = key.to_string();
        let mut nested = None;
        self.doc.commit_with(self.id.clone(), |op| {
            let id = ContainerId::nested(kind, op);
            nested = Some(id.clone());
            return Payload::MapSet { key, value: Value::Container(id) };
        });
        return nested.expect("commit runs the payload constructor");
    }

    /// Remove a key. Fails if the key is not present.
    pub fn delete(&self, key: &str) -> Result<(), DocError> {
        {
            let inner = self.doc.inner.borrow();
            let present = inner
                .maps
                .get(&self.id)
                .map(|m| m.contains_key(key))
                .unwrap_or(false);
            if !present {
                return Err(DocError::KeyNotFound(key.to_string()));
            }
        }
        self.doc.commit(self.id.clone(), Payload::MapDelete { key: key.to_string() });
        return Ok(());
    }

    /// Get the value for a key.
    pub fn get(&self, key: &str) -> Option<Value> {
        let inner = self.doc.inner.borrow();
        return inner.maps.get(&self.id).and_then(|m| m.get(key).cloned());
    }

    /// Whether a key is present.
    pub fn contains_key(&self, key: &str) -> bool {
        let inner = self.doc.inner.borrow();
        return inner
            .maps
            .get(&self.id)
            .map(|m| m.contains_key(key))
            .unwrap_or(false);
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        let inner = self.doc.inner.borrow();
        return inner.maps.get(&self.id).map(|m| m.len()).unwrap_or(0);
    }

    /// Whether the map has no entries.
    pub fn is_empty(&self) -> bool {
        return self.len() == 0;
    }

    /// All keys, in unspecified order.
    pub fn keys(&self) -> Vec<String> {
        let inner = self.doc.inner.borrow();
        return inner
            .maps
            .get(&self.id)
            .map(|m| m.keys().cloned().collect())
            .unwrap_or_default();
    }

    /// Subscribe to change events for this container.
    pub fn subscribe(&self, callback: impl Fn(&DocEvent) + 'static) -> Subscription {
        return self.doc.subscribe_container(self.id.clone(), callback);
    }
}

// =============================================================================
// ListRef
// =============================================================================

/// A handle on an ordered list container.
#[derive(Clone)]
pub struct ListRef {
    doc: Doc,
    id: ContainerId,
}

impl ListRef {
    /// The container's identity.
    pub fn id(&self) -> &ContainerId {
        return &self.id;
    }

    /// The document this container belongs to.
    pub fn doc(&self) -> &Doc {
        return &self.doc;
    }

    /// Insert a value at a visible position.
    pub fn insert(&self, pos: usize, value: impl Into<Value>) -> Result<(), DocError> {
        let origin = {
            let inner = self.doc.inner.borrow();
            seq_insert_origin(inner.seqs.get(&self.id), pos)?
        };
        self.doc.commit(
            self.id.clone(),
            Payload::SeqInsert { origin, values: vec![value.into()] },
        );
        return Ok(());
    }

    /// Append a value.
    pub fn push(&self, value: impl Into<Value>) {
        let len = self.len();
        self.insert(len, value).expect("append is always in bounds");
    }

    /// Create a nested container at a visible position, returning its identity.
    pub fn insert_container(&self, pos: usize, kind: ContainerKind) -> Result<ContainerId, DocError> {
        let origin = {
            let inner = self.doc.inner.borrow();
            seq_insert_origin(inner.seqs.get(&self.id), pos)?
        };
        let mut nested = None;
        self.doc.commit_with(self.id.clone(), |op| {
            let id = ContainerId::nested(kind, op);
            nested = Some(id.clone());
            return Payload::SeqInsert { origin, values: vec![Value::Container(id)] };
        });
        return Ok(nested.expect("commit runs the payload constructor"));
    }

    /// Create a nested container at the end, returning its identity.
    pub fn push_container(&self, kind: ContainerKind) -> ContainerId {
        let len = self.len();
        return self
            .insert_container(len, kind)
            .expect("append is always in bounds");
    }

    /// Delete `len` elements starting at a visible position.
    pub fn delete(&self, pos: usize, len: usize) -> Result<(), DocError> {
        let targets = {
            let inner = self.doc.inner.borrow();
            seq_delete_targets(inner.seqs.get(&self.id), pos, len)?
        };
        if targets.is_empty() {
            return Ok(());
        }
        self.doc.commit(self.id.clone(), Payload::SeqDelete { targets });
        return Ok(());
    }

    /// The value at a visible position.
    pub fn get(&self, pos: usize) -> Option<Value> {
        let inner = self.doc.inner.borrow();
        return inner.seqs.get(&self.id).and_then(|s| s.get(pos).cloned());
    }

    /// Number of visible elements.
    pub fn len(&self) -> usize {
        let inner = self.doc.inner.borrow();
        return inner.seqs.get(&self.id).map(|s| s.len()).unwrap_or(0);
    }

    /// Whether the list has no visible elements.
    pub fn is_empty(&self) -> bool {
        return self.len() == 0;
    }

    /// All visible values, in order.
    pub fn to_vec(&self) -> Vec<Value> {
        let inner = self.doc.inner.borrow();
        return inner.seqs.get(&self.id).map(|s| s.to_vec()).unwrap_or_default();
    }

    /// Subscribe to change events for this container.
    pub fn subscribe(&self, callback: impl Fn(&DocEvent) + 'static) -> Subscription {
        return self.doc.subscribe_container(self.id.clone(), callback);
    }
}

// =============================================================================
// MovableListRef
// =============================================================================

/// A handle on an ordered list whose elements can be replaced in place
/// and reordered without losing their identity.
#[derive(Clone)]
pub struct MovableListRef {
    doc: Doc,
    id: ContainerId,
}

impl MovableListRef {
    /// The container's identity.
    pub fn id(&self) -> &ContainerId {
        return &self.id;
    }

    /// The document this container belongs to.
    pub fn doc(&self) -> &Doc {
        return &self.doc;
    }

    /// Insert a value at a visible position.
    pub fn insert(&self, pos: usize, value: impl Into<Value>) -> Result<(), DocError> {
        let origin = {
            let inner = self.doc.inner.borrow();
            seq_insert_origin(inner.seqs.get(&self.id), pos)?
        };
        self.doc.commit(
            self.id.clone(),
            Payload::SeqInsert { origin, values: vec![value.into()] },
        );
        return Ok(());
    }

    /// Append a value.
    pub fn push(&self, value: impl Into<Value>) {
        let len = self.len();
        self.insert(len, value).expect("append is always in bounds");
    }

    /// Create a nested container at a visible position, returning its identity.
    pub fn insert_container(&self, pos: usize, kind: ContainerKind) -> Result<ContainerId, DocError> {
        let origin = {
            let inner = self.doc.inner.borrow();
            seq_insert_origin(inner.seqs.get(&self.id), pos)?
        };
        let mut nested = None;
        self.doc.commit_with(self.id.clone(), |op| {
            let id = ContainerId::nested(kind, op);
            nested = Some(id.clone());
            return Payload::SeqInsert { origin, values: vec![Value::Container(id)] };
        });
        return Ok(nested.expect("commit runs the payload constructor"));
    }

    /// Create a nested container at the end, returning its identity.
    pub fn push_container(&self, kind: ContainerKind) -> ContainerId {
        let len = self.len();
        return self
            .insert_container(len, kind)
            .expect("append is always in bounds");
    }

    /// Replace the value at a visible position, keeping element identity.
    pub fn set(&self, pos: usize, value: impl Into<Value>) -> Result<(), DocError> {
        let target = {
            let inner = self.doc.inner.borrow();
            let state = inner.seqs.get(&self.id);
            let len = state.map(|s| s.len()).unwrap_or(0);
            match state.and_then(|s| s.id_at(pos)) {
                Some(id) => id,
                None => return Err(DocError::IndexOutOfBounds { index: pos, len }),
            }
        };
        self.doc.commit(
            self.id.clone(),
            Payload::SeqSet { target, value: value.into() },
        );
        return Ok(());
    }

    /// Move the element at `from` so it ends up at visible position `to`.
    pub fn mov(&self, from: usize, to: usize) -> Result<(), DocError> {
        let (target, origin) = {
            let inner = self.doc.inner.borrow();
            let state = inner.seqs.get(&self.id);
            let len = state.map(|s| s.len()).unwrap_or(0);
            if from >= len {
                return Err(DocError::IndexOutOfBounds { index: from, len });
            }
            if to >= len {
                return Err(DocError::IndexOutOfBounds { index: to, len });
            }
            let state = state.expect("non-empty list has state");
            let target = state.id_at(from).expect("from is in bounds");
            // Destination origin is computed against the list without
            // the moved element, so `to` is the element's final index.
            let mut ids = state.ids_in_range(0, len);
            ids.retain(|id| *id != target);
            let origin = if to == 0 { None } else { Some(ids[to - 1]) };
            (target, origin)
        };
        self.doc.commit(self.id.clone(), Payload::SeqMove { target, origin });
        return Ok(());
    }

    /// Delete `len` elements starting at a visible position.
    pub fn delete(&self, pos: usize, len: usize) -> Result<(), DocError> {
        let targets = {
            let inner = self.doc.inner.borrow();
            seq_delete_targets(inner.seqs.get(&self.id), pos, len)?
        };
        if targets.is_empty() {
            return Ok(());
        }
        self.doc.commit(self.id.clone(), Payload::SeqDelete { targets });
        return Ok(());
    }

    /// The value at a visible position.
    pub fn get(&self, pos: usize) -> Option<Value> {
        let inner = self.doc.inner.borrow();
        return inner.seqs.get(&self.id).and_then(|s| s.get(pos).cloned());
    }

    /// Number of visible elements.
    pub fn len(&self) -> usize {
        let inner = self.doc.inner.borrow();
        return inner.seqs.get(&self.id).map(|s| s.len()).unwrap_or(0);
    }

    /// Whether the list has no visible elements.
    pub fn is_empty(&self) -> bool {
        return self.len() == 0;
    }

    /// All visible values, in order.
    pub fn to_vec(&self) -> Vec<Value> {
        let inner = self.doc.inner.borrow();
        return inner.seqs.get(&self.id).map(|s| s.to_vec()).unwrap_or_default();
    }

    /// Subscribe to change events for this container.
    pub fn subscribe(&self, callback: impl Fn(&DocEvent) + 'static) -> Subscription {
        return self.doc.subscribe_container(self.id.clone(), callback);
    }
}

// =============================================================================
// TextRef
// =============================================================================

/// A handle on a collaborative text container. Positions are char
/// indices, not byte offsets.
#[derive(Clone)]
pub struct TextRef {
    doc: Doc,
    id: ContainerId,
}

impl TextRef {
    /// The container's identity.
    pub fn id(&self) -> &ContainerId {
        return &self.id;
    }

    /// The document this container belongs to.
    pub fn doc(&self) -> &Doc {
        return &self.doc;
    }

    /// Insert text at a char position.
    pub fn insert(&self, pos: usize, content: &str) -> Result<(), DocError> {
        if content.is_empty() {
            return Ok(());
        }
        let origin = {
            let inner = self.doc.inner.borrow();
            seq_insert_origin(inner.texts.get(&self.id), pos)?
        };
        self.doc.commit(
            self.id.clone(),
            Payload::TextInsert { origin, content: content.to_string() },
        );
        return Ok(());
    }

    /// Delete `len` chars starting at a char position.
    pub fn delete(&self, pos: usize, len: usize) -> Result<(), DocError> {
        let targets = {
            let inner = self.doc.inner.borrow();
            seq_delete_targets(inner.texts.get(&self.id), pos, len)?
        };
        if targets.is_empty() {
            return Ok(());
        }
        self.doc.commit(self.id.clone(), Payload::SeqDelete { targets });
        return Ok(());
    }

    /// Number of visible chars.
    pub fn len(&self) -> usize {
        let inner = self.doc.inner.borrow();
        return inner.texts.get(&self.id).map(|s| s.len()).unwrap_or(0);
    }

    /// Whether the text is empty.
    pub fn is_empty(&self) -> bool {
        return self.len() == 0;
    }

    /// The visible text.
    pub fn to_string(&self) -> String {
        let inner = self.doc.inner.borrow();
        return inner
            .texts
            .get(&self.id)
            .map(|s| s.to_vec().into_iter().collect())
            .unwrap_or_default();
    }

    /// Subscribe to change events for this container.
    pub fn subscribe(&self, callback: impl Fn(&DocEvent) + 'static) -> Subscription {
        return self.doc.subscribe_container(self.id.clone(), callback);
    }
}

// =============================================================================
// TreeRef
// =============================================================================

/// A handle on a hierarchical tree container.
///
/// The tree alone validates structural legality: parents must exist and
/// a move may not make a node its own ancestor.
#[derive(Clone)]
pub struct TreeRef {
    doc: Doc,
    id: ContainerId,
}

impl TreeRef {
    /// The container's identity.
    pub fn id(&self) -> &ContainerId {
        return &self.id;
    }

    /// The document this container belongs to.
    pub fn doc(&self) -> &Doc {
        return &self.doc;
    }

    /// Create a node under `parent` (`None` = root level), returning its id.
    pub fn create(&self, parent: Option<TreeNodeId>) -> Result<TreeNodeId, DocError> {
        if let Some(p) = parent {
            let inner = self.doc.inner.borrow();
            let known = inner.trees.get(&self.id).map(|t| t.contains(p)).unwrap_or(false);
            if !known {
                return Err(DocError::NodeNotFound(p));
            }
        }
        let op_id = self.doc.commit_with(self.id.clone(), |op| {
            return Payload::TreeCreate { node: TreeNodeId(op), parent };
        });
        return Ok(TreeNodeId(op_id));
    }

    /// Move a node to the end of `parent`'s children (`None` = root level).
    pub fn mov(&self, node: TreeNodeId, parent: Option<TreeNodeId>) -> Result<(), DocError> {
        let after = {
            let inner = self.doc.inner.borrow();
            let tree = self.state_containing(&inner, node)?;
            self.check_parent(tree, node, parent)?;
            // Anchor on the last raw sibling so the node lands at the end
            tree.raw_siblings(parent)
                .iter()
                .rev()
                .find(|id| **id != node)
                .copied()
        };
        self.doc.commit(self.id.clone(), Payload::TreeMove { node, parent, after });
        return Ok(());
    }

    /// Move a node so it sits immediately before `anchor`.
    pub fn mov_before(&self, node: TreeNodeId, anchor: TreeNodeId) -> Result<(), DocError> {
        if node == anchor {
            return Ok(());
        }
        let (parent, after) = {
            let inner = self.doc.inner.borrow();
            let tree = self.state_containing(&inner, node)?;
            if !tree.contains(anchor) {
                return Err(DocError::NodeNotFound(anchor));
            }
            let parent = tree.parent(anchor).expect("anchor exists");
            self.check_parent(tree, node, parent)?;
            let siblings: Vec<TreeNodeId> = tree
                .raw_siblings(parent)
                .iter()
                .filter(|id| **id != node)
                .copied()
                .collect();
            let at = siblings.iter().position(|id| *id == anchor).expect("anchor is a sibling");
            let after = if at == 0 { None } else { Some(siblings[at - 1]) };
            (parent, after)
        };
        self.doc.commit(self.id.clone(), Payload::TreeMove { node, parent, after });
        return Ok(());
    }

    /// Move a node so it sits immediately after `anchor`.
    pub fn mov_after(&self, node: TreeNodeId, anchor: TreeNodeId) -> Result<(), DocError> {
        if node == anchor {
            return Ok(());
        }
        let parent = {
            let inner = self.doc.inner.borrow();
            let tree = self.state_containing(&inner, node)?;
            if !tree.contains(anchor) {
                return Err(DocError::NodeNotFound(anchor));
            }
            let parent = tree.parent(anchor).expect("anchor exists");
            self.check_parent(tree, node, parent)?;
            parent
        };
        self.doc.commit(
            self.id.clone(),
            Payload::TreeMove { node, parent, after: Some(anchor) },
        );
        return Ok(());
    }

    /// Delete a node (and thereby its subtree).
    pub fn delete(&self, node: TreeNodeId) -> Result<(), DocError> {
        {
            let inner = self.doc.inner.borrow();
            self.state_containing(&inner, node)?;
        }
        self.doc.commit(self.id.clone(), Payload::TreeDelete { node });
        return Ok(());
    }

    /// The parent of a node (`None` = root level).
    pub fn parent(&self, node: TreeNodeId) -> Result<Option<TreeNodeId>, DocError> {
        let inner = self.doc.inner.borrow();
        let tree = self.state_containing(&inner, node)?;
        return Ok(tree.parent(node).expect("node exists"));
    }

    /// Visible children of a node (`None` = visible roots), in order.
    pub fn children(&self, parent: Option<TreeNodeId>) -> Vec<TreeNodeId> {
        let inner = self.doc.inner.borrow();
        return inner
            .trees
            .get(&self.id)
            .map(|t| t.children(parent))
            .unwrap_or_default();
    }

    /// Visible root nodes, in order.
    pub fn roots(&self) -> Vec<TreeNodeId> {
        return self.children(None);
    }

    /// Whether a node (or one of its ancestors) is deleted.
    pub fn is_deleted(&self, node: TreeNodeId) -> Result<bool, DocError> {
        let inner = self.doc.inner.borrow();
        let tree = self.state_containing(&inner, node)?;
        return Ok(tree.is_deleted(node).expect("node exists"));
    }

    /// Position of a node among its visible siblings.
    pub fn index(&self, node: TreeNodeId) -> Result<usize, DocError> {
        let inner = self.doc.inner.borrow();
        let tree = self.state_containing(&inner, node)?;
        return Ok(tree.index(node).expect("node exists"));
    }

    /// Whether the tree knows this node (deleted nodes included).
    pub fn contains(&self, node: TreeNodeId) -> bool {
        let inner = self.doc.inner.borrow();
        return inner
            .trees
            .get(&self.id)
            .map(|t| t.contains(node))
            .unwrap_or(false);
    }

    /// All node ids, deleted nodes included, in unspecified order.
    pub fn nodes(&self) -> Vec<TreeNodeId> {
        let inner = self.doc.inner.borrow();
        return inner
            .trees
            .get(&self.id)
            .map(|t| t.node_ids().collect())
            .unwrap_or_default();
    }

    /// Number of visible nodes.
    pub fn len(&self) -> usize {
        let inner = self.doc.inner.borrow();
        return inner.trees.get(&self.id).map(|t| t.len()).unwrap_or(0);
    }

    /// Whether the tree has no visible nodes.
    pub fn is_empty(&self) -> bool {
        return self.len() == 0;
    }

    /// Subscribe to change events for this container.
    pub fn subscribe(&self, callback: impl Fn(&DocEvent) + 'static) -> Subscription {
        return self.doc.subscribe_container(self.id.clone(), callback);
    }

    fn state_containing<'a>(
        &self,
        inner: &'a std::cell::Ref<'_, DocInner>,
        node: TreeNodeId,
    ) -> Result<&'a TreeState, DocError> {
        let tree = inner
            .trees
            .get(&self.id)
            .filter(|t| t.contains(node))
            .ok_or(DocError::NodeNotFound(node))?;
        return Ok(tree);
    }

    fn check_parent(
        &self,
        tree: &TreeState,
        node: TreeNodeId,
        parent: Option<TreeNodeId>,
    ) -> Result<(), DocError> {
        if let Some(p) = parent {
            if !tree.contains(p) {
                return Err(DocError::NodeNotFound(p));
            }
            if tree.is_ancestor_or_self(node, p) {
                return Err(DocError::WouldCycle);
            }
        }
        return Ok(());
    }
}

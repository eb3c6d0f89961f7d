//! Reactive wrapper for collaborative text containers.

use std::cell::RefCell;
use std::rc::Rc;
use std::rc::Weak;

use crate::doc::ContainerId;
use crate::doc::DocError;
use crate::doc::EventOrigin;
use crate::doc::Subscription;
use crate::doc::TextRef;
use crate::reactive::Atom;
use crate::reactive::batch;

use super::LiveContainer;
use super::pool::Pool;
use super::pool::PoolInner;
use super::wire_hooks;

pub(crate) struct TextInner {
    handle: TextRef,
    pool: Weak<PoolInner>,
    atom: Atom,
    sub: RefCell<Option<Subscription>>,
}

impl LiveContainer for TextInner {
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

/// A reactive text sequence.
///
/// Text never nests containers, so this is the simplest wrapper: one
/// cell, character-indexed edits, whole-string reads.
#[derive(Clone)]
pub struct ObservableText {
    inner: Rc<TextInner>,
}

impl ObservableText {
    pub(crate) fn new(handle: TextRef, pool: &Rc<PoolInner>) -> ObservableText {
        let inner = Rc::new(TextInner {
            handle,
            pool: Rc::downgrade(pool),
            atom: Atom::new(),
            sub: RefCell::new(None),
        });
        wire_hooks(&inner);
        return ObservableText { inner };
    }

    /// The underlying container's identity.
    pub fn id(&self) -> &ContainerId {
        return self.inner.handle.id();
    }

    /// The raw container handle, bypassing observation.
    pub fn original(&self) -> &TextRef {
        return &self.inner.handle;
    }

    /// The pool this wrapper belongs to.
    pub fn pool(&self) -> Pool {
        let inner = self.inner.pool.upgrade().expect("wrapper outlived its pool");
        return Pool::from_inner(inner);
    }

    /// Insert text at a character position.
    pub fn insert(&self, pos: usize, content: &str) -> Result<(), DocError> {
        self.inner.handle.insert(pos, content)?;
        self.inner.atom.report_changed();
        return Ok(());
    }

    /// Remove `len` characters starting at `pos`.
    pub fn delete(&self, pos: usize, len: usize) -> Result<(), DocError> {
        self.inner.handle.delete(pos, len)?;
        self.inner.atom.report_changed();
        return Ok(());
    }

    /// Length in characters.
    pub fn len(&self) -> usize {
        self.inner.atom.report_observed();
        return self.inner.handle.len();
    }

    /// Whether the text is empty.
    pub fn is_empty(&self) -> bool {
        return self.len() == 0;
    }

    /// The current text content.
    pub fn to_string(&self) -> String {
        self.inner.atom.report_observed();
        return self.inner.handle.to_string();
    }

    /// Whether at least one live tracked computation observes this text.
    pub fn is_observed(&self) -> bool {
        return self.inner.atom.is_observed();
    }

    pub(crate) fn detach(&self) {
        if let Some(sub) = self.inner.sub.borrow_mut().take() {
            sub.unsubscribe();
        }
    }
}

impl PartialEq for ObservableText {
    fn eq(&self, other: &Self) -> bool {
        return Rc::ptr_eq(&self.inner, &other.inner);
    }
}

impl std::fmt::Debug for ObservableText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        return write!(f, "ObservableText({})", self.id());
    }
}

//! The change-tracking cell.
//!
//! An `Atom` records two facts: "the running tracked computation read
//! this" (`report_observed`) and "this changed" (`report_changed`). It
//! carries two lifecycle hooks, fired on the 0→1 and 1→0 transitions of
//! its observer count. The hooks are what make lazy resource management
//! possible: a consumer can acquire an upstream subscription exactly
//! when the first observer attaches and release it when the last one
//! detaches.

use std::cell::RefCell;
use std::rc::Rc;
use std::rc::Weak;

use super::reaction::RUNTIME;
use super::reaction::ReactionInner;

type Hook = Box<dyn Fn()>;

pub(crate) struct AtomInner {
    /// Live observers, keyed by reaction id.
    observers: RefCell<Vec<(u64, Weak<ReactionInner>)>>,
    /// Fired when the observer count goes 0→1.
    on_observed: RefCell<Option<Hook>>,
    /// Fired when the observer count goes 1→0.
    on_unobserved: RefCell<Option<Hook>>,
}

/// A change-tracking cell. Cloning yields another handle on the same cell.
#[derive(Clone)]
pub struct Atom {
    inner: Rc<AtomInner>,
}

impl Default for Atom {
    fn default() -> Self {
        return Self::new();
    }
}

impl Atom {
    /// Create a cell with no lifecycle hooks.
    pub fn new() -> Atom {
        return Atom {
            inner: Rc::new(AtomInner {
                observers: RefCell::new(Vec::new()),
                on_observed: RefCell::new(None),
                on_unobserved: RefCell::new(None),
            }),
        };
    }

    /// Install the lifecycle hooks.
    ///
    /// Separate from construction so the hooks can capture a weak
    /// reference to the structure that owns the atom.
    pub fn set_hooks(&self, on_observed: impl Fn() + 'static, on_unobserved: impl Fn() + 'static) {
        *self.inner.on_observed.borrow_mut() = Some(Box::new(on_observed));
        *self.inner.on_unobserved.borrow_mut() = Some(Box::new(on_unobserved));
    }

    /// Record that the currently-running tracked computation read this cell.
    ///
    /// Outside a tracked computation this is a no-op.
    pub fn report_observed(&self) {
        let reaction = RUNTIME.with(|rt| rt.active_reaction());
        let reaction = match reaction {
            Some(r) => r,
            None => return,
        };
        if reaction.is_disposed() {
            return;
        }

        let became_observed = {
            let mut observers = self.inner.observers.borrow_mut();
            observers.retain(|(_, weak)| weak.strong_count() > 0);
            if observers.iter().any(|(id, _)| *id == reaction.id()) {
                false
            } else {
                let was_empty = observers.is_empty();
                observers.push((reaction.id(), Rc::downgrade(&reaction)));
                was_empty
            }
        };
        if became_observed {
            if let Some(hook) = self.inner.on_observed.borrow().as_ref() {
                hook();
            }
        }
        reaction.track(self);
    }

    /// Record that this cell changed, scheduling every observing
    /// computation to re-run (immediately, unless inside a batch).
    pub fn report_changed(&self) {
        let observers: Vec<Rc<ReactionInner>> = {
            let mut observers = self.inner.observers.borrow_mut();
            observers.retain(|(_, weak)| weak.strong_count() > 0);
            observers.iter().filter_map(|(_, weak)| weak.upgrade()).collect()
        };
        RUNTIME.with(|rt| {
            for reaction in observers {
                rt.schedule(reaction);
            }
            rt.flush_if_idle();
        });
    }

    /// Whether at least one live tracked computation observes this cell.
    pub fn is_observed(&self) -> bool {
        let mut observers = self.inner.observers.borrow_mut();
        observers.retain(|(_, weak)| weak.strong_count() > 0);
        return !observers.is_empty();
    }

    /// Number of live observers.
    pub fn observer_count(&self) -> usize {
        let mut observers = self.inner.observers.borrow_mut();
        observers.retain(|(_, weak)| weak.strong_count() > 0);
        return observers.len();
    }

    /// Detach one reaction, firing the unobserved hook on the 1→0
    /// transition. Called by the runtime when a reaction re-runs or is
    /// disposed.
    pub(crate) fn unlink(&self, reaction_id: u64) {
        let became_unobserved = {
            let mut observers = self.inner.observers.borrow_mut();
            let before = observers.len();
            observers.retain(|(id, weak)| *id != reaction_id && weak.strong_count() > 0);
            before > 0 && observers.is_empty()
        };
        if became_unobserved {
            if let Some(hook) = self.inner.on_unobserved.borrow().as_ref() {
                hook();
            }
        }
    }

    pub(crate) fn same_cell(&self, other: &Atom) -> bool {
        return Rc::ptr_eq(&self.inner, &other.inner);
    }
}

impl std::fmt::Debug for Atom {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        return write!(f, "Atom({} observers)", self.observer_count());
    }
}

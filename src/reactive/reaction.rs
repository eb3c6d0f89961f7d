//! Tracked computations and the scheduling runtime.
//!
//! A `Reaction` is a closure that re-runs whenever any cell it read
//! during its last run reports a change. Dependencies are collected
//! fresh on every run, so a reaction only observes what it actually
//! read last time.
//!
//! Scheduling is synchronous and single-threaded: outside a batch, a
//! change runs the affected reactions before `report_changed` returns.
//! Inside `batch`, reactions are queued and run once when the outermost
//! batch ends, so a group of mutations is observed as one settled step.

use std::cell::Cell;
use std::cell::RefCell;
use std::collections::VecDeque;
use std::rc::Rc;

use smallvec::SmallVec;

use super::atom::Atom;

// =============================================================================
// Runtime
// =============================================================================

pub(crate) struct Runtime {
    /// Stack of currently-running reactions; the top is the tracker.
    active: RefCell<Vec<Rc<ReactionInner>>>,
    /// Reactions waiting to run.
    pending: RefCell<VecDeque<Rc<ReactionInner>>>,
    batch_depth: Cell<usize>,
    flushing: Cell<bool>,
    next_id: Cell<u64>,
}

thread_local! {
    pub(crate) static RUNTIME: Runtime = Runtime {
        active: RefCell::new(Vec::new()),
        pending: RefCell::new(VecDeque::new()),
        batch_depth: Cell::new(0),
        flushing: Cell::new(false),
        next_id: Cell::new(0),
    };
}

impl Runtime {
    pub(crate) fn active_reaction(&self) -> Option<Rc<ReactionInner>> {
        return self.active.borrow().last().cloned();
    }

    fn fresh_id(&self) -> u64 {
        let id = self.next_id.get();
        self.next_id.set(id + 1);
        return id;
    }

    pub(crate) fn schedule(&self, reaction: Rc<ReactionInner>) {
        if reaction.disposed.get() || reaction.scheduled.get() {
            return;
        }
        reaction.scheduled.set(true);
        self.pending.borrow_mut().push_back(reaction);
    }

    /// Run queued reactions, unless a batch or another run is in progress.
    pub(crate) fn flush_if_idle(&self) {
        if self.batch_depth.get() > 0 || self.flushing.get() {
            return;
        }
        if !self.active.borrow().is_empty() {
            return;
        }
        self.flushing.set(true);
        loop {
            let next = self.pending.borrow_mut().pop_front();
            let reaction = match next {
                Some(r) => r,
                None => break,
            };
            reaction.scheduled.set(false);
            if !reaction.disposed.get() {
                run_reaction(&reaction);
            }
        }
        self.flushing.set(false);
    }
}

// =============================================================================
// Reaction
// =============================================================================

pub(crate) struct ReactionInner {
    id: u64,
    body: RefCell<Option<Box<dyn FnMut()>>>,
    deps: RefCell<SmallVec<[Atom; 4]>>,
    disposed: Cell<bool>,
    scheduled: Cell<bool>,
}

impl ReactionInner {
    pub(crate) fn id(&self) -> u64 {
        return self.id;
    }

    pub(crate) fn is_disposed(&self) -> bool {
        return self.disposed.get();
    }

    /// Record a dependency for the current run.
    pub(crate) fn track(&self, atom: &Atom) {
        let mut deps = self.deps.borrow_mut();
        if !deps.iter().any(|dep| dep.same_cell(atom)) {
            deps.push(atom.clone());
        }
    }
}

/// Detach a reaction from everything it read during its last run.
fn clear_deps(reaction: &ReactionInner) {
    let deps: SmallVec<[Atom; 4]> = std::mem::take(&mut *reaction.deps.borrow_mut());
    for atom in deps {
        atom.unlink(reaction.id);
    }
}

fn run_reaction(reaction: &Rc<ReactionInner>) {
    clear_deps(reaction);
    RUNTIME.with(|rt| rt.active.borrow_mut().push(reaction.clone()));
    {
        let mut body = reaction.body.borrow_mut();
        if let Some(f) = body.as_mut() {
            f();
        }
    }
    RUNTIME.with(|rt| {
        rt.active.borrow_mut().pop();
    });
}

/// A handle on a running tracked computation.
///
/// Dropping the handle disposes the reaction.
pub struct Reaction {
    inner: Rc<ReactionInner>,
}

impl Reaction {
    /// Stop the reaction and detach it from every cell it observes.
    ///
    /// Idempotent, and safe to call from inside the reaction's own body
    /// or from teardown paths triggered by detaching.
    pub fn dispose(&self) {
        if self.inner.disposed.replace(true) {
            return;
        }
        clear_deps(&self.inner);
        // Drop the closure unless it is currently running; a running
        // body is released when the run completes.
        if let Ok(mut body) = self.inner.body.try_borrow_mut() {
            *body = None;
        }
    }

    /// Whether the reaction has been disposed.
    pub fn is_disposed(&self) -> bool {
        return self.inner.disposed.get();
    }
}

impl Drop for Reaction {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Run a closure now and re-run it whenever any cell it read changes.
pub fn autorun(f: impl FnMut() + 'static) -> Reaction {
    let inner = RUNTIME.with(|rt| {
        return Rc::new(ReactionInner {
            id: rt.fresh_id(),
            body: RefCell::new(Some(Box::new(f))),
            deps: RefCell::new(SmallVec::new()),
            disposed: Cell::new(false),
            scheduled: Cell::new(false),
        });
    });
    run_reaction(&inner);
    RUNTIME.with(|rt| rt.flush_if_idle());
    return Reaction { inner };
}

/// Run a group of mutations, delivering reaction re-runs only once the
/// outermost batch has ended.
pub fn batch<R>(f: impl FnOnce() -> R) -> R {
    RUNTIME.with(|rt| rt.batch_depth.set(rt.batch_depth.get() + 1));
    let result = f();
    RUNTIME.with(|rt| {
        rt.batch_depth.set(rt.batch_depth.get() - 1);
        rt.flush_if_idle();
    });
    return result;
}

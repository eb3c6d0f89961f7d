//! Reactive wrappers over document containers.
//!
//! The [`Pool`] is the only construction path for wrappers: it keeps at
//! most one wrapper per container identity, so reference equality of
//! wrappers mirrors identity of the underlying containers. Each wrapper
//! owns one change-tracking cell; reads report the cell observed and
//! writes report it changed, so computations created with
//! [`autorun`](crate::reactive::autorun) re-run when the containers
//! they read change.
//!
//! # Subscription lifecycle
//!
//! A wrapper subscribes to its container's change events only while at
//! least one live tracked computation observes it. The cell's lifecycle
//! hooks drive the transitions: first observer attaches the
//! subscription, last observer detaches it. While unobserved, a wrapper
//! misses no data (reads always consult the container directly), only
//! proactive re-runs, and nobody was watching for those.
//!
//! # Notification paths
//!
//! Local writes report the change synchronously after delegating, so a
//! mutate-then-read in the same turn sees the new state. Imported
//! changes arrive through the subscription callback, which reports the
//! change only for non-local origins to avoid double notification.

use std::cell::RefCell;
use std::rc::Rc;
use std::rc::Weak;

use crate::doc::Subscription;
use crate::reactive::Atom;

pub mod list;
pub mod map;
pub mod movable_list;
pub mod pool;
pub mod text;
pub mod tree;

pub use list::ObservableList;
pub use map::ObservableMap;
pub use movable_list::ObservableMovableList;
pub use pool::ObservableValue;
pub use pool::Pool;
pub use pool::Resolve;
pub use text::ObservableText;
pub use tree::ObservableTree;
pub use tree::ObservableTreeNode;

use pool::PoolInner;

/// The per-wrapper state the subscription lifecycle needs.
///
/// The flat wrappers (map, list, movable list, text) share one shape: a
/// single cell for the whole container and a single subscription slot.
/// The tree wrapper wires its own lifecycle because its subscription is
/// shared across the tree cell and every cached node cell.
pub(crate) trait LiveContainer {
    fn atom(&self) -> &Atom;
    fn sub_slot(&self) -> &RefCell<Option<Subscription>>;
    fn pool(&self) -> &Weak<PoolInner>;
    /// Subscribe to the underlying container, reporting the given cell
    /// changed for every non-local event.
    fn subscribe_origin(&self, atom: Atom) -> Subscription;
}

/// Install the subscribe-on-first-observer, unsubscribe-on-last-observer
/// hooks on a wrapper's cell.
///
/// The hooks hold only weak references, so they never extend the
/// wrapper's lifetime. A disposed pool suppresses new subscriptions:
/// wrappers that survive disposal keep answering reads but stop
/// attaching to the document.
pub(crate) fn wire_hooks<T: LiveContainer + 'static>(inner: &Rc<T>) {
    let on_observed = Rc::downgrade(inner);
    let on_unobserved = Rc::downgrade(inner);
    inner.atom().set_hooks(
        move || {
            let inner = match on_observed.upgrade() {
                Some(inner) => inner,
                None => return,
            };
            let pool = match inner.pool().upgrade() {
                Some(pool) => pool,
                None => return,
            };
            if pool.disposed.get() {
                return;
            }
            let sub = inner.subscribe_origin(inner.atom().clone());
            *inner.sub_slot().borrow_mut() = Some(sub);
        },
        move || {
            let inner = match on_unobserved.upgrade() {
                Some(inner) => inner,
                None => return,
            };
            if let Some(sub) = inner.sub_slot().borrow_mut().take() {
                sub.unsubscribe();
            }
        },
    );
}

//! A minimal pull-based reactive runtime.
//!
//! The model is two-sided: an [`Atom`] is a change-tracking cell, and a
//! reaction (created with [`autorun`]) is a computation that re-runs
//! when a cell it read changes. Reads register dependencies implicitly;
//! writes call [`Atom::report_changed`] and the runtime re-runs exactly
//! the computations that observed the cell.
//!
//! The runtime is single-threaded and synchronous. [`batch`] groups
//! mutations so observers settle once at the end.

pub mod atom;
pub mod reaction;

pub use atom::Atom;
pub use reaction::Reaction;
pub use reaction::autorun;
pub use reaction::batch;

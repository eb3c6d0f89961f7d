//! The replicated document engine.
//!
//! A [`Doc`] holds a set of named containers (maps, lists, movable
//! lists, text, trees) whose edits converge across replicas: two
//! documents that have imported each other's updates hold identical
//! state, regardless of delivery order or duplication.
//!
//! Edits are recorded as operations stamped with a Lamport timestamp
//! and the editing peer's id. Local edits apply incrementally; imported
//! updates rebuild the affected containers by replaying their full
//! operation history in canonical order.

pub mod engine;
pub mod error;
pub mod id;
pub mod op;
pub mod state;
pub mod value;

pub use engine::Doc;
pub use engine::DocEvent;
pub use engine::EventOrigin;
pub use engine::ListRef;
pub use engine::MapRef;
pub use engine::MovableListRef;
pub use engine::Subscription;
pub use engine::TextRef;
pub use engine::TreeRef;
pub use error::DocError;
pub use id::ContainerId;
pub use id::ContainerKind;
pub use id::ElemId;
pub use id::PeerId;
pub use id::TreeNodeId;
pub use value::Value;

//! Witness - reactive wrappers over a replicated document.
//!
//! A [`doc::Doc`] holds replicated containers (maps, lists, movable
//! lists, text, trees) that converge across peers. A [`observe::Pool`]
//! wraps those containers in identity-stable reactive handles: reads
//! inside an [`reactive::autorun`] computation are tracked, and the
//! computation re-runs when the containers it read change, whether the
//! change was made locally or imported from another peer.
//!
//! # Quick Start
//!
//! ```
//! use witness::doc::Doc;
//! use witness::observe::{ObservableValue, Pool};
//! use witness::reactive::autorun;
//!
//! let doc = Doc::new();
//! let pool = Pool::new(&doc);
//!
//! // Wrappers are pooled: one instance per container identity
//! let settings = pool.get(doc.map("settings"));
//! assert_eq!(settings, pool.get(doc.map("settings")));
//!
//! // Reads inside autorun are tracked; writes re-run the observer
//! let watcher = {
//!     let settings = settings.clone();
//!     autorun(move || {
//!         let _ = settings.get("theme");
//!     })
//! };
//! settings.insert("theme", "dark");
//!
//! assert_eq!(
//!     settings.get("theme").and_then(|v| v.as_plain().cloned()),
//!     Some("dark".into()),
//! );
//! watcher.dispose();
//! ```

pub mod doc;
pub mod observe;
pub mod reactive;

//! Errors reported by the document engine.

use std::error::Error;
use std::fmt;

use super::id::TreeNodeId;

/// Error returned when a document operation cannot be performed.
///
/// These are deterministic, local failures: an operation either succeeds
/// or fails immediately. Nothing in the engine retries.
#[derive(Debug, Clone, PartialEq)]
pub enum DocError {
    /// A positional index was past the end of a sequence.
    IndexOutOfBounds {
        /// The offending index.
        index: usize,
        /// The sequence length at the time of the call.
        len: usize,
    },
    /// A map key was not present.
    KeyNotFound(String),
    /// A tree node id was not present in the tree.
    NodeNotFound(TreeNodeId),
    /// A tree move would have made a node its own ancestor.
    WouldCycle,
    /// An imported update could not be decoded.
    DecodeFailed(String),
}

impl fmt::Display for DocError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DocError::IndexOutOfBounds { index, len } => {
                return write!(f, "index {} out of bounds for length {}", index, len);
            }
            DocError::KeyNotFound(key) => {
                return write!(f, "key {:?} not found", key);
            }
            DocError::NodeNotFound(node) => {
                return write!(f, "tree node {} not found", node);
            }
            DocError::WouldCycle => {
                return write!(f, "move would make a node its own ancestor");
            }
            DocError::DecodeFailed(reason) => {
                return write!(f, "could not decode update: {}", reason);
            }
        }
    }
}

impl Error for DocError {}

//! Deterministic GBDT inference
//!
//! - Integer-only tree traversal (`<=` goes left)
//! - Feature values converted to fixed-point at `SCALE` (1e6)
//! - Canonical JSON serialization with Blake3 model hashing
//!
//! ```rust
//! use congestion_core::gbdt::{Model, Node, Tree, SCALE};
//!
//! let tree = Tree::new(
//!     vec![
//!         Node::internal(0, 0, 12 * SCALE, 1, 2),
//!         Node::leaf(1, SCALE / 5),
//!         Node::leaf(2, SCALE / 2),
//!     ],
//!     SCALE,
//! );
//! let model = Model::new(vec![tree], 0, 1);
//! assert_eq!(model.predict_row(&[8.0]), 0.2);
//! ```

pub mod model;
pub mod tree;

pub use model::{from_fixed, to_fixed, Model, MODEL_VERSION, SCALE};
pub use tree::{Node, Tree};

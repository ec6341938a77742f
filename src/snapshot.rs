//! Point-in-time structural snapshots.
//!
//! A snapshot is a nested record of `{ key, color, left, right }` with
//! absent children rendered as `null`. External viewers depend on these
//! exact field names, so the schema lives here in one place. An empty
//! tree serializes as the JSON literal `null`.

use serde::Deserialize;
use serde::Serialize;

use crate::tree::Color;
use crate::tree::RbTree;

/// One node of a structural snapshot. Purely data; never mutates the tree
/// it was rendered from.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotNode {
    pub key: i64,
    pub color: Color,
    pub left: Option<Box<SnapshotNode>>,
    pub right: Option<Box<SnapshotNode>>,
}

/// Render the current structure as JSON.
pub fn to_json(tree: &RbTree) -> String {
    // Serialization of this schema cannot fail: no maps, no non-string
    // keys, no floats.
    return serde_json::to_string(&tree.snapshot()).unwrap_or_else(|_| "null".to_string());
}

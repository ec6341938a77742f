//! Red-black tree engine.
//!
//! An ordered set of `i64` keys kept balanced with the red-black
//! discipline. Duplicates are permitted and routed to the right subtree.
//!
//! Structure:
//! - Nodes live in a `Vec` arena and refer to each other by stable `u32`
//!   handles, with `NIL` marking an absent child or parent
//! - Child handles own their subtree; the parent handle is a back-reference
//! - Freed slots are recycled through a free list
//!
//! Operations:
//! - insert: O(log n) - BST descent plus recolor/rotate fixup
//! - delete: O(log n) - successor splice plus double-black fixup
//! - contains: O(log n) - plain BST descent
//! - preorder/keys: O(n) - deterministic (node, left, right) dump
//!
//! The balancing invariants: the root is black, no red node has a red
//! child, and every path from a node down to an absent child crosses the
//! same number of black nodes. Absent children count as black leaves.

use serde::Deserialize;
use serde::Serialize;
use smallvec::SmallVec;

use crate::error::InvariantError;
use crate::snapshot::SnapshotNode;

/// Handle into the node arena.
type NodeIdx = u32;

/// Sentinel handle for an absent node. Reads as a black leaf.
const NIL: NodeIdx = u32::MAX;

/// The color tag carried by every node.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Color {
    Red,
    Black,
}

/// A key-bearing node. Links are arena handles, `NIL` when absent.
#[derive(Clone, Debug)]
struct Node {
    key: i64,
    color: Color,
    left: NodeIdx,
    right: NodeIdx,
    parent: NodeIdx,
}

/// A red-black tree over `i64` keys.
#[derive(Clone, Debug)]
pub struct RbTree {
    /// Node arena. Slots on the free list are garbage until reused.
    nodes: Vec<Node>,
    /// Root handle, `NIL` when the tree is empty.
    root: NodeIdx,
    /// Slots released by deletion, reused before growing the arena.
    free: Vec<NodeIdx>,
    /// Number of live keys.
    len: usize,
}

impl RbTree {
    pub fn new() -> RbTree {
        return RbTree {
            nodes: Vec::new(),
            root: NIL,
            free: Vec::new(),
            len: 0,
        };
    }

    #[inline(always)]
    pub fn len(&self) -> usize {
        return self.len;
    }

    #[inline(always)]
    pub fn is_empty(&self) -> bool {
        return self.len == 0;
    }

    // -- arena ----------------------------------------------------------

    /// Allocate a fresh red node, reusing a freed slot if one exists.
    fn alloc(&mut self, key: i64) -> NodeIdx {
        let node = Node {
            key,
            color: Color::Red,
            left: NIL,
            right: NIL,
            parent: NIL,
        };
        if let Some(idx) = self.free.pop() {
            self.nodes[idx as usize] = node;
            return idx;
        }
        let idx = self.nodes.len();
        assert!(idx < NIL as usize, "too many nodes");
        self.nodes.push(node);
        return idx as NodeIdx;
    }

    /// Return a slot to the free list. The node must already be unlinked.
    fn release(&mut self, idx: NodeIdx) {
        self.free.push(idx);
    }

    // -- link accessors -------------------------------------------------

    #[inline(always)]
    fn left(&self, n: NodeIdx) -> NodeIdx {
        return self.nodes[n as usize].left;
    }

    #[inline(always)]
    fn right(&self, n: NodeIdx) -> NodeIdx {
        return self.nodes[n as usize].right;
    }

    #[inline(always)]
    fn parent(&self, n: NodeIdx) -> NodeIdx {
        return self.nodes[n as usize].parent;
    }

    #[inline(always)]
    fn key(&self, n: NodeIdx) -> i64 {
        return self.nodes[n as usize].key;
    }

    /// Absent nodes are black.
    #[inline(always)]
    fn is_red(&self, n: NodeIdx) -> bool {
        return n != NIL && self.nodes[n as usize].color == Color::Red;
    }

    #[inline(always)]
    fn set_color(&mut self, n: NodeIdx, color: Color) {
        self.nodes[n as usize].color = color;
    }

    // -- rotation primitives --------------------------------------------

    /// Rotate left around `pivot`. Relinks parent↔pivot, pivot↔moved
    /// subtree, and new-parent↔pivot in one call; colors are untouched.
    fn rotate_left(&mut self, pivot: NodeIdx) {
        let up = self.right(pivot);
        let moved = self.left(up);

        self.nodes[pivot as usize].right = moved;
        if moved != NIL {
            self.nodes[moved as usize].parent = pivot;
        }

        let above = self.parent(pivot);
        self.nodes[up as usize].parent = above;
        if above == NIL {
            self.root = up;
        } else if self.left(above) == pivot {
            self.nodes[above as usize].left = up;
        } else {
            self.nodes[above as usize].right = up;
        }

        self.nodes[up as usize].left = pivot;
        self.nodes[pivot as usize].parent = up;
    }

    /// Mirror of `rotate_left`.
    fn rotate_right(&mut self, pivot: NodeIdx) {
        let up = self.left(pivot);
        let moved = self.right(up);

        self.nodes[pivot as usize].left = moved;
        if moved != NIL {
            self.nodes[moved as usize].parent = pivot;
        }

        let above = self.parent(pivot);
        self.nodes[up as usize].parent = above;
        if above == NIL {
            self.root = up;
        } else if self.right(above) == pivot {
            self.nodes[above as usize].right = up;
        } else {
            self.nodes[above as usize].left = up;
        }

        self.nodes[up as usize].right = pivot;
        self.nodes[pivot as usize].parent = up;
    }

    // -- insertion ------------------------------------------------------

    /// Insert a key. Always succeeds; an equal key goes to the right
    /// subtree of the existing one.
    pub fn insert(&mut self, key: i64) {
        let node = self.alloc(key);

        let mut above = NIL;
        let mut cursor = self.root;
        while cursor != NIL {
            above = cursor;
            if key < self.key(cursor) {
                cursor = self.left(cursor);
            } else {
                cursor = self.right(cursor);
            }
        }

        self.nodes[node as usize].parent = above;
        if above == NIL {
            self.root = node;
        } else if key < self.key(above) {
            self.nodes[above as usize].left = node;
        } else {
            self.nodes[above as usize].right = node;
        }

        self.len += 1;
        self.fixup_insert(node);
    }

    /// Restore the invariants after linking a red node.
    ///
    /// Walks up while two reds are adjacent. A red uncle pushes blackness
    /// down from the grandparent and propagates; a black uncle resolves
    /// locally with at most two rotations and stops.
    fn fixup_insert(&mut self, mut node: NodeIdx) {
        while self.parent(node) != NIL && self.is_red(self.parent(node)) {
            let parent = self.parent(node);
            let grand = self.parent(parent);

            if parent == self.left(grand) {
                let uncle = self.right(grand);
                if self.is_red(uncle) {
                    // Red uncle: recolor and move the violation up.
                    self.set_color(parent, Color::Black);
                    self.set_color(uncle, Color::Black);
                    self.set_color(grand, Color::Red);
                    node = grand;
                } else {
                    if node == self.right(parent) {
                        // Inner child: rotate into the outer shape first.
                        node = parent;
                        self.rotate_left(node);
                    }
                    let parent = self.parent(node);
                    let grand = self.parent(parent);
                    self.set_color(parent, Color::Black);
                    self.set_color(grand, Color::Red);
                    self.rotate_right(grand);
                }
            } else {
                let uncle = self.left(grand);
                if self.is_red(uncle) {
                    self.set_color(parent, Color::Black);
                    self.set_color(uncle, Color::Black);
                    self.set_color(grand, Color::Red);
                    node = grand;
                } else {
                    if node == self.left(parent) {
                        node = parent;
                        self.rotate_right(node);
                    }
                    let parent = self.parent(node);
                    let grand = self.parent(parent);
                    self.set_color(parent, Color::Black);
                    self.set_color(grand, Color::Red);
                    self.rotate_left(grand);
                }
            }
        }

        // The root is black unconditionally; a propagated recolor can
        // leave it red.
        if self.root != NIL {
            self.set_color(self.root, Color::Black);
        }
    }

    // -- deletion -------------------------------------------------------

    /// Delete one node matching `key`. Returns false if no node matches;
    /// the tree is untouched in that case.
    pub fn delete(&mut self, key: i64) -> bool {
        let target = self.find(key);
        if target == NIL {
            return false;
        }
        self.remove_node(target);
        return true;
    }

    fn remove_node(&mut self, target: NodeIdx) {
        // A two-child target is not unlinked itself: its key is replaced
        // by the in-order successor's, and the successor (which has at
        // most one child) is the node physically removed.
        let gone = if self.left(target) == NIL || self.right(target) == NIL {
            target
        } else {
            self.min_node(self.right(target))
        };

        let child = if self.left(gone) != NIL {
            self.left(gone)
        } else {
            self.right(gone)
        };
        let above = self.parent(gone);

        if child != NIL {
            self.nodes[child as usize].parent = above;
        }
        if above == NIL {
            self.root = child;
        } else if self.left(above) == gone {
            self.nodes[above as usize].left = child;
        } else {
            self.nodes[above as usize].right = child;
        }

        if gone != target {
            let moved_key = self.key(gone);
            self.nodes[target as usize].key = moved_key;
        }

        // Unlinking a black node leaves one path a black short. The
        // parent is tracked explicitly because `child` may be absent.
        if self.nodes[gone as usize].color == Color::Black {
            self.fixup_delete(child, above);
        }

        self.release(gone);
        self.len -= 1;
    }

    /// Repair the black-height deficit sitting at `node` (possibly `NIL`)
    /// under `above`.
    fn fixup_delete(&mut self, mut node: NodeIdx, mut above: NodeIdx) {
        while node != self.root && !self.is_red(node) {
            if node == self.left(above) {
                let mut sibling = self.right(above);

                // Red sibling: rotate it above and retry with the black
                // sibling that surfaces.
                if self.is_red(sibling) {
                    self.set_color(sibling, Color::Black);
                    self.set_color(above, Color::Red);
                    self.rotate_left(above);
                    sibling = self.right(above);
                }

                if sibling == NIL
                    || (!self.is_red(self.left(sibling)) && !self.is_red(self.right(sibling)))
                {
                    // Both sibling children black: drop a black from the
                    // sibling side and push the deficit up.
                    if sibling != NIL {
                        self.set_color(sibling, Color::Red);
                    }
                    node = above;
                    above = self.parent(node);
                } else {
                    if !self.is_red(self.right(sibling)) {
                        // Near child red, far child black: rotate the
                        // sibling so the red lands far.
                        let near = self.left(sibling);
                        if near != NIL {
                            self.set_color(near, Color::Black);
                        }
                        self.set_color(sibling, Color::Red);
                        self.rotate_right(sibling);
                        sibling = self.right(above);
                    }

                    // Far child red: one rotation pays off the deficit.
                    let above_color = self.nodes[above as usize].color;
                    self.set_color(sibling, above_color);
                    self.set_color(above, Color::Black);
                    let far = self.right(sibling);
                    if far != NIL {
                        self.set_color(far, Color::Black);
                    }
                    self.rotate_left(above);
                    node = self.root;
                }
            } else {
                let mut sibling = self.left(above);

                if self.is_red(sibling) {
                    self.set_color(sibling, Color::Black);
                    self.set_color(above, Color::Red);
                    self.rotate_right(above);
                    sibling = self.left(above);
                }

                if sibling == NIL
                    || (!self.is_red(self.left(sibling)) && !self.is_red(self.right(sibling)))
                {
                    if sibling != NIL {
                        self.set_color(sibling, Color::Red);
                    }
                    node = above;
                    above = self.parent(node);
                } else {
                    if !self.is_red(self.left(sibling)) {
                        let near = self.right(sibling);
                        if near != NIL {
                            self.set_color(near, Color::Black);
                        }
                        self.set_color(sibling, Color::Red);
                        self.rotate_left(sibling);
                        sibling = self.left(above);
                    }

                    let above_color = self.nodes[above as usize].color;
                    self.set_color(sibling, above_color);
                    self.set_color(above, Color::Black);
                    let far = self.left(sibling);
                    if far != NIL {
                        self.set_color(far, Color::Black);
                    }
                    self.rotate_right(above);
                    node = self.root;
                }
            }
        }

        if node != NIL {
            self.set_color(node, Color::Black);
        }
    }

    // -- search / traversal ---------------------------------------------

    /// True if some node carries `key`.
    pub fn contains(&self, key: i64) -> bool {
        return self.find(key) != NIL;
    }

    fn find(&self, key: i64) -> NodeIdx {
        let mut cursor = self.root;
        while cursor != NIL && self.key(cursor) != key {
            if key < self.key(cursor) {
                cursor = self.left(cursor);
            } else {
                cursor = self.right(cursor);
            }
        }
        return cursor;
    }

    /// Leftmost node of the subtree at `n`.
    fn min_node(&self, mut n: NodeIdx) -> NodeIdx {
        while self.left(n) != NIL {
            n = self.left(n);
        }
        return n;
    }

    /// Deterministic preorder (node, left, right) dump of (key, color).
    pub fn preorder(&self) -> Vec<(i64, Color)> {
        let mut out = Vec::with_capacity(self.len);
        let mut stack: SmallVec<[NodeIdx; 64]> = SmallVec::new();
        if self.root != NIL {
            stack.push(self.root);
        }
        while let Some(n) = stack.pop() {
            let node = &self.nodes[n as usize];
            out.push((node.key, node.color));
            if node.right != NIL {
                stack.push(node.right);
            }
            if node.left != NIL {
                stack.push(node.left);
            }
        }
        return out;
    }

    /// Preorder key dump. The bulk-clear path deletes these one by one.
    pub fn keys(&self) -> Vec<i64> {
        return self.preorder().into_iter().map(|(key, _)| key).collect();
    }

    /// Nodes on the longest root-to-leaf path, 0 for an empty tree.
    pub fn height(&self) -> usize {
        let mut max = 0;
        let mut stack: SmallVec<[(NodeIdx, usize); 64]> = SmallVec::new();
        if self.root != NIL {
            stack.push((self.root, 1));
        }
        while let Some((n, depth)) = stack.pop() {
            if depth > max {
                max = depth;
            }
            let node = &self.nodes[n as usize];
            if node.right != NIL {
                stack.push((node.right, depth + 1));
            }
            if node.left != NIL {
                stack.push((node.left, depth + 1));
            }
        }
        return max;
    }

    /// Structural snapshot for external viewers, `None` for an empty tree.
    pub fn snapshot(&self) -> Option<SnapshotNode> {
        if self.root == NIL {
            return None;
        }
        return Some(self.snapshot_node(self.root));
    }

    fn snapshot_node(&self, n: NodeIdx) -> SnapshotNode {
        let node = &self.nodes[n as usize];
        let left = if node.left == NIL {
            None
        } else {
            Some(Box::new(self.snapshot_node(node.left)))
        };
        let right = if node.right == NIL {
            None
        } else {
            Some(Box::new(self.snapshot_node(node.right)))
        };
        return SnapshotNode {
            key: node.key,
            color: node.color,
            left,
            right,
        };
    }

    // -- validation -----------------------------------------------------

    /// Walk the whole tree checking every invariant: black root, no two
    /// adjacent reds, uniform black count on every path, and BST order
    /// with duplicates on the right. Returns the black-height.
    ///
    /// An `Err` here means an engine defect; tests treat it as fatal.
    pub fn validate(&self) -> Result<u32, InvariantError> {
        if self.is_red(self.root) {
            return Err(InvariantError::RedRoot {
                key: self.key(self.root),
            });
        }
        return self.validate_node(self.root, None, None);
    }

    fn validate_node(
        &self,
        n: NodeIdx,
        low: Option<i64>,
        high: Option<i64>,
    ) -> Result<u32, InvariantError> {
        if n == NIL {
            return Ok(1);
        }
        let node = &self.nodes[n as usize];

        if low.is_some_and(|lo| node.key < lo) || high.is_some_and(|hi| node.key >= hi) {
            return Err(InvariantError::OrderViolation { key: node.key });
        }
        if node.color == Color::Red && (self.is_red(node.left) || self.is_red(node.right)) {
            return Err(InvariantError::RedRed { key: node.key });
        }

        let left = self.validate_node(node.left, low, Some(node.key))?;
        let right = self.validate_node(node.right, Some(node.key), high)?;
        if left != right {
            return Err(InvariantError::BlackHeightMismatch {
                key: node.key,
                left,
                right,
            });
        }

        let own = if node.color == Color::Black { 1 } else { 0 };
        return Ok(left + own);
    }
}

impl Default for RbTree {
    fn default() -> Self {
        return Self::new();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_valid(tree: &RbTree) {
        if let Err(violation) = tree.validate() {
            panic!("invariant violated: {}", violation);
        }
    }

    #[test]
    fn empty_tree() {
        let tree = RbTree::new();
        assert_eq!(tree.len(), 0);
        assert!(tree.is_empty());
        assert_eq!(tree.height(), 0);
        assert!(tree.preorder().is_empty());
        assert_valid(&tree);
    }

    #[test]
    fn first_insert_makes_black_root() {
        let mut tree = RbTree::new();
        tree.insert(10);
        assert_eq!(tree.preorder(), vec![(10, Color::Black)]);
    }

    #[test]
    fn sorted_line_rotates() {
        // 10 -> 20 -> 30 forces a left rotation at the root.
        let mut tree = RbTree::new();
        tree.insert(10);
        tree.insert(20);
        tree.insert(30);
        assert_eq!(
            tree.preorder(),
            vec![(20, Color::Black), (10, Color::Red), (30, Color::Red)]
        );
        assert_valid(&tree);
    }

    #[test]
    fn reverse_line_rotates() {
        let mut tree = RbTree::new();
        tree.insert(30);
        tree.insert(20);
        tree.insert(10);
        assert_eq!(
            tree.preorder(),
            vec![(20, Color::Black), (10, Color::Red), (30, Color::Red)]
        );
        assert_valid(&tree);
    }

    #[test]
    fn insert_scenario_holds_invariants() {
        let mut tree = RbTree::new();
        for key in [10, 20, 30, 15, 25, 5, 1, 45, 12] {
            tree.insert(key);
            assert_valid(&tree);
        }
        assert_eq!(tree.len(), 9);
        for key in [10, 20, 30, 15, 25, 5, 1, 45, 12] {
            assert!(tree.contains(key));
        }
        assert!(!tree.contains(2));
    }

    #[test]
    fn duplicates_route_right() {
        let mut tree = RbTree::new();
        tree.insert(5);
        tree.insert(5);
        tree.insert(5);
        assert_eq!(tree.len(), 3);
        assert_valid(&tree);

        // Each delete removes exactly one occurrence.
        assert!(tree.delete(5));
        assert!(tree.delete(5));
        assert!(tree.delete(5));
        assert!(!tree.delete(5));
        assert!(tree.is_empty());
    }

    #[test]
    fn sorted_inserts_stay_logarithmic() {
        let mut tree = RbTree::new();
        for key in 0..1000 {
            tree.insert(key);
        }
        assert_valid(&tree);
        let bound = 2.0 * (tree.len() as f64 + 1.0).log2();
        assert!(
            (tree.height() as f64) <= bound,
            "height {} exceeds {}",
            tree.height(),
            bound
        );
    }

    #[test]
    fn delete_on_empty_returns_false() {
        let mut tree = RbTree::new();
        assert!(!tree.delete(42));
        assert!(tree.is_empty());
        assert_valid(&tree);
    }

    #[test]
    fn delete_missing_key_is_a_no_op() {
        let mut tree = RbTree::new();
        for key in [3, 1, 4, 1, 5] {
            tree.insert(key);
        }
        let before = tree.preorder();
        assert!(!tree.delete(9));
        assert_eq!(tree.preorder(), before);
    }

    #[test]
    fn delete_root_with_two_children() {
        let mut tree = RbTree::new();
        for key in [20, 10, 30] {
            tree.insert(key);
        }
        assert!(tree.delete(20));
        assert_valid(&tree);
        assert!(!tree.contains(20));
        assert!(tree.contains(10));
        assert!(tree.contains(30));
    }

    #[test]
    fn delete_down_to_empty() {
        let mut tree = RbTree::new();
        for key in 0..64 {
            tree.insert(key);
        }
        for key in 0..64 {
            assert!(tree.delete(key), "missing {}", key);
            assert_valid(&tree);
            assert!(!tree.contains(key));
        }
        assert!(tree.is_empty());
        assert_eq!(tree.height(), 0);
    }

    #[test]
    fn interleaved_inserts_and_deletes() {
        let mut tree = RbTree::new();
        for key in 0..200 {
            tree.insert(key * 7 % 101);
            if key % 3 == 0 {
                tree.delete(key % 50);
            }
            assert_valid(&tree);
        }
    }

    #[test]
    fn freed_slots_are_reused() {
        let mut tree = RbTree::new();
        tree.insert(1);
        tree.insert(2);
        tree.insert(3);
        let slots = tree.nodes.len();
        tree.delete(2);
        tree.insert(4);
        assert_eq!(tree.nodes.len(), slots);
        assert_valid(&tree);
    }

    #[test]
    fn preorder_is_node_left_right() {
        let mut tree = RbTree::new();
        for key in [4, 2, 6, 1, 3, 5, 7] {
            tree.insert(key);
        }
        let keys: Vec<i64> = tree.keys();
        assert_eq!(keys, vec![4, 2, 1, 3, 6, 5, 7]);
    }

    #[test]
    fn contains_is_stable_without_mutation() {
        let mut tree = RbTree::new();
        tree.insert(8);
        for _ in 0..10 {
            assert!(tree.contains(8));
            assert!(!tree.contains(9));
        }
    }
}

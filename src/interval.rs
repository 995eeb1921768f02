//! Augmented interval index over span ranges.
//!
//! # Why a balanced tree
//!
//! Every mutation of a field's spans triggers overlap queries (schema
//! checks, segment recomputation, hit testing). A linear scan is fine for
//! a handful of spans but degrades on densely annotated fields; the
//! classic fix is an interval tree: a balanced search tree ordered by
//! `start`, where every node caches `max_high`, the maximum `end` in its
//! subtree, so whole subtrees can be pruned during overlap queries.
//!
//! ```text
//! ┌───────────────────────────────────────────────────────────────┐
//! │  query [qs, qe)                                               │
//! │                                                               │
//! │  prune left subtree   when left.max_high <= qs                │
//! │    (nothing on the left reaches far enough right)             │
//! │  prune right subtree  when qe <= node.start                   │
//! │    (everything on the right starts at/after node.start)       │
//! └───────────────────────────────────────────────────────────────┘
//! ```
//!
//! # Representation
//!
//! Nodes live in a flat arena (`Vec<Node>`) linked by `u32` slot indices
//! with a `NIL` sentinel; parent links are plain indices, so there is no
//! cyclic ownership to manage and freed slots go on a free list for
//! reuse. Balancing is red-black; the primary correctness hazard is a
//! stale `max_high` after a rotation or transplant, so every structural
//! change recomputes the cache bottom-up before the operation returns.
//!
//! Ordering is `(start, end, seq)` where `seq` is an insertion-order
//! tiebreak. This keeps identical ranges (including duplicate zero-width
//! markers) distinguishable and makes iteration order deterministic.
//!
//! # Performance
//!
//! - Insert / remove: O(log n)
//! - Overlap query: O(log n + k), k = result count
//! - `iter_from`: O(log n) to position, O(1) amortized per step

use std::collections::HashMap;

use crate::span::SpanId;

/// Sentinel slot index for "no node".
const NIL: u32 = u32::MAX;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Color {
    Red,
    Black,
}

#[derive(Debug, Clone)]
struct Node {
    id: SpanId,
    start: usize,
    end: usize,
    /// Insertion-order tiebreak for identical `(start, end)` keys.
    seq: u64,
    /// Maximum `end` across this node's subtree.
    max_high: usize,
    left: u32,
    right: u32,
    parent: u32,
    color: Color,
}

/// An entry stored in the index: a span id plus its interval.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// Id of the indexed span.
    pub id: SpanId,
    /// Start offset (characters, inclusive).
    pub start: usize,
    /// End offset (characters, exclusive).
    pub end: usize,
}

/// Augmented red-black interval tree keyed by `[start, end)` ranges.
///
/// One index exists per field; indices for different fields never
/// interact. The index stores span ids, not span records; the owning
/// [`crate::store::SpanStore`] resolves ids back to full records.
#[derive(Debug, Clone, Default)]
pub struct IntervalIndex {
    nodes: Vec<Node>,
    root: u32,
    free: Vec<u32>,
    slots: HashMap<SpanId, u32>,
    next_seq: u64,
}

impl IntervalIndex {
    /// Create an empty index.
    #[must_use]
    pub fn new() -> Self {
        Self {
            nodes: Vec::new(),
            root: NIL,
            free: Vec::new(),
            slots: HashMap::new(),
            next_seq: 0,
        }
    }

    /// Number of indexed spans.
    #[must_use]
    pub fn len(&self) -> usize {
        self.slots.len()
    }

    /// Check if the index is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.slots.is_empty()
    }

    /// Insert a span's interval. Returns the arena slot as an opaque handle.
    ///
    /// Duplicate ranges are allowed; the caller guarantees `id` is unique
    /// (re-inserting a live id first removes the old entry).
    pub fn insert(&mut self, id: SpanId, start: usize, end: usize) -> u32 {
        if self.slots.contains_key(&id) {
            self.remove(id);
        }
        let seq = self.next_seq;
        self.next_seq += 1;
        let z = self.alloc(Node {
            id,
            start,
            end,
            seq,
            max_high: end,
            left: NIL,
            right: NIL,
            parent: NIL,
            color: Color::Red,
        });
        self.slots.insert(id, z);

        // Standard BST insertion on (start, end, seq).
        let mut y = NIL;
        let mut x = self.root;
        while x != NIL {
            y = x;
            x = if self.key(z) < self.key(x) {
                self.nodes[x as usize].left
            } else {
                self.nodes[x as usize].right
            };
        }
        self.nodes[z as usize].parent = y;
        if y == NIL {
            self.root = z;
        } else if self.key(z) < self.key(y) {
            self.nodes[y as usize].left = z;
        } else {
            self.nodes[y as usize].right = z;
        }
        self.update_upward(y);
        self.insert_fixup(z);
        z
    }

    /// Remove a span's interval by id. Returns `false` if absent.
    pub fn remove(&mut self, id: SpanId) -> bool {
        match self.slots.remove(&id) {
            Some(slot) => {
                self.remove_slot(slot);
                true
            }
            None => false,
        }
    }

    /// Remove by the handle returned from [`IntervalIndex::insert`].
    ///
    /// Returns `false` if the handle no longer refers to a live entry.
    pub fn remove_handle(&mut self, handle: u32) -> bool {
        let Some(node) = self.nodes.get(handle as usize) else {
            return false;
        };
        if self.slots.get(&node.id) != Some(&handle) {
            return false;
        }
        let id = node.id;
        self.slots.remove(&id);
        self.remove_slot(handle);
        true
    }

    /// Whether any stored interval equals `[start, end)` exactly.
    #[must_use]
    pub fn contains(&self, start: usize, end: usize) -> bool {
        let mut n = self.root;
        while n != NIL {
            let node = &self.nodes[n as usize];
            if (start, end) == (node.start, node.end) {
                return true;
            }
            n = if (start, end) < (node.start, node.end) {
                node.left
            } else {
                node.right
            };
        }
        false
    }

    /// Interval of a live span id, if indexed.
    #[must_use]
    pub fn get(&self, id: SpanId) -> Option<IndexEntry> {
        self.slots.get(&id).map(|&slot| {
            let node = &self.nodes[slot as usize];
            IndexEntry {
                id: node.id,
                start: node.start,
                end: node.end,
            }
        })
    }

    /// All stored span ids whose interval intersects `[start, end)`,
    /// ascending by `(start, end, seq)`.
    ///
    /// Half-open intersection: touching intervals do not match, and
    /// zero-width intervals never match anything.
    #[must_use]
    pub fn query_overlapping(&self, start: usize, end: usize) -> Vec<SpanId> {
        let mut out = Vec::new();
        self.collect_overlapping(self.root, start, end, &mut out);
        out
    }

    /// Restartable ascending iteration over entries with `start >= from`,
    /// ordered by `(start, end, seq)`.
    #[must_use]
    pub fn iter_from(&self, from: usize) -> IterFrom<'_> {
        // Leftmost node with start >= from.
        let mut first = NIL;
        let mut n = self.root;
        while n != NIL {
            let node = &self.nodes[n as usize];
            if node.start >= from {
                first = n;
                n = node.left;
            } else {
                n = node.right;
            }
        }
        IterFrom {
            index: self,
            next: first,
        }
    }

    /// All entries in ascending order. Equivalent to `iter_from(0)`.
    #[must_use]
    pub fn iter(&self) -> IterFrom<'_> {
        self.iter_from(0)
    }

    // =========================================================================
    // Internals
    // =========================================================================

    fn key(&self, n: u32) -> (usize, usize, u64) {
        let node = &self.nodes[n as usize];
        (node.start, node.end, node.seq)
    }

    fn alloc(&mut self, node: Node) -> u32 {
        if let Some(slot) = self.free.pop() {
            self.nodes[slot as usize] = node;
            slot
        } else {
            self.nodes.push(node);
            (self.nodes.len() - 1) as u32
        }
    }

    fn max_high(&self, n: u32) -> usize {
        if n == NIL {
            0
        } else {
            self.nodes[n as usize].max_high
        }
    }

    fn is_black(&self, n: u32) -> bool {
        n == NIL || self.nodes[n as usize].color == Color::Black
    }

    fn recompute(&mut self, n: u32) {
        let (left, right, end) = {
            let node = &self.nodes[n as usize];
            (node.left, node.right, node.end)
        };
        let mh = end.max(self.max_high(left)).max(self.max_high(right));
        self.nodes[n as usize].max_high = mh;
    }

    /// Recompute `max_high` from `n` up to the root. Called after every
    /// structural change; the rotations keep themselves locally correct,
    /// so one upward pass from the lowest changed node suffices.
    fn update_upward(&mut self, mut n: u32) {
        while n != NIL {
            self.recompute(n);
            n = self.nodes[n as usize].parent;
        }
    }

    fn rotate_left(&mut self, x: u32) {
        let y = self.nodes[x as usize].right;
        let y_left = self.nodes[y as usize].left;
        self.nodes[x as usize].right = y_left;
        if y_left != NIL {
            self.nodes[y_left as usize].parent = x;
        }
        let xp = self.nodes[x as usize].parent;
        self.nodes[y as usize].parent = xp;
        if xp == NIL {
            self.root = y;
        } else if self.nodes[xp as usize].left == x {
            self.nodes[xp as usize].left = y;
        } else {
            self.nodes[xp as usize].right = y;
        }
        self.nodes[y as usize].left = x;
        self.nodes[x as usize].parent = y;
        // y now covers x's old subtree, so nothing above y changes.
        self.recompute(x);
        self.recompute(y);
    }

    fn rotate_right(&mut self, x: u32) {
        let y = self.nodes[x as usize].left;
        let y_right = self.nodes[y as usize].right;
        self.nodes[x as usize].left = y_right;
        if y_right != NIL {
            self.nodes[y_right as usize].parent = x;
        }
        let xp = self.nodes[x as usize].parent;
        self.nodes[y as usize].parent = xp;
        if xp == NIL {
            self.root = y;
        } else if self.nodes[xp as usize].left == x {
            self.nodes[xp as usize].left = y;
        } else {
            self.nodes[xp as usize].right = y;
        }
        self.nodes[y as usize].right = x;
        self.nodes[x as usize].parent = y;
        self.recompute(x);
        self.recompute(y);
    }

    fn insert_fixup(&mut self, mut z: u32) {
        while {
            let zp = self.nodes[z as usize].parent;
            zp != NIL && self.nodes[zp as usize].color == Color::Red
        } {
            let zp = self.nodes[z as usize].parent;
            let zpp = self.nodes[zp as usize].parent;
            if zp == self.nodes[zpp as usize].left {
                let uncle = self.nodes[zpp as usize].right;
                if !self.is_black(uncle) {
                    self.nodes[zp as usize].color = Color::Black;
                    self.nodes[uncle as usize].color = Color::Black;
                    self.nodes[zpp as usize].color = Color::Red;
                    z = zpp;
                } else {
                    if z == self.nodes[zp as usize].right {
                        z = zp;
                        self.rotate_left(z);
                    }
                    let zp = self.nodes[z as usize].parent;
                    let zpp = self.nodes[zp as usize].parent;
                    self.nodes[zp as usize].color = Color::Black;
                    self.nodes[zpp as usize].color = Color::Red;
                    self.rotate_right(zpp);
                }
            } else {
                let uncle = self.nodes[zpp as usize].left;
                if !self.is_black(uncle) {
                    self.nodes[zp as usize].color = Color::Black;
                    self.nodes[uncle as usize].color = Color::Black;
                    self.nodes[zpp as usize].color = Color::Red;
                    z = zpp;
                } else {
                    if z == self.nodes[zp as usize].left {
                        z = zp;
                        self.rotate_right(z);
                    }
                    let zp = self.nodes[z as usize].parent;
                    let zpp = self.nodes[zp as usize].parent;
                    self.nodes[zp as usize].color = Color::Black;
                    self.nodes[zpp as usize].color = Color::Red;
                    self.rotate_left(zpp);
                }
            }
        }
        self.nodes[self.root as usize].color = Color::Black;
    }

    /// Replace the subtree rooted at `u` with the subtree rooted at `v`.
    fn transplant(&mut self, u: u32, v: u32) {
        let up = self.nodes[u as usize].parent;
        if up == NIL {
            self.root = v;
        } else if self.nodes[up as usize].left == u {
            self.nodes[up as usize].left = v;
        } else {
            self.nodes[up as usize].right = v;
        }
        if v != NIL {
            self.nodes[v as usize].parent = up;
        }
    }

    fn minimum(&self, mut n: u32) -> u32 {
        while self.nodes[n as usize].left != NIL {
            n = self.nodes[n as usize].left;
        }
        n
    }

    fn remove_slot(&mut self, z: u32) {
        let mut y = z;
        let mut y_color = self.nodes[y as usize].color;
        let x;
        let x_parent;

        let z_left = self.nodes[z as usize].left;
        let z_right = self.nodes[z as usize].right;
        if z_left == NIL {
            x = z_right;
            x_parent = self.nodes[z as usize].parent;
            self.transplant(z, z_right);
        } else if z_right == NIL {
            x = z_left;
            x_parent = self.nodes[z as usize].parent;
            self.transplant(z, z_left);
        } else {
            y = self.minimum(z_right);
            y_color = self.nodes[y as usize].color;
            x = self.nodes[y as usize].right;
            if self.nodes[y as usize].parent == z {
                x_parent = y;
            } else {
                x_parent = self.nodes[y as usize].parent;
                self.transplant(y, x);
                let zr = self.nodes[z as usize].right;
                self.nodes[y as usize].right = zr;
                self.nodes[zr as usize].parent = y;
            }
            self.transplant(z, y);
            let zl = self.nodes[z as usize].left;
            self.nodes[y as usize].left = zl;
            self.nodes[zl as usize].parent = y;
            self.nodes[y as usize].color = self.nodes[z as usize].color;
        }

        // The lowest structurally changed node is x's parent; everything
        // above it (including a transplanted y) is on the path to root.
        self.update_upward(x_parent);
        if y_color == Color::Black {
            self.delete_fixup(x, x_parent);
        }
        self.free.push(z);
    }

    fn delete_fixup(&mut self, mut x: u32, mut xp: u32) {
        while x != self.root && self.is_black(x) {
            if xp == NIL {
                break;
            }
            if x == self.nodes[xp as usize].left {
                let mut w = self.nodes[xp as usize].right;
                if !self.is_black(w) {
                    self.nodes[w as usize].color = Color::Black;
                    self.nodes[xp as usize].color = Color::Red;
                    self.rotate_left(xp);
                    w = self.nodes[xp as usize].right;
                }
                let wl = self.nodes[w as usize].left;
                let wr = self.nodes[w as usize].right;
                if self.is_black(wl) && self.is_black(wr) {
                    self.nodes[w as usize].color = Color::Red;
                    x = xp;
                    xp = self.nodes[x as usize].parent;
                } else {
                    if self.is_black(wr) {
                        self.nodes[wl as usize].color = Color::Black;
                        self.nodes[w as usize].color = Color::Red;
                        self.rotate_right(w);
                        w = self.nodes[xp as usize].right;
                    }
                    self.nodes[w as usize].color = self.nodes[xp as usize].color;
                    self.nodes[xp as usize].color = Color::Black;
                    let wr = self.nodes[w as usize].right;
                    self.nodes[wr as usize].color = Color::Black;
                    self.rotate_left(xp);
                    x = self.root;
                    xp = NIL;
                }
            } else {
                let mut w = self.nodes[xp as usize].left;
                if !self.is_black(w) {
                    self.nodes[w as usize].color = Color::Black;
                    self.nodes[xp as usize].color = Color::Red;
                    self.rotate_right(xp);
                    w = self.nodes[xp as usize].left;
                }
                let wl = self.nodes[w as usize].left;
                let wr = self.nodes[w as usize].right;
                if self.is_black(wl) && self.is_black(wr) {
                    self.nodes[w as usize].color = Color::Red;
                    x = xp;
                    xp = self.nodes[x as usize].parent;
                } else {
                    if self.is_black(wl) {
                        self.nodes[wr as usize].color = Color::Black;
                        self.nodes[w as usize].color = Color::Red;
                        self.rotate_left(w);
                        w = self.nodes[xp as usize].left;
                    }
                    self.nodes[w as usize].color = self.nodes[xp as usize].color;
                    self.nodes[xp as usize].color = Color::Black;
                    let wl = self.nodes[w as usize].left;
                    self.nodes[wl as usize].color = Color::Black;
                    self.rotate_right(xp);
                    x = self.root;
                    xp = NIL;
                }
            }
        }
        if x != NIL {
            self.nodes[x as usize].color = Color::Black;
        }
    }

    fn collect_overlapping(&self, n: u32, start: usize, end: usize, out: &mut Vec<SpanId>) {
        if n == NIL {
            return;
        }
        let node = &self.nodes[n as usize];
        // In-order traversal with subtree pruning keeps output sorted.
        if self.max_high(node.left) > start {
            self.collect_overlapping(node.left, start, end, out);
        }
        // Strict max < min: empty intervals (and empty queries) never
        // intersect anything.
        if node.start.max(start) < node.end.min(end) {
            out.push(node.id);
        }
        if node.start < end {
            self.collect_overlapping(node.right, start, end, out);
        }
    }

    fn successor(&self, n: u32) -> u32 {
        let right = self.nodes[n as usize].right;
        if right != NIL {
            return self.minimum(right);
        }
        let mut cur = n;
        let mut p = self.nodes[cur as usize].parent;
        while p != NIL && self.nodes[p as usize].right == cur {
            cur = p;
            p = self.nodes[p as usize].parent;
        }
        p
    }

    /// Audit the tree: BST order, red-black properties, and `max_high`
    /// freshness. Used by the property-test suite; a stale `max_high`
    /// would silently drop overlap matches, so this checks it exactly.
    #[doc(hidden)]
    pub fn self_check(&self) -> std::result::Result<(), String> {
        if self.root == NIL {
            if !self.slots.is_empty() {
                return Err("empty tree with live slots".into());
            }
            return Ok(());
        }
        if self.nodes[self.root as usize].color != Color::Black {
            return Err("root is red".into());
        }
        if self.nodes[self.root as usize].parent != NIL {
            return Err("root has a parent".into());
        }
        let mut count = 0usize;
        self.check_node(self.root, None, None, &mut count)?;
        if count != self.slots.len() {
            return Err(format!(
                "node count {count} != slot count {}",
                self.slots.len()
            ));
        }
        Ok(())
    }

    /// Returns the black height of the subtree; validates ordering bounds,
    /// parent links, color constraints, and `max_high` along the way.
    fn check_node(
        &self,
        n: u32,
        min: Option<(usize, usize, u64)>,
        max: Option<(usize, usize, u64)>,
        count: &mut usize,
    ) -> std::result::Result<usize, String> {
        if n == NIL {
            return Ok(1);
        }
        *count += 1;
        let node = &self.nodes[n as usize];
        let key = (node.start, node.end, node.seq);
        if let Some(lo) = min {
            if key < lo {
                return Err(format!("order violation at slot {n}"));
            }
        }
        if let Some(hi) = max {
            if key >= hi {
                return Err(format!("order violation at slot {n}"));
            }
        }
        if node.color == Color::Red
            && (!self.is_black(node.left) || !self.is_black(node.right))
        {
            return Err(format!("red-red violation at slot {n}"));
        }
        for child in [node.left, node.right] {
            if child != NIL && self.nodes[child as usize].parent != n {
                return Err(format!("bad parent link under slot {n}"));
            }
        }
        let expect_mh = node
            .end
            .max(self.max_high(node.left))
            .max(self.max_high(node.right));
        if node.max_high != expect_mh {
            return Err(format!(
                "stale max_high at slot {n}: {} != {expect_mh}",
                node.max_high
            ));
        }
        let lh = self.check_node(node.left, min, Some(key), count)?;
        let rh = self.check_node(node.right, Some(key), max, count)?;
        if lh != rh {
            return Err(format!("black height mismatch at slot {n}"));
        }
        Ok(lh + usize::from(node.color == Color::Black))
    }
}

/// Ascending iterator over [`IndexEntry`] values, produced by
/// [`IntervalIndex::iter_from`]. Restartable: each call to `iter_from`
/// yields a fresh, independent iterator.
#[derive(Debug)]
pub struct IterFrom<'a> {
    index: &'a IntervalIndex,
    next: u32,
}

impl Iterator for IterFrom<'_> {
    type Item = IndexEntry;

    fn next(&mut self) -> Option<IndexEntry> {
        if self.next == NIL {
            return None;
        }
        let node = &self.index.nodes[self.next as usize];
        let entry = IndexEntry {
            id: node.id,
            start: node.start,
            end: node.end,
        };
        self.next = self.index.successor(self.next);
        Some(entry)
    }
}

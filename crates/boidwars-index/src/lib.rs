//! Quadtree spatial index over 2D point entries.
//!
//! The tree is rebuilt from scratch whenever positions change materially;
//! entries carry an opaque key back into the caller's storage and are only
//! meaningful for the build they were inserted into.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Entries a node holds before it subdivides.
pub const DEFAULT_MAX_ENTRIES: usize = 8;
/// Deepest subdivision level; nodes at this depth never split.
pub const DEFAULT_MAX_DEPTH: usize = 6;

/// Errors emitted by spatial index construction.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum IndexError {
    /// Indicates limit or bounds values that cannot be used.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Axis-aligned rectangle with half-open containment `[x, x+w) x [y, y+h)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub w: f32,
    pub h: f32,
}

impl Rect {
    /// Construct a rectangle from its origin and extent.
    #[must_use]
    pub const fn new(x: f32, y: f32, w: f32, h: f32) -> Self {
        Self { x, y, w, h }
    }

    /// Square query window of half-width `half` centered on `(cx, cy)`.
    #[must_use]
    pub fn centered(cx: f32, cy: f32, half: f32) -> Self {
        Self {
            x: cx - half,
            y: cy - half,
            w: half * 2.0,
            h: half * 2.0,
        }
    }

    /// Half-open containment test.
    #[must_use]
    pub fn contains(&self, px: f32, py: f32) -> bool {
        px >= self.x && px < self.x + self.w && py >= self.y && py < self.y + self.h
    }

    /// Axis-aligned overlap test.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        !(other.x > self.x + self.w
            || other.x + other.w < self.x
            || other.y > self.y + self.h
            || other.y + other.h < self.y)
    }
}

/// A point entry: an opaque key plus the position it was indexed at.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Entry<K> {
    pub key: K,
    pub x: f32,
    pub y: f32,
}

impl<K> Entry<K> {
    /// Construct an entry for `key` at `(x, y)`.
    #[must_use]
    pub const fn new(key: K, x: f32, y: f32) -> Self {
        Self { key, x, y }
    }
}

/// Quadtree over point entries.
///
/// A node stores entries locally until it reaches `max_entries`, then
/// subdivides once into four equal quadrants; overflow entries are offered to
/// every child and retained by the quadrant(s) containing them. Entries stored
/// before the split stay where they are.
#[derive(Debug)]
pub struct QuadTree<K> {
    bounds: Rect,
    depth: usize,
    max_entries: usize,
    max_depth: usize,
    entries: Vec<Entry<K>>,
    children: Option<Box<[QuadTree<K>; 4]>>,
}

impl<K: Copy> QuadTree<K> {
    /// Create a tree over `bounds` with the default limits.
    #[must_use]
    pub fn new(bounds: Rect) -> Self {
        Self::node(bounds, 0, DEFAULT_MAX_ENTRIES, DEFAULT_MAX_DEPTH)
    }

    /// Create a tree over `bounds` with explicit subdivision limits.
    pub fn with_limits(
        bounds: Rect,
        max_entries: usize,
        max_depth: usize,
    ) -> Result<Self, IndexError> {
        if bounds.w <= 0.0 || bounds.h <= 0.0 {
            return Err(IndexError::InvalidConfig("bounds must have positive extent"));
        }
        if max_entries == 0 {
            return Err(IndexError::InvalidConfig("max_entries must be non-zero"));
        }
        Ok(Self::node(bounds, 0, max_entries, max_depth))
    }

    fn node(bounds: Rect, depth: usize, max_entries: usize, max_depth: usize) -> Self {
        Self {
            bounds,
            depth,
            max_entries,
            max_depth,
            entries: Vec::with_capacity(max_entries),
            children: None,
        }
    }

    /// The region this node covers.
    #[must_use]
    pub const fn bounds(&self) -> Rect {
        self.bounds
    }

    /// Drop all entries and children, returning to an empty leaf.
    pub fn clear(&mut self) {
        self.entries.clear();
        self.children = None;
    }

    /// Insert an entry. Points outside this node's bounds are silently dropped.
    pub fn insert(&mut self, entry: Entry<K>) {
        if !self.bounds.contains(entry.x, entry.y) {
            return;
        }

        if self.entries.len() < self.max_entries || self.depth >= self.max_depth {
            self.entries.push(entry);
            return;
        }

        if self.children.is_none() {
            self.subdivide();
        }
        if let Some(children) = self.children.as_mut() {
            for child in children.iter_mut() {
                child.insert(entry);
            }
        }
    }

    /// Append every indexed entry whose point lies within `range` to `out`.
    ///
    /// Result order is unspecified; entries are never duplicated because a
    /// point belongs to exactly one quadrant once a node has subdivided.
    pub fn query(&self, range: &Rect, out: &mut Vec<Entry<K>>) {
        if !self.bounds.intersects(range) {
            return;
        }

        for entry in &self.entries {
            if range.contains(entry.x, entry.y) {
                out.push(*entry);
            }
        }

        if let Some(children) = self.children.as_ref() {
            for child in children.iter() {
                child.query(range, out);
            }
        }
    }

    fn subdivide(&mut self) {
        let hw = self.bounds.w * 0.5;
        let hh = self.bounds.h * 0.5;
        let x = self.bounds.x;
        let y = self.bounds.y;
        let depth = self.depth + 1;
        let quadrant = |qx, qy| {
            Self::node(
                Rect::new(qx, qy, hw, hh),
                depth,
                self.max_entries,
                self.max_depth,
            )
        };
        self.children = Some(Box::new([
            quadrant(x, y),
            quadrant(x + hw, y),
            quadrant(x, y + hh),
            quadrant(x + hw, y + hh),
        ]));
    }
}

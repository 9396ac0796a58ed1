//! QuadTree for broad-phase neighbor queries.
//!
//! Nodes live in a flat arena indexed by position. `clear()` drops every
//! child node and leaves an empty root. A node splits into four quadrants once it holds more than
//! `max_items` and its level is below `max_level`. Items that straddle a
//! quadrant boundary stay in the parent node; nothing is ever duplicated.

use protocol::EntityId;

/// Axis-aligned bounding box.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Bounds {
    pub min_x: f32,
    pub min_y: f32,
    pub max_x: f32,
    pub max_y: f32,
}

impl Bounds {
    pub fn new(min_x: f32, min_y: f32, max_x: f32, max_y: f32) -> Self {
        Self { min_x, min_y, max_x, max_y }
    }

    /// Create bounds from a circle.
    #[inline]
    pub fn from_circle(cx: f32, cy: f32, radius: f32) -> Self {
        Self {
            min_x: cx - radius,
            min_y: cy - radius,
            max_x: cx + radius,
            max_y: cy + radius,
        }
    }

    /// Check if two bounds intersect (touching edges count).
    #[inline]
    pub fn intersects(&self, other: &Bounds) -> bool {
        !(other.min_x > self.max_x
            || other.max_x < self.min_x
            || other.min_y > self.max_y
            || other.max_y < self.min_y)
    }

    #[inline]
    pub fn center_x(&self) -> f32 {
        (self.min_x + self.max_x) / 2.0
    }

    #[inline]
    pub fn center_y(&self) -> f32 {
        (self.min_y + self.max_y) / 2.0
    }

    /// The four quadrants: top-right, top-left, bottom-left, bottom-right.
    fn quadrants(&self) -> [Bounds; 4] {
        let cx = self.center_x();
        let cy = self.center_y();
        [
            Bounds::new(cx, self.min_y, self.max_x, cy),
            Bounds::new(self.min_x, self.min_y, cx, cy),
            Bounds::new(self.min_x, cy, cx, self.max_y),
            Bounds::new(cx, cy, self.max_x, self.max_y),
        ]
    }

    /// Index of the quadrant that fully contains `item`, if any.
    fn quadrant_of(&self, item: &Bounds) -> Option<usize> {
        let cx = self.center_x();
        let cy = self.center_y();
        let top = item.max_y < cy;
        let bottom = item.min_y > cy;
        let left = item.max_x < cx;
        let right = item.min_x > cx;

        match (top, bottom, left, right) {
            (true, _, _, true) => Some(0),
            (true, _, true, _) => Some(1),
            (_, true, true, _) => Some(2),
            (_, true, _, true) => Some(3),
            _ => None,
        }
    }
}

/// An item stored in the QuadTree.
#[derive(Debug, Clone, Copy)]
pub struct QuadItem {
    pub id: EntityId,
    /// Bounding box of the entity's circle.
    pub bound: Bounds,
}

impl QuadItem {
    pub fn new(id: EntityId, x: f32, y: f32, radius: f32) -> Self {
        Self {
            id,
            bound: Bounds::from_circle(x, y, radius),
        }
    }
}

#[derive(Debug, Clone)]
struct QuadNode {
    bound: Bounds,
    level: u32,
    items: Vec<QuadItem>,
    /// Arena indices of the four children, once split.
    children: Option<[usize; 4]>,
}

impl QuadNode {
    fn new(bound: Bounds, level: u32) -> Self {
        Self {
            bound,
            level,
            items: Vec::new(),
            children: None,
        }
    }
}

/// Region quadtree over the world bounds.
#[derive(Debug, Clone)]
pub struct QuadTree {
    nodes: Vec<QuadNode>,
    max_items: usize,
    max_level: u32,
    len: usize,
}

impl QuadTree {
    /// Items per node before it splits.
    pub const DEFAULT_MAX_ITEMS: usize = 15;
    /// Maximum depth of the tree.
    pub const DEFAULT_MAX_LEVEL: u32 = 6;

    pub fn new(bound: Bounds, max_items: usize, max_level: u32) -> Self {
        Self {
            nodes: vec![QuadNode::new(bound, 0)],
            max_items: max_items.max(1),
            max_level,
            len: 0,
        }
    }

    /// Create a tree covering the world with default limits.
    pub fn for_world(width: f32, height: f32) -> Self {
        Self::new(
            Bounds::new(0.0, 0.0, width, height),
            Self::DEFAULT_MAX_ITEMS,
            Self::DEFAULT_MAX_LEVEL,
        )
    }

    /// Insert an item.
    pub fn insert(&mut self, item: QuadItem) {
        self.len += 1;
        self.insert_at(0, item);
    }

    fn insert_at(&mut self, mut index: usize, item: QuadItem) {
        while let Some(children) = self.nodes[index].children {
            match self.nodes[index].bound.quadrant_of(&item.bound) {
                Some(q) => index = children[q],
                None => break,
            }
        }

        self.nodes[index].items.push(item);

        let node = &self.nodes[index];
        if node.children.is_none() && node.items.len() > self.max_items && node.level < self.max_level {
            self.split(index);
        }
    }

    /// Split a leaf and push down every item that fits a quadrant.
    fn split(&mut self, index: usize) {
        let level = self.nodes[index].level + 1;
        let quadrants = self.nodes[index].bound.quadrants();

        let first = self.nodes.len();
        for bound in quadrants {
            self.nodes.push(QuadNode::new(bound, level));
        }
        let children = [first, first + 1, first + 2, first + 3];
        self.nodes[index].children = Some(children);

        let items = std::mem::take(&mut self.nodes[index].items);
        for item in items {
            match self.nodes[index].bound.quadrant_of(&item.bound) {
                Some(q) => self.insert_at(children[q], item),
                None => self.nodes[index].items.push(item),
            }
        }
    }

    /// Broad-phase query: every item in a node whose region intersects `region`.
    ///
    /// The result is a superset of the items overlapping `region`; callers must
    /// re-check exact overlap.
    pub fn query(&self, region: &Bounds, out: &mut Vec<EntityId>) {
        let mut stack = vec![0usize];
        while let Some(index) = stack.pop() {
            let node = &self.nodes[index];
            out.extend(node.items.iter().map(|item| item.id));
            if let Some(children) = node.children {
                for child in children {
                    if self.nodes[child].bound.intersects(region) {
                        stack.push(child);
                    }
                }
            }
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Remove every item and collapse to a single root node.
    pub fn clear(&mut self) {
        self.nodes.truncate(1);
        let root = &mut self.nodes[0];
        root.items.clear();
        root.children = None;
        self.len = 0;
    }
}

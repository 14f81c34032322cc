//! Spatial indexing for nearest-of-type queries.
//!
//! An adaptive quad-tree over the world rectangle, rebuilt from scratch every
//! tick. Cells and point blocks live in fixed-size arenas addressed by index;
//! [`SpatialIndex::clear`] resets the arenas without releasing their memory.
//!
//! A leaf stores its points in a chain of blocks. Above `depth_max` a leaf
//! splits into four children as soon as its block fills; at `depth_max` it
//! grows by chaining another block instead.

use geo::{Point, Rect, coord};

use super::error::SpatialError;
use super::host::{EntityId, Template};
use super::params::Params;

/// How far a point may sit outside its cell rectangle due to float rounding
/// when the nearest query prunes by rectangle distance.
const BOUNDS_SLACK: f32 = 1e-3;

/// A positioned, typed entity registered for a single tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackedPoint {
    /// Entity the point belongs to.
    pub entity: EntityId,
    /// Tracking type.
    pub kind: Template,
    /// Position as (x, z).
    pub pos: Point<f32>,
}

impl TrackedPoint {
    const EMPTY: Self = Self {
        entity: EntityId(0),
        kind: Template::Food,
        pos: Point(coord! { x: 0.0, y: 0.0 }),
    };
}

#[derive(Debug, Clone, Copy, Default)]
struct Cell {
    /// Four consecutive arena slots, ordered `iz * 2 + ix`.
    children: Option<[u32; 4]>,
    /// Head of the block chain while this cell is a leaf.
    block: Option<u32>,
}

#[derive(Debug, Clone, Copy, Default)]
struct Block {
    len: u32,
    /// Next block in the leaf chain, or in the free list.
    next: Option<u32>,
}

/// Snapshot of one leaf, for diagnostics and tests.
#[derive(Debug, Clone)]
pub struct Leaf {
    /// Rectangle covered by the leaf.
    pub rect: Rect<f32>,
    /// Depth below the root (root is 0).
    pub depth: u32,
    /// Point count of every block in the chain, in chain order.
    pub block_lens: Vec<usize>,
    /// All points of the leaf in storage order.
    pub points: Vec<TrackedPoint>,
}

/// Arena usage after a rebuild.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct IndexUsage {
    /// Points inserted since the last clear.
    pub points: usize,
    /// Cells in use, root included.
    pub cells: usize,
    /// Blocks currently holding points.
    pub blocks: usize,
}

/// Quad-tree point index with pooled cell and block storage.
#[derive(Debug, Clone)]
pub struct SpatialIndex {
    root: Rect<f32>,
    cells: Vec<Cell>,
    cell_count: usize,
    blocks: Vec<Block>,
    /// Block `b` owns `points[b * block_entity_capacity..][..block_entity_capacity]`.
    points: Vec<TrackedPoint>,
    free_block: Option<u32>,
    blocks_in_use: usize,
    block_entity_capacity: usize,
    depth_max: u32,
    len: usize,
}

impl SpatialIndex {
    /// Creates an index covering `root` with the given arena sizes.
    ///
    /// # Arguments
    ///
    /// * `root` - World rectangle; inserted points must lie strictly inside it
    /// * `cell_capacity` - Maximum number of cells, root included
    /// * `block_capacity` - Maximum number of point blocks
    /// * `block_entity_capacity` - Points per block
    /// * `depth_max` - Depth at which leaves stop splitting
    ///
    /// # Panics
    ///
    /// Panics if `block_entity_capacity` is zero.
    pub fn new(
        root: Rect<f32>,
        cell_capacity: usize,
        block_capacity: usize,
        block_entity_capacity: usize,
        depth_max: u32,
    ) -> Self {
        assert!(block_entity_capacity > 0, "blocks must hold at least one point");
        let mut index = Self {
            root,
            cells: vec![Cell::default(); cell_capacity.max(1)],
            cell_count: 1,
            blocks: vec![Block::default(); block_capacity],
            points: vec![TrackedPoint::EMPTY; block_capacity * block_entity_capacity],
            free_block: None,
            blocks_in_use: 0,
            block_entity_capacity,
            depth_max,
            len: 0,
        };
        index.clear();
        index
    }

    /// Creates an index sized and shaped from simulation parameters.
    pub fn from_params(params: &Params) -> Self {
        let (hw, hh) = params.half_extents();
        Self::new(
            Rect::new(coord! { x: -hw, y: -hh }, coord! { x: hw, y: hh }),
            params.cell_capacity,
            params.block_capacity,
            params.block_entity_capacity,
            params.depth_max,
        )
    }

    /// Empties the index in O(capacity), keeping the arenas allocated.
    pub fn clear(&mut self) {
        self.cells.fill(Cell::default());
        self.cell_count = 1;

        let block_count = self.blocks.len();
        for (i, block) in self.blocks.iter_mut().enumerate() {
            block.len = 0;
            block.next = (i + 1 < block_count).then(|| (i + 1) as u32);
        }
        self.free_block = (block_count > 0).then_some(0);
        self.blocks_in_use = 0;
        self.len = 0;
    }

    /// Inserts a point.
    ///
    /// Fails if the point is not strictly inside the root rectangle or if a
    /// pool runs dry. Both mean the caller sized or clamped incorrectly; the
    /// index must be cleared before further use.
    pub fn insert(
        &mut self,
        entity: EntityId,
        kind: Template,
        pos: Point<f32>,
    ) -> Result<(), SpatialError> {
        let (min, max) = (self.root.min(), self.root.max());
        if !(pos.x() > min.x && pos.x() < max.x && pos.y() > min.y && pos.y() < max.y) {
            return Err(SpatialError::OutOfBounds {
                x: pos.x(),
                z: pos.y(),
            });
        }

        let point = TrackedPoint { entity, kind, pos };
        let mut cell = 0;
        let mut rect = self.root;
        let mut depth = 0;

        while let Some(children) = self.cells[cell].children {
            let (quadrant, sub) = quadrant_of(rect, pos);
            cell = children[quadrant] as usize;
            rect = sub;
            depth += 1;
        }

        self.add_to_leaf(cell, rect, depth, point)?;
        self.len += 1;
        Ok(())
    }

    /// Returns the tracked point of `kind` closest to `from`, skipping `exclude`.
    ///
    /// Distance is Euclidean in the XZ plane. Among equidistant points the one
    /// reached first in traversal order wins, so results are deterministic for
    /// a given insertion sequence.
    ///
    /// # Returns
    ///
    /// `None` when no point of that kind (other than `exclude`) is indexed.
    pub fn nearest_of_type(
        &self,
        from: Point<f32>,
        kind: Template,
        exclude: Option<EntityId>,
    ) -> Option<TrackedPoint> {
        let mut best: Option<(f32, TrackedPoint)> = None;
        self.nearest_in(0, self.root, from, kind, exclude, &mut best);
        best.map(|(_, point)| point)
    }

    /// Number of points inserted since the last clear.
    pub fn len(&self) -> usize {
        self.len
    }

    /// Whether the index holds no points.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Current arena usage.
    pub fn usage(&self) -> IndexUsage {
        IndexUsage {
            points: self.len,
            cells: self.cell_count,
            blocks: self.blocks_in_use,
        }
    }

    /// Collects every leaf reachable from the root, depth first.
    pub fn leaves(&self) -> Vec<Leaf> {
        let mut leaves = Vec::new();
        let mut stack = vec![(0usize, self.root, 0u32)];

        while let Some((cell, rect, depth)) = stack.pop() {
            if let Some(children) = self.cells[cell].children {
                for (q, &child) in children.iter().enumerate().rev() {
                    stack.push((child as usize, child_rect(rect, q % 2, q / 2), depth + 1));
                }
                continue;
            }

            let mut leaf = Leaf {
                rect,
                depth,
                block_lens: Vec::new(),
                points: Vec::new(),
            };
            let mut block = self.cells[cell].block;
            while let Some(b) = block {
                leaf.block_lens.push(self.blocks[b as usize].len as usize);
                leaf.points.extend_from_slice(self.block_points(b));
                block = self.blocks[b as usize].next;
            }
            leaves.push(leaf);
        }

        leaves
    }

    fn add_to_leaf(
        &mut self,
        cell: usize,
        rect: Rect<f32>,
        depth: u32,
        point: TrackedPoint,
    ) -> Result<(), SpatialError> {
        debug_assert!(self.cells[cell].children.is_none());

        let target = match self.cells[cell].block {
            None => {
                let block = self.alloc_block()?;
                self.cells[cell].block = Some(block);
                block
            }
            Some(head) => {
                let mut last = head;
                while let Some(next) = self.blocks[last as usize].next {
                    last = next;
                }
                if self.block_is_full(last) {
                    let block = self.alloc_block()?;
                    self.blocks[last as usize].next = Some(block);
                    log::trace!("chained block {} at depth {}", block, depth);
                    block
                } else {
                    last
                }
            }
        };

        let slot = target as usize * self.block_entity_capacity
            + self.blocks[target as usize].len as usize;
        self.points[slot] = point;
        self.blocks[target as usize].len += 1;

        if depth < self.depth_max && self.block_is_full(target) {
            self.split(cell, rect, depth, target)?;
        }
        Ok(())
    }

    /// Turns a full leaf into an internal node and redistributes its points.
    fn split(
        &mut self,
        cell: usize,
        rect: Rect<f32>,
        depth: u32,
        block: u32,
    ) -> Result<(), SpatialError> {
        if self.cell_count + 4 > self.cells.len() {
            return Err(SpatialError::CellPoolExhausted {
                capacity: self.cells.len(),
            });
        }

        let first = self.cell_count as u32;
        self.cell_count += 4;
        let children = [first, first + 1, first + 2, first + 3];
        self.cells[cell] = Cell {
            children: Some(children),
            block: None,
        };
        log::trace!("split cell {} at depth {}", cell, depth);

        // The block is released only after redistribution, so child
        // allocations never hand out the slots being read here.
        let base = block as usize * self.block_entity_capacity;
        for i in 0..self.blocks[block as usize].len as usize {
            let point = self.points[base + i];
            let (quadrant, child) = quadrant_of(rect, point.pos);
            self.add_to_leaf(children[quadrant] as usize, child, depth + 1, point)?;
        }

        self.release_block(block);
        Ok(())
    }

    fn nearest_in(
        &self,
        cell: usize,
        rect: Rect<f32>,
        from: Point<f32>,
        kind: Template,
        exclude: Option<EntityId>,
        best: &mut Option<(f32, TrackedPoint)>,
    ) {
        if let Some((best_dist_sq, _)) = best {
            if rect_distance_sq(rect, from) > *best_dist_sq {
                return;
            }
        }

        if let Some(children) = self.cells[cell].children {
            for (q, &child) in children.iter().enumerate() {
                let child = child as usize;
                self.nearest_in(child, child_rect(rect, q % 2, q / 2), from, kind, exclude, best);
            }
            return;
        }

        let mut block = self.cells[cell].block;
        while let Some(b) = block {
            for point in self.block_points(b) {
                if point.kind != kind || Some(point.entity) == exclude {
                    continue;
                }
                let dist_sq = distance_sq(point.pos, from);
                let closer = match best {
                    Some((best_dist_sq, _)) => dist_sq < *best_dist_sq,
                    None => true,
                };
                if closer {
                    *best = Some((dist_sq, *point));
                }
            }
            block = self.blocks[b as usize].next;
        }
    }

    fn block_points(&self, block: u32) -> &[TrackedPoint] {
        let base = block as usize * self.block_entity_capacity;
        &self.points[base..base + self.blocks[block as usize].len as usize]
    }

    fn block_is_full(&self, block: u32) -> bool {
        self.blocks[block as usize].len as usize >= self.block_entity_capacity
    }

    fn alloc_block(&mut self) -> Result<u32, SpatialError> {
        let block = self.free_block.ok_or(SpatialError::BlockPoolExhausted {
            capacity: self.blocks.len(),
        })?;
        self.free_block = self.blocks[block as usize].next;
        self.blocks[block as usize] = Block { len: 0, next: None };
        self.blocks_in_use += 1;
        Ok(block)
    }

    fn release_block(&mut self, block: u32) {
        self.blocks[block as usize] = Block {
            len: 0,
            next: self.free_block,
        };
        self.free_block = Some(block);
        self.blocks_in_use -= 1;
    }
}

/// Picks the child quadrant of `rect` containing `pos`.
///
/// Quadrants are numbered `iz * 2 + ix` where `ix`/`iz` are 0 for the low
/// half and 1 for the high half. Rounding at deep levels may push a point
/// that sits on the far edge out by one; it is clamped back into range.
fn quadrant_of(rect: Rect<f32>, pos: Point<f32>) -> (usize, Rect<f32>) {
    let ix = ((pos.x() - rect.min().x) / (rect.width() / 2.0)).floor().clamp(0.0, 1.0) as usize;
    let iz = ((pos.y() - rect.min().y) / (rect.height() / 2.0)).floor().clamp(0.0, 1.0) as usize;
    (iz * 2 + ix, child_rect(rect, ix, iz))
}

fn child_rect(rect: Rect<f32>, ix: usize, iz: usize) -> Rect<f32> {
    let half_w = rect.width() / 2.0;
    let half_h = rect.height() / 2.0;
    let min = coord! {
        x: rect.min().x + half_w * ix as f32,
        y: rect.min().y + half_h * iz as f32,
    };
    Rect::new(min, coord! { x: min.x + half_w, y: min.y + half_h })
}

fn distance_sq(a: Point<f32>, b: Point<f32>) -> f32 {
    let dx = a.x() - b.x();
    let dz = a.y() - b.y();
    dx * dx + dz * dz
}

/// Squared distance from `pos` to `rect` grown by [`BOUNDS_SLACK`]; zero inside.
fn rect_distance_sq(rect: Rect<f32>, pos: Point<f32>) -> f32 {
    let (min, max) = (rect.min(), rect.max());
    let dx = (min.x - BOUNDS_SLACK - pos.x())
        .max(pos.x() - max.x - BOUNDS_SLACK)
        .max(0.0);
    let dz = (min.y - BOUNDS_SLACK - pos.y())
        .max(pos.y() - max.y - BOUNDS_SLACK)
        .max(0.0);
    dx * dx + dz * dz
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_index(block_entity_capacity: usize, depth_max: u32) -> SpatialIndex {
        SpatialIndex::new(
            Rect::new(coord! { x: -50.0, y: -50.0 }, coord! { x: 50.0, y: 50.0 }),
            256,
            256,
            block_entity_capacity,
            depth_max,
        )
    }

    #[test]
    #[should_panic(expected = "blocks must hold at least one point")]
    fn zero_block_entity_capacity_is_rejected() {
        small_index(0, 3);
    }

    #[test]
    fn empty_index_has_no_nearest() {
        let index = small_index(4, 3);
        assert!(index.is_empty());
        assert!(
            index
                .nearest_of_type(Point::new(0.0, 0.0), Template::Food, None)
                .is_none()
        );
    }

    #[test]
    fn leaf_splits_when_block_fills() {
        let mut index = small_index(4, 3);
        let positions = [(-10.0, -10.0), (10.0, -10.0), (-10.0, 10.0), (10.0, 10.0)];
        for (i, &(x, z)) in positions.iter().enumerate() {
            index
                .insert(EntityId(i as u64), Template::Food, Point::new(x, z))
                .unwrap();
        }

        let leaves = index.leaves();
        assert_eq!(leaves.len(), 4);
        for leaf in &leaves {
            assert_eq!(leaf.depth, 1);
            assert_eq!(leaf.block_lens, vec![1]);
        }
        assert_eq!(index.usage().cells, 5);
        assert_eq!(index.usage().blocks, 4);
    }

    #[test]
    fn split_cascades_when_all_points_share_a_quadrant() {
        let mut index = small_index(2, 4);
        index
            .insert(EntityId(0), Template::Food, Point::new(1.0, 1.0))
            .unwrap();
        index
            .insert(EntityId(1), Template::Food, Point::new(2.0, 2.0))
            .unwrap();

        let total: usize = index.leaves().iter().map(|l| l.points.len()).sum();
        assert_eq!(total, 2);
        for leaf in index.leaves() {
            if leaf.depth < 4 {
                assert!(leaf.block_lens.iter().all(|&n| n < 2));
            }
        }
    }

    #[test]
    fn chains_blocks_at_max_depth() {
        let mut index = small_index(4, 1);
        for i in 0..10 {
            index
                .insert(EntityId(i), Template::Creature, Point::new(5.0, 5.0))
                .unwrap();
        }
        let leaf = index
            .leaves()
            .into_iter()
            .find(|l| !l.points.is_empty())
            .unwrap();
        assert_eq!(leaf.depth, 1);
        assert_eq!(leaf.block_lens, vec![4, 4, 2]);
    }

    #[test]
    fn rejects_points_on_the_boundary() {
        let mut index = small_index(4, 3);
        let err = index
            .insert(EntityId(0), Template::Food, Point::new(50.0, 0.0))
            .unwrap_err();
        assert!(matches!(err, SpatialError::OutOfBounds { .. }));
    }

    #[test]
    fn reports_block_pool_exhaustion() {
        let mut index = SpatialIndex::new(
            Rect::new(coord! { x: -50.0, y: -50.0 }, coord! { x: 50.0, y: 50.0 }),
            16,
            2,
            2,
            0,
        );
        for i in 0..4 {
            index
                .insert(EntityId(i), Template::Food, Point::new(0.0, 0.0))
                .unwrap();
        }
        let err = index
            .insert(EntityId(9), Template::Food, Point::new(0.0, 0.0))
            .unwrap_err();
        assert_eq!(err, SpatialError::BlockPoolExhausted { capacity: 2 });
    }

    #[test]
    fn reports_cell_pool_exhaustion() {
        let mut index = SpatialIndex::new(
            Rect::new(coord! { x: -50.0, y: -50.0 }, coord! { x: 50.0, y: 50.0 }),
            4,
            16,
            1,
            3,
        );
        let err = index
            .insert(EntityId(0), Template::Food, Point::new(1.0, 1.0))
            .unwrap_err();
        assert_eq!(err, SpatialError::CellPoolExhausted { capacity: 4 });
    }

    #[test]
    fn clear_returns_every_block() {
        let mut index = small_index(4, 3);
        for i in 0..40 {
            let f = i as f32;
            index
                .insert(EntityId(i), Template::Food, Point::new(f - 20.0, 20.0 - f))
                .unwrap();
        }
        assert!(index.usage().blocks > 1);

        index.clear();
        assert_eq!(index.usage(), IndexUsage { points: 0, cells: 1, blocks: 0 });
        assert!(index.leaves().iter().all(|l| l.points.is_empty()));
    }

    #[test]
    fn nearest_skips_excluded_entity_and_other_kinds() {
        let mut index = small_index(4, 3);
        index
            .insert(EntityId(1), Template::Creature, Point::new(0.5, 0.0))
            .unwrap();
        index
            .insert(EntityId(2), Template::Food, Point::new(0.0, 0.1))
            .unwrap();
        index
            .insert(EntityId(3), Template::Food, Point::new(4.0, 0.0))
            .unwrap();

        let from = Point::new(0.0, 0.0);
        let hit = index
            .nearest_of_type(from, Template::Food, Some(EntityId(2)))
            .unwrap();
        assert_eq!(hit.entity, EntityId(3));

        let hit = index
            .nearest_of_type(from, Template::Creature, Some(EntityId(9)))
            .unwrap();
        assert_eq!(hit.entity, EntityId(1));
    }

    #[test]
    fn equidistant_points_resolve_to_first_inserted() {
        let mut index = small_index(8, 3);
        index
            .insert(EntityId(1), Template::Food, Point::new(2.0, 0.0))
            .unwrap();
        index
            .insert(EntityId(2), Template::Food, Point::new(-2.0, 0.0))
            .unwrap();
        let hit = index
            .nearest_of_type(Point::new(0.0, 0.0), Template::Food, None)
            .unwrap();
        assert_eq!(hit.entity, EntityId(1));
    }
}

#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Spawn-area decomposition of a static occupancy grid.
//!
//! The grid's free space is split recursively into quadrants until every
//! region is either entirely free, entirely blocked, or no larger than the
//! configured block size. Free leaves become spawn regions that are sampled
//! proportionally to their area. Building the index is far too expensive to
//! repeat every episode, so [`SpawnIndexCache`] memoizes one index per map
//! identity and parameter pair.

mod subdivision;

use std::{
    collections::HashMap,
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc, Mutex, PoisonError,
    },
};

use arena_level_core::{CellCoord, CellRect, LevelConfig, MapId, OccupancyGrid, WorldRect};
use glam::Vec2;
use log::{debug, info};
use rand::{
    distributions::{Distribution, WeightedIndex},
    Rng,
};

/// Parameters controlling how the free space is decomposed.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpawnParams {
    block_size: f32,
    min_free_fraction: f32,
}

impl SpawnParams {
    /// Creates decomposition parameters.
    ///
    /// `block_size` is the side length, in world units, below which mixed
    /// regions stop splitting. `min_free_fraction` is the share of free cells
    /// such a mixed block needs to be kept; it is clamped into `0.0..=1.0`.
    /// A fraction of `1.0` guarantees that no region ever covers a blocked
    /// cell.
    #[must_use]
    pub fn new(block_size: f32, min_free_fraction: f32) -> Self {
        Self {
            block_size: block_size.max(0.0),
            min_free_fraction: min_free_fraction.clamp(0.0, 1.0),
        }
    }

    /// Derives the parameters from a level configuration.
    #[must_use]
    pub fn from_config(config: &LevelConfig) -> Self {
        Self::new(config.spawn_block_size, config.mixed_leaf_free_fraction)
    }

    /// Minimum block side length in world units.
    #[must_use]
    pub const fn block_size(&self) -> f32 {
        self.block_size
    }

    /// Free fraction required to keep a mixed block.
    #[must_use]
    pub const fn min_free_fraction(&self) -> f32 {
        self.min_free_fraction
    }
}

/// Free rectangle eligible for goal and obstacle placement.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SpawnRegion {
    cells: CellRect,
    bounds: WorldRect,
    free_fraction: f32,
}

impl SpawnRegion {
    pub(crate) fn new(grid: &OccupancyGrid, cells: CellRect, free_fraction: f32) -> Self {
        Self {
            cells,
            bounds: grid.cell_rect_to_world(cells),
            free_fraction,
        }
    }

    /// Cells covered by the region.
    #[must_use]
    pub const fn cells(&self) -> CellRect {
        self.cells
    }

    /// World-space rectangle covered by the region.
    #[must_use]
    pub const fn bounds(&self) -> WorldRect {
        self.bounds
    }

    /// Share of covered cells that are free; `1.0` for fully free regions.
    #[must_use]
    pub const fn free_fraction(&self) -> f32 {
        self.free_fraction
    }

    /// Area of the region in square world units.
    #[must_use]
    pub fn area(&self) -> f32 {
        self.bounds.area()
    }
}

/// Immutable set of spawn regions built from one occupancy grid.
#[derive(Clone, Debug)]
pub struct SpawnIndex {
    map: MapId,
    params: SpawnParams,
    regions: Vec<SpawnRegion>,
    total_area: f32,
    weights: Option<WeightedIndex<f32>>,
}

impl SpawnIndex {
    /// Decomposes the grid's free space into spawn regions.
    #[must_use]
    pub fn build(grid: &OccupancyGrid, params: SpawnParams) -> Self {
        let regions = subdivision::decompose(grid, params);
        let total_area = regions.iter().map(SpawnRegion::area).sum();
        let weights = WeightedIndex::new(regions.iter().map(SpawnRegion::area)).ok();
        debug!(
            "decomposed map {} into {} spawn regions (block size {})",
            grid.id().get(),
            regions.len(),
            params.block_size()
        );

        Self {
            map: grid.id(),
            params,
            regions,
            total_area,
            weights,
        }
    }

    /// Identity of the grid the index was built from.
    #[must_use]
    pub const fn map(&self) -> MapId {
        self.map
    }

    /// Parameters the index was built with.
    #[must_use]
    pub const fn params(&self) -> SpawnParams {
        self.params
    }

    /// Spawn regions in deterministic decomposition order.
    #[must_use]
    pub fn regions(&self) -> &[SpawnRegion] {
        &self.regions
    }

    /// World-space rectangles of every region, ready for rendering.
    #[must_use]
    pub fn region_bounds(&self) -> Vec<WorldRect> {
        self.regions.iter().map(SpawnRegion::bounds).collect()
    }

    /// Number of spawn regions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    /// Reports whether the decomposition found no usable free space.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    /// Combined area of every region.
    #[must_use]
    pub const fn total_area(&self) -> f32 {
        self.total_area
    }

    /// Reports whether any region covers the provided cell.
    #[must_use]
    pub fn covers(&self, cell: CellCoord) -> bool {
        self.regions.iter().any(|region| region.cells.contains(cell))
    }

    /// Picks a region with probability proportional to its area.
    pub fn sample_region<R>(&self, rng: &mut R) -> Option<&SpawnRegion>
    where
        R: Rng + ?Sized,
    {
        let weights = self.weights.as_ref()?;
        self.regions.get(weights.sample(rng))
    }

    /// Picks a uniformly distributed point from the union of all regions.
    pub fn sample_point<R>(&self, rng: &mut R) -> Option<Vec2>
    where
        R: Rng + ?Sized,
    {
        let region = self.sample_region(rng)?;
        let bounds = region.bounds();
        let offset = Vec2::new(rng.gen::<f32>(), rng.gen::<f32>())
            * Vec2::new(bounds.width(), bounds.height());
        Some(bounds.min() + offset)
    }

    /// Samples a point at least `clearance` away from `anchor`.
    ///
    /// Gives up after `attempts` rejected samples and returns `None`.
    pub fn sample_point_with_clearance<R>(
        &self,
        rng: &mut R,
        anchor: Vec2,
        clearance: f32,
        attempts: usize,
    ) -> Option<Vec2>
    where
        R: Rng + ?Sized,
    {
        for _ in 0..attempts {
            let point = self.sample_point(rng)?;
            if point.distance(anchor) >= clearance {
                return Some(point);
            }
        }
        None
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
struct SpawnKey {
    map: MapId,
    block_size_bits: u32,
    free_fraction_bits: u32,
}

impl SpawnKey {
    fn new(map: MapId, params: SpawnParams) -> Self {
        Self {
            map,
            block_size_bits: params.block_size().to_bits(),
            free_fraction_bits: params.min_free_fraction().to_bits(),
        }
    }
}

/// Thread-safe memo of spawn indices keyed by map identity and parameters.
///
/// The lock is held while an index is built, so levels sharing a cache
/// never build the same index twice even when they reset concurrently.
#[derive(Debug, Default)]
pub struct SpawnIndexCache {
    entries: Mutex<HashMap<SpawnKey, Arc<SpawnIndex>>>,
    builds: AtomicU64,
}

impl SpawnIndexCache {
    /// Creates an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the memoized index for `grid`, building it on first request.
    pub fn get_or_build(&self, grid: &OccupancyGrid, params: SpawnParams) -> Arc<SpawnIndex> {
        let key = SpawnKey::new(grid.id(), params);
        let mut entries = self.entries.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(index) = entries.get(&key) {
            return Arc::clone(index);
        }

        let index = Arc::new(SpawnIndex::build(grid, params));
        let _ = self.builds.fetch_add(1, Ordering::Relaxed);
        info!(
            "built spawn index for map {}: {} regions covering {:.2} square units",
            grid.id().get(),
            index.len(),
            index.total_area()
        );
        let _ = entries.insert(key, Arc::clone(&index));
        index
    }

    /// Number of indices built since the cache was created.
    #[must_use]
    pub fn builds(&self) -> u64 {
        self.builds.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn params_clamp_out_of_range_values() {
        let params = SpawnParams::new(-1.0, 1.5);
        assert_eq!(params.block_size(), 0.0);
        assert_eq!(params.min_free_fraction(), 1.0);
    }

    #[test]
    fn params_follow_level_config() {
        let config = LevelConfig {
            spawn_block_size: 0.4,
            mixed_leaf_free_fraction: 0.75,
            ..LevelConfig::default()
        };
        let params = SpawnParams::from_config(&config);
        assert_eq!(params.block_size(), 0.4);
        assert_eq!(params.min_free_fraction(), 0.75);
    }
}

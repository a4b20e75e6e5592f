//! Quadrant subdivision of the grid's free space.

use arena_level_core::{CellCoord, CellRect, CellRectSize, OccupancyGrid};

use crate::{SpawnParams, SpawnRegion};

/// Summed-area table answering "how many free cells lie in this rectangle".
///
/// The table stores one extra leading row and column of zeros so every
/// rectangle query is four lookups without bounds special cases.
#[derive(Clone, Debug)]
pub(crate) struct FreeCellTable {
    stride: usize,
    sums: Vec<u64>,
}

impl FreeCellTable {
    /// Builds the table for the provided grid in a single row-major pass.
    pub(crate) fn new(grid: &OccupancyGrid) -> Self {
        let width = grid.width() as usize;
        let height = grid.height() as usize;
        let stride = width + 1;
        let mut sums = vec![0_u64; stride * (height + 1)];

        for (row, cells) in grid.cells().chunks(width).enumerate() {
            let mut running = 0_u64;
            for (column, state) in cells.iter().enumerate() {
                if state.is_free() {
                    running += 1;
                }
                sums[(row + 1) * stride + column + 1] = sums[row * stride + column + 1] + running;
            }
        }

        Self { stride, sums }
    }

    /// Number of free cells inside `rect`.
    pub(crate) fn free_in(&self, rect: CellRect) -> u64 {
        let x0 = rect.origin().column() as usize;
        let y0 = rect.origin().row() as usize;
        let x1 = x0 + rect.size().width() as usize;
        let y1 = y0 + rect.size().height() as usize;

        let at = |x: usize, y: usize| self.sums[y * self.stride + x];
        at(x1, y1) + at(x0, y0) - at(x0, y1) - at(x1, y0)
    }
}

/// Decomposes the grid's free space into spawn leaves.
///
/// Leaves are emitted in depth-first order with quadrants visited lower-left,
/// lower-right, upper-left, upper-right, so identical grids always yield
/// identical region orderings.
pub(crate) fn decompose(grid: &OccupancyGrid, params: SpawnParams) -> Vec<SpawnRegion> {
    let table = FreeCellTable::new(grid);
    let mut regions = Vec::new();
    let mut pending = vec![grid.cell_bounds()];

    while let Some(rect) = pending.pop() {
        let total = rect.cell_count();
        let free = table.free_in(rect);

        if free == 0 {
            continue;
        }

        if free == total {
            regions.push(SpawnRegion::new(grid, rect, 1.0));
            continue;
        }

        let longest = rect.size().width().max(rect.size().height()) as f32 * grid.resolution();
        if longest > params.block_size() && total > 1 {
            pending.extend(quadrants(rect).into_iter().rev().flatten());
            continue;
        }

        let fraction = free as f32 / total as f32;
        if fraction >= params.min_free_fraction() {
            regions.push(SpawnRegion::new(grid, rect, fraction));
        }
    }

    regions
}

fn quadrants(rect: CellRect) -> [Option<CellRect>; 4] {
    let width = rect.size().width();
    let height = rect.size().height();
    let left = (width + 1) / 2;
    let lower = (height + 1) / 2;
    let origin = rect.origin();

    [
        (0, 0, left, lower),
        (left, 0, width - left, lower),
        (0, lower, left, height - lower),
        (left, lower, width - left, height - lower),
    ]
    .map(|(dx, dy, quad_width, quad_height)| {
        let quad = CellRect::from_origin_and_size(
            CellCoord::new(origin.column() + dx, origin.row() + dy),
            CellRectSize::new(quad_width, quad_height),
        );
        (!quad.is_empty()).then_some(quad)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_level_core::{CellState, MapId};
    use glam::Vec2;

    fn grid(width: u32, height: u32, occupied: &[(u32, u32)]) -> OccupancyGrid {
        let mut cells = vec![CellState::Free; (width * height) as usize];
        for &(column, row) in occupied {
            cells[(row * width + column) as usize] = CellState::Occupied;
        }
        OccupancyGrid::from_cells(MapId::new(1), width, height, 1.0, Vec2::ZERO, cells)
            .expect("valid grid")
    }

    #[test]
    fn table_counts_free_cells_in_rectangles() {
        let grid = grid(4, 3, &[(1, 1), (3, 2)]);
        let table = FreeCellTable::new(&grid);

        assert_eq!(table.free_in(grid.cell_bounds()), 10);
        let inner = CellRect::from_origin_and_size(CellCoord::new(1, 1), CellRectSize::new(3, 2));
        assert_eq!(table.free_in(inner), 4);
        let single = CellRect::from_origin_and_size(CellCoord::new(1, 1), CellRectSize::new(1, 1));
        assert_eq!(table.free_in(single), 0);
    }

    #[test]
    fn quadrants_cover_odd_rectangles_without_overlap() {
        let rect = CellRect::from_origin_and_size(CellCoord::new(2, 1), CellRectSize::new(3, 1));
        let quads: Vec<_> = quadrants(rect).into_iter().flatten().collect();

        assert_eq!(quads.len(), 2, "a single row splits into two halves only");
        let covered: u64 = quads.iter().map(CellRect::cell_count).sum();
        assert_eq!(covered, rect.cell_count());
        assert_eq!(quads[0].size(), CellRectSize::new(2, 1));
        assert_eq!(quads[1].origin(), CellCoord::new(4, 1));
    }
}

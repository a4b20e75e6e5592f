//! Static wall bodies derived from the occupancy grid.

use arena_level_core::{BodyMotion, BodyShape, BodySpec, CellCoord, CellState, OccupancyGrid};
use glam::Vec2;

/// Describes one static box per horizontal run of occupied cells.
///
/// Unknown cells are not walls: the robot may drive into unmapped space and
/// the episode logic, not the physics engine, decides what that means.
pub(crate) fn wall_specs(grid: &OccupancyGrid) -> Vec<BodySpec> {
    let mut specs = Vec::new();

    for row in 0..grid.height() {
        let mut run_start: Option<u32> = None;
        for column in 0..=grid.width() {
            let occupied = column < grid.width()
                && grid.cell(CellCoord::new(column, row)) == Some(CellState::Occupied);

            match (run_start, occupied) {
                (None, true) => run_start = Some(column),
                (Some(start), false) => {
                    specs.push(run_spec(grid, row, start, column - start));
                    run_start = None;
                }
                _ => {}
            }
        }
    }

    specs
}

fn run_spec(grid: &OccupancyGrid, row: u32, start: u32, length: u32) -> BodySpec {
    let first = grid.cell_center(CellCoord::new(start, row));
    let last = grid.cell_center(CellCoord::new(start + length - 1, row));
    let half_extents = Vec2::new(length as f32, 1.0) * grid.resolution() * 0.5;

    BodySpec {
        position: (first + last) * 0.5,
        shape: BodyShape::Box { half_extents },
        motion: BodyMotion::Static,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_level_core::MapId;

    #[test]
    fn occupied_runs_become_single_boxes() {
        let cells = [
            "##.#", //
            "?...",
        ]
        .iter()
        .flat_map(|row| row.chars())
        .map(|symbol| match symbol {
            '#' => CellState::Occupied,
            '?' => CellState::Unknown,
            _ => CellState::Free,
        })
        .collect();
        let grid = OccupancyGrid::from_cells(MapId::new(1), 4, 2, 0.5, Vec2::ZERO, cells)
            .expect("valid grid");

        let specs = wall_specs(&grid);

        assert_eq!(specs.len(), 2, "unknown cells must not become walls");
        assert_eq!(specs[0].position, Vec2::new(0.5, 0.25));
        assert_eq!(
            specs[0].shape,
            BodyShape::Box {
                half_extents: Vec2::new(0.5, 0.25)
            }
        );
        assert_eq!(specs[1].position, Vec2::new(1.75, 0.25));
        assert!(specs.iter().all(|spec| spec.motion == BodyMotion::Static));
    }
}

use std::{collections::HashSet, sync::Arc};

use arena_level_core::{CellCoord, CellState, MapId, OccupancyGrid};
use arena_level_spawn_index::{SpawnIndex, SpawnIndexCache, SpawnParams};
use glam::Vec2;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

fn grid_from_rows(id: u64, resolution: f32, rows: &[&str]) -> OccupancyGrid {
    let height = rows.len() as u32;
    let width = rows[0].len() as u32;
    let cells = rows
        .iter()
        .rev()
        .flat_map(|row| row.chars())
        .map(|symbol| match symbol {
            '#' => CellState::Occupied,
            '?' => CellState::Unknown,
            _ => CellState::Free,
        })
        .collect();
    OccupancyGrid::from_cells(MapId::new(id), width, height, resolution, Vec2::ZERO, cells)
        .expect("valid grid")
}

fn covered_cells(index: &SpawnIndex) -> Vec<CellCoord> {
    index
        .regions()
        .iter()
        .flat_map(|region| region.cells().cells())
        .collect()
}

#[test]
fn single_obstacle_is_never_merged_into_a_free_leaf() {
    let mut cells = vec![CellState::Free; 16];
    cells[2 * 4 + 2] = CellState::Occupied;
    let grid = OccupancyGrid::from_cells(MapId::new(1), 4, 4, 1.0, Vec2::ZERO, cells)
        .expect("valid grid");

    let index = SpawnIndex::build(&grid, SpawnParams::new(1.0, 1.0));

    assert!(!index.is_empty(), "expected at least one free leaf");
    assert!(!index.covers(CellCoord::new(2, 2)), "occupied cell leaked into a leaf");
    for region in index.regions() {
        assert!(!region.cells().contains(CellCoord::new(2, 2)));
        assert_eq!(region.free_fraction(), 1.0);
    }
}

#[test]
fn leaves_reproduce_free_cells_at_cell_sized_blocks() {
    let grid = grid_from_rows(
        2,
        0.5,
        &[
            "..#.....?",
            "..#..##..",
            ".....##..",
            "#........",
            "...?...#.",
            ".........",
        ],
    );

    let index = SpawnIndex::build(&grid, SpawnParams::new(grid.resolution(), 1.0));

    let covered = covered_cells(&index);
    let unique: HashSet<_> = covered.iter().copied().collect();
    assert_eq!(covered.len(), unique.len(), "leaves must not overlap");

    let free: HashSet<_> = grid
        .cell_bounds()
        .cells()
        .filter(|cell| grid.is_free(*cell))
        .collect();
    assert_eq!(unique, free, "leaves must rasterize to exactly the free cells");
}

#[test]
fn coarse_blocks_never_cover_blocked_cells() {
    let grid = grid_from_rows(
        3,
        0.25,
        &[
            "....#...........",
            "....#.....??....",
            "....#...........",
            "..........###...",
            "................",
            "#...............",
            "........#.......",
            "................",
        ],
    );

    let index = SpawnIndex::build(&grid, SpawnParams::new(1.0, 1.0));

    assert!(!index.is_empty());
    for cell in covered_cells(&index) {
        assert!(grid.is_free(cell), "cell {cell:?} is not free");
    }
    let free_area = grid.count(CellState::Free) as f32 * 0.25 * 0.25;
    assert!(index.total_area() <= free_area + 1e-4);
}

#[test]
fn relaxed_threshold_keeps_mostly_free_blocks() {
    let grid = grid_from_rows(4, 1.0, &["..", ".#"]);

    let strict = SpawnIndex::build(&grid, SpawnParams::new(2.0, 1.0));
    let relaxed = SpawnIndex::build(&grid, SpawnParams::new(2.0, 0.7));

    assert!(strict.is_empty(), "strict policy discards the mixed block");
    assert_eq!(relaxed.len(), 1, "relaxed policy keeps the 3/4 free block");
    assert!((relaxed.regions()[0].free_fraction() - 0.75).abs() < f32::EPSILON);
}

#[test]
fn fully_blocked_grid_yields_no_regions_and_no_samples() {
    let grid = grid_from_rows(5, 1.0, &["##", "#?"]);
    let index = SpawnIndex::build(&grid, SpawnParams::new(1.0, 1.0));
    let mut rng = ChaCha8Rng::seed_from_u64(11);

    assert!(index.is_empty());
    assert_eq!(index.total_area(), 0.0);
    assert!(index.sample_region(&mut rng).is_none());
    assert!(index.sample_point(&mut rng).is_none());
}

#[test]
fn sampling_frequency_converges_to_region_area() {
    let grid = grid_from_rows(
        6,
        1.0,
        &[
            "..#.....",
            "..#.....",
            "..#.....",
            "..#.....",
        ],
    );
    let index = SpawnIndex::build(&grid, SpawnParams::new(1.0, 1.0));
    let mut rng = ChaCha8Rng::seed_from_u64(0x5eed);
    let samples = 40_000;
    let mut hits = vec![0_u32; index.len()];

    for _ in 0..samples {
        let region = index.sample_region(&mut rng).expect("free space available");
        let position = index
            .regions()
            .iter()
            .position(|candidate| candidate == region)
            .expect("sampled region belongs to the index");
        hits[position] += 1;
    }

    for (region, count) in index.regions().iter().zip(hits) {
        let expected = region.area() / index.total_area();
        let observed = count as f32 / samples as f32;
        assert!(
            (expected - observed).abs() < 0.015,
            "region {:?} expected {expected:.3} observed {observed:.3}",
            region.cells()
        );
    }
}

#[test]
fn sampled_points_lie_inside_regions() {
    let grid = grid_from_rows(7, 0.5, &["....#", ".#...", "....."]);
    let index = SpawnIndex::build(&grid, SpawnParams::new(0.5, 1.0));
    let mut rng = ChaCha8Rng::seed_from_u64(3);

    for _ in 0..500 {
        let point = index.sample_point(&mut rng).expect("free space available");
        assert!(
            index.regions().iter().any(|region| region.bounds().contains(point)),
            "point {point:?} escaped the spawn regions"
        );
    }
}

#[test]
fn clearance_sampling_respects_anchor_distance() {
    let grid = grid_from_rows(8, 1.0, &["........", "........"]);
    let index = SpawnIndex::build(&grid, SpawnParams::new(1.0, 1.0));
    let mut rng = ChaCha8Rng::seed_from_u64(21);
    let anchor = Vec2::new(1.0, 1.0);

    for _ in 0..200 {
        let point = index
            .sample_point_with_clearance(&mut rng, anchor, 3.0, 64)
            .expect("clearance is satisfiable");
        assert!(point.distance(anchor) >= 3.0);
    }

    assert!(
        index
            .sample_point_with_clearance(&mut rng, anchor, 100.0, 16)
            .is_none(),
        "unsatisfiable clearance must give up"
    );
}

#[test]
fn cache_builds_once_per_map_and_params() {
    let cache = SpawnIndexCache::new();
    let grid = grid_from_rows(9, 1.0, &["...", ".#.", "..."]);
    let params = SpawnParams::new(1.0, 1.0);

    let first = cache.get_or_build(&grid, params);
    let second = cache.get_or_build(&grid, params);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(cache.builds(), 1);

    let _coarse = cache.get_or_build(&grid, SpawnParams::new(3.0, 1.0));
    assert_eq!(cache.builds(), 2, "different parameters need their own index");

    let twin = grid_from_rows(10, 1.0, &["...", ".#.", "..."]);
    let twin_index = cache.get_or_build(&twin, params);
    assert_eq!(cache.builds(), 3, "indices are keyed by map identity");
    assert_eq!(twin_index.map(), MapId::new(10));
}

#[test]
fn concurrent_requests_build_each_index_once() {
    let cache = SpawnIndexCache::new();
    let grid = grid_from_rows(11, 0.5, &["........", ".##..?..", "........", "........"]);
    let params = SpawnParams::new(0.5, 1.0);

    let indices: Vec<_> = std::thread::scope(|scope| {
        let handles: Vec<_> = (0..8)
            .map(|_| scope.spawn(|| cache.get_or_build(&grid, params)))
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("building thread panicked"))
            .collect()
    });

    assert_eq!(cache.builds(), 1);
    assert!(indices
        .iter()
        .all(|index| Arc::ptr_eq(index, &indices[0])));
}

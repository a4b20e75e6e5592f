//! Text rendering for terminals and logs.

use std::io::Write;

use anyhow::{Context, Result as AnyResult};
use arena_level_core::{CellCoord, CellState};
use glam::Vec2;

use crate::{RenderingBackend, RenderingError, Scene};

const WALL: char = '#';
const UNKNOWN: char = '?';
const SPAWN_AREA: char = '.';
const FREE: char = ' ';
const WANDERER: char = 'w';
const GOAL: char = 'G';
const ROBOT: char = 'R';

/// Renders the scene as text, top row first.
///
/// Grids wider than `max_columns` are downsampled so that each character
/// covers a square block of cells.
pub fn render_ascii(scene: &Scene, max_columns: u32) -> Result<String, RenderingError> {
    if max_columns == 0 {
        return Err(RenderingError::ZeroColumns);
    }

    let grid = &scene.grid;
    let columns = grid.width().min(max_columns);
    let scale = grid.width() as f32 / columns as f32;
    let rows = ((grid.height() as f32 / scale).ceil() as u32).max(1);
    let char_size = grid.resolution() * scale;

    let mut canvas: Vec<Vec<char>> = (0..rows)
        .map(|row| {
            let from_bottom = rows - 1 - row;
            (0..columns)
                .map(|column| {
                    let cell = CellCoord::new(
                        sample_index(column, scale, grid.width()),
                        sample_index(from_bottom, scale, grid.height()),
                    );
                    let centre = grid.origin()
                        + (Vec2::new(column as f32, from_bottom as f32) + 0.5) * char_size;
                    match grid.cell(cell) {
                        Some(CellState::Occupied) => WALL,
                        Some(CellState::Unknown) | None => UNKNOWN,
                        Some(CellState::Free) if scene.in_spawn_area(centre) => SPAWN_AREA,
                        Some(CellState::Free) => FREE,
                    }
                })
                .collect()
        })
        .collect();

    let mut stamp = |position: Vec2, symbol: char| {
        let offset = (position - grid.origin()) / char_size;
        if offset.x < 0.0 || offset.y < 0.0 {
            return;
        }
        let (column, from_bottom) = (offset.x as u32, offset.y as u32);
        if column < columns && from_bottom < rows {
            canvas[(rows - 1 - from_bottom) as usize][column as usize] = symbol;
        }
    };
    for wanderer in &scene.wanderers {
        stamp(*wanderer, WANDERER);
    }
    if let Some(goal) = scene.goal {
        stamp(goal, GOAL);
    }
    if let Some(robot) = scene.robot {
        stamp(robot, ROBOT);
    }

    let mut text = String::with_capacity(((columns + 1) * rows) as usize);
    for line in canvas {
        text.extend(line);
        text.push('\n');
    }
    Ok(text)
}

fn sample_index(position: u32, scale: f32, limit: u32) -> u32 {
    (((position as f32 + 0.5) * scale) as u32).min(limit - 1)
}

/// Backend writing text frames to any output stream.
#[derive(Debug)]
pub struct AsciiBackend<W> {
    out: W,
    max_columns: u32,
    frames: u64,
}

impl<W> AsciiBackend<W>
where
    W: Write,
{
    /// Creates a backend writing frames of at most `max_columns` characters.
    pub fn new(out: W, max_columns: u32) -> Self {
        Self {
            out,
            max_columns,
            frames: 0,
        }
    }

    /// Number of frames written so far.
    #[must_use]
    pub const fn frames(&self) -> u64 {
        self.frames
    }

    /// Returns the wrapped output stream.
    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W> RenderingBackend for AsciiBackend<W>
where
    W: Write,
{
    fn present(&mut self, scene: &Scene) -> AnyResult<()> {
        let text = render_ascii(scene, self.max_columns)?;
        self.frames += 1;
        writeln!(self.out, "frame {}", self.frames).context("failed to write frame header")?;
        self.out
            .write_all(text.as_bytes())
            .context("failed to write ascii frame")?;
        self.out.flush().context("failed to flush ascii frame")
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use arena_level_core::{MapId, OccupancyGrid, SpawnAreaRenderer, WorldRect};

    use super::*;

    fn scene(rows: &[&str]) -> Scene {
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
        let grid = OccupancyGrid::from_cells(
            MapId::new(1),
            rows[0].len() as u32,
            rows.len() as u32,
            1.0,
            Vec2::ZERO,
            cells,
        )
        .expect("valid grid");
        Scene::new(Arc::new(grid))
    }

    #[test]
    fn cells_spawn_areas_and_markers_are_drawn() {
        let mut scene = scene(&["#####", "#..?#", "#...#", "#####"]);
        scene.draw_spawn_areas(&[WorldRect::from_corners(
            Vec2::new(1.0, 1.0),
            Vec2::new(3.0, 2.0),
        )]);
        scene.robot = Some(Vec2::new(1.5, 1.5));
        scene.goal = Some(Vec2::new(2.5, 2.5));
        scene.wanderers = vec![Vec2::new(3.5, 1.5), Vec2::new(-4.0, 0.0)];

        let text = render_ascii(&scene, 80).expect("valid canvas");

        assert_eq!(text, "#####\n# G?#\n#R.w#\n#####\n");
    }

    #[test]
    fn wide_grids_are_downsampled() {
        let scene = scene(&["########", "#......#", "#......#", "########"]);

        let text = render_ascii(&scene, 4).expect("valid canvas");

        assert_eq!(text.lines().count(), 2);
        assert!(text.lines().all(|line| line.chars().count() == 4));
    }

    #[test]
    fn zero_columns_are_rejected() {
        let scene = scene(&["."]);
        assert_eq!(render_ascii(&scene, 0), Err(RenderingError::ZeroColumns));
    }

    #[test]
    fn backend_numbers_frames() {
        let scene = scene(&["#."]);
        let mut backend = AsciiBackend::new(Vec::new(), 10);

        backend.present(&scene).expect("write succeeds");
        backend.present(&scene).expect("write succeeds");

        assert_eq!(backend.frames(), 2);
        let output = String::from_utf8(backend.into_inner()).expect("utf-8 output");
        assert_eq!(output, "frame 1\n# \nframe 2\n# \n");
    }
}

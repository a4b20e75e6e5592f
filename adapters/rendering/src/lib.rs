#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Rendering contracts and headless backends for level snapshots.

mod ascii;
mod svg;

use std::{error::Error, fmt, sync::Arc};

use anyhow::Result as AnyResult;
use arena_level_core::{OccupancyGrid, SpawnAreaRenderer, WorldRect};
use glam::Vec2;

pub use ascii::{render_ascii, AsciiBackend};
pub use svg::{render_svg, SvgBackend};

/// RGBA color used when presenting frames.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Color {
    /// Red channel intensity in the range 0.0..=1.0.
    pub red: f32,
    /// Green channel intensity in the range 0.0..=1.0.
    pub green: f32,
    /// Blue channel intensity in the range 0.0..=1.0.
    pub blue: f32,
    /// Alpha channel intensity in the range 0.0..=1.0.
    pub alpha: f32,
}

impl Color {
    /// Creates a new color from floating point channels.
    #[must_use]
    pub const fn new(red: f32, green: f32, blue: f32, alpha: f32) -> Self {
        Self {
            red,
            green,
            blue,
            alpha,
        }
    }

    /// Creates an opaque color from byte RGB values.
    #[must_use]
    pub const fn from_rgb_u8(red: u8, green: u8, blue: u8) -> Self {
        Self {
            red: red as f32 / 255.0,
            green: green as f32 / 255.0,
            blue: blue as f32 / 255.0,
            alpha: 1.0,
        }
    }

    /// Returns a new color lightened towards white by the provided amount.
    #[must_use]
    pub fn lighten(self, amount: f32) -> Self {
        let amount = amount.clamp(0.0, 1.0);

        Self {
            red: lighten_channel(self.red, amount),
            green: lighten_channel(self.green, amount),
            blue: lighten_channel(self.blue, amount),
            alpha: self.alpha,
        }
    }

    /// Returns the same color with a different alpha channel.
    #[must_use]
    pub const fn with_alpha(self, alpha: f32) -> Self {
        Self { alpha, ..self }
    }

    /// Formats the RGB channels as a `#rrggbb` hex string.
    #[must_use]
    pub fn to_hex(self) -> String {
        format!(
            "#{:02x}{:02x}{:02x}",
            channel_byte(self.red),
            channel_byte(self.green),
            channel_byte(self.blue)
        )
    }
}

fn lighten_channel(channel: f32, amount: f32) -> f32 {
    channel + (1.0 - channel) * amount
}

fn channel_byte(channel: f32) -> u8 {
    (channel.clamp(0.0, 1.0) * 255.0).round() as u8
}

/// Colors used by graphical backends.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Palette {
    /// Free space outside every spawn area.
    pub background: Color,
    /// Occupied cells.
    pub wall: Color,
    /// Cells with unknown occupancy.
    pub unknown: Color,
    /// Spawn-area overlay.
    pub spawn_area: Color,
    /// Robot marker.
    pub robot: Color,
    /// Goal marker.
    pub goal: Color,
    /// Wanderer discs.
    pub wanderer: Color,
}

impl Default for Palette {
    fn default() -> Self {
        let goal = Color::from_rgb_u8(0x2f, 0x95, 0x32);
        Self {
            background: Color::from_rgb_u8(0xff, 0xff, 0xff),
            wall: Color::from_rgb_u8(0x26, 0x26, 0x2b),
            unknown: Color::from_rgb_u8(0x8a, 0x8a, 0x96),
            spawn_area: goal.lighten(0.6).with_alpha(0.5),
            robot: Color::from_rgb_u8(0x58, 0x47, 0xff),
            goal,
            wanderer: Color::from_rgb_u8(0xc8, 0x2a, 0x36),
        }
    }
}

/// Snapshot of a level handed to rendering backends.
#[derive(Clone, Debug, PartialEq)]
pub struct Scene {
    /// Static occupancy grid.
    pub grid: Arc<OccupancyGrid>,
    /// Spawn areas received through [`SpawnAreaRenderer`].
    pub spawn_areas: Vec<WorldRect>,
    /// Robot position, if known.
    pub robot: Option<Vec2>,
    /// Goal of the running episode.
    pub goal: Option<Vec2>,
    /// Wanderer centres.
    pub wanderers: Vec<Vec2>,
    /// Radius drawn for every wanderer.
    pub wanderer_radius: f32,
}

impl Scene {
    /// Creates a scene showing only the static grid.
    #[must_use]
    pub fn new(grid: Arc<OccupancyGrid>) -> Self {
        Self {
            grid,
            spawn_areas: Vec::new(),
            robot: None,
            goal: None,
            wanderers: Vec::new(),
            wanderer_radius: 0.0,
        }
    }

    /// Reports whether `point` lies inside any spawn area.
    #[must_use]
    pub fn in_spawn_area(&self, point: Vec2) -> bool {
        self.spawn_areas.iter().any(|area| area.contains(point))
    }
}

impl SpawnAreaRenderer for Scene {
    fn draw_spawn_areas(&mut self, regions: &[WorldRect]) {
        self.spawn_areas.clear();
        self.spawn_areas.extend_from_slice(regions);
    }
}

/// Backend capable of presenting scene snapshots.
pub trait RenderingBackend {
    /// Presents a single frame.
    fn present(&mut self, scene: &Scene) -> AnyResult<()>;
}

/// Errors that can occur when constructing rendering descriptors.
#[derive(Debug, PartialEq, Eq)]
pub enum RenderingError {
    /// Text canvases need at least one column.
    ZeroColumns,
    /// Vector output needs a positive scale.
    InvalidScale {
        /// Requested pixels per world unit, formatted for display.
        pixels_per_unit: String,
    },
}

impl fmt::Display for RenderingError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::ZeroColumns => write!(f, "canvas must be at least one column wide"),
            Self::InvalidScale { pixels_per_unit } => {
                write!(
                    f,
                    "pixels per unit must be positive (received {pixels_per_unit})"
                )
            }
        }
    }
}

impl Error for RenderingError {}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_level_core::{CellState, MapId};

    #[test]
    fn lighten_moves_towards_white() {
        let color = Color::new(0.2, 0.4, 0.6, 0.8).lighten(0.5);
        assert!((color.red - 0.6).abs() < 1e-6);
        assert!((color.green - 0.7).abs() < 1e-6);
        assert!((color.blue - 0.8).abs() < 1e-6);
        assert_eq!(color.alpha, 0.8);
    }

    #[test]
    fn hex_formatting_rounds_channels() {
        assert_eq!(Color::from_rgb_u8(0x2f, 0x95, 0x32).to_hex(), "#2f9532");
        assert_eq!(Color::new(2.0, -1.0, 0.5, 1.0).to_hex(), "#ff0080");
    }

    #[test]
    fn scene_replaces_spawn_areas_on_each_draw() {
        let grid = OccupancyGrid::from_cells(
            MapId::new(1),
            2,
            1,
            1.0,
            Vec2::ZERO,
            vec![CellState::Free; 2],
        )
        .expect("valid grid");
        let mut scene = Scene::new(Arc::new(grid));
        let left = WorldRect::from_corners(Vec2::ZERO, Vec2::ONE);
        let right = WorldRect::from_corners(Vec2::new(1.0, 0.0), Vec2::new(2.0, 1.0));

        scene.draw_spawn_areas(&[left, right]);
        scene.draw_spawn_areas(&[right]);

        assert_eq!(scene.spawn_areas, vec![right]);
        assert!(scene.in_spawn_area(Vec2::new(1.5, 0.5)));
        assert!(!scene.in_spawn_area(Vec2::new(0.5, 0.5)));
    }
}

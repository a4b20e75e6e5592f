//! Vector snapshots written as standalone SVG documents.

use std::{
    fmt::Write as _,
    fs,
    path::{Path, PathBuf},
};

use anyhow::{Context, Result as AnyResult};
use arena_level_core::{CellState, WorldRect};
use glam::Vec2;

use crate::{Color, Palette, RenderingBackend, RenderingError, Scene};

const MARKER_RADIUS: f32 = 0.15;

/// Renders the scene as an SVG document scaled by `pixels_per_unit`.
pub fn render_svg(
    scene: &Scene,
    palette: &Palette,
    pixels_per_unit: f32,
) -> Result<String, RenderingError> {
    if !(pixels_per_unit.is_finite() && pixels_per_unit > 0.0) {
        return Err(RenderingError::InvalidScale {
            pixels_per_unit: pixels_per_unit.to_string(),
        });
    }

    let grid = &scene.grid;
    let bounds = grid.world_bounds();
    let canvas = Canvas {
        bounds,
        scale: pixels_per_unit,
    };
    let mut document = String::new();
    let _ = writeln!(
        document,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{:.0}" height="{:.0}">"#,
        bounds.width() * pixels_per_unit,
        bounds.height() * pixels_per_unit
    );
    canvas.rect(&mut document, bounds, palette.background);

    for cell in grid.cell_bounds().cells() {
        let color = match grid.cell(cell) {
            Some(CellState::Occupied) => palette.wall,
            Some(CellState::Unknown) => palette.unknown,
            _ => continue,
        };
        let min = grid.cell_center(cell) - Vec2::splat(grid.resolution() * 0.5);
        let max = min + Vec2::splat(grid.resolution());
        canvas.rect(&mut document, WorldRect::from_corners(min, max), color);
    }

    for area in &scene.spawn_areas {
        canvas.rect(&mut document, *area, palette.spawn_area);
    }
    for wanderer in &scene.wanderers {
        canvas.circle(&mut document, *wanderer, scene.wanderer_radius, palette.wanderer);
    }
    if let Some(goal) = scene.goal {
        canvas.circle(&mut document, goal, MARKER_RADIUS, palette.goal);
    }
    if let Some(robot) = scene.robot {
        canvas.circle(&mut document, robot, MARKER_RADIUS, palette.robot);
    }

    document.push_str("</svg>\n");
    Ok(document)
}

struct Canvas {
    bounds: WorldRect,
    scale: f32,
}

impl Canvas {
    fn project(&self, point: Vec2) -> Vec2 {
        Vec2::new(
            point.x - self.bounds.min().x,
            self.bounds.max().y - point.y,
        ) * self.scale
    }

    fn rect(&self, document: &mut String, rect: WorldRect, color: Color) {
        let top_left = self.project(Vec2::new(rect.min().x, rect.max().y));
        let _ = writeln!(
            document,
            r#"  <rect x="{:.2}" y="{:.2}" width="{:.2}" height="{:.2}" fill="{}" fill-opacity="{:.2}"/>"#,
            top_left.x,
            top_left.y,
            rect.width() * self.scale,
            rect.height() * self.scale,
            color.to_hex(),
            color.alpha
        );
    }

    fn circle(&self, document: &mut String, centre: Vec2, radius: f32, color: Color) {
        let centre = self.project(centre);
        let _ = writeln!(
            document,
            r#"  <circle cx="{:.2}" cy="{:.2}" r="{:.2}" fill="{}" fill-opacity="{:.2}"/>"#,
            centre.x,
            centre.y,
            radius * self.scale,
            color.to_hex(),
            color.alpha
        );
    }
}

/// Backend writing one numbered SVG file per frame into a directory.
#[derive(Debug)]
pub struct SvgBackend {
    directory: PathBuf,
    palette: Palette,
    pixels_per_unit: f32,
    frames: u64,
}

impl SvgBackend {
    /// Creates a backend writing into `directory`, creating it when missing.
    pub fn new(directory: impl Into<PathBuf>, pixels_per_unit: f32) -> AnyResult<Self> {
        let directory = directory.into();
        fs::create_dir_all(&directory).with_context(|| {
            format!("failed to create svg output directory {}", directory.display())
        })?;

        Ok(Self {
            directory,
            palette: Palette::default(),
            pixels_per_unit,
            frames: 0,
        })
    }

    /// Directory receiving the frames.
    #[must_use]
    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// Number of frames written so far.
    #[must_use]
    pub const fn frames(&self) -> u64 {
        self.frames
    }
}

impl RenderingBackend for SvgBackend {
    fn present(&mut self, scene: &Scene) -> AnyResult<()> {
        let document = render_svg(scene, &self.palette, self.pixels_per_unit)?;
        self.frames += 1;
        let path = self.directory.join(format!("frame_{:05}.svg", self.frames));
        fs::write(&path, document)
            .with_context(|| format!("failed to write svg frame {}", path.display()))
    }
}

#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Core contracts shared across the static-map navigation level.
//!
//! This crate defines the vocabulary that connects the map provider, the
//! spawn index, the authoritative level and the external collaborators that
//! surround it. The physics engine, the map-transport protocol, the renderer
//! and the dynamic obstacle agents are all reached through the traits declared
//! here, so every other crate in the workspace can be exercised headless.

use glam::Vec2;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Distance reported when no dynamic obstacle is close enough to measure.
pub const FAR_DISTANCE: f32 = f32::INFINITY;

/// Largest raw occupancy value still classified as free space.
pub const FREE_VALUE_MAX: i8 = 25;

/// Smallest raw occupancy value classified as an obstacle.
pub const OCCUPIED_VALUE_MIN: i8 = 65;

/// Traversability of a single occupancy grid cell.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CellState {
    /// The cell was never observed by the mapper.
    Unknown,
    /// The cell is known to be empty.
    Free,
    /// The cell is known to contain an obstacle.
    Occupied,
}

impl CellState {
    /// Classifies a raw map-service value.
    ///
    /// Negative values mean "unknown", values up to [`FREE_VALUE_MAX`] are
    /// free and values from [`OCCUPIED_VALUE_MIN`] upwards are occupied.
    /// Anything in between is too uncertain to trust and stays unknown.
    #[must_use]
    pub const fn from_occupancy_value(value: i8) -> Self {
        if value < 0 {
            Self::Unknown
        } else if value <= FREE_VALUE_MAX {
            Self::Free
        } else if value >= OCCUPIED_VALUE_MIN {
            Self::Occupied
        } else {
            Self::Unknown
        }
    }

    /// Reports whether the cell is free space.
    #[must_use]
    pub const fn is_free(self) -> bool {
        matches!(self, Self::Free)
    }
}

/// Location of a single grid cell expressed as column and row coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CellCoord {
    column: u32,
    row: u32,
}

impl CellCoord {
    /// Creates a new grid cell coordinate.
    #[must_use]
    pub const fn new(column: u32, row: u32) -> Self {
        Self { column, row }
    }

    /// Zero-based column index of the cell.
    #[must_use]
    pub const fn column(&self) -> u32 {
        self.column
    }

    /// Zero-based row index of the cell.
    #[must_use]
    pub const fn row(&self) -> u32 {
        self.row
    }
}

/// Axis-aligned rectangle expressed in cell coordinates.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CellRect {
    origin: CellCoord,
    size: CellRectSize,
}

impl CellRect {
    /// Constructs a rectangle from an origin cell and size.
    #[must_use]
    pub const fn from_origin_and_size(origin: CellCoord, size: CellRectSize) -> Self {
        Self { origin, size }
    }

    /// Lowest-indexed cell that anchors the rectangle.
    #[must_use]
    pub const fn origin(&self) -> CellCoord {
        self.origin
    }

    /// Dimensions of the rectangle measured in whole cells.
    #[must_use]
    pub const fn size(&self) -> CellRectSize {
        self.size
    }

    /// Number of cells covered by the rectangle.
    #[must_use]
    pub const fn cell_count(&self) -> u64 {
        self.size.width() as u64 * self.size.height() as u64
    }

    /// Reports whether the rectangle covers no cells at all.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.size.width() == 0 || self.size.height() == 0
    }

    /// Reports whether the provided cell lies inside the rectangle.
    #[must_use]
    pub const fn contains(&self, cell: CellCoord) -> bool {
        cell.column() >= self.origin.column()
            && cell.row() >= self.origin.row()
            && cell.column() - self.origin.column() < self.size.width()
            && cell.row() - self.origin.row() < self.size.height()
    }

    /// Iterates every cell covered by the rectangle in row-major order.
    pub fn cells(&self) -> impl Iterator<Item = CellCoord> {
        let origin = self.origin;
        let size = self.size;
        (0..size.height()).flat_map(move |dy| {
            (0..size.width()).map(move |dx| CellCoord::new(origin.column() + dx, origin.row() + dy))
        })
    }
}

/// Size of a [`CellRect`] measured in whole cells.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct CellRectSize {
    width: u32,
    height: u32,
}

impl CellRectSize {
    /// Creates a new size descriptor with explicit dimensions.
    #[must_use]
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    /// Width of the rectangle in cells.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Height of the rectangle in cells.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }
}

/// Axis-aligned rectangle expressed in world units.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WorldRect {
    min: Vec2,
    max: Vec2,
}

impl WorldRect {
    /// Creates a rectangle spanning the two provided corners in any order.
    #[must_use]
    pub fn from_corners(a: Vec2, b: Vec2) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Corner with the smallest coordinates.
    #[must_use]
    pub const fn min(&self) -> Vec2 {
        self.min
    }

    /// Corner with the largest coordinates.
    #[must_use]
    pub const fn max(&self) -> Vec2 {
        self.max
    }

    /// Extent along the x axis.
    #[must_use]
    pub fn width(&self) -> f32 {
        self.max.x - self.min.x
    }

    /// Extent along the y axis.
    #[must_use]
    pub fn height(&self) -> f32 {
        self.max.y - self.min.y
    }

    /// Enclosed area in square world units.
    #[must_use]
    pub fn area(&self) -> f32 {
        self.width() * self.height()
    }

    /// Geometric centre of the rectangle.
    #[must_use]
    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    /// Reports whether the point lies inside the rectangle, borders included.
    #[must_use]
    pub fn contains(&self, point: Vec2) -> bool {
        point.x >= self.min.x
            && point.x <= self.max.x
            && point.y >= self.min.y
            && point.y <= self.max.y
    }
}

/// Identity assigned to a fetched occupancy grid.
///
/// Spawn indices are memoized per identity, so two grids with identical
/// content fetched by different providers never share an index by accident.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MapId(u64);

impl MapId {
    /// Creates a map identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// Raw response returned by a map-providing service.
#[derive(Clone, Debug, PartialEq)]
pub struct MapResponse {
    /// Number of cell columns.
    pub width: u32,
    /// Number of cell rows.
    pub height: u32,
    /// Side length of a cell in world units.
    pub resolution: f32,
    /// World position of the lower-left corner of cell (0, 0).
    pub origin: [f32; 2],
    /// Row-major cell values; see [`CellState::from_occupancy_value`].
    pub data: Vec<i8>,
}

/// Reasons a map response cannot be turned into an [`OccupancyGrid`].
#[derive(Clone, Debug, PartialEq, Error)]
pub enum GridError {
    /// Width or height was zero.
    #[error("occupancy grid must have non-zero dimensions (received {width}x{height})")]
    ZeroDimension {
        /// Reported column count.
        width: u32,
        /// Reported row count.
        height: u32,
    },
    /// Cell data did not match the reported dimensions.
    #[error("occupancy grid expected {expected} cells but received {actual}")]
    DataLengthMismatch {
        /// Cell count implied by the dimensions.
        expected: usize,
        /// Cell count actually supplied.
        actual: usize,
    },
    /// Resolution was zero, negative or not finite.
    #[error("occupancy grid resolution must be positive (received {0})")]
    InvalidResolution(f32),
}

/// Immutable raster of free, occupied and unknown cells.
#[derive(Clone, Debug, PartialEq)]
pub struct OccupancyGrid {
    id: MapId,
    width: u32,
    height: u32,
    resolution: f32,
    origin: Vec2,
    cells: Vec<CellState>,
}

impl OccupancyGrid {
    /// Validates a service response and converts it into a grid.
    pub fn from_response(id: MapId, response: &MapResponse) -> Result<Self, GridError> {
        let cells = response
            .data
            .iter()
            .map(|value| CellState::from_occupancy_value(*value))
            .collect();
        Self::from_cells(
            id,
            response.width,
            response.height,
            response.resolution,
            Vec2::from(response.origin),
            cells,
        )
    }

    /// Creates a grid from already classified cells stored in row-major order.
    pub fn from_cells(
        id: MapId,
        width: u32,
        height: u32,
        resolution: f32,
        origin: Vec2,
        cells: Vec<CellState>,
    ) -> Result<Self, GridError> {
        if width == 0 || height == 0 {
            return Err(GridError::ZeroDimension { width, height });
        }
        if !resolution.is_finite() || resolution <= 0.0 {
            return Err(GridError::InvalidResolution(resolution));
        }

        let expected = width as usize * height as usize;
        if cells.len() != expected {
            return Err(GridError::DataLengthMismatch {
                expected,
                actual: cells.len(),
            });
        }

        Ok(Self {
            id,
            width,
            height,
            resolution,
            origin,
            cells,
        })
    }

    /// Identity assigned when the grid was fetched.
    #[must_use]
    pub const fn id(&self) -> MapId {
        self.id
    }

    /// Number of cell columns.
    #[must_use]
    pub const fn width(&self) -> u32 {
        self.width
    }

    /// Number of cell rows.
    #[must_use]
    pub const fn height(&self) -> u32 {
        self.height
    }

    /// Side length of a cell in world units.
    #[must_use]
    pub const fn resolution(&self) -> f32 {
        self.resolution
    }

    /// World position of the lower-left corner of cell (0, 0).
    #[must_use]
    pub const fn origin(&self) -> Vec2 {
        self.origin
    }

    /// Dense cell states in row-major order.
    #[must_use]
    pub fn cells(&self) -> &[CellState] {
        &self.cells
    }

    /// State of the provided cell, if it lies within the grid.
    #[must_use]
    pub fn cell(&self, cell: CellCoord) -> Option<CellState> {
        self.index(cell).and_then(|index| self.cells.get(index).copied())
    }

    /// Reports whether the provided cell is inside the grid and free.
    #[must_use]
    pub fn is_free(&self, cell: CellCoord) -> bool {
        self.cell(cell).is_some_and(CellState::is_free)
    }

    /// Rectangle covering every cell of the grid.
    #[must_use]
    pub const fn cell_bounds(&self) -> CellRect {
        CellRect::from_origin_and_size(
            CellCoord::new(0, 0),
            CellRectSize::new(self.width, self.height),
        )
    }

    /// World-space rectangle covered by the whole grid.
    #[must_use]
    pub fn world_bounds(&self) -> WorldRect {
        self.cell_rect_to_world(self.cell_bounds())
    }

    /// Converts a cell rectangle into the world-space area it covers.
    #[must_use]
    pub fn cell_rect_to_world(&self, rect: CellRect) -> WorldRect {
        let min = self.origin
            + Vec2::new(
                rect.origin().column() as f32,
                rect.origin().row() as f32,
            ) * self.resolution;
        let extent = Vec2::new(rect.size().width() as f32, rect.size().height() as f32)
            * self.resolution;
        WorldRect::from_corners(min, min + extent)
    }

    /// World position of the centre of the provided cell.
    #[must_use]
    pub fn cell_center(&self, cell: CellCoord) -> Vec2 {
        self.origin
            + (Vec2::new(cell.column() as f32, cell.row() as f32) + Vec2::splat(0.5))
                * self.resolution
    }

    /// Cell containing the world position, if it lies on the grid.
    #[must_use]
    pub fn world_to_cell(&self, position: Vec2) -> Option<CellCoord> {
        let local = (position - self.origin) / self.resolution;
        if local.x < 0.0 || local.y < 0.0 {
            return None;
        }

        let column = local.x.floor() as u32;
        let row = local.y.floor() as u32;
        if column < self.width && row < self.height {
            Some(CellCoord::new(column, row))
        } else {
            None
        }
    }

    /// Centre of the grid in world units.
    #[must_use]
    pub fn world_center(&self) -> Vec2 {
        self.world_bounds().center()
    }

    /// Number of cells in the provided state.
    #[must_use]
    pub fn count(&self, state: CellState) -> usize {
        self.cells.iter().filter(|cell| **cell == state).count()
    }

    fn index(&self, cell: CellCoord) -> Option<usize> {
        if cell.column() < self.width && cell.row() < self.height {
            let row = usize::try_from(cell.row()).ok()?;
            let column = usize::try_from(cell.column()).ok()?;
            let width = usize::try_from(self.width).ok()?;
            Some(row * width + column)
        } else {
            None
        }
    }
}

/// Failures reported by a map-providing service.
#[derive(Clone, Debug, PartialEq, Eq, Error)]
pub enum MapServiceError {
    /// The service could not be reached or refused the request.
    #[error("map service \"{service}\" is unreachable: {reason}")]
    Unreachable {
        /// Name of the requested service.
        service: String,
        /// Transport-level explanation.
        reason: String,
    },
    /// The service answered without any map data.
    #[error("map service \"{service}\" returned an empty map")]
    EmptyResponse {
        /// Name of the requested service.
        service: String,
    },
}

/// Synchronous map-providing service addressed by name.
pub trait MapService {
    /// Fetches the static map published under `service_name`.
    fn fetch(&self, service_name: &str) -> Result<MapResponse, MapServiceError>;
}

/// Opaque body identifier allocated by the physics engine.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct BodyId(u64);

impl BodyId {
    /// Creates a body identifier with the provided numeric value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the identifier.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// Opaque collision-shape reference reported by contact events.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FixtureRef(u64);

impl FixtureRef {
    /// Creates a fixture reference with the provided numeric value.
    #[must_use]
    pub const fn new(value: u64) -> Self {
        Self(value)
    }

    /// Retrieves the numeric representation of the reference.
    #[must_use]
    pub const fn get(&self) -> u64 {
        self.0
    }
}

/// Body created by the physics engine together with its single fixture.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct PhysicsBody {
    /// Engine identifier of the body.
    pub body: BodyId,
    /// Fixture attached to the body.
    pub fixture: FixtureRef,
}

/// Collision shape attached to a body.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum BodyShape {
    /// Axis-aligned box described by its half extents.
    Box {
        /// Half width and half height in world units.
        half_extents: Vec2,
    },
    /// Circle described by its radius.
    Circle {
        /// Radius in world units.
        radius: f32,
    },
}

/// Whether the engine integrates the body's motion.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BodyMotion {
    /// Immovable body such as a wall.
    Static,
    /// Body moved by the simulation.
    Dynamic,
}

/// Description of a body the level asks the engine to create.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BodySpec {
    /// Initial centre of the body in world units.
    pub position: Vec2,
    /// Collision shape.
    pub shape: BodyShape,
    /// Static or dynamic motion.
    pub motion: BodyMotion,
}

/// Boundary towards the external physics engine.
pub trait PhysicsWorld {
    /// Creates a body and returns the engine's handles for it.
    fn create_body(&mut self, spec: &BodySpec) -> PhysicsBody;

    /// Destroys a previously created body.
    fn destroy_body(&mut self, body: BodyId);
}

/// Spawn instruction handed to the obstacle set for a single wanderer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WandererSpawn {
    /// Sampled spawn position in world units.
    pub position: Vec2,
    /// Episode body the level created for the wanderer.
    pub body: PhysicsBody,
}

/// Per-episode parameters forwarded to the obstacle set.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ObstacleConfig {
    /// Whether spawned wanderers represent humans.
    pub human: bool,
    /// Collision radius of each wanderer.
    pub radius: f32,
    /// Travel speed of each wanderer in world units per second.
    pub speed: f32,
}

/// Dynamic obstacle agents driven, but not owned, by the level.
pub trait ObstacleSet {
    /// Replaces every wanderer with freshly spawned ones.
    fn spawn(&mut self, spawns: &[WandererSpawn], config: &ObstacleConfig);

    /// Advances every wanderer by one tick.
    fn step(&mut self);

    /// Appends observation features for the agent without clearing `buffer`.
    fn wanderer_data(&self, buffer: &mut Vec<f32>);

    /// Reports whether `fixture` belongs to a human wanderer touching the robot.
    fn check_human_contact(&self, fixture: FixtureRef) -> bool;

    /// Distance from `point` to the surface of the nearest wanderer.
    fn closest_distance(&self, point: Vec2) -> Option<f32>;

    /// Number of live wanderers.
    fn len(&self) -> usize;

    /// Reports whether no wanderer is alive.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Renderer boundary used to visualize spawn regions.
pub trait SpawnAreaRenderer {
    /// Draws the provided world-space spawn rectangles.
    fn draw_spawn_areas(&mut self, regions: &[WorldRect]);
}

/// Tunable parameters of a static-map level.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LevelConfig {
    /// Name of the map-providing service; empty means "use the cached map only".
    pub map_service: String,
    /// Whether dynamic wanderers are spawned each episode.
    pub dynamic: bool,
    /// Whether spawned wanderers are tagged as humans.
    pub human: bool,
    /// Minimum side length of a spawn region block, in world units.
    pub spawn_block_size: f32,
    /// Free fraction a mixed block must reach to be kept as a spawn region.
    pub mixed_leaf_free_fraction: f32,
    /// Number of wanderers spawned per episode.
    pub wanderer_count: usize,
    /// Collision radius of each wanderer.
    pub wanderer_radius: f32,
    /// Travel speed of each wanderer in world units per second.
    pub wanderer_speed: f32,
    /// Minimum distance between the robot and a wanderer spawn point.
    pub spawn_clearance: f32,
    /// Minimum distance between the robot and the goal.
    pub goal_clearance: f32,
    /// Distance below which the human-distance reward terms apply.
    pub safety_distance: f32,
    /// Reward added when the closest wanderer got nearer inside the safety distance.
    pub reward_distance_decreased: f32,
    /// Reward added when the closest wanderer moved away inside the safety distance.
    pub reward_distance_increased: f32,
    /// Reward added for a step in which the robot touched a human.
    pub reward_human_contact: f32,
    /// Seed of the level's sampling generator.
    pub rng_seed: u64,
}

impl Default for LevelConfig {
    fn default() -> Self {
        Self {
            map_service: String::from("static_map"),
            dynamic: true,
            human: true,
            spawn_block_size: 0.1,
            mixed_leaf_free_fraction: 1.0,
            wanderer_count: 4,
            wanderer_radius: 0.2,
            wanderer_speed: 0.3,
            spawn_clearance: 1.0,
            goal_clearance: 1.0,
            safety_distance: 1.2,
            reward_distance_decreased: -0.1,
            reward_distance_increased: 0.1,
            reward_human_contact: -10.0,
            rng_seed: 0x5eed_a2d0_0000_0001,
        }
    }
}

impl LevelConfig {
    /// Obstacle parameters forwarded to the obstacle set on spawn.
    #[must_use]
    pub const fn obstacle_config(&self) -> ObstacleConfig {
        ObstacleConfig {
            human: self.human,
            radius: self.wanderer_radius,
            speed: self.wanderer_speed,
        }
    }
}

/// Why a reset had to fall back to the default placement.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SpawnFallbackReason {
    /// The spawn index contains no free region.
    NoFreeRegions,
    /// No sampled point satisfied the requested clearance.
    ClearanceUnsatisfied,
}

/// Events broadcast by the level while it manages episodes.
#[derive(Clone, Debug, PartialEq)]
pub enum Event {
    /// The static map was loaded and its permanent bodies created.
    MapLoaded {
        /// Identity of the loaded grid.
        map: MapId,
        /// Number of permanent bodies created for the map.
        permanent_bodies: usize,
    },
    /// The level obtained the spawn index for its map.
    SpawnIndexReady {
        /// Identity of the indexed grid.
        map: MapId,
        /// Number of free regions in the index.
        regions: usize,
    },
    /// Episode bodies were destroyed by a lazy clear.
    EpisodeBodiesCleared {
        /// Number of episode bodies destroyed.
        destroyed: usize,
        /// Number of permanent bodies retained.
        retained: usize,
    },
    /// Wanderers were spawned for the new episode.
    ObstaclesSpawned {
        /// Number of wanderers handed to the obstacle set.
        count: usize,
    },
    /// A placement could not be sampled and the default was used instead.
    SpawnFallback {
        /// Reason the fallback was taken.
        reason: SpawnFallbackReason,
    },
    /// The robot was moved to a new start position.
    RobotReset {
        /// New robot position in world units.
        position: Vec2,
    },
    /// A goal was placed for the new episode.
    GoalPlaced {
        /// Goal position in world units.
        position: Vec2,
    },
    /// The distance record advanced by one step.
    DistanceUpdated {
        /// Distance recorded by the previous step.
        previous: f32,
        /// Distance measured in this step.
        current: f32,
    },
}

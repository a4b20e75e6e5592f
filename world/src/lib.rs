#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Episode state for the static-map training level.
//!
//! A [`Level`] owns everything that survives between episodes: the shared
//! occupancy grid, the memoized spawn index, the permanent physics bodies and
//! the robot-to-wanderer distance record. Physics, wanderers and rendering
//! are reached through the collaborator traits declared in
//! `arena_level_core`, so the level never depends on a concrete engine.

mod bodies;
mod distance;
mod static_map;

use std::sync::Arc;

use arena_level_core::{
    BodyMotion, BodyShape, BodySpec, Event, FixtureRef, LevelConfig, ObstacleSet,
    OccupancyGrid, PhysicsWorld, SpawnAreaRenderer, SpawnFallbackReason, WandererSpawn,
    FAR_DISTANCE,
};
use arena_level_map_provider::{MapError, MapProvider};
use arena_level_spawn_index::{SpawnIndex, SpawnIndexCache, SpawnParams};
use glam::Vec2;
use log::{debug, info, warn};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

use bodies::BodyArenas;
pub use bodies::{BodyHandle, BodyLifetime};
pub use distance::DistanceRecord;

/// Rejected samples tolerated before a clearance constraint is abandoned.
const CLEARANCE_ATTEMPTS: usize = 32;

/// Lifecycle stage of a [`Level`].
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LevelPhase {
    /// No episode has been reset yet.
    Uninitialized,
    /// An episode is running and accepts updates.
    Ready,
    /// An update is in progress.
    Stepping,
}

/// Errors reported by level operations.
#[derive(Debug, thiserror::Error)]
pub enum LevelError {
    /// The provider neither returned a map nor had one cached.
    #[error("map service `{service}` returned no map and none is cached")]
    MapUnavailable {
        /// Configured map service name.
        service: String,
    },
    /// Fetching or validating the static map failed.
    #[error(transparent)]
    Map(#[from] MapError),
    /// A reset was requested before any map was loaded.
    #[error("cannot reset before a static map has been loaded")]
    StaleIndex,
    /// An update was requested before the first reset.
    #[error("cannot update before the first episode reset")]
    NotReady,
    /// A permanent body was registered after episodes started.
    #[error("permanent bodies must be registered before the first reset")]
    EpisodeStarted,
}

/// Outcome of a successful [`Level::reset`].
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ResetReport {
    fallbacks: Vec<SpawnFallbackReason>,
    wanderers: usize,
    destroyed: usize,
}

impl ResetReport {
    /// Reports whether any placement fell back to the default position.
    #[must_use]
    pub fn spawn_fallback(&self) -> bool {
        !self.fallbacks.is_empty()
    }

    /// Distinct fallback reasons encountered during the reset.
    #[must_use]
    pub fn fallbacks(&self) -> &[SpawnFallbackReason] {
        &self.fallbacks
    }

    /// Number of wanderers spawned for the new episode.
    #[must_use]
    pub const fn wanderers(&self) -> usize {
        self.wanderers
    }

    /// Number of episode bodies destroyed by the lazy clear.
    #[must_use]
    pub const fn destroyed(&self) -> usize {
        self.destroyed
    }

    fn note_fallback(&mut self, reason: SpawnFallbackReason, out_events: &mut Vec<Event>) {
        if self.fallbacks.contains(&reason) {
            return;
        }

        warn!("spawn placement fell back to the default position: {reason:?}");
        self.fallbacks.push(reason);
        out_events.push(Event::SpawnFallback { reason });
    }
}

/// Static-map level driving episode resets, per-step distance tracking and
/// reward computation.
#[derive(Debug)]
pub struct Level {
    config: LevelConfig,
    params: SpawnParams,
    maps: Arc<MapProvider>,
    spawn_cache: Arc<SpawnIndexCache>,
    phase: LevelPhase,
    grid: Option<Arc<OccupancyGrid>>,
    spawn_index: Option<Arc<SpawnIndex>>,
    bodies: BodyArenas,
    distance: DistanceRecord,
    human_contact: bool,
    robot: Vec2,
    goal: Option<Vec2>,
    episodes: u64,
    rng: ChaCha8Rng,
}

impl Level {
    /// Creates a level that fetches its map from `maps` and shares spawn
    /// indices through `spawn_cache`.
    #[must_use]
    pub fn new(
        config: LevelConfig,
        maps: Arc<MapProvider>,
        spawn_cache: Arc<SpawnIndexCache>,
    ) -> Self {
        Self {
            params: SpawnParams::from_config(&config),
            rng: ChaCha8Rng::seed_from_u64(config.rng_seed),
            config,
            maps,
            spawn_cache,
            phase: LevelPhase::Uninitialized,
            grid: None,
            spawn_index: None,
            bodies: BodyArenas::default(),
            distance: DistanceRecord::far(),
            human_contact: false,
            robot: Vec2::ZERO,
            goal: None,
            episodes: 0,
        }
    }

    /// Fetches the static map and creates its wall bodies.
    ///
    /// Loading is idempotent: once a grid is held, later calls do nothing.
    pub fn load_map<P>(
        &mut self,
        physics: &mut P,
        out_events: &mut Vec<Event>,
    ) -> Result<(), LevelError>
    where
        P: PhysicsWorld + ?Sized,
    {
        if self.grid.is_some() {
            return Ok(());
        }

        let service = self.config.map_service.as_str();
        let grid = self
            .maps
            .get_map(service)?
            .ok_or_else(|| LevelError::MapUnavailable {
                service: service.to_owned(),
            })?;

        let walls = static_map::wall_specs(&grid);
        for spec in &walls {
            let body = physics.create_body(spec);
            let _ = self.bodies.insert_permanent(body);
        }
        info!(
            "loaded static map {} ({}x{} cells) with {} wall bodies",
            grid.id().get(),
            grid.width(),
            grid.height(),
            walls.len()
        );

        self.robot = grid.world_center();
        out_events.push(Event::MapLoaded {
            map: grid.id(),
            permanent_bodies: self.bodies.permanent_len(),
        });
        self.grid = Some(grid);
        Ok(())
    }

    /// Creates a body that survives every episode reset.
    ///
    /// Only allowed before the first reset, which fixes the number of
    /// non-clearable bodies for the rest of the level's life.
    pub fn register_permanent_body<P>(
        &mut self,
        physics: &mut P,
        spec: &BodySpec,
    ) -> Result<BodyHandle, LevelError>
    where
        P: PhysicsWorld + ?Sized,
    {
        if self.episodes > 0 {
            return Err(LevelError::EpisodeStarted);
        }

        let body = physics.create_body(spec);
        Ok(self.bodies.insert_permanent(body))
    }

    /// Starts a new episode.
    ///
    /// Obtains the spawn index (built at most once per map and parameters),
    /// optionally moves the robot, destroys last episode's bodies, spawns
    /// fresh wanderers and places a new goal.
    pub fn reset<P, O>(
        &mut self,
        reset_robot_position: bool,
        physics: &mut P,
        obstacles: &mut O,
        out_events: &mut Vec<Event>,
    ) -> Result<ResetReport, LevelError>
    where
        P: PhysicsWorld + ?Sized,
        O: ObstacleSet + ?Sized,
    {
        let grid = self.grid.clone().ok_or(LevelError::StaleIndex)?;
        let index = self.obtain_spawn_index(&grid, out_events);
        let mut report = ResetReport::default();

        if reset_robot_position {
            let position = match index.sample_point(&mut self.rng) {
                Some(position) => position,
                None => {
                    report.note_fallback(SpawnFallbackReason::NoFreeRegions, out_events);
                    grid.world_center()
                }
            };
            self.robot = position;
            out_events.push(Event::RobotReset { position });
        }

        let spawn_points = if self.config.dynamic {
            self.wanderer_points(&index, &mut report, out_events)
        } else {
            Vec::new()
        };

        report.destroyed = self.bodies.lazy_clear(physics);
        out_events.push(Event::EpisodeBodiesCleared {
            destroyed: report.destroyed,
            retained: self.bodies.permanent_len(),
        });

        if self.config.dynamic {
            let shape = BodyShape::Circle {
                radius: self.config.wanderer_radius,
            };
            let mut spawns = Vec::with_capacity(spawn_points.len());
            for position in spawn_points {
                let body = physics.create_body(&BodySpec {
                    position,
                    shape,
                    motion: BodyMotion::Dynamic,
                });
                let _ = self.bodies.insert_episode(body);
                spawns.push(WandererSpawn { position, body });
            }
            obstacles.spawn(&spawns, &self.config.obstacle_config());
            report.wanderers = spawns.len();
            out_events.push(Event::ObstaclesSpawned {
                count: spawns.len(),
            });
        }

        let goal = self.goal_position(&grid, &index, &mut report, out_events);
        self.goal = Some(goal);
        out_events.push(Event::GoalPlaced { position: goal });

        self.distance.reset();
        self.human_contact = false;
        self.episodes += 1;
        self.phase = LevelPhase::Ready;
        debug!(
            "episode {} reset: robot {:?}, goal {:?}, {} wanderers",
            self.episodes, self.robot, goal, report.wanderers
        );
        Ok(report)
    }

    /// Advances the wanderers by one tick and records the new distance.
    pub fn update<O>(
        &mut self,
        obstacles: &mut O,
        out_events: &mut Vec<Event>,
    ) -> Result<(), LevelError>
    where
        O: ObstacleSet + ?Sized,
    {
        if self.phase != LevelPhase::Ready {
            return Err(LevelError::NotReady);
        }

        self.phase = LevelPhase::Stepping;
        self.human_contact = false;
        obstacles.step();

        let previous = self.distance.current();
        let current = obstacles
            .closest_distance(self.robot)
            .unwrap_or(FAR_DISTANCE);
        self.distance.advance(current);
        out_events.push(Event::DistanceUpdated { previous, current });

        self.phase = LevelPhase::Ready;
        Ok(())
    }

    /// Reward earned by the most recent update.
    #[must_use]
    pub fn reward(&self) -> f32 {
        distance::step_reward(&self.distance, self.human_contact, &self.config)
    }

    /// Reports whether `fixture` touches a wanderer and remembers a contact
    /// for the current step's reward.
    pub fn check_human_contact<O>(&mut self, obstacles: &O, fixture: FixtureRef) -> bool
    where
        O: ObstacleSet + ?Sized,
    {
        let touching = obstacles.check_human_contact(fixture);
        if touching {
            self.human_contact = true;
        }
        touching
    }

    /// Draws every spawn region through the provided renderer.
    ///
    /// Nothing is drawn until the first reset has obtained the spawn index.
    pub fn render_goal_spawn<R>(&self, renderer: &mut R)
    where
        R: SpawnAreaRenderer + ?Sized,
    {
        if let Some(index) = &self.spawn_index {
            renderer.draw_spawn_areas(&index.region_bounds());
        }
    }

    /// Appends the wanderers' observation values to `buffer`.
    pub fn agent_data<O>(&self, obstacles: &O, buffer: &mut Vec<f32>)
    where
        O: ObstacleSet + ?Sized,
    {
        obstacles.wanderer_data(buffer);
    }

    /// Moves the robot to a position reported by the host simulation.
    pub fn set_robot_position(&mut self, position: Vec2) {
        self.robot = position;
    }

    fn obtain_spawn_index(
        &mut self,
        grid: &OccupancyGrid,
        out_events: &mut Vec<Event>,
    ) -> Arc<SpawnIndex> {
        if let Some(index) = &self.spawn_index {
            if index.map() == grid.id() {
                return Arc::clone(index);
            }
        }

        let index = self.spawn_cache.get_or_build(grid, self.params);
        out_events.push(Event::SpawnIndexReady {
            map: index.map(),
            regions: index.len(),
        });
        self.spawn_index = Some(Arc::clone(&index));
        index
    }

    fn wanderer_points(
        &mut self,
        index: &SpawnIndex,
        report: &mut ResetReport,
        out_events: &mut Vec<Event>,
    ) -> Vec<Vec2> {
        if index.is_empty() {
            report.note_fallback(SpawnFallbackReason::NoFreeRegions, out_events);
            return Vec::new();
        }

        let mut points = Vec::with_capacity(self.config.wanderer_count);
        for _ in 0..self.config.wanderer_count {
            let cleared = index.sample_point_with_clearance(
                &mut self.rng,
                self.robot,
                self.config.spawn_clearance,
                CLEARANCE_ATTEMPTS,
            );
            let point = match cleared {
                Some(point) => Some(point),
                None => {
                    report.note_fallback(SpawnFallbackReason::ClearanceUnsatisfied, out_events);
                    index.sample_point(&mut self.rng)
                }
            };
            points.extend(point);
        }
        points
    }

    fn goal_position(
        &mut self,
        grid: &OccupancyGrid,
        index: &SpawnIndex,
        report: &mut ResetReport,
        out_events: &mut Vec<Event>,
    ) -> Vec2 {
        if index.is_empty() {
            report.note_fallback(SpawnFallbackReason::NoFreeRegions, out_events);
            return grid.world_center();
        }

        if let Some(goal) = index.sample_point_with_clearance(
            &mut self.rng,
            self.robot,
            self.config.goal_clearance,
            CLEARANCE_ATTEMPTS,
        ) {
            return goal;
        }

        report.note_fallback(SpawnFallbackReason::ClearanceUnsatisfied, out_events);
        index
            .sample_point(&mut self.rng)
            .unwrap_or_else(|| grid.world_center())
    }
}

/// Read-only queries over a [`Level`].
pub mod query {
    use std::sync::Arc;

    use arena_level_core::{LevelConfig, OccupancyGrid, PhysicsBody};
    use arena_level_spawn_index::SpawnIndex;
    use glam::Vec2;

    use super::{BodyHandle, BodyLifetime, DistanceRecord, Level, LevelPhase};

    /// Current lifecycle stage of the level.
    #[must_use]
    pub fn phase(level: &Level) -> LevelPhase {
        level.phase
    }

    /// Configuration the level was created with.
    #[must_use]
    pub fn config(level: &Level) -> &LevelConfig {
        &level.config
    }

    /// Static map held by the level, once loaded.
    #[must_use]
    pub fn grid(level: &Level) -> Option<&Arc<OccupancyGrid>> {
        level.grid.as_ref()
    }

    /// Spawn index obtained by the first reset.
    #[must_use]
    pub fn spawn_index(level: &Level) -> Option<&Arc<SpawnIndex>> {
        level.spawn_index.as_ref()
    }

    /// Robot position used for spawning and distance measurements.
    #[must_use]
    pub fn robot_position(level: &Level) -> Vec2 {
        level.robot
    }

    /// Goal of the running episode.
    #[must_use]
    pub fn goal(level: &Level) -> Option<Vec2> {
        level.goal
    }

    /// Distance record as of the latest update.
    #[must_use]
    pub fn distance_record(level: &Level) -> DistanceRecord {
        level.distance
    }

    /// Reports whether a wanderer contact was flagged during the current step.
    #[must_use]
    pub fn human_contact(level: &Level) -> bool {
        level.human_contact
    }

    /// Number of episodes started so far.
    #[must_use]
    pub fn episodes(level: &Level) -> u64 {
        level.episodes
    }

    /// Number of bodies that survive every reset.
    #[must_use]
    pub fn non_clearable_bodies(level: &Level) -> usize {
        level.bodies.permanent_len()
    }

    /// Number of bodies created for the running episode.
    #[must_use]
    pub fn episode_bodies(level: &Level) -> usize {
        level.bodies.episode_len()
    }

    /// Handles of all live bodies allocated from the given arena.
    #[must_use]
    pub fn body_handles(level: &Level, lifetime: BodyLifetime) -> Vec<BodyHandle> {
        level.bodies.handles(lifetime)
    }

    /// Reports whether a handle still refers to a live body.
    #[must_use]
    pub fn is_body_valid(level: &Level, handle: BodyHandle) -> bool {
        level.bodies.is_valid(handle)
    }

    /// Physics identifiers behind a handle, if it is still valid.
    #[must_use]
    pub fn body(level: &Level, handle: BodyHandle) -> Option<PhysicsBody> {
        level.bodies.get(handle)
    }
}

//! Scripted episodes driving a level with headless collaborators.

use std::{fmt, sync::Arc};

use anyhow::{Context, Result};
use arena_level_core::{BodyMotion, BodyShape, BodySpec, Event, LevelConfig};
use arena_level_headless_physics::HeadlessPhysics;
use arena_level_map_provider::MapProvider;
use arena_level_rendering::Scene;
use arena_level_spawn_index::SpawnIndexCache;
use arena_level_wanderers::{Config as WandererConfig, Wanderers};
use arena_level_world::{query, Level};
use glam::Vec2;
use log::{debug, info};

const TIME_STEP: f32 = 0.1;
const ROBOT_SPEED: f32 = 0.6;
const ROBOT_RADIUS: f32 = 0.2;
const GOAL_RADIUS: f32 = 0.1;
const WANDERER_SEED_ROTATION: u32 = 17;

/// Outcome of one scripted episode.
#[derive(Clone, Debug, PartialEq)]
pub(crate) struct EpisodeSummary {
    pub(crate) episode: u64,
    pub(crate) steps: usize,
    pub(crate) reward: f32,
    pub(crate) contacts: usize,
    pub(crate) reached_goal: bool,
    pub(crate) spawn_fallback: bool,
    pub(crate) observation_len: usize,
}

impl fmt::Display for EpisodeSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "episode {}: {} steps, reward {:.2}, {} contacts, {} observation values, goal {}",
            self.episode,
            self.steps,
            self.reward,
            self.contacts,
            self.observation_len,
            if self.reached_goal { "reached" } else { "missed" }
        )?;
        if self.spawn_fallback {
            write!(f, " (spawn fallback)")?;
        }
        Ok(())
    }
}

/// Level plus the headless physics and wanderers it drives.
#[derive(Debug)]
pub(crate) struct Runner {
    level: Level,
    physics: HeadlessPhysics,
    wanderers: Wanderers,
    events: Vec<Event>,
    observation: Vec<f32>,
}

impl Runner {
    pub(crate) fn new(config: LevelConfig, maps: Arc<MapProvider>) -> Result<Self> {
        let wanderer_seed = config.rng_seed.rotate_left(WANDERER_SEED_ROTATION);
        let mut level = Level::new(config, maps, Arc::new(SpawnIndexCache::new()));
        let mut physics = HeadlessPhysics::new();
        let mut events = Vec::new();
        level
            .load_map(&mut physics, &mut events)
            .context("failed to load the static map")?;

        let grid = query::grid(&level).context("level holds no map after loading")?;
        let bounds = grid.world_bounds();
        let start = grid.world_center();
        let _ = level.register_permanent_body(
            &mut physics,
            &BodySpec {
                position: start,
                shape: BodyShape::Circle {
                    radius: ROBOT_RADIUS,
                },
                motion: BodyMotion::Dynamic,
            },
        )?;
        info!(
            "level ready with {} non-clearable bodies",
            query::non_clearable_bodies(&level)
        );

        Ok(Self {
            level,
            physics,
            wanderers: Wanderers::new(
                WandererConfig::new(bounds, wanderer_seed).with_time_step(TIME_STEP),
            ),
            events,
            observation: Vec::new(),
        })
    }

    pub(crate) fn run_episode(&mut self, steps: usize) -> Result<EpisodeSummary> {
        self.events.clear();
        let report = self.level.reset(
            true,
            &mut self.physics,
            &mut self.wanderers,
            &mut self.events,
        )?;
        let goal = query::goal(&self.level).context("reset placed no goal")?;
        let mut summary = EpisodeSummary {
            episode: query::episodes(&self.level),
            steps: 0,
            reward: 0.0,
            contacts: 0,
            reached_goal: false,
            spawn_fallback: report.spawn_fallback(),
            observation_len: 0,
        };

        for _ in 0..steps {
            let robot = step_towards(
                query::robot_position(&self.level),
                goal,
                ROBOT_SPEED * TIME_STEP,
            );
            self.level.set_robot_position(robot);
            self.level.update(&mut self.wanderers, &mut self.events)?;

            for fixture in self.wanderers.fixtures_within(robot, ROBOT_RADIUS) {
                if self.level.check_human_contact(&self.wanderers, fixture) {
                    summary.contacts += 1;
                }
            }
            summary.reward += self.level.reward();
            summary.steps += 1;

            self.observation.clear();
            self.level.agent_data(&self.wanderers, &mut self.observation);
            summary.observation_len = self.observation.len();

            if robot.distance(goal) <= GOAL_RADIUS {
                summary.reached_goal = true;
                break;
            }
        }

        debug!(
            "episode {} emitted {} events with {} live bodies",
            summary.episode,
            self.events.len(),
            self.physics.live_count()
        );
        Ok(summary)
    }

    pub(crate) fn scene(&self) -> Option<Scene> {
        let grid = query::grid(&self.level)?;
        let mut scene = Scene::new(Arc::clone(grid));
        self.level.render_goal_spawn(&mut scene);
        scene.robot = Some(query::robot_position(&self.level));
        scene.goal = query::goal(&self.level);
        scene.wanderers = self
            .wanderers
            .wanderers()
            .iter()
            .map(|wanderer| wanderer.position)
            .collect();
        scene.wanderer_radius = query::config(&self.level).wanderer_radius;
        Some(scene)
    }
}

/// Moves `from` towards `to` by at most `max_step`.
pub(crate) fn step_towards(from: Vec2, to: Vec2, max_step: f32) -> Vec2 {
    let delta = to - from;
    let distance = delta.length();
    if distance <= max_step {
        to
    } else {
        from + delta / distance * max_step
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use arena_level_map_files::{parse_map, InMemoryMapService};

    const ROOM: &str = "
version = 1
resolution = 0.25
rows = [
    '############',
    '#..........#',
    '#..........#',
    '#..........#',
    '#..........#',
    '#..........#',
    '#..........#',
    '############',
]
";

    fn runner(config: LevelConfig) -> Runner {
        let service = InMemoryMapService::new()
            .with_map("room", parse_map(ROOM).expect("room parses"));
        let config = LevelConfig {
            map_service: "room".to_owned(),
            ..config
        };
        Runner::new(config, Arc::new(MapProvider::new(service))).expect("runner builds")
    }

    #[test]
    fn step_towards_never_overshoots() {
        let from = Vec2::ZERO;
        let to = Vec2::new(3.0, 4.0);
        assert_eq!(step_towards(from, to, 1.0), Vec2::new(0.6, 0.8));
        assert_eq!(step_towards(from, to, 10.0), to);
    }

    #[test]
    fn robot_reaches_goal_without_wanderers() {
        let mut runner = runner(LevelConfig {
            dynamic: false,
            ..LevelConfig::default()
        });

        let summary = runner.run_episode(500).expect("episode runs");

        assert!(summary.reached_goal, "scripted robot should reach the goal");
        assert_eq!(summary.reward, 0.0);
        assert_eq!(summary.contacts, 0);
        assert_eq!(summary.observation_len, 0);
        let scene = runner.scene().expect("map loaded");
        assert!(scene.wanderers.is_empty());
    }

    #[test]
    fn episodes_report_wanderer_observations() {
        let mut runner = runner(LevelConfig {
            wanderer_count: 2,
            ..LevelConfig::default()
        });

        for expected in 1..=3 {
            let summary = runner.run_episode(20).expect("episode runs");
            assert_eq!(summary.episode, expected);
            assert!(summary.steps <= 20);
            assert_eq!(summary.observation_len, 2 * 4);
        }

        let scene = runner.scene().expect("map loaded");
        assert_eq!(scene.wanderers.len(), 2);
        assert!(!scene.spawn_areas.is_empty());
        assert!(scene.goal.is_some());
    }
}

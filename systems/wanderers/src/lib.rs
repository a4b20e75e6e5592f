#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Random-walk wanderers used as the level's dynamic obstacles.
//!
//! Wanderers drift in straight lines, occasionally pick a new heading and
//! bounce off the arena bounds. They do not plan around walls; collision
//! response belongs to the physics engine.

use std::f32::consts::TAU;

use arena_level_core::{
    BodyId, FixtureRef, ObstacleConfig, ObstacleSet, WandererSpawn, WorldRect,
};
use glam::Vec2;
use log::debug;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const DEFAULT_TIME_STEP: f32 = 0.1;
const DEFAULT_TURN_PROBABILITY: f64 = 0.05;

/// Configuration parameters required to construct the wanderer set.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Config {
    bounds: WorldRect,
    rng_seed: u64,
    time_step: f32,
    turn_probability: f64,
}

impl Config {
    /// Creates a configuration confining wanderers to `bounds`.
    #[must_use]
    pub const fn new(bounds: WorldRect, rng_seed: u64) -> Self {
        Self {
            bounds,
            rng_seed,
            time_step: DEFAULT_TIME_STEP,
            turn_probability: DEFAULT_TURN_PROBABILITY,
        }
    }

    /// Overrides the simulated seconds advanced by one step.
    #[must_use]
    pub const fn with_time_step(mut self, time_step: f32) -> Self {
        self.time_step = time_step;
        self
    }

    /// Overrides the per-step chance of picking a new heading.
    #[must_use]
    pub const fn with_turn_probability(mut self, turn_probability: f64) -> Self {
        self.turn_probability = turn_probability;
        self
    }
}

/// Snapshot of a single wanderer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Wanderer {
    /// Physics body backing the wanderer.
    pub body: BodyId,
    /// Fixture reported in contact events.
    pub fixture: FixtureRef,
    /// Centre in world units.
    pub position: Vec2,
    /// Velocity in world units per second.
    pub velocity: Vec2,
}

/// Set of wanderers performing bounded random walks.
#[derive(Debug)]
pub struct Wanderers {
    bounds: WorldRect,
    time_step: f32,
    turn_probability: f64,
    obstacle: ObstacleConfig,
    wanderers: Vec<Wanderer>,
    rng: ChaCha8Rng,
}

impl Wanderers {
    /// Creates an empty wanderer set.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self {
            bounds: config.bounds,
            time_step: config.time_step,
            turn_probability: sanitize_probability(config.turn_probability),
            obstacle: ObstacleConfig {
                human: false,
                radius: 0.0,
                speed: 0.0,
            },
            wanderers: Vec::new(),
            rng: ChaCha8Rng::seed_from_u64(config.rng_seed),
        }
    }

    /// Current wanderers in spawn order.
    #[must_use]
    pub fn wanderers(&self) -> &[Wanderer] {
        &self.wanderers
    }

    /// Fixtures of every wanderer whose disc overlaps the circle at `point`.
    #[must_use]
    pub fn fixtures_within(&self, point: Vec2, radius: f32) -> Vec<FixtureRef> {
        let reach = radius + self.obstacle.radius;
        self.wanderers
            .iter()
            .filter(|wanderer| wanderer.position.distance(point) <= reach)
            .map(|wanderer| wanderer.fixture)
            .collect()
    }

    fn random_velocity(&mut self) -> Vec2 {
        let heading = self.rng.gen_range(0.0..TAU);
        Vec2::from_angle(heading) * self.obstacle.speed
    }

    fn bounce(&self, wanderer: &mut Wanderer) {
        let radius = Vec2::splat(self.obstacle.radius);
        let low = self.bounds.min() + radius;
        let high = self.bounds.max() - radius;

        if low.x > high.x {
            wanderer.position.x = self.bounds.center().x;
            wanderer.velocity.x = 0.0;
        } else if wanderer.position.x < low.x {
            wanderer.position.x = low.x;
            wanderer.velocity.x = wanderer.velocity.x.abs();
        } else if wanderer.position.x > high.x {
            wanderer.position.x = high.x;
            wanderer.velocity.x = -wanderer.velocity.x.abs();
        }

        if low.y > high.y {
            wanderer.position.y = self.bounds.center().y;
            wanderer.velocity.y = 0.0;
        } else if wanderer.position.y < low.y {
            wanderer.position.y = low.y;
            wanderer.velocity.y = wanderer.velocity.y.abs();
        } else if wanderer.position.y > high.y {
            wanderer.position.y = high.y;
            wanderer.velocity.y = -wanderer.velocity.y.abs();
        }
    }
}

impl ObstacleSet for Wanderers {
    fn spawn(&mut self, spawns: &[WandererSpawn], config: &ObstacleConfig) {
        self.obstacle = *config;
        self.wanderers.clear();
        for spawn in spawns {
            let velocity = self.random_velocity();
            self.wanderers.push(Wanderer {
                body: spawn.body.body,
                fixture: spawn.body.fixture,
                position: spawn.position,
                velocity,
            });
        }
        debug!("spawned {} wanderers", self.wanderers.len());
    }

    fn step(&mut self) {
        let mut wanderers = std::mem::take(&mut self.wanderers);
        for wanderer in &mut wanderers {
            if self.rng.gen_bool(self.turn_probability) {
                wanderer.velocity = self.random_velocity();
            }
            wanderer.position += wanderer.velocity * self.time_step;
            self.bounce(wanderer);
        }
        self.wanderers = wanderers;
    }

    fn wanderer_data(&self, buffer: &mut Vec<f32>) {
        for wanderer in &self.wanderers {
            buffer.extend_from_slice(&[
                wanderer.position.x,
                wanderer.position.y,
                wanderer.velocity.x,
                wanderer.velocity.y,
            ]);
        }
    }

    fn check_human_contact(&self, fixture: FixtureRef) -> bool {
        self.obstacle.human
            && self
                .wanderers
                .iter()
                .any(|wanderer| wanderer.fixture == fixture)
    }

    fn closest_distance(&self, point: Vec2) -> Option<f32> {
        self.wanderers
            .iter()
            .map(|wanderer| {
                (wanderer.position.distance(point) - self.obstacle.radius).max(0.0)
            })
            .reduce(f32::min)
    }

    fn len(&self) -> usize {
        self.wanderers.len()
    }
}

/// Clamps into `0.0..=1.0`; NaN disables turning.
fn sanitize_probability(probability: f64) -> f64 {
    if probability.is_nan() {
        0.0
    } else {
        probability.clamp(0.0, 1.0)
    }
}

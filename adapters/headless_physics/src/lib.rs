#![deny(
    unsafe_code,
    missing_docs,
    dead_code,
    unused_results,
    non_snake_case,
    unreachable_pub
)]

//! Headless stand-in for the physics engine.
//!
//! Bodies are only registered, never integrated. The registry answers which
//! bodies are alive so episode bookkeeping can be verified without a real
//! engine.

use std::collections::BTreeMap;

use arena_level_core::{BodyId, BodySpec, FixtureRef, PhysicsBody, PhysicsWorld};
use log::trace;

/// Body registry implementing the physics boundary without simulation.
#[derive(Debug, Default)]
pub struct HeadlessPhysics {
    bodies: BTreeMap<BodyId, BodySpec>,
    next_id: u64,
    created: u64,
    destroyed: u64,
}

impl HeadlessPhysics {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Reports whether the body exists.
    #[must_use]
    pub fn is_alive(&self, body: BodyId) -> bool {
        self.bodies.contains_key(&body)
    }

    /// Description the body was created from, while it is alive.
    #[must_use]
    pub fn spec(&self, body: BodyId) -> Option<&BodySpec> {
        self.bodies.get(&body)
    }

    /// Number of live bodies.
    #[must_use]
    pub fn live_count(&self) -> usize {
        self.bodies.len()
    }

    /// Total number of bodies ever created.
    #[must_use]
    pub const fn created(&self) -> u64 {
        self.created
    }

    /// Total number of bodies destroyed.
    #[must_use]
    pub const fn destroyed(&self) -> u64 {
        self.destroyed
    }
}

impl PhysicsWorld for HeadlessPhysics {
    fn create_body(&mut self, spec: &BodySpec) -> PhysicsBody {
        self.next_id += 1;
        let body = BodyId::new(self.next_id);
        let _ = self.bodies.insert(body, *spec);
        self.created += 1;
        trace!("created body {} at {:?}", body.get(), spec.position);

        PhysicsBody {
            body,
            fixture: FixtureRef::new(self.next_id),
        }
    }

    fn destroy_body(&mut self, body: BodyId) {
        if self.bodies.remove(&body).is_some() {
            self.destroyed += 1;
            trace!("destroyed body {}", body.get());
        }
    }
}

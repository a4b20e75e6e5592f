//! Physics-body bookkeeping split into a permanent and a per-episode arena.

use arena_level_core::{PhysicsBody, PhysicsWorld};

/// Arena a [`BodyHandle`] was allocated from.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum BodyLifetime {
    /// Created once (static map walls, host bodies) and never cleared.
    Permanent,
    /// Created for a single episode and destroyed by the next lazy clear.
    Episode,
}

/// Level-side reference to a body created through the physics boundary.
///
/// Episode handles remember the episode generation they were issued in, so a
/// handle kept across a reset is detectably stale instead of silently
/// aliasing a body from the new episode.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BodyHandle {
    lifetime: BodyLifetime,
    index: u32,
    generation: u32,
}

impl BodyHandle {
    /// Arena the handle belongs to.
    #[must_use]
    pub const fn lifetime(&self) -> BodyLifetime {
        self.lifetime
    }

    /// Position of the body within its arena, in creation order.
    #[must_use]
    pub const fn index(&self) -> u32 {
        self.index
    }
}

#[derive(Debug, Default)]
pub(crate) struct BodyArenas {
    permanent: Vec<PhysicsBody>,
    episode: Vec<PhysicsBody>,
    generation: u32,
}

impl BodyArenas {
    pub(crate) fn insert_permanent(&mut self, body: PhysicsBody) -> BodyHandle {
        let index = self.permanent.len() as u32;
        self.permanent.push(body);
        BodyHandle {
            lifetime: BodyLifetime::Permanent,
            index,
            generation: 0,
        }
    }

    pub(crate) fn insert_episode(&mut self, body: PhysicsBody) -> BodyHandle {
        let index = self.episode.len() as u32;
        self.episode.push(body);
        BodyHandle {
            lifetime: BodyLifetime::Episode,
            index,
            generation: self.generation,
        }
    }

    /// Destroys every episode body and invalidates their handles.
    ///
    /// The permanent arena is left untouched. Returns the number of bodies
    /// handed back to the physics engine.
    pub(crate) fn lazy_clear<P>(&mut self, physics: &mut P) -> usize
    where
        P: PhysicsWorld + ?Sized,
    {
        let destroyed = self.episode.len();
        for body in self.episode.drain(..) {
            physics.destroy_body(body.body);
        }
        self.generation = self.generation.wrapping_add(1);
        destroyed
    }

    pub(crate) fn get(&self, handle: BodyHandle) -> Option<PhysicsBody> {
        if !self.is_valid(handle) {
            return None;
        }

        let arena = match handle.lifetime {
            BodyLifetime::Permanent => &self.permanent,
            BodyLifetime::Episode => &self.episode,
        };
        arena.get(handle.index as usize).copied()
    }

    pub(crate) fn is_valid(&self, handle: BodyHandle) -> bool {
        match handle.lifetime {
            BodyLifetime::Permanent => (handle.index as usize) < self.permanent.len(),
            BodyLifetime::Episode => {
                handle.generation == self.generation && (handle.index as usize) < self.episode.len()
            }
        }
    }

    pub(crate) fn handles(&self, lifetime: BodyLifetime) -> Vec<BodyHandle> {
        let (len, generation) = match lifetime {
            BodyLifetime::Permanent => (self.permanent.len(), 0),
            BodyLifetime::Episode => (self.episode.len(), self.generation),
        };
        (0..len as u32)
            .map(|index| BodyHandle {
                lifetime,
                index,
                generation,
            })
            .collect()
    }

    pub(crate) fn permanent_len(&self) -> usize {
        self.permanent.len()
    }

    pub(crate) fn episode_len(&self) -> usize {
        self.episode.len()
    }
}

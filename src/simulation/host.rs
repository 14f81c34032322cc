//! Interface to the entity host that owns creature and food entities.
//!
//! The simulation never stores entities itself. It enumerates them, reads and
//! writes their transforms, and creates or destroys them through
//! [`EntityHost`]. [`MemoryHost`] is a small in-process implementation used by
//! the headless runner and the tests.

use std::collections::BTreeMap;

use geo::Point;
use serde::{Deserialize, Serialize};

/// Opaque, stable entity reference. Never reused by [`MemoryHost`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EntityId(pub u64);

/// Entity template, doubling as the tracking type tag in the spatial index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Template {
    /// A food item ("bouffe").
    Food,
    /// A creature ("bestiole").
    Creature,
}

/// Placement of an entity in the XZ plane. `pos.y()` holds world Z.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// Position as (x, z).
    pub pos: Point<f32>,
    /// Rotation around the vertical axis in radians.
    pub heading: f32,
    /// Uniform visual scale.
    pub scale: f32,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            pos: Point::new(0.0, 0.0),
            heading: 0.0,
            scale: 1.0,
        }
    }
}

/// Per-tick timing supplied by the host.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct FrameArgs {
    /// Wall-clock simulation time in seconds.
    pub time: f64,
    /// Elapsed time since the previous tick in seconds.
    pub delta_time: f64,
}

/// Entity storage and lifecycle operations the simulation depends on.
pub trait EntityHost {
    /// Creates `count` entities from `template` with default transforms.
    fn create_batch(&mut self, template: Template, count: usize) -> Vec<EntityId>;

    /// Queues entities for destruction. They stay alive until [`Self::flush_destroyed`].
    fn queue_destroy(&mut self, entities: &[EntityId]);

    /// Applies all queued destructions.
    fn flush_destroyed(&mut self);

    /// Live entities created from `template`, in creation order.
    fn entities(&self, template: Template) -> Vec<EntityId>;

    /// Current transform of a live entity.
    fn transform(&self, entity: EntityId) -> Option<Transform>;

    /// Moves a live entity. Unknown entities are ignored.
    fn set_position(&mut self, entity: EntityId, pos: Point<f32>);

    /// Rotates a live entity around the vertical axis.
    fn set_heading(&mut self, entity: EntityId, heading: f32);

    /// Sets the visual scale of a live entity.
    fn set_scale(&mut self, entity: EntityId, scale: f32);

    /// Number of live entities created from `template`.
    fn count(&self, template: Template) -> usize {
        self.entities(template).len()
    }

    /// Whether any entity created from `template` is alive.
    fn any_alive(&self, template: Template) -> bool {
        self.count(template) > 0
    }
}

#[derive(Debug, Clone)]
struct Entity {
    template: Template,
    transform: Transform,
}

/// In-memory [`EntityHost`] with monotonically increasing ids.
#[derive(Debug, Clone, Default)]
pub struct MemoryHost {
    entities: BTreeMap<EntityId, Entity>,
    destroy_queue: Vec<EntityId>,
    next_id: u64,
}

impl MemoryHost {
    /// Creates an empty host.
    pub fn new() -> Self {
        Self::default()
    }

    /// Template of a live entity.
    pub fn template(&self, entity: EntityId) -> Option<Template> {
        self.entities.get(&entity).map(|e| e.template)
    }

    /// Number of destructions waiting for the next flush.
    pub fn pending_destroy(&self) -> usize {
        self.destroy_queue.len()
    }
}

impl EntityHost for MemoryHost {
    fn create_batch(&mut self, template: Template, count: usize) -> Vec<EntityId> {
        (0..count)
            .map(|_| {
                let id = EntityId(self.next_id);
                self.next_id += 1;
                self.entities.insert(
                    id,
                    Entity {
                        template,
                        transform: Transform::default(),
                    },
                );
                id
            })
            .collect()
    }

    fn queue_destroy(&mut self, entities: &[EntityId]) {
        self.destroy_queue.extend_from_slice(entities);
    }

    fn flush_destroyed(&mut self) {
        // Duplicates and already-removed ids are harmless here.
        for id in self.destroy_queue.drain(..) {
            self.entities.remove(&id);
        }
    }

    fn entities(&self, template: Template) -> Vec<EntityId> {
        self.entities
            .iter()
            .filter(|(_, e)| e.template == template)
            .map(|(&id, _)| id)
            .collect()
    }

    fn transform(&self, entity: EntityId) -> Option<Transform> {
        self.entities.get(&entity).map(|e| e.transform)
    }

    fn set_position(&mut self, entity: EntityId, pos: Point<f32>) {
        if let Some(e) = self.entities.get_mut(&entity) {
            e.transform.pos = pos;
        }
    }

    fn set_heading(&mut self, entity: EntityId, heading: f32) {
        if let Some(e) = self.entities.get_mut(&entity) {
            e.transform.heading = heading;
        }
    }

    fn set_scale(&mut self, entity: EntityId, scale: f32) {
        if let Some(e) = self.entities.get_mut(&entity) {
            e.transform.scale = scale;
        }
    }

    fn count(&self, template: Template) -> usize {
        self.entities
            .values()
            .filter(|e| e.template == template)
            .count()
    }

    fn any_alive(&self, template: Template) -> bool {
        self.entities.values().any(|e| e.template == template)
    }
}

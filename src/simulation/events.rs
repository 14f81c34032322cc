//! Deferred entity changes collected during a stage scan.
//!
//! Stages never destroy or create entities while iterating the population.
//! They push events here and the queue is applied once the scan is over, so
//! the snapshot being iterated is never invalidated.

use super::food;
use super::host::{EntityHost, EntityId};
use super::params::Params;
use super::random::RandomSource;

/// Entity changes requested during a stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickEvent {
    /// A creature ate a food item.
    FoodEaten {
        /// The creature that ate.
        creature: EntityId,
        /// The food item to destroy.
        food: EntityId,
    },
    /// A creature ran out of energy.
    CreatureDied {
        /// The creature to destroy.
        creature: EntityId,
        /// Food items it ate, each replaced by a fresh one.
        food_eaten: u32,
    },
}

/// Reusable event buffer; keeps its capacity across ticks.
#[derive(Debug, Default)]
pub struct EventQueue {
    events: Vec<TickEvent>,
}

/// What applying a queue changed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AppliedEvents {
    /// Food items destroyed.
    pub food_eaten: usize,
    /// Creatures destroyed.
    pub creatures_died: usize,
    /// Replacement food items spawned.
    pub food_spawned: usize,
}

impl EventQueue {
    /// Creates an empty event queue.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an empty queue with room for `capacity` events.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            events: Vec::with_capacity(capacity),
        }
    }

    /// Adds an event to the queue.
    pub fn push(&mut self, event: TickEvent) {
        self.events.push(event);
    }

    /// Number of queued events.
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Queued events in push order.
    pub fn iter(&self) -> impl Iterator<Item = &TickEvent> {
        self.events.iter()
    }

    /// Drains all events from the queue.
    pub fn drain(&mut self) -> std::vec::Drain<'_, TickEvent> {
        self.events.drain(..)
    }
}

/// Applies and empties the queue: destroys eaten food and dead creatures,
/// then spawns one replacement food item per item each dead creature ate.
pub fn apply_events<H: EntityHost>(
    host: &mut H,
    params: &Params,
    rng: &mut impl RandomSource,
    queue: &mut EventQueue,
) -> AppliedEvents {
    let mut applied = AppliedEvents::default();
    let mut replacements = 0usize;

    for event in queue.drain() {
        match event {
            TickEvent::FoodEaten { food, .. } => {
                host.queue_destroy(&[food]);
                applied.food_eaten += 1;
            }
            TickEvent::CreatureDied {
                creature,
                food_eaten,
            } => {
                host.queue_destroy(&[creature]);
                applied.creatures_died += 1;
                replacements += food_eaten as usize;
            }
        }
    }

    host.flush_destroyed();
    applied.food_spawned = food::spawn_food(host, params, rng, replacements).len();
    applied
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::host::{MemoryHost, Template};
    use crate::simulation::random::SimRng;

    #[test]
    fn deaths_respawn_eaten_food() {
        let params = Params::default();
        let mut host = MemoryHost::new();
        let mut rng = SimRng::seeded(2);
        let creatures = host.create_batch(Template::Creature, 2);
        let foods = food::spawn_food(&mut host, &params, &mut rng, 3);

        let mut queue = EventQueue::new();
        queue.push(TickEvent::FoodEaten {
            creature: creatures[0],
            food: foods[0],
        });
        queue.push(TickEvent::CreatureDied {
            creature: creatures[1],
            food_eaten: 4,
        });

        let applied = apply_events(&mut host, &params, &mut rng, &mut queue);

        assert!(queue.is_empty());
        assert_eq!(
            applied,
            AppliedEvents {
                food_eaten: 1,
                creatures_died: 1,
                food_spawned: 4,
            }
        );
        assert_eq!(host.count(Template::Food), 3 - 1 + 4);
        assert_eq!(host.entities(Template::Creature), vec![creatures[0]]);
    }
}

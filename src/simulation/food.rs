//! Food items ("bouffe") that creatures eat for energy.
//!
//! Food has no state of its own beyond its host transform: a random position
//! inside the spawn margin and a random visual scale.

use geo::Point;

use super::host::{EntityHost, EntityId, Template};
use super::params::Params;
use super::random::RandomSource;

/// Draws a position uniformly inside the world, inset by the spawn margin.
pub fn random_position(params: &Params, rng: &mut impl RandomSource) -> Point<f32> {
    let (hw, hh) = params.half_extents();
    let m = params.spawn_margin;
    Point::new(rng.float(-hw + m, hw - m), rng.float(-hh + m, hh - m))
}

/// Creates `count` food entities at random positions with random scales.
///
/// # Returns
///
/// The ids of the new entities, in creation order.
pub fn spawn_food<H: EntityHost>(
    host: &mut H,
    params: &Params,
    rng: &mut impl RandomSource,
    count: usize,
) -> Vec<EntityId> {
    if count == 0 {
        return Vec::new();
    }

    let entities = host.create_batch(Template::Food, count);
    for &e in &entities {
        host.set_position(e, random_position(params, rng));
        host.set_scale(e, rng.float(params.food_scale[0], params.food_scale[1]));
    }
    entities
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::simulation::host::MemoryHost;
    use crate::simulation::random::SimRng;

    #[test]
    fn spawned_food_stays_inside_margin() {
        let params = Params::default();
        let mut host = MemoryHost::new();
        let mut rng = SimRng::seeded(17);

        let ids = spawn_food(&mut host, &params, &mut rng, 200);
        assert_eq!(ids.len(), 200);
        assert_eq!(host.count(Template::Food), 200);

        let limit = params.world_width / 2.0 - params.spawn_margin;
        for id in ids {
            let t = host.transform(id).unwrap();
            assert!(t.pos.x().abs() <= limit && t.pos.y().abs() <= limit);
            assert!(t.scale >= 0.3 && t.scale < 0.5);
        }
    }

    #[test]
    fn spawning_nothing_creates_nothing() {
        let mut host = MemoryHost::new();
        let ids = spawn_food(&mut host, &Params::default(), &mut SimRng::seeded(1), 0);
        assert!(ids.is_empty());
        assert!(!host.any_alive(Template::Food));
    }
}

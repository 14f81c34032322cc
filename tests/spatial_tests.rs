#![allow(missing_docs)]
#![allow(clippy::float_cmp)]

use bestioles::simulation::host::{EntityId, Template};
use bestioles::simulation::params::Params;
use bestioles::simulation::random::{RandomSource, SimRng};
use bestioles::simulation::spatial::SpatialIndex;
use geo::Point;
use kdtree::KdTree;
use kdtree::distance::squared_euclidean;

fn create_test_params() -> Params {
    Params {
        world_width: 200.0,
        world_height: 200.0,
        population: 50,
        food_count: 300,
        cell_capacity: 1024,
        block_capacity: 1024,
        block_entity_capacity: 4,
        depth_max: 5,
        ..Params::default()
    }
}

fn random_point(rng: &mut SimRng, half: f32) -> Point<f32> {
    Point::new(rng.float(-half, half), rng.float(-half, half))
}

#[test]
fn nearest_food_matches_brute_force() {
    let params = create_test_params();
    let mut rng = SimRng::seeded(2024);
    let mut index = SpatialIndex::from_params(&params);
    let mut oracle: KdTree<f32, u64, [f32; 2]> = KdTree::new(2);

    let mut next_id = 0u64;
    for _ in 0..params.food_count {
        let p = random_point(&mut rng, 99.0);
        index.insert(EntityId(next_id), Template::Food, p).unwrap();
        oracle.add([p.x(), p.y()], next_id).unwrap();
        next_id += 1;
    }
    // Creatures are indexed too but must never be returned for food queries.
    for _ in 0..params.population {
        let p = random_point(&mut rng, 99.0);
        index
            .insert(EntityId(next_id), Template::Creature, p)
            .unwrap();
        next_id += 1;
    }
    assert_eq!(index.len(), params.food_count + params.population);

    for _ in 0..500 {
        let from = random_point(&mut rng, 99.0);
        let hit = index
            .nearest_of_type(from, Template::Food, None)
            .expect("food is indexed");
        assert!(hit.entity.0 < params.food_count as u64);

        let expected = oracle
            .nearest(&[from.x(), from.y()], 1, &squared_euclidean)
            .unwrap();
        let (expected_sq, _) = expected[0];

        let dx = hit.pos.x() - from.x();
        let dz = hit.pos.y() - from.y();
        let got_sq = dx * dx + dz * dz;
        assert!(
            (got_sq - expected_sq).abs() <= 1e-3 * expected_sq.max(1.0),
            "got {got_sq}, expected {expected_sq}"
        );
    }
}

#[test]
fn nearest_picks_closer_of_two_foods() {
    let params = create_test_params();
    let mut index = SpatialIndex::from_params(&params);
    index
        .insert(EntityId(1), Template::Food, Point::new(10.0, 0.0))
        .unwrap();
    index
        .insert(EntityId(2), Template::Food, Point::new(3.0, 0.0))
        .unwrap();
    index
        .insert(EntityId(3), Template::Creature, Point::new(0.0, 0.0))
        .unwrap();

    let hit = index
        .nearest_of_type(Point::new(0.0, 0.0), Template::Food, Some(EntityId(3)))
        .unwrap();
    assert_eq!(hit.entity, EntityId(2));
    assert_eq!(hit.pos, Point::new(3.0, 0.0));
}

#[test]
fn no_point_is_lost_and_blocks_stay_bounded() {
    let params = create_test_params();
    let mut rng = SimRng::seeded(7);
    let mut index = SpatialIndex::from_params(&params);

    // A dense cluster forces splits down to max depth and block chaining.
    let mut inserted = Vec::new();
    for i in 0..400u64 {
        let p = if i % 2 == 0 {
            Point::new(rng.float(1.0, 2.0), rng.float(1.0, 2.0))
        } else {
            random_point(&mut rng, 99.0)
        };
        index.insert(EntityId(i), Template::Food, p).unwrap();
        inserted.push(i);
    }

    let leaves = index.leaves();
    let mut seen: Vec<u64> = leaves
        .iter()
        .flat_map(|l| l.points.iter().map(|p| p.entity.0))
        .collect();
    seen.sort_unstable();
    assert_eq!(seen, inserted);

    let cap = params.block_entity_capacity;
    for leaf in &leaves {
        assert!(leaf.depth <= params.depth_max);
        assert!(leaf.block_lens.iter().all(|&n| n <= cap));
        if leaf.depth < params.depth_max {
            assert!(leaf.block_lens.len() <= 1);
            assert!(leaf.block_lens.iter().all(|&n| n < cap));
        }
        let (min, max) = (leaf.rect.min(), leaf.rect.max());
        for p in &leaf.points {
            assert!(p.pos.x() >= min.x - 1e-3 && p.pos.x() <= max.x + 1e-3);
            assert!(p.pos.y() >= min.y - 1e-3 && p.pos.y() <= max.y + 1e-3);
        }
    }
    assert!(leaves.iter().any(|l| l.block_lens.len() > 1));

    let usage = index.usage();
    assert!(usage.cells <= params.required_cell_capacity(400));
    assert!(usage.blocks <= params.required_block_capacity(400));
}

#[test]
fn rebuilds_reuse_the_same_arenas() {
    let params = create_test_params();
    let mut rng = SimRng::seeded(99);
    let mut index = SpatialIndex::from_params(&params);

    for _ in 0..20 {
        index.clear();
        for i in 0..200u64 {
            index
                .insert(EntityId(i), Template::Food, random_point(&mut rng, 99.0))
                .unwrap();
        }
        assert_eq!(index.len(), 200);
    }
}

//! Integration tests for the simulation space
//!
//! These tests drive a [`Space`] through whole frames and check:
//! 1. Bucket membership always matches each body's bounds
//! 2. The broad phase prunes narrow-phase work
//! 3. Blocking, bounce and overlap-fix behave across many frames
//! 4. Stale keys and out-of-bounds bodies are handled

use planar_math::{Rect, Vec2};
use planar_physics::{
    Body, BodyKey, BucketSlot, CollisionLayer, Hit, OverlapFix, Shape, Space, SpaceConfig,
    SubstepMode,
};
use std::cell::RefCell;
use std::rc::Rc;

/// 200x200 world centered on the origin with 20-unit buckets
fn bucketed() -> SpaceConfig {
    SpaceConfig::new(Rect::from_xywh(-100.0, -100.0, 200.0, 200.0))
        .with_buckets(Vec2::splat(20.0))
        .with_slop(0.1)
}

/// Check that every body sits in exactly the buckets its bounds cover, and
/// that no bucket lists a body that does not claim it
fn assert_buckets_consistent(space: &Space) {
    let Some(grid) = space.bucket_grid() else {
        return;
    };

    for key in space.body_keys() {
        let bounds = space.body(key).unwrap().world_bounds();
        let expected: Vec<BucketSlot> = grid.clipped_slots(&bounds).collect();
        assert_eq!(space.bucket_slots(key), expected.as_slice(), "slots of {:?}", key);
        for &slot in &expected {
            assert!(grid.bucket(slot).dynamic_bodies().contains(&key));
        }
    }

    let mut slots: Vec<BucketSlot> = (0..grid.len()).map(BucketSlot::Cell).collect();
    slots.push(BucketSlot::Void);
    for slot in slots {
        for &key in grid.bucket(slot).dynamic_bodies() {
            assert!(
                space.bucket_slots(key).contains(&slot),
                "{:?} lists {:?} but the body does not claim it",
                slot,
                key
            );
        }
    }
}

// ==================== Bucket Membership Tests ====================

#[test]
fn test_bucket_membership_tracks_motion() {
    let mut space = Space::new(bucketed());
    space.add_static_shape(Shape::rect(-10.0, 30.0, 60.0, 10.0));

    let velocities = [
        Vec2::new(7.0, 3.0),
        Vec2::new(-4.0, 9.0),
        Vec2::new(0.0, -12.0),
        Vec2::new(15.0, 15.0),
    ];
    for (i, velocity) in velocities.iter().enumerate() {
        let position = Vec2::new(-60.0 + i as f32 * 35.0, -20.0);
        space.add_body(
            Body::circle(format!("ball{}", i), position, 4.0)
                .with_velocity(*velocity)
                .with_elasticity(1.0),
        );
    }
    space.add_body(Body::rect("crate", Vec2::new(0.0, 70.0), Vec2::new(9.0, 6.0)));

    assert_buckets_consistent(&space);
    for _ in 0..40 {
        space.update();
        assert_buckets_consistent(&space);
    }
}

#[test]
fn test_removed_body_leaves_no_bucket_entries() {
    let mut space = Space::new(bucketed());
    let key = space
        .add_body(Body::rect("wide", Vec2::ZERO, Vec2::new(45.0, 5.0)))
        .expect("Body should register");
    assert!(space.bucket_slots(key).len() > 4);

    space.remove_body(key);

    let grid = space.bucket_grid().unwrap();
    for index in 0..grid.len() {
        assert!(grid.bucket(BucketSlot::Cell(index)).dynamic_bodies().is_empty());
    }
    assert!(grid.void_bucket().dynamic_bodies().is_empty());
}

#[test]
fn test_static_shape_registered_once_per_bucket() {
    let mut space = Space::new(bucketed());
    let shape = Shape::edge(-75.0, -75.0, 75.0, 75.0);
    let id = space.add_static_shape(shape).unwrap();

    let grid = space.bucket_grid().unwrap();
    let slots: Vec<_> = grid.clipped_slots(&shape.bounds()).collect();
    assert_eq!(slots.len(), 64);
    for slot in slots {
        assert_eq!(grid.bucket(slot).static_shapes(), &[id]);
    }
}

#[test]
fn test_out_of_bounds_body_found_through_void() {
    let mut space = Space::new(bucketed());
    let ghost = space
        .add_body(
            Body::circle("ghost", Vec2::new(150.0, 0.0), 5.0).with_worldclip(false),
        )
        .unwrap();

    assert_eq!(space.bucket_slots(ghost), &[BucketSlot::Void]);
    let found = space.bodies_in_rect(&Rect::from_xywh(140.0, -10.0, 20.0, 20.0));
    assert_eq!(found, vec![ghost]);

    let hits = space.shape_check(&Shape::circle(152.0, 0.0, 2.0), CollisionLayer::ALL);
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].hit, Hit::Body(ghost));
}

// ==================== Broad Phase Tests ====================

/// Lay out a 10x10 lattice of small stationary bodies, one per bucket
fn lattice(config: SpaceConfig) -> Space {
    let mut space = Space::new(config);
    for y in 0..10 {
        for x in 0..10 {
            let position = Vec2::new(-90.0 + x as f32 * 20.0, -90.0 + y as f32 * 20.0);
            space.add_body(Body::circle(format!("b{}_{}", x, y), position, 2.0));
        }
    }
    space
}

#[test]
fn test_broad_phase_prunes_pair_tests() {
    let mut linear = lattice(bucketed().without_buckets());
    let mut hashed = lattice(bucketed());

    linear.update();
    hashed.update();

    let linear_tests = linear.stats().narrow_phase_tests;
    let hashed_tests = hashed.stats().narrow_phase_tests;
    assert_eq!(linear_tests, 100 * 99);
    assert_eq!(
        hashed_tests, 0,
        "Bodies alone in their buckets should never be tested against each other"
    );
}

#[test]
fn test_far_apart_bodies_never_tested() {
    let mut space = Space::new(bucketed());
    space.add_body(Body::circle("left", Vec2::new(-80.0, -80.0), 4.0).with_velocity(Vec2::new(3.0, 0.0)));
    space.add_body(Body::circle("right", Vec2::new(80.0, 80.0), 4.0).with_velocity(Vec2::new(-3.0, 0.0)));

    for _ in 0..10 {
        space.update();
    }

    assert_eq!(space.stats().narrow_phase_tests, 0);
    assert_eq!(space.stats().frames, 10);
}

#[test]
fn test_bucketed_and_linear_agree_over_many_frames() {
    let build = |config: SpaceConfig| {
        let mut space = Space::new(config);
        space.add_static_shape(Shape::rect(-20.0, -20.0, 40.0, 10.0));
        space.add_static_shape(Shape::edge(-100.0, 60.0, 100.0, 80.0));
        let keys: Vec<BodyKey> = [
            (Vec2::new(-50.0, 0.0), Vec2::new(6.0, -4.0)),
            (Vec2::new(40.0, 40.0), Vec2::new(-3.0, 8.0)),
            (Vec2::new(0.0, -60.0), Vec2::new(0.0, 9.0)),
        ]
        .into_iter()
        .enumerate()
        .filter_map(|(i, (position, velocity))| {
            space.add_body(
                Body::circle(format!("ball{}", i), position, 5.0)
                    .with_velocity(velocity)
                    .with_elasticity(1.0),
            )
        })
        .collect();
        (space, keys)
    };

    let (mut a, keys_a) = build(bucketed());
    let (mut b, keys_b) = build(bucketed().without_buckets());
    for _ in 0..60 {
        a.update();
        b.update();
        for (&ka, &kb) in keys_a.iter().zip(&keys_b) {
            let (pa, pb) = (a.body(ka).unwrap().position, b.body(kb).unwrap().position);
            assert!(pa.distance(pb) < 1e-4, "diverged: {:?} vs {:?}", pa, pb);
        }
    }
}

// ==================== Response Tests ====================

#[test]
fn test_circle_stops_against_rect_with_default_substeps() {
    let mut space = Space::new(bucketed());
    space.add_static_shape(Shape::rect(8.0, -5.0, 12.0, 10.0));
    let key = space
        .add_body(Body::circle("ball", Vec2::ZERO, 5.0).with_velocity(Vec2::new(10.0, 0.0)))
        .unwrap();

    space.update();

    let body = space.body(key).unwrap();
    assert!(body.position.x + 5.0 <= 8.0 + space.config().slop);
    assert_eq!(body.velocity, Vec2::ZERO);
    assert!(space.is_blocked(key));
}

#[test]
fn test_elastic_body_keeps_speed_in_a_box() {
    let mut space = Space::new(bucketed());
    let velocity = Vec2::new(7.0, 5.0);
    let key = space
        .add_body(
            Body::circle("ball", Vec2::new(10.0, -30.0), 5.0)
                .with_velocity(velocity)
                .with_elasticity(1.0),
        )
        .unwrap();

    let mut bounces = 0;
    for _ in 0..200 {
        space.update();
        if space.is_blocked(key) {
            bounces += 1;
        }
        let body = space.body(key).unwrap();
        assert!((body.velocity.length() - velocity.length()).abs() < 1e-3);
        assert!(space.config().bounds.contains_rect(&body.world_bounds()));
    }
    assert!(bounces > 0, "Ball should have reached a wall");
}

#[test]
fn test_inelastic_body_stops_on_body() {
    let mut space = Space::new(bucketed());
    let mover = space
        .add_body(Body::rect("mover", Vec2::ZERO, Vec2::splat(5.0)).with_velocity(Vec2::new(0.0, 20.0)))
        .unwrap();
    let wall = space
        .add_body(Body::rect("wall", Vec2::new(0.0, 22.0), Vec2::new(30.0, 5.0)))
        .unwrap();

    space.update();

    assert_eq!(space.body(mover).unwrap().velocity, Vec2::ZERO);
    assert_eq!(space.collisions(mover)[0].hit, Hit::Body(wall));
    assert_eq!(space.collisions(mover)[0].normal, -Vec2::Y);
    assert!(!space.is_blocked(wall));
}

#[test]
fn test_integrate_mode_reaches_closer_than_aggregate() {
    let run = |mode: SubstepMode| {
        let mut space = Space::new(bucketed().with_time_step(0.25).with_substep_mode(mode));
        space.add_static_shape(Shape::rect(8.0, -5.0, 12.0, 10.0));
        let key = space
            .add_body(Body::circle("ball", Vec2::ZERO, 1.0).with_velocity(Vec2::new(12.0, 0.0)))
            .unwrap();
        space.update();
        space.body(key).unwrap().position.x
    };

    let aggregate = run(SubstepMode::Aggregate);
    let integrate = run(SubstepMode::Integrate);
    assert!(aggregate < 0.0);
    assert!(integrate > 5.0 && integrate < 7.0);
}

#[test]
fn test_overlapping_bodies_separated_in_one_pass() {
    let mut space = Space::new(bucketed());
    let a = space.add_body(Body::circle("a", Vec2::ZERO, 5.0)).unwrap();
    let b = space.add_body(Body::circle("b", Vec2::new(4.0, 0.0), 5.0)).unwrap();

    let fix = space.fix_overlaps(5);

    assert_eq!(fix, OverlapFix { passes: 1, resolved: true });
    let (pa, pb) = (space.body(a).unwrap().position, space.body(b).unwrap().position);
    assert!(pa.distance(pb) >= 10.0);
    assert_eq!(pb, Vec2::new(4.0, 0.0));
    assert_eq!(space.stats().overlap_passes, 1);
}

#[test]
fn test_update_fixes_overlaps_first() {
    let mut space = Space::new(bucketed());
    space.add_static_shape(Shape::rect(-20.0, -5.0, 40.0, 10.0));
    let key = space.add_body(Body::circle("buried", Vec2::new(0.0, 2.0), 3.0)).unwrap();

    space.update();

    let body = space.body(key).unwrap();
    assert!(body.position.y - 3.0 >= 5.0);
    assert!(space.static_shape_check(&body.world_shape()).is_empty());
}

#[test]
fn test_touch_callbacks_see_their_own_collisions() {
    let log = Rc::new(RefCell::new(Vec::new()));

    let mut space = Space::new(bucketed());
    space.add_static_shape(Shape::rect(8.0, -5.0, 12.0, 10.0));
    for (name, y) in [("top", -40.0), ("bottom", 0.0)] {
        let sink = log.clone();
        space.add_body(
            Body::circle(name, Vec2::new(0.0, y), 5.0)
                .with_velocity(Vec2::new(10.0, 0.0))
                .with_touch(move |hits| sink.borrow_mut().push((name, hits.len()))),
        );
    }

    space.update();

    assert_eq!(*log.borrow(), vec![("bottom", 1)]);
}

// ==================== Handle Tests ====================

#[test]
fn test_stale_keys_are_rejected() {
    let mut space = Space::new(bucketed());
    let old = space.add_body(Body::circle("old", Vec2::ZERO, 1.0)).unwrap();
    space.remove_body(old);
    let new = space.add_body(Body::circle("new", Vec2::ZERO, 1.0)).unwrap();

    assert_ne!(old, new);
    assert!(space.body(old).is_none());
    assert!(space.body_mut(old).is_none());
    assert!(space.remove_body(old).is_none());
    assert!(space.collisions(old).is_empty());
    assert!(space.bucket_slots(old).is_empty());
    assert!(!space.is_blocked(old));
    assert_eq!(space.body(new).unwrap().name, "new");
}

#[test]
fn test_body_mut_moves_are_picked_up() {
    let mut space = Space::new(bucketed());
    let key = space.add_body(Body::circle("ball", Vec2::ZERO, 2.0)).unwrap();

    space.body_mut(key).unwrap().position = Vec2::new(55.0, 55.0);
    space.update();

    let bucket = space.bucket_by_point(Vec2::new(55.0, 55.0)).unwrap();
    assert_eq!(bucket.dynamic_bodies(), &[key]);
    assert!(space.bucket_by_point(Vec2::ZERO).unwrap().dynamic_bodies().is_empty());
}

#[test]
fn test_linear_fallback_still_collides() {
    let mut space = Space::new(bucketed().with_buckets(Vec2::ZERO));
    assert!(!space.uses_buckets());

    space.add_static_shape(Shape::rect(8.0, -5.0, 12.0, 10.0));
    let key = space
        .add_body(Body::circle("ball", Vec2::ZERO, 5.0).with_velocity(Vec2::new(10.0, 0.0)))
        .unwrap();
    space.update();

    assert!(space.is_blocked(key));
    assert!(space.clipped_buckets(&Rect::from_xywh(0.0, 0.0, 1.0, 1.0)).is_none());
}

//! Integration tests for concurrent incremental moves
//!
//! These tests verify that:
//! - Overlapping moves on one object end at the sum of their deltas
//! - The result does not depend on request order or tick granularity
//! - Moves and property tweens can run side by side on one scene

use stagehand_animation::{
    Easing, EasingDirection, EasingStyle, InterpolationEngine, PropertyChange, PropertyTweenEngine,
    SpaceMode, TweenInfo,
};
use stagehand_core::{MemoryScene, NodeId, Pose, SceneProvider, Value, Vec3};

struct Move {
    at: f64,
    delta: Vec3,
    duration: f64,
    easing: Easing,
}

fn moves() -> Vec<Move> {
    vec![
        Move {
            at: 0.0,
            delta: Vec3::new(4.0, 0.0, -2.0),
            duration: 1.5,
            easing: Easing::new(EasingStyle::Quad, EasingDirection::Out),
        },
        Move {
            at: 0.2,
            delta: Vec3::new(-1.0, 3.0, 0.0),
            duration: 0.7,
            easing: Easing::new(EasingStyle::Sine, EasingDirection::InOut),
        },
        Move {
            at: 0.2,
            delta: Vec3::new(0.5, 0.5, 0.5),
            duration: 0.0,
            easing: Easing::LINEAR,
        },
        Move {
            at: 0.9,
            delta: Vec3::new(0.0, -6.0, 1.0),
            duration: 2.0,
            easing: Easing::new(EasingStyle::Bounce, EasingDirection::Out),
        },
    ]
}

/// Play `schedule` in the given order with a fixed tick and return the final
/// position.
fn simulate(schedule: &[Move], order: &[usize], dt: f64) -> Vec3 {
    let mut scene = MemoryScene::new();
    let part = scene.add_part("Platform", Pose::IDENTITY);
    let mut engine = InterpolationEngine::new();

    let mut pending: Vec<&Move> = order.iter().map(|i| &schedule[*i]).collect();
    let mut now = 0.0;
    while now < 4.0 {
        pending.retain(|m| {
            if m.at <= now + 1e-9 {
                engine
                    .request_move(&scene, part, m.delta, m.duration, SpaceMode::World, m.easing, now)
                    .unwrap();
                false
            } else {
                true
            }
        });
        now += dt;
        engine.tick(now, &mut scene);
    }
    assert!(!engine.has_active_moves());
    scene.pose(part).unwrap().position
}

fn expected() -> Vec3 {
    moves().iter().fold(Vec3::ZERO, |acc, m| acc + m.delta)
}

#[test]
fn test_concurrent_moves_sum_regardless_of_order() {
    let schedule = moves();
    for order in [[0, 1, 2, 3], [3, 2, 1, 0], [1, 3, 0, 2]] {
        let end = simulate(&schedule, &order, 0.1);
        assert!(end.abs_diff_eq(expected(), 1e-4), "{order:?}: {end:?}");
    }
}

#[test]
fn test_concurrent_moves_sum_regardless_of_tick_size() {
    let schedule = moves();
    for dt in [1.0 / 240.0, 1.0 / 60.0, 0.1, 0.35] {
        let end = simulate(&schedule, &[0, 1, 2, 3], dt);
        assert!(end.abs_diff_eq(expected(), 1e-4), "dt {dt}: {end:?}");
    }
}

#[test]
fn test_moves_and_tweens_share_a_scene() {
    let mut scene = MemoryScene::new();
    let lift = scene.add_part("Lift", Pose::IDENTITY);
    scene.insert_property(lift, "Speed", Value::Number(0.0)).unwrap();
    let lamps: Vec<NodeId> = (0..6)
        .map(|i| scene.add_part(&format!("Lamp{i}"), Pose::IDENTITY))
        .collect();

    let mut moves = InterpolationEngine::new();
    let mut tweens = PropertyTweenEngine::new();
    let linear = Easing::new(EasingStyle::Linear, EasingDirection::InOut);

    moves
        .request_move(&scene, lift, Vec3::new(0.0, 10.0, 0.0), 1.0, SpaceMode::World, linear, 0.0)
        .unwrap();
    for lamp in &lamps {
        moves
            .request_move(&scene, *lamp, Vec3::X, 0.5, SpaceMode::Local, linear, 0.0)
            .unwrap();
    }
    let change = PropertyChange::new()
        .property("Speed", 3.0)
        .tweened(TweenInfo::new(1.0).with_easing(linear));
    tweens.set_properties(&mut scene, lift, &change, 0.0);

    let mut batched = 0;
    for frame in 1..=60 {
        let now = frame as f64 / 60.0;
        if moves.tick(now, &mut scene).batched {
            batched += 1;
        }
        tweens.step(now, &mut scene);
    }

    assert!(batched > 0);
    assert!(scene
        .pose(lift)
        .unwrap()
        .position
        .abs_diff_eq(Vec3::new(0.0, 10.0, 0.0), 1e-4));
    for lamp in lamps {
        assert!(scene.pose(lamp).unwrap().position.abs_diff_eq(Vec3::X, 1e-4));
    }
    assert_eq!(scene.property(lift, "Speed").unwrap(), Value::Number(3.0));
    assert!(!tweens.has_active_tweens());
}

use boidwars_core::{ArenaConfig, Engine, PickupKind, PlayerId, ResourceKind, Snapshot, Vec2};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};

/// No automatic resource or pickup spawning; seeded for reproducibility.
fn quiet_config(seed: u64) -> ArenaConfig {
    ArenaConfig {
        map_width: 1000.0,
        map_height: 1000.0,
        max_resources: 0,
        resource_spawn_rate: 0.0,
        max_pickups: 0,
        rng_seed: Some(seed),
        ..ArenaConfig::default()
    }
}

/// Quiet, plus steering fully disabled so boids only move under test control.
fn still_config(seed: u64) -> ArenaConfig {
    ArenaConfig {
        initial_boids: 0,
        separation_weight: 0.0,
        alignment_weight: 0.0,
        cohesion_weight: 0.0,
        cursor_weight: 0.0,
        chase_weight: 0.0,
        ..quiet_config(seed)
    }
}

#[test]
fn add_player_grants_the_initial_cluster() {
    let mut engine = Engine::new(quiet_config(11)).expect("engine");
    let id = engine.add_player();
    assert_eq!(engine.boid_count_for(id), 10);

    let (width, height) = engine.map_size();
    for boid in engine.boids().boids() {
        assert_eq!(boid.player, id);
        assert!(boid.pos.x >= 0.0 && boid.pos.x <= width);
        assert!(boid.pos.y >= 0.0 && boid.pos.y <= height);
        assert!(boid.vel.x.abs() <= 1.0 && boid.vel.y.abs() <= 1.0);
    }

    let player = engine.player(id).expect("player");
    assert!(player.alive);
    assert_eq!(player.score, 0);
    assert!((player.boost_fuel - 1.0).abs() < f32::EPSILON);
}

#[test]
fn remove_player_discards_swarm_and_snapshot_entry() {
    let mut engine = Engine::new(quiet_config(12)).expect("engine");
    let keep = engine.add_player();
    let drop = engine.add_player();
    engine.remove_player(drop);

    assert_eq!(engine.boid_count_for(drop), 0);
    assert_eq!(engine.boid_count_for(keep), 10);

    let snapshot = Snapshot::decode(&engine.tick()).expect("decode");
    assert_eq!(snapshot.players.len(), 1);
    assert_eq!(snapshot.players[0].id, keep.0);
    assert!(snapshot.boids.iter().all(|b| b.player_id == keep.0));
}

#[test]
fn bounce_clamps_position_and_halves_reversed_velocity() {
    let mut engine = Engine::new(still_config(13)).expect("engine");
    let id = engine.add_player();
    engine.spawn_boid_for(id, Vec2::new(-10.0, 500.0), Vec2::new(-2.0, 0.0));

    engine.step();

    let boid = engine.boids().boids()[0];
    assert_eq!(boid.pos.x, 0.0);
    assert_eq!(boid.pos.y, 500.0);
    assert!((boid.vel.x - 1.0).abs() < 1e-6, "vx negated and halved");
    assert_eq!(boid.vel.y, 0.0);
}

#[test]
fn every_boid_stays_on_the_map() {
    let mut engine = Engine::new(ArenaConfig {
        rng_seed: Some(14),
        ..ArenaConfig::default()
    })
    .expect("engine");
    for _ in 0..3 {
        engine.add_player();
    }
    let (width, height) = engine.map_size();

    for _ in 0..60 {
        engine.step();
        for boid in engine.boids().boids() {
            assert!(
                (0.0..=width).contains(&boid.pos.x) && (0.0..=height).contains(&boid.pos.y),
                "boid escaped to ({}, {})",
                boid.pos.x,
                boid.pos.y
            );
        }
    }
}

#[test]
fn a_resource_feeds_exactly_one_player() {
    let mut engine = Engine::new(still_config(15)).expect("engine");
    let a = engine.add_player();
    let b = engine.add_player();
    engine.spawn_boid_for(a, Vec2::new(500.0, 500.0), Vec2::ZERO);
    engine.spawn_boid_for(b, Vec2::new(505.0, 500.0), Vec2::ZERO);
    engine.spawn_resource_at(Vec2::new(502.0, 500.0), 2, ResourceKind::Speed);

    engine.step();

    let score_a = engine.player(a).expect("a").score;
    let score_b = engine.player(b).expect("b").score;
    assert_eq!(score_a + score_b, 2, "the resource was consumed once");
    assert!(score_a == 0 || score_b == 0, "only one player scored");
    assert!(engine.resources().is_empty());

    let snapshot = Snapshot::decode(&engine.tick()).expect("decode");
    assert!(snapshot.resources.is_empty());
}

#[test]
fn collection_raises_the_matching_mutation() {
    let mut engine = Engine::new(still_config(16)).expect("engine");
    let id = engine.add_player();
    engine.spawn_boid_for(id, Vec2::new(500.0, 500.0), Vec2::ZERO);
    engine.spawn_resource_at(Vec2::new(510.0, 500.0), 2, ResourceKind::Aggression);

    engine.step();

    let player = engine.player(id).expect("player");
    assert_eq!(player.score, 2);
    assert!((player.mutations.aggression - 1.04).abs() < 1e-6);
    assert!((player.mutations.speed - 1.0).abs() < f32::EPSILON);
}

#[test]
fn score_milestone_spawns_a_boid_at_the_collector() {
    let mut engine = Engine::new(still_config(17)).expect("engine");
    let id = engine.add_player();
    engine.spawn_boid_for(id, Vec2::new(500.0, 500.0), Vec2::ZERO);
    engine.spawn_resource_at(Vec2::new(500.0, 500.0), 3, ResourceKind::Speed);

    engine.step();

    assert_eq!(engine.player(id).expect("player").score, 3);
    assert_eq!(engine.boid_count_for(id), 2);
    let spawned = engine.boids().boids()[1];
    assert_eq!(spawned.vel, Vec2::ZERO);
    assert_eq!(spawned.pos, Vec2::new(500.0, 500.0));
}

#[test]
fn shielded_underdog_survives_combat() {
    let mut engine = Engine::new(still_config(18)).expect("engine");
    let small = engine.add_player();
    let large = engine.add_player();

    engine.spawn_boid_for(small, Vec2::new(500.0, 500.0), Vec2::ZERO);
    for i in 0..10 {
        engine.spawn_boid_for(large, Vec2::new(505.0 + i as f32, 500.0), Vec2::ZERO);
    }
    engine.player_mut(small).expect("player").shield_ticks = 100;

    engine.step();

    assert_eq!(engine.boid_count_for(small), 1, "shield protects the boid");
    assert_eq!(engine.boid_count_for(large), 10);
    assert!(engine.player(small).expect("player").alive);
}

#[test]
fn unshielded_underdog_is_absorbed() {
    let mut engine = Engine::new(still_config(19)).expect("engine");
    let small = engine.add_player();
    let large = engine.add_player();

    engine.spawn_boid_for(small, Vec2::new(500.0, 500.0), Vec2::ZERO);
    for i in 0..10 {
        engine.spawn_boid_for(large, Vec2::new(505.0 + i as f32, 500.0), Vec2::ZERO);
    }

    let events = engine.step();

    assert_eq!(engine.boid_count_for(small), 0);
    assert_eq!(engine.boid_count_for(large), 10);
    assert!(!engine.player(small).expect("player").alive);
    assert_eq!(events.players_eliminated, vec![small]);

    // Elimination is permanent: the flag is never reset by the engine.
    engine.step();
    assert!(!engine.player(small).expect("player").alive);
}

#[test]
fn equal_swarms_spare_each_other() {
    let mut engine = Engine::new(still_config(20)).expect("engine");
    let a = engine.add_player();
    let b = engine.add_player();
    for i in 0..3 {
        engine.spawn_boid_for(a, Vec2::new(500.0 + i as f32, 500.0), Vec2::ZERO);
        engine.spawn_boid_for(b, Vec2::new(503.0 + i as f32, 500.0), Vec2::ZERO);
    }

    engine.step();

    assert_eq!(engine.boid_count_for(a), 3);
    assert_eq!(engine.boid_count_for(b), 3);
}

#[test]
fn pickup_flows_through_the_pipeline_once() {
    let mut engine = Engine::new(still_config(21)).expect("engine");
    let id = engine.add_player();
    engine.spawn_boid_for(id, Vec2::new(500.0, 500.0), Vec2::ZERO);
    engine.spawn_pickup_at(Vec2::new(510.0, 500.0), PickupKind::DrainTrap);
    engine.set_player_boost(id, true);

    engine.step();

    let player = engine.player(id).expect("player");
    assert_eq!(player.boost_fuel, 0.0);
    assert!(!player.boosting);
    assert!(engine.pickups().is_empty());

    let snapshot = Snapshot::decode(&engine.tick()).expect("decode");
    assert!(snapshot.pickups.is_empty());
}

#[test]
fn shield_pickup_starts_the_timer() {
    let mut engine = Engine::new(still_config(22)).expect("engine");
    let id = engine.add_player();
    engine.spawn_boid_for(id, Vec2::new(500.0, 500.0), Vec2::ZERO);
    engine.spawn_pickup_at(Vec2::new(500.0, 500.0), PickupKind::Shield);

    engine.step();

    let shield = engine.player(id).expect("player").shield_ticks;
    assert_eq!(shield, engine.config().shield_duration);
}

#[test]
fn ownerless_boids_freeze_instead_of_faulting() {
    let mut engine = Engine::new(still_config(23)).expect("engine");
    engine.spawn_boid_for(PlayerId(999), Vec2::new(400.0, 400.0), Vec2::new(3.0, 0.0));

    engine.step();

    let boid = engine.boids().boids()[0];
    assert_eq!(boid.pos, Vec2::new(400.0, 400.0), "frozen, not moved");
    assert_eq!(boid.vel, Vec2::new(3.0, 0.0), "not zeroed");
}

#[test]
fn boost_fuel_stays_in_unit_range_under_arbitrary_toggling() {
    let mut engine = Engine::new(quiet_config(24)).expect("engine");
    let id = engine.add_player();
    let mut rng = SmallRng::seed_from_u64(0xB0057);

    for _ in 0..200 {
        if rng.random::<f32>() < 0.3 {
            engine.set_player_boost(id, rng.random::<bool>());
        }
        engine.step();
        let fuel = engine.player(id).expect("player").boost_fuel;
        assert!((0.0..=1.0).contains(&fuel), "fuel out of range: {fuel}");
    }
}

#[test]
fn sustained_boost_drains_to_empty_and_clears() {
    let config = ArenaConfig {
        boost_min_fuel: 0.0,
        max_resources: 0,
        resource_spawn_rate: 0.0,
        max_pickups: 0,
        rng_seed: Some(25),
        ..ArenaConfig::default()
    };
    let drain_rate = config.boost_drain_rate;
    let mut engine = Engine::new(config).expect("engine");
    let id = engine.add_player();
    // Park the cluster far from every wall so the chase has room to run.
    for (i, boid) in engine.boids_mut().boids_mut().iter_mut().enumerate() {
        boid.pos = Vec2::new(1000.0 + i as f32 * 5.0, 1000.0);
    }

    let centroid = |engine: &Engine| {
        let boids = engine.boids().boids();
        let sum = boids
            .iter()
            .fold(Vec2::ZERO, |acc, boid| acc + boid.pos);
        sum * (1.0 / boids.len() as f32)
    };

    // Cursor 500 units from the swarm centroid.
    let start = centroid(&engine);
    let cursor = Vec2::new(start.x + 500.0, start.y);
    engine.set_player_cursor(id, cursor.x, cursor.y);
    engine.set_player_boost(id, true);

    let budget = (1.0 / drain_rate).ceil() as u32 + 1;
    let mut approaches = 0u32;
    let mut ticks_run = 0u32;
    let mut distance = (centroid(&engine) - cursor).length();
    while ticks_run < budget {
        engine.step();
        ticks_run += 1;
        let next_distance = (centroid(&engine) - cursor).length();
        if next_distance < distance {
            approaches += 1;
        }
        distance = next_distance;
        if !engine.player(id).expect("player").boosting {
            break;
        }
    }

    let player = engine.player(id).expect("player");
    assert!(!player.boosting, "boost auto-clears at empty");
    assert_eq!(player.boost_fuel, 0.0, "fuel bottoms out at exactly zero");
    assert!(
        ticks_run <= budget,
        "drain completes within ceil(1/rate) ticks"
    );
    assert!(
        approaches * 2 > ticks_run,
        "centroid approached the cursor on a majority of ticks ({approaches}/{ticks_run})"
    );
}

#[test]
fn snapshot_roundtrip_is_within_quantization_tolerance() {
    let mut engine = Engine::new(ArenaConfig {
        rng_seed: Some(26),
        ..ArenaConfig::default()
    })
    .expect("engine");
    engine.add_player();
    engine.add_player();
    for _ in 0..30 {
        engine.step();
    }

    let decoded = Snapshot::decode(&engine.snapshot().encode()).expect("decode");
    assert_eq!(decoded.players.len(), engine.player_count());
    assert_eq!(decoded.boids.len(), engine.boids().len());
    assert_eq!(decoded.resources.len(), engine.resources().len());
    assert_eq!(decoded.pickups.len(), engine.pickups().len());

    for (record, boid) in decoded.boids.iter().zip(engine.boids().boids()) {
        assert_eq!(record.player_id, boid.player.0);
        assert!((boid.pos.x - f32::from(record.x)).abs() <= 1.0);
        assert!((boid.pos.y - f32::from(record.y)).abs() <= 1.0);
        assert!((boid.vel.x - f32::from(record.vx) / 10.0).abs() <= 0.05);
        assert!((boid.vel.y - f32::from(record.vy) / 10.0).abs() <= 0.05);
    }
}

#[test]
fn seeded_runs_produce_identical_snapshots() {
    let run = |seed: u64| {
        let mut engine = Engine::new(ArenaConfig {
            rng_seed: Some(seed),
            ..ArenaConfig::default()
        })
        .expect("engine");
        let a = engine.add_player();
        let b = engine.add_player();
        engine.set_player_cursor(a, 100.0, 100.0);
        engine.set_player_cursor(b, 3900.0, 3900.0);
        engine.set_player_boost(a, true);
        let mut bytes = Vec::new();
        for _ in 0..40 {
            bytes = engine.tick();
        }
        bytes
    };

    assert_eq!(run(0xDEADBEEF), run(0xDEADBEEF));
    assert_ne!(run(0xDEADBEEF), run(0xF00DF00D));
}

//! The authoritative arena engine and its ordered tick pipeline.
//!
//! One `Engine` owns one world. All mutation goes through `&mut self`, so the
//! single-writer contract is a compile-time property; `step` runs every
//! pipeline stage to completion with no suspension points. The spatial index
//! is rebuilt twice per tick (before steering and again after movement) and is
//! never read across a position mutation that postdates its last build.

use crate::config::{ArenaConfig, ConfigError};
use crate::entities::{
    Boid, BoidArena, BoidKey, Pickup, PickupKind, Player, PlayerId, Resource, ResourceKind,
};
use crate::geometry::Vec2;
use boidwars_index::{Entry, IndexError, QuadTree, Rect};
use boidwars_protocol::{
    BoidRecord, MapEntityRecord, PlayerRecord, Snapshot, quantize_position, quantize_velocity,
};
use rand::Rng;
use rand::rngs::SmallRng;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::fmt;
use thiserror::Error;
use tracing::{debug, trace};

/// Scatter-bomb fallback direction when a boid sits exactly on the pickup.
const SCATTER_FALLBACK: Vec2 = Vec2::new(1.0, 0.0);

/// Distances below this are treated as coincident when steering away.
const SEPARATION_EPSILON: f32 = 0.01;

/// Errors raised when constructing an engine.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Index(#[from] IndexError),
}

/// Simulation clock: ticks processed since the world was created.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord)]
pub struct Tick(pub u64);

impl Tick {
    /// Returns the next sequential tick.
    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }

    /// The initial tick.
    #[must_use]
    pub const fn zero() -> Self {
        Self(0)
    }
}

/// Events emitted by one pipeline run.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TickEvents {
    pub tick: Tick,
    /// Resources created by the accrual stage this tick.
    pub resources_spawned: u32,
    /// Kind of the pickup spawned this tick, if the interval elapsed and the
    /// cap allowed it.
    pub pickup_spawned: Option<PickupKind>,
    /// Players whose swarm emptied this tick.
    pub players_eliminated: Vec<PlayerId>,
}

/// Compact per-tick counts retained in the engine's bounded history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TickSummary {
    pub tick: Tick,
    pub players: usize,
    pub boids: usize,
    pub active_resources: usize,
    pub active_pickups: usize,
}

/// Authoritative world state for one arena.
///
/// Explicitly instantiable: tests and sharded rooms each construct their own.
pub struct Engine {
    config: ArenaConfig,
    tick: Tick,
    rng: SmallRng,
    players: BTreeMap<PlayerId, Player>,
    boids: BoidArena,
    resources: Vec<Resource>,
    pickups: Vec<Pickup>,
    index: QuadTree<BoidKey>,
    query_scratch: Vec<Entry<BoidKey>>,
    next_player_id: u32,
    next_boid_id: u32,
    next_resource_id: u32,
    next_pickup_id: u32,
    resource_spawn_accum: f32,
    pickup_spawn_ticks: u32,
    history: VecDeque<TickSummary>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("tick", &self.tick)
            .field("players", &self.players.len())
            .field("boids", &self.boids.len())
            .field("resources", &self.resources.len())
            .field("pickups", &self.pickups.len())
            .finish()
    }
}

impl Engine {
    /// Create a world from the supplied configuration, pre-seeding the map
    /// with an initial resource field.
    pub fn new(config: ArenaConfig) -> Result<Self, EngineError> {
        config.validate()?;
        let bounds = Rect::new(0.0, 0.0, config.map_width, config.map_height);
        let index =
            QuadTree::with_limits(bounds, config.quadtree_max_entries, config.quadtree_max_depth)?;
        let rng = config.seeded_rng();
        let history_capacity = config.history_capacity;
        let preseed = config.max_resources / 2;

        let mut engine = Self {
            config,
            tick: Tick::zero(),
            rng,
            players: BTreeMap::new(),
            boids: BoidArena::new(),
            resources: Vec::new(),
            pickups: Vec::new(),
            index,
            query_scratch: Vec::with_capacity(64),
            next_player_id: 1,
            next_boid_id: 1,
            next_resource_id: 1,
            next_pickup_id: 1,
            resource_spawn_accum: 0.0,
            pickup_spawn_ticks: 0,
            history: VecDeque::with_capacity(history_capacity),
        };
        for _ in 0..preseed {
            engine.spawn_resource();
        }
        Ok(engine)
    }

    // ------------------------------------------------------------------
    // Lifecycle and input
    // ------------------------------------------------------------------

    /// Connect a new player: allocates the next sequential id, centers the
    /// cursor on the map, and spawns the initial boid cluster around a random
    /// point.
    pub fn add_player(&mut self) -> PlayerId {
        let id = PlayerId(self.next_player_id);
        self.next_player_id += 1;
        let cursor = Vec2::new(self.config.map_width * 0.5, self.config.map_height * 0.5);
        self.players.insert(id, Player::new(id, cursor));

        let center = self.random_position();
        let spread = self.config.cluster_spread;
        let vel_jitter = self.config.initial_velocity_jitter;
        for _ in 0..self.config.initial_boids {
            let pos = Vec2::new(
                center.x + self.jitter(spread),
                center.y + self.jitter(spread),
            );
            let vel = Vec2::new(self.jitter(vel_jitter), self.jitter(vel_jitter));
            self.spawn_boid_for(id, pos, vel);
        }
        debug!(player = %id, boids = self.config.initial_boids, "player joined");
        id
    }

    /// Disconnect a player, deleting the record and every boid it owns.
    /// Unknown ids are a no-op.
    pub fn remove_player(&mut self, id: PlayerId) {
        if self.players.remove(&id).is_none() {
            return;
        }
        let removed = self.boids.remove_owned_by(id);
        debug!(player = %id, boids = removed, "player left");
    }

    /// Overwrite a player's steering target. Coordinates are taken verbatim;
    /// clamping to the map is the caller's responsibility.
    pub fn set_player_cursor(&mut self, id: PlayerId, x: f32, y: f32) {
        if let Some(player) = self.players.get_mut(&id) {
            player.cursor = Vec2::new(x, y);
        }
    }

    /// Request or release boost; the actual effect is gated by fuel at tick
    /// time.
    pub fn set_player_boost(&mut self, id: PlayerId, active: bool) {
        if let Some(player) = self.players.get_mut(&id) {
            player.boosting = active;
        }
    }

    // ------------------------------------------------------------------
    // Tick pipeline
    // ------------------------------------------------------------------

    /// Advance one tick and return the encoded snapshot for broadcast.
    pub fn tick(&mut self) -> Vec<u8> {
        self.step();
        self.snapshot().encode()
    }

    /// Execute the ordered pipeline once, returning emitted events.
    pub fn step(&mut self) -> TickEvents {
        self.stage_boost_fuel();
        self.stage_effect_timers();
        let resources_spawned = self.stage_spawn_resources();
        let pickup_spawned = self.stage_spawn_pickups();
        self.rebuild_index();
        self.stage_flocking();
        self.stage_clamp_bounds();
        self.rebuild_index();
        self.stage_collect_resources();
        self.stage_collect_pickups();
        self.stage_combat();
        let players_eliminated = self.stage_liveness();

        self.tick = self.tick.next();
        self.push_summary();
        trace!(
            tick = self.tick.0,
            boids = self.boids.len(),
            resources = self.resources.len(),
            "tick complete"
        );

        TickEvents {
            tick: self.tick,
            resources_spawned,
            pickup_spawned,
            players_eliminated,
        }
    }

    fn stage_boost_fuel(&mut self) {
        let drain = self.config.boost_drain_rate;
        let recharge = self.config.boost_recharge_rate;
        let min_fuel = self.config.boost_min_fuel;
        for player in self.players.values_mut() {
            if player.boosting && player.boost_fuel > 0.0 {
                player.boost_fuel -= drain;
                if player.boost_fuel <= 0.0 {
                    player.boost_fuel = 0.0;
                    player.boosting = false;
                }
            } else if !player.boosting && player.boost_fuel < 1.0 {
                player.boost_fuel = (player.boost_fuel + recharge).min(1.0);
            }
            if player.boosting && player.boost_fuel < min_fuel {
                player.boosting = false;
            }
        }
    }

    fn stage_effect_timers(&mut self) {
        for player in self.players.values_mut() {
            if player.shield_ticks > 0 {
                player.shield_ticks -= 1;
            }
            if player.speed_burst_ticks > 0 {
                player.speed_burst_ticks -= 1;
            }
            if player.slow_ticks > 0 {
                player.slow_ticks -= 1;
            }
        }
    }

    fn stage_spawn_resources(&mut self) -> u32 {
        self.resource_spawn_accum += self.config.resource_spawn_rate;
        let mut spawned = 0;
        while self.resource_spawn_accum >= 1.0 {
            self.resource_spawn_accum -= 1.0;
            if self.spawn_resource() {
                spawned += 1;
            }
        }
        spawned
    }

    fn stage_spawn_pickups(&mut self) -> Option<PickupKind> {
        self.pickup_spawn_ticks += 1;
        if self.pickup_spawn_ticks < self.config.pickup_spawn_interval {
            return None;
        }
        // The counter resets even when the cap blocks the spawn.
        self.pickup_spawn_ticks = 0;
        self.spawn_pickup()
    }

    fn rebuild_index(&mut self) {
        self.index.clear();
        for (key, boid) in self.boids.handles().iter().zip(self.boids.boids()) {
            self.index.insert(Entry::new(*key, boid.pos.x, boid.pos.y));
        }
    }

    /// Flocking, targeting, steering, and movement in one sequential pass.
    /// Each boid's velocity and position are committed before the next boid is
    /// evaluated; neighbor candidates come from the index built before this
    /// stage, neighbor state is read live.
    fn stage_flocking(&mut self) {
        let sep_radius = self.config.separation_radius;
        let align_radius = self.config.alignment_radius;
        let cohesion_radius = self.config.cohesion_radius;
        let aggression_radius = self.config.base_aggression_radius;
        let w_sep = self.config.separation_weight;
        let w_align = self.config.alignment_weight;
        let w_cohesion = self.config.cohesion_weight;
        let w_cursor = self.config.cursor_weight;
        let w_chase = self.config.chase_weight;
        let deadzone = self.config.cursor_deadzone;
        let steer_clamp = self.config.steer_clamp;
        let base_speed = self.config.base_speed;
        let boost_mult = self.config.boost_speed_mult;
        let burst_mult = self.config.speed_burst_mult;
        let slow_mult = self.config.slow_mult;

        for i in 0..self.boids.len() {
            let my_key = self.boids.handles()[i];
            let (pos, vel, owner) = {
                let boid = &self.boids.boids()[i];
                (boid.pos, boid.vel, boid.player)
            };
            // Owner gone: freeze the boid for this tick.
            let Some(player) = self.players.get(&owner) else {
                continue;
            };
            let mutations = player.mutations;
            let cursor = player.cursor;
            let boosting = player.boosting && player.boost_fuel > 0.0;
            let burst_active = player.speed_burst_ticks > 0;
            let slow_active = player.slow_ticks > 0;

            let effective_cohesion_radius = cohesion_radius * mutations.cohesion;
            let aggro_range = aggression_radius * mutations.aggression;
            let query_half = sep_radius
                .max(align_radius)
                .max(effective_cohesion_radius)
                .max(aggro_range);

            self.query_scratch.clear();
            self.index.query(
                &Rect::centered(pos.x, pos.y, query_half),
                &mut self.query_scratch,
            );

            let mut separation = Vec2::ZERO;
            let mut alignment = Vec2::ZERO;
            let mut align_count = 0usize;
            let mut cohesion_center = Vec2::ZERO;
            let mut cohesion_count = 0usize;
            let mut nearest_enemy: Option<Vec2> = None;
            let mut nearest_enemy_dist = f32::INFINITY;

            for entry in &self.query_scratch {
                if entry.key == my_key {
                    continue;
                }
                let Some(other) = self.boids.get(entry.key) else {
                    continue;
                };
                let diff = pos - other.pos;
                let dist = diff.length();

                if other.player == owner {
                    if dist < sep_radius && dist > SEPARATION_EPSILON {
                        separation += diff * (1.0 / dist);
                    }
                    if dist < align_radius {
                        alignment += other.vel;
                        align_count += 1;
                    }
                    if dist < effective_cohesion_radius {
                        cohesion_center += other.pos;
                        cohesion_count += 1;
                    }
                } else if dist < aggro_range && dist < nearest_enemy_dist {
                    // Strict less-than: ties keep the first enemy encountered.
                    nearest_enemy_dist = dist;
                    nearest_enemy = Some(other.pos);
                }
            }

            let mut steer = separation * w_sep;
            if align_count > 0 {
                let average = alignment * (1.0 / align_count as f32);
                steer += (average - vel).clamped(steer_clamp) * w_align;
            }
            if cohesion_count > 0 {
                let center = cohesion_center * (1.0 / cohesion_count as f32);
                steer += (center - pos).clamped(steer_clamp) * (w_cohesion * mutations.cohesion);
            }
            let to_cursor = cursor - pos;
            if to_cursor.length() > deadzone {
                steer += to_cursor.normalized() * w_cursor;
            }
            if let Some(enemy_pos) = nearest_enemy {
                steer += (enemy_pos - pos).normalized() * (w_chase * mutations.aggression);
            }

            let mut max_speed = base_speed * mutations.speed;
            if boosting {
                max_speed *= boost_mult;
            }
            if burst_active {
                max_speed *= burst_mult;
            }
            if slow_active {
                max_speed *= slow_mult;
            }

            let boid = &mut self.boids.boids_mut()[i];
            boid.vel += steer;
            boid.vel = boid.vel.clamped(max_speed);
            boid.pos += boid.vel;
        }
    }

    /// Inelastic bounce: clamp the crossed axis and negate-and-halve its
    /// velocity, leaving the other axis untouched.
    fn stage_clamp_bounds(&mut self) {
        let width = self.config.map_width;
        let height = self.config.map_height;
        for boid in self.boids.boids_mut() {
            if boid.pos.x < 0.0 {
                boid.pos.x = 0.0;
                boid.vel.x *= -0.5;
            }
            if boid.pos.x > width {
                boid.pos.x = width;
                boid.vel.x *= -0.5;
            }
            if boid.pos.y < 0.0 {
                boid.pos.y = 0.0;
                boid.vel.y *= -0.5;
            }
            if boid.pos.y > height {
                boid.pos.y = height;
                boid.vel.y *= -0.5;
            }
        }
    }

    fn stage_collect_resources(&mut self) {
        let base_range = self.config.base_collect_range;
        let query_half = base_range * self.config.collect_query_factor;
        let gain = self.config.mutation_gain;
        let score_step = self.config.score_spawn_step;
        let cap = self.config.max_boids_per_player;

        for res_idx in 0..self.resources.len() {
            if !self.resources[res_idx].active {
                continue;
            }
            let res_pos = self.resources[res_idx].pos;

            self.query_scratch.clear();
            self.index.query(
                &Rect::centered(res_pos.x, res_pos.y, query_half),
                &mut self.query_scratch,
            );

            // First candidate in query order whose owner's exact collect
            // range covers the resource wins; the rest are ignored.
            let mut collector: Option<(PlayerId, Vec2)> = None;
            for entry_idx in 0..self.query_scratch.len() {
                let key = self.query_scratch[entry_idx].key;
                let Some(boid) = self.boids.get(key) else {
                    continue;
                };
                let Some(player) = self.players.get(&boid.player) else {
                    continue;
                };
                let range = base_range * player.mutations.collect_range;
                if (boid.pos - res_pos).length_sq() < range * range {
                    collector = Some((boid.player, boid.pos));
                    break;
                }
            }
            let Some((player_id, boid_pos)) = collector else {
                continue;
            };

            let resource = &mut self.resources[res_idx];
            resource.active = false;
            let value = resource.value;
            let kind = resource.kind;

            let Some(player) = self.players.get_mut(&player_id) else {
                continue;
            };
            player.score += value;
            let boost = gain * value as f32;
            match kind {
                ResourceKind::Speed => player.mutations.speed += boost,
                ResourceKind::Cohesion => player.mutations.cohesion += boost,
                ResourceKind::Aggression => player.mutations.aggression += boost,
                ResourceKind::CollectRange => player.mutations.collect_range += boost,
            }

            let score = player.score;
            if score % score_step == 0 && self.boids.count_owned_by(player_id) < cap {
                self.spawn_boid_for(player_id, boid_pos, Vec2::ZERO);
            }
        }

        self.resources.retain(|resource| resource.active);
    }

    fn stage_collect_pickups(&mut self) {
        let radius = self.config.pickup_collect_radius;
        let radius_sq = radius * radius;

        for pickup_idx in 0..self.pickups.len() {
            if !self.pickups[pickup_idx].active {
                continue;
            }
            let pickup_pos = self.pickups[pickup_idx].pos;

            self.query_scratch.clear();
            self.index.query(
                &Rect::centered(pickup_pos.x, pickup_pos.y, radius),
                &mut self.query_scratch,
            );

            let mut collector: Option<(PlayerId, Vec2)> = None;
            for entry_idx in 0..self.query_scratch.len() {
                let key = self.query_scratch[entry_idx].key;
                let Some(boid) = self.boids.get(key) else {
                    continue;
                };
                if (boid.pos - pickup_pos).length_sq() >= radius_sq {
                    continue;
                }
                if !self.players.contains_key(&boid.player) {
                    continue;
                }
                collector = Some((boid.player, boid.pos));
                break;
            }
            let Some((player_id, boid_pos)) = collector else {
                continue;
            };

            let kind = self.pickups[pickup_idx].kind;
            self.pickups[pickup_idx].active = false;
            self.apply_pickup(kind, player_id, boid_pos, pickup_pos);
            debug!(player = %player_id, ?kind, "pickup collected");
        }

        self.pickups.retain(|pickup| pickup.active);
    }

    fn apply_pickup(
        &mut self,
        kind: PickupKind,
        player_id: PlayerId,
        boid_pos: Vec2,
        pickup_pos: Vec2,
    ) {
        match kind {
            PickupKind::BoostRefill => {
                if let Some(player) = self.players.get_mut(&player_id) {
                    player.boost_fuel = 1.0;
                }
            }
            PickupKind::MassSpawn => {
                let owned = self.boids.count_owned_by(player_id);
                let to_spawn = self
                    .config
                    .mass_spawn_count
                    .min(self.config.max_boids_per_player.saturating_sub(owned));
                let jitter = self.config.mass_spawn_jitter;
                for _ in 0..to_spawn {
                    let pos = Vec2::new(
                        boid_pos.x + self.jitter(jitter),
                        boid_pos.y + self.jitter(jitter),
                    );
                    self.spawn_boid_for(player_id, pos, Vec2::ZERO);
                }
            }
            PickupKind::Shield => {
                if let Some(player) = self.players.get_mut(&player_id) {
                    player.shield_ticks = self.config.shield_duration;
                }
            }
            PickupKind::SpeedBurst => {
                if let Some(player) = self.players.get_mut(&player_id) {
                    player.speed_burst_ticks = self.config.speed_burst_duration;
                }
            }
            PickupKind::SlowTrap => {
                if let Some(player) = self.players.get_mut(&player_id) {
                    player.slow_ticks = self.config.slow_duration;
                }
            }
            PickupKind::ScatterBomb => {
                let force = self.config.scatter_force;
                for boid in self.boids.boids_mut() {
                    if boid.player != player_id {
                        continue;
                    }
                    let away = boid.pos - pickup_pos;
                    let direction = if away.length() < SEPARATION_EPSILON {
                        SCATTER_FALLBACK
                    } else {
                        away.normalized()
                    };
                    boid.vel = direction * force;
                }
            }
            PickupKind::DrainTrap => {
                if let Some(player) = self.players.get_mut(&player_id) {
                    player.boost_fuel = 0.0;
                    player.boosting = false;
                }
            }
            PickupKind::Mine => {
                let limit = self.config.mine_kill_count;
                let mut doomed: HashSet<BoidKey> = HashSet::new();
                for (key, boid) in self
                    .boids
                    .handles()
                    .iter()
                    .zip(self.boids.boids())
                    .rev()
                {
                    if doomed.len() >= limit {
                        break;
                    }
                    if boid.player == player_id {
                        doomed.insert(*key);
                    }
                }
                self.boids.remove_many(&doomed);
            }
        }
    }

    /// Swarm-size combat. Counts are read and mutated during the scan, so
    /// later encounters in the same tick see earlier losses; this ordering
    /// asymmetry is part of the game's balance and deliberately not corrected.
    fn stage_combat(&mut self) {
        if self.boids.is_empty() {
            return;
        }
        let radius = self.config.combat_absorb_radius;
        let radius_sq = radius * radius;

        let mut counts: HashMap<PlayerId, i64> = HashMap::new();
        for boid in self.boids.boids() {
            *counts.entry(boid.player).or_insert(0) += 1;
        }

        let mut marked: HashSet<BoidKey> = HashSet::new();

        for i in 0..self.boids.len() {
            let my_key = self.boids.handles()[i];
            let (my_pos, my_owner) = {
                let boid = &self.boids.boids()[i];
                (boid.pos, boid.player)
            };

            self.query_scratch.clear();
            self.index.query(
                &Rect::centered(my_pos.x, my_pos.y, radius),
                &mut self.query_scratch,
            );

            for entry_idx in 0..self.query_scratch.len() {
                let other_key = self.query_scratch[entry_idx].key;
                if other_key == my_key {
                    continue;
                }
                let Some(other) = self.boids.get(other_key) else {
                    continue;
                };
                if other.player == my_owner {
                    continue;
                }
                if (my_pos - other.pos).length_sq() >= radius_sq {
                    continue;
                }

                let my_count = counts.get(&my_owner).copied().unwrap_or(0);
                let other_count = counts.get(&other.player).copied().unwrap_or(0);
                let my_shield = self.players.get(&my_owner).is_some_and(Player::shielded);
                let other_shield = self
                    .players
                    .get(&other.player)
                    .is_some_and(Player::shielded);
                let other_owner = other.player;

                if my_count < other_count && !my_shield {
                    marked.insert(my_key);
                    *counts.entry(my_owner).or_insert(0) -= 1;
                    break;
                } else if other_count < my_count && !other_shield {
                    marked.insert(other_key);
                    *counts.entry(other_owner).or_insert(0) -= 1;
                }
                // Equal counts: neither side loses a boid.
            }
        }

        if !marked.is_empty() {
            let removed = self.boids.remove_many(&marked);
            trace!(removed, "combat resolved");
        }
    }

    fn stage_liveness(&mut self) -> Vec<PlayerId> {
        let mut eliminated = Vec::new();
        let boids = &self.boids;
        for player in self.players.values_mut() {
            if player.alive && boids.count_owned_by(player.id) == 0 {
                player.alive = false;
                eliminated.push(player.id);
                debug!(player = %player.id, "swarm eliminated");
            }
        }
        eliminated
    }

    fn push_summary(&mut self) {
        if self.history.len() >= self.config.history_capacity {
            self.history.pop_front();
        }
        self.history.push_back(TickSummary {
            tick: self.tick,
            players: self.players.len(),
            boids: self.boids.len(),
            active_resources: self.resources.len(),
            active_pickups: self.pickups.len(),
        });
    }

    // ------------------------------------------------------------------
    // Spawning
    // ------------------------------------------------------------------

    /// Spawn a boid for `player` at an explicit position. Bypasses the
    /// per-player cap; pipeline call sites check it first.
    pub fn spawn_boid_for(&mut self, player: PlayerId, pos: Vec2, vel: Vec2) -> BoidKey {
        let id = self.next_boid_id;
        self.next_boid_id += 1;
        self.boids.insert(Boid {
            id,
            player,
            pos,
            vel,
        })
    }

    /// Place a resource at an explicit position, ignoring the active cap.
    pub fn spawn_resource_at(&mut self, pos: Vec2, value: u32, kind: ResourceKind) -> u32 {
        let id = self.next_resource_id;
        self.next_resource_id += 1;
        self.resources.push(Resource {
            id,
            pos,
            value,
            kind,
            active: true,
        });
        id
    }

    /// Place a pickup at an explicit position, ignoring the active cap.
    pub fn spawn_pickup_at(&mut self, pos: Vec2, kind: PickupKind) -> u32 {
        let id = self.next_pickup_id;
        self.next_pickup_id += 1;
        self.pickups.push(Pickup {
            id,
            pos,
            kind,
            active: true,
        });
        id
    }

    fn spawn_resource(&mut self) -> bool {
        let active = self.resources.iter().filter(|r| r.active).count();
        if active >= self.config.max_resources {
            return false;
        }
        let pos = self.random_position();
        let value = self
            .rng
            .random_range(self.config.resource_value_min..=self.config.resource_value_max);
        let kind = ResourceKind::from_u8(self.rng.random_range(0..ResourceKind::COUNT));
        self.spawn_resource_at(pos, value, kind);
        true
    }

    fn spawn_pickup(&mut self) -> Option<PickupKind> {
        let active = self.pickups.iter().filter(|p| p.active).count();
        if active >= self.config.max_pickups {
            return None;
        }
        let pos = self.random_position();
        let kind = PickupKind::from_u8(self.rng.random_range(0..PickupKind::COUNT));
        self.spawn_pickup_at(pos, kind);
        Some(kind)
    }

    fn random_position(&mut self) -> Vec2 {
        let margin = self.config.spawn_margin;
        Vec2::new(
            self.rng
                .random_range(margin..self.config.map_width - margin),
            self.rng
                .random_range(margin..self.config.map_height - margin),
        )
    }

    fn jitter(&mut self, amount: f32) -> f32 {
        if amount > 0.0 {
            self.rng.random_range(-amount..amount)
        } else {
            0.0
        }
    }

    // ------------------------------------------------------------------
    // Snapshot
    // ------------------------------------------------------------------

    /// Build the wire snapshot of the current state. Players are emitted in
    /// ascending id order, boids in dense storage order.
    #[must_use]
    pub fn snapshot(&self) -> Snapshot {
        let players = self
            .players
            .values()
            .map(|player| PlayerRecord {
                id: player.id.0,
                score: player.score.min(u32::from(u16::MAX)) as u16,
                alive: player.alive,
                boosting: player.boosting,
                boost_fuel: player.boost_fuel,
                stats: [
                    player.mutations.speed,
                    player.mutations.cohesion,
                    player.mutations.aggression,
                    player.mutations.collect_range,
                ],
                shield_ticks: player.shield_ticks.min(255) as u8,
                speed_burst_ticks: player.speed_burst_ticks.min(255) as u8,
                slow_ticks: player.slow_ticks.min(255) as u8,
            })
            .collect();

        let boids = self
            .boids
            .boids()
            .iter()
            .map(|boid| BoidRecord {
                player_id: boid.player.0,
                x: quantize_position(boid.pos.x),
                y: quantize_position(boid.pos.y),
                vx: quantize_velocity(boid.vel.x),
                vy: quantize_velocity(boid.vel.y),
            })
            .collect();

        let map_entity = |pos: Vec2, kind: u8| MapEntityRecord {
            x: quantize_position(pos.x),
            y: quantize_position(pos.y),
            kind,
        };
        let resources = self
            .resources
            .iter()
            .filter(|r| r.active)
            .map(|r| map_entity(r.pos, r.kind as u8))
            .collect();
        let pickups = self
            .pickups
            .iter()
            .filter(|p| p.active)
            .map(|p| map_entity(p.pos, p.kind as u8))
            .collect();

        Snapshot {
            map_width: self.config.map_width as u16,
            map_height: self.config.map_height as u16,
            players,
            boids,
            resources,
            pickups,
        }
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    /// Immutable access to the configuration.
    #[must_use]
    pub fn config(&self) -> &ArenaConfig {
        &self.config
    }

    /// Ticks processed since construction.
    #[must_use]
    pub const fn current_tick(&self) -> Tick {
        self.tick
    }

    /// Map extent as `(width, height)`.
    #[must_use]
    pub const fn map_size(&self) -> (f32, f32) {
        (self.config.map_width, self.config.map_height)
    }

    /// Borrow a player record.
    #[must_use]
    pub fn player(&self, id: PlayerId) -> Option<&Player> {
        self.players.get(&id)
    }

    /// Mutably borrow a player record.
    #[must_use]
    pub fn player_mut(&mut self, id: PlayerId) -> Option<&mut Player> {
        self.players.get_mut(&id)
    }

    /// Iterate players in ascending id order.
    pub fn players(&self) -> impl Iterator<Item = &Player> {
        self.players.values()
    }

    /// Number of connected players.
    #[must_use]
    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    /// Read-only access to boid storage.
    #[must_use]
    pub fn boids(&self) -> &BoidArena {
        &self.boids
    }

    /// Mutable access to boid storage.
    #[must_use]
    pub fn boids_mut(&mut self) -> &mut BoidArena {
        &mut self.boids
    }

    /// Number of live boids owned by `player`.
    #[must_use]
    pub fn boid_count_for(&self, player: PlayerId) -> usize {
        self.boids.count_owned_by(player)
    }

    /// Active resources on the map.
    #[must_use]
    pub fn resources(&self) -> &[Resource] {
        &self.resources
    }

    /// Active pickups on the map.
    #[must_use]
    pub fn pickups(&self) -> &[Pickup] {
        &self.pickups
    }

    /// Iterate over retained tick summaries, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &TickSummary> {
        self.history.iter()
    }
}

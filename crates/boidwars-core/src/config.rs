//! Static configuration for an arena.

use rand::SeedableRng;
use rand::rngs::SmallRng;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised when validating arena configuration.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigError {
    /// Indicates a configuration value that cannot be used.
    #[error("invalid configuration: {0}")]
    InvalidConfig(&'static str),
}

/// Tunable parameters for one arena. `Default` carries the balance values the
/// game shipped with.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArenaConfig {
    /// Map width in world units. Must fit the u16 wire encoding.
    pub map_width: f32,
    /// Map height in world units. Must fit the u16 wire encoding.
    pub map_height: f32,
    /// Hard cap on boids per player, enforced at spawn time only.
    pub max_boids_per_player: usize,
    /// Cluster size granted on join.
    pub initial_boids: usize,
    /// Inset from the map edge for random spawn positions.
    pub spawn_margin: f32,
    /// Positional jitter around the join cluster's center.
    pub cluster_spread: f32,
    /// Velocity jitter applied per axis to freshly joined boids.
    pub initial_velocity_jitter: f32,

    /// Base speed cap before mutation and effect multipliers.
    pub base_speed: f32,
    /// Base enemy-detection radius, scaled by the aggression mutation.
    pub base_aggression_radius: f32,
    /// Base resource pickup range, scaled by the collect-range mutation.
    pub base_collect_range: f32,
    /// Teammates closer than this push the boid away.
    pub separation_radius: f32,
    /// Teammates within this radius contribute to velocity matching.
    pub alignment_radius: f32,
    /// Base flock-centering radius, scaled by the cohesion mutation.
    pub cohesion_radius: f32,
    pub separation_weight: f32,
    pub alignment_weight: f32,
    /// Base centering weight, scaled by the cohesion mutation.
    pub cohesion_weight: f32,
    pub cursor_weight: f32,
    /// Base chase weight, scaled by the aggression mutation.
    pub chase_weight: f32,
    /// Cursor attraction cuts out inside this distance.
    pub cursor_deadzone: f32,
    /// Length cap on the alignment and cohesion steering terms.
    pub steer_clamp: f32,

    /// Active-resource cap, enforced at spawn time only.
    pub max_resources: usize,
    /// Fractional resources accrued per tick.
    pub resource_spawn_rate: f32,
    pub resource_value_min: u32,
    pub resource_value_max: u32,
    /// Mutation increase per point of resource value.
    pub mutation_gain: f32,
    /// A collection leaving the score divisible by this spawns a boid.
    pub score_spawn_step: u32,
    /// Collect-range multiplier ceiling assumed when sizing the query window.
    pub collect_query_factor: f32,

    /// Enemy contact distance for swarm-size combat.
    pub combat_absorb_radius: f32,

    pub boost_speed_mult: f32,
    /// Fuel drained per boosting tick.
    pub boost_drain_rate: f32,
    /// Fuel recovered per idle tick.
    pub boost_recharge_rate: f32,
    /// Boosting switches off below this fuel level.
    pub boost_min_fuel: f32,

    /// Active-pickup cap, enforced at spawn time only.
    pub max_pickups: usize,
    /// Ticks between pickup spawn attempts.
    pub pickup_spawn_interval: u32,
    pub pickup_collect_radius: f32,
    pub shield_duration: u32,
    pub speed_burst_duration: u32,
    pub slow_duration: u32,
    pub speed_burst_mult: f32,
    pub slow_mult: f32,
    /// Velocity magnitude imposed by a scatter bomb.
    pub scatter_force: f32,
    /// Boids granted by a mass-spawn pickup, subject to the per-player cap.
    pub mass_spawn_count: usize,
    /// Positional jitter around mass-spawned boids.
    pub mass_spawn_jitter: f32,
    /// Boids destroyed by a mine, newest first.
    pub mine_kill_count: usize,

    /// Quadtree node capacity before subdivision.
    pub quadtree_max_entries: usize,
    /// Quadtree subdivision depth limit.
    pub quadtree_max_depth: usize,

    /// Optional RNG seed for reproducible worlds.
    pub rng_seed: Option<u64>,
    /// Maximum number of recent tick summaries retained in memory.
    pub history_capacity: usize,
}

impl Default for ArenaConfig {
    fn default() -> Self {
        Self {
            map_width: 4000.0,
            map_height: 4000.0,
            max_boids_per_player: 200,
            initial_boids: 10,
            spawn_margin: 100.0,
            cluster_spread: 30.0,
            initial_velocity_jitter: 1.0,
            base_speed: 3.0,
            base_aggression_radius: 80.0,
            base_collect_range: 40.0,
            separation_radius: 15.0,
            alignment_radius: 50.0,
            cohesion_radius: 60.0,
            separation_weight: 2.5,
            alignment_weight: 1.0,
            cohesion_weight: 1.0,
            cursor_weight: 2.0,
            chase_weight: 1.5,
            cursor_deadzone: 5.0,
            steer_clamp: 0.5,
            max_resources: 300,
            resource_spawn_rate: 0.5,
            resource_value_min: 1,
            resource_value_max: 3,
            mutation_gain: 0.02,
            score_spawn_step: 3,
            collect_query_factor: 3.0,
            combat_absorb_radius: 20.0,
            boost_speed_mult: 1.85,
            boost_drain_rate: 0.04,
            boost_recharge_rate: 0.012,
            boost_min_fuel: 0.05,
            max_pickups: 20,
            pickup_spawn_interval: 60,
            pickup_collect_radius: 30.0,
            shield_duration: 60,
            speed_burst_duration: 80,
            slow_duration: 60,
            speed_burst_mult: 1.5,
            slow_mult: 0.5,
            scatter_force: 8.0,
            mass_spawn_count: 5,
            mass_spawn_jitter: 20.0,
            mine_kill_count: 4,
            quadtree_max_entries: 8,
            quadtree_max_depth: 6,
            rng_seed: None,
            history_capacity: 256,
        }
    }
}

impl ArenaConfig {
    /// Validates the configuration against engine and wire-format constraints.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.map_width <= 0.0 || self.map_height <= 0.0 {
            return Err(ConfigError::InvalidConfig("map dimensions must be positive"));
        }
        if self.map_width > f32::from(u16::MAX) || self.map_height > f32::from(u16::MAX) {
            return Err(ConfigError::InvalidConfig(
                "map dimensions must fit the u16 snapshot encoding",
            ));
        }
        if self.spawn_margin < 0.0 || self.spawn_margin * 2.0 >= self.map_width.min(self.map_height)
        {
            return Err(ConfigError::InvalidConfig(
                "spawn_margin must be non-negative and leave a spawnable region",
            ));
        }
        if self.initial_boids > self.max_boids_per_player {
            return Err(ConfigError::InvalidConfig(
                "initial_boids cannot exceed max_boids_per_player",
            ));
        }
        if self.base_speed <= 0.0
            || self.base_aggression_radius <= 0.0
            || self.base_collect_range <= 0.0
            || self.separation_radius <= 0.0
            || self.alignment_radius <= 0.0
            || self.cohesion_radius <= 0.0
            || self.combat_absorb_radius <= 0.0
            || self.pickup_collect_radius <= 0.0
        {
            return Err(ConfigError::InvalidConfig("radii and speeds must be positive"));
        }
        if self.resource_spawn_rate < 0.0 {
            return Err(ConfigError::InvalidConfig(
                "resource_spawn_rate must be non-negative",
            ));
        }
        if self.resource_value_min == 0 || self.resource_value_min > self.resource_value_max {
            return Err(ConfigError::InvalidConfig(
                "resource values must satisfy 0 < min <= max",
            ));
        }
        if self.score_spawn_step == 0 {
            return Err(ConfigError::InvalidConfig("score_spawn_step must be non-zero"));
        }
        if self.mutation_gain < 0.0 {
            return Err(ConfigError::InvalidConfig(
                "mutation_gain must be non-negative; mutations never decrease",
            ));
        }
        if self.collect_query_factor < 1.0 {
            return Err(ConfigError::InvalidConfig(
                "collect_query_factor must cover at least the base range",
            ));
        }
        if !(0.0..=1.0).contains(&self.boost_min_fuel)
            || self.boost_drain_rate < 0.0
            || self.boost_recharge_rate < 0.0
        {
            return Err(ConfigError::InvalidConfig(
                "boost fuel parameters must be non-negative, min fuel within [0, 1]",
            ));
        }
        if self.pickup_spawn_interval == 0 {
            return Err(ConfigError::InvalidConfig(
                "pickup_spawn_interval must be non-zero",
            ));
        }
        if self.quadtree_max_entries == 0 {
            return Err(ConfigError::InvalidConfig(
                "quadtree_max_entries must be non-zero",
            ));
        }
        if self.history_capacity == 0 {
            return Err(ConfigError::InvalidConfig("history_capacity must be non-zero"));
        }
        Ok(())
    }

    /// Build the world RNG, seeding from entropy when no seed is configured.
    pub(crate) fn seeded_rng(&self) -> SmallRng {
        match self.rng_seed {
            Some(seed) => SmallRng::seed_from_u64(seed),
            None => {
                let seed: u64 = rand::random();
                SmallRng::seed_from_u64(seed)
            }
        }
    }
}

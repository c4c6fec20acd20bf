//! Entity records and the boid storage arena.

use crate::geometry::Vec2;
use serde::{Deserialize, Serialize};
use slotmap::{SlotMap, new_key_type};
use std::collections::HashSet;
use std::fmt;

new_key_type! {
    /// Generational handle for boids backed by a slot map.
    ///
    /// Spatial-index entries carry this key instead of a raw storage index, so
    /// a lookup after mid-tick removals fails cleanly rather than resolving to
    /// a shifted neighbor.
    pub struct BoidKey;
}

/// External identifier for a connected player. Allocated monotonically and
/// never reused for the lifetime of an engine.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, Default,
)]
pub struct PlayerId(pub u32);

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "player#{}", self.0)
    }
}

/// Per-player multipliers raised permanently by collecting resources.
/// All start at 1.0 and never decrease within a session.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Mutations {
    pub speed: f32,
    pub cohesion: f32,
    pub aggression: f32,
    pub collect_range: f32,
}

impl Default for Mutations {
    fn default() -> Self {
        Self {
            speed: 1.0,
            cohesion: 1.0,
            aggression: 1.0,
            collect_range: 1.0,
        }
    }
}

/// A connected player's full mutable state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Player {
    pub id: PlayerId,
    /// Steering target; overwritten verbatim by input, never validated.
    pub cursor: Vec2,
    pub mutations: Mutations,
    pub score: u32,
    /// Cleared when the swarm empties; never reset by the engine.
    pub alive: bool,
    pub boosting: bool,
    /// Boost fuel in `[0, 1]`.
    pub boost_fuel: f32,
    /// Remaining shield ticks; 0 = inactive.
    pub shield_ticks: u32,
    pub speed_burst_ticks: u32,
    pub slow_ticks: u32,
}

impl Player {
    /// A freshly connected player with default stats and full fuel.
    #[must_use]
    pub fn new(id: PlayerId, cursor: Vec2) -> Self {
        Self {
            id,
            cursor,
            mutations: Mutations::default(),
            score: 0,
            alive: true,
            boosting: false,
            boost_fuel: 1.0,
            shield_ticks: 0,
            speed_burst_ticks: 0,
            slow_ticks: 0,
        }
    }

    /// Whether a shield pickup is currently protecting this player's boids.
    #[must_use]
    pub const fn shielded(&self) -> bool {
        self.shield_ticks > 0
    }
}

/// An autonomous steered agent owned by a player.
///
/// `player` is a non-owning reference; rules validate it against the player
/// collection on every use and silently skip the boid when it dangles.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Boid {
    pub id: u32,
    pub player: PlayerId,
    pub pos: Vec2,
    pub vel: Vec2,
}

/// Mutation stat a resource feeds when collected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum ResourceKind {
    Speed = 0,
    Cohesion = 1,
    Aggression = 2,
    CollectRange = 3,
}

impl ResourceKind {
    /// Number of resource kinds.
    pub const COUNT: u8 = 4;

    /// Map a wire/roll value onto a kind; values wrap into range.
    #[must_use]
    pub const fn from_u8(value: u8) -> Self {
        match value % Self::COUNT {
            0 => Self::Speed,
            1 => Self::Cohesion,
            2 => Self::Aggression,
            _ => Self::CollectRange,
        }
    }
}

/// A collectible map resource.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Resource {
    pub id: u32,
    pub pos: Vec2,
    pub value: u32,
    pub kind: ResourceKind,
    pub active: bool,
}

/// Transient map effect. Kinds 0-3 are beneficial, 4-7 are traps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[repr(u8)]
pub enum PickupKind {
    /// Refills boost fuel to 100%.
    BoostRefill = 0,
    /// Instantly grants extra boids near the collector.
    MassSpawn = 1,
    /// Combat invulnerability for a fixed duration.
    Shield = 2,
    /// Temporary speed multiplier above 1.
    SpeedBurst = 3,
    /// Temporary speed multiplier below 1.
    SlowTrap = 4,
    /// Launches the collector's boids directly away from the pickup.
    ScatterBomb = 5,
    /// Empties boost fuel and forces boost off.
    DrainTrap = 6,
    /// Kills a fixed number of the collector's boids.
    Mine = 7,
}

impl PickupKind {
    /// Number of pickup kinds.
    pub const COUNT: u8 = 8;

    /// Map a wire/roll value onto a kind; values wrap into range.
    #[must_use]
    pub const fn from_u8(value: u8) -> Self {
        match value % Self::COUNT {
            0 => Self::BoostRefill,
            1 => Self::MassSpawn,
            2 => Self::Shield,
            3 => Self::SpeedBurst,
            4 => Self::SlowTrap,
            5 => Self::ScatterBomb,
            6 => Self::DrainTrap,
            _ => Self::Mine,
        }
    }

    /// Whether the effect helps the collecting player.
    #[must_use]
    pub const fn is_beneficial(&self) -> bool {
        (*self as u8) < 4
    }
}

/// A powerup or trap waiting on the map.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Pickup {
    pub id: u32,
    pub pos: Vec2,
    pub kind: PickupKind,
    pub active: bool,
}

/// Dense boid storage with generational handles.
///
/// Insertion appends, keeping earlier dense indices stable; bulk removal
/// compacts in place so the surviving boids keep their relative order. Both
/// properties are load-bearing: the tick pipeline's first-match and
/// newest-backward rules are defined over this order.
#[derive(Debug, Default)]
pub struct BoidArena {
    slots: SlotMap<BoidKey, usize>,
    handles: Vec<BoidKey>,
    boids: Vec<Boid>,
}

impl BoidArena {
    /// Create an empty arena.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live boids.
    #[must_use]
    pub fn len(&self) -> usize {
        self.boids.len()
    }

    /// Returns true when no boids are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.boids.is_empty()
    }

    /// Dense slice of all live boids.
    #[must_use]
    pub fn boids(&self) -> &[Boid] {
        &self.boids
    }

    /// Mutable dense slice of all live boids.
    #[must_use]
    pub fn boids_mut(&mut self) -> &mut [Boid] {
        &mut self.boids
    }

    /// Handles in dense iteration order.
    #[must_use]
    pub fn handles(&self) -> &[BoidKey] {
        &self.handles
    }

    /// Returns the dense index for `key`, if it is still live.
    #[must_use]
    pub fn index_of(&self, key: BoidKey) -> Option<usize> {
        self.slots.get(key).copied()
    }

    /// Returns true if `key` refers to a live boid.
    #[must_use]
    pub fn contains(&self, key: BoidKey) -> bool {
        self.slots.contains_key(key)
    }

    /// Borrow the boid behind `key`.
    #[must_use]
    pub fn get(&self, key: BoidKey) -> Option<&Boid> {
        self.index_of(key).map(|index| &self.boids[index])
    }

    /// Mutably borrow the boid behind `key`.
    #[must_use]
    pub fn get_mut(&mut self, key: BoidKey) -> Option<&mut Boid> {
        let index = self.index_of(key)?;
        Some(&mut self.boids[index])
    }

    /// Append a boid and return its handle.
    pub fn insert(&mut self, boid: Boid) -> BoidKey {
        let index = self.boids.len();
        self.boids.push(boid);
        let key = self.slots.insert(index);
        self.handles.push(key);
        key
    }

    /// Remove every boid whose key is in `dead`, preserving the relative
    /// order of survivors. Returns the number removed.
    pub fn remove_many(&mut self, dead: &HashSet<BoidKey>) -> usize {
        if dead.is_empty() {
            return 0;
        }
        let mut write = 0;
        for read in 0..self.handles.len() {
            let key = self.handles[read];
            if dead.contains(&key) {
                self.slots.remove(key);
                continue;
            }
            if write != read {
                self.handles[write] = key;
                self.boids[write] = self.boids[read];
            }
            if let Some(slot) = self.slots.get_mut(key) {
                *slot = write;
            }
            write += 1;
        }
        let removed = self.handles.len() - write;
        self.handles.truncate(write);
        self.boids.truncate(write);
        removed
    }

    /// Remove all boids owned by `player`. Returns the number removed.
    pub fn remove_owned_by(&mut self, player: PlayerId) -> usize {
        let dead: HashSet<BoidKey> = self
            .handles
            .iter()
            .zip(&self.boids)
            .filter(|(_, boid)| boid.player == player)
            .map(|(key, _)| *key)
            .collect();
        self.remove_many(&dead)
    }

    /// Count the boids owned by `player`.
    #[must_use]
    pub fn count_owned_by(&self, player: PlayerId) -> usize {
        self.boids.iter().filter(|boid| boid.player == player).count()
    }

    /// Drop every boid.
    pub fn clear(&mut self) {
        self.slots.clear();
        self.handles.clear();
        self.boids.clear();
    }
}

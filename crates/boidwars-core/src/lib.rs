//! Authoritative real-time simulation for the BoidWars arena.
//!
//! Players each steer a flock of autonomous boids competing for resources and
//! pickups on a shared 2D map. The engine advances at a fixed external
//! cadence: callers invoke [`Engine::tick`] once per frame and broadcast the
//! returned snapshot bytes. Transport, hosting, and rendering live outside
//! this crate; they only touch the engine's mutation/query API.

pub mod config;
pub mod engine;
pub mod entities;
pub mod geometry;

pub use config::{ArenaConfig, ConfigError};
pub use engine::{Engine, EngineError, Tick, TickEvents, TickSummary};
pub use entities::{
    Boid, BoidArena, BoidKey, Mutations, Pickup, PickupKind, Player, PlayerId, Resource,
    ResourceKind,
};
pub use geometry::Vec2;

pub use boidwars_protocol::{DecodeError, Snapshot};

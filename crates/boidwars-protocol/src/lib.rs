//! Binary snapshot format for world-state broadcast.
//!
//! The layout is a fixed external contract consumed verbatim by clients:
//! little-endian, unversioned, uncompressed. Any change here is a protocol
//! break.
//!
//! ```text
//! Header (12 B):  u16 map_width, map_height, num_players, num_boids,
//!                 num_resources, num_pickups
//! Player (31 B):  u32 id, u16 score, u8 alive, u8 boosting, f32 boost_fuel,
//!                 f32 speed/cohesion/aggression/collect_range,
//!                 u8 shield_ticks, u8 speed_burst_ticks, u8 slow_ticks
//! Boid (10 B):    u32 player_id, u16 x, u16 y, i8 vx, i8 vy
//! Resource (5 B): u16 x, u16 y, u8 kind
//! Pickup (5 B):   u16 x, u16 y, u8 kind
//! ```

use thiserror::Error;

/// Fixed size of the snapshot header in bytes.
pub const HEADER_LEN: usize = 12;
/// Encoded size of one player record.
pub const PLAYER_RECORD_LEN: usize = 31;
/// Encoded size of one boid record.
pub const BOID_RECORD_LEN: usize = 10;
/// Encoded size of one resource or pickup record.
pub const MAP_ENTITY_RECORD_LEN: usize = 5;

/// Errors raised while parsing a snapshot.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    /// The buffer ended before the declared record counts were satisfied.
    #[error("snapshot truncated: needed {needed} bytes, had {available}")]
    Truncated { needed: usize, available: usize },
}

/// Truncate and clamp a world coordinate into the u16 wire range.
#[must_use]
pub fn quantize_position(value: f32) -> u16 {
    value.clamp(0.0, f32::from(u16::MAX)) as u16
}

/// Scale a velocity component by 10, round to the nearest step, and clamp
/// into the i8 wire range. Rounding keeps the decoded value within 0.05 of
/// the original.
#[must_use]
pub fn quantize_velocity(value: f32) -> i8 {
    ((value * 10.0).round() as i32).clamp(-127, 127) as i8
}

/// Per-player wire record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlayerRecord {
    pub id: u32,
    /// Score saturated at `u16::MAX`.
    pub score: u16,
    pub alive: bool,
    pub boosting: bool,
    pub boost_fuel: f32,
    /// Mutation stats in wire order: speed, cohesion, aggression, collect range.
    pub stats: [f32; 4],
    pub shield_ticks: u8,
    pub speed_burst_ticks: u8,
    pub slow_ticks: u8,
}

/// Per-boid wire record. Position is truncated to integer units, velocity is
/// fixed-point with one decimal digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BoidRecord {
    pub player_id: u32,
    pub x: u16,
    pub y: u16,
    pub vx: i8,
    pub vy: i8,
}

/// Wire record shared by resources and pickups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MapEntityRecord {
    pub x: u16,
    pub y: u16,
    pub kind: u8,
}

/// One tick's complete world snapshot.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    pub map_width: u16,
    pub map_height: u16,
    pub players: Vec<PlayerRecord>,
    pub boids: Vec<BoidRecord>,
    pub resources: Vec<MapEntityRecord>,
    pub pickups: Vec<MapEntityRecord>,
}

impl Snapshot {
    /// Exact size of the encoded form in bytes.
    #[must_use]
    pub fn encoded_len(&self) -> usize {
        HEADER_LEN
            + self.players.len() * PLAYER_RECORD_LEN
            + self.boids.len() * BOID_RECORD_LEN
            + (self.resources.len() + self.pickups.len()) * MAP_ENTITY_RECORD_LEN
    }

    /// Serialize into the wire layout.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(self.encoded_len());

        put_u16(&mut buf, self.map_width);
        put_u16(&mut buf, self.map_height);
        put_u16(&mut buf, saturating_count(self.players.len()));
        put_u16(&mut buf, saturating_count(self.boids.len()));
        put_u16(&mut buf, saturating_count(self.resources.len()));
        put_u16(&mut buf, saturating_count(self.pickups.len()));

        for player in &self.players {
            put_u32(&mut buf, player.id);
            put_u16(&mut buf, player.score);
            buf.push(u8::from(player.alive));
            buf.push(u8::from(player.boosting));
            put_f32(&mut buf, player.boost_fuel);
            for stat in player.stats {
                put_f32(&mut buf, stat);
            }
            buf.push(player.shield_ticks);
            buf.push(player.speed_burst_ticks);
            buf.push(player.slow_ticks);
        }

        for boid in &self.boids {
            put_u32(&mut buf, boid.player_id);
            put_u16(&mut buf, boid.x);
            put_u16(&mut buf, boid.y);
            buf.push(boid.vx as u8);
            buf.push(boid.vy as u8);
        }

        for entity in self.resources.iter().chain(&self.pickups) {
            put_u16(&mut buf, entity.x);
            put_u16(&mut buf, entity.y);
            buf.push(entity.kind);
        }

        buf
    }

    /// Parse a snapshot from its wire form.
    pub fn decode(bytes: &[u8]) -> Result<Self, DecodeError> {
        let mut reader = Reader::new(bytes);

        let map_width = reader.u16()?;
        let map_height = reader.u16()?;
        let num_players = reader.u16()? as usize;
        let num_boids = reader.u16()? as usize;
        let num_resources = reader.u16()? as usize;
        let num_pickups = reader.u16()? as usize;

        let mut players = Vec::with_capacity(num_players);
        for _ in 0..num_players {
            players.push(PlayerRecord {
                id: reader.u32()?,
                score: reader.u16()?,
                alive: reader.u8()? != 0,
                boosting: reader.u8()? != 0,
                boost_fuel: reader.f32()?,
                stats: [reader.f32()?, reader.f32()?, reader.f32()?, reader.f32()?],
                shield_ticks: reader.u8()?,
                speed_burst_ticks: reader.u8()?,
                slow_ticks: reader.u8()?,
            });
        }

        let mut boids = Vec::with_capacity(num_boids);
        for _ in 0..num_boids {
            boids.push(BoidRecord {
                player_id: reader.u32()?,
                x: reader.u16()?,
                y: reader.u16()?,
                vx: reader.u8()? as i8,
                vy: reader.u8()? as i8,
            });
        }

        let mut read_entities = |count: usize| -> Result<Vec<MapEntityRecord>, DecodeError> {
            let mut entities = Vec::with_capacity(count);
            for _ in 0..count {
                entities.push(MapEntityRecord {
                    x: reader.u16()?,
                    y: reader.u16()?,
                    kind: reader.u8()?,
                });
            }
            Ok(entities)
        };
        let resources = read_entities(num_resources)?;
        let pickups = read_entities(num_pickups)?;

        Ok(Self {
            map_width,
            map_height,
            players,
            boids,
            resources,
            pickups,
        })
    }
}

fn saturating_count(len: usize) -> u16 {
    len.min(u16::MAX as usize) as u16
}

fn put_u16(buf: &mut Vec<u8>, value: u16) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn put_u32(buf: &mut Vec<u8>, value: u32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

fn put_f32(buf: &mut Vec<u8>, value: f32) {
    buf.extend_from_slice(&value.to_le_bytes());
}

struct Reader<'a> {
    bytes: &'a [u8],
    offset: usize,
}

impl<'a> Reader<'a> {
    const fn new(bytes: &'a [u8]) -> Self {
        Self { bytes, offset: 0 }
    }

    fn take<const N: usize>(&mut self) -> Result<[u8; N], DecodeError> {
        let end = self.offset + N;
        let Some(slice) = self.bytes.get(self.offset..end) else {
            return Err(DecodeError::Truncated {
                needed: end,
                available: self.bytes.len(),
            });
        };
        self.offset = end;
        let mut out = [0u8; N];
        out.copy_from_slice(slice);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16, DecodeError> {
        Ok(u16::from_le_bytes(self.take::<2>()?))
    }

    fn u32(&mut self) -> Result<u32, DecodeError> {
        Ok(u32::from_le_bytes(self.take::<4>()?))
    }

    fn f32(&mut self) -> Result<f32, DecodeError> {
        Ok(f32::from_le_bytes(self.take::<4>()?))
    }
}

//! Wire protocol shared between the server and its clients.
//!
//! Every datagram carries a fixed little-endian frame: a one-byte command
//! tag, a four-byte packet id used by the acknowledgment machinery, and a
//! command-specific payload. Reserved tags decode to [`Command::Unknown`]
//! rather than an error so the server can attribute them to a sender.

use std::ops::{Add, AddAssign};

use thiserror::Error;

/// Size of the frame header: command tag plus packet id.
pub const HEADER_SIZE: usize = 5;

/// Displacement / position in world space.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vec3 {
    pub x: f32,
    pub y: f32,
    pub z: f32,
}

impl Vec3 {
    pub const ZERO: Vec3 = Vec3 {
        x: 0.0,
        y: 0.0,
        z: 0.0,
    };

    pub fn new(x: f32, y: f32, z: f32) -> Self {
        Self { x, y, z }
    }
}

impl Add for Vec3 {
    type Output = Vec3;

    fn add(self, rhs: Vec3) -> Vec3 {
        Vec3::new(self.x + rhs.x, self.y + rhs.y, self.z + rhs.z)
    }
}

impl AddAssign for Vec3 {
    fn add_assign(&mut self, rhs: Vec3) {
        self.x += rhs.x;
        self.y += rhs.y;
        self.z += rhs.z;
    }
}

/// Errors produced while decoding a datagram.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    /// The buffer ended before the declared command's fields did.
    #[error("packet truncated: need {needed} bytes, got {len}")]
    Truncated { needed: usize, len: usize },
}

/// A decoded command, tagged by the first byte on the wire.
///
/// Tags 0 and 3-4 travel client-to-server, 1-2 server-to-client. Anything
/// at or above 5 is unassigned and surfaces as `Unknown` so the dispatcher
/// can penalize the sender instead of failing the whole tick.
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    /// Request to establish a session (tag 0, no payload).
    Join,
    /// Session established; carries the newly spawned avatar id (tag 1).
    Welcome { avatar_id: u32 },
    /// Announces an avatar and the client that owns it (tag 2).
    Spawn { avatar_id: u32, owner_id: u32 },
    /// Displace an avatar by a per-command delta (tag 3).
    Move { avatar_id: u32, delta: Vec3 },
    /// Confirms receipt of the packet with the given id (tag 4).
    Ack { packet_id: u32 },
    /// Any reserved or unassigned tag; payload bytes are ignored.
    Unknown(u8),
}

impl Command {
    pub fn tag(&self) -> u8 {
        match self {
            Command::Join => 0,
            Command::Welcome { .. } => 1,
            Command::Spawn { .. } => 2,
            Command::Move { .. } => 3,
            Command::Ack { .. } => 4,
            Command::Unknown(tag) => *tag,
        }
    }
}

/// One framed packet: its wire id plus the decoded command.
#[derive(Debug, Clone, PartialEq)]
pub struct Packet {
    pub id: u32,
    pub command: Command,
}

impl Packet {
    pub fn new(id: u32, command: Command) -> Self {
        Self { id, command }
    }

    /// Serializes the packet into the fixed little-endian frame.
    pub fn encode(&self) -> Vec<u8> {
        let mut data = Vec::with_capacity(HEADER_SIZE + 16);
        data.push(self.command.tag());
        data.extend_from_slice(&self.id.to_le_bytes());
        match &self.command {
            Command::Join | Command::Unknown(_) => {}
            Command::Welcome { avatar_id } => {
                data.extend_from_slice(&avatar_id.to_le_bytes());
            }
            Command::Spawn {
                avatar_id,
                owner_id,
            } => {
                data.extend_from_slice(&avatar_id.to_le_bytes());
                data.extend_from_slice(&owner_id.to_le_bytes());
            }
            Command::Move { avatar_id, delta } => {
                data.extend_from_slice(&avatar_id.to_le_bytes());
                data.extend_from_slice(&delta.x.to_le_bytes());
                data.extend_from_slice(&delta.y.to_le_bytes());
                data.extend_from_slice(&delta.z.to_le_bytes());
            }
            Command::Ack { packet_id } => {
                data.extend_from_slice(&packet_id.to_le_bytes());
            }
        }
        data
    }

    /// Parses a frame, validating that the declared command's payload is
    /// fully present.
    pub fn decode(data: &[u8]) -> Result<Packet, DecodeError> {
        let mut reader = Reader::new(data);
        let tag = reader.read_u8()?;
        let id = reader.read_u32()?;
        let command = match tag {
            0 => Command::Join,
            1 => Command::Welcome {
                avatar_id: reader.read_u32()?,
            },
            2 => Command::Spawn {
                avatar_id: reader.read_u32()?,
                owner_id: reader.read_u32()?,
            },
            3 => Command::Move {
                avatar_id: reader.read_u32()?,
                delta: Vec3::new(
                    reader.read_f32()?,
                    reader.read_f32()?,
                    reader.read_f32()?,
                ),
            },
            4 => Command::Ack {
                packet_id: reader.read_u32()?,
            },
            other => Command::Unknown(other),
        };
        Ok(Packet { id, command })
    }
}

/// Bounds-checked little-endian cursor over an inbound datagram.
struct Reader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> Reader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, pos: 0 }
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8], DecodeError> {
        let end = self.pos + n;
        if end > self.data.len() {
            return Err(DecodeError::Truncated {
                needed: end,
                len: self.data.len(),
            });
        }
        let slice = &self.data[self.pos..end];
        self.pos = end;
        Ok(slice)
    }

    fn read_u8(&mut self) -> Result<u8, DecodeError> {
        Ok(self.take(1)?[0])
    }

    fn read_u32(&mut self) -> Result<u32, DecodeError> {
        let bytes = self.take(4)?;
        Ok(u32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_f32(&mut self) -> Result<f32, DecodeError> {
        let bytes = self.take(4)?;
        Ok(f32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }
}

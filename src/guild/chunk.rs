//! Map chunk references and their `world:x:z` string encoding.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::guild::errors::GuildError;

/// A claimable map region: a world name plus integer chunk coordinates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkRef {
    pub world: String,
    pub x: i32,
    pub z: i32,
}

impl ChunkRef {
    pub fn new(world: impl Into<String>, x: i32, z: i32) -> Self {
        Self {
            world: world.into(),
            x,
            z,
        }
    }

    /// Encode as `world:x:z`.
    pub fn encode(&self) -> String {
        self.to_string()
    }

    /// Decode a `world:x:z` string. Coordinates are taken from the right,
    /// so world names may contain `:` themselves.
    pub fn decode(s: &str) -> Result<Self, GuildError> {
        let mut parts = s.rsplitn(3, ':');
        let z = parts.next();
        let x = parts.next();
        let world = parts.next();
        match (world, x, z) {
            (Some(world), Some(x), Some(z)) if !world.is_empty() => {
                let x = x
                    .trim()
                    .parse::<i32>()
                    .map_err(|_| GuildError::InvalidChunk(s.to_string()))?;
                let z = z
                    .trim()
                    .parse::<i32>()
                    .map_err(|_| GuildError::InvalidChunk(s.to_string()))?;
                Ok(ChunkRef::new(world, x, z))
            }
            _ => Err(GuildError::InvalidChunk(s.to_string())),
        }
    }
}

impl fmt::Display for ChunkRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.world, self.x, self.z)
    }
}

impl FromStr for ChunkRef {
    type Err = GuildError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ChunkRef::decode(s)
    }
}

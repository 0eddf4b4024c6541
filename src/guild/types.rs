//! Guild data types and the persisted record schema.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique player identifier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PlayerId(pub Uuid);

impl PlayerId {
    pub fn new_v4() -> Self {
        PlayerId(Uuid::new_v4())
    }
}

impl From<Uuid> for PlayerId {
    fn from(id: Uuid) -> Self {
        PlayerId(id)
    }
}

impl fmt::Display for PlayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl FromStr for PlayerId {
    type Err = uuid::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Uuid::parse_str(s.trim()).map(PlayerId)
    }
}

/// A membership tier within a guild.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Rank {
    pub members: Vec<PlayerId>,
    pub permissions: Vec<String>,
    pub is_default: bool,
}

impl Rank {
    pub fn contains(&self, player: &PlayerId) -> bool {
        self.members.contains(player)
    }

    pub fn has_permission(&self, permission: &str) -> bool {
        self.permissions.iter().any(|p| p == permission)
    }
}

/// On-disk form of a guild. The guild name is the record key and is not
/// stored inside the record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GuildRecord {
    pub leader: String,
    /// Raw prefix as typed, before color translation.
    #[serde(default)]
    pub prefix: String,
    #[serde(default)]
    pub balance: f64,
    #[serde(default)]
    pub ranks: BTreeMap<String, RankRecord>,
    #[serde(default)]
    pub claims: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RankRecord {
    #[serde(default)]
    pub members: Vec<String>,
    #[serde(default)]
    pub permissions: Vec<String>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub default: bool,
}

impl GuildRecord {
    /// A fresh record: zero balance, empty prefix, and one empty rank per seed name.
    pub fn seeded(leader: PlayerId, seed_ranks: &[String]) -> Self {
        GuildRecord {
            leader: leader.to_string(),
            prefix: String::new(),
            balance: 0.0,
            ranks: seed_ranks
                .iter()
                .map(|name| (name.clone(), RankRecord::default()))
                .collect(),
            claims: Vec::new(),
        }
    }
}

fn is_false(b: &bool) -> bool {
    !*b
}

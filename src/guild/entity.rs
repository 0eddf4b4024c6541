//! The guild entity.
//!
//! A [`Guild`] owns its in-memory state and a handle to the record store.
//! Every mutator prepares the next state, writes the full record, and only
//! then commits the change in memory, so a failed write leaves the guild
//! exactly as it was.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use log::{info, warn};

use crate::config::{DefaultRankFallback, GuildsConfig};
use crate::guild::chunk::ChunkRef;
use crate::guild::color::display_prefix;
use crate::guild::errors::GuildError;
use crate::guild::storage::RecordStore;
use crate::guild::types::{GuildRecord, PlayerId, Rank, RankRecord};
use crate::validation::validate_guild_name;

#[derive(Debug, Clone, PartialEq)]
struct GuildState {
    leader: PlayerId,
    raw_prefix: String,
    prefix: String,
    balance: f64,
    ranks: BTreeMap<String, Rank>,
    claims: Vec<ChunkRef>,
}

impl GuildState {
    fn from_record(name: &str, record: &GuildRecord, color_char: char) -> Result<Self, GuildError> {
        let leader = record.leader.parse::<PlayerId>().map_err(|e| {
            GuildError::invalid_record(name, format!("leader {:?}: {}", record.leader, e))
        })?;

        let mut ranks = BTreeMap::new();
        for (rank_name, rank) in &record.ranks {
            let members = rank
                .members
                .iter()
                .map(|m| {
                    m.parse::<PlayerId>().map_err(|e| {
                        GuildError::invalid_record(
                            name,
                            format!("member {:?} of rank {}: {}", m, rank_name, e),
                        )
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            ranks.insert(
                rank_name.clone(),
                Rank {
                    members,
                    permissions: rank.permissions.clone(),
                    is_default: rank.default,
                },
            );
        }

        let claims = record
            .claims
            .iter()
            .map(|c| {
                ChunkRef::decode(c)
                    .map_err(|_| GuildError::invalid_record(name, format!("claim {:?}", c)))
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(GuildState {
            leader,
            raw_prefix: record.prefix.clone(),
            prefix: display_prefix(color_char, &record.prefix),
            balance: record.balance,
            ranks,
            claims,
        })
    }

    fn to_record(&self) -> GuildRecord {
        GuildRecord {
            leader: self.leader.to_string(),
            prefix: self.raw_prefix.clone(),
            balance: self.balance,
            ranks: self
                .ranks
                .iter()
                .map(|(name, rank)| {
                    (
                        name.clone(),
                        RankRecord {
                            members: rank.members.iter().map(|m| m.to_string()).collect(),
                            permissions: rank.permissions.clone(),
                            default: rank.is_default,
                        },
                    )
                })
                .collect(),
            claims: self.claims.iter().map(ChunkRef::encode).collect(),
        }
    }

    fn rank_mut(&mut self, rank: &str) -> Result<&mut Rank, GuildError> {
        self.ranks
            .get_mut(rank)
            .ok_or_else(|| GuildError::RankNotFound(rank.to_string()))
    }
}

/// A loaded guild bound to its backing record.
pub struct Guild {
    name: String,
    state: GuildState,
    store: Arc<dyn RecordStore>,
    settings: Arc<GuildsConfig>,
}

impl fmt::Debug for Guild {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Guild")
            .field("name", &self.name)
            .field("state", &self.state)
            .finish_non_exhaustive()
    }
}

impl Guild {
    /// Load the guild stored under `name`.
    pub fn load(
        name: &str,
        store: Arc<dyn RecordStore>,
        settings: Arc<GuildsConfig>,
    ) -> Result<Self, GuildError> {
        let record = store
            .load(name)?
            .ok_or_else(|| GuildError::GuildNotFound(name.to_string()))?;
        Self::from_record(name, &record, store, settings)
    }

    /// Build a guild from an already-read record.
    pub fn from_record(
        name: &str,
        record: &GuildRecord,
        store: Arc<dyn RecordStore>,
        settings: Arc<GuildsConfig>,
    ) -> Result<Self, GuildError> {
        let state = GuildState::from_record(name, record, settings.color_char)?;
        Ok(Guild {
            name: name.to_string(),
            state,
            store,
            settings,
        })
    }

    /// Write a new guild record seeded with the configured ranks.
    ///
    /// This does not touch any registry; a registry only sees the guild after
    /// its next reload.
    pub fn create(
        name: &str,
        leader: PlayerId,
        store: &dyn RecordStore,
        settings: &GuildsConfig,
    ) -> Result<(), GuildError> {
        let name = validate_guild_name(name)?;
        let record = GuildRecord::seeded(leader, &settings.seed_ranks);
        store.create(&name, &record)?;
        info!("Created guild {} (leader {})", name, leader);
        Ok(())
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn leader(&self) -> PlayerId {
        self.state.leader
    }

    /// Display prefix: color-translated, with a trailing space.
    pub fn prefix(&self) -> &str {
        &self.state.prefix
    }

    /// Prefix as stored, before color translation.
    pub fn raw_prefix(&self) -> &str {
        &self.state.raw_prefix
    }

    pub fn balance(&self) -> f64 {
        self.state.balance
    }

    pub fn ranks(&self) -> &BTreeMap<String, Rank> {
        &self.state.ranks
    }

    pub fn rank(&self, rank: &str) -> Option<&Rank> {
        self.state.ranks.get(rank)
    }

    pub fn members(&self, rank: &str) -> Result<&[PlayerId], GuildError> {
        self.rank(rank)
            .map(|r| r.members.as_slice())
            .ok_or_else(|| GuildError::RankNotFound(rank.to_string()))
    }

    /// Name of the first rank (alphabetically) listing `player`.
    pub fn rank_of(&self, player: &PlayerId) -> Option<&str> {
        self.state
            .ranks
            .iter()
            .find(|(_, rank)| rank.contains(player))
            .map(|(name, _)| name.as_str())
    }

    pub fn is_member(&self, player: &PlayerId) -> bool {
        self.rank_of(player).is_some()
    }

    pub fn has_permission(&self, player: &PlayerId, permission: &str) -> bool {
        self.rank_of(player)
            .and_then(|rank| self.rank(rank))
            .is_some_and(|rank| rank.has_permission(permission))
    }

    pub fn claims(&self) -> &[ChunkRef] {
        &self.state.claims
    }

    pub fn is_claimed(&self, chunk: &ChunkRef) -> bool {
        self.state.claims.contains(chunk)
    }

    /// The rank new members join.
    ///
    /// Falls back to the alphabetically first rank only when configured to;
    /// otherwise a guild without a flagged rank fails with `NoDefaultRank`.
    pub fn default_rank(&self) -> Result<&str, GuildError> {
        if let Some((name, _)) = self.state.ranks.iter().find(|(_, r)| r.is_default) {
            return Ok(name.as_str());
        }
        match self.settings.default_rank_fallback {
            DefaultRankFallback::Alphabetical => self
                .state
                .ranks
                .keys()
                .next()
                .map(String::as_str)
                .ok_or_else(|| GuildError::NoDefaultRank(self.name.clone())),
            DefaultRankFallback::None => Err(GuildError::NoDefaultRank(self.name.clone())),
        }
    }

    /// Current state in its persisted form.
    pub fn to_record(&self) -> GuildRecord {
        self.state.to_record()
    }

    fn commit<T>(
        &mut self,
        change: impl FnOnce(&mut GuildState) -> Result<T, GuildError>,
    ) -> Result<T, GuildError> {
        let mut next = self.state.clone();
        let out = change(&mut next)?;
        self.store
            .save(&self.name, &next.to_record())
            .map_err(|e| GuildError::persist(&self.name, e))?;
        self.state = next;
        Ok(out)
    }

    /// Move the record to a new name. The new record is written before the
    /// old one is removed; if removal fails the new record is dropped again
    /// and the guild keeps its old name.
    pub fn set_name(&mut self, new_name: &str) -> Result<(), GuildError> {
        let new_name = validate_guild_name(new_name)?;
        if new_name == self.name {
            return Ok(());
        }
        self.store.create(&new_name, &self.state.to_record())?;
        if let Err(e) = self.store.delete(&self.name) {
            if let Err(cleanup) = self.store.delete(&new_name) {
                warn!(
                    "Rename of guild {} failed and record {} could not be removed: {}",
                    self.name, new_name, cleanup
                );
            }
            return Err(GuildError::persist(&self.name, e));
        }
        info!("Renamed guild {} to {}", self.name, new_name);
        self.name = new_name;
        Ok(())
    }

    pub fn set_leader(&mut self, leader: PlayerId) -> Result<(), GuildError> {
        self.commit(|state| {
            state.leader = leader;
            Ok(())
        })
    }

    /// Add a player to the default rank, returning that rank's name.
    pub fn add_member(&mut self, player: PlayerId) -> Result<String, GuildError> {
        if let Some(rank) = self.rank_of(&player) {
            return Err(GuildError::AlreadyMember {
                player: player.to_string(),
                rank: rank.to_string(),
            });
        }
        let rank = self.default_rank()?.to_string();
        self.commit(|state| {
            state.rank_mut(&rank)?.members.push(player);
            Ok(())
        })?;
        Ok(rank)
    }

    /// Remove a player from their rank, returning the rank they held.
    pub fn remove_member(&mut self, player: &PlayerId) -> Result<String, GuildError> {
        let rank = self
            .rank_of(player)
            .ok_or_else(|| GuildError::NotAMember(player.to_string()))?
            .to_string();
        self.commit(|state| {
            state.rank_mut(&rank)?.members.retain(|m| m != player);
            Ok(())
        })?;
        Ok(rank)
    }

    /// Move an existing member to another rank.
    pub fn set_rank(&mut self, player: &PlayerId, rank: &str) -> Result<(), GuildError> {
        if self.rank(rank).is_none() {
            return Err(GuildError::RankNotFound(rank.to_string()));
        }
        let current = self
            .rank_of(player)
            .ok_or_else(|| GuildError::NotAMember(player.to_string()))?
            .to_string();
        if current == rank {
            return Ok(());
        }
        self.commit(|state| {
            state.rank_mut(&current)?.members.retain(|m| m != player);
            state.rank_mut(rank)?.members.push(*player);
            Ok(())
        })
    }

    /// Flag `rank` as the default join rank, clearing the flag elsewhere.
    pub fn set_default_rank(&mut self, rank: &str) -> Result<(), GuildError> {
        if self.rank(rank).is_none() {
            return Err(GuildError::RankNotFound(rank.to_string()));
        }
        self.commit(|state| {
            for (name, r) in state.ranks.iter_mut() {
                r.is_default = name == rank;
            }
            Ok(())
        })
    }

    /// Returns false if the rank already had the permission.
    pub fn add_permission(&mut self, rank: &str, permission: &str) -> Result<bool, GuildError> {
        let existing = self
            .rank(rank)
            .ok_or_else(|| GuildError::RankNotFound(rank.to_string()))?;
        if existing.has_permission(permission) {
            return Ok(false);
        }
        self.commit(|state| {
            state.rank_mut(rank)?.permissions.push(permission.to_string());
            Ok(true)
        })
    }

    /// Returns false if the rank did not have the permission.
    pub fn remove_permission(&mut self, rank: &str, permission: &str) -> Result<bool, GuildError> {
        let existing = self
            .rank(rank)
            .ok_or_else(|| GuildError::RankNotFound(rank.to_string()))?;
        if !existing.has_permission(permission) {
            return Ok(false);
        }
        self.commit(|state| {
            state.rank_mut(rank)?.permissions.retain(|p| p != permission);
            Ok(true)
        })
    }

    /// Claim a chunk. Claiming a chunk the guild already holds is a no-op
    /// that returns false.
    pub fn claim_chunk(&mut self, chunk: ChunkRef) -> Result<bool, GuildError> {
        if self.is_claimed(&chunk) {
            return Ok(false);
        }
        self.commit(|state| {
            state.claims.push(chunk);
            Ok(true)
        })
    }

    pub fn unclaim_chunk(&mut self, chunk: &ChunkRef) -> Result<bool, GuildError> {
        if !self.is_claimed(chunk) {
            return Ok(false);
        }
        self.commit(|state| {
            state.claims.retain(|c| c != chunk);
            Ok(true)
        })
    }

    pub fn set_prefix(&mut self, raw: &str) -> Result<(), GuildError> {
        let color_char = self.settings.color_char;
        self.commit(|state| {
            state.raw_prefix = raw.to_string();
            state.prefix = display_prefix(color_char, raw);
            Ok(())
        })
    }

    /// Add to the balance, returning the new balance.
    pub fn deposit(&mut self, amount: f64) -> Result<f64, GuildError> {
        self.adjust_balance(amount, amount)
    }

    /// Subtract from the balance, returning the new balance. The balance may
    /// go negative.
    pub fn withdraw(&mut self, amount: f64) -> Result<f64, GuildError> {
        self.adjust_balance(amount, -amount)
    }

    fn adjust_balance(&mut self, amount: f64, delta: f64) -> Result<f64, GuildError> {
        if !amount.is_finite() {
            return Err(GuildError::InvalidAmount(amount));
        }
        self.commit(|state| {
            let next = state.balance + delta;
            if !next.is_finite() {
                return Err(GuildError::InvalidAmount(amount));
            }
            state.balance = next;
            Ok(next)
        })
    }
}

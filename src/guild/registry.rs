//! The loaded set of guilds.
//!
//! A [`GuildRegistry`] is constructed explicitly and shared by reference.
//! It only knows about guilds present at its last [`GuildRegistry::reload`];
//! records written by other means stay invisible until the next reload.
//!
//! Each guild sits behind its own mutex. Do not call registry methods while
//! holding a guild's lock: lookups lock every guild in turn.

use std::sync::{Arc, Mutex, MutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{info, warn};

use crate::config::{Config, GuildsConfig, InvalidRecordPolicy};
use crate::guild::chunk::ChunkRef;
use crate::guild::entity::Guild;
use crate::guild::errors::GuildError;
use crate::guild::storage::{FileRecordStore, RecordStore};
use crate::guild::types::PlayerId;
use crate::validation::{names_match, validate_guild_name};

pub type SharedGuild = Arc<Mutex<Guild>>;

/// Lock a guild, recovering from poisoning. Guilds only commit state after a
/// successful write, so a poisoned guild is still consistent.
pub fn lock_guild(guild: &SharedGuild) -> MutexGuard<'_, Guild> {
    guild.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// A record that could not be loaded during a reload.
#[derive(Debug)]
pub struct SkippedRecord {
    pub name: String,
    pub error: GuildError,
}

/// Outcome of a registry reload.
#[derive(Debug, Default)]
pub struct LoadReport {
    pub loaded: Vec<String>,
    pub skipped: Vec<SkippedRecord>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.skipped.is_empty()
    }
}

pub struct GuildRegistry {
    store: Arc<dyn RecordStore>,
    settings: Arc<GuildsConfig>,
    guilds: RwLock<Vec<SharedGuild>>,
}

impl GuildRegistry {
    /// Create an empty registry over `store`. Call [`reload`](Self::reload) to populate it.
    pub fn new(store: Arc<dyn RecordStore>, settings: GuildsConfig) -> Self {
        Self {
            store,
            settings: Arc::new(settings),
            guilds: RwLock::new(Vec::new()),
        }
    }

    /// Open the file-backed store described by `config` and load every guild.
    pub fn open(config: &Config) -> Result<(Self, LoadReport), GuildError> {
        let store = FileRecordStore::open(config.guild_dir(), config.storage.max_record_bytes)?;
        let registry = Self::new(Arc::new(store), config.guilds.clone());
        let report = registry.reload()?;
        Ok((registry, report))
    }

    pub fn store(&self) -> &Arc<dyn RecordStore> {
        &self.store
    }

    pub fn settings(&self) -> &GuildsConfig {
        &self.settings
    }

    fn read_guilds(&self) -> RwLockReadGuard<'_, Vec<SharedGuild>> {
        self.guilds.read().unwrap_or_else(|p| p.into_inner())
    }

    fn write_guilds(&self) -> RwLockWriteGuard<'_, Vec<SharedGuild>> {
        self.guilds.write().unwrap_or_else(|p| p.into_inner())
    }

    /// Re-read every stored record into the loaded set.
    ///
    /// A guild that was already loaded keeps its handle and has its state
    /// refreshed in place, so every holder shares one lock per record. Under
    /// the `abort` policy a malformed record fails the reload and the
    /// previous set stays loaded untouched.
    pub fn reload(&self) -> Result<LoadReport, GuildError> {
        let names = self.store.list()?;
        let mut report = LoadReport::default();
        let mut loaded = Vec::with_capacity(names.len());
        for name in names {
            match Guild::load(&name, Arc::clone(&self.store), Arc::clone(&self.settings)) {
                Ok(guild) => {
                    loaded.push(guild);
                    report.loaded.push(name);
                }
                Err(e) => self.reject(&mut report, name, e)?,
            }
        }
        for file in self.store.strays()? {
            let e = GuildError::invalid_record(
                &file,
                "file name is not the encoded form of a guild name",
            );
            self.reject(&mut report, file, e)?;
        }

        let mut guilds = self.write_guilds();
        let previous = std::mem::take(&mut *guilds);
        for guild in loaded {
            let existing = previous
                .iter()
                .find(|g| lock_guild(g).name() == guild.name())
                .cloned();
            match existing {
                Some(handle) => {
                    *lock_guild(&handle) = guild;
                    guilds.push(handle);
                }
                None => guilds.push(Arc::new(Mutex::new(guild))),
            }
        }
        drop(guilds);
        info!(
            "Loaded {} guilds ({} skipped)",
            report.loaded.len(),
            report.skipped.len()
        );
        Ok(report)
    }

    fn reject(
        &self,
        report: &mut LoadReport,
        name: String,
        error: GuildError,
    ) -> Result<(), GuildError> {
        match self.settings.invalid_records {
            InvalidRecordPolicy::Abort => {
                warn!("Aborting guild reload on {}: {}", name, error);
                Err(error)
            }
            InvalidRecordPolicy::Skip => {
                warn!("Skipping guild record {}: {}", name, error);
                report.skipped.push(SkippedRecord { name, error });
                Ok(())
            }
        }
    }

    pub fn all(&self) -> Vec<SharedGuild> {
        self.read_guilds().clone()
    }

    pub fn names(&self) -> Vec<String> {
        self.read_guilds()
            .iter()
            .map(|g| lock_guild(g).name().to_string())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.read_guilds().len()
    }

    pub fn is_empty(&self) -> bool {
        self.read_guilds().is_empty()
    }

    fn find(&self, predicate: impl Fn(&Guild) -> bool) -> Option<SharedGuild> {
        self.read_guilds()
            .iter()
            .find(|g| predicate(&lock_guild(g)))
            .cloned()
    }

    /// Case-insensitive lookup among loaded guilds.
    pub fn get(&self, name: &str) -> Option<SharedGuild> {
        self.find(|g| names_match(g.name(), name))
    }

    /// Case-insensitive check against loaded guilds only; storage is not consulted.
    pub fn exists(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// The loaded guild `player` belongs to, if any.
    pub fn guild_of(&self, player: &PlayerId) -> Option<SharedGuild> {
        self.find(|g| g.is_member(player))
    }

    /// The loaded guild holding `chunk`, if any.
    pub fn claim_owner(&self, chunk: &ChunkRef) -> Option<SharedGuild> {
        self.find(|g| g.is_claimed(chunk))
    }

    /// Write a new guild record, reload the registry, and return the new guild.
    pub fn create_guild(&self, name: &str, leader: PlayerId) -> Result<SharedGuild, GuildError> {
        let name = validate_guild_name(name)?;
        if self.exists(&name) {
            return Err(GuildError::AlreadyExists(name));
        }
        Guild::create(&name, leader, self.store.as_ref(), &self.settings)?;
        self.reload()?;
        self.get(&name)
            .ok_or(GuildError::GuildNotFound(name))
    }

    /// Rename a loaded guild. Changing only the case of its own name is allowed.
    pub fn rename_guild(&self, old: &str, new: &str) -> Result<(), GuildError> {
        let guilds = self.write_guilds();
        let target = guilds
            .iter()
            .find(|g| names_match(lock_guild(g).name(), old))
            .cloned()
            .ok_or_else(|| GuildError::GuildNotFound(old.to_string()))?;
        let clash = guilds
            .iter()
            .any(|g| !Arc::ptr_eq(g, &target) && names_match(lock_guild(g).name(), new));
        if clash {
            return Err(GuildError::AlreadyExists(new.to_string()));
        }
        let mut guild = lock_guild(&target);
        guild.set_name(new)
    }

    /// Delete a guild's record and drop it from the loaded set.
    pub fn disband(&self, name: &str) -> Result<(), GuildError> {
        let mut guilds = self.write_guilds();
        let index = guilds
            .iter()
            .position(|g| names_match(lock_guild(g).name(), name))
            .ok_or_else(|| GuildError::GuildNotFound(name.to_string()))?;
        let guild = guilds.remove(index);
        let stored_name = lock_guild(&guild).name().to_string();
        if let Err(e) = self.store.delete(&stored_name) {
            guilds.insert(index, guild);
            return Err(e);
        }
        info!("Disbanded guild {}", stored_name);
        Ok(())
    }
}

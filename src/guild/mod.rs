//! Guild data model, persistence, and the loaded-guild registry.
//!
//! A guild is a named player group with a leader, a balance, a display
//! prefix, ranked membership tiers carrying permissions, and a list of
//! claimed map chunks. Each guild is stored as one record in a
//! [`RecordStore`]; a [`GuildRegistry`] holds the guilds loaded from it.

pub mod chunk;
pub mod color;
pub mod entity;
pub mod errors;
pub mod registry;
pub mod storage;
pub mod types;

pub use chunk::ChunkRef;
pub use entity::Guild;
pub use errors::GuildError;
pub use registry::{lock_guild, GuildRegistry, LoadReport, SharedGuild, SkippedRecord};
pub use storage::{FileRecordStore, RecordStore};
pub use types::{GuildRecord, PlayerId, Rank, RankRecord};

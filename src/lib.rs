//! # Guildhall - Guild Records for Multiplayer Game Servers
//!
//! Guildhall keeps player guilds (clans, factions) for a game server: who
//! leads them, who belongs to which rank, what each rank may do, how much
//! money the guild holds, and which map chunks it has claimed.
//!
//! ## Features
//!
//! - **Write-through persistence**: every mutation rewrites the guild's record
//!   before the in-memory guild changes, so memory and disk never diverge.
//! - **Atomic records**: one JSON file per guild, written via temp file and
//!   rename under an exclusive file lock.
//! - **Ranks and permissions**: a default join rank, rank moves, and
//!   per-rank permission lists, with each player in at most one rank.
//! - **Registry**: an explicitly constructed, lockable set of loaded guilds
//!   with case-insensitive lookup and reload reporting.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use guildhall::config::Config;
//! use guildhall::guild::{lock_guild, GuildRegistry, PlayerId};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = Config::load("config.toml").await?;
//!     let (registry, _report) = GuildRegistry::open(&config)?;
//!
//!     let leader = PlayerId::new_v4();
//!     let alpha = registry.create_guild("Alpha", leader)?;
//!     let mut guild = lock_guild(&alpha);
//!     guild.set_default_rank("member")?;
//!     guild.add_member(PlayerId::new_v4())?;
//!     guild.deposit(250.0)?;
//!     Ok(())
//! }
//! ```
//!
//! ## Module Organization
//!
//! - [`guild`] - Guild entity, record store, chunk codec, and registry
//! - [`config`] - Configuration loading and defaults
//! - [`validation`] - Guild name validation and filename mapping

pub mod config;
pub mod guild;
pub mod validation;

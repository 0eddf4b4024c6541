use thiserror::Error;

use crate::validation::NameError;

/// Errors that can arise while loading, mutating, or persisting guilds.
#[derive(Debug, Error)]
pub enum GuildError {
    /// Wrapper around IO errors (directory listing, record reads).
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// Wrapper around JSON serialization errors.
    #[error("serialization error: {0}")]
    Json(#[from] serde_json::Error),

    /// No record exists for the requested guild.
    #[error("guild not found: {0}")]
    GuildNotFound(String),

    /// A guild with this name (compared case-insensitively) already exists.
    #[error("guild already exists: {0}")]
    AlreadyExists(String),

    /// The guild has no rank with this name.
    #[error("rank not found: {0}")]
    RankNotFound(String),

    /// The player is not in any rank of the guild.
    #[error("player {0} is not a member")]
    NotAMember(String),

    /// The player already holds a rank in the guild.
    #[error("player {player} is already a member (rank {rank})")]
    AlreadyMember { player: String, rank: String },

    /// No rank is flagged as the default join rank.
    #[error("no default rank configured for guild {0}")]
    NoDefaultRank(String),

    /// Guild names double as storage keys and must pass validation.
    #[error("invalid guild name: {0}")]
    InvalidName(#[from] NameError),

    /// Balance changes must be finite so the record can be reloaded.
    #[error("invalid amount: {0}")]
    InvalidAmount(f64),

    /// A stored record could not be turned into a guild.
    #[error("invalid record for guild {name}: {reason}")]
    InvalidRecord { name: String, reason: String },

    /// A chunk reference string could not be decoded.
    #[error("invalid chunk reference: {0}")]
    InvalidChunk(String),

    /// A record file exceeds the configured size limit.
    #[error("record for guild {name} exceeds {limit} bytes")]
    RecordTooLarge { name: String, limit: u64 },

    /// Writing the record failed; the in-memory guild was left unchanged.
    #[error("failed to persist guild {name}: {source}")]
    Persist {
        name: String,
        #[source]
        source: Box<GuildError>,
    },
}

impl GuildError {
    pub(crate) fn persist(name: &str, source: GuildError) -> Self {
        GuildError::Persist {
            name: name.to_string(),
            source: Box::new(source),
        }
    }

    pub(crate) fn invalid_record(name: &str, reason: impl Into<String>) -> Self {
        GuildError::InvalidRecord {
            name: name.to_string(),
            reason: reason.into(),
        }
    }

    /// True for lookups that found nothing, as opposed to violated preconditions.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            GuildError::GuildNotFound(_) | GuildError::RankNotFound(_) | GuildError::NotAMember(_)
        )
    }
}

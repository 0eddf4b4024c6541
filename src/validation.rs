//! Guild name validation and filename mapping.
//!
//! Guild names double as record keys, so they must survive a round trip
//! through the filesystem without escaping the guild directory.

use percent_encoding::{percent_decode_str, utf8_percent_encode, NON_ALPHANUMERIC};

pub const MIN_GUILD_NAME_LEN: usize = 2;
pub const MAX_GUILD_NAME_LEN: usize = 32;

/// Guild name validation errors with helpful messages
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NameError {
    #[error("Guild name is too short (minimum {min} characters)")]
    TooShort { min: usize },

    #[error("Guild name is too long (maximum {max} characters)")]
    TooLong { max: usize },

    #[error("Guild name cannot start or end with whitespace")]
    InvalidWhitespace,

    #[error("Guild name contains control characters")]
    ControlCharacters,

    #[error("Guild name contains path separators (/ or \\)")]
    PathTraversal,

    #[error("Guild name is a reserved system name")]
    Reserved,
}

/// Names that collide with filesystem device names or directory entries.
const RESERVED_NAMES: &[&str] = &[
    ".", "..", "con", "prn", "aux", "nul", "com1", "com2", "com3", "com4", "com5", "com6", "com7",
    "com8", "com9", "lpt1", "lpt2", "lpt3", "lpt4", "lpt5", "lpt6", "lpt7", "lpt8", "lpt9",
];

/// Validate a guild name, returning it unchanged when acceptable.
pub fn validate_guild_name(name: &str) -> Result<String, NameError> {
    if name.trim() != name {
        return Err(NameError::InvalidWhitespace);
    }
    let len = name.chars().count();
    if len < MIN_GUILD_NAME_LEN {
        return Err(NameError::TooShort {
            min: MIN_GUILD_NAME_LEN,
        });
    }
    if len > MAX_GUILD_NAME_LEN {
        return Err(NameError::TooLong {
            max: MAX_GUILD_NAME_LEN,
        });
    }
    if name.chars().any(|c| c.is_control()) {
        return Err(NameError::ControlCharacters);
    }
    if name.contains('/') || name.contains('\\') {
        return Err(NameError::PathTraversal);
    }
    let lower = name.to_ascii_lowercase();
    if RESERVED_NAMES.contains(&lower.as_str()) {
        return Err(NameError::Reserved);
    }
    Ok(name.to_string())
}

/// Case-insensitive guild name comparison, folding non-ASCII letters too.
pub fn names_match(a: &str, b: &str) -> bool {
    a == b || a.to_lowercase() == b.to_lowercase()
}

/// Generate safe filename stem from a guild name using URL encoding
pub fn safe_filename(name: &str) -> String {
    utf8_percent_encode(name, NON_ALPHANUMERIC).to_string()
}

/// Recover a guild name from a filename stem produced by [`safe_filename`].
pub fn name_from_filename(stem: &str) -> Option<String> {
    percent_decode_str(stem)
        .decode_utf8()
        .ok()
        .map(|s| s.into_owned())
}

/// Check a record's size before reading it.
pub fn within_size_limit(size: u64, max_size: u64) -> bool {
    size <= max_size
}

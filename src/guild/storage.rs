//! Guild record persistence.
//!
//! ```text
//! data/
//! └── guilds/
//!     ├── Alpha.json
//!     └── Knights%20of%20Ni.json
//! ```
//!
//! One pretty-printed JSON record per guild, keyed by the percent-encoded
//! guild name. Writes go through a temp file that is renamed (or, for new
//! records, hard-linked) into place while a sidecar `.lock` file is held.

use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use fs2::FileExt;
use log::debug;

use crate::guild::errors::GuildError;
use crate::guild::types::GuildRecord;
use crate::validation::{name_from_filename, safe_filename, within_size_limit};

const RECORD_EXTENSION: &str = "json";

/// Key/value store mapping a guild name to its record.
pub trait RecordStore: Send + Sync {
    /// Names of every stored record.
    fn list(&self) -> Result<Vec<String>, GuildError>;
    /// Record files that do not map back to a guild name.
    fn strays(&self) -> Result<Vec<String>, GuildError> {
        Ok(Vec::new())
    }
    /// Read a record; `Ok(None)` if absent.
    fn load(&self, name: &str) -> Result<Option<GuildRecord>, GuildError>;
    /// Write a record that must not exist yet.
    fn create(&self, name: &str, record: &GuildRecord) -> Result<(), GuildError>;
    /// Overwrite a record.
    fn save(&self, name: &str, record: &GuildRecord) -> Result<(), GuildError>;
    fn delete(&self, name: &str) -> Result<(), GuildError>;
    fn contains(&self, name: &str) -> bool;
}

/// [`RecordStore`] over a directory of JSON files.
#[derive(Debug, Clone)]
pub struct FileRecordStore {
    root: PathBuf,
    max_record_bytes: u64,
}

impl FileRecordStore {
    /// Open (or create) the record directory at `root`.
    pub fn open(root: impl Into<PathBuf>, max_record_bytes: u64) -> Result<Self, GuildError> {
        let root = root.into();
        fs::create_dir_all(&root)?;
        Ok(Self {
            root,
            max_record_bytes,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Record location for a guild, built from the root and the encoded name.
    pub fn record_path(&self, name: &str) -> PathBuf {
        self.root
            .join(format!("{}.{}", safe_filename(name), RECORD_EXTENSION))
    }

    fn write_record(
        &self,
        name: &str,
        record: &GuildRecord,
        publish: Publish,
    ) -> Result<(), GuildError> {
        let content = serde_json::to_string_pretty(record)?;
        write_file_locked(&self.record_path(name), &content, publish).map_err(|e| {
            if publish == Publish::CreateNew && e.kind() == ErrorKind::AlreadyExists {
                GuildError::AlreadyExists(name.to_string())
            } else {
                GuildError::Io(e)
            }
        })?;
        debug!("Saved guild record {}", name);
        Ok(())
    }

    /// Walk the record directory, splitting record files into guild names
    /// and files whose stem is not the encoded form of any name.
    fn scan(&self) -> Result<(Vec<String>, Vec<String>), GuildError> {
        let mut names = Vec::new();
        let mut strays = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.file_type()?.is_file() {
                continue;
            }
            let path = entry.path();
            if path.extension().map_or(true, |ext| ext != RECORD_EXTENSION) {
                continue;
            }
            let file_name = entry.file_name().to_string_lossy().into_owned();
            let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
                strays.push(file_name);
                continue;
            };
            // Leftover temp files from interrupted writes
            if stem.starts_with('.') {
                continue;
            }
            match name_from_filename(stem) {
                Some(name) if safe_filename(&name) == stem => names.push(name),
                _ => strays.push(file_name),
            }
        }
        names.sort();
        strays.sort();
        Ok((names, strays))
    }
}

impl RecordStore for FileRecordStore {
    fn list(&self) -> Result<Vec<String>, GuildError> {
        Ok(self.scan()?.0)
    }

    fn strays(&self) -> Result<Vec<String>, GuildError> {
        Ok(self.scan()?.1)
    }

    fn load(&self, name: &str) -> Result<Option<GuildRecord>, GuildError> {
        let path = self.record_path(name);
        let metadata = match fs::metadata(&path) {
            Ok(m) => m,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        if !within_size_limit(metadata.len(), self.max_record_bytes) {
            return Err(GuildError::RecordTooLarge {
                name: name.to_string(),
                limit: self.max_record_bytes,
            });
        }
        let content = fs::read_to_string(&path)?;
        // Guard against any accidental leading NULs
        let cleaned = content.trim_start_matches('\0');
        let record = serde_json::from_str(cleaned)
            .map_err(|e| GuildError::invalid_record(name, e.to_string()))?;
        Ok(Some(record))
    }

    fn create(&self, name: &str, record: &GuildRecord) -> Result<(), GuildError> {
        if self.contains(name) {
            return Err(GuildError::AlreadyExists(name.to_string()));
        }
        self.write_record(name, record, Publish::CreateNew)
    }

    fn save(&self, name: &str, record: &GuildRecord) -> Result<(), GuildError> {
        self.write_record(name, record, Publish::Replace)
    }

    fn delete(&self, name: &str) -> Result<(), GuildError> {
        let path = self.record_path(name);
        match fs::remove_file(&path) {
            Ok(()) => {
                let _ = fs::remove_file(lock_path(&path));
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => {
                Err(GuildError::GuildNotFound(name.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn contains(&self, name: &str) -> bool {
        self.record_path(name).is_file()
    }
}

/// How a finished temp file replaces the destination.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Publish {
    /// Atomically replace whatever is there.
    Replace,
    /// Fail with `AlreadyExists` if the destination is present.
    CreateNew,
}

/// Write `content` to `path` atomically while holding an exclusive lock on a
/// sibling `.lock` file. The destination only ever appears complete; the temp
/// file is removed on every failure path.
fn write_file_locked(path: &Path, content: &str, publish: Publish) -> std::io::Result<()> {
    let dir = path.parent().unwrap_or_else(|| Path::new("."));
    let base = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("guild.json");

    // Step 1: Lock a sidecar file so the destination is never created empty
    let lock_file = OpenOptions::new()
        .create(true)
        .truncate(false)
        .read(true)
        .write(true)
        .open(lock_path(path))?;
    lock_file.lock_exclusive()?;

    // Step 2: Create a unique temp file in the same directory and fill it
    let mut counter = 0u32;
    let (tmp_path, mut tmp) = loop {
        let candidate = dir.join(format!(".{}.tmp-{}-{}", base, std::process::id(), counter));
        match OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&candidate)
        {
            Ok(tmp) => break (candidate, tmp),
            Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                counter = counter.saturating_add(1);
                continue;
            }
            Err(e) => return Err(e),
        }
    };
    let written = tmp
        .write_all(content.as_bytes())
        .and_then(|()| tmp.flush())
        .and_then(|()| tmp.sync_all());
    drop(tmp);
    if let Err(e) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(e);
    }

    // Step 3: Publish the temp file under the destination name
    let published = match publish {
        Publish::Replace => fs::rename(&tmp_path, path),
        // hard_link refuses an existing destination, unlike rename
        Publish::CreateNew => fs::hard_link(&tmp_path, path),
    };
    if publish == Publish::CreateNew || published.is_err() {
        let _ = fs::remove_file(&tmp_path);
    }
    published?;

    // Step 4: Fsync the directory to persist the new entry (best-effort)
    if let Ok(dir_file) = File::open(dir) {
        let _ = dir_file.sync_all();
    }

    // Step 5: Unlock by dropping the lock file
    drop(lock_file);

    Ok(())
}

fn lock_path(path: &Path) -> PathBuf {
    let base = path
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("guild.json");
    path.with_file_name(format!(".{}.lock", base))
}

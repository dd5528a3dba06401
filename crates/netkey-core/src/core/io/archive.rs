//! The topology archive: a mapping from genome strings to topology names.
//!
//! Archives are plain text files gated by the generating tool version:
//!
//! ```text
//! Made by netkey v0.3.1
//!
//! key 3 1 1 1 0 0 1 1 0 1 0 1 1 0 0 1
//! id pcu
//! ```
//!
//! Records are blank-separated and every `key` carries exactly one `id`.
//! A directory is loaded by merging all its files; names of duplicate keys
//! are concatenated. Saving writes to a temporary file in the target
//! directory and renames, so readers never observe a half-written archive.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::Write;
use std::path::Path;
use thiserror::Error;
use tracing::{debug, info};

/// Version stamped into every archive this build writes.
pub const ARCHIVE_VERSION: &str = env!("CARGO_PKG_VERSION");

const HEADER_PREFIX: &str = "Made by netkey v";

/// Error type for archive parsing and persistence.
#[derive(Debug, Error)]
pub enum ArchiveError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(
        "archive was made by netkey v{found}, this is v{expected}; pass --force to load it anyway"
    )]
    VersionMismatch { found: String, expected: String },

    #[error("malformed archive at line {line}: {reason}")]
    Malformed { line: usize, reason: String },
}

/// An in-memory topology archive.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Archive {
    version: String,
    entries: BTreeMap<String, String>,
}

impl Archive {
    /// An empty archive stamped with the current version.
    pub fn new() -> Self {
        Self {
            version: ARCHIVE_VERSION.to_string(),
            entries: BTreeMap::new(),
        }
    }

    /// A built-in archive by name. `"seed"` holds a few hand-verified nets.
    pub fn builtin(name: &str) -> Option<Self> {
        match name {
            "seed" => {
                let mut archive = Self::new();
                archive.add("3 1 1 1 0 0 1 1 0 1 0 1 1 0 0 1", "pcu");
                archive.add("3 1 2 0 0 0 1 2 0 0 1 1 2 0 1 0 1 2 1 0 0", "dia");
                Some(archive)
            }
            _ => None,
        }
    }

    /// Names of all built-in archives.
    pub fn builtin_names() -> &'static [&'static str] {
        &["seed"]
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn lookup(&self, genome: &str) -> Option<&str> {
        self.entries.get(genome).map(String::as_str)
    }

    /// Inserts an entry, returning the previous name for that key.
    pub fn add(&mut self, genome: &str, name: &str) -> Option<String> {
        self.entries.insert(genome.to_string(), name.to_string())
    }

    /// Removes the entry for a genome, returning its name.
    pub fn remove(&mut self, genome: &str) -> Option<String> {
        self.entries.remove(genome)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Parses one archive file.
    ///
    /// # Errors
    ///
    /// [`ArchiveError::VersionMismatch`] unless `force` is set, and
    /// [`ArchiveError::Malformed`] on structural problems.
    pub fn parse(text: &str, force: bool) -> Result<Self, ArchiveError> {
        let mut lines = text.lines().enumerate();
        let (_, header) = lines
            .next()
            .ok_or_else(|| ArchiveError::Malformed {
                line: 1,
                reason: "empty archive".into(),
            })?;
        let version = header
            .strip_prefix(HEADER_PREFIX)
            .ok_or_else(|| ArchiveError::Malformed {
                line: 1,
                reason: format!("expected `{HEADER_PREFIX}<version>` header"),
            })?
            .trim()
            .to_string();
        if version != ARCHIVE_VERSION && !force {
            return Err(ArchiveError::VersionMismatch {
                found: version,
                expected: ARCHIVE_VERSION.to_string(),
            });
        }

        let mut archive = Self {
            version,
            entries: BTreeMap::new(),
        };
        let mut pending: Option<(usize, String)> = None;
        for (idx, raw) in lines {
            let line = raw.trim();
            let lineno = idx + 1;
            if line.is_empty() {
                continue;
            }
            if let Some(genome) = line.strip_prefix("key ") {
                if let Some((at, _)) = pending {
                    return Err(ArchiveError::Malformed {
                        line: at,
                        reason: "key without an id".into(),
                    });
                }
                pending = Some((lineno, genome.trim().to_string()));
            } else if let Some(name) = line.strip_prefix("id ") {
                let Some((_, genome)) = pending.take() else {
                    return Err(ArchiveError::Malformed {
                        line: lineno,
                        reason: "id without a key".into(),
                    });
                };
                archive.merge_entry(&genome, name.trim());
            } else {
                return Err(ArchiveError::Malformed {
                    line: lineno,
                    reason: format!("unexpected line {line:?}"),
                });
            }
        }
        if let Some((at, _)) = pending {
            return Err(ArchiveError::Malformed {
                line: at,
                reason: "key without an id".into(),
            });
        }
        Ok(archive)
    }

    fn merge_entry(&mut self, genome: &str, name: &str) {
        self.entries
            .entry(genome.to_string())
            .and_modify(|existing| {
                existing.push_str(", ");
                existing.push_str(name);
            })
            .or_insert_with(|| name.to_string());
    }

    /// Loads an archive from a file, or from a directory by merging every
    /// file in it (names of duplicate keys are concatenated).
    pub fn load(path: &Path, force: bool) -> Result<Self, ArchiveError> {
        if path.is_dir() {
            let mut names: Vec<_> = fs::read_dir(path)?
                .collect::<Result<Vec<_>, _>>()?
                .into_iter()
                .map(|e| e.path())
                .filter(|p| p.is_file())
                .collect();
            names.sort();
            let mut merged = Self::new();
            for file in names {
                let part = Self::parse(&fs::read_to_string(&file)?, force)?;
                for (genome, name) in part.iter() {
                    merged.merge_entry(genome, name);
                }
            }
            debug!(entries = merged.len(), "directory archive loaded");
            Ok(merged)
        } else {
            let archive = Self::parse(&fs::read_to_string(path)?, force)?;
            debug!(entries = archive.len(), "archive loaded");
            Ok(archive)
        }
    }

    /// Persists the archive atomically: the serialized form goes to a
    /// temporary file next to `path`, then replaces it by rename.
    pub fn save(&self, path: &Path) -> Result<(), ArchiveError> {
        let dir = path.parent().filter(|p| !p.as_os_str().is_empty());
        let mut tmp = match dir {
            Some(dir) => tempfile::NamedTempFile::new_in(dir)?,
            None => tempfile::NamedTempFile::new_in(".")?,
        };
        tmp.write_all(self.to_string().as_bytes())?;
        tmp.persist(path).map_err(|e| ArchiveError::Io(e.error))?;
        info!(entries = self.len(), path = %path.display(), "archive saved");
        Ok(())
    }
}

impl fmt::Display for Archive {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "{HEADER_PREFIX}{}", ARCHIVE_VERSION)?;
        for (genome, name) in &self.entries {
            writeln!(f)?;
            writeln!(f, "key {genome}")?;
            writeln!(f, "id {name}")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn seed_archive_knows_the_cubic_net() {
        let archive = Archive::builtin("seed").unwrap();
        assert_eq!(
            archive.lookup("3 1 1 1 0 0 1 1 0 1 0 1 1 0 0 1"),
            Some("pcu")
        );
        assert_eq!(archive.lookup("3 1 2 0 0 0"), None);
        assert!(Archive::builtin("rcsr").is_none());
    }

    #[test]
    fn display_parse_round_trip() {
        let archive = Archive::builtin("seed").unwrap();
        let parsed = Archive::parse(&archive.to_string(), false).unwrap();
        assert_eq!(parsed, archive);
    }

    #[test]
    fn version_gate_rejects_foreign_archives_unless_forced() {
        let text = "Made by netkey v0.0.0\n\nkey 3 1 1 1 0 0\nid foo\n";
        assert!(matches!(
            Archive::parse(text, false),
            Err(ArchiveError::VersionMismatch { .. })
        ));
        let forced = Archive::parse(text, true).unwrap();
        assert_eq!(forced.lookup("3 1 1 1 0 0"), Some("foo"));
        assert_eq!(forced.version(), "0.0.0");
    }

    #[test]
    fn malformed_records_are_located() {
        let missing_id = "Made by netkey v0.3.1\n\nkey 3 1 1 1 0 0\nkey 3 1 2 0 0 0\nid x\n";
        assert!(matches!(
            Archive::parse(missing_id, true),
            Err(ArchiveError::Malformed { line: 3, .. })
        ));
        let orphan_id = "Made by netkey v0.3.1\n\nid x\n";
        assert!(matches!(
            Archive::parse(orphan_id, true),
            Err(ArchiveError::Malformed { line: 3, .. })
        ));
        let garbage = "not an archive\n";
        assert!(matches!(
            Archive::parse(garbage, true),
            Err(ArchiveError::Malformed { line: 1, .. })
        ));
    }

    #[test]
    fn save_and_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("archive.txt");
        let mut archive = Archive::new();
        archive.add("3 1 1 1 0 0", "foo");
        archive.save(&path).unwrap();
        let loaded = Archive::load(&path, false).unwrap();
        assert_eq!(loaded, archive);
    }

    #[test]
    fn directory_load_concatenates_duplicate_names() {
        let dir = tempfile::tempdir().unwrap();
        let mut a = Archive::new();
        a.add("3 1 1 1 0 0", "alpha");
        a.save(&dir.path().join("a.txt")).unwrap();
        let mut b = Archive::new();
        b.add("3 1 1 1 0 0", "beta");
        b.add("3 1 2 0 0 0", "gamma");
        b.save(&dir.path().join("b.txt")).unwrap();

        let merged = Archive::load(dir.path(), false).unwrap();
        assert_eq!(merged.len(), 2);
        assert_eq!(merged.lookup("3 1 1 1 0 0"), Some("alpha, beta"));
        assert_eq!(merged.lookup("3 1 2 0 0 0"), Some("gamma"));
    }

    #[test]
    fn add_and_remove_edit_entries() {
        let mut archive = Archive::new();
        assert_eq!(archive.add("3 1 1 1 0 0", "foo"), None);
        assert_eq!(archive.add("3 1 1 1 0 0", "bar"), Some("foo".into()));
        assert_eq!(archive.remove("3 1 1 1 0 0"), Some("bar".into()));
        assert!(archive.is_empty());
    }
}

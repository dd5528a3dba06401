use crate::error::{CliError, Result};
use netkey::core::io::archive::Archive;
use std::fs;
use std::path::Path;
use tracing::info;

/// Writes a fresh archive seeded from a built-in one.
pub fn create(path: &Path, builtin: &str, force: bool) -> Result<()> {
    let archive = Archive::builtin(builtin).ok_or_else(|| {
        CliError::Argument(format!(
            "unknown built-in archive {builtin:?}, available: {}",
            Archive::builtin_names().join(", ")
        ))
    })?;
    if path.exists() && !force {
        return Err(CliError::Argument(format!(
            "{} already exists, pass --force to overwrite it",
            path.display()
        )));
    }
    archive.save(path)?;
    info!(path = %path.display(), "archive created");
    println!(
        "created {} with {} entries",
        path.display(),
        archive.len()
    );
    Ok(())
}

/// Deletes an archive file.
pub fn delete(path: &Path) -> Result<()> {
    if !path.is_file() {
        return Err(CliError::Argument(format!(
            "no archive at {}",
            path.display()
        )));
    }
    fs::remove_file(path)?;
    info!(path = %path.display(), "archive deleted");
    println!("deleted {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn create_then_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seed.arc");
        create(&path, "seed", false).unwrap();
        let loaded = Archive::load(&path, false).unwrap();
        assert_eq!(loaded.lookup("3 1 1 1 0 0 1 1 0 1 0 1 1 0 0 1"), Some("pcu"));

        delete(&path).unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn create_refuses_to_overwrite_without_force() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("seed.arc");
        create(&path, "seed", false).unwrap();
        assert!(matches!(
            create(&path, "seed", false),
            Err(CliError::Argument(_))
        ));
        create(&path, "seed", true).unwrap();
    }

    #[test]
    fn unknown_builtin_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("x.arc");
        assert!(matches!(
            create(&path, "rcsr", false),
            Err(CliError::Argument(_))
        ));
    }

    #[test]
    fn delete_requires_an_existing_file() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            delete(&dir.path().join("missing.arc")),
            Err(CliError::Argument(_))
        ));
    }
}

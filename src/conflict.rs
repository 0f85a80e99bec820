//! Destination collision handling.
//!
//! The check-then-act here is not atomic: another process creating the
//! chosen name between [`resolve`] and the move is not detected.

use crate::config::ConflictPolicy;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Upper bound on `_N` suffixes tried before giving up.
pub const MAX_RENAME_ATTEMPTS: u32 = 100_000;

#[derive(Debug, thiserror::Error)]
pub enum ConflictError {
    #[error("could not remove {} to overwrite it: {source}", path.display())]
    RemoveFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no free name found for {} after {attempts} attempts", path.display())]
    RenameExhausted { path: PathBuf, attempts: u32 },
}

/// Returns the path a file destined for `destination` should be written to.
///
/// * nothing at `destination`: returned unchanged.
/// * [`ConflictPolicy::Overwrite`]: the occupant is deleted, then
///   `destination` is returned.
/// * [`ConflictPolicy::Rename`]: the first free `{stem}_{n}{ext}` sibling,
///   counting from 1.
pub fn resolve(destination: &Path, policy: ConflictPolicy) -> Result<PathBuf, ConflictError> {
    if !occupied(destination) {
        return Ok(destination.to_path_buf());
    }

    match policy {
        ConflictPolicy::Overwrite => {
            remove_occupant(destination)?;
            debug!("Removed {} to overwrite it", destination.display());
            Ok(destination.to_path_buf())
        }
        ConflictPolicy::Rename => {
            for counter in 1..=MAX_RENAME_ATTEMPTS {
                let candidate = suffixed_path(destination, counter);
                if !occupied(&candidate) {
                    debug!(
                        "{} exists, using {}",
                        destination.display(),
                        candidate.display()
                    );
                    return Ok(candidate);
                }
            }
            Err(ConflictError::RenameExhausted {
                path: destination.to_path_buf(),
                attempts: MAX_RENAME_ATTEMPTS,
            })
        }
    }
}

/// Builds `{stem}_{counter}{ext}` next to `path`.
///
/// Only the last extension is kept apart (`a.tar.gz` becomes `a.tar_1.gz`);
/// a dot-file like `.bashrc` has no extension (`.bashrc_1`).
pub fn suffixed_path(path: &Path, counter: u32) -> PathBuf {
    let stem = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match path.extension() {
        Some(ext) => format!("{}_{}.{}", stem, counter, ext.to_string_lossy()),
        None => format!("{}_{}", stem, counter),
    };
    path.with_file_name(name)
}

/// Dangling symlinks count as occupied.
fn occupied(path: &Path) -> bool {
    fs::symlink_metadata(path).is_ok()
}

fn remove_occupant(path: &Path) -> Result<(), ConflictError> {
    let is_dir = fs::symlink_metadata(path)
        .map(|meta| meta.is_dir())
        .unwrap_or(false);
    let result = if is_dir {
        fs::remove_dir_all(path)
    } else {
        fs::remove_file(path)
    };
    result.map_err(|source| ConflictError::RemoveFailed {
        path: path.to_path_buf(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_free_destination_is_returned_unchanged() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dest = temp_dir.path().join("photo.jpg");

        for policy in [ConflictPolicy::Rename, ConflictPolicy::Overwrite] {
            assert_eq!(resolve(&dest, policy).unwrap(), dest);
        }
        assert!(!dest.exists());
    }

    #[test]
    fn test_rename_appends_first_free_counter() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dest = temp_dir.path().join("photo.jpg");
        fs::write(&dest, "a").unwrap();
        fs::write(temp_dir.path().join("photo_1.jpg"), "b").unwrap();

        let resolved = resolve(&dest, ConflictPolicy::Rename).unwrap();
        assert_eq!(resolved, temp_dir.path().join("photo_2.jpg"));
        assert_eq!(fs::read_to_string(&dest).unwrap(), "a");
    }

    #[test]
    fn test_overwrite_removes_occupant() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dest = temp_dir.path().join("photo.jpg");
        fs::write(&dest, "old").unwrap();

        let resolved = resolve(&dest, ConflictPolicy::Overwrite).unwrap();
        assert_eq!(resolved, dest);
        assert!(!dest.exists());
    }

    #[test]
    fn test_overwrite_removes_directory_occupant() {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let dest = temp_dir.path().join("notes.txt");
        fs::create_dir(&dest).unwrap();
        fs::write(dest.join("inner"), "x").unwrap();

        resolve(&dest, ConflictPolicy::Overwrite).unwrap();
        assert!(!dest.exists());
    }

    #[test]
    fn test_suffixed_path_naming() {
        let dir = Path::new("/data/Images");
        assert_eq!(
            suffixed_path(&dir.join("a.tar.gz"), 1),
            dir.join("a.tar_1.gz")
        );
        assert_eq!(suffixed_path(&dir.join("README"), 3), dir.join("README_3"));
        assert_eq!(suffixed_path(&dir.join(".bashrc"), 1), dir.join(".bashrc_1"));
    }
}

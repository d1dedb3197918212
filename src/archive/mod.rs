//! Archive packs: password-protected ZIP containers used as virtual file sources.
//!
//! Overview
//! - `crypto` – traditional PKWARE stream cipher for protected entries
//! - `zip` – central directory parsing and entry extraction
//! - `builder` – writer used to produce packs from loose files
//!
//! Paths inside packs are compared after [`normalize_path`]: forward slashes
//! become backslashes and ASCII letters are lowercased, so
//! `"Images/Foo.PNG"` and `"images\\foo.png"` name the same entry.

pub mod builder;
pub mod crypto;
pub mod zip;

use std::fs::File;
use std::io::BufReader;

use log::{debug, error};

use crate::error::{ResourceError, Result};
use zip::ZipArchive;

/// Unify separators to `\` and lowercase ASCII letters.
///
/// Stops at an embedded NUL, like the C string it is usually compared with.
pub fn normalize_path(path: &str) -> String {
    path.chars()
        .take_while(|&c| c != '\0')
        .map(|c| match c {
            '/' => '\\',
            c => c.to_ascii_lowercase(),
        })
        .collect()
}

/// A mounted archive pack.
///
/// Holds the pack's open file for its whole lifetime. Dropping the pack
/// closes the archive.
pub struct ArchivePack {
    path: String,
    path_lowercase: String,
    password: Option<String>,
    archive: ZipArchive<BufReader<File>>,
}

impl std::fmt::Debug for ArchivePack {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ArchivePack")
            .field("path", &self.path)
            .field("entries", &self.archive.len())
            .field("protected", &self.password.is_some())
            .finish()
    }
}

impl ArchivePack {
    /// Open a pack. An empty password counts as no password.
    ///
    /// Fails with [`ResourceError::ArchiveOpen`] when the file is missing or
    /// is not a readable archive.
    pub fn open(path: &str, password: Option<&str>) -> Result<Self> {
        let open_error = |reason: String| {
            error!("ArchivePack: cannot open resource pack '{}' ({})", path, reason);
            ResourceError::ArchiveOpen {
                path: path.to_string(),
                reason,
            }
        };

        let file = File::open(path).map_err(|e| open_error(e.to_string()))?;
        let archive = ZipArchive::new(BufReader::new(file)).map_err(|e| open_error(e.to_string()))?;

        Ok(ArchivePack {
            path: path.to_string(),
            path_lowercase: normalize_path(path),
            password: password.filter(|p| !p.is_empty()).map(str::to_string),
            archive,
        })
    }

    /// Path the pack was opened with
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Normalized path, used to de-duplicate mounts
    pub fn path_lowercase(&self) -> &str {
        &self.path_lowercase
    }

    /// Whether a password was supplied at mount time
    pub fn has_password(&self) -> bool {
        self.password.is_some()
    }

    /// Names of every entry, in directory order
    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.archive.entries().iter().map(|e| e.name.as_str())
    }

    /// Number of entries in the pack
    pub fn len(&self) -> usize {
        self.archive.len()
    }

    /// Whether the pack has no entries
    pub fn is_empty(&self) -> bool {
        self.archive.is_empty()
    }

    /// Whether `path` names an entry in this pack
    pub fn contains(&self, path: &str) -> bool {
        self.archive.find(path).is_some()
    }

    /// Locate `path` and extract it.
    ///
    /// Returns [`ResourceError::NotFound`] when no entry matches, and
    /// [`ResourceError::ExtractFailed`] when the entry exists but cannot be
    /// decompressed, which includes a wrong password.
    pub fn load_file(&mut self, path: &str) -> Result<Vec<u8>> {
        let index = self.archive.find(path).ok_or_else(|| {
            ResourceError::not_found(format!("'{}' in pack '{}'", path, self.path))
        })?;

        debug!("ArchivePack: found '{}' in '{}'", path, self.path);
        self.archive
            .read(index, self.password.as_deref())
            .inspect_err(|e| {
                error!(
                    "ArchivePack: failed to extract '{}' from '{}' (wrong password?): {}",
                    path, self.path, e
                );
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use builder::PackBuilder;
    use zip::CompressionMethod;

    #[test]
    fn test_normalize_path_unifies_separators_and_case() {
        assert_eq!(normalize_path("Images/Foo.PNG"), "images\\foo.png");
        assert_eq!(normalize_path("images\\foo.png"), "images\\foo.png");
        assert_eq!(normalize_path("A/b\\C"), "a\\b\\c");
    }

    #[test]
    fn test_normalize_path_stops_at_nul() {
        assert_eq!(normalize_path("abc\0def"), "abc");
    }

    #[test]
    fn test_normalize_path_keeps_non_ascii() {
        assert_eq!(normalize_path("Ä/ß.png"), "Ä\\ß.png");
    }

    #[test]
    fn test_open_missing_pack_is_archive_open_error() {
        let err = ArchivePack::open("/definitely/not/here.zip", None).unwrap_err();
        assert!(matches!(err, ResourceError::ArchiveOpen { .. }));
    }

    #[test]
    fn test_load_file_from_protected_pack() {
        let dir = tempfile::tempdir().unwrap();
        let pack_path = dir.path().join("data.zip");
        PackBuilder::new()
            .password("pw")
            .add_file("Images/Foo.PNG", b"pixels".to_vec(), CompressionMethod::Deflated)
            .write_to_file(&pack_path)
            .unwrap();
        let path = pack_path.to_str().unwrap();

        let mut pack = ArchivePack::open(path, Some("pw")).unwrap();
        assert!(pack.has_password());
        assert_eq!(pack.load_file("images\\foo.png").unwrap(), b"pixels");
        assert!(pack.load_file("images/bar.png").unwrap_err().is_not_found());

        let mut locked = ArchivePack::open(path, Some("")).unwrap();
        assert!(!locked.has_password());
        assert!(locked.load_file("Images/Foo.PNG").unwrap_err().is_archive_error());
    }
}

//! Virtual file loader over mounted archive packs and the native filesystem.
//!
//! Packs are searched front to back. The most recently mounted pack sits at
//! the front and wins when two packs hold the same entry. When every pack
//! misses, the path is read from disk.

use std::collections::VecDeque;
use std::fs::{self, File};
use std::io::{Read, Write};

use log::{debug, error, info, warn};

use crate::archive::{ArchivePack, normalize_path};
use crate::error::{ResourceError, Result};

/// Mount list plus file access.
#[derive(Debug, Default)]
pub struct VirtualFileSystem {
    packs: VecDeque<ArchivePack>,
}

impl VirtualFileSystem {
    pub fn new() -> Self {
        Self::default()
    }

    /// Mount a pack at the front of the search order.
    ///
    /// Mounting a path whose normalized form is already mounted succeeds
    /// without reopening it.
    pub fn load_pack(&mut self, path: &str, password: Option<&str>) -> Result<()> {
        let key = normalize_path(path);
        if self.packs.iter().any(|p| p.path_lowercase() == key) {
            warn!("VirtualFileSystem: pack '{}' is already mounted", path);
            return Ok(());
        }

        let pack = ArchivePack::open(path, password)?;
        info!(
            "VirtualFileSystem: mounted pack '{}' ({} entries)",
            path,
            pack.len()
        );
        self.packs.push_front(pack);
        Ok(())
    }

    /// Unmount the first pack matching `path`. Unknown paths are ignored.
    pub fn unload_pack(&mut self, path: &str) {
        let key = normalize_path(path);
        match self.packs.iter().position(|p| p.path_lowercase() == key) {
            Some(index) => {
                self.packs.remove(index);
                info!("VirtualFileSystem: unmounted pack '{}'", path);
            }
            None => warn!("VirtualFileSystem: pack '{}' is not mounted", path),
        }
    }

    /// Unmount everything.
    pub fn unload_all_packs(&mut self) {
        if !self.packs.is_empty() {
            info!("VirtualFileSystem: unmounting {} packs", self.packs.len());
        }
        self.packs.clear();
    }

    /// Mounted packs in search order
    pub fn packs(&self) -> impl Iterator<Item = &ArchivePack> {
        self.packs.iter()
    }

    /// Number of mounted packs
    pub fn pack_count(&self) -> usize {
        self.packs.len()
    }

    /// Whether a pack with this normalized path is mounted
    pub fn is_pack_mounted(&self, path: &str) -> bool {
        let key = normalize_path(path);
        self.packs.iter().any(|p| p.path_lowercase() == key)
    }

    /// Read a file from the first pack holding it, else from disk.
    ///
    /// A pack that holds the entry but fails to extract it does not stop the
    /// search. If nothing else provides the file, that extraction error is
    /// returned instead of `NotFound`.
    pub fn load_file(&mut self, path: &str) -> Result<Vec<u8>> {
        let mut first_failure = None;
        for pack in self.packs.iter_mut() {
            if !pack.contains(path) {
                continue;
            }
            match pack.load_file(path) {
                Ok(data) => return Ok(data),
                Err(e) => {
                    first_failure.get_or_insert(e);
                }
            }
        }

        match read_native(path) {
            Ok(data) => Ok(data),
            Err(e) if e.is_not_found() => Err(first_failure.unwrap_or_else(|| {
                ResourceError::not_found(format!("file '{}'", path))
            })),
            Err(e) => {
                error!("VirtualFileSystem: cannot read '{}': {}", path, e);
                Err(e)
            }
        }
    }

    /// Load `path` and write its bytes to the native file `target`.
    ///
    /// The target is truncated first. An empty source leaves an empty file.
    pub fn extract(&mut self, path: &str, target: &str) -> Result<()> {
        let data = self.load_file(path).inspect_err(|e| {
            error!("VirtualFileSystem: cannot extract '{}': {}", path, e);
        })?;

        let mut out = File::create(target).inspect_err(|e| {
            error!("VirtualFileSystem: cannot create '{}': {}", target, e);
        })?;
        if !data.is_empty() {
            out.write_all(&data)?;
        }
        out.flush()?;
        debug!(
            "VirtualFileSystem: extracted '{}' to '{}' ({} bytes)",
            path,
            target,
            data.len()
        );
        Ok(())
    }
}

/// Host path for a resource path. Backslashes become `/` off Windows.
pub fn native_path(path: &str) -> String {
    if cfg!(windows) {
        path.to_string()
    } else {
        path.replace('\\', "/")
    }
}

fn read_native(path: &str) -> Result<Vec<u8>> {
    let host = native_path(path);
    let mut file = File::open(&host)?;
    let size = fs::metadata(&host)?.len() as usize;

    let mut data = Vec::new();
    data.try_reserve_exact(size)
        .map_err(|e| ResourceError::out_of_memory(format!("file '{}'", path), e))?;
    file.read_to_end(&mut data)?;
    debug!("VirtualFileSystem: read '{}' from disk", host);
    Ok(data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::builder::PackBuilder;
    use crate::archive::zip::CompressionMethod;
    use std::path::Path;

    fn write_pack(dir: &Path, name: &str, files: &[(&str, &[u8])]) -> String {
        let path = dir.join(name);
        let mut builder = PackBuilder::new();
        for (entry, data) in files {
            builder = builder.add_file(*entry, data.to_vec(), CompressionMethod::Deflated);
        }
        builder.write_to_file(&path).unwrap();
        path.to_str().unwrap().to_string()
    }

    #[test]
    fn test_mount_is_idempotent_by_normalized_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_pack(dir.path(), "a.zip", &[("x.txt", b"x")]);

        let mut vfs = VirtualFileSystem::new();
        vfs.load_pack(&path, None).unwrap();
        vfs.load_pack(&path.replace('/', "\\").to_uppercase(), None).unwrap();
        assert_eq!(vfs.pack_count(), 1);
    }

    #[test]
    fn test_latest_mount_wins() {
        let dir = tempfile::tempdir().unwrap();
        let first = write_pack(dir.path(), "first.zip", &[("shared.txt", b"first")]);
        let second = write_pack(dir.path(), "second.zip", &[("shared.txt", b"second")]);

        let mut vfs = VirtualFileSystem::new();
        vfs.load_pack(&first, None).unwrap();
        vfs.load_pack(&second, None).unwrap();
        assert_eq!(vfs.load_file("shared.txt").unwrap(), b"second");

        vfs.unload_pack(&second);
        assert_eq!(vfs.load_file("SHARED.TXT").unwrap(), b"first");
    }

    #[test]
    fn test_unload_unknown_pack_is_noop() {
        let mut vfs = VirtualFileSystem::new();
        vfs.unload_pack("nothing.zip");
        assert_eq!(vfs.pack_count(), 0);
    }

    #[test]
    fn test_native_fallback_and_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let loose = dir.path().join("loose.txt");
        fs::write(&loose, b"loose").unwrap();

        let mut vfs = VirtualFileSystem::new();
        assert_eq!(vfs.load_file(loose.to_str().unwrap()).unwrap(), b"loose");
        let missing = dir.path().join("missing.txt");
        assert!(vfs.load_file(missing.to_str().unwrap()).unwrap_err().is_not_found());
    }

    #[test]
    fn test_extract_truncates_target() {
        let dir = tempfile::tempdir().unwrap();
        let pack = write_pack(dir.path(), "p.zip", &[("a.txt", b"short"), ("empty.txt", b"")]);
        let target = dir.path().join("out.txt");
        fs::write(&target, b"much longer previous content").unwrap();

        let mut vfs = VirtualFileSystem::new();
        vfs.load_pack(&pack, None).unwrap();
        vfs.extract("a.txt", target.to_str().unwrap()).unwrap();
        assert_eq!(fs::read(&target).unwrap(), b"short");

        vfs.extract("empty.txt", target.to_str().unwrap()).unwrap();
        assert!(fs::read(&target).unwrap().is_empty());
    }

    #[test]
    fn test_extract_missing_source_fails() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("never.txt");
        let mut vfs = VirtualFileSystem::new();
        assert!(vfs.extract("no/such/file.txt", target.to_str().unwrap()).is_err());
        assert!(!target.exists());
    }

    #[test]
    fn test_native_path_converts_backslashes() {
        if !cfg!(windows) {
            assert_eq!(native_path("a\\b\\c.png"), "a/b/c.png");
        }
    }
}

//! Asset pack writer.
//!
//! Produces plain single-disk ZIP files readable by [`ZipArchive`] and by
//! ordinary zip tools. When a password is set every entry is encrypted with
//! the traditional PKWARE cipher.
//!
//! [`ZipArchive`]: super::zip::ZipArchive

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use byteorder::{LittleEndian, WriteBytesExt};
use flate2::Compression;
use flate2::write::DeflateEncoder;
use log::{debug, info};

use super::crypto::{ENCRYPTION_HEADER_SIZE, ZipCrypto};
use super::zip::{
    CENTRAL_HEADER_SIGNATURE, CompressionMethod, EOCD_SIGNATURE, FLAG_ENCRYPTED, FLAG_UTF8,
    LOCAL_HEADER_SIGNATURE,
};
use crate::error::{ResourceError, Result};

const VERSION_NEEDED: u16 = 20;
// 1980-01-01, the DOS epoch
const DOS_DATE: u16 = 0x0021;
const DOS_TIME: u16 = 0;

struct PendingFile {
    name: String,
    data: Vec<u8>,
    method: CompressionMethod,
}

struct WrittenFile {
    name: String,
    name_len: u16,
    flags: u16,
    method: CompressionMethod,
    crc32: u32,
    compressed_size: u32,
    uncompressed_size: u32,
    offset: u32,
}

/// Builder for asset packs.
pub struct PackBuilder {
    password: Option<String>,
    files: Vec<PendingFile>,
}

impl Default for PackBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl PackBuilder {
    /// Create an empty builder without a password.
    pub fn new() -> Self {
        Self {
            password: None,
            files: Vec::new(),
        }
    }

    /// Encrypt every entry with this password.
    pub fn password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Queue a file. Names use `/` separators inside the archive.
    pub fn add_file(
        mut self,
        name: impl Into<String>,
        data: impl Into<Vec<u8>>,
        method: CompressionMethod,
    ) -> Self {
        self.files.push(PendingFile {
            name: name.into().replace('\\', "/"),
            data: data.into(),
            method,
        });
        self
    }

    /// Queue every regular file below `dir`, named relative to it.
    pub fn add_dir(mut self, dir: &Path, method: CompressionMethod) -> Result<Self> {
        let mut stack = vec![dir.to_path_buf()];
        while let Some(current) = stack.pop() {
            let mut children: Vec<_> = fs::read_dir(&current)?.collect::<std::io::Result<_>>()?;
            children.sort_by_key(|e| e.file_name());
            for child in children {
                let path = child.path();
                if path.is_dir() {
                    stack.push(path);
                    continue;
                }
                let relative = path
                    .strip_prefix(dir)
                    .map_err(|e| ResourceError::InvalidArgument(e.to_string()))?;
                let name = relative.to_string_lossy().replace('\\', "/");
                debug!("PackBuilder: adding '{}'", name);
                let data = fs::read(&path)?;
                self = self.add_file(name, data, method);
            }
        }
        Ok(self)
    }

    /// Number of queued files
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Whether nothing has been queued
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Write the archive to `out`.
    pub fn write<W: Write>(self, out: &mut W) -> Result<()> {
        let mut offset: u64 = 0;
        let mut written = Vec::with_capacity(self.files.len());

        for file in &self.files {
            let name_len = u16::try_from(file.name.len()).map_err(|_| {
                ResourceError::InvalidArgument(format!(
                    "entry name is {} bytes, the limit is {}",
                    file.name.len(),
                    u16::MAX
                ))
            })?;
            let crc32 = crc32fast::hash(&file.data);
            let mut payload = match file.method {
                CompressionMethod::Stored => file.data.clone(),
                CompressionMethod::Deflated => {
                    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
                    encoder.write_all(&file.data)?;
                    encoder.finish()?
                }
            };

            let mut flags = FLAG_UTF8;
            if let Some(password) = &self.password {
                flags |= FLAG_ENCRYPTED;
                let mut header = [0u8; ENCRYPTION_HEADER_SIZE];
                for b in header.iter_mut().take(ENCRYPTION_HEADER_SIZE - 1) {
                    *b = fastrand::u8(..);
                }
                header[ENCRYPTION_HEADER_SIZE - 1] = (crc32 >> 24) as u8;

                let mut cipher = ZipCrypto::new(password.as_bytes());
                cipher.encrypt(&mut header);
                cipher.encrypt(&mut payload);

                let mut encrypted = Vec::with_capacity(header.len() + payload.len());
                encrypted.extend_from_slice(&header);
                encrypted.extend_from_slice(&payload);
                payload = encrypted;
            }

            let entry = WrittenFile {
                name: file.name.clone(),
                name_len,
                flags,
                method: file.method,
                crc32,
                compressed_size: to_u32(payload.len(), &file.name)?,
                uncompressed_size: to_u32(file.data.len(), &file.name)?,
                offset: to_u32(offset as usize, &file.name)?,
            };

            out.write_u32::<LittleEndian>(LOCAL_HEADER_SIGNATURE)?;
            out.write_u16::<LittleEndian>(VERSION_NEEDED)?;
            out.write_u16::<LittleEndian>(entry.flags)?;
            out.write_u16::<LittleEndian>(entry.method.to_raw())?;
            out.write_u16::<LittleEndian>(DOS_TIME)?;
            out.write_u16::<LittleEndian>(DOS_DATE)?;
            out.write_u32::<LittleEndian>(entry.crc32)?;
            out.write_u32::<LittleEndian>(entry.compressed_size)?;
            out.write_u32::<LittleEndian>(entry.uncompressed_size)?;
            out.write_u16::<LittleEndian>(entry.name_len)?;
            out.write_u16::<LittleEndian>(0)?;
            out.write_all(entry.name.as_bytes())?;
            out.write_all(&payload)?;

            offset += 30 + entry.name_len as u64 + payload.len() as u64;
            written.push(entry);
        }

        let cd_offset = offset;
        for entry in &written {
            out.write_u32::<LittleEndian>(CENTRAL_HEADER_SIGNATURE)?;
            out.write_u16::<LittleEndian>(VERSION_NEEDED)?;
            out.write_u16::<LittleEndian>(VERSION_NEEDED)?;
            out.write_u16::<LittleEndian>(entry.flags)?;
            out.write_u16::<LittleEndian>(entry.method.to_raw())?;
            out.write_u16::<LittleEndian>(DOS_TIME)?;
            out.write_u16::<LittleEndian>(DOS_DATE)?;
            out.write_u32::<LittleEndian>(entry.crc32)?;
            out.write_u32::<LittleEndian>(entry.compressed_size)?;
            out.write_u32::<LittleEndian>(entry.uncompressed_size)?;
            out.write_u16::<LittleEndian>(entry.name_len)?;
            out.write_u16::<LittleEndian>(0)?; // extra
            out.write_u16::<LittleEndian>(0)?; // comment
            out.write_u16::<LittleEndian>(0)?; // disk start
            out.write_u16::<LittleEndian>(0)?; // internal attributes
            out.write_u32::<LittleEndian>(0)?; // external attributes
            out.write_u32::<LittleEndian>(entry.offset)?;
            out.write_all(entry.name.as_bytes())?;
            offset += 46 + entry.name_len as u64;
        }
        let cd_size = offset - cd_offset;

        if written.len() >= u16::MAX as usize {
            return Err(ResourceError::InvalidArgument(format!(
                "too many entries for a pack: {}",
                written.len()
            )));
        }
        out.write_u32::<LittleEndian>(EOCD_SIGNATURE)?;
        out.write_u16::<LittleEndian>(0)?;
        out.write_u16::<LittleEndian>(0)?;
        out.write_u16::<LittleEndian>(written.len() as u16)?;
        out.write_u16::<LittleEndian>(written.len() as u16)?;
        out.write_u32::<LittleEndian>(to_u32(cd_size as usize, "central directory")?)?;
        out.write_u32::<LittleEndian>(to_u32(cd_offset as usize, "central directory")?)?;
        out.write_u16::<LittleEndian>(0)?;
        out.flush()?;

        Ok(())
    }

    /// Write the archive to a native file, replacing it.
    pub fn write_to_file(self, path: &Path) -> Result<()> {
        let count = self.files.len();
        let mut out = BufWriter::new(File::create(path)?);
        self.write(&mut out)?;
        info!("PackBuilder: wrote {} entries to {:?}", count, path);
        Ok(())
    }
}

fn to_u32(value: usize, what: &str) -> Result<u32> {
    u32::try_from(value)
        .map_err(|_| ResourceError::InvalidArgument(format!("'{}' exceeds 4 GiB", what)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::zip::ZipArchive;
    use std::io::Cursor;

    #[test]
    fn test_empty_pack_is_valid() {
        let mut out = Vec::new();
        PackBuilder::new().write(&mut out).unwrap();
        assert_eq!(out.len(), 22);
        let archive = ZipArchive::new(Cursor::new(out)).unwrap();
        assert!(archive.is_empty());
    }

    #[test]
    fn test_backslash_names_are_stored_with_slashes() {
        let mut out = Vec::new();
        PackBuilder::new()
            .add_file("a\\b.txt", b"x".to_vec(), CompressionMethod::Stored)
            .write(&mut out)
            .unwrap();
        let archive = ZipArchive::new(Cursor::new(out)).unwrap();
        assert_eq!(archive.entries()[0].name, "a/b.txt");
    }

    #[test]
    fn test_add_dir_collects_nested_files() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("images")).unwrap();
        fs::write(dir.path().join("images/ship.png"), b"ship").unwrap();
        fs::write(dir.path().join("readme.txt"), b"hi").unwrap();

        let builder = PackBuilder::new()
            .add_dir(dir.path(), CompressionMethod::Deflated)
            .unwrap();
        assert_eq!(builder.len(), 2);

        let mut out = Vec::new();
        builder.write(&mut out).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(out)).unwrap();
        let idx = archive.find("IMAGES\\SHIP.PNG").unwrap();
        assert_eq!(archive.read(idx, None).unwrap(), b"ship");
    }

    #[test]
    fn test_rejects_name_longer_than_header_field() {
        let name = "a".repeat(70_000);
        let mut out = Vec::new();
        let result = PackBuilder::new()
            .add_file("ok.txt", b"x".to_vec(), CompressionMethod::Stored)
            .add_file(name, b"y".to_vec(), CompressionMethod::Stored)
            .write(&mut out);
        assert!(matches!(result, Err(ResourceError::InvalidArgument(_))));

        let mut out = Vec::new();
        PackBuilder::new()
            .add_file("b".repeat(u16::MAX as usize), b"z".to_vec(), CompressionMethod::Stored)
            .write(&mut out)
            .unwrap();
        let archive = ZipArchive::new(Cursor::new(out)).unwrap();
        assert_eq!(archive.entries()[0].name.len(), u16::MAX as usize);
    }
}

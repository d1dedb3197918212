//! ZIP container reader.
//!
//! Only what asset packs need is supported: the end-of-central-directory
//! record, central directory entries, stored and deflated data, and
//! traditional PKWARE encryption. ZIP64 and multi-disk archives are rejected
//! when the directory is read.

use std::io::{Read, Seek, SeekFrom};

use byteorder::{LittleEndian, ReadBytesExt};
use flate2::read::DeflateDecoder;

use super::crypto::{ENCRYPTION_HEADER_SIZE, ZipCrypto};
use super::normalize_path;
use crate::error::{ResourceError, Result};

/// Local file header signature ('PK\x03\x04')
pub const LOCAL_HEADER_SIGNATURE: u32 = 0x0403_4B50;
/// Central directory file header signature ('PK\x01\x02')
pub const CENTRAL_HEADER_SIGNATURE: u32 = 0x0201_4B50;
/// End of central directory signature ('PK\x05\x06')
pub const EOCD_SIGNATURE: u32 = 0x0605_4B50;

/// Fixed part of the end-of-central-directory record
pub const EOCD_SIZE: u64 = 22;
/// Fixed part of a local file header
pub const LOCAL_HEADER_SIZE: usize = 30;

const MAX_COMMENT_SIZE: u64 = 0xFFFF;

/// General purpose flag: entry is encrypted
pub const FLAG_ENCRYPTED: u16 = 0x0001;
/// General purpose flag: sizes and CRC follow the data in a descriptor
pub const FLAG_DATA_DESCRIPTOR: u16 = 0x0008;
/// General purpose flag: name is UTF-8
pub const FLAG_UTF8: u16 = 0x0800;

/// Entry compression method
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompressionMethod {
    /// No compression
    Stored,
    /// Raw deflate stream
    Deflated,
}

impl CompressionMethod {
    /// Create from the raw method id
    pub fn from_raw(raw: u16) -> Option<Self> {
        match raw {
            0 => Some(CompressionMethod::Stored),
            8 => Some(CompressionMethod::Deflated),
            _ => None,
        }
    }

    /// Raw method id written to headers
    pub fn to_raw(self) -> u16 {
        match self {
            CompressionMethod::Stored => 0,
            CompressionMethod::Deflated => 8,
        }
    }
}

/// One central directory record.
#[derive(Debug, Clone)]
pub struct ZipEntry {
    /// Name as stored in the archive
    pub name: String,
    /// Name after [`normalize_path`]
    pub normalized_name: String,
    /// General purpose bit flags
    pub flags: u16,
    /// Raw compression method id
    pub method: u16,
    /// DOS modification time
    pub mod_time: u16,
    /// CRC-32 of the uncompressed data
    pub crc32: u32,
    /// Size of the stored data, including any encryption header
    pub compressed_size: u32,
    /// Size after decompression
    pub uncompressed_size: u32,
    /// Offset of the local header from the start of the archive
    pub local_header_offset: u32,
}

impl ZipEntry {
    /// Whether the entry needs a password
    pub fn is_encrypted(&self) -> bool {
        self.flags & FLAG_ENCRYPTED != 0
    }

    /// Whether the entry is a directory placeholder
    pub fn is_dir(&self) -> bool {
        self.name.ends_with('/') || self.name.ends_with('\\')
    }

    /// Byte the decrypted encryption header must end with
    fn check_byte(&self) -> u8 {
        if self.flags & FLAG_DATA_DESCRIPTOR != 0 {
            (self.mod_time >> 8) as u8
        } else {
            (self.crc32 >> 24) as u8
        }
    }
}

/// An opened ZIP archive over any seekable reader.
pub struct ZipArchive<R> {
    reader: R,
    entries: Vec<ZipEntry>,
}

impl<R: Read + Seek> ZipArchive<R> {
    /// Parse the central directory.
    ///
    /// Returns [`ResourceError::Decode`] for anything that is not a readable
    /// single-disk ZIP container.
    pub fn new(mut reader: R) -> Result<Self> {
        let (cd_offset, cd_entries) = find_central_directory(&mut reader)?;
        reader.seek(SeekFrom::Start(cd_offset))?;

        let mut entries = Vec::with_capacity(cd_entries as usize);
        for _ in 0..cd_entries {
            entries.push(read_central_entry(&mut reader)?);
        }

        Ok(ZipArchive { reader, entries })
    }

    /// All central directory entries, in directory order
    pub fn entries(&self) -> &[ZipEntry] {
        &self.entries
    }

    /// Number of entries
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the archive has no entries
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Find an entry by path. The lookup path is normalized and compared
    /// against every entry front to back.
    pub fn find(&self, path: &str) -> Option<usize> {
        let wanted = normalize_path(path);
        self.entries.iter().position(|e| e.normalized_name == wanted)
    }

    /// Read and decompress an entry.
    ///
    /// Wrong passwords, missing passwords, bad deflate streams and CRC
    /// mismatches all produce [`ResourceError::ExtractFailed`].
    pub fn read(&mut self, index: usize, password: Option<&str>) -> Result<Vec<u8>> {
        let entry = self
            .entries
            .get(index)
            .cloned()
            .ok_or_else(|| ResourceError::not_found(format!("entry index {}", index)))?;

        let method = CompressionMethod::from_raw(entry.method).ok_or_else(|| {
            ResourceError::extract_failed(
                &entry.name,
                format!("unsupported compression method {}", entry.method),
            )
        })?;

        self.seek_to_data(&entry)?;

        let mut raw = Vec::new();
        raw.try_reserve_exact(entry.compressed_size as usize)
            .map_err(|e| ResourceError::out_of_memory(&entry.name, e))?;
        (&mut self.reader)
            .take(entry.compressed_size as u64)
            .read_to_end(&mut raw)?;
        if raw.len() != entry.compressed_size as usize {
            return Err(ResourceError::extract_failed(&entry.name, "truncated entry data"));
        }

        let data_start = if entry.is_encrypted() {
            let password = password.unwrap_or("");
            if raw.len() < ENCRYPTION_HEADER_SIZE {
                return Err(ResourceError::extract_failed(
                    &entry.name,
                    "missing encryption header",
                ));
            }
            ZipCrypto::new(password.as_bytes()).decrypt(&mut raw);
            if raw[ENCRYPTION_HEADER_SIZE - 1] != entry.check_byte() {
                return Err(ResourceError::extract_failed(
                    &entry.name,
                    "wrong password or corrupted data",
                ));
            }
            ENCRYPTION_HEADER_SIZE
        } else {
            0
        };
        let payload = &raw[data_start..];

        let size = entry.uncompressed_size as usize;
        let mut out = Vec::new();
        out.try_reserve_exact(size)
            .map_err(|e| ResourceError::out_of_memory(&entry.name, e))?;

        match method {
            CompressionMethod::Stored => out.extend_from_slice(payload),
            CompressionMethod::Deflated => {
                DeflateDecoder::new(payload)
                    .take(size as u64 + 1)
                    .read_to_end(&mut out)
                    .map_err(|e| ResourceError::extract_failed(&entry.name, e.to_string()))?;
            }
        }

        if out.len() != size || crc32fast::hash(&out) != entry.crc32 {
            return Err(ResourceError::extract_failed(
                &entry.name,
                "wrong password or corrupted data",
            ));
        }

        Ok(out)
    }

    fn seek_to_data(&mut self, entry: &ZipEntry) -> Result<()> {
        self.reader
            .seek(SeekFrom::Start(entry.local_header_offset as u64))?;
        let signature = self.reader.read_u32::<LittleEndian>()?;
        if signature != LOCAL_HEADER_SIGNATURE {
            return Err(ResourceError::extract_failed(
                &entry.name,
                format!("bad local header signature {:#010x}", signature),
            ));
        }
        // Name and extra lengths sit at the end of the fixed header and may
        // differ from the central directory copy.
        self.reader.seek(SeekFrom::Current(22))?;
        let name_len = self.reader.read_u16::<LittleEndian>()?;
        let extra_len = self.reader.read_u16::<LittleEndian>()?;
        self.reader
            .seek(SeekFrom::Current(name_len as i64 + extra_len as i64))?;
        Ok(())
    }
}

fn find_central_directory<R: Read + Seek>(reader: &mut R) -> Result<(u64, u16)> {
    let file_len = reader.seek(SeekFrom::End(0))?;
    if file_len < EOCD_SIZE {
        return Err(ResourceError::decode("file too small to be a zip archive"));
    }

    let search_len = file_len.min(EOCD_SIZE + MAX_COMMENT_SIZE);
    let search_start = file_len - search_len;
    reader.seek(SeekFrom::Start(search_start))?;
    let mut tail = vec![0u8; search_len as usize];
    reader.read_exact(&mut tail)?;

    let sig = EOCD_SIGNATURE.to_le_bytes();
    let pos = (0..=tail.len() - EOCD_SIZE as usize)
        .rev()
        .find(|&i| tail[i..i + 4] == sig)
        .ok_or_else(|| ResourceError::decode("end of central directory not found"))?;

    let mut record = &tail[pos + 4..];
    let disk = record.read_u16::<LittleEndian>()?;
    let cd_disk = record.read_u16::<LittleEndian>()?;
    let entries_on_disk = record.read_u16::<LittleEndian>()?;
    let total_entries = record.read_u16::<LittleEndian>()?;
    let _cd_size = record.read_u32::<LittleEndian>()?;
    let cd_offset = record.read_u32::<LittleEndian>()?;

    if disk != 0 || cd_disk != 0 || entries_on_disk != total_entries {
        return Err(ResourceError::decode("multi-disk archives are not supported"));
    }
    if cd_offset == u32::MAX || total_entries == u16::MAX {
        return Err(ResourceError::decode("zip64 archives are not supported"));
    }
    if cd_offset as u64 > search_start + pos as u64 {
        return Err(ResourceError::decode("central directory offset out of range"));
    }

    Ok((cd_offset as u64, total_entries))
}

fn read_central_entry<R: Read>(reader: &mut R) -> Result<ZipEntry> {
    let signature = reader.read_u32::<LittleEndian>()?;
    if signature != CENTRAL_HEADER_SIGNATURE {
        return Err(ResourceError::decode(format!(
            "bad central directory signature {:#010x}",
            signature
        )));
    }

    let _version_made_by = reader.read_u16::<LittleEndian>()?;
    let _version_needed = reader.read_u16::<LittleEndian>()?;
    let flags = reader.read_u16::<LittleEndian>()?;
    let method = reader.read_u16::<LittleEndian>()?;
    let mod_time = reader.read_u16::<LittleEndian>()?;
    let _mod_date = reader.read_u16::<LittleEndian>()?;
    let crc32 = reader.read_u32::<LittleEndian>()?;
    let compressed_size = reader.read_u32::<LittleEndian>()?;
    let uncompressed_size = reader.read_u32::<LittleEndian>()?;
    let name_len = reader.read_u16::<LittleEndian>()?;
    let extra_len = reader.read_u16::<LittleEndian>()?;
    let comment_len = reader.read_u16::<LittleEndian>()?;
    let _disk_start = reader.read_u16::<LittleEndian>()?;
    let _internal_attr = reader.read_u16::<LittleEndian>()?;
    let _external_attr = reader.read_u32::<LittleEndian>()?;
    let local_header_offset = reader.read_u32::<LittleEndian>()?;

    let mut name_bytes = vec![0u8; name_len as usize];
    reader.read_exact(&mut name_bytes)?;
    let mut skip = vec![0u8; extra_len as usize + comment_len as usize];
    reader.read_exact(&mut skip)?;

    let name = String::from_utf8_lossy(&name_bytes).into_owned();

    Ok(ZipEntry {
        normalized_name: normalize_path(&name),
        name,
        flags,
        method,
        mod_time,
        crc32,
        compressed_size,
        uncompressed_size,
        local_header_offset,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::archive::builder::PackBuilder;
    use std::io::Cursor;

    fn build(password: Option<&str>) -> Vec<u8> {
        let mut builder = PackBuilder::new();
        if let Some(pw) = password {
            builder = builder.password(pw);
        }
        let mut out = Vec::new();
        builder
            .add_file("Images/Foo.PNG", b"foo bytes".to_vec(), CompressionMethod::Stored)
            .add_file(
                "scripts/main.lua",
                b"print('hello') print('hello') print('hello')".to_vec(),
                CompressionMethod::Deflated,
            )
            .write(&mut out)
            .unwrap();
        out
    }

    #[test]
    fn test_reads_directory_in_order() {
        let archive = ZipArchive::new(Cursor::new(build(None))).unwrap();
        assert_eq!(archive.len(), 2);
        assert_eq!(archive.entries()[0].name, "Images/Foo.PNG");
        assert_eq!(archive.entries()[1].normalized_name, "scripts\\main.lua");
    }

    #[test]
    fn test_find_is_case_and_separator_insensitive() {
        let archive = ZipArchive::new(Cursor::new(build(None))).unwrap();
        assert_eq!(archive.find("images\\foo.png"), Some(0));
        assert_eq!(archive.find("IMAGES/FOO.png"), Some(0));
        assert_eq!(archive.find("images/bar.png"), None);
    }

    #[test]
    fn test_reads_stored_and_deflated() {
        let mut archive = ZipArchive::new(Cursor::new(build(None))).unwrap();
        assert_eq!(archive.read(0, None).unwrap(), b"foo bytes");
        assert_eq!(
            archive.read(1, None).unwrap(),
            b"print('hello') print('hello') print('hello')"
        );
    }

    #[test]
    fn test_encrypted_entry_needs_password() {
        let mut archive = ZipArchive::new(Cursor::new(build(Some("secret")))).unwrap();
        assert!(archive.entries()[0].is_encrypted());
        assert_eq!(archive.read(0, Some("secret")).unwrap(), b"foo bytes");

        let wrong = archive.read(1, Some("nope")).unwrap_err();
        assert!(matches!(wrong, ResourceError::ExtractFailed { .. }));
        let missing = archive.read(0, None).unwrap_err();
        assert!(matches!(missing, ResourceError::ExtractFailed { .. }));
    }

    #[test]
    fn test_garbage_is_decode_error() {
        let err = ZipArchive::new(Cursor::new(vec![0u8; 64])).err().unwrap();
        assert!(matches!(err, ResourceError::Decode(_)));

        let err = ZipArchive::new(Cursor::new(vec![1u8, 2, 3])).err().unwrap();
        assert!(matches!(err, ResourceError::Decode(_)));
    }

    #[test]
    fn test_corrupted_payload_fails_crc() {
        let mut bytes = build(None);
        // First entry data starts after the 30-byte header and 14-byte name.
        bytes[LOCAL_HEADER_SIZE + "Images/Foo.PNG".len()] ^= 0xFF;
        let mut archive = ZipArchive::new(Cursor::new(bytes)).unwrap();
        let err = archive.read(0, None).unwrap_err();
        assert!(matches!(err, ResourceError::ExtractFailed { .. }));
    }
}

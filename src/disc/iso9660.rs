//! ISO 9660 volume descriptor and root directory lookup
//!
//! Works on an in-memory window holding a prefix of the logical image
//! (cooked 2048-byte sectors). The primary volume descriptor is at sector
//! 16 (offset 32768); the root directory is wherever its record points,
//! which on most discs is within the first few dozen sectors.

use crate::disc::error::{IdentifyError, IdentifyResult};

/// ISO 9660 sector size in bytes
pub const SECTOR_SIZE: usize = 2048;

/// Sector number where the Primary Volume Descriptor is located
pub const PVD_SECTOR: usize = 16;

/// Byte offset to the PVD from start of disc
pub const PVD_OFFSET: usize = PVD_SECTOR * SECTOR_SIZE;

/// Bytes of the descriptor needed to reach the root directory record
pub const PVD_MIN_BYTES: usize = 0x100;

/// Volume descriptor type for Primary Volume Descriptor
pub const PVD_TYPE: u8 = 1;

/// Volume descriptor type CD-i discs carry at sector 16
pub const CDI_DESCRIPTOR_TYPE: u8 = 0xFF;

/// Standard identifier for ISO 9660 volume descriptors
pub const ISO9660_IDENTIFIER: &[u8; 5] = b"CD001";

const ROOT_RECORD_OFFSET: usize = 156;

/// Fixed part of a directory record, before the identifier
const MIN_RECORD_LEN: usize = 34;

const FLAG_DIRECTORY: u8 = 0x02;

/// Primary volume descriptor fields used for identification
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeDescriptor {
    pub type_byte: u8,
    pub standard_id: [u8; 5],
    /// System identifier (bytes 8..40)
    pub system_id: String,
    /// Volume identifier (bytes 40..72)
    pub volume_id: String,
    /// Publisher identifier (bytes 318..446)
    pub publisher_id: String,
    /// Application identifier (bytes 574..702)
    pub application_id: String,
    pub root: DirectoryRecord,
}

impl VolumeDescriptor {
    /// Parse the primary volume descriptor out of a logical window
    ///
    /// Identifier fields past the end of the window come back empty or
    /// truncated; only the first 0x100 bytes of the descriptor are required.
    pub fn from_window(window: &[u8]) -> IdentifyResult<Self> {
        let needed = PVD_OFFSET + PVD_MIN_BYTES;
        if window.len() < needed {
            return Err(IdentifyError::InsufficientData {
                needed,
                available: window.len(),
            });
        }

        let sector = &window[PVD_OFFSET..];
        let mut standard_id = [0u8; 5];
        standard_id.copy_from_slice(&sector[1..6]);

        if sector[0] != PVD_TYPE || &standard_id != ISO9660_IDENTIFIER {
            log::debug!(
                "No primary volume descriptor (type {}, id {:?})",
                sector[0],
                String::from_utf8_lossy(&standard_id)
            );
            return Err(IdentifyError::NoMatch);
        }

        let root = DirectoryRecord::parse(&sector[ROOT_RECORD_OFFSET..ROOT_RECORD_OFFSET + MIN_RECORD_LEN])
            .ok_or(IdentifyError::NoMatch)?;

        Ok(Self {
            type_byte: sector[0],
            standard_id,
            system_id: extract_field(sector, 8, 40),
            volume_id: extract_field(sector, 40, 72),
            publisher_id: extract_field(sector, 318, 446),
            application_id: extract_field(sector, 574, 702),
            root,
        })
    }

    /// Root directory bytes, if the window reaches them
    pub fn root_directory<'w>(&self, window: &'w [u8]) -> IdentifyResult<&'w [u8]> {
        let extent = self.root.extent().ok_or(IdentifyError::RootDirectoryUnavailable {
            needed: usize::MAX,
        })?;
        if extent.end() > window.len() {
            return Err(IdentifyError::RootDirectoryUnavailable {
                needed: extent.end(),
            });
        }
        Ok(&window[extent.offset..extent.end()])
    }

    /// Find a file in the root directory by name (case-insensitive, version
    /// suffix ignored)
    pub fn locate_file(&self, window: &[u8], name: &str) -> IdentifyResult<FileExtent> {
        let directory = self.root_directory(window)?;

        let record = DirectoryWalker::new(directory)
            .filter(|r| !r.is_directory())
            .find(|r| r.name().eq_ignore_ascii_case(name))
            .ok_or_else(|| IdentifyError::FileNotFound(name.to_string()))?;

        let extent = record
            .extent()
            .ok_or(IdentifyError::FileBeyondWindow { needed: usize::MAX })?;
        if extent.end() > window.len() {
            return Err(IdentifyError::FileBeyondWindow {
                needed: extent.end(),
            });
        }
        Ok(extent)
    }

    /// Contents of a root-directory file
    pub fn read_file<'w>(&self, window: &'w [u8], name: &str) -> IdentifyResult<&'w [u8]> {
        let extent = self.locate_file(window, name)?;
        Ok(&window[extent.offset..extent.end()])
    }
}

/// Byte range of a file inside the window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileExtent {
    pub offset: usize,
    pub length: usize,
}

impl FileExtent {
    pub fn end(&self) -> usize {
        self.offset + self.length
    }
}

/// ISO 9660 Directory Record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DirectoryRecord {
    /// Location of extent (LBA)
    pub extent_lba: u32,
    /// Data length (file size)
    pub data_length: u32,
    pub flags: u8,
    /// Raw file identifier, including any `;1` version suffix
    pub identifier: String,
}

impl DirectoryRecord {
    /// Parse a single directory record
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < MIN_RECORD_LEN - 1 {
            return None;
        }

        let extent_lba = u32::from_le_bytes([data[2], data[3], data[4], data[5]]);
        let data_length = u32::from_le_bytes([data[10], data[11], data[12], data[13]]);
        let flags = data[25];

        let identifier_length = data[32] as usize;
        let identifier = data
            .get(33..33 + identifier_length)
            .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
            .unwrap_or_default();

        Some(Self {
            extent_lba,
            data_length,
            flags,
            identifier,
        })
    }

    pub fn is_directory(&self) -> bool {
        (self.flags & FLAG_DIRECTORY) != 0
    }

    /// Name without the `;version` suffix or a trailing dot
    pub fn name(&self) -> &str {
        let name = match self.identifier.rfind(';') {
            Some(idx) => &self.identifier[..idx],
            None => &self.identifier,
        };
        name.trim_end_matches('.')
    }

    /// Byte range of the extent; `None` if it would overflow
    pub fn extent(&self) -> Option<FileExtent> {
        let offset = (self.extent_lba as usize).checked_mul(SECTOR_SIZE)?;
        let length = self.data_length as usize;
        offset.checked_add(length)?;
        Some(FileExtent { offset, length })
    }
}

/// Iterates the records of a directory extent
///
/// Records never straddle a sector boundary: a zero length byte means the
/// rest of the sector is padding.
pub struct DirectoryWalker<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> DirectoryWalker<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }
}

impl Iterator for DirectoryWalker<'_> {
    type Item = DirectoryRecord;

    fn next(&mut self) -> Option<Self::Item> {
        while self.offset < self.data.len() {
            let record_length = self.data[self.offset] as usize;

            if record_length == 0 {
                let next_sector = (self.offset / SECTOR_SIZE + 1) * SECTOR_SIZE;
                if next_sector >= self.data.len() {
                    break;
                }
                self.offset = next_sector;
                continue;
            }

            let end = self.offset + record_length;
            if end > self.data.len() {
                break;
            }

            let record_data = &self.data[self.offset..end];
            self.offset = end;

            if record_length < MIN_RECORD_LEN {
                continue;
            }
            if let Some(record) = DirectoryRecord::parse(record_data) {
                return Some(record);
            }
        }

        self.offset = self.data.len();
        None
    }
}

/// Read a fixed-width text field, clamped to the buffer, trimming trailing
/// spaces and NULs
fn extract_field(sector: &[u8], start: usize, end: usize) -> String {
    let end = end.min(sector.len());
    let start = start.min(end);
    String::from_utf8_lossy(&sector[start..end])
        .trim_end_matches(|c: char| c == ' ' || c == '\0')
        .to_string()
}

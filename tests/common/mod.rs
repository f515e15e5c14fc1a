//! Synthetic image builders shared by the integration tests.
//!
//! Everything is generated in memory: small ISO 9660 volumes with a root
//! directory and a handful of files, and CHD v5 containers wrapping them
//! with a chosen codec and optional track metadata.

#![allow(dead_code)]

use std::io::Write;

use flate2::write::DeflateEncoder;
use flate2::Compression;

pub const SECTOR: usize = 2048;

/// Sector holding the root directory in built volumes
pub const ROOT_SECTOR: usize = 18;

pub fn init_logging() {
    let _ = env_logger::builder().is_test(true).try_init();
}

fn put(buf: &mut [u8], offset: usize, bytes: &[u8]) {
    buf[offset..offset + bytes.len()].copy_from_slice(bytes);
}

fn padded(text: &str, width: usize) -> Vec<u8> {
    let mut field = vec![b' '; width];
    field[..text.len()].copy_from_slice(text.as_bytes());
    field
}

fn dir_record(name: &[u8], lba: u32, length: u32, flags: u8) -> Vec<u8> {
    let mut len = 33 + name.len();
    if len % 2 == 1 {
        len += 1;
    }
    let mut r = vec![0u8; len];
    r[0] = len as u8;
    r[2..6].copy_from_slice(&lba.to_le_bytes());
    r[6..10].copy_from_slice(&lba.to_be_bytes());
    r[10..14].copy_from_slice(&length.to_le_bytes());
    r[14..18].copy_from_slice(&length.to_be_bytes());
    r[25] = flags;
    r[32] = name.len() as u8;
    r[33..].copy_from_slice(&{
        let mut id = name.to_vec();
        id.resize(len - 33, 0);
        id
    });
    r
}

/// A file placed in the root directory of a built volume
pub struct IsoFile<'a> {
    pub name: &'a str,
    pub sector: usize,
    pub data: &'a [u8],
}

/// ISO 9660 volume of `total_sectors` sectors with the given root files
pub fn build_iso(system_id: &str, publisher: &str, files: &[IsoFile], total_sectors: usize) -> Vec<u8> {
    let mut image = vec![0u8; total_sectors * SECTOR];

    let pvd = 16 * SECTOR;
    image[pvd] = 1;
    put(&mut image, pvd + 1, b"CD001");
    image[pvd + 6] = 1;
    put(&mut image, pvd + 8, &padded(system_id, 32));
    put(&mut image, pvd + 40, &padded("TEST_DISC", 32));
    put(&mut image, pvd + 318, &padded(publisher, 128));
    put(
        &mut image,
        pvd + 156,
        &dir_record(&[0], ROOT_SECTOR as u32, SECTOR as u32, 0x02),
    );
    image[17 * SECTOR] = 0xFF;
    put(&mut image, 17 * SECTOR + 1, b"CD001");

    let mut at = ROOT_SECTOR * SECTOR;
    let mut records = vec![
        dir_record(&[0], ROOT_SECTOR as u32, SECTOR as u32, 0x02),
        dir_record(&[1], ROOT_SECTOR as u32, SECTOR as u32, 0x02),
    ];
    for file in files {
        records.push(dir_record(
            file.name.as_bytes(),
            file.sector as u32,
            file.data.len() as u32,
            0,
        ));
        put(&mut image, file.sector * SECTOR, file.data);
    }
    for record in records {
        put(&mut image, at, &record);
        at += record.len();
    }

    image
}

/// PlayStation-family volume with the given SYSTEM.CNF contents
pub fn playstation_iso(system_cnf: &str) -> Vec<u8> {
    build_iso(
        "PLAYSTATION",
        "SONY COMPUTER ENTERTAINMENT",
        &[IsoFile {
            name: "SYSTEM.CNF;1",
            sector: 20,
            data: system_cnf.as_bytes(),
        }],
        24,
    )
}

/// Saturn disc: banner in sector 0, nothing else
pub fn saturn_disc() -> Vec<u8> {
    let mut image = vec![0u8; 24 * SECTOR];
    put(&mut image, 0, b"SEGA SEGASATURN SEGA ENTERPRISES");
    for (i, b) in image[0x100..SECTOR].iter_mut().enumerate() {
        *b = (i % 251) as u8;
    }
    image
}

/// How hunks are stored in a built container
#[derive(Debug, Clone, Copy)]
pub enum Codec {
    /// `zlib` slot, raw deflate payloads
    Deflate,
    /// `lzma` slot, `.lzma` framed payloads
    Lzma,
    /// `lzma` slot, headerless lc3/lp0/pb2 payloads
    RawLzma,
    Zstd,
    /// `none` slot
    Stored,
    /// `zlib` declared, hunks stored uncompressed
    Uncompressed,
    /// A tag this crate cannot decode; payloads are raw bytes
    Opaque([u8; 4]),
    /// No codec slot declared, hunks stored uncompressed
    Undeclared,
}

impl Codec {
    fn tag(&self) -> [u8; 4] {
        match self {
            Self::Deflate | Self::Uncompressed => *b"zlib",
            Self::Lzma | Self::RawLzma => *b"lzma",
            Self::Zstd => *b"zstd",
            Self::Stored => *b"none",
            Self::Opaque(tag) => *tag,
            Self::Undeclared => [0; 4],
        }
    }

    fn selector(&self) -> u8 {
        match self {
            Self::Uncompressed | Self::Undeclared => 4,
            _ => 0,
        }
    }

    fn encode(&self, hunk: &[u8]) -> Vec<u8> {
        match self {
            Self::Deflate => {
                let mut encoder = DeflateEncoder::new(Vec::new(), Compression::default());
                encoder.write_all(hunk).unwrap();
                encoder.finish().unwrap()
            }
            Self::Lzma => {
                let mut out = Vec::new();
                lzma_rs::lzma_compress(&mut &hunk[..], &mut out).unwrap();
                out
            }
            Self::RawLzma => {
                // Drop the properties, dictionary size and length header
                let mut out = Self::Lzma.encode(hunk);
                out.drain(..13);
                out
            }
            Self::Zstd => zstd::encode_all(hunk, 3).unwrap(),
            _ => hunk.to_vec(),
        }
    }
}

/// Parameters for a built CHD v5 container
pub struct ChdSpec<'a> {
    pub logical: &'a [u8],
    pub hunk_bytes: usize,
    pub codec: Codec,
    /// Track records for the metadata chain, e.g. `TRACK:1 TYPE:AUDIO`
    pub tracks: &'a [&'a str],
    /// Logical size written to the header, if not `logical.len()`
    pub declared_logical: Option<u64>,
}

impl<'a> ChdSpec<'a> {
    pub fn new(logical: &'a [u8], codec: Codec) -> Self {
        Self {
            logical,
            hunk_bytes: 4 * SECTOR,
            codec,
            tracks: &[],
            declared_logical: None,
        }
    }
}

pub fn build_chd(spec: &ChdSpec) -> Vec<u8> {
    let hunks: Vec<Vec<u8>> = spec
        .logical
        .chunks(spec.hunk_bytes)
        .map(|chunk| {
            let mut hunk = chunk.to_vec();
            hunk.resize(spec.hunk_bytes, 0);
            spec.codec.encode(&hunk)
        })
        .collect();

    let map_offset = 124usize;
    let data_offset = map_offset + hunks.len() * 12;
    let payload_bytes: usize = hunks.iter().map(Vec::len).sum();
    let meta_offset = if spec.tracks.is_empty() {
        0
    } else {
        data_offset + payload_bytes
    };

    let mut image = vec![0u8; 124];
    put(&mut image, 0, b"MComprHD");
    put(&mut image, 8, &124u32.to_be_bytes());
    put(&mut image, 12, &5u32.to_be_bytes());
    put(&mut image, 16, &spec.codec.tag());
    let logical = spec.declared_logical.unwrap_or(spec.logical.len() as u64);
    put(&mut image, 32, &logical.to_be_bytes());
    put(&mut image, 40, &(map_offset as u64).to_be_bytes());
    put(&mut image, 48, &(meta_offset as u64).to_be_bytes());
    put(&mut image, 56, &(spec.hunk_bytes as u32).to_be_bytes());
    put(&mut image, 60, &(SECTOR as u32).to_be_bytes());

    let mut offset = data_offset;
    for hunk in &hunks {
        let mut entry = [0u8; 12];
        entry[0] = spec.codec.selector();
        entry[1..4].copy_from_slice(&(hunk.len() as u32).to_be_bytes()[1..]);
        entry[4..10].copy_from_slice(&(offset as u64).to_be_bytes()[2..]);
        image.extend_from_slice(&entry);
        offset += hunk.len();
    }
    for hunk in &hunks {
        image.extend_from_slice(hunk);
    }

    for (i, track) in spec.tracks.iter().enumerate() {
        let mut data = track.as_bytes().to_vec();
        data.push(0);
        let next = if i + 1 == spec.tracks.len() {
            0
        } else {
            (image.len() + 16 + data.len()) as u64
        };
        image.extend_from_slice(b"CHT2");
        image.extend_from_slice(&(data.len() as u32).to_be_bytes());
        image.extend_from_slice(&next.to_be_bytes());
        image.extend_from_slice(&data);
    }

    image
}

//! Archive members
//!
//! ROM sets are often stored zipped. The member names alone usually give
//! the system away (`.gba`, `.z64`, a `PS3_DISC.SFB` marker); when they
//! don't, the leading bytes of the first disc-looking member go through the
//! normal identification ladder.

use std::fs::File;
use std::io::{self, Read};
use std::path::Path;

use crate::disc::error::IdentifyResult;
use crate::disc::source::{ByteSource, MemorySource};
use crate::disc::system::SystemId;

/// Marker file at the root of a PS3 disc dump
pub const PS3_MARKER: &str = "PS3_DISC.SFB";

/// Extensions that name a system on their own
static EXTENSION_SYSTEMS: &[(&str, SystemId)] = &[
    ("nes", SystemId::Nes),
    ("unf", SystemId::Nes),
    ("sfc", SystemId::Snes),
    ("smc", SystemId::Snes),
    ("gb", SystemId::GameBoy),
    ("gbc", SystemId::GameBoyColor),
    ("gba", SystemId::GameBoyAdvance),
    ("nds", SystemId::NintendoDs),
    ("3ds", SystemId::Nintendo3ds),
    ("cia", SystemId::Nintendo3ds),
    ("cci", SystemId::Nintendo3ds),
    ("n64", SystemId::N64),
    ("z64", SystemId::N64),
    ("v64", SystemId::N64),
    ("gcm", SystemId::GameCube),
    ("gcz", SystemId::GameCube),
    ("rvz", SystemId::GameCube),
    ("wbfs", SystemId::Wii),
    ("wad", SystemId::Wii),
    ("nsp", SystemId::Switch),
    ("xci", SystemId::Switch),
    ("md", SystemId::Genesis),
    ("smd", SystemId::Genesis),
    ("gen", SystemId::Genesis),
    ("gg", SystemId::GameGear),
    ("sms", SystemId::MasterSystem),
    ("32x", SystemId::Sega32x),
    ("a26", SystemId::Atari2600),
    ("a78", SystemId::Atari7800),
    ("lnx", SystemId::AtariLynx),
    ("lyx", SystemId::AtariLynx),
    ("jag", SystemId::AtariJaguar),
    ("j64", SystemId::AtariJaguar),
    ("pce", SystemId::PcEngine),
    ("ngp", SystemId::NeoGeoPocket),
    ("ngc", SystemId::NeoGeoPocket),
    ("ws", SystemId::WonderSwan),
    ("wsc", SystemId::WonderSwan),
    ("col", SystemId::ColecoVision),
];

/// Extensions of members worth reading bytes from
static CANDIDATE_EXTENSIONS: &[&str] = &[
    "bin", "iso", "img", "cue", "gdi", "nes", "smc", "sfc", "n64", "z64", "v64", "md", "gen",
    "smd", "32x", "gg", "sms", "gb", "gbc", "gba", "nds", "3ds", "cia", "a26", "a52", "a78",
    "lnx", "jag", "j64", "pce", "ngp", "col", "sg", "ws", "wsc", "chd", "pbp", "cso", "ciso",
];

fn extension(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_lowercase())
}

/// System implied by an archive member's name
pub fn system_for_member_name(name: &str) -> Option<SystemId> {
    let name = name.trim();
    let file_name = name.rsplit(['/', '\\']).next().unwrap_or(name);
    if file_name == PS3_MARKER {
        return Some(SystemId::PlayStation3);
    }

    let ext = extension(file_name)?;
    EXTENSION_SYSTEMS
        .iter()
        .find(|(e, _)| *e == ext)
        .map(|(_, system)| *system)
}

/// Whether a member looks like a ROM or disc image
pub fn is_candidate_member(name: &str) -> bool {
    if name.is_empty() || name.ends_with('/') {
        return false;
    }
    extension(name).is_some_and(|ext| CANDIDATE_EXTENSIONS.contains(&ext.as_str()))
}

/// Names of all file members of a zip archive, in archive order
pub fn member_names(path: &Path) -> IdentifyResult<Vec<String>> {
    let archive = zip::ZipArchive::new(File::open(path)?)?;
    Ok(archive
        .file_names()
        .filter(|name| !name.ends_with('/'))
        .map(str::to_string)
        .collect())
}

/// Leading bytes of one zip member, exposed as a byte source
///
/// Members are compressed streams, so the prefix is read up front; reads
/// beyond it come back short.
#[derive(Debug, Clone)]
pub struct ZipMemberSource {
    name: String,
    prefix: MemorySource,
}

impl ZipMemberSource {
    /// Open the first ROM/disc-looking member; `None` if there is none
    pub fn open_first_candidate(path: &Path, limit: usize) -> IdentifyResult<Option<Self>> {
        let names = member_names(path)?;
        match names.iter().find(|name| is_candidate_member(name)) {
            Some(name) => Self::open_member(path, name, limit).map(Some),
            None => {
                log::debug!("No ROM or disc member in {}", path.display());
                Ok(None)
            }
        }
    }

    /// Open a member by name, reading at most `limit` bytes
    pub fn open_member(path: &Path, name: &str, limit: usize) -> IdentifyResult<Self> {
        let mut archive = zip::ZipArchive::new(File::open(path)?)?;
        let member = archive.by_name(name)?;
        let size = member.size();

        let mut data = Vec::with_capacity(limit.min(usize::try_from(size).unwrap_or(usize::MAX)));
        member.take(limit as u64).read_to_end(&mut data)?;

        log::debug!(
            "Read {} of {} bytes from {}:{}",
            data.len(),
            size,
            path.display(),
            name
        );

        Ok(Self {
            name: name.to_string(),
            prefix: MemorySource::new(data).with_size_hint(size),
        })
    }

    /// Member name, used as the identification hint
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl ByteSource for ZipMemberSource {
    fn read_at(&mut self, offset: u64, length: usize) -> Result<Vec<u8>, io::Error> {
        self.prefix.read_at(offset, length)
    }

    fn size_hint(&self) -> Option<u64> {
        self.prefix.size_hint()
    }
}

/// First member whose name alone identifies the system
pub fn find_named_system(names: &[String]) -> Option<(&str, SystemId)> {
    names
        .iter()
        .find_map(|name| system_for_member_name(name).map(|system| (name.as_str(), system)))
}

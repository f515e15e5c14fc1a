//! Console system catalogue

use std::fmt;

/// Game systems the identifier can report
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SystemId {
    Nes,
    Snes,
    N64,
    GameBoy,
    GameBoyColor,
    GameBoyAdvance,
    NintendoDs,
    Nintendo3ds,
    GameCube,
    Wii,
    Switch,
    MasterSystem,
    GameGear,
    Genesis,
    Sega32x,
    SegaCd,
    Saturn,
    Dreamcast,
    PlayStation,
    PlayStation2,
    PlayStation3,
    ThreeDo,
    CdI,
    PcEngine,
    Atari2600,
    Atari7800,
    AtariLynx,
    AtariJaguar,
    NeoGeoPocket,
    WonderSwan,
    ColecoVision,
}

impl SystemId {
    /// Every system, in catalogue order
    pub const ALL: &'static [SystemId] = &[
        Self::Nes,
        Self::Snes,
        Self::N64,
        Self::GameBoy,
        Self::GameBoyColor,
        Self::GameBoyAdvance,
        Self::NintendoDs,
        Self::Nintendo3ds,
        Self::GameCube,
        Self::Wii,
        Self::Switch,
        Self::MasterSystem,
        Self::GameGear,
        Self::Genesis,
        Self::Sega32x,
        Self::SegaCd,
        Self::Saturn,
        Self::Dreamcast,
        Self::PlayStation,
        Self::PlayStation2,
        Self::PlayStation3,
        Self::ThreeDo,
        Self::CdI,
        Self::PcEngine,
        Self::Atari2600,
        Self::Atari7800,
        Self::AtariLynx,
        Self::AtariJaguar,
        Self::NeoGeoPocket,
        Self::WonderSwan,
        Self::ColecoVision,
    ];

    /// Stable short identifier used by catalogues and log lines
    pub fn slug(&self) -> &'static str {
        match self {
            Self::Nes => "nes",
            Self::Snes => "snes",
            Self::N64 => "n64",
            Self::GameBoy => "gb",
            Self::GameBoyColor => "gbc",
            Self::GameBoyAdvance => "gba",
            Self::NintendoDs => "nds",
            Self::Nintendo3ds => "3ds",
            Self::GameCube => "gc",
            Self::Wii => "wii",
            Self::Switch => "switch",
            Self::MasterSystem => "mastersystem",
            Self::GameGear => "gamegear",
            Self::Genesis => "genesis",
            Self::Sega32x => "sega32x",
            Self::SegaCd => "segacd",
            Self::Saturn => "saturn",
            Self::Dreamcast => "dreamcast",
            Self::PlayStation => "psx",
            Self::PlayStation2 => "ps2",
            Self::PlayStation3 => "ps3",
            Self::ThreeDo => "3do",
            Self::CdI => "cdi",
            Self::PcEngine => "pcengine",
            Self::Atari2600 => "atari2600",
            Self::Atari7800 => "atari7800",
            Self::AtariLynx => "atarilynx",
            Self::AtariJaguar => "atarijaguar",
            Self::NeoGeoPocket => "neogeopocket",
            Self::WonderSwan => "wonderswan",
            Self::ColecoVision => "colecovision",
        }
    }

    /// Get the display name for this system
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Nes => "Nintendo Entertainment System",
            Self::Snes => "Super Nintendo",
            Self::N64 => "Nintendo 64",
            Self::GameBoy => "Game Boy",
            Self::GameBoyColor => "Game Boy Color",
            Self::GameBoyAdvance => "Game Boy Advance",
            Self::NintendoDs => "Nintendo DS",
            Self::Nintendo3ds => "Nintendo 3DS",
            Self::GameCube => "GameCube",
            Self::Wii => "Wii",
            Self::Switch => "Nintendo Switch",
            Self::MasterSystem => "Sega Master System",
            Self::GameGear => "Sega Game Gear",
            Self::Genesis => "Sega Genesis / Mega Drive",
            Self::Sega32x => "Sega 32X",
            Self::SegaCd => "Sega CD / Mega-CD",
            Self::Saturn => "Sega Saturn",
            Self::Dreamcast => "Sega Dreamcast",
            Self::PlayStation => "PlayStation",
            Self::PlayStation2 => "PlayStation 2",
            Self::PlayStation3 => "PlayStation 3",
            Self::ThreeDo => "3DO Interactive Multiplayer",
            Self::CdI => "Philips CD-i",
            Self::PcEngine => "PC Engine CD / TurboGrafx-CD",
            Self::Atari2600 => "Atari 2600",
            Self::Atari7800 => "Atari 7800",
            Self::AtariLynx => "Atari Lynx",
            Self::AtariJaguar => "Atari Jaguar",
            Self::NeoGeoPocket => "Neo Geo Pocket",
            Self::WonderSwan => "WonderSwan",
            Self::ColecoVision => "ColecoVision",
        }
    }

    /// Look up a system by its slug (case-insensitive)
    pub fn from_slug(slug: &str) -> Option<Self> {
        let slug = slug.trim().to_lowercase();
        Self::ALL.iter().copied().find(|s| s.slug() == slug)
    }
}

impl fmt::Display for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.slug())
    }
}

//! End-to-end identification over synthetic images.
//!
//! Images are built in memory by `common`: ISO 9660 volumes with a root
//! directory and a SYSTEM.CNF, wrapped in CHD v5 containers with each
//! supported codec, plus zip archives written to temp files.
//!
//! Run with: cargo test --test identify_e2e

mod common;

use std::io::Write;

use common::{build_chd, build_iso, init_logging, playstation_iso, saturn_disc, ChdSpec, Codec, IsoFile, SECTOR};
use disc_identify::disc::chd::{ContainerHeader, HunkMapDecoder, WindowStop};
use disc_identify::disc::{ConfidenceLevel, MemorySource, RangeSource};
use disc_identify::{Confidence, ConfidencePath, Identification, IdentifyConfig, Identifier, SystemId};

const PS2_CNF: &str = "BOOT2 = cdrom0:\\SLUS_123.45;1\r\nVER = 1.00\r\nVMODE = NTSC\r\n";
const PSX_CNF: &str = "BOOT = cdrom:\\SLUS_000.01;1\r\nTCB = 4\r\nEVENT = 10\r\n";

fn identify_bytes(data: Vec<u8>) -> Identification {
    init_logging();
    Identifier::default().identify(MemorySource::new(data), None)
}

// ============================================================================
// Test Group A: hunk codecs
// ============================================================================

fn assert_codec_round_trip(codec: Codec) {
    init_logging();
    let logical = saturn_disc();
    let chd = build_chd(&ChdSpec::new(&logical, codec));

    let header = ContainerHeader::parse(&chd).unwrap_or_else(|e| panic!("{codec:?}: header rejected: {e}"));
    let decoder = HunkMapDecoder::new(&header).unwrap_or_else(|e| panic!("{codec:?}: no decoder: {e}"));
    let mut source = MemorySource::new(chd.clone());
    let window = decoder.materialize(&mut source, 128 * 1024);

    assert_eq!(window.stop(), WindowStop::EndOfImage, "{codec:?}");
    assert_eq!(window.as_bytes(), &logical[..], "{codec:?}");
    assert_eq!(&window.as_bytes()[..16], &logical[..16], "{codec:?}");

    let result = identify_bytes(chd);
    assert_eq!(result.classification.system, Some(SystemId::Saturn), "{codec:?}: {:?}", result.trail);
    assert_eq!(result.classification.confidence, Some(Confidence::Definitive));
}

#[test]
fn test_deflate_hunks() {
    assert_codec_round_trip(Codec::Deflate);
}

#[test]
fn test_lzma_hunks() {
    assert_codec_round_trip(Codec::Lzma);
}

#[test]
fn test_headerless_lzma_hunks() {
    assert_codec_round_trip(Codec::RawLzma);
}

#[test]
fn test_zstd_hunks() {
    assert_codec_round_trip(Codec::Zstd);
}

#[test]
fn test_stored_hunks() {
    assert_codec_round_trip(Codec::Stored);
}

#[test]
fn test_uncompressed_hunks() {
    assert_codec_round_trip(Codec::Uncompressed);
}

#[test]
fn test_unpadded_final_hunk_is_truncated() {
    let mut logical = saturn_disc();
    logical.truncate(5 * SECTOR + 100);
    let chd = build_chd(&ChdSpec::new(&logical, Codec::Zstd));

    let header = ContainerHeader::parse(&chd).unwrap();
    assert_eq!(header.hunk_count, 2);
    let window = HunkMapDecoder::new(&header)
        .unwrap()
        .materialize(&mut MemorySource::new(chd), 128 * 1024);
    assert_eq!(window.len(), logical.len());
    assert_eq!(window.hunks_decoded(), 2);
}

// ============================================================================
// Test Group B: PlayStation boot files
// ============================================================================

#[test]
fn test_raw_ps2_iso() {
    let result = identify_bytes(playstation_iso(PS2_CNF));
    let c = result.classification;
    assert_eq!(c.system, Some(SystemId::PlayStation2));
    assert_eq!(c.path, ConfidencePath::VolumeDescriptor);
    assert_eq!(c.confidence, Some(Confidence::Definitive));
    assert_eq!(result.diagnostic.as_deref(), Some("SYSTEM.CNF BOOT2"));
}

#[test]
fn test_raw_psx_iso() {
    let result = identify_bytes(playstation_iso(PSX_CNF));
    assert_eq!(result.classification.slug(), Some("psx"));
    assert_eq!(result.classification.confidence, Some(Confidence::Definitive));
}

#[test]
fn test_chd_ps2_iso() {
    for codec in [Codec::Deflate, Codec::Zstd, Codec::Lzma] {
        let iso = playstation_iso(PS2_CNF);
        let result = identify_bytes(build_chd(&ChdSpec::new(&iso, codec)));
        assert_eq!(
            result.classification.system,
            Some(SystemId::PlayStation2),
            "{codec:?}: {:?}",
            result.trail
        );
        assert_eq!(result.classification.path, ConfidencePath::VolumeDescriptor);
    }
}

#[test]
fn test_missing_boot_file_uses_descriptor() {
    let iso = build_iso("PLAYSTATION", "SONY COMPUTER ENTERTAINMENT", &[], 24);
    let result = identify_bytes(iso);
    assert_eq!(result.classification.system, Some(SystemId::PlayStation));
    assert_eq!(
        result.classification.confidence,
        Some(Confidence::Heuristic(ConfidenceLevel::Low))
    );
}

#[test]
fn test_boot_file_past_head_widens_raw_window() {
    // SYSTEM.CNF at sector 70 lies past the 128 KiB head
    let iso = build_iso(
        "PLAYSTATION",
        "",
        &[IsoFile {
            name: "SYSTEM.CNF;1",
            sector: 70,
            data: PS2_CNF.as_bytes(),
        }],
        72,
    );
    let result = identify_bytes(iso);
    assert_eq!(result.classification.system, Some(SystemId::PlayStation2), "{:?}", result.trail);
    assert_eq!(result.classification.confidence, Some(Confidence::Definitive));
    assert!(result.trail.iter().any(|s| s.contains("widened")), "{:?}", result.trail);
}

#[test]
fn test_boot_file_past_budget_widens_chd_window() {
    let iso = build_iso(
        "PLAYSTATION",
        "",
        &[IsoFile {
            name: "SYSTEM.CNF;1",
            sector: 70,
            data: PS2_CNF.as_bytes(),
        }],
        72,
    );
    let result = identify_bytes(build_chd(&ChdSpec::new(&iso, Codec::Uncompressed)));
    assert_eq!(result.classification.system, Some(SystemId::PlayStation2), "{:?}", result.trail);
    assert!(result.trail.iter().any(|s| s.contains("widened")), "{:?}", result.trail);
}

#[test]
fn test_widening_respects_ceiling() {
    init_logging();
    let iso = build_iso(
        "PLAYSTATION",
        "",
        &[IsoFile {
            name: "SYSTEM.CNF;1",
            sector: 70,
            data: PS2_CNF.as_bytes(),
        }],
        72,
    );
    let config = IdentifyConfig {
        max_window_bytes: 0x20000,
        ..IdentifyConfig::default()
    };
    let result = Identifier::new(config).identify(MemorySource::new(iso), None);

    // Falls back to the descriptor default
    assert_eq!(result.classification.system, Some(SystemId::PlayStation));
    assert_eq!(
        result.classification.confidence,
        Some(Confidence::Heuristic(ConfidenceLevel::Low))
    );
    assert!(result.trail.iter().any(|s| s.contains("ceiling")), "{:?}", result.trail);
}

/// Remote source that returns at most 64 KiB per request
fn capped_remote(image: Vec<u8>) -> RangeSource<impl FnMut(u64, usize) -> std::io::Result<Vec<u8>>> {
    RangeSource::new(move |offset: u64, length: usize| {
        let start = usize::try_from(offset).unwrap_or(usize::MAX).min(image.len());
        let end = (start + length.min(0x10000)).min(image.len());
        Ok(image[start..end].to_vec())
    })
}

#[test]
fn test_capped_replies_still_reach_boot_file() {
    init_logging();
    let iso = build_iso(
        "PLAYSTATION",
        "",
        &[IsoFile {
            name: "SYSTEM.CNF;1",
            sector: 40,
            data: PS2_CNF.as_bytes(),
        }],
        44,
    );
    let result = Identifier::default().identify(capped_remote(iso), None);

    assert_eq!(result.classification.system, Some(SystemId::PlayStation2), "{:?}", result.trail);
    assert_eq!(result.classification.confidence, Some(Confidence::Definitive));
}

#[test]
fn test_capped_replies_widen_past_head() {
    init_logging();
    let iso = build_iso(
        "PLAYSTATION",
        "",
        &[IsoFile {
            name: "SYSTEM.CNF;1",
            sector: 70,
            data: PS2_CNF.as_bytes(),
        }],
        72,
    );
    let config = IdentifyConfig {
        head_bytes: 0x10000,
        ..IdentifyConfig::default()
    };
    let result = Identifier::new(config).identify(capped_remote(iso), None);

    assert_eq!(result.classification.system, Some(SystemId::PlayStation2), "{:?}", result.trail);
    assert!(result.trail.iter().any(|s| s.contains("widened")), "{:?}", result.trail);
}

// ============================================================================
// Test Group C: track metadata fallback
// ============================================================================

#[test]
fn test_unsupported_codec_falls_back_to_metadata() {
    let iso = playstation_iso(PSX_CNF);
    let spec = ChdSpec {
        tracks: &["TRACK:1 TYPE:MODE2_RAW SUBTYPE:NONE FRAMES:9000"],
        ..ChdSpec::new(&iso, Codec::Opaque(*b"cdlz"))
    };
    let result = identify_bytes(build_chd(&spec));

    let c = result.classification;
    assert_eq!(c.system, Some(SystemId::PlayStation), "{:?}", result.trail);
    assert_eq!(c.path, ConfidencePath::TrackMetadata);
    assert_eq!(c.confidence, Some(Confidence::Definitive));
    assert!(result.trail.iter().any(|s| s.contains("cdlz")), "{:?}", result.trail);
}

#[test]
fn test_no_declared_codecs_falls_back_to_metadata() {
    let logical = vec![0u8; 8 * SECTOR];
    let spec = ChdSpec {
        tracks: &["TRACK:1 TYPE:MODE2_RAW SUBTYPE:NONE FRAMES:100"],
        ..ChdSpec::new(&logical, Codec::Undeclared)
    };
    let result = identify_bytes(build_chd(&spec));
    assert_eq!(result.classification.path, ConfidencePath::TrackMetadata);
    assert_eq!(result.classification.slug(), Some("psx"));
}

#[test]
fn test_mode1_tracks_are_ambiguous() {
    let logical = vec![0u8; 8 * SECTOR];
    let spec = ChdSpec {
        tracks: &[
            "TRACK:1 TYPE:MODE1_RAW SUBTYPE:NONE FRAMES:5000",
            "TRACK:2 TYPE:AUDIO SUBTYPE:NONE FRAMES:3000",
        ],
        ..ChdSpec::new(&logical, Codec::Opaque(*b"cdzl"))
    };
    let result = identify_bytes(build_chd(&spec));
    assert!(!result.classification.is_identified());
    assert_eq!(result.classification.path, ConfidencePath::None);
    assert!(result.trail.iter().any(|s| s.contains("ambiguous")), "{:?}", result.trail);
}

#[test]
fn test_all_audio_tracks_are_3do() {
    let logical = vec![0u8; 8 * SECTOR];
    let spec = ChdSpec {
        tracks: &[
            "TRACK:1 TYPE:AUDIO SUBTYPE:NONE FRAMES:5000",
            "TRACK:2 TYPE:AUDIO SUBTYPE:NONE FRAMES:3000",
        ],
        ..ChdSpec::new(&logical, Codec::Opaque(*b"cdfl"))
    };
    let result = identify_bytes(build_chd(&spec));
    assert_eq!(result.classification.system, Some(SystemId::ThreeDo));
    assert_eq!(
        result.classification.confidence,
        Some(Confidence::Heuristic(ConfidenceLevel::Medium))
    );
}

// ============================================================================
// Test Group D: degenerate and bounded input
// ============================================================================

#[test]
fn test_degenerate_header_is_unknown() {
    let logical = saturn_disc();
    let mut chd = build_chd(&ChdSpec::new(&logical, Codec::Zstd));
    chd[56..60].copy_from_slice(&0u32.to_be_bytes());

    let result = identify_bytes(chd);
    assert!(!result.classification.is_identified());
    assert!(result.trail.iter().any(|s| s.contains("rejected")), "{:?}", result.trail);
}

#[test]
fn test_identification_is_repeatable() {
    let iso = playstation_iso(PS2_CNF);
    let chd = build_chd(&ChdSpec::new(&iso, Codec::Deflate));
    let identifier = Identifier::default();

    let first = identifier.identify(MemorySource::new(chd.clone()), None);
    let second = identifier.identify(MemorySource::new(chd), None);
    assert_eq!(first, second);
}

#[test]
fn test_source_budget_limits_reads() {
    init_logging();
    let config = IdentifyConfig {
        head_bytes: 0x1000,
        max_source_bytes: 0x1000,
        ..IdentifyConfig::default()
    };
    let result = Identifier::new(config).identify(MemorySource::new(playstation_iso(PS2_CNF)), None);
    assert!(!result.classification.is_identified());
}

#[test]
fn test_expired_deadline_reads_nothing() {
    init_logging();
    let config = IdentifyConfig {
        read_timeout_secs: Some(0),
        ..IdentifyConfig::default()
    };
    let result = Identifier::new(config).identify(MemorySource::new(saturn_disc()), None);
    assert!(!result.classification.is_identified());
    assert_eq!(result.trail[0], "read 0 byte head");
}

#[test]
fn test_range_source_failures_are_not_errors() {
    let source = RangeSource::new(|_offset, _length| {
        Err(std::io::Error::new(std::io::ErrorKind::ConnectionReset, "peer went away"))
    });
    let result = Identifier::default().identify(source, None);
    assert!(!result.classification.is_identified());
}

// ============================================================================
// Test Group E: image size
// ============================================================================

#[test]
fn test_large_raw_psx_image_is_ps2() {
    let source = MemorySource::new(playstation_iso(PSX_CNF)).with_size_hint(2_000_000_000);
    let result = Identifier::default().identify(source, None);

    let c = result.classification;
    assert_eq!(c.system, Some(SystemId::PlayStation2));
    assert_eq!(c.confidence, Some(Confidence::Heuristic(ConfidenceLevel::High)));
}

#[test]
fn test_large_chd_psx_image_is_ps2() {
    let mut iso = playstation_iso(PSX_CNF);
    iso.resize(0x20000, 0);
    let spec = ChdSpec {
        declared_logical: Some(2_000_000_000),
        ..ChdSpec::new(&iso, Codec::Zstd)
    };
    let result = identify_bytes(build_chd(&spec));
    assert_eq!(result.classification.system, Some(SystemId::PlayStation2), "{:?}", result.trail);
    assert!(result.trail.iter().any(|s| s.contains("promoting")), "{:?}", result.trail);
}

#[test]
fn test_small_psx_image_is_unchanged() {
    let source = MemorySource::new(playstation_iso(PSX_CNF)).with_size_hint(700_000_000);
    let result = Identifier::default().identify(source, None);
    assert_eq!(result.classification.system, Some(SystemId::PlayStation));
}

// ============================================================================
// Test Group F: files and archives
// ============================================================================

fn write_zip(members: &[(&str, &[u8])]) -> tempfile::NamedTempFile {
    let file = tempfile::Builder::new().suffix(".zip").tempfile().unwrap();
    let mut writer = zip::ZipWriter::new(file.reopen().unwrap());
    for (name, data) in members {
        writer
            .start_file(*name, zip::write::SimpleFileOptions::default())
            .unwrap();
        writer.write_all(data).unwrap();
    }
    writer.finish().unwrap();
    file
}

#[test]
fn test_identify_iso_file() {
    init_logging();
    let mut file = tempfile::Builder::new().suffix(".iso").tempfile().unwrap();
    file.write_all(&playstation_iso(PS2_CNF)).unwrap();
    file.flush().unwrap();

    let result = Identifier::default().identify_path(file.path()).unwrap();
    assert_eq!(result.classification.system, Some(SystemId::PlayStation2));
}

#[test]
fn test_identify_missing_file_is_error() {
    let result = Identifier::default().identify_path(std::path::Path::new("/nonexistent/game.iso"));
    assert!(result.is_err());
}

#[test]
fn test_zip_member_name_decides() {
    init_logging();
    let zip = write_zip(&[("readme.txt", b"hi"), ("Metroid Fusion (USA).gba", &[0u8; 256])]);

    let result = Identifier::default().identify_path(zip.path()).unwrap();
    assert_eq!(result.classification.system, Some(SystemId::GameBoyAdvance));
    assert_eq!(result.classification.path, ConfidencePath::ArchiveMember);
}

#[test]
fn test_zip_disc_member_is_read() {
    init_logging();
    let iso = playstation_iso(PS2_CNF);
    let zip = write_zip(&[("Game (USA).iso", &iso)]);

    let result = Identifier::default().identify_path(zip.path()).unwrap();
    assert_eq!(result.classification.system, Some(SystemId::PlayStation2), "{:?}", result.trail);
    assert_eq!(result.classification.path, ConfidencePath::VolumeDescriptor);
}

#[test]
fn test_zip_without_candidates_is_unknown() {
    init_logging();
    let zip = write_zip(&[("readme.txt", b"nothing to see")]);
    let result = Identifier::default().identify_path(zip.path()).unwrap();
    assert!(!result.classification.is_identified());
}

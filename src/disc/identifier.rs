//! System identification from image prefixes
//!
//! [`Identifier`] runs the fallback ladder over a [`ByteSource`]:
//!
//! 1. archive member name, when the caller has one
//! 2. CHD container: decode a logical window and match signatures, then
//!    fall back to the track metadata chain
//! 3. CISO wrapper: unwrap and match signatures
//! 4. anything else: match signatures on the raw prefix
//!
//! Each step is recorded in the returned trail.

use std::fmt;
use std::path::Path;
use std::time::Instant;

use crate::config::IdentifyConfig;
use crate::disc::archive::{find_named_system, member_names, system_for_member_name, ZipMemberSource};
use crate::disc::chd::{classify_tracks, read_track_metadata, ContainerHeader, HunkMapDecoder, TrackVerdict, WindowStop};
use crate::disc::ciso::CisoImage;
use crate::disc::error::IdentifyResult;
use crate::disc::signature::{match_signature, SignatureMatch};
use crate::disc::source::{BoundedSource, ByteSource, CachedSource, FileSource};
use crate::disc::system::SystemId;

/// Confidence level for heuristic identification
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ConfidenceLevel {
    /// Low confidence - a default or a weak field hint
    Low,
    /// Medium confidence - descriptor field or track layout
    Medium,
    /// High confidence - image size rules out the alternative
    High,
}

impl ConfidenceLevel {
    pub fn display_name(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Medium => "Medium",
            Self::High => "High",
        }
    }
}

/// How certain a classification is
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Confidence {
    /// A format signature or boot token that only one system uses
    Definitive,
    Heuristic(ConfidenceLevel),
}

impl fmt::Display for Confidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Definitive => write!(f, "definitive"),
            Self::Heuristic(level) => write!(f, "heuristic ({})", level.display_name()),
        }
    }
}

/// Which rung of the ladder produced the answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConfidencePath {
    ArchiveMember,
    Signature,
    VolumeDescriptor,
    TrackMetadata,
    None,
}

impl ConfidencePath {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::ArchiveMember => "archive-member",
            Self::Signature => "signature",
            Self::VolumeDescriptor => "volume-descriptor",
            Self::TrackMetadata => "track-metadata",
            Self::None => "none",
        }
    }
}

impl fmt::Display for ConfidencePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The externally visible result
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Classification {
    pub system: Option<SystemId>,
    pub path: ConfidencePath,
    pub confidence: Option<Confidence>,
}

impl Classification {
    /// Nothing matched; callers leave the image uncategorized
    pub fn unknown() -> Self {
        Self {
            system: None,
            path: ConfidencePath::None,
            confidence: None,
        }
    }

    pub fn slug(&self) -> Option<&'static str> {
        self.system.map(|s| s.slug())
    }

    pub fn is_identified(&self) -> bool {
        self.system.is_some()
    }
}

/// Classification plus the reasoning behind it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identification {
    pub classification: Classification,
    /// The check that decided, when one did
    pub diagnostic: Option<String>,
    /// Every ladder step, in order
    pub trail: Vec<String>,
}

/// A rung's answer before the size rule is applied
#[derive(Debug, Clone)]
struct Hit {
    system: SystemId,
    confidence: Confidence,
    path: ConfidencePath,
    rule: String,
}

impl From<SignatureMatch> for Hit {
    fn from(m: SignatureMatch) -> Self {
        Self {
            system: m.system,
            confidence: m.confidence,
            path: m.path,
            rule: m.rule.to_string(),
        }
    }
}

#[derive(Debug, Default)]
struct Trail(Vec<String>);

impl Trail {
    fn step(&mut self, message: impl Into<String>) {
        let message = message.into();
        log::debug!("{}", message);
        self.0.push(message);
    }
}

/// Runs the identification ladder
///
/// Holds only configuration; one instance can serve any number of calls,
/// from any number of threads.
#[derive(Debug, Clone, Default)]
pub struct Identifier {
    config: IdentifyConfig,
}

impl Identifier {
    pub fn new(config: IdentifyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &IdentifyConfig {
        &self.config
    }

    /// Identify the image behind `source`
    ///
    /// `member_hint` is the file name of the image inside an archive, if it
    /// came from one. Never fails: anything that goes wrong is a step in the
    /// trail and the classification is left empty.
    pub fn identify<S: ByteSource>(&self, source: S, member_hint: Option<&str>) -> Identification {
        let mut trail = Trail::default();

        if let Some(hint) = member_hint {
            if let Some(identification) = self.identify_member_name(hint, &mut trail) {
                return identification;
            }
        }

        let image_size = source.size_hint();
        let mut bounded = BoundedSource::new(source, self.config.max_source_bytes);
        if let Some(timeout) = self.config.read_timeout() {
            bounded = bounded.with_deadline(Instant::now() + timeout);
        }
        let mut source = CachedSource::new(bounded, self.config.head_bytes);
        let head = source.head().to_vec();
        trail.step(format!("read {} byte head", head.len()));

        let (hit, image_size) = if ContainerHeader::is_container(&head) {
            self.identify_container(&mut source, &head, &mut trail)
        } else if CisoImage::is_ciso(&head) {
            (self.identify_ciso(&head, &mut trail), image_size)
        } else {
            (self.identify_raw(&mut source, head, &mut trail), image_size)
        };

        let hit = hit.map(|hit| self.apply_size_rule(hit, image_size, &mut trail));
        self.finish(hit, trail)
    }

    /// Identify a local file; zip archives are looked into
    pub fn identify_path(&self, path: &Path) -> IdentifyResult<Identification> {
        let is_zip = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("zip"));

        if !is_zip {
            let source = FileSource::open(path)?;
            return Ok(self.identify(source, None));
        }

        let names = member_names(path)?;
        if let Some((name, _)) = find_named_system(&names) {
            let mut trail = Trail::default();
            if let Some(identification) = self.identify_member_name(name, &mut trail) {
                return Ok(identification);
            }
        }

        match ZipMemberSource::open_first_candidate(path, self.config.max_source_bytes)? {
            Some(member) => {
                let hint = member.name().to_string();
                Ok(self.identify(member, Some(&hint)))
            }
            None => {
                let mut trail = Trail::default();
                trail.step(format!("{}: no ROM or disc member", path.display()));
                Ok(self.finish(None, trail))
            }
        }
    }

    fn identify_member_name(&self, name: &str, trail: &mut Trail) -> Option<Identification> {
        match system_for_member_name(name) {
            Some(system) => {
                trail.step(format!("archive member '{}' names {}", name, system));
                let hit = Hit {
                    system,
                    confidence: Confidence::Definitive,
                    path: ConfidencePath::ArchiveMember,
                    rule: format!("member name {}", name),
                };
                Some(self.finish(Some(hit), std::mem::take(trail)))
            }
            None => {
                trail.step(format!("archive member '{}' not conclusive", name));
                None
            }
        }
    }

    fn identify_container<S: ByteSource + ?Sized>(
        &self,
        source: &mut S,
        head: &[u8],
        trail: &mut Trail,
    ) -> (Option<Hit>, Option<u64>) {
        let header = match ContainerHeader::parse(head) {
            Ok(header) => header,
            Err(e) => {
                trail.step(format!("container header rejected: {}", e));
                return (None, None);
            }
        };

        let codecs: Vec<String> = header.declared_codecs().map(|c| c.to_string()).collect();
        trail.step(format!(
            "CHD v{}: {} logical bytes, {} byte hunks, codecs [{}]",
            header.version,
            header.logical_bytes,
            header.hunk_bytes,
            codecs.join(", ")
        ));
        if header.has_parent() {
            trail.step("delta image; parent hunks are not available");
        }
        let image_size = Some(header.logical_bytes);

        match HunkMapDecoder::new(&header) {
            Ok(decoder) => {
                let window = decoder.materialize(source, self.config.window_bytes);
                trail.step(format!(
                    "decoded {} bytes from {} hunks ({})",
                    window.len(),
                    window.hunks_decoded(),
                    window.stop()
                ));

                match match_signature(window.as_bytes()) {
                    Ok(found) => {
                        let found = match self.widen_target(&found, window.len(), trail) {
                            Some(wanted) if window.stop() == WindowStop::BudgetReached => {
                                let window = decoder.extend(source, window, wanted);
                                trail.step(format!("widened window to {} bytes ({})", window.len(), window.stop()));
                                match_signature(window.as_bytes()).unwrap_or(found)
                            }
                            _ => found,
                        };
                        trail.step(format!("signature '{}' matched {}", found.rule, found.system));
                        return (Some(found.into()), image_size);
                    }
                    Err(e) => trail.step(format!("window signature: {}", e)),
                }
            }
            Err(e) => trail.step(format!("hunks not decodable: {}", e)),
        }

        let tracks = read_track_metadata(source, header.meta_offset, self.config.metadata_limits());
        trail.step(format!("{} track records in metadata", tracks.len()));

        let hit = match classify_tracks(&tracks) {
            TrackVerdict::Match {
                system,
                confidence,
                rule,
            } => {
                trail.step(format!("track layout '{}' matched {}", rule, system));
                Some(Hit {
                    system,
                    confidence,
                    path: ConfidencePath::TrackMetadata,
                    rule: rule.to_string(),
                })
            }
            TrackVerdict::Ambiguous { candidates } => {
                let names: Vec<_> = candidates.iter().map(|s| s.slug()).collect();
                trail.step(format!("track 1 MODE1 is ambiguous: {}", names.join(", ")));
                None
            }
            TrackVerdict::Unknown => {
                trail.step("track layout not recognized");
                None
            }
        };

        (hit, image_size)
    }

    fn identify_ciso(&self, head: &[u8], trail: &mut Trail) -> Option<Hit> {
        let Some(image) = CisoImage::parse(head) else {
            trail.step("CISO wrapper rejected");
            return None;
        };
        trail.step(format!(
            "CISO wrapper, {} byte blocks, block 0 {}",
            image.block_size,
            if image.first_block_present { "present" } else { "absent" }
        ));

        match match_signature(image.logical_prefix()) {
            Ok(found) => {
                trail.step(format!("signature '{}' matched {}", found.rule, found.system));
                Some(found.into())
            }
            Err(e) => {
                trail.step(format!("CISO payload signature: {}", e));
                None
            }
        }
    }

    fn identify_raw<S: ByteSource + ?Sized>(
        &self,
        source: &mut S,
        mut window: Vec<u8>,
        trail: &mut Trail,
    ) -> Option<Hit> {
        let found = match match_signature(&window) {
            Ok(found) => found,
            Err(e) => {
                trail.step(format!("raw signature: {}", e));
                return None;
            }
        };

        let found = match self.widen_target(&found, window.len(), trail) {
            Some(wanted) => match source.read_at(window.len() as u64, wanted - window.len()) {
                Ok(more) if more.is_empty() => {
                    trail.step(format!("image ends at {} bytes, before the wanted {}", window.len(), wanted));
                    found
                }
                Ok(more) => {
                    window.extend_from_slice(&more);
                    trail.step(format!("widened window to {} bytes", window.len()));
                    match_signature(&window).unwrap_or(found)
                }
                Err(e) => {
                    trail.step(format!("widening read failed: {}", e));
                    found
                }
            },
            None => found,
        };

        trail.step(format!("signature '{}' matched {}", found.rule, found.system));
        Some(found.into())
    }

    /// Window size to retry with, if the match asks for more and the
    /// ceiling allows it
    fn widen_target(&self, found: &SignatureMatch, current: usize, trail: &mut Trail) -> Option<usize> {
        let wanted = found.wanted_bytes.filter(|w| *w > current)?;
        if wanted > self.config.max_window_bytes {
            trail.step(format!(
                "'{}' needs {} bytes, beyond the {} byte ceiling",
                found.rule, wanted, self.config.max_window_bytes
            ));
            return None;
        }
        Some(wanted)
    }

    /// PlayStation media is CD-only; anything over the threshold is a DVD
    fn apply_size_rule(&self, hit: Hit, image_size: Option<u64>, trail: &mut Trail) -> Hit {
        match image_size {
            Some(size) if hit.system == SystemId::PlayStation && size > self.config.large_image_bytes => {
                trail.step(format!(
                    "{} byte image exceeds CD capacity, promoting psx to ps2",
                    size
                ));
                Hit {
                    system: SystemId::PlayStation2,
                    confidence: Confidence::Heuristic(ConfidenceLevel::High),
                    path: hit.path,
                    rule: format!("{}, image size", hit.rule),
                }
            }
            _ => hit,
        }
    }

    fn finish(&self, hit: Option<Hit>, trail: Trail) -> Identification {
        let identification = match hit {
            Some(hit) => Identification {
                classification: Classification {
                    system: Some(hit.system),
                    path: hit.path,
                    confidence: Some(hit.confidence),
                },
                diagnostic: Some(hit.rule),
                trail: trail.0,
            },
            None => Identification {
                classification: Classification::unknown(),
                diagnostic: None,
                trail: trail.0,
            },
        };

        let c = &identification.classification;
        match c.system {
            Some(system) => log::info!(
                "Identified {} via {} ({})",
                system.display_name(),
                c.path,
                c.confidence.map(|c| c.to_string()).unwrap_or_default()
            ),
            None => log::debug!("No system identified after {} steps", identification.trail.len()),
        }

        identification
    }
}

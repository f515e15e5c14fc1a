//! CHD (Compressed Hunks of Data) v5 container support
//!
//! Only as much of the container is decoded as identification needs: the
//! header, a prefix of the logical image, and the track metadata chain.

pub mod codec;
pub mod header;
pub mod map;
pub mod metadata;

pub use codec::{decode_hunk, CodecError, CodecTag};
pub use header::{ContainerHeader, CHD_MAGIC, CHD_V5_HEADER_SIZE};
pub use map::{HunkMapDecoder, HunkMapEntry, HunkSelector, LogicalWindow, WindowStop, MAP_ENTRY_SIZE};
pub use metadata::{
    classify_tracks, parse_track_record, read_track_metadata, MetadataLimits, TrackDescriptor,
    TrackSubtype, TrackType, TrackVerdict,
};

//! Notation data model: the root aggregate produced by extraction and
//! consumed by the container codec.

use serde::{Deserialize, Serialize};

use crate::channel::{expansion_chip_list, ChannelType, RegisterSnapshot};

/// NSF region; determines frame rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Region {
    Ntsc,
    Pal,
}

impl Region {
    pub fn frame_rate(self) -> u32 {
        match self {
            Region::Ntsc => 60,
            Region::Pal => 50,
        }
    }
}

/// File-level metadata, shared by every song in a `NotationFile`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub artist: String,
    #[serde(default)]
    pub copyright: String,
    #[serde(default = "default_region")]
    pub region: Region,
    #[serde(default = "default_frame_rate")]
    pub frame_rate: u32,
    #[serde(default)]
    pub expansion: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expansion_chips: Option<Vec<String>>,
}

fn default_region() -> Region {
    Region::Ntsc
}

fn default_frame_rate() -> u32 {
    60
}

impl Default for Metadata {
    fn default() -> Self {
        Metadata {
            title: String::new(),
            artist: String::new(),
            copyright: String::new(),
            region: Region::Ntsc,
            frame_rate: 60,
            expansion: 0,
            expansion_chips: None,
        }
    }
}

impl Metadata {
    /// The decoded chip-name list, recomputing from `expansion` if absent.
    pub fn resolved_expansion_chips(&self) -> Vec<String> {
        self.expansion_chips
            .clone()
            .unwrap_or_else(|| expansion_chip_list(self.expansion))
    }
}

/// An inferred musical event on a single channel.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Trigger,
    Release,
    Stop,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NoteEvent {
    pub frame: u32,
    pub event: EventKind,
    pub note: u8,
    pub octave: u8,
    pub pitch: i32,
    pub volume: u8,
    #[serde(default)]
    pub duty_cycle: u8,
    #[serde(default)]
    pub instrument: Option<u8>,
}

impl NoteEvent {
    /// `octave = (note - 1) div 12`.
    pub fn octave_for(note: u8) -> u8 {
        note.saturating_sub(1) / 12
    }
}

/// Pointer into the container's binary chunk for one channel's raw frames.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawDataRef {
    pub byte_offset: u32,
    pub byte_length: u32,
    pub frame_size: u32,
    pub struct_format: String,
}

/// Per-channel notation: inferred events plus the raw per-frame register
/// trace that produced them.
#[derive(Debug, Clone, PartialEq)]
pub struct ChannelData {
    pub channel_id: u8,
    pub channel_type: ChannelType,
    pub channel_name: String,
    pub notes: Vec<NoteEvent>,
    pub raw_frames: Vec<RegisterSnapshot>,
}

impl ChannelData {
    pub fn new(channel_id: u8, channel_type: ChannelType, channel_name: impl Into<String>) -> Self {
        ChannelData {
            channel_id,
            channel_type,
            channel_name: channel_name.into(),
            notes: Vec::new(),
            raw_frames: Vec::new(),
        }
    }
}

/// One NSF track.
#[derive(Debug, Clone, PartialEq)]
pub struct SongData {
    pub index: u32,
    pub name: String,
    pub num_frames: u32,
    pub pattern_length: u32,
    pub channels: Vec<ChannelData>,
}

pub const DEFAULT_PATTERN_LENGTH: u32 = 256;

impl SongData {
    /// Track name falls back to `"Track {index}"` when the NSF-reported name
    /// is blank.
    pub fn resolve_name(index: u32, raw_name: &str) -> String {
        if raw_name.is_empty() {
            format!("Track {index}")
        } else {
            raw_name.to_string()
        }
    }
}

/// Root aggregate of a single extraction.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct NotationFile {
    pub metadata: Metadata,
    pub songs: Vec<SongData>,
}

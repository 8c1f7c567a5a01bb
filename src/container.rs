//! Reads and writes the `.nsfn` binary format — a versioned header, a JSON
//! metadata/notes document, and a packed binary chunk holding every
//! channel's raw per-frame register trace.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use serde::{Deserialize, Serialize};
use std::io::Cursor;

use crate::channel::{ChannelType, RegisterSnapshot};
use crate::error::{NotationError, Result};
use crate::notation::{ChannelData, Metadata, NoteEvent, NotationFile, RawDataRef, SongData};

const MAGIC: &[u8; 4] = b"NSFN";
const VERSION: u32 = 1;
const HEADER_SIZE: usize = 12;

/// The struct-format tag recorded on each [`RawDataRef`], used only as a
/// human-readable record of the layout; decoding dispatches on
/// `channel_type`, not this string.
fn struct_format(t: ChannelType) -> &'static str {
    match t {
        ChannelType::Square | ChannelType::Vrc6Square | ChannelType::Mmc5Square => "<HBB",
        ChannelType::Triangle | ChannelType::Vrc6Saw => "<HB",
        ChannelType::Noise => "<BBB",
        ChannelType::Dpcm => "<HiBBBB",
        ChannelType::Vrc7Fm => "<HBBBBBb",
        ChannelType::Fds => "<HBBHBB",
        ChannelType::Mmc5Dpcm => "<B",
        ChannelType::N163Wave => "<iBBBB",
        ChannelType::S5bSquare => "<HBBBBHBB",
    }
}

fn frame_size(t: ChannelType) -> u32 {
    match t {
        ChannelType::Square | ChannelType::Vrc6Square | ChannelType::Mmc5Square => 4,
        ChannelType::Triangle | ChannelType::Vrc6Saw => 3,
        ChannelType::Noise => 3,
        ChannelType::Dpcm => 10,
        ChannelType::Vrc7Fm => 8,
        ChannelType::Fds => 8,
        ChannelType::Mmc5Dpcm => 1,
        ChannelType::N163Wave => 8,
        ChannelType::S5bSquare => 10,
    }
}

fn pack_frame(buf: &mut Vec<u8>, snapshot: RegisterSnapshot) {
    match snapshot {
        RegisterSnapshot::Square { period, volume, duty }
        | RegisterSnapshot::Vrc6Square { period, volume, duty }
        | RegisterSnapshot::Mmc5Square { period, volume, duty } => {
            buf.write_u16::<LittleEndian>(period).unwrap();
            buf.write_u8(volume).unwrap();
            buf.write_u8(duty).unwrap();
        }
        RegisterSnapshot::Triangle { period, volume } | RegisterSnapshot::Vrc6Saw { period, volume } => {
            buf.write_u16::<LittleEndian>(period).unwrap();
            buf.write_u8(volume).unwrap();
        }
        RegisterSnapshot::Noise { period_idx, volume, mode } => {
            buf.write_u8(period_idx).unwrap();
            buf.write_u8(volume).unwrap();
            buf.write_u8(mode).unwrap();
        }
        RegisterSnapshot::Dpcm {
            sample_len,
            sample_addr,
            pitch,
            looping,
            counter,
            active,
        } => {
            buf.write_u16::<LittleEndian>(sample_len).unwrap();
            buf.write_i32::<LittleEndian>(sample_addr).unwrap();
            buf.write_u8(pitch).unwrap();
            buf.write_u8(looping).unwrap();
            buf.write_u8(counter).unwrap();
            buf.write_u8(active).unwrap();
        }
        RegisterSnapshot::Vrc7Fm {
            period,
            volume,
            patch,
            octave,
            trigger,
            sustain,
            trigger_change,
        } => {
            buf.write_u16::<LittleEndian>(period).unwrap();
            buf.write_u8(volume).unwrap();
            buf.write_u8(patch).unwrap();
            buf.write_u8(octave).unwrap();
            buf.write_u8(trigger).unwrap();
            buf.write_u8(sustain).unwrap();
            buf.write_i8(trigger_change).unwrap();
        }
        RegisterSnapshot::Fds {
            period,
            volume,
            master_volume,
            mod_speed,
            mod_depth,
            pad,
        } => {
            buf.write_u16::<LittleEndian>(period).unwrap();
            buf.write_u8(volume).unwrap();
            buf.write_u8(master_volume).unwrap();
            buf.write_u16::<LittleEndian>(mod_speed).unwrap();
            buf.write_u8(mod_depth).unwrap();
            buf.write_u8(pad).unwrap();
        }
        RegisterSnapshot::Mmc5Dpcm { reserved } => {
            buf.write_u8(reserved).unwrap();
        }
        RegisterSnapshot::N163Wave {
            period,
            volume,
            wave_pos,
            wave_size,
            num_channels,
        } => {
            buf.write_i32::<LittleEndian>(period).unwrap();
            buf.write_u8(volume).unwrap();
            buf.write_u8(wave_pos).unwrap();
            buf.write_u8(wave_size).unwrap();
            buf.write_u8(num_channels).unwrap();
        }
        RegisterSnapshot::S5bSquare {
            period,
            volume,
            mixer,
            noise_freq,
            env_enabled,
            env_freq,
            env_shape,
            env_trigger,
        } => {
            buf.write_u16::<LittleEndian>(period).unwrap();
            buf.write_u8(volume).unwrap();
            buf.write_u8(mixer).unwrap();
            buf.write_u8(noise_freq).unwrap();
            buf.write_u8(env_enabled).unwrap();
            buf.write_u16::<LittleEndian>(env_freq).unwrap();
            buf.write_u8(env_shape).unwrap();
            buf.write_u8(env_trigger).unwrap();
        }
    }
}

fn unpack_frame(cursor: &mut Cursor<&[u8]>, t: ChannelType) -> std::io::Result<RegisterSnapshot> {
    Ok(match t {
        ChannelType::Square => RegisterSnapshot::Square {
            period: cursor.read_u16::<LittleEndian>()?,
            volume: cursor.read_u8()?,
            duty: cursor.read_u8()?,
        },
        ChannelType::Vrc6Square => RegisterSnapshot::Vrc6Square {
            period: cursor.read_u16::<LittleEndian>()?,
            volume: cursor.read_u8()?,
            duty: cursor.read_u8()?,
        },
        ChannelType::Mmc5Square => RegisterSnapshot::Mmc5Square {
            period: cursor.read_u16::<LittleEndian>()?,
            volume: cursor.read_u8()?,
            duty: cursor.read_u8()?,
        },
        ChannelType::Triangle => RegisterSnapshot::Triangle {
            period: cursor.read_u16::<LittleEndian>()?,
            volume: cursor.read_u8()?,
        },
        ChannelType::Vrc6Saw => RegisterSnapshot::Vrc6Saw {
            period: cursor.read_u16::<LittleEndian>()?,
            volume: cursor.read_u8()?,
        },
        ChannelType::Noise => RegisterSnapshot::Noise {
            period_idx: cursor.read_u8()?,
            volume: cursor.read_u8()?,
            mode: cursor.read_u8()?,
        },
        ChannelType::Dpcm => RegisterSnapshot::Dpcm {
            sample_len: cursor.read_u16::<LittleEndian>()?,
            sample_addr: cursor.read_i32::<LittleEndian>()?,
            pitch: cursor.read_u8()?,
            looping: cursor.read_u8()?,
            counter: cursor.read_u8()?,
            active: cursor.read_u8()?,
        },
        ChannelType::Vrc7Fm => RegisterSnapshot::Vrc7Fm {
            period: cursor.read_u16::<LittleEndian>()?,
            volume: cursor.read_u8()?,
            patch: cursor.read_u8()?,
            octave: cursor.read_u8()?,
            trigger: cursor.read_u8()?,
            sustain: cursor.read_u8()?,
            trigger_change: cursor.read_i8()?,
        },
        ChannelType::Fds => RegisterSnapshot::Fds {
            period: cursor.read_u16::<LittleEndian>()?,
            volume: cursor.read_u8()?,
            master_volume: cursor.read_u8()?,
            mod_speed: cursor.read_u16::<LittleEndian>()?,
            mod_depth: cursor.read_u8()?,
            pad: cursor.read_u8()?,
        },
        ChannelType::Mmc5Dpcm => RegisterSnapshot::Mmc5Dpcm {
            reserved: cursor.read_u8()?,
        },
        ChannelType::N163Wave => RegisterSnapshot::N163Wave {
            period: cursor.read_i32::<LittleEndian>()?,
            volume: cursor.read_u8()?,
            wave_pos: cursor.read_u8()?,
            wave_size: cursor.read_u8()?,
            num_channels: cursor.read_u8()?,
        },
        ChannelType::S5bSquare => RegisterSnapshot::S5bSquare {
            period: cursor.read_u16::<LittleEndian>()?,
            volume: cursor.read_u8()?,
            mixer: cursor.read_u8()?,
            noise_freq: cursor.read_u8()?,
            env_enabled: cursor.read_u8()?,
            env_freq: cursor.read_u16::<LittleEndian>()?,
            env_shape: cursor.read_u8()?,
            env_trigger: cursor.read_u8()?,
        },
    })
}

#[derive(Serialize, Deserialize)]
struct WireFile {
    format: String,
    version: u32,
    metadata: Metadata,
    songs: Vec<WireSong>,
}

#[derive(Serialize, Deserialize)]
struct WireSong {
    index: u32,
    name: String,
    num_frames: u32,
    pattern_length: u32,
    channels: Vec<WireChannel>,
}

#[derive(Serialize, Deserialize)]
struct WireChannel {
    channel_id: u8,
    channel_type: String,
    channel_name: String,
    notes: Vec<NoteEvent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    raw_data_ref: Option<RawDataRef>,
}

/// Serializes `file` to the `.nsfn` wire format: a magic header, a compact
/// JSON document, and a packed binary chunk of raw channel frames.
pub fn write(file: &NotationFile) -> Result<Vec<u8>> {
    let mut bin = Vec::new();
    let mut wire_songs = Vec::with_capacity(file.songs.len());

    for song in &file.songs {
        let mut wire_channels = Vec::with_capacity(song.channels.len());
        for ch in &song.channels {
            let raw_data_ref = if ch.raw_frames.is_empty() {
                None
            } else {
                let size = frame_size(ch.channel_type);
                let offset = bin.len() as u32;
                for &snapshot in &ch.raw_frames {
                    pack_frame(&mut bin, snapshot);
                }
                Some(RawDataRef {
                    byte_offset: offset,
                    byte_length: size * ch.raw_frames.len() as u32,
                    frame_size: size,
                    struct_format: struct_format(ch.channel_type).to_string(),
                })
            };
            wire_channels.push(WireChannel {
                channel_id: ch.channel_id,
                channel_type: ch.channel_type.tag().to_string(),
                channel_name: ch.channel_name.clone(),
                notes: ch.notes.clone(),
                raw_data_ref,
            });
        }
        wire_songs.push(WireSong {
            index: song.index,
            name: song.name.clone(),
            num_frames: song.num_frames,
            pattern_length: song.pattern_length,
            channels: wire_channels,
        });
    }

    let wire = WireFile {
        format: "nsfn".to_string(),
        version: VERSION,
        metadata: file.metadata.clone(),
        songs: wire_songs,
    };
    let json = serde_json::to_vec(&wire)?;

    let mut out = Vec::with_capacity(HEADER_SIZE + json.len() + 4 + bin.len());
    out.extend_from_slice(MAGIC);
    out.write_u32::<LittleEndian>(VERSION).unwrap();
    out.write_u32::<LittleEndian>(json.len() as u32).unwrap();
    out.extend_from_slice(&json);
    out.write_u32::<LittleEndian>(bin.len() as u32).unwrap();
    out.extend_from_slice(&bin);
    Ok(out)
}

/// Parses a `.nsfn` buffer back into a [`NotationFile`], validating the
/// header, decoding the JSON document, and unpacking each channel's raw
/// frame data out of the binary chunk.
pub fn read(data: &[u8]) -> Result<NotationFile> {
    if data.len() < HEADER_SIZE {
        return Err(NotationError::Truncated {
            where_: "header",
            need: HEADER_SIZE,
            have: data.len(),
        });
    }
    if &data[0..4] != MAGIC {
        return Err(NotationError::InvalidMagic(data[0..4.min(data.len())].to_vec()));
    }
    let mut header = Cursor::new(&data[4..12]);
    let version = header.read_u32::<LittleEndian>().unwrap();
    if version != VERSION {
        return Err(NotationError::UnsupportedVersion(version));
    }
    let json_len = header.read_u32::<LittleEndian>().unwrap() as usize;

    let json_start = HEADER_SIZE;
    let json_end = json_start + json_len;
    if data.len() < json_end {
        return Err(NotationError::Truncated {
            where_: "json",
            need: json_end,
            have: data.len(),
        });
    }
    let wire: WireFile = serde_json::from_slice(&data[json_start..json_end])?;

    if data.len() < json_end + 4 {
        return Err(NotationError::Truncated {
            where_: "bin_len",
            need: json_end + 4,
            have: data.len(),
        });
    }
    let mut bin_len_cursor = Cursor::new(&data[json_end..json_end + 4]);
    let bin_len = bin_len_cursor.read_u32::<LittleEndian>().unwrap() as usize;
    let bin_start = json_end + 4;
    let bin_end = bin_start + bin_len;
    if data.len() < bin_end {
        return Err(NotationError::Truncated {
            where_: "bin",
            need: bin_end,
            have: data.len(),
        });
    }
    let bin = &data[bin_start..bin_end];

    let mut metadata = wire.metadata;
    if metadata.expansion_chips.is_none() {
        metadata.expansion_chips = Some(metadata.resolved_expansion_chips());
    }

    let mut songs = Vec::with_capacity(wire.songs.len());
    for wsong in wire.songs {
        let mut channels = Vec::with_capacity(wsong.channels.len());
        for wch in wsong.channels {
            let channel_type = ChannelType::from_tag(&wch.channel_type)
                .ok_or_else(|| NotationError::UnknownChannelType(wch.channel_type.clone()))?;

            let raw_frames = match &wch.raw_data_ref {
                None => Vec::new(),
                Some(data_ref) => {
                    let start = data_ref.byte_offset as usize;
                    let end = start + data_ref.byte_length as usize;
                    if bin.len() < end {
                        return Err(NotationError::Truncated {
                            where_: "bin",
                            need: end,
                            have: bin.len(),
                        });
                    }
                    let mut cursor = Cursor::new(&bin[start..end]);
                    let count = data_ref.byte_length / data_ref.frame_size.max(1);
                    let mut frames = Vec::with_capacity(count as usize);
                    for _ in 0..count {
                        frames.push(unpack_frame(&mut cursor, channel_type)?);
                    }
                    frames
                }
            };

            channels.push(ChannelData {
                channel_id: wch.channel_id,
                channel_type,
                channel_name: wch.channel_name,
                notes: wch.notes,
                raw_frames,
            });
        }
        songs.push(SongData {
            index: wsong.index,
            name: wsong.name,
            num_frames: wsong.num_frames,
            pattern_length: wsong.pattern_length,
            channels,
        });
    }

    Ok(NotationFile { metadata, songs })
}

impl From<std::io::Error> for NotationError {
    fn from(e: std::io::Error) -> Self {
        NotationError::EncodingError(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::notation::{EventKind, Region};

    fn sample_file() -> NotationFile {
        let mut square = ChannelData::new(0, ChannelType::Square, "Square 1");
        square.raw_frames = vec![RegisterSnapshot::Square { period: 200, volume: 10, duty: 2 }; 5];
        square.notes.push(NoteEvent {
            frame: 0,
            event: EventKind::Trigger,
            note: 40,
            octave: NoteEvent::octave_for(40),
            pitch: 0,
            volume: 10,
            duty_cycle: 2,
            instrument: None,
        });

        let mut triangle = ChannelData::new(2, ChannelType::Triangle, "Triangle");
        triangle.raw_frames = vec![RegisterSnapshot::Triangle { period: 300, volume: 8 }; 3];

        NotationFile {
            metadata: Metadata {
                title: "Mega Man 2".to_string(),
                artist: "Takashi Tateishi".to_string(),
                copyright: "Capcom".to_string(),
                region: Region::Ntsc,
                frame_rate: 60,
                expansion: 0,
                expansion_chips: None,
            },
            songs: vec![SongData {
                index: 0,
                name: "Title".to_string(),
                num_frames: 5,
                pattern_length: 256,
                channels: vec![square, triangle],
            }],
        }
    }

    #[test]
    fn round_trips_full_file() {
        let original = sample_file();
        let bytes = write(&original).unwrap();
        let decoded = read(&bytes).unwrap();

        // `expansion_chips` is a cache of `expansion`, not preserved verbatim:
        // it's filled in on read whenever the written value left it absent.
        let mut expected = original.clone();
        expected.metadata.expansion_chips = Some(expected.metadata.resolved_expansion_chips());
        assert_eq!(decoded, expected);
    }

    #[test]
    fn empty_notation_round_trips_to_defaults() {
        let original = NotationFile::default();
        let bytes = write(&original).unwrap();
        let decoded = read(&bytes).unwrap();
        assert_eq!(decoded.songs.len(), 0);
        assert_eq!(decoded.metadata.region, Region::Ntsc);
    }

    #[test]
    fn binary_offsets_are_contiguous_in_declaration_order() {
        let original = sample_file();
        let bytes = write(&original).unwrap();
        let decoded = read(&bytes).unwrap();
        assert_eq!(decoded.songs[0].channels[0].raw_frames.len(), 5);
        assert_eq!(decoded.songs[0].channels[1].raw_frames.len(), 3);
    }

    #[test]
    fn expansion_chips_recomputed_when_absent_from_json() {
        let mut original = sample_file();
        original.metadata.expansion = 0b000101; // VRC6 | FDS
        let bytes = write(&original).unwrap();
        let decoded = read(&bytes).unwrap();
        assert_eq!(
            decoded.metadata.resolved_expansion_chips(),
            vec!["VRC6".to_string(), "FDS".to_string()]
        );
    }

    #[test]
    fn bad_magic_is_rejected() {
        let mut bytes = write(&sample_file()).unwrap();
        bytes[0..4].copy_from_slice(b"BAAD");
        match read(&bytes) {
            Err(NotationError::InvalidMagic(_)) => {}
            other => panic!("expected InvalidMagic, got {other:?}"),
        }
    }

    #[test]
    fn unsupported_version_is_rejected() {
        let mut bytes = write(&sample_file()).unwrap();
        bytes[4..8].copy_from_slice(&99u32.to_le_bytes());
        match read(&bytes) {
            Err(NotationError::UnsupportedVersion(99)) => {}
            other => panic!("expected UnsupportedVersion(99), got {other:?}"),
        }
    }

    #[test]
    fn three_byte_file_is_truncated_header() {
        match read(&[1, 2, 3]) {
            Err(NotationError::Truncated { where_: "header", need: 12, have: 3 }) => {}
            other => panic!("expected Truncated header, got {other:?}"),
        }
    }

    #[test]
    fn overlong_json_len_is_truncated() {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(MAGIC);
        bytes.extend_from_slice(&1u32.to_le_bytes());
        bytes.extend_from_slice(&1000u32.to_le_bytes());
        match read(&bytes) {
            Err(NotationError::Truncated { where_: "json", .. }) => {}
            other => panic!("expected Truncated json, got {other:?}"),
        }
    }

    #[test]
    fn overlong_bin_len_is_truncated() {
        let mut bytes = write(&NotationFile::default()).unwrap();
        let json_len = u32::from_le_bytes(bytes[8..12].try_into().unwrap()) as usize;
        let bin_len_offset = 12 + json_len;
        bytes.truncate(bin_len_offset + 4);
        bytes[bin_len_offset..bin_len_offset + 4].copy_from_slice(&9999u32.to_le_bytes());
        match read(&bytes) {
            Err(NotationError::Truncated { where_: "bin", .. }) => {}
            other => panic!("expected Truncated bin, got {other:?}"),
        }
    }
}

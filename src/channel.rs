//! Enumerates the 29 possible channels and decides which are active for a
//! given expansion mask and Namco-163 channel count.

use serde::{Deserialize, Serialize};

/// One of the twelve chip-specific channel families.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChannelType {
    Square,
    Triangle,
    Noise,
    Dpcm,
    Vrc6Square,
    Vrc6Saw,
    Vrc7Fm,
    Fds,
    Mmc5Square,
    Mmc5Dpcm,
    N163Wave,
    S5bSquare,
}

impl ChannelType {
    /// The wire tag used in JSON `channel_type` and as the struct-format key.
    pub fn tag(self) -> &'static str {
        match self {
            ChannelType::Square => "square",
            ChannelType::Triangle => "triangle",
            ChannelType::Noise => "noise",
            ChannelType::Dpcm => "dpcm",
            ChannelType::Vrc6Square => "vrc6_square",
            ChannelType::Vrc6Saw => "vrc6_saw",
            ChannelType::Vrc7Fm => "vrc7_fm",
            ChannelType::Fds => "fds",
            ChannelType::Mmc5Square => "mmc5_square",
            ChannelType::Mmc5Dpcm => "mmc5_dpcm",
            ChannelType::N163Wave => "n163_wave",
            ChannelType::S5bSquare => "s5b_square",
        }
    }

    pub fn from_tag(tag: &str) -> Option<ChannelType> {
        Some(match tag {
            "square" => ChannelType::Square,
            "triangle" => ChannelType::Triangle,
            "noise" => ChannelType::Noise,
            "dpcm" => ChannelType::Dpcm,
            "vrc6_square" => ChannelType::Vrc6Square,
            "vrc6_saw" => ChannelType::Vrc6Saw,
            "vrc7_fm" => ChannelType::Vrc7Fm,
            "fds" => ChannelType::Fds,
            "mmc5_square" => ChannelType::Mmc5Square,
            "mmc5_dpcm" => ChannelType::Mmc5Dpcm,
            "n163_wave" => ChannelType::N163Wave,
            "s5b_square" => ChannelType::S5bSquare,
            _ => return None,
        })
    }
}

pub const CHANNEL_COUNT: u8 = 29;

/// `(channel_type, channel_name)` for every channel id 0..29, in declaration
/// order.
pub const CHANNEL_TABLE: [(ChannelType, &str); CHANNEL_COUNT as usize] = [
    (ChannelType::Square, "Square 1"),
    (ChannelType::Square, "Square 2"),
    (ChannelType::Triangle, "Triangle"),
    (ChannelType::Noise, "Noise"),
    (ChannelType::Dpcm, "DPCM"),
    (ChannelType::Vrc6Square, "VRC6 Square 1"),
    (ChannelType::Vrc6Square, "VRC6 Square 2"),
    (ChannelType::Vrc6Saw, "VRC6 Saw"),
    (ChannelType::Vrc7Fm, "VRC7 FM 1"),
    (ChannelType::Vrc7Fm, "VRC7 FM 2"),
    (ChannelType::Vrc7Fm, "VRC7 FM 3"),
    (ChannelType::Vrc7Fm, "VRC7 FM 4"),
    (ChannelType::Vrc7Fm, "VRC7 FM 5"),
    (ChannelType::Vrc7Fm, "VRC7 FM 6"),
    (ChannelType::Fds, "FDS"),
    (ChannelType::Mmc5Square, "MMC5 Square 1"),
    (ChannelType::Mmc5Square, "MMC5 Square 2"),
    (ChannelType::Mmc5Dpcm, "MMC5 DPCM"),
    (ChannelType::N163Wave, "N163 Wave 1"),
    (ChannelType::N163Wave, "N163 Wave 2"),
    (ChannelType::N163Wave, "N163 Wave 3"),
    (ChannelType::N163Wave, "N163 Wave 4"),
    (ChannelType::N163Wave, "N163 Wave 5"),
    (ChannelType::N163Wave, "N163 Wave 6"),
    (ChannelType::N163Wave, "N163 Wave 7"),
    (ChannelType::N163Wave, "N163 Wave 8"),
    (ChannelType::S5bSquare, "S5B Square 1"),
    (ChannelType::S5bSquare, "S5B Square 2"),
    (ChannelType::S5bSquare, "S5B Square 3"),
];

const CHANNEL_EXPANSION_START: u8 = 5;
const CHANNEL_VRC6_FIRST: u8 = 5;
const CHANNEL_VRC6_LAST: u8 = 7;
const CHANNEL_VRC7_FIRST: u8 = 8;
const CHANNEL_VRC7_LAST: u8 = 13;
const CHANNEL_FDS: u8 = 14;
const CHANNEL_MMC5_FIRST: u8 = 15;
const CHANNEL_MMC5_LAST: u8 = 17;
const CHANNEL_N163_FIRST: u8 = 18;
const CHANNEL_N163_LAST: u8 = 25;
const CHANNEL_S5B_FIRST: u8 = 26;
const CHANNEL_S5B_LAST: u8 = 28;

/// Expansion bitmask bits, as reported by the NSF header.
pub mod expansion_bits {
    pub const VRC6: u32 = 1 << 0;
    pub const VRC7: u32 = 1 << 1;
    pub const FDS: u32 = 1 << 2;
    pub const MMC5: u32 = 1 << 3;
    pub const N163: u32 = 1 << 4;
    pub const S5B: u32 = 1 << 5;
    /// VT02+ audio; recognized but never implemented.
    pub const VT02: u32 = 1 << 6;
    pub const RESERVED: u32 = 1 << 7;

    /// Bits this crate knows how to decode into `expansion_chips`.
    pub const ALL_SUPPORTED: u32 = VRC6 | VRC7 | FDS | MMC5 | N163 | S5B;
}

/// Decodes an expansion bitmask into the canonical, fixed-order chip name
/// list: `{VRC6, VRC7, FDS, MMC5, N163, S5B}`.
pub fn expansion_chip_list(mask: u32) -> Vec<String> {
    use expansion_bits::*;
    let pairs: [(u32, &str); 6] = [
        (VRC6, "VRC6"),
        (VRC7, "VRC7"),
        (FDS, "FDS"),
        (MMC5, "MMC5"),
        (N163, "N163"),
        (S5B, "S5B"),
    ];
    pairs
        .into_iter()
        .filter(|(bit, _)| mask & bit != 0)
        .map(|(_, name)| name.to_string())
        .collect()
}

/// Whether `channel_id` is active for a track with the given expansion mask
/// and resolved Namco-163 channel count.
///
/// `namco_count` is only meaningful when `N163` is set in `expansion`; it
/// must already be clamped to `[1, 8]` by the caller.
pub fn is_active(channel_id: u8, expansion: u32, namco_count: u8) -> bool {
    use expansion_bits::*;

    if channel_id < CHANNEL_EXPANSION_START {
        return true;
    }
    match channel_id {
        CHANNEL_VRC6_FIRST..=CHANNEL_VRC6_LAST => expansion & VRC6 != 0,
        CHANNEL_VRC7_FIRST..=CHANNEL_VRC7_LAST => expansion & VRC7 != 0,
        CHANNEL_FDS => expansion & FDS != 0,
        CHANNEL_MMC5_FIRST..=CHANNEL_MMC5_LAST => expansion & MMC5 != 0,
        CHANNEL_N163_FIRST..=CHANNEL_N163_LAST => {
            expansion & N163 != 0 && (channel_id - CHANNEL_N163_FIRST) < namco_count
        }
        CHANNEL_S5B_FIRST..=CHANNEL_S5B_LAST => expansion & S5B != 0,
        _ => false,
    }
}

/// The channel id of the first Namco-163 wave channel; `get_state` reads on
/// this channel during the Namco-count pre-pass.
pub const CHANNEL_N163_WAVE1: u8 = CHANNEL_N163_FIRST;

/// Returns the `(channel_type, channel_name)` pair for `channel_id`, or
/// `None` if out of range.
pub fn channel_info(channel_id: u8) -> Option<(ChannelType, &'static str)> {
    CHANNEL_TABLE.get(channel_id as usize).copied()
}

/// Builds the ordered list of active channel ids for a track.
pub fn active_channels(expansion: u32, namco_count: u8) -> Vec<u8> {
    (0..CHANNEL_COUNT)
        .filter(|&id| is_active(id, expansion, namco_count))
        .collect()
}

/// One frame's worth of raw hardware state for a channel, shaped per
/// `channel_type`. Field order matches the packed binary layout.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RegisterSnapshot {
    Square { period: u16, volume: u8, duty: u8 },
    Triangle { period: u16, volume: u8 },
    Noise { period_idx: u8, volume: u8, mode: u8 },
    Dpcm {
        sample_len: u16,
        sample_addr: i32,
        pitch: u8,
        looping: u8,
        counter: u8,
        active: u8,
    },
    Vrc6Square { period: u16, volume: u8, duty: u8 },
    Vrc6Saw { period: u16, volume: u8 },
    Vrc7Fm {
        period: u16,
        volume: u8,
        patch: u8,
        octave: u8,
        trigger: u8,
        sustain: u8,
        trigger_change: i8,
    },
    Fds {
        period: u16,
        volume: u8,
        master_volume: u8,
        mod_speed: u16,
        mod_depth: u8,
        pad: u8,
    },
    Mmc5Square { period: u16, volume: u8, duty: u8 },
    Mmc5Dpcm { reserved: u8 },
    N163Wave {
        period: i32,
        volume: u8,
        wave_pos: u8,
        wave_size: u8,
        num_channels: u8,
    },
    S5bSquare {
        period: u16,
        volume: u8,
        mixer: u8,
        noise_freq: u8,
        env_enabled: u8,
        env_freq: u16,
        env_shape: u8,
        env_trigger: u8,
    },
}

impl RegisterSnapshot {
    pub fn channel_type(&self) -> ChannelType {
        match self {
            RegisterSnapshot::Square { .. } => ChannelType::Square,
            RegisterSnapshot::Triangle { .. } => ChannelType::Triangle,
            RegisterSnapshot::Noise { .. } => ChannelType::Noise,
            RegisterSnapshot::Dpcm { .. } => ChannelType::Dpcm,
            RegisterSnapshot::Vrc6Square { .. } => ChannelType::Vrc6Square,
            RegisterSnapshot::Vrc6Saw { .. } => ChannelType::Vrc6Saw,
            RegisterSnapshot::Vrc7Fm { .. } => ChannelType::Vrc7Fm,
            RegisterSnapshot::Fds { .. } => ChannelType::Fds,
            RegisterSnapshot::Mmc5Square { .. } => ChannelType::Mmc5Square,
            RegisterSnapshot::Mmc5Dpcm { .. } => ChannelType::Mmc5Dpcm,
            RegisterSnapshot::N163Wave { .. } => ChannelType::N163Wave,
            RegisterSnapshot::S5bSquare { .. } => ChannelType::S5bSquare,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn apu_channels_always_active() {
        for id in 0..5 {
            assert!(is_active(id, 0, 1));
        }
    }

    #[test]
    fn expansion_channels_gated_by_mask() {
        assert!(!is_active(5, 0, 1));
        assert!(is_active(5, expansion_bits::VRC6, 1));
        assert!(is_active(14, expansion_bits::FDS, 1));
        assert!(!is_active(14, expansion_bits::VRC6, 1));
    }

    #[test]
    fn n163_gated_by_namco_count() {
        let mask = expansion_bits::N163;
        assert!(is_active(18, mask, 1));
        assert!(!is_active(19, mask, 1));
        assert!(is_active(19, mask, 2));
        assert!(is_active(25, mask, 8));
    }

    #[test]
    fn expansion_decoding_is_fixed_order() {
        let chips = expansion_chip_list(expansion_bits::FDS | expansion_bits::VRC6);
        assert_eq!(chips, vec!["VRC6".to_string(), "FDS".to_string()]);
    }

    #[test]
    fn channel_table_has_29_entries() {
        assert_eq!(CHANNEL_TABLE.len(), 29);
        for id in 0..29u8 {
            assert!(channel_info(id).is_some());
        }
    }
}

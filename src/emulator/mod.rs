//! A thin, typed surface over the foreign NSF emulator library.

mod ffi;

use std::ffi::c_void;

use crate::channel::{ChannelType, RegisterSnapshot};
use crate::error::Result;
use ffi::RawLibrary;

/// Opaque register-state codes passed to `NsfGetState`'s `state` parameter.
///
/// These mirror the `STATE_*` codes NotSoFatso/FamiStudio expose; the
/// numeric values only need to be internally consistent since the foreign
/// library is the sole consumer.
pub mod state_code {
    pub const PERIOD: u32 = 0;
    pub const VOLUME: u32 = 1;
    pub const DUTY_CYCLE: u32 = 2;
    pub const DPCM_SAMPLE_LENGTH: u32 = 3;
    pub const DPCM_SAMPLE_ADDR: u32 = 4;
    pub const DPCM_PITCH: u32 = 5;
    pub const DPCM_LOOP: u32 = 6;
    pub const DPCM_COUNTER: u32 = 7;
    pub const DPCM_ACTIVE: u32 = 8;
    pub const FDS_MASTER_VOLUME: u32 = 9;
    pub const FDS_MODULATION_SPEED: u32 = 10;
    pub const FDS_MODULATION_DEPTH: u32 = 11;
    pub const FM_OCTAVE: u32 = 12;
    pub const FM_SUSTAIN: u32 = 13;
    pub const FM_TRIGGER: u32 = 14;
    pub const FM_TRIGGER_CHANGE: u32 = 15;
    pub const N163_NUM_CHANNELS: u32 = 16;
    pub const N163_WAVE_POS: u32 = 17;
    pub const N163_WAVE_SIZE: u32 = 18;
    pub const S5B_ENV_ENABLED: u32 = 19;
    pub const S5B_ENV_FREQUENCY: u32 = 20;
    pub const S5B_ENV_SHAPE: u32 = 21;
    pub const S5B_ENV_TRIGGER: u32 = 22;
    pub const S5B_MIXER: u32 = 23;
    pub const S5B_NOISE_FREQUENCY: u32 = 24;
    pub const VRC7_PATCH: u32 = 25;
}

/// A scoped handle to one opened NSF file, driven one frame at a time.
///
/// The foreign handle is acquired on [`Emulator::open`] and released on
/// drop, so every exit path — success, error, or an early `?` — closes it.
pub struct Emulator {
    lib: RawLibrary,
    handle: *mut c_void,
}

// The foreign handle is only ever touched through `&mut self` methods here,
// so `Emulator` can move between threads as long as callers serialize
// access — only one thread may hold the emulator at a time.
unsafe impl Send for Emulator {}

impl Emulator {
    /// Loads the emulator shared library and opens `nsf_path` through it.
    ///
    /// `library_path` is the platform-specific path to the NotSoFatso-style
    /// shared library (e.g. `libNotSoFatso.so`).
    pub fn open(library_path: &str, nsf_path: &str) -> Result<Emulator> {
        let lib = RawLibrary::load(library_path)?;
        let handle = lib.open(nsf_path)?;
        Ok(Emulator { lib, handle })
    }

    pub fn track_count(&self) -> Result<u8> {
        self.lib.track_count(self.handle)
    }

    pub fn is_pal(&self) -> Result<bool> {
        self.lib.is_pal(self.handle)
    }

    pub fn expansion_mask(&self) -> Result<u32> {
        self.lib.expansion_mask(self.handle)
    }

    pub fn title(&self) -> Result<String> {
        self.lib.title(self.handle)
    }

    pub fn artist(&self) -> Result<String> {
        self.lib.artist(self.handle)
    }

    pub fn copyright(&self) -> Result<String> {
        self.lib.copyright(self.handle)
    }

    pub fn track_name(&self, track: u8) -> Result<String> {
        self.lib.track_name(self.handle, track)
    }

    /// Resets emulation and positions it at the start of `track`.
    pub fn set_track(&mut self, track: u8) -> Result<()> {
        self.lib.set_track(self.handle, track)
    }

    /// Advances emulation by one video frame. Returns whether the play
    /// routine was invoked this frame.
    pub fn run_frame(&mut self) -> Result<bool> {
        self.lib.run_frame(self.handle)
    }

    pub fn get_state(&self, channel_id: u8, state_code: u32, sub_index: i32) -> Result<i32> {
        self.lib.get_state(self.handle, channel_id, state_code, sub_index)
    }

    /// Reads one frame's raw register state for `channel_id`, shaped per
    /// its `channel_type`.
    pub fn read_snapshot(&self, channel_id: u8, channel_type: ChannelType) -> Result<RegisterSnapshot> {
        use state_code::*;
        let g = |code: u32, sub: i32| self.get_state(channel_id, code, sub);

        Ok(match channel_type {
            ChannelType::Square | ChannelType::Vrc6Square | ChannelType::Mmc5Square => {
                RegisterSnapshot::Square {
                    period: g(PERIOD, 0)? as u16,
                    volume: g(VOLUME, 0)? as u8,
                    duty: g(DUTY_CYCLE, 0)? as u8,
                }
            }
            ChannelType::Triangle => RegisterSnapshot::Triangle {
                period: g(PERIOD, 0)? as u16,
                volume: g(VOLUME, 0)? as u8,
            },
            ChannelType::Noise => RegisterSnapshot::Noise {
                period_idx: g(PERIOD, 0)? as u8,
                volume: g(VOLUME, 0)? as u8,
                mode: g(DUTY_CYCLE, 0)? as u8,
            },
            ChannelType::Dpcm => RegisterSnapshot::Dpcm {
                sample_len: g(DPCM_SAMPLE_LENGTH, 0)? as u16,
                sample_addr: g(DPCM_SAMPLE_ADDR, 0)?,
                pitch: g(DPCM_PITCH, 0)? as u8,
                looping: g(DPCM_LOOP, 0)? as u8,
                counter: g(DPCM_COUNTER, 0)? as u8,
                active: g(DPCM_ACTIVE, 0)? as u8,
            },
            ChannelType::Vrc6Saw => RegisterSnapshot::Vrc6Saw {
                period: g(PERIOD, 0)? as u16,
                volume: g(VOLUME, 0)? as u8,
            },
            ChannelType::Vrc7Fm => RegisterSnapshot::Vrc7Fm {
                period: g(PERIOD, 0)? as u16,
                volume: g(VOLUME, 0)? as u8,
                patch: g(VRC7_PATCH, 0)? as u8,
                octave: g(FM_OCTAVE, 0)? as u8,
                trigger: g(FM_TRIGGER, 0)? as u8,
                sustain: g(FM_SUSTAIN, 0)? as u8,
                trigger_change: g(FM_TRIGGER_CHANGE, 0)? as i8,
            },
            ChannelType::Fds => RegisterSnapshot::Fds {
                period: g(PERIOD, 0)? as u16,
                volume: g(VOLUME, 0)? as u8,
                master_volume: g(FDS_MASTER_VOLUME, 0)? as u8,
                mod_speed: g(FDS_MODULATION_SPEED, 0)? as u16,
                mod_depth: g(FDS_MODULATION_DEPTH, 0)? as u8,
                pad: 0,
            },
            ChannelType::Mmc5Dpcm => RegisterSnapshot::Mmc5Dpcm { reserved: 0 },
            ChannelType::N163Wave => RegisterSnapshot::N163Wave {
                period: g(PERIOD, 0)?,
                volume: g(VOLUME, 0)? as u8,
                wave_pos: g(N163_WAVE_POS, 0)? as u8,
                wave_size: g(N163_WAVE_SIZE, 0)? as u8,
                num_channels: g(N163_NUM_CHANNELS, 0)? as u8,
            },
            ChannelType::S5bSquare => RegisterSnapshot::S5bSquare {
                period: g(PERIOD, 0)? as u16,
                volume: g(VOLUME, 0)? as u8,
                mixer: g(S5B_MIXER, 0)? as u8,
                noise_freq: g(S5B_NOISE_FREQUENCY, 0)? as u8,
                env_enabled: g(S5B_ENV_ENABLED, 0)? as u8,
                env_freq: g(S5B_ENV_FREQUENCY, 0)? as u16,
                env_shape: g(S5B_ENV_SHAPE, 0)? as u8,
                env_trigger: g(S5B_ENV_TRIGGER, 0)? as u8,
            },
        })
    }
}

impl Drop for Emulator {
    fn drop(&mut self) {
        self.lib.close(self.handle);
    }
}

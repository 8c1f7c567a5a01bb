//! Drives the emulator one frame at a time and assembles a complete
//! [`NotationFile`] from the raw channel traces.

use tracing::{debug, info, warn};

use crate::channel::{active_channels, channel_info, is_active, CHANNEL_N163_WAVE1};
use crate::config::ExtractionConfig;
use crate::emulator::{state_code, Emulator};
use crate::error::Result;
use crate::notation::{ChannelData, Metadata, NotationFile, Region, SongData};
use crate::pitch::PitchTables;
use crate::state::ChannelState;

/// Extracts every track in `emu` into a complete [`NotationFile`].
pub fn extract(emu: &mut Emulator, config: &ExtractionConfig) -> Result<NotationFile> {
    extract_with_progress(emu, config, |_, _| {})
}

/// Extracts every track in `emu`, calling `on_track_done(completed, total)`
/// after each track finishes so a caller can drive a progress indicator.
pub fn extract_with_progress(
    emu: &mut Emulator,
    config: &ExtractionConfig,
    mut on_track_done: impl FnMut(u8, u8),
) -> Result<NotationFile> {
    let expansion = emu.expansion_mask()?;
    if expansion & !crate::channel::expansion_bits::ALL_SUPPORTED != 0 {
        return Err(crate::error::NotationError::EncodingError(format!(
            "unsupported expansion bits set: {expansion:#x}"
        )));
    }

    let region = if emu.is_pal()? { Region::Pal } else { Region::Ntsc };
    let frame_rate = region.frame_rate();
    let num_frames = config.duration_seconds * frame_rate;

    let metadata = Metadata {
        title: emu.title()?,
        artist: emu.artist()?,
        copyright: emu.copyright()?,
        region,
        frame_rate,
        expansion,
        expansion_chips: None,
    };

    let tables = PitchTables::generate(config.tuning_hz);
    let track_count = emu.track_count()?;
    info!(track_count, expansion = format!("{expansion:#x}"), "starting extraction");

    let mut songs = Vec::with_capacity(track_count as usize);
    for track in 0..track_count {
        songs.push(extract_track(emu, track, expansion, num_frames, config.pattern_length, region, &tables)?);
        on_track_done(track + 1, track_count);
    }

    Ok(NotationFile { metadata, songs })
}

fn extract_track(
    emu: &mut Emulator,
    track: u8,
    expansion: u32,
    num_frames: u32,
    pattern_length: u32,
    region: Region,
    tables: &PitchTables,
) -> Result<SongData> {
    let namco_count = if expansion & crate::channel::expansion_bits::N163 != 0 {
        namco_count_prepass(emu, track, num_frames)?
    } else {
        1
    };

    // The pre-pass leaves emulation mid-track; rewinding is required or
    // every channel's register history would carry over into the real run.
    emu.set_track(track)?;

    let channel_ids = active_channels(expansion, namco_count);
    let mut channels: Vec<ChannelData> = channel_ids
        .iter()
        .map(|&id| {
            let (channel_type, name) = channel_info(id).expect("active channel id is always in range");
            ChannelData::new(id, channel_type, name)
        })
        .collect();
    let mut states: Vec<ChannelState> = channel_ids
        .iter()
        .map(|&id| ChannelState::new(channel_info(id).expect("active channel id is always in range").0))
        .collect();

    let raw_name = emu.track_name(track)?;
    let name = SongData::resolve_name(track as u32, &raw_name);

    let mut play_invoked = false;
    for frame in 0..num_frames {
        let played = emu.run_frame()?;
        play_invoked |= played;

        for (idx, &id) in channel_ids.iter().enumerate() {
            let snapshot = emu.read_snapshot(id, channels[idx].channel_type)?;
            states[idx].update(frame, snapshot, tables, region, &mut channels[idx].notes);
            channels[idx].raw_frames.push(snapshot);
        }
    }

    if !play_invoked {
        warn!(track, "play routine was never invoked during extraction");
    }

    debug!(track, name = %name, channels = channels.len(), "track extracted");

    Ok(SongData {
        index: track as u32,
        name,
        num_frames,
        pattern_length,
        channels,
    })
}

/// Runs a full pass over `track` purely to discover how many Namco-163
/// channels it actually uses. The emulator is left mid-track; the caller
/// must `set_track` again before the real pass.
fn namco_count_prepass(emu: &mut Emulator, track: u8, num_frames: u32) -> Result<u8> {
    emu.set_track(track)?;
    let mut max_seen: i32 = 1;
    for _ in 0..num_frames {
        emu.run_frame()?;
        let count = emu.get_state(CHANNEL_N163_WAVE1, state_code::N163_NUM_CHANNELS, 0)?;
        if count > max_seen {
            max_seen = count;
        }
    }
    Ok(max_seen.clamp(1, 8) as u8)
}

/// Whether `channel_id` would be active for the given mask/count, exposed
/// for callers that want to pre-check without running a track.
pub fn channel_active(channel_id: u8, expansion: u32, namco_count: u8) -> bool {
    is_active(channel_id, expansion, namco_count)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn channel_active_matches_registry() {
        assert!(channel_active(0, 0, 1));
        assert!(!channel_active(5, 0, 1));
        assert!(channel_active(5, crate::channel::expansion_bits::VRC6, 1));
    }

    // Driving `extract` end-to-end requires a real emulator shared library
    // and is exercised only in environments that can provide one; see
    // `container`, `state`, and `channel` for coverage of everything this
    // module composes.
}

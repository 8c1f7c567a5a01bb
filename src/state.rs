//! Per-channel event-extraction state machine.
//!
//! Each call to [`ChannelState::update`] consumes one frame's
//! [`RegisterSnapshot`] and appends zero or one [`NoteEvent`] to `notes`.
//! Triggers, releases and stops are all inferred from register deltas; they
//! are never present in the input.

use crate::channel::{ChannelType, RegisterSnapshot};
use crate::notation::{EventKind, NoteEvent, Region};
use crate::pitch::{nearest, PitchTables, NUM_NOTES};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Machine {
    Stopped,
    Triggered,
    Released,
}

/// Mutable per-channel scratch state, discarded once a track's extraction
/// completes.
#[derive(Debug, Clone)]
pub struct ChannelState {
    channel_type: ChannelType,
    state: Machine,
    note: u8,
    pitch: i32,
    volume: u8,
    /// Last recorded hardware period (or DPCM sample address, or VRC7
    /// un-shifted period) used to detect parameter changes.
    period: i32,
    instrument: Option<u8>,
    fm_trigger: bool,
    fds_mod_depth: u8,
    fds_mod_speed: u16,
}

impl ChannelState {
    pub fn new(channel_type: ChannelType) -> Self {
        ChannelState {
            channel_type,
            state: Machine::Stopped,
            note: 0,
            pitch: 0,
            volume: 0,
            period: -1,
            instrument: None,
            fm_trigger: false,
            fds_mod_depth: 0,
            fds_mod_speed: 0,
        }
    }

    /// FDS modulation depth/speed last observed; kept for potential future
    /// export, it never influences event emission.
    pub fn fds_modulation(&self) -> (u8, u16) {
        (self.fds_mod_depth, self.fds_mod_speed)
    }

    /// Processes one frame, appending any emitted event to `notes`.
    pub fn update(
        &mut self,
        frame: u32,
        snapshot: RegisterSnapshot,
        tables: &PitchTables,
        region: Region,
        notes: &mut Vec<NoteEvent>,
    ) {
        let region_table = match region {
            Region::Ntsc => &tables.ntsc,
            Region::Pal => &tables.pal,
        };

        match snapshot {
            RegisterSnapshot::Square { period, volume, duty }
            | RegisterSnapshot::Vrc6Square { period, volume, duty }
            | RegisterSnapshot::Mmc5Square { period, volume, duty } => {
                self.update_generic(frame, period as i32, volume, duty, 0, region_table, notes);
            }
            RegisterSnapshot::Triangle { period, volume } => {
                self.update_generic(frame, period as i32, volume, 0, 0, region_table, notes);
            }
            RegisterSnapshot::Vrc6Saw { period, volume } => {
                self.update_generic(frame, period as i32, volume, 0, 0, &tables.vrc6_saw, notes);
            }
            RegisterSnapshot::Fds {
                period,
                volume,
                mod_speed,
                mod_depth,
                ..
            } => {
                self.fds_mod_depth = mod_depth;
                self.fds_mod_speed = mod_speed;
                self.update_generic(frame, period as i32, volume, 0, 0, &tables.fds, notes);
            }
            RegisterSnapshot::N163Wave {
                period,
                volume,
                num_channels,
                ..
            } => {
                let table = tables.n163_for_channel_count(num_channels as i32);
                self.update_generic(frame, period, volume, 0, 0, table, notes);
            }
            RegisterSnapshot::S5bSquare { period, volume, .. } => {
                self.update_generic(frame, period as i32, volume, 0, 0xFFFF, region_table, notes);
            }
            RegisterSnapshot::Noise { period_idx, volume, mode } => {
                self.update_noise(frame, period_idx, volume, mode, notes);
            }
            RegisterSnapshot::Dpcm {
                sample_len,
                sample_addr,
                pitch,
                active,
                ..
            } => {
                self.update_dpcm(frame, sample_len, sample_addr, pitch, active, notes);
            }
            RegisterSnapshot::Vrc7Fm {
                period,
                volume,
                patch,
                octave,
                trigger,
                sustain,
                ..
            } => {
                self.update_fm(
                    frame,
                    period,
                    volume,
                    patch,
                    octave,
                    trigger != 0,
                    sustain != 0,
                    &tables.vrc7,
                    notes,
                );
            }
            RegisterSnapshot::Mmc5Dpcm { .. } => {
                // Observationally inert: no state, no events.
            }
        }
    }

    fn emit(
        &self,
        frame: u32,
        event: EventKind,
        note: u8,
        pitch: i32,
        volume: u8,
        duty: u8,
        notes: &mut Vec<NoteEvent>,
    ) {
        notes.push(NoteEvent {
            frame,
            event,
            note,
            octave: NoteEvent::octave_for(note),
            pitch,
            volume,
            duty_cycle: duty,
            instrument: self.instrument,
        });
    }

    /// Generic trigger detection shared by every tonal channel family.
    fn update_generic(
        &mut self,
        frame: u32,
        period: i32,
        volume: u8,
        duty: u8,
        invalid_period: i32,
        table: &[i32; NUM_NOTES],
        notes: &mut Vec<NoteEvent>,
    ) {
        let triggered = volume != 0 && period != invalid_period;

        if triggered {
            let (note, pitch) = nearest(period, table);

            if self.state != Machine::Triggered || note != self.note {
                self.state = Machine::Triggered;
                self.note = note;
                self.pitch = pitch;
                self.volume = volume;
                self.period = period;
                self.emit(frame, EventKind::Trigger, note, pitch, volume, duty, notes);
            } else if volume != self.volume || period != self.period {
                self.volume = volume;
                self.pitch = pitch;
                self.period = period;
            }
        } else if self.state == Machine::Triggered {
            self.emit(frame, EventKind::Stop, self.note, self.pitch, 0, duty, notes);
            self.state = Machine::Stopped;
        }
    }

    /// Noise channel: categorical pitch, not frequency-based.
    fn update_noise(&mut self, frame: u32, period_idx: u8, volume: u8, mode: u8, notes: &mut Vec<NoteEvent>) {
        let triggered = volume != 0;

        if triggered {
            let note = (period_idx ^ 0x0F) + 32;

            if self.state != Machine::Triggered || note != self.note {
                self.state = Machine::Triggered;
                self.note = note;
                self.pitch = 0;
                self.volume = volume;
                self.period = period_idx as i32;
                self.emit(frame, EventKind::Trigger, note, 0, volume, mode, notes);
            } else if volume != self.volume {
                self.volume = volume;
            }
        } else if self.state == Machine::Triggered {
            self.emit(frame, EventKind::Stop, self.note, 0, 0, mode, notes);
            self.state = Machine::Stopped;
        }
    }

    /// DPCM channel: pseudo-note derived from sample base address. `pitch`
    /// on the emitted event is the raw hardware pitch register, not a
    /// fine-pitch offset — preserved intentionally.
    fn update_dpcm(
        &mut self,
        frame: u32,
        sample_len: u16,
        sample_addr: i32,
        pitch: u8,
        active: u8,
        notes: &mut Vec<NoteEvent>,
    ) {
        let dmc_active = active != 0;

        if dmc_active && sample_len > 0 {
            if self.state != Machine::Triggered || sample_addr != self.period {
                self.state = Machine::Triggered;
                self.period = sample_addr;
                let note = (((sample_addr - 0xC000).div_euclid(64)) + 1).clamp(1, 96) as u8;
                self.note = note;
                self.pitch = pitch as i32;
                self.volume = 15;
                self.emit(frame, EventKind::Trigger, note, pitch as i32, 15, 0, notes);
            }
        } else if !dmc_active && self.state == Machine::Triggered {
            self.emit(frame, EventKind::Stop, self.note, self.pitch, 0, 0, notes);
            self.state = Machine::Stopped;
        }
    }

    /// VRC7 FM channel: the only family with explicit hardware trigger and
    /// sustain flags.
    #[allow(clippy::too_many_arguments)]
    fn update_fm(
        &mut self,
        frame: u32,
        period: u16,
        volume: u8,
        patch: u8,
        octave: u8,
        trigger: bool,
        sustain: bool,
        table: &[i32; NUM_NOTES],
        notes: &mut Vec<NoteEvent>,
    ) {
        let prev_trigger = self.fm_trigger;
        self.fm_trigger = trigger;

        let full_period = |period: u16, octave: u8| -> i32 {
            if octave > 0 {
                (period as i32) << octave
            } else {
                period as i32
            }
        };

        if !prev_trigger && trigger {
            let (note, pitch) = nearest(full_period(period, octave), table);
            self.state = Machine::Triggered;
            self.note = note;
            self.pitch = pitch;
            self.volume = volume;
            self.period = period as i32;
            self.instrument = Some(patch);
            self.emit(frame, EventKind::Trigger, note, pitch, volume, 0, notes);
        } else if prev_trigger && !trigger && sustain {
            self.state = Machine::Released;
            self.emit(frame, EventKind::Release, self.note, self.pitch, self.volume, 0, notes);
        } else if !trigger && !sustain {
            if self.state == Machine::Triggered || self.state == Machine::Released {
                self.emit(frame, EventKind::Stop, self.note, self.pitch, 0, 0, notes);
                self.state = Machine::Stopped;
            }
        } else if trigger && self.state == Machine::Triggered {
            let period_changed = period as i32 != self.period;
            let patch_changed = Some(patch) != self.instrument;
            if period_changed || patch_changed {
                let (note, pitch) = nearest(full_period(period, octave), table);
                self.note = note;
                self.pitch = pitch;
                self.period = period as i32;
                self.instrument = Some(patch);
                self.volume = volume;
                self.emit(frame, EventKind::Trigger, note, pitch, volume, 0, notes);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::RegisterSnapshot as R;

    fn tables() -> PitchTables {
        PitchTables::generate(440.0)
    }

    #[test]
    fn square_triggers_then_stops() {
        let t = tables();
        let mut cs = ChannelState::new(ChannelType::Square);
        let mut notes = Vec::new();

        cs.update(0, R::Square { period: t.ntsc[46] as u16, volume: 10, duty: 1 }, &t, Region::Ntsc, &mut notes);
        cs.update(1, R::Square { period: t.ntsc[46] as u16, volume: 0, duty: 1 }, &t, Region::Ntsc, &mut notes);

        assert_eq!(notes.len(), 2);
        assert_eq!(notes[0].event, EventKind::Trigger);
        assert_eq!(notes[0].note, 46);
        assert_eq!(notes[1].event, EventKind::Stop);
        assert_eq!(notes[1].volume, 0);
    }

    #[test]
    fn square_holds_without_retriggering_on_volume_wobble() {
        let t = tables();
        let mut cs = ChannelState::new(ChannelType::Square);
        let mut notes = Vec::new();

        cs.update(0, R::Square { period: t.ntsc[40] as u16, volume: 10, duty: 0 }, &t, Region::Ntsc, &mut notes);
        cs.update(1, R::Square { period: t.ntsc[40] as u16, volume: 8, duty: 0 }, &t, Region::Ntsc, &mut notes);
        cs.update(2, R::Square { period: t.ntsc[40] as u16, volume: 8, duty: 0 }, &t, Region::Ntsc, &mut notes);

        assert_eq!(notes.len(), 1, "volume wobble without note change shouldn't retrigger");
    }

    #[test]
    fn noise_formula_boundaries() {
        let t = tables();
        let mut cs = ChannelState::new(ChannelType::Noise);
        let mut notes = Vec::new();
        cs.update(0, R::Noise { period_idx: 0, volume: 5, mode: 0 }, &t, Region::Ntsc, &mut notes);
        assert_eq!(notes[0].note, 47);

        let mut cs2 = ChannelState::new(ChannelType::Noise);
        let mut notes2 = Vec::new();
        cs2.update(0, R::Noise { period_idx: 15, volume: 5, mode: 0 }, &t, Region::Ntsc, &mut notes2);
        assert_eq!(notes2[0].note, 32);

        let mut cs3 = ChannelState::new(ChannelType::Noise);
        let mut notes3 = Vec::new();
        cs3.update(0, R::Noise { period_idx: 7, volume: 5, mode: 0 }, &t, Region::Ntsc, &mut notes3);
        assert_eq!(notes3[0].note, 40);
    }

    #[test]
    fn dpcm_triggers_with_full_volume_and_raw_pitch() {
        let t = tables();
        let mut cs = ChannelState::new(ChannelType::Dpcm);
        let mut notes = Vec::new();
        cs.update(
            0,
            R::Dpcm { sample_len: 64, sample_addr: 0xC040, pitch: 9, looping: 0, counter: 0, active: 1 },
            &t,
            Region::Ntsc,
            &mut notes,
        );
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].volume, 15);
        assert_eq!(notes[0].pitch, 9);
        assert_eq!(notes[0].note, 2); // (0xC040 - 0xC000)/64 + 1 = 2
    }

    #[test]
    fn vrc7_trigger_release_stop_sequence() {
        let t = tables();
        let mut cs = ChannelState::new(ChannelType::Vrc7Fm);
        let mut notes = Vec::new();

        cs.update(
            0,
            R::Vrc7Fm { period: 400, volume: 12, patch: 3, octave: 2, trigger: 1, sustain: 0, trigger_change: 1 },
            &t,
            Region::Ntsc,
            &mut notes,
        );
        cs.update(
            1,
            R::Vrc7Fm { period: 400, volume: 12, patch: 3, octave: 2, trigger: 0, sustain: 1, trigger_change: 1 },
            &t,
            Region::Ntsc,
            &mut notes,
        );
        cs.update(
            2,
            R::Vrc7Fm { period: 400, volume: 12, patch: 3, octave: 2, trigger: 0, sustain: 0, trigger_change: 0 },
            &t,
            Region::Ntsc,
            &mut notes,
        );

        assert_eq!(notes.len(), 3);
        assert_eq!(notes[0].event, EventKind::Trigger);
        assert_eq!(notes[1].event, EventKind::Release);
        assert_eq!(notes[2].event, EventKind::Stop);
    }

    #[test]
    fn stop_never_precedes_a_trigger_or_release() {
        let t = tables();
        let mut cs = ChannelState::new(ChannelType::Square);
        let mut notes = Vec::new();
        // Silence the whole time: no events should ever be emitted.
        for frame in 0..10 {
            cs.update(frame, R::Square { period: 100, volume: 0, duty: 0 }, &t, Region::Ntsc, &mut notes);
        }
        assert!(notes.is_empty());
    }
}

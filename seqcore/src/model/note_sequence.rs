//! Note sequence: 64-step pattern driving the note track engine, plus the
//! sequence-level run parameters (divisor, run mode, harmony role) that
//! engine shares with every step.

use crate::config::NOTE_SEQUENCE_STEP_COUNT;
use crate::model::Accumulator;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RunMode {
    #[default]
    Forward,
    Reverse,
    PingPong,
    Random,
    RandomWalk,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SequenceMode {
    #[default]
    Linear,
    ReRene,
    Ikra,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GateMode {
    #[default]
    All,
    First,
    Hold,
    FirstLast,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HarmonyRole {
    #[default]
    Off,
    Master,
    FollowerRoot,
    Follower3rd,
    Follower5th,
    Follower7th,
}

/// Per-step harmony override (0=UseSequence, per the decision recorded for
/// the "harmonyRoleOverride vs UseSequence precedence" question).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum HarmonyRoleOverride {
    #[default]
    UseSequence,
    Root,
    Third,
    Fifth,
    Seventh,
    Off,
}

/// One step of a [`NoteSequence`]. Plain fields rather than the bit-packed
/// two-word layout of the reference firmware: this crate has no flash-wear
/// or RAM-footprint constraint forcing a packed representation, and the
/// fields are clamped to the firmware's value ranges at the edit boundary
/// instead.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Step {
    pub gate: bool,
    pub slide: bool,
    pub gate_probability: u8, // 0..7
    pub gate_offset: i8,      // -7..+7
    pub length: u8,           // 0..7
    pub length_variation_range: i8, // -8..+7
    pub length_variation_probability: u8, // 0..7
    pub note: i16,            // -64..+63
    pub note_variation_range: i16, // -64..+63
    pub note_variation_probability: u8, // 0..7
    pub retrigger: u8,        // 0..3 (subdivisions per step)
    pub retrigger_probability: u8, // 0..7
    pub condition: u8,        // 0..127
    /// Encoded per the firmware's storage convention: 0=off, 1=use the
    /// sequence accumulator's global step value, 2..8 = override -7..-1,
    /// 9..15 = override +1..+7.
    pub accumulator_step_value: u8,
    pub pulse_count: u8, // 0..7, representing 1..8 pulses
    pub gate_mode: GateMode,
    pub harmony_role_override: HarmonyRoleOverride,
}

impl Default for Step {
    fn default() -> Self {
        Self {
            gate: false,
            slide: false,
            gate_probability: 7,
            gate_offset: 0,
            length: 4,
            length_variation_range: 0,
            length_variation_probability: 0,
            note: 0,
            note_variation_range: 0,
            note_variation_probability: 0,
            retrigger: 0,
            retrigger_probability: 7,
            condition: 0,
            accumulator_step_value: 0,
            pulse_count: 0,
            gate_mode: GateMode::All,
            harmony_role_override: HarmonyRoleOverride::UseSequence,
        }
    }
}

impl Step {
    /// Decodes [`Step::accumulator_step_value`] into a signed user value:
    /// `None` when off, `Some(0)` meaning "use the accumulator's global
    /// step value", otherwise the per-step override amount.
    pub fn accumulator_override(&self) -> Option<i8> {
        match self.accumulator_step_value {
            0 => None,
            1 => Some(0),
            2..=8 => Some(self.accumulator_step_value as i8 - 9),
            9..=15 => Some(self.accumulator_step_value as i8 - 8),
            _ => None,
        }
    }

    pub fn pulses(&self) -> u8 {
        self.pulse_count + 1
    }

    pub fn retrigger_count(&self) -> u8 {
        self.retrigger + 1
    }
}

#[derive(Debug)]
pub struct NoteSequence {
    pub scale: i8,      // -1 = inherit project scale
    pub root_note: i8,  // -1 = inherit
    pub divisor: u16,   // 1..768 ticks per step-grid
    pub clock_multiplier: f32, // 0.5..1.5
    pub reset_measure: u8,     // 0..128 bars, 0 = disabled
    pub run_mode: RunMode,
    pub first_step: u8, // 0..63
    pub last_step: u8,  // 0..63
    pub mode: SequenceMode,
    pub harmony_role: HarmonyRole,
    pub master_track_index: u8,
    pub harmony_scale: u8,
    pub harmony_inversion: u8,
    pub harmony_voicing: u8,
    pub harmony_transpose: i8,
    pub accumulator: Accumulator,
    steps: [Step; NOTE_SEQUENCE_STEP_COUNT],
}

impl Default for NoteSequence {
    fn default() -> Self {
        Self {
            scale: -1,
            root_note: -1,
            divisor: 192,
            clock_multiplier: 1.0,
            reset_measure: 0,
            run_mode: RunMode::default(),
            first_step: 0,
            last_step: (NOTE_SEQUENCE_STEP_COUNT - 1) as u8,
            mode: SequenceMode::default(),
            harmony_role: HarmonyRole::default(),
            master_track_index: 0,
            harmony_scale: 0,
            harmony_inversion: 0,
            harmony_voicing: 0,
            harmony_transpose: 0,
            accumulator: Accumulator::default(),
            steps: [Step::default(); NOTE_SEQUENCE_STEP_COUNT],
        }
    }
}

impl Clone for NoteSequence {
    fn clone(&self) -> Self {
        Self {
            scale: self.scale,
            root_note: self.root_note,
            divisor: self.divisor,
            clock_multiplier: self.clock_multiplier,
            reset_measure: self.reset_measure,
            run_mode: self.run_mode,
            first_step: self.first_step,
            last_step: self.last_step,
            mode: self.mode,
            harmony_role: self.harmony_role,
            master_track_index: self.master_track_index,
            harmony_scale: self.harmony_scale,
            harmony_inversion: self.harmony_inversion,
            harmony_voicing: self.harmony_voicing,
            harmony_transpose: self.harmony_transpose,
            accumulator: Accumulator::read_fields(self.accumulator.write_fields()),
            steps: self.steps,
        }
    }
}

impl NoteSequence {
    pub fn step(&self, index: usize) -> &Step {
        &self.steps[index]
    }

    pub fn step_mut(&mut self, index: usize) -> &mut Step {
        &mut self.steps[index]
    }

    pub fn steps(&self) -> &[Step; NOTE_SEQUENCE_STEP_COUNT] {
        &self.steps
    }

    /// Clamps `last_step` to never fall below `first_step`, the invariant
    /// the firmware enforces by taking `max(firstStep, lastStep)` on read
    /// rather than rejecting the write.
    pub fn set_first_step(&mut self, value: u8) {
        self.first_step = value.min((NOTE_SEQUENCE_STEP_COUNT - 1) as u8);
        if self.last_step < self.first_step {
            self.last_step = self.first_step;
        }
    }

    pub fn set_last_step(&mut self, value: u8) {
        let clamped = value.min((NOTE_SEQUENCE_STEP_COUNT - 1) as u8);
        self.last_step = clamped.max(self.first_step);
    }

    pub fn effective_last_step(&self) -> u8 {
        self.last_step.max(self.first_step)
    }

    /// Whether `bar_count` should reset the sequence cursor, given
    /// `reset_measure` applied modulo-position wrap. Zero disables reset.
    pub fn should_reset_at_bar(&self, bar_count: u32) -> bool {
        self.reset_measure != 0 && bar_count % self.reset_measure as u32 == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn last_step_never_drops_below_first_step() {
        let mut seq = NoteSequence::default();
        seq.set_first_step(40);
        seq.set_last_step(10);
        assert_eq!(seq.effective_last_step(), 40);
    }

    #[test]
    fn first_step_push_drags_last_step_up() {
        let mut seq = NoteSequence::default();
        seq.set_last_step(5);
        seq.set_first_step(20);
        assert_eq!(seq.last_step, 20);
    }

    #[test]
    fn accumulator_override_decodes_encoded_range() {
        let mut step = Step::default();
        step.accumulator_step_value = 0;
        assert_eq!(step.accumulator_override(), None);
        step.accumulator_step_value = 1;
        assert_eq!(step.accumulator_override(), Some(0));
        step.accumulator_step_value = 2;
        assert_eq!(step.accumulator_override(), Some(-7));
        step.accumulator_step_value = 8;
        assert_eq!(step.accumulator_override(), Some(-1));
        step.accumulator_step_value = 9;
        assert_eq!(step.accumulator_override(), Some(1));
        step.accumulator_step_value = 15;
        assert_eq!(step.accumulator_override(), Some(7));
    }

    #[test]
    fn reset_measure_zero_never_resets() {
        let seq = NoteSequence::default();
        assert!(!seq.should_reset_at_bar(0));
        assert!(!seq.should_reset_at_bar(8));
    }

    #[test]
    fn reset_measure_fires_on_multiples() {
        let mut seq = NoteSequence::default();
        seq.reset_measure = 4;
        assert!(seq.should_reset_at_bar(0));
        assert!(!seq.should_reset_at_bar(1));
        assert!(seq.should_reset_at_bar(8));
    }
}

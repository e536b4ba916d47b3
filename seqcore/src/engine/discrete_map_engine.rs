//! Discrete-map track engine: converts a moving voltage (internal ramp or
//! routed external CV) into discrete stage triggers via threshold
//! crossings, with optional slew on the mapped CV output.

use crate::clock::{Tick, TickResult};
use crate::config::{CONFIG_SEQUENCE_PPQN, PPQN};
use crate::engine::{LinkData, TrackEngine};
use crate::model::discrete_map_sequence::{ClockSource, TriggerDir};
use crate::model::{DiscreteMapTrack, Scale, TrackMode};

/// A pulse this long marks "activity" on stage change, independent of the
/// mapped CV's own timing.
const ACTIVITY_PULSE_TICKS: u32 = 12;

pub struct DiscreteMapTrackEngine {
    ramp_value: f32,
    running: bool,
    prev_input: f32,
    current_input: f32,
    active_stage: i32,
    cv_output: f32,
    cv_target: f32,
    activity_remaining: u32,
    gate_output: bool,
    root_note: i8,
    scale: Scale,
}

impl DiscreteMapTrackEngine {
    pub fn new() -> Self {
        Self {
            ramp_value: 0.0,
            running: true,
            prev_input: -1000.0,
            current_input: 0.0,
            active_stage: -1,
            cv_output: 0.0,
            cv_target: 0.0,
            activity_remaining: 0,
            gate_output: false,
            root_note: 0,
            scale: Scale::chromatic(),
        }
    }

    pub fn set_scale(&mut self, scale: Scale) {
        self.scale = scale;
    }

    fn note_index_to_voltage(&self, note_index: i8) -> f32 {
        let volts = self.scale.note_to_volts(note_index as i32);
        if self.scale.is_chromatic() {
            volts + self.root_note as f32 / 12.0
        } else {
            volts
        }
    }
}

impl Default for DiscreteMapTrackEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackEngine for DiscreteMapTrackEngine {
    fn track_mode(&self) -> TrackMode {
        TrackMode::DiscreteMap
    }

    fn reset(&mut self) {
        self.ramp_value = 0.0;
        self.prev_input = -1000.0;
        self.current_input = 0.0;
        self.active_stage = -1;
        self.cv_output = 0.0;
        self.cv_target = 0.0;
        self.running = true;
        self.activity_remaining = 0;
        self.gate_output = false;
    }

    fn restart(&mut self) {
        self.running = true;
    }

    fn tick(&mut self, _tick: Tick) -> TickResult {
        TickResult::NONE
    }

    fn update(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }
    }

    fn change_pattern(&mut self) {
        self.active_stage = -1;
    }

    fn activity(&self) -> bool {
        self.activity_remaining > 0
    }

    fn gate_output(&self, channel: usize) -> bool {
        if channel == 0 { self.gate_output } else { false }
    }

    fn cv_output(&self, channel: usize) -> f32 {
        if channel == 0 { self.cv_output } else { 0.0 }
    }

    fn sequence_progress(&self) -> f32 {
        self.ramp_value
    }

    fn link_data(&self) -> Option<LinkData> {
        Some(LinkData { note_volts: self.cv_output, progress: self.ramp_value })
    }
}

fn update_ramp(engine: &mut DiscreteMapTrackEngine, tick: Tick, track: &mut DiscreteMapTrack) {
    let sequence = track.sequences.current();
    let period_ticks =
        (sequence.divisor as u32 * (PPQN / CONFIG_SEQUENCE_PPQN)).max(1);
    let pos_in_period = if engine.running { tick % period_ticks } else { period_ticks };
    let phase = pos_in_period as f32 / period_ticks as f32;
    let (min, max) = (sequence.range_low, sequence.range_high);
    engine.ramp_value = min + phase * (max - min);

    if !sequence.loop_enabled && engine.running && pos_in_period + 1 >= period_ticks {
        engine.running = false;
        engine.ramp_value = max;
    }
}

fn find_active_stage(track: &mut DiscreteMapTrack, input: f32, prev_input: f32, current_active: i32) -> i32 {
    let sequence = track.sequences.current_mut();
    for i in 0..sequence.stage_count() {
        let stage = *sequence.stage(i);
        if stage.direction == TriggerDir::Off {
            continue;
        }
        let threshold = sequence.stage_position(i);
        let crossed = match stage.direction {
            TriggerDir::Rise => prev_input < threshold && input >= threshold,
            TriggerDir::Fall => prev_input > threshold && input <= threshold,
            TriggerDir::Both => {
                (prev_input < threshold && input >= threshold)
                    || (prev_input > threshold && input <= threshold)
            }
            TriggerDir::Off => false,
        };
        if crossed {
            return i as i32;
        }
    }
    current_active
}

/// Ticks the engine against its live model: advances the internal ramp
/// (or reads routed external input), scans for a threshold crossing, and
/// slews the mapped CV output toward the new stage's note voltage.
pub fn tick_with_track(
    engine: &mut DiscreteMapTrackEngine,
    tick: Tick,
    track: &mut DiscreteMapTrack,
    external_input: f32,
) -> TickResult {
    let clock_source = track.sequences.current().clock_source;
    if clock_source != ClockSource::External {
        if engine.running || track.sequences.current().loop_enabled {
            update_ramp(engine, tick, track);
        }
        engine.current_input = engine.ramp_value;
    } else {
        engine.current_input = external_input;
    }

    let new_stage = find_active_stage(track, engine.current_input, engine.prev_input, engine.active_stage);
    let stage_changed = new_stage != engine.active_stage && new_stage >= 0;
    if stage_changed {
        engine.activity_remaining = ACTIVITY_PULSE_TICKS;
        engine.gate_output = true;
    } else if engine.activity_remaining > 0 {
        engine.activity_remaining -= 1;
        if engine.activity_remaining == 0 {
            engine.gate_output = false;
        }
    }

    let gate_changed = new_stage != engine.active_stage;
    engine.active_stage = new_stage;

    let prev_cv = engine.cv_output;
    if engine.active_stage >= 0 {
        let sequence = track.sequences.current();
        let note_index = sequence.stage(engine.active_stage as usize).note_index;
        engine.cv_target = engine.note_index_to_voltage(note_index);
        if sequence.slew_enabled {
            engine.cv_output += (engine.cv_target - engine.cv_output) * 0.1;
        } else {
            engine.cv_output = engine.cv_target;
        }
    } else {
        engine.cv_output = 0.0;
    }

    engine.prev_input = engine.current_input;

    TickResult {
        gate_update: gate_changed,
        cv_update: gate_changed || (engine.cv_output - prev_cv).abs() > 1e-6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DiscreteMapTrack;

    #[test]
    fn rise_crossing_activates_stage() {
        let mut track = DiscreteMapTrack { sequences: Default::default() };
        {
            let seq = track.sequences.current_mut();
            seq.range_low = 0.0;
            seq.range_high = 10.0;
            seq.stage_mut(0).threshold = 0; // midpoint of range
            seq.stage_mut(0).direction = TriggerDir::Rise;
            seq.stage_mut(0).note_index = 3;
        }
        let mut engine = DiscreteMapTrackEngine::new();
        engine.prev_input = -100.0;
        let new_stage = find_active_stage(&mut track, 100.0, -100.0, -1);
        assert_eq!(new_stage, 0);
        let _ = engine;
    }

    #[test]
    fn activity_pulse_expires_after_fixed_ticks() {
        let mut track = DiscreteMapTrack { sequences: Default::default() };
        {
            let seq = track.sequences.current_mut();
            seq.range_low = -5.0;
            seq.range_high = 5.0;
            seq.stage_mut(0).threshold = -100;
            seq.stage_mut(0).direction = TriggerDir::Rise;
        }
        let mut engine = DiscreteMapTrackEngine::new();
        engine.prev_input = -1000.0;
        let _ = tick_with_track(&mut engine, 0, &mut track, 0.0);
        assert!(engine.activity());
        for _ in 0..ACTIVITY_PULSE_TICKS {
            let _ = tick_with_track(&mut engine, 1, &mut track, 0.0);
        }
        assert!(!engine.activity());
    }

    #[test]
    fn off_direction_stages_are_never_crossed() {
        let mut track = DiscreteMapTrack { sequences: Default::default() };
        let stage = find_active_stage(&mut track, 1000.0, -1000.0, -1);
        assert_eq!(stage, -1);
    }
}

//! Indexed track engine: plays back an [`IndexedSequence`]'s
//! variable-duration steps, deriving gate and CV directly from the
//! currently scanned step rather than a fixed per-step tick count.

use crate::clock::{Tick, TickResult};
use crate::engine::{LinkData, TrackEngine};
use crate::model::{IndexedTrack, Scale, TrackMode};

pub struct IndexedTrackEngine {
    cv_output: f32,
    gate_output: bool,
    active_step: i32,
    progress: f32,
    activity: bool,
    scale: Scale,
}

impl IndexedTrackEngine {
    pub fn new() -> Self {
        Self {
            cv_output: 0.0,
            gate_output: false,
            active_step: -1,
            progress: 0.0,
            activity: false,
            scale: Scale::chromatic(),
        }
    }

    pub fn set_scale(&mut self, scale: Scale) {
        self.scale = scale;
    }
}

impl Default for IndexedTrackEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackEngine for IndexedTrackEngine {
    fn track_mode(&self) -> TrackMode {
        TrackMode::Indexed
    }

    fn reset(&mut self) {
        self.cv_output = 0.0;
        self.gate_output = false;
        self.active_step = -1;
        self.progress = 0.0;
        self.activity = false;
    }

    fn restart(&mut self) {
        self.active_step = -1;
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
        self.active_step = -1;
    }

    fn activity(&self) -> bool {
        self.activity
    }

    fn gate_output(&self, channel: usize) -> bool {
        if channel == 0 { self.gate_output } else { false }
    }

    fn cv_output(&self, channel: usize) -> f32 {
        if channel == 0 { self.cv_output } else { 0.0 }
    }

    fn sequence_progress(&self) -> f32 {
        self.progress
    }

    fn link_data(&self) -> Option<LinkData> {
        Some(LinkData { note_volts: self.cv_output, progress: self.progress })
    }
}

/// Ticks the indexed engine against its live model: scans the step at
/// `tick`'s position within the cumulative-duration cycle, then derives
/// gate (held for `gate_length_percent` of the step's span) and note CV
/// from that step.
pub fn tick_with_track(engine: &mut IndexedTrackEngine, tick: Tick, track: &IndexedTrack) -> TickResult {
    let sequence = track.sequences.current();
    let step_count = sequence.step_count();
    if step_count == 0 {
        return TickResult::NONE;
    }

    let step_index = sequence.step_at_tick(tick);
    let step = sequence.step(step_index);

    let total = sequence.total_duration().max(1);
    let position_in_cycle = tick % total;
    let mut offset = 0u32;
    for i in 0..step_index {
        offset += sequence.step(i).duration_ticks as u32;
    }
    let within_step = position_in_cycle - offset;

    let step_changed = step_index as i32 != engine.active_step;
    engine.active_step = step_index as i32;
    engine.progress = step_index as f32 / step_count as f32;
    engine.activity = step_changed;

    let gate_span = (step.duration_ticks as u32 * step.gate_length_percent as u32 / 100).max(1);
    let new_gate = step.gate && within_step < gate_span;
    let gate_changed = new_gate != engine.gate_output;
    engine.gate_output = new_gate;

    let prev_cv = engine.cv_output;
    if step_changed {
        engine.cv_output = engine.scale.note_to_volts(step.note as i32);
    }

    TickResult {
        gate_update: gate_changed,
        cv_update: step_changed || (engine.cv_output - prev_cv).abs() > 1e-6,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::IndexedTrack;

    fn track_with_two_steps() -> IndexedTrack {
        let mut track = IndexedTrack { sequences: Default::default() };
        {
            let sequence = track.sequences.current_mut();
            sequence.set_step_count(2);
            let step0 = sequence.step_mut(0);
            step0.duration_ticks = 10;
            step0.gate_length_percent = 50;
            step0.note = 0;
            step0.gate = true;
            let step1 = sequence.step_mut(1);
            step1.duration_ticks = 10;
            step1.gate_length_percent = 50;
            step1.note = 12;
            step1.gate = true;
        }
        track
    }

    #[test]
    fn gate_drops_after_gate_length_percent_of_step_span() {
        let track = track_with_two_steps();
        let mut engine = IndexedTrackEngine::new();
        let r0 = tick_with_track(&mut engine, 0, &track);
        assert!(r0.gate_update);
        assert!(engine.gate_output(0));

        let r_mid = tick_with_track(&mut engine, 6, &track);
        assert!(r_mid.gate_update);
        assert!(!engine.gate_output(0));
    }

    #[test]
    fn cv_follows_scanned_step_note() {
        let track = track_with_two_steps();
        let mut engine = IndexedTrackEngine::new();
        let _ = tick_with_track(&mut engine, 0, &track);
        let first = engine.cv_output(0);
        let _ = tick_with_track(&mut engine, 10, &track);
        let second = engine.cv_output(0);
        assert!(second > first);
    }

    #[test]
    fn cycle_wraps_back_to_first_step() {
        let track = track_with_two_steps();
        let mut engine = IndexedTrackEngine::new();
        let _ = tick_with_track(&mut engine, 0, &track);
        let first = engine.cv_output(0);
        let _ = tick_with_track(&mut engine, 20, &track);
        assert_eq!(engine.cv_output(0), first);
    }
}

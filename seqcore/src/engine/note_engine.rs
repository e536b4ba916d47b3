//! Note track engine: drives gate + CV for a step sequence with
//! retriggers, probability, slides and accumulator modulation.

use crate::clock::{Tick, TickResult};
use crate::config::{self, CONFIG_SEQUENCE_PPQN, EVENT_QUEUE_CAPACITY, PPQN};
use crate::engine::queue::{Event, EventQueue};
use crate::engine::{LinkData, MidiMessage, TrackEngine};
use crate::model::note_sequence::{GateMode, RunMode};
use crate::model::{NoteTrack, Scale, TrackMode};
use rand_core::RngCore;
use rand_pcg::Pcg32;

/// Per-step condition, decoded from `Step::condition` (0..127). A
/// simplified cousin of the reference firmware's full Euclidean condition
/// table: the handful of named behaviors the component design calls out
/// (always, every-N, fill, not-fill, pre-previous) plus a probability
/// roll for everything else, rather than all 128 distinct Euclidean
/// rhythms.
#[derive(Clone, Copy, Debug, PartialEq)]
enum Condition {
    Always,
    EveryN(u8),
    Fill,
    NotFill,
    PrePrevious,
    Probability(u8), // out of 127
}

fn decode_condition(raw: u8) -> Condition {
    match raw {
        0 => Condition::Always,
        1..=8 => Condition::EveryN(raw + 1),
        9 => Condition::Fill,
        10 => Condition::NotFill,
        11 => Condition::PrePrevious,
        other => Condition::Probability(other),
    }
}

fn tau_from_dt(rate_per_update: f32) -> f32 {
    // rate = 1 - exp(-dt/tau); solved for a fixed per-call rate instead of
    // an explicit tau, the reference firmware's own simplification.
    rate_per_update
}

pub struct NoteTrackEngine {
    rng: Pcg32,
    tick_counter: u64,
    cursor: i32,
    direction: i32,
    queue: EventQueue,
    gate_output: bool,
    cv_output: f32,
    cv_target: f32,
    cv_slide: bool,
    fill_active: bool,
    previous_step_gate: bool,
    scale: Scale,
    octave_offset: f32,
    transpose_offset: f32,
    accumulator_scale: f32,
    activity: bool,
    progress: f32,
    restart_pending: bool,
}

impl NoteTrackEngine {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: Pcg32::new(seed, 0xa02_bdbf7_bb3c_0a7),
            tick_counter: 0,
            cursor: 0,
            direction: 1,
            queue: EventQueue::new(),
            gate_output: false,
            cv_output: 0.0,
            cv_target: 0.0,
            cv_slide: false,
            fill_active: false,
            previous_step_gate: false,
            scale: Scale::chromatic(),
            octave_offset: 0.0,
            transpose_offset: 0.0,
            accumulator_scale: 1.0 / 12.0,
            activity: false,
            progress: 0.0,
            restart_pending: false,
        }
    }

    pub fn set_scale(&mut self, scale: Scale) {
        self.scale = scale;
    }

    fn roll(&mut self, numerator: u32, denominator: u32) -> bool {
        if denominator == 0 {
            return true;
        }
        (self.rng.next_u32() % denominator) < numerator
    }

    fn evaluate_condition(&mut self, condition: Condition, step_index: usize) -> bool {
        match condition {
            Condition::Always => true,
            Condition::EveryN(n) => step_index as u32 % n as u32 == 0,
            Condition::Fill => self.fill_active,
            Condition::NotFill => !self.fill_active,
            Condition::PrePrevious => self.previous_step_gate,
            Condition::Probability(p) => self.roll(p as u32, 127),
        }
    }

    fn advance_cursor(&mut self, track: &NoteTrack) {
        let sequence = track.sequences.current();
        let first = sequence.first_step as i32;
        let last = sequence.effective_last_step() as i32;
        let span = (last - first + 1).max(1);

        match sequence.run_mode {
            RunMode::Forward => {
                self.cursor = first + (self.cursor - first + 1).rem_euclid(span);
            }
            RunMode::Reverse => {
                self.cursor = first + (self.cursor - first - 1).rem_euclid(span);
            }
            RunMode::PingPong => {
                if span > 1 {
                    let mut next = self.cursor + self.direction;
                    if next > last {
                        self.direction = -1;
                        next = last - 1;
                    } else if next < first {
                        self.direction = 1;
                        next = first + 1;
                    }
                    self.cursor = next;
                }
            }
            RunMode::Random => {
                self.cursor = first + (self.rng.next_u32() % span as u32) as i32;
            }
            RunMode::RandomWalk => {
                let delta = if self.roll(1, 2) { 1 } else { -1 };
                self.cursor = first + (self.cursor - first + delta).rem_euclid(span);
            }
        }
    }

    fn trigger_step(&mut self, tick: Tick, track: &NoteTrack) {
        let sequence = track.sequences.current();
        let index = self.cursor.clamp(0, sequence.steps().len() as i32 - 1) as usize;
        let step = *sequence.step(index);

        let gate_passes = self.evaluate_condition(decode_condition(step.condition), index) && step.gate;
        self.previous_step_gate = gate_passes;
        if !gate_passes {
            return;
        }

        if !self.roll(step.gate_probability as u32 + 1, 8) {
            return;
        }

        // A per-step accumulator override replaces `step_value`/`direction`
        // with an explicit signed delta for this trigger only; `Some(0)`
        // means "use the sequence's own configured step amount" instead.
        // Spread-RTRIG ticks the accumulator once per scheduled gate-on
        // (recomputing CV each time) rather than once up front; burst mode
        // (the default) ticks once here and every pulse shares the result.
        let override_amount = step.accumulator_override();
        let spread_rtrig = override_amount.is_some() && config::spread_rtrig_enabled();

        let accumulator_value = if let Some(over) = override_amount {
            if spread_rtrig {
                0.0
            } else {
                match over {
                    0 => sequence.accumulator.tick(),
                    delta => sequence.accumulator.tick_with_delta(delta as i32),
                };
                sequence.accumulator.current_value() as f32
            }
        } else {
            0.0
        };

        let note_variation = if self.roll(step.note_variation_probability as u32, 8) {
            let range = step.note_variation_range as i32;
            if range == 0 { 0 } else { (self.rng.next_u32() as i32 % (2 * range.abs() + 1)) - range.abs() }
        } else {
            0
        };

        let note_contrib = self.scale.note_to_volts(step.note as i32 + note_variation)
            + self.octave_offset
            + self.transpose_offset;
        let base_volts = note_contrib + accumulator_value * self.accumulator_scale;

        let pulses = match step.gate_mode {
            GateMode::All => step.retrigger_count(),
            GateMode::First | GateMode::Hold | GateMode::FirstLast => step.retrigger_count().max(1),
        };

        let ticks_per_step =
            (track.sequences.current().divisor as u32 * (PPQN / CONFIG_SEQUENCE_PPQN)).max(1);
        let span_per_pulse = (ticks_per_step / pulses.max(1) as u32).max(1);

        for p in 0..pulses {
            let fires = match step.gate_mode {
                GateMode::All => true,
                GateMode::First => p == 0,
                GateMode::Hold => p == 0,
                GateMode::FirstLast => p == 0 || p == pulses - 1,
            };
            if !fires {
                continue;
            }
            if p > 0 && !self.roll(step.retrigger_probability as u32 + 1, 8) {
                continue;
            }
            let on_tick = tick + p as u32 * span_per_pulse + step.gate_offset.max(0) as u32;
            self.queue.push(
                on_tick,
                Event::GateOn {
                    should_tick_accumulator: spread_rtrig,
                    sequence_id: 0,
                    note_contrib,
                    override_delta: override_amount.unwrap_or(0),
                    slide: step.slide,
                },
            );
            let off_tick = if step.gate_mode == GateMode::Hold {
                tick + ticks_per_step
            } else {
                on_tick + (span_per_pulse * step.length as u32 / 8).max(1)
            };
            self.queue.push(off_tick, Event::GateOff);
        }

        if !spread_rtrig {
            self.queue.push(tick, Event::Cv { volts: base_volts, slide: step.slide });
        }
    }
}

impl TrackEngine for NoteTrackEngine {
    fn track_mode(&self) -> TrackMode {
        TrackMode::Note
    }

    fn reset(&mut self) {
        self.cursor = 0;
        self.direction = 1;
        self.queue.clear();
        self.gate_output = false;
        self.cv_output = 0.0;
        self.cv_target = 0.0;
        self.activity = false;
        self.progress = 0.0;
    }

    fn restart(&mut self) {
        self.restart_pending = true;
        self.cursor = -1;
    }

    fn tick(&mut self, _tick: Tick) -> TickResult {
        TickResult::NONE
    }

    fn update(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }
        let rate = tau_from_dt(1.0 - libm::expf(-dt / 0.02));
        if self.cv_slide {
            self.cv_output += (self.cv_target - self.cv_output) * rate;
        } else {
            self.cv_output = self.cv_target;
        }
    }

    fn change_pattern(&mut self) {
        self.queue.clear();
        self.cursor = -1;
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

    fn receive_midi(&mut self, _port: u8, _message: MidiMessage) -> bool {
        false
    }
}

/// Advances the engine against a live track reference, draining the event
/// queue and advancing the step cursor on divisor boundaries. Split out
/// from [`TrackEngine::tick`] because the trait method's `(tick)` shape
/// carries no track reference; the host calls this directly.
pub fn tick_with_track(engine: &mut NoteTrackEngine, tick: Tick, track: &NoteTrack) -> TickResult {
    let mut result = TickResult::NONE;

    let due: heapless::Vec<(Tick, Event), EVENT_QUEUE_CAPACITY> = engine.queue.drain_due(tick);
    engine.activity = false;
    for (_, event) in due {
        match event {
            Event::GateOn { should_tick_accumulator, sequence_id, note_contrib, override_delta, slide } => {
                engine.gate_output = true;
                engine.activity = true;
                let mut cv_update = false;
                if should_tick_accumulator {
                    let sequence =
                        if sequence_id == 1 { &track.fill_sequence } else { track.sequences.current() };
                    match override_delta {
                        0 => sequence.accumulator.tick(),
                        delta => sequence.accumulator.tick_with_delta(delta as i32),
                    };
                    let accumulator_value = sequence.accumulator.current_value() as f32;
                    engine.cv_target = note_contrib + accumulator_value * engine.accumulator_scale;
                    engine.cv_slide = slide;
                    cv_update = true;
                }
                result = result.merge(TickResult { gate_update: true, cv_update });
            }
            Event::GateOff => {
                engine.gate_output = false;
                result = result.merge(TickResult { gate_update: true, cv_update: false });
            }
            Event::Cv { volts, slide } => {
                engine.cv_target = volts;
                engine.cv_slide = slide;
                result = result.merge(TickResult { gate_update: false, cv_update: true });
            }
        }
    }

    let ticks_per_step =
        (track.sequences.current().divisor as u32 * (PPQN / CONFIG_SEQUENCE_PPQN)).max(1);
    if tick % ticks_per_step == 0 {
        if engine.cursor < 0 {
            engine.cursor = track.sequences.current().first_step as i32;
        } else {
            engine.advance_cursor(track);
        }
        engine.trigger_step(tick, track);
        let first = track.sequences.current().first_step as f32;
        let last = track.sequences.current().effective_last_step() as f32;
        let span = (last - first + 1.0).max(1.0);
        engine.progress = (engine.cursor as f32 - first) / span;
    }

    engine.tick_counter += 1;
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::NoteTrack;

    #[test]
    fn forward_run_mode_wraps_within_step_range() {
        let mut track = NoteTrack { sequences: Default::default(), fill_sequence: Default::default() };
        track.sequences.current_mut().set_first_step(0);
        track.sequences.current_mut().set_last_step(3);
        let mut engine = NoteTrackEngine::new(1);
        engine.reset();
        let ticks_per_step =
            (track.sequences.current().divisor as u32 * (PPQN / CONFIG_SEQUENCE_PPQN)).max(1);
        for step in 0..10 {
            let _ = tick_with_track(&mut engine, step as u32 * ticks_per_step, &track);
        }
        assert!(engine.cursor >= 0 && engine.cursor <= 3);
    }

    #[test]
    fn update_with_nonpositive_dt_is_noop() {
        let mut engine = NoteTrackEngine::new(1);
        engine.cv_output = 1.0;
        engine.cv_target = 5.0;
        engine.cv_slide = true;
        engine.update(0.0);
        assert_eq!(engine.cv_output, 1.0);
        engine.update(-1.0);
        assert_eq!(engine.cv_output, 1.0);
    }

    #[test]
    fn reset_clears_queued_events_and_outputs() {
        let mut engine = NoteTrackEngine::new(1);
        engine.queue.push(5, Event::GateOff);
        engine.gate_output = true;
        engine.reset();
        assert!(engine.queue.is_empty());
        assert!(!engine.gate_output);
    }

    #[test]
    fn burst_mode_ticks_accumulator_once_and_shares_cv_across_pulses() {
        let mut track = NoteTrack { sequences: Default::default(), fill_sequence: Default::default() };
        {
            let sequence = track.sequences.current_mut();
            sequence.accumulator.enabled = true;
            sequence.accumulator.step_value = 1;
            sequence.accumulator.min_value = 0;
            sequence.accumulator.max_value = 7;
            sequence.set_first_step(0);
            sequence.set_last_step(0);
            let step = sequence.step_mut(0);
            step.gate = true;
            step.accumulator_step_value = 1; // Some(0): use the sequence's own step value.
            step.retrigger = 3; // 4 pulses sharing one CV value.
        }
        let mut engine = NoteTrackEngine::new(1);
        engine.reset();
        engine.trigger_step(0, &track);
        let cv_events =
            engine.queue.drain_due(u32::MAX).into_iter().filter(|(_, e)| matches!(e, Event::Cv { .. })).count();
        assert_eq!(cv_events, 1);
        assert_eq!(track.sequences.current().accumulator.current_value(), 1);
    }

    #[test]
    fn spread_mode_gate_on_ticks_accumulator_and_recomputes_cv_at_fire_time() {
        let mut track = NoteTrack { sequences: Default::default(), fill_sequence: Default::default() };
        track.sequences.current_mut().accumulator.enabled = true;
        track.sequences.current_mut().accumulator.step_value = 1;
        track.sequences.current_mut().accumulator.min_value = 0;
        track.sequences.current_mut().accumulator.max_value = 7;

        let mut engine = NoteTrackEngine::new(1);
        engine.reset();
        engine.queue.push(
            0,
            Event::GateOn {
                should_tick_accumulator: true,
                sequence_id: 0,
                note_contrib: 0.0,
                override_delta: 0,
                slide: false,
            },
        );

        let result = tick_with_track(&mut engine, 0, &track);
        assert!(result.cv_update);
        assert_eq!(track.sequences.current().accumulator.current_value(), 1);
        assert!((engine.cv_target - engine.accumulator_scale).abs() < 1e-6);
    }
}

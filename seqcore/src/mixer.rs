//! Output mixer: gathers each active track engine's current gate/CV output
//! into the fixed hardware channel vectors published once per frame.

use crate::config::{CHANNEL_COUNT, TRACK_COUNT};
use crate::engine::TrackEngine;

#[derive(Clone, Copy, Debug, Default, PartialEq)]
pub struct HardwareFrame {
    pub gates: [bool; CHANNEL_COUNT],
    pub cvs: [f32; CHANNEL_COUNT],
}

/// Per-track-index to hardware-channel assignment; defaults to the
/// identity mapping (track `i` drives channel `i % CHANNEL_COUNT`).
#[derive(Clone, Copy, Debug)]
pub struct ChannelMap {
    channels: [u8; TRACK_COUNT],
}

impl Default for ChannelMap {
    fn default() -> Self {
        let mut channels = [0u8; TRACK_COUNT];
        for (i, slot) in channels.iter_mut().enumerate() {
            *slot = (i % CHANNEL_COUNT) as u8;
        }
        Self { channels }
    }
}

impl ChannelMap {
    pub fn set(&mut self, track_index: usize, channel: usize) {
        if track_index < TRACK_COUNT && channel < CHANNEL_COUNT {
            self.channels[track_index] = channel as u8;
        }
    }

    pub fn channel_for(&self, track_index: usize) -> usize {
        self.channels.get(track_index).copied().unwrap_or(0) as usize
    }
}

/// Per-CV-channel clamp range, volts.
#[derive(Clone, Copy, Debug)]
pub struct ChannelRange {
    pub min_volts: f32,
    pub max_volts: f32,
}

impl Default for ChannelRange {
    fn default() -> Self {
        Self { min_volts: -5.0, max_volts: 5.0 }
    }
}

pub struct Mixer {
    channel_map: ChannelMap,
    channel_ranges: [ChannelRange; CHANNEL_COUNT],
}

impl Default for Mixer {
    fn default() -> Self {
        Self { channel_map: ChannelMap::default(), channel_ranges: [ChannelRange::default(); CHANNEL_COUNT] }
    }
}

impl Mixer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn channel_map_mut(&mut self) -> &mut ChannelMap {
        &mut self.channel_map
    }

    pub fn set_channel_range(&mut self, channel: usize, range: ChannelRange) {
        if channel < CHANNEL_COUNT {
            self.channel_ranges[channel] = range;
        }
    }

    /// Samples every engine's channel-0 gate/CV output at the current
    /// frame boundary and clamps each CV to its channel's configured
    /// range. Engines are sampled in the order given, matching the
    /// track-index-ascending sampling order the rest of the core uses.
    pub fn sample(&self, engines: &[&dyn TrackEngine]) -> HardwareFrame {
        let mut frame = HardwareFrame::default();
        for (track_index, engine) in engines.iter().enumerate().take(TRACK_COUNT) {
            let channel = self.channel_map.channel_for(track_index);
            let range = self.channel_ranges[channel];

            let gate = engine.gate_output(0);
            let cv = engine.cv_output(0).clamp(range.min_volts, range.max_volts);

            frame.gates[channel] = frame.gates[channel] || gate;
            frame.cvs[channel] = cv;
        }
        frame
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::{Tick, TickResult};
    use crate::model::TrackMode;

    struct StubEngine {
        gate: bool,
        cv: f32,
    }

    impl TrackEngine for StubEngine {
        fn track_mode(&self) -> TrackMode {
            TrackMode::Curve
        }
        fn reset(&mut self) {}
        fn restart(&mut self) {}
        fn tick(&mut self, _tick: Tick) -> TickResult {
            TickResult::NONE
        }
        fn update(&mut self, _dt: f32) {}
        fn change_pattern(&mut self) {}
        fn activity(&self) -> bool {
            false
        }
        fn gate_output(&self, _channel: usize) -> bool {
            self.gate
        }
        fn cv_output(&self, _channel: usize) -> f32 {
            self.cv
        }
        fn sequence_progress(&self) -> f32 {
            0.0
        }
    }

    #[test]
    fn identity_channel_map_routes_track_to_matching_channel() {
        let mixer = Mixer::new();
        let engine_a = StubEngine { gate: true, cv: 2.0 };
        let engine_b = StubEngine { gate: false, cv: -1.0 };
        let engines: [&dyn TrackEngine; 2] = [&engine_a, &engine_b];
        let frame = mixer.sample(&engines);
        assert!(frame.gates[0]);
        assert!(!frame.gates[1]);
        assert_eq!(frame.cvs[0], 2.0);
        assert_eq!(frame.cvs[1], -1.0);
    }

    #[test]
    fn cv_output_is_clamped_to_channel_range() {
        let mut mixer = Mixer::new();
        mixer.set_channel_range(0, ChannelRange { min_volts: -2.0, max_volts: 2.0 });
        let engine = StubEngine { gate: false, cv: 9.0 };
        let engines: [&dyn TrackEngine; 1] = [&engine];
        let frame = mixer.sample(&engines);
        assert_eq!(frame.cvs[0], 2.0);
    }

    #[test]
    fn remapped_channel_is_honored() {
        let mut mixer = Mixer::new();
        mixer.channel_map_mut().set(0, 3);
        let engine = StubEngine { gate: true, cv: 1.0 };
        let engines: [&dyn TrackEngine; 1] = [&engine];
        let frame = mixer.sample(&engines);
        assert!(frame.gates[3]);
        assert_eq!(frame.cvs[3], 1.0);
    }
}

//! Teletype track: the model backing a [`crate::bridge`]-driven scripted
//! track — I/O routing tables, script/pattern slots and the per-output CV
//! shaping parameters the persistence format round-trips.

use heapless::{String, Vec};

pub const SCRIPT_SLOT_COUNT: usize = 8;
pub const SCRIPT_LINES_PER_SLOT: usize = 48;
pub const SCRIPT_LINE_LEN: usize = 64;
pub const PATTERN_SLOT_COUNT: usize = 4;
pub const PATTERN_LENGTH: usize = 64;
pub const CV_OUTPUT_COUNT: usize = 4;
pub const TR_OUTPUT_COUNT: usize = 8;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Timebase {
    #[default]
    Ms,
    Beats,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MidiPort {
    #[default]
    Usb,
    Trs,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum MidiChannel {
    #[default]
    Omni,
    Channel(u8),
}

pub type ScriptLine = String<SCRIPT_LINE_LEN>;

#[derive(Clone, Debug, Default)]
pub struct Script {
    lines: Vec<ScriptLine, SCRIPT_LINES_PER_SLOT>,
}

impl Script {
    pub fn lines(&self) -> &[ScriptLine] {
        &self.lines
    }

    pub fn push_line(&mut self, line: ScriptLine) -> Result<(), ScriptLine> {
        self.lines.push(line)
    }

    pub fn clear(&mut self) {
        self.lines.clear();
    }
}

#[derive(Clone, Copy, Debug)]
pub struct Pattern {
    pub values: [i16; PATTERN_LENGTH],
    pub length: u8,
    pub wrap: u8,
    pub start: u8,
    pub end: u8,
}

impl Default for Pattern {
    fn default() -> Self {
        Self {
            values: [0; PATTERN_LENGTH],
            length: PATTERN_LENGTH as u8,
            wrap: PATTERN_LENGTH as u8,
            start: 0,
            end: (PATTERN_LENGTH - 1) as u8,
        }
    }
}

/// Per-CV-output shaping: range/polarity, a fixed raw offset, quantize
/// scale selection and root note, matching the `CVn RNG/OFF/Q/ROOT` file
/// format lines.
#[derive(Clone, Copy, Debug)]
pub struct CvOutputConfig {
    pub range_volts: f32,
    pub bipolar: bool,
    pub offset_raw: i16,
    pub quantize_scale: Option<u8>, // None = Default (chromatic)
    pub root_note: u8,              // 0..11
}

impl Default for CvOutputConfig {
    fn default() -> Self {
        Self { range_volts: 5.0, bipolar: true, offset_raw: 0, quantize_scale: None, root_note: 0 }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct IoRoute {
    pub source: i16, // -1 = none; track engines interpret non-negative codes
}

#[derive(Clone, Debug)]
pub struct TeletypeTrack {
    pub name: String<32>,
    pub tr_inputs: [IoRoute; TR_OUTPUT_COUNT],
    pub cv_input: IoRoute,
    pub tr_outputs: [IoRoute; TR_OUTPUT_COUNT],
    pub cv_outputs: [CvOutputConfig; CV_OUTPUT_COUNT],
    pub midi_port: MidiPort,
    pub midi_channel: MidiChannel,
    pub boot_script: u8, // 1..SCRIPT_SLOT_COUNT
    pub clock_divisor: u16,
    pub clock_multiplier_percent: u16, // 100 = 1x
    pub reset_metro_on_load: bool,
    pub timebase: Timebase,
    pub scripts: [Script; SCRIPT_SLOT_COUNT],
    pub metro_scripts: [Script; 2],
    pub patterns: [Pattern; PATTERN_SLOT_COUNT],
}

impl Default for TeletypeTrack {
    fn default() -> Self {
        Self {
            name: String::new(),
            tr_inputs: [IoRoute::default(); TR_OUTPUT_COUNT],
            cv_input: IoRoute::default(),
            tr_outputs: [IoRoute::default(); TR_OUTPUT_COUNT],
            cv_outputs: [CvOutputConfig::default(); CV_OUTPUT_COUNT],
            midi_port: MidiPort::default(),
            midi_channel: MidiChannel::default(),
            boot_script: 1,
            clock_divisor: 12,
            clock_multiplier_percent: 100,
            reset_metro_on_load: true,
            timebase: Timebase::default(),
            scripts: Default::default(),
            metro_scripts: Default::default(),
            patterns: [Pattern::default(); PATTERN_SLOT_COUNT],
        }
    }
}

impl TeletypeTrack {
    pub fn script(&self, slot: usize) -> &Script {
        &self.scripts[slot]
    }

    pub fn script_mut(&mut self, slot: usize) -> &mut Script {
        &mut self.scripts[slot]
    }

    pub fn pattern(&self, slot: usize) -> &Pattern {
        &self.patterns[slot]
    }

    pub fn pattern_mut(&mut self, slot: usize) -> &mut Pattern {
        &mut self.patterns[slot]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_boot_script_is_slot_one() {
        let track = TeletypeTrack::default();
        assert_eq!(track.boot_script, 1);
    }

    #[test]
    fn pattern_default_spans_full_length() {
        let track = TeletypeTrack::default();
        let pattern = track.pattern(0);
        assert_eq!(pattern.length as usize, PATTERN_LENGTH);
        assert_eq!(pattern.start, 0);
        assert_eq!(pattern.end as usize, PATTERN_LENGTH - 1);
    }

    #[test]
    fn script_lines_accumulate_in_order() {
        let mut track = TeletypeTrack::default();
        let script = track.script_mut(0);
        script.push_line("TR.PULSE 1".parse().unwrap()).unwrap();
        script.push_line("CV 1 V 2.5".parse().unwrap()).unwrap();
        assert_eq!(script.lines().len(), 2);
        assert_eq!(script.lines()[0].as_str(), "TR.PULSE 1");
    }

    #[test]
    fn cv_output_default_is_five_volt_bipolar_chromatic() {
        let track = TeletypeTrack::default();
        let cv = track.cv_outputs[0];
        assert_eq!(cv.range_volts, 5.0);
        assert!(cv.bipolar);
        assert_eq!(cv.quantize_scale, None);
    }
}

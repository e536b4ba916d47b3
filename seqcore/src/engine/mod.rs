//! Track engines: per-track state machines translating the tick stream
//! into scheduled gate/CV events.

pub mod curve_engine;
pub mod discrete_map_engine;
pub mod indexed_engine;
pub mod note_engine;
pub mod queue;
pub mod teletype_engine;

pub use curve_engine::CurveTrackEngine;
pub use discrete_map_engine::DiscreteMapTrackEngine;
pub use indexed_engine::IndexedTrackEngine;
pub use note_engine::NoteTrackEngine;
pub use teletype_engine::TeletypeTrackEngine;

use crate::clock::{Tick, TickResult};
use crate::model::TrackMode;

/// Follow-link info a track engine exposes for another track to read its
/// current note/progress (harmony followers, link-mode playback).
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct LinkData {
    pub note_volts: f32,
    pub progress: f32,
}

/// A MIDI message as forwarded to `receive_midi`/`monitor_midi`. Kept
/// minimal: only the fields a track engine actually reacts to.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum MidiMessage {
    NoteOn { channel: u8, note: u8, velocity: u8 },
    NoteOff { channel: u8, note: u8 },
    ControlChange { channel: u8, controller: u8, value: u8 },
    PitchBend { channel: u8, value: i16 },
}

/// The common interface every track engine kind implements. One engine
/// instance owns one track's runtime state; the model (`Track`) holds the
/// data the engine reads and mutates via routing.
pub trait TrackEngine {
    fn track_mode(&self) -> TrackMode;
    fn reset(&mut self);
    fn restart(&mut self);
    /// `tick` must be monotone nondecreasing within one playback run.
    fn tick(&mut self, tick: Tick) -> TickResult;
    /// A no-op when `dt <= 0.0`.
    fn update(&mut self, dt: f32);
    fn change_pattern(&mut self);
    /// UI-facing "something just happened" flag, cleared each tick.
    fn activity(&self) -> bool;
    fn gate_output(&self, channel: usize) -> bool;
    fn cv_output(&self, channel: usize) -> f32;
    fn sequence_progress(&self) -> f32;
    fn link_data(&self) -> Option<LinkData> {
        None
    }
    fn receive_midi(&mut self, _port: u8, _message: MidiMessage) -> bool {
        false
    }
    fn monitor_midi(&mut self, _tick: Tick, _message: MidiMessage) {}
}

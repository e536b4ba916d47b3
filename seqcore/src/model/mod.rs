//! Pattern data model, the Accumulator and the scale library that
//! sequences reference.

pub mod accumulator;
pub mod curve_sequence;
pub mod discrete_map_sequence;
pub mod indexed_sequence;
pub mod note_sequence;
pub mod scale;
pub mod teletype_track;

pub use accumulator::Accumulator;
pub use curve_sequence::CurveSequence;
pub use discrete_map_sequence::DiscreteMapSequence;
pub use indexed_sequence::IndexedSequence;
pub use note_sequence::{NoteSequence, Step};
pub use scale::Scale;
pub use teletype_track::TeletypeTrack;

/// A project's tagged-union track, one variant per engine kind. A sum type
/// with match-on-variant dispatch, rather than a trait-object hierarchy.
#[derive(Debug)]
pub enum Track {
    Note(NoteTrack),
    Curve(CurveTrack),
    DiscreteMap(DiscreteMapTrack),
    Indexed(IndexedTrack),
    Teletype(alloc::boxed::Box<TeletypeTrack>),
}

impl Track {
    pub fn mode(&self) -> TrackMode {
        match self {
            Track::Note(_) => TrackMode::Note,
            Track::Curve(_) => TrackMode::Curve,
            Track::DiscreteMap(_) => TrackMode::DiscreteMap,
            Track::Indexed(_) => TrackMode::Indexed,
            Track::Teletype(_) => TrackMode::Teletype,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TrackMode {
    Note,
    Curve,
    DiscreteMap,
    Indexed,
    Teletype,
}

use crate::config::{CONFIG_PATTERN_COUNT, CONFIG_SNAPSHOT_COUNT};

const SEQUENCE_SLOTS: usize = CONFIG_PATTERN_COUNT + CONFIG_SNAPSHOT_COUNT;

/// A track variant owns `CONFIG_PATTERN_COUNT + CONFIG_SNAPSHOT_COUNT`
/// sequences, indexed by the track's current playback pattern index.
#[derive(Debug)]
pub struct SequenceBank<S> {
    slots: heapless::Vec<S, SEQUENCE_SLOTS>,
    pattern_index: usize,
}

impl<S: Default + Clone> SequenceBank<S> {
    pub fn new() -> Self {
        let mut slots = heapless::Vec::new();
        for _ in 0..SEQUENCE_SLOTS {
            let _ = slots.push(S::default());
        }
        Self { slots, pattern_index: 0 }
    }

    pub fn pattern_index(&self) -> usize {
        self.pattern_index
    }

    pub fn set_pattern_index(&mut self, index: usize) {
        self.pattern_index = index.min(SEQUENCE_SLOTS - 1);
    }

    pub fn current(&self) -> &S {
        &self.slots[self.pattern_index]
    }

    pub fn current_mut(&mut self) -> &mut S {
        &mut self.slots[self.pattern_index]
    }

    pub fn get(&self, index: usize) -> Option<&S> {
        self.slots.get(index)
    }
}

impl<S: Default + Clone> Default for SequenceBank<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug)]
pub struct NoteTrack {
    pub sequences: SequenceBank<NoteSequence>,
    pub fill_sequence: NoteSequence,
}

#[derive(Debug)]
pub struct CurveTrack {
    pub sequences: SequenceBank<CurveSequence>,
}

#[derive(Debug)]
pub struct DiscreteMapTrack {
    pub sequences: SequenceBank<DiscreteMapSequence>,
}

#[derive(Debug)]
pub struct IndexedTrack {
    pub sequences: SequenceBank<IndexedSequence>,
}

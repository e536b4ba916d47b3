//! Compile-time constants and feature switches shared by every subsystem.

/// Finest musical subdivision used for sequencing.
pub const CONFIG_SEQUENCE_PPQN: u32 = 4;

/// Tick resolution. A multiple of [`CONFIG_SEQUENCE_PPQN`] so that
/// retriggers and gate offsets can subdivide a step further than the
/// sequencing grid itself.
pub const PPQN: u32 = 192;

/// Number of user-editable patterns per track variant.
pub const CONFIG_PATTERN_COUNT: usize = 16;

/// Number of live performance snapshots per track variant, stored alongside
/// the editable patterns.
pub const CONFIG_SNAPSHOT_COUNT: usize = 8;

/// Number of hardware gate/CV channels the mixer publishes.
pub const CHANNEL_COUNT: usize = 8;

/// Number of tracks a project owns.
pub const TRACK_COUNT: usize = 8;

/// Capacity of each track engine's gate/CV event queue.
pub const EVENT_QUEUE_CAPACITY: usize = 16;

/// Number of stages in a [`crate::model::discrete_map_sequence::DiscreteMapSequence`].
pub const DISCRETE_MAP_STAGE_COUNT: usize = 32;

/// Number of steps in a [`crate::model::note_sequence::NoteSequence`].
pub const NOTE_SEQUENCE_STEP_COUNT: usize = 64;

/// Number of steps in a [`crate::model::curve_sequence::CurveSequence`].
pub const CURVE_SEQUENCE_STEP_COUNT: usize = 16;

/// Returns true when the experimental spread-RTRIG accumulator-ticking
/// semantics are compiled in. A build-time switch, not a runtime one: the
/// `Gate` event's field layout differs between the two (it grows
/// `should_tick_accumulator` and `sequence_id` under spread mode), so the
/// two semantics must be pinned per build rather than toggled live.
pub const fn spread_rtrig_enabled() -> bool {
    cfg!(feature = "spread_rtrig")
}

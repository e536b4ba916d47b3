//! Host-side demo: wires up one track of each engine kind, drives them
//! through a few bars of ticks, and logs the mixer frame whenever a gate or
//! CV changes.

use log::info;

use seqcore::clock::{tick_duration, ClockSource};
use seqcore::config::{CONFIG_SEQUENCE_PPQN, PPQN};
use seqcore::engine::curve_engine::{self, CurveTrackEngine};
use seqcore::engine::discrete_map_engine::{self, DiscreteMapTrackEngine};
use seqcore::engine::indexed_engine::{self, IndexedTrackEngine};
use seqcore::engine::note_engine::{self, NoteTrackEngine};
use seqcore::engine::teletype_engine::{self, TeletypeTrackEngine};
use seqcore::engine::TrackEngine;
use seqcore::mixer::{HardwareFrame, Mixer};
use seqcore::model::discrete_map_sequence::TriggerDir;
use seqcore::model::{CurveTrack, DiscreteMapTrack, IndexedTrack, NoteTrack, TeletypeTrack};

const BPM: f32 = 120.0;
const BARS: u32 = 2;

fn demo_note_track() -> NoteTrack {
    let mut track = NoteTrack { sequences: Default::default(), fill_sequence: Default::default() };
    let sequence = track.sequences.current_mut();
    sequence.set_first_step(0);
    sequence.set_last_step(7);
    for i in 0..8 {
        let step = sequence.step_mut(i);
        step.gate = i % 2 == 0;
        step.note = (i as i16) * 2;
    }
    track
}

fn demo_curve_track() -> CurveTrack {
    CurveTrack { sequences: Default::default() }
}

fn demo_discrete_map_track() -> DiscreteMapTrack {
    let mut track = DiscreteMapTrack { sequences: Default::default() };
    let sequence = track.sequences.current_mut();
    sequence.range_low = -5.0;
    sequence.range_high = 5.0;
    for i in 0..4 {
        let stage = sequence.stage_mut(i);
        stage.threshold = -75 + i as i8 * 50;
        stage.direction = TriggerDir::Rise;
        stage.note_index = i as i8 * 3;
    }
    track
}

fn demo_indexed_track() -> IndexedTrack {
    let mut track = IndexedTrack { sequences: Default::default() };
    let sequence = track.sequences.current_mut();
    sequence.set_step_count(4);
    for i in 0..4 {
        let step = sequence.step_mut(i);
        step.duration_ticks = 24;
        step.gate_length_percent = 50;
        step.note = i as i16 * 3;
        step.gate = true;
    }
    track
}

fn main() {
    env_logger::init();

    let note_track = demo_note_track();
    let curve_track = demo_curve_track();
    let mut discrete_map_track = demo_discrete_map_track();
    let indexed_track = demo_indexed_track();
    let mut teletype_track = TeletypeTrack::default();

    let mut note_engine = NoteTrackEngine::new(0xC0FFEE);
    let mut curve_engine = CurveTrackEngine::new();
    let mut discrete_map_engine = DiscreteMapTrackEngine::new();
    let mut indexed_engine = IndexedTrackEngine::new();
    let mut teletype_engine = TeletypeTrackEngine::new();

    let mixer = Mixer::new();
    let mut clock = ClockSource::new();

    let ticks_per_step = (note_track.sequences.current().divisor as u32 * (PPQN / CONFIG_SEQUENCE_PPQN)).max(1);
    let ticks_per_bar = ticks_per_step * 8;
    let dt = tick_duration(BPM, PPQN).as_micros() as f32 / 1_000_000.0;

    let mut last_frame = HardwareFrame::default();

    for _ in 0..(ticks_per_bar * BARS) {
        let tick = clock.advance();

        let _ = note_engine::tick_with_track(&mut note_engine, tick, &note_track);
        let _ = curve_engine::tick_with_track(&mut curve_engine, tick, &curve_track);
        let _ = discrete_map_engine::tick_with_track(&mut discrete_map_engine, tick, &mut discrete_map_track, 0.0);
        let _ = indexed_engine::tick_with_track(&mut indexed_engine, tick, &indexed_track);
        let _ = teletype_engine::tick_with_track(&mut teletype_engine, tick, &mut teletype_track);

        note_engine.update(dt);
        curve_engine.update(dt);
        discrete_map_engine.update(dt);
        indexed_engine.update(dt);
        teletype_engine.update(dt);

        let engines: [&dyn TrackEngine; 5] =
            [&note_engine, &curve_engine, &discrete_map_engine, &indexed_engine, &teletype_engine];
        let frame = mixer.sample(&engines);

        if frame != last_frame {
            info!("tick {tick}: gates={:?} cvs={:?}", frame.gates, frame.cvs);
            last_frame = frame;
        }
    }
}

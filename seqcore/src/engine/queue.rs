//! Bounded ascending-tick event queue shared by every track engine.
//!
//! Modelled as a fixed-capacity `heapless::Vec` kept sorted by `tick` on
//! insert, rather than a binary heap: the capacity is only 16 so an
//! insertion-sort scan is cheaper than heap bookkeeping, and a sorted
//! array lets `drain_due` pop a contiguous prefix in insertion order —
//! matching the tie-break rule that events scheduled at the same tick fire
//! in the order they were enqueued.

use crate::clock::Tick;
use crate::config::EVENT_QUEUE_CAPACITY;
use heapless::Vec;

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Event {
    GateOn {
        should_tick_accumulator: bool,
        sequence_id: u32,
        /// Note/octave/transpose contribution, excluding the accumulator.
        /// Only read when `should_tick_accumulator` is set: spread-RTRIG
        /// recomputes CV at fire time instead of at schedule time.
        note_contrib: f32,
        /// Signed accumulator delta for this trigger (0 = use the
        /// sequence's own step value/direction), mirroring
        /// `Step::accumulator_override`.
        override_delta: i8,
        slide: bool,
    },
    GateOff,
    Cv { volts: f32, slide: bool },
}

#[derive(Clone, Copy, Debug)]
struct Scheduled {
    tick: Tick,
    event: Event,
}

#[derive(Debug, Default)]
pub struct EventQueue {
    entries: Vec<Scheduled, EVENT_QUEUE_CAPACITY>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self { entries: Vec::new() }
    }

    /// Inserts keeping ascending-tick order, ties broken by insertion
    /// order (new entries with an equal tick go after existing ones).
    /// Drops the new entry when the queue is full rather than evicting an
    /// existing one: overflow drops the newest insertion.
    pub fn push(&mut self, tick: Tick, event: Event) -> bool {
        if self.entries.is_full() {
            return false;
        }
        let pos = self.entries.iter().position(|e| e.tick > tick).unwrap_or(self.entries.len());
        self.entries.insert(pos, Scheduled { tick, event }).is_ok()
    }

    /// Removes and returns every event due at or before `current_tick`, in
    /// the order they should fire.
    pub fn drain_due(&mut self, current_tick: Tick) -> Vec<(Tick, Event), EVENT_QUEUE_CAPACITY> {
        let mut due = Vec::new();
        while let Some(first) = self.entries.first() {
            if first.tick > current_tick {
                break;
            }
            let Scheduled { tick, event } = self.entries.remove(0);
            let _ = due.push((tick, event));
        }
        due
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gate_on(sequence_id: u32) -> Event {
        Event::GateOn {
            should_tick_accumulator: false,
            sequence_id,
            note_contrib: 0.0,
            override_delta: 0,
            slide: false,
        }
    }

    #[test]
    fn drains_in_ascending_tick_order() {
        let mut q = EventQueue::new();
        q.push(10, Event::GateOff);
        q.push(5, gate_on(0));
        q.push(7, Event::Cv { volts: 1.0, slide: false });

        let due = q.drain_due(100);
        assert_eq!(due.len(), 3);
        assert_eq!(due[0].0, 5);
        assert_eq!(due[1].0, 7);
        assert_eq!(due[2].0, 10);
    }

    #[test]
    fn ties_preserve_insertion_order() {
        let mut q = EventQueue::new();
        q.push(5, gate_on(1));
        q.push(5, gate_on(2));

        let due = q.drain_due(5);
        match due[0].1 {
            Event::GateOn { sequence_id, .. } => assert_eq!(sequence_id, 1),
            _ => panic!("wrong event"),
        }
        match due[1].1 {
            Event::GateOn { sequence_id, .. } => assert_eq!(sequence_id, 2),
            _ => panic!("wrong event"),
        }
    }

    #[test]
    fn overflow_drops_newest_insertion() {
        let mut q = EventQueue::new();
        for i in 0..EVENT_QUEUE_CAPACITY {
            assert!(q.push(i as Tick, Event::GateOff));
        }
        assert!(!q.push(999, Event::GateOff));
        assert_eq!(q.len(), EVENT_QUEUE_CAPACITY);
    }

    #[test]
    fn drain_due_leaves_future_events_queued() {
        let mut q = EventQueue::new();
        q.push(5, Event::GateOff);
        q.push(15, Event::GateOff);
        let due = q.drain_due(10);
        assert_eq!(due.len(), 1);
        assert_eq!(q.len(), 1);
    }
}

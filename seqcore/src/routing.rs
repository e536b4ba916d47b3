//! Routing & modulation bus: maps CV/MIDI sources onto routable track
//! parameters, shaped per-route by a bias/depth/shaper chain.

use crate::config::TRACK_COUNT;
use crate::error::SeqError;
use heapless::Vec;

pub const MAX_ROUTES: usize = 32;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Source {
    CvIn(u8), // 1..4
    MidiCc { channel: u8, controller: u8 },
    MidiNote { channel: u8 },
    MidiPitchBend { channel: u8 },
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Target {
    Divisor,
    Scale,
    RootNote,
    Octave,
    Transpose,
    Offset,
    SlideTime,
    FirstStep,
    LastStep,
    RunMode,
    ClockMult,
    DiscreteMapRangeHigh,
    DiscreteMapRangeLow,
    CvOutputRotate,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Shaper {
    #[default]
    None,
    Crease,
    Location,
    Envelope,
    TriangleFold,
    FrequencyFollower,
    Activity,
    ProgressiveDivider,
    VcaNext,
}

impl Shaper {
    /// Applies the shaper to a normalized `[0, 1]` sample. `Crease` and
    /// `TriangleFold` are genuine waveshapers; the activity/frequency/
    /// progressive-divider/VCA-chaining shapers need external state this
    /// bus doesn't carry and fall back to identity, matching the "no
    /// hardware I/O" scope boundary.
    pub fn apply(&self, x: f32) -> f32 {
        match self {
            Shaper::None => x,
            Shaper::Crease => {
                if x < 0.5 { 2.0 * x * x } else { 1.0 - 2.0 * (1.0 - x) * (1.0 - x) }
            }
            Shaper::TriangleFold => 1.0 - (2.0 * x - 1.0).abs(),
            Shaper::Location
            | Shaper::Envelope
            | Shaper::FrequencyFollower
            | Shaper::Activity
            | Shaper::ProgressiveDivider
            | Shaper::VcaNext => x,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Route {
    pub source: Source,
    pub target: Target,
    pub track_index: u8,
    pub source_min: f32,
    pub source_max: f32,
    pub target_min: f32,
    pub target_max: f32,
    pub bias_percent: i8, // -100..100
    pub depth_percent: i8, // -100..100
    pub shaper: Shaper,
}

impl Route {
    /// Sample -> clamp -> shape -> scale by depth -> offset by bias ->
    /// scale into target range.
    pub fn apply(&self, raw_sample: f32) -> f32 {
        let clamped = raw_sample.clamp(
            self.source_min.min(self.source_max),
            self.source_min.max(self.source_max),
        );
        let normalized = if (self.source_max - self.source_min).abs() < f32::EPSILON {
            0.0
        } else {
            (clamped - self.source_min) / (self.source_max - self.source_min)
        };
        let shaped = self.shaper.apply(normalized);
        let depth = self.depth_percent as f32 / 100.0;
        let bias = self.bias_percent as f32 / 100.0;
        let scaled = (shaped * depth + bias).clamp(0.0, 1.0);
        self.target_min + scaled * (self.target_max - self.target_min)
    }
}

#[derive(Default)]
pub struct RoutingBus {
    routes: Vec<Route, MAX_ROUTES>,
}

impl RoutingBus {
    pub fn new() -> Self {
        Self { routes: Vec::new() }
    }

    /// Rejects a route whose `(target, track_index)` pair is already
    /// claimed by an existing route, identifying the conflicting index.
    pub fn commit(&mut self, route: Route) -> Result<usize, SeqError> {
        if let Some(existing_index) = self.routes.iter().position(|existing| {
            existing.target == route.target && existing.track_index == route.track_index
        }) {
            return Err(SeqError::ConflictingRoute { existing_route_index: existing_index });
        }
        self.routes.push(route).map(|_| self.routes.len() - 1).map_err(|_| {
            SeqError::Validation("route table full".parse().unwrap_or_default())
        })
    }

    pub fn remove(&mut self, index: usize) -> Option<Route> {
        if index < self.routes.len() { Some(self.routes.remove(index)) } else { None }
    }

    pub fn routes_for_track(&self, track_index: u8) -> impl Iterator<Item = &Route> {
        self.routes.iter().filter(move |r| r.track_index == track_index || track_index as usize >= TRACK_COUNT)
    }

    pub fn len(&self) -> usize {
        self.routes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_route(track_index: u8) -> Route {
        Route {
            source: Source::CvIn(1),
            target: Target::Divisor,
            track_index,
            source_min: 0.0,
            source_max: 5.0,
            target_min: 1.0,
            target_max: 768.0,
            bias_percent: 0,
            depth_percent: 100,
            shaper: Shaper::None,
        }
    }

    #[test]
    fn conflicting_route_is_rejected_with_index() {
        let mut bus = RoutingBus::new();
        bus.commit(sample_route(0)).unwrap();
        let err = bus.commit(sample_route(0)).unwrap_err();
        assert_eq!(err, SeqError::ConflictingRoute { existing_route_index: 0 });
    }

    #[test]
    fn same_target_different_track_does_not_conflict() {
        let mut bus = RoutingBus::new();
        bus.commit(sample_route(0)).unwrap();
        assert!(bus.commit(sample_route(1)).is_ok());
    }

    #[test]
    fn apply_maps_source_range_into_target_range() {
        let route = sample_route(0);
        assert!((route.apply(0.0) - 1.0).abs() < 1e-4);
        assert!((route.apply(5.0) - 768.0).abs() < 1e-2);
        assert!((route.apply(2.5) - ((1.0 + 768.0) / 2.0)).abs() < 1.0);
    }

    #[test]
    fn bias_and_depth_scale_and_offset_the_shaped_value() {
        let mut route = sample_route(0);
        route.depth_percent = 50;
        route.bias_percent = 25;
        let full_scale = route.apply(5.0);
        assert!(full_scale < sample_route(0).apply(5.0));
    }

    #[test]
    fn crease_shaper_is_symmetric_around_midpoint() {
        let shaper = Shaper::Crease;
        let low = shaper.apply(0.25);
        let high = shaper.apply(0.75);
        assert!((low + high - 1.0).abs() < 1e-6);
    }
}

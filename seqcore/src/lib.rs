#![no_std]

//! Realtime sequencing core for a modular-synthesizer step sequencer:
//! track engines, event scheduling, the discrete-map threshold detector,
//! the Geode voice engine and the deterministic procedural pattern
//! generators. Hardware I/O, persistence beyond the Teletype track record,
//! and the UI layer are out of scope; see the module docs for the exact
//! boundary each subsystem exposes.

extern crate alloc;

pub mod bridge;
pub mod clock;
pub mod config;
pub mod engine;
pub mod error;
pub mod generators;
pub mod geode;
pub mod mixer;
pub mod model;
pub mod routing;
pub mod teletype_format;

pub use error::SeqError;

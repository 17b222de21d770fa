//! Zoneprof - low-overhead frame profiling into a fixed byte buffer
//!
//! A [`Recorder`](recorder::Recorder) appends compact, variable-length events
//! (zone starts and ends, labels, named variables, time checkpoints) to a
//! caller-supplied buffer without allocating. The rest of the crate reads
//! those bytes back lazily: [`EventRange`](decoder::EventRange) decodes
//! events, [`ZoneRange`](zone_range::ZoneRange) rebuilds nested zones,
//! [`VariableRange`](variable_range::VariableRange) pairs variables with their
//! names, and [`accumulate_zones`](accumulate::accumulate_zones) merges
//! matching zones into aggregate statistics.

pub mod accumulate;
pub mod cli;
pub mod clock;
pub mod codec;
pub mod config;
pub mod decoder;
pub mod error;
pub mod event;
pub mod recorder;
pub mod report;
pub mod variable_range;
pub mod zone_range;

pub use accumulate::{accumulate_zones, AccumulatedZoneData, AccumulatedZones, DurationStats};
pub use clock::{Clock, MonotonicClock};
pub use decoder::EventRange;
pub use error::{AccumulateError, CodecError, DecodeError};
pub use event::{Event, EventId, EventKind, VariableType, VariableValue};
pub use recorder::{Diagnostics, Recorder, Zone};
pub use variable_range::{NamedVariable, VariableRange};
pub use zone_range::{ZoneData, ZoneRange};

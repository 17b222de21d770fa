//! Event recorder writing into a fixed caller-provided buffer
//!
//! The recorder never allocates and never grows its buffer. When an event does
//! not fit, the recorder latches "out of space" and silently drops that event and
//! every event after it, so the bytes written so far always form a structurally
//! valid prefix of the stream. Nesting bookkeeping continues while dropping, so
//! callers can keep opening and closing zones without checking for space.
//!
//! # Example
//!
//! ```
//! use zoneprof::recorder::{Recorder, Zone};
//! use zoneprof::zone_range::ZoneRange;
//!
//! let mut buffer = vec![0u8; 64 * 1024];
//! let mut recorder = Recorder::new(&mut buffer);
//! {
//!     let mut frame = recorder.zone("frame");
//!     {
//!         let _physics = Zone::new(frame.recorder(), "physics");
//!     }
//!     if let Some(r) = frame.recorder() {
//!         r.record_variable("entities", 128u32);
//!     }
//! }
//!
//! let zones: Vec<_> = ZoneRange::new(recorder.profile_data())
//!     .collect::<Result<_, _>>()
//!     .unwrap();
//! assert_eq!(zones.len(), 2);
//! assert_eq!(zones[0].label, "physics");
//! assert_eq!(zones[1].label, "frame");
//! ```

use crate::clock::{Clock, MonotonicClock};
use crate::codec::{self, CHECKPOINT_TIME_BYTES, MAX_CHECKPOINT_TIME};
use crate::event::{
    Event, EventId, EventKind, VariableValue, CHECKPOINT_BYTES, MAX_EVENT_BYTES, MAX_INFO_BYTES,
};
use crate::zone_range::MAX_STACK_DEPTH;
use serde::{Deserialize, Serialize};

/// Counters describing what a recorder has written
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostics {
    pub zone_starts: u64,
    pub zone_ends: u64,
    pub infos: u64,
    pub variables: u64,
    pub checkpoints: u64,
    /// Events dropped because the buffer ran out of space
    pub dropped_events: u64,
}

impl Diagnostics {
    /// Total number of events written
    pub fn events(&self) -> u64 {
        self.zone_starts + self.zone_ends + self.infos + self.variables + self.checkpoints
    }

    fn count(&mut self, id: EventId) {
        match id {
            EventId::ZoneStart => self.zone_starts += 1,
            EventId::ZoneEnd => self.zone_ends += 1,
            EventId::Info => self.infos += 1,
            EventId::Variable => self.variables += 1,
            EventId::Checkpoint => self.checkpoints += 1,
        }
    }
}

/// Appends encoded events to a borrowed buffer
///
/// A recorder is not thread-safe; profile multiple threads with one recorder
/// (and one buffer) per thread, then merge the results with
/// [`crate::accumulate::accumulate_zones`].
pub struct Recorder<'b, C: Clock = MonotonicClock> {
    buffer: &'b mut [u8],
    used: usize,
    nest_level: u32,
    last_time: u64,
    out_of_space: bool,
    diagnostics: Diagnostics,
    clock: C,
}

impl<'b> Recorder<'b, MonotonicClock> {
    /// Create a recorder timing events with a [`MonotonicClock`] started now
    pub fn new(buffer: &'b mut [u8]) -> Self {
        Self::with_clock(buffer, MonotonicClock::new())
    }
}

impl<'b, C: Clock> Recorder<'b, C> {
    /// Create a recorder reading time from `clock`
    pub fn with_clock(buffer: &'b mut [u8], clock: C) -> Self {
        Self {
            buffer,
            used: 0,
            nest_level: 0,
            last_time: 0,
            out_of_space: false,
            diagnostics: Diagnostics::default(),
            clock,
        }
    }

    /// Open a zone and return its nest level (1 for a top-level zone)
    ///
    /// Writes a `ZoneStart` followed by an `Info` carrying `label`. The nest level
    /// is incremented even when the events are dropped for lack of space.
    ///
    /// # Panics
    ///
    /// Panics if `label` is empty, longer than 255 bytes or contains a zero byte,
    /// or if zones are nested deeper than [`MAX_STACK_DEPTH`].
    pub fn start_zone(&mut self, label: &str) -> u32 {
        validate_label(label);
        assert!(
            (self.nest_level as usize) < MAX_STACK_DEPTH,
            "zone nesting exceeds {} levels",
            MAX_STACK_DEPTH
        );
        self.nest_level += 1;

        let now = self.now();
        self.emit(now, EventKind::ZoneStart);
        self.emit(now, EventKind::Info(label));
        self.nest_level
    }

    /// Close the innermost zone
    ///
    /// # Panics
    ///
    /// Panics if `nest_level` is not the level of the innermost open zone.
    pub fn end_zone(&mut self, nest_level: u32) {
        assert!(
            self.nest_level > 0 && nest_level == self.nest_level,
            "zone ended out of order: ending level {} while innermost open level is {}",
            nest_level,
            self.nest_level
        );
        self.nest_level -= 1;

        let now = self.now();
        self.emit(now, EventKind::ZoneEnd);
    }

    /// Record a 4-byte variable sample under `name`
    ///
    /// # Panics
    ///
    /// Panics if `name` is not a valid label (see [`Recorder::start_zone`]).
    pub fn record_variable(&mut self, name: &str, value: impl Into<VariableValue>) {
        validate_label(name);
        let now = self.now();
        self.emit(now, EventKind::Variable(value.into()));
        self.emit(now, EventKind::Info(name));
    }

    /// Write a checkpoint restating the absolute time
    pub fn checkpoint(&mut self) {
        let now = self.now();
        self.emit_checkpoint(now);
    }

    /// Open a zone closed when the returned guard is dropped
    pub fn zone<'r>(&'r mut self, label: &str) -> Zone<'r, 'b, C> {
        Zone::new(Some(self), label)
    }

    /// Clear all recorded data
    ///
    /// # Panics
    ///
    /// Panics if any zone is still open.
    pub fn reset(&mut self) {
        assert!(
            self.nest_level == 0,
            "cannot reset recorder while {} zone(s) are open",
            self.nest_level
        );
        self.used = 0;
        self.last_time = 0;
        self.out_of_space = false;
        self.diagnostics = Diagnostics::default();
    }

    /// True once the recorder may be unable to fit the next event
    ///
    /// Either an event has already been dropped, or less than
    /// [`MAX_EVENT_BYTES`] remain. Poll this before recording in a tight loop.
    pub fn is_full(&self) -> bool {
        self.out_of_space || self.remaining() < MAX_EVENT_BYTES
    }

    /// True once an event has been dropped for lack of space
    pub fn out_of_space(&self) -> bool {
        self.out_of_space
    }

    /// Bytes written so far; this prefix is always decodable
    pub fn profile_data(&self) -> &[u8] {
        &self.buffer[..self.used]
    }

    pub fn bytes_written(&self) -> usize {
        self.used
    }

    pub fn capacity(&self) -> usize {
        self.buffer.len()
    }

    pub fn remaining(&self) -> usize {
        self.buffer.len() - self.used
    }

    /// Nest level of the innermost open zone (0 if none)
    pub fn nest_level(&self) -> u32 {
        self.nest_level
    }

    pub fn diagnostics(&self) -> Diagnostics {
        self.diagnostics
    }

    fn now(&mut self) -> u64 {
        // A clock running backwards must not produce a negative gap.
        self.clock.now().max(self.last_time)
    }

    /// Write a zone, info or variable event (checkpoints go through `emit_checkpoint`)
    fn emit(&mut self, time: u64, kind: EventKind<'_>) {
        if self.out_of_space {
            self.diagnostics.dropped_events += 1;
            return;
        }

        let mut gap = time - self.last_time;
        let gap_bytes = match codec::time_gap_byte_count(gap) {
            Ok(n) => n,
            Err(_) => {
                // Restate absolute time so the gap shrinks to zero.
                if !self.emit_checkpoint(time) {
                    self.diagnostics.dropped_events += 1;
                    return;
                }
                gap = 0;
                0
            }
        };

        let id = kind.id();
        let payload_len = Event::new(time, kind).payload_len();
        let Some(out) = self.reserve(1 + gap_bytes + payload_len) else {
            return;
        };

        out[0] = id.event_byte(gap_bytes);
        codec::write_groups(gap, &mut out[1..1 + gap_bytes]);
        let payload = &mut out[1 + gap_bytes..];
        match kind {
            EventKind::Info(label) => {
                payload[0] = label.len() as u8;
                payload[1..].copy_from_slice(label.as_bytes());
            }
            EventKind::Variable(value) => {
                payload[0] = value.variable_type() as u8;
                payload[1..].copy_from_slice(&codec::encode_7x5(value.to_bits()));
            }
            EventKind::ZoneStart | EventKind::ZoneEnd | EventKind::Checkpoint => {}
        }

        self.last_time = time;
        self.diagnostics.count(id);
    }

    fn emit_checkpoint(&mut self, time: u64) -> bool {
        if self.out_of_space {
            self.diagnostics.dropped_events += 1;
            return false;
        }
        assert!(
            time <= MAX_CHECKPOINT_TIME,
            "clock time {} exceeds checkpoint range",
            time
        );
        let Some(out) = self.reserve(CHECKPOINT_BYTES) else {
            return false;
        };
        out[0] = EventId::Checkpoint as u8;
        codec::write_groups(time, &mut out[1..1 + CHECKPOINT_TIME_BYTES]);

        self.last_time = time;
        self.diagnostics.count(EventId::Checkpoint);
        true
    }

    /// Claim `len` bytes, or latch out of space and count the drop
    fn reserve(&mut self, len: usize) -> Option<&mut [u8]> {
        if len > self.remaining() {
            self.out_of_space = true;
            self.diagnostics.dropped_events += 1;
            tracing::debug!(
                capacity = self.buffer.len(),
                used = self.used,
                needed = len,
                "profile buffer out of space, dropping further events"
            );
            return None;
        }
        let start = self.used;
        self.used += len;
        Some(&mut self.buffer[start..start + len])
    }
}

fn validate_label(label: &str) {
    assert!(
        !label.is_empty() && label.len() <= MAX_INFO_BYTES,
        "label must be 1-{} bytes long, got {} bytes",
        MAX_INFO_BYTES,
        label.len()
    );
    assert!(
        !label.as_bytes().contains(&0),
        "label {:?} contains a zero byte",
        label
    );
}

/// Scoped zone: opened on creation, closed when dropped
///
/// A zone without a recorder is inactive and does nothing, so instrumentation
/// can stay in place when profiling is switched off:
///
/// ```
/// use zoneprof::recorder::{Recorder, Zone};
///
/// fn update(recorder: Option<&mut Recorder<'_>>) {
///     let _zone = Zone::new(recorder, "update");
///     // ...
/// }
///
/// update(None);
/// ```
///
/// Nested zones borrow the recorder through [`Zone::recorder`], which makes
/// closing zones out of order a compile error.
pub struct Zone<'r, 'b, C: Clock = MonotonicClock> {
    recorder: Option<&'r mut Recorder<'b, C>>,
    nest_level: u32,
}

impl<'r, 'b, C: Clock> Zone<'r, 'b, C> {
    pub fn new(mut recorder: Option<&'r mut Recorder<'b, C>>, label: &str) -> Self {
        let nest_level = match recorder.as_deref_mut() {
            Some(r) => r.start_zone(label),
            None => 0,
        };
        Self {
            recorder,
            nest_level,
        }
    }

    /// Recorder for nested zones and variables (`None` if inactive)
    pub fn recorder(&mut self) -> Option<&mut Recorder<'b, C>> {
        self.recorder.as_deref_mut()
    }

    /// Nest level of this zone (0 if inactive)
    pub fn nest_level(&self) -> u32 {
        self.nest_level
    }

    pub fn is_active(&self) -> bool {
        self.recorder.is_some()
    }
}

impl<C: Clock> Drop for Zone<'_, '_, C> {
    fn drop(&mut self) {
        if let Some(recorder) = self.recorder.as_deref_mut() {
            recorder.end_zone(self.nest_level);
        }
    }
}

//! Zone reconstruction from a decoded event stream
//!
//! [`ZoneRange`] runs a stack machine over an [`EventRange`]: `ZoneStart` pushes a
//! frame, `ZoneEnd` pops one and yields a [`ZoneData`]. Zones are therefore
//! produced in order of their end time, children before their parents.
//!
//! A recording cut short by a full buffer usually ends with zones still open.
//! Those are closed at the time of the last event seen, innermost first, so every
//! started zone is yielded exactly once and the ordering still holds.
//!
//! The stack is a fixed array of [`MAX_STACK_DEPTH`] frames; the range never
//! allocates.

use crate::decoder::EventRange;
use crate::error::DecodeError;
use crate::event::EventKind;
use serde::Serialize;
use std::iter::FusedIterator;

/// Deepest zone nesting supported by recording and reconstruction
pub const MAX_STACK_DEPTH: usize = 640;

/// A reconstructed zone
///
/// Ids are assigned from 1 in the order zones started and are only unique
/// within one stream. `parent_id` is 0 for top-level zones; otherwise the parent
/// has `nest_level` exactly one less than this zone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ZoneData<'a> {
    pub id: u32,
    pub parent_id: u32,
    /// 1 for a top-level zone
    pub nest_level: u32,
    /// Hectonanoseconds since the start of the stream
    pub start_time: u64,
    pub duration: u64,
    /// Empty if the label event was lost to a full buffer
    pub label: &'a str,
}

impl ZoneData<'_> {
    pub fn end_time(&self) -> u64 {
        self.start_time + self.duration
    }
}

#[derive(Debug, Clone, Copy)]
struct ZoneFrame<'a> {
    id: u32,
    start_time: u64,
    label: Option<&'a str>,
}

impl ZoneFrame<'_> {
    const EMPTY: ZoneFrame<'static> = ZoneFrame {
        id: 0,
        start_time: 0,
        label: None,
    };
}

/// Lazy sequence of the zones recorded in a buffer
#[derive(Clone)]
pub struct ZoneRange<'a> {
    events: EventRange<'a>,
    stack: [ZoneFrame<'a>; MAX_STACK_DEPTH],
    depth: usize,
    next_id: u32,
    last_time: u64,
    done: bool,
}

impl<'a> ZoneRange<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::from_events(EventRange::new(data))
    }

    /// Reconstruct zones from an already positioned event range
    pub fn from_events(events: EventRange<'a>) -> Self {
        Self {
            last_time: events.time(),
            events,
            stack: [ZoneFrame::EMPTY; MAX_STACK_DEPTH],
            depth: 0,
            next_id: 1,
            done: false,
        }
    }

    /// Number of zones currently open
    pub fn depth(&self) -> usize {
        self.depth
    }

    fn push(&mut self, start_time: u64) -> Result<(), DecodeError> {
        if self.depth == MAX_STACK_DEPTH {
            return Err(DecodeError::NestingTooDeep {
                max: MAX_STACK_DEPTH,
            });
        }
        self.stack[self.depth] = ZoneFrame {
            id: self.next_id,
            start_time,
            label: None,
        };
        self.next_id += 1;
        self.depth += 1;
        Ok(())
    }

    fn pop(&mut self, end_time: u64) -> ZoneData<'a> {
        let nest_level = self.depth as u32;
        self.depth -= 1;
        let frame = self.stack[self.depth];
        let parent_id = match self.depth {
            0 => 0,
            d => self.stack[d - 1].id,
        };
        ZoneData {
            id: frame.id,
            parent_id,
            nest_level,
            start_time: frame.start_time,
            duration: end_time.saturating_sub(frame.start_time),
            label: frame.label.unwrap_or(""),
        }
    }

    fn fail(&mut self, err: DecodeError) -> Option<Result<ZoneData<'a>, DecodeError>> {
        self.done = true;
        Some(Err(err))
    }
}

impl<'a> Iterator for ZoneRange<'a> {
    type Item = Result<ZoneData<'a>, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        while !self.done {
            let event = match self.events.next() {
                Some(Ok(event)) => event,
                Some(Err(err)) => return self.fail(err),
                None if self.depth > 0 => return Some(Ok(self.pop(self.last_time))),
                None => {
                    self.done = true;
                    break;
                }
            };
            self.last_time = event.time;

            match event.kind {
                EventKind::ZoneStart => {
                    if let Err(err) = self.push(event.time) {
                        return self.fail(err);
                    }
                }
                EventKind::ZoneEnd => {
                    if self.depth == 0 {
                        return self.fail(DecodeError::UnbalancedZoneEnd { time: event.time });
                    }
                    return Some(Ok(self.pop(event.time)));
                }
                EventKind::Info(label) => {
                    // Only the first unclaimed info at the zone's start time names it;
                    // a variable recorded at the same instant brings its own info.
                    if let Some(top) = self.depth.checked_sub(1).map(|d| &mut self.stack[d]) {
                        if top.label.is_none() && top.start_time == event.time {
                            top.label = Some(label);
                        }
                    }
                }
                EventKind::Variable(_) | EventKind::Checkpoint => {}
            }
        }
        None
    }
}

impl FusedIterator for ZoneRange<'_> {}

impl std::fmt::Debug for ZoneRange<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ZoneRange")
            .field("events", &self.events)
            .field("depth", &self.depth)
            .field("next_id", &self.next_id)
            .field("done", &self.done)
            .finish()
    }
}

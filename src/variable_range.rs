//! Named variable extraction
//!
//! A variable is recorded as a `Variable` event followed by an `Info` event at the
//! same time carrying its name. Zone events may sit in between when reading a
//! stream produced by another writer, so the range skips them while it waits.

use crate::decoder::EventRange;
use crate::error::DecodeError;
use crate::event::{EventKind, VariableValue};
use serde::Serialize;
use std::iter::FusedIterator;

/// A variable sample paired with its name
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct NamedVariable<'a> {
    pub name: &'a str,
    pub time: u64,
    pub value: VariableValue,
}

/// Lazy sequence of the named variables recorded in a buffer
///
/// A variable whose name event never arrives (truncated stream) is dropped.
#[derive(Debug, Clone)]
pub struct VariableRange<'a> {
    events: EventRange<'a>,
    pending: Option<(u64, VariableValue)>,
}

impl<'a> VariableRange<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self::from_events(EventRange::new(data))
    }

    pub fn from_events(events: EventRange<'a>) -> Self {
        Self {
            events,
            pending: None,
        }
    }
}

impl<'a> Iterator for VariableRange<'a> {
    type Item = Result<NamedVariable<'a>, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        for event in self.events.by_ref() {
            let event = match event {
                Ok(event) => event,
                Err(err) => return Some(Err(err)),
            };
            match (event.kind, self.pending) {
                (EventKind::Variable(value), _) => self.pending = Some((event.time, value)),
                (EventKind::Info(name), Some((time, value))) if time == event.time => {
                    self.pending = None;
                    return Some(Ok(NamedVariable { name, time, value }));
                }
                _ => {}
            }
        }
        None
    }
}

impl FusedIterator for VariableRange<'_> {}

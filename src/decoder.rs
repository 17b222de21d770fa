//! Lazy decoder turning a raw profile buffer back into events
//!
//! [`EventRange`] is a forward-only cursor over an immutable byte slice. It is
//! `Clone`, and a clone is a fully independent cursor: that is how the zone and
//! variable ranges make several passes over the same buffer.
//!
//! Malformed input produces one [`DecodeError`], after which the range is
//! exhausted. The decoder never reads past the end of the slice.

use crate::codec::{self, CHECKPOINT_TIME_BYTES, PACKED_VALUE_BYTES};
use crate::error::DecodeError;
use crate::event::{
    Event, EventId, EventKind, VariableType, VariableValue, EVENT_ID_MASK, TIME_GAP_COUNT_SHIFT,
};
use std::iter::FusedIterator;

/// Forward cursor over the events of a raw profile buffer
#[derive(Debug, Clone)]
pub struct EventRange<'a> {
    data: &'a [u8],
    pos: usize,
    time: u64,
    failed: bool,
}

impl<'a> EventRange<'a> {
    /// Decode `data` from its start, with the running clock at 0
    pub fn new(data: &'a [u8]) -> Self {
        Self::with_start_time(data, 0)
    }

    /// Decode `data` assuming the event before it happened at `start_time`
    ///
    /// Used when `data` is a slice cut out of a longer stream at an event boundary.
    pub fn with_start_time(data: &'a [u8], start_time: u64) -> Self {
        Self {
            data,
            pos: 0,
            time: start_time,
            failed: false,
        }
    }

    /// Resume decoding at the last checkpoint in `data`, if there is one
    ///
    /// Only checkpoints encode a zero byte, so the backward scan is exact.
    pub fn from_last_checkpoint(data: &'a [u8]) -> Option<Self> {
        let pos = find_last_checkpoint(data)?;
        Some(Self {
            data,
            pos,
            time: 0,
            failed: false,
        })
    }

    /// Absolute time of the last decoded event
    pub fn time(&self) -> u64 {
        self.time
    }

    /// Byte offset of the next event
    pub fn offset(&self) -> usize {
        self.pos
    }

    pub fn bytes_left(&self) -> usize {
        self.data.len() - self.pos
    }

    pub fn is_empty(&self) -> bool {
        self.failed || self.pos >= self.data.len()
    }

    fn parse(&self) -> Result<(Event<'a>, usize), DecodeError> {
        let start = self.pos;
        let event_byte = self.data[start];
        let mut cursor = start + 1;

        if event_byte == 0 {
            let raw = self.array::<CHECKPOINT_TIME_BYTES>(start, cursor)?;
            let time = codec::decode_checkpoint_time(raw);
            cursor += CHECKPOINT_TIME_BYTES;
            return Ok((Event::new(time, EventKind::Checkpoint), cursor));
        }

        let raw_id = event_byte & EVENT_ID_MASK;
        let id = match EventId::try_from(raw_id) {
            // a zero id with a non-zero gap count is not a checkpoint
            Ok(EventId::Checkpoint) | Err(_) => {
                return Err(DecodeError::UnknownEventId {
                    id: raw_id,
                    offset: start,
                })
            }
            Ok(id) => id,
        };

        let gap_bytes = usize::from(event_byte >> TIME_GAP_COUNT_SHIFT);
        let gap = codec::decode_time_gap(self.slice(start, cursor, gap_bytes)?);
        cursor += gap_bytes;
        let time = self.time.saturating_add(gap);

        let kind = match id {
            EventId::ZoneStart => EventKind::ZoneStart,
            EventId::ZoneEnd => EventKind::ZoneEnd,
            EventId::Info => {
                let len = usize::from(self.slice(start, cursor, 1)?[0]);
                if len == 0 {
                    return Err(DecodeError::EmptyInfo { offset: start });
                }
                let bytes = self.slice(start, cursor + 1, len)?;
                // Only checkpoints may carry a zero byte
                if bytes.contains(&0) {
                    return Err(DecodeError::ZeroByteInInfo { offset: start });
                }
                let label = std::str::from_utf8(bytes)
                    .map_err(|_| DecodeError::InvalidUtf8 { offset: start })?;
                cursor += 1 + len;
                EventKind::Info(label)
            }
            EventId::Variable => {
                let tag = self.slice(start, cursor, 1)?[0];
                let variable_type = VariableType::try_from(tag)
                    .map_err(|tag| DecodeError::UnknownVariableType { tag, offset: start })?;
                let packed = self.array::<PACKED_VALUE_BYTES>(start, cursor + 1)?;
                cursor += 1 + PACKED_VALUE_BYTES;
                EventKind::Variable(VariableValue::from_bits(
                    variable_type,
                    codec::decode_7x5(packed),
                ))
            }
            EventId::Checkpoint => unreachable!(),
        };

        Ok((Event::new(time, kind), cursor))
    }

    fn slice(&self, event_start: usize, at: usize, len: usize) -> Result<&'a [u8], DecodeError> {
        self.data
            .get(at..at + len)
            .ok_or_else(|| DecodeError::Truncated {
                offset: event_start,
                needed: (at + len).saturating_sub(self.data.len()),
            })
    }

    fn array<const N: usize>(
        &self,
        event_start: usize,
        at: usize,
    ) -> Result<&'a [u8; N], DecodeError> {
        self.data
            .get(at..at + N)
            .and_then(|bytes| <&[u8; N]>::try_from(bytes).ok())
            .ok_or_else(|| DecodeError::Truncated {
                offset: event_start,
                needed: (at + N).saturating_sub(self.data.len()),
            })
    }
}

impl<'a> Iterator for EventRange<'a> {
    type Item = Result<Event<'a>, DecodeError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.is_empty() {
            return None;
        }
        match self.parse() {
            Ok((event, next_pos)) => {
                self.pos = next_pos;
                self.time = event.time;
                Some(Ok(event))
            }
            Err(err) => {
                self.failed = true;
                tracing::trace!(%err, "event decoding stopped");
                Some(Err(err))
            }
        }
    }
}

impl FusedIterator for EventRange<'_> {}

/// Offset of the last checkpoint in `data`
pub fn find_last_checkpoint(data: &[u8]) -> Option<usize> {
    data.iter().rposition(|&b| b == 0)
}

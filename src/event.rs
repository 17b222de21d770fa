//! Event types shared by the recorder and the decoder
//!
//! Every encoded event starts with one byte. `0x00` is a checkpoint; any other
//! value packs the event id in the low 5 bits and the number of time-gap bytes
//! that follow in the high 3 bits:
//!
//! ```text
//! [ eventByte ][ timeGapBytes... ][ payload (Info / Variable only) ]
//! eventByte = (id & 0b0001_1111) | (timeGapByteCount << 5)
//! ```

use crate::codec::{CHECKPOINT_TIME_BYTES, MAX_TIME_GAP_BYTES, PACKED_VALUE_BYTES};
use serde::{Deserialize, Serialize};

/// Mask selecting the event id from an event byte
pub const EVENT_ID_MASK: u8 = 0b0001_1111;

/// Shift of the time-gap byte count inside an event byte
pub const TIME_GAP_COUNT_SHIFT: u32 = 5;

/// Longest label an `Info` event can carry
pub const MAX_INFO_BYTES: usize = 255;

/// Size of an encoded checkpoint
pub const CHECKPOINT_BYTES: usize = 1 + CHECKPOINT_TIME_BYTES;

/// Worst-case size of a single encoded event (an `Info` with a full label)
pub const MAX_EVENT_BYTES: usize = 1 + MAX_TIME_GAP_BYTES + 1 + MAX_INFO_BYTES;

/// Wire identifier of an event
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum EventId {
    /// Resynchronization marker, the only event whose first byte is zero
    Checkpoint = 0,
    ZoneStart = 1,
    ZoneEnd = 2,
    /// Label of the zone or variable recorded just before, at the same time
    Info = 3,
    Variable = 4,
}

impl EventId {
    /// Every event id, in wire order
    pub const ALL: [EventId; 5] = [
        EventId::Checkpoint,
        EventId::ZoneStart,
        EventId::ZoneEnd,
        EventId::Info,
        EventId::Variable,
    ];

    /// Pack this id and a time-gap byte count into an event byte
    pub fn event_byte(self, gap_bytes: usize) -> u8 {
        debug_assert!(gap_bytes <= MAX_TIME_GAP_BYTES);
        (self as u8 & EVENT_ID_MASK) | ((gap_bytes as u8) << TIME_GAP_COUNT_SHIFT)
    }
}

// Ids must fit the 5-bit field, and only Checkpoint may be zero.
const _: () = {
    let mut i = 0;
    while i < EventId::ALL.len() {
        let id = EventId::ALL[i] as u8;
        assert!(id & !EVENT_ID_MASK == 0);
        assert!((id == 0) == matches!(EventId::ALL[i], EventId::Checkpoint));
        i += 1;
    }
};

impl TryFrom<u8> for EventId {
    type Error = u8;

    fn try_from(id: u8) -> Result<Self, Self::Error> {
        match id {
            0 => Ok(EventId::Checkpoint),
            1 => Ok(EventId::ZoneStart),
            2 => Ok(EventId::ZoneEnd),
            3 => Ok(EventId::Info),
            4 => Ok(EventId::Variable),
            other => Err(other),
        }
    }
}

/// Type tag of a recorded variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum VariableType {
    Int = 1,
    Uint = 2,
    Float = 3,
}

impl TryFrom<u8> for VariableType {
    type Error = u8;

    fn try_from(tag: u8) -> Result<Self, Self::Error> {
        match tag {
            1 => Ok(VariableType::Int),
            2 => Ok(VariableType::Uint),
            3 => Ok(VariableType::Float),
            other => Err(other),
        }
    }
}

/// A 4-byte variable sample
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "lowercase")]
pub enum VariableValue {
    Int(i32),
    Uint(u32),
    Float(f32),
}

impl VariableValue {
    pub fn variable_type(&self) -> VariableType {
        match self {
            VariableValue::Int(_) => VariableType::Int,
            VariableValue::Uint(_) => VariableType::Uint,
            VariableValue::Float(_) => VariableType::Float,
        }
    }

    /// Raw bit pattern of the value (floats by `to_bits`, so NaN payloads survive)
    pub fn to_bits(&self) -> u32 {
        match *self {
            VariableValue::Int(v) => v as u32,
            VariableValue::Uint(v) => v,
            VariableValue::Float(v) => v.to_bits(),
        }
    }

    pub fn from_bits(variable_type: VariableType, bits: u32) -> Self {
        match variable_type {
            VariableType::Int => VariableValue::Int(bits as i32),
            VariableType::Uint => VariableValue::Uint(bits),
            VariableType::Float => VariableValue::Float(f32::from_bits(bits)),
        }
    }
}

impl From<i32> for VariableValue {
    fn from(v: i32) -> Self {
        VariableValue::Int(v)
    }
}

impl From<u32> for VariableValue {
    fn from(v: u32) -> Self {
        VariableValue::Uint(v)
    }
}

impl From<f32> for VariableValue {
    fn from(v: f32) -> Self {
        VariableValue::Float(v)
    }
}

impl std::fmt::Display for VariableValue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VariableValue::Int(v) => write!(f, "{}", v),
            VariableValue::Uint(v) => write!(f, "{}", v),
            VariableValue::Float(v) => write!(f, "{}", v),
        }
    }
}

/// Payload of a decoded event
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum EventKind<'a> {
    ZoneStart,
    ZoneEnd,
    Info(&'a str),
    Variable(VariableValue),
    Checkpoint,
}

impl EventKind<'_> {
    pub fn id(&self) -> EventId {
        match self {
            EventKind::ZoneStart => EventId::ZoneStart,
            EventKind::ZoneEnd => EventId::ZoneEnd,
            EventKind::Info(_) => EventId::Info,
            EventKind::Variable(_) => EventId::Variable,
            EventKind::Checkpoint => EventId::Checkpoint,
        }
    }
}

/// A decoded event borrowing its label from the raw buffer
///
/// `time` is absolute, in hectonanoseconds since the start of the stream.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Event<'a> {
    pub time: u64,
    pub kind: EventKind<'a>,
}

impl<'a> Event<'a> {
    pub fn new(time: u64, kind: EventKind<'a>) -> Self {
        Self { time, kind }
    }

    pub fn id(&self) -> EventId {
        self.kind.id()
    }

    /// Encoded payload size following the time gap (excluding the event byte)
    pub fn payload_len(&self) -> usize {
        match self.kind {
            EventKind::Info(label) => 1 + label.len(),
            EventKind::Variable(_) => 1 + PACKED_VALUE_BYTES,
            EventKind::Checkpoint => CHECKPOINT_TIME_BYTES,
            EventKind::ZoneStart | EventKind::ZoneEnd => 0,
        }
    }
}

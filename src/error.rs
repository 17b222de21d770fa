//! Error types for the zoneprof library
//!
//! A full buffer is not an error: the recorder drops events instead. Caller
//! misuse (out-of-order zone ends, bad labels) panics, see [`crate::recorder`].

use thiserror::Error;

/// Errors produced by the variable-length codec
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CodecError {
    #[error("time gap {gap} needs more than {max_bytes} 7-bit groups")]
    TimeGapTooLarge { gap: u64, max_bytes: usize },

    #[error("checkpoint time {time} does not fit in 8 7-bit groups")]
    CheckpointTimeTooLarge { time: u64 },

    #[error("output buffer too small: need {needed} bytes, have {available}")]
    BufferTooSmall { needed: usize, available: usize },
}

/// Errors produced while decoding a raw profile buffer
///
/// Every variant carries the byte offset of the event that failed to parse.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("corrupt stream: unknown event id {id} at offset {offset}")]
    UnknownEventId { id: u8, offset: usize },

    #[error("corrupt stream: unknown variable type {tag} at offset {offset}")]
    UnknownVariableType { tag: u8, offset: usize },

    #[error("corrupt stream: event at offset {offset} truncated (needs {needed} more bytes)")]
    Truncated { offset: usize, needed: usize },

    #[error("corrupt stream: zero-length info event at offset {offset}")]
    EmptyInfo { offset: usize },

    #[error("corrupt stream: info event at offset {offset} contains a zero byte")]
    ZeroByteInInfo { offset: usize },

    #[error("corrupt stream: info event at offset {offset} is not valid UTF-8")]
    InvalidUtf8 { offset: usize },

    #[error("zone nesting exceeds {max} levels")]
    NestingTooDeep { max: usize },

    #[error("zone end at time {time} without a matching zone start")]
    UnbalancedZoneEnd { time: u64 },
}

/// Errors produced by zone accumulation
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccumulateError {
    #[error("accumulation storage full ({capacity} slots)")]
    StorageFull { capacity: usize },

    #[error(transparent)]
    Decode(#[from] DecodeError),
}

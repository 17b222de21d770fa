//! Accumulation of matching zones into aggregate statistics
//!
//! Merges zones that share a parent and have matching labels, level by level from
//! the outermost zones inwards. Merging frame after frame of the same recording,
//! or the recordings of several threads, collapses thousands of zone instances
//! into one small tree with per-zone aggregates.
//!
//! # Algorithm
//!
//! ```text
//! for level L = 1, 2, ...:                      (stop at the first empty level)
//!     repeat until no merge happens:
//!         for each pair (a, b), a before b, both at L, same parent, match(a, b):
//!             a.duration   += b.duration
//!             a.start_time += b.start_time
//!             a.acc         = reduce(Some(a.acc), b)
//!             children of b now point at a; b is removed
//! ```
//!
//! Each level costs O(n²) label comparisons, so this is meant for analysis of
//! moderate inputs, not for the recording hot path. The earlier zone (in input
//! order) of each merged pair keeps its id.
//!
//! Results live in caller-provided storage; nothing is allocated.

use crate::error::{AccumulateError, DecodeError};
use crate::zone_range::ZoneData;
use serde::Serialize;

/// A zone standing for one or more merged zone instances
///
/// `duration` and `start_time` of `zone` are sums over all merged instances.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct AccumulatedZoneData<'a, A> {
    #[serde(flatten)]
    pub zone: ZoneData<'a>,
    pub accumulated: A,
}

/// Per-zone call count and duration extremes, a ready-made reducer
///
/// Totals need no reducer: the accumulated zone's `duration` is already the sum.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct DurationStats {
    pub calls: u64,
    pub min: u64,
    pub max: u64,
}

impl DurationStats {
    /// Reducer for [`accumulate_zones`]
    pub fn reduce(acc: Option<&Self>, zone: &ZoneData<'_>) -> Self {
        match acc {
            None => Self {
                calls: 1,
                min: zone.duration,
                max: zone.duration,
            },
            Some(acc) => Self {
                calls: acc.calls + 1,
                min: acc.min.min(zone.duration),
                max: acc.max.max(zone.duration),
            },
        }
    }
}

/// The default matcher: labels must be identical
pub fn exact_label_match(a: &str, b: &str) -> bool {
    a == b
}

/// Merge the zones of `sources` into `storage`
///
/// `reduce(None, zone)` seeds the accumulated value of every input zone;
/// `reduce(Some(acc), zone)` folds a merged zone into the survivor's value.
/// Zone ids of each source are shifted past the ids of the sources before it, so
/// several independently reconstructed streams can be merged together.
///
/// # Errors
///
/// - [`AccumulateError::StorageFull`] if the sources hold more zones than `storage`
/// - [`AccumulateError::Decode`] if a source yields a decode error
///
/// # Example
///
/// ```
/// use std::cell::Cell;
/// use zoneprof::accumulate::{accumulate_zones, exact_label_match};
/// use zoneprof::recorder::Recorder;
/// use zoneprof::zone_range::ZoneRange;
///
/// let time = Cell::new(0);
/// let mut buffer = [0u8; 1024];
/// let mut recorder = Recorder::with_clock(&mut buffer, &time);
/// for _ in 0..3 {
///     let frame = recorder.start_zone("frame");
///     time.set(time.get() + 10);
///     recorder.end_zone(frame);
/// }
///
/// let mut storage = [None; 16];
/// let totals = accumulate_zones(
///     &mut storage,
///     |count: Option<&u32>, _zone| count.map_or(1, |c| c + 1),
///     exact_label_match,
///     [ZoneRange::new(recorder.profile_data())],
/// )
/// .unwrap();
///
/// let frames: Vec<_> = totals.collect();
/// assert_eq!(frames.len(), 1);
/// assert_eq!(frames[0].accumulated, 3);
/// assert_eq!(frames[0].zone.duration, 30);
/// ```
pub fn accumulate_zones<'a, 's, A, R, M, S>(
    storage: &'s mut [Option<AccumulatedZoneData<'a, A>>],
    mut reduce: R,
    mut matches: M,
    sources: impl IntoIterator<Item = S>,
) -> Result<AccumulatedZones<'s, 'a, A>, AccumulateError>
where
    R: FnMut(Option<&A>, &ZoneData<'a>) -> A,
    M: FnMut(&str, &str) -> bool,
    S: IntoIterator<Item = Result<ZoneData<'a>, DecodeError>>,
{
    let len = load_sources(storage, &mut reduce, sources)?;
    let slots = &mut storage[..len];

    let mut remaining = len;
    let mut level = 1;
    while slots.iter().flatten().any(|z| z.zone.nest_level == level) {
        loop {
            let merged = merge_level(slots, level, &mut reduce, &mut matches);
            remaining -= merged;
            if merged == 0 {
                break;
            }
        }
        level += 1;
    }

    tracing::debug!(
        input_zones = len,
        accumulated_zones = remaining,
        levels = level - 1,
        "accumulated zones"
    );

    Ok(AccumulatedZones {
        slots: storage[..len].iter(),
        remaining,
    })
}

/// Copy every source zone into storage with its seed value, returning the count
fn load_sources<'a, A, R, S>(
    storage: &mut [Option<AccumulatedZoneData<'a, A>>],
    reduce: &mut R,
    sources: impl IntoIterator<Item = S>,
) -> Result<usize, AccumulateError>
where
    R: FnMut(Option<&A>, &ZoneData<'a>) -> A,
    S: IntoIterator<Item = Result<ZoneData<'a>, DecodeError>>,
{
    let mut len = 0;
    let mut id_offset = 0;
    for source in sources {
        let mut max_id = id_offset;
        for zone in source {
            let mut zone = zone?;
            let slot = storage.get_mut(len).ok_or(AccumulateError::StorageFull {
                capacity: len,
            })?;
            zone.id += id_offset;
            if zone.parent_id != 0 {
                zone.parent_id += id_offset;
            }
            max_id = max_id.max(zone.id);
            *slot = Some(AccumulatedZoneData {
                accumulated: reduce(None, &zone),
                zone,
            });
            len += 1;
        }
        id_offset = max_id;
    }
    Ok(len)
}

/// One pass over `level`, returning the number of zones merged away
fn merge_level<'a, A, R, M>(
    slots: &mut [Option<AccumulatedZoneData<'a, A>>],
    level: u32,
    reduce: &mut R,
    matches: &mut M,
) -> usize
where
    R: FnMut(Option<&A>, &ZoneData<'a>) -> A,
    M: FnMut(&str, &str) -> bool,
{
    let mut merged = 0;
    for i in 0..slots.len() {
        for j in (i + 1)..slots.len() {
            let (head, tail) = slots.split_at_mut(j);
            let (Some(a), Some(b)) = (head[i].as_mut(), tail[0].as_ref()) else {
                continue;
            };
            if a.zone.nest_level != level {
                break;
            }
            if b.zone.nest_level != level
                || a.zone.parent_id != b.zone.parent_id
                || !matches(a.zone.label, b.zone.label)
            {
                continue;
            }

            a.zone.duration = a.zone.duration.saturating_add(b.zone.duration);
            a.zone.start_time = a.zone.start_time.saturating_add(b.zone.start_time);
            a.accumulated = reduce(Some(&a.accumulated), &b.zone);
            let (survivor, removed) = (a.zone.id, b.zone.id);
            tail[0] = None;

            for zone in slots.iter_mut().flatten() {
                if zone.zone.parent_id == removed {
                    zone.zone.parent_id = survivor;
                }
            }
            merged += 1;
        }
    }
    merged
}

/// Surviving zones of an accumulation, in input order
#[derive(Debug, Clone)]
pub struct AccumulatedZones<'s, 'a, A> {
    slots: std::slice::Iter<'s, Option<AccumulatedZoneData<'a, A>>>,
    remaining: usize,
}

impl<'s, 'a, A> Iterator for AccumulatedZones<'s, 'a, A> {
    type Item = &'s AccumulatedZoneData<'a, A>;

    fn next(&mut self) -> Option<Self::Item> {
        let next = self.slots.find_map(Option::as_ref)?;
        self.remaining -= 1;
        Some(next)
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<A> ExactSizeIterator for AccumulatedZones<'_, '_, A> {}

//! Property-based tests for the recording and decoding pipeline
//!
//! Core features tested:
//! 1. Time gap and 7x5 value codecs
//! 2. Recorder -> EventRange / ZoneRange / VariableRange round trips
//! 3. Zone nesting and sibling ordering
//! 4. Reconstruction of recordings cut short by a full buffer
//! 5. Accumulation of a recording merged with itself
//! 6. Decoding arbitrary bytes never panics

use proptest::prelude::*;
use std::cell::Cell;
use zoneprof::codec::{self, MAX_TIME_GAP};
use zoneprof::accumulate::{accumulate_zones, exact_label_match, AccumulatedZoneData, DurationStats};
use zoneprof::event::{EventId, EventKind, VariableType, VariableValue};
use zoneprof::{Event, EventRange, Recorder, VariableRange, ZoneData, ZoneRange};

const LABELS: [&str; 4] = ["frame", "render", "physics", "audio"];

#[derive(Debug, Clone)]
enum Op {
    Start(usize),
    End,
    Variable(u32, u8),
    Advance(u64),
    Checkpoint,
    /// A gap too large for a time-gap field, forcing an automatic checkpoint
    Jump,
}

fn op_strategy() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => (0..LABELS.len()).prop_map(Op::Start),
        3 => Just(Op::End),
        1 => (any::<u32>(), 1u8..=3).prop_map(|(bits, tag)| Op::Variable(bits, tag)),
        3 => (0u64..5_000).prop_map(Op::Advance),
        1 => Just(Op::Checkpoint),
        1 => Just(Op::Jump),
    ]
}

fn value_of(bits: u32, tag: u8) -> VariableValue {
    let variable_type = VariableType::try_from(tag).unwrap();
    VariableValue::from_bits(variable_type, bits)
}

/// Time, id, label and raw variable bits of one event
///
/// Variables compare by bits so NaN payloads stay comparable.
type EventKey = (u64, EventId, Option<&'static str>, Option<u32>);

fn event_key<'a>(event: &Event<'a>) -> (u64, EventId, Option<&'a str>, Option<u32>) {
    let (label, bits) = match event.kind {
        EventKind::Info(label) => (Some(label), None),
        EventKind::Variable(value) => (None, Some(value.to_bits())),
        _ => (None, None),
    };
    (event.time, event.id(), label, bits)
}

/// (id, start time, label, nest level)
type OpenZone = (u32, u64, &'static str, u32);

/// What a replayed recording should decode to
#[derive(Default)]
struct Expected {
    zones: Vec<ZoneData<'static>>,
    variables: Vec<(&'static str, u64, u32)>,
    events: Vec<EventKey>,
    last_time: u64,
}

impl Expected {
    /// Record the expected events for one recorder call made at `time`
    fn push(&mut self, time: u64, events: &[(EventId, Option<&'static str>, Option<u32>)]) {
        if time - self.last_time > MAX_TIME_GAP {
            self.events.push((time, EventId::Checkpoint, None, None));
        }
        for &(id, label, bits) in events {
            self.events.push((time, id, label, bits));
        }
        self.last_time = time;
    }
}

fn close(
    recorder: &mut Recorder<'_, &Cell<u64>>,
    time: &Cell<u64>,
    open: &mut Vec<OpenZone>,
    expected: &mut Expected,
) {
    let (id, start, label, level) = open.pop().unwrap();
    recorder.end_zone(level);
    expected.push(time.get(), &[(EventId::ZoneEnd, None, None)]);
    expected.zones.push(ZoneData {
        id,
        parent_id: open.last().map_or(0, |z| z.0),
        nest_level: level,
        start_time: start,
        duration: time.get() - start,
        label,
    });
}

/// Replay `ops` into `recorder`, closing every zone left open.
///
/// Returns the zones, variables and events the recording should decode to.
fn replay(recorder: &mut Recorder<'_, &Cell<u64>>, time: &Cell<u64>, ops: &[Op]) -> Expected {
    let mut expected = Expected {
        last_time: time.get(),
        ..Expected::default()
    };
    let mut open: Vec<OpenZone> = Vec::new();
    let mut next_id = 1;

    for op in ops {
        match *op {
            Op::Start(i) => {
                let level = recorder.start_zone(LABELS[i]);
                expected.push(
                    time.get(),
                    &[(EventId::ZoneStart, None, None), (EventId::Info, Some(LABELS[i]), None)],
                );
                open.push((next_id, time.get(), LABELS[i], level));
                next_id += 1;
            }
            Op::End if !open.is_empty() => close(recorder, time, &mut open, &mut expected),
            Op::End => {}
            Op::Variable(bits, tag) => {
                recorder.record_variable("var", value_of(bits, tag));
                expected.push(
                    time.get(),
                    &[(EventId::Variable, None, Some(bits)), (EventId::Info, Some("var"), None)],
                );
                expected.variables.push(("var", time.get(), bits));
            }
            Op::Advance(dt) => time.set(time.get() + dt),
            Op::Checkpoint => {
                recorder.checkpoint();
                expected.events.push((time.get(), EventId::Checkpoint, None, None));
                expected.last_time = time.get();
            }
            // Capped so absolute times stay within the checkpoint range
            Op::Jump if time.get() < (1 << 52) => time.set(time.get() + MAX_TIME_GAP + 1),
            Op::Jump => {}
        }
    }
    while !open.is_empty() {
        close(recorder, time, &mut open, &mut expected);
    }
    expected
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    #[test]
    fn prop_time_gap_round_trip(gap in 0..=MAX_TIME_GAP) {
        let mut out = [0u8; 7];
        let n = codec::encode_time_gap(gap, &mut out).unwrap();
        prop_assert_eq!(n, codec::time_gap_byte_count(gap).unwrap());
        prop_assert!(out[..n].iter().all(|&b| b & 0x80 != 0));
        prop_assert_eq!(codec::decode_time_gap(&out[..n]), gap);
    }

    #[test]
    fn prop_time_gap_needing_eighth_group_rejected(gap in (MAX_TIME_GAP + 1)..=u64::MAX) {
        prop_assert!(codec::time_gap_byte_count(gap).is_err());
        let mut out = [0u8; 16];
        prop_assert!(codec::encode_time_gap(gap, &mut out).is_err());
    }

    #[test]
    fn prop_7x5_round_trip(bits in any::<u32>()) {
        let packed = codec::encode_7x5(bits);
        prop_assert!(packed.iter().all(|&b| b != 0));
        prop_assert_eq!(codec::decode_7x5(&packed), bits);

        // Every interpretation of the bits survives, NaN payloads included
        for tag in 1u8..=3 {
            let value = value_of(bits, tag);
            prop_assert_eq!(value.to_bits(), bits);
        }
        let float = f32::from_bits(bits);
        prop_assert_eq!(f32::from_bits(codec::decode_7x5(&packed)).to_bits(), float.to_bits());
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(100))]

    #[test]
    fn prop_recorded_operations_round_trip(ops in prop::collection::vec(op_strategy(), 0..200)) {
        let time = Cell::new(0u64);
        let mut buffer = vec![0u8; 64 * 1024];
        let mut recorder = Recorder::with_clock(&mut buffer, &time);
        let expected = replay(&mut recorder, &time, &ops);
        let (expected_zones, expected_vars) = (&expected.zones, &expected.variables);
        prop_assert!(!recorder.out_of_space());
        prop_assert_eq!(recorder.diagnostics().dropped_events, 0);

        let data = recorder.profile_data();
        prop_assert!(EventRange::new(data).all(|e| e.is_ok()));

        let zones: Vec<_> = ZoneRange::new(data).collect::<Result<_, _>>().unwrap();
        prop_assert_eq!(&zones, expected_zones);

        let vars: Vec<_> = VariableRange::new(data).collect::<Result<_, _>>().unwrap();
        prop_assert_eq!(vars.len(), expected_vars.len());
        for (var, (name, time, bits)) in vars.iter().zip(expected_vars) {
            prop_assert_eq!(var.name, *name);
            prop_assert_eq!(var.time, *time);
            prop_assert_eq!(var.value.to_bits(), *bits);
        }
    }

    #[test]
    fn prop_recorded_event_sequence_round_trip(ops in prop::collection::vec(op_strategy(), 0..200)) {
        let time = Cell::new(0u64);
        let mut buffer = vec![0u8; 64 * 1024];
        let mut recorder = Recorder::with_clock(&mut buffer, &time);
        let expected = replay(&mut recorder, &time, &ops);

        let events: Vec<_> = EventRange::new(recorder.profile_data())
            .collect::<Result<_, _>>()
            .unwrap();
        let decoded: Vec<_> = events.iter().map(event_key).collect();
        prop_assert_eq!(decoded, expected.events);
        prop_assert_eq!(recorder.diagnostics().events() as usize, events.len());
    }

    #[test]
    fn prop_zones_nest_and_siblings_do_not_overlap(ops in prop::collection::vec(op_strategy(), 0..200)) {
        let time = Cell::new(0u64);
        let mut buffer = vec![0u8; 64 * 1024];
        let mut recorder = Recorder::with_clock(&mut buffer, &time);
        replay(&mut recorder, &time, &ops);

        let zones: Vec<_> = ZoneRange::new(recorder.profile_data())
            .collect::<Result<_, _>>()
            .unwrap();

        for (i, zone) in zones.iter().enumerate() {
            if zone.parent_id == 0 {
                prop_assert_eq!(zone.nest_level, 1);
                continue;
            }
            // Children end before their parents, so the parent comes later
            let parent = zones[i + 1..].iter().find(|z| z.id == zone.parent_id).unwrap();
            prop_assert_eq!(parent.nest_level + 1, zone.nest_level);
            prop_assert!(parent.start_time <= zone.start_time);
            prop_assert!(zone.end_time() <= parent.end_time());
        }

        for (i, a) in zones.iter().enumerate() {
            for b in &zones[i + 1..] {
                if a.parent_id == b.parent_id && a.nest_level == b.nest_level {
                    // b ended after a, so it must also have started after a ended
                    prop_assert!(a.end_time() <= b.start_time);
                }
            }
        }
    }

    #[test]
    fn prop_truncated_recording_keeps_every_started_zone(
        size in 0usize..600,
        depth in 1usize..100,
        step in 1u64..300,
    ) {
        let time = Cell::new(0u64);
        let mut buffer = vec![0u8; size];
        let mut recorder = Recorder::with_clock(&mut buffer, &time);
        for _ in 0..depth {
            recorder.start_zone("nested");
            time.set(time.get() + step);
        }
        prop_assert_eq!(recorder.nest_level() as usize, depth);
        if recorder.out_of_space() {
            prop_assert!(recorder.is_full());
        }

        let data = recorder.profile_data();
        let events: Vec<_> = EventRange::new(data).collect::<Result<_, _>>().unwrap();
        let starts = events.iter().filter(|e| e.id() == EventId::ZoneStart).count();
        let last_time = events.last().map_or(0, |e| e.time);

        let zones: Vec<_> = ZoneRange::new(data).collect::<Result<_, _>>().unwrap();
        prop_assert_eq!(zones.len(), starts);
        prop_assert_eq!(recorder.diagnostics().zone_starts as usize, starts);
        for zone in &zones {
            prop_assert_eq!(zone.end_time(), last_time);
        }
        // Innermost first
        for pair in zones.windows(2) {
            prop_assert_eq!(pair[0].nest_level, pair[1].nest_level + 1);
        }
    }

    #[test]
    fn prop_self_merge_doubles_totals(ops in prop::collection::vec(op_strategy(), 0..150)) {
        let time = Cell::new(0u64);
        let mut buffer = vec![0u8; 64 * 1024];
        let mut recorder = Recorder::with_clock(&mut buffer, &time);
        replay(&mut recorder, &time, &ops);
        let data = recorder.profile_data();

        let mut single_storage: Vec<Option<AccumulatedZoneData<'_, DurationStats>>> =
            vec![None; 512];
        let single: Vec<_> = accumulate_zones(
            &mut single_storage,
            DurationStats::reduce,
            exact_label_match,
            [ZoneRange::new(data)],
        )
        .unwrap()
        .copied()
        .collect();

        let mut double_storage: Vec<Option<AccumulatedZoneData<'_, DurationStats>>> =
            vec![None; 512];
        let double: Vec<_> = accumulate_zones(
            &mut double_storage,
            DurationStats::reduce,
            exact_label_match,
            [ZoneRange::new(data), ZoneRange::new(data)],
        )
        .unwrap()
        .copied()
        .collect();

        prop_assert_eq!(single.len(), double.len());
        for (s, d) in single.iter().zip(&double) {
            prop_assert_eq!(s.zone.id, d.zone.id);
            prop_assert_eq!(s.zone.parent_id, d.zone.parent_id);
            prop_assert_eq!(s.zone.nest_level, d.zone.nest_level);
            prop_assert_eq!(s.zone.label, d.zone.label);
            prop_assert_eq!(d.zone.duration, 2 * s.zone.duration);
            prop_assert_eq!(d.accumulated.calls, 2 * s.accumulated.calls);
            prop_assert_eq!(d.accumulated.min, s.accumulated.min);
            prop_assert_eq!(d.accumulated.max, s.accumulated.max);
        }
    }

    #[test]
    fn prop_info_one_byte_short_leaves_unlabeled_zone(
        label_len in 1usize..=255,
        start in 0u64..1_000_000,
    ) {
        let label = "x".repeat(label_len);
        let time = Cell::new(start);
        let start_event = 1 + codec::time_gap_byte_count(start).unwrap();
        let mut buffer = vec![0u8; start_event + 2 + label_len - 1];
        let mut recorder = Recorder::with_clock(&mut buffer, &time);

        let level = recorder.start_zone(&label);
        time.set(start + 10);
        recorder.end_zone(level);

        prop_assert!(recorder.out_of_space());
        prop_assert_eq!(recorder.bytes_written(), start_event);
        let diagnostics = recorder.diagnostics();
        prop_assert_eq!(diagnostics.zone_starts, 1);
        prop_assert_eq!(diagnostics.infos, 0);
        prop_assert_eq!(diagnostics.zone_ends, 0);
        prop_assert_eq!(diagnostics.dropped_events, 2);

        let zones: Vec<_> = ZoneRange::new(recorder.profile_data())
            .collect::<Result<_, _>>()
            .unwrap();
        prop_assert_eq!(zones.len(), 1);
        prop_assert_eq!(zones[0].label, "");
        prop_assert_eq!(zones[0].start_time, start);
        prop_assert_eq!(zones[0].duration, 0);
    }

    #[test]
    fn prop_decoding_arbitrary_bytes_never_panics(data in prop::collection::vec(any::<u8>(), 0..512)) {
        let events = EventRange::new(&data);
        prop_assert!(events.clone().filter(Result::is_err).count() <= 1);
        for event in events.flatten() {
            prop_assert!(event.payload_len() <= 256);
        }
        prop_assert!(ZoneRange::new(&data).filter(Result::is_err).count() <= 1);
        prop_assert!(VariableRange::new(&data).filter(Result::is_err).count() <= 1);
    }

    #[test]
    fn prop_last_checkpoint_resumes_absolute_time(
        ops in prop::collection::vec(op_strategy(), 1..100),
        split in any::<prop::sample::Index>(),
    ) {
        let time = Cell::new(0u64);
        let mut buffer = vec![0u8; 64 * 1024];
        let mut recorder = Recorder::with_clock(&mut buffer, &time);
        let (head, tail) = ops.split_at(split.index(ops.len()));
        replay(&mut recorder, &time, head);
        recorder.checkpoint();
        replay(&mut recorder, &time, tail);

        let data = recorder.profile_data();
        let all: Vec<_> = EventRange::new(data).collect::<Result<_, _>>().unwrap();
        let resumed: Vec<_> = EventRange::from_last_checkpoint(data)
            .unwrap()
            .collect::<Result<_, _>>()
            .unwrap();
        prop_assert!(matches!(resumed[0].kind, EventKind::Checkpoint));
        // Compare by time and id: NaN variables never compare equal
        let key = |e: &zoneprof::Event<'_>| (e.time, e.id());
        let tail: Vec<_> = all[all.len() - resumed.len()..].iter().map(key).collect();
        let resumed: Vec<_> = resumed.iter().map(key).collect();
        prop_assert_eq!(tail, resumed);
    }
}

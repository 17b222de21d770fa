#![no_main]

use libfuzzer_sys::fuzz_target;
use zoneprof::accumulate::{accumulate_zones, exact_label_match, AccumulatedZoneData, DurationStats};
use zoneprof::{EventRange, VariableRange, ZoneRange};

fuzz_target!(|data: &[u8]| {
    // Decoding untrusted dumps must never panic or read out of bounds
    for event in EventRange::new(data).flatten() {
        let _ = event.payload_len();
    }
    if let Some(events) = EventRange::from_last_checkpoint(data) {
        let _ = events.count();
    }
    let _ = VariableRange::new(data).count();

    // Every zone yielded must end no earlier than it started
    for zone in ZoneRange::new(data).flatten() {
        assert!(zone.end_time() >= zone.start_time);
    }

    let mut storage: Vec<Option<AccumulatedZoneData<'_, DurationStats>>> = vec![None; 256];
    let _ = accumulate_zones(
        &mut storage,
        DurationStats::reduce,
        exact_label_match,
        [ZoneRange::new(data)],
    );
});

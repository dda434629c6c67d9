use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use resona_core::gate::{PlaybackGate, PlaybackState};
use resona_core::metrics::OutputMetrics;
use resona_core::output::{SampleWriter, SharedRing};

/// Level that quantizes to exactly `value` in the i16 mapping.
fn level_for(value: i16) -> f32 {
    value as f32 / i16::MAX as f32
}

#[test]
fn prefill_play_drain_pause_cycle() {
    let metrics = Arc::new(OutputMetrics::default());
    let shared = SharedRing::<i16>::new(100, Arc::clone(&metrics));
    let mut gate = PlaybackGate::new();
    let mut transitions = Vec::new();

    // Producer pre-fills with an increasing ramp, evaluating the gate after
    // every push the way the endpoint does.
    for value in 1..=60 {
        let occupancy = shared.push_level(level_for(value));
        if let Some(state) = gate.update(occupancy) {
            transitions.push(state);
        }
    }
    assert_eq!(shared.occupancy(), 0.6);
    assert_eq!(transitions, vec![PlaybackState::Playing]);

    // The fake sink pulls one oversized block on its own schedule.
    let mut block = [0i16; 80];
    shared.fill(&mut block, 1);

    let real: Vec<i16> = (1..=60).collect();
    assert_eq!(&block[..60], real.as_slice());
    // Underrun masking: the remainder repeats the last delivered sample.
    assert_eq!(&block[60..], &[60i16; 20]);

    let snap = metrics.snapshot();
    assert_eq!(snap.samples_pulled, 60);
    assert_eq!(snap.samples_padded, 20);
    assert_eq!(shared.occupancy(), 0.0);

    // The drained ring pauses playback at the next push evaluation.
    let occupancy = shared.push_level(level_for(61));
    assert_eq!(gate.update(occupancy), Some(PlaybackState::Paused));
    assert_eq!(transitions, vec![PlaybackState::Playing]);
}

#[test]
fn overflow_keeps_the_most_recent_capacity_samples() {
    let metrics = Arc::new(OutputMetrics::default());
    let shared = SharedRing::<i16>::new(100, Arc::clone(&metrics));

    for value in 1..=250 {
        shared.push_level(level_for(value));
    }
    assert_eq!(metrics.snapshot().samples_evicted, 150);

    let mut block = [0i16; 100];
    shared.fill(&mut block, 1);
    let expected: Vec<i16> = (151..=250).collect();
    assert_eq!(&block[..], expected.as_slice());
}

#[test]
fn concurrent_producer_and_sink_preserve_sample_order() {
    const TOTAL: i16 = 10_000;

    let metrics = Arc::new(OutputMetrics::default());
    let shared = Arc::new(SharedRing::<i16>::new(256, metrics));

    let producer_ring = Arc::clone(&shared);
    let producer = thread::spawn(move || {
        for value in 0..=TOTAL {
            producer_ring.push_level(level_for(value));
            if value % 512 == 0 {
                thread::yield_now();
            }
        }
    });

    // The fake sink pulls fixed blocks on its own cadence until it has seen
    // the final sample (padding repeats it forever once the ring drains).
    let mut delivered = Vec::new();
    let deadline = Instant::now() + Duration::from_secs(5);
    let mut block = [0i16; 64];
    while delivered.last() != Some(&TOTAL) {
        assert!(Instant::now() < deadline, "sink never observed the final sample");
        shared.fill(&mut block, 1);
        delivered.extend_from_slice(&block);
        thread::sleep(Duration::from_micros(200));
    }
    producer.join().expect("producer thread panicked");

    // Evictions skip forward and padding repeats; neither may reorder.
    for pair in delivered.windows(2) {
        assert!(
            pair[0] <= pair[1],
            "delivered samples out of order: {} then {}",
            pair[0],
            pair[1]
        );
    }
}

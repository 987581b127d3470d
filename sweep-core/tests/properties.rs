use std::collections::HashSet;

use proptest::prelude::*;

use sweep_core::analog::{AnalogExtremes, AtomicExtremes};
use sweep_core::averager::SampleAccumulator;
use sweep_core::sweep::{Advance, SweepAxis, SweepParameters, SweepPlan, SweepSequencer};

fn axis_u8() -> impl Strategy<Value = SweepAxis<u8>> {
    (0u8..=60, 0u8..=40, 1u8..=25)
        .prop_map(|(min, span, step)| SweepAxis::new(min, min + span, step).unwrap())
}

fn axis_u16() -> impl Strategy<Value = SweepAxis<u16>> {
    (0u16..=500, 0u16..=60, 1u16..=30)
        .prop_map(|(min, span, step)| SweepAxis::new(min, min + span, step).unwrap())
}

fn plan() -> impl Strategy<Value = SweepPlan> {
    (axis_u8(), axis_u8(), axis_u16())
        .prop_map(|(payload, retries, interval)| SweepPlan::new(payload, retries, interval).unwrap())
}

fn key(params: SweepParameters) -> (u16, u8, u8) {
    (params.retry_interval_ms, params.retry_count, params.payload_len)
}

proptest! {
    #[test]
    fn sequencer_visits_every_combination_once_in_odometer_order(plan in plan()) {
        let mut sequencer = SweepSequencer::new(plan);
        let mut visited = vec![sequencer.current()];
        let mut finished_signals = 0;

        loop {
            match sequencer.advance() {
                Advance::Next(params) => visited.push(params),
                Advance::Finished => {
                    finished_signals += 1;
                    break;
                }
            }
        }

        prop_assert_eq!(finished_signals, 1);
        prop_assert_eq!(visited.len() as u32, plan.combination_count());

        let unique: HashSet<_> = visited.iter().copied().collect();
        prop_assert_eq!(unique.len(), visited.len());
        prop_assert!(visited.iter().all(|params| plan.contains(params)));

        // Slowest digit first: the visit order is strictly increasing.
        prop_assert!(visited.windows(2).all(|pair| key(pair[0]) < key(pair[1])));

        for _ in 0..3 {
            prop_assert_eq!(sequencer.advance(), Advance::Finished);
        }
    }

    #[test]
    fn accumulator_reports_truncated_mean_on_target(
        samples in prop::collection::vec(0u32..=100_000, 1..12)
    ) {
        let target = u32::try_from(samples.len()).unwrap();
        let mut acc = SampleAccumulator::new(target).unwrap();

        let (last, head) = samples.split_last().unwrap();
        for sample in head {
            prop_assert_eq!(acc.record_sample(*sample), None);
        }
        let mean = acc.record_sample(*last).expect("target reached");

        let total: u64 = samples.iter().map(|sample| u64::from(*sample)).sum();
        prop_assert_eq!(mean.raw(), total * 10 / u64::from(target));
        prop_assert_eq!(acc.count(), 0);
    }

    #[test]
    fn extremes_match_sequence_bounds(values in prop::collection::vec(any::<u32>(), 1..64)) {
        let extremes = AtomicExtremes::new();
        extremes.observe(12_345);
        extremes.reset();

        for value in &values {
            extremes.observe(*value);
        }

        let expected = AnalogExtremes {
            min: *values.iter().min().unwrap(),
            max: *values.iter().max().unwrap(),
        };
        prop_assert_eq!(extremes.read(), expected);
        prop_assert!(extremes.read().is_sampled());
    }
}

#[test]
fn extremes_from_concurrent_writers_cover_all_samples() {
    let extremes = AtomicExtremes::new();

    std::thread::scope(|scope| {
        for worker in 0..4u32 {
            let extremes = &extremes;
            scope.spawn(move || {
                for step in 0..1_000u32 {
                    extremes.observe(100 + worker * 1_000 + step);
                }
            });
        }
    });

    assert_eq!(extremes.read(), AnalogExtremes { min: 100, max: 4_099 });
}

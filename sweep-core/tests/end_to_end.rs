use sweep_core::analog::{AnalogProbe, AtomicExtremes, NoAnalog};
use sweep_core::config::{DEFAULT_PLAN, MeasurementConfig};
use sweep_core::measurement::{
    BroadcastRequest, MeasurementController, MeasurementEvent, MeasurementState, RadioLink,
    TransmitRejected, TxHandle, TxStatus,
};
use sweep_core::report::ReportLog;
use sweep_core::sweep::{SweepAxis, SweepPlan};
use sweep_core::telemetry::TelemetryEventKind;

#[derive(Default)]
struct RecordingRadio {
    requests: Vec<(TxHandle, usize, u8, u16)>,
}

impl RecordingRadio {
    fn last_handle(&self) -> TxHandle {
        self.requests.last().expect("no transmission issued").0
    }
}

impl RadioLink for RecordingRadio {
    fn transmit_broadcast(&mut self, request: &BroadcastRequest<'_>) -> Result<(), TransmitRejected> {
        assert!(request.payload.iter().all(|byte| *byte == b' '));
        self.requests.push((
            request.handle,
            request.payload.len(),
            request.retry_count,
            request.retry_interval_ms,
        ));
        Ok(())
    }
}

fn scenario_plan() -> SweepPlan {
    SweepPlan::new(
        SweepAxis::new(0, 20, 20).unwrap(),
        SweepAxis::new(0, 2, 2).unwrap(),
        SweepAxis::new(1, 1, 2).unwrap(),
    )
    .unwrap()
}

/// Ticks once per second and completes each transmission `latency(n)` ms later.
fn run_to_completion<A: AnalogProbe>(
    controller: &mut MeasurementController<RecordingRadio, A>,
    log: &mut ReportLog<16>,
    mut latency: impl FnMut(usize) -> u32,
    mut during_window: impl FnMut(usize),
) {
    controller
        .dispatch(MeasurementEvent::StartUp, 0, log)
        .expect("start-up");

    let mut now = 0u32;
    let mut sent = 0usize;
    while !controller.is_finished() {
        now += 1_000;
        controller
            .dispatch(MeasurementEvent::Tick, now, log)
            .expect("tick");
        assert_eq!(controller.state(), MeasurementState::WaitingForCompletion);

        during_window(sent);
        let handle = controller.radio().last_handle();
        controller
            .dispatch(
                MeasurementEvent::TransmitComplete {
                    handle,
                    status: TxStatus::Delivered,
                },
                now + latency(sent),
                log,
            )
            .expect("completion");
        sent += 1;
        assert!(sent <= 64, "sweep did not terminate");
    }
}

#[test]
fn two_by_two_sweep_emits_four_rows_then_finished() {
    let config = MeasurementConfig::DEFAULT
        .with_plan(scenario_plan())
        .with_samples(2);
    let mut controller =
        MeasurementController::new(config, RecordingRadio::default(), NoAnalog).unwrap();
    let mut log = ReportLog::<16>::new();

    // Alternating 16 ms and 17 ms completions average to 16.5 ms.
    run_to_completion(&mut controller, &mut log, |n| 16 + (n as u32 % 2), |_| {});

    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(
        lines,
        [
            "nChars,nRetry,tRetry[ms],Time[ms]",
            "0,0,1,165",
            "20,0,1,165",
            "0,2,1,165",
            "20,2,1,165",
            "Finished",
        ]
    );

    let progress = controller.progress();
    assert_eq!(progress.transmissions, 8);
    assert_eq!(progress.rows_emitted, 4);
    assert_eq!(progress.delivered, 8);
    assert_eq!(progress.stale_completions, 0);

    let requests = &controller.radio().requests;
    assert_eq!(requests.len(), 8);
    assert_eq!((requests[0].1, requests[0].2), (0, 0));
    assert_eq!((requests[1].1, requests[1].2), (0, 0));
    assert_eq!((requests[2].1, requests[2].2), (20, 0));
    assert_eq!((requests[7].1, requests[7].2, requests[7].3), (20, 2, 1));
}

#[test]
fn analog_mode_appends_voltages_from_last_window() {
    static EXTREMES: AtomicExtremes = AtomicExtremes::new();

    let config = MeasurementConfig::DEFAULT
        .with_plan(scenario_plan())
        .with_samples(2);
    let mut controller =
        MeasurementController::new(config, RecordingRadio::default(), &EXTREMES).unwrap();
    let mut log = ReportLog::<16>::new();

    run_to_completion(
        &mut controller,
        &mut log,
        |_| 10,
        |_| {
            for raw in [512, 300, 700, 450] {
                EXTREMES.observe(raw);
            }
        },
    );

    let lines: Vec<&str> = log.lines().collect();
    assert_eq!(lines[0], "nChars,nRetry,tRetry[ms],Time[ms],Min[mV],Max[mV]");
    // 300 * 3600 / 1023 = 1055, 700 * 3600 / 1023 = 2463
    assert_eq!(lines[1], "0,0,1,100,1055,2463");
    assert_eq!(lines.len(), 6);
    assert_eq!(lines[5], "Finished");
}

#[test]
fn analog_window_without_samples_leaves_cells_empty() {
    let extremes = AtomicExtremes::new();
    let plan = SweepPlan::new(
        SweepAxis::new(0, 0, 20).unwrap(),
        SweepAxis::new(0, 0, 2).unwrap(),
        SweepAxis::new(1, 1, 2).unwrap(),
    )
    .unwrap();
    let config = MeasurementConfig::DEFAULT.with_plan(plan).with_samples(1);
    let mut controller =
        MeasurementController::new(config, RecordingRadio::default(), &extremes).unwrap();
    let mut log = ReportLog::<16>::new();

    // A reading left over from before the window must not leak into the row.
    extremes.observe(999);
    run_to_completion(&mut controller, &mut log, |_| 7, |_| {});

    assert_eq!(log.lines().nth(1), Some("0,0,1,70,,"));
}

#[test]
fn default_plan_runs_every_combination() {
    let config = MeasurementConfig::DEFAULT.with_samples(1);
    let mut controller =
        MeasurementController::new(config, RecordingRadio::default(), NoAnalog).unwrap();

    let mut log = ReportLog::<16>::new();
    controller
        .dispatch(MeasurementEvent::StartUp, 0, &mut log)
        .unwrap();

    let mut rows = 0u32;
    let mut now = 0u32;
    while !controller.is_finished() {
        now += 1_000;
        // Discard the log to keep it small; rows are counted from transitions.
        log.clear();
        controller
            .dispatch(MeasurementEvent::Tick, now, &mut log)
            .unwrap();
        let handle = controller.radio().last_handle();
        let transition = controller
            .dispatch(
                MeasurementEvent::TransmitComplete {
                    handle,
                    status: TxStatus::Failed,
                },
                now + 5,
                &mut log,
            )
            .unwrap();
        if transition.row.is_some() {
            rows += 1;
        }
    }

    assert_eq!(rows, DEFAULT_PLAN.combination_count());
    assert_eq!(log.last(), Some("Finished"));
    assert_eq!(controller.progress().failed_deliveries, rows);

    let finished = controller
        .telemetry()
        .latest()
        .expect("telemetry recorded")
        .event;
    assert_eq!(finished, TelemetryEventKind::SweepFinished { rows: 150 });
}

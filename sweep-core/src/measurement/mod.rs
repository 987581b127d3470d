//! Measurement state machine shared between firmware and host targets.
//!
//! The controller is driven by three events: a one-shot start-up, a periodic
//! tick that paces transmissions, and the radio's transmit-complete
//! notification. Each dispatch runs to completion without blocking. A handler
//! that needs the next state to see the same event asks for it explicitly with
//! [`Directive::Reenter`] instead of falling through.
//!
//! Exactly one measurement window is open at a time. The window's start
//! timestamp and the analog extremes are owned here and reset only while no
//! window is open.

use core::fmt;

use crate::analog::AnalogProbe;
use crate::averager::{AveragerError, SampleAccumulator};
use crate::config::MeasurementConfig;
use crate::report::{MeasurementRow, ReportError, ReportLine, ReportSink, VoltageCells};
use crate::sweep::{Advance, SweepParameters, SweepSequencer};
use crate::telemetry::{TelemetryEventKind, TelemetryRecorder};

pub mod radio;

pub use radio::{
    BroadcastRequest, PAYLOAD_FILL, RadioLink, TransmitRejected, TxHandle, TxStatus,
    broadcast_payload,
};

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MeasurementState {
    Idle,
    WaitingForTick,
    WaitingForCompletion,
    /// Terminal. The sweep does not restart.
    Finished,
}

impl MeasurementState {
    pub const fn is_terminal(self) -> bool {
        matches!(self, MeasurementState::Finished)
    }
}

impl fmt::Display for MeasurementState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            MeasurementState::Idle => "idle",
            MeasurementState::WaitingForTick => "waiting-for-tick",
            MeasurementState::WaitingForCompletion => "waiting-for-completion",
            MeasurementState::Finished => "finished",
        };
        f.write_str(label)
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MeasurementEvent {
    StartUp,
    Tick,
    /// The radio link finished handing the request to the radio. The open
    /// window is re-stamped so host-link serialization is not timed.
    TransmitSent { handle: TxHandle },
    TransmitComplete { handle: TxHandle, status: TxStatus },
}

/// What to do when the radio refuses a transmission at issue time.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum RejectionPolicy {
    /// Drop the window and issue again on the next tick with the same parameters.
    #[default]
    RetryNextTick,
    /// Keep the window open and wait for a completion anyway.
    AwaitCompletion,
}

/// What to do when a completion does not arrive within the configured timeout.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub enum TimeoutPolicy {
    /// Abandon the window and issue a fresh transmission in the same tick.
    #[default]
    Reissue,
    /// Record the elapsed time as a no-response sample and carry on.
    RecordSample,
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum MeasurementError {
    Averager(AveragerError),
    /// A report line could not be delivered. The state change still happened.
    Report(ReportError),
}

impl From<AveragerError> for MeasurementError {
    fn from(err: AveragerError) -> Self {
        MeasurementError::Averager(err)
    }
}

impl From<ReportError> for MeasurementError {
    fn from(err: ReportError) -> Self {
        MeasurementError::Report(err)
    }
}

impl fmt::Display for MeasurementError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MeasurementError::Averager(err) => write!(f, "averager: {err}"),
            MeasurementError::Report(err) => write!(f, "report: {err}"),
        }
    }
}

/// Counters accumulated over a sweep.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct SweepProgress {
    pub transmissions: u32,
    pub rejections: u32,
    pub timeouts: u32,
    pub stale_completions: u32,
    pub delivered: u32,
    pub failed_deliveries: u32,
    pub rows_emitted: u32,
    pub lines_lost: u32,
}

/// Result of one dispatch.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct Transition {
    pub from: MeasurementState,
    pub to: MeasurementState,
    /// Data row emitted while handling the event, if any.
    pub row: Option<MeasurementRow>,
}

impl Transition {
    pub fn changed_state(&self) -> bool {
        self.from != self.to
    }
}

/// Follow-up requested by a state handler.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum Directive {
    Settle,
    /// Run `event` through the handler of the state just entered.
    Reenter(MeasurementEvent),
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
struct MeasurementWindow {
    handle: TxHandle,
    started_at_ms: u32,
}

/// Per-dispatch scratch collected by the handlers.
#[derive(Default)]
struct DispatchOutput {
    row: Option<MeasurementRow>,
    failure: Option<ReportError>,
}

/// Drives one sweep against a radio link and an analog probe.
pub struct MeasurementController<R, A> {
    config: MeasurementConfig,
    radio: R,
    probe: A,
    state: MeasurementState,
    sequencer: SweepSequencer,
    accumulator: SampleAccumulator,
    window: Option<MeasurementWindow>,
    next_handle: TxHandle,
    progress: SweepProgress,
    telemetry: TelemetryRecorder,
}

impl<R, A> MeasurementController<R, A>
where
    R: RadioLink,
    A: AnalogProbe,
{
    pub fn new(config: MeasurementConfig, radio: R, probe: A) -> Result<Self, MeasurementError> {
        let accumulator = SampleAccumulator::new(config.samples_per_combination)?;
        Ok(Self {
            sequencer: SweepSequencer::new(config.plan),
            config,
            radio,
            probe,
            state: MeasurementState::Idle,
            accumulator,
            window: None,
            next_handle: TxHandle::FIRST,
            progress: SweepProgress::default(),
            telemetry: TelemetryRecorder::new(),
        })
    }

    pub fn state(&self) -> MeasurementState {
        self.state
    }

    pub fn is_finished(&self) -> bool {
        self.state.is_terminal()
    }

    pub fn config(&self) -> &MeasurementConfig {
        &self.config
    }

    /// Parameters of the combination currently being measured.
    pub fn current_parameters(&self) -> SweepParameters {
        self.sequencer.current()
    }

    /// Samples collected toward the current combination's mean.
    pub fn samples_collected(&self) -> u32 {
        self.accumulator.count()
    }

    pub fn progress(&self) -> &SweepProgress {
        &self.progress
    }

    pub fn telemetry(&self) -> &TelemetryRecorder {
        &self.telemetry
    }

    /// Handle of the open window, if one is open.
    pub fn open_handle(&self) -> Option<TxHandle> {
        self.window.map(|window| window.handle)
    }

    pub fn radio(&self) -> &R {
        &self.radio
    }

    pub fn radio_mut(&mut self) -> &mut R {
        &mut self.radio
    }

    pub fn probe(&self) -> &A {
        &self.probe
    }

    /// Feeds one event through the state machine.
    ///
    /// A [`MeasurementError::Report`] means a line was lost; the transition
    /// itself was applied and the controller can keep running.
    pub fn dispatch<S>(
        &mut self,
        event: MeasurementEvent,
        now_ms: u32,
        sink: &mut S,
    ) -> Result<Transition, MeasurementError>
    where
        S: ReportSink + ?Sized,
    {
        let from = self.state;
        let mut out = DispatchOutput::default();
        let mut pending = Some(event);

        while let Some(event) = pending.take() {
            let directive = match self.state {
                MeasurementState::Idle => self.on_idle(event, now_ms, sink, &mut out),
                MeasurementState::WaitingForTick => self.on_waiting_for_tick(event, now_ms),
                MeasurementState::WaitingForCompletion => {
                    self.on_waiting_for_completion(event, now_ms, sink, &mut out)
                }
                MeasurementState::Finished => self.on_finished(event, now_ms),
            };

            if let Directive::Reenter(next) = directive {
                pending = Some(next);
            }
        }

        if let Some(err) = out.failure {
            return Err(MeasurementError::Report(err));
        }

        Ok(Transition {
            from,
            to: self.state,
            row: out.row,
        })
    }

    fn on_idle<S>(
        &mut self,
        event: MeasurementEvent,
        now_ms: u32,
        sink: &mut S,
        out: &mut DispatchOutput,
    ) -> Directive
    where
        S: ReportSink + ?Sized,
    {
        match event {
            MeasurementEvent::StartUp => {
                self.sequencer.reset();
                self.accumulator.reset();
                self.probe.arm();

                let analog = self.probe.is_enabled();
                self.emit(sink, &ReportLine::Header { analog }, out);
                self.record(
                    TelemetryEventKind::SweepStarted {
                        combinations: self.config.plan.combination_count(),
                    },
                    now_ms,
                );
                self.state = MeasurementState::WaitingForTick;
            }
            MeasurementEvent::TransmitComplete { handle, .. } => self.note_stale(handle, now_ms),
            MeasurementEvent::Tick | MeasurementEvent::TransmitSent { .. } => {}
        }
        Directive::Settle
    }

    fn on_waiting_for_tick(&mut self, event: MeasurementEvent, now_ms: u32) -> Directive {
        match event {
            MeasurementEvent::Tick => self.issue_transmission(now_ms),
            MeasurementEvent::TransmitComplete { handle, .. } => self.note_stale(handle, now_ms),
            MeasurementEvent::StartUp | MeasurementEvent::TransmitSent { .. } => {}
        }
        Directive::Settle
    }

    fn on_waiting_for_completion<S>(
        &mut self,
        event: MeasurementEvent,
        now_ms: u32,
        sink: &mut S,
        out: &mut DispatchOutput,
    ) -> Directive
    where
        S: ReportSink + ?Sized,
    {
        let Some(window) = self.window else {
            // No window means nothing can complete; go back to pacing.
            self.state = MeasurementState::WaitingForTick;
            return Directive::Settle;
        };

        match event {
            MeasurementEvent::TransmitComplete { handle, status } if handle == window.handle => {
                let elapsed_ms = now_ms.wrapping_sub(window.started_at_ms);
                match status {
                    TxStatus::Delivered => {
                        self.progress.delivered = self.progress.delivered.saturating_add(1);
                    }
                    TxStatus::Failed => {
                        self.progress.failed_deliveries =
                            self.progress.failed_deliveries.saturating_add(1);
                    }
                }
                self.record(
                    TelemetryEventKind::TransmitCompleted {
                        handle: handle.raw(),
                        elapsed_ms,
                        delivered: status == TxStatus::Delivered,
                    },
                    now_ms,
                );
                self.close_window(elapsed_ms, now_ms, sink, out);
                Directive::Settle
            }
            MeasurementEvent::TransmitComplete { handle, .. } => {
                self.note_stale(handle, now_ms);
                Directive::Settle
            }
            MeasurementEvent::TransmitSent { handle } if handle == window.handle => {
                self.mark_sent(window, now_ms);
                Directive::Settle
            }
            MeasurementEvent::Tick => self.check_timeout(window, now_ms, sink, out),
            MeasurementEvent::StartUp | MeasurementEvent::TransmitSent { .. } => Directive::Settle,
        }
    }

    fn on_finished(&mut self, event: MeasurementEvent, now_ms: u32) -> Directive {
        if let MeasurementEvent::TransmitComplete { handle, .. } = event {
            self.note_stale(handle, now_ms);
        }
        Directive::Settle
    }

    /// Moves the window start to the moment the request reached the radio.
    fn mark_sent(&mut self, window: MeasurementWindow, now_ms: u32) {
        let queued_ms = now_ms.wrapping_sub(window.started_at_ms);
        self.window = Some(MeasurementWindow {
            started_at_ms: now_ms,
            ..window
        });
        self.record(
            TelemetryEventKind::TransmitSent {
                handle: window.handle.raw(),
                queued_ms,
            },
            now_ms,
        );
    }

    fn issue_transmission(&mut self, now_ms: u32) {
        let params = self.sequencer.current();
        let handle = self.next_handle;
        self.next_handle = handle.next();

        self.probe.begin_window();
        let window = MeasurementWindow {
            handle,
            started_at_ms: now_ms,
        };
        let request = BroadcastRequest::for_parameters(handle, &params);

        match self.radio.transmit_broadcast(&request) {
            Ok(()) => {
                self.progress.transmissions = self.progress.transmissions.saturating_add(1);
                self.record(
                    TelemetryEventKind::TransmitIssued {
                        handle: handle.raw(),
                    },
                    now_ms,
                );
                self.window = Some(window);
                self.state = MeasurementState::WaitingForCompletion;
            }
            Err(TransmitRejected) => {
                self.progress.rejections = self.progress.rejections.saturating_add(1);
                self.record(
                    TelemetryEventKind::TransmitRejected {
                        handle: handle.raw(),
                    },
                    now_ms,
                );
                match self.config.rejection {
                    RejectionPolicy::RetryNextTick => {
                        self.probe.end_window();
                        self.window = None;
                        self.state = MeasurementState::WaitingForTick;
                    }
                    RejectionPolicy::AwaitCompletion => {
                        self.window = Some(window);
                        self.state = MeasurementState::WaitingForCompletion;
                    }
                }
            }
        }
    }

    fn check_timeout<S>(
        &mut self,
        window: MeasurementWindow,
        now_ms: u32,
        sink: &mut S,
        out: &mut DispatchOutput,
    ) -> Directive
    where
        S: ReportSink + ?Sized,
    {
        let Some(limit) = self.config.completion_timeout_ms else {
            return Directive::Settle;
        };
        let elapsed_ms = now_ms.wrapping_sub(window.started_at_ms);
        if elapsed_ms < limit {
            return Directive::Settle;
        }

        self.progress.timeouts = self.progress.timeouts.saturating_add(1);
        self.record(
            TelemetryEventKind::CompletionTimeout {
                handle: window.handle.raw(),
                elapsed_ms,
            },
            now_ms,
        );

        match self.config.timeout {
            TimeoutPolicy::Reissue => {
                self.probe.end_window();
                self.window = None;
                self.state = MeasurementState::WaitingForTick;
                Directive::Reenter(MeasurementEvent::Tick)
            }
            TimeoutPolicy::RecordSample => {
                self.close_window(elapsed_ms, now_ms, sink, out);
                Directive::Settle
            }
        }
    }

    /// Closes the open window and feeds `elapsed_ms` to the averager.
    fn close_window<S>(
        &mut self,
        elapsed_ms: u32,
        now_ms: u32,
        sink: &mut S,
        out: &mut DispatchOutput,
    ) where
        S: ReportSink + ?Sized,
    {
        self.window = None;
        let extremes = self.probe.end_window();

        let Some(mean) = self.accumulator.record_sample(elapsed_ms) else {
            self.state = MeasurementState::WaitingForTick;
            return;
        };

        let row = MeasurementRow {
            params: self.sequencer.current(),
            mean,
            voltage: VoltageCells::from_window(extremes, &self.config.analog_scale),
        };
        self.emit(sink, &ReportLine::Row(row), out);
        out.row = Some(row);
        self.progress.rows_emitted = self.progress.rows_emitted.saturating_add(1);
        self.record(TelemetryEventKind::RowEmitted { mean }, now_ms);

        match self.sequencer.advance() {
            Advance::Next(_) => self.state = MeasurementState::WaitingForTick,
            Advance::Finished => {
                self.emit(sink, &ReportLine::Finished, out);
                self.record(
                    TelemetryEventKind::SweepFinished {
                        rows: self.progress.rows_emitted,
                    },
                    now_ms,
                );
                self.state = MeasurementState::Finished;
            }
        }
    }

    fn note_stale(&mut self, handle: TxHandle, now_ms: u32) {
        self.progress.stale_completions = self.progress.stale_completions.saturating_add(1);
        self.record(
            TelemetryEventKind::StaleCompletion {
                handle: handle.raw(),
            },
            now_ms,
        );
    }

    fn emit<S>(&mut self, sink: &mut S, line: &ReportLine, out: &mut DispatchOutput)
    where
        S: ReportSink + ?Sized,
    {
        if let Err(err) = sink.emit(line) {
            self.progress.lines_lost = self.progress.lines_lost.saturating_add(1);
            out.failure.get_or_insert(err);
        }
    }

    fn record(&mut self, event: TelemetryEventKind, now_ms: u32) {
        let params = self.sequencer.current();
        self.telemetry.record(event, params, now_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analog::NoAnalog;
    use crate::report::ReportLog;
    use crate::sweep::{SweepAxis, SweepPlan};

    #[derive(Default)]
    struct MockRadio {
        reject_next: bool,
        issued: heapless::Vec<(TxHandle, u8, u8, u16), 16>,
    }

    impl RadioLink for MockRadio {
        fn transmit_broadcast(
            &mut self,
            request: &BroadcastRequest<'_>,
        ) -> Result<(), TransmitRejected> {
            if core::mem::take(&mut self.reject_next) {
                return Err(TransmitRejected);
            }
            let len = u8::try_from(request.payload.len()).expect("payload fits u8");
            self.issued
                .push((
                    request.handle,
                    len,
                    request.retry_count,
                    request.retry_interval_ms,
                ))
                .expect("mock radio log full");
            Ok(())
        }
    }

    fn single_point(samples: u32) -> MeasurementConfig {
        let plan = SweepPlan::new(
            SweepAxis::new(20, 20, 20).unwrap(),
            SweepAxis::new(2, 2, 2).unwrap(),
            SweepAxis::new(3, 3, 2).unwrap(),
        )
        .unwrap();
        MeasurementConfig::DEFAULT
            .with_plan(plan)
            .with_samples(samples)
    }

    fn complete(handle: TxHandle) -> MeasurementEvent {
        MeasurementEvent::TransmitComplete {
            handle,
            status: TxStatus::Delivered,
        }
    }

    #[test]
    fn start_up_emits_header_and_waits_for_tick() {
        let mut controller =
            MeasurementController::new(single_point(1), MockRadio::default(), NoAnalog).unwrap();
        let mut log = ReportLog::<4>::new();

        let transition = controller
            .dispatch(MeasurementEvent::StartUp, 0, &mut log)
            .unwrap();

        assert_eq!(transition.from, MeasurementState::Idle);
        assert_eq!(transition.to, MeasurementState::WaitingForTick);
        assert_eq!(log.last(), Some("nChars,nRetry,tRetry[ms],Time[ms]"));
        assert!(controller.radio().issued.is_empty());
    }

    #[test]
    fn tick_issues_with_current_parameters() {
        let mut controller =
            MeasurementController::new(single_point(2), MockRadio::default(), NoAnalog).unwrap();
        let mut log = ReportLog::<4>::new();
        controller
            .dispatch(MeasurementEvent::StartUp, 0, &mut log)
            .unwrap();

        controller
            .dispatch(MeasurementEvent::Tick, 1_000, &mut log)
            .unwrap();

        assert_eq!(controller.state(), MeasurementState::WaitingForCompletion);
        assert_eq!(
            controller.radio().issued.as_slice(),
            &[(TxHandle::FIRST, 20, 2, 3)]
        );
        assert_eq!(controller.open_handle(), Some(TxHandle::FIRST));
    }

    #[test]
    fn single_combination_emits_row_then_finished() {
        let mut controller =
            MeasurementController::new(single_point(2), MockRadio::default(), NoAnalog).unwrap();
        let mut log = ReportLog::<4>::new();
        controller
            .dispatch(MeasurementEvent::StartUp, 0, &mut log)
            .unwrap();

        controller
            .dispatch(MeasurementEvent::Tick, 1_000, &mut log)
            .unwrap();
        let first = controller
            .dispatch(complete(TxHandle::FIRST), 1_016, &mut log)
            .unwrap();
        assert_eq!(first.row, None);
        assert_eq!(controller.samples_collected(), 1);

        controller
            .dispatch(MeasurementEvent::Tick, 2_000, &mut log)
            .unwrap();
        let second = controller
            .dispatch(complete(TxHandle::FIRST.next()), 2_017, &mut log)
            .unwrap();

        let row = second.row.expect("second sample completes the row");
        assert_eq!(row.mean.raw(), 165);
        assert_eq!(second.to, MeasurementState::Finished);

        let lines: heapless::Vec<&str, 4> = log.lines().collect();
        assert_eq!(
            lines.as_slice(),
            &["nChars,nRetry,tRetry[ms],Time[ms]", "20,2,3,165", "Finished"]
        );
    }

    #[test]
    fn rejected_transmission_retries_on_next_tick() {
        let radio = MockRadio {
            reject_next: true,
            ..MockRadio::default()
        };
        let mut controller = MeasurementController::new(single_point(1), radio, NoAnalog).unwrap();
        let mut log = ReportLog::<4>::new();
        controller
            .dispatch(MeasurementEvent::StartUp, 0, &mut log)
            .unwrap();

        controller
            .dispatch(MeasurementEvent::Tick, 1_000, &mut log)
            .unwrap();
        assert_eq!(controller.state(), MeasurementState::WaitingForTick);
        assert_eq!(controller.progress().rejections, 1);

        controller
            .dispatch(MeasurementEvent::Tick, 2_000, &mut log)
            .unwrap();
        assert_eq!(controller.state(), MeasurementState::WaitingForCompletion);
        assert_eq!(controller.radio().issued[0].1, 20);
    }

    #[test]
    fn rejected_transmission_can_wait_like_an_accepted_one() {
        let radio = MockRadio {
            reject_next: true,
            ..MockRadio::default()
        };
        let config = single_point(1).with_rejection(RejectionPolicy::AwaitCompletion);
        let mut controller = MeasurementController::new(config, radio, NoAnalog).unwrap();
        let mut log = ReportLog::<4>::new();
        controller
            .dispatch(MeasurementEvent::StartUp, 0, &mut log)
            .unwrap();

        controller
            .dispatch(MeasurementEvent::Tick, 1_000, &mut log)
            .unwrap();
        assert_eq!(controller.state(), MeasurementState::WaitingForCompletion);

        let transition = controller
            .dispatch(complete(TxHandle::FIRST), 1_004, &mut log)
            .unwrap();
        assert_eq!(transition.row.map(|row| row.mean.raw()), Some(40));
    }

    #[test]
    fn without_timeout_missing_completion_stalls() {
        let mut controller =
            MeasurementController::new(single_point(1), MockRadio::default(), NoAnalog).unwrap();
        let mut log = ReportLog::<4>::new();
        controller
            .dispatch(MeasurementEvent::StartUp, 0, &mut log)
            .unwrap();
        controller
            .dispatch(MeasurementEvent::Tick, 1_000, &mut log)
            .unwrap();

        for second in 2..10 {
            controller
                .dispatch(MeasurementEvent::Tick, second * 1_000, &mut log)
                .unwrap();
        }
        assert_eq!(controller.state(), MeasurementState::WaitingForCompletion);
        assert_eq!(controller.radio().issued.len(), 1);
    }

    #[test]
    fn timeout_reissues_within_the_same_tick() {
        let config = single_point(1).with_completion_timeout(1_500, TimeoutPolicy::Reissue);
        let mut controller =
            MeasurementController::new(config, MockRadio::default(), NoAnalog).unwrap();
        let mut log = ReportLog::<4>::new();
        controller
            .dispatch(MeasurementEvent::StartUp, 0, &mut log)
            .unwrap();
        controller
            .dispatch(MeasurementEvent::Tick, 1_000, &mut log)
            .unwrap();

        controller
            .dispatch(MeasurementEvent::Tick, 2_000, &mut log)
            .unwrap();
        assert_eq!(controller.radio().issued.len(), 1);

        let transition = controller
            .dispatch(MeasurementEvent::Tick, 3_000, &mut log)
            .unwrap();
        assert_eq!(transition.to, MeasurementState::WaitingForCompletion);
        assert_eq!(controller.progress().timeouts, 1);
        assert_eq!(controller.radio().issued.len(), 2);
        assert_eq!(controller.open_handle(), Some(TxHandle::FIRST.next()));

        // The abandoned completion shows up late and must not close the new window.
        controller
            .dispatch(complete(TxHandle::FIRST), 3_010, &mut log)
            .unwrap();
        assert_eq!(controller.progress().stale_completions, 1);
        assert_eq!(controller.state(), MeasurementState::WaitingForCompletion);
    }

    #[test]
    fn timeout_can_record_a_no_response_sample() {
        let config = single_point(1).with_completion_timeout(1_000, TimeoutPolicy::RecordSample);
        let mut controller =
            MeasurementController::new(config, MockRadio::default(), NoAnalog).unwrap();
        let mut log = ReportLog::<4>::new();
        controller
            .dispatch(MeasurementEvent::StartUp, 0, &mut log)
            .unwrap();
        controller
            .dispatch(MeasurementEvent::Tick, 1_000, &mut log)
            .unwrap();

        let transition = controller
            .dispatch(MeasurementEvent::Tick, 2_000, &mut log)
            .unwrap();
        assert_eq!(transition.row.map(|row| row.mean.raw()), Some(10_000));
        assert_eq!(transition.to, MeasurementState::Finished);
    }

    #[test]
    fn elapsed_time_survives_counter_wrap() {
        let mut controller =
            MeasurementController::new(single_point(1), MockRadio::default(), NoAnalog).unwrap();
        let mut log = ReportLog::<4>::new();
        controller
            .dispatch(MeasurementEvent::StartUp, 0, &mut log)
            .unwrap();
        controller
            .dispatch(MeasurementEvent::Tick, u32::MAX - 4, &mut log)
            .unwrap();

        let transition = controller
            .dispatch(complete(TxHandle::FIRST), 6, &mut log)
            .unwrap();
        assert_eq!(transition.row.map(|row| row.mean.raw()), Some(110));
    }

    #[test]
    fn finished_ignores_start_up_and_ticks() {
        let mut controller =
            MeasurementController::new(single_point(1), MockRadio::default(), NoAnalog).unwrap();
        let mut log = ReportLog::<4>::new();
        controller
            .dispatch(MeasurementEvent::StartUp, 0, &mut log)
            .unwrap();
        controller
            .dispatch(MeasurementEvent::Tick, 1_000, &mut log)
            .unwrap();
        controller
            .dispatch(complete(TxHandle::FIRST), 1_005, &mut log)
            .unwrap();
        assert!(controller.is_finished());

        controller
            .dispatch(MeasurementEvent::StartUp, 2_000, &mut log)
            .unwrap();
        controller
            .dispatch(MeasurementEvent::Tick, 3_000, &mut log)
            .unwrap();
        assert!(controller.is_finished());
        assert_eq!(controller.radio().issued.len(), 1);
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn full_sink_reports_lost_line_but_still_transitions() {
        let mut controller =
            MeasurementController::new(single_point(1), MockRadio::default(), NoAnalog).unwrap();
        let mut log = ReportLog::<0>::new();

        let result = controller.dispatch(MeasurementEvent::StartUp, 0, &mut log);
        assert_eq!(
            result,
            Err(MeasurementError::Report(ReportError::SinkFull))
        );
        assert_eq!(controller.state(), MeasurementState::WaitingForTick);
        assert_eq!(controller.progress().lines_lost, 1);
    }

    #[test]
    fn events_before_start_up_issue_nothing() {
        let mut controller =
            MeasurementController::new(single_point(1), MockRadio::default(), NoAnalog).unwrap();
        let mut log = ReportLog::<4>::new();

        let transition = controller
            .dispatch(MeasurementEvent::Tick, 500, &mut log)
            .unwrap();
        assert_eq!(transition.to, MeasurementState::Idle);
        assert!(controller.radio().issued.is_empty());

        controller
            .dispatch(complete(TxHandle::FIRST), 600, &mut log)
            .unwrap();
        assert_eq!(controller.state(), MeasurementState::Idle);
        assert_eq!(controller.progress().stale_completions, 1);
        assert_eq!(controller.progress().transmissions, 0);
        assert!(log.is_empty());
    }

    #[test]
    fn sent_notice_restarts_the_window_clock() {
        let mut controller =
            MeasurementController::new(single_point(1), MockRadio::default(), NoAnalog).unwrap();
        let mut log = ReportLog::<4>::new();
        controller
            .dispatch(MeasurementEvent::StartUp, 0, &mut log)
            .unwrap();
        controller
            .dispatch(MeasurementEvent::Tick, 1_000, &mut log)
            .unwrap();

        // 19 ms spent pushing the frame over the modem UART.
        controller
            .dispatch(
                MeasurementEvent::TransmitSent {
                    handle: TxHandle::FIRST,
                },
                1_019,
                &mut log,
            )
            .unwrap();
        // A notice for some other handle leaves the window alone.
        controller
            .dispatch(
                MeasurementEvent::TransmitSent {
                    handle: TxHandle::FIRST.next(),
                },
                1_030,
                &mut log,
            )
            .unwrap();

        let transition = controller
            .dispatch(complete(TxHandle::FIRST), 1_045, &mut log)
            .unwrap();
        assert_eq!(transition.row.map(|row| row.mean.raw()), Some(260));
        assert_eq!(
            controller
                .telemetry()
                .count_where(|event| matches!(event, TelemetryEventKind::TransmitSent { .. })),
            1
        );
    }

    #[test]
    fn zero_sample_target_is_rejected() {
        let result =
            MeasurementController::new(single_point(0), MockRadio::default(), NoAnalog);
        assert!(matches!(
            result,
            Err(MeasurementError::Averager(AveragerError::ZeroTarget))
        ));
    }
}

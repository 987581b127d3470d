use std::collections::VecDeque;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use sweep_core::analog::{AnalogProbe, AtomicExtremes, NoAnalog};
use sweep_core::config::{MeasurementConfig, TICK_PERIOD_MS};
use sweep_core::measurement::{
    BroadcastRequest, MeasurementController, MeasurementEvent, RadioLink, SweepProgress, TxHandle,
    TxStatus, TransmitRejected,
};
use sweep_core::modem::{
    FrameDecoder, ModemCommand, ModemError, ModemReply, encode_reply, encode_request,
};
use sweep_core::report::{MAX_LINE_LEN, ReportError, ReportLine, ReportSink, format_line};
use sweep_core::sweep::SweepParameters;
use sweep_core::telemetry::{EventId, TelemetryRecorder};

/// Nominal supply while the radio is idle.
const SUPPLY_IDLE_MV: u32 = 3_300;
/// Supply droop while a burst is on air.
const SUPPLY_SAG_MV: u32 = 180;
/// Extra droop per payload byte.
const SUPPLY_SAG_PER_BYTE_MV: u32 = 1;
const SUPPLY_NOISE_MV: u32 = 6;

/// 10-bit converter against a 3.6 V reference.
const ADC_FULL_SCALE_MV: u32 = 3_600;
const ADC_MAX_CODE: u32 = 1_023;

/// Airtime model for the simulated radio.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct RadioModel {
    /// Fixed cost of one on-air attempt (preamble, sync, turnaround).
    pub attempt_overhead_us: u32,
    pub byte_time_us: u32,
    /// Upper bound of the uniform jitter added to every completion.
    pub jitter_ms: u32,
    /// Host link time per frame byte; 115200 baud 8N1 is about 87 us.
    pub uart_byte_us: u32,
}

impl RadioModel {
    pub const DEFAULT: Self = Self {
        attempt_overhead_us: 2_000,
        byte_time_us: 32,
        jitter_ms: 3,
        uart_byte_us: 87,
    };

    /// Time for a request frame of `frame_len` bytes to leave the host.
    pub fn uart_ms(&self, frame_len: usize) -> u32 {
        let frame_len = u32::try_from(frame_len).unwrap_or(u32::MAX);
        frame_len.saturating_mul(self.uart_byte_us).div_ceil(1_000)
    }

    /// Completion latency without jitter.
    pub fn latency_ms(&self, params: &SweepParameters) -> u32 {
        let attempts = u32::from(params.retry_count) + 1;
        let attempt_us =
            self.attempt_overhead_us + u32::from(params.payload_len) * self.byte_time_us;
        let airtime_ms = (attempts * attempt_us).div_ceil(1_000);
        airtime_ms + u32::from(params.retry_count) * u32::from(params.retry_interval_ms)
    }
}

impl Default for RadioModel {
    fn default() -> Self {
        Self::DEFAULT
    }
}

/// Everything a bench run needs.
#[derive(Clone, Debug)]
pub struct SessionOptions {
    pub config: MeasurementConfig,
    pub analog: bool,
    pub seed: u64,
    /// Probability that the modem refuses a request outright.
    pub reject_rate: f64,
    /// Probability that a completion never arrives.
    pub drop_rate: f64,
    pub radio: RadioModel,
    /// Virtual time after which an unfinished sweep is abandoned.
    pub max_virtual_ms: u32,
    pub transcript: Option<PathBuf>,
}

impl SessionOptions {
    pub fn new(config: MeasurementConfig) -> Self {
        let ticks = config
            .plan
            .combination_count()
            .saturating_mul(config.samples_per_combination)
            .saturating_mul(4)
            .saturating_add(8);
        Self {
            config,
            analog: false,
            seed: 0x7853_7765,
            reject_rate: 0.0,
            drop_rate: 0.0,
            radio: RadioModel::DEFAULT,
            max_virtual_ms: ticks.saturating_mul(TICK_PERIOD_MS),
            transcript: None,
        }
    }
}

/// Outcome of one bench run.
#[derive(Debug)]
pub struct SessionReport {
    pub lines: Vec<String>,
    pub progress: SweepProgress,
    pub finished: bool,
    pub elapsed_ms: u32,
}

/// Runs a complete sweep against the simulated radio and supply.
pub fn run(options: &SessionOptions) -> io::Result<SessionReport> {
    let mut transcript = match &options.transcript {
        Some(path) => Some(TranscriptLogger::create(path, options)?),
        None => None,
    };

    let report = if options.analog {
        let extremes = AtomicExtremes::new();
        Bench::new(options, &extremes, Some(&extremes))?.run(transcript.as_mut())?
    } else {
        Bench::new(options, NoAnalog, None)?.run(transcript.as_mut())?
    };

    if let Some(transcript) = transcript.as_mut() {
        transcript.write_summary(&report)?;
    }
    Ok(report)
}

struct Bench<'a, A> {
    controller: MeasurementController<SimulatedRadio, A>,
    supply: Option<&'a AtomicExtremes>,
    sink: LineCollector,
    mirror: TelemetryLog,
    max_virtual_ms: u32,
}

impl<'a, A: AnalogProbe> Bench<'a, A> {
    fn new(
        options: &SessionOptions,
        probe: A,
        supply: Option<&'a AtomicExtremes>,
    ) -> io::Result<Self> {
        let radio = SimulatedRadio::new(options);
        let controller = MeasurementController::new(options.config, radio, probe)
            .map_err(|err| io::Error::new(io::ErrorKind::InvalidInput, err.to_string()))?;
        Ok(Self {
            controller,
            supply,
            sink: LineCollector::default(),
            mirror: TelemetryLog::default(),
            max_virtual_ms: options.max_virtual_ms,
        })
    }

    fn run(mut self, mut transcript: Option<&mut TranscriptLogger>) -> io::Result<SessionReport> {
        let mut now_ms = 0u32;
        let mut next_tick_ms = TICK_PERIOD_MS;
        self.step(MeasurementEvent::StartUp, now_ms, transcript.as_deref_mut())?;

        while !self.controller.is_finished() && now_ms < self.max_virtual_ms {
            now_ms += 1;
            self.controller.radio_mut().set_clock(now_ms);

            if let Some(extremes) = self.supply {
                let code = self.controller.radio_mut().sample_supply_code(now_ms);
                extremes.observe(code);
            }

            while let Some(handle) = self.controller.radio_mut().take_sent(now_ms) {
                let event = MeasurementEvent::TransmitSent { handle };
                self.step(event, now_ms, transcript.as_deref_mut())?;
            }

            while let Some(reply) = self.controller.radio_mut().take_due(now_ms) {
                match reply {
                    Ok(ModemReply::TransmitComplete { handle, status }) => {
                        let event = MeasurementEvent::TransmitComplete { handle, status };
                        self.step(event, now_ms, transcript.as_deref_mut())?;
                    }
                    Ok(ModemReply::Configured) => {}
                    Err(err) => log::warn!("modem: bad reply frame: {err}"),
                }
            }

            if now_ms == next_tick_ms {
                next_tick_ms += TICK_PERIOD_MS;
                self.step(MeasurementEvent::Tick, now_ms, transcript.as_deref_mut())?;
            }
        }

        let finished = self.controller.is_finished();
        if !finished {
            log::warn!("sweep abandoned after {now_ms} ms of virtual time");
        }
        Ok(SessionReport {
            lines: self.sink.lines,
            progress: *self.controller.progress(),
            finished,
            elapsed_ms: now_ms,
        })
    }

    fn step(
        &mut self,
        event: MeasurementEvent,
        now_ms: u32,
        mut transcript: Option<&mut TranscriptLogger>,
    ) -> io::Result<()> {
        let first_new_line = self.sink.lines.len();
        match self.controller.dispatch(event, now_ms, &mut self.sink) {
            Ok(transition) if transition.changed_state() => {
                log::debug!("{} -> {} at {now_ms} ms", transition.from, transition.to);
            }
            Ok(_) => {}
            Err(err) => log::warn!("dispatch at {now_ms} ms: {err}"),
        }

        let telemetry = self.mirror.flush(self.controller.telemetry());
        if let Some(transcript) = transcript.as_deref_mut() {
            for record in &telemetry {
                transcript.append_line(now_ms, TranscriptRole::Telemetry, record)?;
            }
            for line in &self.sink.lines[first_new_line..] {
                transcript.append_line(now_ms, TranscriptRole::Report, line)?;
            }
        }
        Ok(())
    }
}

/// Report sink that keeps rendered lines in memory.
#[derive(Default)]
struct LineCollector {
    lines: Vec<String>,
}

impl ReportSink for LineCollector {
    fn emit(&mut self, line: &ReportLine) -> Result<(), ReportError> {
        let rendered = format_line::<MAX_LINE_LEN>(line)?;
        self.lines.push(rendered.as_str().to_owned());
        Ok(())
    }
}

#[derive(Debug)]
struct InFlight {
    handle: TxHandle,
    params: SweepParameters,
    /// When the last request byte reached the modem.
    sent_ms: u32,
    sent_reported: bool,
    due_ms: u32,
    dropped: bool,
}

/// Modem stand-in: every request and reply passes through the wire codec.
struct SimulatedRadio {
    model: RadioModel,
    rng: StdRng,
    reject_rate: f64,
    drop_rate: f64,
    now_ms: u32,
    in_flight: VecDeque<InFlight>,
}

impl SimulatedRadio {
    fn new(options: &SessionOptions) -> Self {
        Self {
            model: options.radio,
            rng: StdRng::seed_from_u64(options.seed),
            reject_rate: options.reject_rate,
            drop_rate: options.drop_rate,
            now_ms: 0,
            in_flight: VecDeque::new(),
        }
    }

    fn set_clock(&mut self, now_ms: u32) {
        self.now_ms = now_ms;
    }

    /// Next request whose frame finished leaving the host link by `now_ms`.
    fn take_sent(&mut self, now_ms: u32) -> Option<TxHandle> {
        let tx = self
            .in_flight
            .iter_mut()
            .find(|tx| !tx.sent_reported && tx.sent_ms <= now_ms)?;
        tx.sent_reported = true;
        Some(tx.handle)
    }

    /// Pops the next reply due at or before `now_ms`, silently expiring drops.
    fn take_due(&mut self, now_ms: u32) -> Option<Result<ModemReply, ModemError>> {
        loop {
            let due = self.in_flight.front().is_some_and(|tx| tx.due_ms <= now_ms);
            if !due {
                return None;
            }
            let tx = self.in_flight.pop_front()?;
            if tx.dropped {
                log::debug!("radio: completion for handle {} lost", tx.handle);
                continue;
            }
            let reply = ModemReply::TransmitComplete {
                handle: tx.handle,
                status: TxStatus::Delivered,
            };
            return Some(round_trip_reply(&reply));
        }
    }

    fn sample_supply_code(&mut self, now_ms: u32) -> u32 {
        let on_air = self
            .in_flight
            .iter()
            .find(|tx| tx.sent_ms <= now_ms && now_ms < tx.due_ms);
        let sag = on_air.map_or(0, |tx| {
            SUPPLY_SAG_MV + u32::from(tx.params.payload_len) * SUPPLY_SAG_PER_BYTE_MV
        });
        let noise = self.rng.gen_range(0..=SUPPLY_NOISE_MV);
        let millivolts = SUPPLY_IDLE_MV - sag + noise;
        millivolts * ADC_MAX_CODE / ADC_FULL_SCALE_MV
    }
}

impl RadioLink for SimulatedRadio {
    fn transmit_broadcast(&mut self, request: &BroadcastRequest<'_>) -> Result<(), TransmitRejected> {
        if self.reject_rate > 0.0 && self.rng.gen_bool(self.reject_rate) {
            return Err(TransmitRejected);
        }

        let (params, frame_len) = match round_trip_request(request) {
            Ok(decoded) => decoded,
            Err(err) => {
                log::warn!("radio: request did not survive the codec: {err}");
                return Err(TransmitRejected);
            }
        };

        let jitter = if self.model.jitter_ms == 0 {
            0
        } else {
            self.rng.gen_range(0..=self.model.jitter_ms)
        };
        let dropped = self.drop_rate > 0.0 && self.rng.gen_bool(self.drop_rate);
        let sent_ms = self.now_ms + self.model.uart_ms(frame_len);
        self.in_flight.push_back(InFlight {
            handle: request.handle,
            params,
            sent_ms,
            sent_reported: false,
            due_ms: sent_ms + self.model.latency_ms(&params) + jitter,
            dropped,
        });
        Ok(())
    }
}

fn decode_frame(frame: &[u8]) -> Result<Vec<u8>, ModemError> {
    let mut decoder = FrameDecoder::new();
    for byte in frame {
        if let Some(body) = decoder.push(*byte)? {
            return Ok(body.to_vec());
        }
    }
    Err(ModemError::Truncated)
}

/// Decoded parameters and the encoded frame length.
fn round_trip_request(
    request: &BroadcastRequest<'_>,
) -> Result<(SweepParameters, usize), ModemError> {
    let frame = encode_request(request)?;
    match ModemCommand::parse(&decode_frame(&frame)?)? {
        ModemCommand::Transmit {
            retry_count,
            retry_interval_ms,
            payload_len,
            ..
        } => Ok((
            SweepParameters::new(payload_len, retry_count, retry_interval_ms),
            frame.len(),
        )),
        ModemCommand::Configure { .. } => Err(ModemError::UnknownCommand(0)),
    }
}

fn round_trip_reply(reply: &ModemReply) -> Result<ModemReply, ModemError> {
    let frame = encode_reply(reply)?;
    ModemReply::parse(&decode_frame(&frame)?)
}

/// Forwards new telemetry records to `log` and returns them rendered.
#[derive(Default)]
struct TelemetryLog {
    cursor: EventId,
}

impl TelemetryLog {
    fn flush<const N: usize>(&mut self, recorder: &TelemetryRecorder<N>) -> Vec<String> {
        let rendered: Vec<String> = recorder
            .records_from(self.cursor)
            .map(|record| {
                if record.event.is_fault() {
                    log::warn!("telemetry:sweep {record}");
                } else {
                    log::info!("telemetry:sweep {record}");
                }
                record.to_string()
            })
            .collect();
        self.cursor = recorder.next_event_id();
        rendered
    }
}

struct TranscriptLogger {
    writer: BufWriter<std::fs::File>,
}

impl TranscriptLogger {
    fn create(path: &Path, options: &SessionOptions) -> io::Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        let mut logger = Self {
            writer: BufWriter::new(file),
        };
        logger.write_header(options)?;
        Ok(logger)
    }

    fn write_header(&mut self, options: &SessionOptions) -> io::Result<()> {
        let plan = &options.config.plan;
        writeln!(self.writer, "# Transmit timing sweep transcript")?;
        writeln!(
            self.writer,
            "# combinations={} samples={} analog={} seed={:#x}",
            plan.combination_count(),
            options.config.samples_per_combination,
            options.analog,
            options.seed
        )?;
        writeln!(
            self.writer,
            "# reject_rate={} drop_rate={} timeout={:?}",
            options.reject_rate, options.drop_rate, options.config.completion_timeout_ms
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(&mut self, now_ms: u32, role: TranscriptRole, line: &str) -> io::Result<()> {
        writeln!(
            self.writer,
            "[{:>4}.{:03}s] {} {}",
            now_ms / 1_000,
            now_ms % 1_000,
            role.prefix(),
            line
        )
    }

    fn write_summary(&mut self, report: &SessionReport) -> io::Result<()> {
        let progress = &report.progress;
        writeln!(self.writer)?;
        writeln!(
            self.writer,
            "# finished={} elapsed={}ms rows={} transmissions={} rejections={} timeouts={} stale={}",
            report.finished,
            report.elapsed_ms,
            progress.rows_emitted,
            progress.transmissions,
            progress.rejections,
            progress.timeouts,
            progress.stale_completions
        )?;
        self.writer.flush()
    }
}

enum TranscriptRole {
    Report,
    Telemetry,
}

impl TranscriptRole {
    fn prefix(&self) -> &'static str {
        match self {
            TranscriptRole::Report => "CSV >",
            TranscriptRole::Telemetry => "TEL <",
        }
    }
}

//! Telemetry event catalog and ring buffer shared by firmware and host targets.
//!
//! The measurement controller records every externally interesting step of a
//! sweep here. Targets mirror new records to their own log sink (`defmt` on
//! the MCU, `log` on the host) by polling [`TelemetryRecorder::records_from`]
//! with a cursor.

use core::fmt;

use heapless::{HistoryBuf, OldestOrdered};

use crate::averager::MeanTenths;
use crate::sweep::SweepParameters;

/// Identifier assigned to each record; wraps on overflow.
pub type EventId = u32;

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 32;

/// Discriminated telemetry events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryEventKind {
    SweepStarted { combinations: u32 },
    TransmitIssued { handle: u8 },
    TransmitRejected { handle: u8 },
    /// The request left the host link; `queued_ms` is the time since issue.
    TransmitSent { handle: u8, queued_ms: u32 },
    TransmitCompleted { handle: u8, elapsed_ms: u32, delivered: bool },
    StaleCompletion { handle: u8 },
    CompletionTimeout { handle: u8, elapsed_ms: u32 },
    RowEmitted { mean: MeanTenths },
    SweepFinished { rows: u32 },
}

impl TelemetryEventKind {
    /// Short label for log sinks that cannot use `Display`.
    #[must_use]
    pub const fn label(&self) -> &'static str {
        match self {
            TelemetryEventKind::SweepStarted { .. } => "sweep-started",
            TelemetryEventKind::TransmitIssued { .. } => "transmit-issued",
            TelemetryEventKind::TransmitRejected { .. } => "transmit-rejected",
            TelemetryEventKind::TransmitSent { .. } => "transmit-sent",
            TelemetryEventKind::TransmitCompleted { .. } => "transmit-completed",
            TelemetryEventKind::StaleCompletion { .. } => "stale-completion",
            TelemetryEventKind::CompletionTimeout { .. } => "completion-timeout",
            TelemetryEventKind::RowEmitted { .. } => "row-emitted",
            TelemetryEventKind::SweepFinished { .. } => "sweep-finished",
        }
    }

    /// Returns `true` for events that indicate the radio path misbehaved.
    #[must_use]
    pub const fn is_fault(&self) -> bool {
        matches!(
            self,
            TelemetryEventKind::TransmitRejected { .. }
                | TelemetryEventKind::StaleCompletion { .. }
                | TelemetryEventKind::CompletionTimeout { .. }
                | TelemetryEventKind::TransmitCompleted {
                    delivered: false,
                    ..
                }
        )
    }
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = self.label();
        match self {
            TelemetryEventKind::SweepStarted { combinations } => {
                write!(f, "{label} combinations={combinations}")
            }
            TelemetryEventKind::TransmitIssued { handle }
            | TelemetryEventKind::TransmitRejected { handle }
            | TelemetryEventKind::StaleCompletion { handle } => write!(f, "{label} handle={handle}"),
            TelemetryEventKind::TransmitSent { handle, queued_ms } => {
                write!(f, "{label} handle={handle} queued={queued_ms}ms")
            }
            TelemetryEventKind::TransmitCompleted {
                handle,
                elapsed_ms,
                delivered,
            } => write!(
                f,
                "{label} handle={handle} elapsed={elapsed_ms}ms delivered={delivered}"
            ),
            TelemetryEventKind::CompletionTimeout { handle, elapsed_ms } => {
                write!(f, "{label} handle={handle} elapsed={elapsed_ms}ms")
            }
            TelemetryEventKind::RowEmitted { mean } => write!(f, "{label} mean={mean}"),
            TelemetryEventKind::SweepFinished { rows } => write!(f, "{label} rows={rows}"),
        }
    }
}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TelemetryRecord {
    pub id: EventId,
    pub timestamp_ms: u32,
    pub event: TelemetryEventKind,
    /// Parameters active when the event was recorded.
    pub params: SweepParameters,
}

impl fmt::Display for TelemetryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "#{} t={}ms [{}] {}",
            self.id, self.timestamp_ms, self.params, self.event
        )
    }
}

/// Telemetry ring buffer type alias.
pub type TelemetryRing<const CAPACITY: usize = TELEMETRY_RING_CAPACITY> =
    HistoryBuf<TelemetryRecord, CAPACITY>;

/// Records telemetry events into a fixed-size ring buffer.
pub struct TelemetryRecorder<const CAPACITY: usize = TELEMETRY_RING_CAPACITY> {
    ring: TelemetryRing<CAPACITY>,
    next_event_id: EventId,
}

impl<const CAPACITY: usize> TelemetryRecorder<CAPACITY> {
    /// Creates a new telemetry recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_event_id: 0,
        }
    }

    /// Returns an iterator over the recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, TelemetryRecord> {
        self.ring.oldest_ordered()
    }

    /// Returns the most recent telemetry record, if available.
    pub fn latest(&self) -> Option<&TelemetryRecord> {
        self.ring.recent()
    }

    pub fn len(&self) -> usize {
        self.ring.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Identifier the next record will receive; use it as a polling cursor.
    pub fn next_event_id(&self) -> EventId {
        self.next_event_id
    }

    /// Records at or after `cursor` that are still retained, oldest first.
    ///
    /// Records overwritten before the caller polled are silently skipped.
    pub fn records_from(&self, cursor: EventId) -> impl Iterator<Item = &TelemetryRecord> {
        let pending = self.next_event_id.wrapping_sub(cursor);
        self.ring
            .oldest_ordered()
            .filter(move |record| record.id.wrapping_sub(cursor) < pending)
    }

    /// Records an event and returns its identifier.
    pub fn record(
        &mut self,
        event: TelemetryEventKind,
        params: SweepParameters,
        timestamp_ms: u32,
    ) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(TelemetryRecord {
            id,
            timestamp_ms,
            event,
            params,
        });

        id
    }

    /// Number of retained records whose event matches `predicate`.
    pub fn count_where(&self, predicate: impl Fn(&TelemetryEventKind) -> bool) -> usize {
        self.ring
            .oldest_ordered()
            .filter(|record| predicate(&record.event))
            .count()
    }
}

impl<const CAPACITY: usize> Default for TelemetryRecorder<CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}

//! Mirrors controller telemetry to the diagnostics log.
//!
//! The ring itself lives in the measurement controller. This module polls it
//! with a cursor after each dispatch and forwards new records to defmt (or
//! stdout on host builds), flagging records the ring overwrote in between.

use sweep_core::telemetry::{EventId, TelemetryRecord, TelemetryRecorder};

/// Cursor into the controller's telemetry ring.
pub struct TelemetryMirror {
    cursor: EventId,
}

impl TelemetryMirror {
    pub const fn new() -> Self {
        Self { cursor: 0 }
    }

    /// Logs every record added since the previous flush; returns how many.
    pub fn flush<const N: usize>(&mut self, recorder: &TelemetryRecorder<N>) -> usize {
        let pending = recorder.next_event_id().wrapping_sub(self.cursor);
        let mut logged = 0usize;
        for record in recorder.records_from(self.cursor) {
            emit_log(record);
            logged += 1;
        }

        let missed = usize::try_from(pending)
            .unwrap_or(usize::MAX)
            .saturating_sub(logged);
        if missed > 0 {
            emit_gap(missed);
        }

        self.cursor = recorder.next_event_id();
        logged
    }
}

impl Default for TelemetryMirror {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(target_os = "none")]
fn emit_log(record: &TelemetryRecord) {
    let params = record.params;
    if record.event.is_fault() {
        defmt::warn!(
            "telemetry:sweep #{} t={}ms {} len={} retries={} interval={}ms",
            record.id,
            record.timestamp_ms,
            record.event.label(),
            params.payload_len,
            params.retry_count,
            params.retry_interval_ms
        );
    } else {
        defmt::info!(
            "telemetry:sweep #{} t={}ms {} len={} retries={} interval={}ms",
            record.id,
            record.timestamp_ms,
            record.event.label(),
            params.payload_len,
            params.retry_count,
            params.retry_interval_ms
        );
    }
}

#[cfg(not(target_os = "none"))]
fn emit_log(record: &TelemetryRecord) {
    println!("telemetry:sweep {record}");
}

#[cfg(target_os = "none")]
fn emit_gap(missed: usize) {
    defmt::warn!("telemetry:sweep {} records overwritten before logging", missed);
}

#[cfg(not(target_os = "none"))]
fn emit_gap(missed: usize) {
    println!("telemetry:sweep {missed} records overwritten before logging");
}

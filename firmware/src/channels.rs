//! Bounded channels shared by the firmware tasks.
//!
//! The sweep task sends modem commands and report lines out and receives
//! completions back. Depths are small: a full modem queue is how the radio
//! path rejects a transmission at issue time.

use embassy_sync::channel::{Channel, Receiver, Sender};
use heapless::String;
use sweep_core::measurement::{MeasurementEvent, TxHandle, TxStatus};
use sweep_core::modem::ModemCommand;
use sweep_core::report::MAX_LINE_LEN;

#[cfg(not(target_os = "none"))]
use embassy_sync::blocking_mutex::raw::NoopRawMutex;
#[cfg(target_os = "none")]
use embassy_sync::blocking_mutex::raw::ThreadModeRawMutex;

#[cfg(target_os = "none")]
pub type SweepMutex = ThreadModeRawMutex;
#[cfg(not(target_os = "none"))]
pub type SweepMutex = NoopRawMutex;

/// Outstanding commands toward the modem UART.
pub const MODEM_QUEUE_DEPTH: usize = 2;

/// Radio notices waiting for the sweep task.
pub const COMPLETION_QUEUE_DEPTH: usize = 4;

/// Report lines waiting for the debug console.
pub const REPORT_QUEUE_DEPTH: usize = 8;

/// Progress of one request through the modem, stamped by the modem task.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum RadioNotice {
    /// The request frame finished leaving the UART.
    Sent { handle: TxHandle, at_ms: u32 },
    /// The modem reported the broadcast done.
    Completed {
        handle: TxHandle,
        status: TxStatus,
        at_ms: u32,
    },
}

impl RadioNotice {
    /// Event for the measurement controller and the time it happened.
    pub fn into_event(self) -> (MeasurementEvent, u32) {
        match self {
            RadioNotice::Sent { handle, at_ms } => (MeasurementEvent::TransmitSent { handle }, at_ms),
            RadioNotice::Completed {
                handle,
                status,
                at_ms,
            } => (MeasurementEvent::TransmitComplete { handle, status }, at_ms),
        }
    }
}

pub type ReportText = String<MAX_LINE_LEN>;

pub type ModemQueue = Channel<SweepMutex, ModemCommand, MODEM_QUEUE_DEPTH>;
pub type ModemSender<'a> = Sender<'a, SweepMutex, ModemCommand, MODEM_QUEUE_DEPTH>;
pub type ModemReceiver<'a> = Receiver<'a, SweepMutex, ModemCommand, MODEM_QUEUE_DEPTH>;

pub type CompletionQueue = Channel<SweepMutex, RadioNotice, COMPLETION_QUEUE_DEPTH>;
pub type CompletionSender<'a> = Sender<'a, SweepMutex, RadioNotice, COMPLETION_QUEUE_DEPTH>;
pub type CompletionReceiver<'a> = Receiver<'a, SweepMutex, RadioNotice, COMPLETION_QUEUE_DEPTH>;

pub type ReportQueue = Channel<SweepMutex, ReportText, REPORT_QUEUE_DEPTH>;
pub type ReportSender<'a> = Sender<'a, SweepMutex, ReportText, REPORT_QUEUE_DEPTH>;
pub type ReportReceiver<'a> = Receiver<'a, SweepMutex, ReportText, REPORT_QUEUE_DEPTH>;

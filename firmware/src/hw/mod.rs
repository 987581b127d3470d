//! Adapters that bridge firmware channels with `sweep-core` traits.
//!
//! The measurement controller only knows [`RadioLink`] and [`ReportSink`].
//! These wrappers turn both into non-blocking channel sends so the controller
//! never waits on a UART.

use embassy_sync::channel::TrySendError;
use sweep_core::measurement::{BroadcastRequest, RadioLink, TransmitRejected};
use sweep_core::modem::ModemCommand;
use sweep_core::report::{MAX_LINE_LEN, ReportError, ReportLine, ReportSink, format_line};

use crate::channels::{ModemSender, ReportSender};

#[cfg(all(target_os = "none", feature = "analog"))]
pub mod power;

/// Radio link that hands requests to the modem task.
pub struct ChannelRadio<'a> {
    sender: ModemSender<'a>,
}

impl<'a> ChannelRadio<'a> {
    pub fn new(sender: ModemSender<'a>) -> Self {
        Self { sender }
    }
}

impl RadioLink for ChannelRadio<'_> {
    fn transmit_broadcast(&mut self, request: &BroadcastRequest<'_>) -> Result<(), TransmitRejected> {
        match self.sender.try_send(ModemCommand::from(request)) {
            Ok(()) => Ok(()),
            Err(TrySendError::Full(_)) => Err(TransmitRejected),
        }
    }
}

/// Report sink that forwards rendered lines to the console task.
pub struct ChannelSink<'a> {
    sender: ReportSender<'a>,
}

impl<'a> ChannelSink<'a> {
    pub fn new(sender: ReportSender<'a>) -> Self {
        Self { sender }
    }
}

impl ReportSink for ChannelSink<'_> {
    fn emit(&mut self, line: &ReportLine) -> Result<(), ReportError> {
        let text = format_line::<MAX_LINE_LEN>(line)?;
        self.sender.try_send(text).map_err(|_| ReportError::SinkFull)
    }
}

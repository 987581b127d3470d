//! Radio-facing types used by the measurement controller.

use core::fmt;

use crate::sweep::{MAX_PAYLOAD_LEN, SweepParameters};

/// Byte every broadcast payload is filled with.
pub const PAYLOAD_FILL: u8 = b' ';

const PAYLOAD_BUFFER: [u8; MAX_PAYLOAD_LEN as usize] = [PAYLOAD_FILL; MAX_PAYLOAD_LEN as usize];

/// Returns a `len`-byte payload, clamped to [`MAX_PAYLOAD_LEN`].
pub fn broadcast_payload(len: u8) -> &'static [u8] {
    let len = usize::from(len.min(MAX_PAYLOAD_LEN));
    &PAYLOAD_BUFFER[..len]
}

/// Callback identifier tying a completion to the transmission that caused it.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub struct TxHandle(u8);

impl TxHandle {
    pub const FIRST: Self = Self(1);

    pub const fn new(raw: u8) -> Self {
        Self(raw)
    }

    pub const fn raw(self) -> u8 {
        self.0
    }

    #[must_use]
    pub const fn next(self) -> Self {
        Self(self.0.wrapping_add(1))
    }
}

impl fmt::Display for TxHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "tx#{}", self.0)
    }
}

/// Outcome reported with a completion. Timing ignores it.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TxStatus {
    Delivered,
    Failed,
}

impl TxStatus {
    /// Radio stacks report `1` for success and anything else for failure.
    pub const fn from_raw(raw: u8) -> Self {
        if raw == 1 {
            TxStatus::Delivered
        } else {
            TxStatus::Failed
        }
    }

    pub const fn to_raw(self) -> u8 {
        match self {
            TxStatus::Delivered => 1,
            TxStatus::Failed => 0,
        }
    }
}

/// One broadcast transmission with the radio-level retry settings.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BroadcastRequest<'a> {
    pub handle: TxHandle,
    pub retry_count: u8,
    pub retry_interval_ms: u16,
    pub payload: &'a [u8],
}

impl BroadcastRequest<'static> {
    /// Builds the request for a sweep point with the standard filler payload.
    pub fn for_parameters(handle: TxHandle, params: &SweepParameters) -> Self {
        Self {
            handle,
            retry_count: params.retry_count,
            retry_interval_ms: params.retry_interval_ms,
            payload: broadcast_payload(params.payload_len),
        }
    }
}

/// The radio stack refused the request at issue time.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TransmitRejected;

impl fmt::Display for TransmitRejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("transmission rejected by radio")
    }
}

/// Abstraction over the radio stack.
///
/// Accepting a request promises a later completion carrying the same
/// [`TxHandle`]; the stack performs `retry_count` extra attempts on its own.
pub trait RadioLink {
    fn transmit_broadcast(&mut self, request: &BroadcastRequest<'_>) -> Result<(), TransmitRejected>;
}

impl<R: RadioLink + ?Sized> RadioLink for &mut R {
    fn transmit_broadcast(&mut self, request: &BroadcastRequest<'_>) -> Result<(), TransmitRejected> {
        (**self).transmit_broadcast(request)
    }
}

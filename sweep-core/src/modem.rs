//! ASCII-hex framing for the UART-attached radio modem.
//!
//! A frame is `:` followed by the body bytes and an 8-bit LRC as uppercase
//! hex pairs, terminated by `\r\n`. The LRC is the two's complement of the
//! byte sum, so all decoded bytes including the checksum sum to zero.
//!
//! | body                                                   | direction   |
//! |--------------------------------------------------------|-------------|
//! | `01 handle retry interval_hi interval_lo len payload…` | host→modem  |
//! | `02 app_id[4] channel`                                 | host→modem  |
//! | `81`                                                   | modem→host  |
//! | `82 handle status`                                     | modem→host  |

use core::fmt;

use heapless::Vec;

use crate::measurement::{BroadcastRequest, TxHandle, TxStatus, broadcast_payload};
use crate::sweep::MAX_PAYLOAD_LEN;

const CMD_TRANSMIT: u8 = 0x01;
const CMD_CONFIGURE: u8 = 0x02;
const REPLY_CONFIGURED: u8 = 0x81;
const REPLY_TX_COMPLETE: u8 = 0x82;

const TRANSMIT_HEADER_LEN: usize = 6;

/// Largest decoded body (command byte plus arguments, no checksum).
pub const MAX_BODY_LEN: usize = TRANSMIT_HEADER_LEN + MAX_PAYLOAD_LEN as usize;

/// Largest encoded frame including delimiters.
pub const MAX_FRAME_LEN: usize = 1 + (MAX_BODY_LEN + 1) * 2 + 2;

pub type FrameBuf = Vec<u8, MAX_FRAME_LEN>;
pub type BodyBuf = Vec<u8, MAX_BODY_LEN>;

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ModemError {
    InvalidHex,
    OddLength,
    BadChecksum,
    FrameTooLong,
    Empty,
    Truncated,
    UnknownCommand(u8),
    PayloadTooLong,
}

impl fmt::Display for ModemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModemError::InvalidHex => f.write_str("invalid hex digit in frame"),
            ModemError::OddLength => f.write_str("frame has an odd number of hex digits"),
            ModemError::BadChecksum => f.write_str("frame checksum mismatch"),
            ModemError::FrameTooLong => f.write_str("frame exceeds maximum length"),
            ModemError::Empty => f.write_str("empty frame"),
            ModemError::Truncated => f.write_str("frame body too short"),
            ModemError::UnknownCommand(code) => write!(f, "unknown command 0x{code:02X}"),
            ModemError::PayloadTooLong => f.write_str("payload exceeds modem limit"),
        }
    }
}

/// Commands sent to the modem.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ModemCommand {
    Transmit {
        handle: TxHandle,
        retry_count: u8,
        retry_interval_ms: u16,
        payload_len: u8,
    },
    Configure {
        app_id: u32,
        channel: u8,
    },
}

impl ModemCommand {
    pub fn parse(body: &[u8]) -> Result<Self, ModemError> {
        let (&code, args) = body.split_first().ok_or(ModemError::Empty)?;
        match code {
            CMD_TRANSMIT => {
                let [handle, retry_count, hi, lo, len, ..] = *args else {
                    return Err(ModemError::Truncated);
                };
                if args.len() - 5 != usize::from(len) {
                    return Err(ModemError::Truncated);
                }
                Ok(ModemCommand::Transmit {
                    handle: TxHandle::new(handle),
                    retry_count,
                    retry_interval_ms: u16::from_be_bytes([hi, lo]),
                    payload_len: len,
                })
            }
            CMD_CONFIGURE => {
                let [a, b, c, d, channel] = *args else {
                    return Err(ModemError::Truncated);
                };
                Ok(ModemCommand::Configure {
                    app_id: u32::from_be_bytes([a, b, c, d]),
                    channel,
                })
            }
            other => Err(ModemError::UnknownCommand(other)),
        }
    }
}

impl From<&BroadcastRequest<'_>> for ModemCommand {
    fn from(request: &BroadcastRequest<'_>) -> Self {
        ModemCommand::Transmit {
            handle: request.handle,
            retry_count: request.retry_count,
            retry_interval_ms: request.retry_interval_ms,
            payload_len: u8::try_from(request.payload.len()).unwrap_or(u8::MAX),
        }
    }
}

/// Replies received from the modem.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum ModemReply {
    Configured,
    TransmitComplete { handle: TxHandle, status: TxStatus },
}

impl ModemReply {
    pub fn parse(body: &[u8]) -> Result<Self, ModemError> {
        match body {
            [] => Err(ModemError::Empty),
            [REPLY_CONFIGURED] => Ok(ModemReply::Configured),
            [REPLY_TX_COMPLETE, handle, status] => Ok(ModemReply::TransmitComplete {
                handle: TxHandle::new(*handle),
                status: TxStatus::from_raw(*status),
            }),
            [REPLY_CONFIGURED | REPLY_TX_COMPLETE, ..] => Err(ModemError::Truncated),
            [other, ..] => Err(ModemError::UnknownCommand(*other)),
        }
    }
}

/// Two's-complement checksum over `bytes`.
pub fn lrc(bytes: &[u8]) -> u8 {
    let sum = bytes.iter().fold(0u8, |acc, byte| acc.wrapping_add(*byte));
    sum.wrapping_neg()
}

/// Encodes a transmit command.
pub fn encode_request(request: &BroadcastRequest<'_>) -> Result<FrameBuf, ModemError> {
    let len = u8::try_from(request.payload.len())
        .ok()
        .filter(|len| *len <= MAX_PAYLOAD_LEN)
        .ok_or(ModemError::PayloadTooLong)?;

    let mut body = BodyBuf::new();
    let [hi, lo] = request.retry_interval_ms.to_be_bytes();
    extend(
        &mut body,
        &[
            CMD_TRANSMIT,
            request.handle.raw(),
            request.retry_count,
            hi,
            lo,
            len,
        ],
    )?;
    extend(&mut body, request.payload)?;
    encode_frame(&body)
}

/// Encodes a queued command; transmit payloads are regenerated as filler.
pub fn encode_command(command: &ModemCommand) -> Result<FrameBuf, ModemError> {
    match *command {
        ModemCommand::Transmit {
            handle,
            retry_count,
            retry_interval_ms,
            payload_len,
        } => {
            if payload_len > MAX_PAYLOAD_LEN {
                return Err(ModemError::PayloadTooLong);
            }
            encode_request(&BroadcastRequest {
                handle,
                retry_count,
                retry_interval_ms,
                payload: broadcast_payload(payload_len),
            })
        }
        ModemCommand::Configure { app_id, channel } => encode_configure(app_id, channel),
    }
}

/// Encodes the one-time network configuration command.
pub fn encode_configure(app_id: u32, channel: u8) -> Result<FrameBuf, ModemError> {
    let [a, b, c, d] = app_id.to_be_bytes();
    encode_frame(&[CMD_CONFIGURE, a, b, c, d, channel])
}

/// Encodes a reply as the modem would send it.
pub fn encode_reply(reply: &ModemReply) -> Result<FrameBuf, ModemError> {
    match reply {
        ModemReply::Configured => encode_frame(&[REPLY_CONFIGURED]),
        ModemReply::TransmitComplete { handle, status } => {
            encode_frame(&[REPLY_TX_COMPLETE, handle.raw(), status.to_raw()])
        }
    }
}

/// Wraps `body` in delimiters, hex digits and checksum.
pub fn encode_frame(body: &[u8]) -> Result<FrameBuf, ModemError> {
    let mut frame = FrameBuf::new();
    frame.push(b':').map_err(|_| ModemError::FrameTooLong)?;
    for byte in body.iter().copied().chain(core::iter::once(lrc(body))) {
        let [high, low] = hex_pair(byte);
        frame
            .extend_from_slice(&[high, low])
            .map_err(|_| ModemError::FrameTooLong)?;
    }
    frame
        .extend_from_slice(b"\r\n")
        .map_err(|_| ModemError::FrameTooLong)?;
    Ok(frame)
}

fn extend(body: &mut BodyBuf, bytes: &[u8]) -> Result<(), ModemError> {
    body.extend_from_slice(bytes)
        .map_err(|_| ModemError::PayloadTooLong)
}

fn hex_pair(byte: u8) -> [u8; 2] {
    const DIGITS: &[u8; 16] = b"0123456789ABCDEF";
    [DIGITS[usize::from(byte >> 4)], DIGITS[usize::from(byte & 0x0F)]]
}

fn hex_value(digit: u8) -> Option<u8> {
    match digit {
        b'0'..=b'9' => Some(digit - b'0'),
        b'A'..=b'F' => Some(digit - b'A' + 10),
        b'a'..=b'f' => Some(digit - b'a' + 10),
        _ => None,
    }
}

#[derive(Copy, Clone, Debug, Eq, PartialEq)]
enum DecoderState {
    /// Waiting for `:`.
    Hunting,
    Collecting,
    /// Skipping the rest of a bad frame.
    Discarding,
}

/// Byte-at-a-time frame parser.
///
/// Garbage between frames is ignored. A bad frame is reported once and the
/// decoder resynchronises on the next `:`.
#[derive(Clone, Debug)]
pub struct FrameDecoder {
    state: DecoderState,
    body: Vec<u8, { MAX_BODY_LEN + 1 }>,
    high_nibble: Option<u8>,
}

impl FrameDecoder {
    pub const fn new() -> Self {
        Self {
            state: DecoderState::Hunting,
            body: Vec::new(),
            high_nibble: None,
        }
    }

    /// Feeds one byte; returns a checked body once a frame terminates.
    pub fn push(&mut self, byte: u8) -> Result<Option<BodyBuf>, ModemError> {
        if byte == b':' {
            self.restart();
            self.state = DecoderState::Collecting;
            return Ok(None);
        }

        match self.state {
            DecoderState::Hunting | DecoderState::Discarding => Ok(None),
            DecoderState::Collecting => match byte {
                b'\r' => Ok(None),
                b'\n' => {
                    self.state = DecoderState::Hunting;
                    self.finish().map(Some)
                }
                digit => self.push_digit(digit).map(|()| None),
            },
        }
    }

    fn push_digit(&mut self, digit: u8) -> Result<(), ModemError> {
        let Some(value) = hex_value(digit) else {
            return self.fail(ModemError::InvalidHex);
        };

        match self.high_nibble.take() {
            None => self.high_nibble = Some(value),
            Some(high) => {
                if self.body.push((high << 4) | value).is_err() {
                    return self.fail(ModemError::FrameTooLong);
                }
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<BodyBuf, ModemError> {
        if self.high_nibble.is_some() {
            return Err(ModemError::OddLength);
        }
        let Some((_, body)) = self.body.split_last() else {
            return Err(ModemError::Empty);
        };
        if lrc(&self.body) != 0 {
            return Err(ModemError::BadChecksum);
        }
        BodyBuf::from_slice(body).map_err(|_| ModemError::FrameTooLong)
    }

    fn fail(&mut self, err: ModemError) -> Result<(), ModemError> {
        self.restart();
        self.state = DecoderState::Discarding;
        Err(err)
    }

    fn restart(&mut self) {
        self.body.clear();
        self.high_nibble = None;
    }
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

use crate::base::command::{CommandError, DaliCommand, DaliCommandCode};
use crate::base::response::{DaliResponse, ResponseError};
use std::fmt::Write;

pub const SOH: u8 = 0x01;
pub const ETB: u8 = 0x17;

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Firmware reset must go through the vendor's own tooling.
    ForbiddenOperation,
    ProtocolError(&'static str),
    UnknownResponseType(u8),
    BadHexDigit,
    TruncatedFrame,
    Command(CommandError),
}

impl std::fmt::Display for FrameError {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::result::Result<(), std::fmt::Error> {
        match self {
            FrameError::ForbiddenOperation => {
                write!(fmt, "Firmware reset is reserved for the vendor's config tool")
            }
            FrameError::ProtocolError(what) => write!(fmt, "Protocol error: {}", what),
            FrameError::UnknownResponseType(t) => write!(fmt, "Unknown response type {}", t),
            FrameError::BadHexDigit => write!(fmt, "Frame contains a non-hex character"),
            FrameError::TruncatedFrame => write!(fmt, "Frame is truncated"),
            FrameError::Command(e) => e.fmt(fmt),
        }
    }
}

impl std::error::Error for FrameError {}

impl From<CommandError> for FrameError {
    fn from(e: CommandError) -> FrameError {
        FrameError::Command(e)
    }
}

/// Unsolicited status codes the adapter reports with message type 5.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum SpecMessage {
    VoltageOk,
    VoltageLoss,
    GridVoltageDetected,
    BadPowerSourceDetected,
    BufferFull,
    ChecksumError,
    UnknownCommand,
    /// Synthesized locally when the session is not usable.
    ChannelNotOpen,
}

impl SpecMessage {
    pub fn from_value(v: u8) -> Option<SpecMessage> {
        let msg = match v {
            0 => SpecMessage::VoltageOk,
            1 => SpecMessage::VoltageLoss,
            2 => SpecMessage::GridVoltageDetected,
            3 => SpecMessage::BadPowerSourceDetected,
            4 => SpecMessage::BufferFull,
            5 => SpecMessage::ChecksumError,
            6 => SpecMessage::UnknownCommand,
            255 => SpecMessage::ChannelNotOpen,
            _ => return None,
        };
        Some(msg)
    }
}

/// Adapter's verdict on a configuration item change.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ConfChangeFlag {
    Set,
    ReadOnlyItem,
    OutOfRange,
}

impl ConfChangeFlag {
    pub fn from_value(v: u8) -> Option<ConfChangeFlag> {
        let flag = match v {
            0 => ConfChangeFlag::Set,
            1 => ConfChangeFlag::ReadOnlyItem,
            2 => ConfChangeFlag::OutOfRange,
            _ => return None,
        };
        Some(flag)
    }
}

/// A request frame for the adapter, one variant per message type it
/// accepts from the master side.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FoxtronRequest {
    /// Fire and forget, no delivery report.
    Send {
        priority: u8,
        command: DaliCommand,
    },
    /// Transmit and report the outcome of this one frame.
    DistinctSend {
        priority: u8,
        command: DaliCommand,
        double_send: bool,
        sequence: bool,
    },
    ContinuousSend {
        priority: u8,
        command: DaliCommand,
    },
    ConfQuery {
        item_index: u8,
    },
    ConfChange {
        item_index: u8,
        item_data: u16,
    },
    SequenceEnd,
    FirmwareReset,
}

impl FoxtronRequest {
    /// A commissioning command wrapped for transmission, doubled on
    /// the bus where the standard demands it.
    pub fn special(code: DaliCommandCode, value: u32) -> Result<FoxtronRequest, CommandError> {
        let command = DaliCommand::special(code, value)?;
        Ok(FoxtronRequest::DistinctSend {
            priority: 0,
            command,
            double_send: code.sends_twice(),
            sequence: false,
        })
    }

    pub fn type_code(&self) -> u8 {
        match self {
            FoxtronRequest::Send { .. } => 1,
            FoxtronRequest::ConfQuery { .. } => 6,
            FoxtronRequest::ConfChange { .. } => 8,
            FoxtronRequest::SequenceEnd => 10,
            FoxtronRequest::DistinctSend { .. } => 11,
            FoxtronRequest::ContinuousSend { .. } => 12,
            FoxtronRequest::FirmwareReset => 254,
        }
    }

    /// Whether the adapter answers this request with a correlated
    /// reply frame. Plain `Send` gets nothing back.
    pub fn is_correlated(&self) -> bool {
        !matches!(self, FoxtronRequest::Send { .. })
    }

    /// How many adapter replies to expect before the request is done.
    pub fn expected_replies(&self) -> u8 {
        match self {
            FoxtronRequest::DistinctSend {
                double_send: true, ..
            } => 2,
            _ => 1,
        }
    }

    pub fn command(&self) -> Option<DaliCommand> {
        match self {
            FoxtronRequest::Send { command, .. }
            | FoxtronRequest::DistinctSend { command, .. }
            | FoxtronRequest::ContinuousSend { command, .. } => Some(*command),
            _ => None,
        }
    }

    /// Encode the full frame, SOH through ETB.
    pub fn encode(&self) -> Result<Vec<u8>, FrameError> {
        let mut msg = String::new();
        push_hex(&mut msg, self.type_code() as u32, 2);
        match self {
            FoxtronRequest::Send { priority, command }
            | FoxtronRequest::ContinuousSend { priority, command } => {
                push_priority(&mut msg, *priority);
                msg.push_str("10");
                push_hex(&mut msg, command.bytecode() as u32, 4);
            }
            FoxtronRequest::DistinctSend {
                priority,
                command,
                double_send,
                sequence,
            } => {
                push_priority(&mut msg, *priority);
                msg.push_str("10");
                push_hex(&mut msg, command.bytecode() as u32, 4);
                let param = *double_send as u32 | (*sequence as u32) << 1;
                push_hex(&mut msg, param, 2);
            }
            FoxtronRequest::ConfQuery { item_index } => {
                push_hex(&mut msg, *item_index as u32, 2);
            }
            FoxtronRequest::ConfChange {
                item_index,
                item_data,
            } => {
                push_hex(&mut msg, *item_index as u32, 2);
                // Odd item indices address 8-bit config items, even
                // indices 16-bit ones
                let width = if item_index % 2 == 1 { 2 } else { 4 };
                push_hex(&mut msg, *item_data as u32, width);
            }
            FoxtronRequest::SequenceEnd => msg.push_str("00"),
            FoxtronRequest::FirmwareReset => return Err(FrameError::ForbiddenOperation),
        }
        let cs = checksum(msg.as_bytes());
        let mut frame = Vec::with_capacity(msg.len() + 4);
        frame.push(SOH);
        frame.extend_from_slice(msg.as_bytes());
        let mut cs_str = String::new();
        push_hex(&mut cs_str, cs as u32, 2);
        frame.extend_from_slice(cs_str.as_bytes());
        frame.push(ETB);
        Ok(frame)
    }
}

impl From<DaliCommand> for FoxtronRequest {
    fn from(command: DaliCommand) -> FoxtronRequest {
        FoxtronRequest::DistinctSend {
            priority: 0,
            command,
            double_send: false,
            sequence: false,
        }
    }
}

fn push_hex(out: &mut String, value: u32, digits: usize) {
    // Writing to a String cannot fail
    let _ = write!(out, "{:0>1$X}", value, digits);
}

fn push_priority(out: &mut String, priority: u8) {
    // Priorities outside 1..=5 fall back to the adapter default
    let p = if priority > 5 { 0 } else { priority };
    push_hex(out, p as u32, 2);
}

/// Checksum over the hex payload: 0xFF minus the byte sum mod 256,
/// with an odd-length payload zero-padded on the left.
pub fn checksum(payload: &[u8]) -> u8 {
    let mut sum: u32 = 0;
    let mut digits = payload.iter().filter_map(|b| (*b as char).to_digit(16));
    if payload.len() % 2 == 1 {
        sum += digits.next().unwrap_or(0);
    }
    while let Some(hi) = digits.next() {
        let lo = digits.next().unwrap_or(0);
        sum += (hi << 4) | lo;
    }
    0xff - (sum % 0x100) as u8
}

/// The bus traffic reported inside a response frame: the forward
/// frame the adapter saw and, for answer-bearing types, the backward
/// frame. `framing_error` marks corrupted bus transfers.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct DaliExchange {
    pub command: Option<DaliCommand>,
    pub answer: Option<u8>,
    pub framing_error: bool,
}

impl DaliExchange {
    /// Interpret the raw answer byte in the context of the echoed
    /// command.
    pub fn dali_response(&self) -> Option<Result<DaliResponse, ResponseError>> {
        match (self.command, self.answer) {
            (Some(cmd), Some(byte)) => Some(DaliResponse::decode(cmd.code(), byte)),
            _ => None,
        }
    }
}

/// A frame received from the adapter.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FoxtronResponse {
    /// Observed bus exchange with an answer, unsolicited.
    Response(DaliExchange),
    /// Observed bus exchange that went unanswered, unsolicited.
    NoResponse(DaliExchange),
    /// Outcome of our own `DistinctSend`, gear answered.
    DistinctResponse(DaliExchange),
    /// Outcome of our own `DistinctSend`, no answer on the bus.
    DistinctNoResponse(DaliExchange),
    ConfResponse {
        item_index: u8,
        item_data: u16,
    },
    ConfChangeAck {
        item_index: u8,
        item_data: u16,
        flag: ConfChangeFlag,
    },
    SpecReceived(SpecMessage),
    FirmwareResetAck,
}

impl FoxtronResponse {
    /// The reply handed out for requests made while the session is
    /// not open.
    pub fn channel_not_open() -> FoxtronResponse {
        FoxtronResponse::SpecReceived(SpecMessage::ChannelNotOpen)
    }

    pub fn type_code(&self) -> u8 {
        match self {
            FoxtronResponse::Response(_) => 3,
            FoxtronResponse::NoResponse(_) => 4,
            FoxtronResponse::SpecReceived(_) => 5,
            FoxtronResponse::ConfResponse { .. } => 7,
            FoxtronResponse::ConfChangeAck { .. } => 9,
            FoxtronResponse::DistinctResponse(_) => 13,
            FoxtronResponse::DistinctNoResponse(_) => 14,
            FoxtronResponse::FirmwareResetAck => 255,
        }
    }

    pub fn exchange(&self) -> Option<&DaliExchange> {
        match self {
            FoxtronResponse::Response(x)
            | FoxtronResponse::NoResponse(x)
            | FoxtronResponse::DistinctResponse(x)
            | FoxtronResponse::DistinctNoResponse(x) => Some(x),
            _ => None,
        }
    }

    pub fn dali_response(&self) -> Option<Result<DaliResponse, ResponseError>> {
        self.exchange().and_then(|x| x.dali_response())
    }

    /// Decode a received chunk. Leading noise before SOH is skipped
    /// and the trailing checksum is not verified; the serial link has
    /// its own integrity and the adapter already validated the frame.
    pub fn decode(frame: &[u8]) -> Result<FoxtronResponse, FrameError> {
        let start = frame
            .iter()
            .position(|b| *b == SOH)
            .ok_or(FrameError::TruncatedFrame)?;
        let mut body = &frame[start + 1..];
        if let Some(end) = body.iter().position(|b| *b == ETB) {
            body = &body[..end];
        }

        let msg_type = hex_field(body, 0, 2)? as u8;
        match msg_type {
            3 | 4 | 13 | 14 => {
                let mut exchange = DaliExchange {
                    command: None,
                    answer: None,
                    framing_error: false,
                };
                let data_length = hex_field(body, 2, 2)?;
                if data_length == 0 {
                    exchange.framing_error = true;
                } else {
                    if data_length != 16 {
                        return Err(FrameError::ProtocolError("forward frame must be 16 bits"));
                    }
                    let word = hex_field(body, 4, 4)? as u16;
                    exchange.command = Some(DaliCommand::from_bytecode(word)?);
                    if msg_type == 3 || msg_type == 13 {
                        let answer_length = hex_field(body, 8, 2)?;
                        if answer_length == 0 {
                            exchange.framing_error = true;
                        } else if answer_length != 8 {
                            return Err(FrameError::ProtocolError(
                                "backward frame must be 8 bits",
                            ));
                        } else {
                            exchange.answer = Some(hex_field(body, 10, 2)? as u8);
                        }
                    }
                }
                Ok(match msg_type {
                    3 => FoxtronResponse::Response(exchange),
                    4 => FoxtronResponse::NoResponse(exchange),
                    13 => FoxtronResponse::DistinctResponse(exchange),
                    _ => FoxtronResponse::DistinctNoResponse(exchange),
                })
            }
            7 | 9 => {
                let item_index = hex_field(body, 2, 2)? as u8;
                let item_data = hex_field(body, 4, 4)? as u16;
                if msg_type == 7 {
                    Ok(FoxtronResponse::ConfResponse {
                        item_index,
                        item_data,
                    })
                } else {
                    let flag = ConfChangeFlag::from_value(hex_field(body, 8, 2)? as u8)
                        .ok_or(FrameError::ProtocolError("unknown config change flag"))?;
                    Ok(FoxtronResponse::ConfChangeAck {
                        item_index,
                        item_data,
                        flag,
                    })
                }
            }
            5 => {
                let code = hex_field(body, 2, 2)? as u8;
                SpecMessage::from_value(code)
                    .map(FoxtronResponse::SpecReceived)
                    .ok_or(FrameError::ProtocolError("unknown special message"))
            }
            255 => Ok(FoxtronResponse::FirmwareResetAck),
            t => Err(FrameError::UnknownResponseType(t)),
        }
    }
}

fn hex_field(body: &[u8], pos: usize, len: usize) -> Result<u32, FrameError> {
    if body.len() < pos + len {
        return Err(FrameError::TruncatedFrame);
    }
    let mut value = 0;
    for b in &body[pos..pos + len] {
        let digit = (*b as char).to_digit(16).ok_or(FrameError::BadHexDigit)?;
        value = value << 4 | digit;
    }
    Ok(value)
}

#[cfg(test)]
mod test {
    use super::{
        checksum, ConfChangeFlag, DaliExchange, FoxtronRequest, FoxtronResponse, FrameError,
        SpecMessage, ETB, SOH,
    };
    use crate::base::address::Address;
    use crate::base::command::DaliCommand;
    use crate::base::command::DaliCommandCode::*;
    use crate::base::response::DaliResponse;

    #[test]
    fn checksum_vectors() {
        assert_eq!(checksum(b"010010FF00"), 0xef);
        assert_eq!(checksum(b"10010FF10"), 0xdf);
        assert_eq!(checksum(b"10010FF05"), 0xea);
        assert_eq!(checksum(b"0B0010FE7F00"), 0x67);
    }

    fn frame(payload: &str) -> Vec<u8> {
        let mut f = vec![SOH];
        f.extend_from_slice(payload.as_bytes());
        f.push(ETB);
        f
    }

    #[test]
    fn encode_distinct_send() {
        let req: FoxtronRequest = DaliCommand::dapc(Address::Broadcast, 0.5).into();
        assert_eq!(req.encode().unwrap(), frame("0B0010FE7F0067"));
    }

    #[test]
    fn encode_plain_send_with_priority() {
        let req = FoxtronRequest::Send {
            priority: 3,
            command: DaliCommand::off(Address::Broadcast),
        };
        assert_eq!(req.encode().unwrap(), frame("010310FF00EC"));

        // Out-of-range priority falls back to the default
        let req = FoxtronRequest::Send {
            priority: 9,
            command: DaliCommand::off(Address::Broadcast),
        };
        assert_eq!(req.encode().unwrap(), frame("010010FF00EF"));
    }

    #[test]
    fn encode_double_send() {
        let req = FoxtronRequest::special(Initialize, 0).unwrap();
        assert_eq!(req.expected_replies(), 2);
        assert_eq!(req.encode().unwrap(), frame("0B0010A500013E"));
    }

    #[test]
    fn encode_conf_and_sequence() {
        let req = FoxtronRequest::ConfQuery { item_index: 0 };
        assert_eq!(req.encode().unwrap(), frame("0600F9"));

        let req = FoxtronRequest::ConfChange {
            item_index: 2,
            item_data: 0x1234,
        };
        assert_eq!(req.encode().unwrap(), frame("08021234AF"));

        // Odd index takes a single data byte
        let req = FoxtronRequest::ConfChange {
            item_index: 3,
            item_data: 0x56,
        };
        assert_eq!(req.encode().unwrap(), frame("0803569E"));

        assert_eq!(FoxtronRequest::SequenceEnd.encode().unwrap(), frame("0A00F5"));
    }

    #[test]
    fn firmware_reset_refused() {
        assert_eq!(
            FoxtronRequest::FirmwareReset.encode(),
            Err(FrameError::ForbiddenOperation)
        );
    }

    #[test]
    fn decode_distinct_response() {
        let resp = FoxtronResponse::decode(&frame("0D1001A1080055FF")).unwrap();
        let FoxtronResponse::DistinctResponse(x) = resp else {
            panic!("wrong variant {:?}", resp);
        };
        assert!(!x.framing_error);
        assert_eq!(x.command.unwrap().code(), QueryMaxLevel);
        assert_eq!(x.answer, Some(0x55));
        assert_eq!(x.dali_response(), Some(Ok(DaliResponse::Byte(0x55))));
    }

    #[test]
    fn decode_distinct_no_response() {
        let resp = FoxtronResponse::decode(&frame("0E10FE7F00")).unwrap();
        assert_eq!(
            resp,
            FoxtronResponse::DistinctNoResponse(DaliExchange {
                command: Some(DaliCommand::dapc(Address::Broadcast, 0.5)),
                answer: None,
                framing_error: false,
            })
        );
    }

    #[test]
    fn decode_framing_errors() {
        let resp = FoxtronResponse::decode(&frame("0D00FF")).unwrap();
        let FoxtronResponse::DistinctResponse(x) = resp else {
            panic!("wrong variant {:?}", resp);
        };
        assert!(x.framing_error);
        assert_eq!(x.command, None);

        // Command echoed fine but the answer was corrupted
        let resp = FoxtronResponse::decode(&frame("0D10A9000000")).unwrap();
        let FoxtronResponse::DistinctResponse(x) = resp else {
            panic!("wrong variant {:?}", resp);
        };
        assert!(x.framing_error);
        assert_eq!(x.command.unwrap().code(), Compare);
        assert_eq!(x.answer, None);
    }

    #[test]
    fn decode_bad_lengths() {
        assert_eq!(
            FoxtronResponse::decode(&frame("0D08FF00")),
            Err(FrameError::ProtocolError("forward frame must be 16 bits"))
        );
        assert_eq!(
            FoxtronResponse::decode(&frame("0D10A90010FFFF")),
            Err(FrameError::ProtocolError("backward frame must be 8 bits"))
        );
    }

    #[test]
    fn decode_spec_received() {
        assert_eq!(
            FoxtronResponse::decode(&frame("0505F5")),
            Ok(FoxtronResponse::SpecReceived(SpecMessage::ChecksumError))
        );
        assert_eq!(
            FoxtronResponse::decode(&frame("05FFF5")),
            Ok(FoxtronResponse::SpecReceived(SpecMessage::ChannelNotOpen))
        );
    }

    #[test]
    fn decode_conf_frames() {
        assert_eq!(
            FoxtronResponse::decode(&frame("07021234A0")),
            Ok(FoxtronResponse::ConfResponse {
                item_index: 2,
                item_data: 0x1234,
            })
        );
        assert_eq!(
            FoxtronResponse::decode(&frame("0902123400A0")),
            Ok(FoxtronResponse::ConfChangeAck {
                item_index: 2,
                item_data: 0x1234,
                flag: ConfChangeFlag::Set,
            })
        );
    }

    #[test]
    fn decode_skips_leading_noise() {
        let mut noisy = b"garbage".to_vec();
        noisy.extend_from_slice(&frame("0E10FF0000"));
        let resp = FoxtronResponse::decode(&noisy).unwrap();
        assert_eq!(resp.type_code(), 14);
    }

    #[test]
    fn decode_rejects_unknown_type() {
        assert_eq!(
            FoxtronResponse::decode(&frame("2000")),
            Err(FrameError::UnknownResponseType(0x20))
        );
        assert_eq!(
            FoxtronResponse::decode(b"no start of header"),
            Err(FrameError::TruncatedFrame)
        );
    }
}

use super::address::Short;
use super::command::{DaliCommandCode, DaliValueType};

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum ResponseError {
    /// A backward frame arrived for a command that never provokes one.
    UnexpectedResponse(DaliCommandCode),
}

impl std::fmt::Display for ResponseError {
    fn fmt(&self, fmt: &mut std::fmt::Formatter) -> std::result::Result<(), std::fmt::Error> {
        match self {
            ResponseError::UnexpectedResponse(code) => {
                write!(fmt, "Unexpected response to {:?}", code)
            }
        }
    }
}

impl std::error::Error for ResponseError {}

/// A decoded backward frame, interpreted according to the command
/// that provoked it.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum DaliResponse {
    Byte(u8),
    Bool(bool),
    Short(Short),
}

impl DaliResponse {
    /// Interpret the raw answer byte in the context of `code`.
    pub fn decode(code: DaliCommandCode, byte: u8) -> Result<DaliResponse, ResponseError> {
        match code.value_type() {
            DaliValueType::Boolean => Ok(DaliResponse::Bool(byte != 0)),
            DaliValueType::DataByte | DaliValueType::Random => Ok(DaliResponse::Byte(byte)),
            DaliValueType::Short => {
                // Gear answers 0AAAAAA1, the framing bits are masked off
                Ok(DaliResponse::Short(Short::new((byte & 0x7e) >> 1)))
            }
            DaliValueType::DataByteAndFalse => {
                if byte == 0 {
                    Ok(DaliResponse::Bool(false))
                } else {
                    Ok(DaliResponse::Byte(byte))
                }
            }
            _ => Err(ResponseError::UnexpectedResponse(code)),
        }
    }

    pub fn as_byte(&self) -> Option<u8> {
        match self {
            DaliResponse::Byte(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            DaliResponse::Bool(b) => Some(*b),
            _ => None,
        }
    }

    pub fn as_short(&self) -> Option<Short> {
        match self {
            DaliResponse::Short(a) => Some(*a),
            _ => None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::{DaliResponse, ResponseError};
    use crate::base::address::Short;
    use crate::base::command::DaliCommandCode::*;

    #[test]
    fn byte_responses() {
        assert_eq!(
            DaliResponse::decode(QueryActualLevel, 0xfe),
            Ok(DaliResponse::Byte(0xfe))
        );
        assert_eq!(
            DaliResponse::decode(QueryRandomAddressH, 0x12),
            Ok(DaliResponse::Byte(0x12))
        );
    }

    #[test]
    fn boolean_responses() {
        assert_eq!(
            DaliResponse::decode(QueryLampFailure, 0xff),
            Ok(DaliResponse::Bool(true))
        );
        assert_eq!(
            DaliResponse::decode(Compare, 0xff),
            Ok(DaliResponse::Bool(true))
        );
        assert_eq!(
            DaliResponse::decode(VerifyShortAddress, 0x00),
            Ok(DaliResponse::Bool(false))
        );
    }

    #[test]
    fn short_address_response() {
        assert_eq!(
            DaliResponse::decode(QueryShortAddress, 0x15),
            Ok(DaliResponse::Short(Short::new(10)))
        );
        // Framing bits are ignored
        assert_eq!(
            DaliResponse::decode(QueryShortAddress, 0x7f),
            Ok(DaliResponse::Short(Short::new(63)))
        );
    }

    #[test]
    fn byte_or_false_response() {
        assert_eq!(
            DaliResponse::decode(QueryExtendedVersionNumber, 0),
            Ok(DaliResponse::Bool(false))
        );
        assert_eq!(
            DaliResponse::decode(QueryExtendedVersionNumber, 2),
            Ok(DaliResponse::Byte(2))
        );
    }

    #[test]
    fn unexpected_response() {
        assert_eq!(
            DaliResponse::decode(Off, 0),
            Err(ResponseError::UnexpectedResponse(Off))
        );
    }
}

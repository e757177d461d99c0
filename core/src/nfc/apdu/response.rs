use std::fmt::{Display, Formatter};

use crate::{Error, TransportError};

/// Status word (SW1, SW2) trailing every response.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StatusWord {
    pub sw1: u8,
    pub sw2: u8,
}

impl StatusWord {
    /// Normal processing.
    pub const SUCCESS: Self = Self::new(0x90, 0x00);

    /// Authentication method blocked.
    pub const BLOCKED: Self = Self::new(0x69, 0x84);

    /// SW1 of a warning carrying the retry counter in the low nibble of SW2.
    pub const SW1_COUNTER: u8 = 0x63;

    /// Creates a status word from SW1 and SW2.
    pub const fn new(sw1: u8, sw2: u8) -> Self {
        Self { sw1, sw2 }
    }

    /// Determines whether the status indicates success or not.
    pub fn is_success(&self) -> bool {
        *self == Self::SUCCESS
    }

    /// Determines whether the status indicates the PIN is blocked permanently.
    pub fn is_blocked(&self) -> bool {
        *self == Self::BLOCKED
    }

    /// Extracts the retry counter (0-15) if the status carries one.
    pub fn retry_counter(&self) -> Option<u8> {
        (self.sw1 == Self::SW1_COUNTER).then_some(self.sw2 & 0x0F)
    }
}

impl Display for StatusWord {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "({:#04X}, {:#04X})", self.sw1, self.sw2)
    }
}

impl From<(u8, u8)> for StatusWord {
    fn from((sw1, sw2): (u8, u8)) -> Self {
        Self::new(sw1, sw2)
    }
}

/// An response that was received from the card
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    payload: Vec<u8>,
    trailer: StatusWord,
}

impl Response {
    /// Parses a response from the octets.
    /// Fails if the octets are too short to carry a status word.
    pub fn from_bytes(mut bytes: Vec<u8>) -> Result<Self, TransportError> {
        let len = bytes.len();
        if len < 2 {
            return Err(TransportError::ShortResponse(len));
        }

        let trailer = StatusWord::new(bytes[len - 2], bytes[len - 1]);
        bytes.truncate(len - 2);

        Ok(Self {
            payload: bytes,
            trailer,
        })
    }

    /// Gets the status word trailing the response.
    pub fn status(&self) -> StatusWord {
        self.trailer
    }

    /// Gets the payload without the status word.
    pub fn payload(&self) -> &[u8] {
        &self.payload
    }

    /// Determines whether the response indicates success or not.
    pub fn is_ok(&self) -> bool {
        self.trailer.is_success()
    }

    /// Converts the response to a result of octets.
    pub fn into_result(self) -> Result<Vec<u8>, Error> {
        let Self { payload, trailer } = self;

        match trailer.is_success() {
            true => Ok(payload),
            _ => Err(Error::Protocol(trailer)),
        }
    }
}

impl TryFrom<Vec<u8>> for Response {
    type Error = TransportError;

    fn try_from(bytes: Vec<u8>) -> Result<Self, Self::Error> {
        Self::from_bytes(bytes)
    }
}

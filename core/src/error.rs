use crate::nfc::apdu::{CommandError, StatusWord};

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Error occurred while communicating with the card: {0}")]
    Transport(#[from] TransportError),

    #[error("The card returned an error {0}")]
    Protocol(StatusWord),

    #[error("Authentication failed: {0}")]
    Authentication(#[from] AuthError),

    #[error("Malformed data was read from the card: {0}")]
    Parse(#[from] ParseError),

    #[error("Invalid input: {0}")]
    Precondition(#[from] PreconditionError),

    #[error("Invalid APDU command: {0}")]
    Command(#[from] CommandError),
}

impl Error {
    /// Gets the number of PIN attempts left, if the error tells.
    pub fn remaining(&self) -> Option<u8> {
        match self {
            Self::Authentication(e) => e.remaining(),
            _ => None,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("The card is not connected")]
    NotConnected,

    #[error("The session has already been closed")]
    Closed,

    #[error("Another exchange is in progress on the session")]
    Busy,

    #[error("The response is too short to carry a status word ({0} octets)")]
    ShortResponse(usize),

    #[error("The exchange failed: {0}")]
    Exchange(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl TransportError {
    /// Wraps an error raised by the underlying link.
    pub fn exchange<E>(e: E) -> Self
    where
        E: std::error::Error + Send + Sync + 'static,
    {
        Self::Exchange(Box::new(e))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("The PIN is incorrect, {remaining} attempt(s) remaining")]
    Incorrect { remaining: u8 },

    #[error("The PIN is blocked")]
    Blocked,

    #[error("The card rejected the PIN with {0}")]
    Rejected(StatusWord),
}

impl AuthError {
    /// Gets the number of PIN attempts left, if known.
    pub fn remaining(&self) -> Option<u8> {
        match self {
            Self::Incorrect { remaining } => Some(*remaining),
            Self::Blocked => Some(0),
            Self::Rejected(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("The header of the TLV frame is incomplete")]
    IncompleteHeader,

    #[error("Length of the TLV frame is encoded in {0} octets, which is not supported")]
    UnsupportedLength(u8),

    #[error("The TLV frame is truncated: {expected} octets expected, {actual} octets available")]
    Truncated { expected: usize, actual: usize },

    #[error("The personal number is not a sequence of 12 digits")]
    InvalidPersonalNumber,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PreconditionError {
    #[error("The PIN must be {expected} digits, got {actual} characters")]
    PinLength { expected: usize, actual: usize },

    #[error("The PIN must consist of digits only")]
    PinNotNumeric,

    #[error("The secret must not be empty")]
    EmptySecret,

    #[error("The offset {0} is out of the range addressable by READ BINARY")]
    OffsetOutOfRange(usize),
}

//! A crate to read the My Number card through an APDU transport.
//!
//! ```rust,ignore
//! use std::rc::Rc;
//!
//! use myna::log::LogBuffer;
//! use myna::{procedure, Card};
//!
//! let log = Rc::new(LogBuffer::new());
//! let card = Rc::new(Card::new(transport, log.clone()));
//! let report = procedure::read_card(&card, "1234")?;
//! ```

#[cfg(feature = "pcsc")]
pub mod pcsc;

pub mod ap;
pub mod card;
pub mod log;
pub mod nfc;
pub mod procedure;
pub mod tlv;

mod error;

pub use card::Card;
pub use error::{AuthError, Error, ParseError, PreconditionError, Result, TransportError};

//! Communicating with the card using NFC technology

pub mod apdu;
#[cfg_attr(not(feature = "pcsc"), allow(dead_code))]
pub(crate) mod poll;

use std::time::Duration;

pub use self::apdu::{Command, Response, StatusWord};

use crate::TransportError;

/// A delegate to communicate with the card outside.
///
/// Implementations own the physical link, e.g. an `IsoDep` tag on Android or a PC/SC reader.
/// One call to [`Transport::exchange`] must transmit exactly one command frame and return exactly
/// one response frame, including the trailing status word.
pub trait Transport {
    /// Opens the link to the card.
    fn connect(&mut self) -> Result<(), TransportError>;

    /// Closes the link to the card.
    fn close(&mut self) -> Result<(), TransportError>;

    /// Transmits the command frame to the card, then receives the response frame from them.
    fn exchange(&mut self, command: &[u8]) -> Result<Vec<u8>, TransportError>;

    /// Gets the timeout applied to the link.
    ///
    /// Links bounding each exchange apply it there; links that cannot, like PC/SC, apply it to
    /// waiting for the card in [`Transport::connect`].
    fn timeout(&self) -> Duration;

    /// Sets the timeout applied to the link.
    fn set_timeout(&mut self, timeout: Duration);
}

//! Reading the card holder information, authenticating against the Text AP then the Visual AP.
//!
//! The two APs are cross-linked: PIN A of the Visual AP is the personal number, which can only
//! be read from the Text AP after verifying the PIN the holder enters.

use std::rc::Rc;

use crate::ap::{Attributes, TextAp, VisualAp};
use crate::nfc::Transport;
use crate::{AuthError, Card, Error, PreconditionError, Result};

/// Digits of the PIN for the Text AP.
pub const PIN_LEN: usize = 4;

/// Information read from the card.
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Report {
    /// Attempts left for the PIN of the Text AP, as looked up before verifying.
    pub remaining: Option<u8>,
    pub personal_number: String,
    /// Attributes from the Text AP.
    pub attributes: Attributes,
    /// Attributes from the Visual AP, including the photo.
    pub visual: Attributes,
}

/// Checks the PIN is exactly [`PIN_LEN`] digits.
pub fn validate_pin(pin: &str) -> Result<()> {
    let actual = pin.chars().count();
    if actual != PIN_LEN {
        return Err(PreconditionError::PinLength {
            expected: PIN_LEN,
            actual,
        }
        .into());
    }

    if !pin.bytes().all(|b| b.is_ascii_digit()) {
        return Err(PreconditionError::PinNotNumeric.into());
    }

    Ok(())
}

/// Connects to the card, reads the information, then closes the session.
///
/// The PIN is validated before connecting, so a malformed PIN never reaches the card.
pub fn read_card<T>(card: &Rc<Card<T>>, pin: &str) -> Result<Report>
where
    T: Transport,
{
    validate_pin(pin)?;

    card.with_connection(|card| run(card, pin))
}

/// Reads the information through a connected session.
pub fn run<T>(card: &Rc<Card<T>>, pin: &str) -> Result<Report>
where
    T: Transport,
{
    validate_pin(pin)?;

    let log = card.logger();

    let text_ap = TextAp::open(Rc::clone(card))?;

    let count = text_ap.lookup_pin_counter()?;
    log.put(&format!("remaining count {}", describe(count)));
    ensure_not_blocked(count)?;

    if let Err(e) = text_ap.verify(pin.as_bytes()) {
        log.put("verifyPin failed");
        return Err(after_failure(e, count));
    }
    log.put("verifyPin success");

    let personal_number = text_ap.read_personal_number()?;
    log.put("readMyNumber success");

    let attributes = text_ap.read_attributes()?;
    log.put("readAttributes success");

    let visual_ap = VisualAp::open(Rc::clone(card))?;

    let visual_count = visual_ap.lookup_pin_counter()?;
    log.put(&format!("VisualAP remaining count {}", describe(visual_count)));
    ensure_not_blocked(visual_count)?;

    if let Err(e) = visual_ap.verify(personal_number.as_bytes()) {
        log.put("VisualAP verifyPin failed");
        return Err(after_failure(e, visual_count));
    }
    log.put("VisualAP verifyPin success");

    let visual = visual_ap.read_visual_info()?;
    log.put("readVisualInfo success");

    Ok(Report {
        remaining: count,
        personal_number,
        attributes,
        visual,
    })
}

fn ensure_not_blocked(count: Option<u8>) -> Result<()> {
    match count {
        Some(0) => Err(AuthError::Blocked.into()),
        _ => Ok(()),
    }
}

/// Fills the attempts left from the counter looked up before, if the card did not tell them.
fn after_failure(error: Error, count: Option<u8>) -> Error {
    match (error, count) {
        (Error::Authentication(AuthError::Rejected(_)), Some(count)) => AuthError::Incorrect {
            remaining: count.saturating_sub(1),
        }
        .into(),
        (error, _) => error,
    }
}

fn describe(count: Option<u8>) -> String {
    count.map_or_else(|| "unknown".to_owned(), |c| c.to_string())
}

//! Text AP: Application to provide the personal number and the text attributes of the holder.
//! Also known as the "support AP" for entering the card surface information.

use std::rc::Rc;

use crate::ap::attributes::{Field, TagTable};
use crate::ap::{open, Attributes};
use crate::nfc::Transport;
use crate::{tlv, Card, ParseError, Result};

const DF_NAME: [u8; 10] = [0xD3, 0x92, 0x10, 0x00, 0x31, 0x00, 0x01, 0x01, 0x04, 0x08];
const EF_PERSONAL_NUMBER: [u8; 2] = [0x00, 0x01];
const EF_ATTRIBUTES: [u8; 2] = [0x00, 0x02];
const EF_PIN: [u8; 2] = [0x00, 0x11];

/// Digits of the personal number.
pub const PERSONAL_NUMBER_LEN: usize = 12;

const TAGS: &TagTable = &[
    (0x22, Field::Name),
    (0x23, Field::Address),
    (0x24, Field::Birth),
    (0x25, Field::Sex),
];

pub struct TextAp<T>
where
    T: Transport,
{
    card: Rc<Card<T>>,
}

impl<T> TextAp<T>
where
    T: Transport,
{
    open!(DF_NAME);

    /// Gets the number of attempts left for the PIN.
    pub fn lookup_pin_counter(&self) -> Result<Option<u8>> {
        self.card.pin_status(EF_PIN)
    }

    /// Verifies the PIN (4 digits).
    pub fn verify(&self, pin: &[u8]) -> Result<()> {
        self.card.verify_pin(EF_PIN, pin)
    }

    /// Reads the personal number from the card as TLV-encoded data.
    pub fn read_personal_number_raw(&self) -> Result<Vec<u8>> {
        self.card.read_tlv(EF_PERSONAL_NUMBER)
    }

    /// Reads the personal number from the card as a string.
    pub fn read_personal_number(&self) -> Result<String> {
        let buf = self.read_personal_number_raw()?;

        Ok(decode_personal_number(&buf)?)
    }

    /// Reads the text attributes from the card as TLV-encoded data.
    pub fn read_attributes_raw(&self) -> Result<Vec<u8>> {
        self.card.read_tlv(EF_ATTRIBUTES)
    }

    /// Reads the text attributes from the card as decoded data.
    pub fn read_attributes(&self) -> Result<Attributes> {
        let buf = self.read_attributes_raw()?;

        Ok(Attributes::decode(&buf, TAGS)?)
    }
}

fn decode_personal_number(buf: &[u8]) -> std::result::Result<String, ParseError> {
    let value = tlv::first(buf)?.require_value()?;

    if value.len() != PERSONAL_NUMBER_LEN || !value.iter().all(u8::is_ascii_digit) {
        return Err(ParseError::InvalidPersonalNumber);
    }

    Ok(value.iter().map(|&b| b as char).collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_personal_number() {
        let mut buf = vec![0xFF, 0x10, 0x0C];
        buf.extend_from_slice(b"123456789012");

        assert_eq!(Ok("123456789012".to_owned()), decode_personal_number(&buf));
    }

    #[test]
    fn rejects_non_digits() {
        let mut buf = vec![0xFF, 0x10, 0x0C];
        buf.extend_from_slice(b"12345678901A");

        assert_eq!(
            Err(ParseError::InvalidPersonalNumber),
            decode_personal_number(&buf),
        );
        assert_eq!(
            Err(ParseError::InvalidPersonalNumber),
            decode_personal_number(&[0xFF, 0x10, 0x02, 0x31, 0x32]),
        );
    }
}

//! Visual AP: Application to provide information indicated on the card surface.

use std::rc::Rc;

use crate::ap::attributes::{Field, TagTable};
use crate::ap::{open, Attributes};
use crate::nfc::Transport;
use crate::{Card, Result};

const DF_NAME: [u8; 10] = [0xD3, 0x92, 0x10, 0x00, 0x31, 0x00, 0x01, 0x01, 0x04, 0x02];
const EF_VISUAL_INFO: [u8; 2] = [0x00, 0x02];
const EF_PIN_A: [u8; 2] = [0x00, 0x13];
const EF_PIN_B: [u8; 2] = [0x00, 0x12];

const TAGS: &TagTable = &[
    (0x22, Field::Birth),
    (0x23, Field::Sex),
    (0x24, Field::PublicKey),
    (0x25, Field::Name),
    (0x26, Field::Address),
    (0x27, Field::Photo),
    (0x28, Field::Signature),
    (0x29, Field::Expiry),
    (0x2A, Field::Code),
];

pub enum Pin {
    /// My Number (12 digits), as read from the Text AP.
    /// Information from both front and back is available.
    A(Vec<u8>),

    /// DoB in 'YYMMDD' format + Expiry date in 'YYYY' format + PIN (4 digits).
    /// Information from only front is available.
    B(Vec<u8>),
}

pub struct VisualAp<T>
where
    T: Transport,
{
    card: Rc<Card<T>>,
}

impl<T> VisualAp<T>
where
    T: Transport,
{
    open!(DF_NAME);

    /// Gets the number of attempts left for PIN A.
    pub fn lookup_pin_counter(&self) -> Result<Option<u8>> {
        self.card.pin_status(EF_PIN_A)
    }

    /// Gets the number of attempts left for PIN B.
    pub fn lookup_pin_b_counter(&self) -> Result<Option<u8>> {
        self.card.pin_status(EF_PIN_B)
    }

    /// Verifies PIN A.
    ///
    /// PIN A of this AP is the personal number protected by the PIN of the Text AP, not a PIN
    /// the holder enters. Read it with [`crate::ap::TextAp::read_personal_number`] first.
    pub fn verify(&self, personal_number: &[u8]) -> Result<()> {
        self.card.verify_pin(EF_PIN_A, personal_number)
    }

    /// Verifies either PIN.
    pub fn verify_pin(&self, pin: &Pin) -> Result<()> {
        match pin {
            Pin::A(pin) => self.card.verify_pin(EF_PIN_A, pin),
            Pin::B(pin) => self.card.verify_pin(EF_PIN_B, pin),
        }
    }

    /// Reads the surface information as TLV-encoded data.
    pub fn read_visual_info_raw(&self) -> Result<Vec<u8>> {
        self.card.read_tlv(EF_VISUAL_INFO)
    }

    /// Reads the surface information as decoded data.
    /// The photo is left encoded as stored in the card.
    pub fn read_visual_info(&self) -> Result<Attributes> {
        let buf = self.read_visual_info_raw()?;

        Ok(Attributes::decode(&buf, TAGS)?)
    }
}

use std::borrow::Cow;

use crate::{tlv, ParseError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Sex {
    Male,
    Female,
    NotApplicable,
    Unknown,
}

impl From<&[u8]> for Sex {
    fn from(value: &[u8]) -> Self {
        use Sex::*;

        match value {
            b"1" => Male,
            b"2" => Female,
            b"9" => NotApplicable,
            _ => Unknown,
        }
    }
}

/// Attributes of the card holder.
/// Each field is set only if the record carried the corresponding tag.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub struct Attributes {
    pub birth: Option<String>,
    pub sex: Option<Sex>,
    pub public_key: Option<Vec<u8>>,
    pub name: Option<Vec<u8>>,
    pub address: Option<Vec<u8>>,
    pub photo: Option<Vec<u8>>,
    pub signature: Option<Vec<u8>>,
    pub expiry: Option<String>,
    pub code: Option<Vec<u8>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Field {
    Birth,
    Sex,
    PublicKey,
    Name,
    Address,
    Photo,
    Signature,
    Expiry,
    Code,
}

/// Maps tags of a record to the fields.
pub(crate) type TagTable = [(u32, Field)];

impl Attributes {
    /// Decodes the record: a frame containing a frame for each attribute.
    /// Unknown tags and truncated children are ignored.
    pub(crate) fn decode(buf: &[u8], table: &TagTable) -> Result<Self, ParseError> {
        let record = tlv::first(buf)?;
        let mut attributes = Self::default();

        for frame in record.children() {
            let Some(value) = frame.value else {
                continue;
            };

            if let Some((_, field)) = table.iter().find(|(tag, _)| *tag == frame.tag) {
                attributes.set(*field, value);
            }
        }

        Ok(attributes)
    }

    fn set(&mut self, field: Field, value: &[u8]) {
        let text = || String::from_utf8_lossy(value).into_owned();

        match field {
            Field::Birth => self.birth = Some(text()),
            Field::Sex => self.sex = Some(Sex::from(value)),
            Field::PublicKey => self.public_key = Some(value.to_vec()),
            Field::Name => self.name = Some(value.to_vec()),
            Field::Address => self.address = Some(value.to_vec()),
            Field::Photo => self.photo = Some(value.to_vec()),
            Field::Signature => self.signature = Some(value.to_vec()),
            Field::Expiry => self.expiry = Some(text()),
            Field::Code => self.code = Some(value.to_vec()),
        }
    }

    /// Reads the name as a string, replacing invalid sequences.
    pub fn name_str(&self) -> Option<Cow<'_, str>> {
        self.name.as_deref().map(String::from_utf8_lossy)
    }

    /// Reads the address as a string, replacing invalid sequences.
    pub fn address_str(&self) -> Option<Cow<'_, str>> {
        self.address.as_deref().map(String::from_utf8_lossy)
    }
}

//! JPKI AP: Application to read certificates and sign using a key-pair issued by JPKI.

use std::rc::Rc;

use crate::ap::open;
use crate::nfc::Transport;
use crate::{Card, Result};

const DF_NAME: [u8; 10] = [0xD3, 0x92, 0xF0, 0x00, 0x26, 0x01, 0x00, 0x00, 0x00, 0x01];
const EF_AUTH: [u8; 2] = [0x00, 0x17];
const EF_AUTH_PIN: [u8; 2] = [0x00, 0x18];
const EF_SIGN: [u8; 2] = [0x00, 0x1A];
const EF_SIGN_PIN: [u8; 2] = [0x00, 0x1B];

/// Type of the certificate to fetch
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum CertType {
    /// Certificate for authentication
    Auth,

    /// Certificate of CA (Certificate Authority) that issued the authentication certificate
    AuthCA,

    /// Certificate for signing documents
    Sign,

    /// Certificate of CA (Certificate Authority) that issued the signing certificate
    SignCA,
}

impl CertType {
    /// Converts the variant into the identifier to select a EF
    /// that corresponds with the selected certificate.
    pub fn into_efid(self) -> [u8; 2] {
        match self {
            Self::Auth => [0x00, 0x0A],
            Self::AuthCA => [0x00, 0x0B],
            Self::Sign => [0x00, 0x01],
            Self::SignCA => [0x00, 0x02],
        }
    }

    /// Determines whether it is needed for fetching the certificate to unlock it with a PIN.
    pub fn is_pin_required(&self) -> bool {
        matches!(self, Self::Sign)
    }
}

/// Key-pair held in the AP.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum KeyType {
    /// Key-pair for authentication, unlocked by a PIN of 4 digits.
    Auth,

    /// Key-pair for signing documents, unlocked by a password of 6-16 characters.
    Sign,
}

impl KeyType {
    fn key_efid(self) -> [u8; 2] {
        match self {
            Self::Auth => EF_AUTH,
            Self::Sign => EF_SIGN,
        }
    }

    fn pin_efid(self) -> [u8; 2] {
        match self {
            Self::Auth => EF_AUTH_PIN,
            Self::Sign => EF_SIGN_PIN,
        }
    }
}

/// An AP to sign messages using a key-pair issued by JPKI
pub struct CryptoAp<T>
where
    T: Transport,
{
    card: Rc<Card<T>>,
}

impl<T> CryptoAp<T>
where
    T: Transport,
{
    open!(DF_NAME);

    /// Reads a certificate of the type as DER-encoded data, unlocking with the PIN if required.
    pub fn read_certificate(&self, ty: CertType, pin: &[u8]) -> Result<Vec<u8>> {
        if ty.is_pin_required() {
            self.card.verify_pin(EF_SIGN_PIN, pin)?;
        }

        self.card.read_tlv(ty.into_efid())
    }

    /// Gets the number of attempts left for the PIN of the key-pair.
    pub fn lookup_pin_counter(&self, ty: KeyType) -> Result<Option<u8>> {
        self.card.pin_status(ty.pin_efid())
    }

    /// Computes a signature for the DigestInfo using the key-pair for authentication.
    pub fn auth(&self, pin: &[u8], digest: &[u8]) -> Result<Vec<u8>> {
        self.compute(KeyType::Auth, pin, digest)
    }

    /// Computes a signature for the DigestInfo using the key-pair for signing.
    pub fn sign(&self, pin: &[u8], digest: &[u8]) -> Result<Vec<u8>> {
        self.compute(KeyType::Sign, pin, digest)
    }

    fn compute(&self, ty: KeyType, pin: &[u8], digest: &[u8]) -> Result<Vec<u8>> {
        self.card.verify_pin(ty.pin_efid(), pin)?;
        self.card.select_ef(&ty.key_efid())?;
        self.card.signature(digest)
    }
}

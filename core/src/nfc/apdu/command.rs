use crate::nfc::apdu;
use crate::nfc::apdu::ins;

/// Maximum length of a payload in the short form.
pub const MAX_PAYLOAD_LEN: usize = 0xFF;

const HEADER_LEN: usize = 4;

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    #[error("The payload is too long for a short APDU ({0} octets)")]
    PayloadTooLong(usize),

    #[error("The payload must not be empty")]
    EmptyPayload,

    #[error("The octets do not form a short APDU command ({0} octets)")]
    Malformed(usize),
}

/// Shapes of a command defined in ISO/IEC 7816-4.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Case {
    /// Header only.
    One,

    /// Header and Le.
    Two,

    /// Header, Lc and the payload.
    Three,

    /// Header, Lc, the payload and Le.
    Four,
}

/// An APDU command to be transmitted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    cla: u8,
    ins: u8,
    p1: u8,
    p2: u8,
    le: Option<u8>,
    payload: Option<Vec<u8>>,
}

impl Command {
    /// Constructs an command with CLA, INS, P1, and P2 (case 1).
    /// No payloads will be transmitted or received.
    pub fn new(cla: u8, ins: u8, p1: u8, p2: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            le: None,
            payload: None,
        }
    }

    /// Constructs an command with CLA, INS, P1, P2, and Le (case 2).
    /// A payload will be received. Le of `0x00` requests 256 octets.
    pub fn new_with_le(cla: u8, ins: u8, p1: u8, p2: u8, le: u8) -> Self {
        Self {
            cla,
            ins,
            p1,
            p2,
            le: Some(le),
            payload: None,
        }
    }

    /// Constructs an command with CLA, INS, P1, P2, and a payload (case 3).
    /// No payload will be received.
    pub fn new_with_payload(
        cla: u8,
        ins: u8,
        p1: u8,
        p2: u8,
        payload: Vec<u8>,
    ) -> Result<Self, CommandError> {
        check_payload(&payload)?;

        Ok(Self {
            cla,
            ins,
            p1,
            p2,
            le: None,
            payload: Some(payload),
        })
    }

    /// Constructs an command with CLA, INS, P1, P2, a payload and Le (case 4).
    /// A payload will be received.
    pub fn new_with_payload_le(
        cla: u8,
        ins: u8,
        p1: u8,
        p2: u8,
        payload: Vec<u8>,
        le: u8,
    ) -> Result<Self, CommandError> {
        check_payload(&payload)?;

        Ok(Self {
            cla,
            ins,
            p1,
            p2,
            le: Some(le),
            payload: Some(payload),
        })
    }

    /// Constructs a `SELECT FILE` command.
    pub fn select_file(p1: u8, p2: u8, payload: &[u8]) -> Result<Self, CommandError> {
        match payload.len() {
            0 => Ok(Self::new(apdu::CLA_DEFAULT, ins::SELECT_FILE, p1, p2)),
            _ => Self::new_with_payload(
                apdu::CLA_DEFAULT,
                ins::SELECT_FILE,
                p1,
                p2,
                payload.into(),
            ),
        }
    }

    /// Constructs a `READ BINARY` command.
    pub fn read_binary(p1: u8, p2: u8, le: u8) -> Self {
        Self::new_with_le(apdu::CLA_DEFAULT, ins::READ_BINARY, p1, p2, le)
    }

    /// Constructs a `VERIFY` command.
    /// Without a payload, the card reports the retry counter of the selected PIN instead.
    pub fn verify(p2: u8, payload: &[u8]) -> Result<Self, CommandError> {
        match payload.len() {
            0 => Ok(Self::lookup_pin(p2)),
            _ => Self::new_with_payload(apdu::CLA_DEFAULT, ins::VERIFY, 0x00, p2, payload.into()),
        }
    }

    /// Constructs a `VERIFY` command asking the retry counter of the selected PIN.
    pub fn lookup_pin(p2: u8) -> Self {
        Self::new(apdu::CLA_DEFAULT, ins::VERIFY, 0x00, p2)
    }

    /// Constructs a command to compute a signature of the payload using the selected key.
    /// The whole signature is expected in the response.
    pub fn sign(payload: &[u8]) -> Result<Self, CommandError> {
        Self::new_with_payload_le(
            apdu::CLA_PROPRIETARY,
            ins::COMPUTE_SIGNATURE,
            0x00,
            0x80,
            payload.into(),
            0x00,
        )
    }

    /// Gets the class byte.
    pub fn cla(&self) -> u8 {
        self.cla
    }

    /// Gets the instruction code.
    pub fn ins(&self) -> u8 {
        self.ins
    }

    /// Gets the first parameter.
    pub fn p1(&self) -> u8 {
        self.p1
    }

    /// Gets the second parameter.
    pub fn p2(&self) -> u8 {
        self.p2
    }

    /// Gets Le, the length of the payload expected in the response.
    pub fn le(&self) -> Option<u8> {
        self.le
    }

    /// Gets the payload to be transmitted, if any.
    pub fn payload(&self) -> Option<&[u8]> {
        self.payload.as_deref()
    }

    /// Gets CLA, INS, P1 and P2 in order.
    pub fn header(&self) -> [u8; HEADER_LEN] {
        [self.cla, self.ins, self.p1, self.p2]
    }

    /// Determines the case of the command.
    pub fn case(&self) -> Case {
        match (&self.payload, self.le) {
            (None, None) => Case::One,
            (None, Some(_)) => Case::Two,
            (Some(_), None) => Case::Three,
            (Some(_), Some(_)) => Case::Four,
        }
    }

    /// Converts the command into octets.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut buffer: Vec<u8> = Vec::with_capacity(HEADER_LEN + 2 + MAX_PAYLOAD_LEN);
        buffer.extend_from_slice(&self.header());

        if let Some(p) = &self.payload {
            buffer.push(p.len() as u8);
            buffer.extend_from_slice(p);
        }

        if let Some(l) = self.le {
            buffer.push(l);
        }

        buffer
    }

    /// Converts the command into octets.
    pub fn into_bytes(self) -> Vec<u8> {
        self.to_bytes()
    }

    /// Parses a command from the octets, recovering the case from the length.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, CommandError> {
        let malformed = || CommandError::Malformed(bytes.len());

        let (&[cla, ins, p1, p2], body) = split_header(bytes).ok_or_else(malformed)?;
        let command = Self::new(cla, ins, p1, p2);

        match body {
            [] => Ok(command),
            [le] => Ok(Self {
                le: Some(*le),
                ..command
            }),
            [lc, rest @ ..] => {
                let lc = *lc as usize;
                if lc == 0 || rest.len() < lc {
                    return Err(malformed());
                }

                let (payload, trailer) = rest.split_at(lc);
                let le = match trailer {
                    [] => None,
                    [le] => Some(*le),
                    _ => return Err(malformed()),
                };

                Ok(Self {
                    le,
                    payload: Some(payload.to_vec()),
                    ..command
                })
            }
        }
    }
}

impl From<Command> for Vec<u8> {
    fn from(command: Command) -> Self {
        command.into_bytes()
    }
}

impl TryFrom<&[u8]> for Command {
    type Error = CommandError;

    fn try_from(bytes: &[u8]) -> Result<Self, Self::Error> {
        Self::from_bytes(bytes)
    }
}

fn check_payload(payload: &[u8]) -> Result<(), CommandError> {
    match payload.len() {
        0 => Err(CommandError::EmptyPayload),
        n if n > MAX_PAYLOAD_LEN => Err(CommandError::PayloadTooLong(n)),
        _ => Ok(()),
    }
}

fn split_header(bytes: &[u8]) -> Option<(&[u8; HEADER_LEN], &[u8])> {
    if bytes.len() < HEADER_LEN {
        return None;
    }

    let (header, body) = bytes.split_at(HEADER_LEN);

    Some((header.try_into().ok()?, body))
}

// Transports standing in for a card in integration tests.
#![allow(dead_code)]

use std::cell::{RefCell, RefMut};
use std::collections::{HashMap, VecDeque};
use std::rc::Rc;
use std::time::Duration;

use myna::log::LogBuffer;
use myna::nfc::{Command, Transport};
use myna::{Card, TransportError};

pub const TEXT_AP: [u8; 10] = [0xD3, 0x92, 0x10, 0x00, 0x31, 0x00, 0x01, 0x01, 0x04, 0x08];
pub const VISUAL_AP: [u8; 10] = [0xD3, 0x92, 0x10, 0x00, 0x31, 0x00, 0x01, 0x01, 0x04, 0x02];
pub const CRYPTO_AP: [u8; 10] = [0xD3, 0x92, 0xF0, 0x00, 0x26, 0x01, 0x00, 0x00, 0x00, 0x01];

pub const DEFAULT_TIMEOUT: Duration = Duration::from_millis(1000);

/// What happened on the link, shared between the transport and the test.
#[derive(Debug, Default)]
pub struct Wire {
    pub sent: Vec<Vec<u8>>,
    pub responses: VecDeque<Vec<u8>>,
    pub connected: bool,
    pub connects: usize,
    pub closes: usize,
    pub timeout: Duration,
    /// Timeout in effect at each exchange.
    pub timeouts: Vec<Duration>,
}

/// Transport replaying queued responses in order and recording every frame sent.
#[derive(Debug, Clone)]
pub struct StubTransport {
    wire: Rc<RefCell<Wire>>,
}

impl StubTransport {
    pub fn new() -> Self {
        Self {
            wire: Rc::new(RefCell::new(Wire {
                timeout: DEFAULT_TIMEOUT,
                ..Default::default()
            })),
        }
    }

    pub fn push(&self, response: &[u8]) -> &Self {
        self.wire.borrow_mut().responses.push_back(response.to_vec());
        self
    }

    pub fn push_ok(&self, payload: &[u8]) -> &Self {
        let mut response = payload.to_vec();
        response.extend([0x90, 0x00]);
        self.push(&response)
    }

    pub fn push_status(&self, sw1: u8, sw2: u8) -> &Self {
        self.push(&[sw1, sw2])
    }

    pub fn wire(&self) -> RefMut<'_, Wire> {
        self.wire.borrow_mut()
    }

    pub fn sent(&self) -> Vec<Vec<u8>> {
        self.wire.borrow().sent.clone()
    }
}

impl Transport for StubTransport {
    fn connect(&mut self) -> Result<(), TransportError> {
        let mut wire = self.wire.borrow_mut();
        wire.connected = true;
        wire.connects += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        let mut wire = self.wire.borrow_mut();
        wire.closes += 1;
        match std::mem::replace(&mut wire.connected, false) {
            true => Ok(()),
            false => Err(TransportError::NotConnected),
        }
    }

    fn exchange(&mut self, command: &[u8]) -> Result<Vec<u8>, TransportError> {
        let mut wire = self.wire.borrow_mut();
        if !wire.connected {
            return Err(TransportError::NotConnected);
        }

        let timeout = wire.timeout;
        wire.timeouts.push(timeout);
        wire.sent.push(command.to_vec());
        wire.responses
            .pop_front()
            .ok_or_else(|| TransportError::Exchange("no response queued".into()))
    }

    fn timeout(&self) -> Duration {
        self.wire.borrow().timeout
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.wire.borrow_mut().timeout = timeout;
    }
}

/// A PIN stored in a simulated AP.
#[derive(Debug, Clone)]
pub struct SimPin {
    pub secret: Vec<u8>,
    pub remaining: u8,
    pub limit: u8,
}

/// An AP of a simulated card: EFs holding data and EFs holding PINs.
#[derive(Debug, Clone, Default)]
pub struct SimAp {
    pub files: HashMap<[u8; 2], Vec<u8>>,
    pub pins: HashMap<[u8; 2], SimPin>,
}

impl SimAp {
    pub fn file(mut self, ef: [u8; 2], content: Vec<u8>) -> Self {
        self.files.insert(ef, content);
        self
    }

    pub fn pin(mut self, ef: [u8; 2], secret: &[u8], remaining: u8) -> Self {
        self.pins.insert(
            ef,
            SimPin {
                secret: secret.to_vec(),
                remaining,
                limit: 3,
            },
        );
        self
    }
}

#[derive(Debug, Default)]
pub struct SimState {
    pub aps: HashMap<Vec<u8>, SimAp>,
    pub current_ap: Option<Vec<u8>>,
    pub current_ef: Option<[u8; 2]>,
    pub sent: Vec<Command>,
    pub connected: bool,
    pub closes: usize,
    pub timeout: Duration,
}

impl SimState {
    fn ap(&mut self) -> Option<&mut SimAp> {
        let name = self.current_ap.clone()?;
        self.aps.get_mut(&name)
    }

    fn process(&mut self, command: &Command) -> Vec<u8> {
        const OK: [u8; 2] = [0x90, 0x00];
        const NOT_FOUND: [u8; 2] = [0x6A, 0x82];
        const NO_EF: [u8; 2] = [0x69, 0x86];

        match (command.cla(), command.ins(), command.p1(), command.payload()) {
            (0x00, 0xA4, 0x04, Some(name)) => match self.aps.contains_key(name) {
                true => {
                    self.current_ap = Some(name.to_vec());
                    self.current_ef = None;
                    OK.to_vec()
                }
                false => NOT_FOUND.to_vec(),
            },
            (0x00, 0xA4, 0x02, Some(&[a, b])) => {
                let exists = self
                    .ap()
                    .map(|ap| ap.files.contains_key(&[a, b]) || ap.pins.contains_key(&[a, b]))
                    .unwrap_or(false);

                match exists {
                    true => {
                        self.current_ef = Some([a, b]);
                        OK.to_vec()
                    }
                    false => NOT_FOUND.to_vec(),
                }
            }
            (0x00, 0xB0, p1, None) => {
                let Some(ef) = self.current_ef else {
                    return NO_EF.to_vec();
                };
                let Some(content) = self.ap().and_then(|ap| ap.files.get(&ef).cloned()) else {
                    return NO_EF.to_vec();
                };

                let offset = u16::from_be_bytes([p1, command.p2()]) as usize;
                let le = match command.le() {
                    Some(0) | None => 0x100,
                    Some(le) => le as usize,
                };
                if offset > content.len() {
                    return vec![0x6B, 0x00];
                }

                let end = (offset + le).min(content.len());
                let mut response = content[offset..end].to_vec();
                response.extend(OK);
                response
            }
            (0x00, 0x20, 0x00, secret) => {
                let Some(ef) = self.current_ef else {
                    return NO_EF.to_vec();
                };
                let Some(pin) = self.ap().and_then(|ap| ap.pins.get_mut(&ef)) else {
                    return NO_EF.to_vec();
                };

                match secret {
                    None => vec![0x63, 0xC0 | pin.remaining],
                    Some(_) if pin.remaining == 0 => vec![0x69, 0x84],
                    Some(secret) if secret == pin.secret.as_slice() => {
                        pin.remaining = pin.limit;
                        OK.to_vec()
                    }
                    Some(_) => {
                        pin.remaining -= 1;
                        vec![0x63, 0xC0 | pin.remaining]
                    }
                }
            }
            (0x80, 0x2A, _, Some(_)) => {
                let mut response = vec![0x5A; 8];
                response.extend(OK);
                response
            }
            _ => vec![0x6D, 0x00],
        }
    }
}

/// Transport backed by an in-memory card answering SELECT, READ BINARY, VERIFY and signing.
#[derive(Debug, Clone)]
pub struct SimulatedCard {
    state: Rc<RefCell<SimState>>,
}

impl SimulatedCard {
    pub fn new() -> Self {
        Self {
            state: Rc::new(RefCell::new(SimState {
                timeout: DEFAULT_TIMEOUT,
                ..Default::default()
            })),
        }
    }

    pub fn with_ap(self, name: &[u8], ap: SimAp) -> Self {
        self.state.borrow_mut().aps.insert(name.to_vec(), ap);
        self
    }

    pub fn state(&self) -> RefMut<'_, SimState> {
        self.state.borrow_mut()
    }

    pub fn sent(&self) -> Vec<Command> {
        self.state.borrow().sent.clone()
    }

    /// VERIFY commands carrying a secret.
    pub fn verifications(&self) -> Vec<Vec<u8>> {
        self.sent()
            .iter()
            .filter(|c| c.ins() == 0x20)
            .filter_map(|c| c.payload().map(<[u8]>::to_vec))
            .collect()
    }

    pub fn remaining(&self, ap: &[u8], ef: [u8; 2]) -> u8 {
        self.state.borrow().aps[ap].pins[&ef].remaining
    }
}

impl Transport for SimulatedCard {
    fn connect(&mut self) -> Result<(), TransportError> {
        self.state.borrow_mut().connected = true;
        Ok(())
    }

    fn close(&mut self) -> Result<(), TransportError> {
        let mut state = self.state.borrow_mut();
        state.connected = false;
        state.closes += 1;
        Ok(())
    }

    fn exchange(&mut self, command: &[u8]) -> Result<Vec<u8>, TransportError> {
        let mut state = self.state.borrow_mut();
        if !state.connected {
            return Err(TransportError::NotConnected);
        }

        let command = Command::from_bytes(command).map_err(TransportError::exchange)?;
        let response = state.process(&command);
        state.sent.push(command);

        Ok(response)
    }

    fn timeout(&self) -> Duration {
        self.state.borrow().timeout
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.state.borrow_mut().timeout = timeout;
    }
}

/// Encodes a frame with the tag octets as given.
pub fn tlv(tag: &[u8], value: &[u8]) -> Vec<u8> {
    let mut buf = tag.to_vec();
    match value.len() {
        n if n < 0x80 => buf.push(n as u8),
        n if n <= 0xFF => buf.extend([0x81, n as u8]),
        n => buf.extend([0x82, (n >> 8) as u8, n as u8]),
    }
    buf.extend_from_slice(value);
    buf
}

pub fn personal_number_file(number: &str) -> Vec<u8> {
    tlv(&[0xFF, 0x10], number.as_bytes())
}

pub fn text_attributes_file(name: &str, address: &str, birth: &str, sex: &str) -> Vec<u8> {
    let children = [
        tlv(&[0xDF, 0x21], &[0x00, 0x00, 0x00]),
        tlv(&[0xDF, 0x22], name.as_bytes()),
        tlv(&[0xDF, 0x23], address.as_bytes()),
        tlv(&[0xDF, 0x24], birth.as_bytes()),
        tlv(&[0xDF, 0x25], sex.as_bytes()),
    ]
    .concat();

    tlv(&[0xFF, 0x20], &children)
}

pub fn visual_info_file(birth: &str, photo: &[u8], expiry: &str) -> Vec<u8> {
    let children = [
        tlv(&[0xDF, 0x21], &[0x00, 0x00]),
        tlv(&[0xDF, 0x22], birth.as_bytes()),
        tlv(&[0xDF, 0x23], b"1"),
        tlv(&[0xDF, 0x27], photo),
        tlv(&[0xDF, 0x29], expiry.as_bytes()),
    ]
    .concat();

    tlv(&[0xFF, 0x40], &children)
}

/// Photo large enough to need a long-form length and several READ BINARY commands.
pub fn sample_photo() -> Vec<u8> {
    (0..700u32).map(|i| (i % 251) as u8).collect()
}

/// A card holding the PIN `1234` and the personal number `123456789012`.
pub fn sample_card(text_remaining: u8, visual_remaining: u8) -> SimulatedCard {
    let text = SimAp::default()
        .pin([0x00, 0x11], b"1234", text_remaining)
        .file([0x00, 0x01], personal_number_file("123456789012"))
        .file(
            [0x00, 0x02],
            text_attributes_file("番号 花子", "東京都千代田区", "19800101", "2"),
        );
    let visual = SimAp::default()
        .pin([0x00, 0x13], b"123456789012", visual_remaining)
        .file(
            [0x00, 0x02],
            visual_info_file("19800101", &sample_photo(), "2030"),
        );

    SimulatedCard::new()
        .with_ap(&TEXT_AP, text)
        .with_ap(&VISUAL_AP, visual)
}

pub fn session<T>(transport: T) -> (Rc<Card<T>>, Rc<LogBuffer>)
where
    T: Transport,
{
    let log = Rc::new(LogBuffer::new());
    let card = Rc::new(Card::new(transport, log.clone()));

    (card, log)
}

use std::cell::{Cell, RefCell};
use std::rc::Rc;
use std::time::Duration;

use crate::log::{debug, Logger};
use crate::nfc::{Command, Response, Transport};
use crate::tlv::entire_size_from_partial;
use crate::{AuthError, Error, ParseError, PreconditionError, Result, TransportError};

const SELECT_P1_DF: u8 = 0x04;
const SELECT_P1_EF: u8 = 0x02;
const SELECT_P2: u8 = 0x0C;

const VERIFY_P2: u8 = 0x80;

/// Octets to read ahead to learn the size of a TLV-encoded file.
const PEEK_LEN: usize = 7;

/// Octets a single `READ BINARY` can receive in the short form.
const MAX_READ_LEN: usize = 0x100;

/// Highest offset P1-P2 of `READ BINARY` can address; b8 of P1 denotes a short EF identifier.
const MAX_READ_OFFSET: usize = 0x7FFF;

/// Timeout applied while the card computes a signature.
pub const SIGNATURE_TIMEOUT: Duration = Duration::from_secs(5);

/// Lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Idle,
    Open,
    Closed,
}

/// An adapter to communicate with the card through the transport
///
/// The session is used through `&self` so that several APs can share it in an `Rc`.
/// Once closed, every operation fails with [`TransportError::Closed`].
pub struct Card<T>
where
    T: Transport,
{
    transport: RefCell<T>,
    state: Cell<State>,
    logger: Rc<dyn Logger>,
}

impl<T> Card<T>
where
    T: Transport,
{
    /// Initiates an adapter with the transport, logging into the sink.
    pub fn new(transport: T, logger: Rc<dyn Logger>) -> Self {
        Self {
            transport: RefCell::new(transport),
            state: Cell::new(State::Idle),
            logger,
        }
    }

    /// Gets the current lifecycle state of the session.
    pub fn state(&self) -> State {
        self.state.get()
    }

    /// Gets the sink the session logs into.
    pub fn logger(&self) -> &dyn Logger {
        self.logger.as_ref()
    }

    /// Connects to the card through the transport.
    pub fn connect(&self) -> Result<()> {
        match self.state.get() {
            State::Open => return Ok(()),
            State::Closed => return Err(TransportError::Closed.into()),
            State::Idle => {}
        }

        self.logger.put("connect...");
        self.transport
            .try_borrow_mut()
            .map_err(|_| TransportError::Busy)?
            .connect()?;
        self.state.set(State::Open);

        Ok(())
    }

    /// Closes the session.
    ///
    /// Closing twice, or closing a transport which was already disconnected, is not an error.
    /// If an exchange is in flight, the transport is closed as soon as it returns.
    pub fn close(&self) {
        if self.state.replace(State::Closed) != State::Open {
            return;
        }

        self.logger.put("reader close...");
        if let Ok(mut transport) = self.transport.try_borrow_mut() {
            if let Err(e) = transport.close() {
                self.logger.put(&format!("Failed to close reader: {e}"));
            }
        }
    }

    /// Connects, runs the closure, then closes the session whatever the closure returns.
    ///
    /// A session the caller already opened is left open for the caller to close.
    pub fn with_connection<R, F>(self: &Rc<Self>, f: F) -> Result<R>
    where
        F: FnOnce(&Rc<Self>) -> Result<R>,
    {
        let opened = self.state() == State::Idle;
        self.connect()?;

        let _connection = opened.then(|| Connection(&**self));

        f(self)
    }

    /// Transmits the command to the card, then receives the response from them.
    pub fn transceive(&self, command: &Command) -> Result<Response> {
        if self.state.get() != State::Open {
            return Err(match self.state.get() {
                State::Closed => TransportError::Closed,
                _ => TransportError::NotConnected,
            }
            .into());
        }

        debug!("TX: {} ({:?})", hex::encode(command.header()), command.case());

        let rx = {
            let mut transport = self
                .transport
                .try_borrow_mut()
                .map_err(|_| TransportError::Busy)?;
            let rx = transport.exchange(&command.to_bytes());

            if self.state.get() == State::Closed {
                // Torn down while the exchange was in flight.
                if let Err(e) = transport.close() {
                    self.logger.put(&format!("Failed to close reader: {e}"));
                }

                return Err(TransportError::Closed.into());
            }

            rx?
        };

        let response = Response::from_bytes(rx)?;

        debug!("RX: {} octets, {}", response.payload().len(), response.status());
        self.logger.put(&format!("Response: {}", response.status()));

        Ok(response)
    }

    /// Selects a DF with their name.
    pub fn select_df(&self, name: &[u8]) -> Result<()> {
        self.logger.put(&format!("select DF {}", hex::encode_upper(name)));

        self.select(SELECT_P1_DF, name)
    }

    /// Selects a EF with their identifier.
    pub fn select_ef(&self, id: &[u8]) -> Result<()> {
        self.logger.put(&format!("select EF {}", hex::encode_upper(id)));

        self.select(SELECT_P1_EF, id)
    }

    /// Looks up the retry counter of the selected PIN.
    /// A blocked PIN has no attempts left, so it is reported as `Some(0)`.
    /// `None` means the card told nothing about the counter.
    pub fn lookup_pin_counter(&self) -> Result<Option<u8>> {
        let status = self.transceive(&Command::lookup_pin(VERIFY_P2))?.status();

        Ok(match status.is_blocked() {
            true => Some(0),
            false => status.retry_counter(),
        })
    }

    /// Verifies the selected PIN.
    ///
    /// Each failure consumes an attempt on the card, so this is never retried.
    pub fn verify(&self, pin: &[u8]) -> Result<()> {
        if pin.is_empty() {
            return Err(PreconditionError::EmptySecret.into());
        }

        let status = self
            .transceive(&Command::verify(VERIFY_P2, pin)?)?
            .status();

        if status.is_success() {
            return Ok(());
        }

        let error = match status.retry_counter() {
            Some(0) => AuthError::Blocked,
            Some(remaining) => AuthError::Incorrect { remaining },
            None if status.is_blocked() => AuthError::Blocked,
            None => AuthError::Rejected(status),
        };

        self.logger.put(&error.to_string());

        Err(error.into())
    }

    /// Selects a EF then looks up the retry counter of the PIN in the EF.
    pub fn pin_status(&self, ef: [u8; 2]) -> Result<Option<u8>> {
        self.select_ef(&ef)?;
        self.lookup_pin_counter()
    }

    /// Selects a EF then verifies the pin using the EF.
    pub fn verify_pin(&self, ef: [u8; 2], pin: &[u8]) -> Result<()> {
        self.select_ef(&ef)?;
        self.verify(pin)
    }

    /// Reads up to `le` octets at the offset of the selected file, in a single command.
    /// Le of `0x00` requests 256 octets.
    pub fn read_binary(&self, offset: usize, le: u8) -> Result<Vec<u8>> {
        let offset = u16::try_from(offset)
            .ok()
            .filter(|o| *o as usize <= MAX_READ_OFFSET)
            .ok_or(PreconditionError::OffsetOutOfRange(offset))?;

        let [p1, p2] = offset.to_be_bytes();

        self.transceive(&Command::read_binary(p1, p2, le))?.into_result()
    }

    /// Reads binary from the selected file for `len` octets max.
    pub fn read(&self, len: usize) -> Result<Vec<u8>> {
        let mut pos: usize = 0;
        let mut buf: Vec<u8> = Vec::with_capacity(len);

        while pos < len {
            let want = (len - pos).min(MAX_READ_LEN);
            let mut fragment = self.read_binary(pos, (want & 0xFF) as u8)?;
            let length = fragment.len();

            buf.append(&mut fragment);
            pos += length;

            if length < want {
                break;
            }
        }

        buf.truncate(len);

        Ok(buf)
    }

    /// Selects a EF then extracts the entire size of its TLV-encoded content
    /// by reading the header only.
    pub fn peek_size(&self, ef: [u8; 2]) -> Result<usize> {
        self.select_ef(&ef)?;

        let header = self.read(PEEK_LEN)?;

        Ok(entire_size_from_partial(&header)?)
    }

    /// Selects a EF then reads exactly `size` octets from the head.
    pub fn read_exact(&self, ef: [u8; 2], size: usize) -> Result<Vec<u8>> {
        self.select_ef(&ef)?;

        let buf = self.read(size)?;
        if buf.len() < size {
            return Err(ParseError::Truncated {
                expected: size,
                actual: buf.len(),
            }
            .into());
        }

        Ok(buf)
    }

    /// Reads the entire TLV-encoded content of a EF.
    /// Short version of `self.peek_size` + `self.read_exact`.
    pub fn read_tlv(&self, ef: [u8; 2]) -> Result<Vec<u8>> {
        let size = self.peek_size(ef)?;

        self.read_exact(ef, size)
    }

    /// Computes a signature using the selected key.
    ///
    /// The transport timeout is extended while the card computes, then restored.
    pub fn signature(&self, data: &[u8]) -> Result<Vec<u8>> {
        let command = Command::sign(data)?;

        let _timeout = TimeoutOverride::new(&self.transport, SIGNATURE_TIMEOUT)?;

        self.transceive(&command)?.into_result()
    }

    fn select(&self, p1: u8, id: &[u8]) -> Result<()> {
        self.transceive(&Command::select_file(p1, SELECT_P2, id)?)?
            .into_result()
            .map(|_| ())
    }
}

/// Closes the session when dropped.
struct Connection<'a, T>(&'a Card<T>)
where
    T: Transport;

impl<T> Drop for Connection<'_, T>
where
    T: Transport,
{
    fn drop(&mut self) {
        self.0.close();
    }
}

/// Restores the previous timeout of the transport when dropped.
struct TimeoutOverride<'a, T>
where
    T: Transport,
{
    transport: &'a RefCell<T>,
    previous: Duration,
}

impl<'a, T> TimeoutOverride<'a, T>
where
    T: Transport,
{
    fn new(transport: &'a RefCell<T>, timeout: Duration) -> Result<Self> {
        let mut inner = transport
            .try_borrow_mut()
            .map_err(|_| Error::from(TransportError::Busy))?;
        let previous = inner.timeout();

        debug!("signature: previous timeout = {:?}", previous);
        inner.set_timeout(timeout);

        Ok(Self {
            transport,
            previous,
        })
    }
}

impl<T> Drop for TimeoutOverride<'_, T>
where
    T: Transport,
{
    fn drop(&mut self) {
        if let Ok(mut transport) = self.transport.try_borrow_mut() {
            transport.set_timeout(self.previous);
        }
    }
}

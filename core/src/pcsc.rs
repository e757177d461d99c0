//! PC/SC support for myna library.
//! Can be enabled by turning `pcsc` feature on.
//!
//! ## What is PC/SC?
//! PC/SC (Personal Computer/Smart Card) is an abstraction layer for communicating with Smart Cards
//! from Windows. Using this layer, applications can connect to any devices that supports PC/SC,
//! without depending on their driver implementation. Windows and macOS supports PC/SC by themselves,
//! Linux also supports by installing pcsc-lite shared library.
//!
//! ## Supported platform
//! Platforms that supports PC/SC are limited because they are subjected to use devices on PCs.
//! Linux, Windows and macOS are supported by pcsc-rust, backend of this implementation.
//! Refer the documentation of pcsc-rust for details:
//! <https://github.com/bluetech/pcsc-rust>
//!
//! ## Usage
//! ```rust,no_run
//! use std::rc::Rc;
//!
//! use myna::ap::TextAp;
//! use myna::log::NullLogger;
//! use myna::pcsc::Context;
//! use myna::Card;
//!
//! let ctx = Context::try_new().unwrap();
//! let device = ctx.open().unwrap();
//! let card = Rc::new(Card::new(device.into_transport(ctx), Rc::new(NullLogger)));
//!
//! let counter = card
//!     .with_connection(|card| TextAp::open(Rc::clone(card))?.lookup_pin_counter())
//!     .unwrap();
//! ```

use std::ffi::{CStr, CString};
use std::thread::sleep;
use std::time::Duration;

use pcsc::{Disposition, Protocols, Scope, ShareMode, MAX_BUFFER_SIZE};

use crate::log::{debug, info};
use crate::nfc::poll::retry;
use crate::nfc::Transport;
use crate::TransportError;

/// How long to wait for a card to be touched unless configured otherwise.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

const POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Error occurred while communicating with PC/SC: {0}")]
    PcscError(#[from] pcsc::Error),

    #[error("Reader not found on PC/SC service")]
    ReaderNotFound,
}

pub(crate) type Result<T> = std::result::Result<T, Error>;

/// PC/SC context.
pub struct Context {
    ctx: pcsc::Context,
}

impl Context {
    /// Creates a PC/SC context in user scope.
    pub fn try_new() -> Result<Self> {
        Ok(Self {
            ctx: pcsc::Context::establish(Scope::User)?,
        })
    }

    /// Lists names of the readers connected.
    pub fn readers(&self) -> Result<Vec<String>> {
        let mut buf = [0u8; 2048];

        Ok(self
            .ctx
            .list_readers(&mut buf)?
            .map(|name| name.to_string_lossy().into_owned())
            .collect())
    }

    /// Finds the first PC/SC device.
    pub fn open(&self) -> Result<Device> {
        let mut buf = [0u8; 2048];

        Ok(Device::new(
            self.ctx
                .list_readers(&mut buf)?
                .next()
                .ok_or(Error::ReaderNotFound)?,
        ))
    }

    /// Finds the PC/SC device whose name contains the string.
    pub fn open_by_name(&self, name: &str) -> Result<Device> {
        let mut buf = [0u8; 2048];

        Ok(Device::new(
            self.ctx
                .list_readers(&mut buf)?
                .find(|reader| reader.to_string_lossy().contains(name))
                .ok_or(Error::ReaderNotFound)?,
        ))
    }
}

/// PC/SC device handle.
pub struct Device {
    reader: CString,
}

impl Device {
    fn new(reader: &CStr) -> Self {
        debug!("Using device: {}", reader.to_str().unwrap_or_default());

        Self {
            reader: reader.to_owned(),
        }
    }

    /// Gets the name of the reader.
    pub fn name(&self) -> String {
        self.reader.to_string_lossy().into_owned()
    }

    /// Creates a transport to the card to be touched to the device.
    pub fn into_transport(self, ctx: Context) -> PcscTransport {
        PcscTransport {
            ctx: ctx.ctx,
            reader: self.reader,
            card: None,
            timeout: DEFAULT_TIMEOUT,
        }
    }
}

/// A transport to the card through PC/SC.
///
/// PC/SC has no timeout for each transmission, so the timeout bounds waiting for the card
/// to be touched on connecting.
pub struct PcscTransport {
    ctx: pcsc::Context,
    reader: CString,
    card: Option<pcsc::Card>,
    timeout: Duration,
}

impl PcscTransport {
    /// Waits for a card touched to the reader for the timeout at most, polling for each second.
    fn wait_for_card(&self) -> Result<pcsc::Card> {
        debug!("Waiting for a card");

        let card = retry(
            self.timeout,
            POLL_INTERVAL,
            || {
                self.ctx
                    .connect(&self.reader, ShareMode::Shared, Protocols::ANY)
            },
            |e| {
                let pending = matches!(e, pcsc::Error::NoSmartcard | pcsc::Error::RemovedCard);
                if pending {
                    info!("Still waiting for your card...");
                }

                pending
            },
            sleep,
        )?;

        debug!("Connected to your card");

        Ok(card)
    }
}

impl Transport for PcscTransport {
    fn connect(&mut self) -> std::result::Result<(), TransportError> {
        let card = self
            .wait_for_card()
            .map_err(TransportError::exchange)?;

        self.card = Some(card);

        Ok(())
    }

    fn close(&mut self) -> std::result::Result<(), TransportError> {
        match self.card.take() {
            Some(card) => card
                .disconnect(Disposition::LeaveCard)
                .map_err(|(_, e)| TransportError::exchange(Error::PcscError(e))),
            None => Ok(()),
        }
    }

    fn exchange(&mut self, command: &[u8]) -> std::result::Result<Vec<u8>, TransportError> {
        let card = self.card.as_ref().ok_or(TransportError::NotConnected)?;

        let mut rx = [0u8; MAX_BUFFER_SIZE];
        let rx = card
            .transmit(command, &mut rx)
            .map_err(|e| TransportError::exchange(Error::PcscError(e)))?;

        Ok(Vec::from(rx))
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }
}

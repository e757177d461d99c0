//! Diagnostic log sinks injected into the card session.
//!
//! The messages are for humans only; nothing in this crate reads them back.
//! Secrets and data read from the card are never written to a sink.

use std::cell::RefCell;

#[cfg(feature = "tracing")]
#[allow(unused_imports)]
pub(crate) use tracing::{debug, info};

#[cfg(not(feature = "tracing"))]
macro_rules! debug {
    ($($t: tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
macro_rules! info {
    ($($t: tt)*) => {};
}

#[cfg(not(feature = "tracing"))]
pub(crate) use debug;

#[cfg(not(feature = "tracing"))]
#[allow(unused_imports)]
pub(crate) use info;

/// An append-only sink of log messages.
pub trait Logger {
    /// Appends the message to the end of the log.
    fn put(&self, message: &str);
}

/// A sink keeping every message in memory, in order.
///
/// Callers observe the log by taking a snapshot, or by polling [`LogBuffer::since`] with the
/// number of messages they have already seen.
#[derive(Debug, Default)]
pub struct LogBuffer {
    entries: RefCell<Vec<String>>,
}

impl LogBuffer {
    /// Creates an empty buffer.
    pub fn new() -> Self {
        Default::default()
    }

    /// Copies all messages appended so far.
    pub fn entries(&self) -> Vec<String> {
        self.entries.borrow().clone()
    }

    /// Copies the messages appended after the first `cursor` ones.
    pub fn since(&self, cursor: usize) -> Vec<String> {
        self.entries
            .borrow()
            .get(cursor..)
            .map(<[String]>::to_vec)
            .unwrap_or_default()
    }

    /// Counts the messages appended so far.
    pub fn len(&self) -> usize {
        self.entries.borrow().len()
    }

    /// Determines whether no message has been appended yet.
    pub fn is_empty(&self) -> bool {
        self.entries.borrow().is_empty()
    }
}

impl Logger for LogBuffer {
    fn put(&self, message: &str) {
        self.entries.borrow_mut().push(message.to_owned());
    }
}

/// A sink discarding every message.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullLogger;

impl Logger for NullLogger {
    fn put(&self, _: &str) {}
}

/// A sink forwarding every message to `tracing` at the info level.
#[cfg(feature = "tracing")]
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLogger;

#[cfg(feature = "tracing")]
impl Logger for TracingLogger {
    fn put(&self, message: &str) {
        info!(target: "myna", "{}", message);
    }
}

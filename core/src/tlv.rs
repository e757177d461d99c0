//! BER-TLV support for the records stored in the card.
//!
//! The card stores each record as a constructed frame (e.g. `FF 20 ...`) whose value is a
//! concatenation of primitive frames (`DF 21 ...`, `DF 22 ...`). Tags are reported by their
//! number, so `DF 22` and a bare `22` both decode to tag `0x22`.

use std::borrow::Cow;

use crate::ParseError;

/// Maximum number of octets following the first octet of a long-form length.
const MAX_LENGTH_OCTETS: u8 = 4;

/// Stateful reader over a buffer, returning `None` once the buffer runs out.
struct Reader<'a> {
    buffer: &'a [u8],
    cursor: usize,
}

impl<'a> Reader<'a> {
    fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, cursor: 0 }
    }

    /// Reads a next octet and seeks the cursor.
    fn next(&mut self) -> Option<u8> {
        let byte = *self.buffer.get(self.cursor)?;
        self.cursor += 1;
        Some(byte)
    }

    /// Reads the tag number at the current position, seeking the cursor.
    fn read_tag(&mut self) -> Option<u32> {
        let first = self.next()?;
        if first & 0x1f != 0x1f {
            return Some(first as u32);
        }

        let mut tag = 0u32;
        loop {
            let byte = self.next()?;
            tag = (tag << 7) | (byte & 0x7f) as u32;

            if byte & 0x80 == 0 {
                return Some(tag);
            }
        }
    }

    /// Reads the length of data at the current position, seeking the cursor.
    fn read_length(&mut self) -> Result<usize, ParseError> {
        let head = self.next().ok_or(ParseError::IncompleteHeader)?;
        if head & 0x80 == 0 {
            return Ok(head as usize);
        }

        let count = head & 0x7f;
        if count == 0 || count > MAX_LENGTH_OCTETS {
            return Err(ParseError::UnsupportedLength(count));
        }

        let mut size = 0usize;
        for _ in 0..count {
            size <<= 8;
            size |= self.next().ok_or(ParseError::IncompleteHeader)? as usize;
        }

        Ok(size)
    }
}

/// Tag and declared length of a frame, with the octets they occupy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Header {
    pub tag: u32,
    pub length: usize,
    pub size: usize,
}

impl Header {
    /// Reads the header at the head of the buffer.
    pub fn read(buffer: &[u8]) -> Result<Self, ParseError> {
        let mut reader = Reader::new(buffer);
        let tag = reader.read_tag().ok_or(ParseError::IncompleteHeader)?;
        let length = reader.read_length()?;

        Ok(Self {
            tag,
            length,
            size: reader.cursor,
        })
    }

    /// Size of the entire frame: the header and the declared content.
    pub fn frame_size(&self) -> usize {
        self.size.saturating_add(self.length)
    }
}

/// A frame decoded from a buffer.
///
/// `size` always equals the header size plus `length`, even if the buffer was too short to
/// contain the value and `value` is `None`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Frame<'a> {
    pub tag: u32,
    pub length: usize,
    pub size: usize,
    pub value: Option<&'a [u8]>,
}

impl<'a> Frame<'a> {
    /// Octets occupied by the tag and the length.
    pub fn header_size(&self) -> usize {
        self.size - self.length
    }

    /// Determines whether the buffer ended before the declared value did.
    pub fn is_truncated(&self) -> bool {
        self.value.is_none()
    }

    /// Decodes the value as a sequence of child frames.
    /// A truncated frame has no children.
    pub fn children(&self) -> Frames<'a> {
        Frames::new(self.value.unwrap_or_default())
    }

    /// Reads the value as a string, replacing invalid sequences.
    pub fn value_str(&self) -> Option<Cow<'a, str>> {
        self.value.map(String::from_utf8_lossy)
    }

    /// Gets the value, failing if the frame is truncated.
    pub fn require_value(&self) -> Result<&'a [u8], ParseError> {
        self.value.ok_or(ParseError::Truncated {
            expected: self.size,
            actual: 0,
        })
    }
}

/// Sequence of frames in a buffer.
///
/// Iteration stops once the buffer is exhausted, a header cannot be read entirely, or a
/// truncated frame has been yielded. Cloning the sequence restarts from the same position.
#[derive(Debug, Clone)]
pub struct Frames<'a> {
    buffer: &'a [u8],
    cursor: usize,
}

impl<'a> Frames<'a> {
    /// Starts decoding frames at the head of the buffer.
    pub fn new(buffer: &'a [u8]) -> Self {
        Self { buffer, cursor: 0 }
    }

    /// Number of octets consumed by the frames yielded so far.
    pub fn consumed(&self) -> usize {
        self.cursor
    }

    /// Octets not consumed yet.
    pub fn remainder(&self) -> &'a [u8] {
        &self.buffer[self.cursor..]
    }

    /// Rewinds to the head of the buffer.
    pub fn restart(&mut self) {
        self.cursor = 0;
    }
}

impl<'a> Iterator for Frames<'a> {
    type Item = Frame<'a>;

    fn next(&mut self) -> Option<Self::Item> {
        let rest = self.remainder();
        if rest.is_empty() {
            return None;
        }

        let header = Header::read(rest).ok()?;
        let size = header.size.checked_add(header.length)?;
        let value = rest.get(header.size..size);

        self.cursor += match value {
            Some(_) => size,
            None => rest.len(),
        };

        Some(Frame {
            tag: header.tag,
            length: header.length,
            size,
            value,
        })
    }
}

/// Decodes the buffer into a sequence of frames.
pub fn frames(buffer: &[u8]) -> Frames<'_> {
    Frames::new(buffer)
}

/// Decodes the first frame in the buffer, failing if it is not contained entirely.
pub fn first(buffer: &[u8]) -> Result<Frame<'_>, ParseError> {
    let header = Header::read(buffer)?;
    let frame = frames(buffer).next().ok_or(ParseError::IncompleteHeader)?;

    match frame.value {
        Some(_) => Ok(frame),
        None => Err(ParseError::Truncated {
            expected: header.frame_size(),
            actual: buffer.len(),
        }),
    }
}

/// Calculates entire size of the first frame from the partial buffer of them.
pub fn entire_size_from_partial(header: &[u8]) -> Result<usize, ParseError> {
    Header::read(header).map(|h| h.frame_size())
}

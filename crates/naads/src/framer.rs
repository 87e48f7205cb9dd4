//! Signature based message framing for the NAADS TCP stream.
//!
//! The upstream protocol has no length prefix. A message starts at the byte
//! sequence `<alert` and ends after `</alert>`; everything outside those
//! markers (XML prolog, keep-alive padding) is discarded.
//!
//! Only freshly read bytes are scanned, plus a short overlap with the
//! previous read so that markers split across two reads are still found.

use bytes::{Buf, Bytes, BytesMut};

/// Byte sequence signifying the start of a message
pub const START_MARKER: &[u8] = b"<alert";

/// Byte sequence signifying the end of a message
pub const END_MARKER: &[u8] = b"</alert>";

/// Largest message the protocol will send (5 MiB)
pub const MAX_MESSAGE_SIZE: usize = 5 * 1024 * 1024;

/// Read buffer size; larger than [`MAX_MESSAGE_SIZE`] so a single message
/// always fits one read.
pub const CHUNK_SIZE: usize = 6 * 1024 * 1024;

const OVERLAP: usize = END_MARKER.len() - 1;

/// A complete framed message, from `<alert` through `</alert>` inclusive.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Message(Bytes);

impl Message {
    /// The whole message including both markers
    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Bytes strictly between the start and end markers
    pub fn body(&self) -> &[u8] {
        &self.0[START_MARKER.len()..self.0.len() - END_MARKER.len()]
    }

    /// Element content, i.e. the body without the rest of the opening tag
    pub fn inner(&self) -> &[u8] {
        let body = self.body();
        match body.iter().position(|b| *b == b'>') {
            Some(i) => &body[i + 1..],
            None => body,
        }
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn into_bytes(self) -> Bytes {
        self.0
    }
}

/// Output of [`Framer::push`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// A complete message ready for parsing
    Complete(Message),
    /// A partial message was abandoned, either because a new start marker
    /// arrived first or because it outgrew the size limit
    Truncated { discarded: usize },
}

/// Incremental framer holding the accumulator across reads.
#[derive(Debug)]
pub struct Framer {
    buf: BytesMut,
    in_message: bool,
    max_message_size: usize,
}

impl Default for Framer {
    fn default() -> Self {
        Self::new()
    }
}

impl Framer {
    pub fn new() -> Self {
        Self::with_max_message_size(MAX_MESSAGE_SIZE)
    }

    pub fn with_max_message_size(max_message_size: usize) -> Self {
        Self {
            buf: BytesMut::new(),
            in_message: false,
            max_message_size,
        }
    }

    /// Whether a message has started but not yet completed.
    pub fn in_message(&self) -> bool {
        self.in_message
    }

    /// Bytes currently held in the accumulator.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Drop any partial message, e.g. after the connection was lost.
    pub fn reset(&mut self) {
        self.buf.clear();
        self.in_message = false;
    }

    /// Feed the bytes of one read and collect every frame they complete.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Frame> {
        let mut frames = Vec::new();
        if chunk.is_empty() {
            return frames;
        }

        let mut scan = if self.in_message {
            self.buf.len().saturating_sub(OVERLAP).max(START_MARKER.len())
        } else {
            0
        };
        self.buf.extend_from_slice(chunk);

        loop {
            if !self.in_message {
                match find(&self.buf[scan..], START_MARKER) {
                    Some(i) => {
                        self.buf.advance(scan + i);
                        self.in_message = true;
                        scan = START_MARKER.len();
                    }
                    None => {
                        // keep a tail that could hold the first half of a marker
                        let keep = START_MARKER.len() - 1;
                        if self.buf.len() > keep {
                            let excess = self.buf.len() - keep;
                            self.buf.advance(excess);
                        }
                        break;
                    }
                }
            }

            let window = &self.buf[scan..];
            let end = find(window, END_MARKER).map(|i| scan + i);
            let limit = end.map_or(window.len(), |e| e - scan);
            let restart = find(&window[..limit], START_MARKER).map(|i| scan + i);

            if let Some(r) = restart {
                self.buf.advance(r);
                frames.push(Frame::Truncated { discarded: r });
                scan = START_MARKER.len();
                continue;
            }

            match end {
                Some(e) => {
                    let message = self.buf.split_to(e + END_MARKER.len()).freeze();
                    frames.push(Frame::Complete(Message(message)));
                    self.in_message = false;
                    scan = 0;
                }
                None => {
                    if self.buf.len() > self.max_message_size {
                        frames.push(Frame::Truncated {
                            discarded: self.buf.len(),
                        });
                        self.reset();
                    }
                    break;
                }
            }
        }

        frames
    }
}

fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    if haystack.len() < needle.len() {
        return None;
    }
    haystack.windows(needle.len()).position(|w| w == needle)
}

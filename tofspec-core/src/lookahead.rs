//! One-record lookahead buffer that filters out-of-order timestamps.
//!
//! # Problem
//! The digitiser occasionally writes a corrupted timetag into an otherwise
//! time-ordered list, observed as a large backward jump. Comparing each gamma
//! against such a value would desynchronise the whole run.
//!
//! # Solution
//! Each stream is read through a [`LookaheadBuffer`] with two slots:
//! `current` (published, used for comparisons) and `next` (read but not yet
//! published). A freshly read record is only shifted in if its timestamp is
//! not earlier than the buffered `next`; otherwise it is logged as a
//! [`Glitch`] and dropped. The published value is therefore always one
//! confirmed step behind the read head.

use crate::record::{Stream, Timestamped};
use serde::Serialize;

/// Outcome of a single [`LookaheadBuffer::advance`] call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Advance {
    /// A new record was read; the old lookahead moved into `current`.
    Shifted,
    /// The source ran dry; the last lookahead record moved into `current`.
    Drained,
    /// No record is left to publish.
    Exhausted,
}

/// A record discarded because its timestamp went backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Glitch {
    /// Stream the record was read from.
    pub stream: Stream,
    /// Offending timestamp (ps).
    pub time: u64,
    /// Buffered lookahead timestamp it fell behind (ps).
    pub previous: u64,
}

/// Double-buffered reader state for one time-ordered stream.
#[derive(Debug, Clone)]
pub struct LookaheadBuffer<T> {
    stream: Stream,
    current: Option<T>,
    next: Option<T>,
    exhausted: bool,
    glitches: Vec<Glitch>,
}

impl<T: Timestamped> LookaheadBuffer<T> {
    /// Creates an empty buffer for `stream`.
    #[must_use]
    pub fn new(stream: Stream) -> Self {
        Self {
            stream,
            current: None,
            next: None,
            exhausted: false,
            glitches: Vec::new(),
        }
    }

    /// Reads the next in-order record from `source` and shifts it in.
    ///
    /// Records earlier than the buffered lookahead are discarded and the read
    /// is retried. When the source ends, the lookahead record is published one
    /// last time; after that every call returns [`Advance::Exhausted`].
    ///
    /// # Errors
    /// Propagates the first error yielded by `source`. The buffer is left
    /// unchanged in that case.
    pub fn advance<I, E>(&mut self, source: &mut I) -> Result<Advance, E>
    where
        I: Iterator<Item = Result<T, E>> + ?Sized,
    {
        if self.exhausted {
            self.current = None;
            return Ok(Advance::Exhausted);
        }

        loop {
            let Some(record) = source.next() else {
                self.exhausted = true;
                self.current = self.next.take();
                return Ok(if self.current.is_some() {
                    Advance::Drained
                } else {
                    Advance::Exhausted
                });
            };
            let record = record?;

            if let Some(next) = &self.next {
                if record.time() < next.time() {
                    let glitch = Glitch {
                        stream: self.stream,
                        time: record.time(),
                        previous: next.time(),
                    };
                    log::warn!(
                        "discarding {} record: time {} ps precedes {} ps",
                        glitch.stream,
                        glitch.time,
                        glitch.previous
                    );
                    self.glitches.push(glitch);
                    continue;
                }
            }

            self.current = self.next.replace(record);
            return Ok(Advance::Shifted);
        }
    }

    /// The published record, if any.
    #[inline]
    #[must_use]
    pub fn current(&self) -> Option<&T> {
        self.current.as_ref()
    }

    /// The lookahead record, if any.
    #[inline]
    #[must_use]
    pub fn next(&self) -> Option<&T> {
        self.next.as_ref()
    }

    /// Returns true once `current` holds a confirmed record.
    #[inline]
    #[must_use]
    pub fn is_primed(&self) -> bool {
        self.current.is_some()
    }

    /// Returns true once the source has ended.
    #[inline]
    #[must_use]
    pub fn is_exhausted(&self) -> bool {
        self.exhausted
    }

    /// Returns true once the source has ended and nothing is left to publish.
    #[inline]
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.exhausted && self.current.is_none()
    }

    /// Records discarded so far.
    #[must_use]
    pub fn glitches(&self) -> &[Glitch] {
        &self.glitches
    }

    /// Which stream this buffer reads.
    #[must_use]
    pub fn stream(&self) -> Stream {
        self.stream
    }
}

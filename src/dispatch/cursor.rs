//! Argument stream
//!
//! The normal world passes `service_id, arg0, arg1, ...` as one untyped
//! stream of words. [`ArgumentCursor`] reads it in order and releases it when
//! dropped, so rejection paths cannot leave it open.

use crate::config::Word;

/// An untyped stream of argument words.
pub trait ArgSource {
    /// Read the next word. Reading past the end yields 0.
    fn next_word(&mut self) -> Word;

    /// Words left in the stream.
    fn remaining(&self) -> usize;

    /// Close the stream. Called exactly once by [`ArgumentCursor`].
    fn release(&mut self) {}
}

impl<S: ArgSource + ?Sized> ArgSource for &mut S {
    fn next_word(&mut self) -> Word {
        (**self).next_word()
    }

    fn remaining(&self) -> usize {
        (**self).remaining()
    }

    fn release(&mut self) {
        (**self).release()
    }
}

/// Argument stream backed by a slice of words.
#[derive(Debug, Clone)]
pub struct SliceArgs<'a> {
    words: &'a [Word],
    pos: usize,
    released: bool,
}

impl<'a> SliceArgs<'a> {
    pub const fn new(words: &'a [Word]) -> Self {
        Self {
            words,
            pos: 0,
            released: false,
        }
    }

    /// Words read so far.
    pub fn consumed(&self) -> usize {
        self.pos
    }

    pub fn is_released(&self) -> bool {
        self.released
    }
}

impl ArgSource for SliceArgs<'_> {
    fn next_word(&mut self) -> Word {
        match self.words.get(self.pos) {
            Some(&word) => {
                self.pos += 1;
                word
            }
            None => 0,
        }
    }

    fn remaining(&self) -> usize {
        if self.released {
            0
        } else {
            self.words.len() - self.pos
        }
    }

    fn release(&mut self) {
        self.released = true;
    }
}

/// Ordered reader over an [`ArgSource`] with guaranteed release.
pub struct ArgumentCursor<S: ArgSource> {
    source: S,
    consumed: usize,
    drained: bool,
}

impl<S: ArgSource> ArgumentCursor<S> {
    pub fn new(source: S) -> Self {
        Self {
            source,
            consumed: 0,
            drained: false,
        }
    }

    /// Read the next word in source order.
    #[inline]
    pub fn take(&mut self) -> Word {
        debug_assert!(!self.drained, "argument stream read after release");
        if self.drained {
            return 0;
        }
        self.consumed += 1;
        self.source.next_word()
    }

    pub fn remaining(&self) -> usize {
        if self.drained {
            0
        } else {
            self.source.remaining()
        }
    }

    pub fn consumed(&self) -> usize {
        self.consumed
    }

    /// Release the stream. Later calls do nothing.
    pub fn drain(&mut self) {
        if !self.drained {
            self.drained = true;
            self.source.release();
        }
    }

    pub fn is_drained(&self) -> bool {
        self.drained
    }
}

impl<S: ArgSource> Drop for ArgumentCursor<S> {
    fn drop(&mut self) {
        self.drain();
    }
}

//! Argument marshaling

use crate::config::{Word, MAX_FORWARDED_ARGS, REGISTER_ARGS};
use crate::security::Zeroize;

use super::cursor::{ArgSource, ArgumentCursor};

/// Words staged for one service call, in source order.
///
/// Cleared when dropped.
pub struct ArgumentFrame {
    words: [Word; MAX_FORWARDED_ARGS],
    len: usize,
}

impl ArgumentFrame {
    pub const fn empty() -> Self {
        Self {
            words: [0; MAX_FORWARDED_ARGS],
            len: 0,
        }
    }

    /// Stage `words` directly. Returns None if there are too many.
    pub fn from_words(words: &[Word]) -> Option<Self> {
        if words.len() > MAX_FORWARDED_ARGS {
            return None;
        }
        let mut frame = Self::empty();
        frame.words[..words.len()].copy_from_slice(words);
        frame.len = words.len();
        Some(frame)
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn as_slice(&self) -> &[Word] {
        &self.words[..self.len]
    }

    /// Words passed in argument registers.
    pub fn registers(&self) -> &[Word] {
        &self.as_slice()[..self.len.min(REGISTER_ARGS)]
    }

    /// Words passed on the stack, in order.
    pub fn spill(&self) -> &[Word] {
        &self.as_slice()[self.len.min(REGISTER_ARGS)..]
    }
}

impl Drop for ArgumentFrame {
    fn drop(&mut self) {
        self.words.zeroize();
    }
}

/// Copy exactly `count` words from the cursor into a frame.
///
/// The caller has already checked `count <= MAX_FORWARDED_ARGS` and that the
/// stream holds `count` words.
pub fn marshal<S: ArgSource>(cursor: &mut ArgumentCursor<S>, count: usize) -> ArgumentFrame {
    debug_assert!(count <= MAX_FORWARDED_ARGS);
    let count = count.min(MAX_FORWARDED_ARGS);

    let mut frame = ArgumentFrame::empty();
    for slot in &mut frame.words[..count] {
        *slot = cursor.take();
    }
    frame.len = count;
    frame
}

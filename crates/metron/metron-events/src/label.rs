//! Fixed-capacity inline strings for record labels and contexts.
//!
//! Records are `Copy` and live in pre-allocated ring slots, so label text
//! must be stored inline with a hard bound. Overlong input is truncated at
//! a UTF-8 character boundary, never reallocated.

use std::fmt;

/// Inline capacity in bytes. Usable text is at most `MAX_LABEL_LEN - 1`
/// bytes, mirroring the terminator byte of the on-disk formats.
pub const MAX_LABEL_LEN: usize = 64;

/// A bounded inline string.
#[derive(Clone, Copy, PartialEq, Eq)]
#[repr(C)]
pub struct Label {
    bytes: [u8; MAX_LABEL_LEN],
    len: u8,
}

impl Label {
    pub const EMPTY: Label = Label {
        bytes: [0; MAX_LABEL_LEN],
        len: 0,
    };

    /// Copies `s` in, truncating to the capacity at a char boundary.
    pub fn new(s: &str) -> Label {
        let mut bytes = [0u8; MAX_LABEL_LEN];
        let mut len = s.len().min(MAX_LABEL_LEN - 1);
        while len > 0 && !s.is_char_boundary(len) {
            len -= 1;
        }
        bytes[..len].copy_from_slice(&s.as_bytes()[..len]);
        Label {
            bytes,
            len: len as u8,
        }
    }

    /// Formats directly into the inline buffer, truncating on overflow.
    /// No heap allocation.
    pub fn format(args: fmt::Arguments<'_>) -> Label {
        let mut w = LabelWriter {
            bytes: [0u8; MAX_LABEL_LEN],
            len: 0,
        };
        // Writes into a fixed buffer never fail; overflow truncates.
        let _ = fmt::Write::write_fmt(&mut w, args);
        Label {
            bytes: w.bytes,
            len: w.len as u8,
        }
    }

    #[inline]
    pub fn as_str(&self) -> &str {
        // len always lands on a char boundary by construction.
        std::str::from_utf8(&self.bytes[..self.len as usize]).unwrap_or("")
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.len as usize
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for Label {
    fn default() -> Self {
        Label::EMPTY
    }
}

impl From<&str> for Label {
    fn from(s: &str) -> Self {
        Label::new(s)
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Label({:?})", self.as_str())
    }
}

struct LabelWriter {
    bytes: [u8; MAX_LABEL_LEN],
    len: usize,
}

impl fmt::Write for LabelWriter {
    fn write_str(&mut self, s: &str) -> fmt::Result {
        if self.len >= MAX_LABEL_LEN - 1 {
            return Ok(());
        }
        let avail = MAX_LABEL_LEN - 1 - self.len;
        let mut take = s.len().min(avail);
        while take > 0 && !s.is_char_boundary(take) {
            take -= 1;
        }
        self.bytes[self.len..self.len + take].copy_from_slice(&s.as_bytes()[..take]);
        self.len += take;
        Ok(())
    }
}

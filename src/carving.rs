use memchr::memmem;

use crate::types::{ByteRange, Offset};

/// Stateless header/footer matcher over a byte buffer.
///
/// Each `carve` call runs a two-state machine with a single
/// left-to-right cursor: find the next header, then find the next
/// footer past it, emit the enclosing range, resume after the footer.
/// A header with no following footer in the buffer is dropped, so an
/// artifact split across scan windows is never matched. The machine
/// keeps no state between calls.
pub struct SignatureCarver {
    header: Vec<u8>,
    footer: Vec<u8>,
}

impl SignatureCarver {
    pub fn new(header: impl Into<Vec<u8>>, footer: impl Into<Vec<u8>>) -> Self {
        Self {
            header: header.into(),
            footer: footer.into(),
        }
    }

    /// Scans `buffer` and returns matched ranges translated by
    /// `base_offset` into device-absolute positions, in left-to-right
    /// order.
    pub fn carve(&self, buffer: &[u8], base_offset: Offset) -> Vec<ByteRange> {
        let header = memmem::Finder::new(&self.header);
        let footer = memmem::Finder::new(&self.footer);

        let mut ranges = Vec::new();
        let mut cursor = 0usize;

        while cursor < buffer.len() {
            let h = match header.find(&buffer[cursor..]) {
                Some(rel) => cursor + rel,
                None => break,
            };

            let footer_from = h + self.header.len();
            if footer_from >= buffer.len() {
                break;
            }

            let f = match footer.find(&buffer[footer_from..]) {
                Some(rel) => footer_from + rel,
                None => break,
            };

            let end = f + self.footer.len();
            ranges.push(ByteRange::new(
                base_offset + h as u64,
                base_offset + end as u64,
            ));
            cursor = end;
        }

        ranges
    }
}

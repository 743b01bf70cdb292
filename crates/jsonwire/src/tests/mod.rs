//! Cross-cutting tests exercising both layers together.

mod stream_values;
mod token_stream;

use std::io;

/// A pathological source that yields one byte per read call.
pub(crate) struct OneByteReader<'a> {
    data: &'a [u8],
    pos: usize,
}

impl<'a> OneByteReader<'a> {
    pub(crate) fn new(data: &'a [u8]) -> OneByteReader<'a> {
        OneByteReader { data, pos: 0 }
    }
}

impl io::Read for OneByteReader<'_> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if self.pos >= self.data.len() || buf.is_empty() {
            return Ok(0);
        }
        buf[0] = self.data[self.pos];
        self.pos += 1;
        Ok(1)
    }
}

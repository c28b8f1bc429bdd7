//! Byte sinks the writer streams into
//!
//! A [`ByteSink`] is a [`std::io::Write`] with an explicit end of stream.
//! `end` flushes and signals completion downstream, `close` tears the sink
//! down without a completion signal. Writes after either fail with
//! [`std::io::ErrorKind::BrokenPipe`].

use std::io::{self, Write};

mod buffer;
mod length;

pub use buffer::CoalescingBuffer;
pub use length::LengthSink;

pub trait ByteSink: Write {
    /// Flush everything written so far and signal end of stream
    fn end(&mut self) -> io::Result<()>;

    /// Stop accepting writes; idempotent
    fn close(&mut self);
}

impl ByteSink for Vec<u8> {
    fn end(&mut self) -> io::Result<()> {
        Ok(())
    }

    fn close(&mut self) {}
}

impl<S: ByteSink + ?Sized> ByteSink for Box<S> {
    fn end(&mut self) -> io::Result<()> {
        (**self).end()
    }

    fn close(&mut self) {
        (**self).close()
    }
}

pub(crate) fn closed_error() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "the stream has already been closed")
}

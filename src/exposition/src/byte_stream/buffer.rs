use std::io::{self, Write};

use super::{ByteSink, closed_error};

/// Batches small writes and forwards them downstream in chunks of at least
/// `threshold` bytes.
#[derive(Debug)]
pub struct CoalescingBuffer<S: ByteSink> {
    sink: S,
    buffer: Vec<u8>,
    threshold: usize,
    writable: bool,
    closed: bool,
}

impl<S: ByteSink> CoalescingBuffer<S> {
    pub fn new(sink: S, threshold: usize) -> Self {
        Self {
            sink,
            buffer: Vec::with_capacity(threshold),
            threshold,
            writable: true,
            closed: false,
        }
    }

    pub fn get_ref(&self) -> &S {
        &self.sink
    }

    /// Number of bytes held back from the downstream sink
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    fn flush_buffer(&mut self) -> io::Result<()> {
        if self.buffer.is_empty() {
            return Ok(());
        }
        let result = self.sink.write_all(&self.buffer);
        self.buffer.clear();
        result
    }
}

impl<S: ByteSink> Write for CoalescingBuffer<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if !self.writable {
            return Err(closed_error());
        }
        self.buffer.extend_from_slice(buf);
        if self.buffer.len() >= self.threshold {
            self.flush_buffer()?;
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.flush_buffer()?;
        self.sink.flush()
    }
}

impl<S: ByteSink> ByteSink for CoalescingBuffer<S> {
    fn end(&mut self) -> io::Result<()> {
        if !self.writable {
            return Err(closed_error());
        }
        self.writable = false;
        self.flush_buffer()?;
        self.sink.end()
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.writable = false;
        let _ = self.flush_buffer();
        self.sink.close();
    }
}

impl<S: ByteSink> Drop for CoalescingBuffer<S> {
    fn drop(&mut self) {
        self.close();
    }
}

use std::future::Future;
use std::io::{self, Write};

use tokio::sync::watch;

use super::{ByteSink, closed_error};

/// Counts written bytes without keeping them.
///
/// The final count is published once when the sink ends or closes; any number
/// of [`LengthSink::length`] futures resolve from that single assignment.
#[derive(Debug)]
pub struct LengthSink {
    length: u64,
    closed: bool,
    total: watch::Sender<Option<u64>>,
}

impl Default for LengthSink {
    fn default() -> Self {
        Self::new()
    }
}

impl LengthSink {
    pub fn new() -> Self {
        let (total, _) = watch::channel(None);
        Self {
            length: 0,
            closed: false,
            total,
        }
    }

    /// The final length, available once the sink is closed
    pub fn final_length(&self) -> Option<u64> {
        *self.total.borrow()
    }

    /// Resolves with the final length once the sink is closed.
    ///
    /// For waiters on another task or thread than the one writing; the writer
    /// itself reads [`LengthSink::final_length`] after ending the sink.
    pub fn length(&self) -> impl Future<Output = io::Result<u64>> + Send + 'static {
        let mut total = self.total.subscribe();
        async move {
            let length = total
                .wait_for(Option::is_some)
                .await
                .map_err(|_| closed_error())?;
            Ok((*length).unwrap_or_default())
        }
    }
}

impl Write for LengthSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        if self.closed {
            return Err(closed_error());
        }
        self.length += buf.len() as u64;
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ByteSink for LengthSink {
    fn end(&mut self) -> io::Result<()> {
        if self.closed {
            return Err(closed_error());
        }
        self.close();
        Ok(())
    }

    fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.total.send_replace(Some(self.length));
    }
}

impl Drop for LengthSink {
    fn drop(&mut self) {
        self.close();
    }
}

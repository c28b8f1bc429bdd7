//! Byte sinks connecting the blocking writer to the async response body

use std::io::{self, Write};

use bytes::Bytes;
use exposition::byte_stream::ByteSink;
use flate2::Compression;
use flate2::write::{DeflateEncoder, GzEncoder};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::negotiation::ContentEncoding;

fn broken_pipe() -> io::Error {
    io::Error::new(io::ErrorKind::BrokenPipe, "scrape response receiver went away")
}

/// Create a bounded pipe; the sink end must be driven from a blocking thread.
pub fn channel(capacity: usize) -> (PipeSink, ReceiverStream<io::Result<Bytes>>) {
    let (sender, receiver) = mpsc::channel(capacity);
    (
        PipeSink {
            sender: Some(sender),
        },
        ReceiverStream::new(receiver),
    )
}

/// Forwards every write as one chunk to the receiving stream.
///
/// Writes block while the channel is full. Dropping the receiver turns the
/// next write into [`io::ErrorKind::BrokenPipe`].
#[derive(Debug)]
pub struct PipeSink {
    sender: Option<mpsc::Sender<io::Result<Bytes>>>,
}

impl Write for PipeSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let Some(sender) = &self.sender else {
            return Err(broken_pipe());
        };
        if buf.is_empty() {
            return Ok(0);
        }
        if sender
            .blocking_send(Ok(Bytes::copy_from_slice(buf)))
            .is_err()
        {
            self.sender = None;
            return Err(broken_pipe());
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl ByteSink for PipeSink {
    fn end(&mut self) -> io::Result<()> {
        match self.sender.take() {
            Some(_) => Ok(()),
            None => Err(broken_pipe()),
        }
    }

    fn close(&mut self) {
        self.sender = None;
    }
}

/// Applies the negotiated content encoding in front of a sink
pub enum ResponseEncoder<S: ByteSink> {
    Identity(S),
    Gzip(GzEncoder<S>),
    Deflate(DeflateEncoder<S>),
}

impl<S: ByteSink> ResponseEncoder<S> {
    pub fn new(sink: S, encoding: ContentEncoding) -> Self {
        match encoding {
            ContentEncoding::Identity => ResponseEncoder::Identity(sink),
            ContentEncoding::Gzip => {
                ResponseEncoder::Gzip(GzEncoder::new(sink, Compression::default()))
            }
            ContentEncoding::Deflate => {
                ResponseEncoder::Deflate(DeflateEncoder::new(sink, Compression::default()))
            }
        }
    }

    fn sink_mut(&mut self) -> &mut S {
        match self {
            ResponseEncoder::Identity(sink) => sink,
            ResponseEncoder::Gzip(encoder) => encoder.get_mut(),
            ResponseEncoder::Deflate(encoder) => encoder.get_mut(),
        }
    }
}

impl<S: ByteSink> Write for ResponseEncoder<S> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            ResponseEncoder::Identity(sink) => sink.write(buf),
            ResponseEncoder::Gzip(encoder) => encoder.write(buf),
            ResponseEncoder::Deflate(encoder) => encoder.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            ResponseEncoder::Identity(sink) => sink.flush(),
            ResponseEncoder::Gzip(encoder) => encoder.flush(),
            ResponseEncoder::Deflate(encoder) => encoder.flush(),
        }
    }
}

impl<S: ByteSink> ByteSink for ResponseEncoder<S> {
    fn end(&mut self) -> io::Result<()> {
        match self {
            ResponseEncoder::Identity(_) => {}
            ResponseEncoder::Gzip(encoder) => encoder.try_finish()?,
            ResponseEncoder::Deflate(encoder) => encoder.try_finish()?,
        }
        self.sink_mut().end()
    }

    fn close(&mut self) {
        self.sink_mut().close();
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use flate2::read::{DeflateDecoder, GzDecoder};

    use super::*;

    fn drain(stream: ReceiverStream<io::Result<Bytes>>) -> Vec<u8> {
        let mut receiver = stream.into_inner();
        let mut out = Vec::new();
        while let Some(chunk) = receiver.blocking_recv() {
            out.extend_from_slice(&chunk.unwrap());
        }
        out
    }

    #[test]
    fn test_pipe_forwards_chunks_and_ends() {
        let (mut sink, stream) = channel(4);
        let writer = std::thread::spawn(move || {
            sink.write_all(b"# EOF").unwrap();
            sink.write_all(b"\n").unwrap();
            sink.end().unwrap();
            assert!(sink.write_all(b"late").is_err());
        });

        assert_eq!(drain(stream), b"# EOF\n");
        writer.join().unwrap();
    }

    #[test]
    fn test_dropped_receiver_breaks_pipe() {
        let (mut sink, stream) = channel(1);
        drop(stream);

        let err = sink.write_all(b"data").unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
        assert_eq!(sink.end().unwrap_err().kind(), io::ErrorKind::BrokenPipe);
    }

    #[test]
    fn test_close_drops_sender() {
        let (mut sink, stream) = channel(1);
        sink.close();
        assert!(drain(stream).is_empty());
        assert!(sink.write_all(b"x").is_err());
    }

    #[test]
    fn test_gzip_encoding() {
        let (sink, stream) = channel(4);
        let writer = std::thread::spawn(move || {
            let mut encoder = ResponseEncoder::new(sink, ContentEncoding::Gzip);
            encoder.write_all(b"metric 1\n# EOF\n").unwrap();
            encoder.end().unwrap();
        });

        let compressed = drain(stream);
        writer.join().unwrap();

        let mut decoded = String::new();
        GzDecoder::new(compressed.as_slice())
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, "metric 1\n# EOF\n");
    }

    #[test]
    fn test_raw_deflate_encoding() {
        let mut encoder = ResponseEncoder::new(Vec::new(), ContentEncoding::Deflate);
        encoder.write_all(b"# EOF\n").unwrap();
        encoder.end().unwrap();

        let ResponseEncoder::Deflate(encoder) = encoder else {
            panic!("expected deflate encoder");
        };
        let compressed = encoder.finish().unwrap();
        let mut decoded = String::new();
        DeflateDecoder::new(compressed.as_slice())
            .read_to_string(&mut decoded)
            .unwrap();
        assert_eq!(decoded, "# EOF\n");
    }
}

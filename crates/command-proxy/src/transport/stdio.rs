//! Duplex adapter over a separate reader and writer.

use std::io::{self, Read, Stdin, Stdout, Write};

/// Joins an independent reader and writer into one `Read + Write` stream.
///
/// One-shot mode uses this to run a session over the process's standard
/// input and output.
#[derive(Debug)]
pub struct DuplexStream<R, W> {
    reader: R,
    writer: W,
}

/// Duplex stream over the process's standard input and output.
pub type StdioStream = DuplexStream<Stdin, Stdout>;

impl<R, W> DuplexStream<R, W> {
    /// Joins `reader` and `writer`.
    pub const fn new(reader: R, writer: W) -> Self {
        Self { reader, writer }
    }

    /// Splits the stream back into its halves.
    pub fn into_parts(self) -> (R, W) {
        (self.reader, self.writer)
    }
}

impl StdioStream {
    /// Joins the process's standard input and output.
    #[must_use]
    pub fn stdio() -> Self {
        Self::new(io::stdin(), io::stdout())
    }
}

impl<R: Read, W> Read for DuplexStream<R, W> {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        self.reader.read(buf)
    }
}

impl<R, W: Write> Write for DuplexStream<R, W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.writer.write(buf)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.writer.flush()
    }
}

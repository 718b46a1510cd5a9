//! Buffered newline-delimited I/O over worker pipes.

use std::io::{self, BufRead, BufReader, BufWriter, Read, Write};

const BUFFER_SIZE: usize = 64 * 1024;

/// Reads one line at a time, stripping the line terminator.
pub struct LineReader<R> {
    reader: BufReader<R>,
    line: String,
}

impl<R: Read> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            reader: BufReader::with_capacity(BUFFER_SIZE, inner),
            line: String::with_capacity(4096),
        }
    }

    /// Next line, or `None` at end of stream.
    pub fn read_line(&mut self) -> io::Result<Option<&str>> {
        self.line.clear();
        loop {
            match self.reader.read_line(&mut self.line) {
                Ok(0) => return Ok(None),
                Ok(_) => break,
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(err),
            }
        }
        if self.line.ends_with('\n') {
            self.line.pop();
        }
        if self.line.ends_with('\r') {
            self.line.pop();
        }
        Ok(Some(&self.line))
    }
}

/// Writes whole lines and flushes after each one.
pub struct LineWriter<W: Write> {
    writer: BufWriter<W>,
}

impl<W: Write> LineWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: BufWriter::with_capacity(BUFFER_SIZE, inner),
        }
    }

    pub fn write_line(&mut self, line: &str) -> io::Result<()> {
        self.writer.write_all(line.as_bytes())?;
        if !line.ends_with('\n') {
            self.writer.write_all(b"\n")?;
        }
        self.writer.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lines_round_trip() {
        let mut buffer = Vec::new();
        {
            let mut writer = LineWriter::new(&mut buffer);
            writer.write_line("hello").expect("write");
            writer.write_line("world\n").expect("write");
            writer.write_line("").expect("write");
        }
        let mut reader = LineReader::new(buffer.as_slice());
        assert_eq!(reader.read_line().expect("read"), Some("hello"));
        assert_eq!(reader.read_line().expect("read"), Some("world"));
        assert_eq!(reader.read_line().expect("read"), Some(""));
        assert_eq!(reader.read_line().expect("read"), None);
    }

    #[test]
    fn crlf_is_stripped() {
        let mut reader = LineReader::new(&b"one\r\ntwo\n"[..]);
        assert_eq!(reader.read_line().expect("read"), Some("one"));
        assert_eq!(reader.read_line().expect("read"), Some("two"));
    }
}

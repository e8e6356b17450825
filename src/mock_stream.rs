use std::cell::RefCell;
use std::cmp::min;
use std::io::{Error, ErrorKind, Read, Result, Write};
use std::rc::Rc;

/// A scripted server: reads are served from `read_buf`, writes are captured in `written_buf`.
/// Reads past the end of the script report end-of-file.
#[derive(Debug, Default)]
pub struct MockStream {
    read_buf: Vec<u8>,
    read_pos: usize,
    pub written_buf: Vec<u8>,
    err_on_read: bool,
    read_delay: usize,
    shared_log: Option<Rc<RefCell<Vec<u8>>>>,
}

impl MockStream {
    pub fn new(read_buf: Vec<u8>) -> MockStream {
        MockStream::default().with_buf(read_buf)
    }

    pub fn with_buf(mut self, read_buf: Vec<u8>) -> MockStream {
        self.read_buf = read_buf;
        self
    }

    pub fn with_err(mut self) -> MockStream {
        self.err_on_read = true;
        self
    }

    /// Serve the first read one byte at a time.
    pub fn with_delay(mut self) -> MockStream {
        self.read_delay = 1;
        self
    }

    /// Also copy every write into `log`, which outlives the stream.
    pub fn with_shared_log(mut self, log: Rc<RefCell<Vec<u8>>>) -> MockStream {
        self.shared_log = Some(log);
        self
    }

    /// Everything written so far, split into CRLF-terminated lines (without the CRLF).
    pub fn written_lines(&self) -> Vec<String> {
        String::from_utf8_lossy(&self.written_buf)
            .split_terminator("\r\n")
            .map(String::from)
            .collect()
    }
}

impl Read for MockStream {
    fn read(&mut self, buf: &mut [u8]) -> Result<usize> {
        if self.err_on_read {
            return Err(Error::new(ErrorKind::Other, "MockStream Error"));
        }
        if self.read_pos >= self.read_buf.len() {
            return Ok(0);
        }
        let mut write_len = min(buf.len(), self.read_buf.len() - self.read_pos);
        if self.read_delay > 0 {
            self.read_delay -= 1;
            write_len = min(write_len, 1);
        }
        let max_pos = self.read_pos + write_len;
        buf[..write_len].copy_from_slice(&self.read_buf[self.read_pos..max_pos]);
        self.read_pos = max_pos;
        Ok(write_len)
    }
}

impl Write for MockStream {
    fn write(&mut self, buf: &[u8]) -> Result<usize> {
        self.written_buf.extend_from_slice(buf);
        if let Some(ref log) = self.shared_log {
            log.borrow_mut().extend_from_slice(buf);
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

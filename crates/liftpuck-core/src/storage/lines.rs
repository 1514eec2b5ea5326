use alloc::string::String;
use alloc::vec::Vec;

use super::BlockStorage;

const READ_CHUNK: usize = 256;

/// Reads a file line by line through bounded `read_at` calls.
///
/// Line terminators (`\n` and a preceding `\r`) are stripped. Invalid UTF-8
/// is replaced rather than rejected so one bad line cannot hide the rest.
pub struct Lines<'a, S: BlockStorage> {
    storage: &'a S,
    path: &'a str,
    offset: u64,
    buf: Vec<u8>,
    eof: bool,
}

impl<'a, S: BlockStorage> Lines<'a, S> {
    pub fn new(storage: &'a S, path: &'a str) -> Self {
        Self { storage, path, offset: 0, buf: Vec::new(), eof: false }
    }

    pub fn next_line(&mut self) -> Result<Option<String>, S::Error> {
        loop {
            if let Some(pos) = self.buf.iter().position(|b| *b == b'\n') {
                let rest = self.buf.split_off(pos + 1);
                let line = core::mem::replace(&mut self.buf, rest);
                return Ok(Some(decode(line)));
            }
            if self.eof {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                return Ok(Some(decode(core::mem::take(&mut self.buf))));
            }
            let mut chunk = [0u8; READ_CHUNK];
            let n = self.storage.read_at(self.path, self.offset, &mut chunk)?;
            if n == 0 {
                self.eof = true;
            } else {
                self.offset += n as u64;
                self.buf.extend_from_slice(&chunk[..n]);
            }
        }
    }
}

fn decode(mut line: Vec<u8>) -> String {
    if line.last() == Some(&b'\n') {
        line.pop();
    }
    if line.last() == Some(&b'\r') {
        line.pop();
    }
    match String::from_utf8(line) {
        Ok(s) => s,
        Err(e) => String::from_utf8_lossy(e.as_bytes()).into_owned(),
    }
}

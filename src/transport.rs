// Copyright (c) 2026 SBF-Debug Authors.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

use serde_json::Value;
use std::error::Error;
use std::io::{self, BufRead, BufReader, Write};

pub type TransportError = Box<dyn Error + Send + Sync>;

/// Content-Length framed JSON messages, as spoken by editor extensions.
pub struct FramedReader<R> {
    reader: R,
}

impl FramedReader<BufReader<io::Stdin>> {
    pub fn stdin() -> Self {
        Self::new(BufReader::new(io::stdin()))
    }
}

impl<R: BufRead> FramedReader<R> {
    pub fn new(reader: R) -> Self {
        Self { reader }
    }

    /// Next message, or `None` on a clean EOF between messages.
    pub fn read_message(&mut self) -> Result<Option<Value>, TransportError> {
        // Read headers until an empty line
        let mut content_length: Option<usize> = None;
        let mut saw_header = false;
        loop {
            let mut header_line = String::new();
            let n = self.reader.read_line(&mut header_line)?;
            if n == 0 {
                if saw_header {
                    return Err("EOF while reading header".into());
                }
                return Ok(None);
            }
            let header_trim = header_line.trim();
            if header_trim.is_empty() {
                if saw_header {
                    break; // end of headers
                }
                continue;
            }
            saw_header = true;
            if header_trim.to_lowercase().starts_with("content-length") {
                if let Some(idx) = header_trim.find(':') {
                    let num = header_trim[idx + 1..].trim();
                    content_length = Some(num.parse::<usize>()?);
                }
            }
            // ignore other headers
        }

        let len = content_length.ok_or("Missing Content-Length header")?;
        let mut buf = vec![0u8; len];
        self.reader.read_exact(&mut buf)?;
        let v: Value = serde_json::from_slice(&buf)?;
        Ok(Some(v))
    }
}

/// Serialize `msg` with its Content-Length header into `w`.
pub fn write_message<W: Write>(w: &mut W, msg: &Value) -> Result<(), TransportError> {
    let body = serde_json::to_vec(msg)?;
    write!(w, "Content-Length: {}\r\n\r\n", body.len())?;
    w.write_all(&body)?;
    w.flush()?;
    Ok(())
}

/// Helper to write a JSON `Value` to stdout using stdout's built-in lock.
///
/// Stdout is the protocol channel, so nothing else may print to it. The lock
/// is held for header, body and flush so concurrent writers cannot interleave.
pub fn write_json_locked(msg: &Value) -> Result<(), TransportError> {
    let stdout = io::stdout();
    let mut w = stdout.lock(); // Process-wide lock on stdout
    write_message(&mut w, msg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Cursor;

    fn frame(v: &Value) -> Vec<u8> {
        let mut out = Vec::new();
        write_message(&mut out, v).unwrap();
        out
    }

    #[test]
    fn reads_consecutive_messages_then_eof() {
        let mut bytes = frame(&json!({"req": "stop", "seq": 1}));
        bytes.extend(frame(&json!({"req": "continue", "seq": 2})));
        let mut reader = FramedReader::new(Cursor::new(bytes));

        assert_eq!(reader.read_message().unwrap().unwrap()["req"], "stop");
        assert_eq!(reader.read_message().unwrap().unwrap()["seq"], 2);
        assert!(reader.read_message().unwrap().is_none());
    }

    #[test]
    fn header_name_is_case_insensitive_and_extra_headers_ignored() {
        let body = br#"{"req":"stop","seq":5}"#;
        let mut bytes = format!(
            "content-length: {}\r\nContent-Type: application/json\r\n\r\n",
            body.len()
        )
        .into_bytes();
        bytes.extend_from_slice(body);
        let mut reader = FramedReader::new(Cursor::new(bytes));
        assert_eq!(reader.read_message().unwrap().unwrap()["seq"], 5);
    }

    #[test]
    fn missing_length_is_an_error() {
        let mut reader = FramedReader::new(Cursor::new(b"X-Other: 1\r\n\r\n{}".to_vec()));
        assert!(reader.read_message().is_err());
    }

    #[test]
    fn truncated_header_is_an_error() {
        let mut reader = FramedReader::new(Cursor::new(b"Content-Length: 10\r\n".to_vec()));
        assert!(reader.read_message().is_err());
    }
}

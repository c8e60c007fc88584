// JSON-RPC framing: `Content-Length: N\r\n\r\n` followed by N bytes of
// UTF-8 JSON, both directions.

use serde_json::Value;
use std::io::{BufRead, Read, Write};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed header: {0}")]
    MalformedHeader(String),
    #[error("missing Content-Length header")]
    MissingContentLength,
    #[error("invalid message payload: {0}")]
    Json(#[from] serde_json::Error),
}

/// Read one framed message. `Ok(None)` means clean end of stream.
pub fn read_message(reader: &mut impl BufRead) -> Result<Option<Value>, TransportError> {
    let mut content_length: Option<usize> = None;
    loop {
        let mut line = String::new();
        let n = reader.read_line(&mut line)?;
        if n == 0 {
            return Ok(None);
        }
        let line = line.trim_end();
        if line.is_empty() {
            break;
        }
        let (key, value) = line
            .split_once(':')
            .ok_or_else(|| TransportError::MalformedHeader(line.to_string()))?;
        if key.eq_ignore_ascii_case("Content-Length") {
            let parsed = value
                .trim()
                .parse::<usize>()
                .map_err(|_| TransportError::MalformedHeader(line.to_string()))?;
            content_length = Some(parsed);
        }
        // Other headers (Content-Type) are tolerated and ignored.
    }
    let len = content_length.ok_or(TransportError::MissingContentLength)?;
    let mut buf = vec![0u8; len];
    reader.read_exact(&mut buf)?;
    Ok(Some(serde_json::from_slice(&buf)?))
}

/// Write one framed message.
pub fn write_message(writer: &mut impl Write, message: &Value) -> Result<(), TransportError> {
    let body = serde_json::to_vec(message)?;
    write!(writer, "Content-Length: {}\r\n\r\n", body.len())?;
    writer.write_all(&body)?;
    writer.flush()?;
    Ok(())
}

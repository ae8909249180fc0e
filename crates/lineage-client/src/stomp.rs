//! Minimal STOMP 1.2 framing.
//!
//! ```text
//! COMMAND EOL
//! *( header EOL )
//! EOL
//! *OCTET            ; exactly content-length octets when the header is present
//! NUL
//! ```
//!
//! Decoding is incremental: [`decode_frame`] returns `Ok(None)` until a whole
//! frame is buffered. Bare EOLs between frames are heart-beats and skipped.

use nom::branch::alt;
use nom::bytes::streaming::{tag, take, take_until, take_while, take_while1};
use nom::multi::many_till;
use nom::sequence::{separated_pair, terminated};
use nom::IResult;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum StompError {
    #[error("malformed frame: {0}")]
    Malformed(String),

    #[error("invalid content-length `{0}`")]
    ContentLength(String),

    #[error("broker error: {0}")]
    Broker(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub command: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Frame {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((key.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// First value of `key`; repeated headers keep the first occurrence.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }

    pub fn body_str(&self) -> Result<&str, StompError> {
        std::str::from_utf8(&self.body).map_err(|e| StompError::Malformed(e.to_string()))
    }

    /// `CONNECT` and `CONNECTED` headers are sent verbatim.
    fn escapes_headers(&self) -> bool {
        !matches!(self.command.as_str(), "CONNECT" | "CONNECTED")
    }

    pub fn encode(&self) -> Vec<u8> {
        let escape = self.escapes_headers();
        let mut out = Vec::with_capacity(64 + self.body.len());
        out.extend_from_slice(self.command.as_bytes());
        out.push(b'\n');
        for (k, v) in &self.headers {
            if escape {
                out.extend_from_slice(escape_header(k).as_bytes());
                out.push(b':');
                out.extend_from_slice(escape_header(v).as_bytes());
            } else {
                out.extend_from_slice(k.as_bytes());
                out.push(b':');
                out.extend_from_slice(v.as_bytes());
            }
            out.push(b'\n');
        }
        if !self.body.is_empty() && self.get("content-length").is_none() {
            out.extend_from_slice(format!("content-length:{}\n", self.body.len()).as_bytes());
        }
        out.push(b'\n');
        out.extend_from_slice(&self.body);
        out.push(0);
        out
    }
}

/// Client `CONNECT` frame for STOMP 1.2 without heart-beating.
pub fn connect_frame(host: &str) -> Frame {
    Frame::new("CONNECT")
        .header("accept-version", "1.2")
        .header("host", host)
        .header("heart-beat", "0,0")
}

pub fn subscribe_frame(id: &str, destination: &str) -> Frame {
    Frame::new("SUBSCRIBE")
        .header("id", id)
        .header("destination", destination)
        .header("ack", "auto")
}

fn escape_header(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            ':' => out.push_str("\\c"),
            c => out.push(c),
        }
    }
    out
}

fn unescape_header(raw: &[u8]) -> Result<String, StompError> {
    let s = String::from_utf8_lossy(raw);
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('\\') => out.push('\\'),
            Some('n') => out.push('\n'),
            Some('r') => out.push('\r'),
            Some('c') => out.push(':'),
            other => {
                return Err(StompError::Malformed(format!(
                    "undefined escape `\\{}`",
                    other.map(String::from).unwrap_or_default()
                )))
            }
        }
    }
    Ok(out)
}

// ============================================================================
// Parsing
// ============================================================================

fn eol(i: &[u8]) -> IResult<&[u8], &[u8]> {
    alt((tag("\r\n"), tag("\n")))(i)
}

fn command(i: &[u8]) -> IResult<&[u8], &[u8]> {
    terminated(take_while1(|c: u8| c.is_ascii_alphabetic()), eol)(i)
}

fn header_line(i: &[u8]) -> IResult<&[u8], (&[u8], &[u8])> {
    terminated(
        separated_pair(
            take_while(|c: u8| c != b':' && c != b'\n' && c != b'\r'),
            tag(":"),
            take_while(|c: u8| c != b'\n' && c != b'\r'),
        ),
        eol,
    )(i)
}

fn head(i: &[u8]) -> IResult<&[u8], (&[u8], Vec<(&[u8], &[u8])>)> {
    let (i, cmd) = command(i)?;
    let (i, (headers, _)) = many_till(header_line, eol)(i)?;
    Ok((i, (cmd, headers)))
}

fn sized_body(i: &[u8], len: usize) -> IResult<&[u8], &[u8]> {
    terminated(take(len), tag("\0"))(i)
}

fn nul_body(i: &[u8]) -> IResult<&[u8], &[u8]> {
    terminated(take_until("\0"), tag("\0"))(i)
}

fn malformed(e: nom::Err<nom::error::Error<&[u8]>>) -> StompError {
    match e {
        nom::Err::Incomplete(_) => StompError::Malformed("incomplete frame".into()),
        nom::Err::Error(e) | nom::Err::Failure(e) => {
            StompError::Malformed(format!("{:?} at byte {}", e.code, e.input.first().copied().unwrap_or(0)))
        }
    }
}

/// Decode one frame from the front of `buf`.
///
/// Returns the frame and the number of bytes consumed (heart-beats included),
/// or `None` when more input is needed.
pub fn decode_frame(buf: &[u8]) -> Result<Option<(Frame, usize)>, StompError> {
    let skipped = buf
        .iter()
        .take_while(|b| **b == b'\n' || **b == b'\r')
        .count();
    let input = &buf[skipped..];
    if input.is_empty() {
        return Ok(None);
    }

    let (rest, (cmd, raw_headers)) = match head(input) {
        Ok(parsed) => parsed,
        Err(nom::Err::Incomplete(_)) => return Ok(None),
        Err(e) => return Err(malformed(e)),
    };

    let command = String::from_utf8_lossy(cmd).into_owned();
    let escaped = !matches!(command.as_str(), "CONNECT" | "CONNECTED");
    let mut headers = Vec::with_capacity(raw_headers.len());
    for (k, v) in raw_headers {
        if escaped {
            headers.push((unescape_header(k)?, unescape_header(v)?));
        } else {
            headers.push((
                String::from_utf8_lossy(k).into_owned(),
                String::from_utf8_lossy(v).into_owned(),
            ));
        }
    }

    let content_length = headers
        .iter()
        .find(|(k, _)| k == "content-length")
        .map(|(_, v)| {
            v.trim()
                .parse::<usize>()
                .map_err(|_| StompError::ContentLength(v.clone()))
        })
        .transpose()?;

    let parsed = match content_length {
        Some(len) => sized_body(rest, len),
        None => nul_body(rest),
    };
    let (after, body) = match parsed {
        Ok(parsed) => parsed,
        Err(nom::Err::Incomplete(_)) => return Ok(None),
        Err(e) => return Err(malformed(e)),
    };

    let consumed = buf.len() - after.len();
    Ok(Some((
        Frame {
            command,
            headers,
            body: body.to_vec(),
        },
        consumed,
    )))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn message_frame_decodes() {
        let raw = b"MESSAGE\ndestination:/topic/events\nmessage-id:1\n\n{\"type\":\"RUN_STARTED\"}\0";
        let (frame, used) = decode_frame(raw).unwrap().unwrap();
        assert_eq!(used, raw.len());
        assert_eq!(frame.command, "MESSAGE");
        assert_eq!(frame.get("destination"), Some("/topic/events"));
        assert_eq!(frame.body_str().unwrap(), "{\"type\":\"RUN_STARTED\"}");
    }

    #[test]
    fn incomplete_input_needs_more_bytes() {
        let raw = b"MESSAGE\ndestination:/topic/events\n\n{\"type\"";
        assert_eq!(decode_frame(raw).unwrap(), None);
        assert_eq!(decode_frame(b"MESS").unwrap(), None);
        assert_eq!(decode_frame(b"").unwrap(), None);
    }

    #[test]
    fn heartbeats_are_skipped() {
        let raw = b"\n\r\nCONNECTED\nversion:1.2\n\n\0";
        let (frame, used) = decode_frame(raw).unwrap().unwrap();
        assert_eq!(frame.command, "CONNECTED");
        assert_eq!(used, raw.len());
        assert_eq!(decode_frame(b"\n\n").unwrap(), None);
    }

    #[test]
    fn content_length_allows_nul_in_body() {
        let raw = b"MESSAGE\ncontent-length:3\n\na\0b\0trailing";
        let (frame, used) = decode_frame(raw).unwrap().unwrap();
        assert_eq!(frame.body, b"a\0b");
        assert_eq!(&raw[used..], b"trailing");
    }

    #[test]
    fn bad_content_length_is_an_error() {
        let raw = b"MESSAGE\ncontent-length:abc\n\nx\0";
        assert!(matches!(decode_frame(raw), Err(StompError::ContentLength(_))));
    }

    #[test]
    fn headers_are_escaped_except_on_connect() {
        let frame = Frame::new("SEND").header("note", "a:b\nc");
        let bytes = frame.encode();
        assert!(bytes.starts_with(b"SEND\nnote:a\\cb\\nc\n\n"));
        let (back, _) = decode_frame(&bytes).unwrap().unwrap();
        assert_eq!(back.get("note"), Some("a:b\nc"));

        let connect = connect_frame("broker").encode();
        assert!(connect.starts_with(b"CONNECT\naccept-version:1.2\nhost:broker\nheart-beat:0,0\n\n"));
    }

    #[test]
    fn encode_adds_content_length_for_bodies() {
        let bytes = Frame::new("SEND").body("hi").encode();
        assert_eq!(bytes, b"SEND\ncontent-length:2\n\nhi\0");
    }

    #[test]
    fn two_frames_in_one_buffer() {
        let mut buf = Frame::new("RECEIPT").header("receipt-id", "1").encode();
        buf.extend(Frame::new("ERROR").header("message", "boom").encode());
        let (first, used) = decode_frame(&buf).unwrap().unwrap();
        assert_eq!(first.command, "RECEIPT");
        let (second, _) = decode_frame(&buf[used..]).unwrap().unwrap();
        assert_eq!(second.get("message"), Some("boom"));
    }

    #[test]
    fn garbage_command_is_malformed() {
        assert!(matches!(decode_frame(b"123\n\n\0"), Err(StompError::Malformed(_))));
    }
}

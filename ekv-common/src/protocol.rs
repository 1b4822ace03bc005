//! # RESP2 Codec
//!
//! Purpose: Encode commands and decode replies for the RESP2 wire protocol
//! spoken by the backing store.
//!
//! ## Design Principles
//!
//! 1. **State Machine Pattern**: Explicit parser states avoid backtracking and
//!    keep control flow predictable.
//! 2. **Streaming Friendly**: The decoder consumes from a mutable buffer and
//!    returns `None` when more data is needed.
//! 3. **Zero-Copy Payloads**: Bulk strings are split off the read buffer as
//!    `Bytes` without copying.
//! 4. **Fail Fast**: Malformed frames return a protocol error immediately.
//!
//! ## Frame Layout
//!
//! ```text
//! +OK\r\n                      simple string
//! -ERR message\r\n             error
//! :42\r\n                      integer
//! $5\r\nhello\r\n              bulk string ($-1 is nil)
//! *2\r\n$3\r\nGET\r\n$1\r\nk\r\n  array (*-1 is nil)
//! ```

use bytes::{Buf, BufMut, Bytes, BytesMut};

use crate::error::{EkvError, EkvResult};

/// Largest bulk string the decoder accepts (matches the store default).
pub const MAX_BULK_LEN: usize = 512 * 1024 * 1024;

/// A single RESP2 value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Frame {
    /// `+...` status reply.
    Simple(String),
    /// `-...` error reply.
    Error(String),
    /// `:...` integer reply.
    Integer(i64),
    /// `$n` binary-safe payload.
    Bulk(Bytes),
    /// `$-1` or `*-1`.
    Null,
    /// `*n` sequence of frames.
    Array(Vec<Frame>),
}

impl Frame {
    /// Builds a bulk frame from any byte slice.
    pub fn bulk(data: impl AsRef<[u8]>) -> Self {
        Frame::Bulk(Bytes::copy_from_slice(data.as_ref()))
    }

    /// Builds the `+OK` status reply.
    pub fn ok() -> Self {
        Frame::Simple("OK".to_string())
    }

    /// Builds an error reply.
    pub fn error(msg: impl Into<String>) -> Self {
        Frame::Error(msg.into())
    }

    /// Short label for the frame type, used in protocol error messages.
    pub fn kind(&self) -> &'static str {
        match self {
            Frame::Simple(_) => "simple string",
            Frame::Error(_) => "error",
            Frame::Integer(_) => "integer",
            Frame::Bulk(_) => "bulk string",
            Frame::Null => "nil",
            Frame::Array(_) => "array",
        }
    }

    /// Returns true for the `+OK` acknowledgement.
    pub fn is_ok(&self) -> bool {
        matches!(self, Frame::Simple(s) if s == "OK")
    }

    /// Converts an error reply into `EkvError::Store`, passing other frames through.
    pub fn into_result(self) -> EkvResult<Frame> {
        match self {
            Frame::Error(msg) => Err(EkvError::Store(msg)),
            other => Ok(other),
        }
    }

    /// Interprets the frame as an optional payload (`GET`-style replies).
    pub fn into_optional_bytes(self) -> EkvResult<Option<Bytes>> {
        match self {
            Frame::Bulk(data) => Ok(Some(data)),
            Frame::Simple(s) => Ok(Some(Bytes::from(s))),
            Frame::Null => Ok(None),
            other => Err(unexpected("bulk string", &other)),
        }
    }

    /// Interprets the frame as an integer reply.
    pub fn into_integer(self) -> EkvResult<i64> {
        match self {
            Frame::Integer(n) => Ok(n),
            other => Err(unexpected("integer", &other)),
        }
    }

    /// Interprets the frame as text (status or bulk reply).
    pub fn into_text(self) -> EkvResult<String> {
        match self {
            Frame::Simple(s) => Ok(s),
            Frame::Bulk(data) => Ok(String::from_utf8_lossy(&data).into_owned()),
            other => Err(unexpected("string", &other)),
        }
    }

    /// Interprets the frame as an array reply.
    pub fn into_array(self) -> EkvResult<Vec<Frame>> {
        match self {
            Frame::Array(items) => Ok(items),
            other => Err(unexpected("array", &other)),
        }
    }

    /// Serializes the frame into `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        match self {
            Frame::Simple(s) => {
                dst.put_u8(b'+');
                dst.put_slice(s.as_bytes());
                dst.put_slice(b"\r\n");
            }
            Frame::Error(msg) => {
                dst.put_u8(b'-');
                dst.put_slice(msg.as_bytes());
                dst.put_slice(b"\r\n");
            }
            Frame::Integer(n) => {
                dst.put_u8(b':');
                dst.put_slice(n.to_string().as_bytes());
                dst.put_slice(b"\r\n");
            }
            Frame::Bulk(data) => encode_bulk(data, dst),
            Frame::Null => dst.put_slice(b"$-1\r\n"),
            Frame::Array(items) => {
                encode_len(b'*', items.len(), dst);
                for item in items {
                    item.encode(dst);
                }
            }
        }
    }
}

fn unexpected(expected: &str, got: &Frame) -> EkvError {
    EkvError::protocol(format!("expected {expected} reply, got {}", got.kind()))
}

/// A request sent to the backing store: an array of bulk strings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    args: Vec<Bytes>,
}

impl Command {
    /// Starts a command with its name, e.g. `Command::new("SET")`.
    pub fn new(name: &str) -> Self {
        Command {
            args: vec![Bytes::copy_from_slice(name.as_bytes())],
        }
    }

    /// Appends an argument, copying it.
    pub fn arg(mut self, arg: impl AsRef<[u8]>) -> Self {
        self.args.push(Bytes::copy_from_slice(arg.as_ref()));
        self
    }

    /// Appends an owned payload without copying.
    pub fn arg_bytes(mut self, arg: Bytes) -> Self {
        self.args.push(arg);
        self
    }

    /// Command name in upper case, for logs and dispatch.
    pub fn name(&self) -> String {
        self.args
            .first()
            .map(|name| String::from_utf8_lossy(name).to_ascii_uppercase())
            .unwrap_or_default()
    }

    /// All arguments including the name.
    pub fn args(&self) -> &[Bytes] {
        &self.args
    }

    /// Serializes the command as a RESP array of bulk strings.
    pub fn encode(&self, dst: &mut BytesMut) {
        encode_len(b'*', self.args.len(), dst);
        for arg in &self.args {
            encode_bulk(arg, dst);
        }
    }
}

fn encode_len(prefix: u8, len: usize, dst: &mut BytesMut) {
    dst.put_u8(prefix);
    dst.put_slice(len.to_string().as_bytes());
    dst.put_slice(b"\r\n");
}

fn encode_bulk(data: &[u8], dst: &mut BytesMut) {
    encode_len(b'$', data.len(), dst);
    dst.put_slice(data);
    dst.put_slice(b"\r\n");
}

/// Streaming RESP2 decoder supporting every reply type, including nested arrays.
#[derive(Debug)]
pub struct FrameDecoder {
    state: ParseState,
    stack: Vec<PendingArray>,
    bulk_len: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    Header,
    BulkData,
}

#[derive(Debug)]
struct PendingArray {
    items: Vec<Frame>,
    remaining: usize,
}

impl Default for FrameDecoder {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameDecoder {
    /// Creates a decoder in the initial state.
    pub fn new() -> Self {
        FrameDecoder {
            state: ParseState::Header,
            stack: Vec::new(),
            bulk_len: 0,
        }
    }

    /// Drops any partially decoded frame.
    pub fn reset(&mut self) {
        self.state = ParseState::Header;
        self.stack.clear();
        self.bulk_len = 0;
    }

    /// Attempts to decode a single frame from the buffer.
    ///
    /// Returns `Ok(None)` if more data is required. Consumed bytes are removed
    /// from `buf`; partial progress is kept in the decoder between calls.
    pub fn decode(&mut self, buf: &mut BytesMut) -> EkvResult<Option<Frame>> {
        loop {
            match self.state {
                ParseState::Header => {
                    let line = match read_line(buf) {
                        Some(line) => line,
                        None => return Ok(None),
                    };
                    let Some((&tag, rest)) = line.split_first() else {
                        return Err(EkvError::protocol("empty frame header"));
                    };
                    let frame = match tag {
                        b'+' => Some(Frame::Simple(String::from_utf8_lossy(rest).into_owned())),
                        b'-' => Some(Frame::Error(String::from_utf8_lossy(rest).into_owned())),
                        b':' => Some(Frame::Integer(parse_i64(rest)?)),
                        b'$' => match parse_len(rest)? {
                            None => Some(Frame::Null),
                            Some(len) => {
                                self.bulk_len = len;
                                self.state = ParseState::BulkData;
                                None
                            }
                        },
                        b'*' => match parse_len(rest)? {
                            None => Some(Frame::Null),
                            Some(0) => Some(Frame::Array(Vec::new())),
                            Some(count) => {
                                self.stack.push(PendingArray {
                                    items: Vec::with_capacity(count.min(1024)),
                                    remaining: count,
                                });
                                None
                            }
                        },
                        other => {
                            return Err(EkvError::protocol(format!(
                                "unknown frame type byte 0x{other:02x}"
                            )));
                        }
                    };
                    if let Some(frame) = frame {
                        if let Some(done) = self.complete(frame) {
                            return Ok(Some(done));
                        }
                    }
                }
                ParseState::BulkData => {
                    if buf.len() < self.bulk_len + 2 {
                        return Ok(None);
                    }
                    let data = buf.split_to(self.bulk_len).freeze();
                    if buf.get_u8() != b'\r' || buf.get_u8() != b'\n' {
                        return Err(EkvError::protocol("bulk string missing CRLF terminator"));
                    }
                    self.state = ParseState::Header;
                    if let Some(done) = self.complete(Frame::Bulk(data)) {
                        return Ok(Some(done));
                    }
                }
            }
        }
    }

    /// Attaches a finished frame to the innermost open array, folding arrays
    /// that become complete. Returns the top-level frame once it is whole.
    fn complete(&mut self, mut frame: Frame) -> Option<Frame> {
        while let Some(mut top) = self.stack.pop() {
            top.items.push(frame);
            top.remaining -= 1;
            if top.remaining > 0 {
                self.stack.push(top);
                return None;
            }
            frame = Frame::Array(top.items);
        }
        Some(frame)
    }
}

fn read_line(buf: &mut BytesMut) -> Option<BytesMut> {
    let mut idx = 1;
    while idx < buf.len() {
        if buf[idx] == b'\n' && buf[idx - 1] == b'\r' {
            let line = buf.split_to(idx - 1);
            buf.advance(2);
            return Some(line);
        }
        idx += 1;
    }
    None
}

fn parse_i64(data: &[u8]) -> EkvResult<i64> {
    std::str::from_utf8(data)
        .ok()
        .and_then(|s| s.parse::<i64>().ok())
        .ok_or_else(|| EkvError::protocol("invalid integer in frame"))
}

/// Parses a length header; `-1` is the nil marker.
fn parse_len(data: &[u8]) -> EkvResult<Option<usize>> {
    match parse_i64(data)? {
        -1 => Ok(None),
        n if n < 0 => Err(EkvError::protocol("negative length in frame")),
        n => {
            let len = n as usize;
            if len > MAX_BULK_LEN {
                return Err(EkvError::protocol("frame length exceeds limit"));
            }
            Ok(Some(len))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(input: &[u8]) -> Vec<Frame> {
        let mut buf = BytesMut::from(input);
        let mut decoder = FrameDecoder::new();
        let mut frames = Vec::new();
        while let Some(frame) = decoder.decode(&mut buf).unwrap() {
            frames.push(frame);
        }
        frames
    }

    #[test]
    fn parses_simple_get() {
        let frames = decode_all(b"*2\r\n$3\r\nGET\r\n$3\r\nkey\r\n");
        assert_eq!(
            frames,
            vec![Frame::Array(vec![Frame::bulk("GET"), Frame::bulk("key")])]
        );
    }

    #[test]
    fn handles_partial_frames() {
        let mut buf = BytesMut::from("*1\r\n$4\r\nPIN");
        let mut decoder = FrameDecoder::new();
        assert!(decoder.decode(&mut buf).unwrap().is_none());
        buf.extend_from_slice(b"G\r\n");
        let frame = decoder.decode(&mut buf).unwrap().unwrap();
        assert_eq!(frame, Frame::Array(vec![Frame::bulk("PING")]));
    }

    #[test]
    fn decodes_every_reply_type() {
        let frames = decode_all(b"+OK\r\n-ERR boom\r\n:-2\r\n$-1\r\n*-1\r\n*0\r\n$0\r\n\r\n");
        assert_eq!(
            frames,
            vec![
                Frame::ok(),
                Frame::error("ERR boom"),
                Frame::Integer(-2),
                Frame::Null,
                Frame::Null,
                Frame::Array(vec![]),
                Frame::Bulk(Bytes::new()),
            ]
        );
    }

    #[test]
    fn decodes_nested_scan_reply() {
        let frames = decode_all(b"*2\r\n$2\r\n17\r\n*2\r\n$1\r\na\r\n$1\r\nb\r\n+PONG\r\n");
        assert_eq!(
            frames,
            vec![
                Frame::Array(vec![
                    Frame::bulk("17"),
                    Frame::Array(vec![Frame::bulk("a"), Frame::bulk("b")]),
                ]),
                Frame::Simple("PONG".into()),
            ]
        );
    }

    #[test]
    fn nested_reply_split_across_reads() {
        let input = b"*2\r\n$1\r\n0\r\n*1\r\n$3\r\nkey\r\n";
        let mut decoder = FrameDecoder::new();
        let mut buf = BytesMut::new();
        let mut result = None;
        for &byte in input.iter() {
            buf.put_u8(byte);
            if let Some(frame) = decoder.decode(&mut buf).unwrap() {
                result = Some(frame);
            }
        }
        assert_eq!(
            result,
            Some(Frame::Array(vec![
                Frame::bulk("0"),
                Frame::Array(vec![Frame::bulk("key")]),
            ]))
        );
        assert!(buf.is_empty());
    }

    #[test]
    fn bulk_payload_is_binary_safe() {
        let frames = decode_all(b"$4\r\n\r\n\x00\xff\r\n");
        assert_eq!(frames, vec![Frame::Bulk(Bytes::from_static(b"\r\n\x00\xff"))]);
    }

    #[test]
    fn rejects_malformed_input() {
        let mut decoder = FrameDecoder::new();
        let mut buf = BytesMut::from("?what\r\n");
        assert!(matches!(decoder.decode(&mut buf), Err(EkvError::Protocol(_))));

        let mut decoder = FrameDecoder::new();
        let mut buf = BytesMut::from("$3\r\nabcXY");
        assert!(decoder.decode(&mut buf).is_err());

        let mut decoder = FrameDecoder::new();
        let mut buf = BytesMut::from(":12a\r\n");
        assert!(decoder.decode(&mut buf).is_err());
    }

    #[test]
    fn encodes_commands_as_bulk_arrays() {
        let cmd = Command::new("SET").arg("k").arg_bytes(Bytes::from_static(b"v")).arg("EX").arg("10");
        let mut out = BytesMut::new();
        cmd.encode(&mut out);
        assert_eq!(
            &out[..],
            b"*5\r\n$3\r\nSET\r\n$1\r\nk\r\n$1\r\nv\r\n$2\r\nEX\r\n$2\r\n10\r\n"
        );
        assert_eq!(cmd.name(), "SET");
    }

    #[test]
    fn encoded_frames_decode_back() {
        let frame = Frame::Array(vec![
            Frame::ok(),
            Frame::Integer(7),
            Frame::Null,
            Frame::error("ERR no"),
        ]);
        let mut out = BytesMut::new();
        frame.encode(&mut out);
        assert_eq!(decode_all(&out), vec![frame]);
    }

    #[test]
    fn reply_accessors_check_shapes() {
        assert!(Frame::ok().is_ok());
        assert!(!Frame::Simple("QUEUED".into()).is_ok());
        assert!(matches!(
            Frame::error("ERR x").into_result(),
            Err(EkvError::Store(msg)) if msg == "ERR x"
        ));
        assert_eq!(Frame::Null.into_optional_bytes().unwrap(), None);
        assert_eq!(Frame::Integer(-1).into_integer().unwrap(), -1);
        assert!(matches!(Frame::Null.into_integer(), Err(EkvError::Protocol(_))));
        assert_eq!(Frame::bulk("PONG").into_text().unwrap(), "PONG");
    }
}

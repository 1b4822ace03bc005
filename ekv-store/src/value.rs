//! Representation coercion for read results.

use std::fmt;
use std::pin::Pin;
use std::str::FromStr;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::Stream;

use ekv_common::{EkvError, EkvResult};

/// Shape a stored payload is returned in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ValueKind {
    /// UTF-8 text.
    #[default]
    Text,
    /// Raw bytes.
    ArrayBuffer,
    /// Parsed JSON document.
    Json,
    /// One-shot byte stream.
    Stream,
}

impl ValueKind {
    /// Every kind, in declaration order.
    pub const ALL: [ValueKind; 4] = [
        ValueKind::Text,
        ValueKind::ArrayBuffer,
        ValueKind::Json,
        ValueKind::Stream,
    ];

    /// Wire name of the kind.
    pub const fn as_str(self) -> &'static str {
        match self {
            ValueKind::Text => "text",
            ValueKind::ArrayBuffer => "arrayBuffer",
            ValueKind::Json => "json",
            ValueKind::Stream => "stream",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ValueKind {
    type Err = EkvError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ValueKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == s)
            .ok_or_else(|| {
                EkvError::invalid(format!(
                    "unknown response type {s:?}, expected one of \"text\", \"arrayBuffer\", \"json\", \"stream\""
                ))
            })
    }
}

/// A stored payload coerced into the requested representation.
#[derive(Debug)]
pub enum KvValue {
    Text(String),
    Bytes(Bytes),
    Json(serde_json::Value),
    Stream(ValueStream),
}

impl KvValue {
    /// Coerces a raw payload. Only `Json` can fail.
    pub fn materialize(raw: Bytes, kind: ValueKind) -> EkvResult<Self> {
        Ok(match kind {
            ValueKind::Text => KvValue::Text(String::from_utf8_lossy(&raw).into_owned()),
            ValueKind::ArrayBuffer => KvValue::Bytes(raw),
            ValueKind::Json => KvValue::Json(serde_json::from_slice(&raw)?),
            ValueKind::Stream => KvValue::Stream(ValueStream::new(raw)),
        })
    }

    /// The representation this value is in.
    pub fn kind(&self) -> ValueKind {
        match self {
            KvValue::Text(_) => ValueKind::Text,
            KvValue::Bytes(_) => ValueKind::ArrayBuffer,
            KvValue::Json(_) => ValueKind::Json,
            KvValue::Stream(_) => ValueKind::Stream,
        }
    }

    pub fn into_text(self) -> Option<String> {
        match self {
            KvValue::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn into_bytes(self) -> Option<Bytes> {
        match self {
            KvValue::Bytes(bytes) => Some(bytes),
            _ => None,
        }
    }

    pub fn into_json(self) -> Option<serde_json::Value> {
        match self {
            KvValue::Json(json) => Some(json),
            _ => None,
        }
    }

    pub fn into_stream(self) -> Option<ValueStream> {
        match self {
            KvValue::Stream(stream) => Some(stream),
            _ => None,
        }
    }
}

/// Finite, single-read stream over a stored payload.
///
/// Yields the whole payload as one chunk, then ends.
pub struct ValueStream {
    payload: Option<Bytes>,
    len: usize,
}

impl ValueStream {
    pub fn new(payload: Bytes) -> Self {
        let len = payload.len();
        ValueStream {
            payload: Some(payload),
            len,
        }
    }

    /// Total payload length in bytes.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// True once the payload chunk has been handed out.
    pub fn is_consumed(&self) -> bool {
        self.payload.is_none()
    }
}

impl Stream for ValueStream {
    type Item = EkvResult<Bytes>;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        Poll::Ready(self.payload.take().map(Ok))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        let remaining = usize::from(self.payload.is_some());
        (remaining, Some(remaining))
    }
}

impl fmt::Debug for ValueStream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ValueStream")
            .field("len", &self.len)
            .field("consumed", &self.is_consumed())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures_util::StreamExt;

    #[test]
    fn parses_kind_names() {
        for kind in ValueKind::ALL {
            assert_eq!(kind.as_str().parse::<ValueKind>().unwrap(), kind);
        }
        assert!(matches!(
            "blob".parse::<ValueKind>(),
            Err(EkvError::InvalidArgument(_))
        ));
        // Names are case-sensitive.
        assert!("JSON".parse::<ValueKind>().is_err());
    }

    #[test]
    fn text_decoding_is_lossy() {
        let value = KvValue::materialize(Bytes::from_static(b"caf\xc3\xa9 \xff"), ValueKind::Text).unwrap();
        assert_eq!(value.into_text().unwrap(), "café \u{fffd}");
    }

    #[test]
    fn array_buffer_keeps_exact_bytes() {
        let raw = Bytes::from_static(&[0, 1, 2, 255]);
        let value = KvValue::materialize(raw.clone(), ValueKind::ArrayBuffer).unwrap();
        assert_eq!(value.kind(), ValueKind::ArrayBuffer);
        assert_eq!(value.into_bytes().unwrap(), raw);
    }

    #[test]
    fn json_parses_or_fails_with_decode() {
        let value = KvValue::materialize(Bytes::from_static(br#"{"a":[1,2]}"#), ValueKind::Json).unwrap();
        assert_eq!(value.into_json().unwrap(), serde_json::json!({"a": [1, 2]}));

        let err = KvValue::materialize(Bytes::from_static(b"not json"), ValueKind::Json).unwrap_err();
        assert!(matches!(err, EkvError::Decode(_)));
    }

    #[tokio::test]
    async fn stream_yields_once_then_ends() {
        let value = KvValue::materialize(Bytes::from_static(b"payload"), ValueKind::Stream).unwrap();
        let mut stream = value.into_stream().unwrap();
        assert_eq!(stream.len(), 7);
        assert_eq!(stream.size_hint(), (1, Some(1)));
        assert_eq!(stream.next().await.unwrap().unwrap(), Bytes::from_static(b"payload"));
        assert!(stream.is_consumed());
        assert!(stream.next().await.is_none());
    }
}

use std::pin::Pin;
use std::task::{ready, Context, Poll};

use bytes::{Buf, Bytes, BytesMut};
use futures_util::Stream;

use crate::error::{ProtocolError, ProtocolResult};
use crate::message::StashMessage;

const HEADER_LEN: usize = 5;

/// Codec for encoding/decoding stash protocol messages.
pub struct StashCodec;

impl StashCodec {
    /// Encode a message with framing: [4 bytes len][1 byte tag][payload]
    pub fn encode(msg: &StashMessage) -> ProtocolResult<Vec<u8>> {
        let payload =
            bincode::serialize(msg).map_err(|e| ProtocolError::Serialization(e.to_string()))?;
        let max = StashMessage::max_payload_size(msg.type_tag());
        if payload.len() > max {
            return Err(ProtocolError::MessageTooLarge {
                size: payload.len(),
                max,
            });
        }
        let len = (payload.len() + 1) as u32;
        let mut buf = Vec::with_capacity(HEADER_LEN + payload.len());
        buf.extend_from_slice(&len.to_be_bytes());
        buf.push(msg.type_tag());
        buf.extend_from_slice(&payload);
        Ok(buf)
    }

    /// Encode a message straight into a `Bytes` body chunk.
    pub fn encode_bytes(msg: &StashMessage) -> ProtocolResult<Bytes> {
        Self::encode(msg).map(Bytes::from)
    }

    /// Encode several messages back to back.
    pub fn encode_all<'a>(
        msgs: impl IntoIterator<Item = &'a StashMessage>,
    ) -> ProtocolResult<Vec<u8>> {
        let mut buf = Vec::new();
        for msg in msgs {
            buf.extend_from_slice(&Self::encode(msg)?);
        }
        Ok(buf)
    }

    /// Decode a framed message. Returns (message, bytes_consumed).
    pub fn decode(data: &[u8]) -> ProtocolResult<(StashMessage, usize)> {
        let Some(total) = frame_len(data)? else {
            return Err(ProtocolError::FramingError(format!(
                "incomplete frame: have {} bytes",
                data.len()
            )));
        };
        let msg = decode_body(data[4], &data[HEADER_LEN..total])?;
        Ok((msg, total))
    }
}

/// Total frame length if `data` starts with a complete frame, `None` if more
/// bytes are needed. Header problems are reported as soon as the header is in.
fn frame_len(data: &[u8]) -> ProtocolResult<Option<usize>> {
    if data.len() < 4 {
        return Ok(None);
    }
    let len = u32::from_be_bytes([data[0], data[1], data[2], data[3]]) as usize;
    if len < 1 {
        return Err(ProtocolError::FramingError("zero-length frame".into()));
    }
    // The size bound depends on the tag.
    if data.len() < HEADER_LEN {
        return Ok(None);
    }
    let tag = data[4];
    if !StashMessage::is_known_tag(tag) {
        return Err(ProtocolError::InvalidMessageType(tag));
    }
    let max = StashMessage::max_payload_size(tag);
    if len - 1 > max {
        return Err(ProtocolError::MessageTooLarge { size: len - 1, max });
    }
    let total = 4 + len;
    Ok((data.len() >= total).then_some(total))
}

fn decode_body(tag: u8, payload: &[u8]) -> ProtocolResult<StashMessage> {
    let msg: StashMessage = bincode::deserialize(payload)
        .map_err(|e| ProtocolError::Deserialization(e.to_string()))?;
    if msg.type_tag() != tag {
        return Err(ProtocolError::FramingError(format!(
            "tag {tag} does not match {} payload",
            msg.type_name()
        )));
    }
    Ok(msg)
}

/// Incremental decoder for frames arriving in arbitrary pieces.
#[derive(Debug, Default)]
pub struct FrameDecoder {
    buf: BytesMut,
}

impl FrameDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append received bytes.
    pub fn extend(&mut self, data: &[u8]) {
        self.buf.extend_from_slice(data);
    }

    /// Take the next complete message, if one is buffered.
    pub fn next_message(&mut self) -> ProtocolResult<Option<StashMessage>> {
        let Some(total) = frame_len(&self.buf)? else {
            return Ok(None);
        };
        let frame = self.buf.split_to(total);
        decode_body(frame[4], &frame[HEADER_LEN..]).map(Some)
    }

    /// Bytes received but not yet consumed by a complete frame.
    pub fn buffered(&self) -> usize {
        self.buf.remaining()
    }

    /// Check that the input ended on a frame boundary.
    pub fn finish(&self) -> ProtocolResult<()> {
        if self.buf.is_empty() {
            Ok(())
        } else {
            Err(ProtocolError::FramingError(format!(
                "{} trailing bytes after last frame",
                self.buf.len()
            )))
        }
    }
}

/// Adapts a stream of body chunks into a stream of decoded messages.
///
/// The stream ends after the first error.
pub struct MessageStream<S> {
    inner: S,
    decoder: FrameDecoder,
    finished: bool,
}

impl<S> MessageStream<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            decoder: FrameDecoder::new(),
            finished: false,
        }
    }
}

impl<S, E> Stream for MessageStream<S>
where
    S: Stream<Item = Result<Bytes, E>> + Unpin,
    E: std::fmt::Display,
{
    type Item = ProtocolResult<StashMessage>;

    fn poll_next(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = &mut *self;
        loop {
            if this.finished {
                return Poll::Ready(None);
            }
            match this.decoder.next_message() {
                Ok(Some(msg)) => return Poll::Ready(Some(Ok(msg))),
                Ok(None) => {}
                Err(e) => {
                    this.finished = true;
                    return Poll::Ready(Some(Err(e)));
                }
            }
            match ready!(Pin::new(&mut this.inner).poll_next(cx)) {
                Some(Ok(bytes)) => this.decoder.extend(&bytes),
                Some(Err(e)) => {
                    this.finished = true;
                    return Poll::Ready(Some(Err(ProtocolError::Transport(e.to_string()))));
                }
                None => {
                    this.finished = true;
                    if let Err(e) = this.decoder.finish() {
                        return Poll::Ready(Some(Err(e)));
                    }
                }
            }
        }
    }
}

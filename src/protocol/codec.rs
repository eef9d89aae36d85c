//! Frame codec: wire bytes to typed frames and back.
//!
//! Implements the 7-byte frame header format:
//! ```text
//! ┌──────┬─────────┬──────────┬─────────┬─────┐
//! │ Type │ Channel │ Size     │ Payload │ End │
//! │ 1 B  │ 2 B BE  │ 4 B BE   │ Size B  │ 1 B │
//! └──────┴─────────┴──────────┴─────────┴─────┘
//! ```
//! Every frame is terminated by the end octet `0xCE`. The reader enforces
//! the negotiated maximum frame size, shared with the connection through an
//! atomic so the tune result applies without re-plumbing the reader task.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;

use bytes::{BufMut, Bytes, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};

use super::frame::Frame;
use super::method::Method;
use super::table::get_int;
use crate::error::{Error, Result};

/// Frame type octet for method frames.
pub const FRAME_METHOD: u8 = 1;
/// Frame type octet for content header frames.
pub const FRAME_HEADER: u8 = 2;
/// Frame type octet for content body frames.
pub const FRAME_BODY: u8 = 3;
/// Frame type octet for heartbeat frames.
pub const FRAME_HEARTBEAT: u8 = 8;
/// Terminating octet of every frame.
pub const FRAME_END: u8 = 0xCE;

/// Magic bytes selecting protocol version 0-9-1.
pub const PROTOCOL_HEADER: [u8; 8] = *b"AMQP\x00\x00\x09\x01";

/// Absolute cap on a frame payload when no limit was negotiated (max i32).
pub const ABSOLUTE_MAX_FRAME_SIZE: u32 = 2_147_483_647;

/// Reads typed frames off a byte stream.
pub struct FrameReader<R> {
    inner: R,
    /// Negotiated frame size cap; 0 means no limit beyond the absolute cap.
    max_frame: Arc<AtomicU32>,
}

impl<R: AsyncRead + Unpin> FrameReader<R> {
    /// Create a reader with no negotiated frame size limit.
    pub fn new(inner: R) -> Self {
        Self::with_max_frame(inner, Arc::new(AtomicU32::new(0)))
    }

    /// Create a reader sharing a frame size limit cell with its owner.
    pub fn with_max_frame(inner: R, max_frame: Arc<AtomicU32>) -> Self {
        Self { inner, max_frame }
    }

    /// Read one complete frame.
    ///
    /// Fails on I/O errors, an oversized payload, a missing end octet, or an
    /// unknown frame type; all of these are fatal to the connection.
    pub async fn read_frame(&mut self) -> Result<Frame> {
        let mut header = [0u8; 7];
        self.inner.read_exact(&mut header).await?;

        let frame_type = header[0];
        let channel = u16::from_be_bytes([header[1], header[2]]);
        let size = u32::from_be_bytes([header[3], header[4], header[5], header[6]]);

        let limit = match self.max_frame.load(Ordering::Relaxed) {
            0 => ABSOLUTE_MAX_FRAME_SIZE,
            n => n,
        };
        if size > limit {
            return Err(Error::Frame(format!(
                "frame of {} bytes exceeds negotiated maximum {}",
                size, limit
            )));
        }

        let mut payload = vec![0u8; size as usize + 1];
        self.inner.read_exact(&mut payload).await?;
        match payload.pop() {
            Some(FRAME_END) => {}
            _ => return Err(Error::Frame("frame is missing its end octet".to_string())),
        }
        let mut payload = Bytes::from(payload);

        let frame = match frame_type {
            FRAME_METHOD => Frame::Method {
                channel,
                method: Method::decode(&mut payload)?,
            },
            FRAME_HEADER => {
                let class_id = get_int(&mut payload, 2)? as u16;
                let _weight = get_int(&mut payload, 2)?;
                let body_size = get_int(&mut payload, 8)?;
                Frame::ContentHeader {
                    channel,
                    class_id,
                    body_size,
                    properties: payload,
                }
            }
            FRAME_BODY => Frame::ContentBody { channel, payload },
            FRAME_HEARTBEAT => Frame::Heartbeat { channel },
            other => {
                return Err(Error::Frame(format!("unknown frame type {}", other)));
            }
        };
        Ok(frame)
    }
}

/// Writes typed frames onto a buffered byte stream.
pub struct FrameWriter<W> {
    inner: BufWriter<W>,
}

impl<W: AsyncWrite + Unpin> FrameWriter<W> {
    /// Wrap a write half in a buffered frame writer.
    pub fn new(inner: W) -> Self {
        Self {
            inner: BufWriter::new(inner),
        }
    }

    /// Serialize and write one frame, flushing afterwards.
    pub async fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        let bytes = encode_frame(frame)?;
        self.inner.write_all(&bytes).await?;
        self.inner.flush().await?;
        Ok(())
    }

    /// Shut down the underlying stream, flushing buffered bytes first.
    pub async fn shutdown(&mut self) -> Result<()> {
        self.inner.shutdown().await?;
        Ok(())
    }
}

/// Build a complete frame as a single byte buffer.
pub fn encode_frame(frame: &Frame) -> Result<Bytes> {
    if let Frame::ProtocolHeader = frame {
        // The protocol header is the one frame without the common envelope.
        return Ok(Bytes::from_static(&PROTOCOL_HEADER));
    }

    let mut payload = BytesMut::new();
    let frame_type = match frame {
        Frame::ProtocolHeader => unreachable!(),
        Frame::Method { method, .. } => {
            method.encode(&mut payload)?;
            FRAME_METHOD
        }
        Frame::ContentHeader {
            class_id,
            body_size,
            properties,
            ..
        } => {
            payload.put_u16(*class_id);
            payload.put_u16(0);
            payload.put_u64(*body_size);
            payload.put_slice(properties);
            FRAME_HEADER
        }
        Frame::ContentBody { payload: body, .. } => {
            payload.put_slice(body);
            FRAME_BODY
        }
        Frame::Heartbeat { .. } => FRAME_HEARTBEAT,
    };

    let mut buf = BytesMut::with_capacity(7 + payload.len() + 1);
    buf.put_u8(frame_type);
    buf.put_u16(frame.channel());
    buf.put_u32(payload.len() as u32);
    buf.put_slice(&payload);
    buf.put_u8(FRAME_END);
    Ok(buf.freeze())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::method::MethodKind;

    async fn roundtrip(frame: Frame) -> Frame {
        let bytes = encode_frame(&frame).unwrap();
        let mut reader = FrameReader::new(std::io::Cursor::new(bytes.to_vec()));
        reader.read_frame().await.unwrap()
    }

    #[tokio::test]
    async fn test_method_frame_roundtrip() {
        let frame = Frame::method(
            0,
            Method::ConnectionTune {
                channel_max: 2047,
                frame_max: 131_072,
                heartbeat: 10,
            },
        );
        assert_eq!(roundtrip(frame.clone()).await, frame);
    }

    #[tokio::test]
    async fn test_heartbeat_frame_is_eight_bytes() {
        let bytes = encode_frame(&Frame::Heartbeat { channel: 0 }).unwrap();
        assert_eq!(&bytes[..], &[FRAME_HEARTBEAT, 0, 0, 0, 0, 0, 0, FRAME_END]);

        let frame = roundtrip(Frame::Heartbeat { channel: 0 }).await;
        assert_eq!(frame, Frame::Heartbeat { channel: 0 });
    }

    #[tokio::test]
    async fn test_content_frames_roundtrip() {
        let header = Frame::ContentHeader {
            channel: 5,
            class_id: 60,
            body_size: 11,
            properties: Bytes::from_static(&[0x00, 0x00]),
        };
        assert_eq!(roundtrip(header.clone()).await, header);

        let body = Frame::ContentBody {
            channel: 5,
            payload: Bytes::from_static(b"hello world"),
        };
        assert_eq!(roundtrip(body.clone()).await, body);
    }

    #[tokio::test]
    async fn test_protocol_header_magic() {
        let bytes = encode_frame(&Frame::ProtocolHeader).unwrap();
        assert_eq!(&bytes[..], b"AMQP\x00\x00\x09\x01");
    }

    #[tokio::test]
    async fn test_missing_end_octet_rejected() {
        let mut bytes = encode_frame(&Frame::Heartbeat { channel: 0 })
            .unwrap()
            .to_vec();
        *bytes.last_mut().unwrap() = 0x00;

        let mut reader = FrameReader::new(std::io::Cursor::new(bytes));
        let err = reader.read_frame().await.unwrap_err();
        assert!(matches!(err, Error::Frame(ref m) if m.contains("end octet")));
    }

    #[tokio::test]
    async fn test_unknown_frame_type_rejected() {
        let bytes = vec![9u8, 0, 0, 0, 0, 0, 0, FRAME_END];
        let mut reader = FrameReader::new(std::io::Cursor::new(bytes));
        let err = reader.read_frame().await.unwrap_err();
        assert!(matches!(err, Error::Frame(ref m) if m.contains("unknown frame type")));
    }

    #[tokio::test]
    async fn test_oversized_frame_rejected() {
        let max = Arc::new(AtomicU32::new(16));
        let frame = Frame::ContentBody {
            channel: 1,
            payload: Bytes::from(vec![0u8; 32]),
        };
        let bytes = encode_frame(&frame).unwrap();

        let mut reader = FrameReader::with_max_frame(std::io::Cursor::new(bytes.to_vec()), max);
        let err = reader.read_frame().await.unwrap_err();
        assert!(matches!(err, Error::Frame(ref m) if m.contains("exceeds")));
    }

    #[tokio::test]
    async fn test_truncated_stream_is_an_error() {
        let bytes = encode_frame(&Frame::method(0, Method::ConnectionCloseOk)).unwrap();
        let mut reader = FrameReader::new(std::io::Cursor::new(bytes[..5].to_vec()));
        assert!(reader.read_frame().await.is_err());
    }

    #[tokio::test]
    async fn test_writer_roundtrip_over_duplex() {
        let (client, server) = tokio::io::duplex(4096);
        let mut writer = FrameWriter::new(client);
        let mut reader = FrameReader::new(server);

        writer
            .write_frame(&Frame::method(
                0,
                Method::ConnectionOpen { vhost: "/".into() },
            ))
            .await
            .unwrap();

        let frame = reader.read_frame().await.unwrap();
        match frame {
            Frame::Method { channel, method } => {
                assert_eq!(channel, 0);
                assert_eq!(method.kind(), MethodKind::ConnectionOpen);
            }
            other => panic!("unexpected frame: {:?}", other),
        }
    }
}

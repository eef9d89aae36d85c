//! Frame struct with typed payload variants.
//!
//! The frame is the smallest unit of the transport: a channel id plus a
//! payload of one of several kinds. Content payloads are opaque to the
//! connection core; they are routed by channel id only.

use bytes::Bytes;

use super::method::Method;

/// A complete protocol frame.
#[derive(Debug, Clone, PartialEq)]
pub enum Frame {
    /// The client's opening magic bytes. Only ever written, never read.
    ProtocolHeader,
    /// A typed RPC method.
    Method {
        /// Channel the method addresses; 0 is the connection itself.
        channel: u16,
        /// The decoded method record.
        method: Method,
    },
    /// The header preceding a content body. Opaque beyond routing.
    ContentHeader {
        /// Channel carrying the content.
        channel: u16,
        /// Class id of the carrying method.
        class_id: u16,
        /// Total size of the following body frames.
        body_size: u64,
        /// Raw property flags and property list, re-emitted verbatim.
        properties: Bytes,
    },
    /// A chunk of content body. Opaque beyond routing.
    ContentBody {
        /// Channel carrying the content.
        channel: u16,
        /// Raw body bytes.
        payload: Bytes,
    },
    /// A zero-payload liveness frame.
    Heartbeat {
        /// Always 0 in practice; carried for routing symmetry.
        channel: u16,
    },
}

impl Frame {
    /// The channel id this frame addresses.
    #[inline]
    pub fn channel(&self) -> u16 {
        match self {
            Frame::ProtocolHeader => 0,
            Frame::Method { channel, .. }
            | Frame::ContentHeader { channel, .. }
            | Frame::ContentBody { channel, .. }
            | Frame::Heartbeat { channel } => *channel,
        }
    }

    /// Shorthand for a method frame.
    #[inline]
    pub fn method(channel: u16, method: Method) -> Frame {
        Frame::Method { channel, method }
    }
}

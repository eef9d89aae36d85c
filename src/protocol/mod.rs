//! Protocol module - frames, methods, field tables, and the wire codec.
//!
//! This module implements the framing layer of the protocol:
//! - 7-byte frame header encoding/decoding plus the end octet
//! - Typed method records for the connection and channel classes
//! - The recursive field table used for server and client properties

mod codec;
mod frame;
mod method;
mod table;

pub use codec::{
    encode_frame, FrameReader, FrameWriter, ABSOLUTE_MAX_FRAME_SIZE, FRAME_BODY, FRAME_END,
    FRAME_HEADER, FRAME_HEARTBEAT, FRAME_METHOD, PROTOCOL_HEADER,
};
pub use frame::Frame;
pub use method::{Method, MethodKind, CLASS_CHANNEL, CLASS_CONNECTION};
pub use table::{FieldValue, Table};

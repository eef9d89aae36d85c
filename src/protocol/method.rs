//! Typed method records for the connection and channel classes.
//!
//! A method frame's payload is `class-id, method-id` followed by the
//! method's argument list. [`Method`] is the tagged union of every method
//! the connection core speaks; [`MethodKind`] is the bare tag, used by the
//! RPC coordinator to match a received method against the set of expected
//! responses without inspecting payloads.

use bytes::{BufMut, Bytes, BytesMut};

use super::table::{
    decode_table, encode_table, get_int, get_long_string, get_short_string, put_long_string,
    put_short_string, Table,
};
use crate::error::{Error, Result};

/// Class id of the connection class.
pub const CLASS_CONNECTION: u16 = 10;
/// Class id of the channel class.
pub const CLASS_CHANNEL: u16 = 20;

/// A decoded method with its arguments.
#[derive(Debug, Clone, PartialEq)]
pub enum Method {
    /// `connection.start`: opens the handshake after the protocol header.
    ConnectionStart {
        /// Server's protocol major version.
        version_major: u8,
        /// Server's protocol minor version.
        version_minor: u8,
        /// Server properties, including the `capabilities` sub-table.
        server_properties: Table,
        /// Space-separated SASL mechanism names the server accepts.
        mechanisms: String,
        /// Space-separated locales the server offers.
        locales: String,
    },
    /// `connection.start-ok`: the client's mechanism choice and response.
    ConnectionStartOk {
        /// Client identification properties.
        client_properties: Table,
        /// Chosen SASL mechanism name.
        mechanism: String,
        /// Opaque SASL response blob.
        response: String,
        /// Chosen locale.
        locale: String,
    },
    /// `connection.tune`: the server's proposed limits.
    ConnectionTune {
        /// Proposed maximum channel number, 0 meaning no limit.
        channel_max: u16,
        /// Proposed maximum frame size in bytes, 0 meaning no limit.
        frame_max: u32,
        /// Proposed heartbeat interval in seconds, 0 disabling heartbeats.
        heartbeat: u16,
    },
    /// `connection.tune-ok`: the negotiated limits the client will honor.
    ConnectionTuneOk {
        /// Negotiated maximum channel number.
        channel_max: u16,
        /// Negotiated maximum frame size in bytes.
        frame_max: u32,
        /// Negotiated heartbeat interval in seconds.
        heartbeat: u16,
    },
    /// `connection.open`: selects a vhost.
    ConnectionOpen {
        /// Virtual host to open against.
        vhost: String,
    },
    /// `connection.open-ok`: vhost accepted.
    ConnectionOpenOk,
    /// `connection.close`: either peer requests connection teardown.
    ConnectionClose {
        /// Reply code; 200 for a deliberate close.
        reply_code: u16,
        /// Human-readable reason.
        reply_text: String,
        /// Class of the method that caused the close, or 0.
        class_id: u16,
        /// Method that caused the close, or 0.
        method_id: u16,
    },
    /// `connection.close-ok`: teardown confirmed.
    ConnectionCloseOk,
    /// `channel.open`: opens a channel on its id.
    ChannelOpen,
    /// `channel.open-ok`: channel ready.
    ChannelOpenOk,
    /// `channel.close`: either peer closes one channel.
    ChannelClose {
        /// Reply code; 200 for a deliberate close.
        reply_code: u16,
        /// Human-readable reason.
        reply_text: String,
        /// Class of the method that caused the close, or 0.
        class_id: u16,
        /// Method that caused the close, or 0.
        method_id: u16,
    },
    /// `channel.close-ok`: channel teardown confirmed.
    ChannelCloseOk,
}

/// The bare tag of a [`Method`], used to match RPC responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MethodKind {
    /// `connection.start`
    ConnectionStart,
    /// `connection.start-ok`
    ConnectionStartOk,
    /// `connection.tune`
    ConnectionTune,
    /// `connection.tune-ok`
    ConnectionTuneOk,
    /// `connection.open`
    ConnectionOpen,
    /// `connection.open-ok`
    ConnectionOpenOk,
    /// `connection.close`
    ConnectionClose,
    /// `connection.close-ok`
    ConnectionCloseOk,
    /// `channel.open`
    ChannelOpen,
    /// `channel.open-ok`
    ChannelOpenOk,
    /// `channel.close`
    ChannelClose,
    /// `channel.close-ok`
    ChannelCloseOk,
}

impl Method {
    /// The tag of this method.
    pub fn kind(&self) -> MethodKind {
        match self {
            Method::ConnectionStart { .. } => MethodKind::ConnectionStart,
            Method::ConnectionStartOk { .. } => MethodKind::ConnectionStartOk,
            Method::ConnectionTune { .. } => MethodKind::ConnectionTune,
            Method::ConnectionTuneOk { .. } => MethodKind::ConnectionTuneOk,
            Method::ConnectionOpen { .. } => MethodKind::ConnectionOpen,
            Method::ConnectionOpenOk => MethodKind::ConnectionOpenOk,
            Method::ConnectionClose { .. } => MethodKind::ConnectionClose,
            Method::ConnectionCloseOk => MethodKind::ConnectionCloseOk,
            Method::ChannelOpen => MethodKind::ChannelOpen,
            Method::ChannelOpenOk => MethodKind::ChannelOpenOk,
            Method::ChannelClose { .. } => MethodKind::ChannelClose,
            Method::ChannelCloseOk => MethodKind::ChannelCloseOk,
        }
    }

    /// The `(class-id, method-id)` pair identifying this method on the wire.
    pub fn id(&self) -> (u16, u16) {
        match self {
            Method::ConnectionStart { .. } => (CLASS_CONNECTION, 10),
            Method::ConnectionStartOk { .. } => (CLASS_CONNECTION, 11),
            Method::ConnectionTune { .. } => (CLASS_CONNECTION, 30),
            Method::ConnectionTuneOk { .. } => (CLASS_CONNECTION, 31),
            Method::ConnectionOpen { .. } => (CLASS_CONNECTION, 40),
            Method::ConnectionOpenOk => (CLASS_CONNECTION, 41),
            Method::ConnectionClose { .. } => (CLASS_CONNECTION, 50),
            Method::ConnectionCloseOk => (CLASS_CONNECTION, 51),
            Method::ChannelOpen => (CLASS_CHANNEL, 10),
            Method::ChannelOpenOk => (CLASS_CHANNEL, 11),
            Method::ChannelClose { .. } => (CLASS_CHANNEL, 40),
            Method::ChannelCloseOk => (CLASS_CHANNEL, 41),
        }
    }

    /// Encode `class-id, method-id, arguments` into `buf`.
    pub(crate) fn encode(&self, buf: &mut BytesMut) -> Result<()> {
        let (class_id, method_id) = self.id();
        buf.put_u16(class_id);
        buf.put_u16(method_id);

        match self {
            Method::ConnectionStart {
                version_major,
                version_minor,
                server_properties,
                mechanisms,
                locales,
            } => {
                buf.put_u8(*version_major);
                buf.put_u8(*version_minor);
                encode_table(server_properties, buf)?;
                put_long_string(buf, mechanisms.as_bytes())?;
                put_long_string(buf, locales.as_bytes())?;
            }
            Method::ConnectionStartOk {
                client_properties,
                mechanism,
                response,
                locale,
            } => {
                encode_table(client_properties, buf)?;
                put_short_string(buf, mechanism)?;
                put_long_string(buf, response.as_bytes())?;
                put_short_string(buf, locale)?;
            }
            Method::ConnectionTune {
                channel_max,
                frame_max,
                heartbeat,
            }
            | Method::ConnectionTuneOk {
                channel_max,
                frame_max,
                heartbeat,
            } => {
                buf.put_u16(*channel_max);
                buf.put_u32(*frame_max);
                buf.put_u16(*heartbeat);
            }
            Method::ConnectionOpen { vhost } => {
                put_short_string(buf, vhost)?;
                // reserved: capabilities short string and insist bit
                put_short_string(buf, "")?;
                buf.put_u8(0);
            }
            Method::ConnectionOpenOk => {
                // reserved: known-hosts short string
                put_short_string(buf, "")?;
            }
            Method::ConnectionClose {
                reply_code,
                reply_text,
                class_id,
                method_id,
            }
            | Method::ChannelClose {
                reply_code,
                reply_text,
                class_id,
                method_id,
            } => {
                buf.put_u16(*reply_code);
                put_short_string(buf, reply_text)?;
                buf.put_u16(*class_id);
                buf.put_u16(*method_id);
            }
            Method::ConnectionCloseOk | Method::ChannelCloseOk => {}
            Method::ChannelOpen => {
                // reserved: out-of-band short string
                put_short_string(buf, "")?;
            }
            Method::ChannelOpenOk => {
                // reserved: channel-id long string
                put_long_string(buf, b"")?;
            }
        }
        Ok(())
    }

    /// Decode a method frame payload, `class-id, method-id` included.
    pub(crate) fn decode(payload: &mut Bytes) -> Result<Method> {
        let class_id = get_int(payload, 2)? as u16;
        let method_id = get_int(payload, 2)? as u16;

        let method = match (class_id, method_id) {
            (CLASS_CONNECTION, 10) => Method::ConnectionStart {
                version_major: get_int(payload, 1)? as u8,
                version_minor: get_int(payload, 1)? as u8,
                server_properties: decode_table(payload)?,
                mechanisms: long_string_utf8(payload)?,
                locales: long_string_utf8(payload)?,
            },
            (CLASS_CONNECTION, 11) => Method::ConnectionStartOk {
                client_properties: decode_table(payload)?,
                mechanism: get_short_string(payload)?,
                response: long_string_utf8(payload)?,
                locale: get_short_string(payload)?,
            },
            (CLASS_CONNECTION, 30) => Method::ConnectionTune {
                channel_max: get_int(payload, 2)? as u16,
                frame_max: get_int(payload, 4)? as u32,
                heartbeat: get_int(payload, 2)? as u16,
            },
            (CLASS_CONNECTION, 31) => Method::ConnectionTuneOk {
                channel_max: get_int(payload, 2)? as u16,
                frame_max: get_int(payload, 4)? as u32,
                heartbeat: get_int(payload, 2)? as u16,
            },
            (CLASS_CONNECTION, 40) => {
                let vhost = get_short_string(payload)?;
                let _reserved_capabilities = get_short_string(payload)?;
                let _reserved_insist = get_int(payload, 1)?;
                Method::ConnectionOpen { vhost }
            }
            (CLASS_CONNECTION, 41) => {
                let _reserved_known_hosts = get_short_string(payload)?;
                Method::ConnectionOpenOk
            }
            (CLASS_CONNECTION, 50) => Method::ConnectionClose {
                reply_code: get_int(payload, 2)? as u16,
                reply_text: get_short_string(payload)?,
                class_id: get_int(payload, 2)? as u16,
                method_id: get_int(payload, 2)? as u16,
            },
            (CLASS_CONNECTION, 51) => Method::ConnectionCloseOk,
            (CLASS_CHANNEL, 10) => {
                let _reserved_out_of_band = get_short_string(payload)?;
                Method::ChannelOpen
            }
            (CLASS_CHANNEL, 11) => {
                let _reserved_channel_id = get_long_string(payload)?;
                Method::ChannelOpenOk
            }
            (CLASS_CHANNEL, 40) => Method::ChannelClose {
                reply_code: get_int(payload, 2)? as u16,
                reply_text: get_short_string(payload)?,
                class_id: get_int(payload, 2)? as u16,
                method_id: get_int(payload, 2)? as u16,
            },
            (CLASS_CHANNEL, 41) => Method::ChannelCloseOk,
            other => {
                return Err(Error::Frame(format!(
                    "unknown method {}.{}",
                    other.0, other.1
                )))
            }
        };
        Ok(method)
    }
}

fn long_string_utf8(payload: &mut Bytes) -> Result<String> {
    String::from_utf8(get_long_string(payload)?)
        .map_err(|_| Error::Frame("long string is not valid UTF-8".to_string()))
}

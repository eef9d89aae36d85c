//! Error types for mqwire.

use thiserror::Error;

/// Reply code sent with a deliberate, successful `connection.close`.
pub const REPLY_SUCCESS: u16 = 200;

/// Main error type for all connection operations.
///
/// Connection-fatal errors (`Frame`, `UnexpectedFrame`, `Closed`, `Server`)
/// travel through the shutdown path and fan out to every close subscriber,
/// every open channel, and any in-flight RPC, so the type is `Clone`.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Transport or codec failure. Always fatal.
    #[error("frame could not be parsed or written: {0}")]
    Frame(String),

    /// Protocol violation on channel 0. Fatal.
    #[error("unexpected frame received on channel 0")]
    UnexpectedFrame,

    /// Method received for a channel already believed closed. Fatal.
    #[error("channel or connection is not open")]
    Closed,

    /// No SASL mechanism shared between client and server.
    #[error("SASL could not negotiate a shared mechanism")]
    Sasl,

    /// Server dropped the connection during the tune exchange. The protocol
    /// sends no explicit frame for authentication failure.
    #[error("username or password not allowed")]
    Credentials,

    /// `connection.open` was rejected for the requested vhost.
    #[error("no access to this vhost")]
    Vhost,

    /// An RPC response arrived that matched none of the expected types.
    /// Returned to the caller; does not shut the connection down.
    #[error("unexpected command received from server")]
    CommandInvalid,

    /// A server-initiated `connection.close` or `channel.close` with its
    /// reply code and text.
    #[error("closed by server: {text} (code {code})")]
    Server {
        /// AMQP reply code from the close method.
        code: u16,
        /// Human-readable reply text from the close method.
        text: String,
    },

    /// A connection URI that could not be parsed.
    #[error("invalid AMQP URI: {0}")]
    Uri(String),
}

impl Error {
    /// The AMQP reply code associated with this error.
    pub fn code(&self) -> u16 {
        match self {
            Error::Frame(_) => 501,
            Error::UnexpectedFrame => 505,
            Error::Closed => 504,
            Error::Sasl | Error::Credentials => 403,
            Error::Vhost => 530,
            Error::CommandInvalid => 503,
            Error::Server { code, .. } => *code,
            Error::Uri(_) => 502,
        }
    }

    /// True for errors that terminate the whole connection.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::Frame(_) | Error::UnexpectedFrame | Error::Closed | Error::Server { .. }
        )
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Frame(e.to_string())
    }
}

/// Result type alias using the mqwire [`Error`].
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reply_codes() {
        assert_eq!(Error::Frame("eof".into()).code(), 501);
        assert_eq!(Error::UnexpectedFrame.code(), 505);
        assert_eq!(Error::Closed.code(), 504);
        assert_eq!(Error::Sasl.code(), 403);
        assert_eq!(Error::Credentials.code(), 403);
        assert_eq!(Error::Vhost.code(), 530);
        assert_eq!(Error::CommandInvalid.code(), 503);
        assert_eq!(
            Error::Server {
                code: 320,
                text: "going down".into()
            }
            .code(),
            320
        );
    }

    #[test]
    fn test_fatal_classification() {
        assert!(Error::Frame("broken pipe".into()).is_fatal());
        assert!(Error::UnexpectedFrame.is_fatal());
        assert!(Error::Closed.is_fatal());
        assert!(Error::Server {
            code: 320,
            text: "bye".into()
        }
        .is_fatal());

        assert!(!Error::Sasl.is_fatal());
        assert!(!Error::Credentials.is_fatal());
        assert!(!Error::Vhost.is_fatal());
        assert!(!Error::CommandInvalid.is_fatal());
    }

    #[test]
    fn test_io_error_conversion() {
        let io = std::io::Error::new(std::io::ErrorKind::BrokenPipe, "pipe closed");
        let err: Error = io.into();
        assert!(matches!(err, Error::Frame(ref m) if m.contains("pipe closed")));
    }
}

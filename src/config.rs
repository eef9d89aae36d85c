//! Connection tuning configuration.

use std::sync::Arc;
use std::time::Duration;

use crate::auth::Sasl;

/// Desired tuning parameters for the opening handshake, and the negotiated
/// result afterwards.
///
/// Passed to [`Connection::open`](crate::Connection::open); the connection's
/// [`config()`](crate::Connection::config) accessor returns the same shape
/// with every field replaced by its negotiated value and `sasl` narrowed to
/// the mechanism that was actually used.
#[derive(Debug, Clone)]
pub struct Config {
    /// SASL mechanisms to offer, in preference order.
    pub sasl: Vec<Arc<dyn Sasl>>,
    /// Virtual host to open.
    pub vhost: String,
    /// Maximum channel count; 0 means unlimited.
    pub channel_max: u16,
    /// Maximum frame size in bytes; 0 means unlimited.
    pub frame_max: u32,
    /// Heartbeat interval; anything below one second disables heartbeats.
    pub heartbeat: Duration,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            sasl: Vec::new(),
            vhost: "/".to_string(),
            channel_max: 0,
            frame_max: 0,
            heartbeat: Duration::ZERO,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_requests_no_limits() {
        let config = Config::default();
        assert!(config.sasl.is_empty());
        assert_eq!(config.vhost, "/");
        assert_eq!(config.channel_max, 0);
        assert_eq!(config.frame_max, 0);
        assert_eq!(config.heartbeat, Duration::ZERO);
    }
}

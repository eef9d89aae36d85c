//! SASL mechanisms used during the opening handshake.
//!
//! The connection core only selects a mechanism and exchanges its opaque
//! response blob; it does not interpret the exchange. Mechanisms are
//! implemented as small objects behind the [`Sasl`] trait so callers can
//! supply their own.

use std::sync::Arc;

/// A SASL authentication mechanism.
///
/// `mechanism()` is the name offered to the server during `start-ok`;
/// `response()` is the opaque credential blob sent alongside it.
pub trait Sasl: Send + Sync {
    /// Mechanism name as it appears on the wire, e.g. `"PLAIN"`.
    fn mechanism(&self) -> &str;

    /// The response blob for this mechanism.
    fn response(&self) -> String;
}

impl std::fmt::Debug for dyn Sasl {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Sasl")
            .field("mechanism", &self.mechanism())
            .finish()
    }
}

/// PLAIN authentication: username and password joined by NUL separators.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plain {
    /// Account name.
    pub username: String,
    /// Account password, sent in the clear. Use a TLS transport in production.
    pub password: String,
}

impl Plain {
    /// Create a PLAIN mechanism from credentials.
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl Sasl for Plain {
    fn mechanism(&self) -> &str {
        "PLAIN"
    }

    fn response(&self) -> String {
        format!("\u{0}{}\u{0}{}", self.username, self.password)
    }
}

/// EXTERNAL authentication: identity is established out of band, typically
/// by a client certificate. The response blob is empty.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct External;

impl Sasl for External {
    fn mechanism(&self) -> &str {
        "EXTERNAL"
    }

    fn response(&self) -> String {
        String::new()
    }
}

/// Select a mechanism by intersecting the client's preference list with the
/// server's space-separated offer, preserving the client's priority order.
pub(crate) fn pick_mechanism(
    client: &[Arc<dyn Sasl>],
    server_mechanisms: &str,
) -> Option<Arc<dyn Sasl>> {
    let offered: Vec<&str> = server_mechanisms.split(' ').collect();
    client
        .iter()
        .find(|auth| offered.contains(&auth.mechanism()))
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_response_blob() {
        let plain = Plain::new("guest", "secret");
        assert_eq!(plain.mechanism(), "PLAIN");
        assert_eq!(plain.response(), "\u{0}guest\u{0}secret");
    }

    #[test]
    fn test_external_empty_response() {
        assert_eq!(External.mechanism(), "EXTERNAL");
        assert_eq!(External.response(), "");
    }

    #[test]
    fn test_pick_prefers_client_order() {
        let client: Vec<Arc<dyn Sasl>> =
            vec![Arc::new(External), Arc::new(Plain::new("u", "p"))];

        // Server offers both; the client's first preference wins.
        let chosen = pick_mechanism(&client, "PLAIN EXTERNAL AMQPLAIN").unwrap();
        assert_eq!(chosen.mechanism(), "EXTERNAL");

        // Server only offers PLAIN; fall through to the second preference.
        let chosen = pick_mechanism(&client, "PLAIN").unwrap();
        assert_eq!(chosen.mechanism(), "PLAIN");
    }

    #[test]
    fn test_pick_empty_intersection() {
        let client: Vec<Arc<dyn Sasl>> = vec![Arc::new(Plain::new("u", "p"))];
        assert!(pick_mechanism(&client, "EXTERNAL").is_none());
        assert!(pick_mechanism(&[], "PLAIN").is_none());
    }
}

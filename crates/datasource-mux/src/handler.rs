//! Generic response handlers
//!
//! Handlers see every inbound message that belongs to a live exchange, before
//! it is classified and delivered to the caller's sink.

use crate::wire::InboundMessage;
use tokio::sync::watch;

/// Observer of inbound responses
pub trait ResponseHandler: Send + Sync {
    /// Called once per dispatched message, in registration order
    fn on_response(&self, message: &InboundMessage);
}

impl<F> ResponseHandler for F
where
    F: Fn(&InboundMessage) + Send + Sync,
{
    fn on_response(&self, message: &InboundMessage) {
        self(message);
    }
}

/// Status the backend uses for an expired session
pub const AUTH_EXPIRED_STATUS: u16 = 401;

/// Flags session expiry when the backend answers 401
#[derive(Debug)]
pub struct AuthExpiryDetector {
    expired: watch::Sender<bool>,
}

impl AuthExpiryDetector {
    /// Create new detector in the not-expired state
    #[must_use]
    pub fn new() -> Self {
        let (expired, _) = watch::channel(false);
        Self { expired }
    }

    /// Watch the expiry flag
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<bool> {
        self.expired.subscribe()
    }

    /// Check if a 401 has been seen since the last reset
    #[inline]
    #[must_use]
    pub fn is_expired(&self) -> bool {
        *self.expired.borrow()
    }

    /// Clear the flag after re-authentication
    pub fn reset(&self) {
        self.expired.send_replace(false);
    }
}

impl Default for AuthExpiryDetector {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseHandler for AuthExpiryDetector {
    fn on_response(&self, message: &InboundMessage) {
        if message.status_code == Some(AUTH_EXPIRED_STATUS) && !self.is_expired() {
            tracing::warn!(id = %message.id(), "session expired");
            self.expired.send_replace(true);
        }
    }
}

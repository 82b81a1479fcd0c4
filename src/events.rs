//! Auth lifecycle event stream.
//!
//! The facade republishes every lifecycle callback of the underlying session
//! handle as an [`AuthEvent`] on a tokio broadcast channel. Any number of
//! observers may subscribe; events sent before subscription are not replayed.

use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Buffer size for the broadcast channel. Slow receivers lag past this many
/// undelivered events and start dropping the oldest.
const EVENT_BUFFER_SIZE: usize = 64;

/// Payload of an [`AuthEvent::AuthError`] event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuthErrorData {
    /// Provider error code, e.g. `invalid_grant`.
    pub error: String,
    /// Optional human-readable description from the provider.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

/// Auth lifecycle notification published by the facade.
///
/// Exactly one event kind per lifecycle hook of the session handle.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "args", rename_all = "camelCase")]
pub enum AuthEvent {
    /// Authentication failed.
    AuthError(AuthErrorData),
    /// The user was logged out.
    AuthLogout,
    /// A token refresh attempt failed.
    AuthRefreshError,
    /// A token refresh attempt succeeded.
    AuthRefreshSuccess,
    /// The user authenticated successfully.
    AuthSuccess,
    /// The session handle finished initializing; carries whether a user is
    /// authenticated.
    Ready { authenticated: bool },
    /// The access token passed its expiry time.
    TokenExpired,
}

/// Broadcast bus for [`AuthEvent`]s.
///
/// Thread-safe and cheap to clone; multiple subscribers receive every event
/// published after they subscribed. Publishing with no subscribers is not an
/// error.
#[derive(Clone)]
pub struct EventBroadcaster {
    sender: broadcast::Sender<AuthEvent>,
}

impl EventBroadcaster {
    /// Create a new broadcaster with the default buffer size.
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_BUFFER_SIZE);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// Returns the number of subscribers that received the event.
    pub fn publish(&self, event: AuthEvent) -> usize {
        self.sender.send(event).unwrap_or_default()
    }

    /// Subscribe to events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.sender.subscribe()
    }

    /// Number of active subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for EventBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBroadcaster")
            .field("subscriber_count", &self.subscriber_count())
            .finish()
    }
}

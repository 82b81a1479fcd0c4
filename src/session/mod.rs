//! Session-handle abstraction over the external identity client.
//!
//! The OIDC/OAuth2 handshake, PKCE, redirect handling, token storage and
//! cryptographic validation all live behind the [`Session`] trait; the facade
//! owns one live session and delegates to it. Bind this trait to an actual
//! OIDC client to talk to a real provider, or to a scripted double in tests.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::config::{InitOptions, KeycloakConfig};
use crate::error::SessionError;
use crate::events::AuthEvent;

/// Listener invoked by a session implementation for every lifecycle hook.
///
/// The facade registers exactly one listener at initialization time; it
/// republishes each event onto the shared broadcast stream.
pub type EventListener = Arc<dyn Fn(AuthEvent) + Send + Sync>;

/// Options for login and register redirects.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,

    /// Provider action hint, e.g. `register`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub locale: Option<String>,
}

impl LoginOptions {
    /// Default options for the registration flow.
    pub fn register() -> Self {
        Self {
            action: Some("register".to_owned()),
            ..Self::default()
        }
    }
}

/// Options for the logout redirect.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogoutOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,
}

/// Role list granted for one resource (client) or for the realm.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleAccess {
    #[serde(default)]
    pub roles: Vec<String>,
}

/// Mapping from resource name to its granted roles, in insertion order.
pub type ResourceAccess = IndexMap<String, RoleAccess>;

/// Snapshot of the authenticated user's profile attributes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_verified: Option<bool>,

    /// Free-form provider attributes not covered by the fields above.
    #[serde(default, skip_serializing_if = "serde_json::Map::is_empty")]
    pub attributes: serde_json::Map<String, serde_json::Value>,
}

/// One live connection with the identity provider.
///
/// All mutation of tokens and session state happens inside the
/// implementation; the facade only delegates and observes.
#[async_trait]
pub trait Session: Send + Sync {
    /// Perform the provider handshake. Returns whether a user is authenticated.
    async fn init(&self, options: &InitOptions) -> Result<bool, SessionError>;

    /// Start the login flow.
    async fn login(&self, options: &LoginOptions) -> Result<(), SessionError>;

    /// End the session, optionally redirecting afterwards.
    async fn logout(&self, options: &LogoutOptions) -> Result<(), SessionError>;

    /// Start the registration flow.
    async fn register(&self, options: &LoginOptions) -> Result<(), SessionError>;

    /// Whether a user is currently authenticated.
    fn authenticated(&self) -> bool;

    /// Whether the current token grants `role` for `resource` (the client
    /// itself when `resource` is `None`).
    fn has_resource_role(&self, role: &str, resource: Option<&str>) -> bool;

    /// Whether the current token grants the realm-level `role`.
    fn has_realm_role(&self, role: &str) -> bool;

    /// Per-resource role grants from the current token.
    fn resource_access(&self) -> ResourceAccess;

    /// Realm-level role grants from the current token.
    fn realm_access(&self) -> Option<RoleAccess>;

    /// Whether the token expires within `min_validity_secs` seconds.
    fn is_token_expired(&self, min_validity_secs: u32) -> bool;

    /// Refresh the token if it expires within `min_validity_secs` seconds.
    /// Returns whether a refresh actually happened.
    async fn update_token(&self, min_validity_secs: u32) -> Result<bool, SessionError>;

    /// Fetch the user profile from the provider.
    async fn load_profile(&self) -> Result<UserProfile, SessionError>;

    /// Current raw access token, if any.
    fn token(&self) -> Option<String>;

    /// Discard the stored token.
    fn clear_token(&self);

    /// Register the single lifecycle listener. Replaces any previous one.
    fn set_event_listener(&self, listener: EventListener);
}

/// Builds session handles from connection parameters.
///
/// The facade calls this exactly once, during `init`.
pub trait SessionFactory: Send + Sync {
    fn create(&self, config: &KeycloakConfig) -> Result<Arc<dyn Session>, SessionError>;
}

impl<F> SessionFactory for F
where
    F: Fn(&KeycloakConfig) -> Result<Arc<dyn Session>, SessionError> + Send + Sync,
{
    fn create(&self, config: &KeycloakConfig) -> Result<Arc<dyn Session>, SessionError> {
        self(config)
    }
}

/// Remaining time until `expires_at`, or `None` if already past.
pub fn time_until_expiry(expires_at: DateTime<Utc>) -> Option<Duration> {
    let now = Utc::now();
    if expires_at > now {
        Some(expires_at - now)
    } else {
        None
    }
}

/// Whether `expires_at` lies within `min_validity_secs` seconds from now.
pub fn expires_within(expires_at: DateTime<Utc>, min_validity_secs: u32) -> bool {
    expires_at - Duration::seconds(i64::from(min_validity_secs)) <= Utc::now()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_defaults_action() {
        let options = LoginOptions::register();
        assert_eq!(options.action.as_deref(), Some("register"));
        assert!(options.redirect_uri.is_none());
    }

    #[test]
    fn test_time_until_expiry() {
        let future = Utc::now() + Duration::hours(1);
        let remaining = time_until_expiry(future);
        assert!(remaining.is_some());
        assert!(remaining.unwrap().num_minutes() > 55);

        let past = Utc::now() - Duration::hours(1);
        assert!(time_until_expiry(past).is_none());
    }

    #[test]
    fn test_expires_within() {
        let soon = Utc::now() + Duration::seconds(10);
        assert!(expires_within(soon, 20));
        assert!(!expires_within(soon, 0));

        let past = Utc::now() - Duration::seconds(1);
        assert!(expires_within(past, 0));
    }

    #[test]
    fn test_profile_camel_case() {
        let json = serde_json::json!({
            "username": "jdoe",
            "firstName": "Jane",
            "lastName": "Doe",
            "emailVerified": true,
            "attributes": { "locale": "en" }
        });
        let profile: UserProfile = serde_json::from_value(json).unwrap();
        assert_eq!(profile.username.as_deref(), Some("jdoe"));
        assert_eq!(profile.first_name.as_deref(), Some("Jane"));
        assert_eq!(profile.attributes["locale"], "en");
    }

    #[test]
    fn test_resource_access_preserves_insertion_order() {
        let mut access = ResourceAccess::new();
        access.insert("billing".into(), RoleAccess { roles: vec!["viewer".into()] });
        access.insert("account".into(), RoleAccess { roles: vec!["admin".into()] });

        let keys: Vec<_> = access.keys().cloned().collect();
        assert_eq!(keys, vec!["billing".to_owned(), "account".to_owned()]);
    }
}

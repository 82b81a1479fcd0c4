//! Scriptable session double and logging bring-up for facade tests.

use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::config::{InitOptions, KeycloakConfig};
use crate::error::SessionError;
use crate::events::AuthEvent;
use crate::session::{
    expires_within, EventListener, LoginOptions, LogoutOptions, ResourceAccess, RoleAccess,
    Session, SessionFactory, UserProfile,
};

/// Install a logging subscriber for test runs, honoring `RUST_LOG`.
///
/// Only the first call installs; later calls are no-ops.
pub fn init_test_logging() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// A session handle whose behavior is scripted by the test.
///
/// Records every delegated call so tests can assert on delegation order and
/// argument values, and can emit lifecycle events through the registered
/// listener like a real client would.
#[derive(Default)]
pub struct MockSession {
    pub authenticated: AtomicBool,
    pub token: Mutex<Option<String>>,
    /// Expiry instant the token is scripted with. `None` means never expires.
    pub token_expires_at: Mutex<Option<DateTime<Utc>>>,

    pub resource_access: Mutex<ResourceAccess>,
    pub realm_access: Mutex<Option<RoleAccess>>,
    pub profile: Mutex<UserProfile>,

    /// Error returned by the next `update_token` call, if set.
    pub refresh_error: Mutex<Option<SessionError>>,
    /// Error returned by the next `load_profile` call, if set.
    pub profile_error: Mutex<Option<SessionError>>,

    pub profile_loads: AtomicUsize,
    pub update_token_calls: Mutex<Vec<u32>>,
    pub last_login: Mutex<Option<LoginOptions>>,
    pub last_logout: Mutex<Option<LogoutOptions>>,
    pub last_register: Mutex<Option<LoginOptions>>,
    pub cleared_token: AtomicBool,

    listener: Mutex<Option<EventListener>>,
}

impl MockSession {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn with_authenticated(self: Arc<Self>, value: bool) -> Arc<Self> {
        self.set_authenticated(value);
        self
    }

    pub fn with_token(self: Arc<Self>, token: &str) -> Arc<Self> {
        *self.token.lock() = Some(token.to_owned());
        self
    }

    pub fn with_profile(self: Arc<Self>, profile: UserProfile) -> Arc<Self> {
        *self.profile.lock() = profile;
        self
    }

    pub fn set_authenticated(&self, value: bool) {
        self.authenticated.store(value, Ordering::SeqCst);
    }

    pub fn set_token_expired(&self, value: bool) {
        let expires_at = if value {
            Utc::now() - Duration::minutes(1)
        } else {
            Utc::now() + Duration::hours(1)
        };
        self.set_token_expires_at(expires_at);
    }

    pub fn set_token_expires_at(&self, expires_at: DateTime<Utc>) {
        *self.token_expires_at.lock() = Some(expires_at);
    }

    /// Invoke the registered lifecycle listener, as the real client would.
    pub fn emit(&self, event: AuthEvent) {
        if let Some(listener) = self.listener.lock().clone() {
            listener(event);
        }
    }
}

#[async_trait]
impl Session for MockSession {
    async fn init(&self, _options: &InitOptions) -> Result<bool, SessionError> {
        let authenticated = self.authenticated.load(Ordering::SeqCst);
        self.emit(AuthEvent::Ready { authenticated });
        Ok(authenticated)
    }

    async fn login(&self, options: &LoginOptions) -> Result<(), SessionError> {
        *self.last_login.lock() = Some(options.clone());
        self.set_authenticated(true);
        Ok(())
    }

    async fn logout(&self, options: &LogoutOptions) -> Result<(), SessionError> {
        *self.last_logout.lock() = Some(options.clone());
        self.set_authenticated(false);
        Ok(())
    }

    async fn register(&self, options: &LoginOptions) -> Result<(), SessionError> {
        *self.last_register.lock() = Some(options.clone());
        Ok(())
    }

    fn authenticated(&self) -> bool {
        self.authenticated.load(Ordering::SeqCst)
    }

    fn has_resource_role(&self, role: &str, resource: Option<&str>) -> bool {
        let access = self.resource_access.lock();
        match resource {
            Some(resource) => access
                .get(resource)
                .is_some_and(|a| a.roles.iter().any(|r| r == role)),
            None => false,
        }
    }

    fn has_realm_role(&self, role: &str) -> bool {
        self.realm_access
            .lock()
            .as_ref()
            .is_some_and(|a| a.roles.iter().any(|r| r == role))
    }

    fn resource_access(&self) -> ResourceAccess {
        self.resource_access.lock().clone()
    }

    fn realm_access(&self) -> Option<RoleAccess> {
        self.realm_access.lock().clone()
    }

    fn is_token_expired(&self, min_validity_secs: u32) -> bool {
        let expires_at = *self.token_expires_at.lock();
        expires_at.is_some_and(|at| expires_within(at, min_validity_secs))
    }

    async fn update_token(&self, min_validity_secs: u32) -> Result<bool, SessionError> {
        self.update_token_calls.lock().push(min_validity_secs);
        if let Some(error) = self.refresh_error.lock().take() {
            return Err(error);
        }
        Ok(true)
    }

    async fn load_profile(&self) -> Result<UserProfile, SessionError> {
        self.profile_loads.fetch_add(1, Ordering::SeqCst);
        if let Some(error) = self.profile_error.lock().take() {
            return Err(error);
        }
        Ok(self.profile.lock().clone())
    }

    fn token(&self) -> Option<String> {
        self.token.lock().clone()
    }

    fn clear_token(&self) {
        self.cleared_token.store(true, Ordering::SeqCst);
        *self.token.lock() = None;
    }

    fn set_event_listener(&self, listener: EventListener) {
        *self.listener.lock() = Some(listener);
    }
}

/// Factory that always hands out the given mock session.
pub fn mock_factory(session: Arc<MockSession>) -> impl SessionFactory {
    move |_config: &KeycloakConfig| Ok(Arc::clone(&session) as Arc<dyn Session>)
}

/// A profile with just a username, for cache tests.
pub fn profile_with_username(username: &str) -> UserProfile {
    UserProfile {
        username: Some(username.to_owned()),
        ..UserProfile::default()
    }
}

/// Minimal well-formed options for facade tests.
pub fn test_options() -> crate::config::KeycloakOptions {
    crate::config::KeycloakOptions::new(KeycloakConfig {
        url: "https://id.example/auth/".parse().unwrap(),
        realm: "test-realm".to_owned(),
        client_id: "test-client".to_owned(),
    })
}

//! The auth facade.
//!
//! [`KeycloakAuth`] owns one live session handle, translates its lifecycle
//! callbacks into the broadcast event stream, and exposes async operations
//! for init, login/logout, token refresh, role inspection and profile
//! loading. An HTTP-layer collaborator queries [`KeycloakAuth::excluded_urls`]
//! and [`KeycloakAuth::enable_bearer_interceptor`] and calls
//! [`KeycloakAuth::add_token_to_header`] per outgoing request.

use http::header::{HeaderMap, HeaderName, HeaderValue};
use parking_lot::RwLock;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::config::{Flow, KeycloakOptions};
use crate::error::AuthError;
use crate::events::{AuthEvent, EventBroadcaster};
use crate::interceptor::ExcludedUrlRule;
use crate::session::{
    LoginOptions, LogoutOptions, Session, SessionFactory, UserProfile,
};

/// Interceptor settings derived once from [`KeycloakOptions`] during `init`.
struct Settings {
    enable_bearer_interceptor: bool,
    load_user_profile_at_start_up: bool,
    authorization_header_name: HeaderName,
    /// Configured prefix, trimmed and given exactly one trailing space.
    bearer_prefix: String,
    excluded_urls: Vec<ExcludedUrlRule>,
    silent_refresh: bool,
}

impl Settings {
    fn derive(options: &KeycloakOptions) -> Result<Self, AuthError> {
        let authorization_header_name =
            HeaderName::from_bytes(options.authorization_header_name.as_bytes()).map_err(
                |e| AuthError::InvalidHeader(format!("{}: {e}", options.authorization_header_name)),
            )?;

        Ok(Self {
            enable_bearer_interceptor: options.enable_bearer_interceptor,
            load_user_profile_at_start_up: options.load_user_profile_at_start_up,
            authorization_header_name,
            bearer_prefix: format!("{} ", options.bearer_prefix.trim()),
            excluded_urls: ExcludedUrlRule::compile_all(&options.bearer_excluded_urls)?,
            silent_refresh: options.init_options.flow == Some(Flow::Implicit),
        })
    }
}

/// Facade over one Keycloak session handle.
///
/// Constructed once at application bootstrap (process-wide singleton scope)
/// with the factory that binds the actual OIDC client, then initialized with
/// [`KeycloakAuth::init`]. All other operations fail with
/// [`AuthError::NotInitialized`] until `init` completes. Overlapping calls to
/// `init` or `logout` racing with in-flight operations are not serialized
/// here; callers must do that themselves.
pub struct KeycloakAuth {
    factory: Box<dyn SessionFactory>,
    session: RwLock<Option<Arc<dyn Session>>>,
    profile: RwLock<Option<UserProfile>>,
    settings: RwLock<Option<Settings>>,
    events: EventBroadcaster,
}

impl KeycloakAuth {
    /// Create an uninitialized facade around a session factory.
    pub fn new(factory: impl SessionFactory + 'static) -> Self {
        Self {
            factory: Box::new(factory),
            session: RwLock::new(None),
            profile: RwLock::new(None),
            settings: RwLock::new(None),
            events: EventBroadcaster::new(),
        }
    }

    /// Initialize the facade and the underlying session handle.
    ///
    /// Derives interceptor settings, compiles excluded-URL rules, constructs
    /// the session from the connection config, wires its lifecycle callbacks
    /// onto the event stream, then delegates to the session's own
    /// initialization. Returns whether the session is authenticated. Any
    /// failure from the underlying initialization propagates unchanged.
    pub async fn init(&self, options: KeycloakOptions) -> Result<bool, AuthError> {
        let settings = Settings::derive(&options)?;
        let load_profile_at_startup = settings.load_user_profile_at_start_up;
        *self.settings.write() = Some(settings);

        let session = self.factory.create(&options.config)?;

        let events = self.events.clone();
        session.set_event_listener(Arc::new(move |event: AuthEvent| {
            events.publish(event);
        }));

        *self.session.write() = Some(Arc::clone(&session));

        let authenticated = session.init(&options.init_options).await?;
        info!(
            realm = %options.config.realm,
            client_id = %options.config.client_id,
            authenticated,
            "Keycloak session initialized"
        );

        if authenticated && load_profile_at_startup {
            self.load_user_profile(false).await?;
        }

        Ok(authenticated)
    }

    /// Start the login flow. Eagerly loads the profile when configured.
    pub async fn login(&self, options: LoginOptions) -> Result<(), AuthError> {
        let session = self.session()?;
        session.login(&options).await?;

        if self.load_profile_at_startup() {
            self.load_user_profile(false).await?;
        }

        Ok(())
    }

    /// End the session, optionally redirecting to `redirect_uri` afterwards.
    /// Always clears the cached profile on completion.
    pub async fn logout(&self, redirect_uri: Option<&str>) -> Result<(), AuthError> {
        let session = self.session()?;
        let options = LogoutOptions {
            redirect_uri: redirect_uri.map(str::to_owned),
        };

        session.logout(&options).await?;
        *self.profile.write() = None;
        info!("Logged out, cached profile cleared");

        Ok(())
    }

    /// Start the registration flow. Defaults the provider action to
    /// `register` when no options are given.
    pub async fn register(&self, options: Option<LoginOptions>) -> Result<(), AuthError> {
        let session = self.session()?;
        let options = options.unwrap_or_else(LoginOptions::register);
        session.register(&options).await?;
        Ok(())
    }

    /// Whether the current token grants `role`, checked against the given
    /// resource first and the realm as a fallback.
    pub fn is_user_in_role(&self, role: &str, resource: Option<&str>) -> Result<bool, AuthError> {
        let session = self.session()?;
        Ok(session.has_resource_role(role, resource) || session.has_realm_role(role))
    }

    /// All client roles from the resource-access map, in per-resource
    /// insertion order; realm roles appended last when `include_realm_roles`.
    pub fn get_user_roles(&self, include_realm_roles: bool) -> Result<Vec<String>, AuthError> {
        let session = self.session()?;

        let mut roles: Vec<String> = Vec::new();
        for (_, access) in session.resource_access() {
            roles.extend(access.roles);
        }

        if include_realm_roles {
            if let Some(realm) = session.realm_access() {
                roles.extend(realm.roles);
            }
        }

        Ok(roles)
    }

    /// Whether a user is logged in with a token valid for at least 20 more
    /// seconds. The only operation that swallows failures: any error becomes
    /// `false`.
    pub async fn is_logged_in(&self) -> bool {
        let Ok(session) = self.session() else {
            return false;
        };
        if !session.authenticated() {
            return false;
        }

        match self.update_token(20).await {
            Ok(_) => true,
            Err(e) => {
                warn!(error = %e, "Treating user as logged out after failed token refresh");
                false
            }
        }
    }

    /// Whether the token expires within `min_validity_secs` seconds. Pure
    /// delegation to the session handle.
    pub fn is_token_expired(&self, min_validity_secs: u32) -> Result<bool, AuthError> {
        let session = self.session()?;
        Ok(session.is_token_expired(min_validity_secs))
    }

    /// Refresh the token if it is within `min_validity_secs` seconds of
    /// expiry.
    ///
    /// Under the implicit flow the adapter cannot refresh without a visible
    /// redirect, so an expiry check substitutes for the network refresh: an
    /// expired token fails with [`AuthError::RefreshFailed`], a live one
    /// reports success without contacting the provider.
    pub async fn update_token(&self, min_validity_secs: u32) -> Result<bool, AuthError> {
        if self.silent_refresh() {
            let session = self.session()?;
            if session.is_token_expired(0) {
                return Err(AuthError::RefreshFailed);
            }
            return Ok(true);
        }

        let session = self.session()?;
        let refreshed = session.update_token(min_validity_secs).await?;
        debug!(min_validity_secs, refreshed, "Token refresh delegated to session");
        Ok(refreshed)
    }

    /// Load and cache the user profile. Returns the cached snapshot unless
    /// `force_reload`; fails with [`AuthError::NotAuthenticated`] when no
    /// user session exists.
    pub async fn load_user_profile(&self, force_reload: bool) -> Result<UserProfile, AuthError> {
        if !force_reload {
            if let Some(profile) = self.profile.read().clone() {
                return Ok(profile);
            }
        }

        let session = self.session()?;
        if !session.authenticated() {
            return Err(AuthError::NotAuthenticated);
        }

        let profile = session.load_profile().await?;
        info!(username = profile.username.as_deref().unwrap_or(""), "User profile loaded");
        *self.profile.write() = Some(profile.clone());

        Ok(profile)
    }

    /// Refresh (10-second minimum validity) and return the current raw token.
    pub async fn get_token(&self) -> Result<Option<String>, AuthError> {
        self.update_token(10).await?;
        Ok(self.session()?.token())
    }

    /// The username field of the cached profile. Fails with
    /// [`AuthError::ProfileNotLoaded`] when no profile has been loaded yet.
    pub fn get_username(&self) -> Result<Option<String>, AuthError> {
        let guard = self.profile.read();
        let profile = guard.as_ref().ok_or(AuthError::ProfileNotLoaded)?;
        Ok(profile.username.clone())
    }

    /// Discard the session's stored token. Leaves the cached profile alone.
    pub fn clear_token(&self) -> Result<(), AuthError> {
        self.session()?.clear_token();
        Ok(())
    }

    /// Return a copy of `headers` with the authorization header attached
    /// (configured name, prefix + token) when a token exists, else an
    /// unchanged copy. The input is never mutated.
    pub async fn add_token_to_header(&self, headers: &HeaderMap) -> Result<HeaderMap, AuthError> {
        let token = self.get_token().await?;
        let mut headers = headers.clone();

        if let Some(token) = token {
            let (name, prefix) = {
                let guard = self.settings.read();
                let settings = guard.as_ref().ok_or(AuthError::NotInitialized)?;
                (
                    settings.authorization_header_name.clone(),
                    settings.bearer_prefix.clone(),
                )
            };
            let value = HeaderValue::from_str(&format!("{prefix}{token}"))
                .map_err(|e| AuthError::InvalidHeader(e.to_string()))?;
            headers.insert(name, value);
        }

        Ok(headers)
    }

    /// Compiled excluded-URL rules. Empty before `init`.
    pub fn excluded_urls(&self) -> Vec<ExcludedUrlRule> {
        self.settings
            .read()
            .as_ref()
            .map(|s| s.excluded_urls.clone())
            .unwrap_or_default()
    }

    /// Whether the bearer interceptor should attach tokens. False before
    /// `init`.
    pub fn enable_bearer_interceptor(&self) -> bool {
        self.settings
            .read()
            .as_ref()
            .map(|s| s.enable_bearer_interceptor)
            .unwrap_or(false)
    }

    /// The live session handle, if `init` has completed.
    ///
    /// Escape hatch for capabilities the facade does not wrap.
    pub fn session_handle(&self) -> Option<Arc<dyn Session>> {
        self.session.read().as_ref().map(Arc::clone)
    }

    /// The shared auth event broadcaster.
    pub fn events(&self) -> &EventBroadcaster {
        &self.events
    }

    /// Subscribe to auth lifecycle events published after this call.
    pub fn subscribe(&self) -> broadcast::Receiver<AuthEvent> {
        self.events.subscribe()
    }

    fn session(&self) -> Result<Arc<dyn Session>, AuthError> {
        self.session
            .read()
            .as_ref()
            .map(Arc::clone)
            .ok_or(AuthError::NotInitialized)
    }

    fn load_profile_at_startup(&self) -> bool {
        self.settings
            .read()
            .as_ref()
            .map(|s| s.load_user_profile_at_start_up)
            .unwrap_or(false)
    }

    fn silent_refresh(&self) -> bool {
        self.settings
            .read()
            .as_ref()
            .map(|s| s.silent_refresh)
            .unwrap_or(false)
    }
}

impl std::fmt::Debug for KeycloakAuth {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeycloakAuth")
            .field("initialized", &self.session.read().is_some())
            .field("profile_cached", &self.profile.read().is_some())
            .finish()
    }
}

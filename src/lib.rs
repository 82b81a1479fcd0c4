//! Framework-agnostic facade over a Keycloak/OIDC session client.
//!
//! The facade owns one instance of an external identity client (behind the
//! [`session::Session`] trait), translates its lifecycle callbacks into a
//! typed broadcast event stream, and exposes async operations for
//! initialization, login/logout, registration, token refresh, role
//! inspection and profile loading. An HTTP-layer collaborator uses the
//! interceptor accessors and [`KeycloakAuth::add_token_to_header`] to attach
//! bearer tokens to outgoing requests not matching an excluded-URL rule.
//!
//! The OIDC/OAuth2 handshake, PKCE, token storage and cryptographic
//! validation are the session implementation's concern, not this crate's.
//!
//! ```no_run
//! # use keycloak_facade::{KeycloakAuth, KeycloakConfig, KeycloakOptions, OnLoad};
//! # async fn run(factory: impl keycloak_facade::session::SessionFactory + 'static) -> anyhow::Result<()> {
//! let auth = KeycloakAuth::new(factory);
//!
//! let mut options = KeycloakOptions::new(KeycloakConfig {
//!     url: "https://id.example/auth/".parse()?,
//!     realm: "my-realm".into(),
//!     client_id: "web-client".into(),
//! });
//! options.init_options.on_load = Some(OnLoad::LoginRequired);
//!
//! let authenticated = auth.init(options).await?;
//! if authenticated {
//!     let profile = auth.load_user_profile(false).await?;
//!     println!("signed in as {:?}", profile.username);
//! }
//! # Ok(())
//! # }
//! ```

#![deny(clippy::all)]

pub mod config;
pub mod error;
pub mod events;
mod facade;
pub mod interceptor;
pub mod session;

#[cfg(test)]
pub(crate) mod testing;

pub use config::{
    ExcludedUrl, ExcludedUrlEntry, Flow, InitOptions, KeycloakConfig, KeycloakOptions, OnLoad,
    PkceMethod,
};
pub use error::{AuthError, SessionError};
pub use events::{AuthErrorData, AuthEvent, EventBroadcaster};
pub use facade::KeycloakAuth;
pub use interceptor::{is_excluded, ExcludedUrlRule};
pub use session::{LoginOptions, LogoutOptions, UserProfile};

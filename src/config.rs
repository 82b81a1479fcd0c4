//! Configuration types for the auth facade.
//!
//! [`KeycloakOptions`] is the single structured input to
//! [`crate::KeycloakAuth::init`]. It can be built in code, deserialized from
//! TOML/JSON, or loaded from a TOML file with environment variable overrides.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::Path;
use url::Url;

/// Identity-provider connection parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeycloakConfig {
    /// Base URL of the Keycloak server, e.g. `https://id.example/auth/`.
    pub url: Url,
    /// Realm to authenticate against.
    pub realm: String,
    /// Client identifier registered in the realm.
    pub client_id: String,
}

/// Behavior on facade initialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OnLoad {
    /// Redirect to the login page if no active session exists.
    #[serde(rename = "login-required")]
    LoginRequired,
    /// Check for an existing session without forcing a login.
    #[serde(rename = "check-sso")]
    CheckSso,
}

/// OAuth2 flow used by the underlying client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Flow {
    #[default]
    Standard,
    Implicit,
    Hybrid,
}

/// PKCE challenge method, passed through opaquely to the session handle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PkceMethod {
    S256,
}

/// Options forwarded to the session handle's own initialization.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitOptions {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub on_load: Option<OnLoad>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pkce_method: Option<PkceMethod>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub flow: Option<Flow>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub redirect_uri: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub silent_check_sso_redirect_uri: Option<String>,
}

/// An excluded-URL entry given with an explicit HTTP method allow-list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExcludedUrl {
    /// Pattern matched (case-insensitively) against the request URL.
    pub url: String,
    /// Methods the exclusion applies to. Empty means every method.
    #[serde(default)]
    pub http_methods: Vec<String>,
}

/// One entry of the excluded-URL list: either a bare pattern string or a
/// pattern with an explicit method allow-list.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ExcludedUrlEntry {
    Pattern(String),
    Rule(ExcludedUrl),
}

impl From<&str> for ExcludedUrlEntry {
    fn from(pattern: &str) -> Self {
        Self::Pattern(pattern.to_owned())
    }
}

impl From<ExcludedUrl> for ExcludedUrlEntry {
    fn from(rule: ExcludedUrl) -> Self {
        Self::Rule(rule)
    }
}

/// Full structured input to [`crate::KeycloakAuth::init`]. Immutable after init.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct KeycloakOptions {
    /// Connection parameters for the identity provider.
    pub config: KeycloakConfig,

    /// Options forwarded to the session handle's initialization.
    #[serde(default)]
    pub init_options: InitOptions,

    /// Whether the bearer interceptor should attach tokens to requests.
    #[serde(default = "default_true")]
    pub enable_bearer_interceptor: bool,

    /// Whether to eagerly load the user profile once authenticated.
    #[serde(default)]
    pub load_user_profile_at_start_up: bool,

    /// Request URL patterns exempt from bearer-token attachment.
    #[serde(default)]
    pub bearer_excluded_urls: Vec<ExcludedUrlEntry>,

    /// Header the token is attached under.
    #[serde(default = "default_header_name")]
    pub authorization_header_name: String,

    /// Prefix placed before the raw token in the header value.
    #[serde(default = "default_bearer_prefix")]
    pub bearer_prefix: String,
}

fn default_true() -> bool {
    true
}

fn default_header_name() -> String {
    "Authorization".to_owned()
}

fn default_bearer_prefix() -> String {
    "Bearer".to_owned()
}

impl KeycloakOptions {
    /// Create options for the given connection config with all defaults.
    pub fn new(config: KeycloakConfig) -> Self {
        Self {
            config,
            init_options: InitOptions::default(),
            enable_bearer_interceptor: true,
            load_user_profile_at_start_up: false,
            bearer_excluded_urls: Vec::new(),
            authorization_header_name: default_header_name(),
            bearer_prefix: default_bearer_prefix(),
        }
    }

    /// Load options from a TOML file with environment variable overrides.
    ///
    /// `KEYCLOAK_URL`, `KEYCLOAK_REALM` and `KEYCLOAK_CLIENT_ID` override the
    /// corresponding connection parameters when set.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let raw = std::fs::read_to_string(path.as_ref()).with_context(|| {
            format!("Failed to read config file {}", path.as_ref().display())
        })?;
        Self::from_toml_str(&raw)
    }

    /// Parse options from a TOML document with environment variable overrides.
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let mut options: Self = toml::from_str(raw).context("Failed to parse Keycloak config")?;

        if let Ok(url) = env::var("KEYCLOAK_URL") {
            options.config.url = url
                .parse()
                .context("KEYCLOAK_URL is not a valid URL")?;
        }

        if let Ok(realm) = env::var("KEYCLOAK_REALM") {
            options.config.realm = realm;
        }

        if let Ok(client_id) = env::var("KEYCLOAK_CLIENT_ID") {
            options.config.client_id = client_id;
        }

        options.validate()?;

        Ok(options)
    }

    /// Validate that required configuration is present.
    fn validate(&self) -> Result<()> {
        if self.config.realm.is_empty() || self.config.realm == "YOUR_REALM" {
            anyhow::bail!(
                "Keycloak realm not configured. Set KEYCLOAK_REALM environment variable \
                 or update the config file"
            );
        }

        if self.config.client_id.is_empty() || self.config.client_id == "YOUR_CLIENT_ID" {
            anyhow::bail!(
                "Keycloak client_id not configured. Set KEYCLOAK_CLIENT_ID environment \
                 variable or update the config file"
            );
        }

        Ok(())
    }
}

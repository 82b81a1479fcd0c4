//! Compiled excluded-URL rules for the bearer interceptor.
//!
//! The HTTP-layer collaborator consults these to decide which outgoing
//! requests are exempt from bearer-token attachment. Rules are compiled once
//! during `init` and read-only afterwards.

use http::Method;
use regex::{Regex, RegexBuilder};
use tracing::debug;

use crate::config::ExcludedUrlEntry;
use crate::error::AuthError;

/// A compiled excluded-URL matcher.
#[derive(Debug, Clone)]
pub struct ExcludedUrlRule {
    pattern: Regex,
    methods: Vec<Method>,
}

impl ExcludedUrlRule {
    /// Compile one configured entry.
    ///
    /// Bare pattern strings match case-insensitively against any HTTP method;
    /// `{url, http_methods}` entries retain the exact method list.
    pub fn compile(entry: &ExcludedUrlEntry) -> Result<Self, AuthError> {
        let (raw_pattern, raw_methods): (&str, &[String]) = match entry {
            ExcludedUrlEntry::Pattern(pattern) => (pattern, &[]),
            ExcludedUrlEntry::Rule(rule) => (&rule.url, &rule.http_methods),
        };

        let pattern = RegexBuilder::new(raw_pattern)
            .case_insensitive(true)
            .build()
            .map_err(|e| {
                AuthError::Config(format!("Invalid excluded-URL pattern {raw_pattern:?}: {e}"))
            })?;

        let methods = raw_methods
            .iter()
            .map(|m| {
                m.to_ascii_uppercase().parse::<Method>().map_err(|_| {
                    AuthError::Config(format!("Invalid HTTP method {m:?} in excluded-URL rule"))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { pattern, methods })
    }

    /// Compile the whole configured list.
    pub fn compile_all(entries: &[ExcludedUrlEntry]) -> Result<Vec<Self>, AuthError> {
        entries.iter().map(Self::compile).collect()
    }

    /// The source pattern this rule was compiled from.
    pub fn pattern(&self) -> &str {
        self.pattern.as_str()
    }

    /// Methods this rule applies to. Empty means every method.
    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    /// Whether a request with the given method and URL is exempt from
    /// bearer-token attachment under this rule.
    pub fn matches(&self, method: &Method, url: &str) -> bool {
        self.pattern.is_match(url) && (self.methods.is_empty() || self.methods.contains(method))
    }
}

/// Whether any rule in `rules` exempts the given request.
pub fn is_excluded(rules: &[ExcludedUrlRule], method: &Method, url: &str) -> bool {
    let excluded = rules.iter().any(|rule| rule.matches(method, url));
    if excluded {
        debug!(%method, url, "Request matches an excluded-URL rule, skipping bearer token");
    }
    excluded
}

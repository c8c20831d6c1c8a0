//! Request intake and resolved request templates.
//!
//! [`Request`] is the wire shape clients submit; [`RequestTemplate`] is what a
//! provider produces from it and what chunk workers copy for each attempt.

use chrono::{DateTime, Datelike, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

/// Same-site policy of a browser cookie.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SameSite {
    /// Cross-site requests allowed.
    NoRestriction,
    /// Sent on top-level navigation.
    Lax,
    /// Same-site requests only.
    Strict,
    /// Browser default.
    #[default]
    #[serde(other)]
    Unspecified,
}

/// A browser cookie attached to a request.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    /// Cookie name.
    pub name: String,
    /// Cookie value.
    pub value: String,
    /// Path scope (empty matches every path).
    #[serde(default)]
    pub path: String,
    /// Domain scope (empty matches every host).
    #[serde(default)]
    pub domain: String,
    /// Expiry; `None` for session cookies.
    #[serde(default)]
    pub expiration_date: Option<DateTime<Utc>>,
    /// Only sent over https.
    #[serde(default)]
    pub secure: bool,
    /// Not visible to scripts; informational here.
    #[serde(default)]
    pub http_only: bool,
    /// Same-site policy.
    #[serde(default)]
    pub same_site: SameSite,
}

impl Cookie {
    /// Create a session cookie with no scope restrictions.
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            value: value.into(),
            path: String::new(),
            domain: String::new(),
            expiration_date: None,
            secure: false,
            http_only: false,
            same_site: SameSite::Unspecified,
        }
    }

    /// Restrict to a domain.
    #[must_use]
    pub fn with_domain(mut self, domain: impl Into<String>) -> Self {
        self.domain = domain.into();
        self
    }

    /// Restrict to a path prefix.
    #[must_use]
    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.path = path.into();
        self
    }

    /// Set the expiry.
    #[must_use]
    pub const fn with_expiration(mut self, at: DateTime<Utc>) -> Self {
        self.expiration_date = Some(at);
        self
    }

    /// Require https.
    #[must_use]
    pub const fn secure(mut self) -> Self {
        self.secure = true;
        self
    }

    /// Whether the cookie has expired at `now`.
    ///
    /// Zero timestamps (year 1) mark session cookies.
    #[must_use]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        match self.expiration_date {
            Some(at) if at.year() > 1 => at <= now,
            _ => false,
        }
    }

    /// Whether the cookie's domain, path and secure attributes allow sending it to `url`.
    #[must_use]
    pub fn matches(&self, url: &Url) -> bool {
        if self.secure && url.scheme() != "https" {
            return false;
        }

        let domain = self.domain.trim_start_matches('.').to_ascii_lowercase();
        if !domain.is_empty() {
            let Some(host) = url.host_str() else {
                return false;
            };
            let host = host.to_ascii_lowercase();
            let suffix_match = host.len() > domain.len()
                && host.ends_with(&domain)
                && host.as_bytes()[host.len() - domain.len() - 1] == b'.';
            if host != domain && !suffix_match {
                return false;
            }
        }

        self.path.is_empty() || url.path().starts_with(&self.path)
    }
}

/// A new transfer intent as submitted by a client.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    /// Source URL.
    pub url: String,
    /// Provider name; empty selects the configured default.
    #[serde(default)]
    pub provider: String,
    /// Identity of the submitting client or tool.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub client: Option<String>,
    /// Media type override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mime_type: Option<String>,
    /// User-agent override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Cookies captured alongside the link.
    #[serde(default)]
    pub cookies: Vec<Cookie>,
    /// Preferred chunk count override.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chunks: Option<u32>,
}

impl Request {
    /// Create a request for a URL with default settings.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            provider: String::new(),
            client: None,
            mime_type: None,
            user_agent: None,
            cookies: Vec::new(),
            chunks: None,
        }
    }

    /// Select a provider by name.
    #[must_use]
    pub fn with_provider(mut self, provider: impl Into<String>) -> Self {
        self.provider = provider.into();
        self
    }

    /// Attach a cookie.
    #[must_use]
    pub fn with_cookie(mut self, cookie: Cookie) -> Self {
        self.cookies.push(cookie);
        self
    }

    /// Override the user agent.
    #[must_use]
    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = Some(user_agent.into());
        self
    }

    /// Override the preferred chunk count.
    #[must_use]
    pub const fn with_chunks(mut self, chunks: u32) -> Self {
        self.chunks = Some(chunks);
        self
    }
}

/// A provider-resolved request, ready to be issued by chunk workers.
///
/// Workers receive their own clone; nothing mutates a shared template.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RequestTemplate {
    /// Parsed source URL.
    pub url: Url,
    /// Provider that produced this template.
    pub provider: String,
    /// Identity of the submitting client.
    pub client: Option<String>,
    /// Media type override.
    pub mime_type: Option<String>,
    /// User agent to send.
    pub user_agent: String,
    /// Cookies in scope for `url`, unexpired at resolution time.
    pub cookies: Vec<Cookie>,
    /// Extra headers, in order.
    pub headers: Vec<(String, String)>,
    /// Whether the transport follows redirects.
    pub follow_redirects: bool,
    /// Whether the provider allows ranged requests.
    pub supports_ranges: bool,
}

impl RequestTemplate {
    /// `Cookie` header value for the attached cookies, if any.
    #[must_use]
    pub fn cookie_header(&self) -> Option<String> {
        if self.cookies.is_empty() {
            return None;
        }
        Some(
            self.cookies
                .iter()
                .map(|c| format!("{}={}", c.name, c.value))
                .collect::<Vec<_>>()
                .join("; "),
        )
    }
}

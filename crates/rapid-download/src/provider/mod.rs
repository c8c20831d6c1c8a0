//! Provider resolver.
//!
//! Maps a request's provider name to a registered [`Provider`] and turns the
//! request into a [`RequestTemplate`]. Resolution performs no network I/O.
//! On `AuthRequired` the resolver asks the provider to refresh once, bounded
//! by a timeout; a second failure is terminal.

mod cookie;
mod direct;
mod redirect;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use url::Url;

use rapid_core::ports::{Provider, ProviderContext};
use rapid_core::{EngineConfig, ProviderError, Request, RequestTemplate};

pub use cookie::CookieProvider;
pub use direct::DirectProvider;
pub use redirect::RedirectProvider;

/// A resolved template together with the request it was resolved from.
///
/// The request differs from the submitted one when credentials were refreshed.
#[derive(Clone, Debug)]
pub struct Resolution {
    /// Template for chunk workers.
    pub template: RequestTemplate,
    /// Request that produced the template.
    pub request: Request,
}

/// Registry of providers keyed by name.
#[derive(Clone)]
pub struct ProviderResolver {
    providers: HashMap<String, Arc<dyn Provider>>,
    default_provider: String,
    user_agent: String,
    refresh_timeout: Duration,
}

impl ProviderResolver {
    /// Create an empty resolver.
    pub fn new(
        default_provider: impl Into<String>,
        user_agent: impl Into<String>,
        refresh_timeout: Duration,
    ) -> Self {
        Self {
            providers: HashMap::new(),
            default_provider: default_provider.into(),
            user_agent: user_agent.into(),
            refresh_timeout,
        }
    }

    /// Resolver with the built-in `direct`, `cookie` and `redirect` providers.
    #[must_use]
    pub fn with_builtin(config: &EngineConfig) -> Self {
        let mut resolver = Self::new(
            config.default_provider.clone(),
            config.user_agent.clone(),
            config.reresolve_timeout,
        );
        resolver.register(Arc::new(DirectProvider));
        resolver.register(Arc::new(CookieProvider));
        resolver.register(Arc::new(RedirectProvider));
        resolver
    }

    /// Register (or replace) a provider under its own name.
    pub fn register(&mut self, provider: Arc<dyn Provider>) {
        self.providers.insert(provider.name().to_string(), provider);
    }

    /// Provider name a request resolves with.
    #[must_use]
    pub fn provider_name<'a>(&'a self, request: &'a Request) -> &'a str {
        let name = request.provider.trim();
        if name.is_empty() {
            &self.default_provider
        } else {
            name
        }
    }

    /// Look up a provider.
    pub fn get(&self, name: &str) -> Result<Arc<dyn Provider>, ProviderError> {
        self.providers
            .get(name)
            .cloned()
            .ok_or_else(|| ProviderError::unknown(name))
    }

    /// Names of registered providers, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.providers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Resolve a request, refreshing credentials at most once.
    pub async fn resolve(&self, request: &Request) -> Result<Resolution, ProviderError> {
        let name = self.provider_name(request).to_string();
        let provider = self.get(&name)?;
        let ctx = self.context();

        match provider.resolve(request, &ctx) {
            Ok(template) => Ok(Resolution {
                template,
                request: request.clone(),
            }),
            Err(ProviderError::AuthRequired { message }) => {
                tracing::debug!(
                    target: "rapid.download",
                    provider = %name,
                    reason = %message,
                    "Provider requires authentication, attempting refresh"
                );
                let refreshed = tokio::time::timeout(self.refresh_timeout, provider.refresh(request))
                    .await
                    .map_err(|_| ProviderError::Timeout {
                        seconds: self.refresh_timeout.as_secs(),
                    })??;
                let template = provider.resolve(&refreshed, &self.context())?;
                Ok(Resolution {
                    template,
                    request: refreshed,
                })
            }
            Err(other) => Err(other),
        }
    }

    fn context(&self) -> ProviderContext {
        ProviderContext {
            default_user_agent: self.user_agent.clone(),
            now: Utc::now(),
        }
    }
}

/// Shared template assembly for the built-in providers.
///
/// Validates the URL and keeps only cookies that are unexpired and in scope.
pub(crate) fn build_template(
    provider: &str,
    request: &Request,
    ctx: &ProviderContext,
    follow_redirects: bool,
    supports_ranges: bool,
) -> Result<RequestTemplate, ProviderError> {
    let url = Url::parse(request.url.trim())
        .map_err(|e| ProviderError::invalid_request(format!("invalid url '{}': {e}", request.url)))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ProviderError::invalid_request(format!(
            "unsupported scheme '{}'",
            url.scheme()
        )));
    }

    let cookies = request
        .cookies
        .iter()
        .filter(|c| !c.is_expired(ctx.now) && c.matches(&url))
        .cloned()
        .collect();

    let mut headers = Vec::new();
    if let Some(mime) = &request.mime_type {
        headers.push(("Accept".to_string(), mime.clone()));
    }

    Ok(RequestTemplate {
        url,
        provider: provider.to_string(),
        client: request.client.clone(),
        mime_type: request.mime_type.clone(),
        user_agent: request
            .user_agent
            .clone()
            .filter(|ua| !ua.trim().is_empty())
            .unwrap_or_else(|| ctx.default_user_agent.clone()),
        cookies,
        headers,
        follow_redirects,
        supports_ranges,
    })
}

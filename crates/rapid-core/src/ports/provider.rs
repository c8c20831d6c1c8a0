//! Provider port: turns a client request into a request template.
//!
//! Each provider is one variant of a capability set. New sources are added
//! by implementing [`Provider`], never by matching on provider names inside
//! transfer logic.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::download::{ProviderError, Request, RequestTemplate};

/// Ambient inputs to resolution.
#[derive(Clone, Debug)]
pub struct ProviderContext {
    /// User agent used when the request does not override it.
    pub default_user_agent: String,
    /// Resolution time, for cookie expiry.
    pub now: DateTime<Utc>,
}

/// A named strategy for constructing a well-formed request for a source.
///
/// `resolve` performs no network I/O.
#[async_trait]
pub trait Provider: Send + Sync {
    /// Registry name (e.g. `"direct"`).
    fn name(&self) -> &str;

    /// Whether resources fetched through this provider accept range requests.
    fn supports_ranges(&self) -> bool;

    /// Build a request template.
    fn resolve(
        &self,
        request: &Request,
        ctx: &ProviderContext,
    ) -> Result<RequestTemplate, ProviderError>;

    /// Attempt to obtain fresh credentials after `AuthRequired`.
    ///
    /// Returns the request to resolve again. Providers without a refresh
    /// mechanism keep the default, which reports the original failure.
    async fn refresh(&self, request: &Request) -> Result<Request, ProviderError> {
        Err(ProviderError::auth_required(format!(
            "provider '{}' cannot refresh credentials for {}",
            self.name(),
            request.url
        )))
    }
}

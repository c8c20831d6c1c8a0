//! Cookie-authenticated provider.

use async_trait::async_trait;

use rapid_core::ports::{Provider, ProviderContext};
use rapid_core::{ProviderError, Request, RequestTemplate};

use super::build_template;

/// Requires at least one unexpired cookie in scope for the URL.
///
/// Cookies come from the browser that captured the link; there is no way to
/// refresh them here, so an expired session surfaces as `AuthRequired` and
/// the download waits for a new request.
#[derive(Debug, Clone, Copy, Default)]
pub struct CookieProvider;

#[async_trait]
impl Provider for CookieProvider {
    fn name(&self) -> &str {
        "cookie"
    }

    fn supports_ranges(&self) -> bool {
        true
    }

    fn resolve(
        &self,
        request: &Request,
        ctx: &ProviderContext,
    ) -> Result<RequestTemplate, ProviderError> {
        let template = build_template(self.name(), request, ctx, true, self.supports_ranges())?;
        if template.cookies.is_empty() {
            let reason = if request.cookies.is_empty() {
                "no cookies were supplied"
            } else {
                "all cookies for this host have expired"
            };
            return Err(ProviderError::auth_required(reason));
        }
        Ok(template)
    }
}

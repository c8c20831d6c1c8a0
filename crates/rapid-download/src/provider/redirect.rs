//! Redirect-following provider for share links and shorteners.

use async_trait::async_trait;

use rapid_core::ports::{Provider, ProviderContext};
use rapid_core::{ProviderError, Request, RequestTemplate};

use super::build_template;

/// Follows redirects to the final resource.
///
/// The final location may change between requests, so ranged chunking is
/// disabled and transfers run as a single chunk.
#[derive(Debug, Clone, Copy, Default)]
pub struct RedirectProvider;

#[async_trait]
impl Provider for RedirectProvider {
    fn name(&self) -> &str {
        "redirect"
    }

    fn supports_ranges(&self) -> bool {
        false
    }

    fn resolve(
        &self,
        request: &Request,
        ctx: &ProviderContext,
    ) -> Result<RequestTemplate, ProviderError> {
        build_template(self.name(), request, ctx, true, self.supports_ranges())
    }
}

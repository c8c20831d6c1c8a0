//! Plain HTTP(S) provider.

use async_trait::async_trait;

use rapid_core::ports::{Provider, ProviderContext};
use rapid_core::{ProviderError, Request, RequestTemplate};

use super::build_template;

/// Fetches the URL as given. Redirects are not followed; ranges are allowed.
#[derive(Debug, Clone, Copy, Default)]
pub struct DirectProvider;

#[async_trait]
impl Provider for DirectProvider {
    fn name(&self) -> &str {
        "direct"
    }

    fn supports_ranges(&self) -> bool {
        true
    }

    fn resolve(
        &self,
        request: &Request,
        ctx: &ProviderContext,
    ) -> Result<RequestTemplate, ProviderError> {
        build_template(self.name(), request, ctx, false, self.supports_ranges())
    }
}

//! Transfer port: the network side of a chunk worker.

use async_trait::async_trait;
use bytes::Bytes;
use futures_util::stream::BoxStream;
use url::Url;

use crate::download::{ByteRange, ChunkError, RequestTemplate};

/// Stream of body bytes for one attempt.
pub type ByteStream = BoxStream<'static, Result<Bytes, ChunkError>>;

/// What a probe learned about a resource.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ResourceInfo {
    /// Total size, if reported.
    pub size: Option<u64>,
    /// Whether the server honours range requests.
    pub accepts_ranges: bool,
    /// Reported media type.
    pub mime_type: Option<String>,
    /// File name from `Content-Disposition`.
    pub file_name: Option<String>,
    /// URL after redirects.
    pub final_url: Option<Url>,
}

/// Issues requests described by a [`RequestTemplate`].
#[async_trait]
pub trait TransferPort: Send + Sync {
    /// Discover size, range support, media type and file name.
    async fn probe(&self, template: &RequestTemplate) -> Result<ResourceInfo, ChunkError>;

    /// Open a body stream, ranged when `range` is `Some`.
    async fn fetch(
        &self,
        template: &RequestTemplate,
        range: Option<ByteRange>,
    ) -> Result<ByteStream, ChunkError>;
}

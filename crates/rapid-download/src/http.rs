//! Reqwest-backed transport.
//!
//! Issues probes and ranged GETs described by a [`RequestTemplate`] and
//! classifies every failure into a [`ChunkError`].

use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::header::{
    ACCEPT_RANGES, CONTENT_DISPOSITION, CONTENT_LENGTH, CONTENT_RANGE, CONTENT_TYPE, COOKIE, RANGE,
    USER_AGENT,
};
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};

use rapid_core::ports::{ByteStream, ResourceInfo, TransferPort};
use rapid_core::{ByteRange, ChunkError, RequestTemplate};

/// Default connect timeout for transfer requests.
const CONNECT_TIMEOUT: Duration = Duration::from_secs(15);

/// Transport over HTTP(S).
///
/// Holds one client that follows redirects and one that does not; the
/// template decides which is used.
#[derive(Clone)]
pub struct ReqwestTransport {
    following: Client,
    strict: Client,
}

impl ReqwestTransport {
    /// Build the transport's HTTP clients.
    pub fn new() -> Result<Self, ChunkError> {
        let following = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .redirect(reqwest::redirect::Policy::limited(10))
            .build()
            .map_err(|e| ChunkError::permanent(format!("failed to build HTTP client: {e}")))?;
        let strict = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .redirect(reqwest::redirect::Policy::none())
            .build()
            .map_err(|e| ChunkError::permanent(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { following, strict })
    }

    fn request(&self, method: Method, template: &RequestTemplate) -> RequestBuilder {
        let client = if template.follow_redirects {
            &self.following
        } else {
            &self.strict
        };
        let mut builder = client
            .request(method, template.url.clone())
            .header(USER_AGENT, &template.user_agent);
        if let Some(cookies) = template.cookie_header() {
            builder = builder.header(COOKIE, cookies);
        }
        for (name, value) in &template.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        builder
    }

    async fn send(builder: RequestBuilder) -> Result<Response, ChunkError> {
        builder.send().await.map_err(|e| classify_reqwest_error(&e))
    }
}

#[async_trait]
impl TransferPort for ReqwestTransport {
    async fn probe(&self, template: &RequestTemplate) -> Result<ResourceInfo, ChunkError> {
        let head = Self::send(self.request(Method::HEAD, template)).await?;
        let status = head.status();

        if status == StatusCode::METHOD_NOT_ALLOWED || status == StatusCode::NOT_IMPLEMENTED {
            tracing::debug!(
                target: "rapid.download",
                url = %template.url,
                "HEAD not supported, probing with a one-byte range"
            );
            let get = Self::send(
                self.request(Method::GET, template)
                    .header(RANGE, ByteRange::new(0, 1).header_value()),
            )
            .await?;
            check_status(get.status(), false)?;
            return Ok(resource_info(&get));
        }

        check_status(status, false)?;
        Ok(resource_info(&head))
    }

    async fn fetch(
        &self,
        template: &RequestTemplate,
        range: Option<ByteRange>,
    ) -> Result<ByteStream, ChunkError> {
        let mut builder = self.request(Method::GET, template);
        if let Some(range) = range {
            builder = builder.header(RANGE, range.header_value());
        }
        let response = Self::send(builder).await?;
        check_status(response.status(), range.is_some())?;

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(|e| classify_reqwest_error(&e)))
            .boxed())
    }
}

/// Classify a response status.
///
/// Ranged requests must be answered with 206; a 200 means the server ignored
/// the range and the bytes would land at the wrong offset.
pub fn check_status(status: StatusCode, ranged: bool) -> Result<(), ChunkError> {
    let code = status.as_u16();
    match code {
        206 => Ok(()),
        200..=299 if ranged => Err(ChunkError::permanent_with_status(
            "server ignored the range request",
            code,
        )),
        200..=299 => Ok(()),
        401 | 403 | 410 => Err(ChunkError::expired(format!(
            "server refused access ({code})"
        ))),
        408 | 429 | 500..=599 => Err(ChunkError::transient(format!("server returned {code}"))),
        300..=399 => Err(ChunkError::permanent_with_status(
            "unexpected redirect",
            code,
        )),
        _ => Err(ChunkError::permanent_with_status(
            format!("server returned {code}"),
            code,
        )),
    }
}

fn classify_reqwest_error(err: &reqwest::Error) -> ChunkError {
    if err.is_builder() {
        return ChunkError::permanent(err.to_string());
    }
    if let Some(status) = err.status() {
        return check_status(status, false)
            .err()
            .unwrap_or_else(|| ChunkError::transient(err.to_string()));
    }
    ChunkError::transient(err.to_string())
}

fn resource_info(response: &Response) -> ResourceInfo {
    let headers = response.headers();
    let header = |name| headers.get(name).and_then(|v| v.to_str().ok());

    let partial = response.status() == StatusCode::PARTIAL_CONTENT;
    let size = if partial {
        header(CONTENT_RANGE).and_then(parse_content_range_total)
    } else {
        header(CONTENT_LENGTH).and_then(|v| v.trim().parse().ok())
    };
    let accepts_ranges = partial
        || header(ACCEPT_RANGES).is_some_and(|v| v.split(',').any(|u| u.trim() == "bytes"));

    ResourceInfo {
        size,
        accepts_ranges,
        mime_type: header(CONTENT_TYPE)
            .and_then(|v| v.split(';').next())
            .map(|v| v.trim().to_string())
            .filter(|v| !v.is_empty()),
        file_name: header(CONTENT_DISPOSITION).and_then(parse_content_disposition),
        final_url: Some(response.url().clone()),
    }
}

/// Total length from a `Content-Range: bytes 0-0/1234` header.
pub fn parse_content_range_total(value: &str) -> Option<u64> {
    let (_, total) = value.trim().rsplit_once('/')?;
    total.trim().parse().ok()
}

/// File name from a `Content-Disposition` header.
///
/// Prefers the RFC 5987 `filename*` form over plain `filename`.
pub fn parse_content_disposition(value: &str) -> Option<String> {
    let mut plain = None;
    for part in value.split(';').map(str::trim) {
        let Some((key, raw)) = part.split_once('=') else {
            continue;
        };
        let raw = raw.trim().trim_matches('"');
        match key.trim().to_ascii_lowercase().as_str() {
            "filename*" => {
                let encoded = raw.rsplit_once("''").map_or(raw, |(_, name)| name);
                if let Some(name) = urlencoding::decode(encoded)
                    .ok()
                    .filter(|n| !n.is_empty())
                {
                    return Some(name.into_owned());
                }
            }
            "filename" if !raw.is_empty() => plain = Some(raw.to_string()),
            _ => {}
        }
    }
    plain
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_classification() {
        assert!(check_status(StatusCode::PARTIAL_CONTENT, true).is_ok());
        assert!(check_status(StatusCode::OK, false).is_ok());
        assert!(matches!(
            check_status(StatusCode::OK, true),
            Err(ChunkError::Permanent { .. })
        ));
        assert!(matches!(
            check_status(StatusCode::FORBIDDEN, true),
            Err(ChunkError::Expired { .. })
        ));
        assert!(matches!(
            check_status(StatusCode::GONE, false),
            Err(ChunkError::Expired { .. })
        ));
        assert!(check_status(StatusCode::SERVICE_UNAVAILABLE, true)
            .unwrap_err()
            .is_retryable());
        assert!(check_status(StatusCode::TOO_MANY_REQUESTS, true)
            .unwrap_err()
            .is_retryable());
        assert!(matches!(
            check_status(StatusCode::NOT_FOUND, true),
            Err(ChunkError::Permanent {
                status_code: Some(404),
                ..
            })
        ));
        assert!(matches!(
            check_status(StatusCode::FOUND, false),
            Err(ChunkError::Permanent { .. })
        ));
    }

    #[test]
    fn test_content_range_total() {
        assert_eq!(parse_content_range_total("bytes 0-0/1234"), Some(1234));
        assert_eq!(parse_content_range_total("bytes 0-0/*"), None);
        assert_eq!(parse_content_range_total("garbage"), None);
    }

    #[test]
    fn test_content_disposition() {
        assert_eq!(
            parse_content_disposition(r#"attachment; filename="report.pdf""#).as_deref(),
            Some("report.pdf")
        );
        assert_eq!(
            parse_content_disposition(
                r#"attachment; filename="fallback.txt"; filename*=UTF-8''na%C3%AFve%20file.txt"#
            )
            .as_deref(),
            Some("naïve file.txt")
        );
        assert_eq!(parse_content_disposition("inline"), None);
    }

    #[test]
    fn test_content_disposition_invalid_encoding_falls_back() {
        assert_eq!(
            parse_content_disposition(r#"attachment; filename*=UTF-8''bad%FF%FE; filename="plain.bin""#)
                .as_deref(),
            Some("plain.bin")
        );
    }

    #[test]
    fn test_transport_builds() {
        assert!(ReqwestTransport::new().is_ok());
    }
}

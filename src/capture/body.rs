//! Request body materialization.
//!
//! # Responsibilities
//! - Decide whether a request carries a body worth capturing
//! - Snapshot the body without taking it away from later consumers
//! - Decode the snapshot by content type (multipart, URL-encoded, raw)
//!
//! # Design Decisions
//! - The snapshot buffers the body once and re-installs an identical body
//!   over the same bytes, so forwarding reads exactly what the client sent
//! - Bodies without a declared length or chunked coding are never buffered
//! - Bodies over the capture limit are forwarded untouched and recorded by
//!   MIME type only
//! - Decode errors abort the capture; no partial `PostData` is returned

use std::convert::Infallible;

use axum::body::{Body, HttpBody};
use axum::http::{header, Request};
use bytes::{Bytes, BytesMut};
use futures_util::{stream, StreamExt};

use crate::capture::types::CaptureError;
use crate::har::convert::{content_length, is_chunked};
use crate::har::{Param, PostData};

const MULTIPART_FORM_DATA: &str = "multipart/form-data";
const FORM_URLENCODED: &str = "application/x-www-form-urlencoded";

/// Body length as far as the transport knows it.
pub fn declared_length(req: &Request<Body>) -> Option<u64> {
    content_length(req.headers()).or_else(|| req.body().size_hint().exact())
}

/// Build the `PostData` for `req`.
///
/// Returns `Ok(None)` when there is no body. With `with_body == false` only
/// the MIME type is recorded and the body is not touched.
pub async fn post_data(
    req: &mut Request<Body>,
    with_body: bool,
    limit: usize,
) -> Result<Option<PostData>, CaptureError> {
    let has_length = matches!(declared_length(req), Some(n) if n > 0);
    if !has_length && !is_chunked(req.headers()) {
        return Ok(None);
    }

    let media = MediaType::from_request(req);
    if !with_body {
        return Ok(Some(PostData::mime_only(media.essence)));
    }

    if declared_length(req).is_some_and(|n| n > limit as u64) {
        tracing::debug!(limit, "Request body over capture limit; recording MIME type only");
        return Ok(Some(PostData::mime_only(media.essence)));
    }
    let Some(snapshot) = snapshot_body(req, limit).await? else {
        tracing::debug!(limit, "Streamed body over capture limit; recording MIME type only");
        return Ok(Some(PostData::mime_only(media.essence)));
    };
    let mut pd = PostData::mime_only(media.essence.clone());

    match media.essence.as_str() {
        MULTIPART_FORM_DATA => {
            let boundary = media.boundary.ok_or(CaptureError::MissingBoundary)?;
            pd.params = multipart_params(snapshot, boundary).await?;
        }
        FORM_URLENCODED => pd.params = form_params(&snapshot)?,
        _ => pd.text = snapshot,
    }

    Ok(Some(pd))
}

/// Read the whole body and put an identical one back.
///
/// Returns `Ok(None)` once more than `limit` bytes arrive; the request then
/// carries the chunks read so far chained with the unread rest, so it still
/// forwards intact. On a read failure the body is gone.
pub async fn snapshot_body(
    req: &mut Request<Body>,
    limit: usize,
) -> Result<Option<Bytes>, CaptureError> {
    let mut rest = std::mem::take(req.body_mut()).into_data_stream();
    let mut chunks: Vec<Bytes> = Vec::new();
    let mut total = 0usize;

    while let Some(chunk) = rest.next().await {
        let chunk = chunk.map_err(CaptureError::Snapshot)?;
        total += chunk.len();
        chunks.push(chunk);
        if total > limit {
            let replay = stream::iter(chunks.into_iter().map(Ok::<_, axum::Error>)).chain(rest);
            *req.body_mut() = Body::from_stream(replay);
            return Ok(None);
        }
    }

    let bytes = match chunks.len() {
        0 => Bytes::new(),
        1 => chunks.swap_remove(0),
        _ => {
            let mut buf = BytesMut::with_capacity(total);
            for chunk in &chunks {
                buf.extend_from_slice(chunk);
            }
            buf.freeze()
        }
    };
    *req.body_mut() = Body::from(bytes.clone());
    Ok(Some(bytes))
}

/// Parsed `Content-Type`.
struct MediaType {
    essence: String,
    boundary: Option<String>,
}

impl MediaType {
    fn from_request(req: &Request<Body>) -> Self {
        let raw = req
            .headers()
            .get(header::CONTENT_TYPE)
            .map(|v| String::from_utf8_lossy(v.as_bytes()).into_owned())
            .unwrap_or_default();

        match raw.parse::<mime::Mime>() {
            Ok(m) => Self {
                essence: m.essence_str().to_string(),
                boundary: m.get_param(mime::BOUNDARY).map(|b| b.as_str().to_string()),
            },
            Err(e) => {
                if !raw.is_empty() {
                    tracing::warn!(content_type = %raw, error = %e, "Cannot parse Content-Type header");
                }
                Self {
                    essence: raw,
                    boundary: None,
                }
            }
        }
    }
}

async fn multipart_params(body: Bytes, boundary: String) -> Result<Vec<Param>, CaptureError> {
    let source = stream::once(async move { Ok::<Bytes, Infallible>(body) });
    let mut multipart = multer::Multipart::new(source, boundary);
    let mut params = Vec::new();

    while let Some(field) = multipart.next_field().await? {
        let name = field.name().unwrap_or_default().to_string();
        let file_name = field.file_name().unwrap_or_default().to_string();
        let content_type = field
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let value = field.bytes().await?;

        params.push(Param {
            name,
            value: String::from_utf8_lossy(&value).into_owned(),
            file_name,
            content_type,
        });
    }

    Ok(params)
}

fn form_params(body: &[u8]) -> Result<Vec<Param>, CaptureError> {
    if let Some(pair) = body.split(|&b| b == b'&').find(|pair| !valid_escapes(pair)) {
        return Err(CaptureError::Form(String::from_utf8_lossy(pair).into_owned()));
    }
    Ok(url::form_urlencoded::parse(body)
        .map(|(name, value)| Param {
            name: name.into_owned(),
            value: value.into_owned(),
            ..Param::default()
        })
        .collect())
}

/// Every `%` is followed by two hex digits.
fn valid_escapes(pair: &[u8]) -> bool {
    let mut rest = pair;
    while let Some(pos) = rest.iter().position(|&b| b == b'%') {
        match rest.get(pos + 1..pos + 3) {
            Some(hex) if hex.iter().all(u8::is_ascii_hexdigit) => rest = &rest[pos + 3..],
            _ => return false,
        }
    }
    true
}

#[cfg(test)]
mod tests {
    use super::*;

    const LIMIT: usize = 1024 * 1024;

    fn request(content_type: &str, body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("http://example.com/submit")
            .header(header::CONTENT_TYPE, content_type)
            .body(body.into())
            .unwrap()
    }

    async fn read_back(req: Request<Body>) -> Bytes {
        axum::body::to_bytes(req.into_body(), LIMIT).await.unwrap()
    }

    fn multipart_body(boundary: &str) -> String {
        format!(
            "--{b}\r\n\
             Content-Disposition: form-data; name=\"title\"\r\n\r\n\
             holiday\r\n\
             --{b}\r\n\
             Content-Disposition: form-data; name=\"photo\"; filename=\"beach.png\"\r\n\
             Content-Type: image/png\r\n\r\n\
             PNGDATA\r\n\
             --{b}\r\n\
             Content-Disposition: form-data; name=\"tags\"\r\n\r\n\
             sea,sun\r\n\
             --{b}--\r\n",
            b = boundary
        )
    }

    #[tokio::test]
    async fn test_zero_content_length_yields_nothing() {
        let mut req = Request::builder()
            .method("POST")
            .uri("http://example.com/")
            .header(header::CONTENT_LENGTH, "0")
            .body(Body::empty())
            .unwrap();
        assert!(post_data(&mut req, true, LIMIT).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_headers_only_policy_keeps_mime_type() {
        let mut req = request("application/json; charset=utf-8", r#"{"secret":true}"#);
        let pd = post_data(&mut req, false, LIMIT).await.unwrap().unwrap();
        assert_eq!(pd.mime_type, "application/json");
        assert!(pd.text.is_empty());
        assert!(pd.params.is_empty());
        assert_eq!(read_back(req).await.as_ref(), br#"{"secret":true}"#);
    }

    #[tokio::test]
    async fn test_multipart_parts_in_order() {
        let body = multipart_body("XyZ");
        let mut req = request("multipart/form-data; boundary=XyZ", body.clone());
        let pd = post_data(&mut req, true, LIMIT).await.unwrap().unwrap();

        assert_eq!(pd.mime_type, "multipart/form-data");
        assert_eq!(pd.params.len(), 3);
        assert_eq!(pd.params[0].name, "title");
        assert_eq!(pd.params[0].value, "holiday");
        assert_eq!(pd.params[1].name, "photo");
        assert_eq!(pd.params[1].file_name, "beach.png");
        assert_eq!(pd.params[1].content_type, "image/png");
        assert_eq!(pd.params[1].value, "PNGDATA");
        assert_eq!(pd.params[2].name, "tags");
        assert!(pd.params[2].file_name.is_empty());
        assert!(pd.text.is_empty());

        assert_eq!(read_back(req).await.as_ref(), body.as_bytes());
    }

    #[tokio::test]
    async fn test_multipart_without_boundary_is_error() {
        let mut req = request("multipart/form-data", "irrelevant");
        let err = post_data(&mut req, true, LIMIT).await.unwrap_err();
        assert!(matches!(err, CaptureError::MissingBoundary));
    }

    #[tokio::test]
    async fn test_truncated_multipart_is_error() {
        let mut req = request(
            "multipart/form-data; boundary=XyZ",
            "--XyZ\r\nContent-Disposition: form-data; name=\"a\"\r\n\r\nno end",
        );
        assert!(post_data(&mut req, true, LIMIT).await.is_err());
    }

    #[tokio::test]
    async fn test_urlencoded_multi_values() {
        let mut req = request("application/x-www-form-urlencoded", "a=1&a=2&b=3");
        let pd = post_data(&mut req, true, LIMIT).await.unwrap().unwrap();
        let pairs: Vec<_> = pd.params.iter().map(|p| (p.name.as_str(), p.value.as_str())).collect();
        assert_eq!(pairs, [("a", "1"), ("a", "2"), ("b", "3")]);
        assert_eq!(read_back(req).await.as_ref(), b"a=1&a=2&b=3");
    }

    #[tokio::test]
    async fn test_raw_body_kept_verbatim_and_still_readable() {
        let raw = vec![0xde, 0xad, 0xbe, 0xef, 0x00, 0xff];
        let mut req = request("application/octet-stream", raw.clone());
        let pd = post_data(&mut req, true, LIMIT).await.unwrap().unwrap();
        assert_eq!(pd.text.as_ref(), raw.as_slice());
        assert_eq!(read_back(req).await.as_ref(), raw.as_slice());
    }

    #[tokio::test]
    async fn test_unparseable_content_type_falls_back_to_raw() {
        let mut req = request("not a mime type", "payload");
        let pd = post_data(&mut req, true, LIMIT).await.unwrap().unwrap();
        assert_eq!(pd.mime_type, "not a mime type");
        assert_eq!(pd.text.as_ref(), b"payload");
    }

    #[tokio::test]
    async fn test_chunked_request_is_captured() {
        let mut req = Request::builder()
            .method("POST")
            .uri("http://example.com/")
            .header(header::TRANSFER_ENCODING, "chunked")
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from_stream(stream::iter(vec![
                Ok::<_, Infallible>(Bytes::from_static(b"hello ")),
                Ok(Bytes::from_static(b"world")),
            ])))
            .unwrap();
        let pd = post_data(&mut req, true, LIMIT).await.unwrap().unwrap();
        assert_eq!(pd.text.as_ref(), b"hello world");
        assert_eq!(read_back(req).await.as_ref(), b"hello world");
    }

    #[tokio::test]
    async fn test_urlencoded_bad_escape_is_error() {
        let mut req = request("application/x-www-form-urlencoded", "ok=%41&a=%zz&b=%");
        let err = post_data(&mut req, true, LIMIT).await.unwrap_err();
        assert!(matches!(err, CaptureError::Form(ref pair) if pair == "a=%zz"));
        assert!(!err.body_lost());
        assert_eq!(read_back(req).await.as_ref(), b"ok=%41&a=%zz&b=%");

        let mut req = request("application/x-www-form-urlencoded", "b=%4");
        assert!(matches!(
            post_data(&mut req, true, LIMIT).await,
            Err(CaptureError::Form(_))
        ));
    }

    #[tokio::test]
    async fn test_declared_body_over_limit_is_untouched() {
        let mut req = request("text/plain", "0123456789");
        let pd = post_data(&mut req, true, 4).await.unwrap().unwrap();
        assert_eq!(pd.mime_type, "text/plain");
        assert!(pd.text.is_empty());
        assert_eq!(read_back(req).await.as_ref(), b"0123456789");
    }

    #[tokio::test]
    async fn test_streamed_body_over_limit_is_replayed() {
        let mut req = Request::builder()
            .method("POST")
            .uri("http://example.com/")
            .header(header::TRANSFER_ENCODING, "chunked")
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::from_stream(stream::iter(vec![
                Ok::<_, Infallible>(Bytes::from_static(b"abc")),
                Ok(Bytes::from_static(b"defg")),
                Ok(Bytes::from_static(b"hij")),
            ])))
            .unwrap();
        let pd = post_data(&mut req, true, 5).await.unwrap().unwrap();
        assert!(pd.text.is_empty());
        assert_eq!(read_back(req).await.as_ref(), b"abcdefghij");
    }
}

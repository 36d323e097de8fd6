//! HAR data types.
//!
//! Every type here is built once from the observed HTTP exchange and then only
//! read. Body-carrying types ([`PostData`], [`Content`]) hold raw bytes; their
//! JSON shape is produced by the codec in [`crate::har::codec`].

use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::har::codec::{self, CodecError, ContentWire, PostDataWire, TextEncoding};

/// Sentinel for sizes the proxy cannot observe (e.g. raw header bytes).
pub const UNKNOWN_SIZE: i64 = -1;

/// HAR format version written into exported logs.
pub const HAR_VERSION: &str = "1.2";

/// Top-level HAR document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Har {
    pub log: Log,
}

/// The `log` object of a HAR document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Log {
    pub version: String,
    pub creator: Creator,
    pub entries: Vec<Entry>,
}

impl Har {
    /// Wrap entries (already in arrival order) into an exportable document.
    pub fn new(creator: Creator, entries: Vec<Entry>) -> Self {
        Self {
            log: Log {
                version: HAR_VERSION.to_string(),
                creator,
                entries,
            },
        }
    }
}

/// The program that produced the log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Creator {
    pub name: String,
    pub version: String,
}

impl Default for Creator {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }
}

/// One captured request/response cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    /// Correlation ID shared by the request and its response.
    #[serde(rename = "context_id")]
    pub id: String,
    pub started_date_time: DateTime<Utc>,
    /// Total elapsed time in milliseconds.
    pub time: i64,
    pub request: Request,
    pub host: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Response>,
    pub cache: Cache,
    pub timings: Timings,
}

impl Entry {
    /// Start a new entry for a request observed now.
    pub fn new(id: impl Into<String>, host: impl Into<String>, request: Request) -> Self {
        Self {
            id: id.into(),
            started_date_time: Utc::now(),
            time: 0,
            request,
            host: host.into(),
            response: None,
            cache: Cache::default(),
            timings: Timings::default(),
        }
    }
}

/// A captured HTTP request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub method: String,
    /// Absolute URL, fragment excluded.
    pub url: String,
    pub http_version: String,
    pub cookies: Vec<Cookie>,
    pub headers: Vec<Header>,
    pub query_string: Vec<QueryString>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub post_data: Option<PostData>,
    pub headers_size: i64,
    pub body_size: i64,
}

/// A captured HTTP response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub status: u16,
    pub status_text: String,
    pub http_version: String,
    pub cookies: Vec<Cookie>,
    pub headers: Vec<Header>,
    #[serde(default)]
    pub content: Option<Content>,
    /// Target of the `Location` header, empty when absent.
    #[serde(rename = "redirectURL")]
    pub redirect_url: String,
    pub headers_size: i64,
    pub body_size: i64,
}

/// Browser cache details. Never populated, but HAR requires the object.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Cache {}

/// Round-trip phases in milliseconds. Not measured yet; always zero.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Timings {
    pub send: i64,
    pub wait: i64,
    pub receive: i64,
}

/// A cookie sent with a request or set by a response.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Cookie {
    pub name: String,
    pub value: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub path: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub domain: String,
    /// Expiry; serialized as an RFC 3339 string and omitted when unset.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "is_false")]
    pub http_only: bool,
    #[serde(default, skip_serializing_if = "is_false")]
    pub secure: bool,
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// One header value. Multi-valued headers produce one `Header` per value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Header {
    pub name: String,
    pub value: String,
}

/// One query parameter value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryString {
    pub name: String,
    pub value: String,
}

/// A posted parameter: a form field or an uploaded file part.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Param {
    pub name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub value: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub file_name: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub content_type: String,
}

/// Request body capture.
///
/// `text` keeps the raw bytes. Whether they are written literally or as
/// base64 is decided when the value is serialized.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "PostDataWire", try_from = "PostDataWire")]
pub struct PostData {
    pub mime_type: String,
    pub params: Vec<Param>,
    pub text: Bytes,
}

impl PostData {
    /// Body shape without any of its content.
    pub fn mime_only(mime_type: impl Into<String>) -> Self {
        Self {
            mime_type: mime_type.into(),
            params: Vec::new(),
            text: Bytes::new(),
        }
    }
}

/// Response body capture.
///
/// Unlike [`PostData`], the encoding is fixed by whoever builds the value and
/// carried alongside the bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(into = "ContentWire", try_from = "ContentWire")]
pub struct Content {
    pub size: i64,
    pub mime_type: String,
    text: Bytes,
    encoding: Option<TextEncoding>,
}

impl Content {
    /// Build content from a raw body, picking base64 for non-UTF-8 bytes.
    pub fn new(mime_type: impl Into<String>, body: Bytes) -> Self {
        let encoding = if codec::is_utf8(&body) {
            None
        } else {
            Some(TextEncoding::Base64)
        };
        Self {
            size: body.len() as i64,
            mime_type: mime_type.into(),
            text: body,
            encoding,
        }
    }

    /// Build content with an explicit encoding.
    ///
    /// Literal encoding (`None`) is refused for bytes that are not UTF-8.
    pub fn with_encoding(
        mime_type: impl Into<String>,
        body: Bytes,
        encoding: Option<TextEncoding>,
    ) -> Result<Self, CodecError> {
        if encoding.is_none() && !codec::is_utf8(&body) {
            return Err(CodecError::NotText);
        }
        Ok(Self {
            size: body.len() as i64,
            mime_type: mime_type.into(),
            text: body,
            encoding,
        })
    }

    /// Decoded body bytes.
    pub fn text(&self) -> &Bytes {
        &self.text
    }

    pub fn encoding(&self) -> Option<TextEncoding> {
        self.encoding
    }

    pub(crate) fn from_wire_parts(
        size: i64,
        mime_type: String,
        text: Bytes,
        encoding: Option<TextEncoding>,
    ) -> Self {
        Self {
            size,
            mime_type,
            text,
            encoding,
        }
    }
}

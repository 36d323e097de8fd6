//! Binary-safe HAR codec.
//!
//! # Responsibilities
//! - Decide per body field whether bytes go out as literal text or base64
//! - Reject unknown `encoding` tags on the way back in
//! - Serialize and deserialize entries and whole HAR documents
//!
//! # Design Decisions
//! - The text/binary decision lives in [`encode_text`] and [`decode_text`],
//!   parameterized by a classification predicate; the model types only route
//!   through them via wire structs
//! - An absent or empty `encoding` tag means literal UTF-8 text
//! - `PostData` and `Content` are classified independently

use base64::{engine::general_purpose::STANDARD, Engine as _};
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::har::types::{Content, Entry, Har, Param, PostData};

/// Tag written next to a text field that is not literal UTF-8.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TextEncoding {
    Base64,
}

impl TextEncoding {
    pub fn as_str(&self) -> &'static str {
        match self {
            TextEncoding::Base64 => "base64",
        }
    }

    /// Parse an `encoding` tag. `None` and `""` both mean literal text.
    pub fn parse(tag: Option<&str>) -> Result<Option<Self>, CodecError> {
        match tag {
            None | Some("") => Ok(None),
            Some("base64") => Ok(Some(TextEncoding::Base64)),
            Some(other) => Err(CodecError::UnsupportedEncoding(other.to_string())),
        }
    }
}

/// Errors raised while encoding or decoding captured traffic.
#[derive(Debug, Error)]
pub enum CodecError {
    /// The `encoding` tag names something other than base64.
    #[error("unsupported encoding for text field: {0}")]
    UnsupportedEncoding(String),

    /// A base64-tagged field did not hold valid base64.
    #[error("failed to decode base64-encoded text: {0}")]
    Base64(#[from] base64::DecodeError),

    /// Literal encoding was requested for bytes that are not UTF-8.
    #[error("body is not valid UTF-8 and needs an explicit encoding")]
    NotText,

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A text field ready to be written out.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedText {
    pub text: String,
    pub encoding: Option<TextEncoding>,
}

/// Default classification predicate: valid UTF-8 is text.
pub fn is_utf8(bytes: &[u8]) -> bool {
    std::str::from_utf8(bytes).is_ok()
}

/// Encode raw bytes for a JSON text field.
///
/// Bytes classified as text are emitted literally with no tag; everything else
/// is base64 with [`TextEncoding::Base64`]. A predicate that accepts non-UTF-8
/// bytes gets them lossily converted.
pub fn encode_text<F>(bytes: &[u8], is_text: F) -> EncodedText
where
    F: Fn(&[u8]) -> bool,
{
    if is_text(bytes) {
        EncodedText {
            text: String::from_utf8_lossy(bytes).into_owned(),
            encoding: None,
        }
    } else {
        encode_with(bytes, Some(TextEncoding::Base64))
    }
}

fn encode_with(bytes: &[u8], encoding: Option<TextEncoding>) -> EncodedText {
    match encoding {
        Some(TextEncoding::Base64) => EncodedText {
            text: STANDARD.encode(bytes),
            encoding,
        },
        None => EncodedText {
            text: String::from_utf8_lossy(bytes).into_owned(),
            encoding: None,
        },
    }
}

/// Inverse of [`encode_text`].
pub fn decode_text(text: &str, encoding: Option<&str>) -> Result<Bytes, CodecError> {
    match TextEncoding::parse(encoding)? {
        Some(TextEncoding::Base64) => Ok(Bytes::from(STANDARD.decode(text)?)),
        None => Ok(Bytes::copy_from_slice(text.as_bytes())),
    }
}

/// Serialize one entry to JSON bytes.
pub fn serialize_entry(entry: &Entry) -> Result<Vec<u8>, CodecError> {
    Ok(serde_json::to_vec(entry)?)
}

/// Deserialize one entry from JSON bytes.
pub fn deserialize_entry(data: &[u8]) -> Result<Entry, CodecError> {
    Ok(serde_json::from_slice(data)?)
}

pub fn serialize_har(har: &Har) -> Result<Vec<u8>, CodecError> {
    Ok(serde_json::to_vec(har)?)
}

pub fn deserialize_har(data: &[u8]) -> Result<Har, CodecError> {
    Ok(serde_json::from_slice(data)?)
}

/// Decode a JSON `postData` value into `dest`.
///
/// The literal `null` leaves `dest` untouched: an absent body is not an empty
/// one.
pub fn decode_post_data_into(data: &[u8], dest: &mut PostData) -> Result<(), CodecError> {
    if data.trim_ascii() == b"null" {
        return Ok(());
    }
    *dest = serde_json::from_slice(data)?;
    Ok(())
}

/// JSON shape of [`PostData`].
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct PostDataWire {
    mime_type: String,
    #[serde(default)]
    params: Vec<Param>,
    #[serde(default)]
    text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    encoding: Option<String>,
}

impl From<PostData> for PostDataWire {
    fn from(pd: PostData) -> Self {
        let encoded = encode_text(&pd.text, is_utf8);
        Self {
            mime_type: pd.mime_type,
            params: pd.params,
            text: encoded.text,
            encoding: encoded.encoding.map(|e| e.as_str().to_string()),
        }
    }
}

impl TryFrom<PostDataWire> for PostData {
    type Error = CodecError;

    fn try_from(wire: PostDataWire) -> Result<Self, Self::Error> {
        let text = decode_text(&wire.text, wire.encoding.as_deref())?;
        Ok(PostData {
            mime_type: wire.mime_type,
            params: wire.params,
            text,
        })
    }
}

/// JSON shape of [`Content`].
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub(crate) struct ContentWire {
    size: i64,
    mime_type: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    text: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    encoding: Option<String>,
}

impl From<Content> for ContentWire {
    fn from(c: Content) -> Self {
        let encoded = encode_with(c.text(), c.encoding());
        Self {
            size: c.size,
            mime_type: c.mime_type,
            text: encoded.text,
            encoding: encoded.encoding.map(|e| e.as_str().to_string()),
        }
    }
}

impl TryFrom<ContentWire> for Content {
    type Error = CodecError;

    fn try_from(wire: ContentWire) -> Result<Self, Self::Error> {
        let encoding = TextEncoding::parse(wire.encoding.as_deref())?;
        let text = decode_text(&wire.text, wire.encoding.as_deref())?;
        Ok(Content::from_wire_parts(
            wire.size,
            wire.mime_type,
            text,
            encoding,
        ))
    }
}

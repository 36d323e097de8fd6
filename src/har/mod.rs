//! Capture model: HTTP Archive (HAR) types and their codec.
//!
//! # Data Flow
//! ```text
//! http::Request / http::Response
//!     → convert.rs (headers, cookies, query expansion)
//!     → types.rs (Entry, Request, Response, PostData, Content)
//!     → codec.rs (binary-safe JSON)
//!     → publish pipeline
//! ```
//!
//! # Design Decisions
//! - Body bytes are stored raw; encoding happens only at serialization
//! - Arrays keep source order
//! - See <https://w3c.github.io/web-performance/specs/HAR/Overview.html>

pub mod codec;
pub mod convert;
pub mod types;

pub use codec::{
    decode_post_data_into, decode_text, deserialize_entry, deserialize_har, encode_text, is_utf8,
    serialize_entry, serialize_har, CodecError, EncodedText, TextEncoding,
};
pub use types::{
    Cache, Content, Cookie, Creator, Entry, Har, Header, Log, Param, PostData, QueryString,
    Request, Response, Timings, UNKNOWN_SIZE,
};

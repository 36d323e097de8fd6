//! Building HAR values from `http` types.
//!
//! Header, query and cookie expansion emits one element per value, never
//! sorted. Query strings and cookies keep wire order. Headers follow
//! `HeaderMap` order: names in first-seen order, each name's values grouped
//! together in arrival order.

use axum::http::{header, HeaderMap, Method, StatusCode, Uri, Version};
use chrono::{DateTime, NaiveDateTime, Utc};

use crate::har::types::{Content, Cookie, Header, QueryString, Request, Response, UNKNOWN_SIZE};

/// HAR spelling of an HTTP version.
pub fn http_version(version: Version) -> &'static str {
    match version {
        Version::HTTP_09 => "HTTP/0.9",
        Version::HTTP_10 => "HTTP/1.0",
        Version::HTTP_2 => "HTTP/2.0",
        Version::HTTP_3 => "HTTP/3.0",
        _ => "HTTP/1.1",
    }
}

/// One [`Header`] per header value, grouped by name.
pub fn headers(map: &HeaderMap) -> Vec<Header> {
    map.iter()
        .map(|(name, value)| Header {
            name: name.as_str().to_string(),
            value: String::from_utf8_lossy(value.as_bytes()).into_owned(),
        })
        .collect()
}

/// One [`QueryString`] per query value.
pub fn query_string(uri: &Uri) -> Vec<QueryString> {
    let Some(query) = uri.query() else {
        return Vec::new();
    };
    url::form_urlencoded::parse(query.as_bytes())
        .map(|(name, value)| QueryString {
            name: name.into_owned(),
            value: value.into_owned(),
        })
        .collect()
}

/// Declared body length: `Content-Length` when present and parseable.
pub fn content_length(map: &HeaderMap) -> Option<u64> {
    map.get(header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.trim().parse().ok())
}

/// Whether the message uses chunked transfer coding.
pub fn is_chunked(map: &HeaderMap) -> bool {
    map.get_all(header::TRANSFER_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|coding| coding.trim().eq_ignore_ascii_case("chunked"))
}

/// Host the request targets: the `Host` header, else the URI authority.
pub fn target_host(uri: &Uri, map: &HeaderMap) -> String {
    map.get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .or_else(|| uri.authority().map(|a| a.to_string()))
        .unwrap_or_default()
}

/// Absolute form of the request URL.
///
/// Proxied requests usually arrive in absolute form already; origin-form
/// requests are completed from the `Host` header.
pub fn absolute_url(uri: &Uri, map: &HeaderMap) -> String {
    if uri.scheme().is_some() && uri.authority().is_some() {
        return uri.to_string();
    }
    let path = uri.path_and_query().map(|p| p.as_str()).unwrap_or("/");
    format!("http://{}{}", target_host(uri, map), path)
}

/// Cookies from every `Cookie` request header.
pub fn request_cookies(map: &HeaderMap) -> Vec<Cookie> {
    map.get_all(header::COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(';'))
        .filter_map(|pair| {
            let (name, value) = pair.trim().split_once('=')?;
            let name = name.trim();
            if name.is_empty() {
                return None;
            }
            Some(Cookie {
                name: name.to_string(),
                value: value.trim().trim_matches('"').to_string(),
                ..Cookie::default()
            })
        })
        .collect()
}

/// Cookies from every `Set-Cookie` response header. Malformed ones are skipped.
pub fn response_cookies(map: &HeaderMap) -> Vec<Cookie> {
    map.get_all(header::SET_COOKIE)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .filter_map(parse_set_cookie)
        .collect()
}

/// Parse a single `Set-Cookie` value.
///
/// `Max-Age` and `SameSite` are not part of the HAR cookie and are ignored.
pub fn parse_set_cookie(line: &str) -> Option<Cookie> {
    let mut parts = line.split(';');
    let (name, value) = parts.next()?.trim().split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }

    let mut cookie = Cookie {
        name: name.to_string(),
        value: value.trim().trim_matches('"').to_string(),
        ..Cookie::default()
    };

    for attr in parts {
        let (key, val) = match attr.split_once('=') {
            Some((k, v)) => (k.trim(), v.trim()),
            None => (attr.trim(), ""),
        };
        match key.to_ascii_lowercase().as_str() {
            "path" => cookie.path = val.to_string(),
            "domain" => cookie.domain = val.trim_start_matches('.').to_string(),
            "expires" => cookie.expires = parse_cookie_date(val),
            "httponly" => cookie.http_only = true,
            "secure" => cookie.secure = true,
            _ => {}
        }
    }

    Some(cookie)
}

fn parse_cookie_date(value: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc2822(value) {
        return Some(dt.with_timezone(&Utc));
    }
    // Netscape spelling: "Wed, 21-Oct-2015 07:28:00 GMT"
    NaiveDateTime::parse_from_str(value, "%a, %d-%b-%Y %H:%M:%S GMT")
        .ok()
        .map(|naive| naive.and_utc())
}

impl Request {
    /// Capture everything about a request except its body.
    pub fn from_http(method: &Method, uri: &Uri, version: Version, map: &HeaderMap) -> Self {
        Self {
            method: method.as_str().to_string(),
            url: absolute_url(uri, map),
            http_version: http_version(version).to_string(),
            cookies: request_cookies(map),
            headers: headers(map),
            query_string: query_string(uri),
            post_data: None,
            headers_size: UNKNOWN_SIZE,
            body_size: content_length(map).map_or(UNKNOWN_SIZE, |n| n as i64),
        }
    }
}

impl Response {
    /// Capture a response; `content` is whatever body capture the caller did.
    pub fn from_http(
        status: StatusCode,
        version: Version,
        map: &HeaderMap,
        content: Option<Content>,
    ) -> Self {
        Self {
            status: status.as_u16(),
            status_text: status.canonical_reason().unwrap_or_default().to_string(),
            http_version: http_version(version).to_string(),
            cookies: response_cookies(map),
            headers: headers(map),
            content,
            redirect_url: map
                .get(header::LOCATION)
                .and_then(|v| v.to_str().ok())
                .unwrap_or_default()
                .to_string(),
            headers_size: UNKNOWN_SIZE,
            body_size: content_length(map).map_or(UNKNOWN_SIZE, |n| n as i64),
        }
    }
}

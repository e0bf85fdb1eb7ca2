// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Public HTTP request description carried by every action.

use std::fmt;
use std::str::FromStr;

use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use url::Url;

use crate::codec::{Decode, Encode, Reader, Writer};
use crate::error::{ProtocolError, ProtocolResult};

/// Characters left alone by `encodeURIComponent`.
const URI_COMPONENT: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'!')
    .remove(b'~')
    .remove(b'*')
    .remove(b'\'')
    .remove(b'(')
    .remove(b')');

/// HTTP methods an oracle can execute, with their wire tags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Patch,
    Delete,
    Options,
    Trace,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 6] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Patch,
        HttpMethod::Delete,
        HttpMethod::Options,
        HttpMethod::Trace,
    ];

    pub fn tag(self) -> i64 {
        match self {
            HttpMethod::Get => 0,
            HttpMethod::Post => 1,
            HttpMethod::Patch => 2,
            HttpMethod::Delete => 3,
            HttpMethod::Options => 4,
            HttpMethod::Trace => 5,
        }
    }

    pub fn from_tag(tag: i64) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.tag() == tag)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Trace => "TRACE",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = ProtocolError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| ProtocolError::UnsupportedMethod(s.to_string()))
    }
}

/// A plaintext request header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestHeader {
    pub key: String,
    pub value: String,
}

impl RequestHeader {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl FromStr for RequestHeader {
    type Err = ProtocolError;

    /// Parse `key:value`, splitting on the first colon and trimming both sides.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (key, value) = s
            .split_once(':')
            .ok_or_else(|| ProtocolError::InvalidHeader(s.to_string()))?;
        let key = key.trim();
        if key.is_empty() {
            return Err(ProtocolError::InvalidHeader(s.to_string()));
        }
        Ok(Self::new(key, value.trim()))
    }
}

impl Encode for RequestHeader {
    fn encode_to(&self, w: &mut Writer) {
        w.string(&self.key).string(&self.value);
    }
}

impl Decode for RequestHeader {
    fn decode_from(r: &mut Reader<'_>) -> ProtocolResult<Self> {
        Ok(Self::new(r.string()?, r.string()?))
    }
}

/// A plaintext query parameter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueryParameter {
    pub key: String,
    pub value: String,
}

impl QueryParameter {
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
        }
    }
}

impl Encode for QueryParameter {
    fn encode_to(&self, w: &mut Writer) {
        w.string(&self.key).string(&self.value);
    }
}

impl Decode for QueryParameter {
    fn decode_from(r: &mut Reader<'_>) -> ProtocolResult<Self> {
        Ok(Self::new(r.string()?, r.string()?))
    }
}

/// Parse every `key:value` header string.
pub fn parse_headers<S: AsRef<str>>(headers: &[S]) -> ProtocolResult<Vec<RequestHeader>> {
    headers.iter().map(|h| h.as_ref().parse()).collect()
}

/// Decoded `key=value` pairs of a URL query, in order.
pub(crate) fn query_parameters(url: &Url) -> Vec<QueryParameter> {
    url.query_pairs()
        .map(|(k, v)| QueryParameter::new(k, v))
        .collect()
}

/// The public part of an action. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub host: String,
    pub path: String,
    pub headers: Vec<RequestHeader>,
    pub parameters: Vec<QueryParameter>,
    pub body: String,
}

impl HttpRequest {
    /// Build a request from a full URL and `key:value` header strings.
    pub fn from_parts<S: AsRef<str>>(
        method: HttpMethod,
        url: &str,
        headers: &[S],
        body: impl Into<String>,
    ) -> ProtocolResult<Self> {
        let parsed = Url::parse(url).map_err(|e| ProtocolError::InvalidUrl(format!("{url}: {e}")))?;
        let host = parsed
            .host_str()
            .ok_or_else(|| ProtocolError::InvalidUrl(format!("{url}: missing host")))?
            .to_string();

        Ok(Self {
            method,
            host,
            path: parsed.path().to_string(),
            headers: parse_headers(headers)?,
            parameters: query_parameters(&parsed),
            body: body.into(),
        })
    }

    /// `METHOD https://host/path?query`, for listings and log lines.
    pub fn display_line(&self) -> String {
        let mut line = format!("{} https://{}{}", self.method, self.host, self.path);
        if !self.parameters.is_empty() {
            let query: Vec<String> = self
                .parameters
                .iter()
                .map(|p| {
                    format!(
                        "{}={}",
                        utf8_percent_encode(&p.key, URI_COMPONENT),
                        utf8_percent_encode(&p.value, URI_COMPONENT)
                    )
                })
                .collect();
            line.push('?');
            line.push_str(&query.join("&"));
        }
        line
    }
}

impl Encode for HttpRequest {
    fn encode_to(&self, w: &mut Writer) {
        w.i64(self.method.tag())
            .string(&self.host)
            .string(&self.path)
            .list(&self.headers)
            .list(&self.parameters)
            .string(&self.body);
    }
}

impl Decode for HttpRequest {
    fn decode_from(r: &mut Reader<'_>) -> ProtocolResult<Self> {
        let tag = r.i64()?;
        let method = HttpMethod::from_tag(tag)
            .ok_or_else(|| ProtocolError::malformed(format!("unknown method tag {tag}")))?;
        Ok(Self {
            method,
            host: r.string()?,
            path: r.string()?,
            headers: r.list(RequestHeader::decode_from)?,
            parameters: r.list(QueryParameter::decode_from)?,
            body: r.string()?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn from_parts_parses_url_headers_and_body() {
        let req = HttpRequest::from_parts(
            HttpMethod::Post,
            "https://api.example.com/v1/items?foo=bar&baz=qux",
            &["X-Test: 1", "X-Other: two"],
            "body",
        )
        .unwrap();

        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.host, "api.example.com");
        assert_eq!(req.path, "/v1/items");
        assert_eq!(
            req.parameters,
            vec![QueryParameter::new("foo", "bar"), QueryParameter::new("baz", "qux")]
        );
        assert_eq!(
            req.headers,
            vec![RequestHeader::new("X-Test", "1"), RequestHeader::new("X-Other", "two")]
        );
        assert_eq!(req.body, "body");
    }

    #[test]
    fn header_splits_on_first_colon_only() {
        let header: RequestHeader = "Authorization: Basic a:b".parse().unwrap();
        assert_eq!(header.key, "Authorization");
        assert_eq!(header.value, "Basic a:b");
    }

    #[test]
    fn header_without_colon_is_rejected() {
        let err = "NoColonHere".parse::<RequestHeader>().unwrap_err();
        assert!(matches!(err, ProtocolError::InvalidHeader(_)));

        let err = HttpRequest::from_parts(HttpMethod::Get, "https://a.b/", &["bad"], "");
        assert!(err.is_err());
    }

    #[test]
    fn method_names_and_tags() {
        assert_eq!("PATCH".parse::<HttpMethod>().unwrap(), HttpMethod::Patch);
        assert_eq!(HttpMethod::Trace.tag(), 5);
        assert_eq!(HttpMethod::from_tag(3), Some(HttpMethod::Delete));
        assert_eq!(HttpMethod::from_tag(6), None);
        assert!(matches!(
            "PUT".parse::<HttpMethod>(),
            Err(ProtocolError::UnsupportedMethod(m)) if m == "PUT"
        ));
    }

    #[test]
    fn invalid_url_is_rejected() {
        let err = HttpRequest::from_parts::<&str>(HttpMethod::Get, "not a url", &[], "");
        assert!(matches!(err, Err(ProtocolError::InvalidUrl(_))));
    }

    #[test]
    fn unknown_method_tag_fails_decode() {
        let mut w = Writer::new();
        w.i64(9);
        let bytes = w.into_bytes();
        assert!(HttpRequest::decode(&bytes).is_err());
    }

    #[test]
    fn round_trips() {
        let req = HttpRequest::from_parts(
            HttpMethod::Options,
            "https://example.com/api?q=1",
            &["Content-Type: application/json"],
            r#"{"ok":true}"#,
        )
        .unwrap();
        assert_eq!(HttpRequest::decode(&req.encode()).unwrap(), req);
    }

    #[test]
    fn display_line_encodes_query() {
        let req = HttpRequest::from_parts::<&str>(
            HttpMethod::Get,
            "https://api.example.com/v3/ticker/price?symbol=ADA%20USDT",
            &[],
            "",
        )
        .unwrap();
        assert_eq!(
            req.display_line(),
            "GET https://api.example.com/v3/ticker/price?symbol=ADA%20USDT"
        );
    }

    #[test]
    fn display_line_keeps_uri_component_marks() {
        let req = HttpRequest::from_parts::<&str>(
            HttpMethod::Get,
            "https://api.example.com/q?filter=(a*b)!~x&note=caf%C3%A9+%26+bar&plus=1%2B1",
            &[],
            "",
        )
        .unwrap();
        assert_eq!(
            req.display_line(),
            "GET https://api.example.com/q?filter=(a*b)!~x&note=caf%C3%A9%20%26%20bar&plus=1%2B1"
        );
    }
}

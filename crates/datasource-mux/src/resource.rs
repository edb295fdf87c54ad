//! Resource specifications and resolved request descriptors
//!
//! [`ResourceSpec`] is what callers hand to the multiplexer. It is resolved
//! into an immutable [`RequestDescriptor`], the value that travels on the wire.

use crate::config::MuxConfig;
use crate::error::ConstructionError;
use crate::types::{ExchangeId, ExchangeKind, Method};
use datasource_url::{build_url, QueryParams, QueryValue};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Header map, sorted for stable wire output
pub type Headers = BTreeMap<String, String>;

/// Caller-facing description of a request or poll
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ResourceSpec {
    /// HTTP method (default `GET`)
    pub method: Option<Method>,
    /// Absolute URL; wins over `symbolic_path`
    pub url: Option<String>,
    /// Path resolved against the configured router
    pub symbolic_path: Option<String>,
    /// Query parameters
    pub params: Option<QueryParams>,
    /// Request body
    pub body: Option<Value>,
    /// Alias for `body`; wins when both are set
    pub data: Option<Value>,
    /// Request headers
    pub headers: Option<Headers>,
    /// Sets the `Content-Type` header
    pub content_type: Option<String>,
    /// Ask the gateway not to log failures
    pub suppress_errors: Option<bool>,
    /// Parse the response as JSON (default true)
    pub json: Option<bool>,
    /// Poll interval in milliseconds
    pub interval: Option<u64>,
}

impl ResourceSpec {
    /// Spec for an absolute URL
    #[inline]
    #[must_use]
    pub fn url(url: impl Into<String>) -> Self {
        Self {
            url: Some(url.into()),
            ..Self::default()
        }
    }

    /// Spec for a path under the configured router
    #[inline]
    #[must_use]
    pub fn path(symbolic_path: impl Into<String>) -> Self {
        Self {
            symbolic_path: Some(symbolic_path.into()),
            ..Self::default()
        }
    }

    /// With method
    #[inline]
    #[must_use]
    pub fn with_method(mut self, method: Method) -> Self {
        self.method = Some(method);
        self
    }

    /// With one query parameter
    #[inline]
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<QueryValue>) -> Self {
        self.params
            .get_or_insert_with(QueryParams::new)
            .insert(key.into(), value.into());
        self
    }

    /// With all query parameters
    #[inline]
    #[must_use]
    pub fn with_params(mut self, params: QueryParams) -> Self {
        self.params = Some(params);
        self
    }

    /// With body
    #[inline]
    #[must_use]
    pub fn with_body(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    /// With one header
    #[inline]
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers
            .get_or_insert_with(Headers::new)
            .insert(name.into(), value.into());
        self
    }

    /// With content type
    #[inline]
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// With poll interval in milliseconds
    #[inline]
    #[must_use]
    pub fn with_interval(mut self, interval_ms: u64) -> Self {
        self.interval = Some(interval_ms);
        self
    }

    /// With JSON response parsing toggled
    #[inline]
    #[must_use]
    pub fn with_json(mut self, json: bool) -> Self {
        self.json = Some(json);
        self
    }

    /// With gateway error logging suppressed
    #[inline]
    #[must_use]
    pub fn suppress_errors(mut self) -> Self {
        self.suppress_errors = Some(true);
        self
    }
}

/// Resolved wire request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestDescriptor {
    pub id: ExchangeId,
    pub url: String,
    pub method: Method,
    pub json: bool,
    pub suppress_errors: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<Headers>,
}

impl RequestDescriptor {
    /// Resolve a caller spec into a descriptor
    ///
    /// # Rules
    /// - `url` wins; otherwise `symbolic_path` is resolved against the router
    /// - query parameters are appended with [`build_url`]
    /// - `data` replaces `body`
    /// - `content_type` sets `Content-Type`, creating the header map if needed
    /// - `json` is true unless explicitly false
    /// - polls get `interval`, defaulting when absent or zero
    ///
    /// # Errors
    /// Returns `ConstructionError::MissingUrl` if no URL can be resolved
    pub fn resolve(
        id: ExchangeId,
        kind: ExchangeKind,
        spec: ResourceSpec,
        config: &MuxConfig,
    ) -> Result<Self, ConstructionError> {
        let base = match (spec.url, spec.symbolic_path) {
            (Some(url), _) => url,
            (None, Some(path)) => config.router.resolve(&path),
            (None, None) => return Err(ConstructionError::MissingUrl),
        };
        let url = build_url(&base, spec.params.as_ref());

        let mut headers = spec.headers;
        if let Some(content_type) = spec.content_type {
            headers
                .get_or_insert_with(Headers::new)
                .insert("Content-Type".to_string(), content_type);
        }

        let interval = match kind {
            ExchangeKind::OneShot => None,
            ExchangeKind::Poll => Some(
                spec.interval
                    .filter(|ms| *ms > 0)
                    .unwrap_or(config.default_poll_interval_ms),
            ),
        };

        Ok(Self {
            id,
            url,
            method: spec.method.unwrap_or_default(),
            json: spec.json != Some(false),
            suppress_errors: spec.suppress_errors.unwrap_or(false),
            interval,
            body: spec.data.or(spec.body),
            headers,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_POLL_INTERVAL_MS;
    use serde_json::json;

    fn resolve(kind: ExchangeKind, spec: ResourceSpec) -> RequestDescriptor {
        RequestDescriptor::resolve(ExchangeId::new(), kind, spec, &MuxConfig::default()).unwrap()
    }

    #[test]
    fn defaults_for_one_shot() {
        let d = resolve(ExchangeKind::OneShot, ResourceSpec::url("/x"));
        assert_eq!(d.method, Method::Get);
        assert!(d.json);
        assert!(!d.suppress_errors);
        assert_eq!(d.interval, None);
        assert_eq!(d.body, None);
        assert_eq!(d.headers, None);
    }

    #[test]
    fn one_shot_ignores_interval() {
        let d = resolve(ExchangeKind::OneShot, ResourceSpec::url("/x").with_interval(500));
        assert_eq!(d.interval, None);
    }

    #[test]
    fn poll_interval_defaults() {
        let d = resolve(ExchangeKind::Poll, ResourceSpec::url("/x"));
        assert_eq!(d.interval, Some(DEFAULT_POLL_INTERVAL_MS));

        let d = resolve(ExchangeKind::Poll, ResourceSpec::url("/x").with_interval(0));
        assert_eq!(d.interval, Some(DEFAULT_POLL_INTERVAL_MS));

        let d = resolve(ExchangeKind::Poll, ResourceSpec::url("/x").with_interval(1000));
        assert_eq!(d.interval, Some(1000));
    }

    #[test]
    fn json_false_is_respected_for_polls() {
        let d = resolve(ExchangeKind::Poll, ResourceSpec::url("/x").with_json(false));
        assert!(!d.json);
    }

    #[test]
    fn symbolic_path_resolves_against_router() {
        let d = resolve(
            ExchangeKind::OneShot,
            ResourceSpec::path("/namespaces").with_param("limit", 10),
        );
        assert_eq!(d.url, "http://localhost:11015/v3/namespaces?limit=10");
    }

    #[test]
    fn url_wins_over_symbolic_path() {
        let mut spec = ResourceSpec::url("http://elsewhere/x");
        spec.symbolic_path = Some("/ignored".into());
        let d = resolve(ExchangeKind::OneShot, spec);
        assert_eq!(d.url, "http://elsewhere/x");
    }

    #[test]
    fn missing_url_is_construction_error() {
        let result = RequestDescriptor::resolve(
            ExchangeId::new(),
            ExchangeKind::OneShot,
            ResourceSpec::default(),
            &MuxConfig::default(),
        );
        assert!(matches!(result, Err(ConstructionError::MissingUrl)));
    }

    #[test]
    fn data_wins_over_body() {
        let mut spec = ResourceSpec::url("/x").with_body(json!({"from": "body"}));
        spec.data = Some(json!({"from": "data"}));
        let d = resolve(ExchangeKind::OneShot, spec);
        assert_eq!(d.body, Some(json!({"from": "data"})));
    }

    #[test]
    fn content_type_creates_headers() {
        let d = resolve(
            ExchangeKind::OneShot,
            ResourceSpec::url("/x").with_content_type("application/json"),
        );
        let headers = d.headers.unwrap();
        assert_eq!(headers.get("Content-Type").unwrap(), "application/json");
    }

    #[test]
    fn content_type_merges_into_existing_headers() {
        let d = resolve(
            ExchangeKind::Poll,
            ResourceSpec::url("/x")
                .with_header("X-Trace", "1")
                .with_content_type("text/plain"),
        );
        let headers = d.headers.unwrap();
        assert_eq!(headers.len(), 2);
    }

    #[test]
    fn spec_deserializes_from_camel_case() {
        let spec: ResourceSpec = serde_json::from_value(json!({
            "symbolicPath": "/status",
            "method": "POST",
            "params": {"b": 2, "a": [1, 2]},
            "contentType": "application/json",
            "suppressErrors": true,
            "interval": 1000
        }))
        .unwrap();
        assert_eq!(spec.symbolic_path.as_deref(), Some("/status"));
        assert_eq!(spec.method, Some(Method::Post));
        assert_eq!(spec.suppress_errors, Some(true));
        assert_eq!(spec.params.unwrap().len(), 2);
    }

    #[test]
    fn descriptor_serializes_wire_shape() {
        let id = ExchangeId::new();
        let d = RequestDescriptor::resolve(
            id,
            ExchangeKind::Poll,
            ResourceSpec::url("/x").with_interval(1000),
            &MuxConfig::default(),
        )
        .unwrap();
        let json = serde_json::to_value(&d).unwrap();
        assert_eq!(
            json,
            json!({
                "id": id.to_string(),
                "url": "/x",
                "method": "GET",
                "json": true,
                "suppressErrors": false,
                "interval": 1000
            })
        );
    }
}

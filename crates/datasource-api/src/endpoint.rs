//! Endpoint creator
//!
//! An endpoint pairs a method with a path template. Calling it substitutes
//! the template's placeholders from the parameter map, sends every leftover
//! parameter as a query parameter, and resolves the path against the
//! multiplexer's router.

use datasource_mux::{
    ConstructionError, Headers, Method, Multiplexer, MuxError, PollSink, RequestSink, ResourceSpec,
};
use datasource_url::{PathTemplate, QueryParams, QueryValue, UrlError};
use serde::Deserialize;
use serde_json::Value;

/// Build a parameter map from key/value pairs
pub fn params<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> QueryParams
where
    K: Into<String>,
    V: Into<QueryValue>,
{
    pairs
        .into_iter()
        .map(|(key, value)| (key.into(), value.into()))
        .collect()
}

/// Per-endpoint request options
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EndpointOptions {
    /// Poll interval in milliseconds
    pub interval: Option<u64>,
    /// Parse the response as JSON (default true)
    pub json: Option<bool>,
    /// Ask the gateway not to log failures
    pub suppress_errors: bool,
    /// Sets the `Content-Type` header
    pub content_type: Option<String>,
    /// Extra request headers
    pub headers: Headers,
}

impl EndpointOptions {
    /// Create new default options
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// With poll interval
    #[inline]
    #[must_use]
    pub fn with_interval(mut self, interval_ms: u64) -> Self {
        self.interval = Some(interval_ms);
        self
    }

    /// With JSON parsing toggled
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
        self.suppress_errors = true;
        self
    }

    /// With content type
    #[inline]
    #[must_use]
    pub fn with_content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = Some(content_type.into());
        self
    }

    /// With one extra header
    #[inline]
    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }
}

/// Method, path template and options shared by both endpoint kinds
#[derive(Debug, Clone, PartialEq)]
struct Endpoint {
    method: Method,
    template: PathTemplate,
    options: EndpointOptions,
}

impl Endpoint {
    fn new(method: Method, template: &str) -> Result<Self, UrlError> {
        Ok(Self {
            method,
            template: PathTemplate::parse(template)?,
            options: EndpointOptions::default(),
        })
    }

    fn spec(&self, params: &QueryParams, body: Option<Value>) -> Result<ResourceSpec, UrlError> {
        let (path, query) = self.template.interpolate(params)?;

        let mut spec = ResourceSpec::path(path).with_method(self.method);
        if !query.is_empty() {
            spec = spec.with_params(query);
        }
        if !self.options.headers.is_empty() {
            spec.headers = Some(self.options.headers.clone());
        }
        spec.body = body;
        spec.interval = self.options.interval;
        spec.json = self.options.json;
        spec.content_type.clone_from(&self.options.content_type);
        spec.suppress_errors = self.options.suppress_errors.then_some(true);
        Ok(spec)
    }
}

/// Endpoint issued as a one-shot request
#[derive(Debug, Clone, PartialEq)]
pub struct RequestEndpoint(Endpoint);

impl RequestEndpoint {
    /// Create endpoint
    ///
    /// # Errors
    /// Returns `UrlError::EmptyPlaceholder` if the template is malformed
    pub fn new(method: Method, template: &str) -> Result<Self, UrlError> {
        Endpoint::new(method, template).map(Self)
    }

    /// With options
    #[inline]
    #[must_use]
    pub fn with_options(mut self, options: EndpointOptions) -> Self {
        self.0.options = options;
        self
    }

    /// HTTP method
    #[inline]
    #[must_use]
    pub fn method(&self) -> Method {
        self.0.method
    }

    /// Path template
    #[inline]
    #[must_use]
    pub fn template(&self) -> &PathTemplate {
        &self.0.template
    }

    /// Options
    #[inline]
    #[must_use]
    pub fn options(&self) -> &EndpointOptions {
        &self.0.options
    }

    /// Resource spec this endpoint would issue
    ///
    /// # Errors
    /// Returns `UrlError::UnresolvedPlaceholder` if a path parameter is missing
    pub fn spec(&self, params: &QueryParams, body: Option<Value>) -> Result<ResourceSpec, UrlError> {
        self.0.spec(params, body)
    }

    /// Issue the request
    ///
    /// # Errors
    /// Returns `MuxError::Construction` if a path parameter is missing, or
    /// any error from `Multiplexer::request`
    pub fn call(
        &self,
        mux: &Multiplexer,
        params: &QueryParams,
        body: Option<Value>,
    ) -> Result<RequestSink, MuxError> {
        let spec = self.spec(params, body).map_err(ConstructionError::from)?;
        tracing::debug!(template = %self.0.template, method = %self.0.method, "endpoint request");
        mux.request(spec)
    }
}

/// Endpoint issued as a repeating poll
#[derive(Debug, Clone, PartialEq)]
pub struct PollEndpoint(Endpoint);

impl PollEndpoint {
    /// Create endpoint
    ///
    /// # Errors
    /// Returns `UrlError::EmptyPlaceholder` if the template is malformed
    pub fn new(method: Method, template: &str) -> Result<Self, UrlError> {
        Endpoint::new(method, template).map(Self)
    }

    /// With options
    #[inline]
    #[must_use]
    pub fn with_options(mut self, options: EndpointOptions) -> Self {
        self.0.options = options;
        self
    }

    /// Path template
    #[inline]
    #[must_use]
    pub fn template(&self) -> &PathTemplate {
        &self.0.template
    }

    /// Resource spec this endpoint would issue
    ///
    /// # Errors
    /// Returns `UrlError::UnresolvedPlaceholder` if a path parameter is missing
    pub fn spec(&self, params: &QueryParams, body: Option<Value>) -> Result<ResourceSpec, UrlError> {
        self.0.spec(params, body)
    }

    /// Start the poll
    ///
    /// # Errors
    /// Returns `MuxError::Construction` if a path parameter is missing, or
    /// any error from `Multiplexer::poll`
    pub fn call(
        &self,
        mux: &Multiplexer,
        params: &QueryParams,
        body: Option<Value>,
    ) -> Result<PollSink, MuxError> {
        let spec = self.spec(params, body).map_err(ConstructionError::from)?;
        tracing::debug!(template = %self.0.template, method = %self.0.method, "endpoint poll");
        mux.poll(spec)
    }
}

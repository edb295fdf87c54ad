//! Wire messages exchanged with the gateway
//!
//! Outbound messages carry an `action` tag and the full request descriptor.
//! Inbound messages echo the descriptor id under `resource.id`.

use crate::error::{ExchangeError, TransportError};
use crate::resource::RequestDescriptor;
use crate::types::ExchangeId;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message sent to the gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "action", content = "resource", rename_all = "kebab-case")]
pub enum OutboundMessage {
    /// One-shot request
    Request(RequestDescriptor),
    /// Start a repeating poll
    PollStart(RequestDescriptor),
    /// Stop a repeating poll
    PollStop(RequestDescriptor),
}

impl OutboundMessage {
    /// Descriptor carried by this message
    #[inline]
    #[must_use]
    pub fn resource(&self) -> &RequestDescriptor {
        match self {
            Self::Request(r) | Self::PollStart(r) | Self::PollStop(r) => r,
        }
    }

    /// Exchange id carried by this message
    #[inline]
    #[must_use]
    pub fn id(&self) -> ExchangeId {
        self.resource().id
    }

    /// Wire name of the action
    #[inline]
    #[must_use]
    pub fn action(&self) -> &'static str {
        match self {
            Self::Request(_) => "request",
            Self::PollStart(_) => "poll-start",
            Self::PollStop(_) => "poll-stop",
        }
    }

    /// Encode as JSON text
    ///
    /// # Errors
    /// Returns `TransportError::Encode` if serialization fails
    pub fn to_json(&self) -> Result<String, TransportError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Decode from JSON text, as a gateway reads it
    ///
    /// # Errors
    /// Returns `TransportError::Encode` if the text is not a valid message
    pub fn from_json(text: &str) -> Result<Self, TransportError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Resource echo on an inbound message; only the id is needed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundResource {
    pub id: ExchangeId,
}

/// Message received from the gateway
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundMessage {
    pub resource: InboundResource,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub response: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub body: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<Value>,
}

impl InboundMessage {
    /// Successful response for `id`
    #[must_use]
    pub fn ok(id: ExchangeId, response: Value) -> Self {
        Self::with_status(id, 200, response)
    }

    /// Response with an explicit status
    #[must_use]
    pub fn with_status(id: ExchangeId, status_code: u16, response: Value) -> Self {
        Self {
            resource: InboundResource { id },
            status_code: Some(status_code),
            response: Some(response),
            body: None,
            error: None,
            warning: None,
        }
    }

    /// Exchange id this message belongs to
    #[inline]
    #[must_use]
    pub fn id(&self) -> ExchangeId {
        self.resource.id
    }

    /// Check if the message must be delivered as an error
    ///
    /// Status above 299, or a truthy `warning`.
    #[must_use]
    pub fn is_error(&self) -> bool {
        self.status_code.is_some_and(|code| code > 299)
            || self.warning.as_ref().is_some_and(is_truthy)
    }

    /// Error payload: `response`, else `body`, else `error`
    #[must_use]
    pub fn error_payload(&self) -> Value {
        [&self.response, &self.body, &self.error]
            .into_iter()
            .flatten()
            .find(|v| is_truthy(v))
            .cloned()
            .unwrap_or(Value::Null)
    }

    /// Classify into what the caller's sink receives
    #[must_use]
    pub fn classify(&self) -> Result<Value, ExchangeError> {
        if self.is_error() {
            Err(ExchangeError::Response {
                status_code: self.status_code.unwrap_or(0),
                response: self.error_payload(),
            })
        } else {
            Ok(self.response.clone().unwrap_or(Value::Null))
        }
    }

    /// Decode from JSON text
    ///
    /// # Errors
    /// Returns `TransportError::Encode` if the text is not a valid message
    pub fn from_json(text: &str) -> Result<Self, TransportError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Loose truthiness for gateway flags and fallback fields
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

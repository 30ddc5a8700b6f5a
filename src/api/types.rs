use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use crate::BatchFlowError;

/// HTTP method of an endpoint
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Method {
    #[default]
    Get,
    Post,
    Put,
    Patch,
    Delete,
}

impl Method {
    pub fn as_str(&self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
        }
    }

    /// Methods that take a list of ids as a batch
    pub fn accepts_id_batch(&self) -> bool {
        matches!(self, Method::Patch | Method::Delete)
    }

    /// Methods that take a list of forms as a batch upload
    pub fn accepts_file_batch(&self) -> bool {
        matches!(self, Method::Post)
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Method {
    type Err = BatchFlowError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "GET" => Ok(Method::Get),
            "POST" => Ok(Method::Post),
            "PUT" => Ok(Method::Put),
            "PATCH" => Ok(Method::Patch),
            "DELETE" => Ok(Method::Delete),
            _ => Err(BatchFlowError::InvalidMethod(s.to_string())),
        }
    }
}

/// One part of a multipart form
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FormPart {
    pub name: String,
    pub file_name: Option<String>,
    pub content_type: Option<String>,
    pub data: Bytes,
}

/// Multipart form payload, one per uploaded file in a batch upload
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FormData {
    pub parts: Vec<FormPart>,
}

impl FormData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        let value: String = value.into();
        self.parts.push(FormPart {
            name: name.into(),
            file_name: None,
            content_type: None,
            data: Bytes::from(value),
        });
        self
    }

    pub fn file(
        mut self,
        name: impl Into<String>,
        file_name: impl Into<String>,
        content_type: impl Into<String>,
        data: impl Into<Bytes>,
    ) -> Self {
        self.parts.push(FormPart {
            name: name.into(),
            file_name: Some(file_name.into()),
            content_type: Some(content_type.into()),
            data: data.into(),
        });
        self
    }

    pub fn get(&self, name: &str) -> Option<&FormPart> {
        self.parts.iter().find(|p| p.name == name)
    }
}

/// Request payload
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Json(Value),
    Form(FormData),
}

/// Query parameters; values are rendered by the transport
pub type Query = BTreeMap<String, Value>;

/// A fully resolved request handed to a [`Transport`](crate::api::Transport)
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// `api_url` joined with `api_prefix`
    pub base_url: String,
    /// Path relative to `base_url`
    pub path: String,
    pub body: Option<RequestBody>,
    pub headers: HashMap<String, String>,
    pub query: Query,
}

impl ApiRequest {
    /// Absolute URL without the query string
    pub fn url(&self) -> String {
        crate::api::url::normalize_url([self.base_url.as_str(), self.path.as_str()])
    }
}

/// Error reported for a failed API call
#[derive(Error, Debug, Clone, PartialEq, Serialize, Deserialize)]
#[error("{message}")]
pub struct ApiError {
    pub message: String,
    pub status: Option<u16>,
    pub data: Option<Value>,
}

impl ApiError {
    pub const DEFAULT_MESSAGE: &'static str = "Request failed";

    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
            data: None,
        }
    }

    pub fn with_status(mut self, status: u16) -> Self {
        self.status = Some(status);
        self
    }

    pub fn timeout(limit: Duration) -> Self {
        Self::new(format!("Request timed out after {}ms", limit.as_millis()))
    }

    /// Build from a non-success response.
    ///
    /// The message is taken from `message` or `error.message` in the body,
    /// falling back to [`ApiError::DEFAULT_MESSAGE`].
    pub fn from_response(status: u16, body: Option<Value>) -> Self {
        let message = body
            .as_ref()
            .and_then(|b| {
                b.get("message")
                    .or_else(|| b.get("error").and_then(|e| e.get("message")))
            })
            .and_then(Value::as_str)
            .filter(|m| !m.is_empty())
            .unwrap_or(Self::DEFAULT_MESSAGE)
            .to_string();

        Self {
            message,
            status: Some(status),
            data: body,
        }
    }
}

/// Result of an endpoint execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ApiOutput {
    /// Plain request
    Single(Value),
    /// Batch request, one value per id or file in input order
    Batch(Vec<Value>),
}

impl ApiOutput {
    pub fn into_values(self) -> Vec<Value> {
        match self {
            ApiOutput::Single(value) => vec![value],
            ApiOutput::Batch(values) => values,
        }
    }

    pub fn as_single(&self) -> Option<&Value> {
        match self {
            ApiOutput::Single(value) => Some(value),
            ApiOutput::Batch(_) => None,
        }
    }

    pub fn as_batch(&self) -> Option<&[Value]> {
        match self {
            ApiOutput::Single(_) => None,
            ApiOutput::Batch(values) => Some(values),
        }
    }
}

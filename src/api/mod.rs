use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::Value;
use thiserror::Error;

use crate::form::Submission;
use crate::model::{Record, RecordId, Section};

mod http;

pub use http::HttpTransport;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ApiError {
    #[error("network error: {0}")]
    Network(String),
    #[error("server rejected the request (HTTP {status}){}", message_suffix(.message))]
    Server { status: u16, message: Option<String> },
    #[error("no authorization token found")]
    Auth,
    #[error("unexpected response body: {0}")]
    Decode(String),
}

fn message_suffix(message: &Option<String>) -> String {
    message
        .as_deref()
        .map(|message| format!(": {message}"))
        .unwrap_or_default()
}

impl ApiError {
    /// Message supplied by the server, when it sent one.
    pub fn server_message(&self) -> Option<&str> {
        match self {
            ApiError::Server { message, .. } => message.as_deref().filter(|m| !m.is_empty()),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
    Put,
    Delete,
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Method::Get => "GET",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Delete => "DELETE",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone)]
pub enum RequestBody {
    Empty,
    Multipart(Submission),
}

/// A request relative to the configured API base URL. Path segments are
/// percent-encoded by the transport.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub segments: Vec<String>,
    pub bearer: Option<String>,
    pub body: RequestBody,
}

impl ApiRequest {
    pub fn path(&self) -> String {
        format!("/{}", self.segments.join("/"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    async fn send(&self, request: ApiRequest) -> Result<RawResponse, ApiError>;
}

/// How the payload sits inside a response body. Each endpoint declares
/// exactly one shape.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnvelopeShape {
    /// `{ success: true, <key>: payload, message? }`
    Keyed(&'static str),
    /// `{ success: true, message? }` or an empty body.
    Ack,
    /// `{ <key>: payload }` where only the HTTP status signals failure.
    Receipt(&'static str),
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApiEnvelope<T> {
    Success { payload: T, message: Option<String> },
    Failure { status: u16, message: Option<String> },
}

impl<T> ApiEnvelope<T> {
    pub fn into_result(self) -> Result<T, ApiError> {
        match self {
            ApiEnvelope::Success { payload, .. } => Ok(payload),
            ApiEnvelope::Failure { status, message } => Err(ApiError::Server { status, message }),
        }
    }
}

/// Decodes a response under the given shape.
///
/// A response is a failure when the status is not 2xx or, for flagged shapes,
/// when `success` is not `true`. An empty body carries the status alone.
pub fn decode_envelope<T: DeserializeOwned>(
    response: &RawResponse,
    shape: EnvelopeShape,
) -> Result<ApiEnvelope<T>, ApiError> {
    let ok = response.is_success();
    let trimmed = response.body.trim();

    let value: Value = if trimmed.is_empty() {
        Value::Null
    } else {
        match serde_json::from_str(trimmed) {
            Ok(value) => value,
            Err(_) if !ok => {
                return Ok(ApiEnvelope::Failure {
                    status: response.status,
                    message: None,
                })
            }
            Err(err) => return Err(ApiError::Decode(err.to_string())),
        }
    };

    let message = value
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string);
    let flagged = match shape {
        EnvelopeShape::Receipt(_) => true,
        EnvelopeShape::Ack if value.is_null() => true,
        EnvelopeShape::Keyed(_) | EnvelopeShape::Ack => {
            value.get("success").map(is_truthy).unwrap_or(false)
        }
    };
    if !ok || !flagged {
        return Ok(ApiEnvelope::Failure {
            status: response.status,
            message,
        });
    }

    let payload = match shape {
        EnvelopeShape::Ack => Value::Null,
        EnvelopeShape::Keyed(key) | EnvelopeShape::Receipt(key) => value
            .get(key)
            .cloned()
            .ok_or_else(|| ApiError::Decode(format!("missing '{key}' in response")))?,
    };
    let payload =
        serde_json::from_value(payload).map_err(|err| ApiError::Decode(err.to_string()))?;
    Ok(ApiEnvelope::Success { payload, message })
}

/// Loose truthiness of the `success` flag: `1` and `"true"` count, `0`, `""`
/// and `null` do not.
fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(flag) => *flag,
        Value::Number(number) => number.as_f64().map_or(false, |n| n != 0.0 && !n.is_nan()),
        Value::String(text) => !text.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ListRoute {
    pub segments: &'static [&'static str],
    pub requires_auth: bool,
    pub shape: EnvelopeShape,
}

pub fn list_route(section: Section) -> ListRoute {
    fn keyed(
        segments: &'static [&'static str],
        requires_auth: bool,
        key: &'static str,
    ) -> ListRoute {
        ListRoute {
            segments,
            requires_auth,
            shape: EnvelopeShape::Keyed(key),
        }
    }

    match section {
        Section::Appointments => keyed(&["api", "appointments"], true, "appointments"),
        Section::Properties => keyed(&["api", "property", "verification"], false, "property_verify"),
        Section::Reviews => keyed(&["api", "reviews", "get-all-reviews"], false, "reviews"),
        Section::Enquiries => keyed(&["api", "enquiry", "get-all-enquiry"], false, "enquiries"),
        Section::Admins => keyed(&["api", "admin"], true, "data"),
        Section::Contractors => keyed(&["api", "contractor", ""], true, "contractors"),
        Section::TitleSearches => {
            keyed(&["api", "title-search", "get-all-requests"], true, "requests")
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ActionKind {
    Accept,
    Reject,
    Delete,
}

impl fmt::Display for ActionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionKind::Accept => "accept",
            ActionKind::Reject => "reject",
            ActionKind::Delete => "delete",
        };
        f.write_str(name)
    }
}

/// Where an action on a record is sent. `{id}` marks the identifier segment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MutationRoute {
    pub method: Method,
    pub segments: &'static [&'static str],
    pub requires_auth: bool,
}

impl MutationRoute {
    pub fn segments_for(&self, id: &RecordId) -> Vec<String> {
        self.segments
            .iter()
            .map(|segment| {
                if *segment == "{id}" {
                    id.as_str().to_string()
                } else {
                    (*segment).to_string()
                }
            })
            .collect()
    }
}

/// Route table for record actions; `None` when the section does not support
/// the action.
pub fn mutation_route(section: Section, kind: ActionKind) -> Option<MutationRoute> {
    use ActionKind::*;

    fn route(
        method: Method,
        segments: &'static [&'static str],
        requires_auth: bool,
    ) -> MutationRoute {
        MutationRoute {
            method,
            segments,
            requires_auth,
        }
    }

    match (section, kind) {
        (Section::Appointments, Delete) => {
            Some(route(Method::Delete, &["api", "appointments", "{id}"], true))
        }
        (Section::Properties, Accept) => {
            Some(route(Method::Put, &["api", "property", "{id}", "accept"], false))
        }
        (Section::Properties, Reject) => {
            Some(route(Method::Put, &["api", "property", "{id}", "reject"], false))
        }
        (Section::Enquiries, Delete) => {
            Some(route(Method::Delete, &["api", "enquiry", "{id}", "delete"], true))
        }
        (Section::Admins, Delete) => Some(route(Method::Delete, &["api", "admin", "{id}"], true)),
        (Section::Contractors, Accept) => {
            Some(route(Method::Put, &["api", "contractor", "verify", "{id}"], true))
        }
        (Section::Contractors, Reject) => {
            Some(route(Method::Delete, &["api", "contractor", "{id}"], true))
        }
        _ => None,
    }
}

pub const TITLE_SEARCH_CREATE: &[&str] = &["api", "title-search", "create-request"];

/// Server acknowledgement of a mutation.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Ack {
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionReceipt {
    pub request_id: String,
}

#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    token: Option<String>,
}

impl fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ApiClient")
            .field("authenticated", &self.token.is_some())
            .finish()
    }
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            token: None,
        }
    }

    pub fn with_token(mut self, token: Option<String>) -> Self {
        self.set_token(token);
        self
    }

    pub fn set_token(&mut self, token: Option<String>) {
        self.token = token.filter(|token| !token.trim().is_empty());
    }

    pub fn token(&self) -> Option<&str> {
        self.token.as_deref()
    }

    fn bearer(&self, required: bool) -> Result<Option<String>, ApiError> {
        if !required {
            return Ok(None);
        }
        self.token.clone().map(Some).ok_or(ApiError::Auth)
    }

    pub async fn list<R>(&self) -> Result<Vec<R>, ApiError>
    where
        R: Record + DeserializeOwned,
    {
        let route = list_route(R::SECTION);
        let request = ApiRequest {
            method: Method::Get,
            segments: route.segments.iter().map(|s| s.to_string()).collect(),
            bearer: self.bearer(route.requires_auth)?,
            body: RequestBody::Empty,
        };
        let response = self.transport.send(request).await?;
        decode_envelope::<Vec<R>>(&response, route.shape)?.into_result()
    }

    pub async fn mutate(&self, route: &MutationRoute, id: &RecordId) -> Result<Ack, ApiError> {
        let request = ApiRequest {
            method: route.method,
            segments: route.segments_for(id),
            bearer: self.bearer(route.requires_auth)?,
            body: RequestBody::Empty,
        };
        let response = self.transport.send(request).await?;
        match decode_envelope::<()>(&response, EnvelopeShape::Ack)? {
            ApiEnvelope::Success { message, .. } => Ok(Ack { message }),
            failure => failure.into_result().map(|_| Ack::default()),
        }
    }

    pub async fn submit_title_search(
        &self,
        submission: Submission,
    ) -> Result<SubmissionReceipt, ApiError> {
        let request = ApiRequest {
            method: Method::Post,
            segments: TITLE_SEARCH_CREATE.iter().map(|s| s.to_string()).collect(),
            bearer: None,
            body: RequestBody::Multipart(submission),
        };
        let response = self.transport.send(request).await?;
        let request_id: String =
            decode_envelope(&response, EnvelopeShape::Receipt("requestId"))?.into_result()?;
        Ok(SubmissionReceipt { request_id })
    }
}

//! Request model shared by the client and the interceptor.
//!
//! A request is plain data until it is dispatched, so the interceptor can
//! rewrite its headers and the client can send it a second time after a
//! session recovery.

use crate::{ApiError, ApiResult};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use reqwest::Method;
use serde::Serialize;
use std::time::Duration;

const BEARER_PREFIX: &str = "Bearer ";

/// Body of an outgoing request, chosen by the caller.
#[derive(Debug, Clone, Default)]
pub enum RequestBody {
    /// No body.
    #[default]
    Empty,
    /// JSON document, sent as `application/json`.
    Json(serde_json::Value),
    /// Multipart form. The transport generates the boundary and the header.
    Multipart(MultipartPayload),
}

/// File contents for a multipart part.
#[derive(Debug, Clone)]
pub struct FileUpload {
    pub file_name: String,
    pub mime_type: String,
    pub bytes: Vec<u8>,
}

impl FileUpload {
    pub fn new(file_name: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            file_name: file_name.into(),
            mime_type: mime_type.into(),
            bytes,
        }
    }
}

#[derive(Debug, Clone)]
enum FormPart {
    Text { name: String, value: String },
    File { name: String, file: FileUpload },
}

/// Cloneable description of a multipart form.
///
/// `reqwest::multipart::Form` is consumed by sending it, so the form is
/// rebuilt from this description on every dispatch.
#[derive(Debug, Clone, Default)]
pub struct MultipartPayload {
    parts: Vec<FormPart>,
}

impl MultipartPayload {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a text field.
    pub fn text(mut self, name: impl Into<String>, value: impl ToString) -> Self {
        self.parts.push(FormPart::Text {
            name: name.into(),
            value: value.to_string(),
        });
        self
    }

    /// Append a file field.
    pub fn file(mut self, name: impl Into<String>, file: FileUpload) -> Self {
        self.parts.push(FormPart::File {
            name: name.into(),
            file,
        });
        self
    }

    /// Field names in insertion order.
    pub fn field_names(&self) -> Vec<&str> {
        self.parts
            .iter()
            .map(|part| match part {
                FormPart::Text { name, .. } | FormPart::File { name, .. } => name.as_str(),
            })
            .collect()
    }

    pub fn len(&self) -> usize {
        self.parts.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    pub(crate) fn to_form(&self) -> ApiResult<reqwest::multipart::Form> {
        let mut form = reqwest::multipart::Form::new();
        for part in &self.parts {
            form = match part {
                FormPart::Text { name, value } => form.text(name.clone(), value.clone()),
                FormPart::File { name, file } => {
                    let part = reqwest::multipart::Part::bytes(file.bytes.clone())
                        .file_name(file.file_name.clone())
                        .mime_str(&file.mime_type)
                        .map_err(|e| {
                            ApiError::InvalidRequest(format!(
                                "invalid mime type {:?}: {}",
                                file.mime_type, e
                            ))
                        })?;
                    form.part(name.clone(), part)
                }
            };
        }
        Ok(form)
    }
}

/// An API call that has not been sent yet.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    method: Method,
    path: String,
    query: Vec<(String, String)>,
    body: RequestBody,
    headers: HeaderMap,
    timeout: Option<Duration>,
    retried: bool,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            body: RequestBody::Empty,
            headers: HeaderMap::new(),
            timeout: None,
            retried: false,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    pub fn patch(path: impl Into<String>) -> Self {
        Self::new(Method::PATCH, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    /// Add one query parameter.
    pub fn with_query(mut self, key: impl Into<String>, value: impl ToString) -> Self {
        self.query.push((key.into(), value.to_string()));
        self
    }

    /// Add query parameters from a serializable object.
    ///
    /// Top-level fields become parameters; `null` fields are skipped and
    /// non-string values use their JSON text.
    pub fn with_query_object<Q: Serialize + ?Sized>(mut self, params: &Q) -> ApiResult<Self> {
        if let serde_json::Value::Object(map) = serde_json::to_value(params)? {
            for (key, value) in map {
                match value {
                    serde_json::Value::Null => {}
                    serde_json::Value::String(s) => self.query.push((key, s)),
                    other => self.query.push((key, other.to_string())),
                }
            }
        }
        Ok(self)
    }

    pub fn with_body(mut self, body: RequestBody) -> Self {
        self.body = body;
        self
    }

    /// Serialize `body` as the JSON payload.
    pub fn with_json<B: Serialize + ?Sized>(self, body: &B) -> ApiResult<Self> {
        let value = serde_json::to_value(body)?;
        Ok(self.with_body(RequestBody::Json(value)))
    }

    /// Override the client's default timeout for this request.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn method(&self) -> &Method {
        &self.method
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn query(&self) -> &[(String, String)] {
        &self.query
    }

    pub fn body(&self) -> &RequestBody {
        &self.body
    }

    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    pub fn headers_mut(&mut self) -> &mut HeaderMap {
        &mut self.headers
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// The `Authorization` header value, if set and printable.
    pub fn authorization(&self) -> Option<&str> {
        self.headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
    }

    /// Whether this request was already replayed after a 401.
    pub fn is_retried(&self) -> bool {
        self.retried
    }

    pub(crate) fn mark_retried(&mut self) {
        self.retried = true;
    }

    /// Exclude this request from 401 recovery, so a rejection is returned
    /// to the caller as is. Used for credential exchanges.
    pub fn without_recovery(mut self) -> Self {
        self.retried = true;
        self
    }

    /// Set `Authorization: Bearer <token>`, replacing any previous value.
    pub fn set_bearer(&mut self, token: &str) -> ApiResult<()> {
        let mut value = HeaderValue::from_str(&bearer_value(token))
            .map_err(|e| ApiError::InvalidRequest(format!("invalid bearer token: {}", e)))?;
        value.set_sensitive(true);
        self.headers.insert(AUTHORIZATION, value);
        Ok(())
    }

    /// Make `Content-Type` agree with the body kind.
    ///
    /// JSON bodies get `application/json`. Multipart bodies lose any explicit
    /// `Content-Type` so the transport can write one with its own boundary.
    pub fn apply_content_type(&mut self) {
        match self.body {
            RequestBody::Json(_) => {
                self.headers
                    .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
            }
            RequestBody::Multipart(_) => {
                self.headers.remove(CONTENT_TYPE);
            }
            RequestBody::Empty => {}
        }
    }
}

/// `Bearer <token>` for a raw token; an already-prefixed token is kept as is.
pub fn bearer_value(token: &str) -> String {
    let token = token.trim();
    let raw = token.strip_prefix(BEARER_PREFIX).unwrap_or(token).trim_start();
    format!("{}{}", BEARER_PREFIX, raw)
}

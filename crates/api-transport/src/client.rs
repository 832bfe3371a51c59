//! Shared HTTP client.

use crate::interceptor::AuthInterceptor;
use crate::request::{ApiRequest, MultipartPayload, RequestBody};
use crate::{fingerprint, ApiError, ApiResult};
use client_config::Config;
use parking_lot::RwLock;
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};
use url::Url;

/// HTTP client bound to one API base URL.
///
/// Every verb method goes through [`ApiClient::send`], which hands the
/// request to the attached [`AuthInterceptor`] (if any) before dispatch and
/// again after a failure.
pub struct ApiClient {
    http: reqwest::Client,
    base_url: Url,
    upload_timeout: Duration,
    interceptor: RwLock<Option<Arc<AuthInterceptor>>>,
}

impl ApiClient {
    /// Build a client from configuration.
    pub fn new(config: &Config) -> ApiResult<Self> {
        let base_url = config
            .api_base_url()
            .map_err(|e| ApiError::InvalidUrl(e.to_string()))?;
        let http = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .build()?;

        debug!(
            base_url = %base_url,
            timeout_secs = config.request_timeout_secs,
            "API client created"
        );

        Ok(Self {
            http,
            base_url,
            upload_timeout: config.upload_timeout(),
            interceptor: RwLock::new(None),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    /// Resolve a request path against the base URL.
    ///
    /// The path is appended to the base, so a base URL with its own path
    /// prefix (`https://host/api`) keeps it. Absolute URLs are used as is.
    pub fn url_for(&self, path: &str) -> ApiResult<Url> {
        if path.starts_with("http://") || path.starts_with("https://") {
            return Ok(Url::parse(path)?);
        }
        let base = self.base_url.as_str().trim_end_matches('/');
        let url = if path.is_empty() || path.starts_with('/') {
            format!("{}{}", base, path)
        } else {
            format!("{}/{}", base, path)
        };
        Ok(Url::parse(&url)?)
    }

    /// Attach the auth interceptor, replacing any previous one.
    pub fn attach_interceptor(&self, interceptor: Arc<AuthInterceptor>) {
        let previous = self.interceptor.write().replace(interceptor);
        if previous.is_some() {
            debug!("Auth interceptor replaced");
        } else {
            debug!("Auth interceptor attached");
        }
    }

    /// Detach the auth interceptor. Returns whether one was attached.
    pub fn detach_interceptor(&self) -> bool {
        let detached = self.interceptor.write().take().is_some();
        if detached {
            debug!("Auth interceptor detached");
        }
        detached
    }

    pub fn interceptor(&self) -> Option<Arc<AuthInterceptor>> {
        self.interceptor.read().clone()
    }

    /// Send a request and return the decoded JSON body.
    ///
    /// An empty response body decodes as `null`; a non-JSON body is returned
    /// as a JSON string. A request rejected with 401 is resent at most once,
    /// after the interceptor's recovery settles.
    pub async fn send(&self, mut request: ApiRequest) -> ApiResult<Value> {
        let interceptor = self.interceptor();
        match &interceptor {
            Some(interceptor) => interceptor.augment(&mut request)?,
            None => request.apply_content_type(),
        }

        let result = self.dispatch(&request).await;
        match (result, interceptor) {
            (Err(error), Some(interceptor)) => {
                interceptor.recover(&mut request, error).await?;
                debug!(
                    method = %request.method(),
                    path = %request.path(),
                    "Replaying request after session recovery"
                );
                self.dispatch(&request).await
            }
            (result, _) => result,
        }
    }

    /// Send a request and deserialize the response body into `T`.
    pub async fn send_as<T: DeserializeOwned>(&self, request: ApiRequest) -> ApiResult<T> {
        let value = self.send(request).await?;
        serde_json::from_value(value).map_err(|e| ApiError::Decode(e.to_string()))
    }

    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> ApiResult<T> {
        self.send_as(ApiRequest::get(path)).await
    }

    /// GET with query parameters taken from the fields of `params`.
    pub async fn get_with_params<T, Q>(&self, path: &str, params: &Q) -> ApiResult<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        self.send_as(ApiRequest::get(path).with_query_object(params)?)
            .await
    }

    pub async fn post<T, B>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send_as(ApiRequest::post(path).with_json(body)?).await
    }

    pub async fn put<T, B>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send_as(ApiRequest::put(path).with_json(body)?).await
    }

    pub async fn patch<T, B>(&self, path: &str, body: &B) -> ApiResult<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send_as(ApiRequest::patch(path).with_json(body)?).await
    }

    pub async fn delete<T: DeserializeOwned>(&self, path: &str, body: Option<Value>) -> ApiResult<T> {
        let request = match body {
            Some(body) => ApiRequest::delete(path).with_body(RequestBody::Json(body)),
            None => ApiRequest::delete(path),
        };
        self.send_as(request).await
    }

    /// POST a multipart form with the upload timeout.
    pub async fn post_form_data<T: DeserializeOwned>(
        &self,
        path: &str,
        form: MultipartPayload,
    ) -> ApiResult<T> {
        self.send_as(self.form_request(ApiRequest::post(path), form))
            .await
    }

    /// PUT a multipart form with the upload timeout.
    pub async fn put_form_data<T: DeserializeOwned>(
        &self,
        path: &str,
        form: MultipartPayload,
    ) -> ApiResult<T> {
        self.send_as(self.form_request(ApiRequest::put(path), form))
            .await
    }

    fn form_request(&self, request: ApiRequest, form: MultipartPayload) -> ApiRequest {
        request
            .with_body(RequestBody::Multipart(form))
            .with_timeout(self.upload_timeout)
    }

    async fn dispatch(&self, request: &ApiRequest) -> ApiResult<Value> {
        let url = self.url_for(request.path())?;
        let mut builder = self
            .http
            .request(request.method().clone(), url)
            .headers(request.headers().clone());

        if !request.query().is_empty() {
            builder = builder.query(request.query());
        }
        if let Some(timeout) = request.timeout() {
            builder = builder.timeout(timeout);
        }
        builder = match request.body() {
            RequestBody::Empty => builder,
            RequestBody::Json(value) => builder.json(value),
            RequestBody::Multipart(payload) => builder.multipart(payload.to_form()?),
        };

        let response = builder.send().await.map_err(|e| {
            let error = ApiError::from(e);
            warn!(
                method = %request.method(),
                path = %request.path(),
                error = %error,
                "Request failed without a response"
            );
            error
        })?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!(
                method = %request.method(),
                path = %request.path(),
                status = status.as_u16(),
                body = %fingerprint(&body),
                "Request rejected"
            );
            return Err(ApiError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }

        debug!(
            method = %request.method(),
            path = %request.path(),
            status = status.as_u16(),
            "Request succeeded"
        );
        Ok(decode_body(body))
    }
}

fn decode_body(body: String) -> Value {
    if body.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(&body).unwrap_or(Value::String(body))
}

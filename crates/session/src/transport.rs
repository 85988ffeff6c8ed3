//! Request descriptors and the API transport boundary.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use landreg_core::{SessionError, SessionResult};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum Method {
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
}

impl core::fmt::Display for Method {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Descriptor of one API call. Cheap to clone; resent verbatim on retry.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiRequest {
    pub method: Method,
    /// Path relative to the API base URL (or an absolute URL).
    pub path: String,
    pub query: Vec<(String, String)>,
    pub headers: Vec<(String, String)>,
    pub body: Option<Value>,
}

impl ApiRequest {
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self {
            method,
            path: path.into(),
            query: Vec::new(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::Get, path)
    }

    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::Post, path)
    }

    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::Delete, path)
    }

    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.push((key.into(), value.into()));
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn json<T: Serialize>(mut self, body: &T) -> SessionResult<Self> {
        let body = serde_json::to_value(body)
            .map_err(|e| SessionError::decode(format!("failed to encode request body: {e}")))?;
        self.body = Some(body);
        Ok(self)
    }
}

/// Raw API response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

impl ApiResponse {
    pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn is_unauthorized(&self) -> bool {
        self.status == 401
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    pub fn json<T: DeserializeOwned>(&self) -> SessionResult<T> {
        serde_json::from_slice(&self.body)
            .map_err(|e| SessionError::decode(format!("failed to decode response body: {e}")))
    }

    /// Success stays a response; any other status becomes `SessionError::Api`.
    pub fn into_result(self) -> SessionResult<ApiResponse> {
        if self.is_success() {
            Ok(self)
        } else {
            Err(SessionError::api(self.status, self.text()))
        }
    }
}

/// Executes API requests.
///
/// `Err` is reserved for transport failures (`SessionError::Network`); every
/// HTTP status, including 401, comes back as an `ApiResponse`.
#[async_trait]
pub trait ApiTransport: Send + Sync {
    async fn execute(&self, request: &ApiRequest, bearer: Option<&str>)
    -> SessionResult<ApiResponse>;
}

#[async_trait]
impl<T> ApiTransport for Arc<T>
where
    T: ApiTransport + ?Sized,
{
    async fn execute(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
    ) -> SessionResult<ApiResponse> {
        (**self).execute(request, bearer).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn non_success_becomes_api_error() {
        let err = ApiResponse::new(404, "missing").into_result().unwrap_err();
        assert_eq!(err, SessionError::api(404, "missing"));
        assert!(ApiResponse::new(204, Vec::new()).into_result().is_ok());
    }

    #[test]
    fn request_builder_collects_parts() {
        let req = ApiRequest::post("/parcels")
            .query("district", "north")
            .header("X-Trace", "1")
            .json(&serde_json::json!({"title": "Plot 7"}))
            .unwrap();
        assert_eq!(req.method, Method::Post);
        assert_eq!(req.query, vec![("district".to_string(), "north".to_string())]);
        assert_eq!(req.body, Some(serde_json::json!({"title": "Plot 7"})));
    }
}

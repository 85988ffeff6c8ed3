//! reqwest-backed identity service and API transport.

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;

use landreg_auth::{Credentials, RefreshedToken, Registration, TokenPair, UserProfile};
use landreg_core::{SessionError, SessionResult};

use crate::config::ClientConfig;
use crate::identity::IdentityService;
use crate::transport::{ApiRequest, ApiResponse, ApiTransport, Method};

/// Shared reqwest client carrying the configured timeout.
pub fn build_client(config: &ClientConfig) -> SessionResult<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.request_timeout)
        .build()
        .map_err(|e| SessionError::network(format!("failed to build http client: {e}")))
}

fn network_error(err: reqwest::Error) -> SessionError {
    if err.is_timeout() {
        SessionError::network(format!("request timed out: {err}"))
    } else {
        SessionError::network(err.to_string())
    }
}

async fn read_response(resp: reqwest::Response) -> SessionResult<ApiResponse> {
    let status = resp.status().as_u16();
    let body = resp.bytes().await.map_err(network_error)?;
    Ok(ApiResponse::new(status, body.to_vec()))
}

/// Identity service over HTTP.
#[derive(Debug, Clone)]
pub struct HttpIdentityService {
    client: reqwest::Client,
    config: ClientConfig,
}

#[derive(Serialize)]
struct RefreshRequest<'a> {
    #[serde(rename = "refreshToken")]
    refresh_token: &'a str,
}

impl HttpIdentityService {
    pub fn new(config: ClientConfig) -> SessionResult<Self> {
        let client = build_client(&config)?;
        Ok(Self { client, config })
    }

    pub fn with_client(client: reqwest::Client, config: ClientConfig) -> Self {
        Self { client, config }
    }

    async fn post<B: Serialize + ?Sized>(&self, path: &str, body: &B) -> SessionResult<ApiResponse> {
        let url = self.config.url(path);
        tracing::debug!(%url, "identity service call");
        let resp = self
            .client
            .post(&url)
            .json(body)
            .send()
            .await
            .map_err(network_error)?;
        read_response(resp).await
    }

    fn decode<T: DeserializeOwned>(response: ApiResponse) -> SessionResult<T> {
        response.into_result()?.json()
    }
}

#[async_trait]
impl IdentityService for HttpIdentityService {
    async fn issue_token(&self, credentials: &Credentials) -> SessionResult<TokenPair> {
        let response = self.post(&self.config.token_path, credentials).await?;
        match response.status {
            400 | 401 => Err(SessionError::InvalidCredentials),
            _ => Self::decode(response),
        }
    }

    async fn refresh_token(&self, refresh_token: &str) -> SessionResult<RefreshedToken> {
        let response = self
            .post(&self.config.refresh_path, &RefreshRequest { refresh_token })
            .await?;
        match response.status {
            400..=499 => Err(SessionError::RefreshExpired),
            500..=599 => Err(SessionError::network(format!(
                "refresh endpoint unavailable ({})",
                response.status
            ))),
            _ => Self::decode(response),
        }
    }

    async fn current_user(&self, access_token: &str) -> SessionResult<UserProfile> {
        let url = self.config.url(&self.config.me_path);
        let resp = self
            .client
            .get(&url)
            .bearer_auth(access_token)
            .send()
            .await
            .map_err(network_error)?;
        Self::decode(read_response(resp).await?)
    }

    async fn register(&self, registration: &Registration) -> SessionResult<UserProfile> {
        let response = self.post(&self.config.register_path, registration).await?;
        Self::decode(response)
    }
}

/// API transport over HTTP. Relative paths are joined to the API base URL.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    config: ClientConfig,
}

impl HttpTransport {
    pub fn new(config: ClientConfig) -> SessionResult<Self> {
        let client = build_client(&config)?;
        Ok(Self { client, config })
    }

    pub fn with_client(client: reqwest::Client, config: ClientConfig) -> Self {
        Self { client, config }
    }
}

fn method(method: Method) -> reqwest::Method {
    match method {
        Method::Get => reqwest::Method::GET,
        Method::Post => reqwest::Method::POST,
        Method::Put => reqwest::Method::PUT,
        Method::Patch => reqwest::Method::PATCH,
        Method::Delete => reqwest::Method::DELETE,
    }
}

#[async_trait]
impl ApiTransport for HttpTransport {
    async fn execute(
        &self,
        request: &ApiRequest,
        bearer: Option<&str>,
    ) -> SessionResult<ApiResponse> {
        let url = self.config.url(&request.path);
        let mut req = self.client.request(method(request.method), &url);

        if !request.query.is_empty() {
            req = req.query(&request.query);
        }
        for (name, value) in &request.headers {
            req = req.header(name.as_str(), value.as_str());
        }
        if let Some(token) = bearer {
            req = req.bearer_auth(token);
        }
        if let Some(body) = &request.body {
            req = req.json(body);
        }

        let resp = req.send().await.map_err(network_error)?;
        read_response(resp).await
    }
}

//! Authenticated request dispatch with refresh-on-401.

use std::sync::Arc;

use serde::Serialize;

use landreg_core::{RequestId, SessionError, SessionResult};

use crate::client::SessionClient;
use crate::transport::{ApiRequest, ApiResponse, ApiTransport};

/// Where a request is in its 401 handling.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum Attempt {
    /// First send.
    Initial,
    /// Got a 401; waiting on the session client's refresh.
    AwaitingRefresh,
    /// Resent once after a refresh. A further 401 ends the request.
    Retried,
}

/// One request moving through the dispatcher.
#[derive(Debug, Clone)]
pub struct PendingRequest {
    pub id: RequestId,
    pub request: ApiRequest,
    pub attempt: Attempt,
}

impl PendingRequest {
    pub fn new(request: ApiRequest) -> Self {
        Self {
            id: RequestId::new(),
            request,
            attempt: Attempt::Initial,
        }
    }
}

/// Sends API requests with the current access token attached.
///
/// A 401 triggers at most one refresh and one resend per request. Concurrent
/// 401s share a single refresh through [`SessionClient::refresh`].
#[derive(Clone)]
pub struct RequestDispatcher {
    client: SessionClient,
    transport: Arc<dyn ApiTransport>,
}

impl RequestDispatcher {
    pub fn new(client: SessionClient, transport: Arc<dyn ApiTransport>) -> Self {
        Self { client, transport }
    }

    pub fn client(&self) -> &SessionClient {
        &self.client
    }

    /// Send a request. 2xx comes back as a response; every other outcome is
    /// an error.
    pub async fn send(&self, request: ApiRequest) -> SessionResult<ApiResponse> {
        let mut pending = PendingRequest::new(request);
        let mut bearer = self.client.access_token();

        loop {
            tracing::debug!(
                request_id = %pending.id,
                method = %pending.request.method,
                path = %pending.request.path,
                attempt = ?pending.attempt,
                authenticated = bearer.is_some(),
                "dispatching request"
            );

            let response = self
                .transport
                .execute(&pending.request, bearer.as_deref())
                .await?;

            if !response.is_unauthorized() {
                return response.into_result();
            }

            let Some(sent_with) = bearer.take() else {
                tracing::warn!(
                    request_id = %pending.id,
                    path = %pending.request.path,
                    "unauthorized without a session"
                );
                return Err(SessionError::SessionExpired);
            };

            if pending.attempt == Attempt::Retried {
                tracing::warn!(
                    request_id = %pending.id,
                    path = %pending.request.path,
                    "still unauthorized after refresh; ending session"
                );
                if let Err(err) = self.client.expire(&sent_with) {
                    tracing::error!(error = %err, "failed to clear credentials");
                }
                return Err(SessionError::SessionExpired);
            }

            pending.attempt = Attempt::AwaitingRefresh;
            bearer = Some(self.renewed_token(&pending, &sent_with).await?);
            pending.attempt = Attempt::Retried;
        }
    }

    /// Access token to retry with after `sent_with` was rejected.
    async fn renewed_token(
        &self,
        pending: &PendingRequest,
        sent_with: &str,
    ) -> SessionResult<String> {
        if let Some(current) = self.superseding_token(sent_with) {
            tracing::warn!(
                request_id = %pending.id,
                "unauthorized with a superseded token; retrying with the current one"
            );
            return Ok(current);
        }

        tracing::warn!(request_id = %pending.id, "unauthorized; refreshing access token");
        match self.client.refresh().await {
            Ok(session) => Ok(session.access_token),
            Err(SessionError::RefreshExpired) => Err(SessionError::SessionExpired),
            // A newer login may have replaced the session mid-refresh.
            Err(SessionError::RefreshCancelled) => match self.superseding_token(sent_with) {
                Some(current) => {
                    tracing::warn!(
                        request_id = %pending.id,
                        "session replaced during refresh; retrying with the new one"
                    );
                    Ok(current)
                }
                None => Err(SessionError::SessionExpired),
            },
            Err(err) => Err(err),
        }
    }

    /// The stored access token, if a session exists and it is not `sent_with`.
    fn superseding_token(&self, sent_with: &str) -> Option<String> {
        self.client
            .access_token()
            .filter(|current| current != sent_with)
    }

    pub async fn get(&self, path: impl Into<String>) -> SessionResult<ApiResponse> {
        self.send(ApiRequest::get(path)).await
    }

    pub async fn post_json<B: Serialize>(
        &self,
        path: impl Into<String>,
        body: &B,
    ) -> SessionResult<ApiResponse> {
        self.send(ApiRequest::post(path).json(body)?).await
    }
}

impl core::fmt::Debug for RequestDispatcher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("RequestDispatcher")
            .field("client", &self.client)
            .finish_non_exhaustive()
    }
}

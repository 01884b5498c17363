//! Resource clients
//!
//! One client per resource kind, all built on [`ApiClient`], which attaches the
//! session token, applies the shared status table and feeds normalization
//! diagnostics into the process-wide [`DiagnosticLog`].

mod articles;
mod comments;
mod stats;
mod users;

pub use articles::ArticlesClient;
pub use comments::CommentsClient;
pub use stats::StatsClient;
pub use users::UsersClient;

use crate::config::BanPolicy;
use crate::diagnostics::{DiagnosticLog, NormalizeReport};
use crate::error::{ApiError, InvalidReason, LAST_ADMIN_MARKER};
use crate::event::{EventBus, SessionEndReason, SyncEvent};
use crate::models::ResourceKind;
use crate::normalize::{normalize_list, normalize_one, parse_body, Normalize};
use crate::session::Session;
use crate::transport::{ApiRequest, RawResponse, Transport};
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

/// Shared plumbing for every resource client
#[derive(Clone)]
pub struct ApiClient {
    session: Session,
    transport: Arc<dyn Transport>,
    diagnostics: DiagnosticLog,
    ban: BanPolicy,
    events: Option<EventBus>,
}

impl ApiClient {
    pub fn new(session: Session, diagnostics: DiagnosticLog, ban: BanPolicy) -> Self {
        let transport = session.transport();
        Self {
            session,
            transport,
            diagnostics,
            ban,
            events: None,
        }
    }

    /// Publish `SessionEnded { Expired }` here when a 401 ends the session
    pub fn with_events(mut self, events: EventBus) -> Self {
        self.events = Some(events);
        self
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn diagnostics(&self) -> &DiagnosticLog {
        &self.diagnostics
    }

    pub fn ban_policy(&self) -> &BanPolicy {
        &self.ban
    }

    pub fn users(&self) -> UsersClient {
        UsersClient::new(self.clone())
    }

    pub fn articles(&self) -> ArticlesClient {
        ArticlesClient::new(self.clone())
    }

    pub fn comments(&self) -> CommentsClient {
        CommentsClient::new(self.clone())
    }

    pub fn stats(&self) -> StatsClient {
        StatsClient::new(self.clone())
    }

    /// Send an authenticated request and map its status
    ///
    /// Fails with `Unauthenticated` before touching the network when there is
    /// no token. The token is captured once, so a concurrent logout cannot
    /// change the headers of a request already being built.
    pub async fn execute(
        &self,
        kind: ResourceKind,
        id: Option<i64>,
        request: ApiRequest,
    ) -> Result<RawResponse, ApiError> {
        let Some(credentials) = self.session.credentials() else {
            debug!(%kind, path = %request.path, "No session token, not sending");
            return Err(ApiError::Unauthenticated);
        };

        let method = request.method;
        let path = request.path.clone();
        let response = self
            .transport
            .send(request.bearer(credentials.token))
            .await
            .map_err(|e| {
                warn!(%kind, %method, %path, error = %e, "Request failed");
                ApiError::Unreachable(e)
            })?;

        match map_status(kind, id, &response) {
            Ok(()) => Ok(response),
            Err(ApiError::Unauthenticated) => {
                if self.session.invalidate(credentials.epoch) {
                    if let Some(events) = &self.events {
                        events.publish(SyncEvent::SessionEnded {
                            reason: SessionEndReason::Expired,
                        });
                    }
                }
                Err(ApiError::Unauthenticated)
            }
            Err(e) => {
                debug!(%kind, %method, %path, status = response.status, error = %e, "Request rejected");
                Err(e)
            }
        }
    }

    /// Fetch and normalize a collection, dropping malformed records
    pub async fn fetch_list<T: Normalize>(&self, path: &str) -> Result<Vec<T>, ApiError> {
        let response = self.execute(T::KIND, None, ApiRequest::get(path)).await?;
        let raw = parse_body(&response.body)?;

        let mut report = NormalizeReport::new();
        let records = normalize_list::<T>(&raw, &mut report);
        self.diagnostics.record(&report);
        records
    }

    /// Fetch and normalize a single record; a bad record fails the call
    pub async fn fetch_one<T: Normalize>(&self, id: Option<i64>, path: &str) -> Result<T, ApiError> {
        let response = self.execute(T::KIND, id, ApiRequest::get(path)).await?;
        let raw = parse_body(&response.body)?;

        let mut report = NormalizeReport::new();
        let record = normalize_one::<T>(&raw, &mut report);
        self.diagnostics.record(&report);
        record
    }

    /// Run a mutation; the success body is not interpreted
    pub async fn mutate(
        &self,
        kind: ResourceKind,
        id: Option<i64>,
        request: ApiRequest,
    ) -> Result<(), ApiError> {
        self.execute(kind, id, request).await.map(|_| ())
    }
}

/// The one status-to-outcome table shared by every endpoint
pub fn map_status(kind: ResourceKind, id: Option<i64>, response: &RawResponse) -> Result<(), ApiError> {
    match response.status {
        200 => Ok(()),
        400 => {
            let reason = if response.body.contains(LAST_ADMIN_MARKER) {
                InvalidReason::LastAdminProtected
            } else {
                InvalidReason::Other(server_message(&response.body))
            };
            Err(ApiError::InvalidRequest(reason))
        }
        401 => Err(ApiError::Unauthenticated),
        403 => Err(ApiError::Forbidden),
        404 => Err(ApiError::NotFound { kind, id }),
        500..=599 => Err(ApiError::ServerError(server_message(&response.body))),
        status => Err(ApiError::UnexpectedStatus(status)),
    }
}

/// `error` or `message` from a JSON body, else the trimmed body itself
pub fn server_message(body: &str) -> String {
    if let Ok(Value::Object(map)) = serde_json::from_str::<Value>(body) {
        for key in ["error", "message"] {
            if let Some(Value::String(message)) = map.get(key) {
                return message.clone();
            }
        }
    }
    body.trim().to_string()
}

/// Read and delete operations common to the list-shaped resources
#[async_trait]
pub trait ResourceClient: Send + Sync {
    type Record: Normalize + Send + 'static;

    /// Collection path, e.g. `/admin/users`
    const PATH: &'static str;

    fn api(&self) -> &ApiClient;

    /// Fetch the whole collection
    #[tracing::instrument(skip(self))]
    async fn list(&self) -> Result<Vec<Self::Record>, ApiError> {
        self.api().fetch_list(Self::PATH).await
    }

    /// Delete one record by id
    #[tracing::instrument(skip(self))]
    async fn delete(&self, id: i64) -> Result<(), ApiError> {
        self.api()
            .mutate(
                <Self::Record as Normalize>::KIND,
                Some(id),
                ApiRequest::delete(format!("{}/{}", Self::PATH, id)),
            )
            .await
    }
}

/// Ids for a batch call; empty selections never reach the server
pub(crate) fn require_selection(ids: &[i64]) -> Result<(), ApiError> {
    if ids.is_empty() {
        return Err(ApiError::InvalidRequest(InvalidReason::EmptySelection));
    }
    Ok(())
}

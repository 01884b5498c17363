use super::{ApiClient, ResourceClient};
use crate::error::ApiError;
use crate::models::{ResourceKind, User};
use crate::transport::ApiRequest;
use serde_json::json;
use tracing::info;

const KIND: ResourceKind = ResourceKind::Users;

/// Account administration
#[derive(Clone)]
pub struct UsersClient {
    api: ApiClient,
}

impl UsersClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Detail view of one account
    pub async fn get(&self, id: i64) -> Result<User, ApiError> {
        self.api
            .fetch_one(Some(id), &format!("{}/{}", Self::PATH, id))
            .await
    }

    /// Ban an account; omitted reason or duration fall back to the configured policy
    ///
    /// The duration is sent as both `durationInHours` and `duration` so either
    /// server revision reads it.
    pub async fn ban(
        &self,
        id: i64,
        reason: Option<&str>,
        duration_hours: Option<u32>,
    ) -> Result<(), ApiError> {
        let policy = self.api.ban_policy();
        let reason = reason.unwrap_or(&policy.reason);
        let hours = duration_hours.unwrap_or(policy.duration_hours);

        let request = ApiRequest::post(format!("{}/{}/ban", Self::PATH, id)).json(json!({
            "reason": reason,
            "durationInHours": hours,
            "duration": hours,
        }));
        self.api.mutate(KIND, Some(id), request).await?;
        info!(id, hours, "User banned");
        Ok(())
    }

    pub async fn unban(&self, id: i64) -> Result<(), ApiError> {
        self.post_action(id, "unban").await
    }

    /// Grant the admin role
    pub async fn promote(&self, id: i64) -> Result<(), ApiError> {
        self.post_action(id, "promote").await
    }

    /// Revoke the admin role; the server refuses to demote the last admin
    pub async fn demote(&self, id: i64) -> Result<(), ApiError> {
        self.post_action(id, "demote").await
    }

    async fn post_action(&self, id: i64, action: &'static str) -> Result<(), ApiError> {
        let request = ApiRequest::post(format!("{}/{}/{}", Self::PATH, id, action));
        self.api.mutate(KIND, Some(id), request).await?;
        info!(id, action, "User updated");
        Ok(())
    }
}

impl ResourceClient for UsersClient {
    type Record = User;
    const PATH: &'static str = "/admin/users";

    fn api(&self) -> &ApiClient {
        &self.api
    }
}

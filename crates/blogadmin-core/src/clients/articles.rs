use super::{require_selection, ApiClient, ResourceClient};
use crate::error::ApiError;
use crate::models::{Article, ResourceKind, ReviewDecision};
use crate::transport::ApiRequest;
use serde_json::json;
use tracing::info;

const KIND: ResourceKind = ResourceKind::Articles;

/// Article moderation
#[derive(Clone)]
pub struct ArticlesClient {
    api: ApiClient,
}

impl ArticlesClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    /// Publish or reject a submitted article
    pub async fn review(
        &self,
        id: i64,
        decision: ReviewDecision,
        reason: Option<&str>,
    ) -> Result<(), ApiError> {
        let request = ApiRequest::post(format!("{}/{}/review", Self::PATH, id)).json(json!({
            "status": decision.as_str(),
            "reason": reason,
        }));
        self.api.mutate(KIND, Some(id), request).await?;
        info!(id, decision = decision.as_str(), "Article reviewed");
        Ok(())
    }

    pub async fn batch_delete(&self, ids: &[i64]) -> Result<(), ApiError> {
        require_selection(ids)?;
        let request = ApiRequest::post(format!("{}/batch-delete", Self::PATH))
            .json(json!({ "articleIds": ids }));
        self.api.mutate(KIND, None, request).await?;
        info!(count = ids.len(), "Articles deleted");
        Ok(())
    }
}

impl ResourceClient for ArticlesClient {
    type Record = Article;
    const PATH: &'static str = "/admin/articles";

    fn api(&self) -> &ApiClient {
        &self.api
    }
}

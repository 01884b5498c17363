use super::{require_selection, ApiClient, ResourceClient};
use crate::error::ApiError;
use crate::models::{Comment, ResourceKind};
use crate::transport::ApiRequest;
use serde_json::json;
use tracing::info;

#[derive(Clone)]
pub struct CommentsClient {
    api: ApiClient,
}

impl CommentsClient {
    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub async fn batch_delete(&self, ids: &[i64]) -> Result<(), ApiError> {
        require_selection(ids)?;
        let request = ApiRequest::post(format!("{}/batch-delete", Self::PATH))
            .json(json!({ "commentIds": ids }));
        self.api
            .mutate(ResourceKind::Comments, None, request)
            .await?;
        info!(count = ids.len(), "Comments deleted");
        Ok(())
    }
}

impl ResourceClient for CommentsClient {
    type Record = Comment;
    const PATH: &'static str = "/admin/comments";

    fn api(&self) -> &ApiClient {
        &self.api
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::tests::logged_in;
    use crate::transport::mock::MockTransport;
    use crate::transport::Method;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_delete_not_found() {
        let mock = Arc::new(MockTransport::new());
        let comments = logged_in(&mock).await.comments();
        mock.respond(Method::Delete, "/admin/comments/12", 404, "");

        assert_eq!(
            comments.delete(12).await,
            Err(ApiError::NotFound {
                kind: ResourceKind::Comments,
                id: Some(12)
            })
        );
    }

    #[tokio::test]
    async fn test_batch_delete_body() {
        let mock = Arc::new(MockTransport::new());
        let comments = logged_in(&mock).await.comments();
        mock.respond(Method::Post, "/admin/comments/batch-delete", 200, "{}");

        comments.batch_delete(&[4, 5]).await.unwrap();
        assert_eq!(
            mock.requests_to(Method::Post, "/admin/comments/batch-delete")[0].body,
            Some(json!({"commentIds": [4, 5]}))
        );
    }

    #[tokio::test]
    async fn test_list_wrapped_response() {
        let mock = Arc::new(MockTransport::new());
        let comments = logged_in(&mock).await.comments();
        mock.respond_json(
            Method::Get,
            "/admin/comments",
            200,
            json!({"comments": [{"id": 1, "content": "hi", "createdAt": "2025-01-01T00:00:00"}]}),
        );

        let list = comments.list().await.unwrap();
        assert_eq!(list.len(), 1);
        assert_eq!(list[0].content, "hi");
    }
}

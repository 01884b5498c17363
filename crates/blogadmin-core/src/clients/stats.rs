use super::ApiClient;
use crate::error::ApiError;
use crate::models::SiteStats;

/// Site-wide aggregate counters
#[derive(Clone)]
pub struct StatsClient {
    api: ApiClient,
}

impl StatsClient {
    pub const PATH: &'static str = "/admin/stats";

    pub fn new(api: ApiClient) -> Self {
        Self { api }
    }

    pub async fn fetch(&self) -> Result<SiteStats, ApiError> {
        self.api.fetch_one(None, Self::PATH).await
    }
}

//! Synchronization coordinator
//!
//! Runs each load as an independent tokio task and is the single writer of
//! the [`SnapshotStore`]. Per resource kind the state machine is
//! `Idle -> Loading -> Loaded | Failed`; starting a load while one is in
//! flight supersedes it. Only the most recently *initiated* load of a kind may
//! touch the snapshot, however late the earlier one completes.

use crate::clients::{ApiClient, ResourceClient};
use crate::config::ClientConfig;
use crate::diagnostics::DiagnosticLog;
use crate::error::{ApiError, AuthError, ConfigError};
use crate::event::{DiscardReason, EventBus, SessionEndReason, SyncEvent};
use crate::models::{Article, Comment, ResourceKind, ReviewDecision, SiteStats, User};
use crate::session::{Role, Session, SessionInfo};
use crate::store::{Snapshot, SnapshotStore};
use crate::transport::{HttpTransport, Transport};
use dashmap::DashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Load state of one resource kind
#[derive(Debug, Clone, Default, PartialEq)]
pub enum LoadState {
    #[default]
    Idle,
    Loading {
        ticket: u64,
    },
    Loaded {
        ticket: u64,
        count: usize,
    },
    /// The snapshot keeps whatever the last successful load produced
    Failed {
        ticket: u64,
        error: ApiError,
    },
}

#[derive(Debug, Default)]
struct KindSlot {
    /// Most recently initiated ticket; only its result may be applied
    latest: u64,
    state: LoadState,
}

/// Normalized payload of one finished load
enum Fetched {
    Users(Vec<User>),
    Articles(Vec<Article>),
    Comments(Vec<Comment>),
    Stats(SiteStats),
}

impl Fetched {
    fn count(&self) -> usize {
        match self {
            Fetched::Users(v) => v.len(),
            Fetched::Articles(v) => v.len(),
            Fetched::Comments(v) => v.len(),
            Fetched::Stats(_) => 1,
        }
    }
}

pub struct SyncCoordinator {
    session: Session,
    api: ApiClient,
    store: SnapshotStore,
    events: EventBus,
    loads: DashMap<ResourceKind, KindSlot>,
    next_ticket: AtomicU64,
}

impl SyncCoordinator {
    /// Build the whole client stack over `transport`
    pub fn new(transport: Arc<dyn Transport>, config: &ClientConfig) -> Arc<Self> {
        let session = Session::new(transport);
        let events = EventBus::new(config.event_capacity);
        let api = ApiClient::new(
            session.clone(),
            DiagnosticLog::new(config.diagnostics_capacity),
            config.ban.clone(),
        )
        .with_events(events.clone());

        Arc::new(Self {
            session,
            api,
            store: SnapshotStore::new(),
            events,
            loads: ResourceKind::ALL
                .into_iter()
                .map(|kind| (kind, KindSlot::default()))
                .collect(),
            next_ticket: AtomicU64::new(0),
        })
    }

    /// Build over an HTTP transport configured from `config`
    pub fn connect(config: &ClientConfig) -> Result<Arc<Self>, ConfigError> {
        config.validate()?;
        let transport = HttpTransport::new(config)?;
        Ok(Self::new(Arc::new(transport), config))
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    pub fn api(&self) -> &ApiClient {
        &self.api
    }

    pub fn diagnostics(&self) -> &DiagnosticLog {
        self.api.diagnostics()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn subscribe(&self) -> tokio::sync::broadcast::Receiver<SyncEvent> {
        self.events.subscribe()
    }

    pub fn store(&self) -> &SnapshotStore {
        &self.store
    }

    pub fn snapshot(&self) -> Snapshot {
        self.store.snapshot()
    }

    pub fn load_state(&self, kind: ResourceKind) -> LoadState {
        self.loads
            .get(&kind)
            .map(|slot| slot.state.clone())
            .unwrap_or_default()
    }

    pub fn current_role(&self) -> Role {
        self.session.current_role()
    }

    // ===================
    // Session transitions
    // ===================

    /// Log in and drop everything loaded under the previous session
    pub async fn login(&self, username: &str, password: &str) -> Result<SessionInfo, AuthError> {
        let info = self.session.login(username, password).await?;
        self.reset();
        self.events.publish(SyncEvent::SessionStarted {
            username: info.username.clone(),
        });
        Ok(info)
    }

    /// Log out; state is only dropped once the server confirms
    pub async fn logout(&self) -> Result<(), AuthError> {
        self.session.logout().await?;
        self.reset();
        self.events.publish(SyncEvent::SessionEnded {
            reason: SessionEndReason::Logout,
        });
        Ok(())
    }

    fn reset(&self) {
        self.store.clear();
        self.api.diagnostics().clear();
        for mut slot in self.loads.iter_mut() {
            slot.state = LoadState::Idle;
        }
        debug!("Snapshot, diagnostics and load states reset");
    }

    // ===================
    // Loads
    // ===================

    /// Start a load of `kind`, superseding any load of it still in flight
    pub fn refresh(self: &Arc<Self>, kind: ResourceKind) -> JoinHandle<()> {
        let ticket = self.begin(kind);
        let epoch = self.session.epoch();
        let this = Arc::clone(self);

        tokio::spawn(async move {
            let outcome = this.fetch(kind).await;
            this.on_result(kind, ticket, epoch, outcome);
        })
    }

    /// Start independent loads for every kind
    pub fn refresh_all(self: &Arc<Self>) -> Vec<JoinHandle<()>> {
        ResourceKind::ALL
            .into_iter()
            .map(|kind| self.refresh(kind))
            .collect()
    }

    /// Refresh every kind and wait until all loads have finished
    pub async fn load_all(self: &Arc<Self>) -> Snapshot {
        for handle in self.refresh_all() {
            if let Err(e) = handle.await {
                warn!(error = %e, "Load task aborted");
            }
        }
        self.snapshot()
    }

    fn begin(&self, kind: ResourceKind) -> u64 {
        let ticket = {
            let mut slot = self.loads.entry(kind).or_default();
            let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed) + 1;
            slot.latest = ticket;
            slot.state = LoadState::Loading { ticket };
            ticket
        };
        debug!(%kind, ticket, "Load started");
        self.events.publish(SyncEvent::LoadStarted { kind, ticket });
        ticket
    }

    async fn fetch(&self, kind: ResourceKind) -> Result<Fetched, ApiError> {
        match kind {
            ResourceKind::Users => self.api.users().list().await.map(Fetched::Users),
            ResourceKind::Articles => self.api.articles().list().await.map(Fetched::Articles),
            ResourceKind::Comments => self.api.comments().list().await.map(Fetched::Comments),
            ResourceKind::Stats => self.api.stats().fetch().await.map(Fetched::Stats),
        }
    }

    /// Settle one load; called exactly once per initiated ticket
    fn on_result(
        &self,
        kind: ResourceKind,
        ticket: u64,
        epoch: u64,
        outcome: Result<Fetched, ApiError>,
    ) {
        let event = {
            let mut slot = self.loads.entry(kind).or_default();

            if slot.latest != ticket {
                debug!(%kind, ticket, latest = slot.latest, "Discarding superseded load");
                SyncEvent::LoadDiscarded {
                    kind,
                    ticket,
                    reason: DiscardReason::Superseded,
                }
            } else if self.session.epoch() != epoch && !self.expired_by(&slot.state, ticket, &outcome) {
                debug!(%kind, ticket, "Discarding load from a previous session");
                if slot.state == (LoadState::Loading { ticket }) {
                    slot.state = LoadState::Idle;
                }
                SyncEvent::LoadDiscarded {
                    kind,
                    ticket,
                    reason: DiscardReason::SessionChanged,
                }
            } else {
                match outcome {
                    Ok(fetched) => {
                        let count = fetched.count();
                        self.apply(fetched);
                        slot.state = LoadState::Loaded { ticket, count };
                        info!(%kind, ticket, count, "Snapshot updated");
                        SyncEvent::Loaded {
                            kind,
                            ticket,
                            count,
                        }
                    }
                    Err(error) => {
                        warn!(%kind, ticket, error = %error, "Load failed, keeping previous snapshot");
                        slot.state = LoadState::Failed {
                            ticket,
                            error: error.clone(),
                        };
                        SyncEvent::LoadFailed {
                            kind,
                            ticket,
                            error,
                        }
                    }
                }
            }
        };
        self.events.publish(event);
    }

    /// The load's own 401 ended the session; report it as a failure
    fn expired_by(&self, state: &LoadState, ticket: u64, outcome: &Result<Fetched, ApiError>) -> bool {
        matches!(outcome, Err(ApiError::Unauthenticated))
            && *state == LoadState::Loading { ticket }
            && !self.session.is_authenticated()
    }

    fn apply(&self, fetched: Fetched) {
        match fetched {
            Fetched::Users(users) => self.store.replace_users(users),
            Fetched::Articles(articles) => self.store.replace_articles(articles),
            Fetched::Comments(comments) => self.store.replace_comments(comments),
            Fetched::Stats(stats) => self.store.replace_stats(stats),
        }
    }

    // ===================
    // Mutations (refresh the affected kind on success)
    // ===================
    //
    // Each returns the handle of its follow-up refresh; awaiting it is optional.

    pub async fn delete_user(self: &Arc<Self>, id: i64) -> Result<JoinHandle<()>, ApiError> {
        self.api.users().delete(id).await?;
        Ok(self.refresh(ResourceKind::Users))
    }

    pub async fn ban_user(
        self: &Arc<Self>,
        id: i64,
        reason: Option<&str>,
        duration_hours: Option<u32>,
    ) -> Result<JoinHandle<()>, ApiError> {
        self.api.users().ban(id, reason, duration_hours).await?;
        Ok(self.refresh(ResourceKind::Users))
    }

    pub async fn unban_user(self: &Arc<Self>, id: i64) -> Result<JoinHandle<()>, ApiError> {
        self.api.users().unban(id).await?;
        Ok(self.refresh(ResourceKind::Users))
    }

    pub async fn promote_user(self: &Arc<Self>, id: i64) -> Result<JoinHandle<()>, ApiError> {
        self.api.users().promote(id).await?;
        Ok(self.refresh(ResourceKind::Users))
    }

    pub async fn demote_user(self: &Arc<Self>, id: i64) -> Result<JoinHandle<()>, ApiError> {
        self.api.users().demote(id).await?;
        Ok(self.refresh(ResourceKind::Users))
    }

    pub async fn delete_article(self: &Arc<Self>, id: i64) -> Result<JoinHandle<()>, ApiError> {
        self.api.articles().delete(id).await?;
        Ok(self.refresh(ResourceKind::Articles))
    }

    pub async fn review_article(
        self: &Arc<Self>,
        id: i64,
        decision: ReviewDecision,
        reason: Option<&str>,
    ) -> Result<JoinHandle<()>, ApiError> {
        self.api.articles().review(id, decision, reason).await?;
        Ok(self.refresh(ResourceKind::Articles))
    }

    pub async fn delete_articles(self: &Arc<Self>, ids: &[i64]) -> Result<JoinHandle<()>, ApiError> {
        self.api.articles().batch_delete(ids).await?;
        Ok(self.refresh(ResourceKind::Articles))
    }

    pub async fn delete_comment(self: &Arc<Self>, id: i64) -> Result<JoinHandle<()>, ApiError> {
        self.api.comments().delete(id).await?;
        Ok(self.refresh(ResourceKind::Comments))
    }

    pub async fn delete_comments(self: &Arc<Self>, ids: &[i64]) -> Result<JoinHandle<()>, ApiError> {
        self.api.comments().batch_delete(ids).await?;
        Ok(self.refresh(ResourceKind::Comments))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ArticleStatus;
    use crate::transport::mock::MockTransport;
    use crate::transport::Method;
    use serde_json::json;
    use std::time::Duration;
    use tokio::sync::broadcast::Receiver;

    async fn logged_in(mock: &Arc<MockTransport>) -> Arc<SyncCoordinator> {
        mock.respond_json(
            Method::Post,
            "/auth/login",
            200,
            json!({"token": "tok", "user": {"username": "root", "role": "admin"}}),
        );
        let coordinator =
            SyncCoordinator::new(Arc::clone(mock) as Arc<dyn Transport>, &ClientConfig::default());
        coordinator.login("root", "pw").await.unwrap();
        coordinator
    }

    fn user_json(id: i64, name: &str) -> serde_json::Value {
        json!({"id": id, "username": name, "createdAt": "2025/1/1 00:00:00"})
    }

    async fn next_outcome(rx: &mut Receiver<SyncEvent>) -> SyncEvent {
        loop {
            let event = rx.recv().await.unwrap();
            if event.is_load_outcome() {
                return event;
            }
        }
    }

    #[tokio::test]
    async fn test_refresh_populates_snapshot() {
        let mock = Arc::new(MockTransport::new());
        let coordinator = logged_in(&mock).await;
        mock.respond_json(Method::Get, "/admin/users", 200, json!([user_json(1, "a")]));

        coordinator.refresh(ResourceKind::Users).await.unwrap();

        assert_eq!(coordinator.snapshot().users.unwrap().len(), 1);
        assert!(matches!(
            coordinator.load_state(ResourceKind::Users),
            LoadState::Loaded { count: 1, .. }
        ));
    }

    #[tokio::test]
    async fn test_failed_refresh_keeps_previous_snapshot() {
        let mock = Arc::new(MockTransport::new());
        let coordinator = logged_in(&mock).await;
        mock.respond_json(Method::Get, "/admin/users", 200, json!([user_json(1, "a")]))
            .respond(Method::Get, "/admin/users", 500, r#"{"error":"db down"}"#);

        coordinator.refresh(ResourceKind::Users).await.unwrap();
        coordinator.refresh(ResourceKind::Users).await.unwrap();

        assert_eq!(coordinator.snapshot().users.unwrap()[0].username, "a");
        assert_eq!(
            coordinator.load_state(ResourceKind::Users),
            LoadState::Failed {
                ticket: 2,
                error: ApiError::ServerError("db down".to_string())
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_last_initiated_wins() {
        let mock = Arc::new(MockTransport::new());
        let coordinator = logged_in(&mock).await;
        mock.respond_after(
            Method::Get,
            "/admin/users",
            Duration::from_millis(500),
            200,
            json!([user_json(1, "first")]).to_string(),
        )
        .respond_after(
            Method::Get,
            "/admin/users",
            Duration::from_millis(10),
            200,
            json!([user_json(2, "second")]).to_string(),
        );
        let mut rx = coordinator.subscribe();

        let slow = coordinator.refresh(ResourceKind::Users);
        tokio::task::yield_now().await;
        let fast = coordinator.refresh(ResourceKind::Users);
        fast.await.unwrap();
        slow.await.unwrap();

        let users = coordinator.snapshot().users.unwrap();
        assert_eq!(users[0].username, "second");

        let first = next_outcome(&mut rx).await;
        let second = next_outcome(&mut rx).await;
        assert!(matches!(first, SyncEvent::Loaded { ticket: 2, .. }));
        assert_eq!(
            second,
            SyncEvent::LoadDiscarded {
                kind: ResourceKind::Users,
                ticket: 1,
                reason: DiscardReason::Superseded
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_logout_discards_in_flight_load() {
        let mock = Arc::new(MockTransport::new());
        let coordinator = logged_in(&mock).await;
        mock.respond_after(
            Method::Get,
            "/admin/articles",
            Duration::from_millis(100),
            200,
            "[]",
        );
        mock.respond(Method::Post, "/auth/logout", 200, "{}");

        let load = coordinator.refresh(ResourceKind::Articles);
        tokio::task::yield_now().await;
        coordinator.logout().await.unwrap();
        load.await.unwrap();

        assert!(coordinator.snapshot().articles.is_none());
        assert_eq!(coordinator.load_state(ResourceKind::Articles), LoadState::Idle);
    }

    #[tokio::test]
    async fn test_expired_token_fails_load_and_ends_session() {
        let mock = Arc::new(MockTransport::new());
        let coordinator = logged_in(&mock).await;
        mock.respond_json(Method::Get, "/admin/stats", 200, json!({"users": {"total": 3}}))
            .respond(Method::Get, "/admin/stats", 401, "");

        coordinator.refresh(ResourceKind::Stats).await.unwrap();
        let mut rx = coordinator.subscribe();
        coordinator.refresh(ResourceKind::Stats).await.unwrap();

        assert!(!coordinator.session().is_authenticated());
        assert_eq!(coordinator.snapshot().stats.unwrap().total_users, 3);

        let mut saw_expired = false;
        let mut saw_failed = false;
        while let Ok(event) = rx.try_recv() {
            match event {
                SyncEvent::SessionEnded {
                    reason: SessionEndReason::Expired,
                } => saw_expired = true,
                SyncEvent::LoadFailed {
                    error: ApiError::Unauthenticated,
                    ..
                } => saw_failed = true,
                _ => {}
            }
        }
        assert!(saw_expired && saw_failed);
    }

    #[tokio::test]
    async fn test_mutation_refreshes_only_affected_kind() {
        let mock = Arc::new(MockTransport::new());
        let coordinator = logged_in(&mock).await;
        mock.respond(Method::Post, "/admin/users/2/unban", 200, "{}");
        mock.respond_json(Method::Get, "/admin/users", 200, json!([user_json(2, "b")]));
        let mut rx = coordinator.subscribe();

        coordinator.unban_user(2).await.unwrap();
        let outcome = next_outcome(&mut rx).await;

        assert!(matches!(
            outcome,
            SyncEvent::Loaded {
                kind: ResourceKind::Users,
                ..
            }
        ));
        assert_eq!(mock.requests_to(Method::Get, "/admin/articles").len(), 0);
        assert_eq!(mock.requests_to(Method::Get, "/admin/stats").len(), 0);
    }

    #[tokio::test]
    async fn test_rejected_review_shows_after_refresh() {
        let mock = Arc::new(MockTransport::new());
        let coordinator = logged_in(&mock).await;
        mock.respond(Method::Post, "/admin/articles/4/review", 200, "{}");
        mock.respond_json(
            Method::Get,
            "/admin/articles",
            200,
            json!([{
                "id": 4,
                "title": "t",
                "content": "c",
                "createdAt": "2025/1/1 00:00:00",
                "status": "rejected"
            }]),
        );

        coordinator
            .review_article(4, ReviewDecision::Rejected, Some("spam"))
            .await
            .unwrap()
            .await
            .unwrap();

        let snapshot = coordinator.snapshot();
        let article = snapshot.article(4).unwrap();
        assert_eq!(article.status, ArticleStatus::Rejected);
        assert!(coordinator.diagnostics().entries().is_empty());
    }

    #[tokio::test]
    async fn test_login_drops_previous_diagnostics() {
        let mock = Arc::new(MockTransport::new());
        let coordinator = logged_in(&mock).await;
        mock.respond_json(
            Method::Get,
            "/admin/users",
            200,
            json!([user_json(1, "a"), {"username": "no-id"}]),
        );

        coordinator.refresh(ResourceKind::Users).await.unwrap();
        assert_eq!(coordinator.diagnostics().dropped_count(ResourceKind::Users), 1);

        coordinator.login("root", "pw").await.unwrap();
        assert_eq!(coordinator.diagnostics().dropped_count(ResourceKind::Users), 0);
        assert!(coordinator.diagnostics().entries().is_empty());
    }

    #[tokio::test]
    async fn test_failed_mutation_does_not_refresh() {
        let mock = Arc::new(MockTransport::new());
        let coordinator = logged_in(&mock).await;
        mock.respond(Method::Delete, "/admin/articles/3", 403, "");

        assert!(matches!(
            coordinator.delete_article(3).await,
            Err(ApiError::Forbidden)
        ));
        assert_eq!(coordinator.load_state(ResourceKind::Articles), LoadState::Idle);
        assert_eq!(mock.requests_to(Method::Get, "/admin/articles").len(), 0);
    }

    #[tokio::test]
    async fn test_load_all_runs_every_kind() {
        let mock = Arc::new(MockTransport::new());
        let coordinator = logged_in(&mock).await;
        mock.respond_json(Method::Get, "/admin/users", 200, json!([user_json(1, "a")]));
        mock.respond(Method::Get, "/admin/articles", 200, "[]");
        mock.respond(Method::Get, "/admin/comments", 403, "");
        mock.respond_json(Method::Get, "/admin/stats", 200, json!({"users": {"total": 1}}));

        let snapshot = coordinator.load_all().await;

        assert!(snapshot.is_loaded(ResourceKind::Users));
        assert!(snapshot.is_loaded(ResourceKind::Articles));
        assert!(!snapshot.is_loaded(ResourceKind::Comments));
        assert!(snapshot.is_loaded(ResourceKind::Stats));
        assert!(matches!(
            coordinator.load_state(ResourceKind::Comments),
            LoadState::Failed {
                error: ApiError::Forbidden,
                ..
            }
        ));
    }
}

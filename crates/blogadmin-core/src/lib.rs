//! blogadmin-core - Core library for blogadmin
//!
//! Provides the session, transport, payload normalizer, resource clients and
//! synchronization coordinator for the blog administration API.

pub mod clients;
pub mod config;
pub mod coordinator;
pub mod diagnostics;
pub mod error;
pub mod event;
pub mod models;
pub mod normalize;
pub mod session;
pub mod store;
pub mod transport;

pub use clients::{ApiClient, ArticlesClient, CommentsClient, ResourceClient, StatsClient, UsersClient};
pub use config::{BanPolicy, ClientConfig};
pub use coordinator::{LoadState, SyncCoordinator};
pub use diagnostics::{Diagnostic, DiagnosticLog, NormalizeReport, Severity};
pub use error::{ApiError, AuthError, ConfigError, InvalidReason, NormalizationError, TransportError};
pub use event::{DiscardReason, EventBus, SessionEndReason, SyncEvent};
pub use models::ResourceKind;
pub use session::{Role, Session, SessionInfo};
pub use store::{Snapshot, SnapshotStore};
pub use transport::{HttpTransport, Transport};

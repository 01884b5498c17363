//! Authentication session
//!
//! Owns the bearer token and the operator's identity. Every transition
//! (login, logout, invalidation) bumps an epoch so results of requests issued
//! under an earlier session can be recognised and discarded.

use crate::error::AuthError;
use crate::normalize::parse_body;
use crate::transport::{ApiRequest, Transport};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Role of the authenticated operator
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Admin,
    User,
    #[default]
    Unknown,
}

impl Role {
    pub fn parse(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "admin" => Role::Admin,
            "user" => Role::User,
            _ => Role::Unknown,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::User => "user",
            Role::Unknown => "unknown",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Identity established by a successful login
#[derive(Clone, PartialEq, Eq)]
pub struct SessionInfo {
    pub token: String,
    pub username: String,
    pub role: Role,
}

impl fmt::Debug for SessionInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionInfo")
            .field("token", &"<redacted>")
            .field("username", &self.username)
            .field("role", &self.role)
            .finish()
    }
}

/// Token captured when a call starts, tagged with the session epoch
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub token: String,
    pub epoch: u64,
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("token", &"<redacted>")
            .field("epoch", &self.epoch)
            .finish()
    }
}

#[derive(Debug, Default)]
struct SessionState {
    info: Option<SessionInfo>,
    epoch: u64,
}

/// Shared handle to one operator session
///
/// Cloning is cheap; clones observe the same state. Tests construct isolated
/// sessions by giving each its own transport.
#[derive(Clone)]
pub struct Session {
    transport: Arc<dyn Transport>,
    state: Arc<RwLock<SessionState>>,
}

impl Session {
    pub fn new(transport: Arc<dyn Transport>) -> Self {
        Self {
            transport,
            state: Arc::new(RwLock::new(SessionState::default())),
        }
    }

    pub fn transport(&self) -> Arc<dyn Transport> {
        Arc::clone(&self.transport)
    }

    /// Authenticate; both the token and the embedded user's username and role
    /// must be present for the login to count
    pub async fn login(&self, username: &str, password: &str) -> Result<SessionInfo, AuthError> {
        let request = ApiRequest::post("/auth/login").json(json!({
            "username": username,
            "password": password,
        }));

        let response = self.transport.send(request).await.map_err(|e| {
            warn!(error = %e, "Login request failed");
            AuthError::Unreachable(e)
        })?;

        match response.status {
            200 => {}
            401 => return Err(AuthError::InvalidCredentials),
            status => return Err(AuthError::UnexpectedStatus(status)),
        }

        let body = parse_body(&response.body)
            .map_err(|e| AuthError::MalformedResponse(e.to_string()))?;
        let info = parse_login(&body)?;

        {
            let mut state = self.state.write();
            state.info = Some(info.clone());
            state.epoch += 1;
        }
        info!(username = %info.username, role = %info.role, "Logged in");
        Ok(info)
    }

    /// End the session; the token is only dropped once the server confirms
    pub async fn logout(&self) -> Result<(), AuthError> {
        let credentials = self.credentials().ok_or(AuthError::NotAuthenticated)?;

        let request = ApiRequest::post("/auth/logout").bearer(credentials.token.clone());
        let response = self
            .transport
            .send(request)
            .await
            .map_err(AuthError::Unreachable)?;

        if !response.is_success() {
            warn!(status = response.status, "Logout rejected, keeping session");
            return Err(AuthError::UnexpectedStatus(response.status));
        }

        let mut state = self.state.write();
        if state.epoch == credentials.epoch {
            state.info = None;
            state.epoch += 1;
            info!("Logged out");
        }
        Ok(())
    }

    /// Drop the session after an authorization failure
    ///
    /// Only clears when `epoch` is still current, so a late 401 from an older
    /// token cannot end a newer session. Returns whether the session ended.
    pub fn invalidate(&self, epoch: u64) -> bool {
        let mut state = self.state.write();
        if state.epoch != epoch || state.info.is_none() {
            debug!(epoch, current = state.epoch, "Ignoring stale invalidation");
            return false;
        }
        state.info = None;
        state.epoch += 1;
        info!("Session invalidated by authorization failure");
        true
    }

    /// Token plus epoch, captured once per call
    pub fn credentials(&self) -> Option<Credentials> {
        let state = self.state.read();
        state.info.as_ref().map(|info| Credentials {
            token: info.token.clone(),
            epoch: state.epoch,
        })
    }

    pub fn current_token(&self) -> Option<String> {
        self.state.read().info.as_ref().map(|info| info.token.clone())
    }

    /// Role of the operator; `Unknown` when unauthenticated
    pub fn current_role(&self) -> Role {
        self.state
            .read()
            .info
            .as_ref()
            .map(|info| info.role)
            .unwrap_or_default()
    }

    pub fn current_username(&self) -> Option<String> {
        self.state
            .read()
            .info
            .as_ref()
            .map(|info| info.username.clone())
    }

    pub fn is_authenticated(&self) -> bool {
        self.state.read().info.is_some()
    }

    /// Monotonic counter bumped on every session transition
    pub fn epoch(&self) -> u64 {
        self.state.read().epoch
    }
}

impl fmt::Debug for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.state.read();
        f.debug_struct("Session")
            .field("info", &state.info)
            .field("epoch", &state.epoch)
            .finish()
    }
}

fn parse_login(body: &Value) -> Result<SessionInfo, AuthError> {
    let token = body
        .get("token")
        .and_then(Value::as_str)
        .filter(|token| !token.is_empty())
        .ok_or_else(|| AuthError::MalformedResponse("missing token".to_string()))?;
    let user = body
        .get("user")
        .filter(|user| user.is_object())
        .ok_or_else(|| AuthError::MalformedResponse("missing user".to_string()))?;
    let username = user
        .get("username")
        .and_then(Value::as_str)
        .ok_or_else(|| AuthError::MalformedResponse("missing user.username".to_string()))?;
    let role = user
        .get("role")
        .and_then(Value::as_str)
        .ok_or_else(|| AuthError::MalformedResponse("missing user.role".to_string()))?;

    Ok(SessionInfo {
        token: token.to_string(),
        username: username.to_string(),
        role: Role::parse(role),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::TransportError;
    use crate::transport::mock::MockTransport;
    use crate::transport::Method;
    use serde_json::json;

    fn session_with(mock: &Arc<MockTransport>) -> Session {
        Session::new(Arc::clone(mock) as Arc<dyn Transport>)
    }

    fn login_ok() -> Value {
        json!({"token": "tok-1", "user": {"username": "root", "role": "admin"}})
    }

    #[tokio::test]
    async fn test_login_success_sets_token_and_role() {
        let mock = Arc::new(MockTransport::new());
        mock.respond_json(Method::Post, "/auth/login", 200, login_ok());
        let session = session_with(&mock);

        let info = session.login("root", "pw").await.unwrap();

        assert_eq!(info.token, "tok-1");
        assert_eq!(session.current_token().as_deref(), Some("tok-1"));
        assert_eq!(session.current_role(), Role::Admin);
        assert_eq!(session.current_username().as_deref(), Some("root"));
        assert_eq!(session.epoch(), 1);

        let sent = &mock.requests()[0];
        assert_eq!(sent.bearer, None);
        assert_eq!(sent.body, Some(json!({"username": "root", "password": "pw"})));
    }

    #[tokio::test]
    async fn test_login_missing_fields_is_malformed() {
        for body in [
            json!({"token": "t"}),
            json!({"user": {"username": "a", "role": "admin"}}),
            json!({"token": "t", "user": {"username": "a"}}),
            json!({"token": "t", "user": {"role": "admin"}}),
            json!({"token": "", "user": {"username": "a", "role": "admin"}}),
        ] {
            let mock = Arc::new(MockTransport::new());
            mock.respond_json(Method::Post, "/auth/login", 200, body.clone());
            let session = session_with(&mock);

            let result = session.login("a", "b").await;
            assert!(
                matches!(result, Err(AuthError::MalformedResponse(_))),
                "body {body} should be malformed"
            );
            assert!(!session.is_authenticated());
            assert_eq!(session.current_role(), Role::Unknown);
        }
    }

    #[tokio::test]
    async fn test_login_status_mapping() {
        let mock = Arc::new(MockTransport::new());
        mock.respond(Method::Post, "/auth/login", 401, r#"{"message":"bad"}"#)
            .respond(Method::Post, "/auth/login", 500, "");
        let session = session_with(&mock);

        assert_eq!(
            session.login("a", "b").await,
            Err(AuthError::InvalidCredentials)
        );
        assert_eq!(
            session.login("a", "b").await,
            Err(AuthError::UnexpectedStatus(500))
        );
    }

    #[tokio::test]
    async fn test_login_unreachable() {
        let mock = Arc::new(MockTransport::new());
        mock.fail(
            Method::Post,
            "/auth/login",
            TransportError::Connect {
                url: "x".to_string(),
                message: "refused".to_string(),
            },
        );
        let session = session_with(&mock);
        assert!(matches!(
            session.login("a", "b").await,
            Err(AuthError::Unreachable(_))
        ));
    }

    #[tokio::test]
    async fn test_logout_keeps_token_on_failure() {
        let mock = Arc::new(MockTransport::new());
        mock.respond_json(Method::Post, "/auth/login", 200, login_ok());
        mock.respond(Method::Post, "/auth/logout", 500, "")
            .respond(Method::Post, "/auth/logout", 200, "{}");
        let session = session_with(&mock);
        session.login("root", "pw").await.unwrap();

        assert_eq!(session.logout().await, Err(AuthError::UnexpectedStatus(500)));
        assert!(session.is_authenticated());

        session.logout().await.unwrap();
        assert!(!session.is_authenticated());
        assert_eq!(
            mock.requests_to(Method::Post, "/auth/logout")[0].bearer.as_deref(),
            Some("tok-1")
        );
    }

    #[tokio::test]
    async fn test_logout_without_session() {
        let mock = Arc::new(MockTransport::new());
        let session = session_with(&mock);
        assert_eq!(session.logout().await, Err(AuthError::NotAuthenticated));
        assert_eq!(mock.request_count(), 0);
    }

    #[tokio::test]
    async fn test_stale_invalidation_is_ignored() {
        let mock = Arc::new(MockTransport::new());
        mock.respond_json(Method::Post, "/auth/login", 200, login_ok());
        let session = session_with(&mock);

        session.login("root", "pw").await.unwrap();
        let old_epoch = session.epoch();
        session.login("root", "pw").await.unwrap();

        assert!(!session.invalidate(old_epoch));
        assert!(session.is_authenticated());
        assert!(session.invalidate(session.epoch()));
        assert!(!session.is_authenticated());
    }

    #[test]
    fn test_debug_redacts_token() {
        let info = SessionInfo {
            token: "secret".to_string(),
            username: "root".to_string(),
            role: Role::Admin,
        };
        assert!(!format!("{:?}", info).contains("secret"));
    }
}

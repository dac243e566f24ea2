//! Platform session management.
//!
//! Authentication and authorization are enforced by the platform; this
//! module only orchestrates the login form, keeps the active session in
//! memory, and stores the session token in the OS keyring. Passwords are
//! zeroized as soon as the login request has been built.

use serde::Deserialize;
use serde_json::Value;
use std::sync::Mutex;
use tracing::{info, warn};
use zeroize::Zeroize;

use crate::api::PlatformClient;
use crate::storage;

// ---------------------------------------------------------------------------
// Roles
// ---------------------------------------------------------------------------

/// Platform roles as granted by the admin console.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    Admin,
    Manager,
    Cashier,
    Viewer,
}

impl Role {
    pub fn parse(raw: &str) -> Option<Role> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "admin" | "administrator" => Some(Role::Admin),
            "manager" => Some(Role::Manager),
            "cashier" | "pos" => Some(Role::Cashier),
            "viewer" | "readonly" => Some(Role::Viewer),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Role::Admin => "admin",
            Role::Manager => "manager",
            Role::Cashier => "cashier",
            Role::Viewer => "viewer",
        }
    }
}

/// Parse the role list from a platform user record, dropping anything the
/// client does not know. An unknown-only list yields no roles (and an empty
/// sidebar) rather than a guess.
pub fn parse_roles(user: &Value) -> Vec<Role> {
    let mut roles: Vec<Role> = Vec::new();
    if let Some(list) = user.get("roles").and_then(Value::as_array) {
        for entry in list {
            if let Some(raw) = entry.as_str() {
                match Role::parse(raw) {
                    Some(role) if !roles.contains(&role) => roles.push(role),
                    Some(_) => {}
                    None => warn!(role = raw, "unknown role in user record, ignoring"),
                }
            }
        }
    } else if let Some(raw) = user.get("role").and_then(Value::as_str) {
        if let Some(role) = Role::parse(raw) {
            roles.push(role);
        }
    }
    roles
}

// ---------------------------------------------------------------------------
// Session state
// ---------------------------------------------------------------------------

/// The logged-in platform user.
#[derive(Debug, Clone)]
pub struct Session {
    pub user_id: i64,
    pub display_name: String,
    pub roles: Vec<Role>,
}

impl Session {
    /// JSON shape the shell expects for the current user.
    pub fn to_json(&self) -> Value {
        serde_json::json!({
            "userId": self.user_id,
            "displayName": self.display_name,
            "roles": self.roles.iter().map(|r| r.as_str()).collect::<Vec<_>>(),
        })
    }
}

/// In-memory session holder, owned by [`crate::AppState`].
#[derive(Default)]
pub struct SessionState {
    current: Mutex<Option<Session>>,
}

impl SessionState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&self, session: Session) {
        if let Ok(mut guard) = self.current.lock() {
            *guard = Some(session);
        }
    }

    pub fn clear(&self) {
        if let Ok(mut guard) = self.current.lock() {
            *guard = None;
        }
    }

    pub fn snapshot(&self) -> Option<Session> {
        self.current.lock().ok().and_then(|guard| guard.clone())
    }

    pub fn roles(&self) -> Vec<Role> {
        self.snapshot().map(|s| s.roles).unwrap_or_default()
    }
}

// ---------------------------------------------------------------------------
// Login / logout
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginPayload {
    #[serde(alias = "username", alias = "email")]
    login: String,
    password: String,
}

fn parse_login_payload(arg0: Option<Value>) -> Result<LoginPayload, String> {
    let payload = arg0.unwrap_or_else(|| serde_json::json!({}));
    let mut parsed: LoginPayload =
        serde_json::from_value(payload).map_err(|e| format!("Invalid login payload: {e}"))?;
    parsed.login = parsed.login.trim().to_string();
    if parsed.login.is_empty() {
        parsed.password.zeroize();
        return Err("Missing login".into());
    }
    if parsed.password.is_empty() {
        return Err("Missing password".into());
    }
    Ok(parsed)
}

/// Authenticate against the platform and establish the local session.
///
/// On success the session token goes to the keyring and the user snapshot to
/// the in-memory session state; the caller receives the user JSON.
pub async fn login(
    session: &SessionState,
    client: &PlatformClient,
    arg0: Option<Value>,
) -> Result<Value, String> {
    let mut payload = parse_login_payload(arg0)?;

    let body = serde_json::json!({
        "login": payload.login.as_str(),
        "password": payload.password.as_str(),
    });
    payload.password.zeroize();

    let resp = client.post("/api/auth/login", &body).await?;

    let token = resp
        .get("token")
        .and_then(Value::as_str)
        .ok_or("Login response missing token")?;
    let user = resp.get("user").cloned().unwrap_or(Value::Null);
    let user_id = user.get("id").and_then(Value::as_i64).unwrap_or_default();
    let display_name = user
        .get("name")
        .or_else(|| user.get("displayName"))
        .and_then(Value::as_str)
        .unwrap_or(&payload.login)
        .to_string();
    let roles = parse_roles(&user);

    storage::set_credential(storage::KEY_SESSION_TOKEN, token)?;
    let established = Session {
        user_id,
        display_name,
        roles,
    };
    let user_json = established.to_json();
    session.set(established);

    info!(user_id, "session established");
    Ok(user_json)
}

/// Drop the local session and the stored token.
pub fn logout(session: &SessionState) -> Result<Value, String> {
    session.clear();
    storage::delete_credential(storage::KEY_SESSION_TOKEN)?;
    info!("session cleared");
    Ok(serde_json::json!({ "success": true }))
}

/// The current user, or `Null` when nobody is logged in.
pub fn current_user(session: &SessionState) -> Value {
    session
        .snapshot()
        .map(|s| s.to_json())
        .unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_roles_and_drops_unknown() {
        let user = serde_json::json!({ "roles": ["admin", "CASHIER", "intern", "admin"] });
        assert_eq!(parse_roles(&user), vec![Role::Admin, Role::Cashier]);
    }

    #[test]
    fn falls_back_to_single_role_field() {
        let user = serde_json::json!({ "role": "manager" });
        assert_eq!(parse_roles(&user), vec![Role::Manager]);
        assert!(parse_roles(&serde_json::json!({})).is_empty());
    }

    #[test]
    fn login_payload_requires_both_fields() {
        let err = parse_login_payload(Some(serde_json::json!({ "login": " ", "password": "x" })))
            .expect_err("blank login");
        assert_eq!(err, "Missing login");
        let err = parse_login_payload(Some(serde_json::json!({ "login": "a", "password": "" })))
            .expect_err("blank password");
        assert_eq!(err, "Missing password");
        assert!(parse_login_payload(None).is_err());
    }

    #[test]
    fn login_payload_accepts_aliases() {
        let parsed =
            parse_login_payload(Some(serde_json::json!({ "email": "a@b.c", "password": "p" })))
                .expect("alias payload");
        assert_eq!(parsed.login, "a@b.c");
    }

    #[test]
    fn session_state_round_trip() {
        let state = SessionState::new();
        assert_eq!(current_user(&state), Value::Null);

        state.set(Session {
            user_id: 9,
            display_name: "سارة".to_string(),
            roles: vec![Role::Admin],
        });
        let user = current_user(&state);
        assert_eq!(user.get("userId").and_then(Value::as_i64), Some(9));
        assert_eq!(state.roles(), vec![Role::Admin]);

        state.clear();
        assert_eq!(current_user(&state), Value::Null);
    }
}

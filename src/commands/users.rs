//! Admin console user management.
//!
//! List, create, update, and delete platform users. The platform enforces
//! authorization; this layer validates the form before any network call and
//! shapes payloads the way the console's user editor produces them.

use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::api::PlatformClient;
use crate::auth::Role;
use crate::AppState;

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct UserSavePayload {
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    name: String,
    #[serde(default, alias = "username", alias = "email")]
    login: String,
    /// Required on create, optional on update (blank keeps the current one).
    #[serde(default)]
    password: Option<String>,
    #[serde(default)]
    roles: Vec<String>,
}

/// Validate the user form and build the request body.
fn build_user_body(payload: &UserSavePayload) -> Result<Value, String> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err("Missing user name".into());
    }

    let login = payload.login.trim();
    if login.is_empty() {
        return Err("Missing login".into());
    }
    if login.contains(char::is_whitespace) {
        return Err("Login must not contain spaces".into());
    }

    let mut roles: Vec<&'static str> = Vec::new();
    for raw in &payload.roles {
        let role = Role::parse(raw).ok_or_else(|| format!("Unknown role: {raw}"))?;
        if !roles.contains(&role.as_str()) {
            roles.push(role.as_str());
        }
    }
    if roles.is_empty() {
        return Err("At least one role is required".into());
    }

    let password = payload
        .password
        .as_deref()
        .map(str::trim)
        .filter(|p| !p.is_empty());
    if payload.id.is_none() && password.is_none() {
        return Err("Missing password".into());
    }

    let mut body = serde_json::json!({
        "name": name,
        "login": login,
        "roles": roles,
    });
    if let Some(password) = password {
        body["password"] = Value::from(password);
    }
    Ok(body)
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Fetch the user list for the admin table.
pub async fn users_list(_state: &AppState, _arg0: Option<Value>) -> Result<Value, String> {
    let client = PlatformClient::from_storage()?;
    let body = client.get("/api/users").await?;
    let users = body
        .get("data")
        .cloned()
        .unwrap_or(body);
    Ok(serde_json::json!({ "users": users }))
}

/// Create or update a user from the admin form.
pub async fn users_save(_state: &AppState, arg0: Option<Value>) -> Result<Value, String> {
    let payload: UserSavePayload =
        serde_json::from_value(arg0.unwrap_or_else(|| serde_json::json!({})))
            .map_err(|e| format!("Invalid user payload: {e}"))?;
    let body = build_user_body(&payload)?;
    let client = PlatformClient::from_storage()?;

    let resp = match payload.id {
        Some(id) => client.put(&format!("/api/users/{id}"), &body).await?,
        None => client.post("/api/users", &body).await?,
    };
    info!(login = %payload.login.trim(), "user saved");
    Ok(serde_json::json!({ "success": true, "user": resp }))
}

/// Delete a user.
pub async fn users_delete(_state: &AppState, arg0: Option<Value>) -> Result<Value, String> {
    let payload = arg0.unwrap_or_else(|| serde_json::json!({}));
    let id = crate::value_i64(&payload, &["userId", "user_id", "id"]).ok_or("Missing userId")?;
    let client = PlatformClient::from_storage()?;
    client.delete(&format!("/api/users/{id}")).await?;
    info!(id, "user deleted");
    Ok(serde_json::json!({ "success": true }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> UserSavePayload {
        UserSavePayload {
            id: None,
            name: "سارة".to_string(),
            login: "sara".to_string(),
            password: Some("secret123".to_string()),
            roles: vec!["manager".to_string()],
        }
    }

    #[test]
    fn builds_a_complete_create_body() {
        let body = build_user_body(&payload()).expect("body");
        assert_eq!(body.get("login").and_then(Value::as_str), Some("sara"));
        assert_eq!(
            body.get("roles").and_then(Value::as_array).map(Vec::len),
            Some(1)
        );
        assert!(body.get("password").is_some());
    }

    #[test]
    fn update_may_omit_the_password() {
        let mut p = payload();
        p.id = Some(4);
        p.password = None;
        let body = build_user_body(&p).expect("body");
        assert!(body.get("password").is_none());

        let mut create = payload();
        create.password = Some("   ".to_string());
        assert_eq!(
            build_user_body(&create).expect_err("create needs password"),
            "Missing password"
        );
    }

    #[test]
    fn rejects_blank_fields_and_unknown_roles() {
        let mut p = payload();
        p.name = "  ".to_string();
        assert_eq!(build_user_body(&p).expect_err("name"), "Missing user name");

        let mut p = payload();
        p.login = "with space".to_string();
        assert_eq!(
            build_user_body(&p).expect_err("login"),
            "Login must not contain spaces"
        );

        let mut p = payload();
        p.roles = vec!["intern".to_string()];
        assert!(build_user_body(&p).expect_err("role").contains("Unknown role"));

        let mut p = payload();
        p.roles.clear();
        assert_eq!(
            build_user_body(&p).expect_err("roles"),
            "At least one role is required"
        );
    }

    #[test]
    fn duplicate_roles_collapse() {
        let mut p = payload();
        p.roles = vec!["admin".to_string(), "ADMIN".to_string()];
        let body = build_user_body(&p).expect("body");
        assert_eq!(
            body.get("roles").and_then(Value::as_array).map(Vec::len),
            Some(1)
        );
    }
}

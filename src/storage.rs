//! Secure terminal config storage using the OS credential store.
//!
//! On Windows this uses DPAPI (via the `keyring` crate), on macOS Keychain,
//! and on Linux the Secret Service API. The platform URL, terminal API key,
//! and session token never touch the SQLite settings store.

use keyring::Entry;
use serde_json::Value;
use tracing::{info, warn};

use crate::api;

const SERVICE_NAME: &str = "sufra-desk";

// Credential keys
pub const KEY_PLATFORM_URL: &str = "platform_url";
pub const KEY_TERMINAL_ID: &str = "terminal_id";
pub const KEY_API_KEY: &str = "api_key";
pub const KEY_SESSION_TOKEN: &str = "session_token";
pub const KEY_BRANCH_ID: &str = "branch_id";
pub const KEY_ORG_ID: &str = "organization_id";

/// All credential keys managed by this module.
const ALL_KEYS: &[&str] = &[
    KEY_PLATFORM_URL,
    KEY_TERMINAL_ID,
    KEY_API_KEY,
    KEY_SESSION_TOKEN,
    KEY_BRANCH_ID,
    KEY_ORG_ID,
];

// ---------------------------------------------------------------------------
// Low-level helpers
// ---------------------------------------------------------------------------

/// Retrieve a single credential from the OS keyring. Returns `None` when the
/// entry does not exist (or the platform returns a "not found" error).
pub fn get_credential(key: &str) -> Option<String> {
    let entry = match Entry::new(SERVICE_NAME, key) {
        Ok(e) => e,
        Err(e) => {
            warn!(key, error = %e, "keyring: failed to create entry");
            return None;
        }
    };
    match entry.get_password() {
        Ok(pw) => Some(pw),
        Err(keyring::Error::NoEntry) => None,
        Err(e) => {
            warn!(key, error = %e, "keyring: failed to read credential");
            None
        }
    }
}

/// Store a credential in the OS keyring.
pub fn set_credential(key: &str, value: &str) -> Result<(), String> {
    let entry = Entry::new(SERVICE_NAME, key).map_err(|e| e.to_string())?;
    entry.set_password(value).map_err(|e| e.to_string())?;
    Ok(())
}

/// Delete a credential from the OS keyring. Silently succeeds if the entry
/// does not exist.
pub fn delete_credential(key: &str) -> Result<(), String> {
    let entry = Entry::new(SERVICE_NAME, key).map_err(|e| e.to_string())?;
    match entry.delete_credential() {
        Ok(()) => Ok(()),
        Err(keyring::Error::NoEntry) => Ok(()),
        Err(e) => Err(e.to_string()),
    }
}

pub fn has_credential(key: &str) -> bool {
    get_credential(key).is_some()
}

// ---------------------------------------------------------------------------
// High-level API
// ---------------------------------------------------------------------------

/// The terminal is considered paired when platform URL, terminal ID, and API
/// key are all present in the credential store.
pub fn is_paired() -> bool {
    has_credential(KEY_PLATFORM_URL)
        && has_credential(KEY_TERMINAL_ID)
        && has_credential(KEY_API_KEY)
}

/// Return the stored terminal config as a JSON value for the shell. The API
/// key and session token are never included.
pub fn get_full_config() -> Value {
    serde_json::json!({
        "terminal_id":     get_credential(KEY_TERMINAL_ID),
        "branch_id":       get_credential(KEY_BRANCH_ID),
        "organization_id": get_credential(KEY_ORG_ID),
        "platform_url":    get_credential(KEY_PLATFORM_URL),
        "paired":          is_paired(),
    })
}

/// Store terminal credentials received during pairing.
///
/// Accepts either explicit fields or a connection string that decodes to
/// them. Expected JSON shape (camelCase):
/// `{ "connectionString": "...", "platformUrl": "...", "terminalId": "...", "apiKey": "..." }`
pub fn update_pairing(payload: &Value) -> Result<Value, String> {
    let connection_string = payload
        .get("connectionString")
        .or_else(|| payload.get("connection_string"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|s| !s.is_empty());

    let mut api_key = payload
        .get("apiKey")
        .or_else(|| payload.get("api_key"))
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let mut terminal_id = payload
        .get("terminalId")
        .or_else(|| payload.get("terminal_id"))
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());
    let mut platform_url = payload
        .get("platformUrl")
        .or_else(|| payload.get("platform_url"))
        .and_then(Value::as_str)
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty());

    if let Some(raw) = connection_string {
        if let Some(decoded_key) = api::extract_api_key_from_connection_string(raw) {
            api_key = Some(decoded_key);
        }
        if let Some(decoded_tid) = api::extract_terminal_id_from_connection_string(raw) {
            terminal_id = Some(decoded_tid);
        }
        if let Some(decoded_url) = api::extract_platform_url_from_connection_string(raw) {
            platform_url = Some(decoded_url);
        }
    }

    let api_key = api_key.ok_or("Missing required field: apiKey")?;
    let terminal_id = terminal_id.ok_or("Missing required field: terminalId")?;
    let platform_url = platform_url.ok_or("Missing required field: platformUrl")?;

    set_credential(KEY_API_KEY, &api_key)?;
    set_credential(KEY_TERMINAL_ID, &terminal_id)?;
    set_credential(KEY_PLATFORM_URL, &api::normalize_platform_url(&platform_url))?;

    if let Some(bid) = payload
        .get("branchId")
        .or_else(|| payload.get("branch_id"))
        .and_then(Value::as_str)
    {
        set_credential(KEY_BRANCH_ID, bid)?;
    }
    if let Some(oid) = payload
        .get("organizationId")
        .or_else(|| payload.get("organization_id"))
        .and_then(Value::as_str)
    {
        set_credential(KEY_ORG_ID, oid)?;
    }

    info!(terminal_id = %terminal_id, "terminal pairing updated");
    Ok(serde_json::json!({ "success": true }))
}

/// Delete every stored credential (factory reset).
pub fn factory_reset() -> Result<Value, String> {
    info!("performing factory reset, deleting all credentials");
    for key in ALL_KEYS {
        delete_credential(key)?;
    }
    Ok(serde_json::json!({ "success": true }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn credential_round_trip() {
        let key = "test_credential_round_trip";
        set_credential(key, "value-1").expect("set credential");
        assert_eq!(get_credential(key).as_deref(), Some("value-1"));
        set_credential(key, "value-2").expect("overwrite credential");
        assert_eq!(get_credential(key).as_deref(), Some("value-2"));
        delete_credential(key).expect("delete credential");
        assert_eq!(get_credential(key), None);
        // Deleting again is not an error.
        delete_credential(key).expect("delete missing credential");
    }

    #[test]
    fn pairing_rejects_incomplete_payloads() {
        let err = update_pairing(&serde_json::json!({ "apiKey": "sk-1" }))
            .expect_err("missing terminal id");
        assert!(err.contains("terminalId"));
        let err = update_pairing(&serde_json::json!({})).expect_err("missing api key");
        assert!(err.contains("apiKey"));
    }
}

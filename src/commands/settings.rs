//! Terminal settings and pairing.
//!
//! Pairing stores the platform URL, terminal id, and API key (usually
//! decoded from a connection string) in the OS keyring; everything
//! non-sensitive goes to the SQLite `local_settings` store. Also exposes the
//! connectivity test the pairing screen runs before committing.

use serde_json::Value;

use crate::{api, db, storage, AppState};

fn value_to_settings_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

#[derive(Debug, PartialEq)]
struct SettingsSetPayload {
    category: String,
    key: String,
    value: String,
}

fn parse_settings_set_payload(arg0: Option<Value>) -> Result<SettingsSetPayload, String> {
    let payload = arg0.unwrap_or_else(|| serde_json::json!({}));
    let category = crate::value_str(&payload, &["category"]).unwrap_or_else(|| "general".into());
    let key = crate::value_str(&payload, &["key"]).ok_or("Missing settings key")?;
    let value = payload
        .get("value")
        .map(value_to_settings_string)
        .unwrap_or_default();
    Ok(SettingsSetPayload {
        category,
        key,
        value,
    })
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Pair this terminal with the platform. Accepts a connection string or
/// explicit fields; see [`storage::update_pairing`].
pub fn settings_pair_terminal(_state: &AppState, arg0: Option<Value>) -> Result<Value, String> {
    let payload = arg0.unwrap_or_else(|| serde_json::json!({}));
    storage::update_pairing(&payload)
}

/// Stored terminal config for the settings screen (never includes secrets).
pub fn settings_get_config(_state: &AppState, _arg0: Option<Value>) -> Result<Value, String> {
    Ok(storage::get_full_config())
}

/// Run the pairing screen's connectivity test against the given or stored
/// platform URL.
pub async fn settings_test_connectivity(
    _state: &AppState,
    arg0: Option<Value>,
) -> Result<Value, String> {
    let payload = arg0.unwrap_or_else(|| serde_json::json!({}));
    let platform_url = crate::value_str(&payload, &["platformUrl", "platform_url"])
        .or_else(|| storage::get_credential(storage::KEY_PLATFORM_URL))
        .ok_or("Missing platform URL")?;
    let api_key = crate::value_str(&payload, &["apiKey", "api_key"])
        .or_else(|| storage::get_credential(storage::KEY_API_KEY))
        .unwrap_or_default();

    let result = api::test_connectivity(&platform_url, &api_key).await;
    serde_json::to_value(result).map_err(|e| e.to_string())
}

/// Read one local setting.
pub fn settings_get(state: &AppState, arg0: Option<Value>) -> Result<Value, String> {
    let payload = arg0.unwrap_or_else(|| serde_json::json!({}));
    let category = crate::value_str(&payload, &["category"]).unwrap_or_else(|| "general".into());
    let key = crate::value_str(&payload, &["key"]).ok_or("Missing settings key")?;

    let conn = state.db.conn.lock().map_err(|e| e.to_string())?;
    Ok(match db::get_setting(&conn, &category, &key) {
        Some(value) => Value::String(value),
        None => Value::Null,
    })
}

/// Write one local setting.
pub fn settings_set(state: &AppState, arg0: Option<Value>) -> Result<Value, String> {
    let payload = parse_settings_set_payload(arg0)?;
    let conn = state.db.conn.lock().map_err(|e| e.to_string())?;
    db::set_setting(&conn, &payload.category, &payload.key, &payload.value)?;
    Ok(serde_json::json!({ "success": true }))
}

/// Factory reset: drop all credentials. Local settings survive; they hold
/// nothing sensitive.
pub fn settings_factory_reset(_state: &AppState, _arg0: Option<Value>) -> Result<Value, String> {
    storage::factory_reset()
}

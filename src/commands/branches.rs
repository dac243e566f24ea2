//! Branch browsing and administration.
//!
//! Customer-facing cards show each branch with its opening hours in the
//! 12-hour display encoding; the admin form edits hours as `"HH:MM"` inputs.
//! Stored times cross the platform boundary through the fixed-offset
//! shifters on every load and save. The latest fetched list is cached in
//! SQLite so the filter control still renders when the platform is
//! unreachable.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, warn};

use crate::api::PlatformClient;
use crate::timeshift::{shift_for_backend, shift_from_backend, to_12_hour, to_24_hour};
use crate::{db, AppState};

/// Placeholder shown when a branch has no stored time for a bound.
const NO_TIME: &str = "--";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Branch {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub address: Option<String>,
    #[serde(default)]
    pub phone: Option<String>,
    /// Opening/closing times as stored by the platform, `"HH:MM"`.
    #[serde(default)]
    pub open_time: Option<String>,
    #[serde(default)]
    pub close_time: Option<String>,
}

// ---------------------------------------------------------------------------
// Display conversion
// ---------------------------------------------------------------------------

/// Stored time to the 12-hour card display, `"--"` when absent or
/// unparseable.
fn display_hours(stored: Option<&str>) -> String {
    let Some(stored) = stored else {
        return NO_TIME.to_string();
    };
    shift_from_backend(stored)
        .and_then(|shifted| to_12_hour(&shifted))
        .unwrap_or_else(|e| {
            warn!(stored, error = %e, "unparseable stored branch time");
            NO_TIME.to_string()
        })
}

/// Customer-facing card for one branch.
pub fn branch_card(branch: &Branch) -> Value {
    serde_json::json!({
        "id": branch.id,
        "name": branch.name,
        "address": branch.address,
        "phone": branch.phone,
        "openTime": display_hours(branch.open_time.as_deref()),
        "closeTime": display_hours(branch.close_time.as_deref()),
    })
}

/// Admin form values for one branch: times shifted into display wall-clock,
/// still 24-hour for the form's time inputs.
pub fn branch_form(branch: &Branch) -> Result<Value, String> {
    let to_form = |stored: Option<&str>| -> Result<Value, String> {
        match stored {
            Some(stored) => shift_from_backend(stored)
                .map(Value::from)
                .map_err(|e| format!("Stored branch time is invalid: {e}")),
            None => Ok(Value::Null),
        }
    };
    Ok(serde_json::json!({
        "id": branch.id,
        "name": branch.name,
        "address": branch.address,
        "phone": branch.phone,
        "openTime": to_form(branch.open_time.as_deref())?,
        "closeTime": to_form(branch.close_time.as_deref())?,
    }))
}

// ---------------------------------------------------------------------------
// Save payload
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct BranchSavePayload {
    #[serde(default)]
    id: Option<i64>,
    #[serde(default)]
    name: String,
    #[serde(default)]
    address: Option<String>,
    #[serde(default)]
    phone: Option<String>,
    #[serde(default, alias = "open_time")]
    open_time: Option<String>,
    #[serde(default, alias = "close_time")]
    close_time: Option<String>,
}

/// Validate the form and convert edited times back to stored values.
/// Accepts either encoding on input (the form may echo the 12-hour display).
fn build_branch_body(payload: &BranchSavePayload) -> Result<Value, String> {
    let name = payload.name.trim();
    if name.is_empty() {
        return Err("Missing branch name".into());
    }

    let to_stored = |edited: Option<&String>, field: &str| -> Result<Value, String> {
        match edited.map(|s| s.trim()).filter(|s| !s.is_empty()) {
            Some(edited) => {
                let normalized =
                    to_24_hour(edited).map_err(|e| format!("Invalid {field}: {e}"))?;
                let stored = shift_for_backend(&normalized)
                    .map_err(|e| format!("Invalid {field}: {e}"))?;
                Ok(Value::from(stored))
            }
            None => Ok(Value::Null),
        }
    };

    Ok(serde_json::json!({
        "name": name,
        "address": payload.address,
        "phone": payload.phone,
        "openTime": to_stored(payload.open_time.as_ref(), "opening time")?,
        "closeTime": to_stored(payload.close_time.as_ref(), "closing time")?,
    }))
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

fn parse_branch_list(body: &Value) -> Result<Vec<Branch>, String> {
    let list = body
        .get("data")
        .cloned()
        .unwrap_or_else(|| body.clone());
    serde_json::from_value(list).map_err(|e| format!("Invalid branch list: {e}"))
}

fn cache_branches(state: &AppState, branches: &[Branch]) {
    let rows: Vec<(i64, String, String)> = branches
        .iter()
        .map(|b| {
            let payload = serde_json::to_string(b).unwrap_or_default();
            (b.id, b.name.clone(), payload)
        })
        .collect();
    if let Ok(conn) = state.db.conn.lock() {
        if let Err(e) = db::replace_cached_branches(&conn, &rows) {
            warn!(error = %e, "failed to cache branch list");
        }
    }
}

fn cached_branch_cards(state: &AppState) -> Result<Vec<Value>, String> {
    let conn = state.db.conn.lock().map_err(|e| e.to_string())?;
    let cached = db::load_cached_branches(&conn)?;
    Ok(cached
        .iter()
        .filter_map(|(_, _, payload)| serde_json::from_str::<Branch>(payload).ok())
        .map(|branch| branch_card(&branch))
        .collect())
}

/// Fetch the branch list and return customer-facing cards. Falls back to the
/// cached list when the platform is unreachable.
pub async fn branches_list(state: &AppState, _arg0: Option<Value>) -> Result<Value, String> {
    let client = PlatformClient::from_storage()?;
    match client.get("/api/branches").await {
        Ok(body) => {
            let branches = parse_branch_list(&body)?;
            cache_branches(state, &branches);
            let cards: Vec<Value> = branches.iter().map(branch_card).collect();
            Ok(serde_json::json!({ "branches": cards, "cached": false }))
        }
        Err(fetch_err) => {
            let cards = cached_branch_cards(state)?;
            if cards.is_empty() {
                return Err(fetch_err);
            }
            warn!(error = %fetch_err, "serving cached branch list");
            Ok(serde_json::json!({ "branches": cards, "cached": true }))
        }
    }
}

/// Load one branch into the admin form shape.
pub async fn branches_load_form(_state: &AppState, arg0: Option<Value>) -> Result<Value, String> {
    let payload = arg0.unwrap_or_else(|| serde_json::json!({}));
    let branch_id =
        crate::value_i64(&payload, &["branchId", "branch_id", "id"]).ok_or("Missing branchId")?;
    let client = PlatformClient::from_storage()?;
    let body = client.get(&format!("/api/branches/{branch_id}")).await?;
    let branch: Branch = serde_json::from_value(body.get("data").cloned().unwrap_or(body))
        .map_err(|e| format!("Invalid branch record: {e}"))?;
    branch_form(&branch)
}

/// Create or update a branch from the admin form.
pub async fn branches_save(state: &AppState, arg0: Option<Value>) -> Result<Value, String> {
    let payload: BranchSavePayload =
        serde_json::from_value(arg0.unwrap_or_else(|| serde_json::json!({})))
            .map_err(|e| format!("Invalid branch payload: {e}"))?;
    let body = build_branch_body(&payload)?;
    let client = PlatformClient::from_storage()?;

    let resp = match payload.id {
        Some(id) => client.put(&format!("/api/branches/{id}"), &body).await?,
        None => client.post("/api/branches", &body).await?,
    };
    info!(branch = %payload.name.trim(), "branch saved");

    // The list cache is stale after a save; refresh it opportunistically.
    if let Ok(list_body) = client.get("/api/branches").await {
        if let Ok(branches) = parse_branch_list(&list_body) {
            cache_branches(state, &branches);
        }
    }

    Ok(serde_json::json!({ "success": true, "branch": resp }))
}

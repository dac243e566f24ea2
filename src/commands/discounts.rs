//! Item discount administration.
//!
//! An offer applies a percentage discount to one menu item during a start/end
//! window. The window is edited as local datetimes and stored shifted by the
//! fixed platform offset, so every load and save goes through the date-aware
//! instant shifters.

use serde::Deserialize;
use serde_json::Value;
use tracing::info;

use crate::api::PlatformClient;
use crate::timeshift::{shift_instant_for_api, shift_instant_from_api};
use crate::AppState;

/// Format used for `datetime-local` form inputs.
const FORM_INSTANT_FORMAT: &str = "%Y-%m-%dT%H:%M";

// ---------------------------------------------------------------------------
// Display conversion
// ---------------------------------------------------------------------------

/// One discount record shaped for the admin list: stored window converted to
/// local display instants. A record with an unparseable window is surfaced
/// with null bounds rather than dropped, so the admin can see and fix it.
pub fn discount_row(record: &Value) -> Value {
    let window_bound = |key: &str| -> Value {
        record
            .get(key)
            .and_then(Value::as_str)
            .and_then(|raw| shift_instant_from_api(raw).ok())
            .map(|instant| Value::from(instant.format(FORM_INSTANT_FORMAT).to_string()))
            .unwrap_or(Value::Null)
    };
    serde_json::json!({
        "id": record.get("id").cloned().unwrap_or(Value::Null),
        "productId": record.get("productId").cloned().unwrap_or(Value::Null),
        "productName": record.get("productName").cloned().unwrap_or(Value::Null),
        "percentage": record.get("percentage").cloned().unwrap_or(Value::Null),
        "startsAt": window_bound("startsAt"),
        "endsAt": window_bound("endsAt"),
    })
}

// ---------------------------------------------------------------------------
// Save payload
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct DiscountSavePayload {
    #[serde(default)]
    id: Option<i64>,
    #[serde(default, alias = "product_id")]
    product_id: Option<i64>,
    #[serde(default)]
    percentage: f64,
    #[serde(default, alias = "starts_at")]
    starts_at: Option<String>,
    #[serde(default, alias = "ends_at")]
    ends_at: Option<String>,
}

/// Validate the offer form and convert the edited window to stored instants.
fn build_discount_body(payload: &DiscountSavePayload) -> Result<Value, String> {
    let product_id = payload.product_id.ok_or("Missing productId")?;
    if !(payload.percentage > 0.0 && payload.percentage <= 100.0) {
        return Err("Discount percentage must be within (0, 100]".into());
    }

    let starts_at = payload
        .starts_at
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or("Missing offer start")?;
    let ends_at = payload
        .ends_at
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .ok_or("Missing offer end")?;

    let stored_start =
        shift_instant_for_api(starts_at).map_err(|e| format!("Invalid offer start: {e}"))?;
    let stored_end =
        shift_instant_for_api(ends_at).map_err(|e| format!("Invalid offer end: {e}"))?;
    // Stored instants are both shifted by the same offset, so the ordering
    // check holds in either frame.
    if stored_end <= stored_start {
        return Err("Offer end must be after its start".into());
    }

    Ok(serde_json::json!({
        "productId": product_id,
        "percentage": payload.percentage,
        "startsAt": stored_start,
        "endsAt": stored_end,
    }))
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Fetch the discount list shaped for the admin table.
pub async fn discounts_list(_state: &AppState, _arg0: Option<Value>) -> Result<Value, String> {
    let client = PlatformClient::from_storage()?;
    let body = client.get("/api/discounts").await?;
    let records = body
        .get("data")
        .and_then(Value::as_array)
        .cloned()
        .or_else(|| body.as_array().cloned())
        .ok_or("Invalid discount list")?;
    let rows: Vec<Value> = records.iter().map(discount_row).collect();
    Ok(serde_json::json!({ "discounts": rows }))
}

/// Create or update an offer from the admin form.
pub async fn discounts_save(_state: &AppState, arg0: Option<Value>) -> Result<Value, String> {
    let payload: DiscountSavePayload =
        serde_json::from_value(arg0.unwrap_or_else(|| serde_json::json!({})))
            .map_err(|e| format!("Invalid discount payload: {e}"))?;
    let body = build_discount_body(&payload)?;
    let client = PlatformClient::from_storage()?;

    let resp = match payload.id {
        Some(id) => client.put(&format!("/api/discounts/{id}"), &body).await?,
        None => client.post("/api/discounts", &body).await?,
    };
    info!(product_id = ?payload.product_id, "discount saved");
    Ok(serde_json::json!({ "success": true, "discount": resp }))
}

/// Remove an offer.
pub async fn discounts_delete(_state: &AppState, arg0: Option<Value>) -> Result<Value, String> {
    let payload = arg0.unwrap_or_else(|| serde_json::json!({}));
    let id = crate::value_i64(&payload, &["discountId", "discount_id", "id"])
        .ok_or("Missing discountId")?;
    let client = PlatformClient::from_storage()?;
    client.delete(&format!("/api/discounts/{id}")).await?;
    info!(id, "discount deleted");
    Ok(serde_json::json!({ "success": true }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload(starts: &str, ends: &str) -> DiscountSavePayload {
        DiscountSavePayload {
            id: None,
            product_id: Some(12),
            percentage: 25.0,
            starts_at: Some(starts.to_string()),
            ends_at: Some(ends.to_string()),
        }
    }

    #[test]
    fn save_shifts_the_window_into_stored_instants() {
        let body = build_discount_body(&payload("2025-05-01T10:00", "2025-05-03T22:00"))
            .expect("body");
        assert_eq!(
            body.get("startsAt").and_then(Value::as_str),
            Some("2025-05-01T08:00:00")
        );
        assert_eq!(
            body.get("endsAt").and_then(Value::as_str),
            Some("2025-05-03T20:00:00")
        );
    }

    #[test]
    fn save_shift_rolls_across_midnight() {
        let body = build_discount_body(&payload("2025-05-01T01:00", "2025-05-01T03:00"))
            .expect("body");
        assert_eq!(
            body.get("startsAt").and_then(Value::as_str),
            Some("2025-04-30T23:00:00")
        );
    }

    #[test]
    fn save_rejects_bad_percentages_and_windows() {
        let mut bad = payload("2025-05-01T10:00", "2025-05-03T22:00");
        bad.percentage = 0.0;
        assert!(build_discount_body(&bad).is_err());
        bad.percentage = 150.0;
        assert!(build_discount_body(&bad).is_err());

        let inverted = payload("2025-05-03T22:00", "2025-05-01T10:00");
        assert_eq!(
            build_discount_body(&inverted).expect_err("inverted window"),
            "Offer end must be after its start"
        );

        let mut missing = payload("2025-05-01T10:00", "2025-05-03T22:00");
        missing.product_id = None;
        assert_eq!(
            build_discount_body(&missing).expect_err("missing product"),
            "Missing productId"
        );

        let mut unset = payload("2025-05-01T10:00", "2025-05-03T22:00");
        unset.ends_at = Some("  ".to_string());
        assert_eq!(
            build_discount_body(&unset).expect_err("blank end"),
            "Missing offer end"
        );
    }

    #[test]
    fn rows_convert_stored_windows_back_to_display() {
        let record = serde_json::json!({
            "id": 4,
            "productId": 12,
            "productName": "شاورما",
            "percentage": 25.0,
            "startsAt": "2025-05-01T08:00:00",
            "endsAt": "2025-05-03T20:00:00",
        });
        let row = discount_row(&record);
        assert_eq!(
            row.get("startsAt").and_then(Value::as_str),
            Some("2025-05-01T10:00")
        );
        assert_eq!(
            row.get("endsAt").and_then(Value::as_str),
            Some("2025-05-03T22:00")
        );
    }

    #[test]
    fn rows_surface_unparseable_windows_as_null() {
        let record = serde_json::json!({ "id": 4, "startsAt": "whenever" });
        let row = discount_row(&record);
        assert_eq!(row.get("startsAt"), Some(&Value::Null));
    }
}

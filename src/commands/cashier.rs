//! Cashier screen cart.
//!
//! The cart is the one piece of client-owned order state: lines are added
//! from the catalog with their selected priced options, quantities edited,
//! and the whole cart submitted as a single order payload. Totals computed
//! here are display previews only; the platform recomputes authoritative
//! totals on submission.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::info;
use uuid::Uuid;

use crate::api::PlatformClient;
use crate::report::SelectedOption;
use crate::AppState;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLine {
    /// Client-generated line id, stable across quantity edits.
    pub line_id: String,
    pub product_id: i64,
    pub name: String,
    pub unit_price: f64,
    pub quantity: f64,
    /// Per-unit discount already granted on this item.
    pub discount: f64,
    pub options: Vec<SelectedOption>,
}

impl CartLine {
    pub fn line_total(&self) -> f64 {
        let options_total: f64 = self.options.iter().map(|o| o.price).sum();
        self.quantity * (self.unit_price - self.discount + options_total)
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartTotals {
    pub subtotal: f64,
    pub discount_total: f64,
    pub delivery_fee: f64,
    pub grand_total: f64,
}

/// Cart state owned by the cashier view.
#[derive(Debug, Default)]
pub struct CartState {
    pub lines: Vec<CartLine>,
    pub customer_name: String,
    pub customer_phone: String,
    /// Zero for pickup orders.
    pub delivery_fee: f64,
}

impl CartState {
    /// Add a line, merging into an existing one when product and options
    /// match.
    pub fn add_line(
        &mut self,
        product_id: i64,
        name: &str,
        unit_price: f64,
        quantity: f64,
        discount: f64,
        options: Vec<SelectedOption>,
    ) -> Result<(), String> {
        if quantity <= 0.0 {
            return Err("Quantity must be positive".into());
        }
        let same_options = |line: &CartLine| {
            line.options.len() == options.len()
                && line
                    .options
                    .iter()
                    .zip(&options)
                    .all(|(a, b)| a.name == b.name && a.price == b.price)
        };
        if let Some(i) = self
            .lines
            .iter()
            .position(|line| line.product_id == product_id && same_options(line))
        {
            self.lines[i].quantity += quantity;
            return Ok(());
        }
        self.lines.push(CartLine {
            line_id: Uuid::new_v4().to_string(),
            product_id,
            name: name.to_string(),
            unit_price,
            quantity,
            discount,
            options,
        });
        Ok(())
    }

    /// Set a line's quantity; zero removes the line.
    pub fn set_quantity(&mut self, line_id: &str, quantity: f64) -> Result<(), String> {
        if quantity < 0.0 {
            return Err("Quantity must not be negative".into());
        }
        let Some(i) = self.lines.iter().position(|line| line.line_id == line_id) else {
            return Err(format!("No such cart line: {line_id}"));
        };
        if quantity == 0.0 {
            self.lines.remove(i);
        } else {
            self.lines[i].quantity = quantity;
        }
        Ok(())
    }

    pub fn remove_line(&mut self, line_id: &str) -> Result<(), String> {
        self.set_quantity(line_id, 0.0)
    }

    pub fn clear(&mut self) {
        self.lines.clear();
        self.customer_name.clear();
        self.customer_phone.clear();
        self.delivery_fee = 0.0;
    }

    /// Display-preview totals.
    pub fn totals(&self) -> CartTotals {
        let subtotal: f64 = self.lines.iter().map(CartLine::line_total).sum();
        let discount_total: f64 = self
            .lines
            .iter()
            .map(|line| line.quantity * line.discount)
            .sum();
        CartTotals {
            subtotal,
            discount_total,
            delivery_fee: self.delivery_fee,
            grand_total: subtotal + self.delivery_fee,
        }
    }

    /// Order payload for submission, including a client idempotency key.
    pub fn build_order_payload(&self, branch_id: i64) -> Result<Value, String> {
        if self.lines.is_empty() {
            return Err("Cart is empty".into());
        }
        let totals = self.totals();
        Ok(serde_json::json!({
            "idempotencyKey": Uuid::new_v4().to_string(),
            "branchId": branch_id,
            "customerName": self.customer_name,
            "customerPhone": self.customer_phone,
            "deliveryFee": { "fee": self.delivery_fee },
            "items": self.lines.iter().map(|line| serde_json::json!({
                "productId": line.product_id,
                "quantity": line.quantity,
                "unitPrice": line.unit_price,
                "discount": line.discount,
                "options": line.options,
            })).collect::<Vec<_>>(),
            "clientTotals": totals,
        }))
    }

    pub fn snapshot(&self) -> Value {
        serde_json::json!({
            "lines": self.lines,
            "totals": self.totals(),
            "customerName": self.customer_name,
            "customerPhone": self.customer_phone,
        })
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct AddLinePayload {
    #[serde(alias = "product_id")]
    product_id: i64,
    name: String,
    #[serde(alias = "unit_price", alias = "price")]
    unit_price: f64,
    #[serde(default = "default_quantity")]
    quantity: f64,
    #[serde(default)]
    discount: f64,
    #[serde(default, alias = "selectedOptions")]
    options: Vec<SelectedOption>,
}

fn default_quantity() -> f64 {
    1.0
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct QuantityPayload {
    #[serde(alias = "line_id")]
    line_id: String,
    quantity: f64,
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

pub fn cart_add_line(state: &AppState, arg0: Option<Value>) -> Result<Value, String> {
    let payload: AddLinePayload =
        serde_json::from_value(arg0.unwrap_or_else(|| serde_json::json!({})))
            .map_err(|e| format!("Invalid cart payload: {e}"))?;
    let mut cart = state.cart.lock().map_err(|e| e.to_string())?;
    cart.add_line(
        payload.product_id,
        payload.name.trim(),
        payload.unit_price,
        payload.quantity,
        payload.discount,
        payload.options,
    )?;
    Ok(cart.snapshot())
}

pub fn cart_set_quantity(state: &AppState, arg0: Option<Value>) -> Result<Value, String> {
    let payload: QuantityPayload =
        serde_json::from_value(arg0.unwrap_or_else(|| serde_json::json!({})))
            .map_err(|e| format!("Invalid quantity payload: {e}"))?;
    let mut cart = state.cart.lock().map_err(|e| e.to_string())?;
    cart.set_quantity(&payload.line_id, payload.quantity)?;
    Ok(cart.snapshot())
}

pub fn cart_clear(state: &AppState, _arg0: Option<Value>) -> Result<Value, String> {
    let mut cart = state.cart.lock().map_err(|e| e.to_string())?;
    cart.clear();
    Ok(cart.snapshot())
}

/// Submit the cart as an order. The cart is cleared only after the platform
/// accepts it.
pub async fn cart_submit_order(state: &AppState, arg0: Option<Value>) -> Result<Value, String> {
    let payload = arg0.unwrap_or_else(|| serde_json::json!({}));
    let branch_id = crate::value_i64(&payload, &["branchId", "branch_id"])
        .ok_or("Missing branchId")?;

    let order_body = {
        let mut cart = state.cart.lock().map_err(|e| e.to_string())?;
        if let Some(name) = crate::value_str(&payload, &["customerName", "customer_name"]) {
            cart.customer_name = name;
        }
        if let Some(phone) = crate::value_str(&payload, &["customerPhone", "customer_phone"]) {
            cart.customer_phone = phone;
        }
        if let Some(fee) = crate::value_f64(&payload, &["deliveryFee", "delivery_fee"]) {
            if fee < 0.0 {
                return Err("Delivery fee must not be negative".into());
            }
            cart.delivery_fee = fee;
        }
        cart.build_order_payload(branch_id)?
    };

    let client = PlatformClient::from_storage()?;
    let resp = client.post("/api/orders", &order_body).await?;

    let mut cart = state.cart.lock().map_err(|e| e.to_string())?;
    cart.clear();
    info!(branch_id, "order submitted");
    Ok(serde_json::json!({ "success": true, "order": resp }))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn option(name: &str, price: f64) -> SelectedOption {
        SelectedOption {
            name: name.to_string(),
            price,
        }
    }

    #[test]
    fn totals_cover_options_discounts_and_delivery() {
        let mut cart = CartState::default();
        cart.add_line(1, "برجر", 20.0, 2.0, 2.0, vec![option("جبنة", 3.0)])
            .expect("add");
        cart.add_line(2, "عصير", 8.0, 1.0, 0.0, Vec::new())
            .expect("add");
        cart.delivery_fee = 10.0;

        let totals = cart.totals();
        // 2 * (20 - 2 + 3) + 8
        assert_eq!(totals.subtotal, 50.0);
        assert_eq!(totals.discount_total, 4.0);
        assert_eq!(totals.grand_total, 60.0);
    }

    #[test]
    fn matching_lines_merge_instead_of_duplicating() {
        let mut cart = CartState::default();
        cart.add_line(1, "برجر", 20.0, 1.0, 0.0, vec![option("جبنة", 3.0)])
            .expect("add");
        cart.add_line(1, "برجر", 20.0, 2.0, 0.0, vec![option("جبنة", 3.0)])
            .expect("merge");
        assert_eq!(cart.lines.len(), 1);
        assert_eq!(cart.lines[0].quantity, 3.0);

        // Different options stay a separate line.
        cart.add_line(1, "برجر", 20.0, 1.0, 0.0, Vec::new())
            .expect("separate");
        assert_eq!(cart.lines.len(), 2);
    }

    #[test]
    fn quantity_edits_and_zero_removal() {
        let mut cart = CartState::default();
        cart.add_line(1, "برجر", 20.0, 1.0, 0.0, Vec::new())
            .expect("add");
        let line_id = cart.lines[0].line_id.clone();

        cart.set_quantity(&line_id, 4.0).expect("update");
        assert_eq!(cart.lines[0].quantity, 4.0);

        cart.set_quantity(&line_id, 0.0).expect("remove");
        assert!(cart.lines.is_empty());

        assert!(cart.set_quantity("missing", 1.0).is_err());
        assert!(cart
            .add_line(1, "برجر", 20.0, 0.0, 0.0, Vec::new())
            .is_err());
    }

    #[test]
    fn order_payload_carries_lines_and_idempotency_key() {
        let mut cart = CartState::default();
        assert!(cart.build_order_payload(1).is_err());

        cart.add_line(5, "كبسة", 30.0, 1.0, 0.0, Vec::new())
            .expect("add");
        cart.customer_name = "أحمد".to_string();
        let payload = cart.build_order_payload(1).expect("payload");

        assert_eq!(payload.get("branchId").and_then(Value::as_i64), Some(1));
        assert!(payload
            .get("idempotencyKey")
            .and_then(Value::as_str)
            .is_some_and(|k| !k.is_empty()));
        let items = payload.get("items").and_then(Value::as_array).expect("items");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].get("productId").and_then(Value::as_i64), Some(5));
    }
}

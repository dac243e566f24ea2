//! Range-report aggregation for the sales reporting view.
//!
//! The reporting page issues two queries per date range: a paginated detail
//! query (10 rows per page) and a full-range query that feeds the summary
//! cards, so paging through the table never changes the figures. All
//! aggregation is a single pass over the records the platform returns; the
//! platform remains authoritative for order totals.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::debug;

use crate::api::PlatformClient;
use crate::timeshift::BACKEND_UTC_OFFSET_HOURS;

/// Detail-table page size for the reporting view.
pub const REPORT_PAGE_SIZE: u32 = 10;

/// Page size used by the full-range statistics fetch. Large enough to cover
/// any realistic range in a single call.
pub const STATS_PAGE_SIZE: u32 = 10_000;

/// Maximum number of entries in the best-sellers table.
pub const TOP_PRODUCTS_LIMIT: usize = 5;

/// Display label for line items whose product can no longer be resolved.
pub const UNKNOWN_PRODUCT_LABEL: &str = "منتج غير معروف";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ReportError {
    #[error("no orders in the selected range")]
    EmptyOrders,
    #[error("report date range is not set")]
    MissingRange,
}

// ---------------------------------------------------------------------------
// API record shapes (read-only mirrors of the order-report response)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeliveryFee {
    #[serde(default)]
    pub fee: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProductRef {
    #[serde(default)]
    pub name: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectedOption {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub price: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
    /// Live catalog reference, absent when the product was deleted.
    #[serde(default)]
    pub product: Option<ProductRef>,
    /// Name snapshot captured at order time.
    #[serde(default, alias = "name")]
    pub product_name: Option<String>,
    #[serde(default)]
    pub quantity: f64,
    #[serde(default, alias = "price")]
    pub unit_price: f64,
    /// Per-item discount already applied to the unit price.
    #[serde(default, alias = "itemDiscount")]
    pub discount: f64,
    #[serde(default, alias = "selectedOptions")]
    pub options: Vec<SelectedOption>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
    Pending,
    Confirmed,
    Preparing,
    Ready,
    Delivered,
    Completed,
    Cancelled,
    #[serde(other)]
    Unknown,
}

impl Default for OrderStatus {
    fn default() -> Self {
        OrderStatus::Pending
    }
}

impl OrderStatus {
    /// User-facing Arabic label, used by the printable report table.
    pub fn label(self) -> &'static str {
        match self {
            OrderStatus::Pending => "قيد الانتظار",
            OrderStatus::Confirmed => "مؤكد",
            OrderStatus::Preparing => "قيد التحضير",
            OrderStatus::Ready => "جاهز",
            OrderStatus::Delivered => "تم التوصيل",
            OrderStatus::Completed => "مكتمل",
            OrderStatus::Cancelled => "ملغي",
            OrderStatus::Unknown => "غير معروف",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderRecord {
    pub id: i64,
    #[serde(default)]
    pub order_number: Option<String>,
    #[serde(default)]
    pub customer_name: Option<String>,
    /// Presence and value distinguish delivery from pickup: a fee greater
    /// than zero is a delivery, exactly zero is a pickup, absent is neither.
    #[serde(default)]
    pub delivery_fee: Option<DeliveryFee>,
    #[serde(default)]
    pub items: Vec<OrderItem>,
    #[serde(default)]
    pub total_before_fee: f64,
    #[serde(default)]
    pub total_discount: f64,
    #[serde(default)]
    pub total_with_fee: f64,
    #[serde(default)]
    pub status: OrderStatus,
    #[serde(default)]
    pub created_at: Option<String>,
}

// ---------------------------------------------------------------------------
// Summary aggregation
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProductSales {
    pub name: String,
    pub quantity: f64,
    pub revenue: f64,
}

/// Summary figures recomputed from the full order set on every fetch.
/// `Default` is the zeroed pre-query / post-failure state, so the view never
/// shows stale figures after an error.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportSummary {
    pub total_sales: f64,
    pub total_orders: u64,
    pub delivery_orders: u64,
    pub pickup_orders: u64,
    pub top_products: Vec<ProductSales>,
    pub date_range: String,
}

/// Display name for a line item: live catalog name first, then the snapshot
/// captured at order time, then the fixed unknown-product label.
pub fn display_name(item: &OrderItem) -> &str {
    if let Some(product) = &item.product {
        let trimmed = product.name.trim();
        if !trimmed.is_empty() {
            return trimmed;
        }
    }
    if let Some(snapshot) = &item.product_name {
        let trimmed = snapshot.trim();
        if !trimmed.is_empty() {
            return trimmed;
        }
    }
    UNKNOWN_PRODUCT_LABEL
}

/// Revenue contributed by one line item.
pub fn line_revenue(item: &OrderItem) -> f64 {
    let options_total: f64 = item.options.iter().map(|o| o.price).sum();
    item.quantity * (item.unit_price - item.discount + options_total)
}

/// Reduce a full range of orders into the summary figures.
///
/// `total_price_override` is the platform-computed range total; when it is
/// greater than zero it takes precedence over the client-side sum.
pub fn compute_summary(
    orders: &[OrderRecord],
    start_date: &str,
    end_date: &str,
    total_price_override: f64,
) -> ReportSummary {
    if orders.is_empty() {
        return ReportSummary {
            date_range: "لم تحدد فترة".to_string(),
            ..ReportSummary::default()
        };
    }

    let summed: f64 = orders.iter().map(|o| o.total_with_fee).sum();
    let total_sales = if total_price_override > 0.0 {
        total_price_override
    } else {
        summed
    };

    let mut delivery_orders = 0u64;
    let mut pickup_orders = 0u64;
    for order in orders {
        match &order.delivery_fee {
            Some(fee) if fee.fee > 0.0 => delivery_orders += 1,
            Some(_) => pickup_orders += 1,
            None => {}
        }
    }

    // Accumulate per product in first-seen order so revenue ties stay stable.
    let mut index: HashMap<String, usize> = HashMap::new();
    let mut products: Vec<ProductSales> = Vec::new();
    for order in orders {
        for item in &order.items {
            let name = display_name(item);
            let revenue = line_revenue(item);
            match index.get(name) {
                Some(&i) => {
                    products[i].quantity += item.quantity;
                    products[i].revenue += revenue;
                }
                None => {
                    index.insert(name.to_string(), products.len());
                    products.push(ProductSales {
                        name: name.to_string(),
                        quantity: item.quantity,
                        revenue,
                    });
                }
            }
        }
    }
    products.sort_by(|a, b| {
        b.revenue
            .partial_cmp(&a.revenue)
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    products.truncate(TOP_PRODUCTS_LIMIT);

    debug!(
        orders = orders.len(),
        distinct_products = index.len(),
        "range summary computed"
    );

    ReportSummary {
        total_sales,
        total_orders: orders.len() as u64,
        delivery_orders,
        pickup_orders,
        top_products: products,
        date_range: format!("من {start_date} إلى {end_date}"),
    }
}

// ---------------------------------------------------------------------------
// Range query bounds
// ---------------------------------------------------------------------------

/// Build the UTC range bounds the order-report endpoint expects.
///
/// Local midnight under the fixed 2-hour platform offset is 22:00 UTC of the
/// previous day, so the start bound is `(start - 1 day)T22:00:00.000Z` and
/// the end bound is `endT21:59:59.999Z`. This is a fixed-offset convention
/// matching the platform, not a general timezone conversion.
pub fn range_bounds(start_date: &str, end_date: &str) -> Result<(String, String), String> {
    let start = chrono::NaiveDate::parse_from_str(start_date.trim(), "%Y-%m-%d")
        .map_err(|_| format!("Invalid start date: {start_date}"))?;
    let end = chrono::NaiveDate::parse_from_str(end_date.trim(), "%Y-%m-%d")
        .map_err(|_| format!("Invalid end date: {end_date}"))?;

    let utc_midnight_hour = 24 - BACKEND_UTC_OFFSET_HOURS;
    let range_start = format!(
        "{}T{:02}:00:00.000Z",
        (start - chrono::Duration::days(1)).format("%Y-%m-%d"),
        utc_midnight_hour
    );
    let range_end = format!(
        "{}T{:02}:59:59.999Z",
        end.format("%Y-%m-%d"),
        utc_midnight_hour - 1
    );
    Ok((range_start, range_end))
}

// ---------------------------------------------------------------------------
// Pagination
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageLabel {
    Page(u32),
    Ellipsis,
}

/// Pagination bookkeeping for the detail table. `current_page` is 1-based
/// and always stays within `1..=max(total_pages, 1)`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PaginationState {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_items: u64,
    pub page_size: u32,
}

impl Default for PaginationState {
    fn default() -> Self {
        Self {
            current_page: 1,
            total_pages: 0,
            total_items: 0,
            page_size: REPORT_PAGE_SIZE,
        }
    }
}

impl PaginationState {
    /// Apply the totals reported by the platform, clamping the current page
    /// into range (a shrinking result set can strand the cursor past the end).
    pub fn apply_totals(&mut self, total_items: u64, total_pages: u32) {
        self.total_items = total_items;
        self.total_pages = total_pages;
        self.current_page = self.current_page.clamp(1, total_pages.max(1));
    }

    /// Move to `page`, clamped into range. Returns true when the page changed.
    pub fn set_page(&mut self, page: u32) -> bool {
        let clamped = page.clamp(1, self.total_pages.max(1));
        let changed = clamped != self.current_page;
        self.current_page = clamped;
        changed
    }
}

/// Page labels to render: always page 1 and the last page, up to two pages
/// on each side of the current page, one ellipsis per collapsed gap.
pub fn paginate(current_page: u32, total_pages: u32) -> Vec<PageLabel> {
    let mut labels = Vec::new();
    let mut last_shown = 0u32;
    for page in 1..=total_pages {
        let near_current = (i64::from(page) - i64::from(current_page)).abs() <= 2;
        if page == 1 || page == total_pages || near_current {
            if last_shown != 0 && page - last_shown > 1 {
                labels.push(PageLabel::Ellipsis);
            }
            labels.push(PageLabel::Page(page));
            last_shown = page;
        }
    }
    labels
}

// ---------------------------------------------------------------------------
// Report endpoint fetches
// ---------------------------------------------------------------------------

/// One page of the order-report response.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportPage {
    #[serde(default)]
    pub data: Vec<OrderRecord>,
    #[serde(default)]
    pub total_items: u64,
    #[serde(default)]
    pub total_pages: u32,
    /// Platform-computed range total, fed to [`compute_summary`] as the
    /// override.
    #[serde(default)]
    pub total_price: f64,
}

fn report_path(
    range_start: &str,
    range_end: &str,
    branch_id: Option<i64>,
    page_number: u32,
    page_size: u32,
) -> String {
    let mut path = format!(
        "/api/reports/orders?rangeStartUtc={range_start}&rangeEndUtc={range_end}&pageNumber={page_number}&pageSize={page_size}"
    );
    if let Some(branch) = branch_id {
        path.push_str(&format!("&branchId={branch}"));
    }
    path
}

/// Fetch one detail page for the table.
pub async fn fetch_page(
    client: &PlatformClient,
    start_date: &str,
    end_date: &str,
    branch_id: Option<i64>,
    page_number: u32,
    page_size: u32,
) -> Result<ReportPage, String> {
    let (range_start, range_end) = range_bounds(start_date, end_date)?;
    let path = report_path(&range_start, &range_end, branch_id, page_number, page_size);
    let body = client.get(&path).await?;
    serde_json::from_value(body).map_err(|e| format!("Invalid report response: {e}"))
}

/// Fetch the whole range in one call to feed the summary figures,
/// independent of the visible page.
pub async fn fetch_all_for_stats(
    client: &PlatformClient,
    start_date: &str,
    end_date: &str,
    branch_id: Option<i64>,
) -> Result<ReportPage, String> {
    fetch_page(client, start_date, end_date, branch_id, 1, STATS_PAGE_SIZE).await
}

/// Fetch one order's full record for the details drill-down.
pub async fn fetch_order_detail(client: &PlatformClient, order_id: i64) -> Result<Value, String> {
    client.get(&format!("/api/reports/orders/{order_id}")).await
}

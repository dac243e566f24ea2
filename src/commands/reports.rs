//! Sales reporting view.
//!
//! Owns the date range, branch filter, pagination cursor, summary figures,
//! and the loading/printing flags. Two fetches back every query: the visible
//! detail page and a full-range set that feeds the summary cards, so paging
//! never changes the figures. Completions are applied through a fetch ticket;
//! a response that has been superseded is dropped instead of overwriting
//! newer state.

use serde::Deserialize;
use serde_json::Value;
use tracing::{info, warn};

use crate::api::PlatformClient;
use crate::commands::FetchGuard;
use crate::print::render_printable;
use crate::report::{
    self, compute_summary, paginate, OrderRecord, PageLabel, PaginationState, ReportPage,
    ReportSummary, REPORT_PAGE_SIZE,
};
use crate::AppState;

/// Branch filter label used when no single branch is selected.
pub const ALL_BRANCHES_LABEL: &str = "كل الفروع";

// ---------------------------------------------------------------------------
// View state
// ---------------------------------------------------------------------------

/// State owned by the reporting page. Mutated only by the handlers below.
pub struct ReportsView {
    /// Query bounds as entered, `""` when unset.
    pub date_from: String,
    pub date_to: String,
    /// `None` selects all branches and omits the filter from the query.
    pub branch_id: Option<i64>,
    pub branch_name: String,
    pub pagination: PaginationState,
    pub summary: ReportSummary,
    /// Rows of the visible detail page.
    pub rows: Vec<OrderRecord>,
    /// Full-range rows backing the summary and the printable report.
    pub all_rows: Vec<OrderRecord>,
    pub loading: bool,
    pub print_in_progress: bool,
    pub guard: FetchGuard,
}

impl Default for ReportsView {
    fn default() -> Self {
        Self {
            date_from: String::new(),
            date_to: String::new(),
            branch_id: None,
            branch_name: ALL_BRANCHES_LABEL.to_string(),
            pagination: PaginationState::default(),
            summary: ReportSummary::default(),
            rows: Vec::new(),
            all_rows: Vec::new(),
            loading: false,
            print_in_progress: false,
            guard: FetchGuard::new(),
        }
    }
}

impl ReportsView {
    /// Validate the entered range: both bounds present and not inverted.
    /// No network call is made for an invalid range.
    pub fn validate_range(&self) -> Result<(String, String), String> {
        let from = self.date_from.trim();
        let to = self.date_to.trim();
        if from.is_empty() || to.is_empty() {
            return Err("Missing date range".into());
        }
        let start = chrono::NaiveDate::parse_from_str(from, "%Y-%m-%d")
            .map_err(|_| format!("Invalid start date: {from}"))?;
        let end = chrono::NaiveDate::parse_from_str(to, "%Y-%m-%d")
            .map_err(|_| format!("Invalid end date: {to}"))?;
        if start > end {
            return Err("Inverted date range".into());
        }
        Ok((from.to_string(), to.to_string()))
    }

    /// Drop all fetched data; the view never shows stale figures after a
    /// failure.
    pub fn reset_results(&mut self) {
        self.rows.clear();
        self.all_rows.clear();
        self.summary = ReportSummary::default();
        self.pagination = PaginationState::default();
    }

    /// Apply a completed query. Returns false (and changes nothing) when the
    /// ticket has been superseded by a newer fetch.
    pub fn apply_results(&mut self, ticket: u64, page: ReportPage, stats: ReportPage) -> bool {
        if !self.guard.is_current(ticket) {
            warn!(ticket, "dropping superseded report fetch");
            return false;
        }
        self.pagination.apply_totals(page.total_items, page.total_pages);
        self.rows = page.data;
        self.summary = compute_summary(
            &stats.data,
            self.date_from.trim(),
            self.date_to.trim(),
            stats.total_price,
        );
        self.all_rows = stats.data;
        true
    }

    /// Apply a completed page change. Summary and full-range rows are
    /// untouched; only the visible page moves.
    pub fn apply_page(&mut self, ticket: u64, page: ReportPage) -> bool {
        if !self.guard.is_current(ticket) {
            warn!(ticket, "dropping superseded page fetch");
            return false;
        }
        self.pagination.apply_totals(page.total_items, page.total_pages);
        self.rows = page.data;
        true
    }

    /// JSON snapshot the shell renders from.
    pub fn snapshot(&self) -> Value {
        let labels: Vec<Value> = paginate(self.pagination.current_page, self.pagination.total_pages)
            .into_iter()
            .map(|label| match label {
                PageLabel::Page(n) => Value::from(n),
                PageLabel::Ellipsis => Value::from("ellipsis"),
            })
            .collect();
        serde_json::json!({
            "summary": self.summary,
            "rows": self.rows,
            "pagination": self.pagination,
            "pageLabels": labels,
            "branchName": self.branch_name,
            "loading": self.loading,
            "printInProgress": self.print_in_progress,
        })
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
struct RangeQueryPayload {
    #[serde(default, alias = "date_from", alias = "startDate")]
    date_from: Option<String>,
    #[serde(default, alias = "date_to", alias = "endDate")]
    date_to: Option<String>,
    #[serde(default, alias = "branch_id")]
    branch_id: Option<Value>,
    #[serde(default, alias = "branch_name")]
    branch_name: Option<String>,
}

/// The branch filter arrives as a number, a numeric string, or the
/// all-branches sentinel (`"all"`, `0`, or absent). Only a positive id
/// restricts the query.
fn resolve_branch_filter(raw: Option<&Value>) -> Option<i64> {
    match raw {
        Some(Value::Number(n)) => n.as_i64().filter(|id| *id > 0),
        Some(Value::String(s)) => s.trim().parse::<i64>().ok().filter(|id| *id > 0),
        _ => None,
    }
}

fn parse_range_query_payload(arg0: Option<Value>) -> Result<RangeQueryPayload, String> {
    let payload = arg0.unwrap_or_else(|| serde_json::json!({}));
    serde_json::from_value(payload).map_err(|e| format!("Invalid report payload: {e}"))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PageChangePayload {
    #[serde(alias = "pageNumber")]
    page: u32,
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// Run a fresh range query: validate, fetch the first detail page plus the
/// full-range statistics set, recompute the summary.
pub async fn report_range_query(state: &AppState, arg0: Option<Value>) -> Result<Value, String> {
    let payload = parse_range_query_payload(arg0)?;
    let client = PlatformClient::from_storage()?;

    let (from, to, branch_id, ticket) = {
        let mut view = state.reports.lock().map_err(|e| e.to_string())?;
        if let Some(from) = payload.date_from {
            view.date_from = from;
        }
        if let Some(to) = payload.date_to {
            view.date_to = to;
        }
        view.branch_id = resolve_branch_filter(payload.branch_id.as_ref());
        view.branch_name = payload
            .branch_name
            .map(|name| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .unwrap_or_else(|| ALL_BRANCHES_LABEL.to_string());
        let (from, to) = view.validate_range()?;
        view.pagination = PaginationState::default();
        view.loading = true;
        (from, to, view.branch_id, view.guard.begin())
    };

    let page_result =
        report::fetch_page(&client, &from, &to, branch_id, 1, REPORT_PAGE_SIZE).await;
    let stats_result = report::fetch_all_for_stats(&client, &from, &to, branch_id).await;

    let mut view = state.reports.lock().map_err(|e| e.to_string())?;
    if !view.guard.is_current(ticket) {
        return Ok(serde_json::json!({ "stale": true }));
    }
    view.loading = false;

    match (page_result, stats_result) {
        (Ok(page), Ok(stats)) => {
            view.apply_results(ticket, page, stats);
            info!(
                from = %from,
                to = %to,
                branch = ?branch_id,
                orders = view.summary.total_orders,
                "range query applied"
            );
            Ok(view.snapshot())
        }
        (Err(e), _) | (_, Err(e)) => {
            view.reset_results();
            Err(e)
        }
    }
}

/// Move the detail table to another page. Summary figures stay put; only the
/// visible rows are re-fetched.
pub async fn report_change_page(state: &AppState, arg0: Option<Value>) -> Result<Value, String> {
    let payload: PageChangePayload =
        serde_json::from_value(arg0.unwrap_or_else(|| serde_json::json!({})))
            .map_err(|e| format!("Invalid page payload: {e}"))?;
    let client = PlatformClient::from_storage()?;

    let (from, to, branch_id, page_number, ticket) = {
        let mut view = state.reports.lock().map_err(|e| e.to_string())?;
        let (from, to) = view.validate_range()?;
        if !view.pagination.set_page(payload.page) {
            return Ok(view.snapshot());
        }
        view.loading = true;
        (
            from,
            to,
            view.branch_id,
            view.pagination.current_page,
            view.guard.begin(),
        )
    };

    let page_result = report::fetch_page(
        &client,
        &from,
        &to,
        branch_id,
        page_number,
        REPORT_PAGE_SIZE,
    )
    .await;

    let mut view = state.reports.lock().map_err(|e| e.to_string())?;
    if !view.guard.is_current(ticket) {
        return Ok(serde_json::json!({ "stale": true }));
    }
    view.loading = false;

    match page_result {
        Ok(page) => {
            view.apply_page(ticket, page);
            Ok(view.snapshot())
        }
        Err(e) => {
            view.reset_results();
            Err(e)
        }
    }
}

/// Fetch one order's full record for the details drill-down.
pub async fn report_order_detail(_state: &AppState, arg0: Option<Value>) -> Result<Value, String> {
    let payload = arg0.unwrap_or_else(|| serde_json::json!({}));
    let order_id = crate::value_i64(&payload, &["orderId", "order_id", "id"])
        .ok_or("Missing orderId")?;
    let client = PlatformClient::from_storage()?;
    report::fetch_order_detail(&client, order_id).await
}

/// Build the printable report document from a fresh full-range fetch.
///
/// Re-entrancy is guarded: a second print request while one is being
/// prepared is rejected, mirroring the disabled print button.
pub async fn report_build_print_document(
    state: &AppState,
    _arg0: Option<Value>,
) -> Result<Value, String> {
    let client = PlatformClient::from_storage()?;

    let (from, to, branch_id, branch_name) = {
        let mut view = state.reports.lock().map_err(|e| e.to_string())?;
        let (from, to) = view.validate_range()?;
        if view.print_in_progress {
            return Err("Print already in progress".into());
        }
        view.print_in_progress = true;
        (from, to, view.branch_id, view.branch_name.clone())
    };

    let stats_result = report::fetch_all_for_stats(&client, &from, &to, branch_id).await;

    let mut view = state.reports.lock().map_err(|e| e.to_string())?;
    view.print_in_progress = false;

    let stats = stats_result?;
    let summary = compute_summary(&stats.data, &from, &to, stats.total_price);
    let document = render_printable(&summary, &stats.data, &branch_name, &from, &to)
        .map_err(|e| e.to_string())?;

    // Keep the view in sync with what was just printed.
    view.summary = summary;
    view.all_rows = stats.data;

    Ok(serde_json::json!({ "document": document }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::{DeliveryFee, OrderStatus};

    fn record(id: i64, total: f64) -> OrderRecord {
        OrderRecord {
            id,
            order_number: None,
            customer_name: None,
            delivery_fee: Some(DeliveryFee { fee: 0.0 }),
            items: Vec::new(),
            total_before_fee: total,
            total_discount: 0.0,
            total_with_fee: total,
            status: OrderStatus::Completed,
            created_at: None,
        }
    }

    fn page(rows: Vec<OrderRecord>, total_items: u64, total_pages: u32) -> ReportPage {
        let total_price = rows.iter().map(|r| r.total_with_fee).sum();
        ReportPage {
            data: rows,
            total_items,
            total_pages,
            total_price,
        }
    }

    #[test]
    fn range_validation_rejects_missing_and_inverted_bounds() {
        let mut view = ReportsView::default();
        assert_eq!(view.validate_range(), Err("Missing date range".into()));

        view.date_from = "2025-04-10".into();
        view.date_to = "2025-04-01".into();
        assert_eq!(view.validate_range(), Err("Inverted date range".into()));

        view.date_to = "2025-04-30".into();
        assert!(view.validate_range().is_ok());

        view.date_from = "10/04/2025".into();
        assert!(view.validate_range().unwrap_err().contains("Invalid start date"));
    }

    #[test]
    fn stale_completions_are_dropped() {
        let mut view = ReportsView::default();
        view.date_from = "2025-04-01".into();
        view.date_to = "2025-04-30".into();

        let first = view.guard.begin();
        let second = view.guard.begin();

        // The slow first response arrives after the second fetch started.
        assert!(!view.apply_results(first, page(vec![record(1, 10.0)], 1, 1), page(vec![], 0, 0)));
        assert!(view.rows.is_empty());

        assert!(view.apply_results(
            second,
            page(vec![record(2, 20.0)], 1, 1),
            page(vec![record(2, 20.0)], 1, 1),
        ));
        assert_eq!(view.rows.len(), 1);
        assert_eq!(view.rows[0].id, 2);
        assert_eq!(view.summary.total_orders, 1);
    }

    #[test]
    fn applying_results_recomputes_summary_from_the_stats_set() {
        let mut view = ReportsView::default();
        view.date_from = "2025-04-01".into();
        view.date_to = "2025-04-30".into();
        let ticket = view.guard.begin();

        let detail = page(vec![record(1, 10.0)], 25, 3);
        let stats = page(vec![record(1, 10.0), record(2, 30.0)], 25, 1);
        assert!(view.apply_results(ticket, detail, stats));

        assert_eq!(view.pagination.total_pages, 3);
        assert_eq!(view.summary.total_sales, 40.0);
        assert_eq!(view.summary.total_orders, 2);
        assert_eq!(view.all_rows.len(), 2);
    }

    #[test]
    fn page_change_keeps_summary_figures() {
        let mut view = ReportsView::default();
        view.date_from = "2025-04-01".into();
        view.date_to = "2025-04-30".into();
        let ticket = view.guard.begin();
        view.apply_results(
            ticket,
            page(vec![record(1, 10.0)], 25, 3),
            page(vec![record(1, 10.0), record(2, 30.0)], 25, 1),
        );

        let ticket = view.guard.begin();
        assert!(view.apply_page(ticket, page(vec![record(3, 5.0)], 25, 3)));
        assert_eq!(view.rows[0].id, 3);
        // Figures still come from the full-range fetch.
        assert_eq!(view.summary.total_sales, 40.0);
        assert_eq!(view.all_rows.len(), 2);
    }

    #[test]
    fn reset_clears_everything_fetched() {
        let mut view = ReportsView::default();
        view.date_from = "2025-04-01".into();
        view.date_to = "2025-04-30".into();
        let ticket = view.guard.begin();
        view.apply_results(
            ticket,
            page(vec![record(1, 10.0)], 1, 1),
            page(vec![record(1, 10.0)], 1, 1),
        );

        view.reset_results();
        assert!(view.rows.is_empty());
        assert!(view.all_rows.is_empty());
        assert_eq!(view.summary.total_orders, 0);
        assert_eq!(view.pagination.total_pages, 0);
    }

    #[test]
    fn branch_filter_resolves_sentinels_to_none() {
        assert_eq!(resolve_branch_filter(Some(&serde_json::json!(7))), Some(7));
        assert_eq!(resolve_branch_filter(Some(&serde_json::json!("7"))), Some(7));
        assert_eq!(resolve_branch_filter(Some(&serde_json::json!("all"))), None);
        assert_eq!(resolve_branch_filter(Some(&serde_json::json!(0))), None);
        assert_eq!(resolve_branch_filter(None), None);
    }

    #[test]
    fn snapshot_exposes_page_labels() {
        let mut view = ReportsView::default();
        view.date_from = "2025-04-01".into();
        view.date_to = "2025-04-30".into();
        let ticket = view.guard.begin();
        view.apply_results(
            ticket,
            page(vec![record(1, 10.0)], 100, 10),
            page(vec![record(1, 10.0)], 100, 1),
        );
        view.pagination.set_page(5);

        let snapshot = view.snapshot();
        let labels = snapshot
            .get("pageLabels")
            .and_then(Value::as_array)
            .expect("labels");
        assert_eq!(labels.first(), Some(&Value::from(1u32)));
        assert_eq!(labels.last(), Some(&Value::from(10u32)));
        assert!(labels.contains(&Value::from("ellipsis")));
    }
}

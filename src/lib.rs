//! Sufra Desk - desktop client core for the Sufra restaurant platform.
//!
//! Presentation logic, form orchestration, and client-side state for the
//! platform's desktop client: customer-facing branch browsing, the admin
//! console (users, branches, item discounts), the cashier screen, and sales
//! reporting. All business rules (persistence, authorization, discount
//! computation, order totals) live behind the platform's HTTP API; this
//! crate shapes requests, synchronizes view state, and renders the printable
//! sales report.
//!
//! A shell binds the functions in [`commands`] to its invoke bridge. The
//! crate keeps no module-level singletons: everything lives in [`AppState`].

use std::path::Path;
use std::sync::Mutex;

use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub mod api;
pub mod auth;
pub mod commands;
pub mod db;
pub mod format;
pub mod navigation;
pub mod notify;
pub mod print;
pub mod report;
pub mod storage;
pub mod timeshift;

use commands::cashier::CartState;
use commands::reports::ReportsView;

// ---------------------------------------------------------------------------
// Shared JSON payload helpers
// ---------------------------------------------------------------------------

pub(crate) fn value_str(v: &serde_json::Value, keys: &[&str]) -> Option<String> {
    for key in keys {
        if let Some(s) = v.get(*key).and_then(|x| x.as_str()) {
            let trimmed = s.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    None
}

pub(crate) fn value_f64(v: &serde_json::Value, keys: &[&str]) -> Option<f64> {
    for key in keys {
        if let Some(n) = v.get(*key).and_then(|x| x.as_f64()) {
            return Some(n);
        }
    }
    None
}

pub(crate) fn value_i64(v: &serde_json::Value, keys: &[&str]) -> Option<i64> {
    for key in keys {
        if let Some(n) = v.get(*key).and_then(|x| x.as_i64()) {
            return Some(n);
        }
    }
    None
}

// ---------------------------------------------------------------------------
// App state
// ---------------------------------------------------------------------------

/// Everything the command layer operates on. One instance per running shell.
pub struct AppState {
    pub db: db::DbState,
    pub session: auth::SessionState,
    pub reports: Mutex<ReportsView>,
    pub cart: Mutex<CartState>,
}

impl AppState {
    /// Open the local database under `data_dir` and start with empty view
    /// state.
    pub fn new(data_dir: &Path) -> anyhow::Result<Self> {
        let db_state = db::init(data_dir).map_err(|e| anyhow::anyhow!(e))?;
        Ok(Self {
            db: db_state,
            session: auth::SessionState::new(),
            reports: Mutex::new(ReportsView::default()),
            cart: Mutex::new(CartState::default()),
        })
    }
}

// ---------------------------------------------------------------------------
// Logging
// ---------------------------------------------------------------------------

/// Initialize structured logging (console + rolling daily file).
///
/// The returned guard flushes the file writer; keep it alive for the process
/// lifetime.
pub fn init_tracing(log_dir: &Path) -> anyhow::Result<tracing_appender::non_blocking::WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("info,sufra_desk=debug"));

    std::fs::create_dir_all(log_dir)?;
    let file_appender = tracing_appender::rolling::daily(log_dir, "sufra-desk");
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true);
    let console_layer = fmt::layer().with_target(true);
    tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| anyhow::anyhow!("tracing init: {e}"))?;

    info!("Sufra Desk core v{} ready", env!("CARGO_PKG_VERSION"));
    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn value_helpers_pick_the_first_present_key() {
        let payload = serde_json::json!({
            "branchId": 4,
            "name": "  فرع  ",
            "empty": "   ",
            "fee": 12.5,
        });
        assert_eq!(value_i64(&payload, &["branch_id", "branchId"]), Some(4));
        assert_eq!(value_str(&payload, &["name"]).as_deref(), Some("فرع"));
        assert_eq!(
            value_str(&payload, &["empty", "name"]).as_deref(),
            Some("فرع")
        );
        assert_eq!(value_f64(&payload, &["fee"]), Some(12.5));
        assert_eq!(value_i64(&payload, &["missing"]), None);
    }

    #[test]
    fn app_state_opens_a_fresh_database() {
        let dir = std::env::temp_dir().join(format!("sufra-desk-test-{}", uuid::Uuid::new_v4()));
        let state = AppState::new(&dir).expect("app state");
        {
            let conn = state.db.conn.lock().expect("db lock");
            db::set_setting(&conn, "ui", "mode", "wide").expect("write setting");
            assert_eq!(db::get_setting(&conn, "ui", "mode").as_deref(), Some("wide"));
        }
        drop(state);
        let _ = std::fs::remove_dir_all(&dir);
    }
}

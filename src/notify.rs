//! User notification model.
//!
//! Validation and network failures surface as timed, dismissible
//! notifications. Narrow viewports get a centered modal dialog, wide ones a
//! corner toast; the choice follows the audience's device mix, not a safety
//! property. The shell renders these; this module only decides the message,
//! severity, presentation, and auto-dismiss timing.

use serde::Serialize;

use crate::api;

/// Viewport width below which notifications render as a modal dialog.
pub const MOBILE_BREAKPOINT_PX: u32 = 768;

const SUCCESS_DISMISS_MS: u32 = 2_500;
const ERROR_DISMISS_MS: u32 = 4_000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Success,
    Warning,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayMode {
    Modal,
    Toast,
}

/// Presentation for the given viewport width.
pub fn display_mode_for_width(viewport_width: u32) -> DisplayMode {
    if viewport_width < MOBILE_BREAKPOINT_PX {
        DisplayMode::Modal
    } else {
        DisplayMode::Toast
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub severity: Severity,
    pub message: String,
    pub display: DisplayMode,
    pub auto_dismiss_ms: u32,
}

impl Notification {
    pub fn success(message: impl Into<String>, viewport_width: u32) -> Self {
        Self {
            severity: Severity::Success,
            message: message.into(),
            display: display_mode_for_width(viewport_width),
            auto_dismiss_ms: SUCCESS_DISMISS_MS,
        }
    }

    pub fn error(message: impl Into<String>, viewport_width: u32) -> Self {
        Self {
            severity: Severity::Error,
            message: message.into(),
            display: display_mode_for_width(viewport_width),
            auto_dismiss_ms: ERROR_DISMISS_MS,
        }
    }

    /// Map a failed platform request to the user-facing message: 404 means
    /// the range simply has no data, 400 a bad request, anything else a
    /// generic failure.
    pub fn from_api_failure(error_message: &str, viewport_width: u32) -> Self {
        let message = match api::status_from_error(error_message) {
            Some(404) => "لا توجد بيانات في الفترة المحددة",
            Some(400) => "طلب غير صالح، تحقق من المدخلات",
            _ => "حدث خطأ أثناء الاتصال بالخادم",
        };
        Self::error(message, viewport_width)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrow_viewports_get_modals_wide_get_toasts() {
        assert_eq!(display_mode_for_width(360), DisplayMode::Modal);
        assert_eq!(display_mode_for_width(MOBILE_BREAKPOINT_PX), DisplayMode::Toast);
        assert_eq!(display_mode_for_width(1920), DisplayMode::Toast);
    }

    #[test]
    fn notifications_are_timed() {
        let ok = Notification::success("تم الحفظ", 1024);
        assert_eq!(ok.severity, Severity::Success);
        assert!(ok.auto_dismiss_ms > 0);

        let err = Notification::error("فشل", 360);
        assert_eq!(err.display, DisplayMode::Modal);
        assert!(err.auto_dismiss_ms > ok.auto_dismiss_ms);
    }

    #[test]
    fn api_failures_map_by_http_status() {
        let not_found = Notification::from_api_failure("Platform endpoint not found (HTTP 404)", 1024);
        assert_eq!(not_found.message, "لا توجد بيانات في الفترة المحددة");

        let bad_request = Notification::from_api_failure("Invalid request (HTTP 400)", 1024);
        assert_eq!(bad_request.message, "طلب غير صالح، تحقق من المدخلات");

        let generic = Notification::from_api_failure("Connection to x timed out", 1024);
        assert_eq!(generic.message, "حدث خطأ أثناء الاتصال بالخادم");
        assert_eq!(generic.severity, Severity::Error);
    }
}

//! Platform API client.
//!
//! Authenticated HTTP communication with the Sufra platform: branch and user
//! administration, order submission, the order-report range endpoint, and
//! connectivity testing. All persistence and business rules live behind this
//! API; the client only shapes requests and maps failures to user-friendly
//! messages.

use base64::engine::general_purpose::STANDARD as BASE64_STANDARD;
use base64::Engine as _;
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::time::{Duration, Instant};
use tracing::info;

use crate::storage;

/// Default timeout for API requests (30 seconds).
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Timeout used specifically for the lightweight connectivity test.
const CONNECTIVITY_TIMEOUT: Duration = Duration::from_secs(10);

// ---------------------------------------------------------------------------
// URL normalisation
// ---------------------------------------------------------------------------

/// Normalise the platform URL:
/// - strip trailing slashes
/// - strip a trailing `/api` segment
/// - ensure a scheme is present (https, or http for localhost)
pub fn normalize_platform_url(url: &str) -> String {
    let mut url = url.trim().to_string();

    if !url.starts_with("http://") && !url.starts_with("https://") {
        if url.starts_with("localhost") || url.starts_with("127.0.0.1") {
            url = format!("http://{url}");
        } else {
            url = format!("https://{url}");
        }
    }

    while url.ends_with('/') {
        url.pop();
    }

    if url.ends_with("/api") {
        url.truncate(url.len() - 4);
    }

    while url.ends_with('/') {
        url.pop();
    }

    url
}

// ---------------------------------------------------------------------------
// Connection-string pairing
// ---------------------------------------------------------------------------

/// A pairing connection string is either a raw JSON object or a base64url
/// blob of one, carrying the platform URL, terminal API key, and terminal id.
fn decode_connection_string_payload(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if trimmed.starts_with('{') {
        return serde_json::from_str::<Value>(trimmed).ok();
    }

    let compact: String = trimmed.chars().filter(|c| !c.is_whitespace()).collect();
    if compact.starts_with('{') {
        return serde_json::from_str::<Value>(&compact).ok();
    }
    if compact.len() < 20 {
        return None;
    }

    let base64 = compact.replace('-', "+").replace('_', "/");
    let padded = format!(
        "{}{}",
        base64,
        "=".repeat((4usize.wrapping_sub(base64.len() % 4)) % 4)
    );
    let decoded = BASE64_STANDARD.decode(padded).ok()?;
    serde_json::from_slice::<Value>(&decoded).ok()
}

pub fn extract_api_key_from_connection_string(raw: &str) -> Option<String> {
    decode_connection_string_payload(raw)
        .and_then(|v| {
            v.get("key")
                .and_then(Value::as_str)
                .map(|s| s.trim().to_string())
        })
        .filter(|s| !s.is_empty())
}

pub fn extract_platform_url_from_connection_string(raw: &str) -> Option<String> {
    decode_connection_string_payload(raw)
        .and_then(|v| {
            v.get("url")
                .and_then(Value::as_str)
                .map(normalize_platform_url)
        })
        .filter(|s| !s.is_empty())
}

pub fn extract_terminal_id_from_connection_string(raw: &str) -> Option<String> {
    decode_connection_string_payload(raw)
        .and_then(|v| {
            v.get("tid")
                .or_else(|| v.get("terminalId"))
                .and_then(Value::as_str)
                .map(|s| s.trim().to_string())
        })
        .filter(|s| !s.is_empty())
}

// ---------------------------------------------------------------------------
// Error mapping
// ---------------------------------------------------------------------------

/// Convert a `reqwest::Error` into a user-friendly message.
fn friendly_error(url: &str, err: &reqwest::Error) -> String {
    if err.is_connect() {
        return format!("Cannot reach the platform at {url}");
    }
    if err.is_timeout() {
        return format!("Connection to {url} timed out");
    }
    if err.is_builder() {
        return format!("Invalid platform URL: {url}");
    }
    format!("Network error communicating with {url}: {err}")
}

/// Convert an HTTP status code into a user-friendly message.
fn status_error(status: StatusCode) -> String {
    match status.as_u16() {
        400 => "Invalid request".to_string(),
        401 => "API key is invalid or expired".to_string(),
        403 => "Terminal not authorized".to_string(),
        404 => "Platform endpoint not found".to_string(),
        s if s >= 500 => format!("Platform server error (HTTP {s})"),
        s => format!("Unexpected response from the platform (HTTP {s})"),
    }
}

/// HTTP status of a failed request, when one is encoded in the message.
/// Failure strings carry `(HTTP nnn)` so views can branch on the status
/// without a structured error type crossing the command boundary.
pub fn status_from_error(message: &str) -> Option<u16> {
    let (_, tail) = message.split_once("(HTTP ")?;
    let digits: String = tail.chars().take_while(|c| c.is_ascii_digit()).collect();
    digits.parse().ok()
}

// ---------------------------------------------------------------------------
// Client
// ---------------------------------------------------------------------------

/// Authenticated handle to the platform API. Cheap to construct; the
/// underlying `reqwest::Client` is built per request with an explicit
/// timeout.
#[derive(Debug, Clone)]
pub struct PlatformClient {
    base_url: String,
    api_key: String,
    terminal_id: String,
}

impl PlatformClient {
    pub fn new(platform_url: &str, api_key: &str, terminal_id: &str) -> Self {
        let resolved_api_key = extract_api_key_from_connection_string(api_key)
            .unwrap_or_else(|| api_key.trim().to_string());
        Self {
            base_url: normalize_platform_url(platform_url),
            api_key: resolved_api_key,
            terminal_id: terminal_id.trim().to_string(),
        }
    }

    /// Build a client from the paired credentials in the OS keyring.
    pub fn from_storage() -> Result<Self, String> {
        let platform_url = storage::get_credential(storage::KEY_PLATFORM_URL)
            .ok_or("Terminal not configured: missing platform URL")?;
        let api_key = storage::get_credential(storage::KEY_API_KEY)
            .ok_or("Terminal not configured: missing API key")?;
        let terminal_id = storage::get_credential(storage::KEY_TERMINAL_ID).unwrap_or_default();
        Ok(Self::new(&platform_url, &api_key, &terminal_id))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Perform an authenticated JSON request.
    ///
    /// `path` includes the leading slash, e.g. `/api/reports/orders`.
    /// Returns the JSON body, or `Null` for empty 204 responses.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        body: Option<&Value>,
    ) -> Result<Value, String> {
        let full_url = format!("{}{path}", self.base_url);

        let client = Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()
            .map_err(|e| format!("Failed to create HTTP client: {e}"))?;

        let mut req = client
            .request(method, &full_url)
            .header("X-Sufra-Api-Key", &self.api_key)
            .header("x-terminal-id", &self.terminal_id)
            .header("Content-Type", "application/json");
        if let Some(b) = body {
            req = req.json(b);
        }

        let resp = req
            .send()
            .await
            .map_err(|e| friendly_error(&self.base_url, &e))?;
        let status = resp.status();

        if !status.is_success() {
            // Preserve validation details the platform includes in the body.
            let body_text = resp.text().await.unwrap_or_default();
            let detail = if let Ok(json) = serde_json::from_str::<Value>(&body_text) {
                let message = json
                    .get("error")
                    .or_else(|| json.get("message"))
                    .and_then(Value::as_str)
                    .map(|s| s.to_string())
                    .unwrap_or_else(|| status_error(status));
                format!("{message} (HTTP {})", status.as_u16())
            } else if !body_text.trim().is_empty() {
                format!(
                    "{} (HTTP {}): {}",
                    status_error(status),
                    status.as_u16(),
                    body_text.trim()
                )
            } else {
                format!("{} (HTTP {})", status_error(status), status.as_u16())
            };
            return Err(detail);
        }

        let body_text = resp.text().await.unwrap_or_default();
        if body_text.is_empty() {
            return Ok(Value::Null);
        }
        serde_json::from_str(&body_text).map_err(|e| format!("Invalid JSON from the platform: {e}"))
    }

    pub async fn get(&self, path: &str) -> Result<Value, String> {
        self.request(Method::GET, path, None).await
    }

    pub async fn post(&self, path: &str, body: &Value) -> Result<Value, String> {
        self.request(Method::POST, path, Some(body)).await
    }

    pub async fn put(&self, path: &str, body: &Value) -> Result<Value, String> {
        self.request(Method::PUT, path, Some(body)).await
    }

    pub async fn delete(&self, path: &str) -> Result<Value, String> {
        self.request(Method::DELETE, path, None).await
    }
}

// ---------------------------------------------------------------------------
// Connectivity test
// ---------------------------------------------------------------------------

/// Result of a connectivity test.
#[derive(serde::Serialize)]
pub struct ConnectivityResult {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Test connectivity to the platform with a lightweight health-check.
pub async fn test_connectivity(platform_url: &str, api_key: &str) -> ConnectivityResult {
    let url = normalize_platform_url(platform_url);
    let resolved_api_key =
        extract_api_key_from_connection_string(api_key).unwrap_or_else(|| api_key.to_string());
    let health_url = format!("{url}/api/health");

    let client = match Client::builder().timeout(CONNECTIVITY_TIMEOUT).build() {
        Ok(c) => c,
        Err(e) => {
            return ConnectivityResult {
                success: false,
                latency_ms: None,
                error: Some(format!("Failed to create HTTP client: {e}")),
            };
        }
    };

    let start = Instant::now();

    let resp = match client
        .get(&health_url)
        .header("X-Sufra-Api-Key", resolved_api_key)
        .send()
        .await
    {
        Ok(r) => r,
        Err(e) => {
            return ConnectivityResult {
                success: false,
                latency_ms: None,
                error: Some(friendly_error(&url, &e)),
            };
        }
    };

    let latency = start.elapsed().as_millis() as u64;
    let status = resp.status();

    if status.is_success() {
        info!(latency_ms = latency, "connectivity test passed");
        ConnectivityResult {
            success: true,
            latency_ms: Some(latency),
            error: None,
        }
    } else {
        ConnectivityResult {
            success: false,
            latency_ms: Some(latency),
            error: Some(status_error(status)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_platform_urls() {
        assert_eq!(
            normalize_platform_url("dashboard.sufra.app"),
            "https://dashboard.sufra.app"
        );
        assert_eq!(
            normalize_platform_url("https://dashboard.sufra.app/api/"),
            "https://dashboard.sufra.app"
        );
        assert_eq!(
            normalize_platform_url("localhost:3000/"),
            "http://localhost:3000"
        );
        assert_eq!(
            normalize_platform_url("  https://x.example//  "),
            "https://x.example"
        );
    }

    #[test]
    fn decodes_json_connection_strings() {
        let raw = r#"{ "url": "https://dashboard.sufra.app", "key": "sk-123", "tid": "t-9" }"#;
        assert_eq!(
            extract_api_key_from_connection_string(raw).as_deref(),
            Some("sk-123")
        );
        assert_eq!(
            extract_platform_url_from_connection_string(raw).as_deref(),
            Some("https://dashboard.sufra.app")
        );
        assert_eq!(
            extract_terminal_id_from_connection_string(raw).as_deref(),
            Some("t-9")
        );
    }

    #[test]
    fn decodes_base64url_connection_strings() {
        let payload = r#"{"url":"dashboard.sufra.app","key":"sk-456","terminalId":"t-2"}"#;
        let encoded = BASE64_STANDARD
            .encode(payload)
            .replace('+', "-")
            .replace('/', "_")
            .trim_end_matches('=')
            .to_string();
        assert_eq!(
            extract_api_key_from_connection_string(&encoded).as_deref(),
            Some("sk-456")
        );
        assert_eq!(
            extract_platform_url_from_connection_string(&encoded).as_deref(),
            Some("https://dashboard.sufra.app")
        );
        assert_eq!(
            extract_terminal_id_from_connection_string(&encoded).as_deref(),
            Some("t-2")
        );
    }

    #[test]
    fn rejects_garbage_connection_strings() {
        assert_eq!(extract_api_key_from_connection_string("short"), None);
        assert_eq!(extract_api_key_from_connection_string(""), None);
        assert_eq!(
            extract_api_key_from_connection_string("not base64 at all ±±±±±±±±±±±±"),
            None
        );
    }

    #[test]
    fn client_resolves_connection_string_api_keys() {
        let raw = r#"{ "url": "ignored", "key": "sk-real", "tid": "t-1" }"#;
        let client = PlatformClient::new("dashboard.sufra.app", raw, "t-1");
        assert_eq!(client.base_url(), "https://dashboard.sufra.app");
        assert_eq!(client.api_key, "sk-real");
    }

    #[test]
    fn extracts_http_status_from_failure_messages() {
        assert_eq!(status_from_error("Invalid request (HTTP 400)"), Some(400));
        assert_eq!(status_from_error("no data (HTTP 404): details"), Some(404));
        assert_eq!(status_from_error("Connection timed out"), None);
    }

    #[tokio::test]
    async fn connectivity_failure_is_reported_not_raised() {
        // Port 9 (discard) is not listening; the test must fail fast with a
        // friendly message, never panic.
        let result = test_connectivity("http://127.0.0.1:9", "sk-test").await;
        assert!(!result.success);
        assert!(result.error.is_some());
    }
}

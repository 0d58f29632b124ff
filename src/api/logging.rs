use serde_json::Value;
use std::fs::OpenOptions;
use std::io::{IsTerminal, Write};

use crate::util::{mask_api_key, parse_bool_str};

const DEFAULT_API_LOG_PATH: &str = "/tmp/sqlscout-api.log";
const DEBUG_PAYLOAD_ENV: &str = "SQLSCOUT_DEBUG_PAYLOAD";
const API_LOG_PATH_ENV: &str = "SQLSCOUT_API_LOG_PATH";

pub fn debug_payload_enabled() -> bool {
    std::env::var(DEBUG_PAYLOAD_ENV)
        .ok()
        .and_then(|v| parse_bool_str(&v))
        .unwrap_or(false)
}

pub fn emit_debug_payload(request_url: &str, api_key: Option<&str>, payload: &Value) {
    let credential = api_key.map_or_else(|| "<none>".to_string(), mask_api_key);
    let formatted_payload = serde_json::to_string_pretty(payload)
        .unwrap_or_else(|_| "<payload serialization error>".to_string());
    let message = format!(
        "SQLSCOUT DEBUG payload_request url={request_url} key={credential}\npayload:\n{formatted_payload}\n"
    );
    emit_log_message(&message);
}

pub fn emit_frame_parse_error(event_type: &str, data: &str, parse_error: &serde_json::Error) {
    let message = format!(
        "SQLSCOUT ERROR frame_parse_failed error={parse_error}\nevent_type={event_type}\ndata:\n{data}\n"
    );
    emit_log_message(&message);
}

pub fn emit_orphan_tool_result(tool: &str) {
    let message = format!("SQLSCOUT WARN orphan_tool_result tool={tool} (no matching tool_start)\n");
    emit_log_message(&message);
}

fn emit_log_message(message: &str) {
    if let Some(path) = resolve_log_path() {
        if append_log_file(&path, message).is_ok() {
            return;
        }
    }

    eprintln!("{message}");
}

fn resolve_log_path() -> Option<String> {
    std::env::var(API_LOG_PATH_ENV)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .or_else(|| {
            if std::io::stderr().is_terminal() {
                Some(DEFAULT_API_LOG_PATH.to_string())
            } else {
                None
            }
        })
}

fn append_log_file(path: &str, message: &str) -> std::io::Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(message.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_payload_enabled_accepts_true_variants() {
        let _env_lock = crate::test_support::ENV_LOCK.blocking_lock();
        std::env::set_var(DEBUG_PAYLOAD_ENV, "1");
        assert!(debug_payload_enabled());
        std::env::set_var(DEBUG_PAYLOAD_ENV, "TRUE");
        assert!(debug_payload_enabled());
        std::env::set_var(DEBUG_PAYLOAD_ENV, "off");
        assert!(!debug_payload_enabled());
        std::env::remove_var(DEBUG_PAYLOAD_ENV);
    }

    #[test]
    fn test_resolve_log_path_uses_api_log_path() {
        let _env_lock = crate::test_support::ENV_LOCK.blocking_lock();
        std::env::set_var(API_LOG_PATH_ENV, "/tmp/test-sqlscout.log");
        assert_eq!(resolve_log_path().as_deref(), Some("/tmp/test-sqlscout.log"));
        std::env::remove_var(API_LOG_PATH_ENV);
    }

    #[test]
    fn test_append_log_file_appends() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("api.log");
        let path = path.to_string_lossy().to_string();

        append_log_file(&path, "first\n").expect("first write");
        append_log_file(&path, "second\n").expect("second write");

        let contents = std::fs::read_to_string(&path).expect("read log");
        assert_eq!(contents, "first\nsecond\n");
    }
}

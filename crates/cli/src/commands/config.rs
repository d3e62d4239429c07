use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use leadline_core::config::{AppConfig, LoadOptions};
use secrecy::ExposeSecret;
use toml::Value;

pub fn run() -> String {
    let config = match AppConfig::load(LoadOptions::default()) {
        Ok(config) => config,
        Err(error) => return format!("config validation failed: {error}"),
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());
    let source = |key_path: &str, env_keys: &[&str]| {
        field_source(key_path, env_keys, config_file_doc.as_ref(), config_file_path.as_deref())
    };

    let mut lines = vec!["effective config (source precedence: env > file > default):".to_string()];

    lines.push(render_line(
        "business.name",
        &config.business.name,
        source("business.name", &["LEADLINE_BUSINESS_NAME"]),
    ));
    lines.push(render_line(
        "business.phone",
        &config.business.phone,
        source("business.phone", &["LEADLINE_BUSINESS_PHONE"]),
    ));
    lines.push(render_line(
        "business.scheduling_url",
        &config.business.scheduling_url,
        source("business.scheduling_url", &["LEADLINE_BUSINESS_SCHEDULING_URL"]),
    ));

    lines.push(render_line(
        "dialog.typing_delay_ms",
        &format!("{}..={}", config.dialog.typing_delay_min_ms, config.dialog.typing_delay_max_ms),
        source(
            "dialog.typing_delay_min_ms",
            &["LEADLINE_DIALOG_TYPING_DELAY_MIN_MS", "LEADLINE_DIALOG_TYPING_DELAY_MAX_MS"],
        ),
    ));
    lines.push(render_line(
        "dialog.submission_delay_ms",
        &config.dialog.submission_delay_ms.to_string(),
        source("dialog.submission_delay_ms", &["LEADLINE_DIALOG_SUBMISSION_DELAY_MS"]),
    ));
    lines.push(render_line(
        "dialog.session_cache_key",
        &config.dialog.session_cache_key,
        source("dialog.session_cache_key", &["LEADLINE_DIALOG_SESSION_CACHE_KEY"]),
    ));

    lines.push(render_line(
        "booking.api_key",
        &redact_key(config.booking.api_key.as_ref().map(|key| key.expose_secret())),
        source("booking.api_key", &["LEADLINE_BOOKING_API_KEY", "CAL_API_KEY"]),
    ));
    lines.push(render_line(
        "booking.api_base_url",
        &config.booking.api_base_url,
        source("booking.api_base_url", &["LEADLINE_BOOKING_API_BASE_URL"]),
    ));
    lines.push(render_line(
        "booking.default_time_zone",
        &config.booking.default_time_zone,
        source("booking.default_time_zone", &["LEADLINE_BOOKING_DEFAULT_TIME_ZONE"]),
    ));

    lines.push(render_line(
        "database.url",
        &config.database.url,
        source("database.url", &["LEADLINE_DATABASE_URL"]),
    ));
    lines.push(render_line(
        "database.max_connections",
        &config.database.max_connections.to_string(),
        source("database.max_connections", &["LEADLINE_DATABASE_MAX_CONNECTIONS"]),
    ));

    lines.push(render_line(
        "server.bind_address",
        &config.server.bind_address,
        source("server.bind_address", &["LEADLINE_SERVER_BIND_ADDRESS"]),
    ));
    lines.push(render_line(
        "server.port",
        &config.server.port.to_string(),
        source("server.port", &["LEADLINE_SERVER_PORT"]),
    ));

    lines.push(render_line(
        "logging.level",
        &config.logging.level,
        source("logging.level", &["LEADLINE_LOGGING_LEVEL", "LEADLINE_LOG_LEVEL"]),
    ));
    lines.push(render_line(
        "logging.format",
        &format!("{:?}", config.logging.format),
        source("logging.format", &["LEADLINE_LOGGING_FORMAT", "LEADLINE_LOG_FORMAT"]),
    ));

    lines.join("\n")
}

fn detect_config_path() -> Option<PathBuf> {
    let root = PathBuf::from("leadline.toml");
    if root.exists() {
        return Some(root);
    }

    let nested = PathBuf::from("config/leadline.toml");
    if nested.exists() {
        return Some(nested);
    }

    None
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    env_keys: &[&str],
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    if let Some(env_key) = env_keys.iter().find(|key| env::var_os(key).is_some()) {
        return format!("env ({env_key})");
    }

    if let Some(doc) = config_file_doc {
        if contains_path(doc, key_path) {
            let file_path = config_file_path
                .map(|path| path.display().to_string())
                .unwrap_or_else(|| "config file".to_string());
            return format!("file ({file_path})");
        }
    }

    "default".to_string()
}

fn contains_path(root: &Value, key_path: &str) -> bool {
    let mut current = root;
    for key in key_path.split('.') {
        let Some(next) = current.get(key) else {
            return false;
        };
        current = next;
    }
    true
}

fn render_line(key: &str, value: &str, source: String) -> String {
    format!("- {key} = {value} (source: {source})")
}

fn redact_key(key: Option<&str>) -> String {
    match key.map(str::trim) {
        None => "<unset>".to_string(),
        Some("") => "<empty>".to_string(),
        Some(key) => match key.split_once('_') {
            Some((prefix, _)) => format!("{prefix}_***"),
            None => "<redacted>".to_string(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::redact_key;

    #[test]
    fn booking_key_keeps_only_its_prefix() {
        assert_eq!(redact_key(Some("cal_live_0123456789")), "cal_***");
        assert_eq!(redact_key(Some("abcdef")), "<redacted>");
        assert_eq!(redact_key(Some("  ")), "<empty>");
        assert_eq!(redact_key(None), "<unset>");
    }
}

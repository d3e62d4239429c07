use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug, Default)]
pub struct AppConfig {
    pub business: BusinessConfig,
    pub dialog: DialogConfig,
    pub booking: BookingConfig,
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub logging: LoggingConfig,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct BusinessConfig {
    pub name: String,
    pub phone: String,
    pub email: String,
    pub address: String,
    pub hours: String,
    pub scheduling_url: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DialogConfig {
    pub typing_delay_min_ms: u64,
    pub typing_delay_max_ms: u64,
    pub submission_delay_ms: u64,
    pub session_cache_key: String,
    pub business_hours_start: u32,
    pub business_hours_end: u32,
    pub utc_offset_hours: i32,
}

#[derive(Clone, Debug)]
pub struct BookingConfig {
    pub api_key: Option<SecretString>,
    pub api_base_url: String,
    pub timeout_secs: u64,
    pub default_time_zone: String,
}

#[derive(Clone, Debug)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct ServerConfig {
    pub bind_address: String,
    pub port: u16,
    pub graceful_shutdown_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    Compact,
    Pretty,
    Json,
}

#[derive(Clone, Debug, Default)]
pub struct ConfigOverrides {
    pub database_url: Option<String>,
    pub log_level: Option<String>,
    pub server_port: Option<u16>,
    pub booking_api_key: Option<String>,
    pub booking_api_base_url: Option<String>,
    pub scheduling_url: Option<String>,
}

#[derive(Clone, Debug, Default)]
pub struct LoadOptions {
    pub config_path: Option<PathBuf>,
    pub require_file: bool,
    pub overrides: ConfigOverrides,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("could not read config file `{path}`: {source}")]
    ReadFile { path: PathBuf, source: std::io::Error },
    #[error("could not parse config file `{path}`: {source}")]
    ParseFile { path: PathBuf, source: toml::de::Error },
    #[error("required config file was not found: `{0}`")]
    MissingConfigFile(PathBuf),
    #[error("environment variable interpolation failed for `{var}`")]
    MissingEnvInterpolation { var: String },
    #[error("unterminated environment interpolation expression")]
    UnterminatedInterpolation,
    #[error("invalid environment override for `{key}`: `{value}`")]
    InvalidEnvOverride { key: String, value: String },
    #[error("configuration validation failed: {0}")]
    Validation(String),
}

impl Default for BusinessConfig {
    fn default() -> Self {
        Self {
            name: "M Alam General Construction".to_string(),
            phone: "(347) 986 4284".to_string(),
            email: "info@malamconstruction.com".to_string(),
            address: "146 20 107th Ave, Jamaica, NY 11435".to_string(),
            hours: "Open until 5 PM".to_string(),
            scheduling_url: "https://cal.com/malamconstruction/30min".to_string(),
        }
    }
}

impl Default for DialogConfig {
    fn default() -> Self {
        Self {
            typing_delay_min_ms: 400,
            typing_delay_max_ms: 1200,
            submission_delay_ms: 1500,
            session_cache_key: "leadline-chat-session".to_string(),
            business_hours_start: 8,
            business_hours_end: 17,
            utc_offset_hours: -5,
        }
    }
}

impl Default for BookingConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base_url: "https://api.cal.com".to_string(),
            timeout_secs: 15,
            default_time_zone: "America/New_York".to_string(),
        }
    }
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { url: "sqlite://leadline.db".to_string(), max_connections: 5, timeout_secs: 30 }
    }
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind_address: "127.0.0.1".to_string(), port: 8080, graceful_shutdown_secs: 15 }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self { level: "info".to_string(), format: LogFormat::Compact }
    }
}

impl BookingConfig {
    /// The configured API key, treating blank values as absent.
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_ref().map(|key| key.expose_secret()).filter(|key| !key.trim().is_empty())
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for LogFormat {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Ok(Self::Compact),
            "pretty" => Ok(Self::Pretty),
            "json" => Ok(Self::Json),
            other => Err(ConfigError::Validation(format!(
                "unsupported log format `{other}` (expected compact|pretty|json)"
            ))),
        }
    }
}

impl AppConfig {
    pub fn load(options: LoadOptions) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        let maybe_path = resolve_config_path(options.config_path.as_deref());

        if let Some(path) = maybe_path {
            let patch = read_patch(&path)?;
            config.apply_patch(patch);
        } else if options.require_file {
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("leadline.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(business) = patch.business {
            set(&mut self.business.name, business.name);
            set(&mut self.business.phone, business.phone);
            set(&mut self.business.email, business.email);
            set(&mut self.business.address, business.address);
            set(&mut self.business.hours, business.hours);
            set(&mut self.business.scheduling_url, business.scheduling_url);
        }

        if let Some(dialog) = patch.dialog {
            set(&mut self.dialog.typing_delay_min_ms, dialog.typing_delay_min_ms);
            set(&mut self.dialog.typing_delay_max_ms, dialog.typing_delay_max_ms);
            set(&mut self.dialog.submission_delay_ms, dialog.submission_delay_ms);
            set(&mut self.dialog.session_cache_key, dialog.session_cache_key);
            set(&mut self.dialog.business_hours_start, dialog.business_hours_start);
            set(&mut self.dialog.business_hours_end, dialog.business_hours_end);
            set(&mut self.dialog.utc_offset_hours, dialog.utc_offset_hours);
        }

        if let Some(booking) = patch.booking {
            if let Some(booking_api_key_value) = booking.api_key {
                self.booking.api_key = Some(secret_value(booking_api_key_value));
            }
            set(&mut self.booking.api_base_url, booking.api_base_url);
            set(&mut self.booking.timeout_secs, booking.timeout_secs);
            set(&mut self.booking.default_time_zone, booking.default_time_zone);
        }

        if let Some(database) = patch.database {
            set(&mut self.database.url, database.url);
            set(&mut self.database.max_connections, database.max_connections);
            set(&mut self.database.timeout_secs, database.timeout_secs);
        }

        if let Some(server) = patch.server {
            set(&mut self.server.bind_address, server.bind_address);
            set(&mut self.server.port, server.port);
            set(&mut self.server.graceful_shutdown_secs, server.graceful_shutdown_secs);
        }

        if let Some(logging) = patch.logging {
            set(&mut self.logging.level, logging.level);
            set(&mut self.logging.format, logging.format);
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("LEADLINE_BUSINESS_NAME") {
            self.business.name = value;
        }
        if let Some(value) = read_env("LEADLINE_BUSINESS_PHONE") {
            self.business.phone = value;
        }
        if let Some(value) = read_env("LEADLINE_BUSINESS_EMAIL") {
            self.business.email = value;
        }
        if let Some(value) = read_env("LEADLINE_BUSINESS_SCHEDULING_URL") {
            self.business.scheduling_url = value;
        }

        if let Some(value) = read_env("LEADLINE_DIALOG_TYPING_DELAY_MIN_MS") {
            self.dialog.typing_delay_min_ms =
                parse_num("LEADLINE_DIALOG_TYPING_DELAY_MIN_MS", &value)?;
        }
        if let Some(value) = read_env("LEADLINE_DIALOG_TYPING_DELAY_MAX_MS") {
            self.dialog.typing_delay_max_ms =
                parse_num("LEADLINE_DIALOG_TYPING_DELAY_MAX_MS", &value)?;
        }
        if let Some(value) = read_env("LEADLINE_DIALOG_SUBMISSION_DELAY_MS") {
            self.dialog.submission_delay_ms =
                parse_num("LEADLINE_DIALOG_SUBMISSION_DELAY_MS", &value)?;
        }
        if let Some(value) = read_env("LEADLINE_DIALOG_SESSION_CACHE_KEY") {
            self.dialog.session_cache_key = value;
        }
        if let Some(value) = read_env("LEADLINE_DIALOG_UTC_OFFSET_HOURS") {
            self.dialog.utc_offset_hours = parse_num("LEADLINE_DIALOG_UTC_OFFSET_HOURS", &value)?;
        }

        // CAL_API_KEY is what the hosting platform injects for the booking function.
        let api_key = read_env("LEADLINE_BOOKING_API_KEY").or_else(|| read_env("CAL_API_KEY"));
        if let Some(value) = api_key {
            self.booking.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("LEADLINE_BOOKING_API_BASE_URL") {
            self.booking.api_base_url = value;
        }
        if let Some(value) = read_env("LEADLINE_BOOKING_TIMEOUT_SECS") {
            self.booking.timeout_secs = parse_num("LEADLINE_BOOKING_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("LEADLINE_BOOKING_DEFAULT_TIME_ZONE") {
            self.booking.default_time_zone = value;
        }

        if let Some(value) = read_env("LEADLINE_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("LEADLINE_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_num("LEADLINE_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("LEADLINE_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_num("LEADLINE_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("LEADLINE_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("LEADLINE_SERVER_PORT") {
            self.server.port = parse_num("LEADLINE_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("LEADLINE_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_num("LEADLINE_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }

        let log_level =
            read_env("LEADLINE_LOGGING_LEVEL").or_else(|| read_env("LEADLINE_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("LEADLINE_LOGGING_FORMAT").or_else(|| read_env("LEADLINE_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        set(&mut self.database.url, overrides.database_url);
        set(&mut self.logging.level, overrides.log_level);
        set(&mut self.server.port, overrides.server_port);
        if let Some(booking_api_key) = overrides.booking_api_key {
            self.booking.api_key = Some(secret_value(booking_api_key));
        }
        set(&mut self.booking.api_base_url, overrides.booking_api_base_url);
        set(&mut self.business.scheduling_url, overrides.scheduling_url);
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_business(&self.business)?;
        validate_dialog(&self.dialog)?;
        validate_booking(&self.booking)?;
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn set<T>(slot: &mut T, value: Option<T>) {
    if let Some(value) = value {
        *slot = value;
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("leadline.toml"), PathBuf::from("config/leadline.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn read_patch(path: &Path) -> Result<ConfigPatch, ConfigError> {
    let raw = fs::read_to_string(path)
        .map_err(|source| ConfigError::ReadFile { path: path.to_path_buf(), source })?;

    let interpolated = interpolate_env_vars(&raw)?;
    toml::from_str::<ConfigPatch>(&interpolated)
        .map_err(|source| ConfigError::ParseFile { path: path.to_path_buf(), source })
}

fn interpolate_env_vars(input: &str) -> Result<String, ConfigError> {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();

    while let Some(ch) = chars.next() {
        if ch == '$' && matches!(chars.peek(), Some('{')) {
            chars.next();
            let mut key = String::new();

            loop {
                match chars.next() {
                    Some('}') => break,
                    Some(next) => key.push(next),
                    None => return Err(ConfigError::UnterminatedInterpolation),
                }
            }

            let value = env::var(&key)
                .map_err(|_| ConfigError::MissingEnvInterpolation { var: key.clone() })?;
            output.push_str(&value);
            continue;
        }

        output.push(ch);
    }

    Ok(output)
}

fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    match url::Url::parse(value.trim()) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => Ok(()),
        _ => Err(ConfigError::Validation(format!(
            "{field} must be an absolute http:// or https:// URL (got `{value}`)"
        ))),
    }
}

fn validate_business(business: &BusinessConfig) -> Result<(), ConfigError> {
    if business.name.trim().is_empty() {
        return Err(ConfigError::Validation("business.name must not be empty".to_string()));
    }
    if !business.phone.chars().any(|ch| ch.is_ascii_digit()) {
        return Err(ConfigError::Validation(
            "business.phone must contain a dialable number".to_string(),
        ));
    }
    validate_http_url("business.scheduling_url", &business.scheduling_url)
}

fn validate_dialog(dialog: &DialogConfig) -> Result<(), ConfigError> {
    if dialog.typing_delay_min_ms > dialog.typing_delay_max_ms
        || dialog.typing_delay_max_ms > 10_000
    {
        return Err(ConfigError::Validation(
            "dialog.typing_delay_min_ms must not exceed dialog.typing_delay_max_ms, which must be at most 10000"
                .to_string(),
        ));
    }

    if dialog.session_cache_key.trim().is_empty() {
        return Err(ConfigError::Validation(
            "dialog.session_cache_key must not be empty".to_string(),
        ));
    }

    if dialog.business_hours_start >= dialog.business_hours_end || dialog.business_hours_end > 24
    {
        return Err(ConfigError::Validation(
            "dialog.business_hours_start must be before dialog.business_hours_end (at most 24)"
                .to_string(),
        ));
    }

    if !(-12..=14).contains(&dialog.utc_offset_hours) {
        return Err(ConfigError::Validation(
            "dialog.utc_offset_hours must be in range -12..=14".to_string(),
        ));
    }

    Ok(())
}

fn validate_booking(booking: &BookingConfig) -> Result<(), ConfigError> {
    validate_http_url("booking.api_base_url", &booking.api_base_url)?;

    if booking.timeout_secs == 0 || booking.timeout_secs > 120 {
        return Err(ConfigError::Validation(
            "booking.timeout_secs must be in range 1..=120".to_string(),
        ));
    }

    if booking.default_time_zone.trim().is_empty() {
        return Err(ConfigError::Validation(
            "booking.default_time_zone must not be empty (e.g. `America/New_York`)".to_string(),
        ));
    }

    Ok(())
}

fn validate_database(database: &DatabaseConfig) -> Result<(), ConfigError> {
    let url = database.url.trim();
    let sqlite_url =
        url.starts_with("sqlite://") || url.starts_with("sqlite::") || url == ":memory:";
    if !sqlite_url {
        return Err(ConfigError::Validation(
            "database.url must be a sqlite URL (`sqlite://...`, `sqlite::...`, or `:memory:`)"
                .to_string(),
        ));
    }

    if database.max_connections == 0 {
        return Err(ConfigError::Validation(
            "database.max_connections must be greater than zero".to_string(),
        ));
    }

    if database.timeout_secs == 0 || database.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "database.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_server(server: &ServerConfig) -> Result<(), ConfigError> {
    if server.port == 0 {
        return Err(ConfigError::Validation("server.port must be greater than zero".to_string()));
    }

    if server.graceful_shutdown_secs == 0 {
        return Err(ConfigError::Validation(
            "server.graceful_shutdown_secs must be greater than zero".to_string(),
        ));
    }

    Ok(())
}

fn validate_logging(logging: &LoggingConfig) -> Result<(), ConfigError> {
    let level = logging.level.trim().to_ascii_lowercase();
    match level.as_str() {
        "trace" | "debug" | "info" | "warn" | "error" => Ok(()),
        _ => Err(ConfigError::Validation(
            "logging.level must be one of trace|debug|info|warn|error".to_string(),
        )),
    }
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value.trim().parse::<T>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    business: Option<BusinessPatch>,
    dialog: Option<DialogPatch>,
    booking: Option<BookingPatch>,
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    logging: Option<LoggingPatch>,
}

#[derive(Debug, Default, Deserialize)]
struct BusinessPatch {
    name: Option<String>,
    phone: Option<String>,
    email: Option<String>,
    address: Option<String>,
    hours: Option<String>,
    scheduling_url: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DialogPatch {
    typing_delay_min_ms: Option<u64>,
    typing_delay_max_ms: Option<u64>,
    submission_delay_ms: Option<u64>,
    session_cache_key: Option<String>,
    business_hours_start: Option<u32>,
    business_hours_end: Option<u32>,
    utc_offset_hours: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
struct BookingPatch {
    api_key: Option<String>,
    api_base_url: Option<String>,
    timeout_secs: Option<u64>,
    default_time_zone: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
struct DatabasePatch {
    url: Option<String>,
    max_connections: Option<u32>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct ServerPatch {
    bind_address: Option<String>,
    port: Option<u16>,
    graceful_shutdown_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

#[cfg(test)]
mod tests {
    use std::env;
    use std::fs;
    use std::io;
    use std::sync::{Mutex, OnceLock};

    use tempfile::TempDir;

    use super::{AppConfig, ConfigError, ConfigOverrides, LoadOptions, LogFormat};

    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();

    fn env_lock() -> &'static Mutex<()> {
        ENV_LOCK.get_or_init(|| Mutex::new(()))
    }

    fn clear_vars(vars: &[&str]) {
        for var in vars {
            env::remove_var(var);
        }
    }

    fn ensure(condition: bool, message: &'static str) -> Result<(), String> {
        if condition {
            Ok(())
        } else {
            Err(message.to_string())
        }
    }

    #[test]
    fn defaults_are_valid_and_describe_the_business() -> Result<(), String> {
        let config = AppConfig::default();
        config.validate().map_err(|err| err.to_string())?;
        ensure(config.business.phone == "(347) 986 4284", "default phone")?;
        ensure(config.dialog.typing_delay_min_ms == 400, "default min typing delay")?;
        ensure(config.dialog.typing_delay_max_ms == 1200, "default max typing delay")?;
        ensure(config.booking.api_key().is_none(), "api key is optional at load")?;
        ensure(config.booking.api_base_url == "https://api.cal.com", "default booking base")
    }

    #[test]
    fn file_load_supports_env_interpolation() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("TEST_LEADLINE_CAL_KEY", "cal_live_from_env");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("leadline.toml");
            fs::write(
                &path,
                r#"
[booking]
api_key = "${TEST_LEADLINE_CAL_KEY}"
timeout_secs = 5
"#,
            )
            .map_err(|err| err.to_string())?;

            let config =
                AppConfig::load(LoadOptions { config_path: Some(path), ..LoadOptions::default() })
                    .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.booking.api_key() == Some("cal_live_from_env"),
                "api key should be interpolated from environment",
            )?;
            ensure(config.booking.timeout_secs == 5, "timeout should come from the file")?;
            ensure(
                !format!("{:?}", config.booking).contains("cal_live_from_env"),
                "debug output must not leak the api key",
            )
        })();

        clear_vars(&["TEST_LEADLINE_CAL_KEY"]);
        result
    }

    #[test]
    fn logging_env_aliases_are_supported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("LEADLINE_LOG_LEVEL", "warn");
        env::set_var("LEADLINE_LOG_FORMAT", "pretty");

        let result = (|| -> Result<(), String> {
            let config = AppConfig::load(LoadOptions::default())
                .map_err(|err| format!("config load failed: {err}"))?;

            ensure(config.logging.level == "warn", "warning log level should be set from env var")?;
            ensure(
                matches!(config.logging.format, LogFormat::Pretty),
                "pretty logging format should be set from env var",
            )
        })();

        clear_vars(&["LEADLINE_LOG_LEVEL", "LEADLINE_LOG_FORMAT"]);
        result
    }

    #[test]
    fn precedence_defaults_file_env_overrides() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("LEADLINE_DATABASE_URL", "sqlite://from-env.db");
        env::set_var("LEADLINE_SERVER_PORT", "9090");

        let result = (|| -> Result<(), String> {
            let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
            let path = dir.path().join("leadline.toml");
            fs::write(
                &path,
                r#"
[database]
url = "sqlite://from-file.db"

[server]
port = 7070

[dialog]
typing_delay_min_ms = 100
typing_delay_max_ms = 200

[logging]
level = "warn"
"#,
            )
            .map_err(|err| err.to_string())?;

            let config = AppConfig::load(LoadOptions {
                config_path: Some(path),
                overrides: ConfigOverrides {
                    database_url: Some("sqlite://from-override.db".to_string()),
                    log_level: Some("debug".to_string()),
                    ..ConfigOverrides::default()
                },
                ..LoadOptions::default()
            })
            .map_err(|err| format!("config load failed: {err}"))?;

            ensure(
                config.database.url == "sqlite://from-override.db",
                "override database url should win",
            )?;
            ensure(config.logging.level == "debug", "overridden log level should be debug")?;
            ensure(config.server.port == 9090, "env port should win over file")?;
            ensure(config.dialog.typing_delay_min_ms == 100, "file typing delay should apply")
        })();

        clear_vars(&["LEADLINE_DATABASE_URL", "LEADLINE_SERVER_PORT"]);
        result
    }

    #[test]
    fn validation_fails_fast_with_actionable_error() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("LEADLINE_DIALOG_TYPING_DELAY_MIN_MS", "5000");
        env::set_var("LEADLINE_DIALOG_TYPING_DELAY_MAX_MS", "100");

        let result = (|| -> Result<(), String> {
            let error = match AppConfig::load(LoadOptions::default()) {
                Ok(_) => {
                    return Err("expected validation failure but config load succeeded".to_string())
                }
                Err(error) => error,
            };
            ensure(
                matches!(error, ConfigError::Validation(ref message) if message.contains("typing_delay")),
                "validation error should name the typing delay window",
            )
        })();

        clear_vars(&["LEADLINE_DIALOG_TYPING_DELAY_MIN_MS", "LEADLINE_DIALOG_TYPING_DELAY_MAX_MS"]);
        result
    }

    #[test]
    fn invalid_numeric_env_override_is_reported() -> Result<(), String> {
        let _guard = env_lock().lock().map_err(|_| "env lock is poisoned".to_string())?;

        env::set_var("LEADLINE_BOOKING_TIMEOUT_SECS", "soon");

        let result = match AppConfig::load(LoadOptions::default()) {
            Err(ConfigError::InvalidEnvOverride { key, .. }) => {
                ensure(key == "LEADLINE_BOOKING_TIMEOUT_SECS", "error should name the variable")
            }
            Ok(_) => Err("expected invalid override error".to_string()),
            Err(other) => Err(format!("unexpected error: {other}")),
        };

        clear_vars(&["LEADLINE_BOOKING_TIMEOUT_SECS"]);
        result
    }

    #[test]
    fn missing_required_file_is_reported() -> Result<(), String> {
        let dir = TempDir::new().map_err(|err: io::Error| err.to_string())?;
        let result = AppConfig::load(LoadOptions {
            config_path: Some(dir.path().join("absent.toml")),
            require_file: true,
            ..LoadOptions::default()
        });
        ensure(
            matches!(result, Err(ConfigError::MissingConfigFile(_))),
            "missing file should be reported when required",
        )
    }
}

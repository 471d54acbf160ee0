use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Clone, Debug)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub pdf: PdfConfig,
    pub crm: CrmConfig,
    pub llm: LlmConfig,
    pub logging: LoggingConfig,
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
    /// Deadline for the publish stage of a signing request.
    pub request_timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub root: PathBuf,
    pub public_base_url: String,
    pub template_path: PathBuf,
}

#[derive(Clone, Debug)]
pub struct PdfConfig {
    pub mode: PdfMode,
}

#[derive(Clone, Debug)]
pub struct CrmConfig {
    pub enabled: bool,
    pub api_base_url: String,
    pub api_key: Option<SecretString>,
    pub location_id: Option<String>,
    pub custom_field_label: String,
    /// Skips the custom-field lookup when set.
    pub custom_field_id: Option<String>,
    pub tag: String,
    pub timeout_secs: u64,
    pub max_retries: u32,
    pub retry_backoff_ms: u64,
}

#[derive(Clone, Debug)]
pub struct LlmConfig {
    pub enabled: bool,
    pub api_key: Option<SecretString>,
    pub base_url: String,
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Clone, Debug)]
pub struct LoggingConfig {
    pub level: String,
    pub format: LogFormat,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PdfMode {
    /// Fields stay editable and viewers regenerate appearances.
    Live,
    /// Values are drawn into the page content and the form is removed.
    Flatten,
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
    pub storage_root: Option<PathBuf>,
    pub public_base_url: Option<String>,
    pub template_path: Option<PathBuf>,
    pub pdf_mode: Option<PdfMode>,
    pub crm_enabled: Option<bool>,
    pub crm_api_base_url: Option<String>,
    pub crm_api_key: Option<String>,
    pub crm_location_id: Option<String>,
    pub crm_custom_field_id: Option<String>,
    pub llm_enabled: Option<bool>,
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

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database: DatabaseConfig {
                url: "sqlite://leadsign.db".to_string(),
                max_connections: 5,
                timeout_secs: 30,
            },
            server: ServerConfig {
                bind_address: "127.0.0.1".to_string(),
                port: 8080,
                graceful_shutdown_secs: 15,
                request_timeout_secs: 20,
            },
            storage: StorageConfig {
                root: PathBuf::from("media/nda_signed"),
                public_base_url: "http://127.0.0.1:8080/nda/signed".to_string(),
                template_path: PathBuf::from("templates/nda_template.pdf"),
            },
            pdf: PdfConfig { mode: PdfMode::Live },
            crm: CrmConfig {
                enabled: false,
                api_base_url: "https://services.leadconnectorhq.com".to_string(),
                api_key: None,
                location_id: None,
                custom_field_label: "Signed NDA".to_string(),
                custom_field_id: None,
                tag: "NDA_Signed".to_string(),
                timeout_secs: 30,
                max_retries: 2,
                retry_backoff_ms: 250,
            },
            llm: LlmConfig {
                enabled: false,
                api_key: None,
                base_url: "https://api.deepseek.com".to_string(),
                model: "deepseek-chat".to_string(),
                timeout_secs: 60,
            },
            logging: LoggingConfig { level: "info".to_string(), format: LogFormat::Compact },
        }
    }
}

fn secret_value(value: String) -> SecretString {
    value.into()
}

impl std::str::FromStr for PdfMode {
    type Err = ConfigError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "live" => Ok(Self::Live),
            "flatten" => Ok(Self::Flatten),
            other => Err(ConfigError::Validation(format!(
                "unsupported pdf mode `{other}` (expected live|flatten)"
            ))),
        }
    }
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
            let expected = options.config_path.unwrap_or_else(|| PathBuf::from("leadsign.toml"));
            return Err(ConfigError::MissingConfigFile(expected));
        }

        config.apply_env_overrides()?;
        config.apply_overrides(options.overrides);
        config.validate()?;

        Ok(config)
    }

    /// CRM credentials are present and the integration is switched on.
    pub fn crm_ready(&self) -> bool {
        self.crm.enabled
            && self.crm.api_key.as_ref().is_some_and(|key| !key.expose_secret().trim().is_empty())
    }

    fn apply_patch(&mut self, patch: ConfigPatch) {
        if let Some(database) = patch.database {
            if let Some(url) = database.url {
                self.database.url = url;
            }
            if let Some(max_connections) = database.max_connections {
                self.database.max_connections = max_connections;
            }
            if let Some(timeout_secs) = database.timeout_secs {
                self.database.timeout_secs = timeout_secs;
            }
        }

        if let Some(server) = patch.server {
            if let Some(bind_address) = server.bind_address {
                self.server.bind_address = bind_address;
            }
            if let Some(port) = server.port {
                self.server.port = port;
            }
            if let Some(graceful_shutdown_secs) = server.graceful_shutdown_secs {
                self.server.graceful_shutdown_secs = graceful_shutdown_secs;
            }
            if let Some(request_timeout_secs) = server.request_timeout_secs {
                self.server.request_timeout_secs = request_timeout_secs;
            }
        }

        if let Some(storage) = patch.storage {
            if let Some(root) = storage.root {
                self.storage.root = root;
            }
            if let Some(public_base_url) = storage.public_base_url {
                self.storage.public_base_url = public_base_url;
            }
            if let Some(template_path) = storage.template_path {
                self.storage.template_path = template_path;
            }
        }

        if let Some(pdf) = patch.pdf {
            if let Some(mode) = pdf.mode {
                self.pdf.mode = mode;
            }
        }

        if let Some(crm) = patch.crm {
            if let Some(enabled) = crm.enabled {
                self.crm.enabled = enabled;
            }
            if let Some(api_base_url) = crm.api_base_url {
                self.crm.api_base_url = api_base_url;
            }
            if let Some(crm_api_key_value) = crm.api_key {
                self.crm.api_key = Some(secret_value(crm_api_key_value));
            }
            if let Some(location_id) = crm.location_id {
                self.crm.location_id = Some(location_id);
            }
            if let Some(custom_field_label) = crm.custom_field_label {
                self.crm.custom_field_label = custom_field_label;
            }
            if let Some(custom_field_id) = crm.custom_field_id {
                self.crm.custom_field_id = Some(custom_field_id);
            }
            if let Some(tag) = crm.tag {
                self.crm.tag = tag;
            }
            if let Some(timeout_secs) = crm.timeout_secs {
                self.crm.timeout_secs = timeout_secs;
            }
            if let Some(max_retries) = crm.max_retries {
                self.crm.max_retries = max_retries;
            }
            if let Some(retry_backoff_ms) = crm.retry_backoff_ms {
                self.crm.retry_backoff_ms = retry_backoff_ms;
            }
        }

        if let Some(llm) = patch.llm {
            if let Some(enabled) = llm.enabled {
                self.llm.enabled = enabled;
            }
            if let Some(llm_api_key_value) = llm.api_key {
                self.llm.api_key = Some(secret_value(llm_api_key_value));
            }
            if let Some(base_url) = llm.base_url {
                self.llm.base_url = base_url;
            }
            if let Some(model) = llm.model {
                self.llm.model = model;
            }
            if let Some(timeout_secs) = llm.timeout_secs {
                self.llm.timeout_secs = timeout_secs;
            }
        }

        if let Some(logging) = patch.logging {
            if let Some(level) = logging.level {
                self.logging.level = level;
            }
            if let Some(format) = logging.format {
                self.logging.format = format;
            }
        }
    }

    fn apply_env_overrides(&mut self) -> Result<(), ConfigError> {
        if let Some(value) = read_env("LEADSIGN_DATABASE_URL") {
            self.database.url = value;
        }
        if let Some(value) = read_env("LEADSIGN_DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections =
                parse_u32("LEADSIGN_DATABASE_MAX_CONNECTIONS", &value)?;
        }
        if let Some(value) = read_env("LEADSIGN_DATABASE_TIMEOUT_SECS") {
            self.database.timeout_secs = parse_u64("LEADSIGN_DATABASE_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("LEADSIGN_SERVER_BIND_ADDRESS") {
            self.server.bind_address = value;
        }
        if let Some(value) = read_env("LEADSIGN_SERVER_PORT") {
            self.server.port = parse_u16("LEADSIGN_SERVER_PORT", &value)?;
        }
        if let Some(value) = read_env("LEADSIGN_SERVER_GRACEFUL_SHUTDOWN_SECS") {
            self.server.graceful_shutdown_secs =
                parse_u64("LEADSIGN_SERVER_GRACEFUL_SHUTDOWN_SECS", &value)?;
        }
        if let Some(value) = read_env("LEADSIGN_SERVER_REQUEST_TIMEOUT_SECS") {
            self.server.request_timeout_secs =
                parse_u64("LEADSIGN_SERVER_REQUEST_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = read_env("LEADSIGN_STORAGE_ROOT") {
            self.storage.root = PathBuf::from(value);
        }
        if let Some(value) = read_env("LEADSIGN_STORAGE_PUBLIC_BASE_URL") {
            self.storage.public_base_url = value;
        }
        if let Some(value) = read_env("LEADSIGN_STORAGE_TEMPLATE_PATH") {
            self.storage.template_path = PathBuf::from(value);
        }

        if let Some(value) = read_env("LEADSIGN_PDF_MODE") {
            self.pdf.mode = value.parse()?;
        }

        if let Some(value) = read_env("LEADSIGN_CRM_ENABLED") {
            self.crm.enabled = parse_bool("LEADSIGN_CRM_ENABLED", &value)?;
        }
        if let Some(value) = read_env("LEADSIGN_CRM_API_BASE_URL") {
            self.crm.api_base_url = value;
        }
        if let Some(value) = read_env("LEADSIGN_CRM_API_KEY") {
            self.crm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("LEADSIGN_CRM_LOCATION_ID") {
            self.crm.location_id = Some(value);
        }
        if let Some(value) = read_env("LEADSIGN_CRM_CUSTOM_FIELD_LABEL") {
            self.crm.custom_field_label = value;
        }
        if let Some(value) = read_env("LEADSIGN_CRM_CUSTOM_FIELD_ID") {
            self.crm.custom_field_id = Some(value);
        }
        if let Some(value) = read_env("LEADSIGN_CRM_TAG") {
            self.crm.tag = value;
        }
        if let Some(value) = read_env("LEADSIGN_CRM_TIMEOUT_SECS") {
            self.crm.timeout_secs = parse_u64("LEADSIGN_CRM_TIMEOUT_SECS", &value)?;
        }
        if let Some(value) = read_env("LEADSIGN_CRM_MAX_RETRIES") {
            self.crm.max_retries = parse_u32("LEADSIGN_CRM_MAX_RETRIES", &value)?;
        }
        if let Some(value) = read_env("LEADSIGN_CRM_RETRY_BACKOFF_MS") {
            self.crm.retry_backoff_ms = parse_u64("LEADSIGN_CRM_RETRY_BACKOFF_MS", &value)?;
        }

        if let Some(value) = read_env("LEADSIGN_LLM_ENABLED") {
            self.llm.enabled = parse_bool("LEADSIGN_LLM_ENABLED", &value)?;
        }
        if let Some(value) = read_env("LEADSIGN_LLM_API_KEY") {
            self.llm.api_key = Some(secret_value(value));
        }
        if let Some(value) = read_env("LEADSIGN_LLM_BASE_URL") {
            self.llm.base_url = value;
        }
        if let Some(value) = read_env("LEADSIGN_LLM_MODEL") {
            self.llm.model = value;
        }
        if let Some(value) = read_env("LEADSIGN_LLM_TIMEOUT_SECS") {
            self.llm.timeout_secs = parse_u64("LEADSIGN_LLM_TIMEOUT_SECS", &value)?;
        }

        let log_level =
            read_env("LEADSIGN_LOGGING_LEVEL").or_else(|| read_env("LEADSIGN_LOG_LEVEL"));
        if let Some(value) = log_level {
            self.logging.level = value;
        }
        let log_format =
            read_env("LEADSIGN_LOGGING_FORMAT").or_else(|| read_env("LEADSIGN_LOG_FORMAT"));
        if let Some(value) = log_format {
            self.logging.format = value.parse()?;
        }

        Ok(())
    }

    fn apply_overrides(&mut self, overrides: ConfigOverrides) {
        if let Some(database_url) = overrides.database_url {
            self.database.url = database_url;
        }
        if let Some(log_level) = overrides.log_level {
            self.logging.level = log_level;
        }
        if let Some(port) = overrides.server_port {
            self.server.port = port;
        }
        if let Some(root) = overrides.storage_root {
            self.storage.root = root;
        }
        if let Some(public_base_url) = overrides.public_base_url {
            self.storage.public_base_url = public_base_url;
        }
        if let Some(template_path) = overrides.template_path {
            self.storage.template_path = template_path;
        }
        if let Some(mode) = overrides.pdf_mode {
            self.pdf.mode = mode;
        }

        if let Some(enabled) = overrides.crm_enabled {
            self.crm.enabled = enabled;
        }
        if let Some(api_base_url) = overrides.crm_api_base_url {
            self.crm.api_base_url = api_base_url;
        }
        if let Some(crm_api_key) = overrides.crm_api_key {
            self.crm.api_key = Some(secret_value(crm_api_key));
        }
        if let Some(location_id) = overrides.crm_location_id {
            self.crm.location_id = Some(location_id);
        }
        if let Some(custom_field_id) = overrides.crm_custom_field_id {
            self.crm.custom_field_id = Some(custom_field_id);
        }
        if let Some(enabled) = overrides.llm_enabled {
            self.llm.enabled = enabled;
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        validate_database(&self.database)?;
        validate_server(&self.server)?;
        validate_storage(&self.storage)?;
        validate_crm(&self.crm)?;
        validate_llm(&self.llm)?;
        validate_logging(&self.logging)?;
        Ok(())
    }
}

fn resolve_config_path(explicit_path: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit_path {
        return path.exists().then_some(path.to_path_buf());
    }

    [PathBuf::from("leadsign.toml"), PathBuf::from("config/leadsign.toml")]
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

    if server.request_timeout_secs == 0 || server.request_timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "server.request_timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    Ok(())
}

fn validate_storage(storage: &StorageConfig) -> Result<(), ConfigError> {
    if storage.root.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "storage.root must point at the directory for signed documents".to_string(),
        ));
    }

    if storage.template_path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "storage.template_path must point at the fillable NDA template".to_string(),
        ));
    }

    if !is_http_url(&storage.public_base_url) {
        return Err(ConfigError::Validation(
            "storage.public_base_url must start with http:// or https://".to_string(),
        ));
    }

    Ok(())
}

fn validate_crm(crm: &CrmConfig) -> Result<(), ConfigError> {
    if !is_http_url(&crm.api_base_url) {
        return Err(ConfigError::Validation(
            "crm.api_base_url must start with http:// or https://".to_string(),
        ));
    }

    if crm.timeout_secs == 0 || crm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "crm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if crm.max_retries > 10 {
        return Err(ConfigError::Validation("crm.max_retries must be at most 10".to_string()));
    }

    if crm.enabled {
        let has_key =
            crm.api_key.as_ref().is_some_and(|value| !value.expose_secret().trim().is_empty());
        if !has_key {
            return Err(ConfigError::Validation(
                "crm.api_key is required when crm.enabled is true. \
                 Use a private integration token for the location"
                    .to_string(),
            ));
        }

        let has_field_id =
            crm.custom_field_id.as_ref().is_some_and(|value| !value.trim().is_empty());
        let has_location = crm.location_id.as_ref().is_some_and(|value| !value.trim().is_empty());
        if !has_field_id && !has_location {
            return Err(ConfigError::Validation(
                "crm.location_id is required to look up the custom field \
                 (or set crm.custom_field_id)"
                    .to_string(),
            ));
        }

        if crm.tag.trim().is_empty() {
            return Err(ConfigError::Validation("crm.tag must not be empty".to_string()));
        }
    }

    Ok(())
}

fn validate_llm(llm: &LlmConfig) -> Result<(), ConfigError> {
    if llm.timeout_secs == 0 || llm.timeout_secs > 300 {
        return Err(ConfigError::Validation(
            "llm.timeout_secs must be in range 1..=300".to_string(),
        ));
    }

    if llm.enabled {
        let has_key =
            llm.api_key.as_ref().is_some_and(|value| !value.expose_secret().trim().is_empty());
        if !has_key {
            return Err(ConfigError::Validation(
                "llm.api_key is required when llm.enabled is true".to_string(),
            ));
        }

        if !is_http_url(&llm.base_url) {
            return Err(ConfigError::Validation(
                "llm.base_url must start with http:// or https://".to_string(),
            ));
        }
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

fn is_http_url(value: &str) -> bool {
    value.starts_with("http://") || value.starts_with("https://")
}

fn read_env(key: &str) -> Option<String> {
    env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn parse_u16(key: &str, value: &str) -> Result<u16, ConfigError> {
    value.parse::<u16>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u32(key: &str, value: &str) -> Result<u32, ConfigError> {
    value.parse::<u32>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64, ConfigError> {
    value.parse::<u64>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    value.parse::<bool>().map_err(|_| ConfigError::InvalidEnvOverride {
        key: key.to_string(),
        value: value.to_string(),
    })
}

#[derive(Debug, Default, Deserialize)]
struct ConfigPatch {
    database: Option<DatabasePatch>,
    server: Option<ServerPatch>,
    storage: Option<StoragePatch>,
    pdf: Option<PdfPatch>,
    crm: Option<CrmPatch>,
    llm: Option<LlmPatch>,
    logging: Option<LoggingPatch>,
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
    request_timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct StoragePatch {
    root: Option<PathBuf>,
    public_base_url: Option<String>,
    template_path: Option<PathBuf>,
}

#[derive(Debug, Default, Deserialize)]
struct PdfPatch {
    mode: Option<PdfMode>,
}

#[derive(Debug, Default, Deserialize)]
struct CrmPatch {
    enabled: Option<bool>,
    api_base_url: Option<String>,
    api_key: Option<String>,
    location_id: Option<String>,
    custom_field_label: Option<String>,
    custom_field_id: Option<String>,
    tag: Option<String>,
    timeout_secs: Option<u64>,
    max_retries: Option<u32>,
    retry_backoff_ms: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LlmPatch {
    enabled: Option<bool>,
    api_key: Option<String>,
    base_url: Option<String>,
    model: Option<String>,
    timeout_secs: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
struct LoggingPatch {
    level: Option<String>,
    format: Option<LogFormat>,
}

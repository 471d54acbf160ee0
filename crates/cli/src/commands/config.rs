use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use leadsign_core::config::AppConfig;
use secrecy::{ExposeSecret, SecretString};
use toml::Value;

use crate::commands::{load_config, CommandResult};

pub fn run() -> CommandResult {
    let config = match load_config("config") {
        Ok(config) => config,
        Err(result) => return result,
    };

    let config_file_path = detect_config_path();
    let config_file_doc = load_config_file_doc(config_file_path.as_deref());

    let mut lines =
        vec!["effective config (source precedence: overrides > env > file > default):".to_string()];
    for (key, value) in entries(&config) {
        let source = field_source(key, config_file_doc.as_ref(), config_file_path.as_deref());
        lines.push(render_line(key, &value, source));
    }

    CommandResult::success("config", lines.join("\n"))
}

fn entries(config: &AppConfig) -> Vec<(&'static str, String)> {
    let unset = || "<unset>".to_string();
    vec![
        ("database.url", config.database.url.clone()),
        ("database.max_connections", config.database.max_connections.to_string()),
        ("database.timeout_secs", config.database.timeout_secs.to_string()),
        ("server.bind_address", config.server.bind_address.clone()),
        ("server.port", config.server.port.to_string()),
        ("server.graceful_shutdown_secs", config.server.graceful_shutdown_secs.to_string()),
        ("server.request_timeout_secs", config.server.request_timeout_secs.to_string()),
        ("storage.root", config.storage.root.display().to_string()),
        ("storage.public_base_url", config.storage.public_base_url.clone()),
        ("storage.template_path", config.storage.template_path.display().to_string()),
        ("pdf.mode", format!("{:?}", config.pdf.mode)),
        ("crm.enabled", config.crm.enabled.to_string()),
        ("crm.api_base_url", config.crm.api_base_url.clone()),
        ("crm.api_key", redact_secret(config.crm.api_key.as_ref())),
        ("crm.location_id", config.crm.location_id.clone().unwrap_or_else(unset)),
        ("crm.custom_field_label", config.crm.custom_field_label.clone()),
        ("crm.custom_field_id", config.crm.custom_field_id.clone().unwrap_or_else(unset)),
        ("crm.tag", config.crm.tag.clone()),
        ("crm.timeout_secs", config.crm.timeout_secs.to_string()),
        ("crm.max_retries", config.crm.max_retries.to_string()),
        ("crm.retry_backoff_ms", config.crm.retry_backoff_ms.to_string()),
        ("llm.enabled", config.llm.enabled.to_string()),
        ("llm.api_key", redact_secret(config.llm.api_key.as_ref())),
        ("llm.base_url", config.llm.base_url.clone()),
        ("llm.model", config.llm.model.clone()),
        ("llm.timeout_secs", config.llm.timeout_secs.to_string()),
        ("logging.level", config.logging.level.clone()),
        ("logging.format", format!("{:?}", config.logging.format)),
    ]
}

/// `crm.api_key` reads from `LEADSIGN_CRM_API_KEY`.
fn env_key(key_path: &str) -> String {
    format!("LEADSIGN_{}", key_path.replace('.', "_").to_ascii_uppercase())
}

fn detect_config_path() -> Option<PathBuf> {
    [PathBuf::from("leadsign.toml"), PathBuf::from("config/leadsign.toml")]
        .into_iter()
        .find(|path| path.exists())
}

fn load_config_file_doc(path: Option<&Path>) -> Option<Value> {
    let path = path?;
    let raw = fs::read_to_string(path).ok()?;
    raw.parse::<Value>().ok()
}

fn field_source(
    key_path: &str,
    config_file_doc: Option<&Value>,
    config_file_path: Option<&Path>,
) -> String {
    let env_key = env_key(key_path);
    if env::var_os(&env_key).is_some() {
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

/// Keeps a token's `pit-` style prefix and hides the rest.
fn redact_secret(secret: Option<&SecretString>) -> String {
    let Some(secret) = secret else {
        return "<unset>".to_string();
    };
    let trimmed = secret.expose_secret().trim();
    if trimmed.is_empty() {
        return "<empty>".to_string();
    }

    if let Some((prefix, _)) = trimmed.split_once('-') {
        return format!("{prefix}-***");
    }

    "<redacted>".to_string()
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use super::{contains_path, env_key, redact_secret};

    #[test]
    fn secrets_keep_only_their_prefix() {
        let token = SecretString::from("pit-1234-abcd".to_string());
        assert_eq!(redact_secret(Some(&token)), "pit-***");
        assert_eq!(redact_secret(Some(&SecretString::from("sk9".to_string()))), "<redacted>");
        assert_eq!(redact_secret(None), "<unset>");
    }

    #[test]
    fn env_keys_follow_the_config_path() {
        assert_eq!(env_key("crm.custom_field_id"), "LEADSIGN_CRM_CUSTOM_FIELD_ID");
        assert_eq!(env_key("storage.root"), "LEADSIGN_STORAGE_ROOT");
    }

    #[test]
    fn nested_file_keys_are_detected() {
        let doc: toml::Value = "[crm]\ntag = \"Signed\"\n".parse().expect("toml");
        assert!(contains_path(&doc, "crm.tag"));
        assert!(!contains_path(&doc, "crm.api_key"));
    }
}

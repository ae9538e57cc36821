use crate::domain::blocking::DEFAULT_RULE_PRIORITY;
use crate::infrastructure::error::InfraError;
use std::fs;
use std::path::Path;

const APP_JSON: &str = "app.json";
pub const DEFAULT_SUMMARIZER_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_SUMMARIZER_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_API_KEY_ENV: &str = "CLAVI_GEMINI_API_KEY";
const DEFAULT_LOG_LEVEL: &str = "info";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SummarizerConfig {
    pub endpoint: String,
    pub model: String,
    pub api_key_env: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub app_name: String,
    pub log_level: String,
    pub summarizer: SummarizerConfig,
    pub rule_priority: u32,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            app_name: "Clavi".to_string(),
            log_level: DEFAULT_LOG_LEVEL.to_string(),
            summarizer: SummarizerConfig {
                endpoint: DEFAULT_SUMMARIZER_ENDPOINT.to_string(),
                model: DEFAULT_SUMMARIZER_MODEL.to_string(),
                api_key_env: DEFAULT_API_KEY_ENV.to_string(),
            },
            rule_priority: DEFAULT_RULE_PRIORITY,
        }
    }
}

fn default_app_json() -> serde_json::Value {
    serde_json::json!({
        "schema": 1,
        "appName": "Clavi",
        "logLevel": DEFAULT_LOG_LEVEL,
        "summarizer": {
            "endpoint": DEFAULT_SUMMARIZER_ENDPOINT,
            "model": DEFAULT_SUMMARIZER_MODEL,
            "apiKeyEnv": DEFAULT_API_KEY_ENV
        },
        "rules": {
            "priority": DEFAULT_RULE_PRIORITY
        }
    })
}

pub fn ensure_default_configs(config_dir: &Path) -> Result<(), InfraError> {
    let path = config_dir.join(APP_JSON);
    if !path.exists() {
        let formatted = serde_json::to_string_pretty(&default_app_json())?;
        fs::write(path, format!("{formatted}\n"))?;
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<serde_json::Value, InfraError> {
    let raw = fs::read_to_string(path)?;
    let parsed: serde_json::Value = serde_json::from_str(&raw)?;
    let schema = parsed
        .get("schema")
        .and_then(serde_json::Value::as_u64)
        .ok_or_else(|| InfraError::InvalidConfig(format!("missing schema in {}", path.display())))?;
    if schema != 1 {
        return Err(InfraError::InvalidConfig(format!(
            "unsupported schema {} in {}",
            schema,
            path.display()
        )));
    }
    Ok(parsed)
}

fn string_field(value: &serde_json::Value, pointer: &str, default: &str) -> String {
    value
        .pointer(pointer)
        .and_then(serde_json::Value::as_str)
        .map(str::trim)
        .filter(|value| !value.is_empty())
        .unwrap_or(default)
        .to_string()
}

pub fn load_app_config(config_dir: &Path) -> Result<AppConfig, InfraError> {
    let path = config_dir.join(APP_JSON);
    let app = read_config(&path)?;

    let rule_priority = match app.pointer("/rules/priority") {
        None | Some(serde_json::Value::Null) => DEFAULT_RULE_PRIORITY,
        Some(value) => value
            .as_u64()
            .and_then(|priority| u32::try_from(priority).ok())
            .filter(|priority| *priority >= 1)
            .ok_or_else(|| {
                InfraError::InvalidConfig(format!(
                    "rules.priority must be a positive integer in {}",
                    path.display()
                ))
            })?,
    };

    let endpoint = string_field(&app, "/summarizer/endpoint", DEFAULT_SUMMARIZER_ENDPOINT);
    url::Url::parse(&endpoint).map_err(|error| {
        InfraError::InvalidConfig(format!(
            "summarizer.endpoint '{endpoint}' is not a valid URL: {error}"
        ))
    })?;

    Ok(AppConfig {
        app_name: string_field(&app, "/appName", "Clavi"),
        log_level: string_field(&app, "/logLevel", DEFAULT_LOG_LEVEL),
        summarizer: SummarizerConfig {
            endpoint: endpoint.trim_end_matches('/').to_string(),
            model: string_field(&app, "/summarizer/model", DEFAULT_SUMMARIZER_MODEL),
            api_key_env: string_field(&app, "/summarizer/apiKeyEnv", DEFAULT_API_KEY_ENV),
        },
        rule_priority,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::atomic::{AtomicUsize, Ordering};

    static NEXT_TEMP_DIR: AtomicUsize = AtomicUsize::new(0);

    struct TempConfigDir {
        path: PathBuf,
    }

    impl TempConfigDir {
        fn new() -> Self {
            let sequence = NEXT_TEMP_DIR.fetch_add(1, Ordering::Relaxed);
            let path = std::env::temp_dir().join(format!(
                "clavi-config-tests-{}-{}",
                std::process::id(),
                sequence
            ));
            fs::create_dir_all(&path).expect("create temp config dir");
            Self { path }
        }
    }

    impl Drop for TempConfigDir {
        fn drop(&mut self) {
            let _ = fs::remove_dir_all(&self.path);
        }
    }

    #[test]
    fn default_config_round_trips() {
        let dir = TempConfigDir::new();
        ensure_default_configs(&dir.path).expect("write defaults");
        let config = load_app_config(&dir.path).expect("load defaults");
        assert_eq!(config, AppConfig::default());
    }

    #[test]
    fn existing_config_is_not_overwritten() {
        let dir = TempConfigDir::new();
        fs::write(
            dir.path.join(APP_JSON),
            r#"{"schema":1,"summarizer":{"model":"gemini-pro","endpoint":"http://localhost:9000/v1/"}}"#,
        )
        .expect("seed config");
        ensure_default_configs(&dir.path).expect("ensure defaults");

        let config = load_app_config(&dir.path).expect("load config");
        assert_eq!(config.summarizer.model, "gemini-pro");
        assert_eq!(config.summarizer.endpoint, "http://localhost:9000/v1");
        assert_eq!(config.summarizer.api_key_env, DEFAULT_API_KEY_ENV);
        assert_eq!(config.rule_priority, DEFAULT_RULE_PRIORITY);
    }

    #[test]
    fn unsupported_schema_is_rejected() {
        let dir = TempConfigDir::new();
        fs::write(dir.path.join(APP_JSON), r#"{"schema":2}"#).expect("seed config");
        match load_app_config(&dir.path) {
            Err(InfraError::InvalidConfig(message)) => assert!(message.contains("unsupported schema")),
            other => panic!("expected invalid config, got {other:?}"),
        }
    }

    #[test]
    fn zero_rule_priority_is_rejected() {
        let dir = TempConfigDir::new();
        fs::write(dir.path.join(APP_JSON), r#"{"schema":1,"rules":{"priority":0}}"#)
            .expect("seed config");
        assert!(matches!(
            load_app_config(&dir.path),
            Err(InfraError::InvalidConfig(_))
        ));
    }
}

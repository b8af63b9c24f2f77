//! Process configuration sourced from environment variables.

use std::net::{IpAddr, SocketAddr};

use secrecy::SecretString;

const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_MODEL_MAP_PATH: &str = "model-map.yml";
const DEFAULT_LOG_MAX_CHARS: usize = 4000;
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8000;

/// Everything the relay reads from the environment at startup.
///
/// Per-request overrides (`x-openai-api-key`, `x-openai-api-url`) are read
/// directly by the HTTP surface and are not part of this struct — this is
/// process-wide defaults only.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// `OPENAI_API_KEY`. Absent means every request must supply
    /// `x-openai-api-key` itself.
    pub openai_api_key: Option<SecretString>,
    /// `OPENAI_BASE_URL`, defaulting to `https://api.openai.com/v1`.
    pub openai_base_url: String,
    /// `OPENAI_FORCE_STREAM`: force `stream = true` on the outgoing
    /// Responses request regardless of what the Anthropic client asked for.
    pub force_stream: bool,
    /// `TRANSFORMER_LOG_LEVEL`, an `env_logger`/`logforth`-style filter
    /// string (e.g. `info` or `server=debug`).
    pub log_level: String,
    /// `TRANSFORMER_LOG_FILE`: optional path to append JSON log lines to,
    /// in addition to the stderr dispatch.
    pub log_file: Option<String>,
    /// `TRANSFORMER_LOG_PAYLOADS`: emit scrubbed request/response payloads
    /// at `info` level unconditionally, rather than only at `debug`.
    pub log_payloads: bool,
    /// `TRANSFORMER_LOG_MAX_CHARS`: truncate logged payload text to this
    /// many characters.
    pub log_max_chars: usize,
    /// `MODEL_MAP_PATH`, defaulting to `model-map.yml` in the working
    /// directory.
    pub model_map_path: String,
    /// `RELAY_HOST` / `RELAY_PORT`: the bind address for `relay serve`.
    pub listen_address: SocketAddr,
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Self {
        Self {
            openai_api_key: env_string("OPENAI_API_KEY").map(SecretString::from),
            openai_base_url: env_string("OPENAI_BASE_URL")
                .map(|raw| normalize_base_url(&raw))
                .unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            force_stream: env_bool("OPENAI_FORCE_STREAM"),
            log_level: env_string("TRANSFORMER_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            log_file: env_string("TRANSFORMER_LOG_FILE"),
            log_payloads: env_bool("TRANSFORMER_LOG_PAYLOADS"),
            log_max_chars: env_string("TRANSFORMER_LOG_MAX_CHARS")
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_LOG_MAX_CHARS),
            model_map_path: env_string("MODEL_MAP_PATH").unwrap_or_else(|| DEFAULT_MODEL_MAP_PATH.to_string()),
            listen_address: listen_address(),
        }
    }
}

/// Validate that `raw` parses as a URL before trusting it as the upstream
/// base; an unparseable value falls back to the built-in default rather
/// than being concatenated into request URLs verbatim.
fn normalize_base_url(raw: &str) -> String {
    match url::Url::parse(raw) {
        Ok(_) => raw.trim_end_matches('/').to_string(),
        Err(err) => {
            log::error!("invalid OPENAI_BASE_URL={raw:?}: {err}, falling back to default");
            DEFAULT_OPENAI_BASE_URL.to_string()
        }
    }
}

fn listen_address() -> SocketAddr {
    let host: IpAddr = env_string("RELAY_HOST")
        .and_then(|h| h.parse().ok())
        .unwrap_or_else(|| DEFAULT_HOST.parse().unwrap());
    let port: u16 = env_string("RELAY_PORT").and_then(|p| p.parse().ok()).unwrap_or(DEFAULT_PORT);
    SocketAddr::new(host, port)
}

fn env_string(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.is_empty())
}

fn env_bool(key: &str) -> bool {
    env_string(key).is_some_and(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn with_env<F: FnOnce()>(vars: &[(&str, &str)], f: F) {
        let _guard = ENV_LOCK.lock().unwrap();
        for (k, v) in vars {
            unsafe { std::env::set_var(k, v) };
        }
        f();
        for (k, _) in vars {
            unsafe { std::env::remove_var(k) };
        }
    }

    #[test]
    fn defaults_when_unset() {
        with_env(&[], || {
            let cfg = AppConfig::from_env();
            assert_eq!(cfg.openai_base_url, DEFAULT_OPENAI_BASE_URL);
            assert!(!cfg.force_stream);
            assert_eq!(cfg.model_map_path, DEFAULT_MODEL_MAP_PATH);
            assert_eq!(cfg.log_max_chars, DEFAULT_LOG_MAX_CHARS);
        });
    }

    #[test]
    fn reads_overrides_and_trims_trailing_slash() {
        with_env(
            &[
                ("OPENAI_API_KEY", "sk-test"),
                ("OPENAI_BASE_URL", "https://example.test/v1/"),
                ("OPENAI_FORCE_STREAM", "true"),
                ("TRANSFORMER_LOG_MAX_CHARS", "128"),
            ],
            || {
                let cfg = AppConfig::from_env();
                assert!(cfg.openai_api_key.is_some());
                assert_eq!(cfg.openai_base_url, "https://example.test/v1");
                assert!(cfg.force_stream);
                assert_eq!(cfg.log_max_chars, 128);
            },
        );
    }

    #[test]
    fn invalid_base_url_falls_back_to_default() {
        with_env(&[("OPENAI_BASE_URL", "not a url")], || {
            let cfg = AppConfig::from_env();
            assert_eq!(cfg.openai_base_url, DEFAULT_OPENAI_BASE_URL);
        });
    }

    #[test]
    fn bool_parsing_accepts_common_truthy_spellings() {
        for v in ["1", "true", "YES", "on"] {
            with_env(&[("OPENAI_FORCE_STREAM", v)], || {
                assert!(AppConfig::from_env().force_stream, "{v} should be truthy");
            });
        }
        with_env(&[("OPENAI_FORCE_STREAM", "0")], || {
            assert!(!AppConfig::from_env().force_stream);
        });
    }
}

use std::time::Duration;

pub const DEFAULT_MODEL: &str = "gemini-2.5-flash";
pub const DEFAULT_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_TIMEOUT_SECS: u64 = 60;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("environment variable {0} is not set")]
    MissingVar(&'static str),
    #[error("environment variable {var} is invalid: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Process configuration, read once at startup.
#[derive(Clone)]
pub struct Config {
    pub telegram_token: String,
    pub gemini_api_key: String,
    pub gemini_model: String,
    pub gemini_api_base: String,
    pub request_timeout: Duration,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("telegram_token", &"[REDACTED]")
            .field("gemini_api_key", &"[REDACTED]")
            .field("gemini_model", &self.gemini_model)
            .field("gemini_api_base", &self.gemini_api_base)
            .field("request_timeout", &self.request_timeout)
            .finish()
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Builds the config from an arbitrary variable source. Blank values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|v| !v.trim().is_empty());

        let gemini_api_key = get("GEMINI_API_KEY")
            .or_else(|| get("API_KEY"))
            .ok_or(ConfigError::MissingVar("GEMINI_API_KEY"))?;
        let telegram_token = get("TELOXIDE_TOKEN").ok_or(ConfigError::MissingVar("TELOXIDE_TOKEN"))?;

        let request_timeout = match get("GEMINI_TIMEOUT_SECS") {
            None => Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            Some(raw) => match raw.trim().parse::<u64>() {
                Ok(0) => {
                    return Err(ConfigError::Invalid {
                        var: "GEMINI_TIMEOUT_SECS",
                        reason: "must be greater than zero".to_string(),
                    })
                }
                Ok(secs) => Duration::from_secs(secs),
                Err(e) => {
                    return Err(ConfigError::Invalid {
                        var: "GEMINI_TIMEOUT_SECS",
                        reason: e.to_string(),
                    })
                }
            },
        };

        Ok(Self {
            telegram_token,
            gemini_api_key,
            gemini_model: get("GEMINI_MODEL").unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            gemini_api_base: get("GEMINI_API_BASE")
                .map(|base| base.trim_end_matches('/').to_string())
                .unwrap_or_else(|| DEFAULT_API_BASE.to_string()),
            request_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |name: &str| map.get(name).cloned()
    }

    #[test]
    fn defaults_are_applied() {
        let config =
            Config::from_lookup(lookup(&[("GEMINI_API_KEY", "k"), ("TELOXIDE_TOKEN", "t")])).unwrap();
        assert_eq!(config.gemini_model, DEFAULT_MODEL);
        assert_eq!(config.gemini_api_base, DEFAULT_API_BASE);
        assert_eq!(config.request_timeout, Duration::from_secs(60));
    }

    #[test]
    fn missing_api_key_fails_fast() {
        let err = Config::from_lookup(lookup(&[("TELOXIDE_TOKEN", "t")])).unwrap_err();
        assert_eq!(err, ConfigError::MissingVar("GEMINI_API_KEY"));

        let err =
            Config::from_lookup(lookup(&[("GEMINI_API_KEY", "  "), ("TELOXIDE_TOKEN", "t")])).unwrap_err();
        assert_eq!(err, ConfigError::MissingVar("GEMINI_API_KEY"));
    }

    #[test]
    fn legacy_api_key_name_is_accepted() {
        let config = Config::from_lookup(lookup(&[("API_KEY", "legacy"), ("TELOXIDE_TOKEN", "t")])).unwrap();
        assert_eq!(config.gemini_api_key, "legacy");
    }

    #[test]
    fn overrides_and_bad_timeout() {
        let config = Config::from_lookup(lookup(&[
            ("GEMINI_API_KEY", "k"),
            ("TELOXIDE_TOKEN", "t"),
            ("GEMINI_MODEL", "gemini-2.0-flash"),
            ("GEMINI_API_BASE", "http://localhost:8080/"),
            ("GEMINI_TIMEOUT_SECS", "15"),
        ]))
        .unwrap();
        assert_eq!(config.gemini_model, "gemini-2.0-flash");
        assert_eq!(config.gemini_api_base, "http://localhost:8080");
        assert_eq!(config.request_timeout, Duration::from_secs(15));

        for bad in ["0", "soon"] {
            let err = Config::from_lookup(lookup(&[
                ("GEMINI_API_KEY", "k"),
                ("TELOXIDE_TOKEN", "t"),
                ("GEMINI_TIMEOUT_SECS", bad),
            ]))
            .unwrap_err();
            assert!(matches!(err, ConfigError::Invalid { var: "GEMINI_TIMEOUT_SECS", .. }));
        }
    }

    #[test]
    fn debug_output_hides_secrets() {
        let config =
            Config::from_lookup(lookup(&[("GEMINI_API_KEY", "secret-key"), ("TELOXIDE_TOKEN", "t0k")])).unwrap();
        let printed = format!("{config:?}");
        assert!(!printed.contains("secret-key"));
        assert!(!printed.contains("t0k"));
    }
}

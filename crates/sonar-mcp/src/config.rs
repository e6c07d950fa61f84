use sonar_core::ToolDefaults;
use std::str::FromStr;

pub(crate) const API_KEY_VAR: &str = "PERPLEXITY_API_KEY";
const ENDPOINT_VAR: &str = "SONAR_PERPLEXITY_ENDPOINT";
const MAX_TOKENS_VAR: &str = "SONAR_DEFAULT_MAX_TOKENS";
const TEMPERATURE_VAR: &str = "SONAR_DEFAULT_TEMPERATURE";
const ENV_FILE_VAR: &str = "SONAR_ENV_FILE";

#[derive(thiserror::Error, Debug)]
pub(crate) enum ConfigError {
    #[error("PERPLEXITY_API_KEY environment variable is required")]
    MissingApiKey,
    #[error("invalid {var}: {reason}")]
    Invalid { var: &'static str, reason: String },
}

/// Process-wide settings, read once at startup.
#[derive(Clone)]
pub(crate) struct Config {
    pub(crate) api_key: String,
    pub(crate) endpoint: String,
    pub(crate) defaults: ToolDefaults,
}

// Keep the key out of any debug output.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"<redacted>")
            .field("endpoint", &self.endpoint)
            .field("defaults", &self.defaults)
            .finish()
    }
}

impl Config {
    pub(crate) fn from_env() -> Result<Self, ConfigError> {
        let api_key = api_key_from_env().ok_or(ConfigError::MissingApiKey)?;
        Ok(Self {
            api_key,
            endpoint: endpoint_from_env(),
            defaults: defaults_from_env()?,
        })
    }
}

fn non_empty_var(k: &str) -> Option<String> {
    std::env::var(k)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

pub(crate) fn api_key_from_env() -> Option<String> {
    non_empty_var(API_KEY_VAR)
}

pub(crate) fn endpoint_from_env() -> String {
    non_empty_var(ENDPOINT_VAR).unwrap_or_else(|| sonar_client::DEFAULT_ENDPOINT.to_string())
}

fn parse_var<T>(var: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let Some(raw) = non_empty_var(var) else {
        return Ok(None);
    };
    raw.parse::<T>()
        .map(Some)
        .map_err(|e| ConfigError::Invalid {
            var,
            reason: format!("{raw:?}: {e}"),
        })
}

pub(crate) fn defaults_from_env() -> Result<ToolDefaults, ConfigError> {
    let base = ToolDefaults::default();
    let d = ToolDefaults {
        max_tokens: parse_var(MAX_TOKENS_VAR)?.unwrap_or(base.max_tokens),
        temperature: parse_var(TEMPERATURE_VAR)?.unwrap_or(base.temperature),
    };
    d.validate().map_err(|e| ConfigError::Invalid {
        var: "tool defaults",
        reason: e.to_string(),
    })?;
    Ok(d)
}

/// Load `KEY=VALUE` lines from the file named by `SONAR_ENV_FILE`, if set.
///
/// Variables already present in the process environment win. Values are never logged.
pub(crate) fn load_env_file() {
    let Some(p) = non_empty_var(ENV_FILE_VAR) else {
        return;
    };
    let Ok(txt) = std::fs::read_to_string(&p) else {
        return;
    };
    for (k, v) in parse_env_lines(&txt) {
        if std::env::var_os(k).is_none() {
            std::env::set_var(k, v);
        }
    }
}

fn parse_env_lines(txt: &str) -> Vec<(&str, &str)> {
    let mut out = Vec::new();
    for raw in txt.lines() {
        let s = raw.trim();
        if s.is_empty() || s.starts_with('#') {
            continue;
        }
        let Some((k, v)) = s.split_once('=') else {
            continue;
        };
        let k = k.trim();
        if k.is_empty() {
            continue;
        }
        out.push((k, v.trim()));
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    static ENV_LOCK: std::sync::Mutex<()> = std::sync::Mutex::new(());

    struct EnvGuard {
        // Held for the whole test: env vars are process-global.
        _lock: std::sync::MutexGuard<'static, ()>,
        saved: Vec<(&'static str, Option<String>)>,
    }

    impl EnvGuard {
        fn new() -> Self {
            let lock = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());
            let mut g = Self {
                _lock: lock,
                saved: Vec::new(),
            };
            for k in [API_KEY_VAR, ENDPOINT_VAR, MAX_TOKENS_VAR, TEMPERATURE_VAR] {
                g.remove(k);
            }
            g
        }

        fn save(&mut self, k: &'static str) {
            if !self.saved.iter().any(|(s, _)| *s == k) {
                self.saved.push((k, std::env::var(k).ok()));
            }
        }

        fn set(&mut self, k: &'static str, v: &str) {
            self.save(k);
            std::env::set_var(k, v);
        }

        fn remove(&mut self, k: &'static str) {
            self.save(k);
            std::env::remove_var(k);
        }
    }

    impl Drop for EnvGuard {
        fn drop(&mut self) {
            for (k, prev) in self.saved.drain(..) {
                match prev {
                    Some(v) => std::env::set_var(k, v),
                    None => std::env::remove_var(k),
                }
            }
        }
    }

    #[test]
    fn blank_key_is_treated_as_missing() {
        let mut g = EnvGuard::new();
        g.set(API_KEY_VAR, "   ");
        assert!(matches!(Config::from_env(), Err(ConfigError::MissingApiKey)));
    }

    #[test]
    fn defaults_apply_without_overrides() {
        let mut g = EnvGuard::new();
        g.set(API_KEY_VAR, "k");
        let c = Config::from_env().unwrap();
        assert_eq!(c.endpoint, sonar_client::DEFAULT_ENDPOINT);
        assert_eq!(c.defaults, ToolDefaults::default());
        assert!(!format!("{c:?}").contains("\"k\""));
    }

    #[test]
    fn overrides_are_parsed_and_bounded() {
        let mut g = EnvGuard::new();
        g.set(API_KEY_VAR, "k");
        g.set(MAX_TOKENS_VAR, "1200");
        g.set(TEMPERATURE_VAR, "0.7");
        let c = Config::from_env().unwrap();
        assert_eq!(c.defaults.max_tokens, 1200);
        assert_eq!(c.defaults.temperature, 0.7);

        // 60 is fine for web-search but below the deep-research minimum.
        g.set(MAX_TOKENS_VAR, "60");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::Invalid { .. })
        ));

        g.set(MAX_TOKENS_VAR, "lots");
        let e = Config::from_env().unwrap_err();
        assert!(e.to_string().contains(MAX_TOKENS_VAR));
    }

    #[test]
    fn env_lines_skip_comments_and_blanks() {
        let txt = "# comment\n\nPERPLEXITY_API_KEY = abc \nnot a pair\n=novalue\nX=a=b\n";
        assert_eq!(
            parse_env_lines(txt),
            vec![("PERPLEXITY_API_KEY", "abc"), ("X", "a=b")]
        );
    }
}

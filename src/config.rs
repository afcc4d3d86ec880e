use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::Path;
use std::time::Duration;

use url::Url;

const DEFAULT_HOST: &str = "http://localhost:5678";
const DEFAULT_TIMEOUT_SECS: u64 = 30;

#[derive(Debug, Clone)]
pub struct N8nConfig {
    pub api_key: String,
    pub host: Url,
    pub timeout: Duration,
}

impl N8nConfig {
    /// Load configuration from the environment, falling back to a `.env`
    /// file in the current directory for any variable the environment does
    /// not define.
    pub fn from_env() -> anyhow::Result<Self> {
        let dotenv = read_env_file(Path::new(".env"));

        let api_key = lookup(&dotenv, &["N8N_API_KEY", "N8N_ACCESS_TOKEN"]).ok_or_else(|| {
            anyhow::anyhow!(
                "N8N API key not found. Options:\n  \
                 1. Set the N8N_API_KEY environment variable\n  \
                 2. Set the N8N_ACCESS_TOKEN environment variable\n  \
                 3. Create a .env file with N8N_API_KEY=your-key"
            )
        })?;

        let mut host =
            lookup(&dotenv, &["N8N_API_URL", "N8N_HOST"]).unwrap_or_else(|| DEFAULT_HOST.into());
        host = host.trim_end_matches('/').to_string();
        if host.ends_with("/api/v1") {
            host = host.trim_end_matches("/api/v1").to_string();
        } else if host.ends_with("/v1") {
            host = host.trim_end_matches("/v1").to_string();
        }
        host = format!("{}/", host);
        let host = Url::parse(&host)?;

        Ok(Self {
            api_key,
            host,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        })
    }

    pub fn endpoint(&self, path: &str) -> Url {
        self.host
            .join(&format!("api/v1/{}", path.trim_start_matches('/')))
            .expect("valid base url")
    }

    pub fn webhook_endpoint(&self, path: &str) -> Url {
        self.host
            .join(&format!("webhook/{}", path.trim_start_matches('/')))
            .expect("valid base url")
    }
}

fn lookup(dotenv: &HashMap<String, String>, names: &[&str]) -> Option<String> {
    for name in names {
        if let Ok(v) = env::var(name) {
            if !v.is_empty() {
                return Some(v);
            }
        }
    }
    for name in names {
        if let Some(v) = dotenv.get(*name) {
            if !v.is_empty() {
                return Some(v.clone());
            }
        }
    }
    None
}

/// Parse a `.env` file into a map. A missing file yields an empty map; the
/// values never shadow variables already present in the real environment.
pub fn read_env_file(path: &Path) -> HashMap<String, String> {
    let mut vars = HashMap::new();
    let Ok(content) = fs::read_to_string(path) else {
        return vars;
    };
    for line in content.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with('#') {
            continue;
        }
        if let Some((key, value)) = line.split_once('=') {
            let value = value.trim().trim_matches('"').trim_matches('\'');
            vars.insert(key.trim().to_string(), value.to_string());
        }
    }
    vars
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::io::Write;
    use temp_env::with_vars;

    #[test]
    #[serial]
    fn reads_from_env() {
        with_vars(
            [
                ("N8N_API_KEY", Some("test-key")),
                ("N8N_API_URL", Some("http://localhost")),
            ],
            || {
                let cfg = N8nConfig::from_env().unwrap();
                assert_eq!(cfg.api_key, "test-key");
                assert_eq!(cfg.host.as_str(), "http://localhost/");
                assert_eq!(
                    cfg.endpoint("workflows").as_str(),
                    "http://localhost/api/v1/workflows"
                );
                assert_eq!(
                    cfg.webhook_endpoint("telegram-webhook").as_str(),
                    "http://localhost/webhook/telegram-webhook"
                );
            },
        );
    }

    #[test]
    #[serial]
    fn strips_existing_api_paths() {
        with_vars(
            [
                ("N8N_API_KEY", Some("test-key")),
                ("N8N_API_URL", Some("http://localhost/api/v1")),
            ],
            || {
                let cfg = N8nConfig::from_env().unwrap();
                assert_eq!(cfg.host.as_str(), "http://localhost/");
                assert_eq!(
                    cfg.endpoint("workflows").as_str(),
                    "http://localhost/api/v1/workflows"
                );
            },
        );
    }

    #[test]
    #[serial]
    fn access_token_is_accepted_as_fallback_key() {
        with_vars(
            [
                ("N8N_API_KEY", None),
                ("N8N_ACCESS_TOKEN", Some("legacy-token")),
                ("N8N_API_URL", None),
                ("N8N_HOST", None),
            ],
            || {
                let cfg = N8nConfig::from_env().unwrap();
                assert_eq!(cfg.api_key, "legacy-token");
                assert_eq!(cfg.host.as_str(), "http://localhost:5678/");
            },
        );
    }

    #[test]
    #[serial]
    fn missing_key_is_an_error() {
        with_vars(
            [("N8N_API_KEY", None::<&str>), ("N8N_ACCESS_TOKEN", None)],
            || {
                let err = N8nConfig::from_env().unwrap_err();
                assert!(err.to_string().contains("N8N_API_KEY"));
            },
        );
    }

    #[test]
    fn env_file_parsing() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(".env");
        let mut f = fs::File::create(&path).unwrap();
        writeln!(f, "# comment line").unwrap();
        writeln!(f).unwrap();
        writeln!(f, "N8N_API_KEY=\"quoted-key\"").unwrap();
        writeln!(f, "N8N_API_URL = http://n8n.internal:5678 ").unwrap();

        let vars = read_env_file(&path);
        assert_eq!(vars.get("N8N_API_KEY").unwrap(), "quoted-key");
        assert_eq!(vars.get("N8N_API_URL").unwrap(), "http://n8n.internal:5678");
        assert_eq!(vars.len(), 2);
    }

    #[test]
    fn missing_env_file_is_empty() {
        assert!(read_env_file(Path::new("/nonexistent/.env")).is_empty());
    }
}

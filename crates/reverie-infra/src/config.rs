//! Configuration loader and data directory resolution.
//!
//! Reads `config.toml` from the data directory (`~/.reverie/` in production)
//! and deserializes it into [`ReverieConfig`]. Falls back to defaults when the
//! file is missing or malformed.

use std::path::{Path, PathBuf};

use reverie_types::config::ReverieConfig;

/// Resolve the data directory.
///
/// Priority: `REVERIE_DATA_DIR`, then `~/.reverie`, then `./.reverie`.
pub fn resolve_data_dir() -> PathBuf {
    if let Ok(dir) = std::env::var("REVERIE_DATA_DIR") {
        return PathBuf::from(dir);
    }

    if let Some(home) = dirs::home_dir() {
        return home.join(".reverie");
    }

    PathBuf::from(".reverie")
}

/// Load configuration from `{data_dir}/config.toml`.
///
/// - Missing file: returns [`ReverieConfig::default()`].
/// - Unreadable or unparsable file: logs a warning and returns the default.
pub async fn load_config(data_dir: &Path) -> ReverieConfig {
    let config_path = data_dir.join("config.toml");

    let content = match tokio::fs::read_to_string(&config_path).await {
        Ok(content) => content,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => {
            tracing::debug!("No config.toml found at {}, using defaults", config_path.display());
            return ReverieConfig::default();
        }
        Err(err) => {
            tracing::warn!("Failed to read {}: {err}, using defaults", config_path.display());
            return ReverieConfig::default();
        }
    };

    match toml::from_str::<ReverieConfig>(&content) {
        Ok(config) => config,
        Err(err) => {
            tracing::warn!(
                "Failed to parse {}: {err}, using defaults",
                config_path.display()
            );
            ReverieConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use reverie_types::config::AdmissionMode;
    use tempfile::TempDir;

    #[tokio::test]
    async fn load_config_missing_file_returns_default() {
        let tmp = TempDir::new().unwrap();
        let config = load_config(tmp.path()).await;
        assert_eq!(config.quota.free_initial_count, 3);
        assert_eq!(config.oracle.base_url, "http://localhost:3002");
    }

    #[tokio::test]
    async fn load_config_valid_toml_returns_parsed() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(
            tmp.path().join("config.toml"),
            r#"
[quota]
premium_daily_count = 50
admission_mode = "relaxed"

[oracle]
base_url = "http://oracle.internal:9000"

[relay]
secret = "s3cret"
"#,
        )
        .await
        .unwrap();

        let config = load_config(tmp.path()).await;
        assert_eq!(config.quota.premium_daily_count, 50);
        assert_eq!(config.quota.free_initial_count, 3);
        assert_eq!(config.quota.admission_mode, AdmissionMode::Relaxed);
        assert_eq!(config.oracle.base_url, "http://oracle.internal:9000");
        assert_eq!(config.relay.secret.as_deref(), Some("s3cret"));
    }

    #[tokio::test]
    async fn load_config_invalid_toml_returns_default() {
        let tmp = TempDir::new().unwrap();
        tokio::fs::write(tmp.path().join("config.toml"), "this is not { valid toml !!!")
            .await
            .unwrap();

        let config = load_config(tmp.path()).await;
        assert_eq!(config.quota.premium_daily_count, 20);
        assert!(config.relay.secret.is_none());
    }
}

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub base_url: String,
    pub api_key: Option<String>,
    pub data_source_id: u64,
}

impl Config {
    pub fn load() -> Result<Self> {
        let base_url = std::env::var("SQLSCOUT_BASE_URL")
            .unwrap_or_else(|_| "http://localhost:5000".to_string());
        let api_key = std::env::var("SQLSCOUT_API_KEY").ok().and_then(|v| {
            if v.trim().is_empty() {
                None
            } else {
                Some(v)
            }
        });
        let data_source_id = std::env::var("SQLSCOUT_DATA_SOURCE_ID")
            .ok()
            .and_then(|v| v.trim().parse::<u64>().ok())
            .unwrap_or(1);

        Ok(Self {
            base_url,
            api_key,
            data_source_id,
        })
    }

    pub fn validate(&self) -> Result<()> {
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            bail!(
                "Invalid SQLSCOUT_BASE_URL '{}': expected http:// or https:// URL",
                self.base_url
            );
        }

        if self.data_source_id == 0 {
            bail!("SQLSCOUT_DATA_SOURCE_ID must be a positive data source id");
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_rejects_non_http_url() {
        let config = Config {
            base_url: "ftp://example.com".to_string(),
            api_key: None,
            data_source_id: 1,
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_accepts_https_url() {
        let config = Config {
            base_url: "https://redash.example.com".to_string(),
            api_key: Some("key".to_string()),
            data_source_id: 7,
        };
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_data_source() {
        let config = Config {
            base_url: "http://localhost:5000".to_string(),
            api_key: None,
            data_source_id: 0,
        };
        assert!(config.validate().is_err());
    }
}

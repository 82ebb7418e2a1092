//! Configuration management for the issuer service
//!
//! Loads configuration from environment variables with sensible defaults.

use anyhow::{Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::path::PathBuf;
use tracing::warn;
use wallet_passes::{ApplePassConfig, GoogleWalletConfig};

/// Where pass artifacts and design previews are stored
#[derive(Debug, Clone, PartialEq)]
pub enum BlobConfig {
    /// Local directory served by the API at `/files`
    Fs { dir: PathBuf },

    /// S3-compatible endpoint taking path-style object PUTs
    Http { endpoint: String, bucket: String },
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// API server host
    pub api_host: String,

    /// API server port
    pub api_port: u16,

    /// Redis connection URL for designs and pass records
    pub redis_url: String,

    /// HS256 secret for bearer tokens
    pub jwt_secret: String,

    /// Base URL used to build links to locally stored blobs
    pub public_base_url: String,

    pub blob: BlobConfig,

    pub apple: ApplePassConfig,

    pub google: GoogleWalletConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        // Load .env file if it exists (for local development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let var = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let blob = match var("BLOB_BACKEND", "fs").as_str() {
            "fs" => BlobConfig::Fs {
                dir: var("BLOB_DIR", "./data/blobs").into(),
            },
            "http" => BlobConfig::Http {
                endpoint: var("S3_ENDPOINT", "http://localhost:9000"),
                bucket: var("S3_BUCKET_NAME", "passmint"),
            },
            other => anyhow::bail!("Unknown BLOB_BACKEND: {} (expected fs or http)", other),
        };

        let apple_defaults = ApplePassConfig::default();
        let apple = ApplePassConfig {
            certificate: decode_certificate(lookup("APPLE_PASS_CERT_P12")),
            certificate_password: var("APPLE_PASS_CERT_PASSWORD", ""),
            pass_type_identifier: lookup("APPLE_PASS_TYPE_IDENTIFIER")
                .unwrap_or(apple_defaults.pass_type_identifier),
            team_identifier: lookup("APPLE_TEAM_IDENTIFIER")
                .unwrap_or(apple_defaults.team_identifier),
            organization_name: lookup("APPLE_ORGANIZATION_NAME")
                .unwrap_or(apple_defaults.organization_name),
            web_service_url: lookup("APPLE_WEB_SERVICE_URL")
                .unwrap_or(apple_defaults.web_service_url),
        };

        let google = GoogleWalletConfig::from_credentials_json(
            &var("GOOGLE_WALLET_CREDENTIALS", "{}"),
            var("GOOGLE_WALLET_ISSUER_ID", "3388000000022149149"),
        );

        let config = Config {
            api_host: var("API_HOST", "0.0.0.0"),

            api_port: var("API_PORT", "8000").parse().context("Invalid API_PORT")?,

            redis_url: var("REDIS_URL", "redis://127.0.0.1:6379"),

            jwt_secret: var("JWT_SECRET", "super-secret-key"),

            public_base_url: var("PUBLIC_BASE_URL", "http://localhost:8000"),

            blob,
            apple,
            google,
        };

        // Validate configuration
        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    fn validate(&self) -> Result<()> {
        if self.api_port == 0 {
            anyhow::bail!("API_PORT must be greater than 0");
        }

        if self.jwt_secret.is_empty() {
            anyhow::bail!("JWT_SECRET must not be empty");
        }

        Ok(())
    }

    /// Get the API server address
    pub fn api_address(&self) -> String {
        format!("{}:{}", self.api_host, self.api_port)
    }
}

/// Signing material arrives base64-encoded; anything unreadable disables
/// Apple issuance rather than startup.
fn decode_certificate(raw: Option<String>) -> Option<Vec<u8>> {
    let raw = raw?;
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    match STANDARD.decode(raw) {
        Ok(bytes) => Some(bytes),
        Err(e) => {
            warn!("APPLE_PASS_CERT_P12 is not valid base64, Apple passes disabled: {}", e);
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load(vars: &[(&str, &str)]) -> Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_config_defaults() {
        let config = load(&[]).expect("Failed to load config");

        assert_eq!(config.api_host, "0.0.0.0");
        assert_eq!(config.api_port, 8000);
        assert_eq!(config.redis_url, "redis://127.0.0.1:6379");
        assert_eq!(config.jwt_secret, "super-secret-key");
        assert_eq!(
            config.blob,
            BlobConfig::Fs {
                dir: PathBuf::from("./data/blobs")
            }
        );
        assert!(config.apple.certificate.is_none());
        assert!(config.google.credentials.is_none());
        assert_eq!(config.google.issuer_id, "3388000000022149149");
    }

    #[test]
    fn test_api_address() {
        let config = load(&[("API_HOST", "127.0.0.1"), ("API_PORT", "9000")]).unwrap();

        assert_eq!(config.api_address(), "127.0.0.1:9000");
    }

    #[test]
    fn test_validate_invalid_port() {
        let result = load(&[("API_PORT", "0")]);

        assert!(result.is_err());
        assert!(result
            .unwrap_err()
            .to_string()
            .contains("API_PORT must be greater than 0"));
    }

    #[test]
    fn test_empty_secret_rejected() {
        assert!(load(&[("JWT_SECRET", "")]).is_err());
    }

    #[test]
    fn test_http_blob_backend() {
        let config = load(&[
            ("BLOB_BACKEND", "http"),
            ("S3_ENDPOINT", "http://minio:9000"),
            ("S3_BUCKET_NAME", "wallet"),
        ])
        .unwrap();

        assert_eq!(
            config.blob,
            BlobConfig::Http {
                endpoint: "http://minio:9000".to_string(),
                bucket: "wallet".to_string(),
            }
        );
    }

    #[test]
    fn test_unknown_blob_backend_rejected() {
        let err = load(&[("BLOB_BACKEND", "ftp")]).unwrap_err();
        assert!(err.to_string().contains("Unknown BLOB_BACKEND"));
    }

    #[test]
    fn test_apple_certificate_decoding() {
        let config = load(&[
            ("APPLE_PASS_CERT_P12", "Y2VydA=="),
            ("APPLE_PASS_CERT_PASSWORD", "pw"),
            ("APPLE_TEAM_IDENTIFIER", "TEAM99"),
        ])
        .unwrap();
        assert_eq!(config.apple.certificate.as_deref(), Some(&b"cert"[..]));
        assert_eq!(config.apple.certificate_password, "pw");
        assert_eq!(config.apple.team_identifier, "TEAM99");

        let invalid = load(&[("APPLE_PASS_CERT_P12", "%%%")]).unwrap();
        assert!(invalid.apple.certificate.is_none());
    }
}

//! Google Wallet generator
//!
//! Produces a signed "save to Google Wallet" JWT carrying one generic pass
//! object. The deep link embeds the JWT, so nothing is uploaded.

use async_trait::async_trait;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use passmint_common::{Platform, PlatformError};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{info, warn};

use crate::{
    barcode_message, generation_error, new_serial, GeneratedPass, GenerationRequest,
    PassGenerator,
};

pub const GOOGLE_PAY_ORIGIN: &str = "https://pay.google.com";

/// The fields of a Google service-account key file we need.
#[derive(Clone, Deserialize)]
pub struct ServiceAccountCredentials {
    pub client_email: String,
    pub private_key: String,
}

impl std::fmt::Debug for ServiceAccountCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceAccountCredentials")
            .field("client_email", &self.client_email)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone)]
pub struct GoogleWalletConfig {
    /// `None` disables the platform
    pub credentials: Option<ServiceAccountCredentials>,
    pub issuer_id: String,
}

impl GoogleWalletConfig {
    /// Parse a service-account JSON document. Empty, `{}` or malformed input
    /// leaves the platform unconfigured.
    pub fn from_credentials_json(raw: &str, issuer_id: String) -> Self {
        let credentials = match serde_json::from_str::<Value>(raw) {
            Ok(Value::Object(map)) if map.is_empty() => {
                warn!("Google Wallet credentials not provided");
                None
            }
            Ok(value) => match serde_json::from_value::<ServiceAccountCredentials>(value) {
                Ok(credentials) => Some(credentials),
                Err(e) => {
                    warn!("Google Wallet credentials missing required fields: {}", e);
                    None
                }
            },
            Err(e) => {
                warn!("Invalid Google Wallet credentials JSON: {}", e);
                None
            }
        };

        Self {
            credentials,
            issuer_id,
        }
    }
}

/// Claims of a Google Wallet save link.
#[derive(Debug, Serialize, Deserialize)]
pub struct SaveToWalletClaims {
    pub iss: String,
    pub aud: String,
    pub typ: String,
    pub iat: i64,
    pub origins: Vec<String>,
    pub payload: Value,
}

pub struct GoogleWalletGenerator {
    config: GoogleWalletConfig,
}

impl GoogleWalletGenerator {
    pub fn new(config: GoogleWalletConfig) -> Self {
        Self { config }
    }

    /// Build the generic pass object for one issuance.
    pub fn build_pass_object(
        &self,
        request: &GenerationRequest<'_>,
        serial: &str,
    ) -> Result<Value, PlatformError> {
        let template = request.template;
        let issuer = &self.config.issuer_id;
        let kind = class_suffix(template.str_or("type", "GENERIC"));

        let text_modules: Vec<Value> = request
            .metadata
            .fields()
            .iter()
            .map(|field| {
                json!({
                    "id": field.key,
                    "header": field.label,
                    "body": field.value,
                })
            })
            .collect();

        let mut object = json!({
            "id": format!("{}.PASS_{}", issuer, request.pass_id),
            "classId": format!("{}.PASSMINT_{}", issuer, kind),
            "state": "ACTIVE",
            "cardTitle": localized(template.str_or("logoText", "PassMint")),
            "header": localized(template.str_or("description", "PassMint Card")),
            "hexBackgroundColor": template.str_or("hexBackgroundColor", "#3c5a96"),
            "barcode": {
                "type": "QR_CODE",
                "value": barcode_message(request.pass_id),
                "alternateText": serial,
            },
            "textModulesData": text_modules,
        });

        if let Some(logo) = template.str_field("logo") {
            object["logo"] = json!({ "sourceUri": { "uri": logo } });
        }

        let expires_at = template
            .expires_at()
            .map_err(|e| generation_error("invalid template", e))?;
        if let Some(expires_at) = expires_at {
            object["validTimeInterval"] = json!({ "end": { "date": expires_at.to_rfc3339() } });
        }

        Ok(object)
    }
}

#[async_trait]
impl PassGenerator for GoogleWalletGenerator {
    fn platform(&self) -> Platform {
        Platform::Google
    }

    async fn generate(
        &self,
        request: GenerationRequest<'_>,
    ) -> Result<GeneratedPass, PlatformError> {
        let credentials = self.config.credentials.as_ref().ok_or_else(|| {
            PlatformError::Configuration("Google Wallet credentials not configured".to_string())
        })?;

        let key = EncodingKey::from_rsa_pem(credentials.private_key.as_bytes()).map_err(|e| {
            PlatformError::Configuration(format!("invalid service account key: {}", e))
        })?;

        let serial = new_serial("GP");
        let object = self.build_pass_object(&request, &serial)?;

        let claims = SaveToWalletClaims {
            iss: credentials.client_email.clone(),
            aud: "google".to_string(),
            typ: "savetowallet".to_string(),
            iat: Utc::now().timestamp(),
            origins: Vec::new(),
            payload: json!({ "genericObjects": [object] }),
        };

        let token = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &key)
            .map_err(|e| generation_error("failed to sign save link", e))?;

        let deep_link = format!("{}/gp/v/save/{}", GOOGLE_PAY_ORIGIN, token);

        info!("Generated Google Wallet pass {} for pass_id {}", serial, request.pass_id);

        Ok(GeneratedPass {
            serial,
            deep_link,
            artifact: token.into_bytes(),
        })
    }
}

fn localized(value: &str) -> Value {
    json!({ "defaultValue": { "language": "en-US", "value": value } })
}

/// Class ids only allow `[A-Za-z0-9._-]`.
fn class_suffix(kind: &str) -> String {
    kind.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || c == '_' || c == '-' {
                c.to_ascii_uppercase()
            } else {
                '_'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_credentials_leave_platform_unconfigured() {
        let config = GoogleWalletConfig::from_credentials_json("{}", "123".to_string());
        assert!(config.credentials.is_none());

        let config = GoogleWalletConfig::from_credentials_json("not json", "123".to_string());
        assert!(config.credentials.is_none());

        let config = GoogleWalletConfig::from_credentials_json(
            r#"{"client_email":"a@b"}"#,
            "123".to_string(),
        );
        assert!(config.credentials.is_none());
    }

    #[test]
    fn test_class_suffix_sanitizes() {
        assert_eq!(class_suffix("loyalty card"), "LOYALTY_CARD");
        assert_eq!(class_suffix("event-ticket"), "EVENT-TICKET");
    }
}

//! Apple Wallet (.pkpass) generator

use async_trait::async_trait;
use passmint_common::{BlobStore, Platform, PlatformError};
use serde_json::{json, Map, Value};
use sha2::{Digest, Sha256};
use std::io::{Cursor, Write};
use std::sync::Arc;
use tracing::{debug, info};
use uuid::Uuid;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipWriter};

use crate::{
    barcode_message, generation_error, new_serial, GeneratedPass, GenerationRequest,
    PassGenerator,
};

pub const PKPASS_CONTENT_TYPE: &str = "application/vnd.apple.pkpass";

/// Signing material and pass.json constants for Apple Wallet.
#[derive(Clone)]
pub struct ApplePassConfig {
    /// Decoded PKCS#12 bundle; `None` disables the platform
    pub certificate: Option<Vec<u8>>,
    pub certificate_password: String,
    pub pass_type_identifier: String,
    pub team_identifier: String,
    pub organization_name: String,
    pub web_service_url: String,
}

impl Default for ApplePassConfig {
    fn default() -> Self {
        Self {
            certificate: None,
            certificate_password: String::new(),
            pass_type_identifier: "pass.com.passmint.card".to_string(),
            team_identifier: "ABCD12345".to_string(),
            organization_name: "PassMint".to_string(),
            web_service_url: "https://passmint.example.com/api/".to_string(),
        }
    }
}

impl std::fmt::Debug for ApplePassConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApplePassConfig")
            .field("certificate", &self.certificate.as_ref().map(|c| c.len()))
            .field("pass_type_identifier", &self.pass_type_identifier)
            .field("team_identifier", &self.team_identifier)
            .field("organization_name", &self.organization_name)
            .field("web_service_url", &self.web_service_url)
            .finish_non_exhaustive()
    }
}

/// Pass styles Apple Wallet understands. The style names the pass.json key
/// holding the field dictionary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PassStyle {
    BoardingPass,
    Coupon,
    EventTicket,
    StoreCard,
    Generic,
}

impl PassStyle {
    pub fn key(&self) -> &'static str {
        match self {
            PassStyle::BoardingPass => "boardingPass",
            PassStyle::Coupon => "coupon",
            PassStyle::EventTicket => "eventTicket",
            PassStyle::StoreCard => "storeCard",
            PassStyle::Generic => "generic",
        }
    }

    fn parse(raw: &str) -> Option<Self> {
        [
            PassStyle::BoardingPass,
            PassStyle::Coupon,
            PassStyle::EventTicket,
            PassStyle::StoreCard,
            PassStyle::Generic,
        ]
        .into_iter()
        .find(|style| style.key() == raw)
    }
}

/// Builds signed pass bundles and hosts them in blob storage; the hosted
/// URL is the deep link.
pub struct ApplePassGenerator {
    config: ApplePassConfig,
    blobs: Arc<dyn BlobStore>,
}

impl ApplePassGenerator {
    pub fn new(config: ApplePassConfig, blobs: Arc<dyn BlobStore>) -> Self {
        if config.certificate.is_none() {
            tracing::warn!("Apple Pass certificate not provided; Apple passes will fail");
        }
        Self { config, blobs }
    }

    /// Assemble pass.json for one issuance.
    pub fn build_pass_json(
        &self,
        request: &GenerationRequest<'_>,
        serial: &str,
    ) -> Result<Value, PlatformError> {
        let template = request.template;

        let mut pass = json!({
            "formatVersion": 1,
            "passTypeIdentifier": self.config.pass_type_identifier,
            "serialNumber": serial,
            "teamIdentifier": self.config.team_identifier,
            "organizationName": self.config.organization_name,
            "description": template.str_or("description", "PassMint Card"),
            "logoText": template.str_or("logoText", "PassMint"),
            "foregroundColor": template.str_or("foregroundColor", "rgb(255, 255, 255)"),
            "backgroundColor": template.str_or("backgroundColor", "rgb(60, 90, 150)"),
            "webServiceURL": self.config.web_service_url,
            "authenticationToken": Uuid::new_v4().simple().to_string(),
        });

        let expires_at = template
            .expires_at()
            .map_err(|e| generation_error("invalid template", e))?;
        if let Some(expires_at) = expires_at {
            pass["expirationDate"] = json!(expires_at.to_rfc3339());
        }

        let style_name = template.str_or("style", "generic");
        let style = PassStyle::parse(style_name).ok_or_else(|| {
            PlatformError::Generation(format!("unsupported pass style: {}", style_name))
        })?;

        let mut fields = match template.get(style.key()) {
            None | Some(Value::Null) => Map::new(),
            Some(Value::Object(map)) => map.clone(),
            Some(_) => {
                return Err(PlatformError::Generation(format!(
                    "template field {} must be an object",
                    style.key()
                )))
            }
        };

        if !request.metadata.is_empty() {
            let primary = fields
                .entry("primaryFields")
                .or_insert_with(|| Value::Array(Vec::new()));
            let Value::Array(primary) = primary else {
                return Err(PlatformError::Generation(
                    "primaryFields must be an array".to_string(),
                ));
            };
            for field in request.metadata.fields() {
                primary.push(json!({
                    "key": field.key,
                    "label": field.label,
                    "value": field.value,
                }));
            }
        }
        pass[style.key()] = Value::Object(fields);

        pass["barcodes"] = json!([{
            "message": barcode_message(request.pass_id),
            "format": "PKBarcodeFormatQR",
            "messageEncoding": "utf-8",
            "altText": serial,
        }]);

        Ok(pass)
    }

    /// Zip pass.json with its manifest and signature.
    ///
    /// `manifest.json` maps each file to its SHA-256 digest; `signature` is the
    /// SHA-256 of the manifest keyed with the configured signing material.
    pub fn bundle(&self, pass_json: &Value, certificate: &[u8]) -> Result<Vec<u8>, PlatformError> {
        let pass_bytes = serde_json::to_vec_pretty(pass_json)
            .map_err(|e| generation_error("failed to serialize pass.json", e))?;

        let manifest = json!({ "pass.json": hex::encode(Sha256::digest(&pass_bytes)) });
        let manifest_bytes = serde_json::to_vec(&manifest)
            .map_err(|e| generation_error("failed to serialize manifest", e))?;

        let mut signer = Sha256::new();
        signer.update(certificate);
        signer.update(self.config.certificate_password.as_bytes());
        signer.update(&manifest_bytes);
        let signature = signer.finalize().to_vec();

        let mut writer = ZipWriter::new(Cursor::new(Vec::new()));
        let options = SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for (name, bytes) in [
            ("pass.json", &pass_bytes),
            ("manifest.json", &manifest_bytes),
            ("signature", &signature),
        ] {
            writer
                .start_file(name, options)
                .map_err(|e| generation_error("failed to write pass bundle", e))?;
            writer
                .write_all(bytes)
                .map_err(|e| generation_error("failed to write pass bundle", e))?;
        }

        let cursor = writer
            .finish()
            .map_err(|e| generation_error("failed to finish pass bundle", e))?;

        Ok(cursor.into_inner())
    }
}

#[async_trait]
impl PassGenerator for ApplePassGenerator {
    fn platform(&self) -> Platform {
        Platform::Apple
    }

    async fn generate(
        &self,
        request: GenerationRequest<'_>,
    ) -> Result<GeneratedPass, PlatformError> {
        let certificate = self
            .config
            .certificate
            .as_deref()
            .filter(|c| !c.is_empty())
            .ok_or_else(|| {
                PlatformError::Configuration("Apple Pass certificate not configured".to_string())
            })?;

        let serial = new_serial("PM");
        let pass_json = self.build_pass_json(&request, &serial)?;
        let bundle = self.bundle(&pass_json, certificate)?;

        debug!("Built Apple pass bundle: {} bytes, serial {}", bundle.len(), serial);

        let key = format!("passes/apple/{}.pkpass", request.pass_id);
        let deep_link = self
            .blobs
            .put(&key, bundle.clone(), PKPASS_CONTENT_TYPE)
            .await
            .map_err(|e| generation_error("failed to upload pass bundle", e))?;

        info!("Generated Apple pass {} for pass_id {}", serial, request.pass_id);

        Ok(GeneratedPass {
            serial,
            deep_link,
            artifact: bundle,
        })
    }
}

//! Wallet pass generation
//!
//! Turns a design template plus sanitized user metadata into
//! platform-specific pass artifacts, and renders deep links as QR codes.
//!
//! Each platform implements [`PassGenerator`]. Generators are independent:
//! one failing says nothing about another, and none of them touch the pass
//! record store.

pub mod apple;
pub mod google;
pub mod metadata;
pub mod qr;

use async_trait::async_trait;
use passmint_common::{DesignTemplate, Platform, PlatformError};
use uuid::Uuid;

pub use apple::{ApplePassConfig, ApplePassGenerator};
pub use google::{GoogleWalletConfig, GoogleWalletGenerator, ServiceAccountCredentials};
pub use metadata::{MetadataField, PassMetadata, MAX_METADATA_BYTES};
pub use qr::QrEncoder;

/// Prefix of the payload embedded in every pass barcode.
pub const BARCODE_SCHEME: &str = "PASSMINT";

/// Inputs for one platform attempt.
#[derive(Debug, Clone, Copy)]
pub struct GenerationRequest<'a> {
    /// Logical pass id shared by every platform variant
    pub pass_id: Uuid,
    pub template: &'a DesignTemplate,
    pub metadata: &'a PassMetadata,
}

/// A successfully produced platform artifact.
#[derive(Debug, Clone)]
pub struct GeneratedPass {
    pub serial: String,
    pub deep_link: String,
    pub artifact: Vec<u8>,
}

/// A wallet platform's pass generator.
#[async_trait]
pub trait PassGenerator: Send + Sync {
    fn platform(&self) -> Platform;

    async fn generate(
        &self,
        request: GenerationRequest<'_>,
    ) -> Result<GeneratedPass, PlatformError>;
}

/// Barcode payload for a logical pass, e.g. `PASSMINT:{pass_id}`.
pub fn barcode_message(pass_id: Uuid) -> String {
    format!("{}:{}", BARCODE_SCHEME, pass_id)
}

/// A fresh serial such as `PM-3F9A0C12B7D4`.
pub(crate) fn new_serial(prefix: &str) -> String {
    let hex = Uuid::new_v4().simple().to_string();
    format!("{}-{}", prefix, hex[..12].to_uppercase())
}

pub(crate) fn generation_error(context: &str, err: impl std::fmt::Display) -> PlatformError {
    PlatformError::Generation(format!("{}: {}", context, err))
}

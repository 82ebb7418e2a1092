//! Issuance orchestration and pass updates
//!
//! An issuance resolves the design, attempts every configured platform
//! exactly once, persists the successful variants as one atomic batch and
//! answers with a unified view: per-platform deep links plus a QR code of
//! the highest-priority link.
//!
//! Per-platform failures are data ([`PlatformOutcome`]), not control flow.
//! Only when every platform fails does the issuance itself fail, with
//! [`Error::AllPlatformsFailed`] and nothing persisted.

use chrono::{DateTime, Utc};
use futures::future::join_all;
use passmint_common::{
    Error, IssuedPass, Pass, PassStats, PassUpdate, Platform, PlatformError, PlatformFailure,
    PlatformInfo, Result,
};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;
use wallet_passes::{GeneratedPass, GenerationRequest, PassGenerator, PassMetadata, QrEncoder};

use crate::store::{DesignStore, PassStore};

/// Number of issue timestamps reported as recent activity.
pub const RECENT_ACTIVITY_LIMIT: usize = 10;

/// Result of one platform attempt within an issuance.
#[derive(Debug)]
pub struct PlatformOutcome {
    pub platform: Platform,
    pub result: std::result::Result<GeneratedPass, PlatformError>,
}

pub struct Issuer {
    designs: Arc<dyn DesignStore>,
    passes: Arc<dyn PassStore>,
    /// Sorted by platform priority
    generators: Vec<Arc<dyn PassGenerator>>,
    qr: QrEncoder,
}

impl Issuer {
    /// Wire an issuer from its collaborators.
    ///
    /// Generators may be given in any order; at most one per platform.
    pub fn new(
        designs: Arc<dyn DesignStore>,
        passes: Arc<dyn PassStore>,
        mut generators: Vec<Arc<dyn PassGenerator>>,
        qr: QrEncoder,
    ) -> Result<Self> {
        generators.sort_by_key(|g| g.platform());

        if let Some(pair) = generators
            .windows(2)
            .find(|pair| pair[0].platform() == pair[1].platform())
        {
            return Err(Error::Configuration {
                platform: pair[0].platform(),
                reason: "more than one generator registered".to_string(),
            });
        }

        info!(
            "Issuer ready with platforms: {}",
            generators
                .iter()
                .map(|g| g.platform().as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );

        Ok(Self {
            designs,
            passes,
            generators,
            qr,
        })
    }

    pub fn platforms(&self) -> Vec<Platform> {
        self.generators.iter().map(|g| g.platform()).collect()
    }

    /// Run every generator once, concurrently. Outcomes keep priority order.
    pub async fn attempt_platforms(&self, request: GenerationRequest<'_>) -> Vec<PlatformOutcome> {
        join_all(self.generators.iter().map(|generator| async move {
            PlatformOutcome {
                platform: generator.platform(),
                result: generator.generate(request).await,
            }
        }))
        .await
    }

    /// Issue a new logical pass of `design_id` to `user_id`.
    pub async fn issue_pass(
        &self,
        user_id: Uuid,
        design_id: Uuid,
        metadata: Option<&Map<String, Value>>,
    ) -> Result<IssuedPass> {
        let design = self
            .designs
            .get_design(design_id)
            .await?
            .ok_or_else(|| Error::not_found("design", design_id))?;

        let expires_at = design.template.expires_at()?;
        let metadata = PassMetadata::from_map(metadata)?;

        let pass_id = Uuid::new_v4();
        info!(
            "Issuing pass {} of design {} to user {}",
            pass_id, design_id, user_id
        );

        let request = GenerationRequest {
            pass_id,
            template: &design.template,
            metadata: &metadata,
        };
        let outcomes = self.attempt_platforms(request).await;

        let now = Utc::now();
        let mut staged = Vec::with_capacity(outcomes.len());
        let mut failures = Vec::new();
        for outcome in outcomes {
            match outcome.result {
                Ok(generated) => {
                    debug!(
                        "{} produced serial {} for pass {}",
                        outcome.platform, generated.serial, pass_id
                    );
                    staged.push(Pass {
                        id: pass_id,
                        user_id,
                        design_id,
                        platform: outcome.platform,
                        serial: generated.serial,
                        deep_link: generated.deep_link,
                        expires_at,
                        issued_at: now,
                        last_updated: now,
                    });
                }
                Err(error) => {
                    warn!("{} failed for pass {}: {}", outcome.platform, pass_id, error);
                    failures.push(PlatformFailure {
                        platform: outcome.platform,
                        error,
                    });
                }
            }
        }

        // Staged rows keep priority order, so the first one is representative.
        let Some(representative) = staged.first() else {
            return Err(Error::AllPlatformsFailed(failures));
        };
        let qr_png = self.qr.encode(&representative.deep_link)?;

        self.passes.insert_passes(&staged).await?;

        info!(
            "Issued pass {} on {} platform(s), {} failed",
            pass_id,
            staged.len(),
            failures.len()
        );

        Ok(IssuedPass {
            pass_id,
            platforms: platform_map(&staged),
            qr_png,
            expires_at,
        })
    }

    /// The unified view of a pass owned by `user_id`.
    pub async fn get_pass(&self, pass_id: Uuid, user_id: Uuid) -> Result<IssuedPass> {
        let rows = self.passes.get_user_passes(pass_id, user_id).await?;
        let Some(representative) = rows.first() else {
            return Err(Error::not_found("pass", pass_id));
        };

        Ok(IssuedPass {
            pass_id,
            platforms: platform_map(&rows),
            qr_png: self.qr.encode(&representative.deep_link)?,
            expires_at: representative.expires_at,
        })
    }

    /// Apply `fields` to every platform row of `pass_id`.
    ///
    /// Returns `false` without touching the store when the pass does not
    /// exist. Wallet apps that already hold the pass are not notified.
    pub async fn update_pass(&self, pass_id: Uuid, fields: &Map<String, Value>) -> Result<bool> {
        let update = PassUpdate::from_fields(fields, Utc::now())?;

        let touched = self.passes.update_passes(pass_id, &update).await?;
        if touched == 0 {
            debug!("Update skipped, pass {} not found", pass_id);
            return Ok(false);
        }

        info!("Updated {} row(s) of pass {}", touched, pass_id);
        debug!("Pass {} changed without a wallet push", pass_id);
        Ok(true)
    }

    /// Like [`Issuer::update_pass`], but only for passes rendered from a
    /// design owned by `org_id`. Anything else reads as not found.
    pub async fn update_pass_for_org(
        &self,
        pass_id: Uuid,
        org_id: Uuid,
        fields: &Map<String, Value>,
    ) -> Result<bool> {
        let rows = self.passes.get_passes(pass_id).await?;
        let Some(first) = rows.first() else {
            return Ok(false);
        };

        let owned = self
            .designs
            .get_design(first.design_id)
            .await?
            .is_some_and(|design| design.org_id == org_id);
        if !owned {
            debug!("Org {} does not own pass {}", org_id, pass_id);
            return Ok(false);
        }

        self.update_pass(pass_id, fields).await
    }

    /// Counters and most recent issue timestamps over an org's passes.
    pub async fn org_stats(&self, org_id: Uuid) -> Result<(PassStats, Vec<DateTime<Utc>>)> {
        let passes = self.passes.org_passes(org_id).await?;
        Ok(PassStats::collect(&passes, Utc::now(), RECENT_ACTIVITY_LIMIT))
    }
}

fn platform_map(rows: &[Pass]) -> BTreeMap<Platform, PlatformInfo> {
    rows.iter()
        .map(|row| {
            (
                row.platform,
                PlatformInfo {
                    deep_link: row.deep_link.clone(),
                    serial: row.serial.clone(),
                },
            )
        })
        .collect()
}

//! Record store contracts for designs and issued passes

use async_trait::async_trait;
use passmint_common::{Design, Error, Pass, PassUpdate, Result};
use std::collections::HashSet;
use uuid::Uuid;

#[async_trait]
pub trait DesignStore: Send + Sync {
    async fn create_design(&self, design: &Design) -> Result<()>;

    async fn get_design(&self, design_id: Uuid) -> Result<Option<Design>>;
}

#[async_trait]
pub trait PassStore: Send + Sync {
    /// Insert every platform row of one logical pass, or none of them.
    ///
    /// Fails with [`Error::Conflict`] when any serial number or
    /// (pass, platform) row already exists.
    async fn insert_passes(&self, passes: &[Pass]) -> Result<()>;

    /// All platform rows sharing a logical id, in platform priority order.
    async fn get_passes(&self, pass_id: Uuid) -> Result<Vec<Pass>>;

    /// Rows of a logical pass owned by `user_id`.
    async fn get_user_passes(&self, pass_id: Uuid, user_id: Uuid) -> Result<Vec<Pass>> {
        let mut passes = self.get_passes(pass_id).await?;
        passes.retain(|p| p.user_id == user_id);
        Ok(passes)
    }

    /// Apply `update` to every row sharing `pass_id` as one batch. Returns the
    /// number of rows touched.
    async fn update_passes(&self, pass_id: Uuid, update: &PassUpdate) -> Result<usize>;

    /// Every pass rendered from a design owned by `org_id`.
    async fn org_passes(&self, org_id: Uuid) -> Result<Vec<Pass>>;
}

/// Check a batch before it reaches a backend.
pub(crate) fn validate_batch(passes: &[Pass]) -> Result<()> {
    let Some(first) = passes.first() else {
        return Err(Error::Validation("no pass rows to insert".to_string()));
    };

    if passes.iter().any(|p| p.id != first.id) {
        return Err(Error::Validation(
            "a batch must belong to a single logical pass".to_string(),
        ));
    }

    let mut platforms = HashSet::new();
    let mut serials = HashSet::new();
    for pass in passes {
        if !platforms.insert(pass.platform) {
            return Err(Error::Validation(format!(
                "duplicate {} row for pass {}",
                pass.platform, pass.id
            )));
        }
        if !serials.insert(pass.serial.as_str()) {
            return Err(Error::Conflict(format!("duplicate serial: {}", pass.serial)));
        }
    }

    Ok(())
}

//! In-process record store

use async_trait::async_trait;
use passmint_common::{Design, Error, Pass, PassUpdate, Platform, Result};
use std::collections::{BTreeMap, HashMap, HashSet};
use std::ops::RangeInclusive;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::store::{validate_batch, DesignStore, PassStore};

#[derive(Default)]
struct MemoryState {
    designs: HashMap<Uuid, Design>,
    passes: BTreeMap<(Uuid, Platform), Pass>,
    serials: HashSet<String>,
}

/// Every possible row key of one logical pass. `Platform::ALL` is sorted.
fn pass_rows(pass_id: Uuid) -> RangeInclusive<(Uuid, Platform)> {
    let [first, .., last] = Platform::ALL;
    (pass_id, first)..=(pass_id, last)
}

/// Designs and passes held in memory. Same contract as the Redis store.
#[derive(Default)]
pub struct MemoryStorage {
    state: RwLock<MemoryState>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored pass rows.
    pub async fn pass_count(&self) -> usize {
        self.state.read().await.passes.len()
    }
}

#[async_trait]
impl DesignStore for MemoryStorage {
    async fn create_design(&self, design: &Design) -> Result<()> {
        let mut state = self.state.write().await;
        if state.designs.contains_key(&design.id) {
            return Err(Error::Conflict(format!("design already exists: {}", design.id)));
        }
        state.designs.insert(design.id, design.clone());
        Ok(())
    }

    async fn get_design(&self, design_id: Uuid) -> Result<Option<Design>> {
        Ok(self.state.read().await.designs.get(&design_id).cloned())
    }
}

#[async_trait]
impl PassStore for MemoryStorage {
    async fn insert_passes(&self, passes: &[Pass]) -> Result<()> {
        validate_batch(passes)?;

        let mut state = self.state.write().await;
        for pass in passes {
            if state.serials.contains(&pass.serial) {
                return Err(Error::Conflict(format!("serial already issued: {}", pass.serial)));
            }
            if state.passes.contains_key(&(pass.id, pass.platform)) {
                return Err(Error::Conflict(format!(
                    "{} row already exists for pass {}",
                    pass.platform, pass.id
                )));
            }
        }

        for pass in passes {
            state.serials.insert(pass.serial.clone());
            state.passes.insert((pass.id, pass.platform), pass.clone());
        }
        Ok(())
    }

    async fn get_passes(&self, pass_id: Uuid) -> Result<Vec<Pass>> {
        let state = self.state.read().await;
        Ok(state
            .passes
            .range(pass_rows(pass_id))
            .map(|(_, pass)| pass.clone())
            .collect())
    }

    async fn update_passes(&self, pass_id: Uuid, update: &PassUpdate) -> Result<usize> {
        let mut state = self.state.write().await;
        let mut touched = 0;
        for (_, pass) in state
            .passes
            .range_mut(pass_rows(pass_id))
        {
            pass.apply(update);
            touched += 1;
        }
        Ok(touched)
    }

    async fn org_passes(&self, org_id: Uuid) -> Result<Vec<Pass>> {
        let state = self.state.read().await;
        Ok(state
            .passes
            .values()
            .filter(|pass| {
                state
                    .designs
                    .get(&pass.design_id)
                    .is_some_and(|design| design.org_id == org_id)
            })
            .cloned()
            .collect())
    }
}

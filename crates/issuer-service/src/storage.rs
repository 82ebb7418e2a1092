//! Redis storage for designs and pass records
//!
//! Data model:
//! - design:{design_id} → Design JSON
//! - designs:org:{org_id} → Set of design ids
//! - pass:{pass_id}:{platform} → Pass JSON (one per platform variant)
//! - pass:{pass_id}:platforms → Set of platform tags issued for the pass
//! - serial:{serial} → row key; the uniqueness index for serial numbers
//! - passes:design:{design_id} → Set of row keys rendered from the design

use async_trait::async_trait;
use passmint_common::{Design, Error, Pass, PassUpdate, Platform, Result};
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Script};
use tracing::{debug, info};
use uuid::Uuid;

use crate::store::{validate_batch, DesignStore, PassStore};

/// Inserts a batch of pass rows atomically.
///
/// ARGV: row count, then per row (serial, row key, row JSON, platforms key,
/// platform, design index key). Returns the first key that already exists
/// (`serial:{serial}` or the row key), or nil once every row is written.
const INSERT_PASSES_SCRIPT: &str = r#"
local n = tonumber(ARGV[1])
for i = 0, n - 1 do
  local base = 2 + i * 6
  local serial_key = 'serial:' .. ARGV[base]
  if redis.call('EXISTS', serial_key) == 1 then
    return serial_key
  end
  if redis.call('EXISTS', ARGV[base + 1]) == 1 then
    return ARGV[base + 1]
  end
end
for i = 0, n - 1 do
  local base = 2 + i * 6
  redis.call('SET', 'serial:' .. ARGV[base], ARGV[base + 1])
  redis.call('SET', ARGV[base + 1], ARGV[base + 2])
  redis.call('SADD', ARGV[base + 3], ARGV[base + 4])
  redis.call('SADD', ARGV[base + 5], ARGV[base + 1])
end
return false
"#;

fn design_key(design_id: Uuid) -> String {
    format!("design:{}", design_id)
}

fn org_designs_key(org_id: Uuid) -> String {
    format!("designs:org:{}", org_id)
}

fn pass_row_key(pass_id: Uuid, platform: Platform) -> String {
    format!("pass:{}:{}", pass_id, platform)
}

fn pass_platforms_key(pass_id: Uuid) -> String {
    format!("pass:{}:platforms", pass_id)
}

fn design_passes_key(design_id: impl std::fmt::Display) -> String {
    format!("passes:design:{}", design_id)
}

fn storage_error(err: redis::RedisError) -> Error {
    Error::Storage(err.to_string())
}

/// Conflict for the existing key reported by the insert script.
fn conflict_error(existing_key: &str) -> Error {
    match existing_key.strip_prefix("serial:") {
        Some(serial) => Error::Conflict(format!("serial already issued: {}", serial)),
        None => Error::Conflict(format!("pass row already exists: {}", existing_key)),
    }
}

/// Storage backend for designs and pass records
pub struct RedisStorage {
    conn: ConnectionManager,
    insert_script: Script,
}

impl RedisStorage {
    /// Create a new storage instance
    pub async fn new(redis_url: &str) -> Result<Self> {
        let client = redis::Client::open(redis_url).map_err(storage_error)?;

        let conn = ConnectionManager::new(client)
            .await
            .map_err(storage_error)?;

        info!("Connected to Redis at {}", redis_url);

        Ok(Self {
            conn,
            insert_script: Script::new(INSERT_PASSES_SCRIPT),
        })
    }

    async fn load_rows(&self, keys: Vec<String>) -> Result<Vec<Pass>> {
        if keys.is_empty() {
            return Ok(Vec::new());
        }

        let mut conn = self.conn.clone();
        let rows: Vec<Option<String>> = if keys.len() == 1 {
            vec![conn.get(&keys[0]).await.map_err(storage_error)?]
        } else {
            conn.get(&keys).await.map_err(storage_error)?
        };

        let mut passes = rows
            .into_iter()
            .flatten()
            .map(|json| serde_json::from_str::<Pass>(&json).map_err(Error::from))
            .collect::<Result<Vec<_>>>()?;

        passes.sort_by_key(|p| p.platform);
        Ok(passes)
    }

    async fn platforms_of(&self, pass_id: Uuid) -> Result<Vec<Platform>> {
        let mut conn = self.conn.clone();
        let tags: Vec<String> = conn
            .smembers(pass_platforms_key(pass_id))
            .await
            .map_err(storage_error)?;

        tags.iter().map(|tag| tag.parse()).collect()
    }
}

#[async_trait]
impl DesignStore for RedisStorage {
    async fn create_design(&self, design: &Design) -> Result<()> {
        let json = serde_json::to_string(design)?;
        let mut conn = self.conn.clone();

        let created: bool = conn
            .set_nx(design_key(design.id), json)
            .await
            .map_err(storage_error)?;
        if !created {
            return Err(Error::Conflict(format!("design already exists: {}", design.id)));
        }

        let _: () = conn
            .sadd(org_designs_key(design.org_id), design.id.to_string())
            .await
            .map_err(storage_error)?;

        info!("Created design {} for org {}", design.id, design.org_id);
        Ok(())
    }

    async fn get_design(&self, design_id: Uuid) -> Result<Option<Design>> {
        let mut conn = self.conn.clone();
        let json: Option<String> = conn
            .get(design_key(design_id))
            .await
            .map_err(storage_error)?;

        json.map(|data| serde_json::from_str(&data).map_err(Error::from))
            .transpose()
    }
}

#[async_trait]
impl PassStore for RedisStorage {
    async fn insert_passes(&self, passes: &[Pass]) -> Result<()> {
        validate_batch(passes)?;

        let mut invocation = self.insert_script.prepare_invoke();
        invocation.arg(passes.len());
        for pass in passes {
            invocation
                .arg(&pass.serial)
                .arg(pass_row_key(pass.id, pass.platform))
                .arg(serde_json::to_string(pass)?)
                .arg(pass_platforms_key(pass.id))
                .arg(pass.platform.as_str())
                .arg(design_passes_key(pass.design_id));
        }

        let mut conn = self.conn.clone();
        let conflict: Option<String> = invocation
            .invoke_async(&mut conn)
            .await
            .map_err(storage_error)?;

        if let Some(existing_key) = conflict {
            debug!("Insert refused, {} already present", existing_key);
            return Err(conflict_error(&existing_key));
        }

        info!("Stored {} platform row(s) for pass {}", passes.len(), passes[0].id);
        Ok(())
    }

    async fn get_passes(&self, pass_id: Uuid) -> Result<Vec<Pass>> {
        let keys = self
            .platforms_of(pass_id)
            .await?
            .into_iter()
            .map(|platform| pass_row_key(pass_id, platform))
            .collect();

        self.load_rows(keys).await
    }

    async fn update_passes(&self, pass_id: Uuid, update: &PassUpdate) -> Result<usize> {
        let mut passes = self.get_passes(pass_id).await?;
        if passes.is_empty() {
            debug!("No rows to update for pass {}", pass_id);
            return Ok(0);
        }

        let mut pipe = redis::pipe();
        pipe.atomic();
        for pass in &mut passes {
            pass.apply(update);
            pipe.set(pass_row_key(pass.id, pass.platform), serde_json::to_string(pass)?)
                .ignore();
        }

        let mut conn = self.conn.clone();
        let _: () = pipe.query_async(&mut conn).await.map_err(storage_error)?;

        debug!("Updated {} row(s) for pass {}", passes.len(), pass_id);
        Ok(passes.len())
    }

    async fn org_passes(&self, org_id: Uuid) -> Result<Vec<Pass>> {
        let mut conn = self.conn.clone();
        let design_ids: Vec<String> = conn
            .smembers(org_designs_key(org_id))
            .await
            .map_err(storage_error)?;

        let mut passes = Vec::new();
        for design_id in design_ids {
            let row_keys: Vec<String> = conn
                .smembers(design_passes_key(&design_id))
                .await
                .map_err(storage_error)?;
            passes.extend(self.load_rows(row_keys).await?);
        }

        Ok(passes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use passmint_common::DesignTemplate;
    use serde_json::json;

    async fn get_test_storage() -> RedisStorage {
        RedisStorage::new("redis://127.0.0.1:6379/15")
            .await
            .expect("Failed to connect to test Redis")
    }

    fn row(pass_id: Uuid, design_id: Uuid, platform: Platform) -> Pass {
        let now = Utc::now();
        let prefix = match platform {
            Platform::Apple => "PM",
            Platform::Google => "GP",
        };
        Pass {
            id: pass_id,
            user_id: Uuid::new_v4(),
            design_id,
            platform,
            serial: format!("{}-{}", prefix, Uuid::new_v4().simple()),
            deep_link: "https://example.com/pass".to_string(),
            expires_at: None,
            issued_at: now,
            last_updated: now,
        }
    }

    #[tokio::test]
    #[ignore = "requires Redis at 127.0.0.1:6379"]
    async fn test_insert_and_get_passes() {
        let storage = get_test_storage().await;
        let pass_id = Uuid::new_v4();
        let design_id = Uuid::new_v4();
        let rows = vec![
            row(pass_id, design_id, Platform::Google),
            row(pass_id, design_id, Platform::Apple),
        ];

        storage.insert_passes(&rows).await.unwrap();

        let stored = storage.get_passes(pass_id).await.unwrap();
        assert_eq!(stored.len(), 2);
        assert_eq!(stored[0].platform, Platform::Apple);
        assert_eq!(stored[1].serial, rows[0].serial);
    }

    #[tokio::test]
    #[ignore = "requires Redis at 127.0.0.1:6379"]
    async fn test_serial_conflict_writes_nothing() {
        let storage = get_test_storage().await;
        let design_id = Uuid::new_v4();
        let existing = row(Uuid::new_v4(), design_id, Platform::Apple);
        storage.insert_passes(&[existing.clone()]).await.unwrap();

        let pass_id = Uuid::new_v4();
        let fresh = row(pass_id, design_id, Platform::Apple);
        let mut clashing = row(pass_id, design_id, Platform::Google);
        clashing.serial = existing.serial.clone();

        let err = storage.insert_passes(&[fresh, clashing]).await.unwrap_err();
        assert!(err.to_string().starts_with("conflict: serial already issued"));
        assert!(storage.get_passes(pass_id).await.unwrap().is_empty());
    }

    #[test]
    fn test_conflict_messages_name_the_clash() {
        let serial = conflict_error("serial:PM-0123456789AB");
        assert_eq!(
            serial.to_string(),
            "conflict: serial already issued: PM-0123456789AB"
        );

        let row = conflict_error("pass:5f0c:apple");
        assert_eq!(
            row.to_string(),
            "conflict: pass row already exists: pass:5f0c:apple"
        );
        assert!(row.is_retryable());
    }

    #[tokio::test]
    #[ignore = "requires Redis at 127.0.0.1:6379"]
    async fn test_existing_row_conflict_is_not_a_serial_clash() {
        let storage = get_test_storage().await;
        let pass_id = Uuid::new_v4();
        let design_id = Uuid::new_v4();
        storage
            .insert_passes(&[row(pass_id, design_id, Platform::Apple)])
            .await
            .unwrap();

        let err = storage
            .insert_passes(&[row(pass_id, design_id, Platform::Apple)])
            .await
            .unwrap_err();

        match err {
            Error::Conflict(message) => {
                assert!(message.starts_with("pass row already exists"), "{message}")
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(storage.get_passes(pass_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    #[ignore = "requires Redis at 127.0.0.1:6379"]
    async fn test_update_and_org_passes() {
        let storage = get_test_storage().await;
        let org_id = Uuid::new_v4();
        let design = Design::new(
            org_id,
            DesignTemplate::from_value(json!({ "style": "generic" })).unwrap(),
            None,
        );
        storage.create_design(&design).await.unwrap();
        assert_eq!(
            storage.get_design(design.id).await.unwrap().unwrap().org_id,
            org_id
        );

        let pass_id = Uuid::new_v4();
        storage
            .insert_passes(&[
                row(pass_id, design.id, Platform::Apple),
                row(pass_id, design.id, Platform::Google),
            ])
            .await
            .unwrap();

        let later = Utc::now() + Duration::minutes(5);
        assert_eq!(
            storage
                .update_passes(pass_id, &PassUpdate::touch(later))
                .await
                .unwrap(),
            2
        );
        assert_eq!(
            storage
                .update_passes(Uuid::new_v4(), &PassUpdate::touch(later))
                .await
                .unwrap(),
            0
        );

        let owned = storage.org_passes(org_id).await.unwrap();
        assert_eq!(owned.len(), 2);
        assert!(owned
            .iter()
            .all(|p| p.last_updated.timestamp() == later.timestamp()));
    }
}

//! Issued pass records and the issuance response

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::platform::Platform;

/// One platform variant of a logical pass.
///
/// Every variant produced by one issuance shares `id`; `serial` is unique
/// across all passes on all platforms.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pass {
    /// Logical pass identifier
    pub id: Uuid,

    /// Owning user
    pub user_id: Uuid,

    /// Design this pass was rendered from
    pub design_id: Uuid,

    pub platform: Platform,

    /// Platform-facing serial number
    pub serial: String,

    /// URL that adds the pass to the platform's wallet
    pub deep_link: String,

    /// `None` means the pass never expires
    pub expires_at: Option<DateTime<Utc>>,

    pub issued_at: DateTime<Utc>,

    pub last_updated: DateTime<Utc>,
}

impl Pass {
    /// Whether the pass is still valid at `now`.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.map_or(true, |expires| expires > now)
    }

    pub fn apply(&mut self, update: &PassUpdate) {
        if let Some(expires_at) = update.expires_at {
            self.expires_at = expires_at;
        }
        self.last_updated = update.last_updated;
    }
}

/// Field updates applied to every platform row of a logical pass.
#[derive(Debug, Clone, PartialEq)]
pub struct PassUpdate {
    pub last_updated: DateTime<Utc>,

    /// `Some(None)` clears the expiration
    pub expires_at: Option<Option<DateTime<Utc>>>,
}

impl PassUpdate {
    /// An update that only refreshes `last_updated`.
    pub fn touch(now: DateTime<Utc>) -> Self {
        Self {
            last_updated: now,
            expires_at: None,
        }
    }

    /// Parse a caller-supplied field map.
    ///
    /// Only `expires_at` (RFC 3339 string or null) is accepted; any other key
    /// is rejected so callers learn their change was not applied.
    pub fn from_fields(fields: &Map<String, Value>, now: DateTime<Utc>) -> Result<Self> {
        let mut update = Self::touch(now);

        for (key, value) in fields {
            match key.as_str() {
                "expires_at" => {
                    update.expires_at = Some(match value {
                        Value::Null => None,
                        Value::String(raw) => Some(
                            DateTime::parse_from_rfc3339(raw)
                                .map_err(|e| {
                                    Error::Validation(format!(
                                        "invalid expires_at {:?}: {}",
                                        raw, e
                                    ))
                                })?
                                .with_timezone(&Utc),
                        ),
                        _ => {
                            return Err(Error::Validation(
                                "expires_at must be an RFC 3339 string or null".to_string(),
                            ))
                        }
                    });
                }
                other => {
                    return Err(Error::Validation(format!("field cannot be updated: {}", other)));
                }
            }
        }

        Ok(update)
    }
}

/// Deep link and serial for one platform in a response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlatformInfo {
    pub deep_link: String,
    pub serial: String,
}

/// The unified view of a logical pass returned to callers.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IssuedPass {
    pub pass_id: Uuid,

    /// Only platforms that actually have a stored row
    pub platforms: BTreeMap<Platform, PlatformInfo>,

    /// `data:image/png;base64,...`
    pub qr_png: String,

    pub expires_at: Option<DateTime<Utc>>,
}

/// Aggregate counters over an organization's passes.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PassStats {
    pub total_issued: usize,
    pub active: usize,
    pub expired: usize,
    pub platforms: BTreeMap<Platform, usize>,
}

impl PassStats {
    /// Fold pass rows into counters and the most recent issue timestamps.
    pub fn collect<'a>(
        passes: impl IntoIterator<Item = &'a Pass>,
        now: DateTime<Utc>,
        recent_limit: usize,
    ) -> (Self, Vec<DateTime<Utc>>) {
        let mut stats = Self::default();
        let mut issued = Vec::new();

        for pass in passes {
            stats.total_issued += 1;
            if pass.is_active_at(now) {
                stats.active += 1;
            } else {
                stats.expired += 1;
            }
            *stats.platforms.entry(pass.platform).or_default() += 1;
            issued.push(pass.issued_at);
        }

        issued.sort_by(|a, b| b.cmp(a));
        issued.truncate(recent_limit);

        (stats, issued)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    fn sample_pass(platform: Platform, expires_at: Option<DateTime<Utc>>) -> Pass {
        let now = Utc::now();
        Pass {
            id: Uuid::new_v4(),
            user_id: Uuid::new_v4(),
            design_id: Uuid::new_v4(),
            platform,
            serial: format!("XX-{}", Uuid::new_v4().simple()),
            deep_link: "https://example.com/pass".to_string(),
            expires_at,
            issued_at: now,
            last_updated: now,
        }
    }

    #[test]
    fn test_update_from_fields() {
        let now = Utc::now();
        let fields = json!({ "expires_at": "2031-05-01T12:00:00Z" });
        let update = PassUpdate::from_fields(fields.as_object().unwrap(), now).unwrap();

        assert_eq!(update.last_updated, now);
        assert_eq!(
            update.expires_at.unwrap().unwrap().to_rfc3339(),
            "2031-05-01T12:00:00+00:00"
        );

        let clear = json!({ "expires_at": null });
        let cleared = PassUpdate::from_fields(clear.as_object().unwrap(), now).unwrap();
        assert_eq!(cleared.expires_at, Some(None));
    }

    #[test]
    fn test_update_rejects_unknown_fields() {
        let err = PassUpdate::from_fields(json!({ "points": 10 }).as_object().unwrap(), Utc::now())
            .unwrap_err();
        assert!(err.to_string().contains("points"));
    }

    #[test]
    fn test_apply_only_touches_requested_fields() {
        let expires = Utc::now() + Duration::days(30);
        let mut pass = sample_pass(Platform::Apple, Some(expires));
        let later = pass.last_updated + Duration::seconds(5);

        pass.apply(&PassUpdate::touch(later));

        assert_eq!(pass.last_updated, later);
        assert_eq!(pass.expires_at, Some(expires));
    }

    #[test]
    fn test_stats_treat_open_ended_passes_as_active() {
        let now = Utc::now();
        let passes = vec![
            sample_pass(Platform::Apple, None),
            sample_pass(Platform::Google, Some(now + Duration::days(1))),
            sample_pass(Platform::Google, Some(now - Duration::days(1))),
        ];

        let (stats, recent) = PassStats::collect(&passes, now, 2);

        assert_eq!(stats.total_issued, 3);
        assert_eq!(stats.active, 2);
        assert_eq!(stats.expired, 1);
        assert_eq!(stats.platforms[&Platform::Google], 2);
        assert_eq!(stats.platforms[&Platform::Apple], 1);
        assert_eq!(recent.len(), 2);
    }

    #[test]
    fn test_issued_pass_platform_keys_serialize_lowercase() {
        let mut platforms = BTreeMap::new();
        platforms.insert(
            Platform::Google,
            PlatformInfo {
                deep_link: "https://pay.google.com/gp/v/save/token".to_string(),
                serial: "GP-0123456789AB".to_string(),
            },
        );
        let issued = IssuedPass {
            pass_id: Uuid::new_v4(),
            platforms,
            qr_png: "data:image/png;base64,".to_string(),
            expires_at: None,
        };

        let value = serde_json::to_value(&issued).unwrap();
        assert_eq!(value["platforms"]["google"]["serial"], "GP-0123456789AB");
        assert!(value["expires_at"].is_null());
    }
}

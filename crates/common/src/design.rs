//! Organization-owned pass designs

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use crate::error::{Error, Result};

/// A design template document.
///
/// The document is open-ended; generators read the keys they understand
/// (style, colours, expiration, barcode text, image references) and fall
/// back to defaults for anything absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DesignTemplate(Map<String, Value>);

impl DesignTemplate {
    /// Wrap a JSON value, requiring an object with a well-formed `expires_at`.
    pub fn from_value(value: Value) -> Result<Self> {
        match value {
            Value::Object(map) => {
                let template = Self(map);
                template.expires_at()?;
                Ok(template)
            }
            other => Err(Error::Validation(format!(
                "design template must be a JSON object, got {}",
                json_kind(&other)
            ))),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    /// A string field, treating empty strings as absent.
    pub fn str_field(&self, key: &str) -> Option<&str> {
        self.0
            .get(key)
            .and_then(Value::as_str)
            .filter(|s| !s.is_empty())
    }

    pub fn str_or<'a>(&'a self, key: &str, default: &'a str) -> &'a str {
        self.str_field(key).unwrap_or(default)
    }

    /// The template's expiration, if any. A `null` value means non-expiring.
    pub fn expires_at(&self) -> Result<Option<DateTime<Utc>>> {
        match self.0.get("expires_at") {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(raw)) => DateTime::parse_from_rfc3339(raw)
                .map(|dt| Some(dt.with_timezone(&Utc)))
                .map_err(|e| Error::Validation(format!("invalid expires_at {:?}: {}", raw, e))),
            Some(other) => Err(Error::Validation(format!(
                "expires_at must be an RFC 3339 string, got {}",
                json_kind(other)
            ))),
        }
    }

    pub fn as_map(&self) -> &Map<String, Value> {
        &self.0
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// A pass design owned by an organization. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Design {
    pub id: Uuid,
    pub org_id: Uuid,
    #[serde(rename = "template_json")]
    pub template: DesignTemplate,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub preview_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl Design {
    pub fn new(org_id: Uuid, template: DesignTemplate, preview_url: Option<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            org_id,
            template,
            preview_url,
            created_at: Utc::now(),
        }
    }
}

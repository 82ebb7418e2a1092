//! User metadata attached to passes as display fields

use passmint_common::{Error, Result};
use serde_json::{json, Map, Value};

const MAX_FIELDS: usize = 32;
const MAX_KEY_LEN: usize = 64;
const MAX_VALUE_LEN: usize = 512;

/// Upper bound on [`PassMetadata::encoded_len`].
///
/// Google save links carry every field inside a signed JWT, and the link
/// must still fit a version 40-L QR code (2953 bytes) once the pass object,
/// base64 expansion and the RS256 signature are added.
pub const MAX_METADATA_BYTES: usize = 768;

/// A single sanitized display field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetadataField {
    pub key: String,
    pub label: String,
    pub value: String,
}

/// Metadata checked once at the issuance boundary, so every generator sees
/// the same well-formed fields.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassMetadata {
    fields: Vec<MetadataField>,
}

impl PassMetadata {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_map(map: Option<&Map<String, Value>>) -> Result<Self> {
        let Some(map) = map else {
            return Ok(Self::empty());
        };

        if map.len() > MAX_FIELDS {
            return Err(Error::Validation(format!(
                "metadata has {} fields, at most {} allowed",
                map.len(),
                MAX_FIELDS
            )));
        }

        let fields = map
            .iter()
            .map(|(key, value)| {
                validate_key(key)?;
                Ok(MetadataField {
                    key: key.clone(),
                    label: label_for(key),
                    value: scalar_to_string(key, value)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let metadata = Self { fields };
        let encoded = metadata.encoded_len();
        if encoded > MAX_METADATA_BYTES {
            return Err(Error::Validation(format!(
                "metadata encodes to {} bytes, at most {} allowed",
                encoded, MAX_METADATA_BYTES
            )));
        }

        Ok(metadata)
    }

    /// Size of the fields as a JSON array of `{id, header, body}` text
    /// modules, the largest shape any generator embeds them in.
    pub fn encoded_len(&self) -> usize {
        Value::Array(
            self.fields
                .iter()
                .map(|field| {
                    json!({
                        "id": field.key,
                        "header": field.label,
                        "body": field.value,
                    })
                })
                .collect(),
        )
        .to_string()
        .len()
    }

    pub fn fields(&self) -> &[MetadataField] {
        &self.fields
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

fn validate_key(key: &str) -> Result<()> {
    if key.is_empty() || key.len() > MAX_KEY_LEN {
        return Err(Error::Validation(format!(
            "metadata key must be 1-{} characters: {:?}",
            MAX_KEY_LEN, key
        )));
    }
    if !key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(Error::Validation(format!(
            "metadata key may only contain letters, digits, '_' and '-': {:?}",
            key
        )));
    }
    Ok(())
}

fn scalar_to_string(key: &str, value: &Value) -> Result<String> {
    let rendered = match value {
        Value::Null => String::new(),
        Value::Bool(b) => b.to_string(),
        Value::Number(n) => n.to_string(),
        Value::String(s) => s.trim().to_string(),
        Value::Array(_) | Value::Object(_) => {
            return Err(Error::Validation(format!(
                "metadata value for {:?} must be a string, number or boolean",
                key
            )))
        }
    };

    if rendered.chars().count() > MAX_VALUE_LEN {
        return Err(Error::Validation(format!(
            "metadata value for {:?} exceeds {} characters",
            key, MAX_VALUE_LEN
        )));
    }

    Ok(rendered)
}

/// "member_tier" -> "Member_tier"
fn label_for(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(char::to_lowercase))
            .collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn parse(value: Value) -> Result<PassMetadata> {
        PassMetadata::from_map(value.as_object())
    }

    #[test]
    fn test_absent_metadata_is_empty() {
        assert!(PassMetadata::from_map(None).unwrap().is_empty());
    }

    #[test]
    fn test_scalars_are_stringified() {
        let metadata = parse(json!({
            "name": "  Aiko ",
            "points": 1200,
            "vip": true,
            "note": null
        }))
        .unwrap();

        let mut values: Vec<(&str, &str)> = metadata
            .fields()
            .iter()
            .map(|f| (f.key.as_str(), f.value.as_str()))
            .collect();
        values.sort();

        assert_eq!(
            values,
            vec![("name", "Aiko"), ("note", ""), ("points", "1200"), ("vip", "true")]
        );
    }

    #[test]
    fn test_labels_capitalize_first_letter_only() {
        let metadata = parse(json!({ "MEMBER_tier": "gold" })).unwrap();
        assert_eq!(metadata.fields()[0].label, "Member_tier");
    }

    #[test]
    fn test_rejects_nested_values() {
        let err = parse(json!({ "address": { "city": "Osaka" } })).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_rejects_bad_keys() {
        assert!(parse(json!({ "": "x" })).is_err());
        assert!(parse(json!({ "drop table": "x" })).is_err());
        let mut long_key = Map::new();
        long_key.insert("k".repeat(65), json!("x"));
        assert!(PassMetadata::from_map(Some(&long_key)).is_err());
    }

    #[test]
    fn test_total_size_budget() {
        // [{"id":"a","header":"A","body":"<512>"},{"id":"b","header":"B","body":"<187>"}]
        let at_limit = parse(json!({
            "a": "x".repeat(512),
            "b": "y".repeat(187)
        }))
        .unwrap();
        assert_eq!(at_limit.encoded_len(), MAX_METADATA_BYTES);

        let err = parse(json!({
            "a": "x".repeat(512),
            "b": "y".repeat(188)
        }))
        .unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_escaped_characters_count_toward_budget() {
        // Each quote is escaped, doubling its encoded size.
        let err = parse(json!({ "a": "\"".repeat(400) })).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
    }

    #[test]
    fn test_rejects_too_many_fields() {
        let map: Map<String, Value> = (0..33)
            .map(|i| (format!("field{}", i), json!(i)))
            .collect();
        assert!(PassMetadata::from_map(Some(&map)).is_err());
    }
}

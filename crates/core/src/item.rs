//! Normalized item submissions and the item-type schema they are read through.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::CoreError;

/// Broad class of an item type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemKind {
    Content,
    User,
    Thread,
}

/// Declared type of one item field.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FieldType {
    String,
    Number,
    Boolean,
    Id,
    UserId,
    Url,
    Datetime,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldSchema {
    pub name: String,
    #[serde(rename = "type")]
    pub field_type: FieldType,
    /// Field holds an array of `field_type` values.
    #[serde(default)]
    pub repeated: bool,
}

/// An organization-defined item type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemType {
    pub id: String,
    pub org_id: String,
    pub name: String,
    pub kind: ItemKind,
    pub fields: Vec<FieldSchema>,
    /// Field whose value is the item's creation time, if the type declares one.
    #[serde(default)]
    pub created_at_field: Option<String>,
}

impl ItemType {
    pub fn field(&self, name: &str) -> Option<&FieldSchema> {
        self.fields.iter().find(|f| f.name == name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRef {
    pub id: String,
    pub type_id: String,
}

/// Identity of an item independent of any particular submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemIdentifier {
    pub id: String,
    pub type_id: String,
}

/// A typed scalar read out of item data.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ScalarValue {
    String(String),
    Number(f64),
    Boolean(bool),
    Id(String),
    UserId(UserRef),
    Url(String),
    Datetime(DateTime<Utc>),
}

impl ScalarValue {
    /// Convert a raw JSON value according to the declared field type.
    /// Values that do not fit the type yield `None`.
    pub fn from_json(field_type: FieldType, value: &Value) -> Option<Self> {
        match field_type {
            FieldType::String => value.as_str().map(|s| ScalarValue::String(s.to_string())),
            FieldType::Url => value.as_str().map(|s| ScalarValue::Url(s.to_string())),
            FieldType::Number => value.as_f64().map(ScalarValue::Number),
            FieldType::Boolean => value.as_bool().map(ScalarValue::Boolean),
            FieldType::Id => match value {
                Value::String(s) => Some(ScalarValue::Id(s.clone())),
                Value::Number(n) => Some(ScalarValue::Id(n.to_string())),
                _ => None,
            },
            FieldType::UserId => serde_json::from_value::<UserRef>(value.clone())
                .ok()
                .map(ScalarValue::UserId),
            FieldType::Datetime => parse_instant(value).map(ScalarValue::Datetime),
        }
    }

    /// Text rendering handed to signals.
    pub fn as_text(&self) -> String {
        match self {
            ScalarValue::String(s) | ScalarValue::Id(s) | ScalarValue::Url(s) => s.clone(),
            ScalarValue::Number(n) => n.to_string(),
            ScalarValue::Boolean(b) => b.to_string(),
            ScalarValue::UserId(u) => u.id.clone(),
            ScalarValue::Datetime(t) => t.to_rfc3339(),
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            ScalarValue::Number(n) => Some(*n),
            _ => None,
        }
    }
}

/// Accepts RFC 3339 strings or epoch milliseconds.
fn parse_instant(value: &Value) -> Option<DateTime<Utc>> {
    match value {
        Value::String(s) => DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|t| t.with_timezone(&Utc)),
        Value::Number(n) => n
            .as_i64()
            .and_then(|ms| Utc.timestamp_millis_opt(ms).single()),
        _ => None,
    }
}

/// A normalized snapshot of an item at submission time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemSubmission {
    pub submission_id: String,
    pub item_id: String,
    pub item_type: ItemType,
    pub data: serde_json::Map<String, Value>,
    #[serde(default)]
    pub creator: Option<UserRef>,
    pub submission_time: DateTime<Utc>,
}

impl ItemSubmission {
    pub fn from_json(raw: &str) -> Result<Self, CoreError> {
        Ok(serde_json::from_str(raw)?)
    }

    pub fn org_id(&self) -> &str {
        &self.item_type.org_id
    }

    pub fn identifier(&self) -> ItemIdentifier {
        ItemIdentifier {
            id: self.item_id.clone(),
            type_id: self.item_type.id.clone(),
        }
    }

    /// Values of a schema field, flattened when the field is repeated.
    /// Unknown fields and values that do not match the schema are dropped.
    pub fn field_values(&self, name: &str) -> Vec<ScalarValue> {
        let Some(schema) = self.item_type.field(name) else {
            return Vec::new();
        };
        match self.data.get(name) {
            None | Some(Value::Null) => Vec::new(),
            Some(Value::Array(items)) if schema.repeated => items
                .iter()
                .filter_map(|v| ScalarValue::from_json(schema.field_type, v))
                .collect(),
            Some(v) => ScalarValue::from_json(schema.field_type, v)
                .into_iter()
                .collect(),
        }
    }

    /// Every string-typed value across the item's fields, in schema order.
    pub fn all_text(&self) -> Vec<ScalarValue> {
        self.item_type
            .fields
            .iter()
            .filter(|f| f.field_type == FieldType::String)
            .flat_map(|f| self.field_values(&f.name))
            .collect()
    }

    /// Creation time taken from the item type's created-at field, if present and parseable.
    pub fn created_at(&self) -> Option<DateTime<Utc>> {
        let field = self.item_type.created_at_field.as_deref()?;
        self.data.get(field).and_then(parse_instant)
    }

    /// Time used to place this submission in aggregation windows.
    pub fn event_time(&self) -> DateTime<Utc> {
        self.created_at().unwrap_or(self.submission_time)
    }
}

//! Query field schema
//!
//! A dataset's queryables document is turned into a list of typed fields
//! once, when it is loaded. Each [`FieldKind`] has a single serialization
//! rule from a user value to the JSON the broker expects.

use std::collections::BTreeMap;

use chrono::{DateTime, Local, NaiveDate, NaiveDateTime, TimeZone, Utc};
use serde::Serialize;
use serde_json::Value;
use tracing::warn;

use super::models::SearchQuery;
use crate::constants::search;
use crate::errors::QueryError;

/// Option of a choice field
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Choice {
    /// Value sent to the broker
    pub value: String,
    /// Label shown to the user
    pub title: String,
}

/// How a field is entered and serialized
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", content = "choices", rename_all = "snake_case")]
pub enum FieldKind {
    Text,
    Choice(Vec<Choice>),
    MultiChoice(Vec<Choice>),
    DateTime,
    BoundingBox,
}

/// One queryable field
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FieldDefinition {
    pub name: String,
    pub label: String,
    pub kind: FieldKind,
    pub required: bool,
}

impl FieldDefinition {
    fn from_property(name: &str, property: &Value, required: bool) -> Self {
        let label = property
            .get("title")
            .and_then(Value::as_str)
            .unwrap_or(name)
            .to_string();

        let kind = if let Some(choices) = property.pointer("/items/oneOf").and_then(Value::as_array) {
            FieldKind::MultiChoice(parse_choices(choices))
        } else if let Some(choices) = property.get("oneOf").and_then(Value::as_array) {
            FieldKind::Choice(parse_choices(choices))
        } else if property.get("format").and_then(Value::as_str) == Some("date-time") {
            FieldKind::DateTime
        } else if name.eq_ignore_ascii_case("bbox") || is_numeric_array(property) {
            FieldKind::BoundingBox
        } else {
            FieldKind::Text
        };

        Self {
            name: name.to_string(),
            label,
            kind,
            required,
        }
    }

    /// Broker JSON for a user value, `None` when the value is empty
    ///
    /// # Errors
    ///
    /// Returns `QueryError::InvalidValue` when the value does not fit the
    /// field kind.
    pub fn serialize(&self, value: Option<&Value>) -> Result<Option<Value>, QueryError> {
        let value = match value {
            None | Some(Value::Null) => return Ok(self.implicit_value()),
            Some(value) => value,
        };

        match &self.kind {
            FieldKind::Text => Ok(serialize_text(value)),
            FieldKind::Choice(choices) => match scalar_text(value) {
                None => Ok(self.implicit_value()),
                Some(text) => {
                    self.check_choice(choices, &text)?;
                    Ok(Some(Value::String(text)))
                }
            },
            FieldKind::MultiChoice(choices) => {
                let picked: Vec<String> = match value {
                    Value::Array(items) => items.iter().filter_map(scalar_text).collect(),
                    other => scalar_text(other).into_iter().collect(),
                };
                for item in &picked {
                    self.check_choice(choices, item)?;
                }
                Ok((!picked.is_empty()).then(|| Value::from(picked)))
            }
            FieldKind::DateTime => match scalar_text(value) {
                None => Ok(None),
                Some(text) => {
                    let instant = parse_user_datetime(&text).ok_or_else(|| self.invalid(format!(
                        "'{}' is not a date or date-time",
                        text
                    )))?;
                    Ok(Some(Value::String(format_utc_millis(instant))))
                }
            },
            FieldKind::BoundingBox => self.serialize_bbox(value),
        }
    }

    /// Value used when nothing was supplied: the only option of a single-choice field
    fn implicit_value(&self) -> Option<Value> {
        match &self.kind {
            FieldKind::Choice(choices) if choices.len() == 1 => {
                Some(Value::String(choices[0].value.clone()))
            }
            _ => None,
        }
    }

    fn check_choice(&self, choices: &[Choice], value: &str) -> Result<(), QueryError> {
        if choices.is_empty() || choices.iter().any(|c| c.value == value) {
            return Ok(());
        }
        let allowed: Vec<&str> = choices.iter().map(|c| c.value.as_str()).collect();
        Err(self.invalid(format!(
            "'{}' is not one of: {}",
            value,
            allowed.join(", ")
        )))
    }

    fn serialize_bbox(&self, value: &Value) -> Result<Option<Value>, QueryError> {
        let numbers: Vec<f64> = match value {
            Value::Array(items) if items.is_empty() => return Ok(None),
            Value::Array(items) => items.iter().filter_map(Value::as_f64).collect(),
            Value::String(text) if text.trim().is_empty() => return Ok(None),
            Value::String(text) => text
                .split(',')
                .map(|part| part.trim().parse::<f64>())
                .collect::<Result<_, _>>()
                .map_err(|_| self.invalid("expected four comma-separated numbers"))?,
            _ => Vec::new(),
        };

        match numbers.as_slice() {
            [west, south, east, north] if west <= east && south <= north => {
                Ok(Some(Value::from(numbers.clone())))
            }
            [_, _, _, _] => Err(self.invalid("expected west,south,east,north with west <= east and south <= north")),
            _ => Err(self.invalid("expected four numbers")),
        }
    }

    fn invalid(&self, reason: impl Into<String>) -> QueryError {
        QueryError::InvalidValue {
            field: self.name.clone(),
            reason: reason.into(),
        }
    }
}

fn parse_choices(items: &[Value]) -> Vec<Choice> {
    items
        .iter()
        .filter_map(|item| {
            let value = scalar_text(item.get("const")?)?;
            let title = item
                .get("title")
                .and_then(Value::as_str)
                .map(str::to_string)
                .unwrap_or_else(|| value.clone());
            Some(Choice { value, title })
        })
        .collect()
}

fn is_numeric_array(property: &Value) -> bool {
    property.get("type").and_then(Value::as_str) == Some("array")
        && matches!(
            property.pointer("/items/type").and_then(Value::as_str),
            Some("number") | Some("integer")
        )
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(text) => Some(text.trim().to_string()).filter(|t| !t.is_empty()),
        Value::Number(number) => Some(number.to_string()),
        Value::Bool(flag) => Some(flag.to_string()),
        _ => None,
    }
}

fn serialize_text(value: &Value) -> Option<Value> {
    match value {
        Value::String(text) => {
            let text = text.trim();
            (!text.is_empty()).then(|| Value::String(text.to_string()))
        }
        Value::Array(items) if items.is_empty() => None,
        other => Some(other.clone()),
    }
}

/// Read a user date or date-time; values without an offset are local time
pub fn parse_user_datetime(text: &str) -> Option<DateTime<Utc>> {
    if let Ok(instant) = DateTime::parse_from_rfc3339(text) {
        return Some(instant.with_timezone(&Utc));
    }
    let naive = NaiveDateTime::parse_from_str(text, "%Y-%m-%dT%H:%M:%S%.f")
        .or_else(|_| NaiveDateTime::parse_from_str(text, "%Y-%m-%d %H:%M:%S"))
        .ok()
        .or_else(|| {
            NaiveDate::parse_from_str(text, "%Y-%m-%d")
                .ok()
                .and_then(|date| date.and_hms_opt(0, 0, 0))
        })?;
    Local
        .from_local_datetime(&naive)
        .earliest()
        .map(|local| local.with_timezone(&Utc))
}

/// `YYYY-MM-DDTHH:MM:SS.mmmZ`
pub fn format_utc_millis(instant: DateTime<Utc>) -> String {
    instant.format("%Y-%m-%dT%H:%M:%S%.3fZ").to_string()
}

/// Typed fields of one dataset
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FieldSchema {
    fields: Vec<FieldDefinition>,
}

impl FieldSchema {
    /// Build the schema from a queryables document
    ///
    /// Paging parameters are left out; the broker client manages them.
    pub fn from_queryables(queryables: &Value) -> Self {
        let required: Vec<&str> = queryables
            .get("required")
            .and_then(Value::as_array)
            .map(|names| names.iter().filter_map(Value::as_str).collect())
            .unwrap_or_default();

        let fields = queryables
            .get("properties")
            .and_then(Value::as_object)
            .map(|properties| {
                properties
                    .iter()
                    .filter(|(name, _)| !search::HIDDEN_FIELDS.contains(&name.as_str()))
                    .map(|(name, property)| {
                        FieldDefinition::from_property(name, property, required.contains(&name.as_str()))
                    })
                    .collect()
            })
            .unwrap_or_default();

        Self { fields }
    }

    pub fn fields(&self) -> &[FieldDefinition] {
        &self.fields
    }

    pub fn field(&self, name: &str) -> Option<&FieldDefinition> {
        self.fields.iter().find(|f| f.name == name)
    }

    pub fn required_names(&self) -> Vec<&str> {
        self.fields
            .iter()
            .filter(|f| f.required)
            .map(|f| f.name.as_str())
            .collect()
    }
}

/// Collects user values and produces a validated [`SearchQuery`]
#[derive(Debug)]
pub struct QueryBuilder<'a> {
    schema: &'a FieldSchema,
    dataset_id: String,
    values: BTreeMap<String, Value>,
}

impl<'a> QueryBuilder<'a> {
    pub fn new(schema: &'a FieldSchema, dataset_id: impl Into<String>) -> Self {
        Self {
            schema,
            dataset_id: dataset_id.into(),
            values: BTreeMap::new(),
        }
    }

    /// Set a field value; names outside the schema are ignored at build time
    pub fn set(mut self, name: impl Into<String>, value: Value) -> Self {
        self.values.insert(name.into(), value);
        self
    }

    /// Take every field of an existing query as a user value
    pub fn with_query(mut self, query: &SearchQuery) -> Self {
        for (name, value) in query.fields() {
            self.values.insert(name.clone(), value.clone());
        }
        self
    }

    /// Serialize all fields, omitting empty ones
    ///
    /// # Errors
    ///
    /// Returns `QueryError::MissingFields` naming every required field without
    /// a value, or the first `QueryError::InvalidValue`.
    pub fn build(self) -> Result<SearchQuery, QueryError> {
        if self.dataset_id.trim().is_empty() {
            return Err(QueryError::MissingDatasetId);
        }

        for name in self.values.keys() {
            if self.schema.field(name).is_none() && !search::HIDDEN_FIELDS.contains(&name.as_str()) {
                warn!("Ignoring '{}', not a queryable field of {}", name, self.dataset_id);
            }
        }

        let mut query = SearchQuery::for_dataset(&self.dataset_id);
        let mut missing = Vec::new();
        for field in self.schema.fields() {
            match field.serialize(self.values.get(&field.name))? {
                Some(value) => query.insert(field.name.clone(), value),
                None if field.required => missing.push(field.name.clone()),
                None => {}
            }
        }

        if !missing.is_empty() {
            return Err(QueryError::MissingFields { fields: missing });
        }
        Ok(query)
    }
}

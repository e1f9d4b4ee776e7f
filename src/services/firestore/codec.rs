use chrono::{DateTime, SecondsFormat, Utc};
use serde::Deserialize;
use serde_json::{json, Map, Value};

use crate::error::{FeedError, Result};
use crate::models::{
    Access, Entry, EntryFields, EntryPatch, EntryStatus, DEFAULT_CONTENT_TYPE, DEFAULT_TITLE,
    PLACEHOLDER_LINK,
};

/// A stored document as returned by the REST API.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    pub name: String,
    #[serde(default)]
    pub fields: Map<String, Value>,
    #[serde(default)]
    pub create_time: Option<String>,
}

pub fn string_value(value: &str) -> Value {
    json!({ "stringValue": value })
}

pub fn integer_value(value: i64) -> Value {
    json!({ "integerValue": value.to_string() })
}

pub fn timestamp_value(value: DateTime<Utc>) -> Value {
    json!({ "timestampValue": value.to_rfc3339_opts(SecondsFormat::Millis, true) })
}

pub fn null_value() -> Value {
    json!({ "nullValue": null })
}

fn get_string(fields: &Map<String, Value>, key: &str) -> Option<String> {
    fields
        .get(key)?
        .get("stringValue")?
        .as_str()
        .map(str::to_string)
}

/// Integers arrive as decimal strings; tolerate doubles written by older clients.
fn get_integer(fields: &Map<String, Value>, key: &str) -> Option<i64> {
    let value = fields.get(key)?;
    if let Some(raw) = value.get("integerValue") {
        return match raw {
            Value::String(s) => s.parse().ok(),
            Value::Number(n) => n.as_i64(),
            _ => None,
        };
    }
    value.get("doubleValue")?.as_f64().map(|f| f as i64)
}

fn get_timestamp(fields: &Map<String, Value>, key: &str) -> Option<DateTime<Utc>> {
    let raw = fields.get(key)?.get("timestampValue")?.as_str()?;
    parse_timestamp(raw)
}

fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Last path segment of a document name.
pub fn document_id(name: &str) -> Option<&str> {
    name.rsplit('/').next().filter(|id| !id.is_empty())
}

/// Decode a stored document, filling the defaults older records lack.
pub fn decode_entry(doc: &Document) -> Result<Entry> {
    let id = document_id(&doc.name)
        .ok_or_else(|| FeedError::InvalidDocument(format!("no id in {:?}", doc.name)))?;
    let fields = &doc.fields;

    let title = non_empty(get_string(fields, "title")).unwrap_or_else(|| DEFAULT_TITLE.to_string());
    let mut entry = Entry::new(id, title);
    entry.description = get_string(fields, "description").unwrap_or_default();
    entry.link =
        non_empty(get_string(fields, "link")).unwrap_or_else(|| PLACEHOLDER_LINK.to_string());
    entry.content_type = non_empty(get_string(fields, "contentType"))
        .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string());
    entry.access = get_string(fields, "access")
        .and_then(|a| Access::parse(&a))
        .unwrap_or_default();
    entry.status = get_string(fields, "status")
        .and_then(|s| EntryStatus::parse(&s))
        .unwrap_or_default();
    entry.hearts = get_integer(fields, "hearts").unwrap_or(0).max(0) as u64;
    entry.day = get_integer(fields, "day")
        .filter(|d| *d > 0)
        .map(|d| d.min(i64::from(u32::MAX)) as u32);
    entry.timestamp = get_timestamp(fields, "timestamp");
    entry.created_at = get_timestamp(fields, "createdAt")
        .or_else(|| doc.create_time.as_deref().and_then(parse_timestamp));
    entry.updated_at = get_timestamp(fields, "updatedAt");
    entry.image_url = non_empty(get_string(fields, "imageUrl"));
    entry.scheduled_for = get_timestamp(fields, "scheduledFor")
        .or_else(|| get_string(fields, "scheduledFor").and_then(|s| parse_timestamp(&s)));

    Ok(entry)
}

pub fn encode_fields(fields: &EntryFields) -> Map<String, Value> {
    let mut map = Map::new();
    map.insert("title".into(), string_value(&fields.title));
    map.insert("description".into(), string_value(&fields.description));
    map.insert("link".into(), string_value(&fields.link));
    map.insert("contentType".into(), string_value(&fields.content_type));
    map.insert("access".into(), string_value(fields.access.as_str()));
    map.insert("status".into(), string_value(fields.status.as_str()));
    map.insert("hearts".into(), integer_value(fields.hearts as i64));
    map.insert("day".into(), integer_value(i64::from(fields.day)));
    if let Some(image_url) = &fields.image_url {
        map.insert("imageUrl".into(), string_value(image_url));
    }
    if let Some(scheduled_for) = fields.scheduled_for {
        map.insert("scheduledFor".into(), timestamp_value(scheduled_for));
    }
    map
}

/// Encoded fields plus the update mask naming them.
pub fn encode_patch(patch: &EntryPatch) -> (Map<String, Value>, Vec<String>) {
    let mut map = Map::new();
    let mut mask = Vec::new();
    let mut put = |key: &str, value: Value| {
        map.insert(key.to_string(), value);
        mask.push(key.to_string());
    };

    if let Some(title) = &patch.title {
        put("title", string_value(title));
    }
    if let Some(description) = &patch.description {
        put("description", string_value(description));
    }
    if let Some(link) = &patch.link {
        put("link", string_value(link));
    }
    if let Some(content_type) = &patch.content_type {
        put("contentType", string_value(content_type));
    }
    if let Some(access) = patch.access {
        put("access", string_value(access.as_str()));
    }
    if let Some(status) = patch.status {
        put("status", string_value(status.as_str()));
    }
    if let Some(day) = patch.day {
        put("day", integer_value(i64::from(day)));
    }
    if let Some(image_url) = &patch.image_url {
        put("imageUrl", image_url.as_deref().map(string_value).unwrap_or_else(null_value));
    }
    if let Some(scheduled_for) = patch.scheduled_for {
        put("scheduledFor", scheduled_for.map(timestamp_value).unwrap_or_else(null_value));
    }

    (map, mask)
}

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub const DEFAULT_CONTENT_TYPE: &str = "Essay";
pub const DEFAULT_TITLE: &str = "Untitled";
pub const PLACEHOLDER_LINK: &str = "#";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum Access {
    #[default]
    Free,
    Paid,
}

impl Access {
    pub fn as_str(&self) -> &'static str {
        match self {
            Access::Free => "Free",
            Access::Paid => "Paid",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "Free" => Some(Access::Free),
            "Paid" => Some(Access::Paid),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    #[default]
    Draft,
    Scheduled,
    Published,
}

impl EntryStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryStatus::Draft => "draft",
            EntryStatus::Scheduled => "scheduled",
            EntryStatus::Published => "published",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "draft" => Some(EntryStatus::Draft),
            "scheduled" => Some(EntryStatus::Scheduled),
            "published" => Some(EntryStatus::Published),
            _ => None,
        }
    }
}

/// One feed item as held by the hosted store.
///
/// `day` is `None` when the stored record predates the field; the reconciler
/// fills it in from the creation timestamp when a snapshot arrives.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Entry {
    pub id: String,
    pub title: String,
    pub description: String,
    pub link: String,
    pub content_type: String,
    pub access: Access,
    pub status: EntryStatus,
    pub hearts: u64,
    pub day: Option<u32>,
    pub timestamp: Option<DateTime<Utc>>,
    pub created_at: Option<DateTime<Utc>>,
    pub updated_at: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
    pub scheduled_for: Option<DateTime<Utc>>,
}

impl Entry {
    pub fn new(id: impl Into<String>, title: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            description: String::new(),
            link: PLACEHOLDER_LINK.to_string(),
            content_type: DEFAULT_CONTENT_TYPE.to_string(),
            access: Access::Free,
            status: EntryStatus::Draft,
            hearts: 0,
            day: None,
            timestamp: None,
            created_at: None,
            updated_at: None,
            image_url: None,
            scheduled_for: None,
        }
    }

    pub fn is_published(&self) -> bool {
        self.status == EntryStatus::Published
    }

    /// Server creation time, preferring `timestamp` over the older `createdAt`.
    pub fn created(&self) -> Option<DateTime<Utc>> {
        self.timestamp.or(self.created_at)
    }

    /// Creation time in epoch millis; entries without one sort as zero.
    pub fn created_millis(&self) -> i64 {
        self.created().map(|t| t.timestamp_millis()).unwrap_or(0)
    }

    /// `needle` must already be lowercased.
    pub fn matches_search(&self, needle: &str) -> bool {
        needle.is_empty()
            || self.title.to_lowercase().contains(needle)
            || self.description.to_lowercase().contains(needle)
    }

    pub fn apply_fields(&mut self, fields: &EntryFields) {
        self.title = fields.title.clone();
        self.description = fields.description.clone();
        self.link = fields.link.clone();
        self.content_type = fields.content_type.clone();
        self.access = fields.access;
        self.status = fields.status;
        self.hearts = fields.hearts;
        self.day = Some(fields.day);
        self.image_url = fields.image_url.clone();
        self.scheduled_for = fields.scheduled_for;
    }
}

/// Writable fields for a new entry. Timestamps are assigned by the store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryFields {
    pub title: String,
    pub description: String,
    pub link: String,
    pub content_type: String,
    pub access: Access,
    pub status: EntryStatus,
    pub hearts: u64,
    pub day: u32,
    pub image_url: Option<String>,
    pub scheduled_for: Option<DateTime<Utc>>,
}

/// Partial update. `None` leaves the stored field untouched; the nested
/// options on `image_url` / `scheduled_for` allow clearing them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub link: Option<String>,
    pub content_type: Option<String>,
    pub access: Option<Access>,
    pub status: Option<EntryStatus>,
    pub day: Option<u32>,
    pub image_url: Option<Option<String>>,
    pub scheduled_for: Option<Option<DateTime<Utc>>>,
}

impl EntryPatch {
    pub fn is_empty(&self) -> bool {
        self == &EntryPatch::default()
    }

    pub fn apply_to(&self, entry: &mut Entry) {
        if let Some(title) = &self.title {
            entry.title = title.clone();
        }
        if let Some(description) = &self.description {
            entry.description = description.clone();
        }
        if let Some(link) = &self.link {
            entry.link = link.clone();
        }
        if let Some(content_type) = &self.content_type {
            entry.content_type = content_type.clone();
        }
        if let Some(access) = self.access {
            entry.access = access;
        }
        if let Some(status) = self.status {
            entry.status = status;
        }
        if let Some(day) = self.day {
            entry.day = Some(day);
        }
        if let Some(image_url) = &self.image_url {
            entry.image_url = image_url.clone();
        }
        if let Some(scheduled_for) = self.scheduled_for {
            entry.scheduled_for = scheduled_for;
        }
    }
}

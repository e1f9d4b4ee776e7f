use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::future::join_all;
use serde::{Deserialize, Serialize};

use crate::error::{FeedError, Result};
use crate::models::{
    Access, Entry, EntryFields, EntryPatch, EntryStatus, DEFAULT_CONTENT_TYPE, PLACEHOLDER_LINK,
};
use crate::services::sprint_clock::SprintCalendar;
use crate::services::store::{EntrySource, MutationSink, SnapshotScope};

fn placeholder_link() -> String {
    PLACEHOLDER_LINK.to_string()
}

fn default_status() -> EntryStatus {
    EntryStatus::Published
}

/// Form input for a new or edited entry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntryDraft {
    pub title: String,
    pub description: String,
    #[serde(default = "placeholder_link")]
    pub link: String,
    #[serde(default)]
    pub content_type: Option<String>,
    #[serde(default)]
    pub access: Option<Access>,
    #[serde(default)]
    pub image_url: Option<String>,
    #[serde(default = "default_status")]
    pub status: EntryStatus,
    #[serde(default)]
    pub scheduled_for: Option<DateTime<Utc>>,
}

impl EntryDraft {
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
            link: placeholder_link(),
            content_type: None,
            access: None,
            image_url: None,
            status: default_status(),
            scheduled_for: None,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.title.trim().is_empty() {
            return Err(FeedError::Validation("title is required".to_string()));
        }
        if self.description.trim().is_empty() {
            return Err(FeedError::Validation("description is required".to_string()));
        }
        let link = self.link.trim();
        if link.is_empty() {
            return Err(FeedError::Validation("link is required".to_string()));
        }
        if link != PLACEHOLDER_LINK && !link.starts_with("http://") && !link.starts_with("https://")
        {
            return Err(FeedError::Validation(format!("link {:?} is not a web address", link)));
        }
        if self.status == EntryStatus::Scheduled && self.scheduled_for.is_none() {
            return Err(FeedError::Validation(
                "scheduled entries need a publish time".to_string(),
            ));
        }
        Ok(())
    }

    /// Trimmed text; `scheduled_for` only survives on scheduled entries.
    fn normalized(mut self) -> Result<Self> {
        self.validate()?;
        self.title = self.title.trim().to_string();
        self.description = self.description.trim().to_string();
        self.link = self.link.trim().to_string();
        self.content_type = self
            .content_type
            .map(|c| c.trim().to_string())
            .filter(|c| !c.is_empty());
        self.image_url = self
            .image_url
            .map(|u| u.trim().to_string())
            .filter(|u| !u.is_empty());
        if self.status != EntryStatus::Scheduled {
            self.scheduled_for = None;
        }
        Ok(self)
    }

    /// Fields for a new entry, stamped with the sprint day it goes live on.
    pub fn into_fields(self, calendar: &SprintCalendar, now: DateTime<Utc>) -> Result<EntryFields> {
        let draft = self.normalized()?;
        let day = calendar.day_of(draft.scheduled_for.unwrap_or(now));
        Ok(EntryFields {
            title: draft.title,
            description: draft.description,
            link: draft.link,
            content_type: draft
                .content_type
                .unwrap_or_else(|| DEFAULT_CONTENT_TYPE.to_string()),
            access: draft.access.unwrap_or_default(),
            status: draft.status,
            hearts: 0,
            day,
            image_url: draft.image_url,
            scheduled_for: draft.scheduled_for,
        })
    }

    /// Patch for an edit. Hearts are never touched; the day only moves
    /// with a new publish time.
    pub fn into_patch(self, calendar: &SprintCalendar) -> Result<EntryPatch> {
        let draft = self.normalized()?;
        Ok(EntryPatch {
            day: draft.scheduled_for.map(|at| calendar.day_of(at)),
            title: Some(draft.title),
            description: Some(draft.description),
            link: Some(draft.link),
            content_type: draft.content_type,
            access: draft.access,
            status: Some(draft.status),
            image_url: Some(draft.image_url),
            scheduled_for: Some(draft.scheduled_for),
        })
    }
}

pub struct EntryAdmin {
    sink: Arc<dyn MutationSink>,
    source: Arc<dyn EntrySource>,
    calendar: SprintCalendar,
}

impl EntryAdmin {
    pub fn new(
        sink: Arc<dyn MutationSink>,
        source: Arc<dyn EntrySource>,
        calendar: SprintCalendar,
    ) -> Self {
        Self {
            sink,
            source,
            calendar,
        }
    }

    /// Every entry regardless of status, newest first.
    pub async fn list_all(&self) -> Result<Vec<Entry>> {
        self.source.fetch_snapshot(SnapshotScope::All).await
    }

    pub async fn create(&self, draft: EntryDraft, now: DateTime<Utc>) -> Result<String> {
        let fields = draft.into_fields(&self.calendar, now)?;
        let id = self.sink.create_entry(fields).await?;
        log::info!("[Admin] Created entry {}", id);
        Ok(id)
    }

    pub async fn update(&self, id: &str, draft: EntryDraft) -> Result<()> {
        let patch = draft.into_patch(&self.calendar)?;
        self.sink.update_entry(id, patch).await?;
        log::info!("[Admin] Updated entry {}", id);
        Ok(())
    }

    /// Mark an entry to go live at `when`, which must be in the future.
    pub async fn schedule(&self, id: &str, when: DateTime<Utc>, now: DateTime<Utc>) -> Result<()> {
        if when <= now {
            return Err(FeedError::Validation(
                "publish time must be in the future".to_string(),
            ));
        }
        let patch = EntryPatch {
            status: Some(EntryStatus::Scheduled),
            day: Some(self.calendar.day_of(when)),
            scheduled_for: Some(Some(when)),
            ..Default::default()
        };
        self.sink.update_entry(id, patch).await?;
        log::info!("[Admin] Scheduled entry {} for {}", id, when);
        Ok(())
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        self.sink.delete_entry(id).await?;
        log::info!("[Admin] Deleted entry {}", id);
        Ok(())
    }

    /// Publish every scheduled entry whose time has come, on today's sprint
    /// day. Returns the ids that were flipped; individual failures are
    /// logged and skipped.
    pub async fn publish_due(&self, now: DateTime<Utc>) -> Result<Vec<String>> {
        let day = self.calendar.day_of(now);
        let due: Vec<String> = self
            .list_all()
            .await?
            .into_iter()
            .filter(|e| e.status == EntryStatus::Scheduled)
            .filter(|e| e.scheduled_for.is_some_and(|at| at <= now))
            .map(|e| e.id)
            .collect();

        let writes = due.iter().map(|id| {
            let patch = EntryPatch {
                status: Some(EntryStatus::Published),
                day: Some(day),
                scheduled_for: Some(None),
                ..Default::default()
            };
            async move { (id, self.sink.update_entry(id, patch).await) }
        });

        let mut published = Vec::new();
        for (id, result) in join_all(writes).await {
            match result {
                Ok(()) => published.push(id.clone()),
                Err(e) => log::warn!("[Admin] Could not publish {}: {}", id, e),
            }
        }
        if !published.is_empty() {
            log::info!("[Admin] Published {} scheduled entries", published.len());
        }
        Ok(published)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::sprint_clock::SprintZone;
    use crate::services::store::MemoryStore;
    use chrono::{Duration, NaiveDate, TimeZone};

    fn calendar() -> SprintCalendar {
        SprintCalendar::new(NaiveDate::from_ymd_opt(2025, 10, 13).unwrap(), 90)
            .with_zone(SprintZone::Named(chrono_tz::UTC))
    }

    fn at(day: u32, hour: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 10, day, hour, 0, 0).unwrap()
    }

    fn admin(store: Arc<MemoryStore>) -> EntryAdmin {
        EntryAdmin::new(store.clone(), store, calendar())
    }

    #[test]
    fn test_validate_rejects_blank_and_bad_links() {
        assert!(EntryDraft::new("Title", "Body").validate().is_ok());
        assert!(EntryDraft::new("   ", "Body").validate().is_err());
        assert!(EntryDraft::new("Title", "\n").validate().is_err());

        let mut draft = EntryDraft::new("Title", "Body");
        draft.link = "ftp://example.com".to_string();
        assert!(matches!(draft.validate(), Err(FeedError::Validation(_))));

        draft.link = " https://example.com/post ".to_string();
        assert!(draft.validate().is_ok());

        draft.status = EntryStatus::Scheduled;
        assert!(draft.validate().is_err());
    }

    #[test]
    fn test_into_fields_applies_defaults() {
        let zoned = calendar();
        let mut draft = EntryDraft::new("  Day three ", " Notes ");
        draft.scheduled_for = Some(at(20, 9));

        let fields = draft.into_fields(&zoned, at(15, 12)).unwrap();
        assert_eq!(fields.title, "Day three");
        assert_eq!(fields.description, "Notes");
        assert_eq!(fields.link, "#");
        assert_eq!(fields.content_type, "Essay");
        assert_eq!(fields.access, Access::Free);
        assert_eq!(fields.status, EntryStatus::Published);
        assert_eq!(fields.hearts, 0);
        assert_eq!(fields.day, 3);
        assert_eq!(fields.scheduled_for, None);
    }

    #[test]
    fn test_into_fields_before_start_uses_day_one() {
        let zoned = calendar();
        let fields = EntryDraft::new("Teaser", "Soon")
            .into_fields(&zoned, at(1, 12))
            .unwrap();
        assert_eq!(fields.day, 1);
    }

    #[test]
    fn test_scheduled_draft_is_stamped_with_release_day() {
        let mut draft = EntryDraft::new("Week two", "Body");
        draft.status = EntryStatus::Scheduled;
        draft.scheduled_for = Some(at(22, 9));

        let fields = draft.clone().into_fields(&calendar(), at(15, 12)).unwrap();
        assert_eq!(fields.day, 10);
        assert_eq!(fields.scheduled_for, Some(at(22, 9)));

        let patch = draft.into_patch(&calendar()).unwrap();
        assert_eq!(patch.day, Some(10));
    }

    #[test]
    fn test_into_patch_leaves_hearts_alone() {
        let mut entry = Entry::new("a", "Old");
        entry.hearts = 7;
        entry.day = Some(4);

        let mut draft = EntryDraft::new("New", "Body");
        draft.access = Some(Access::Paid);
        draft.into_patch(&calendar()).unwrap().apply_to(&mut entry);

        assert_eq!(entry.title, "New");
        assert_eq!(entry.access, Access::Paid);
        assert_eq!(entry.hearts, 7);
        assert_eq!(entry.day, Some(4));
    }

    #[tokio::test]
    async fn test_create_edit_delete_flow() {
        let store = Arc::new(MemoryStore::new());
        let admin = admin(store.clone());

        let id = admin
            .create(EntryDraft::new("Hello", "World"), at(14, 10))
            .await
            .unwrap();
        let created = store.get(&id).await.unwrap();
        assert_eq!(created.day, Some(2));
        assert!(created.is_published());

        admin
            .update(&id, EntryDraft::new("Hello again", "World"))
            .await
            .unwrap();
        assert_eq!(store.get(&id).await.unwrap().title, "Hello again");

        assert!(admin.create(EntryDraft::new("", "x"), at(14, 10)).await.is_err());
        assert_eq!(admin.list_all().await.unwrap().len(), 1);

        admin.delete(&id).await.unwrap();
        assert!(admin.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_schedule_then_publish_due() {
        let store = Arc::new(MemoryStore::new());
        let admin = admin(store.clone());
        let now = at(14, 10);

        let mut draft = EntryDraft::new("Later", "Body");
        draft.status = EntryStatus::Draft;
        let id = admin.create(draft, now).await.unwrap();

        assert!(admin.schedule(&id, now - Duration::hours(1), now).await.is_err());
        admin
            .schedule(&id, now + Duration::hours(2), now)
            .await
            .unwrap();
        assert_eq!(store.get(&id).await.unwrap().status, EntryStatus::Scheduled);

        assert!(admin.publish_due(now).await.unwrap().is_empty());

        let published = admin.publish_due(now + Duration::hours(3)).await.unwrap();
        assert_eq!(published, vec![id.clone()]);
        let entry = store.get(&id).await.unwrap();
        assert!(entry.is_published());
        assert_eq!(entry.scheduled_for, None);
    }

    #[tokio::test]
    async fn test_publish_due_moves_entry_to_release_day() {
        let store = Arc::new(MemoryStore::new());
        let admin = admin(store.clone());

        let mut draft = EntryDraft::new("Later", "Body");
        draft.status = EntryStatus::Draft;
        let id = admin.create(draft, at(15, 10)).await.unwrap();
        assert_eq!(store.get(&id).await.unwrap().day, Some(3));

        admin.schedule(&id, at(22, 9), at(15, 10)).await.unwrap();
        assert_eq!(store.get(&id).await.unwrap().day, Some(10));

        let published = admin.publish_due(at(22, 9)).await.unwrap();
        assert_eq!(published, vec![id.clone()]);
        let entry = store.get(&id).await.unwrap();
        assert!(entry.is_published());
        assert_eq!(entry.day, Some(10));
    }

    #[tokio::test]
    async fn test_late_publish_lands_on_publish_day() {
        let store = Arc::new(MemoryStore::new());
        let admin = admin(store.clone());

        let mut draft = EntryDraft::new("Later", "Body");
        draft.status = EntryStatus::Scheduled;
        draft.scheduled_for = Some(at(22, 9));
        let id = admin.create(draft, at(15, 10)).await.unwrap();
        assert_eq!(store.get(&id).await.unwrap().day, Some(10));

        admin.publish_due(at(24, 8)).await.unwrap();
        assert_eq!(store.get(&id).await.unwrap().day, Some(12));
    }
}

pub mod admin;
pub mod feed;

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::models::Settings;
use crate::services::admin::EntryAdmin;
use crate::services::hearts::HeartLedger;
use crate::services::reconciler::FeedReconciler;
use crate::services::sprint_clock::SprintCalendar;
use crate::services::store::{EntrySource, MutationSink};

/// Shared handles the commands operate on.
pub struct AppState {
    pub settings: Settings,
    pub calendar: SprintCalendar,
    pub reconciler: Arc<Mutex<FeedReconciler>>,
    pub source: Arc<dyn EntrySource>,
    pub sink: Arc<dyn MutationSink>,
    pub admin: EntryAdmin,
}

impl AppState {
    pub fn new(
        settings: Settings,
        calendar: SprintCalendar,
        ledger: HeartLedger,
        source: Arc<dyn EntrySource>,
        sink: Arc<dyn MutationSink>,
    ) -> Self {
        let reconciler = FeedReconciler::new(calendar.clone(), settings.feed.page_size, ledger);
        let admin = EntryAdmin::new(sink.clone(), source.clone(), calendar.clone());
        Self {
            settings,
            calendar,
            reconciler: Arc::new(Mutex::new(reconciler)),
            source,
            sink,
            admin,
        }
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use crate::models::{Entry, EntryStatus};
    use crate::services::hearts::MemoryViewerStore;
    use crate::services::sprint_clock::SprintZone;
    use crate::services::store::MemoryStore;
    use chrono::{NaiveDate, TimeZone, Utc};

    pub fn published(id: &str, title: &str, day: u32) -> Entry {
        let mut entry = Entry::new(id, title);
        entry.status = EntryStatus::Published;
        entry.day = Some(day);
        entry.timestamp = Some(Utc.with_ymd_and_hms(2025, 10, 13, 9, day, 0).unwrap());
        entry
    }

    pub fn state(entries: Vec<Entry>) -> (AppState, Arc<MemoryStore>) {
        let store = Arc::new(MemoryStore::with_entries(entries));
        let calendar = SprintCalendar::new(NaiveDate::from_ymd_opt(2025, 10, 13).unwrap(), 90)
            .with_zone(SprintZone::Named(chrono_tz::UTC));
        let ledger = HeartLedger::load(Arc::new(MemoryViewerStore::new()));
        let state = AppState::new(
            Settings::default(),
            calendar,
            ledger,
            store.clone(),
            store.clone(),
        );
        (state, store)
    }
}

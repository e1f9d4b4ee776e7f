use std::collections::{HashMap, HashSet};

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::Mutex;

use crate::error::{FeedError, Result};
use crate::models::{
    Access, EmptyState, Entry, EntryCard, FeedControls, FeedCounters, FeedFilter, FeedSort,
    FeedView,
};
use crate::services::hearts::HeartLedger;
use crate::services::sprint_clock::SprintCalendar;
use crate::services::store::MutationSink;

const SECS_PER_DAY: f64 = 86_400.0;

/// Optimistic +1 on one entry, pending a snapshot that reflects it.
#[derive(Debug, Clone, Copy)]
struct PendingHeart {
    /// Stored count when the heart was applied.
    base: u64,
}

/// Proof that [`FeedReconciler::begin_heart`] applied a local heart.
#[derive(Debug, PartialEq, Eq)]
#[must_use = "a heart ticket must be confirmed or rolled back"]
pub struct HeartTicket {
    id: String,
}

impl HeartTicket {
    pub fn id(&self) -> &str {
        &self.id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum HeartOutcome {
    /// The heart was applied and the store accepted the increment.
    Applied { hearts: u64 },
    /// This viewer already hearted the entry; nothing changed.
    AlreadyHearted,
    /// The entry is not in the current snapshot.
    UnknownEntry,
}

pub struct FeedReconciler {
    calendar: SprintCalendar,
    page_size: usize,
    entries: Vec<Entry>,
    controls: FeedControls,
    visible_previous: usize,
    ledger: HeartLedger,
    overlay: HashMap<String, PendingHeart>,
    source_error: Option<String>,
}

impl FeedReconciler {
    pub fn new(calendar: SprintCalendar, page_size: usize, ledger: HeartLedger) -> Self {
        let page_size = page_size.max(1);
        Self {
            calendar,
            page_size,
            entries: Vec::new(),
            controls: FeedControls::default(),
            visible_previous: page_size,
            ledger,
            overlay: HashMap::new(),
            source_error: None,
        }
    }

    pub fn calendar(&self) -> &SprintCalendar {
        &self.calendar
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn controls(&self) -> &FeedControls {
        &self.controls
    }

    pub fn page_size(&self) -> usize {
        self.page_size
    }

    pub fn visible_previous(&self) -> usize {
        self.visible_previous
    }

    pub fn source_error(&self) -> Option<&str> {
        self.source_error.as_deref()
    }

    // ==================== Snapshots ====================

    /// Replace the working set with a fresh snapshot.
    ///
    /// Entries missing a day number get one from their creation time. The
    /// first occurrence of a duplicated id wins. A pending heart survives
    /// only while the snapshot still shows the pre-heart count, so the
    /// stored increment is never counted twice.
    pub fn apply_snapshot(&mut self, snapshot: Vec<Entry>) {
        let mut seen = HashSet::with_capacity(snapshot.len());
        let mut entries = Vec::with_capacity(snapshot.len());
        for mut entry in snapshot {
            if !seen.insert(entry.id.clone()) {
                log::warn!("[Reconciler] Dropping duplicate entry {}", entry.id);
                continue;
            }
            if entry.day.is_none() {
                entry.day = Some(entry.created().map(|t| self.calendar.day_of(t)).unwrap_or(1));
            }
            entries.push(entry);
        }

        self.overlay.retain(|id, pending| {
            entries
                .iter()
                .find(|e| &e.id == id)
                .map(|e| e.hearts <= pending.base)
                .unwrap_or(false)
        });

        log::debug!("[Reconciler] Snapshot with {} entries", entries.len());
        self.entries = entries;
        self.source_error = None;
    }

    /// The source failed: drop the working set and remember why. Pending
    /// hearts are kept so the next snapshot still shows them.
    pub fn apply_source_error(&mut self, error: &FeedError) {
        log::warn!("[Reconciler] Entry source failed: {}", error);
        self.entries.clear();
        self.source_error = Some(error.to_string());
    }

    // ==================== Controls ====================

    pub fn set_search_query(&mut self, query: impl Into<String>) {
        self.controls.search_query = query.into();
        self.reset_pagination();
    }

    pub fn set_filter(&mut self, filter: FeedFilter) {
        self.controls.filter = filter;
        self.reset_pagination();
    }

    pub fn set_sort(&mut self, sort: FeedSort) {
        self.controls.sort = sort;
        self.reset_pagination();
    }

    /// Show one more page of previous entries. Returns the new cursor.
    pub fn load_more(&mut self) -> usize {
        self.visible_previous = self.visible_previous.saturating_add(self.page_size);
        self.visible_previous
    }

    fn reset_pagination(&mut self) {
        self.visible_previous = self.page_size;
    }

    // ==================== Hearts ====================

    pub fn is_hearted(&self, id: &str) -> bool {
        self.ledger.is_hearted(id)
    }

    /// Stored count plus this viewer's pending heart, if any.
    pub fn displayed_hearts(&self, id: &str) -> Option<u64> {
        let entry = self.entries.iter().find(|e| e.id == id)?;
        Some(self.displayed_count(entry))
    }

    fn displayed_count(&self, entry: &Entry) -> u64 {
        match self.overlay.get(&entry.id) {
            Some(_) => entry.hearts + 1,
            None => entry.hearts,
        }
    }

    /// Mark the entry hearted and show +1 right away.
    ///
    /// Returns `None` when the viewer already hearted it or the entry is
    /// not in the snapshot; in both cases nothing changes.
    pub fn begin_heart(&mut self, id: &str) -> Option<HeartTicket> {
        if self.ledger.is_hearted(id) {
            return None;
        }
        let base = self.entries.iter().find(|e| e.id == id)?.hearts;

        self.ledger.mark(id);
        self.overlay.insert(id.to_string(), PendingHeart { base });
        Some(HeartTicket { id: id.to_string() })
    }

    /// The store accepted the increment. The overlay stays until a snapshot
    /// carries the new count.
    pub fn confirm_heart(&mut self, ticket: HeartTicket) {
        log::debug!("[Reconciler] Heart on {} confirmed", ticket.id);
    }

    /// The store rejected the increment: forget the heart and the +1.
    pub fn rollback_heart(&mut self, ticket: HeartTicket) {
        self.overlay.remove(&ticket.id);
        self.ledger.unmark(&ticket.id);
        log::info!("[Reconciler] Heart on {} rolled back", ticket.id);
    }

    // ==================== View ====================

    pub fn view(&self) -> FeedView {
        self.view_at(Utc::now())
    }

    pub fn view_at(&self, now: DateTime<Utc>) -> FeedView {
        let current_day = self.calendar.current_day(now);
        let filtered = self.filtered_cards(now);

        let (today, previous): (Vec<EntryCard>, Vec<EntryCard>) = filtered
            .iter()
            .filter(|card| card_day(card) <= current_day)
            .cloned()
            .partition(|card| card_day(card) == current_day);

        let has_more_previous = previous.len() > self.visible_previous;
        let previous: Vec<EntryCard> = previous.into_iter().take(self.visible_previous).collect();

        let counters = self.counters(today.len());

        let empty_state = if today.is_empty() && previous.is_empty() {
            Some(if self.controls.is_narrowed() {
                EmptyState::NoMatches
            } else {
                EmptyState::NoEntries
            })
        } else {
            None
        };

        FeedView {
            current_day,
            today,
            previous,
            has_more_previous,
            counters,
            empty_state,
            source_error: self.source_error.clone(),
        }
    }

    /// Published entries passing search and filter, in display order.
    pub(crate) fn filtered_cards(&self, now: DateTime<Utc>) -> Vec<EntryCard> {
        let needle = self.controls.search_query.trim().to_lowercase();

        let mut cards: Vec<EntryCard> = self
            .entries
            .iter()
            .filter(|e| e.is_published())
            .filter(|e| e.matches_search(&needle))
            .filter(|e| self.controls.filter.matches(e))
            .map(|e| {
                let mut entry = e.clone();
                entry.hearts = self.displayed_count(e);
                EntryCard {
                    hearted: self.ledger.is_hearted(&e.id),
                    entry,
                }
            })
            .collect();

        sort_cards(&mut cards, self.controls.sort, now);
        cards
    }

    fn counters(&self, today: usize) -> FeedCounters {
        let published: Vec<&Entry> = self.entries.iter().filter(|e| e.is_published()).collect();
        let days: HashSet<u32> = published.iter().filter_map(|e| e.day).collect();

        FeedCounters {
            total: published.len(),
            today,
            free: published.iter().filter(|e| e.access == Access::Free).count(),
            paid: published.iter().filter(|e| e.access == Access::Paid).count(),
            streak: days.len(),
        }
    }
}

fn card_day(card: &EntryCard) -> u32 {
    card.entry.day.unwrap_or(1)
}

/// Hearts per day of age, with a one-day bias so new entries don't spike.
fn trending_score(entry: &Entry, now: DateTime<Utc>) -> f64 {
    let created_secs = entry.created().map(|t| t.timestamp()).unwrap_or(0);
    let age_days = ((now.timestamp() - created_secs).max(0) as f64) / SECS_PER_DAY;
    entry.hearts as f64 / (age_days + 1.0)
}

fn sort_cards(cards: &mut [EntryCard], sort: FeedSort, now: DateTime<Utc>) {
    match sort {
        FeedSort::Newest => cards.sort_by_key(|c| std::cmp::Reverse(c.entry.created_millis())),
        FeedSort::Oldest => cards.sort_by_key(|c| c.entry.created_millis()),
        FeedSort::MostLoved => cards.sort_by_key(|c| std::cmp::Reverse(c.entry.hearts)),
        FeedSort::Trending => cards.sort_by(|a, b| {
            trending_score(&b.entry, now)
                .partial_cmp(&trending_score(&a.entry, now))
                .unwrap_or(std::cmp::Ordering::Equal)
        }),
    }
}

/// Heart `id` end to end: local change, remote increment, then confirm or
/// roll back. The lock is released while the increment is in flight.
pub async fn send_heart(
    reconciler: &Mutex<FeedReconciler>,
    sink: &dyn MutationSink,
    id: &str,
) -> Result<HeartOutcome> {
    let ticket = {
        let mut feed = reconciler.lock().await;
        if feed.is_hearted(id) {
            return Ok(HeartOutcome::AlreadyHearted);
        }
        match feed.begin_heart(id) {
            Some(ticket) => ticket,
            None => return Ok(HeartOutcome::UnknownEntry),
        }
    };

    let result = sink.increment_heart(id).await;

    let mut feed = reconciler.lock().await;
    match result {
        Ok(()) => {
            feed.confirm_heart(ticket);
            let hearts = feed.displayed_hearts(id).unwrap_or_default();
            Ok(HeartOutcome::Applied { hearts })
        }
        Err(e) => {
            feed.rollback_heart(ticket);
            Err(FeedError::Mutation {
                id: id.to_string(),
                message: e.to_string(),
            })
        }
    }
}

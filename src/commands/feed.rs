use chrono::Utc;
use serde::Serialize;

use super::AppState;
use crate::models::{FeedFilter, FeedSort, FeedView};
use crate::services::feed_sync::refresh_once;
use crate::services::reconciler::{send_heart, HeartOutcome};
use crate::services::sprint_clock::{SprintPhase, ThemeBanner};
use crate::services::store::SnapshotScope;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SprintStatus {
    pub current_day: u32,
    pub total_days: u32,
    pub phase: SprintPhase,
    pub banner: Option<ThemeBanner>,
    pub date_range: String,
}

pub async fn get_feed_view(state: &AppState) -> Result<FeedView, String> {
    Ok(state.reconciler.lock().await.view())
}

pub async fn set_search_query(state: &AppState, query: String) -> Result<FeedView, String> {
    let mut feed = state.reconciler.lock().await;
    feed.set_search_query(query);
    Ok(feed.view())
}

/// `all`, `Free`, `Paid`, or a content type name.
pub async fn set_filter(state: &AppState, filter: String) -> Result<FeedView, String> {
    let mut feed = state.reconciler.lock().await;
    feed.set_filter(FeedFilter::from(filter));
    Ok(feed.view())
}

pub async fn set_sort(state: &AppState, sort: String) -> Result<FeedView, String> {
    let sort = FeedSort::parse(&sort).ok_or_else(|| format!("Unknown sort order: {}", sort))?;
    let mut feed = state.reconciler.lock().await;
    feed.set_sort(sort);
    Ok(feed.view())
}

pub async fn load_more(state: &AppState) -> Result<FeedView, String> {
    let mut feed = state.reconciler.lock().await;
    feed.load_more();
    Ok(feed.view())
}

pub async fn heart_entry(state: &AppState, id: String) -> Result<HeartOutcome, String> {
    send_heart(&state.reconciler, state.sink.as_ref(), &id)
        .await
        .map_err(|e| e.to_string())
}

pub async fn refresh_feed(state: &AppState) -> Result<FeedView, String> {
    refresh_once(state.source.as_ref(), &state.reconciler, SnapshotScope::Published)
        .await
        .map_err(|e| e.to_string())?;
    get_feed_view(state).await
}

pub async fn get_sprint_status(state: &AppState) -> Result<SprintStatus, String> {
    let now = Utc::now();
    let calendar = &state.calendar;
    Ok(SprintStatus {
        current_day: calendar.current_day(now),
        total_days: calendar.total_days(),
        phase: calendar.phase(now),
        banner: calendar.weekly_theme(now, &state.settings.sprint.weekly_themes),
        date_range: calendar.date_range_label(),
    })
}

use chrono::{DateTime, Utc};

use super::AppState;
use crate::models::Entry;
use crate::services::admin::EntryDraft;

pub async fn list_entries(state: &AppState) -> Result<Vec<Entry>, String> {
    state.admin.list_all().await.map_err(|e| e.to_string())
}

pub async fn create_entry(state: &AppState, draft: EntryDraft) -> Result<String, String> {
    state
        .admin
        .create(draft, Utc::now())
        .await
        .map_err(|e| e.to_string())
}

pub async fn update_entry(state: &AppState, id: String, draft: EntryDraft) -> Result<(), String> {
    state.admin.update(&id, draft).await.map_err(|e| e.to_string())
}

/// `publish_at` is an RFC 3339 timestamp.
pub async fn schedule_entry(
    state: &AppState,
    id: String,
    publish_at: String,
) -> Result<(), String> {
    let when = DateTime::parse_from_rfc3339(publish_at.trim())
        .map_err(|e| format!("Invalid publish time {:?}: {}", publish_at, e))?
        .with_timezone(&Utc);
    state
        .admin
        .schedule(&id, when, Utc::now())
        .await
        .map_err(|e| e.to_string())
}

pub async fn delete_entry(state: &AppState, id: String) -> Result<(), String> {
    state.admin.delete(&id).await.map_err(|e| e.to_string())
}

pub async fn publish_due_entries(state: &AppState) -> Result<Vec<String>, String> {
    state
        .admin
        .publish_due(Utc::now())
        .await
        .map_err(|e| e.to_string())
}

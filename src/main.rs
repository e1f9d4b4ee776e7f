use std::sync::Arc;
use std::time::Duration;

use sprintfeed::commands::{self, AppState};
use sprintfeed::database;
use sprintfeed::services::feed_sync::{apply_events, spawn_feed_sync};
use sprintfeed::services::firestore::{FirestoreClient, FirestoreConfig};
use sprintfeed::services::hearts::{HeartLedger, SqliteViewerStore};
use sprintfeed::services::sprint_clock::{start_day_ticker, SprintCalendar};
use sprintfeed::services::store::{EntrySource, MemoryStore, MutationSink, SnapshotScope};
use sprintfeed::utils::config;

const SUMMARY_INTERVAL_SECS: u64 = 300;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    config::load_dotenv();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let data_dir = config::data_dir();
    std::fs::create_dir_all(&data_dir)?;

    // Write defaults on first run so the file is there to edit; secrets stay in the environment.
    if !config::settings_path(&data_dir).exists() {
        config::save_settings(&data_dir, &Default::default())?;
        log::info!(
            "[Main] Wrote default settings to {}",
            config::settings_path(&data_dir).display()
        );
    }
    let settings = config::load_settings(&data_dir);

    let conn = database::init_database(&data_dir.join(&settings.storage.db_file))?;
    let ledger = HeartLedger::load(Arc::new(SqliteViewerStore::new(conn)));
    log::info!("[Main] {} entries hearted on this device", ledger.len());

    let calendar = SprintCalendar::from_settings(&settings.sprint)?;

    let (source, sink): (Arc<dyn EntrySource>, Arc<dyn MutationSink>) =
        match FirestoreClient::new(FirestoreConfig::from(&settings.store)) {
            Ok(client) => {
                let client = Arc::new(client);
                (client.clone(), client)
            }
            Err(e) => {
                log::warn!("[Main] {}; serving an empty in-memory feed", e);
                let store = Arc::new(MemoryStore::new());
                (store.clone(), store)
            }
        };

    let poll_every = Duration::from_secs(settings.feed.poll_interval_secs.max(1));
    let tick_every = Duration::from_secs(settings.sprint.day_tick_secs.max(1));
    let can_publish = settings.store.id_token.is_some();
    let state = AppState::new(settings, calendar.clone(), ledger, source, sink);

    let (events, sync_task) =
        spawn_feed_sync(state.source.clone(), SnapshotScope::Published, poll_every);
    let apply_task = tokio::spawn(apply_events(events, state.reconciler.clone()));
    let mut day = start_day_ticker(calendar.clone(), tick_every);

    log::info!(
        "[Main] Sprint {} (day {} of {})",
        calendar.date_range_label(),
        *day.borrow(),
        calendar.total_days()
    );

    let mut summary = tokio::time::interval(Duration::from_secs(SUMMARY_INTERVAL_SECS));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            _ = &mut shutdown => {
                log::info!("[Main] Shutting down");
                break;
            }
            changed = day.changed() => {
                if changed.is_err() {
                    break;
                }
                let current = *day.borrow();
                log::info!("[Main] Sprint day is now {}", current);
            }
            _ = summary.tick() => {
                log_summary(&state).await;
                if can_publish {
                    match commands::admin::publish_due_entries(&state).await {
                        Ok(ids) if !ids.is_empty() => log::info!("[Main] Published {:?}", ids),
                        Ok(_) => {}
                        Err(e) => log::warn!("[Main] Scheduled publish failed: {}", e),
                    }
                }
            }
        }
    }

    sync_task.abort();
    apply_task.abort();
    Ok(())
}

async fn log_summary(state: &AppState) {
    match commands::feed::get_feed_view(state).await {
        Ok(view) => {
            if let Some(error) = &view.source_error {
                log::warn!("[Main] Feed unavailable: {}", error);
            }
            log::info!(
                "[Main] Day {}: {} published, {} today, {} free, {} paid, streak {}",
                view.current_day,
                view.counters.total,
                view.counters.today,
                view.counters.free,
                view.counters.paid,
                view.counters.streak
            );
        }
        Err(e) => log::warn!("[Main] Could not build feed view: {}", e),
    }
}

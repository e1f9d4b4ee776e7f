use anyhow::Result;
use rusqlite::Connection;

pub fn create_tables(conn: &Connection) -> Result<()> {
    // Per-viewer key/value state, e.g. the hearted-entries map
    conn.execute(
        "CREATE TABLE IF NOT EXISTS viewer_state (
            key TEXT PRIMARY KEY,
            value BLOB NOT NULL,
            updated_at INTEGER NOT NULL
        )",
        [],
    )?;

    Ok(())
}

use rusqlite::{Connection, OptionalExtension, Result};

pub fn get_viewer_value(conn: &Connection, key: &str) -> Result<Option<Vec<u8>>> {
    conn.query_row(
        "SELECT value FROM viewer_state WHERE key = ?1",
        [key],
        |row| row.get(0),
    )
    .optional()
}

pub fn put_viewer_value(conn: &Connection, key: &str, value: &[u8]) -> Result<()> {
    let now = chrono::Utc::now().timestamp();

    conn.execute(
        "INSERT INTO viewer_state (key, value, updated_at)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(key) DO UPDATE SET
             value = excluded.value,
             updated_at = excluded.updated_at",
        rusqlite::params![key, value, now],
    )?;

    Ok(())
}

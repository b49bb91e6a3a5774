use rusqlite::Connection;

pub mod read;
pub mod write;

pub fn initialise_tables(conn: &mut Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS applicants (
            user_id INTEGER PRIMARY KEY,
            submitted_at TEXT NOT NULL,
            status TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS pending_reviews (
            message_id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            field_data TEXT NOT NULL
        );
        CREATE TABLE IF NOT EXISTS draft_sessions (
            message_id INTEGER PRIMARY KEY,
            user_id INTEGER NOT NULL,
            field_data TEXT NOT NULL,
            opened_at INTEGER NOT NULL
        );
        ",
    )
}

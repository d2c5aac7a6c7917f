//! Anonymous reporter registration.

use duckdb::Connection;
use pothole_map_database_models::ReporterRow;

use crate::DbError;
use crate::time::format_timestamp;

/// Registers a reporter and returns the stored row.
///
/// Blank display names are stored as `NULL`.
///
/// # Errors
///
/// Returns [`DbError`] if the insert fails.
pub fn create_reporter(
    conn: &Connection,
    display_name: Option<&str>,
) -> Result<ReporterRow, DbError> {
    let id = uuid::Uuid::new_v4().to_string();
    let display_name = display_name
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(ToString::to_string);
    let created_at = chrono::Utc::now();

    conn.execute(
        "INSERT INTO reporters (id, display_name, created_at) VALUES (?, ?, ?)",
        duckdb::params![id, display_name.as_deref(), format_timestamp(&created_at)],
    )?;

    log::debug!("Registered reporter {id}");

    Ok(ReporterRow {
        id,
        display_name,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DefectStore;
    use crate::time::parse_timestamp;

    fn get_reporter(conn: &Connection, id: &str) -> Result<Option<ReporterRow>, DbError> {
        let mut stmt =
            conn.prepare("SELECT id, display_name, created_at::VARCHAR FROM reporters WHERE id = ?")?;
        let mut rows = stmt.query([id])?;

        let Some(row) = rows.next()? else {
            return Ok(None);
        };
        let created_at: String = row.get(2)?;

        Ok(Some(ReporterRow {
            id: row.get(0)?,
            display_name: row.get(1)?,
            created_at: parse_timestamp(&created_at)?,
        }))
    }

    #[test]
    fn registers_and_fetches() {
        let store = DefectStore::open_in_memory(1).unwrap();
        let conn = store.acquire().unwrap();

        let created = create_reporter(&conn, Some("  vecino  ")).unwrap();
        assert_eq!(created.display_name.as_deref(), Some("vecino"));

        let fetched = get_reporter(&conn, &created.id).unwrap().unwrap();
        assert_eq!(fetched.id, created.id);
        assert_eq!(fetched.display_name.as_deref(), Some("vecino"));
    }

    #[test]
    fn blank_name_is_anonymous() {
        let store = DefectStore::open_in_memory(1).unwrap();
        let conn = store.acquire().unwrap();

        let created = create_reporter(&conn, Some("   ")).unwrap();
        assert_eq!(created.display_name, None);
        assert!(get_reporter(&conn, "missing").unwrap().is_none());
    }
}

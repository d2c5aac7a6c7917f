//! Canonical defect reads and moderation patches.

use std::collections::BTreeMap;
use std::str::FromStr as _;

use duckdb::Connection;
use duckdb::types::Value;
use pothole_map_database_models::{DefectPatch, DefectRow, PhotoRow, ReportRow};
use pothole_map_defect_models::{Coordinate, SeverityHint};

use crate::DbError;
use crate::candidates::parse_status;
use crate::time::{format_timestamp, parse_timestamp};

/// Errors returned by [`patch_defect`].
#[derive(Debug, thiserror::Error)]
pub enum PatchError {
    /// The patch did not set any field.
    #[error("No updatable fields given")]
    NoFields,

    /// No defect has the given id.
    #[error("Defect {id} not found")]
    NotFound {
        /// The requested id.
        id: String,
    },

    /// The update statement failed.
    #[error("Failed to patch defect: {0}")]
    Persistence(#[from] DbError),
}

/// Fetches one defect by id, or `None` if it does not exist.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a stored value cannot be
/// converted.
pub fn get_defect(conn: &Connection, id: &str) -> Result<Option<DefectRow>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT id, latitude, longitude, geom_wkt, address_text, length_m, width_m, depth_m,
                status, verified, priority_score, duplicate_cluster_id, report_count,
                first_report_at::VARCHAR, last_report_at::VARCHAR,
                created_at::VARCHAR, updated_at::VARCHAR
         FROM defects
         WHERE id = ?",
    )?;
    let mut rows = stmt.query([id])?;

    let Some(row) = rows.next()? else {
        return Ok(None);
    };

    let status: String = row.get(8)?;
    let first_report_at: String = row.get(13)?;
    let last_report_at: String = row.get(14)?;
    let created_at: String = row.get(15)?;
    let updated_at: String = row.get(16)?;

    Ok(Some(DefectRow {
        id: row.get(0)?,
        coordinate: Coordinate::new(row.get(1)?, row.get(2)?),
        geom_wkt: row.get(3)?,
        address_text: row.get(4)?,
        length_m: row.get(5)?,
        width_m: row.get(6)?,
        depth_m: row.get(7)?,
        status: parse_status(&status)?,
        verified: row.get(9)?,
        priority_score: row.get(10)?,
        duplicate_cluster_id: row.get(11)?,
        report_count: row.get(12)?,
        first_report_at: parse_timestamp(&first_report_at)?,
        last_report_at: parse_timestamp(&last_report_at)?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    }))
}

/// Applies a moderation patch to one defect.
///
/// Only the fields present in `patch` are written (`Some(None)` stores
/// `NULL`), and `updated_at` is refreshed. `report_count` is never touched
/// here.
///
/// # Errors
///
/// * [`PatchError::NoFields`] if `patch` is empty.
/// * [`PatchError::NotFound`] if no defect has this id.
/// * [`PatchError::Persistence`] if the update fails.
pub fn patch_defect(conn: &Connection, id: &str, patch: &DefectPatch) -> Result<(), PatchError> {
    if patch.is_empty() {
        return Err(PatchError::NoFields);
    }

    let mut assignments: Vec<&str> = Vec::new();
    let mut params: Vec<Value> = Vec::new();

    let mut set = |column: &'static str, value: Value| {
        assignments.push(column);
        params.push(value);
    };

    if let Some(address_text) = &patch.address_text {
        set("address_text", nullable(address_text.clone(), Value::Text));
    }
    if let Some(length_m) = patch.length_m {
        set("length_m", nullable(length_m, Value::Double));
    }
    if let Some(width_m) = patch.width_m {
        set("width_m", nullable(width_m, Value::Double));
    }
    if let Some(depth_m) = patch.depth_m {
        set("depth_m", nullable(depth_m, Value::Double));
    }
    if let Some(status) = patch.status {
        set("status", Value::Text(status.as_ref().to_string()));
    }
    if let Some(verified) = patch.verified {
        set("verified", Value::Boolean(verified));
    }
    if let Some(priority_score) = patch.priority_score {
        set("priority_score", nullable(priority_score, Value::Double));
    }
    if let Some(duplicate_cluster_id) = &patch.duplicate_cluster_id {
        set(
            "duplicate_cluster_id",
            nullable(duplicate_cluster_id.clone(), Value::Text),
        );
    }

    let mut sql = String::from("UPDATE defects SET ");
    for column in &assignments {
        sql.push_str(column);
        sql.push_str(" = ?, ");
    }
    sql.push_str("updated_at = CAST(? AS TIMESTAMP) WHERE id = ?");
    params.push(Value::Text(format_timestamp(&chrono::Utc::now())));
    params.push(Value::Text(id.to_string()));

    let updated = conn
        .execute(&sql, duckdb::params_from_iter(params))
        .map_err(DbError::from)?;

    if updated == 0 {
        return Err(PatchError::NotFound { id: id.to_string() });
    }

    log::info!("Patched defect {id}: {}", assignments.join(", "));

    Ok(())
}

fn nullable<T>(value: Option<T>, wrap: impl FnOnce(T) -> Value) -> Value {
    value.map_or(Value::Null, wrap)
}

/// Lists the reports associated with a defect, newest first, each with its
/// photos.
///
/// # Errors
///
/// Returns [`DbError`] if a query fails or a stored value cannot be
/// converted.
pub fn list_reports_for_defect(
    conn: &Connection,
    defect_id: &str,
) -> Result<Vec<ReportRow>, DbError> {
    let mut photos = photos_by_report(conn, defect_id)?;

    let mut stmt = conn.prepare(
        "SELECT id, defect_id, reporter_id, latitude, longitude, description, severity,
                photo_count, source, context_tag, created_at::VARCHAR
         FROM reports
         WHERE defect_id = ?
         ORDER BY created_at DESC, id",
    )?;
    let mut rows = stmt.query([defect_id])?;

    let mut reports = Vec::new();
    while let Some(row) = rows.next()? {
        let id: String = row.get(0)?;
        let severity: Option<String> = row.get(6)?;
        let created_at: String = row.get(10)?;

        let severity = severity
            .map(|s| {
                SeverityHint::from_str(&s).map_err(|e| DbError::Conversion {
                    message: format!("unknown severity {s:?}: {e}"),
                })
            })
            .transpose()?;

        reports.push(ReportRow {
            photos: photos.remove(&id).unwrap_or_default(),
            id,
            defect_id: row.get(1)?,
            reporter_id: row.get(2)?,
            coordinate: Coordinate::new(row.get(3)?, row.get(4)?),
            description: row.get(5)?,
            severity,
            photo_count: row.get(7)?,
            source: row.get(8)?,
            context_tag: row.get(9)?,
            created_at: parse_timestamp(&created_at)?,
        });
    }

    Ok(reports)
}

fn photos_by_report(
    conn: &Connection,
    defect_id: &str,
) -> Result<BTreeMap<String, Vec<PhotoRow>>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT id, report_id, defect_id, reporter_id, url, thumbnail_url, metadata,
                created_at::VARCHAR
         FROM photos
         WHERE defect_id = ?
         ORDER BY created_at, id",
    )?;
    let mut rows = stmt.query([defect_id])?;

    let mut by_report: BTreeMap<String, Vec<PhotoRow>> = BTreeMap::new();
    while let Some(row) = rows.next()? {
        let metadata: String = row.get(6)?;
        let created_at: String = row.get(7)?;

        let photo = PhotoRow {
            id: row.get(0)?,
            report_id: row.get(1)?,
            defect_id: row.get(2)?,
            reporter_id: row.get(3)?,
            url: row.get(4)?,
            thumbnail_url: row.get(5)?,
            metadata: serde_json::from_str(&metadata).map_err(|e| DbError::Conversion {
                message: format!("invalid photo metadata: {e}"),
            })?,
            created_at: parse_timestamp(&created_at)?,
        };

        by_report
            .entry(photo.report_id.clone())
            .or_default()
            .push(photo);
    }

    Ok(by_report)
}

#[cfg(test)]
mod tests {
    use pothole_map_defect_models::DefectStatus;

    use super::*;
    use crate::candidates::tests::insert_defect;
    use crate::store::DefectStore;

    const ORIGIN: Coordinate = Coordinate::new(19.0, -98.2);

    #[test]
    fn missing_defect_is_none() {
        let store = DefectStore::open_in_memory(1).unwrap();
        let conn = store.acquire().unwrap();
        assert!(get_defect(&conn, "nope").unwrap().is_none());
    }

    #[test]
    fn empty_patch_is_rejected() {
        let store = DefectStore::open_in_memory(1).unwrap();
        let conn = store.acquire().unwrap();
        insert_defect(&conn, "d1", ORIGIN, None);

        assert!(matches!(
            patch_defect(&conn, "d1", &DefectPatch::default()),
            Err(PatchError::NoFields)
        ));
    }

    #[test]
    fn patch_writes_only_given_fields() {
        let store = DefectStore::open_in_memory(1).unwrap();
        let conn = store.acquire().unwrap();
        insert_defect(&conn, "d1", ORIGIN, Some(1.0));
        let before = get_defect(&conn, "d1").unwrap().unwrap();

        let patch = DefectPatch {
            address_text: Some(Some("Av. Reforma 100".to_string())),
            depth_m: Some(Some(0.12)),
            status: Some(DefectStatus::Confirmed),
            verified: Some(true),
            ..DefectPatch::default()
        };
        patch_defect(&conn, "d1", &patch).unwrap();

        let after = get_defect(&conn, "d1").unwrap().unwrap();
        assert_eq!(after.address_text.as_deref(), Some("Av. Reforma 100"));
        assert_eq!(after.depth_m, Some(0.12));
        assert_eq!(after.status, DefectStatus::Confirmed);
        assert!(after.verified);

        assert_eq!(after.priority_score, Some(1.0));
        assert_eq!(after.length_m, None);
        assert_eq!(after.width_m, None);
        assert_eq!(after.duplicate_cluster_id, None);
        assert_eq!(after.report_count, before.report_count);
        assert_eq!(after.last_report_at, before.last_report_at);
        assert!(after.updated_at > before.updated_at);
    }

    #[test]
    fn patch_links_duplicates_and_scores() {
        let store = DefectStore::open_in_memory(1).unwrap();
        let conn = store.acquire().unwrap();
        insert_defect(&conn, "d1", ORIGIN, None);

        let patch = DefectPatch {
            duplicate_cluster_id: Some(Some("cluster-7".to_string())),
            priority_score: Some(Some(8.25)),
            length_m: Some(Some(1.5)),
            width_m: Some(Some(0.8)),
            ..DefectPatch::default()
        };
        patch_defect(&conn, "d1", &patch).unwrap();

        let after = get_defect(&conn, "d1").unwrap().unwrap();
        assert_eq!(after.duplicate_cluster_id.as_deref(), Some("cluster-7"));
        assert_eq!(after.priority_score, Some(8.25));
        assert_eq!(after.length_m, Some(1.5));
        assert_eq!(after.width_m, Some(0.8));
    }

    #[test]
    fn patch_clears_nullable_fields() {
        let store = DefectStore::open_in_memory(1).unwrap();
        let conn = store.acquire().unwrap();
        insert_defect(&conn, "d1", ORIGIN, Some(3.0));

        let link = DefectPatch {
            duplicate_cluster_id: Some(Some("cluster-7".to_string())),
            ..DefectPatch::default()
        };
        patch_defect(&conn, "d1", &link).unwrap();

        let unlink = DefectPatch {
            duplicate_cluster_id: Some(None),
            priority_score: Some(None),
            ..DefectPatch::default()
        };
        patch_defect(&conn, "d1", &unlink).unwrap();

        let after = get_defect(&conn, "d1").unwrap().unwrap();
        assert_eq!(after.duplicate_cluster_id, None);
        assert_eq!(after.priority_score, None);
        assert_eq!(after.report_count, 1);
    }

    #[test]
    fn patch_unknown_id_is_not_found() {
        let store = DefectStore::open_in_memory(1).unwrap();
        let conn = store.acquire().unwrap();

        let patch = DefectPatch {
            verified: Some(true),
            ..DefectPatch::default()
        };
        assert!(matches!(
            patch_defect(&conn, "ghost", &patch),
            Err(PatchError::NotFound { id }) if id == "ghost"
        ));
    }

    #[test]
    fn defect_without_reports_lists_nothing() {
        let store = DefectStore::open_in_memory(1).unwrap();
        let conn = store.acquire().unwrap();
        insert_defect(&conn, "d1", ORIGIN, None);
        assert!(list_reports_for_defect(&conn, "d1").unwrap().is_empty());
    }
}

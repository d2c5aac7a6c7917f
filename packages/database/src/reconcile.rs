//! Report-to-defect reconciliation.
//!
//! Each submitted report runs as one `DuckDB` transaction:
//!
//! 1. Locate candidate defects inside the search box around the report.
//! 2. Rank them by haversine distance and pick the nearest one within the
//!    match threshold.
//! 3. **Create path**: insert the new defect first (`report_count = 1`),
//!    then write the report and photo rows pointing at it.
//!    **Attach path**: write the report and photo rows pointing at the
//!    match, then bump its aggregates with a single conditional `UPDATE`.
//! 4. Commit.
//!
//! The transaction rolls back when dropped, so any error between `BEGIN`
//! and `COMMIT` leaves the store exactly as it was.

use chrono::{DateTime, Utc};
use duckdb::Connection;
use pothole_map_database_models::SubmittedReport;
use pothole_map_defect_models::{Coordinate, ReportSubmission, ValidReport, ValidationError};
use pothole_map_spatial::matching::{MatchConfig, MatchDecision, select_match};

use crate::DbError;
use crate::store::DefectStore;
use crate::time::format_timestamp;

/// Errors returned by [`submit_report`].
#[derive(Debug, thiserror::Error)]
pub enum SubmitError {
    /// The submission was rejected before any storage work.
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// The transaction failed and was rolled back.
    #[error("Failed to persist report: {0}")]
    Persistence(#[from] DbError),
}

/// Validates and reconciles one report, returning the defect it was
/// associated with.
///
/// # Errors
///
/// * [`SubmitError::Validation`] if the coordinate is missing or invalid;
///   no transaction is started.
/// * [`SubmitError::Persistence`] if any statement fails; the whole
///   transaction is rolled back.
pub fn submit_report(
    store: &DefectStore,
    config: &MatchConfig,
    submission: ReportSubmission,
    submitted_at: DateTime<Utc>,
) -> Result<SubmittedReport, SubmitError> {
    let report = submission.validate()?;

    let mut conn = store.acquire()?;
    let tx = conn.transaction().map_err(DbError::from)?;

    let outcome = match reconcile(&tx, config, &report, submitted_at) {
        Ok(outcome) => outcome,
        Err(e) => {
            log::warn!("Rolling back report submission: {e}");
            return Err(e.into());
        }
    };

    tx.commit().map_err(DbError::from)?;

    log::debug!(
        "Report {} -> defect {} ({:.2} m, created={})",
        outcome.report_id,
        outcome.defect_id,
        outcome.distance_meters,
        outcome.created,
    );

    Ok(outcome)
}

/// Runs the reconciliation statements on an open transaction.
fn reconcile(
    conn: &Connection,
    config: &MatchConfig,
    report: &ValidReport,
    submitted_at: DateTime<Utc>,
) -> Result<SubmittedReport, DbError> {
    let candidates =
        crate::candidates::locate_candidates(conn, report.coordinate, config.search_radius_m())?;
    let decision = select_match(report.coordinate, &candidates, config.threshold_m());

    let report_id = uuid::Uuid::new_v4().to_string();
    let submitted_at = format_timestamp(&submitted_at);

    match decision {
        MatchDecision::Attach {
            defect_id,
            distance_m,
        } => {
            insert_report(conn, &report_id, &defect_id, report, &submitted_at)?;
            increment_aggregates(conn, &defect_id, &submitted_at)?;

            Ok(SubmittedReport {
                report_id,
                defect_id,
                distance_meters: distance_m,
                created: false,
            })
        }
        MatchDecision::Create => {
            let defect_id = insert_defect(conn, report.coordinate, &submitted_at)?;
            insert_report(conn, &report_id, &defect_id, report, &submitted_at)?;

            log::info!(
                "Created defect {defect_id} at ({}, {})",
                report.coordinate.latitude,
                report.coordinate.longitude,
            );

            Ok(SubmittedReport {
                report_id,
                defect_id,
                distance_meters: 0.0,
                created: true,
            })
        }
    }
}

/// Inserts a new canonical defect seeded from one report.
fn insert_defect(
    conn: &Connection,
    coordinate: Coordinate,
    submitted_at: &str,
) -> Result<String, DbError> {
    let defect_id = uuid::Uuid::new_v4().to_string();

    conn.execute(
        "INSERT INTO defects (
            id, latitude, longitude, geom_wkt, report_count,
            first_report_at, last_report_at, created_at, updated_at
        ) VALUES (?, ?, ?, ?, 1, ?, ?, ?, ?)",
        duckdb::params![
            defect_id,
            coordinate.latitude,
            coordinate.longitude,
            coordinate.to_wkt(),
            submitted_at,
            submitted_at,
            submitted_at,
            submitted_at,
        ],
    )?;

    Ok(defect_id)
}

/// Inserts the report row and its photos, all pointing at `defect_id`.
fn insert_report(
    conn: &Connection,
    report_id: &str,
    defect_id: &str,
    report: &ValidReport,
    submitted_at: &str,
) -> Result<(), DbError> {
    let photo_count = i32::try_from(report.photos.len()).map_err(|_| DbError::Conversion {
        message: format!("too many photos: {}", report.photos.len()),
    })?;

    conn.execute(
        "INSERT INTO reports (
            id, defect_id, reporter_id, latitude, longitude, description,
            severity, photo_count, source, context_tag, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
        duckdb::params![
            report_id,
            defect_id,
            report.reporter_id.as_deref(),
            report.coordinate.latitude,
            report.coordinate.longitude,
            report.description.as_deref(),
            report.severity.as_ref().map(AsRef::<str>::as_ref),
            photo_count,
            report.source,
            report.context_tag.as_deref(),
            submitted_at,
        ],
    )?;

    if report.photos.is_empty() {
        return Ok(());
    }

    let mut stmt = conn.prepare(
        "INSERT INTO photos (
            id, report_id, defect_id, reporter_id, url, thumbnail_url, metadata, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
    )?;

    for photo in &report.photos {
        let metadata = photo.metadata.as_ref().map_or_else(
            || Ok("{}".to_string()),
            |value| {
                serde_json::to_string(value).map_err(|e| DbError::Conversion {
                    message: format!("invalid photo metadata: {e}"),
                })
            },
        )?;

        stmt.execute(duckdb::params![
            uuid::Uuid::new_v4().to_string(),
            report_id,
            defect_id,
            report.reporter_id.as_deref(),
            photo.url,
            photo.thumbnail_or_url(),
            metadata,
            submitted_at,
        ])?;
    }

    Ok(())
}

/// Bumps `report_count` and advances `last_report_at` in one statement.
///
/// `GREATEST` keeps `last_report_at` at the newest report even when
/// concurrent submissions commit out of timestamp order.
fn increment_aggregates(
    conn: &Connection,
    defect_id: &str,
    submitted_at: &str,
) -> Result<(), DbError> {
    let updated = conn.execute(
        "UPDATE defects
         SET report_count = report_count + 1,
             last_report_at = GREATEST(last_report_at, CAST(? AS TIMESTAMP))
         WHERE id = ?",
        duckdb::params![submitted_at, defect_id],
    )?;

    if updated == 0 {
        return Err(DbError::StaleCandidate {
            defect_id: defect_id.to_string(),
        });
    }

    Ok(())
}

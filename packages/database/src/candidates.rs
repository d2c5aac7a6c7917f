//! Candidate lookup and defect listings.
//!
//! The candidate locator is a rectangular pre-filter: it returns every
//! defect inside [`pothole_map_spatial::search_box`] around a point. Corner
//! hits beyond the true radius are expected and are discarded by
//! [`pothole_map_spatial::matching::select_match`].

use std::str::FromStr as _;

use duckdb::Connection;
use duckdb::types::Value;
use pothole_map_database_models::{
    BoundingBox, CandidateRow, DefectQuery, DefectSummaryRow,
};
use pothole_map_defect_models::{Coordinate, DefectStatus};

use crate::DbError;

/// Appends the `WHERE` clause selecting rows inside `bbox`.
fn push_box_filter(sql: &mut String, params: &mut Vec<Value>, bbox: &BoundingBox) {
    sql.push_str(" WHERE latitude BETWEEN ? AND ?");
    params.push(Value::Double(bbox.south));
    params.push(Value::Double(bbox.north));

    if bbox.spans_all_longitudes() {
        return;
    }

    if bbox.wraps_antimeridian() {
        sql.push_str(" AND (longitude >= ? OR longitude <= ?)");
    } else {
        sql.push_str(" AND longitude BETWEEN ? AND ?");
    }
    params.push(Value::Double(bbox.west));
    params.push(Value::Double(bbox.east));
}

/// Returns every defect whose representative point lies inside the search
/// box of `radius_m` meters around `center`.
///
/// An empty result is the normal "new defect" case, not an error.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn locate_candidates(
    conn: &Connection,
    center: Coordinate,
    radius_m: f64,
) -> Result<Vec<CandidateRow>, DbError> {
    let bbox = pothole_map_spatial::search_box(center, radius_m);

    let mut sql = String::from("SELECT id, latitude, longitude FROM defects");
    let mut params = Vec::new();
    push_box_filter(&mut sql, &mut params, &bbox);

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(duckdb::params_from_iter(params))?;

    let mut candidates = Vec::new();
    while let Some(row) = rows.next()? {
        candidates.push(CandidateRow {
            id: row.get(0)?,
            coordinate: Coordinate::new(row.get(1)?, row.get(2)?),
        });
    }

    log::debug!(
        "Found {} candidate defect(s) within {radius_m} m box of ({}, {})",
        candidates.len(),
        center.latitude,
        center.longitude,
    );

    Ok(candidates)
}

/// Lists defect summaries in browse or proximity mode.
///
/// Browse mode orders by descending priority (unscored last) and returns
/// at most `limit` rows. Proximity mode returns everything inside the
/// search box, ordered by id.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a stored status is unknown.
pub fn list_defects(conn: &Connection, query: &DefectQuery) -> Result<Vec<DefectSummaryRow>, DbError> {
    let mut sql = String::from(
        "SELECT id, latitude, longitude, address_text, report_count, priority_score, status
         FROM defects",
    );
    let mut params = Vec::new();

    match query {
        DefectQuery::Browse { limit } => {
            sql.push_str(&format!(
                " ORDER BY priority_score DESC NULLS LAST, id LIMIT {limit}"
            ));
        }
        DefectQuery::Nearby { center, radius_m } => {
            let bbox = pothole_map_spatial::search_box(*center, *radius_m);
            push_box_filter(&mut sql, &mut params, &bbox);
            sql.push_str(" ORDER BY id");
        }
    }

    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query(duckdb::params_from_iter(params))?;

    let mut defects = Vec::new();
    while let Some(row) = rows.next()? {
        let status: String = row.get(6)?;
        defects.push(DefectSummaryRow {
            id: row.get(0)?,
            coordinate: Coordinate::new(row.get(1)?, row.get(2)?),
            address_text: row.get(3)?,
            report_count: row.get(4)?,
            priority_score: row.get(5)?,
            status: parse_status(&status)?,
        });
    }

    Ok(defects)
}

/// Parses a stored status column.
pub(crate) fn parse_status(s: &str) -> Result<DefectStatus, DbError> {
    DefectStatus::from_str(s).map_err(|e| DbError::Conversion {
        message: format!("unknown defect status {s:?}: {e}"),
    })
}

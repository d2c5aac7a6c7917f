#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Database row types and query parameter definitions.
//!
//! These types represent the shapes of data as stored in and retrieved from
//! the `DuckDB` defect store. They are distinct from the API response types
//! in `pothole_map_server_models` and the raw submission types in
//! `pothole_map_defect_models`.

use chrono::{DateTime, Utc};
use pothole_map_defect_models::{Coordinate, DefectStatus, SeverityHint};
use serde::{Deserialize, Serialize};

/// Page size for browse mode.
pub const BROWSE_LIMIT: u32 = 200;

/// Radius used for proximity queries that give a coordinate but no radius.
pub const DEFAULT_PROXIMITY_RADIUS_METERS: f64 = 500.0;

/// A geographic bounding box in WGS84 coordinates.
///
/// When `west > east` the box wraps across the antimeridian and covers
/// `west..=180` plus `-180..=east`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Western longitude boundary.
    pub west: f64,
    /// Southern latitude boundary.
    pub south: f64,
    /// Eastern longitude boundary.
    pub east: f64,
    /// Northern latitude boundary.
    pub north: f64,
}

impl BoundingBox {
    /// Creates a new bounding box from the given coordinates.
    #[must_use]
    pub const fn new(west: f64, south: f64, east: f64, north: f64) -> Self {
        Self {
            west,
            south,
            east,
            north,
        }
    }

    /// Whether the longitude range crosses the antimeridian.
    #[must_use]
    pub fn wraps_antimeridian(&self) -> bool {
        self.west > self.east
    }

    /// Whether the longitude range covers the whole globe.
    #[must_use]
    pub fn spans_all_longitudes(&self) -> bool {
        self.west <= -180.0 && self.east >= 180.0
    }
}

/// How to select defects for a listing.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DefectQuery {
    /// Highest priority first, fixed page size.
    Browse {
        /// Maximum number of rows.
        limit: u32,
    },
    /// Everything inside the search box around a point.
    Nearby {
        /// Query point.
        center: Coordinate,
        /// Search radius in meters.
        radius_m: f64,
    },
}

impl Default for DefectQuery {
    fn default() -> Self {
        Self::Browse {
            limit: BROWSE_LIMIT,
        }
    }
}

/// Spatial candidate returned by the candidate locator.
#[derive(Debug, Clone, PartialEq)]
pub struct CandidateRow {
    /// Defect id.
    pub id: String,
    /// Representative coordinate.
    pub coordinate: Coordinate,
}

/// Listing projection of a canonical defect.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefectSummaryRow {
    /// Defect id.
    pub id: String,
    /// Representative coordinate.
    pub coordinate: Coordinate,
    /// Street address, if a moderator has filled it in.
    pub address_text: Option<String>,
    /// Number of reports aggregated into this defect.
    pub report_count: i64,
    /// Externally computed priority.
    pub priority_score: Option<f64>,
    /// Moderation status.
    pub status: DefectStatus,
}

/// A canonical defect row as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DefectRow {
    /// Defect id.
    pub id: String,
    /// Representative coordinate.
    pub coordinate: Coordinate,
    /// `POINT(lon lat)` mirror of the coordinate.
    pub geom_wkt: Option<String>,
    /// Street address.
    pub address_text: Option<String>,
    /// Length in meters.
    pub length_m: Option<f64>,
    /// Width in meters.
    pub width_m: Option<f64>,
    /// Depth in meters.
    pub depth_m: Option<f64>,
    /// Moderation status.
    pub status: DefectStatus,
    /// Whether a moderator verified the defect.
    pub verified: bool,
    /// Externally computed priority.
    pub priority_score: Option<f64>,
    /// Cluster linking suspected duplicates.
    pub duplicate_cluster_id: Option<String>,
    /// Number of reports aggregated into this defect.
    pub report_count: i64,
    /// Time of the first contributing report.
    pub first_report_at: DateTime<Utc>,
    /// Time of the newest contributing report.
    pub last_report_at: DateTime<Utc>,
    /// Row creation time.
    pub created_at: DateTime<Utc>,
    /// Last patch time.
    pub updated_at: DateTime<Utc>,
}

/// A report row as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportRow {
    /// Report id.
    pub id: String,
    /// Associated canonical defect.
    pub defect_id: String,
    /// Submitter reference.
    pub reporter_id: Option<String>,
    /// Submitted coordinate.
    pub coordinate: Coordinate,
    /// Free-text description.
    pub description: Option<String>,
    /// Severity hint.
    pub severity: Option<SeverityHint>,
    /// Number of attached photos.
    pub photo_count: i32,
    /// Channel the report came from.
    pub source: String,
    /// Weather or other context tag.
    pub context_tag: Option<String>,
    /// Submission time.
    pub created_at: DateTime<Utc>,
    /// Photos attached to this report.
    pub photos: Vec<PhotoRow>,
}

/// A photo row as stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoRow {
    /// Photo id.
    pub id: String,
    /// Parent report.
    pub report_id: String,
    /// Same defect as the parent report.
    pub defect_id: String,
    /// Submitter reference.
    pub reporter_id: Option<String>,
    /// Storage reference.
    pub url: String,
    /// Thumbnail reference.
    pub thumbnail_url: Option<String>,
    /// Free-form metadata.
    pub metadata: serde_json::Value,
    /// Creation time.
    pub created_at: DateTime<Utc>,
}

/// Partial update of the moderation-owned defect attributes.
///
/// One slot per writable column; `None` leaves the column untouched. For
/// nullable columns `Some(None)` clears the stored value. Aggregates
/// (`report_count`, report timestamps) are not patchable.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DefectPatch {
    /// Street address.
    pub address_text: Option<Option<String>>,
    /// Length in meters.
    pub length_m: Option<Option<f64>>,
    /// Width in meters.
    pub width_m: Option<Option<f64>>,
    /// Depth in meters.
    pub depth_m: Option<Option<f64>>,
    /// Moderation status.
    pub status: Option<DefectStatus>,
    /// Verification flag.
    pub verified: Option<bool>,
    /// Externally computed priority.
    pub priority_score: Option<Option<f64>>,
    /// Cluster linking suspected duplicates.
    pub duplicate_cluster_id: Option<Option<String>>,
}

impl DefectPatch {
    /// Whether no field is present.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.address_text.is_none()
            && self.length_m.is_none()
            && self.width_m.is_none()
            && self.depth_m.is_none()
            && self.status.is_none()
            && self.verified.is_none()
            && self.priority_score.is_none()
            && self.duplicate_cluster_id.is_none()
    }
}

/// Outcome of reconciling one report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SubmittedReport {
    /// Id of the new report.
    pub report_id: String,
    /// Defect the report was associated with.
    pub defect_id: String,
    /// Haversine distance from the report to the defect (0 when created).
    pub distance_meters: f64,
    /// Whether a new defect was created for this report.
    pub created: bool,
}

/// An anonymous submitter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReporterRow {
    /// Reporter id.
    pub id: String,
    /// Optional display name.
    pub display_name: Option<String>,
    /// Registration time.
    pub created_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapped_and_global_boxes() {
        let wrapped = BoundingBox::new(179.5, -1.0, -179.5, 1.0);
        assert!(wrapped.wraps_antimeridian());
        assert!(!wrapped.spans_all_longitudes());

        let global = BoundingBox::new(-180.0, 80.0, 180.0, 90.0);
        assert!(global.spans_all_longitudes());
        assert!(!global.wraps_antimeridian());
    }

    #[test]
    fn empty_patch() {
        assert!(DefectPatch::default().is_empty());
        let patch = DefectPatch {
            verified: Some(true),
            ..DefectPatch::default()
        };
        assert!(!patch.is_empty());

        let clear = DefectPatch {
            duplicate_cluster_id: Some(None),
            ..DefectPatch::default()
        };
        assert!(!clear.is_empty());
    }
}

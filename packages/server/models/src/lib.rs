#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! API request and response types for the pothole map server.
//!
//! These types are serialized to JSON for the REST API. They are separate
//! from the database row types to allow independent evolution of the API
//! contract.

use chrono::{DateTime, Utc};
use pothole_map_database_models::{
    DEFAULT_PROXIMITY_RADIUS_METERS, DefectPatch, DefectQuery, DefectRow, DefectSummaryRow,
    PhotoRow, ReportRow, SubmittedReport,
};
use pothole_map_defect_models::{
    Coordinate, DefectStatus, PhotoAttachment, ReportSubmission, SeverityHint, ValidationError,
};
use serde::{Deserialize, Deserializer, Serialize};

/// Health check response.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiHealth {
    /// Whether the service is healthy.
    pub healthy: bool,
    /// Service version.
    pub version: String,
}

/// Error body returned with every non-2xx response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    /// Human-readable message.
    pub error: String,
}

impl ApiError {
    /// Creates an error body.
    #[must_use]
    pub fn new(error: impl Into<String>) -> Self {
        Self {
            error: error.into(),
        }
    }
}

/// Acknowledgement body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiAck {
    /// Always `true`.
    pub ok: bool,
}

/// A photo reference in a report submission.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiPhotoAttachment {
    /// Storage reference.
    pub url: String,
    /// Thumbnail reference.
    pub thumbnail_url: Option<String>,
    /// Free-form metadata.
    pub metadata: Option<serde_json::Value>,
}

/// Body of `POST /api/reports`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReportRequest {
    /// Latitude (also accepted as `lat`).
    #[serde(alias = "lat")]
    pub latitude: Option<f64>,
    /// Longitude (also accepted as `lon`).
    #[serde(alias = "lon")]
    pub longitude: Option<f64>,
    /// Free-text description.
    pub description: Option<String>,
    /// Severity hint.
    pub severity: Option<SeverityHint>,
    /// Submitter reference.
    pub reporter_id: Option<String>,
    /// Channel the report came from.
    pub source: Option<String>,
    /// Weather or other context tag.
    pub context_tag: Option<String>,
    /// Photo references.
    #[serde(default)]
    pub photos: Vec<ApiPhotoAttachment>,
}

impl From<SubmitReportRequest> for ReportSubmission {
    fn from(req: SubmitReportRequest) -> Self {
        Self {
            latitude: req.latitude,
            longitude: req.longitude,
            description: req.description,
            severity: req.severity,
            reporter_id: req.reporter_id,
            source: req.source,
            context_tag: req.context_tag,
            photos: req
                .photos
                .into_iter()
                .map(|p| PhotoAttachment {
                    url: p.url,
                    thumbnail_url: p.thumbnail_url,
                    metadata: p.metadata,
                })
                .collect(),
        }
    }
}

/// Response of `POST /api/reports`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmitReportResponse {
    /// Id of the new report.
    pub report_id: String,
    /// Defect the report was associated with.
    pub associated_defect_id: String,
    /// Distance from the report to that defect, in meters.
    pub distance_meters: f64,
}

impl From<SubmittedReport> for SubmitReportResponse {
    fn from(outcome: SubmittedReport) -> Self {
        Self {
            report_id: outcome.report_id,
            associated_defect_id: outcome.defect_id,
            distance_meters: outcome.distance_meters,
        }
    }
}

/// Query parameters for `GET /api/potholes`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DefectQueryParams {
    /// Latitude of the proximity search.
    pub lat: Option<f64>,
    /// Longitude of the proximity search.
    pub lon: Option<f64>,
    /// Radius in meters (defaults to 500).
    pub radius: Option<f64>,
}

impl TryFrom<&DefectQueryParams> for DefectQuery {
    type Error = ValidationError;

    /// Browses unless both `lat` and `lon` are given; a given coordinate
    /// must be finite and in range.
    fn try_from(params: &DefectQueryParams) -> Result<Self, Self::Error> {
        if params.lat.is_none() || params.lon.is_none() {
            return Ok(Self::default());
        }

        Ok(Self::Nearby {
            center: Coordinate::validate(params.lat, params.lon)?,
            radius_m: params
                .radius
                .filter(|r| r.is_finite() && *r >= 0.0)
                .unwrap_or(DEFAULT_PROXIMITY_RADIUS_METERS),
        })
    }
}

/// A defect as returned by listings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiDefectSummary {
    /// Defect id.
    pub id: String,
    /// Latitude.
    pub latitude: f64,
    /// Longitude.
    pub longitude: f64,
    /// Street address.
    pub address_text: Option<String>,
    /// Number of aggregated reports.
    pub report_count: i64,
    /// Externally computed priority.
    pub priority_score: Option<f64>,
    /// Moderation status.
    pub status: DefectStatus,
}

impl From<DefectSummaryRow> for ApiDefectSummary {
    fn from(row: DefectSummaryRow) -> Self {
        Self {
            id: row.id,
            latitude: row.coordinate.latitude,
            longitude: row.coordinate.longitude,
            address_text: row.address_text,
            report_count: row.report_count,
            priority_score: row.priority_score,
            status: row.status,
        }
    }
}

/// A full defect record.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiDefect {
    /// Defect id.
    pub id: String,
    /// Latitude.
    pub latitude: f64,
    /// Longitude.
    pub longitude: f64,
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
    /// Number of aggregated reports.
    pub report_count: i64,
    /// First contributing report (ISO 8601).
    pub first_report_at: DateTime<Utc>,
    /// Newest contributing report (ISO 8601).
    pub last_report_at: DateTime<Utc>,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last patch time.
    pub updated_at: DateTime<Utc>,
}

impl From<DefectRow> for ApiDefect {
    fn from(row: DefectRow) -> Self {
        Self {
            id: row.id,
            latitude: row.coordinate.latitude,
            longitude: row.coordinate.longitude,
            address_text: row.address_text,
            length_m: row.length_m,
            width_m: row.width_m,
            depth_m: row.depth_m,
            status: row.status,
            verified: row.verified,
            priority_score: row.priority_score,
            duplicate_cluster_id: row.duplicate_cluster_id,
            report_count: row.report_count,
            first_report_at: row.first_report_at,
            last_report_at: row.last_report_at,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// A photo as returned with a report.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiPhoto {
    /// Photo id.
    pub id: String,
    /// Storage reference.
    pub url: String,
    /// Thumbnail reference.
    pub thumbnail_url: Option<String>,
    /// Free-form metadata.
    pub metadata: serde_json::Value,
}

impl From<PhotoRow> for ApiPhoto {
    fn from(row: PhotoRow) -> Self {
        Self {
            id: row.id,
            url: row.url,
            thumbnail_url: row.thumbnail_url,
            metadata: row.metadata,
        }
    }
}

/// A report as returned by `GET /api/potholes/{id}/reports`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiReport {
    /// Report id.
    pub id: String,
    /// Associated defect.
    pub defect_id: String,
    /// Submitter reference.
    pub reporter_id: Option<String>,
    /// Submitted latitude.
    pub latitude: f64,
    /// Submitted longitude.
    pub longitude: f64,
    /// Free-text description.
    pub description: Option<String>,
    /// Severity hint.
    pub severity: Option<SeverityHint>,
    /// Channel the report came from.
    pub source: String,
    /// Weather or other context tag.
    pub context_tag: Option<String>,
    /// Submission time (ISO 8601).
    pub created_at: DateTime<Utc>,
    /// Attached photos.
    pub photos: Vec<ApiPhoto>,
}

impl From<ReportRow> for ApiReport {
    fn from(row: ReportRow) -> Self {
        Self {
            id: row.id,
            defect_id: row.defect_id,
            reporter_id: row.reporter_id,
            latitude: row.coordinate.latitude,
            longitude: row.coordinate.longitude,
            description: row.description,
            severity: row.severity,
            source: row.source,
            context_tag: row.context_tag,
            created_at: row.created_at,
            photos: row.photos.into_iter().map(ApiPhoto::from).collect(),
        }
    }
}

/// Distinguishes an explicit `null` (`Some(None)`) from an absent key
/// (`None`, via `#[serde(default)]`).
fn present<'de, D, T>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    D: Deserializer<'de>,
    T: Deserialize<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

/// Body of `PATCH /api/potholes/{id}`.
///
/// Unknown fields fail deserialization, so only allow-listed attributes can
/// ever reach the store. `null` clears a nullable attribute.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ApiDefectPatch {
    /// Street address.
    #[serde(default, deserialize_with = "present")]
    pub address_text: Option<Option<String>>,
    /// Length in meters.
    #[serde(default, deserialize_with = "present")]
    pub length_m: Option<Option<f64>>,
    /// Width in meters.
    #[serde(default, deserialize_with = "present")]
    pub width_m: Option<Option<f64>>,
    /// Depth in meters.
    #[serde(default, deserialize_with = "present")]
    pub depth_m: Option<Option<f64>>,
    /// Moderation status.
    pub status: Option<DefectStatus>,
    /// Verification flag.
    pub verified: Option<bool>,
    /// Externally computed priority.
    #[serde(default, deserialize_with = "present")]
    pub priority_score: Option<Option<f64>>,
    /// Cluster linking suspected duplicates.
    #[serde(default, deserialize_with = "present")]
    pub duplicate_cluster_id: Option<Option<String>>,
}

impl From<ApiDefectPatch> for DefectPatch {
    fn from(patch: ApiDefectPatch) -> Self {
        Self {
            address_text: patch.address_text,
            length_m: patch.length_m,
            width_m: patch.width_m,
            depth_m: patch.depth_m,
            status: patch.status,
            verified: patch.verified,
            priority_score: patch.priority_score,
            duplicate_cluster_id: patch.duplicate_cluster_id,
        }
    }
}

/// Body of `POST /api/reporters`.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateReporterRequest {
    /// Optional display name.
    pub display_name: Option<String>,
}

/// Response of `POST /api/reporters`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateReporterResponse {
    /// New reporter id.
    pub id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn submit_request_accepts_short_coordinate_names() {
        let req: SubmitReportRequest =
            serde_json::from_str(r#"{"lat": 19.0, "lon": -98.2, "severity": "high"}"#).unwrap();
        let submission = ReportSubmission::from(req);
        assert_eq!(submission.latitude, Some(19.0));
        assert_eq!(submission.longitude, Some(-98.2));
        assert_eq!(submission.severity, Some(SeverityHint::High));
        assert!(submission.photos.is_empty());
    }

    #[test]
    fn patch_rejects_unknown_fields() {
        let err = serde_json::from_str::<ApiDefectPatch>(r#"{"reportCount": 99}"#);
        assert!(err.is_err());

        let patch: ApiDefectPatch =
            serde_json::from_str(r#"{"status": "in_repair", "verified": true}"#).unwrap();
        let patch = DefectPatch::from(patch);
        assert_eq!(patch.status, Some(DefectStatus::InRepair));
        assert_eq!(patch.verified, Some(true));
        assert!(patch.address_text.is_none());
    }

    #[test]
    fn patch_null_is_present_and_absent_is_not() {
        let patch: ApiDefectPatch = serde_json::from_str(
            r#"{"duplicateClusterId": null, "priorityScore": 2.5}"#,
        )
        .unwrap();
        let patch = DefectPatch::from(patch);
        assert_eq!(patch.duplicate_cluster_id, Some(None));
        assert_eq!(patch.priority_score, Some(Some(2.5)));
        assert_eq!(patch.address_text, None);
        assert!(!patch.is_empty());
    }

    #[test]
    fn query_params_choose_mode() {
        assert_eq!(
            DefectQuery::try_from(&DefectQueryParams::default()).unwrap(),
            DefectQuery::default()
        );

        let nearby = DefectQuery::try_from(&DefectQueryParams {
            lat: Some(19.0),
            lon: Some(-98.2),
            radius: None,
        })
        .unwrap();
        assert_eq!(
            nearby,
            DefectQuery::Nearby {
                center: Coordinate::new(19.0, -98.2),
                radius_m: DEFAULT_PROXIMITY_RADIUS_METERS,
            }
        );

        let lat_only = DefectQuery::try_from(&DefectQueryParams {
            lat: Some(19.0),
            ..DefectQueryParams::default()
        })
        .unwrap();
        assert_eq!(lat_only, DefectQuery::default());
    }

    #[test]
    fn query_params_reject_bad_coordinates() {
        let nan = DefectQuery::try_from(&DefectQueryParams {
            lat: Some(f64::NAN),
            lon: Some(0.0),
            radius: Some(10.0),
        });
        assert!(matches!(
            nan,
            Err(ValidationError::NonFinite { field }) if field == "latitude"
        ));

        let out_of_range = DefectQuery::try_from(&DefectQueryParams {
            lat: Some(95.0),
            lon: Some(0.0),
            radius: None,
        });
        assert!(matches!(
            out_of_range,
            Err(ValidationError::OutOfRange { field, .. }) if field == "latitude"
        ));
    }
}

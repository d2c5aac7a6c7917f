#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Defect taxonomy types and citizen report submissions.
//!
//! This crate defines the vocabulary shared by every other pothole-map
//! crate: WGS84 coordinates, the moderation status of a canonical defect,
//! the severity hint a citizen may attach to a report, and the raw report
//! submission together with its validation rules.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Report source recorded when the caller does not name one.
pub const DEFAULT_SOURCE: &str = "app";

/// A WGS84 point.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude in degrees, `-90..=90`.
    pub latitude: f64,
    /// Longitude in degrees, `-180..=180`.
    pub longitude: f64,
}

impl Coordinate {
    /// Creates a coordinate without range checks.
    #[must_use]
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Validates an optional latitude/longitude pair.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if either component is missing, not a
    /// finite number, or outside its WGS84 range.
    pub fn validate(
        latitude: Option<f64>,
        longitude: Option<f64>,
    ) -> Result<Self, ValidationError> {
        let latitude = latitude.ok_or(ValidationError::MissingField("latitude"))?;
        let longitude = longitude.ok_or(ValidationError::MissingField("longitude"))?;

        check_range("latitude", latitude, 90.0)?;
        check_range("longitude", longitude, 180.0)?;

        Ok(Self::new(latitude, longitude))
    }

    /// Well-known-text rendering (`POINT(lon lat)`).
    #[must_use]
    pub fn to_wkt(&self) -> String {
        format!("POINT({} {})", self.longitude, self.latitude)
    }
}

fn check_range(field: &'static str, value: f64, limit: f64) -> Result<(), ValidationError> {
    if !value.is_finite() {
        return Err(ValidationError::NonFinite { field });
    }
    if value.abs() > limit {
        return Err(ValidationError::OutOfRange { field, value });
    }
    Ok(())
}

/// Moderation status of a canonical defect.
///
/// Only moderation workflows change this; reconciliation always creates
/// defects as [`DefectStatus::Reported`].
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum DefectStatus {
    /// Seen in at least one citizen report, not yet reviewed.
    #[default]
    Reported,
    /// A moderator or field survey confirmed the defect exists.
    Confirmed,
    /// Repair work has been scheduled.
    Scheduled,
    /// Repair work is underway.
    InRepair,
    /// The defect has been fixed.
    Repaired,
    /// Rejected as invalid, spam, or a duplicate.
    Dismissed,
}

/// Severity a citizen attaches to their report.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SeverityHint {
    /// Cosmetic surface damage.
    Low,
    /// Noticeable, worth avoiding.
    Medium,
    /// Dangerous to vehicles or cyclists.
    High,
}

/// Errors raised while validating input before any storage work begins.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ValidationError {
    /// A required field was not supplied.
    #[error("{0} is required")]
    MissingField(&'static str),

    /// A numeric field was NaN or infinite.
    #[error("{field} must be a finite number")]
    NonFinite {
        /// Name of the offending field.
        field: &'static str,
    },

    /// A numeric field was outside its allowed range.
    #[error("{field} out of range: {value}")]
    OutOfRange {
        /// Name of the offending field.
        field: &'static str,
        /// The rejected value.
        value: f64,
    },
}

/// A photo reference attached to a report.
///
/// The file itself lives in external storage; only its reference is
/// persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoAttachment {
    /// Storage reference (URL or path).
    pub url: String,
    /// Thumbnail reference. Defaults to `url` when absent.
    pub thumbnail_url: Option<String>,
    /// Free-form metadata, stored as JSON.
    pub metadata: Option<serde_json::Value>,
}

impl PhotoAttachment {
    /// Creates an attachment with only a storage reference.
    #[must_use]
    pub fn from_url(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            thumbnail_url: None,
            metadata: None,
        }
    }

    /// The thumbnail reference, falling back to the storage reference.
    #[must_use]
    pub fn thumbnail_or_url(&self) -> &str {
        self.thumbnail_url.as_deref().unwrap_or(&self.url)
    }
}

/// A citizen report as received from the caller, before validation.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReportSubmission {
    /// Submitted latitude. Required.
    pub latitude: Option<f64>,
    /// Submitted longitude. Required.
    pub longitude: Option<f64>,
    /// Free-text description.
    pub description: Option<String>,
    /// Optional severity hint.
    pub severity: Option<SeverityHint>,
    /// Opaque submitter reference.
    pub reporter_id: Option<String>,
    /// Channel the report came from. Defaults to [`DEFAULT_SOURCE`].
    pub source: Option<String>,
    /// Weather or other context tag.
    pub context_tag: Option<String>,
    /// Attached photo references.
    pub photos: Vec<PhotoAttachment>,
}

impl ReportSubmission {
    /// Checks required fields and produces a [`ValidReport`].
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] if the coordinate is missing or invalid.
    pub fn validate(self) -> Result<ValidReport, ValidationError> {
        let coordinate = Coordinate::validate(self.latitude, self.longitude)?;

        Ok(ValidReport {
            coordinate,
            description: self.description,
            severity: self.severity,
            reporter_id: self.reporter_id.filter(|id| !id.is_empty()),
            source: self
                .source
                .filter(|s| !s.is_empty())
                .unwrap_or_else(|| DEFAULT_SOURCE.to_string()),
            context_tag: self.context_tag,
            photos: self.photos,
        })
    }
}

/// A report whose required fields have been checked.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidReport {
    /// Submitted coordinate.
    pub coordinate: Coordinate,
    /// Free-text description.
    pub description: Option<String>,
    /// Optional severity hint.
    pub severity: Option<SeverityHint>,
    /// Opaque submitter reference.
    pub reporter_id: Option<String>,
    /// Channel the report came from.
    pub source: String,
    /// Weather or other context tag.
    pub context_tag: Option<String>,
    /// Attached photo references.
    pub photos: Vec<PhotoAttachment>,
}

#[cfg(test)]
mod tests {
    use std::str::FromStr as _;

    use super::*;

    #[test]
    fn missing_latitude_is_named() {
        let err = Coordinate::validate(None, Some(-98.2)).unwrap_err();
        assert_eq!(err, ValidationError::MissingField("latitude"));
        assert_eq!(err.to_string(), "latitude is required");
    }

    #[test]
    fn missing_longitude_is_named() {
        let err = Coordinate::validate(Some(19.0), None).unwrap_err();
        assert_eq!(err, ValidationError::MissingField("longitude"));
    }

    #[test]
    fn rejects_out_of_range_and_nan() {
        assert!(matches!(
            Coordinate::validate(Some(91.0), Some(0.0)),
            Err(ValidationError::OutOfRange {
                field: "latitude",
                ..
            })
        ));
        assert!(matches!(
            Coordinate::validate(Some(0.0), Some(-180.5)),
            Err(ValidationError::OutOfRange {
                field: "longitude",
                ..
            })
        ));
        assert!(matches!(
            Coordinate::validate(Some(f64::NAN), Some(0.0)),
            Err(ValidationError::NonFinite { field: "latitude" })
        ));
    }

    #[test]
    fn submission_defaults_source_and_drops_empty_reporter() {
        let report = ReportSubmission {
            latitude: Some(19.0),
            longitude: Some(-98.2),
            reporter_id: Some(String::new()),
            ..ReportSubmission::default()
        }
        .validate()
        .unwrap();

        assert_eq!(report.source, DEFAULT_SOURCE);
        assert_eq!(report.reporter_id, None);
        assert_eq!(report.coordinate, Coordinate::new(19.0, -98.2));
    }

    #[test]
    fn status_text_roundtrip() {
        assert_eq!(DefectStatus::InRepair.as_ref(), "in_repair");
        assert_eq!(
            DefectStatus::from_str("confirmed").unwrap(),
            DefectStatus::Confirmed
        );
        assert!(DefectStatus::from_str("bogus").is_err());
    }

    #[test]
    fn thumbnail_falls_back_to_url() {
        let photo = PhotoAttachment::from_url("/uploads/a.jpg");
        assert_eq!(photo.thumbnail_or_url(), "/uploads/a.jpg");
    }

    #[test]
    fn wkt_is_lon_lat() {
        assert_eq!(Coordinate::new(19.0, -98.2).to_wkt(), "POINT(-98.2 19)");
    }
}

//! Nearest-defect selection.
//!
//! Given the candidates inside a search box, ranks them by true haversine
//! distance and decides whether an incoming report attaches to one of them
//! or needs a new canonical defect.

use pothole_map_database_models::CandidateRow;
use pothole_map_defect_models::Coordinate;

use crate::haversine_distance;

/// Default distance under which two reports are treated as the same defect.
pub const DEFAULT_MATCH_THRESHOLD_METERS: f64 = 30.0;

/// Default candidate search radius (about `±0.0005°` of latitude).
pub const DEFAULT_SEARCH_RADIUS_METERS: f64 = 55.0;

/// Outcome of ranking candidates for one report.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchDecision {
    /// Associate the report with an existing defect.
    Attach {
        /// Matched defect id.
        defect_id: String,
        /// Haversine distance from the report to the defect, in meters.
        distance_m: f64,
    },
    /// No candidate is close enough; mint a new defect.
    Create,
}

/// Match threshold and candidate search radius.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MatchConfig {
    threshold_m: f64,
    search_radius_m: f64,
}

impl MatchConfig {
    /// Creates a config. The search radius is raised to the threshold when
    /// smaller, so the box never excludes a defect the threshold accepts.
    #[must_use]
    pub fn new(threshold_m: f64, search_radius_m: f64) -> Self {
        let threshold_m = threshold_m.max(0.0);
        if search_radius_m < threshold_m {
            log::warn!(
                "Search radius {search_radius_m} m is below match threshold {threshold_m} m, \
                 searching with {threshold_m} m instead"
            );
        }
        Self {
            threshold_m,
            search_radius_m: search_radius_m.max(threshold_m),
        }
    }

    /// Maximum report-to-defect distance that still counts as a match.
    #[must_use]
    pub const fn threshold_m(&self) -> f64 {
        self.threshold_m
    }

    /// Radius of the candidate search box, never below the threshold.
    #[must_use]
    pub const fn search_radius_m(&self) -> f64 {
        self.search_radius_m
    }
}

impl Default for MatchConfig {
    fn default() -> Self {
        Self::new(DEFAULT_MATCH_THRESHOLD_METERS, DEFAULT_SEARCH_RADIUS_METERS)
    }
}

/// Picks the nearest candidate within `threshold_m` meters (inclusive).
///
/// Equal distances resolve to the lexicographically lowest id so the
/// outcome does not depend on the order the store returned rows in.
#[must_use]
pub fn select_match(
    report: Coordinate,
    candidates: &[CandidateRow],
    threshold_m: f64,
) -> MatchDecision {
    let best = candidates
        .iter()
        .map(|c| (c, haversine_distance(report, c.coordinate)))
        .filter(|(_, d)| *d <= threshold_m)
        .min_by(|(a, da), (b, db)| da.total_cmp(db).then_with(|| a.id.cmp(&b.id)));

    match best {
        Some((candidate, distance_m)) => MatchDecision::Attach {
            defect_id: candidate.id.clone(),
            distance_m,
        },
        None => MatchDecision::Create,
    }
}

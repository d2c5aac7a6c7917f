#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! Spherical geometry for defect reconciliation.
//!
//! Builds the rectangular search boxes used as a cheap spatial pre-filter,
//! computes great-circle (haversine) distances, and picks the nearest
//! candidate defect within the match threshold (see [`matching`]).
//!
//! Internally points are [`geo::Point`]s with `x = longitude` and
//! `y = latitude`.

pub mod matching;

use geo::{Distance as _, HaversineMeasure, Point};
use pothole_map_database_models::BoundingBox;
use pothole_map_defect_models::Coordinate;

/// Mean Earth radius in meters.
pub const EARTH_RADIUS_METERS: f64 = 6_371_000.0;

/// Approximate length of one degree of latitude in meters.
pub const METERS_PER_DEGREE_LATITUDE: f64 = 111_320.0;

/// Sphere of radius [`EARTH_RADIUS_METERS`] used for every great-circle
/// computation.
pub const EARTH: HaversineMeasure = HaversineMeasure::new(EARTH_RADIUS_METERS);

/// `geo` point for a coordinate (`x = longitude`, `y = latitude`).
#[must_use]
pub fn to_point(coordinate: Coordinate) -> Point<f64> {
    Point::new(coordinate.longitude, coordinate.latitude)
}

/// Converts a north-south distance to degrees of latitude using the
/// 111 320 m/° approximation.
#[must_use]
pub fn meters_to_latitude_degrees(meters: f64) -> f64 {
    meters / METERS_PER_DEGREE_LATITUDE
}

/// Converts an east-west distance at `latitude` to degrees of longitude.
///
/// Scales the latitude constant by `cos(latitude)`, so the result grows
/// without bound towards the poles.
#[must_use]
pub fn meters_to_longitude_degrees(meters: f64, latitude: f64) -> f64 {
    meters / (METERS_PER_DEGREE_LATITUDE * latitude.to_radians().cos())
}

/// Returns a box around `center` that contains every point within
/// `radius_m` meters of it.
///
/// The nominal box comes from [`meters_to_latitude_degrees`] and
/// [`meters_to_longitude_degrees`] evaluated at the center's latitude. Each
/// half-width is widened to the exact spherical extent of the circle when
/// the approximation falls short of it. A circle that reaches a pole spans
/// every longitude, and boxes crossing the antimeridian wrap
/// (`west > east`).
#[must_use]
pub fn search_box(center: Coordinate, radius_m: f64) -> BoundingBox {
    let radius_m = radius_m.max(0.0);
    let angular = radius_m / EARTH_RADIUS_METERS;
    let angular_deg = angular.to_degrees();

    let lat_delta = meters_to_latitude_degrees(radius_m).max(angular_deg);
    let south = (center.latitude - lat_delta).max(-90.0);
    let north = (center.latitude + lat_delta).min(90.0);

    if center.latitude + angular_deg >= 90.0 || center.latitude - angular_deg <= -90.0 {
        return BoundingBox::new(-180.0, south, 180.0, north);
    }

    let cos_lat = center.latitude.to_radians().cos();
    let exact_lon_delta = (angular.sin() / cos_lat).clamp(-1.0, 1.0).asin().to_degrees();
    let lon_delta = meters_to_longitude_degrees(radius_m, center.latitude).max(exact_lon_delta);

    if !lon_delta.is_finite() || lon_delta >= 180.0 {
        return BoundingBox::new(-180.0, south, 180.0, north);
    }

    let mut west = center.longitude - lon_delta;
    let mut east = center.longitude + lon_delta;
    if west < -180.0 {
        west += 360.0;
    }
    if east > 180.0 {
        east -= 360.0;
    }

    BoundingBox::new(west, south, east, north)
}

/// Great-circle distance in meters between two coordinates.
#[must_use]
pub fn haversine_distance(a: Coordinate, b: Coordinate) -> f64 {
    EARTH.distance(to_point(a), to_point(b))
}

/// The point `meters` away from `origin` along initial `bearing` (degrees
/// clockwise from north).
#[cfg(test)]
pub(crate) fn destination(origin: Coordinate, bearing: f64, meters: f64) -> Coordinate {
    use geo::Destination as _;

    let p = EARTH.destination(to_point(origin), bearing, meters);
    Coordinate::new(p.y(), p.x())
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn box_contains(bbox: &BoundingBox, point: Coordinate) -> bool {
        if point.latitude < bbox.south || point.latitude > bbox.north {
            return false;
        }
        if bbox.wraps_antimeridian() {
            point.longitude >= bbox.west || point.longitude <= bbox.east
        } else {
            point.longitude >= bbox.west && point.longitude <= bbox.east
        }
    }

    fn assert_close(actual: f64, expected: f64, tolerance: f64) {
        assert!(
            (actual - expected).abs() <= tolerance,
            "expected {expected} +/- {tolerance}, got {actual}"
        );
    }

    #[test]
    fn latitude_constant() {
        assert_close(meters_to_latitude_degrees(111_320.0), 1.0, 1e-12);
        assert_close(meters_to_latitude_degrees(55.66), 0.0005, 1e-9);
    }

    #[test]
    fn longitude_uses_cosine_of_latitude() {
        assert_close(meters_to_longitude_degrees(111_320.0, 0.0), 1.0, 1e-12);
        assert_close(meters_to_longitude_degrees(111_320.0, 60.0), 2.0, 1e-9);
    }

    #[test]
    fn one_degree_along_meridian() {
        let d = haversine_distance(Coordinate::new(0.0, 0.0), Coordinate::new(1.0, 0.0));
        assert_close(d, EARTH_RADIUS_METERS * std::f64::consts::PI / 180.0, 1e-6);
        assert_close(d, 111_194.93, 0.01);
    }

    #[test]
    fn zero_distance_to_self() {
        let p = Coordinate::new(19.0, -98.2);
        assert!(haversine_distance(p, p).abs() < 1e-9);
    }

    #[test]
    fn short_urban_distance() {
        let d = haversine_distance(
            Coordinate::new(19.0, -98.2),
            Coordinate::new(19.000_01, -98.200_01),
        );
        assert!(d > 1.0 && d < 2.0, "got {d}");

        let far = haversine_distance(Coordinate::new(19.0, -98.2), Coordinate::new(19.01, -98.2));
        assert_close(far, 1_111.95, 0.1);
    }

    #[test]
    fn distance_is_symmetric() {
        let a = Coordinate::new(40.7128, -74.0060);
        let b = Coordinate::new(51.5074, -0.1278);
        assert_close(haversine_distance(a, b), haversine_distance(b, a), 1e-6);
        assert_close(haversine_distance(a, b), 5_570_000.0, 10_000.0);
    }

    #[test]
    fn box_is_centered_and_not_smaller_than_nominal() {
        let center = Coordinate::new(19.0, -98.2);
        let bbox = search_box(center, 30.0);
        assert!(bbox.north - center.latitude >= meters_to_latitude_degrees(30.0));
        assert!(bbox.east - center.longitude >= meters_to_longitude_degrees(30.0, 19.0));
        assert_close(bbox.north - center.latitude, center.latitude - bbox.south, 1e-12);
        assert!(box_contains(&bbox, center));
    }

    #[test]
    fn box_wraps_antimeridian() {
        let bbox = search_box(Coordinate::new(0.0, 179.9999), 100.0);
        assert!(bbox.wraps_antimeridian());
        assert!(box_contains(&bbox, Coordinate::new(0.0, -179.9999)));
    }

    #[test]
    fn box_near_pole_spans_all_longitudes() {
        let bbox = search_box(Coordinate::new(89.9999, 10.0), 500.0);
        assert!(bbox.spans_all_longitudes());
        assert_close(bbox.north, 90.0, 1e-12);
    }

    #[test]
    fn destination_travels_requested_distance() {
        let origin = Coordinate::new(19.0, -98.2);
        for bearing in [0.0, 45.0, 90.0, 180.0, 270.0] {
            let p = destination(origin, bearing, 30.0);
            assert_close(haversine_distance(origin, p), 30.0, 1e-6);
        }
    }

    proptest! {
        #[test]
        fn search_box_has_no_false_negatives(
            lat in -89.9f64..89.9,
            lon in -180.0f64..180.0,
            radius in 1.0f64..50_000.0,
            bearing in 0.0f64..360.0,
        ) {
            let center = Coordinate::new(lat, lon);
            let bbox = search_box(center, radius);
            let inside = destination(center, bearing, radius - 0.01);
            prop_assert!(
                box_contains(&bbox, inside),
                "{inside:?} at {radius} m from {center:?} outside {bbox:?}"
            );
        }

        #[test]
        fn destination_distance_matches_haversine(
            lat in -80.0f64..80.0,
            lon in -180.0f64..180.0,
            radius in 1.0f64..50_000.0,
            bearing in 0.0f64..360.0,
        ) {
            let center = Coordinate::new(lat, lon);
            let outside = destination(center, bearing, radius + 0.01);
            prop_assert!(haversine_distance(center, outside) > radius);
        }
    }
}

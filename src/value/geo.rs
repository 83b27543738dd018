//! Geo points and distance units

use serde::{Deserialize, Serialize};
use serde_json::json;

use crate::query::{QueryError, QueryResult};

/// A latitude/longitude pair in degrees
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    latitude: f64,
    longitude: f64,
}

impl GeoPoint {
    /// Creates a point.
    ///
    /// Latitude must lie in [-90, 90] and longitude in [-180, 180].
    pub fn new(latitude: f64, longitude: f64) -> QueryResult<Self> {
        let point = Self {
            latitude,
            longitude,
        };
        point.validate()?;
        Ok(point)
    }

    pub fn latitude(&self) -> f64 {
        self.latitude
    }

    pub fn longitude(&self) -> f64 {
        self.longitude
    }

    /// Checks coordinate ranges
    pub fn validate(&self) -> QueryResult<()> {
        if !self.latitude.is_finite() || !(-90.0..=90.0).contains(&self.latitude) {
            return Err(QueryError::invalid_constraint(format!(
                "latitude {} out of range [-90, 90]",
                self.latitude
            )));
        }
        if !self.longitude.is_finite() || !(-180.0..=180.0).contains(&self.longitude) {
            return Err(QueryError::invalid_constraint(format!(
                "longitude {} out of range [-180, 180]",
                self.longitude
            )));
        }
        Ok(())
    }

    pub fn to_wire(&self) -> serde_json::Value {
        json!({
            "__type": "GeoPoint",
            "latitude": self.latitude,
            "longitude": self.longitude,
        })
    }
}

/// Unit for a maximum distance on a proximity constraint
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DistanceUnit {
    #[default]
    Miles,
    Kilometers,
    Radians,
}

impl DistanceUnit {
    pub fn as_str(&self) -> &'static str {
        match self {
            DistanceUnit::Miles => "miles",
            DistanceUnit::Kilometers => "kilometers",
            DistanceUnit::Radians => "radians",
        }
    }

    /// Wire operator carrying the maximum distance
    pub fn wire_operator(&self) -> &'static str {
        match self {
            DistanceUnit::Miles => "$maxDistanceInMiles",
            DistanceUnit::Kilometers => "$maxDistanceInKilometers",
            DistanceUnit::Radians => "$maxDistanceInRadians",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_point() {
        let p = GeoPoint::new(39.9, 116.4).unwrap();
        assert_eq!(p.latitude(), 39.9);
        assert_eq!(p.longitude(), 116.4);
    }

    #[test]
    fn test_boundaries_are_inclusive() {
        assert!(GeoPoint::new(90.0, 180.0).is_ok());
        assert!(GeoPoint::new(-90.0, -180.0).is_ok());
    }

    #[test]
    fn test_out_of_range_rejected() {
        assert!(GeoPoint::new(90.1, 0.0).is_err());
        assert!(GeoPoint::new(0.0, -180.5).is_err());
        assert!(GeoPoint::new(f64::NAN, 0.0).is_err());
    }

    #[test]
    fn test_unit_operators() {
        assert_eq!(DistanceUnit::Miles.wire_operator(), "$maxDistanceInMiles");
        assert_eq!(DistanceUnit::Kilometers.wire_operator(), "$maxDistanceInKilometers");
        assert_eq!(DistanceUnit::Radians.wire_operator(), "$maxDistanceInRadians");
    }

    #[test]
    fn test_deserialized_point_can_be_revalidated() {
        let p: GeoPoint = serde_json::from_str(r#"{"latitude": 120.0, "longitude": 0.0}"#).unwrap();
        assert!(p.validate().is_err());
    }
}

//! Geographic coordinate types.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Error returned when a latitude/longitude pair is out of range.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("invalid coordinate ({lat}, {lng}): {reason}")]
pub struct InvalidCoordinate {
    lat: f64,
    lng: f64,
    reason: &'static str,
}

/// A WGS84 latitude/longitude pair in degrees.
///
/// # Examples
///
/// ```
/// use itinerary_engine::domain::Coordinate;
///
/// let ben_thanh = Coordinate::new(10.772, 106.698).unwrap();
/// assert_eq!(ben_thanh.lat(), 10.772);
///
/// assert!(Coordinate::new(91.0, 0.0).is_err());
/// assert!(Coordinate::new(0.0, f64::NAN).is_err());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    lat: f64,
    lng: f64,
}

impl Coordinate {
    /// Create a coordinate, validating that both components are finite and
    /// within the usual degree ranges.
    pub fn new(lat: f64, lng: f64) -> Result<Self, InvalidCoordinate> {
        if !lat.is_finite() || !lng.is_finite() {
            return Err(InvalidCoordinate {
                lat,
                lng,
                reason: "components must be finite",
            });
        }
        if !(-90.0..=90.0).contains(&lat) {
            return Err(InvalidCoordinate {
                lat,
                lng,
                reason: "latitude must be within [-90, 90]",
            });
        }
        if !(-180.0..=180.0).contains(&lng) {
            return Err(InvalidCoordinate {
                lat,
                lng,
                reason: "longitude must be within [-180, 180]",
            });
        }
        Ok(Self { lat, lng })
    }

    pub fn lat(&self) -> f64 {
        self.lat
    }

    pub fn lng(&self) -> f64 {
        self.lng
    }
}

impl fmt::Display for Coordinate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5},{:.5}", self.lat, self.lng)
    }
}

/// A point handed to the route optimizer.
///
/// The rating only participates in nearest-neighbour tie-breaking: among
/// equally distant candidates the higher-rated one is visited first.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RoutePoint {
    pub coordinate: Coordinate,
    pub rating: Option<f64>,
}

impl RoutePoint {
    pub fn new(coordinate: Coordinate) -> Self {
        Self {
            coordinate,
            rating: None,
        }
    }

    pub fn with_rating(mut self, rating: f64) -> Self {
        self.rating = Some(rating);
        self
    }
}

impl From<Coordinate> for RoutePoint {
    fn from(coordinate: Coordinate) -> Self {
        RoutePoint::new(coordinate)
    }
}

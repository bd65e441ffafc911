//! Geocoding boundary.
//!
//! Geocoding only ever fills in item coordinates; the optimizer and the
//! synthesizer work from whatever coordinates items already have. A failed
//! lookup leaves the item without a coordinate, which is a valid state.

use std::collections::HashMap;

use crate::domain::Coordinate;
use crate::geo::distance_km;

/// Address ↔ coordinate lookups.
#[allow(async_fn_in_trait)]
pub trait Geocoder {
    /// Coordinate of an address, if it can be found.
    async fn forward(&self, address: &str) -> Option<Coordinate>;

    /// A human-readable address near a coordinate, if any.
    async fn reverse(&self, coordinate: Coordinate) -> Option<String>;
}

/// Reverse lookups match entries within this distance.
pub const DEFAULT_REVERSE_RADIUS_KM: f64 = 0.05;

/// Case- and whitespace-insensitive key for an address.
fn normalize(address: &str) -> String {
    address
        .split_whitespace()
        .map(str::to_lowercase)
        .collect::<Vec<_>>()
        .join(" ")
}

/// A fixed table of known places.
///
/// Useful offline and in tests.
#[derive(Debug, Clone)]
pub struct StaticGeocoder {
    /// Normalized address → (coordinate, address as given).
    places: HashMap<String, (Coordinate, String)>,
    reverse_radius_km: f64,
}

impl Default for StaticGeocoder {
    fn default() -> Self {
        Self {
            places: HashMap::new(),
            reverse_radius_km: DEFAULT_REVERSE_RADIUS_KM,
        }
    }
}

impl StaticGeocoder {
    /// Create an empty table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a place.
    pub fn add(&mut self, address: impl Into<String>, coordinate: Coordinate) {
        let address = address.into();
        self.places.insert(normalize(&address), (coordinate, address));
    }

    pub fn with_reverse_radius(mut self, km: f64) -> Self {
        self.reverse_radius_km = km;
        self
    }

    /// Synchronous form of [`Geocoder::forward`].
    pub fn lookup(&self, address: &str) -> Option<Coordinate> {
        self.places.get(&normalize(address)).map(|(c, _)| *c)
    }

    /// Synchronous form of [`Geocoder::reverse`]: the closest place within
    /// the reverse radius.
    pub fn nearest(&self, coordinate: Coordinate) -> Option<&str> {
        self.places
            .values()
            .map(|(c, address)| (distance_km(c, &coordinate), address))
            .filter(|(d, _)| *d <= self.reverse_radius_km)
            .min_by(|a, b| a.0.total_cmp(&b.0).then_with(|| a.1.cmp(b.1)))
            .map(|(_, address)| address.as_str())
    }

    pub fn len(&self) -> usize {
        self.places.len()
    }

    pub fn is_empty(&self) -> bool {
        self.places.is_empty()
    }
}

impl Geocoder for StaticGeocoder {
    async fn forward(&self, address: &str) -> Option<Coordinate> {
        self.lookup(address)
    }

    async fn reverse(&self, coordinate: Coordinate) -> Option<String> {
        self.nearest(coordinate).map(str::to_string)
    }
}

/// Builder for creating a static geocoder.
///
/// Provides a fluent API for adding places.
#[derive(Debug, Default)]
pub struct StaticGeocoderBuilder {
    inner: StaticGeocoder,
}

impl StaticGeocoderBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a place. Out-of-range coordinates are ignored.
    pub fn add(mut self, address: &str, lat: f64, lng: f64) -> Self {
        if let Ok(coordinate) = Coordinate::new(lat, lng) {
            self.inner.add(address, coordinate);
        }
        self
    }

    /// Build the geocoder.
    pub fn build(self) -> StaticGeocoder {
        self.inner
    }
}

/// Landmarks of central Ho Chi Minh City.
pub fn saigon_landmarks() -> StaticGeocoder {
    StaticGeocoderBuilder::new()
        .add("Ben Thanh Market", 10.7725, 106.6980)
        .add("Saigon Central Post Office", 10.7798, 106.6990)
        .add("Notre-Dame Cathedral Basilica of Saigon", 10.7798, 106.6990 + 0.0004)
        .add("Independence Palace", 10.7770, 106.6953)
        .add("War Remnants Museum", 10.7795, 106.6921)
        .add("Bitexco Financial Tower", 10.7716, 106.7044)
        .add("Saigon Opera House", 10.7769, 106.7032)
        .add("Bui Vien Walking Street", 10.7673, 106.6934)
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forward_ignores_case_and_spacing() {
        let geo = saigon_landmarks();
        let c = geo.lookup("  ben thanh   MARKET ").unwrap();
        assert_eq!((c.lat(), c.lng()), (10.7725, 106.6980));
        assert!(geo.lookup("Hoan Kiem Lake").is_none());
    }

    #[test]
    fn reverse_picks_the_closest_within_radius() {
        let geo = saigon_landmarks();
        let near_post_office = Coordinate::new(10.77981, 106.69901).unwrap();
        assert_eq!(geo.nearest(near_post_office), Some("Saigon Central Post Office"));

        let far = Coordinate::new(21.0285, 105.8542).unwrap();
        assert_eq!(geo.nearest(far), None);
    }

    #[test]
    fn builder_skips_invalid_coordinates() {
        let geo = StaticGeocoderBuilder::new()
            .add("ok", 1.0, 1.0)
            .add("bad", 123.0, 0.0)
            .build();
        assert_eq!(geo.len(), 1);
        assert!(!geo.is_empty());
    }

    #[tokio::test]
    async fn trait_delegates() {
        let geo = saigon_landmarks();
        let c = geo.forward("Saigon Opera House").await.unwrap();
        assert_eq!(geo.reverse(c).await.as_deref(), Some("Saigon Opera House"));
    }
}

//! Transport modes.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Error returned when parsing an unknown transport mode.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown transport mode: {0}")]
pub struct UnknownMode(String);

/// How the traveller moves between two stops.
///
/// `Car` and `Grab` (ride hailing) are distinct from `Driving` only for
/// display and fare purposes; they share its cost weight.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "lowercase")]
pub enum TransportMode {
    #[default]
    Driving,
    Car,
    Grab,
    Transit,
    Bicycling,
    Walking,
}

impl TransportMode {
    /// All modes, in declaration order.
    pub const ALL: [TransportMode; 6] = [
        TransportMode::Driving,
        TransportMode::Car,
        TransportMode::Grab,
        TransportMode::Transit,
        TransportMode::Bicycling,
        TransportMode::Walking,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            TransportMode::Driving => "driving",
            TransportMode::Car => "car",
            TransportMode::Grab => "grab",
            TransportMode::Transit => "transit",
            TransportMode::Bicycling => "bicycling",
            TransportMode::Walking => "walking",
        }
    }
}

impl fmt::Display for TransportMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for TransportMode {
    type Err = UnknownMode;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        TransportMode::ALL
            .into_iter()
            .find(|mode| mode.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| UnknownMode(s.to_string()))
    }
}

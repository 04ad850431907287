use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Number of entries in the variable catalog, and the width of every outcome vector.
pub const VARIABLE_COUNT: usize = 9;

/// Weather variables recorded for each analog.
///
/// Declaration order is the column order of stored outcome vectors and
/// must not change without bumping the outcome artifact version.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Variable {
    /// Air temperature at 2 m, °C.
    #[serde(rename = "temperature_2m")]
    Temperature2m,
    /// Dewpoint at 2 m, °C.
    #[serde(rename = "dewpoint_2m")]
    Dewpoint2m,
    /// Mean sea-level pressure, hPa.
    MeanSeaLevelPressure,
    /// Zonal wind at 10 m, m/s.
    #[serde(rename = "wind_u_10m")]
    WindU10m,
    /// Meridional wind at 10 m, m/s.
    #[serde(rename = "wind_v_10m")]
    WindV10m,
    /// Wind speed at 10 m, m/s.
    #[serde(rename = "wind_speed_10m")]
    WindSpeed10m,
    /// Accumulated precipitation over the horizon, mm.
    TotalPrecipitation,
    /// Total cloud cover, %.
    TotalCloudCover,
    /// Relative humidity at 2 m, %.
    #[serde(rename = "relative_humidity_2m")]
    RelativeHumidity2m,
}

impl Variable {
    /// Every variable in column order.
    pub const ALL: [Variable; VARIABLE_COUNT] = [
        Variable::Temperature2m,
        Variable::Dewpoint2m,
        Variable::MeanSeaLevelPressure,
        Variable::WindU10m,
        Variable::WindV10m,
        Variable::WindSpeed10m,
        Variable::TotalPrecipitation,
        Variable::TotalCloudCover,
        Variable::RelativeHumidity2m,
    ];

    /// Column of this variable inside an outcome vector.
    pub fn index(self) -> usize {
        self as usize
    }

    pub fn name(self) -> &'static str {
        match self {
            Variable::Temperature2m => "temperature_2m",
            Variable::Dewpoint2m => "dewpoint_2m",
            Variable::MeanSeaLevelPressure => "mean_sea_level_pressure",
            Variable::WindU10m => "wind_u_10m",
            Variable::WindV10m => "wind_v_10m",
            Variable::WindSpeed10m => "wind_speed_10m",
            Variable::TotalPrecipitation => "total_precipitation",
            Variable::TotalCloudCover => "total_cloud_cover",
            Variable::RelativeHumidity2m => "relative_humidity_2m",
        }
    }

    pub fn unit(self) -> &'static str {
        match self {
            Variable::Temperature2m | Variable::Dewpoint2m => "degC",
            Variable::MeanSeaLevelPressure => "hPa",
            Variable::WindU10m | Variable::WindV10m | Variable::WindSpeed10m => "m/s",
            Variable::TotalPrecipitation => "mm",
            Variable::TotalCloudCover | Variable::RelativeHumidity2m => "%",
        }
    }

    /// Physically admissible `(min, max)` range.
    pub fn bounds(self) -> (f32, f32) {
        match self {
            Variable::Temperature2m => (-90.0, 60.0),
            Variable::Dewpoint2m => (-90.0, 35.0),
            Variable::MeanSeaLevelPressure => (870.0, 1085.0),
            Variable::WindU10m | Variable::WindV10m => (-75.0, 75.0),
            Variable::WindSpeed10m => (0.0, 110.0),
            Variable::TotalPrecipitation => (0.0, 500.0),
            Variable::TotalCloudCover | Variable::RelativeHumidity2m => (0.0, 100.0),
        }
    }

    /// Whether `value` is finite and inside [`Variable::bounds`].
    pub fn admits(self, value: f32) -> bool {
        let (lo, hi) = self.bounds();
        value.is_finite() && value >= lo && value <= hi
    }

    /// Spread at which an ensemble for this variable is considered uninformative.
    pub fn default_reference_spread(self) -> f32 {
        match self {
            Variable::Temperature2m | Variable::Dewpoint2m => 6.0,
            Variable::MeanSeaLevelPressure => 8.0,
            Variable::WindU10m | Variable::WindV10m => 5.0,
            Variable::WindSpeed10m => 4.0,
            Variable::TotalPrecipitation => 5.0,
            Variable::TotalCloudCover => 35.0,
            Variable::RelativeHumidity2m => 20.0,
        }
    }
}

impl fmt::Display for Variable {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Unknown variable name.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unknown variable '{0}'")]
pub struct UnknownVariable(pub String);

impl FromStr for Variable {
    type Err = UnknownVariable;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Variable::ALL
            .into_iter()
            .find(|v| v.name() == s)
            .ok_or_else(|| UnknownVariable(s.to_string()))
    }
}

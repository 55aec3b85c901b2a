// Metric catalogue and monitored systems
use super::error::TelemetryError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Metric {
    Temperature,
    Humidity,
    Tvoc,
    Eco2,
    Co2,
    Tds,
    Ph,
    WindSpeed,
    Rainfall,
}

/// Inclusive value band.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Band {
    pub min: f64,
    pub max: f64,
}

impl Band {
    const fn new(min: f64, max: f64) -> Self {
        Self { min, max }
    }

    pub fn contains(&self, value: f64) -> bool {
        value >= self.min && value <= self.max
    }

    pub fn clamp(&self, value: f64) -> f64 {
        value.clamp(self.min, self.max)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MetricSpec {
    pub id: &'static str,
    pub label: &'static str,
    pub unit: &'static str,
    pub decimals: usize,
    pub valid_range: Band,
    pub optimal: Band,
    pub warning: Band,
    pub critical: Band,
    pub color: &'static str,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorStatus {
    Optimal,
    Normal,
    Warning,
    Critical,
}

impl Metric {
    pub const ALL: [Metric; 9] = [
        Metric::Temperature,
        Metric::Humidity,
        Metric::Tvoc,
        Metric::Eco2,
        Metric::Co2,
        Metric::Tds,
        Metric::Ph,
        Metric::WindSpeed,
        Metric::Rainfall,
    ];

    pub fn spec(&self) -> MetricSpec {
        match self {
            Metric::Temperature => MetricSpec {
                id: "temperature",
                label: "Temperature",
                unit: "°C",
                decimals: 1,
                valid_range: Band::new(0.0, 50.0),
                optimal: Band::new(20.0, 30.0),
                warning: Band::new(15.0, 35.0),
                critical: Band::new(10.0, 40.0),
                color: "#10b981",
            },
            Metric::Humidity => MetricSpec {
                id: "humidity",
                label: "Humidity",
                unit: "%",
                decimals: 0,
                valid_range: Band::new(0.0, 100.0),
                optimal: Band::new(60.0, 80.0),
                warning: Band::new(50.0, 90.0),
                critical: Band::new(40.0, 95.0),
                color: "#3b82f6",
            },
            Metric::Tvoc => MetricSpec {
                id: "tvoc",
                label: "TVOC",
                unit: "mg/m³",
                decimals: 2,
                valid_range: Band::new(0.1, 2.0),
                optimal: Band::new(0.0, 0.5),
                warning: Band::new(0.5, 1.0),
                critical: Band::new(1.0, 2.0),
                color: "#f59e0b",
            },
            Metric::Eco2 => MetricSpec {
                id: "eco2",
                label: "eCO₂",
                unit: "ppm",
                decimals: 0,
                valid_range: Band::new(350.0, 1000.0),
                optimal: Band::new(300.0, 500.0),
                warning: Band::new(500.0, 800.0),
                critical: Band::new(800.0, 1000.0),
                color: "#8b5cf6",
            },
            Metric::Co2 => MetricSpec {
                id: "co2",
                label: "CO₂",
                unit: "ppm",
                decimals: 0,
                valid_range: Band::new(350.0, 1000.0),
                optimal: Band::new(300.0, 500.0),
                warning: Band::new(500.0, 800.0),
                critical: Band::new(800.0, 1000.0),
                color: "#8b5cf6",
            },
            Metric::Tds => MetricSpec {
                id: "tds",
                label: "TDS",
                unit: "ppm",
                decimals: 0,
                valid_range: Band::new(500.0, 1500.0),
                optimal: Band::new(700.0, 1000.0),
                warning: Band::new(600.0, 1200.0),
                critical: Band::new(500.0, 1500.0),
                color: "#06b6d4",
            },
            Metric::Ph => MetricSpec {
                id: "ph",
                label: "pH Water",
                unit: "",
                decimals: 1,
                valid_range: Band::new(5.0, 8.0),
                optimal: Band::new(6.5, 7.5),
                warning: Band::new(6.0, 8.0),
                critical: Band::new(5.0, 9.0),
                color: "#ec4899",
            },
            Metric::WindSpeed => MetricSpec {
                id: "windSpeed",
                label: "Wind Speed",
                unit: "km/h",
                decimals: 1,
                valid_range: Band::new(0.0, 50.0),
                optimal: Band::new(0.0, 15.0),
                warning: Band::new(15.0, 30.0),
                critical: Band::new(30.0, 50.0),
                color: "#14b8a6",
            },
            Metric::Rainfall => MetricSpec {
                id: "rainfall",
                label: "Rainfall",
                unit: "mm",
                decimals: 2,
                valid_range: Band::new(0.0, 100.0),
                optimal: Band::new(0.0, 10.0),
                warning: Band::new(10.0, 50.0),
                critical: Band::new(50.0, 100.0),
                color: "#0ea5e9",
            },
        }
    }

    /// Decimal places used when synthesizing samples. Concentrations in ppm
    /// are integer-like.
    pub fn seed_precision(&self) -> usize {
        match self {
            Metric::Eco2 | Metric::Co2 | Metric::Tds => 0,
            _ => 2,
        }
    }

    pub fn format_value(&self, value: f64) -> String {
        format_fixed(value, self.spec().decimals)
    }

    /// First band (optimal, warning, critical) containing the value wins.
    pub fn status_for(&self, value: f64) -> SensorStatus {
        let spec = self.spec();
        if spec.optimal.contains(value) {
            SensorStatus::Optimal
        } else if spec.warning.contains(value) {
            SensorStatus::Warning
        } else if spec.critical.contains(value) {
            SensorStatus::Critical
        } else {
            SensorStatus::Normal
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.spec().id)
    }
}

impl FromStr for Metric {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Metric::ALL
            .iter()
            .copied()
            .find(|m| m.spec().id.eq_ignore_ascii_case(s))
            .or(match s {
                "phAir" => Some(Metric::Ph),
                _ => None,
            })
            .ok_or_else(|| TelemetryError::UnknownMetric(s.to_string()))
    }
}

/// Round to a fixed number of decimals, mapping non-finite input to zero
/// so labels never print NaN or inf.
pub fn round_to(value: f64, decimals: usize) -> f64 {
    if !value.is_finite() {
        return 0.0;
    }
    let factor = 10f64.powi(decimals as i32);
    (value * factor).round() / factor
}

pub fn format_fixed(value: f64, decimals: usize) -> String {
    let value = if value.is_finite() { value } else { 0.0 };
    format!("{:.*}", decimals, value)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum SystemId {
    #[serde(rename = "ghcompax")]
    GhCompax,
    #[serde(rename = "skyvera")]
    SkyVera,
}

impl SystemId {
    pub const ALL: [SystemId; 2] = [SystemId::GhCompax, SystemId::SkyVera];

    pub fn slug(&self) -> &'static str {
        match self {
            SystemId::GhCompax => "ghcompax",
            SystemId::SkyVera => "skyvera",
        }
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            SystemId::GhCompax => "GHCompax",
            SystemId::SkyVera => "SkyVera",
        }
    }

    pub fn metrics(&self) -> &'static [Metric] {
        match self {
            SystemId::GhCompax => &[
                Metric::Temperature,
                Metric::Humidity,
                Metric::Tvoc,
                Metric::Eco2,
                Metric::Tds,
                Metric::Ph,
            ],
            SystemId::SkyVera => &[
                Metric::WindSpeed,
                Metric::Rainfall,
                Metric::Temperature,
                Metric::Humidity,
                Metric::Co2,
                Metric::Tvoc,
            ],
        }
    }
}

impl fmt::Display for SystemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.display_name())
    }
}

impl FromStr for SystemId {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        SystemId::ALL
            .iter()
            .copied()
            .find(|sys| sys.slug().eq_ignore_ascii_case(s))
            .ok_or_else(|| TelemetryError::UnknownSystem(s.to_string()))
    }
}

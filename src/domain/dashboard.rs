// Dashboard domain model
use super::aggregation::{aggregate_by_bucket, bucket_start, filter_by_window, SeriesStats};
use super::error::TelemetryError;
use super::metric::{Metric, SystemId};
use super::telemetry::{Sample, TileData, DAY_MS, HOUR_MS};
use chrono::TimeZone;
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display};
use std::str::FromStr;

/// Time window and aggregation granularity of a chart.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum DisplayMode {
    /// Last hour of raw per-minute samples.
    #[default]
    Recent,
    /// Last 24 hours averaged per hour.
    HourlyHistory,
    /// Last 7 days averaged per day.
    DailyHistory,
    /// Everything retained, raw.
    Full,
}

impl DisplayMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            DisplayMode::Recent => "recent",
            DisplayMode::HourlyHistory => "hourlyHistory",
            DisplayMode::DailyHistory => "dailyHistory",
            DisplayMode::Full => "full",
        }
    }

    pub fn window_ms(&self) -> Option<i64> {
        match self {
            DisplayMode::Recent => Some(HOUR_MS),
            DisplayMode::HourlyHistory => Some(DAY_MS),
            DisplayMode::DailyHistory => Some(7 * DAY_MS),
            DisplayMode::Full => None,
        }
    }

    pub fn bucket_ms(&self) -> Option<i64> {
        match self {
            DisplayMode::HourlyHistory => Some(HOUR_MS),
            DisplayMode::DailyHistory => Some(DAY_MS),
            DisplayMode::Recent | DisplayMode::Full => None,
        }
    }

    pub fn expected_points(&self) -> Option<usize> {
        match self {
            DisplayMode::Recent => Some(60),
            DisplayMode::HourlyHistory => Some(24),
            DisplayMode::DailyHistory => Some(7),
            DisplayMode::Full => None,
        }
    }

    /// Whether the mode reads from long-term history rather than the live
    /// window.
    pub fn is_history(&self) -> bool {
        !matches!(self, DisplayMode::Recent)
    }
}

impl Display for DisplayMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DisplayMode {
    type Err = TelemetryError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "recent" | "1hour" | "detail2" => Ok(DisplayMode::Recent),
            "hourlyHistory" | "24hour" | "detail4" => Ok(DisplayMode::HourlyHistory),
            "dailyHistory" | "7days" | "history" => Ok(DisplayMode::DailyHistory),
            "full" => Ok(DisplayMode::Full),
            other => Err(TelemetryError::UnknownMode(other.to_string())),
        }
    }
}

/// Visible sequence for a mode: window filter, then bucket averaging.
/// Bucketed modes keep at most their expected number of buckets, the one
/// containing `now_ms` being the last.
pub fn derive_view<Tz>(samples: &[Sample], mode: DisplayMode, now_ms: i64, tz: &Tz) -> Vec<Sample>
where
    Tz: TimeZone,
    Tz::Offset: Display,
{
    let windowed = match mode.window_ms() {
        Some(window) => filter_by_window(samples, window, now_ms),
        None => samples.to_vec(),
    };
    let Some(bucket) = mode.bucket_ms() else {
        return windowed;
    };

    let mut buckets = aggregate_by_bucket(&windowed, bucket, tz);
    if let Some(slots) = mode.expected_points() {
        let first = bucket_start(now_ms, bucket, tz) - (slots as i64 - 1) * bucket;
        buckets.retain(|b| b.timestamp >= first);
    }
    buckets
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartView {
    pub system: SystemId,
    pub metric: Metric,
    pub mode: DisplayMode,
    pub title: String,
    pub unit: String,
    pub color: String,
    pub fraction_digits: usize,
    pub samples: Vec<Sample>,
    pub stats: Option<SeriesStats>,
}

impl ChartView {
    pub fn new(system: SystemId, metric: Metric, mode: DisplayMode, samples: Vec<Sample>) -> Self {
        let spec = metric.spec();
        let stats = SeriesStats::from_samples(&samples);
        Self {
            system,
            metric,
            mode,
            title: spec.label.to_string(),
            unit: spec.unit.to_string(),
            color: spec.color.to_string(),
            fraction_digits: spec.decimals,
            samples,
            stats,
        }
    }
}

/// How much of the expected point count a view actually has. Reported to
/// the user, never treated as an error.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Completeness {
    pub actual_points: usize,
    pub expected_points: usize,
    pub ratio: f64,
}

impl Completeness {
    pub fn new(actual_points: usize, expected_points: usize) -> Self {
        let ratio = if expected_points == 0 {
            1.0
        } else {
            actual_points as f64 / expected_points as f64
        };
        Self {
            actual_points,
            expected_points,
            ratio,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DrillDown {
    pub view: ChartView,
    pub completeness: Option<Completeness>,
}

impl DrillDown {
    pub fn new(view: ChartView) -> Self {
        let completeness = view
            .mode
            .expected_points()
            .map(|expected| Completeness::new(view.samples.len(), expected));
        Self { view, completeness }
    }
}

/// Everything a system page shows at once: tiles for the latest reading and
/// one chart per tracked metric in the active mode.
#[derive(Debug, Clone, Serialize)]
pub struct SystemOverview {
    pub system: SystemId,
    pub title: &'static str,
    pub mode: DisplayMode,
    pub selected_metric: Metric,
    pub last_update: String,
    pub tiles: Vec<TileData>,
    pub charts: Vec<ChartView>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::telemetry::MINUTE_MS;
    use chrono::Utc;

    const MIDNIGHT: i64 = 1_709_596_800_000;

    #[test]
    fn test_mode_aliases() {
        assert_eq!("1hour".parse::<DisplayMode>().unwrap(), DisplayMode::Recent);
        assert_eq!("detail4".parse::<DisplayMode>().unwrap(), DisplayMode::HourlyHistory);
        assert_eq!("7days".parse::<DisplayMode>().unwrap(), DisplayMode::DailyHistory);
        assert_eq!("full".parse::<DisplayMode>().unwrap(), DisplayMode::Full);
        assert!("weekly".parse::<DisplayMode>().is_err());
    }

    #[test]
    fn test_derive_view_per_mode() {
        // 48 hours of 10-minute samples ending at `now`.
        let now = MIDNIGHT + 2 * DAY_MS;
        let samples: Vec<Sample> = (0..288)
            .map(|i| Sample::new(String::new(), 1.0, now - (287 - i) * 10 * MINUTE_MS))
            .collect();

        let recent = derive_view(&samples, DisplayMode::Recent, now, &Utc);
        assert_eq!(recent.len(), 7);

        // The bucket straddling the window start is dropped, so a full day
        // never reports more than 24 hours.
        let hourly = derive_view(&samples, DisplayMode::HourlyHistory, now, &Utc);
        assert_eq!(hourly.len(), 24);
        assert_eq!(hourly.first().unwrap().timestamp, now - 23 * HOUR_MS);
        assert!(hourly.iter().all(|b| b.value == 1.0));

        let daily = derive_view(&samples, DisplayMode::DailyHistory, now, &Utc);
        assert_eq!(daily.len(), 3);

        assert_eq!(derive_view(&samples, DisplayMode::Full, now, &Utc).len(), 288);
    }

    #[test]
    fn test_drilldown_reports_completeness() {
        let samples: Vec<Sample> = (0..3)
            .map(|i| Sample::new(String::new(), i as f64, MIDNIGHT + i * DAY_MS))
            .collect();
        let view = ChartView::new(SystemId::SkyVera, Metric::Rainfall, DisplayMode::DailyHistory, samples);
        let drill = DrillDown::new(view);
        let completeness = drill.completeness.unwrap();
        assert_eq!(completeness.actual_points, 3);
        assert_eq!(completeness.expected_points, 7);
        assert!((completeness.ratio - 3.0 / 7.0).abs() < 1e-12);
    }
}

//! Pixel-space mapping for a chart surface.
//!
//! Geometry is a pure function of the visible samples and the surface size.
//! It is rebuilt on every draw and every pointer lookup so a live tick that
//! lands mid-animation can never leave a stale mapping behind.

use super::error::TelemetryError;
use super::telemetry::Sample;
use serde::{Deserialize, Serialize};

const EDGE_EPSILON: f64 = 1e-6;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Padding {
    pub top: f64,
    pub right: f64,
    pub bottom: f64,
    pub left: f64,
}

impl Padding {
    pub const fn new(top: f64, right: f64, bottom: f64, left: f64) -> Self {
        Self {
            top,
            right,
            bottom,
            left,
        }
    }

    /// Insets of the compact chart card.
    pub const CARD: Padding = Padding::new(20.0, 20.0, 50.0, 50.0);

    /// Insets of the drill-down view, which leaves room for reference labels.
    pub const DETAIL: Padding = Padding::new(30.0, 60.0, 70.0, 60.0);
}

/// How many x slots the plot is divided into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Spacing {
    /// One slot per sample; the line always spans the full width.
    Series,
    /// A fixed slot count, so partial data keeps its relative x position.
    Fixed(usize),
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ChartGeometry {
    pub width: f64,
    pub height: f64,
    pub padding: Padding,
    pub plot_width: f64,
    pub plot_height: f64,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
    /// Number of x slots (`N`).
    pub slots: usize,
    pub x_step: f64,
}

impl ChartGeometry {
    pub fn compute(
        samples: &[Sample],
        width: f64,
        height: f64,
        padding: Padding,
        spacing: Spacing,
    ) -> Result<Self, TelemetryError> {
        let finite = samples.iter().map(|s| s.value).filter(|v| v.is_finite());
        let (min, max, sum, count) = finite.fold(
            (f64::INFINITY, f64::NEG_INFINITY, 0.0, 0usize),
            |(min, max, sum, count), v| (min.min(v), max.max(v), sum + v, count + 1),
        );
        if count == 0 {
            return Err(TelemetryError::EmptySeries);
        }

        let plot_width = (width - padding.left - padding.right).max(0.0);
        let plot_height = (height - padding.top - padding.bottom).max(0.0);
        let slots = match spacing {
            Spacing::Series => samples.len(),
            Spacing::Fixed(expected) => expected.max(samples.len()),
        };
        let x_step = if slots > 1 {
            plot_width / (slots - 1) as f64
        } else {
            0.0
        };

        Ok(Self {
            width,
            height,
            padding,
            plot_width,
            plot_height,
            min,
            max,
            mean: sum / count as f64,
            slots,
            x_step,
        })
    }

    /// `max - min`, or 1 for a flat series.
    pub fn value_range(&self) -> f64 {
        let range = self.max - self.min;
        if range > 0.0 { range } else { 1.0 }
    }

    pub fn index_to_x(&self, index: usize) -> f64 {
        self.padding.left + index as f64 * self.x_step
    }

    pub fn value_to_y(&self, value: f64) -> f64 {
        let value = if value.is_finite() { value } else { self.min };
        self.padding.top + self.plot_height
            - ((value - self.min) / self.value_range()) * self.plot_height
    }

    pub fn baseline_y(&self) -> f64 {
        self.padding.top + self.plot_height
    }

    pub fn right_x(&self) -> f64 {
        self.padding.left + self.plot_width
    }

    /// Inclusive test against the plot rectangle, tolerant of the rounding
    /// error `index_to_x` accumulates at the right edge.
    pub fn contains(&self, x: f64, y: f64) -> bool {
        x >= self.padding.left - EDGE_EPSILON
            && x <= self.right_x() + EDGE_EPSILON
            && y >= self.padding.top - EDGE_EPSILON
            && y <= self.baseline_y() + EDGE_EPSILON
    }

    /// Nearest slot for a pixel column, before any bounds checks.
    pub fn x_to_index(&self, x: f64) -> Option<usize> {
        if self.x_step <= 0.0 {
            return Some(0);
        }
        let index = ((x - self.padding.left) / self.x_step).round();
        (index >= 0.0).then_some(index as usize)
    }

    /// Interval between labelled vertical grid lines.
    pub fn label_interval(&self) -> usize {
        (self.slots / 10).max(1)
    }
}

// Chart drawing over an abstract surface
use crate::domain::geometry::ChartGeometry;
use crate::domain::metric::format_fixed;
use crate::domain::telemetry::Sample;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Stroke {
    pub color: String,
    pub width: f64,
    pub dash: Option<[f64; 2]>,
}

impl Stroke {
    pub fn solid(color: impl Into<String>, width: f64) -> Self {
        Self {
            color: color.into(),
            width,
            dash: None,
        }
    }

    pub fn dashed(color: impl Into<String>, width: f64, dash: [f64; 2]) -> Self {
        Self {
            color: color.into(),
            width,
            dash: Some(dash),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Anchor {
    Start,
    Middle,
    End,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextStyle {
    pub color: String,
    pub size: f64,
    pub anchor: Anchor,
    pub bold: bool,
}

/// One stop of a vertical gradient, `offset` in `0..=1` from top to bottom.
#[derive(Debug, Clone, PartialEq)]
pub struct GradientStop {
    pub offset: f64,
    pub color: String,
}

/// Draw calls the renderer issues. Implementations decide the output format.
pub trait DrawSurface {
    fn line(&mut self, from: Point, to: Point, stroke: &Stroke);
    fn polyline(&mut self, points: &[Point], stroke: &Stroke);
    /// Closed polygon filled with a gradient running from `top` to `bottom`.
    fn fill_area(&mut self, points: &[Point], top: f64, bottom: f64, stops: &[GradientStop]);
    fn circle(&mut self, center: Point, radius: f64, fill: &str, stroke: Option<&Stroke>);
    fn text(&mut self, at: Point, content: &str, style: &TextStyle);
}

/// Current theme, read at every draw so a toggle takes effect on the next
/// frame.
pub trait ThemeSource: Send + Sync {
    fn is_dark(&self) -> bool;
}

impl ThemeSource for bool {
    fn is_dark(&self) -> bool {
        *self
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Palette {
    pub grid: &'static str,
    pub text: &'static str,
    pub axis: &'static str,
    pub marker_ring: &'static str,
}

impl Palette {
    pub fn for_theme(dark: bool) -> Self {
        if dark {
            Self {
                grid: "#374151",
                text: "#9ca3af",
                axis: "#4b5563",
                marker_ring: "#ffffff",
            }
        } else {
            Self {
                grid: "#f5f5f5",
                text: "#6b7280",
                axis: "#d1d5db",
                marker_ring: "#ffffff",
            }
        }
    }
}

const MEAN_COLOR: &str = "#10b981";
const MAX_COLOR: &str = "#ef4444";
const MIN_COLOR: &str = "#3b82f6";
const REFERENCE_DASH: [f64; 2] = [5.0, 3.0];

#[derive(Debug, Clone, PartialEq)]
pub struct RenderOptions {
    pub color: String,
    pub decimals: usize,
    pub grid_rows: usize,
    pub reference_lines: bool,
    pub marker_every: usize,
    pub line_width: f64,
    pub axis_title: Option<String>,
}

impl RenderOptions {
    /// Compact chart card.
    pub fn card(color: &str, decimals: usize) -> Self {
        Self {
            color: color.to_string(),
            decimals,
            grid_rows: 5,
            reference_lines: false,
            marker_every: 3,
            line_width: 3.0,
            axis_title: None,
        }
    }

    /// Drill-down view with mean/max/min reference lines.
    pub fn detail(color: &str, decimals: usize, axis_title: Option<String>) -> Self {
        Self {
            color: color.to_string(),
            decimals,
            grid_rows: 6,
            reference_lines: true,
            marker_every: 3,
            line_width: 3.0,
            axis_title,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    NoData,
    Drawn { revealed: usize },
}

pub struct ChartRenderer {
    theme: Arc<dyn ThemeSource>,
    options: RenderOptions,
}

impl ChartRenderer {
    pub fn new(theme: Arc<dyn ThemeSource>, options: RenderOptions) -> Self {
        Self { theme, options }
    }

    /// Draws the first `reveal_count` samples. `geometry` is `None` for an
    /// empty series, in which case nothing is drawn.
    pub fn render<S: DrawSurface + ?Sized>(
        &self,
        samples: &[Sample],
        geometry: Option<&ChartGeometry>,
        reveal_count: usize,
        surface: &mut S,
    ) -> RenderOutcome {
        let Some(geometry) = geometry.filter(|_| !samples.is_empty()) else {
            return RenderOutcome::NoData;
        };
        let palette = Palette::for_theme(self.theme.is_dark());
        let revealed = reveal_count.min(samples.len());

        self.draw_horizontal_grid(geometry, &palette, surface);
        self.draw_vertical_grid(geometry, samples, &palette, surface);
        if self.options.reference_lines {
            self.draw_reference_lines(geometry, surface);
        }
        self.draw_axes(geometry, &palette, surface);

        let points: Vec<Point> = samples[..revealed]
            .iter()
            .enumerate()
            .map(|(i, s)| Point {
                x: geometry.index_to_x(i),
                y: geometry.value_to_y(s.value),
            })
            .collect();

        if let (Some(first), Some(last)) = (points.first(), points.last()) {
            let baseline = geometry.baseline_y();
            let mut area = Vec::with_capacity(points.len() + 2);
            area.push(Point { x: first.x, y: baseline });
            area.extend(points.iter().copied());
            area.push(Point { x: last.x, y: baseline });
            let color = &self.options.color;
            surface.fill_area(
                &area,
                geometry.padding.top,
                baseline,
                &[
                    GradientStop { offset: 0.0, color: format!("{color}50") },
                    GradientStop { offset: 0.5, color: format!("{color}20") },
                    GradientStop { offset: 1.0, color: format!("{color}00") },
                ],
            );
            surface.polyline(&points, &Stroke::solid(color.clone(), self.options.line_width));
            self.draw_markers(&points, &palette, surface);
        }

        RenderOutcome::Drawn { revealed }
    }

    fn draw_horizontal_grid<S: DrawSurface + ?Sized>(
        &self,
        geometry: &ChartGeometry,
        palette: &Palette,
        surface: &mut S,
    ) {
        let rows = self.options.grid_rows.max(1);
        let grid = Stroke::solid(palette.grid, 1.0);
        let label = TextStyle {
            color: palette.text.to_string(),
            size: 11.0,
            anchor: Anchor::End,
            bold: false,
        };

        for row in 0..=rows {
            let y = geometry.padding.top + geometry.plot_height * row as f64 / rows as f64;
            surface.line(
                Point { x: geometry.padding.left, y },
                Point { x: geometry.right_x(), y },
                &grid,
            );
            let value = geometry.max - geometry.value_range() * row as f64 / rows as f64;
            surface.text(
                Point { x: geometry.padding.left - 10.0, y: y + 4.0 },
                &format_fixed(value, self.options.decimals),
                &label,
            );
        }

        if let Some(title) = &self.options.axis_title {
            surface.text(
                Point { x: 15.0, y: geometry.padding.top + geometry.plot_height / 2.0 },
                title,
                &TextStyle { bold: true, anchor: Anchor::Middle, ..label },
            );
        }
    }

    fn draw_vertical_grid<S: DrawSurface + ?Sized>(
        &self,
        geometry: &ChartGeometry,
        samples: &[Sample],
        palette: &Palette,
        surface: &mut S,
    ) {
        let grid = Stroke::solid(palette.grid, 1.0);
        let label = TextStyle {
            color: palette.text.to_string(),
            size: 11.0,
            anchor: Anchor::Middle,
            bold: false,
        };

        for slot in (0..geometry.slots).step_by(geometry.label_interval()) {
            let x = geometry.index_to_x(slot);
            surface.line(
                Point { x, y: geometry.padding.top },
                Point { x, y: geometry.baseline_y() },
                &grid,
            );
            // Fixed spacing can leave slots with no sample yet.
            if let Some(sample) = samples.get(slot) {
                surface.text(Point { x, y: geometry.baseline_y() + 20.0 }, &sample.time, &label);
            }
        }
    }

    fn draw_reference_lines<S: DrawSurface + ?Sized>(&self, geometry: &ChartGeometry, surface: &mut S) {
        for (name, value, color) in [
            ("Avg", geometry.mean, MEAN_COLOR),
            ("Max", geometry.max, MAX_COLOR),
            ("Min", geometry.min, MIN_COLOR),
        ] {
            let y = geometry.value_to_y(value);
            surface.line(
                Point { x: geometry.padding.left, y },
                Point { x: geometry.right_x(), y },
                &Stroke::dashed(color, 1.5, REFERENCE_DASH),
            );
            surface.text(
                Point { x: geometry.right_x() + 5.0, y: y + 4.0 },
                &format!("{name}: {}", format_fixed(value, self.options.decimals)),
                &TextStyle {
                    color: color.to_string(),
                    size: 10.0,
                    anchor: Anchor::Start,
                    bold: true,
                },
            );
        }
    }

    fn draw_axes<S: DrawSurface + ?Sized>(&self, geometry: &ChartGeometry, palette: &Palette, surface: &mut S) {
        let axis = Stroke::solid(palette.axis, 2.0);
        let origin = Point {
            x: geometry.padding.left,
            y: geometry.baseline_y(),
        };
        surface.line(
            Point { x: geometry.padding.left, y: geometry.padding.top },
            origin,
            &axis,
        );
        surface.line(origin, Point { x: geometry.right_x(), y: geometry.baseline_y() }, &axis);
    }

    fn draw_markers<S: DrawSurface + ?Sized>(&self, points: &[Point], palette: &Palette, surface: &mut S) {
        let color = &self.options.color;
        let every = self.options.marker_every.max(1);
        let Some((last, rest)) = points.split_last() else {
            return;
        };

        for (i, point) in rest.iter().enumerate() {
            if i % every == 0 {
                surface.circle(*point, 3.0, color, None);
            }
        }

        surface.circle(*last, 8.0, &format!("{color}30"), None);
        surface.circle(
            *last,
            5.0,
            color,
            Some(&Stroke::solid(palette.marker_ring, 2.5)),
        );
    }
}

// SVG draw surface
use crate::application::chart_renderer::{Anchor, DrawSurface, GradientStop, Point, Stroke, TextStyle};
use std::fmt::Write;

/// Accumulates draw calls as SVG elements.
pub struct SvgSurface {
    width: f64,
    height: f64,
    defs: String,
    body: String,
    gradients: usize,
}

impl SvgSurface {
    pub fn new(width: f64, height: f64) -> Self {
        Self {
            width,
            height,
            defs: String::new(),
            body: String::new(),
            gradients: 0,
        }
    }

    pub fn finish(self) -> String {
        let mut out = String::with_capacity(self.body.len() + self.defs.len() + 256);
        let _ = write!(
            out,
            r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#,
            w = fmt_num(self.width),
            h = fmt_num(self.height),
        );
        if !self.defs.is_empty() {
            let _ = write!(out, "<defs>{}</defs>", self.defs);
        }
        out.push_str(&self.body);
        out.push_str("</svg>");
        out
    }
}

fn fmt_num(v: f64) -> String {
    let v = if v.is_finite() { v } else { 0.0 };
    let s = format!("{v:.2}");
    s.trim_end_matches('0').trim_end_matches('.').to_string()
}

fn points_attr(points: &[Point]) -> String {
    points
        .iter()
        .map(|p| format!("{},{}", fmt_num(p.x), fmt_num(p.y)))
        .collect::<Vec<_>>()
        .join(" ")
}

fn stroke_attrs(stroke: &Stroke) -> String {
    let mut attrs = format!(
        r#" stroke="{}" stroke-width="{}""#,
        escape(&stroke.color),
        fmt_num(stroke.width)
    );
    if let Some([on, off]) = stroke.dash {
        let _ = write!(attrs, r#" stroke-dasharray="{},{}""#, fmt_num(on), fmt_num(off));
    }
    attrs
}

fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

impl DrawSurface for SvgSurface {
    fn line(&mut self, from: Point, to: Point, stroke: &Stroke) {
        let _ = write!(
            self.body,
            r#"<line x1="{}" y1="{}" x2="{}" y2="{}"{}/>"#,
            fmt_num(from.x),
            fmt_num(from.y),
            fmt_num(to.x),
            fmt_num(to.y),
            stroke_attrs(stroke)
        );
    }

    fn polyline(&mut self, points: &[Point], stroke: &Stroke) {
        let _ = write!(
            self.body,
            r#"<polyline points="{}" fill="none"{} stroke-linejoin="round" stroke-linecap="round"/>"#,
            points_attr(points),
            stroke_attrs(stroke)
        );
    }

    fn fill_area(&mut self, points: &[Point], top: f64, bottom: f64, stops: &[GradientStop]) {
        self.gradients += 1;
        let id = format!("area-gradient-{}", self.gradients);
        let _ = write!(
            self.defs,
            r#"<linearGradient id="{id}" gradientUnits="userSpaceOnUse" x1="0" y1="{}" x2="0" y2="{}">"#,
            fmt_num(top),
            fmt_num(bottom)
        );
        for stop in stops {
            let _ = write!(
                self.defs,
                r#"<stop offset="{}" stop-color="{}"/>"#,
                fmt_num(stop.offset),
                escape(&stop.color)
            );
        }
        self.defs.push_str("</linearGradient>");

        let _ = write!(
            self.body,
            r#"<polygon points="{}" fill="url(#{id})"/>"#,
            points_attr(points)
        );
    }

    fn circle(&mut self, center: Point, radius: f64, fill: &str, stroke: Option<&Stroke>) {
        let _ = write!(
            self.body,
            r#"<circle cx="{}" cy="{}" r="{}" fill="{}"{}/>"#,
            fmt_num(center.x),
            fmt_num(center.y),
            fmt_num(radius),
            escape(fill),
            stroke.map(stroke_attrs).unwrap_or_default()
        );
    }

    fn text(&mut self, at: Point, content: &str, style: &TextStyle) {
        let anchor = match style.anchor {
            Anchor::Start => "start",
            Anchor::Middle => "middle",
            Anchor::End => "end",
        };
        let weight = if style.bold { r#" font-weight="bold""# } else { "" };
        let _ = write!(
            self.body,
            r#"<text x="{}" y="{}" fill="{}" font-size="{}" text-anchor="{anchor}"{weight}>{}</text>"#,
            fmt_num(at.x),
            fmt_num(at.y),
            escape(&style.color),
            fmt_num(style.size),
            escape(content)
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_svg_document_structure() {
        let mut svg = SvgSurface::new(400.0, 200.0);
        svg.line(
            Point { x: 0.0, y: 0.5 },
            Point { x: 10.25, y: 0.5 },
            &Stroke::dashed("#ef4444", 1.5, [5.0, 3.0]),
        );
        svg.fill_area(
            &[Point { x: 0.0, y: 100.0 }, Point { x: 5.0, y: 20.0 }, Point { x: 10.0, y: 100.0 }],
            20.0,
            100.0,
            &[GradientStop { offset: 0.0, color: "#10b98150".into() }],
        );
        svg.text(
            Point { x: 1.0, y: 2.0 },
            "Avg: <20>",
            &TextStyle {
                color: "#9ca3af".into(),
                size: 11.0,
                anchor: Anchor::End,
                bold: false,
            },
        );
        let out = svg.finish();

        assert!(out.starts_with(r#"<svg xmlns="http://www.w3.org/2000/svg" width="400" height="200""#));
        assert!(out.contains(
            r##"<line x1="0" y1="0.5" x2="10.25" y2="0.5" stroke="#ef4444" stroke-width="1.5" stroke-dasharray="5,3"/>"##
        ));
        assert!(out.contains(r#"<linearGradient id="area-gradient-1""#));
        assert!(out.contains(r#"fill="url(#area-gradient-1)""#));
        assert!(out.contains("Avg: &lt;20&gt;"));
        assert!(out.ends_with("</svg>"));
    }

    #[test]
    fn test_numbers_are_compact_and_finite() {
        assert_eq!(fmt_num(12.0), "12");
        assert_eq!(fmt_num(12.346), "12.35");
        assert_eq!(fmt_num(f64::NAN), "0");
        assert_eq!(fmt_num(-0.5), "-0.5");
    }
}

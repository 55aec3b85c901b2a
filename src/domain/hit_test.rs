// Pointer to nearest revealed sample lookup
use super::geometry::ChartGeometry;
use super::telemetry::Sample;
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Hit {
    pub index: usize,
    pub sample: Sample,
    /// Marker position, computed with the same geometry used for drawing.
    pub x: f64,
    pub y: f64,
}

/// Resolves a pointer position to the nearest drawn sample.
///
/// Returns `None` when the pointer is outside the plot rectangle or when the
/// nearest slot has no sample yet or has not been revealed by the entry
/// animation.
pub fn hit_test(
    pointer_x: f64,
    pointer_y: f64,
    geometry: &ChartGeometry,
    samples: &[Sample],
    reveal_count: usize,
) -> Option<Hit> {
    if !pointer_x.is_finite() || !pointer_y.is_finite() {
        return None;
    }
    if !geometry.contains(pointer_x, pointer_y) {
        return None;
    }

    let index = geometry.x_to_index(pointer_x)?;
    if index >= reveal_count {
        return None;
    }
    let sample = samples.get(index)?;

    Some(Hit {
        index,
        sample: sample.clone(),
        x: geometry.index_to_x(index),
        y: geometry.value_to_y(sample.value),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::geometry::{Padding, Spacing};

    fn series(n: usize) -> Vec<Sample> {
        (0..n)
            .map(|i| Sample::new(format!("t{i}"), ((i * 37) % 11) as f64 + 0.25 * i as f64, i as i64 * 60_000))
            .collect()
    }

    #[test]
    fn test_round_trip_every_index() {
        for n in [2usize, 3, 10, 60, 144] {
            let data = series(n);
            let g = ChartGeometry::compute(&data, 640.0, 270.0, Padding::CARD, Spacing::Series).unwrap();
            for (i, s) in data.iter().enumerate() {
                let hit = hit_test(g.index_to_x(i), g.value_to_y(s.value), &g, &data, data.len())
                    .unwrap_or_else(|| panic!("no hit for index {i} of {n}"));
                assert_eq!(hit.index, i);
                assert_eq!(hit.x, g.index_to_x(i));
                assert_eq!(hit.y, g.value_to_y(s.value));
            }
        }
    }

    #[test]
    fn test_unrevealed_points_are_not_hit() {
        let data = series(10);
        let g = ChartGeometry::compute(&data, 600.0, 300.0, Padding::CARD, Spacing::Series).unwrap();

        let last_revealed = hit_test(g.index_to_x(4), g.value_to_y(data[4].value), &g, &data, 5).unwrap();
        assert_eq!(last_revealed.index, 4);

        for i in 5..10 {
            assert!(hit_test(g.index_to_x(i), g.value_to_y(data[i].value), &g, &data, 5).is_none());
        }
    }

    #[test]
    fn test_outside_plot_rect_is_rejected() {
        let data = series(10);
        let g = ChartGeometry::compute(&data, 600.0, 300.0, Padding::CARD, Spacing::Series).unwrap();
        assert!(hit_test(10.0, 100.0, &g, &data, 10).is_none());
        assert!(hit_test(g.right_x() + 1.0, 100.0, &g, &data, 10).is_none());
        assert!(hit_test(200.0, g.baseline_y() + 5.0, &g, &data, 10).is_none());
        assert!(hit_test(200.0, 0.0, &g, &data, 10).is_none());
        assert!(hit_test(f64::NAN, 100.0, &g, &data, 10).is_none());
    }

    #[test]
    fn test_fixed_spacing_beyond_data_is_rejected() {
        let data = series(3);
        let g = ChartGeometry::compute(&data, 600.0, 300.0, Padding::DETAIL, Spacing::Fixed(24)).unwrap();
        // Slot 10 exists on the axis but has no sample.
        assert!(hit_test(g.index_to_x(10), g.baseline_y(), &g, &data, 24).is_none());
        assert_eq!(hit_test(g.index_to_x(2), g.baseline_y(), &g, &data, 3).unwrap().index, 2);
    }
}

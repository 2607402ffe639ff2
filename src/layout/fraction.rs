use serde::Serialize;
use tracing::debug;

use crate::config::{FractionConfig, Orientation};
use crate::error::{Error, Result};
use crate::ir::FractionSpec;

use super::axis::format_tick;
use super::{Legend, LegendItem};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FractionSegment {
    pub label: String,
    pub value: f64,
    /// Span along the bar axis, in data units.
    pub start: f64,
    pub end: f64,
    pub color: String,
    pub value_text: Option<String>,
}

impl FractionSegment {
    pub fn share(&self, total: f64) -> f64 {
        if total > 0.0 { self.value / total } else { 0.0 }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct FractionLayout {
    pub total: f64,
    pub orientation: Orientation,
    pub segments: Vec<FractionSegment>,
    pub legend: Option<Legend>,
    pub x_range: (f64, f64),
    pub y_range: (f64, f64),
}

pub fn compute_fraction(spec: &FractionSpec, config: &FractionConfig) -> Result<FractionLayout> {
    if spec.counts.len() != spec.labels.len() {
        return Err(Error::invalid(format!(
            "fraction bar has {} counts but {} labels",
            spec.counts.len(),
            spec.labels.len()
        )));
    }
    if let Some((label, count)) = spec
        .labels
        .iter()
        .zip(&spec.counts)
        .find(|(_, count)| !count.is_finite() || **count < 0.0)
    {
        return Err(Error::invalid(format!(
            "count for '{label}' is {count}; counts must be finite and non-negative"
        )));
    }
    let total: f64 = spec.counts.iter().sum();
    if total <= 0.0 {
        return Err(Error::invalid(format!(
            "fraction bar total must be positive, got {total}"
        )));
    }

    let mut x0 = 0.0;
    let segments: Vec<FractionSegment> = spec
        .labels
        .iter()
        .zip(&spec.counts)
        .enumerate()
        .map(|(idx, (label, &value))| {
            let start = x0;
            x0 += value;
            FractionSegment {
                label: label.clone(),
                value,
                start,
                end: x0,
                color: config.palette.color(idx).to_string(),
                value_text: config.show_values.then(|| format_tick(value)),
            }
        })
        .collect();
    debug!(segments = segments.len(), total, "built fraction bar");

    let legend = config.legend.then(|| Legend {
        title: spec.title.clone(),
        items: segments
            .iter()
            .map(|segment| LegendItem {
                label: segment.label.clone(),
                color: segment.color.clone(),
            })
            .collect(),
    });

    let (x_range, y_range) = match config.orientation {
        Orientation::Horizontal => ((0.0, total), (0.0, 1.0)),
        Orientation::Vertical => ((0.0, 1.0), (0.0, total)),
    };

    Ok(FractionLayout {
        total,
        orientation: config.orientation,
        segments,
        legend,
        x_range,
        y_range,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn animals() -> FractionSpec {
        FractionSpec {
            counts: vec![1.0, 2.0, 3.0, 4.0],
            labels: vec!["cat".into(), "dog".into(), "sheep".into(), "dinosaur".into()],
            title: Some("Animals".into()),
        }
    }

    #[test]
    fn segments_are_contiguous_and_sum_to_total() {
        let layout = compute_fraction(&animals(), &FractionConfig::default()).unwrap();
        assert_eq!(layout.total, 10.0);
        let spans: Vec<(f64, f64)> = layout.segments.iter().map(|s| (s.start, s.end)).collect();
        assert_eq!(spans, vec![(0.0, 1.0), (1.0, 3.0), (3.0, 6.0), (6.0, 10.0)]);
        assert_eq!(layout.segments[3].share(layout.total), 0.4);
        assert_eq!(layout.x_range, (0.0, 10.0));
        assert_eq!(layout.y_range, (0.0, 1.0));
    }

    #[test]
    fn legend_carries_title_and_colors() {
        let config = FractionConfig::default();
        let layout = compute_fraction(&animals(), &config).unwrap();
        let legend = layout.legend.unwrap();
        assert_eq!(legend.title.as_deref(), Some("Animals"));
        assert_eq!(legend.items[1].label, "dog");
        assert_eq!(legend.items[1].color, config.palette.color(1));
    }

    #[test]
    fn vertical_bars_run_along_y() {
        let config = FractionConfig {
            orientation: Orientation::Vertical,
            show_values: true,
            legend: false,
            ..FractionConfig::default()
        };
        let layout = compute_fraction(&animals(), &config).unwrap();
        assert_eq!(layout.x_range, (0.0, 1.0));
        assert_eq!(layout.y_range, (0.0, 10.0));
        assert!(layout.legend.is_none());
        assert_eq!(layout.segments[2].value_text.as_deref(), Some("3"));
    }

    #[test]
    fn mismatched_lengths_are_invalid() {
        let spec = FractionSpec::new(vec![1.0, 2.0], vec!["only".into()]);
        assert!(matches!(
            compute_fraction(&spec, &FractionConfig::default()),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn negative_and_zero_totals_are_invalid() {
        let negative = FractionSpec::new(vec![1.0, -2.0], vec!["a".into(), "b".into()]);
        let zero = FractionSpec::new(vec![0.0, 0.0], vec!["a".into(), "b".into()]);
        for spec in [negative, zero] {
            assert!(matches!(
                compute_fraction(&spec, &FractionConfig::default()),
                Err(Error::InvalidInput(_))
            ));
        }
    }
}

//! Box-flow (Sankey-like) layout.
//!
//! Every source label owns a contiguous interval on the left edge of a shared vertical axis and
//! every destination label one on the right edge. Each flow consumes the next free sub-interval of
//! its source and of its destination, and the two sub-intervals are joined by a ribbon.

use std::collections::HashMap;

use serde::{Serialize, Serializer};
use tracing::{debug, trace};

use crate::config::BoxFlowConfig;
use crate::error::{Error, Result};
use crate::ir::FlowSpec;

use super::TextAnchor;

const TICK_HALF_WIDTH: f64 = 0.02;
const LABEL_GAP: f64 = 0.05;
const CANVAS_PAD: f64 = 0.01;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    Source,
    Destination,
}

impl Side {
    /// Horizontal position of this side's edge on the unit-wide canvas.
    pub fn edge(self) -> f64 {
        match self {
            Self::Source => 0.0,
            Self::Destination => 1.0,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Bucket {
    pub start: f64,
    pub depth: f64,
    /// Next free position; starts at `start` and only grows.
    pub level: f64,
}

impl Bucket {
    pub fn new(start: f64, depth: f64) -> Self {
        Self {
            start,
            depth,
            level: start,
        }
    }

    pub fn end(&self) -> f64 {
        self.start + self.depth
    }

    /// Consumes `amount` and returns the consumed span `(before, after)`.
    pub fn fill(&mut self, amount: f64) -> (f64, f64) {
        let before = self.level;
        self.level += amount;
        (before, self.level)
    }

    /// True once every unit of depth has been handed out.
    pub fn is_full(&self) -> bool {
        let tolerance = 1e-9 * self.end().abs().max(1.0);
        (self.level - self.end()).abs() <= tolerance
    }
}

/// Buckets of one side, in stacking order.
#[derive(Debug, Clone, Default)]
pub struct BucketSet {
    order: Vec<String>,
    buckets: HashMap<String, Bucket>,
    extent: f64,
}

impl BucketSet {
    fn push(&mut self, label: &str, depth: f64) {
        if self.buckets.contains_key(label) {
            return;
        }
        self.buckets
            .insert(label.to_string(), Bucket::new(self.extent, depth));
        self.order.push(label.to_string());
        self.extent += depth;
    }

    fn fill(&mut self, label: &str, amount: f64) -> Option<(f64, f64)> {
        self.buckets.get_mut(label).map(|bucket| bucket.fill(amount))
    }

    pub fn get(&self, label: &str) -> Option<&Bucket> {
        self.buckets.get(label)
    }

    pub fn contains(&self, label: &str) -> bool {
        self.buckets.contains_key(label)
    }

    pub fn labels(&self) -> &[String] {
        &self.order
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &Bucket)> + '_ {
        self.order
            .iter()
            .filter_map(|label| self.buckets.get(label).map(|bucket| (label.as_str(), bucket)))
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Sum of all bucket depths.
    pub fn extent(&self) -> f64 {
        self.extent
    }
}

impl Serialize for BucketSet {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        #[derive(Serialize)]
        struct Named<'a> {
            label: &'a str,
            #[serde(flatten)]
            bucket: &'a Bucket,
        }
        serializer.collect_seq(self.iter().map(|(label, bucket)| Named { label, bucket }))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowRibbon {
    pub source: String,
    pub target: String,
    pub value: f64,
    pub source_span: (f64, f64),
    pub target_span: (f64, f64),
    pub color: String,
}

impl FlowRibbon {
    /// Corners of the ribbon quadrilateral, clockwise from the source-side top.
    pub fn corners(&self) -> [(f64, f64); 4] {
        [
            (Side::Source.edge(), self.source_span.0),
            (Side::Destination.edge(), self.target_span.0),
            (Side::Destination.edge(), self.target_span.1),
            (Side::Source.edge(), self.source_span.1),
        ]
    }
}

/// A short horizontal tick marking a bucket boundary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Gridline {
    pub side: Side,
    pub x: (f64, f64),
    pub y: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FlowLabel {
    pub side: Side,
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub font_size: f32,
    pub anchor: TextAnchor,
}

#[derive(Debug, Clone, Serialize)]
pub struct BoxFlowLayout {
    pub total: f64,
    pub threshold: f64,
    pub sources: BucketSet,
    pub destinations: BucketSet,
    /// Drawable ribbons only; flows under the threshold are counted in the buckets but not here.
    pub ribbons: Vec<FlowRibbon>,
    pub gridlines: Vec<Gridline>,
    pub labels: Vec<FlowLabel>,
    pub ribbon_opacity: f32,
    pub gridline_opacity: f32,
    pub x_range: (f64, f64),
    pub y_range: (f64, f64),
}

impl BoxFlowLayout {
    /// Looks a label up on either side. Sources win for labels used on both.
    pub fn bucket(&self, label: &str) -> Option<(Side, &Bucket)> {
        if let Some(bucket) = self.sources.get(label) {
            return Some((Side::Source, bucket));
        }
        self.destinations
            .get(label)
            .map(|bucket| (Side::Destination, bucket))
    }
}

pub fn compute_boxflow(spec: &FlowSpec, config: &BoxFlowConfig) -> Result<BoxFlowLayout> {
    if !config.threshold.is_finite() {
        return Err(Error::invalid(format!(
            "threshold must be a finite number, got {}",
            config.threshold
        )));
    }
    let total = validate_flows(spec)?;
    let (mut sources, mut destinations) = allocate_buckets(spec);
    debug!(
        total,
        sources = sources.len(),
        destinations = destinations.len(),
        "allocated box-flow buckets"
    );

    let ribbons = build_ribbons(spec, &mut sources, &mut destinations, total, config);
    let gridlines = build_gridlines(&sources, &destinations);
    let labels = build_labels(&sources, &destinations, config.label_font_size);
    // Equal to `total` unless a label is used on both sides.
    let extent = sources.extent().max(destinations.extent());

    Ok(BoxFlowLayout {
        total,
        threshold: config.threshold,
        sources,
        destinations,
        ribbons,
        gridlines,
        labels,
        ribbon_opacity: config.ribbon_opacity,
        gridline_opacity: config.gridline_opacity,
        x_range: (0.0, 1.0),
        y_range: (-CANVAS_PAD * extent, (1.0 + CANVAS_PAD) * extent),
    })
}

fn validate_flows(spec: &FlowSpec) -> Result<f64> {
    let mut total = 0.0;
    for (source, flows) in spec {
        for (target, &value) in flows {
            if !value.is_finite() || value < 0.0 {
                return Err(Error::invalid(format!(
                    "flow '{source}' -> '{target}' has magnitude {value}; magnitudes must be finite and non-negative"
                )));
            }
            total += value;
        }
    }
    if !total.is_finite() || total <= 0.0 {
        return Err(Error::invalid(format!(
            "total flow magnitude must be finite and positive, got {total}"
        )));
    }
    Ok(total)
}

/// Stacks every label at its first appearance. Outer keys are sources, everything else is a
/// destination; a label used as both is a source whose depth carries its incoming flow too.
fn allocate_buckets(spec: &FlowSpec) -> (BucketSet, BucketSet) {
    let mut order: Vec<&str> = Vec::new();
    let mut depths: HashMap<&str, f64> = HashMap::new();

    for (source, flows) in spec {
        if !depths.contains_key(source.as_str()) {
            order.push(source.as_str());
            depths.insert(source.as_str(), 0.0);
        }
        for (target, &value) in flows {
            if !depths.contains_key(target.as_str()) {
                order.push(target.as_str());
                depths.insert(target.as_str(), 0.0);
            }
            *depths.entry(source.as_str()).or_insert(0.0) += value;
            *depths.entry(target.as_str()).or_insert(0.0) += value;
        }
    }

    let mut sources = BucketSet::default();
    let mut destinations = BucketSet::default();
    for label in order {
        let depth = depths.get(label).copied().unwrap_or(0.0);
        if spec.contains_key(label) {
            sources.push(label, depth);
        } else {
            destinations.push(label, depth);
        }
    }
    (sources, destinations)
}

fn build_ribbons(
    spec: &FlowSpec,
    sources: &mut BucketSet,
    destinations: &mut BucketSet,
    total: f64,
    config: &BoxFlowConfig,
) -> Vec<FlowRibbon> {
    let cutoff = config.threshold * total;
    let mut ribbons = Vec::new();
    let mut culled = 0usize;

    for (idx, (source, flows)) in spec.iter().enumerate() {
        let color = config.palette.color(idx);
        for (target, &value) in flows {
            // Both labels were allocated from this same spec.
            let Some(source_span) = sources.fill(source, value) else {
                continue;
            };
            let target_span = if sources.contains(target) {
                sources.fill(target, value)
            } else {
                destinations.fill(target, value)
            };
            let Some(target_span) = target_span else {
                continue;
            };
            if value < cutoff {
                culled += 1;
                trace!(source = %source, target = %target, value, cutoff, "ribbon below threshold");
                continue;
            }
            ribbons.push(FlowRibbon {
                source: source.clone(),
                target: target.clone(),
                value,
                source_span,
                target_span,
                color: color.to_string(),
            });
        }
    }

    debug!(drawn = ribbons.len(), culled, "built box-flow ribbons");
    ribbons
}

fn build_gridlines(sources: &BucketSet, destinations: &BucketSet) -> Vec<Gridline> {
    let tick = |side: Side, y: f64| {
        let edge = side.edge();
        Gridline {
            side,
            x: (edge - TICK_HALF_WIDTH, edge + TICK_HALF_WIDTH),
            y,
        }
    };
    let mut gridlines = vec![tick(Side::Source, 0.0), tick(Side::Destination, 0.0)];
    gridlines.extend(sources.iter().map(|(_, bucket)| tick(Side::Source, bucket.level)));
    gridlines.extend(
        destinations
            .iter()
            .map(|(_, bucket)| tick(Side::Destination, bucket.level)),
    );
    gridlines
}

fn build_labels(sources: &BucketSet, destinations: &BucketSet, font_size: f32) -> Vec<FlowLabel> {
    let shift = sources.len() as f64 / 8.0;
    let label = |side: Side, text: &str, bucket: &Bucket| {
        let (x, anchor) = match side {
            Side::Source => (side.edge() - LABEL_GAP, TextAnchor::End),
            Side::Destination => (side.edge() + LABEL_GAP, TextAnchor::Start),
        };
        FlowLabel {
            side,
            text: text.to_string(),
            x,
            y: 0.5 * (bucket.start + bucket.level) - shift,
            font_size,
            anchor,
        }
    };
    sources
        .iter()
        .map(|(text, bucket)| label(Side::Source, text, bucket))
        .chain(
            destinations
                .iter()
                .map(|(text, bucket)| label(Side::Destination, text, bucket)),
        )
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use indexmap::IndexMap;

    fn spec(entries: &[(&str, &[(&str, f64)])]) -> FlowSpec {
        entries
            .iter()
            .map(|(source, flows)| {
                let flows: IndexMap<String, f64> = flows
                    .iter()
                    .map(|(target, value)| (target.to_string(), *value))
                    .collect();
                (source.to_string(), flows)
            })
            .collect()
    }

    fn sample() -> FlowSpec {
        spec(&[
            ("A", &[("X", 3.0), ("Y", 1.0)]),
            ("B", &[("X", 2.0), ("Y", 4.0)]),
        ])
    }

    fn span(bucket: &Bucket) -> (f64, f64) {
        (bucket.start, bucket.end())
    }

    #[test]
    fn allocates_contiguous_buckets_per_side() {
        let layout = compute_boxflow(&sample(), &BoxFlowConfig::default()).unwrap();
        assert_eq!(layout.total, 10.0);
        assert_eq!(layout.sources.labels(), ["A", "B"]);
        assert_eq!(layout.destinations.labels(), ["X", "Y"]);
        assert_eq!(span(layout.sources.get("A").unwrap()), (0.0, 4.0));
        assert_eq!(span(layout.sources.get("B").unwrap()), (4.0, 10.0));
        assert_eq!(span(layout.destinations.get("X").unwrap()), (0.0, 5.0));
        assert_eq!(span(layout.destinations.get("Y").unwrap()), (5.0, 10.0));
    }

    #[test]
    fn ribbons_take_successive_sub_intervals() {
        let layout = compute_boxflow(&sample(), &BoxFlowConfig::default()).unwrap();
        let got: Vec<(&str, &str, f64, (f64, f64), (f64, f64))> = layout
            .ribbons
            .iter()
            .map(|r| {
                (
                    r.source.as_str(),
                    r.target.as_str(),
                    r.value,
                    r.source_span,
                    r.target_span,
                )
            })
            .collect();
        assert_eq!(
            got,
            vec![
                ("A", "X", 3.0, (0.0, 3.0), (0.0, 3.0)),
                ("A", "Y", 1.0, (3.0, 4.0), (5.0, 6.0)),
                ("B", "X", 2.0, (4.0, 6.0), (3.0, 5.0)),
                ("B", "Y", 4.0, (6.0, 10.0), (6.0, 10.0)),
            ]
        );
    }

    #[test]
    fn every_bucket_ends_full() {
        let layout = compute_boxflow(&sample(), &BoxFlowConfig::default()).unwrap();
        for (label, bucket) in layout.sources.iter().chain(layout.destinations.iter()) {
            assert!(bucket.is_full(), "{label} not full: {bucket:?}");
            assert_eq!(bucket.level, bucket.end(), "{label}");
        }
    }

    #[test]
    fn both_sides_span_the_total() {
        let flows = spec(&[
            ("north", &[("a", 0.25), ("b", 1.5), ("c", 2.0)]),
            ("south", &[("c", 0.75), ("d", 3.1)]),
            ("east", &[("a", 0.4)]),
        ]);
        let layout = compute_boxflow(&flows, &BoxFlowConfig::default()).unwrap();
        let expected = 0.25 + 1.5 + 2.0 + 0.75 + 3.1 + 0.4;
        assert!((layout.sources.extent() - expected).abs() < 1e-9);
        assert!((layout.destinations.extent() - expected).abs() < 1e-9);
        assert!((layout.total - expected).abs() < 1e-9);
        for (label, bucket) in layout.sources.iter().chain(layout.destinations.iter()) {
            assert!(bucket.is_full(), "{label} not full: {bucket:?}");
        }
    }

    #[test]
    fn ribbon_values_match_their_flows() {
        let flows = sample();
        let layout = compute_boxflow(&flows, &BoxFlowConfig::default()).unwrap();
        for ribbon in &layout.ribbons {
            assert_eq!(ribbon.value, flows[&ribbon.source][&ribbon.target]);
            let (s0, s1) = ribbon.source_span;
            let (t0, t1) = ribbon.target_span;
            assert_eq!(s1 - s0, ribbon.value);
            assert_eq!(t1 - t0, ribbon.value);
        }
    }

    #[test]
    fn layout_is_repeatable() {
        let config = BoxFlowConfig::default();
        let first = compute_boxflow(&sample(), &config).unwrap();
        let second = compute_boxflow(&sample(), &config).unwrap();
        assert_eq!(first.ribbons, second.ribbons);
        assert_eq!(first.gridlines, second.gridlines);
        assert_eq!(first.labels, second.labels);
    }

    #[test]
    fn small_flows_are_culled_but_still_counted() {
        let flows = spec(&[
            ("A", &[("X", 49.5), ("Y", 0.5)]),
            ("B", &[("X", 50.0)]),
        ]);
        let config = BoxFlowConfig {
            threshold: 0.01,
            ..BoxFlowConfig::default()
        };
        let layout = compute_boxflow(&flows, &config).unwrap();
        assert_eq!(layout.total, 100.0);
        assert!(
            layout
                .ribbons
                .iter()
                .all(|r| !(r.source == "A" && r.target == "Y"))
        );
        assert_eq!(layout.ribbons.len(), 2);
        assert_eq!(layout.sources.get("A").unwrap().depth, 50.0);
        assert_eq!(layout.destinations.get("Y").unwrap().depth, 0.5);
        assert!(layout.destinations.get("Y").unwrap().is_full());
    }

    #[test]
    fn zero_magnitude_flows_are_accepted_and_dropped() {
        let flows = spec(&[("A", &[("X", 2.0), ("Y", 0.0)])]);
        let layout = compute_boxflow(&flows, &BoxFlowConfig::default()).unwrap();
        assert_eq!(layout.ribbons.len(), 1);
        assert_eq!(span(layout.destinations.get("Y").unwrap()), (2.0, 2.0));
    }

    #[test]
    fn zero_total_is_invalid_input() {
        let flows = spec(&[("A", &[("X", 0.0)]), ("B", &[("Y", 0.0)])]);
        let err = compute_boxflow(&flows, &BoxFlowConfig::default()).unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
        assert!(matches!(
            compute_boxflow(&FlowSpec::new(), &BoxFlowConfig::default()),
            Err(Error::InvalidInput(_))
        ));
    }

    #[test]
    fn negative_or_nan_magnitudes_are_invalid_input() {
        for bad in [-1.0, f64::NAN, f64::INFINITY] {
            let flows = spec(&[("A", &[("X", 5.0), ("Y", bad)])]);
            let result = compute_boxflow(&flows, &BoxFlowConfig::default());
            assert!(matches!(result, Err(Error::InvalidInput(_))), "{bad}");
        }
    }

    #[test]
    fn overflowing_total_is_invalid_input() {
        let flows = spec(&[("A", &[("X", 1e308), ("Y", 1e308)])]);
        let result = compute_boxflow(&flows, &BoxFlowConfig::default());
        assert!(matches!(result, Err(Error::InvalidInput(_))));
    }

    #[test]
    fn destinations_stack_in_first_appearance_order() {
        let flows = spec(&[("A", &[("Y", 1.0)]), ("B", &[("X", 1.0), ("Y", 1.0)])]);
        let layout = compute_boxflow(&flows, &BoxFlowConfig::default()).unwrap();
        assert_eq!(layout.destinations.labels(), ["Y", "X"]);
        assert_eq!(span(layout.destinations.get("Y").unwrap()), (0.0, 2.0));
        assert_eq!(span(layout.destinations.get("X").unwrap()), (2.0, 3.0));
    }

    #[test]
    fn label_used_on_both_sides_is_a_source() {
        let flows = spec(&[("A", &[("B", 2.0), ("X", 1.0)]), ("B", &[("X", 2.0)])]);
        let layout = compute_boxflow(&flows, &BoxFlowConfig::default()).unwrap();
        assert_eq!(layout.sources.labels(), ["A", "B"]);
        assert_eq!(layout.destinations.labels(), ["X"]);
        let (side, b) = layout.bucket("B").unwrap();
        assert_eq!(side, Side::Source);
        assert_eq!(b.depth, 4.0);
        assert!(b.is_full());
        let a_to_b = &layout.ribbons[0];
        assert_eq!(a_to_b.target_span, (3.0, 5.0));
    }

    #[test]
    fn gridlines_mark_every_boundary() {
        let layout = compute_boxflow(&sample(), &BoxFlowConfig::default()).unwrap();
        let left: Vec<f64> = layout
            .gridlines
            .iter()
            .filter(|g| g.side == Side::Source)
            .map(|g| g.y)
            .collect();
        let right: Vec<f64> = layout
            .gridlines
            .iter()
            .filter(|g| g.side == Side::Destination)
            .map(|g| g.y)
            .collect();
        assert_eq!(left, vec![0.0, 4.0, 10.0]);
        assert_eq!(right, vec![0.0, 5.0, 10.0]);
        assert_eq!(layout.gridlines[0].x, (-0.02, 0.02));
        assert_eq!(layout.gridlines[1].x, (0.98, 1.02));
    }

    #[test]
    fn labels_sit_at_bucket_midpoints() {
        let layout = compute_boxflow(&sample(), &BoxFlowConfig::default()).unwrap();
        let a = layout.labels.iter().find(|l| l.text == "A").unwrap();
        assert_eq!(a.side, Side::Source);
        assert_eq!(a.anchor, TextAnchor::End);
        assert_eq!(a.x, -0.05);
        assert_eq!(a.y, 2.0 - 2.0 / 8.0);
        assert_eq!(a.font_size, 14.0);
        let y = layout.labels.iter().find(|l| l.text == "Y").unwrap();
        assert_eq!(y.anchor, TextAnchor::Start);
        assert_eq!(y.x, 1.05);
        assert_eq!(y.y, 7.5 - 0.25);
    }

    #[test]
    fn canvas_pads_the_total() {
        let layout = compute_boxflow(&sample(), &BoxFlowConfig::default()).unwrap();
        assert_eq!(layout.x_range, (0.0, 1.0));
        assert!((layout.y_range.0 + 0.1).abs() < 1e-12);
        assert!((layout.y_range.1 - 10.1).abs() < 1e-12);
    }

    #[test]
    fn ribbons_cycle_palette_by_source() {
        let config = BoxFlowConfig::default();
        let layout = compute_boxflow(&sample(), &config).unwrap();
        assert_eq!(layout.ribbons[0].color, config.palette.color(0));
        assert_eq!(layout.ribbons[1].color, config.palette.color(0));
        assert_eq!(layout.ribbons[2].color, config.palette.color(1));
        let corners = layout.ribbons[1].corners();
        assert_eq!(corners, [(0.0, 3.0), (1.0, 5.0), (1.0, 6.0), (0.0, 4.0)]);
    }
}

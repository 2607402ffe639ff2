pub mod axis;
pub mod boxflow;
pub mod fraction;
pub mod stack;
pub(crate) mod text;

use serde::Serialize;

use crate::config::LayoutConfig;
use crate::error::Result;
use crate::ir::{Chart, ChartKind};

pub use boxflow::{BoxFlowLayout, Bucket, BucketSet, FlowLabel, FlowRibbon, Gridline, Side};
pub use fraction::{FractionLayout, FractionSegment};
pub use stack::{StackBar, StackLayout, StackSegment};

#[derive(Debug, Clone, Serialize)]
pub struct TextBlock {
    pub lines: Vec<String>,
    pub width: f32,
    pub height: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TextAnchor {
    Start,
    Middle,
    End,
}

impl TextAnchor {
    pub fn as_svg(self) -> &'static str {
        match self {
            Self::Start => "start",
            Self::Middle => "middle",
            Self::End => "end",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct LegendItem {
    pub label: String,
    pub color: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct Legend {
    pub title: Option<String>,
    pub items: Vec<LegendItem>,
}

/// Per-chart geometry, in data coordinates.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "chart", rename_all = "lowercase")]
pub enum DiagramData {
    BoxFlow(BoxFlowLayout),
    Stack(StackLayout),
    Fraction(FractionLayout),
}

/// A laid-out chart: data-space geometry plus the pixel size of the canvas it is drawn on.
#[derive(Debug, Clone, Serialize)]
pub struct Layout {
    pub kind: ChartKind,
    pub width: f32,
    pub height: f32,
    pub diagram: DiagramData,
}

pub fn compute_layout(chart: &Chart, config: &LayoutConfig) -> Result<Layout> {
    let layout = match chart {
        Chart::BoxFlow(spec) => {
            let data = boxflow::compute_boxflow(spec, &config.boxflow)?;
            Layout {
                kind: ChartKind::BoxFlow,
                width: config.boxflow.width.max(1.0),
                height: config.boxflow.height.max(1.0),
                diagram: DiagramData::BoxFlow(data),
            }
        }
        Chart::Stack(spec) => {
            let data = stack::compute_stack(spec, &config.stack)?;
            Layout {
                kind: ChartKind::Stack,
                width: config.stack.width.max(1.0),
                height: config.stack.height.max(1.0),
                diagram: DiagramData::Stack(data),
            }
        }
        Chart::Fraction(spec) => {
            let data = fraction::compute_fraction(spec, &config.fraction)?;
            let (width, height) = match data.orientation {
                crate::config::Orientation::Horizontal => {
                    (config.fraction.length, config.fraction.thickness)
                }
                crate::config::Orientation::Vertical => {
                    (config.fraction.thickness, config.fraction.length)
                }
            };
            Layout {
                kind: ChartKind::Fraction,
                width: width.max(1.0),
                height: height.max(1.0),
                diagram: DiagramData::Fraction(data),
            }
        }
    };
    tracing::debug!(
        kind = ?layout.kind,
        width = layout.width,
        height = layout.height,
        "computed layout"
    );
    Ok(layout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{FlowSpec, FractionSpec};
    use indexmap::IndexMap;

    #[test]
    fn boxflow_layout_uses_configured_canvas() {
        let mut spec = FlowSpec::new();
        spec.insert("A".to_string(), IndexMap::from([("X".to_string(), 1.0)]));
        let mut config = LayoutConfig::default();
        config.boxflow.width = 320.0;
        let layout = compute_layout(&Chart::BoxFlow(spec), &config).unwrap();
        assert_eq!(layout.kind, ChartKind::BoxFlow);
        assert_eq!(layout.width, 320.0);
        assert!(matches!(layout.diagram, DiagramData::BoxFlow(_)));
    }

    #[test]
    fn vertical_fraction_swaps_canvas_axes() {
        let spec = FractionSpec::new(vec![1.0, 3.0], vec!["a".into(), "b".into()]);
        let mut config = LayoutConfig::default();
        config.fraction.orientation = crate::config::Orientation::Vertical;
        let layout = compute_layout(&Chart::Fraction(spec), &config).unwrap();
        assert_eq!(layout.width, config.fraction.thickness);
        assert_eq!(layout.height, config.fraction.length);
    }

    #[test]
    fn invalid_input_propagates() {
        let spec = FractionSpec::new(vec![0.0], vec!["a".into()]);
        let result = compute_layout(&Chart::Fraction(spec), &LayoutConfig::default());
        assert!(matches!(result, Err(crate::Error::InvalidInput(_))));
    }
}

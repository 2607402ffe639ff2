use crate::ir::ChartKind;
use crate::layout::{DiagramData, Layout, Side};
use serde::Serialize;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// Flat, chart-agnostic view of a layout, for debugging and golden tests.
#[derive(Debug, Serialize)]
pub struct LayoutDump {
    pub kind: ChartKind,
    pub width: f32,
    pub height: f32,
    pub total: f64,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub buckets: Vec<BucketDump>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub ribbons: Vec<RibbonDump>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub segments: Vec<SegmentDump>,
}

#[derive(Debug, Serialize)]
pub struct BucketDump {
    pub side: Side,
    pub label: String,
    pub start: f64,
    pub end: f64,
    pub full: bool,
}

#[derive(Debug, Serialize)]
pub struct RibbonDump {
    pub source: String,
    pub target: String,
    pub value: f64,
    pub source_span: [f64; 2],
    pub target_span: [f64; 2],
}

#[derive(Debug, Serialize)]
pub struct SegmentDump {
    /// Bar label for stacked bars; absent for the single fraction bar.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bar: Option<String>,
    pub label: String,
    pub value: f64,
    pub start: f64,
    pub end: f64,
    pub color: String,
}

impl LayoutDump {
    pub fn from_layout(layout: &Layout) -> Self {
        let mut dump = Self {
            kind: layout.kind,
            width: layout.width,
            height: layout.height,
            total: 0.0,
            buckets: Vec::new(),
            ribbons: Vec::new(),
            segments: Vec::new(),
        };
        match &layout.diagram {
            DiagramData::BoxFlow(data) => {
                dump.total = data.total;
                let sides = [
                    (Side::Source, &data.sources),
                    (Side::Destination, &data.destinations),
                ];
                for (side, set) in sides {
                    dump.buckets.extend(set.iter().map(|(label, bucket)| BucketDump {
                        side,
                        label: label.to_string(),
                        start: bucket.start,
                        end: bucket.end(),
                        full: bucket.is_full(),
                    }));
                }
                dump.ribbons = data
                    .ribbons
                    .iter()
                    .map(|ribbon| RibbonDump {
                        source: ribbon.source.clone(),
                        target: ribbon.target.clone(),
                        value: ribbon.value,
                        source_span: [ribbon.source_span.0, ribbon.source_span.1],
                        target_span: [ribbon.target_span.0, ribbon.target_span.1],
                    })
                    .collect();
            }
            DiagramData::Stack(data) => {
                dump.total = data.bars.iter().map(|bar| bar.total).sum();
                for bar in &data.bars {
                    dump.segments.extend(bar.segments.iter().map(|segment| SegmentDump {
                        bar: Some(bar.label.clone()),
                        label: segment.category.clone(),
                        value: segment.value,
                        start: segment.start,
                        end: segment.end,
                        color: segment.color.clone(),
                    }));
                }
            }
            DiagramData::Fraction(data) => {
                dump.total = data.total;
                dump.segments = data
                    .segments
                    .iter()
                    .map(|segment| SegmentDump {
                        bar: None,
                        label: segment.label.clone(),
                        value: segment.value,
                        start: segment.start,
                        end: segment.end,
                        color: segment.color.clone(),
                    })
                    .collect();
            }
        }
        dump
    }
}

pub fn write_layout_dump(path: &Path, layout: &Layout) -> anyhow::Result<()> {
    let dump = LayoutDump::from_layout(layout);
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, &dump)?;
    writer.flush()?;
    Ok(())
}

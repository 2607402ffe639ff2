use crate::config::{LayoutConfig, Orientation, RenderConfig};
use crate::layout::axis::LinearScale;
use crate::layout::text::measure_label_with_font_size;
use crate::layout::{
    BoxFlowLayout, DiagramData, FractionLayout, Layout, Legend, Side, StackLayout, TextAnchor,
};
use crate::theme::Theme;
use anyhow::Result;
use std::path::Path;

const LEGEND_SWATCH: f32 = 10.0;
const LEGEND_PAD: f32 = 8.0;
const TICK_LENGTH: f32 = 4.0;

pub fn render_svg(layout: &Layout, theme: &Theme, config: &LayoutConfig) -> String {
    let width = layout.width;
    let height = layout.height;
    let mut svg = String::new();

    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{width}\" height=\"{height}\" viewBox=\"0 0 {width} {height}\" font-family=\"{}\">",
        escape_xml(&theme.font_family)
    ));
    svg.push_str(&format!(
        "<rect width=\"100%\" height=\"100%\" fill=\"{}\"/>",
        theme.background
    ));

    let body = match &layout.diagram {
        DiagramData::BoxFlow(data) => render_boxflow(data, width, height, theme, config),
        DiagramData::Stack(data) => render_stack(data, width, height, theme, config),
        DiagramData::Fraction(data) => render_fraction(data, width, height, theme, config),
    };
    svg.push_str(&body);
    svg.push_str("</svg>");
    svg
}

fn label_width(text: &str, font_size: f32, theme: &Theme, config: &LayoutConfig) -> f32 {
    measure_label_with_font_size(text, font_size, config, &theme.font_family).width
}

fn render_boxflow(
    data: &BoxFlowLayout,
    width: f32,
    height: f32,
    theme: &Theme,
    config: &LayoutConfig,
) -> String {
    let widest = |side: Side| {
        data.labels
            .iter()
            .filter(|label| label.side == side)
            .map(|label| label_width(&label.text, label.font_size, theme, config))
            .fold(0.0f32, f32::max)
    };
    let source_w = widest(Side::Source);
    let dest_w = widest(Side::Destination);

    // Labels sit a fixed fraction of the plot width outside each edge, so the
    // plot width has to leave room for that fraction on both sides.
    let (x0, x1) = data.x_range;
    let outside = data
        .labels
        .iter()
        .map(|label| (x0 - label.x).max(label.x - x1))
        .fold(0.0f64, f64::max) as f32;
    let margin = config.margin;
    let plot_w = ((width - 2.0 * margin - source_w - dest_w) / (1.0 + 2.0 * outside)).max(1.0);
    let left = margin + source_w + outside * plot_w;

    let xs = LinearScale::new(data.x_range, (left as f64, (left + plot_w) as f64));
    let ys = LinearScale::new(data.y_range, ((height - margin) as f64, margin as f64));

    let mut svg = String::new();
    svg.push_str("<g class=\"ribbons\">");
    for ribbon in &data.ribbons {
        let corners = ribbon.corners();
        let d = corners
            .iter()
            .enumerate()
            .map(|(idx, (x, y))| {
                let cmd = if idx == 0 { "M" } else { "L" };
                format!("{cmd} {:.2} {:.2}", xs.px(*x), ys.px(*y))
            })
            .collect::<Vec<_>>()
            .join(" ");
        svg.push_str(&format!(
            "<path d=\"{d} Z\" fill=\"{}\" fill-opacity=\"{}\" stroke=\"none\"><title>{} → {}: {}</title></path>",
            ribbon.color,
            data.ribbon_opacity,
            escape_xml(&ribbon.source),
            escape_xml(&ribbon.target),
            ribbon.value
        ));
    }
    svg.push_str("</g>");

    svg.push_str("<g class=\"gridlines\">");
    for line in &data.gridlines {
        svg.push_str(&format!(
            "<line x1=\"{:.2}\" y1=\"{:.2}\" x2=\"{:.2}\" y2=\"{:.2}\" stroke=\"{}\" stroke-opacity=\"{}\" stroke-width=\"1\"/>",
            xs.px(line.x.0),
            ys.px(line.y),
            xs.px(line.x.1),
            ys.px(line.y),
            theme.grid_color,
            data.gridline_opacity
        ));
    }
    svg.push_str("</g>");

    svg.push_str("<g class=\"labels\">");
    for label in &data.labels {
        svg.push_str(&text_svg(
            xs.px(label.x),
            ys.px(label.y),
            &label.text,
            label.font_size,
            label.anchor,
            theme,
            config,
        ));
    }
    svg.push_str("</g>");
    svg
}

fn render_stack(
    data: &StackLayout,
    width: f32,
    height: f32,
    theme: &Theme,
    config: &LayoutConfig,
) -> String {
    let font_size = data.tick_font_size;
    let margin = config.margin;
    let angle = data.tick_rotation.to_radians();

    let y_label_w = if data.show_y_axis {
        data.y_ticks
            .iter()
            .map(|tick| label_width(&tick.label, font_size, theme, config))
            .fold(0.0f32, f32::max)
            + TICK_LENGTH
            + 4.0
    } else {
        0.0
    };
    let x_label_h = data
        .bars
        .iter()
        .map(|bar| label_width(&bar.label, font_size, theme, config))
        .fold(0.0f32, f32::max)
        * angle.sin().abs()
        + font_size * angle.cos().abs()
        + TICK_LENGTH
        + 4.0;
    let (legend_w, _) = data
        .legend
        .as_ref()
        .map(|legend| legend_size(legend, theme, config))
        .unwrap_or((0.0, 0.0));

    let left = margin + y_label_w;
    let legend_gap = if legend_w > 0.0 { margin } else { 0.0 };
    let right = (width - margin - legend_w - legend_gap).max(left + 1.0);
    let top = margin;
    let bottom = (height - margin - x_label_h).max(top + 1.0);
    let xs = LinearScale::new(data.x_range, (left as f64, right as f64));
    let ys = LinearScale::new(data.y_range, (bottom as f64, top as f64));

    let mut svg = String::new();
    svg.push_str("<g class=\"bars\">");
    for bar in &data.bars {
        let bx0 = xs.px(bar.center - bar.width / 2.0);
        let bx1 = xs.px(bar.center + bar.width / 2.0);
        for segment in bar.segments.iter().filter(|segment| segment.value > 0.0) {
            let sy0 = ys.px(segment.end);
            let sy1 = ys.px(segment.start);
            svg.push_str(&format!(
                "<rect x=\"{bx0:.2}\" y=\"{sy0:.2}\" width=\"{:.2}\" height=\"{:.2}\" fill=\"{}\"><title>{} / {}: {}</title></rect>",
                bx1 - bx0,
                sy1 - sy0,
                segment.color,
                escape_xml(&bar.label),
                escape_xml(&segment.category),
                segment.value
            ));
        }
    }
    svg.push_str("</g>");

    svg.push_str("<g class=\"axes\">");
    svg.push_str(&format!(
        "<line x1=\"{left:.2}\" y1=\"{bottom:.2}\" x2=\"{right:.2}\" y2=\"{bottom:.2}\" stroke=\"{}\" stroke-width=\"1\"/>",
        theme.axis_color
    ));
    let rotation = data.tick_rotation;
    for bar in &data.bars {
        let x = xs.px(bar.center);
        let ty = bottom + TICK_LENGTH + font_size;
        svg.push_str(&format!(
            "<line x1=\"{x:.2}\" y1=\"{bottom:.2}\" x2=\"{x:.2}\" y2=\"{:.2}\" stroke=\"{}\" stroke-width=\"1\"/>",
            bottom + TICK_LENGTH,
            theme.axis_color
        ));
        let anchor = if rotation.abs() > f32::EPSILON { "end" } else { "middle" };
        svg.push_str(&format!(
            "<text x=\"{x:.2}\" y=\"{ty:.2}\" text-anchor=\"{anchor}\" font-size=\"{font_size}\" fill=\"{}\" transform=\"rotate({:.2} {x:.2} {ty:.2})\">{}</text>",
            theme.text_color,
            -rotation,
            escape_xml(&bar.label)
        ));
    }
    if data.show_y_axis {
        svg.push_str(&format!(
            "<line x1=\"{left:.2}\" y1=\"{top:.2}\" x2=\"{left:.2}\" y2=\"{bottom:.2}\" stroke=\"{}\" stroke-width=\"1\"/>",
            theme.axis_color
        ));
        for tick in &data.y_ticks {
            let y = ys.px(tick.value);
            svg.push_str(&format!(
                "<line x1=\"{:.2}\" y1=\"{y:.2}\" x2=\"{left:.2}\" y2=\"{y:.2}\" stroke=\"{}\" stroke-width=\"1\"/>",
                left - TICK_LENGTH,
                theme.axis_color
            ));
            svg.push_str(&format!(
                "<text x=\"{:.2}\" y=\"{y:.2}\" text-anchor=\"end\" dominant-baseline=\"middle\" font-size=\"{font_size}\" fill=\"{}\">{}</text>",
                left - TICK_LENGTH - 2.0,
                theme.text_color,
                escape_xml(&tick.label)
            ));
        }
    }
    svg.push_str("</g>");

    if let Some(legend) = &data.legend {
        svg.push_str(&legend_svg(legend, right + margin, top, theme, config));
    }
    svg
}

fn render_fraction(
    data: &FractionLayout,
    width: f32,
    height: f32,
    theme: &Theme,
    config: &LayoutConfig,
) -> String {
    let margin = config.margin;
    let (legend_w, _) = data
        .legend
        .as_ref()
        .map(|legend| legend_size(legend, theme, config))
        .unwrap_or((0.0, 0.0));
    let left = margin;
    let legend_gap = if legend_w > 0.0 { margin } else { 0.0 };
    let right = (width - margin - legend_w - legend_gap).max(left + 1.0);
    let top = margin;
    let bottom = (height - margin).max(top + 1.0);
    let xs = LinearScale::new(data.x_range, (left as f64, right as f64));
    // Vertical bars fill from the top down, matching reading order.
    let ys = match data.orientation {
        Orientation::Horizontal => LinearScale::new(data.y_range, (bottom as f64, top as f64)),
        Orientation::Vertical => LinearScale::new(data.y_range, (top as f64, bottom as f64)),
    };

    let mut svg = String::new();
    svg.push_str("<g class=\"segments\">");
    for segment in &data.segments {
        let ((ax, ay), (bx, by)) = match data.orientation {
            Orientation::Horizontal => ((segment.start, 0.0), (segment.end, 1.0)),
            Orientation::Vertical => ((0.0, segment.start), (1.0, segment.end)),
        };
        let (px0, px1) = (xs.px(ax).min(xs.px(bx)), xs.px(ax).max(xs.px(bx)));
        let (py0, py1) = (ys.px(ay).min(ys.px(by)), ys.px(ay).max(ys.px(by)));
        svg.push_str(&format!(
            "<rect x=\"{px0:.2}\" y=\"{py0:.2}\" width=\"{:.2}\" height=\"{:.2}\" fill=\"{}\"><title>{}: {}</title></rect>",
            px1 - px0,
            py1 - py0,
            segment.color,
            escape_xml(&segment.label),
            segment.value
        ));
        if let Some(text) = &segment.value_text {
            svg.push_str(&text_svg(
                (px0 + px1) / 2.0,
                (py0 + py1) / 2.0,
                text,
                theme.font_size,
                TextAnchor::Middle,
                theme,
                config,
            ));
        }
    }
    svg.push_str("</g>");

    if let Some(legend) = &data.legend {
        svg.push_str(&legend_svg(legend, right + margin, top, theme, config));
    }
    svg
}

fn text_svg(
    x: f32,
    y: f32,
    text: &str,
    font_size: f32,
    anchor: TextAnchor,
    theme: &Theme,
    config: &LayoutConfig,
) -> String {
    let block = measure_label_with_font_size(text, font_size, config, &theme.font_family);
    let line_step = font_size * config.label_line_height;
    let first_y = y - (block.lines.len().saturating_sub(1)) as f32 * line_step / 2.0;
    let mut out = format!(
        "<text x=\"{x:.2}\" y=\"{first_y:.2}\" text-anchor=\"{}\" dominant-baseline=\"middle\" font-size=\"{font_size}\" fill=\"{}\">",
        anchor.as_svg(),
        theme.text_color
    );
    for (idx, line) in block.lines.iter().enumerate() {
        let dy = if idx == 0 { 0.0 } else { line_step };
        out.push_str(&format!(
            "<tspan x=\"{x:.2}\" dy=\"{dy:.2}\">{}</tspan>",
            escape_xml(line)
        ));
    }
    out.push_str("</text>");
    out
}

fn legend_row_height(theme: &Theme) -> f32 {
    (theme.font_size * 1.4).max(LEGEND_SWATCH + 4.0)
}

fn legend_size(legend: &Legend, theme: &Theme, config: &LayoutConfig) -> (f32, f32) {
    let row = legend_row_height(theme);
    let items_w = legend
        .items
        .iter()
        .map(|item| label_width(&item.label, theme.font_size, theme, config) + LEGEND_SWATCH + 6.0)
        .fold(0.0f32, f32::max);
    let title_w = legend
        .title
        .as_deref()
        .map(|title| label_width(title, theme.font_size, theme, config))
        .unwrap_or(0.0);
    let rows = legend.items.len() + usize::from(legend.title.is_some());
    (
        items_w.max(title_w) + 2.0 * LEGEND_PAD,
        rows as f32 * row + 2.0 * LEGEND_PAD,
    )
}

fn legend_svg(legend: &Legend, x: f32, y: f32, theme: &Theme, config: &LayoutConfig) -> String {
    let (w, h) = legend_size(legend, theme, config);
    let row = legend_row_height(theme);
    let mut svg = format!(
        "<g class=\"legend\"><rect x=\"{x:.2}\" y=\"{y:.2}\" width=\"{w:.2}\" height=\"{h:.2}\" fill=\"{}\" stroke=\"{}\" stroke-width=\"0.8\"/>",
        theme.legend_background, theme.legend_border
    );
    let mut cursor = y + LEGEND_PAD + row / 2.0;
    if let Some(title) = &legend.title {
        svg.push_str(&format!(
            "<text x=\"{:.2}\" y=\"{cursor:.2}\" dominant-baseline=\"middle\" font-size=\"{}\" font-weight=\"bold\" fill=\"{}\">{}</text>",
            x + LEGEND_PAD,
            theme.font_size,
            theme.text_color,
            escape_xml(title)
        ));
        cursor += row;
    }
    for item in &legend.items {
        svg.push_str(&format!(
            "<rect x=\"{:.2}\" y=\"{:.2}\" width=\"{LEGEND_SWATCH}\" height=\"{LEGEND_SWATCH}\" fill=\"{}\"/>",
            x + LEGEND_PAD,
            cursor - LEGEND_SWATCH / 2.0,
            item.color
        ));
        svg.push_str(&format!(
            "<text x=\"{:.2}\" y=\"{cursor:.2}\" dominant-baseline=\"middle\" font-size=\"{}\" fill=\"{}\">{}</text>",
            x + LEGEND_PAD + LEGEND_SWATCH + 6.0,
            theme.font_size,
            theme.text_color,
            escape_xml(&item.label)
        ));
        cursor += row;
    }
    svg.push_str("</g>");
    svg
}

pub fn write_output_svg(svg: &str, output: Option<&Path>) -> Result<()> {
    match output {
        Some(path) => {
            std::fs::write(path, svg)?;
            tracing::info!(path = %path.display(), bytes = svg.len(), "wrote svg");
        }
        None => {
            print!("{}", svg);
        }
    }
    Ok(())
}

#[cfg(feature = "png")]
pub fn write_output_png(
    svg: &str,
    output: &Path,
    render_cfg: &RenderConfig,
    theme: &Theme,
) -> Result<()> {
    let mut opt = usvg::Options::default();
    opt.font_family = theme
        .font_family
        .split(',')
        .next()
        .map(|family| family.trim().trim_matches('"').to_string())
        .unwrap_or_else(|| "DejaVu Sans".to_string());
    if let Some(size) = usvg::Size::from_wh(render_cfg.width, render_cfg.height) {
        opt.default_size = size;
    }
    opt.fontdb_mut().load_system_fonts();

    let tree = usvg::Tree::from_str(svg, &opt)?;
    let size = tree.size().to_int_size();
    let mut pixmap = resvg::tiny_skia::Pixmap::new(size.width(), size.height())
        .ok_or_else(|| anyhow::anyhow!("Failed to allocate pixmap"))?;
    pixmap.fill(parse_background(&render_cfg.background));

    let mut pixmap_mut = pixmap.as_mut();
    resvg::render(&tree, resvg::tiny_skia::Transform::default(), &mut pixmap_mut);
    pixmap.save_png(output)?;
    tracing::info!(
        path = %output.display(),
        width = size.width(),
        height = size.height(),
        "wrote png"
    );
    Ok(())
}

#[cfg(not(feature = "png"))]
pub fn write_output_png(
    _svg: &str,
    _output: &Path,
    _render_cfg: &RenderConfig,
    _theme: &Theme,
) -> Result<()> {
    anyhow::bail!("PNG output requires the `png` feature")
}

#[cfg(feature = "png")]
fn parse_background(color: &str) -> resvg::tiny_skia::Color {
    let hex = color.trim().trim_start_matches('#');
    let channel = |idx: usize| {
        hex.get(idx..idx + 2)
            .and_then(|part| u8::from_str_radix(part, 16).ok())
    };
    match (hex.len(), channel(0), channel(2), channel(4)) {
        (6, Some(r), Some(g), Some(b)) => resvg::tiny_skia::Color::from_rgba8(r, g, b, 255),
        _ => resvg::tiny_skia::Color::WHITE,
    }
}

fn escape_xml(input: &str) -> String {
    input
        .replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&apos;")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ir::{Chart, FlowSpec, FractionSpec, StackSpec};
    use crate::layout::compute_layout;
    use indexmap::IndexMap;
    use serde_json::json;

    fn fast_config() -> LayoutConfig {
        LayoutConfig {
            fast_text_metrics: true,
            ..LayoutConfig::default()
        }
    }

    fn render(chart: &Chart, config: &LayoutConfig) -> String {
        let theme = Theme::classic();
        let layout = compute_layout(chart, config).unwrap();
        render_svg(&layout, &theme, config)
    }

    #[test]
    fn boxflow_draws_ribbons_ticks_and_labels() {
        let mut spec = FlowSpec::new();
        spec.insert(
            "A".to_string(),
            IndexMap::from([("X".to_string(), 3.0), ("Y".to_string(), 1.0)]),
        );
        spec.insert("B".to_string(), IndexMap::from([("X".to_string(), 2.0)]));
        let svg = render(&Chart::BoxFlow(spec), &fast_config());
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert_eq!(svg.matches("<path ").count(), 3);
        // two zero ticks plus one per bucket
        assert_eq!(svg.matches("<line ").count(), 6);
        assert_eq!(svg.matches("stroke=\"#B0B0B0\"").count(), 6);
        assert!(svg.contains(">A</tspan>"));
        assert!(svg.contains(">Y</tspan>"));
        assert!(svg.contains("fill-opacity=\"0.3\""));
    }

    #[test]
    fn stack_draws_bars_axes_and_legend() {
        let records = json!([
            {"city": "Tokyo", "mode": "bus"},
            {"city": "Tokyo", "mode": "train"},
            {"city": "Osaka", "mode": "bus"}
        ]);
        let records = records
            .as_array()
            .unwrap()
            .iter()
            .map(|row| row.as_object().unwrap().clone())
            .collect();
        let spec = StackSpec::new(records, "city", "mode");
        let svg = render(&Chart::Stack(spec), &fast_config());
        assert!(svg.contains("class=\"legend\""));
        assert!(svg.contains(">Bus</text>"));
        assert!(svg.contains("rotate(-25.00"));
        assert!(svg.contains(">Tokyo</text>"));
    }

    #[test]
    fn fraction_bar_escapes_labels() {
        let spec = FractionSpec::new(vec![1.0, 3.0], vec!["R&D".into(), "<ops>".into()]);
        let svg = render(&Chart::Fraction(spec), &fast_config());
        assert!(svg.contains("R&amp;D"));
        assert!(svg.contains("&lt;ops&gt;"));
        assert!(!svg.contains("<ops>"));
    }

    #[test]
    fn escape_xml_handles_quotes() {
        assert_eq!(escape_xml("a\"b'c"), "a&quot;b&apos;c");
    }
}

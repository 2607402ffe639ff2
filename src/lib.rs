#[cfg(feature = "cli")]
pub mod cli;
pub mod config;
pub mod error;
pub mod ir;
pub mod layout;
pub mod layout_dump;
pub mod render;
pub mod text_metrics;
pub mod theme;

#[cfg(feature = "cli")]
pub use cli::run;
pub use config::{BoxFlowConfig, FractionConfig, LayoutConfig, Orientation, StackConfig};
pub use error::{Error, Result};
pub use ir::{Chart, ChartKind, FlowSpec, FractionSpec, StackSpec, XOrder, parse_document};
pub use layout::{Layout, compute_layout};
pub use render::render_svg;
pub use theme::{Palette, Theme};

/// Theme plus layout settings for one-shot rendering.
#[derive(Debug, Clone)]
pub struct RenderOptions {
    pub theme: Theme,
    pub layout: LayoutConfig,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self::classic()
    }
}

impl RenderOptions {
    pub fn classic() -> Self {
        Self {
            theme: Theme::classic(),
            layout: LayoutConfig::default(),
        }
    }

    pub fn modern() -> Self {
        Self {
            theme: Theme::modern(),
            layout: LayoutConfig::default(),
        }
    }
}

/// Lays out and renders `chart` to an SVG string.
pub fn render(chart: &Chart, options: &RenderOptions) -> Result<String> {
    let layout = compute_layout(chart, &options.layout)?;
    Ok(render_svg(&layout, &options.theme, &options.layout))
}

/// Parses a chart document, applies its options over `options`, and renders it.
pub fn render_with_options(input: &str, mut options: RenderOptions) -> Result<String> {
    let document = parse_document(input)?;
    document.apply_options(&mut options.layout);
    render(&document.chart, &options)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_document_end_to_end() {
        let svg = render_with_options(
            r#"{ chart: "boxflow", data: { Coal: { Power: 5, Steel: 2 }, Gas: { Power: 3 } } }"#,
            RenderOptions::modern(),
        )
        .unwrap();
        assert!(svg.contains("<svg"));
        assert!(svg.contains("Steel"));
    }

    #[test]
    fn zero_total_surfaces_invalid_input() {
        let err = render_with_options(
            r#"{ "chart": "boxflow", "data": { "A": { "X": 0 } } }"#,
            RenderOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, Error::InvalidInput(_)));
    }

    #[test]
    fn malformed_document_is_a_parse_error() {
        let err = render_with_options("{ chart: ", RenderOptions::default()).unwrap_err();
        assert!(matches!(err, Error::Parse(_)));
    }
}

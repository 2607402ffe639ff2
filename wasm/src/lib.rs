use serde::Deserialize;
use tabplot::{Palette, RenderOptions, render_with_options};
use wasm_bindgen::prelude::*;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ChartRenderOptions {
    theme: Option<String>,
    font_family: Option<String>,
    font_size: Option<f32>,
    fast_text: Option<bool>,
    palette: Option<Palette>,
}

fn build_render_options(options: ChartRenderOptions) -> RenderOptions {
    let mut render_options = if options.theme.as_deref() == Some("modern") {
        RenderOptions::modern()
    } else {
        RenderOptions::classic()
    };

    if let Some(font_family) = options.font_family {
        render_options.theme.font_family = font_family;
    }
    if let Some(font_size) = options.font_size {
        render_options.theme.font_size = font_size;
    }
    // No system fonts in the browser; the width table is all there is.
    render_options.layout.fast_text_metrics = options.fast_text.unwrap_or(true);
    if let Some(palette) = options.palette {
        render_options.layout.boxflow.palette = palette;
        render_options.layout.stack.palette = palette;
        render_options.layout.fraction.palette = palette;
    }

    render_options
}

#[wasm_bindgen]
pub fn render_chart_svg(document: &str, options_json: Option<String>) -> Result<String, JsValue> {
    let options = if let Some(raw_options) = options_json {
        serde_json::from_str::<ChartRenderOptions>(&raw_options)
            .map_err(|error| JsValue::from_str(&error.to_string()))?
    } else {
        ChartRenderOptions::default()
    };

    let render_options = build_render_options(options);
    render_with_options(document, render_options)
        .map_err(|error| JsValue::from_str(&error.to_string()))
}
